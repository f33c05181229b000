use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chordline_server::chords::{CentroidModel, ChordClassifier, ChordPipeline, MfccExtractor};
use chordline_server::config::{
    AppConfig, CliConfig, FileConfig, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_USER_DB_PATH,
};
use chordline_server::protocol::{DEFAULT_MAX_FRAME_LEN, DEFAULT_RSA_KEY_BITS};
use chordline_server::server::{run_server, ServerState};
use chordline_server::user::SqliteUserStore;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the chord classifier model (JSON nearest-centroid artifact).
    #[clap(long, value_parser = parse_path)]
    pub model_path: Option<PathBuf>,

    /// Path to the SQLite database file to use for user storage.
    #[clap(long, value_parser = parse_path, default_value = DEFAULT_USER_DB_PATH)]
    pub user_db_path: PathBuf,

    /// The address to listen on.
    #[clap(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Size of the RSA key generated for each connection.
    #[clap(long, default_value_t = DEFAULT_RSA_KEY_BITS)]
    pub rsa_key_bits: usize,

    /// Largest accepted frame, in bytes.
    #[clap(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    pub max_frame_len: usize,

    /// Optional TOML config file. Values in it override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            host: self.host.clone(),
            port: self.port,
            user_db_path: self.user_db_path.clone(),
            model_path: self.model_path.clone(),
            rsa_key_bits: self.rsa_key_bits,
            max_frame_len: self.max_frame_len,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Loading chord model from {:?}...", config.model_path);
    let model = CentroidModel::load(&config.model_path)?;
    info!(
        "Model has {} chord classes over {} features",
        model.classes.len(),
        model.feature_len()
    );
    let pipeline = ChordPipeline::new(Arc::new(MfccExtractor::default()), Arc::new(model))?;

    info!("Opening user database at {:?}...", config.user_db_path);
    let user_store = SqliteUserStore::new(&config.user_db_path)?;

    let state = ServerState::new(config.server.clone(), Arc::new(user_store), Arc::new(pipeline));
    run_server(config.listen_addr(), state).await
}
