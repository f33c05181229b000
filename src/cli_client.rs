use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chordline_server::client::ChordClient;
use chordline_server::protocol::AuthOutcome;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Server address.
    #[clap(long, default_value = "127.0.0.1:65433")]
    pub server: String,

    #[command(subcommand)]
    command: ClientCommand,
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    /// Registers a new user.
    Signup {
        username: String,
        password: String,
        email: String,
        favorite_animal: String,
    },

    /// Checks a username and password.
    Signin { username: String, password: String },

    /// Signs in, then asks the server for the chords of a file it can read.
    Analyze {
        username: String,
        password: String,

        /// Tempo of the track in beats per minute.
        #[clap(long)]
        bpm: u32,

        /// Path of the WAV file, as seen by the server.
        #[clap(value_parser = parse_path)]
        file: PathBuf,
    },
}

fn report(response: &str) -> Result<()> {
    match AuthOutcome::from_response(response) {
        AuthOutcome::Success => {
            println!("{}", response);
            Ok(())
        }
        AuthOutcome::Failure(reason) => bail!("{}", reason),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let mut client = ChordClient::connect(&cli_args.server)
        .await
        .with_context(|| format!("Failed to connect to {}", cli_args.server))?;

    let result = match &cli_args.command {
        ClientCommand::Signup {
            username,
            password,
            email,
            favorite_animal,
        } => {
            let response = client
                .sign_up(username, password, email, favorite_animal)
                .await?;
            report(&response)
        }
        ClientCommand::Signin { username, password } => {
            let response = client.sign_in(username, password).await?;
            report(&response)
        }
        ClientCommand::Analyze {
            username,
            password,
            bpm,
            file,
        } => {
            let response = client.sign_in(username, password).await?;
            report(&response)?;
            client.send_telemetry("Start_audio").await?;
            client.set_tempo(*bpm).await?;
            client.open_file(file).await?;
            let events = client.process_audio().await?;
            if events.is_empty() {
                println!("No chords found");
            }
            for event in events {
                println!("{:>8.2}s  {}", event.start_secs, event.label);
            }
            Ok(())
        }
    };

    client.terminate().await?;
    result
}
