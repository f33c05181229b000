mod file_config;

pub use file_config::FileConfig;

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::protocol::handshake::{MAX_RSA_KEY_BITS, MIN_RSA_KEY_BITS};
use crate::server::ServerConfig;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 65433;
pub const DEFAULT_USER_DB_PATH: &str = "user_db.db";

/// Smallest frame that still fits an encrypted signup message.
const MIN_MAX_FRAME_LEN: usize = 1024;

/// CLI arguments that can be used for config resolution.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub host: String,
    pub port: u16,
    pub user_db_path: PathBuf,
    pub model_path: Option<PathBuf>,
    pub rsa_key_bits: usize,
    pub max_frame_len: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        CliConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user_db_path: PathBuf::from(DEFAULT_USER_DB_PATH),
            model_path: None,
            rsa_key_bits: server.rsa_key_bits,
            max_frame_len: server.max_frame_len,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub user_db_path: PathBuf,
    pub model_path: PathBuf,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let host = file.host.unwrap_or_else(|| cli.host.clone());
        if host.trim().is_empty() {
            bail!("host must not be empty");
        }
        let port = file.port.unwrap_or(cli.port);
        let user_db_path = file
            .user_db_path
            .map(PathBuf::from)
            .unwrap_or_else(|| cli.user_db_path.clone());

        let model_path = file
            .model_path
            .map(PathBuf::from)
            .or_else(|| cli.model_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("model_path must be specified via --model-path or in config file")
            })?;
        if !model_path.is_file() {
            bail!("Model file does not exist: {:?}", model_path);
        }

        if let Some(parent) = user_db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("User db directory does not exist: {:?}", parent);
            }
        }

        let rsa_key_bits = file.rsa_key_bits.unwrap_or(cli.rsa_key_bits);
        if !(MIN_RSA_KEY_BITS..=MAX_RSA_KEY_BITS).contains(&rsa_key_bits) {
            bail!(
                "rsa_key_bits must be between {} and {}, got {}",
                MIN_RSA_KEY_BITS,
                MAX_RSA_KEY_BITS,
                rsa_key_bits
            );
        }

        let max_frame_len = file.max_frame_len.unwrap_or(cli.max_frame_len);
        if max_frame_len < MIN_MAX_FRAME_LEN {
            bail!(
                "max_frame_len must be at least {}, got {}",
                MIN_MAX_FRAME_LEN,
                max_frame_len
            );
        }

        Ok(AppConfig {
            host,
            port,
            user_db_path,
            model_path,
            server: ServerConfig {
                rsa_key_bits,
                max_frame_len,
            },
        })
    }

    /// Host and port to listen on. The host may be an IP literal or a name to resolve.
    pub fn listen_addr(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}
