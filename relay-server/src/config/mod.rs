//! Configuration module for bridge-relay.
//!
//! Handles loading configuration from the TOML file, CLI overrides, and the
//! environment. The relayer key comes from the environment or a key file.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{BorSettings, HeimdallSettings, RelayConfig};
use relay_sdk::topology::QueueBinding;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable holding the hex relayer key.
pub const RELAYER_KEY_ENV: &str = "RELAYER_PRIVATE_KEY";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("RELAYER_PRIVATE_KEY environment variable not set and no key file given")]
    MissingRelayerKey,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
    amqp_override: Option<String>,
}

impl ConfigLoader {
    pub fn new(
        config_path: impl AsRef<Path>,
        listen_override: Option<SocketAddr>,
        amqp_override: Option<String>,
    ) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
            amqp_override,
        }
    }

    /// Read the TOML file, apply CLI overrides, validate, and build the
    /// runtime configuration.
    pub fn load(&self) -> Result<RelayConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let file_config: FileConfig = toml::from_str(&config_content)?;
        self.build(file_config)
    }

    fn build(&self, mut file_config: FileConfig) -> Result<RelayConfig, ConfigError> {
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        if let Some(url) = &self.amqp_override {
            file_config.amqp.url = url.clone();
        }

        validate(&file_config)?;

        Ok(RelayConfig {
            listen: file_config.server.listen,
            amqp_url: file_config.amqp.url,
            heimdall: HeimdallSettings {
                rest_url: file_config.heimdall.rest_url,
                chain_id: file_config.heimdall.chain_id,
                gas: file_config.heimdall.gas,
            },
            bor: BorSettings {
                rpc_url: file_config.bor.rpc_url,
                chain_id: file_config.bor.chain_id,
            },
            tasks: QueueBinding::new(
                file_config.tasks.exchange,
                file_config.tasks.queue,
                file_config.tasks.routing_key,
            ),
            retry_delay: Duration::from_secs(file_config.tasks.retry_delay_secs),
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

    if config.heimdall.chain_id.trim().is_empty() {
        return invalid("heimdall.chain_id must not be empty".to_string());
    }
    if config.heimdall.gas == 0 {
        return invalid("heimdall.gas must be greater than zero".to_string());
    }
    for (field, url) in [
        ("heimdall.rest_url", &config.heimdall.rest_url),
        ("bor.rpc_url", &config.bor.rpc_url),
    ] {
        if !matches!(url.scheme(), "http" | "https") {
            return invalid(format!("{field} must be an http(s) url, got {url}"));
        }
    }

    match Url::parse(&config.amqp.url) {
        Ok(url) if matches!(url.scheme(), "amqp" | "amqps") => {}
        Ok(url) => {
            return invalid(format!(
                "amqp.url must use the amqp or amqps scheme, got {}",
                url.scheme()
            ));
        }
        Err(e) => return invalid(format!("amqp.url is not a valid url: {e}")),
    }

    for (field, value) in [
        ("tasks.exchange", &config.tasks.exchange),
        ("tasks.queue", &config.tasks.queue),
        ("tasks.routing_key", &config.tasks.routing_key),
    ] {
        if value.trim().is_empty() {
            return invalid(format!("{field} must not be empty"));
        }
    }
    if config.tasks.retry_delay_secs == 0 {
        return invalid("tasks.retry_delay_secs must be greater than zero".to_string());
    }
    Ok(())
}

/// Read the relayer key from `key_file` if given, else from the environment.
pub fn get_relayer_key(key_file: Option<&Path>) -> Result<String, ConfigError> {
    match key_file {
        Some(path) => std::fs::read_to_string(path)
            .map(|key| key.trim().to_string())
            .map_err(|source| ConfigError::KeyFile {
                path: path.to_path_buf(),
                source,
            }),
        None => std::env::var(RELAYER_KEY_ENV).map_err(|_| ConfigError::MissingRelayerKey),
    }
}
