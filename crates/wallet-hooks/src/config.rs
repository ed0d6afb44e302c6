//! Client configuration loaded from TOML, and logging setup.

use std::path::Path;
use std::time::Duration;

use chain_sol::{Commitment, PrepareConfig, PrepareOptions, SendTransactionConfig};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::HookError;
use crate::send::SendOptions;

/// RPC endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_url")]
    pub url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub commitment: Commitment,
}

fn default_url() -> String {
    "http://127.0.0.1:8899".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_ms: default_timeout_ms(),
            commitment: Commitment::default(),
        }
    }
}

impl RpcConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// `sendTransaction` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendConfig {
    #[serde(default)]
    pub skip_preflight: bool,

    #[serde(default)]
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub prepare: PrepareConfig,

    #[serde(default)]
    pub send: SendConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl ClientConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, HookError> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| HookError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HookError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HookError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), HookError> {
        if self.rpc.url.trim().is_empty() {
            return Err(HookError::Config("rpc.url must not be empty".into()));
        }
        if self.rpc.timeout_ms == 0 {
            return Err(HookError::Config("rpc.timeout_ms must be > 0".into()));
        }
        self.prepare
            .validate()
            .map_err(|e| HookError::Config(e.to_string()))
    }

    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            prepare: PrepareOptions::from(self.prepare),
            send: SendTransactionConfig {
                skip_preflight: self.send.skip_preflight,
                preflight_commitment: Some(self.rpc.commitment),
                max_retries: self.send.max_retries,
                ..SendTransactionConfig::default()
            },
        }
    }
}

/// Install a global fmt subscriber. Returns `Ok(false)` when a subscriber
/// is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<bool, HookError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| HookError::Config(format!("invalid log filter {:?}: {e}", config.filter)))?,
    };

    let installed = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    Ok(installed.is_ok())
}
