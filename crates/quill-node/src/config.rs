//! Node configuration.
//!
//! [`NodeConfig`] is layered with the `config` crate: built-in defaults, then
//! an optional TOML file, then `QUILL__*` environment variables
//! (`QUILL__LOG_LEVEL`, `QUILL__PARAMS__BLOCK_INTERVAL_SECS`, ...).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use quill_core::params::ChainParams;

use crate::error::NodeError;

pub const ENV_PREFIX: &str = "QUILL";
pub const CONFIG_FILE_NAME: &str = "quill.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Filter string (e.g. "info", "quill_rewards=debug").
    pub log_level: String,
    pub log_format: LogFormat,
    /// JSON genesis file; a built-in development genesis when unset.
    pub genesis: Option<PathBuf>,
    pub params: ChainParams,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            genesis: None,
            params: ChainParams::default(),
        }
    }
}

impl NodeConfig {
    /// `<config dir>/quill/quill.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quill")
            .join(CONFIG_FILE_NAME)
    }

    /// Load from `path` (or the default location when `None`) plus the
    /// environment. A missing file is not an error when no path was given.
    pub fn load(path: Option<&Path>) -> Result<Self, NodeError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };
        let env = Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true);
        Self::load_with_env(&path, required, env)
    }

    fn load_with_env(path: &Path, required: bool, env: Environment) -> Result<Self, NodeError> {
        // Absent keys fall back to serde defaults.
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(required))
            .add_source(env)
            .build()?;
        let loaded: Self = config.try_deserialize()?;
        loaded.params.validate()?;
        Ok(loaded)
    }
}
