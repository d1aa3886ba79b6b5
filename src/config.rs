//! Gateway configuration.
//!
//! Loading priority:
//! 1. Explicit path (`--config` / `KASTQL_CONFIG`), which must exist
//! 2. `config.yaml` in the working directory, if present
//! 3. Built-in defaults
//!
//! `KASTQL_*` environment variables are applied on top of whichever of the
//! above was used.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::field_extractor::ExtractorKind;
use crate::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
const ACCEPTED_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// File the server registry is persisted to.
    pub registry_file: PathBuf,
    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,
    pub host: String,
    pub port: u16,
    /// Timeout for introspection and forwarded requests.
    pub request_timeout_secs: u64,
    pub field_extractor: ExtractorKind,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            registry_file: PathBuf::from("kastql-registry.json"),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            field_extractor: ExtractorKind::default(),
        }
    }
}

impl GatewayConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if !ACCEPTED_EXTENSIONS.contains(&extension) {
            return Err(Error::config(format!(
                "unsupported config file format for {}, expected one of: {}",
                path.display(),
                ACCEPTED_EXTENSIONS.join(", ")
            )));
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&contents).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `KASTQL_REGISTRY_FILE`, `KASTQL_LOG_LEVEL`, `KASTQL_HOST` and
    /// `KASTQL_PORT` as returned by `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(registry_file) = lookup("KASTQL_REGISTRY_FILE") {
            self.registry_file = PathBuf::from(registry_file);
        }
        if let Some(log_level) = lookup("KASTQL_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(host) = lookup("KASTQL_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("KASTQL_PORT") {
            self.port = port
                .parse()
                .map_err(|e| Error::config(format!("invalid KASTQL_PORT {port:?}: {e}")))?;
        }
        Ok(self)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| Error::config(format!("failed to serialize config: {e}")))?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
