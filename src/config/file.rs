//! Configuration file support for symql
//!
//! ## Priority Order
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments and `SYMQL_*` environment variables
//! 2. Configuration file
//! 3. Default values
//!
//! ## Example Configuration
//!
//! ```toml
//! # symql.toml
//!
//! [engine]
//! max_rows = 10000
//! strict_sources = false
//!
//! [dispatcher]
//! # max_queue_depth = 64
//! drain_on_shutdown = true
//!
//! [http]
//! addr = "127.0.0.1:8080"
//! # token = "secret"
//!
//! [log]
//! level = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::defaults::DEFAULT_CONFIG_FILE;
use crate::error::{Result, SymqlError};

/// Root configuration structure for TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Query engine configuration
    pub engine: EngineSection,

    /// Query dispatcher configuration
    pub dispatcher: DispatcherSection,

    /// HTTP server configuration
    pub http: HttpSection,

    /// Logging configuration
    pub log: LogSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSection {
    /// Maximum rows returned per query
    pub max_rows: Option<usize>,

    /// Fail queries on unavailable tables instead of reading them as empty
    pub strict_sources: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherSection {
    /// Maximum number of waiting queries (unbounded if unset)
    pub max_queue_depth: Option<usize>,

    /// Run already queued queries on shutdown instead of failing them
    pub drain_on_shutdown: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpSection {
    /// Listen address
    pub addr: Option<String>,

    /// Bearer token required on protected routes
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SymqlError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            SymqlError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Try to load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./symql.toml
    /// 2. ~/.config/symql/symql.toml
    ///
    /// Runs before logging is set up, so nothing is logged here; the caller
    /// reports the outcome.
    pub fn load_default() -> DefaultConfig {
        let default_paths = [
            PathBuf::from(DEFAULT_CONFIG_FILE),
            dirs::config_dir()
                .map(|p| p.join("symql").join(DEFAULT_CONFIG_FILE))
                .unwrap_or_default(),
        ];
        Self::load_first(&default_paths)
    }

    /// Load the first of `paths` that exists and parses. Files that exist
    /// but fail to load are skipped and recorded.
    pub fn load_first(paths: &[PathBuf]) -> DefaultConfig {
        let mut found = DefaultConfig::default();
        for path in paths.iter().filter(|p| !p.as_os_str().is_empty()) {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        found.loaded = Some((path.clone(), config));
                        break;
                    }
                    Err(e) => found.skipped.push(e.to_string()),
                }
            }
        }
        found
    }
}

/// Result of searching the default configuration locations.
#[derive(Debug, Clone, Default)]
pub struct DefaultConfig {
    /// The file that loaded, if any.
    pub loaded: Option<(PathBuf, ConfigFile)>,
    /// Load errors of files that exist but were skipped.
    pub skipped: Vec<String>,
}
