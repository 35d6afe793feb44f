//! Configuration module for symql
//!
//! - `defaults` - Default constants
//! - `args` - CLI argument definitions
//! - `file` - TOML configuration file

mod args;
mod defaults;
pub mod file;

pub use args::CliArgs;
pub use defaults::*;
pub use file::{ConfigFile, DefaultConfig};

use std::net::SocketAddr;
use std::path::PathBuf;

use symql_vtab::{DispatcherConfig, EngineConfig, SourcePolicy};

use crate::error::{Result, SymqlError};

/// Resolved settings for one symql session.
///
/// Built from [`CliArgs`] layered over an optional [`ConfigFile`] and the
/// built-in defaults.
#[derive(Debug, Clone)]
pub struct SymqlConfig {
    /// Snapshot file to load
    pub snapshot: PathBuf,
    pub engine: EngineConfig,
    pub dispatcher: DispatcherConfig,
    /// HTTP listen address, used only in server mode
    pub http_addr: SocketAddr,
    /// Bearer token for the HTTP server
    pub token: Option<String>,
    pub log_level: String,
    /// Configuration file that was applied, if any.
    pub config_path: Option<PathBuf>,
    /// Default-location config files that failed to load and were skipped.
    pub skipped_config: Vec<String>,
}

impl SymqlConfig {
    /// Resolve configuration from parsed arguments.
    ///
    /// An explicit `--config` path must load; otherwise the default
    /// locations are tried. Broken default files are skipped and listed in
    /// `skipped_config` for the caller to report once logging is up.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        match &args.config {
            Some(path) => {
                let file = ConfigFile::load(path)?;
                let mut config = Self::merge(args, file)?;
                config.config_path = Some(path.clone());
                Ok(config)
            }
            None => Self::from_discovered(args, ConfigFile::load_default()),
        }
    }

    /// Merge `args` over the outcome of a default-location search.
    pub fn from_discovered(args: &CliArgs, found: DefaultConfig) -> Result<Self> {
        let (config_path, file) = match found.loaded {
            Some((path, file)) => (Some(path), file),
            None => (None, ConfigFile::default()),
        };
        let mut config = Self::merge(args, file)?;
        config.config_path = config_path;
        config.skipped_config = found.skipped;
        Ok(config)
    }

    /// Layer `args` over `file` over the defaults.
    pub fn merge(args: &CliArgs, file: ConfigFile) -> Result<Self> {
        let max_rows = args
            .max_rows
            .or(file.engine.max_rows)
            .unwrap_or(DEFAULT_MAX_ROWS);
        if max_rows == 0 {
            return Err(SymqlError::config("max_rows must be at least 1"));
        }

        let strict = args.strict_sources
            || file.engine.strict_sources.unwrap_or(DEFAULT_STRICT_SOURCES);
        let source_policy = if strict {
            SourcePolicy::Error
        } else {
            SourcePolicy::Empty
        };

        let max_queue_depth = args.max_queue_depth.or(file.dispatcher.max_queue_depth);
        if max_queue_depth == Some(0) {
            return Err(SymqlError::config("max_queue_depth must be at least 1"));
        }

        let addr = args
            .http
            .clone()
            .flatten()
            .or(file.http.addr)
            .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr: SocketAddr = addr
            .parse()
            .map_err(|e| SymqlError::config(format!("Invalid HTTP address '{}': {}", addr, e)))?;

        Ok(Self {
            snapshot: args.snapshot.clone(),
            engine: EngineConfig {
                max_rows,
                source_policy,
            },
            dispatcher: DispatcherConfig {
                max_queue_depth,
                drain_on_shutdown: file
                    .dispatcher
                    .drain_on_shutdown
                    .unwrap_or(DEFAULT_DRAIN_ON_SHUTDOWN),
                ..DispatcherConfig::default()
            },
            http_addr,
            token: args.token.clone().or(file.http.token).filter(|t| !t.is_empty()),
            log_level: args
                .log_level
                .clone()
                .or(file.log.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            config_path: None,
            skipped_config: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["symql", "app.json"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = SymqlConfig::merge(&args(&[]), ConfigFile::default()).unwrap();
        assert_eq!(config.engine.max_rows, DEFAULT_MAX_ROWS);
        assert_eq!(config.engine.source_policy, SourcePolicy::Empty);
        assert_eq!(config.dispatcher.max_queue_depth, None);
        assert!(config.dispatcher.drain_on_shutdown);
        assert_eq!(config.http_addr.to_string(), DEFAULT_HTTP_ADDR);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_file_overrides_defaults_and_args_override_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [engine]
            max_rows = 50
            strict_sources = true
            [dispatcher]
            max_queue_depth = 4
            drain_on_shutdown = false
            [http]
            addr = "0.0.0.0:9000"
            token = "from-file"
            "#,
        )
        .unwrap();

        let config = SymqlConfig::merge(&args(&[]), file.clone()).unwrap();
        assert_eq!(config.engine.max_rows, 50);
        assert_eq!(config.engine.source_policy, SourcePolicy::Error);
        assert_eq!(config.dispatcher.max_queue_depth, Some(4));
        assert!(!config.dispatcher.drain_on_shutdown);
        assert_eq!(config.http_addr.port(), 9000);
        assert_eq!(config.token.as_deref(), Some("from-file"));

        let config = SymqlConfig::merge(
            &args(&["--max-rows", "7", "--http", "127.0.0.1:7000", "--token", "cli"]),
            file,
        )
        .unwrap();
        assert_eq!(config.engine.max_rows, 7);
        assert_eq!(config.http_addr.port(), 7000);
        assert_eq!(config.token.as_deref(), Some("cli"));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = SymqlConfig::merge(&args(&["--max-rows", "0"]), ConfigFile::default()).unwrap_err();
        assert!(matches!(err, SymqlError::Config(_)));

        let err = SymqlConfig::merge(&args(&["--http", "not-an-addr"]), ConfigFile::default())
            .unwrap_err();
        assert!(err.to_string().contains("not-an-addr"));
    }

    #[test]
    fn test_skipped_default_files_are_kept_for_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("symql.toml");
        std::fs::write(&broken, "[log]\nlevl = 1\n").unwrap();

        let found = ConfigFile::load_first(&[broken]);
        let config = SymqlConfig::from_discovered(&args(&[]), found).unwrap();
        assert!(config.config_path.is_none());
        assert_eq!(config.skipped_config.len(), 1);
        assert!(config.skipped_config[0].contains("symql.toml"));
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_explicit_config_file_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[engine]\nmax_rows = 3\n").unwrap();

        let config = SymqlConfig::from_args(&args(&["--config", path.to_str().unwrap()])).unwrap();
        assert_eq!(config.engine.max_rows, 3);
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_explicit_missing_config_file_fails() {
        let err = SymqlConfig::from_args(&args(&["--config", "/nonexistent/symql.toml"])).unwrap_err();
        assert!(matches!(err, SymqlError::Config(_)));
    }
}
