//! Command-line arguments for the symql binary

use clap::Parser;
use std::path::PathBuf;

use crate::cli_format::OutputFormat;

/// Command-line arguments for symql
#[derive(Parser, Debug, Clone)]
#[command(name = "symql")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Query debug-symbol snapshots with SQL")]
pub struct CliArgs {
    /// Symbol snapshot (JSON) to load
    pub snapshot: PathBuf,

    /// SQL statement to run once
    pub sql: Option<String>,

    /// SQL statement to run once (alternative to the positional form)
    #[arg(short = 'q', long = "query", conflicts_with = "sql")]
    pub query: Option<String>,

    /// Start an interactive SQL shell
    #[arg(short, long, conflicts_with_all = ["sql", "query", "http"])]
    pub interactive: bool,

    /// Serve queries over HTTP, optionally on the given address
    #[arg(long, value_name = "ADDR", num_args = 0..=1, conflicts_with_all = ["sql", "query"])]
    pub http: Option<Option<String>>,

    /// Path to configuration file (TOML format)
    /// If not specified, looks for symql.toml in the current directory
    /// and the user config directory
    #[arg(short, long, env = "SYMQL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "SYMQL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output format for query results
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Maximum rows returned per query
    #[arg(long, env = "SYMQL_MAX_ROWS")]
    pub max_rows: Option<usize>,

    /// Reject queries once this many are waiting (unbounded if unset)
    #[arg(long, env = "SYMQL_MAX_QUEUE_DEPTH")]
    pub max_queue_depth: Option<usize>,

    /// Fail queries that touch an unavailable table instead of reading it as empty
    #[arg(long, env = "SYMQL_STRICT_SOURCES")]
    pub strict_sources: bool,

    /// Bearer token required by the HTTP server
    #[arg(long, env = "SYMQL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl CliArgs {
    /// The one-shot statement, from either the positional or `-q` form.
    pub fn statement(&self) -> Option<&str> {
        self.sql.as_deref().or(self.query.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_and_flag_query() {
        let args = CliArgs::try_parse_from(["symql", "app.json", "SELECT 1"]).unwrap();
        assert_eq!(args.statement(), Some("SELECT 1"));

        let args = CliArgs::try_parse_from(["symql", "app.json", "-q", "SELECT 2"]).unwrap();
        assert_eq!(args.statement(), Some("SELECT 2"));

        assert!(CliArgs::try_parse_from(["symql", "app.json", "SELECT 1", "-q", "SELECT 2"]).is_err());
    }

    #[test]
    fn test_http_with_and_without_addr() {
        let args = CliArgs::try_parse_from(["symql", "app.json", "--http"]).unwrap();
        assert_eq!(args.http, Some(None));

        let args = CliArgs::try_parse_from(["symql", "app.json", "--http", "0.0.0.0:9000"]).unwrap();
        assert_eq!(args.http, Some(Some("0.0.0.0:9000".to_string())));

        let args = CliArgs::try_parse_from(["symql", "app.json"]).unwrap();
        assert_eq!(args.http, None);
        assert!(!args.interactive);
    }

    #[test]
    fn test_interactive_conflicts_with_query() {
        assert!(CliArgs::try_parse_from(["symql", "app.json", "-i", "SELECT 1"]).is_err());
    }
}
