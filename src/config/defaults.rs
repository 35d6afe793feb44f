//! Default constants for symql configuration
//!
//! These are used whenever neither the command line, the environment nor the
//! configuration file provides a value.

use symql_vtab::DEFAULT_MAX_ROWS as ENGINE_MAX_ROWS;

/// Default listen address for the HTTP query server
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8080";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default maximum number of rows returned per query
pub const DEFAULT_MAX_ROWS: usize = ENGINE_MAX_ROWS;

/// Unavailable sources read as empty tables unless strict mode is on
pub const DEFAULT_STRICT_SOURCES: bool = false;

/// Queued queries still run when the dispatcher shuts down
pub const DEFAULT_DRAIN_ON_SHUTDOWN: bool = true;

/// Name of the configuration file searched for in default locations
pub const DEFAULT_CONFIG_FILE: &str = "symql.toml";
