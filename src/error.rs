//! Error types for symql
//!
//! Engine-level failures come from `symql_vtab` and are wrapped here so the
//! binary deals with a single error type.

use thiserror::Error;

use symql_vtab::{DispatchError, VtabError};

/// Result type alias for symql operations
pub type Result<T> = std::result::Result<T, SymqlError>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum SymqlError {
    /// Filesystem or socket I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// A symbol snapshot could not be loaded
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Table setup or connection failure
    #[error(transparent)]
    Engine(#[from] VtabError),

    /// The query dispatcher refused or lost a query
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The HTTP server failed
    #[error("Server error: {0}")]
    Server(String),
}

impl SymqlError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }

    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }
}

impl From<serde_json::Error> for SymqlError {
    fn from(e: serde_json::Error) -> Self {
        Self::Snapshot(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_error_is_transparent() {
        let err: SymqlError = DispatchError::ShutDown.into();
        assert_eq!(err.to_string(), "Query dispatcher is shut down");
    }

    #[test]
    fn test_snapshot_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: SymqlError = json_err.into();
        assert!(matches!(err, SymqlError::Snapshot(_)));
    }
}
