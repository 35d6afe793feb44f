//! Error types for the streaming virtual-table engine.
//!
//! Failures are split by who can observe them: [`SourceError`] and
//! [`ExtractError`] stay inside a scan (they become "no more rows" and NULL
//! cells respectively), [`VtabError`] covers setup and connection problems,
//! and [`DispatchError`] is what a dispatcher caller gets when a query could
//! not be run to completion.

/// Errors raised while building schemas or wiring tables into SQLite.
#[derive(Debug, thiserror::Error)]
pub enum VtabError {
    /// A table definition is malformed (bad identifier, duplicate column,
    /// filter on an unknown column, missing scan factory).
    #[error("Invalid schema for table '{table}': {detail}")]
    InvalidSchema {
        /// The table being defined.
        table: String,
        /// What is wrong with it.
        detail: String,
    },

    /// Two tables were registered under the same name.
    #[error("Table already registered: {0}")]
    DuplicateTable(String),

    /// An underlying SQLite call failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl VtabError {
    /// Create an `InvalidSchema` error for `table`.
    pub fn invalid_schema(table: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidSchema {
            table: table.into(),
            detail: detail.into(),
        }
    }
}

/// A record source could not start or continue a scan.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The backing resource could not be reached.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Enumeration started but broke part way through.
    #[error("enumeration failed: {0}")]
    Enumeration(String),
}

impl SourceError {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable(detail.into())
    }

    pub fn enumeration(detail: impl Into<String>) -> Self {
        Self::Enumeration(detail.into())
    }
}

/// A single column value could not be extracted from a record.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot extract column value: {0}")]
pub struct ExtractError(pub String);

impl ExtractError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self(detail.into())
    }
}

/// Errors delivered to callers of the query dispatcher.
///
/// SQL failures are *not* represented here: a bad statement produces a
/// `QueryResult` with `success == false`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The dispatcher is shutting down or already stopped.
    #[error("Query dispatcher is shut down")]
    ShutDown,

    /// The bounded job queue is full.
    #[error("Query queue is full ({depth} jobs pending)")]
    QueueFull {
        /// Queue depth at the time of rejection.
        depth: usize,
    },

    /// The worker dropped the job without answering.
    #[error("Query worker exited before answering")]
    WorkerGone,

    /// The executor panicked while running the statement.
    #[error("Internal error while executing query: {0}")]
    Internal(String),

    /// The worker failed to build its executor.
    #[error("Failed to initialise query worker: {0}")]
    Init(String),
}

impl DispatchError {
    /// Returns `true` if resubmitting the same query later could succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, DispatchError::QueueFull { .. })
    }
}

/// A specialised `Result` type for engine setup operations.
pub type Result<T> = std::result::Result<T, VtabError>;

/// Result of opening or advancing a record source.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_schema_message() {
        let err = VtabError::invalid_schema("items", "duplicate column 'id'");
        assert_eq!(
            err.to_string(),
            "Invalid schema for table 'items': duplicate column 'id'"
        );
    }

    #[test]
    fn test_queue_full_is_retriable() {
        assert!(DispatchError::QueueFull { depth: 4 }.is_retriable());
        assert!(!DispatchError::ShutDown.is_retriable());
        assert!(!DispatchError::Internal("boom".into()).is_retriable());
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::unavailable("symbol session closed");
        assert_eq!(err.to_string(), "source unavailable: symbol session closed");
    }
}
