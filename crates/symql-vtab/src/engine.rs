//! Query engine: one in-memory SQLite connection with every table attached.
//!
//! The engine turns a single SQL statement into a [`QueryResult`]. SQL-level
//! failures (syntax errors, unknown tables, a strict source that could not be
//! reached) come back as `success == false` results and never as `Err`, so a
//! caller always has something to show for a statement.

use std::time::Instant;

use base64::Engine as _;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bridge::SourcePolicy;
use crate::error::Result;
use crate::registry::{TableInfo, TableRegistry};

/// Maximum number of rows returned by a single query.
pub const DEFAULT_MAX_ROWS: usize = 10_000;

/// Engine settings fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Rows kept per result; further rows mark the result truncated.
    pub max_rows: usize,
    /// Behaviour of scans whose source cannot be opened.
    pub source_policy: SourcePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rows: DEFAULT_MAX_ROWS,
            source_policy: SourcePolicy::Empty,
        }
    }
}

/// Result of executing one SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    /// Column names in result order. Present even when no rows match.
    pub columns: Vec<String>,
    pub rows: Vec<QueryResultRow>,
    pub row_count: usize,
    /// Wall-clock execution time in milliseconds.
    pub execution_ms: u64,
    /// Set when rows beyond `max_rows` were dropped.
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single result row; `None` is SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResultRow {
    pub values: Vec<Option<String>>,
}

impl QueryResult {
    /// A failed statement carrying `error`.
    pub fn failure(error: impl Into<String>, execution_ms: u64) -> Self {
        Self {
            success: false,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            execution_ms,
            truncated: false,
            error: Some(error.into()),
        }
    }

    /// Cell at `row`, `column`, flattening NULL and out-of-range to `None`.
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.values.get(column))
            .and_then(|v| v.as_deref())
    }

    /// Index of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Something that can run one SQL statement at a time.
///
/// Implementations are owned by exactly one thread (the dispatcher worker),
/// so they need not be `Send`.
pub trait SqlExecutor {
    fn execute(&mut self, sql: &str) -> QueryResult;

    /// Tables this executor serves.
    fn tables(&self) -> Vec<TableInfo> {
        Vec::new()
    }
}

/// The SQLite-backed query engine.
pub struct QueryEngine {
    conn: Connection,
    registry: TableRegistry,
    config: EngineConfig,
}

impl QueryEngine {
    /// Open an in-memory connection and attach every registered table.
    pub fn open(registry: TableRegistry, config: EngineConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        registry.attach_all(&conn, config.source_policy)?;

        info!(
            tables = registry.len(),
            max_rows = config.max_rows,
            source_policy = ?config.source_policy,
            "Query engine initialized"
        );

        Ok(Self {
            conn,
            registry,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn list_tables(&self) -> Vec<TableInfo> {
        self.registry.tables()
    }

    /// Execute exactly one SQL statement.
    pub fn execute(&self, sql: &str) -> QueryResult {
        let start = Instant::now();
        let statements = split_statements(sql);
        let result = match statements.as_slice() {
            [] => QueryResult::failure("Empty query", 0),
            [single] => self.run_query(single, start),
            _ => QueryResult::failure(
                format!(
                    "Only one SQL statement per query is supported ({} given)",
                    statements.len()
                ),
                0,
            ),
        };

        debug!(
            success = result.success,
            rows = result.row_count,
            truncated = result.truncated,
            execution_ms = result.execution_ms,
            "Executed query"
        );
        result
    }

    // ── Private helpers ─────────────────────────────────────────────────

    fn run_query(&self, sql: &str, start: Instant) -> QueryResult {
        let elapsed = |start: Instant| start.elapsed().as_millis() as u64;

        let mut stmt = match self.conn.prepare(sql) {
            Ok(stmt) => stmt,
            Err(e) => return QueryResult::failure(sql_error_message(&e), elapsed(start)),
        };

        let column_count = stmt.column_count();
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut query = match stmt.query([]) {
            Ok(rows) => rows,
            Err(e) => return QueryResult::failure(sql_error_message(&e), elapsed(start)),
        };

        let max_rows = self.config.max_rows;
        let mut rows = Vec::new();
        let mut truncated = false;
        loop {
            let row = match query.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return QueryResult::failure(sql_error_message(&e), elapsed(start)),
            };
            if rows.len() >= max_rows {
                debug!(max_rows, "Query result truncated at max rows");
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(row.get_ref(i).ok().and_then(cell_to_string));
            }
            rows.push(QueryResultRow { values });
        }

        let row_count = rows.len();
        QueryResult {
            success: true,
            columns,
            rows,
            row_count,
            execution_ms: elapsed(start),
            truncated,
            error: None,
        }
    }
}

impl SqlExecutor for QueryEngine {
    fn execute(&mut self, sql: &str) -> QueryResult {
        QueryEngine::execute(self, sql)
    }

    fn tables(&self) -> Vec<TableInfo> {
        self.list_tables()
    }
}

fn cell_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(n) => Some(n.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(s) => Some(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Some(base64::engine::general_purpose::STANDARD.encode(b)),
    }
}

/// Human-readable message for a failed statement.
fn sql_error_message(e: &rusqlite::Error) -> String {
    match e {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.clone(),
        rusqlite::Error::ModuleError(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Split SQL text into its non-empty statements.
///
/// Semicolons inside string literals, quoted identifiers and comments do not
/// separate statements. Each returned slice excludes its terminating `;`.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut start = 0;
    for end in statement_ends(sql) {
        push_statement(&mut statements, &sql[start..end]);
        start = end + 1;
    }
    push_statement(&mut statements, &sql[start..]);
    statements
}

/// Whether `sql` ends with a statement terminator outside any literal or
/// comment, ignoring trailing whitespace.
pub fn is_terminated(sql: &str) -> bool {
    let trimmed = sql.trim_end();
    match statement_ends(trimmed).last() {
        Some(end) => end + 1 == trimmed.len(),
        None => false,
    }
}

fn push_statement<'a>(out: &mut Vec<&'a str>, text: &'a str) {
    let text = text.trim();
    if !text.is_empty() && !is_only_comments(text) {
        out.push(text);
    }
}

fn is_only_comments(text: &str) -> bool {
    let mut rest = text.trim_start();
    loop {
        if rest.is_empty() {
            return true;
        }
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.find('\n').map(|i| &after[i + 1..]).unwrap_or("").trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.find("*/").map(|i| &after[i + 2..]).unwrap_or("").trim_start();
        } else {
            return false;
        }
    }
}

/// Byte offsets of top-level `;` characters.
fn statement_ends(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut ends = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        // Doubled quote is an escaped quote.
                        if bytes.get(i + 1) == Some(&quote) {
                            i += 1;
                        } else {
                            break;
                        }
                    }
                    i += 1;
                }
            }
            b'[' => {
                while i < bytes.len() && bytes[i] != b']' {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 1;
            }
            b';' => ends.push(i),
            _ => {}
        }
        i += 1;
    }
    ends
}
