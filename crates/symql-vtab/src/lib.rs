//! Streaming SQLite virtual tables over lazily generated records.
//!
//! This crate is the workspace member that owns the bundled SQLite build and
//! everything that talks to it, so the symbol tooling on top compiles without
//! touching C code.
//!
//! # Overview
//!
//! A data source becomes queryable in four steps:
//!
//! 1. Describe each record type as a [`TableDef`]: ordered columns with an
//!    extractor each, a row estimate, a full-scan factory and any number of
//!    equality filters with explicit cost and row estimates.
//! 2. Collect the definitions in a [`TableRegistry`].
//! 3. Open a [`QueryEngine`], which attaches every table to an in-memory
//!    connection as a read-only virtual table.
//! 4. Put the engine behind a [`QueryDispatcher`] so that any number of
//!    threads can run SQL while only one thread ever touches the source.
//!
//! During a query, SQLite's planner asks each table which constraints it can
//! push down. The cheapest matching filter wins ([`select_plan`]); otherwise
//! the table is scanned in full. Either way rows are pulled one at a time
//! from a [`Generator`], so `LIMIT` and early exits stop enumeration.
//!
//! # Modules
//!
//! - [`generator`] -- Single-pass record producers and adapters.
//! - [`schema`] -- Table definitions and the column binder.
//! - [`filter`] -- Equality filters and plan selection.
//! - [`bridge`] -- SQLite virtual table and cursor glue.
//! - [`registry`] -- Per-session table registry.
//! - [`engine`] -- Statement execution and result conversion.
//! - [`dispatcher`] -- Single-worker serialized execution.
//! - [`error`] -- Error types.

pub mod bridge;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod filter;
pub mod generator;
pub mod registry;
pub mod schema;

pub use bridge::SourcePolicy;
pub use dispatcher::{DispatcherConfig, DispatcherStats, PendingQuery, QueryDispatcher};
pub use engine::{
    is_terminated, split_statements, EngineConfig, QueryEngine, QueryResult, QueryResultRow,
    SqlExecutor, DEFAULT_MAX_ROWS,
};
pub use error::{DispatchError, ExtractError, Result, SourceError, SourceResult, VtabError};
pub use filter::{constraint_op, select_plan, ConstraintOp, FilterKey, FilterSpec, OfferedConstraint, ScanPlan};
pub use generator::{BoxGenerator, EmptyGenerator, FallibleGenerator, Generator, IterGenerator, KeyedGenerator};
pub use registry::{ColumnInfo, TableInfo, TableRegistry};
pub use schema::{ColumnType, TableBuilder, TableDef};
