#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # symql
//!
//! SQL over debug-symbol snapshots.
//!
//! A snapshot (JSON, see [`symbols::model`]) is loaded into a
//! [`SymbolStore`](symbols::SymbolStore) and exposed as read-only SQLite
//! virtual tables through `symql_vtab`: `functions`, `publics`, `data`,
//! `udts`, `enums`, `typedefs`, `thunks`, `labels`, `compilands`,
//! `source_files`, `line_numbers`, `sections`, `udt_members`, `enum_values`,
//! `base_classes`, `locals` and `parameters`.
//!
//! ## Quick Start
//!
//! ```bash
//! # Symbol counts
//! $ symql app.json
//!
//! # One query
//! $ symql app.json "SELECT name, rva FROM functions WHERE name = 'main'"
//!
//! # Interactive shell
//! $ symql app.json -i
//!
//! # HTTP server
//! $ symql app.json --http 127.0.0.1:8080
//! ```
//!
//! Equality lookups on id and name columns are pushed down to the store's
//! indexes; everything else is a streaming scan that stops as soon as SQLite
//! has what it needs.

pub mod cli_format;
pub mod cli_shell;
pub mod config;
pub mod error;
pub mod server;
pub mod symbols;

pub use error::{Result, SymqlError};
