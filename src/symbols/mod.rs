//! Debug-symbol data source.
//!
//! A [`SymbolStore`] holds one snapshot in memory; [`tables`] exposes it as
//! SQL tables with id and name lookups pushed down to the store's indexes.

pub mod model;
pub mod store;
pub mod tables;

pub use model::{SymTag, Snapshot};
pub use store::{Collection, StoreRows, SymbolStore};
pub use tables::build_registry;

use std::sync::Arc;

use symql_vtab::{DispatcherConfig, EngineConfig, QueryDispatcher, QueryEngine};

use crate::error::Result;

/// Open a query engine over every symbol table of `store`.
pub fn open_engine(store: Arc<SymbolStore>, config: EngineConfig) -> Result<QueryEngine> {
    let registry = build_registry(store)?;
    Ok(QueryEngine::open(registry, config)?)
}

/// Start a dispatcher whose worker owns an engine over `store`.
pub fn start_dispatcher(
    store: Arc<SymbolStore>,
    engine: EngineConfig,
    dispatcher: DispatcherConfig,
) -> Result<QueryDispatcher> {
    let dispatcher = QueryDispatcher::start(dispatcher, move || open_engine(store, engine))?;
    Ok(dispatcher)
}
