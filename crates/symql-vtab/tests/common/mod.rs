//! Shared fixtures for symql-vtab integration tests
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use symql_vtab::{
    generator, BoxGenerator, EngineConfig, Generator, IterGenerator, QueryEngine, SourceError, SourcePolicy,
    TableDef, TableRegistry,
};

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: i64,
    pub name: String,
}

pub fn item(id: i64, name: &str) -> Item {
    Item {
        id,
        name: name.to_string(),
    }
}

/// `{1,"a"}, {2,"b"}, {3,"a"}`
pub fn items() -> Vec<Item> {
    vec![item(1, "a"), item(2, "b"), item(3, "a")]
}

/// `count` items named `n0`, `n1`, ... with ids from 1.
pub fn numbered_items(count: i64) -> Vec<Item> {
    (1..=count).map(|i| item(i, &format!("n{}", i % 7))).collect()
}

// ============================================================================
// Instrumented generator
// ============================================================================

/// Counts successful and unsuccessful `advance` calls.
pub struct CountingGenerator {
    inner: IterGenerator<Item, std::vec::IntoIter<Item>>,
    advances: Arc<AtomicUsize>,
}

impl CountingGenerator {
    pub fn new(records: Vec<Item>, advances: Arc<AtomicUsize>) -> Self {
        Self {
            inner: IterGenerator::new(records.into_iter()),
            advances,
        }
    }
}

impl Generator<Item> for CountingGenerator {
    fn advance(&mut self) -> bool {
        self.advances.fetch_add(1, Ordering::SeqCst);
        self.inner.advance()
    }

    fn current(&self) -> Option<&Item> {
        self.inner.current()
    }

    fn rowid(&self) -> i64 {
        self.inner.rowid()
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Matching records paired with their full-scan rowid.
fn positions(records: &[Item], matches: impl Fn(&Item) -> bool) -> std::vec::IntoIter<(i64, Item)> {
    let hits: Vec<(i64, Item)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| matches(r))
        .map(|(pos, r)| (pos as i64, r.clone()))
        .collect();
    hits.into_iter()
}

/// The `items` table with filters on `id` (cost 1) and `name` (cost 5).
///
/// `advances` counts generator advances across every scan of the table.
pub fn items_table(records: Vec<Item>, advances: Arc<AtomicUsize>) -> TableDef<Item> {
    let records = Arc::new(records);
    let scan_records = Arc::clone(&records);
    let scan_advances = Arc::clone(&advances);
    let by_id = Arc::clone(&records);
    let by_name = Arc::clone(&records);
    let estimate = records.len() as u64;

    TableDef::builder("items")
        .estimate_rows(move || estimate)
        .scan(move || {
            let gen: BoxGenerator<Item> = Box::new(CountingGenerator::new(
                scan_records.to_vec(),
                Arc::clone(&scan_advances),
            ));
            Ok(gen)
        })
        .column_int("id", |r: &Item| r.id)
        .column_text("name", |r: &Item| r.name.clone())
        .filter_eq_int("id", 1.0, 1.0, move |id| Ok(generator::keyed(positions(&by_id, |r| r.id == id))))
        .filter_eq_text("name", 5.0, 10.0, move |name| {
            Ok(generator::keyed(positions(&by_name, |r| r.name == name)))
        })
        .build()
        .unwrap()
}

/// A table whose source can never be opened.
pub fn unavailable_table() -> TableDef<Item> {
    TableDef::builder("offline")
        .estimate_rows(|| 10)
        .scan(|| Err(SourceError::unavailable("session closed")))
        .column_int("id", |r: &Item| r.id)
        .build()
        .unwrap()
}

pub fn engine_with(tables: Vec<TableDef<Item>>, policy: SourcePolicy) -> QueryEngine {
    let mut registry = TableRegistry::new();
    for table in tables {
        registry.register(table).unwrap();
    }
    QueryEngine::open(
        registry,
        EngineConfig {
            source_policy: policy,
            ..EngineConfig::default()
        },
    )
    .unwrap()
}

/// Engine over `items()` with the default source policy.
pub fn items_engine() -> QueryEngine {
    engine_with(
        vec![items_table(items(), Arc::new(AtomicUsize::new(0)))],
        SourcePolicy::Empty,
    )
}

// ============================================================================
// Assertions
// ============================================================================

/// Column `column` of every row, NULL as `None`.
pub fn column_values(result: &symql_vtab::QueryResult, column: usize) -> Vec<Option<String>> {
    result.rows.iter().map(|r| r.values[column].clone()).collect()
}
