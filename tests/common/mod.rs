//! Shared test fixtures for symql integration tests
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use symql::symbols::{open_engine, start_dispatcher, SymbolStore};
use symql_vtab::{DispatcherConfig, EngineConfig, QueryDispatcher, QueryEngine, QueryResult, SourcePolicy};
use tempfile::TempDir;

// ============================================================================
// Snapshot Fixtures
// ============================================================================

/// A small program: two compilands, a handful of functions, one class
/// hierarchy and an enum.
pub const SAMPLE_SNAPSHOT: &str = r#"{
    "symbols": [
        {"id": 1, "tag": "function", "name": "main", "undecorated": "int main(int, char **)", "rva": 4096, "length": 64, "section": 1, "offset": 0},
        {"id": 2, "tag": "function", "name": "helper", "rva": 4160, "length": 16, "section": 1, "offset": 64},
        {"id": 3, "tag": "function", "name": "helper", "rva": 4176, "length": 16, "section": 1, "offset": 80},
        {"id": 4, "tag": "public", "name": "_main", "rva": 4096, "length": 0, "section": 1, "offset": 0},
        {"id": 5, "tag": "data", "name": "g_counter", "rva": 12288, "length": 4, "section": 3, "offset": 0},
        {"id": 6, "tag": "udt", "name": "Point", "length": 8},
        {"id": 7, "tag": "udt", "name": "Point3", "length": 12},
        {"id": 8, "tag": "enum", "name": "Color", "length": 4},
        {"id": 9, "tag": "typedef", "name": "PointAlias"},
        {"id": 10, "tag": "thunk", "name": "thunk_helper", "rva": 4192, "length": 5, "section": 1},
        {"id": 11, "tag": "label", "name": "$LN1", "rva": 4104, "section": 1, "offset": 8}
    ],
    "compilands": [
        {"id": 100, "name": "main.obj", "library": "app.lib", "language": 1},
        {"id": 101, "name": "helper.obj", "library": "app.lib", "language": 1}
    ],
    "source_files": [
        {"id": 200, "filename": "src/main.c", "checksum_type": 1},
        {"id": 201, "filename": "src/helper.c", "checksum_type": 1}
    ],
    "line_numbers": [
        {"file_id": 200, "line": 1, "column": 1, "rva": 4096, "length": 4, "compiland_id": 100},
        {"file_id": 200, "line": 2, "column": 5, "rva": 4100, "length": 8, "compiland_id": 100},
        {"file_id": 201, "line": 10, "column": 1, "rva": 4160, "length": 16, "compiland_id": 101}
    ],
    "sections": [
        {"number": 1, "rva": 4096, "length": 512, "characteristics": 1610612768},
        {"number": 3, "rva": 12288, "length": 256, "characteristics": 3221225536}
    ],
    "udt_members": [
        {"udt_id": 6, "udt_name": "Point", "id": 20, "name": "x", "type": "int", "offset": 0, "length": 4, "access": 3},
        {"udt_id": 6, "udt_name": "Point", "id": 21, "name": "y", "type": "int", "offset": 4, "length": 4, "access": 3},
        {"udt_id": 7, "udt_name": "Point3", "id": 22, "name": "z", "type": "int", "offset": 8, "length": 4, "access": 3}
    ],
    "enum_values": [
        {"enum_id": 8, "enum_name": "Color", "id": 30, "name": "Red", "value": 0},
        {"enum_id": 8, "enum_name": "Color", "id": 31, "name": "Green", "value": 1},
        {"enum_id": 8, "enum_name": "Color", "id": 32, "name": "Blue", "value": -1}
    ],
    "base_classes": [
        {"derived_id": 7, "derived_name": "Point3", "base_id": 6, "base_name": "Point", "offset": 0, "is_virtual": false, "access": 3}
    ],
    "variables": [
        {"func_id": 1, "func_name": "main", "id": 40, "name": "argc", "kind": "param", "type": "int", "location_type": 2, "offset_or_register": 8},
        {"func_id": 1, "func_name": "main", "id": 41, "name": "argv", "kind": "param", "type": "char **", "location_type": 2, "offset_or_register": 16},
        {"func_id": 1, "func_name": "main", "id": 42, "name": "i", "kind": "local", "type": "int", "location_type": 2, "offset_or_register": -4},
        {"func_id": 2, "func_name": "helper", "id": 43, "name": "value", "kind": "param", "type": "int", "location_type": 3, "offset_or_register": 1}
    ]
}"#;

/// Only global symbols; every other collection is missing.
pub const SYMBOLS_ONLY_SNAPSHOT: &str = r#"{
    "symbols": [
        {"id": 1, "tag": "function", "name": "main", "rva": 4096, "length": 64}
    ]
}"#;

pub fn sample_store() -> Arc<SymbolStore> {
    Arc::new(SymbolStore::from_json(SAMPLE_SNAPSHOT).unwrap())
}

/// Write `json` to a snapshot file in a fresh temporary directory.
pub fn write_snapshot(json: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, json).unwrap();
    (dir, path)
}

// ============================================================================
// Engine Fixtures
// ============================================================================

pub fn engine_for(json: &str, policy: SourcePolicy) -> QueryEngine {
    let store = Arc::new(SymbolStore::from_json(json).unwrap());
    open_engine(
        store,
        EngineConfig {
            source_policy: policy,
            ..EngineConfig::default()
        },
    )
    .unwrap()
}

pub fn sample_engine() -> QueryEngine {
    engine_for(SAMPLE_SNAPSHOT, SourcePolicy::Empty)
}

pub fn sample_dispatcher() -> QueryDispatcher {
    start_dispatcher(sample_store(), EngineConfig::default(), DispatcherConfig::default()).unwrap()
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Values of column `name`, in row order.
pub fn column(result: &QueryResult, name: &str) -> Vec<Option<String>> {
    assert!(result.success, "query failed: {:?}", result.error);
    let idx = result
        .column_index(name)
        .unwrap_or_else(|| panic!("no column {name} in {:?}", result.columns));
    result.rows.iter().map(|r| r.values[idx].clone()).collect()
}

/// Non-null values of column `name` as strings.
pub fn strings(result: &QueryResult, name: &str) -> Vec<String> {
    column(result, name).into_iter().flatten().collect()
}

/// Run `sql` and return the single cell of its single row.
pub fn scalar(engine: &QueryEngine, sql: &str) -> Option<String> {
    let result = engine.execute(sql);
    assert!(result.success, "query failed: {:?}", result.error);
    assert_eq!(result.row_count, 1, "expected one row from {sql}");
    result.rows[0].values[0].clone()
}
