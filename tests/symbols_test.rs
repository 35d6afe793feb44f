//! Integration tests for the symbol tables
//!
//! SQL runs against a sample snapshot through the real engine, covering
//! pushed-down lookups, scans, joins between tables and snapshots that lack
//! optional collections.

mod common;

use std::collections::BTreeSet;

use common::*;
use symql::symbols::{SymTag, SymbolStore};
use symql_vtab::SourcePolicy;

// ── Store loading ───────────────────────────────────────────────────────

#[test]
fn test_load_snapshot_from_file() {
    let (_dir, path) = write_snapshot(SAMPLE_SNAPSHOT);
    let store = SymbolStore::load(&path).unwrap();
    assert_eq!(store.path(), Some(path.as_path()));
    assert_eq!(store.count(SymTag::Function), 3);
    assert_eq!(store.count(SymTag::Udt), 2);

    let summary = store.summary();
    assert!(summary.contains(&("Functions", 3)));
    assert!(summary.contains(&("Public Symbols", 1)));
    assert!(summary.contains(&("Compilands", 2)));
}

#[test]
fn test_invalid_snapshot_is_an_error() {
    let (_dir, path) = write_snapshot(r#"{"symbols": [{"id": "one"}]}"#);
    let err = SymbolStore::load(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse snapshot"));
}

// ── Symbol tables ───────────────────────────────────────────────────────

#[test]
fn test_function_lookup_by_name() {
    let engine = sample_engine();
    let result = engine.execute("SELECT id, rva FROM functions WHERE name = 'helper'");
    assert_eq!(strings(&result, "id"), vec!["2", "3"]);
    assert_eq!(strings(&result, "rva"), vec!["4160", "4176"]);
}

#[test]
fn test_name_and_id_lookups_match_full_scans() {
    let engine = sample_engine();
    for table in ["functions", "publics", "data", "udts", "enums", "typedefs", "thunks", "labels"] {
        for name in ["main", "helper", "Point", "Color", "missing"] {
            let pushed = engine.execute(&format!("SELECT id FROM {table} WHERE name = '{name}'"));
            let scanned = engine.execute(&format!("SELECT id FROM {table} WHERE +name = '{name}'"));
            assert_eq!(
                column(&pushed, "id"),
                column(&scanned, "id"),
                "{table} name = {name}"
            );
        }
        for id in [1i64, 6, 11, 0, -1, 4_294_967_296] {
            let pushed = engine.execute(&format!("SELECT name FROM {table} WHERE id = {id}"));
            let scanned = engine.execute(&format!("SELECT name FROM {table} WHERE +id = {id}"));
            assert_eq!(
                column(&pushed, "name"),
                column(&scanned, "name"),
                "{table} id = {id}"
            );
        }
    }
}

#[test]
fn test_id_lookup_only_matches_its_own_kind() {
    let engine = sample_engine();
    assert_eq!(scalar(&engine, "SELECT COUNT(*) FROM udts WHERE id = 1"), Some("0".into()));
    assert_eq!(scalar(&engine, "SELECT name FROM udts WHERE id = 6"), Some("Point".into()));
}

#[test]
fn test_out_of_range_ids_are_empty() {
    let engine = sample_engine();
    for id in ["0", "-5", "4294967296", "'abc'", "NULL", "1.5"] {
        let result = engine.execute(&format!("SELECT * FROM functions WHERE id = {id}"));
        assert!(result.success, "id = {id}: {:?}", result.error);
        assert_eq!(result.row_count, 0, "id = {id}");
    }
    assert_eq!(
        scalar(&engine, "SELECT name FROM functions WHERE id = '1'"),
        Some("main".into())
    );
}

#[test]
fn test_or_over_two_lookups_matches_full_scan() {
    let engine = sample_engine();
    let pushed = engine.execute("SELECT id FROM functions WHERE name = 'helper' OR id = 1 ORDER BY id");
    let scanned = engine.execute("SELECT id FROM functions WHERE +name = 'helper' OR +id = 1 ORDER BY id");
    assert_eq!(strings(&pushed, "id"), vec!["1", "2", "3"]);
    assert_eq!(column(&pushed, "id"), column(&scanned, "id"));

    let pushed = engine.execute("SELECT name FROM udt_members WHERE udt_id = 7 OR udt_name = 'Point' ORDER BY name");
    let scanned = engine.execute("SELECT name FROM udt_members WHERE +udt_id = 7 OR +udt_name = 'Point' ORDER BY name");
    assert_eq!(strings(&pushed, "name"), vec!["x", "y", "z"]);
    assert_eq!(column(&pushed, "name"), column(&scanned, "name"));
}

#[test]
fn test_case_insensitive_name_match_scans() {
    let engine = sample_engine();
    let result = engine.execute("SELECT id FROM functions WHERE name = 'MAIN' COLLATE NOCASE");
    assert_eq!(strings(&result, "id"), vec!["1"]);
}

#[test]
fn test_duplicate_symbol_ids_match_full_scan() {
    let engine = engine_for(
        r#"{"symbols": [
            {"id": 5, "tag": "function", "name": "f"},
            {"id": 5, "tag": "udt", "name": "U"},
            {"id": 5, "tag": "function", "name": "g"}
        ]}"#,
        SourcePolicy::Empty,
    );
    for table in ["functions", "udts"] {
        let pushed = engine.execute(&format!("SELECT name FROM {table} WHERE id = 5"));
        let scanned = engine.execute(&format!("SELECT name FROM {table} WHERE +id = 5"));
        assert_eq!(column(&pushed, "name"), column(&scanned, "name"), "{table}");
    }
    let result = engine.execute("SELECT name FROM functions WHERE id = 5");
    assert_eq!(strings(&result, "name"), vec!["f", "g"]);
}

#[test]
fn test_symbol_table_columns() {
    let engine = sample_engine();
    let result = engine.execute("SELECT * FROM functions WHERE id = 1");
    assert_eq!(
        result.columns,
        vec!["id", "name", "undecorated", "rva", "length", "section", "offset"]
    );
    assert_eq!(result.value(0, 2), Some("int main(int, char **)"));

    let result = engine.execute("SELECT * FROM functions WHERE id = 2");
    assert_eq!(result.value(0, 2), None);

    let result = engine.execute("SELECT * FROM udts");
    assert_eq!(result.columns, vec!["id", "name", "length"]);
    let result = engine.execute("SELECT * FROM labels");
    assert_eq!(result.columns, vec!["id", "name", "rva", "section", "offset"]);
    let result = engine.execute("SELECT * FROM thunks");
    assert_eq!(result.columns, vec!["id", "name", "rva", "length", "section"]);
}

#[test]
fn test_limit_on_symbol_scan() {
    let engine = sample_engine();
    let result = engine.execute("SELECT name FROM functions LIMIT 1");
    assert_eq!(strings(&result, "name"), vec!["main"]);
}

// ── Related tables ──────────────────────────────────────────────────────

#[test]
fn test_udt_members_by_id_and_name() {
    let engine = sample_engine();
    let by_id = engine.execute("SELECT name FROM udt_members WHERE udt_id = 6");
    let by_name = engine.execute("SELECT name FROM udt_members WHERE udt_name = 'Point'");
    assert_eq!(strings(&by_id, "name"), vec!["x", "y"]);
    assert_eq!(column(&by_id, "name"), column(&by_name, "name"));
}

#[test]
fn test_join_udts_to_members() {
    let engine = sample_engine();
    let result = engine.execute(
        "SELECT u.name AS udt, m.name AS member, m.offset \
         FROM udts u JOIN udt_members m ON m.udt_id = u.id \
         ORDER BY u.id, m.offset",
    );
    assert_eq!(strings(&result, "udt"), vec!["Point", "Point", "Point3"]);
    assert_eq!(strings(&result, "member"), vec!["x", "y", "z"]);
}

#[test]
fn test_inherited_layout_via_base_classes() {
    let engine = sample_engine();
    let result = engine.execute(
        "SELECT m.name FROM base_classes b \
         JOIN udt_members m ON m.udt_id = b.base_id \
         WHERE b.derived_id = 7 \
         UNION ALL \
         SELECT name FROM udt_members WHERE udt_id = 7",
    );
    let names: BTreeSet<String> = strings(&result, "name").into_iter().collect();
    let expected: BTreeSet<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
    assert_eq!(names, expected);
}

#[test]
fn test_enum_values() {
    let engine = sample_engine();
    let result = engine.execute("SELECT name, value FROM enum_values WHERE enum_name = 'Color' ORDER BY value");
    assert_eq!(strings(&result, "name"), vec!["Blue", "Red", "Green"]);
    assert_eq!(
        scalar(&engine, "SELECT COUNT(*) FROM enum_values WHERE enum_id = 8"),
        Some("3".into())
    );
}

#[test]
fn test_locals_and_parameters_are_split() {
    let engine = sample_engine();
    let params = engine.execute("SELECT name FROM parameters WHERE func_id = 1");
    assert_eq!(strings(&params, "name"), vec!["argc", "argv"]);
    let locals = engine.execute("SELECT name, type FROM locals WHERE func_id = 1");
    assert_eq!(strings(&locals, "name"), vec!["i"]);
    assert_eq!(strings(&locals, "type"), vec!["int"]);
    assert_eq!(scalar(&engine, "SELECT COUNT(*) FROM parameters"), Some("3".into()));
}

#[test]
fn test_function_parameters_join() {
    let engine = sample_engine();
    let result = engine.execute(
        "SELECT f.name AS func, p.name AS param FROM functions f \
         JOIN parameters p ON p.func_id = f.id WHERE f.name = 'helper'",
    );
    assert_eq!(strings(&result, "param"), vec!["value"]);
}

#[test]
fn test_lines_for_compiland() {
    let engine = sample_engine();
    let result = engine.execute(
        "SELECT l.line, s.filename FROM compilands c \
         JOIN line_numbers l ON l.compiland_id = c.id \
         JOIN source_files s ON s.id = l.file_id \
         WHERE c.name = 'main.obj' ORDER BY l.rva",
    );
    assert_eq!(strings(&result, "line"), vec!["1", "2"]);
    assert_eq!(strings(&result, "filename"), vec!["src/main.c", "src/main.c"]);
}

#[test]
fn test_function_containing_address() {
    let engine = sample_engine();
    let name = scalar(
        &engine,
        "SELECT name FROM functions WHERE 4170 >= rva AND 4170 < rva + length",
    );
    assert_eq!(name, Some("helper".into()));
}

#[test]
fn test_section_flags() {
    let engine = sample_engine();
    let result = engine.execute("SELECT number, readable, writable, executable, code FROM sections ORDER BY number");
    assert_eq!(result.rows[0].values, vec![
        Some("1".into()),
        Some("1".into()),
        Some("0".into()),
        Some("1".into()),
        Some("1".into()),
    ]);
    assert_eq!(result.rows[1].values, vec![
        Some("3".into()),
        Some("1".into()),
        Some("1".into()),
        Some("0".into()),
        Some("0".into()),
    ]);
}

// ── Missing collections ─────────────────────────────────────────────────

#[test]
fn test_missing_collection_reads_as_empty() {
    let engine = engine_for(SYMBOLS_ONLY_SNAPSHOT, SourcePolicy::Empty);
    assert_eq!(scalar(&engine, "SELECT COUNT(*) FROM line_numbers"), Some("0".into()));
    assert_eq!(
        scalar(&engine, "SELECT COUNT(*) FROM udt_members WHERE udt_id = 1"),
        Some("0".into())
    );
    assert_eq!(scalar(&engine, "SELECT COUNT(*) FROM functions"), Some("1".into()));
}

#[test]
fn test_missing_collection_fails_in_strict_mode() {
    let engine = engine_for(SYMBOLS_ONLY_SNAPSHOT, SourcePolicy::Error);
    let result = engine.execute("SELECT * FROM line_numbers");
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("line_numbers"), "unexpected error: {error}");

    let result = engine.execute("SELECT * FROM functions");
    assert!(result.success);
}

#[test]
fn test_empty_snapshot_collections_are_available() {
    let engine = engine_for(r#"{"symbols": [], "sections": []}"#, SourcePolicy::Error);
    assert_eq!(scalar(&engine, "SELECT COUNT(*) FROM sections"), Some("0".into()));
}

// ── Table listing ───────────────────────────────────────────────────────

#[test]
fn test_list_tables() {
    let engine = sample_engine();
    let tables = engine.list_tables();
    assert_eq!(tables.len(), 17);

    let functions = tables.iter().find(|t| t.name == "functions").unwrap();
    assert_eq!(functions.estimated_rows, 3);
    assert_eq!(functions.filtered_columns, vec!["id", "name"]);

    let lines = tables.iter().find(|t| t.name == "line_numbers").unwrap();
    assert_eq!(lines.filtered_columns, vec!["compiland_id"]);
    assert_eq!(lines.estimated_rows, 3);
}

// ── Dispatcher over the symbol engine ───────────────────────────────────

#[test]
fn test_dispatcher_serves_symbol_queries() {
    let dispatcher = sample_dispatcher();
    assert_eq!(dispatcher.tables().len(), 17);

    let result = dispatcher.execute("SELECT name FROM functions WHERE id = 1").unwrap();
    assert_eq!(result.value(0, 0), Some("main"));

    let bad = dispatcher.execute("SELECT * FROM nope").unwrap();
    assert!(!bad.success);
    let again = dispatcher.execute("SELECT COUNT(*) FROM udts").unwrap();
    assert_eq!(again.value(0, 0), Some("2"));
}
