//! SQL table definitions over a [`SymbolStore`].

use std::sync::Arc;

use symql_vtab::{generator, BoxGenerator, SourceResult, TableDef, TableRegistry};

use super::model::*;
use super::store::{Collection, SymbolStore};
use crate::error::Result;

/// Point lookup by record id.
const ID_COST: f64 = 1.0;
const ID_ROWS: f64 = 1.0;
/// Exact-name lookup; names are not unique.
const NAME_COST: f64 = 5.0;
const NAME_ROWS: f64 = 10.0;
/// Children of one parent record (members, values, bases, variables).
const CHILD_COST: f64 = 10.0;
const CHILD_ROWS: f64 = 100.0;
/// Line numbers of one compiland.
const LINES_COST: f64 = 50.0;
const LINES_ROWS: f64 = 1000.0;

/// Record ids are positive 32-bit values; anything else matches nothing.
fn record_key(id: i64) -> Option<u32> {
    u32::try_from(id).ok().filter(|&id| id != 0)
}

fn keyed<T, F>(id: i64, open: F) -> SourceResult<BoxGenerator<T>>
where
    T: 'static,
    F: FnOnce(u32) -> SourceResult<BoxGenerator<T>>,
{
    match record_key(id) {
        Some(key) => open(key),
        None => Ok(generator::empty()),
    }
}

fn estimate(store: &Arc<SymbolStore>, collection: Collection) -> impl Fn() -> u64 + Send + Sync {
    let store = Arc::clone(store);
    move || store.len(collection).unwrap_or(0) as u64
}

/// Columns carried by each symbol kind, after `id` and `name`.
struct SymbolColumns {
    undecorated: bool,
    rva: bool,
    length: bool,
    section: bool,
    offset: bool,
}

impl SymbolColumns {
    fn of(tag: SymTag) -> Self {
        let (undecorated, rva, length, section, offset) = match tag {
            SymTag::Function | SymTag::Public => (true, true, true, true, true),
            SymTag::Data => (false, true, true, true, true),
            SymTag::Udt | SymTag::Enum | SymTag::Typedef => (false, false, true, false, false),
            SymTag::Thunk => (false, true, true, true, false),
            SymTag::Label => (false, true, false, true, true),
        };
        Self {
            undecorated,
            rva,
            length,
            section,
            offset,
        }
    }
}

fn symbol_table(store: &Arc<SymbolStore>, tag: SymTag) -> Result<TableDef<Symbol>> {
    let cols = SymbolColumns::of(tag);
    let count_store = Arc::clone(store);
    let scan_store = Arc::clone(store);
    let id_store = Arc::clone(store);
    let name_store = Arc::clone(store);

    let mut builder = TableDef::builder(tag.table_name())
        .estimate_rows(move || count_store.count(tag) as u64)
        .scan(move || Ok(generator::keyed(scan_store.scan_symbols(tag))))
        .column_int("id", |s: &Symbol| i64::from(s.id))
        .column_text("name", |s: &Symbol| s.name.clone());
    if cols.undecorated {
        builder = builder.column_opt_text("undecorated", |s: &Symbol| s.undecorated.clone());
    }
    if cols.rva {
        builder = builder.column_int("rva", |s: &Symbol| i64::from(s.rva));
    }
    if cols.length {
        builder = builder.column_int("length", |s: &Symbol| s.length as i64);
    }
    if cols.section {
        builder = builder.column_int("section", |s: &Symbol| i64::from(s.section));
    }
    if cols.offset {
        builder = builder.column_int("offset", |s: &Symbol| i64::from(s.offset));
    }

    let def = builder
        .filter_eq_int("id", ID_COST, ID_ROWS, move |id| {
            keyed(id, |key| Ok(generator::keyed(id_store.symbol_by_id(key, tag))))
        })
        .filter_eq_text("name", NAME_COST, NAME_ROWS, move |name| {
            Ok(generator::keyed(name_store.symbols_by_name(tag, name)))
        })
        .build()?;
    Ok(def)
}

fn compilands_table(store: &Arc<SymbolStore>) -> Result<TableDef<Compiland>> {
    let scan_store = Arc::clone(store);
    let id_store = Arc::clone(store);
    let name_store = Arc::clone(store);
    let def = TableDef::builder("compilands")
        .estimate_rows(estimate(store, Collection::Compilands))
        .scan(move || scan_store.scan_compilands().map(generator::keyed))
        .column_int("id", |c: &Compiland| i64::from(c.id))
        .column_text("name", |c: &Compiland| c.name.clone())
        .column_text("library", |c: &Compiland| c.library.clone())
        .column_int("language", |c: &Compiland| i64::from(c.language))
        .filter_eq_int("id", ID_COST, ID_ROWS, move |id| {
            keyed(id, |key| id_store.compiland_by_id(key).map(generator::keyed))
        })
        .filter_eq_text("name", NAME_COST, NAME_ROWS, move |name| {
            name_store.compilands_by_name(name).map(generator::keyed)
        })
        .build()?;
    Ok(def)
}

fn source_files_table(store: &Arc<SymbolStore>) -> Result<TableDef<SourceFile>> {
    let scan_store = Arc::clone(store);
    let id_store = Arc::clone(store);
    let def = TableDef::builder("source_files")
        .estimate_rows(estimate(store, Collection::SourceFiles))
        .scan(move || scan_store.scan_source_files().map(generator::keyed))
        .column_int("id", |f: &SourceFile| i64::from(f.id))
        .column_text("filename", |f: &SourceFile| f.filename.clone())
        .column_int("checksum_type", |f: &SourceFile| i64::from(f.checksum_type))
        .filter_eq_int("id", ID_COST, ID_ROWS, move |id| {
            keyed(id, |key| id_store.source_file_by_id(key).map(generator::keyed))
        })
        .build()?;
    Ok(def)
}

fn line_numbers_table(store: &Arc<SymbolStore>) -> Result<TableDef<LineNumber>> {
    let scan_store = Arc::clone(store);
    let lookup_store = Arc::clone(store);
    let def = TableDef::builder("line_numbers")
        .estimate_rows(estimate(store, Collection::LineNumbers))
        .scan(move || scan_store.scan_line_numbers().map(generator::keyed))
        .column_int("file_id", |l: &LineNumber| i64::from(l.file_id))
        .column_int("line", |l: &LineNumber| i64::from(l.line))
        .column_int("column", |l: &LineNumber| i64::from(l.column))
        .column_int("rva", |l: &LineNumber| i64::from(l.rva))
        .column_int("length", |l: &LineNumber| i64::from(l.length))
        .column_int("compiland_id", |l: &LineNumber| i64::from(l.compiland_id))
        .filter_eq_int("compiland_id", LINES_COST, LINES_ROWS, move |id| {
            keyed(id, |key| lookup_store.lines_by_compiland(key).map(generator::keyed))
        })
        .build()?;
    Ok(def)
}

fn sections_table(store: &Arc<SymbolStore>) -> Result<TableDef<Section>> {
    let scan_store = Arc::clone(store);
    let def = TableDef::builder("sections")
        .estimate_rows(estimate(store, Collection::Sections))
        .scan(move || scan_store.scan_sections().map(generator::keyed))
        .column_int("number", |s: &Section| i64::from(s.number))
        .column_int("rva", |s: &Section| i64::from(s.rva))
        .column_int("length", |s: &Section| i64::from(s.length))
        .column_int("characteristics", |s: &Section| i64::from(s.characteristics))
        .column_bool("readable", Section::readable)
        .column_bool("writable", Section::writable)
        .column_bool("executable", Section::executable)
        .column_bool("code", Section::code)
        .build()?;
    Ok(def)
}

fn udt_members_table(store: &Arc<SymbolStore>) -> Result<TableDef<UdtMember>> {
    let scan_store = Arc::clone(store);
    let id_store = Arc::clone(store);
    let name_store = Arc::clone(store);
    let def = TableDef::builder("udt_members")
        .estimate_rows(estimate(store, Collection::UdtMembers))
        .scan(move || scan_store.scan_udt_members().map(generator::keyed))
        .column_int("udt_id", |m: &UdtMember| i64::from(m.udt_id))
        .column_text("udt_name", |m: &UdtMember| m.udt_name.clone())
        .column_int("id", |m: &UdtMember| i64::from(m.id))
        .column_text("name", |m: &UdtMember| m.name.clone())
        .column_text("type", |m: &UdtMember| m.type_name.clone())
        .column_int("offset", |m: &UdtMember| i64::from(m.offset))
        .column_int("length", |m: &UdtMember| m.length as i64)
        .column_int("access", |m: &UdtMember| i64::from(m.access))
        .column_bool("is_static", |m: &UdtMember| m.is_static)
        .column_bool("is_virtual", |m: &UdtMember| m.is_virtual)
        .filter_eq_int("udt_id", CHILD_COST, CHILD_ROWS, move |id| {
            keyed(id, |key| id_store.members_by_udt_id(key).map(generator::keyed))
        })
        .filter_eq_text("udt_name", CHILD_COST, CHILD_ROWS, move |name| {
            name_store.members_by_udt_name(name).map(generator::keyed)
        })
        .build()?;
    Ok(def)
}

fn enum_values_table(store: &Arc<SymbolStore>) -> Result<TableDef<EnumValue>> {
    let scan_store = Arc::clone(store);
    let id_store = Arc::clone(store);
    let name_store = Arc::clone(store);
    let def = TableDef::builder("enum_values")
        .estimate_rows(estimate(store, Collection::EnumValues))
        .scan(move || scan_store.scan_enum_values().map(generator::keyed))
        .column_int("enum_id", |v: &EnumValue| i64::from(v.enum_id))
        .column_text("enum_name", |v: &EnumValue| v.enum_name.clone())
        .column_int("id", |v: &EnumValue| i64::from(v.id))
        .column_text("name", |v: &EnumValue| v.name.clone())
        .column_int("value", |v: &EnumValue| v.value)
        .filter_eq_int("enum_id", CHILD_COST, CHILD_ROWS, move |id| {
            keyed(id, |key| id_store.values_by_enum_id(key).map(generator::keyed))
        })
        .filter_eq_text("enum_name", CHILD_COST, CHILD_ROWS, move |name| {
            name_store.values_by_enum_name(name).map(generator::keyed)
        })
        .build()?;
    Ok(def)
}

fn base_classes_table(store: &Arc<SymbolStore>) -> Result<TableDef<BaseClass>> {
    let scan_store = Arc::clone(store);
    let id_store = Arc::clone(store);
    let def = TableDef::builder("base_classes")
        .estimate_rows(estimate(store, Collection::BaseClasses))
        .scan(move || scan_store.scan_base_classes().map(generator::keyed))
        .column_int("derived_id", |b: &BaseClass| i64::from(b.derived_id))
        .column_text("derived_name", |b: &BaseClass| b.derived_name.clone())
        .column_int("base_id", |b: &BaseClass| i64::from(b.base_id))
        .column_text("base_name", |b: &BaseClass| b.base_name.clone())
        .column_int("offset", |b: &BaseClass| i64::from(b.offset))
        .column_bool("is_virtual", |b: &BaseClass| b.is_virtual)
        .column_int("access", |b: &BaseClass| i64::from(b.access))
        .filter_eq_int("derived_id", CHILD_COST, CHILD_ROWS, move |id| {
            keyed(id, |key| id_store.bases_by_derived_id(key).map(generator::keyed))
        })
        .build()?;
    Ok(def)
}

fn variables_table(store: &Arc<SymbolStore>, kind: VarKind) -> Result<TableDef<Variable>> {
    let name = match kind {
        VarKind::Local => "locals",
        VarKind::Param => "parameters",
    };
    let scan_store = Arc::clone(store);
    let id_store = Arc::clone(store);
    let def = TableDef::builder(name)
        .estimate_rows(estimate(store, Collection::Variables(kind)))
        .scan(move || scan_store.scan_variables(kind).map(generator::keyed))
        .column_int("func_id", |v: &Variable| i64::from(v.func_id))
        .column_text("func_name", |v: &Variable| v.func_name.clone())
        .column_int("id", |v: &Variable| i64::from(v.id))
        .column_text("name", |v: &Variable| v.name.clone())
        .column_text("type", |v: &Variable| v.type_name.clone())
        .column_int("location_type", |v: &Variable| i64::from(v.location_type))
        .column_int("offset_or_register", |v: &Variable| v.offset_or_register)
        .filter_eq_int("func_id", CHILD_COST, CHILD_ROWS, move |id| {
            keyed(id, |key| id_store.variables_by_func(key, kind).map(generator::keyed))
        })
        .build()?;
    Ok(def)
}

/// Register every symbol table over `store`.
pub fn build_registry(store: Arc<SymbolStore>) -> Result<TableRegistry> {
    let mut registry = TableRegistry::new();
    for tag in SymTag::ALL {
        registry.register(symbol_table(&store, tag)?)?;
    }
    registry.register(compilands_table(&store)?)?;
    registry.register(source_files_table(&store)?)?;
    registry.register(line_numbers_table(&store)?)?;
    registry.register(sections_table(&store)?)?;
    registry.register(udt_members_table(&store)?)?;
    registry.register(enum_values_table(&store)?)?;
    registry.register(base_classes_table(&store)?)?;
    registry.register(variables_table(&store, VarKind::Local)?)?;
    registry.register(variables_table(&store, VarKind::Param)?)?;
    Ok(registry)
}
