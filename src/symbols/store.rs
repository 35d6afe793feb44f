//! In-memory symbol store with point-lookup indexes.
//!
//! The store is immutable after loading and shared behind an `Arc`. Scans and
//! lookups return [`StoreRows`], an iterator that clones one record per step,
//! so a scan that is abandoned early never copies the rest of the snapshot.
//! Each record comes paired with its position in its collection, which is
//! the same whether it was reached by a scan or a lookup.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use symql_vtab::{SourceError, SourceResult};
use tracing::{info, warn};

use super::model::*;
use crate::error::{Result, SymqlError};

type Index<K> = HashMap<K, Arc<[usize]>>;

fn index_by<T, K, F>(records: &[T], key: F) -> Index<K>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut map: HashMap<K, Vec<usize>> = HashMap::new();
    for (pos, record) in records.iter().enumerate() {
        map.entry(key(record)).or_default().push(pos);
    }
    map.into_iter().map(|(k, v)| (k, Arc::from(v))).collect()
}

/// Optional snapshot collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Compilands,
    SourceFiles,
    LineNumbers,
    Sections,
    UdtMembers,
    EnumValues,
    BaseClasses,
    Variables(VarKind),
}

/// Which records of a collection a [`StoreRows`] visits.
#[derive(Debug, Clone)]
enum Positions {
    All,
    Listed(Arc<[usize]>),
}

/// Lazily cloning iterator over `(position, record)` pairs of one store
/// collection. Positions increase.
pub struct StoreRows<T: 'static> {
    store: Arc<SymbolStore>,
    records: fn(&SymbolStore) -> &[T],
    positions: Positions,
    cursor: usize,
}

impl<T: Clone> Iterator for StoreRows<T> {
    type Item = (i64, T);

    fn next(&mut self) -> Option<(i64, T)> {
        let records = (self.records)(&self.store);
        let pos = match &self.positions {
            Positions::All => self.cursor,
            Positions::Listed(list) => *list.get(self.cursor)?,
        };
        let record = records.get(pos)?.clone();
        self.cursor += 1;
        Some((pos as i64, record))
    }
}

fn symbols(s: &SymbolStore) -> &[Symbol] {
    &s.symbols
}

fn compilands(s: &SymbolStore) -> &[Compiland] {
    s.compilands.as_deref().unwrap_or(&[])
}

fn source_files(s: &SymbolStore) -> &[SourceFile] {
    s.source_files.as_deref().unwrap_or(&[])
}

fn line_numbers(s: &SymbolStore) -> &[LineNumber] {
    s.line_numbers.as_deref().unwrap_or(&[])
}

fn sections(s: &SymbolStore) -> &[Section] {
    s.sections.as_deref().unwrap_or(&[])
}

fn udt_members(s: &SymbolStore) -> &[UdtMember] {
    s.udt_members.as_deref().unwrap_or(&[])
}

fn enum_values(s: &SymbolStore) -> &[EnumValue] {
    s.enum_values.as_deref().unwrap_or(&[])
}

fn base_classes(s: &SymbolStore) -> &[BaseClass] {
    s.base_classes.as_deref().unwrap_or(&[])
}

fn variables(s: &SymbolStore) -> &[Variable] {
    s.variables.as_deref().unwrap_or(&[])
}

/// A loaded snapshot and its lookup indexes.
pub struct SymbolStore {
    path: Option<PathBuf>,

    symbols: Vec<Symbol>,
    symbols_by_id: Index<(u32, SymTag)>,
    symbols_by_tag: Index<SymTag>,
    symbols_by_name: Index<(SymTag, String)>,

    compilands: Option<Vec<Compiland>>,
    compilands_by_id: Index<u32>,
    compilands_by_name: Index<String>,

    source_files: Option<Vec<SourceFile>>,
    source_files_by_id: Index<u32>,

    line_numbers: Option<Vec<LineNumber>>,
    lines_by_compiland: Index<u32>,

    sections: Option<Vec<Section>>,

    udt_members: Option<Vec<UdtMember>>,
    members_by_udt_id: Index<u32>,
    members_by_udt_name: Index<String>,

    enum_values: Option<Vec<EnumValue>>,
    values_by_enum_id: Index<u32>,
    values_by_enum_name: Index<String>,

    base_classes: Option<Vec<BaseClass>>,
    bases_by_derived_id: Index<u32>,

    variables: Option<Vec<Variable>>,
    variables_by_kind: Index<VarKind>,
    variables_by_func: Index<(u32, VarKind)>,
}

impl SymbolStore {
    /// Load a JSON snapshot from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SymqlError::snapshot(format!("Failed to read snapshot {:?}: {}", path, e))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&contents).map_err(|e| {
            SymqlError::snapshot(format!("Failed to parse snapshot {:?}: {}", path, e))
        })?;

        let mut store = Self::from_snapshot(snapshot);
        store.path = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            symbols = store.symbols.len(),
            "Loaded symbol snapshot"
        );
        Ok(store)
    }

    /// Parse a snapshot from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Index an already-parsed snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let Snapshot {
            symbols,
            compilands,
            source_files,
            line_numbers,
            sections,
            udt_members,
            enum_values,
            base_classes,
            variables,
        } = snapshot;

        let symbols_by_id = index_by(&symbols, |s| (s.id, s.tag));
        let duplicates = symbols_by_id.values().filter(|p| p.len() > 1).count();
        if duplicates > 0 {
            warn!(duplicates, "Snapshot reuses symbol ids within a symbol kind");
        }

        let cs = compilands.as_deref().unwrap_or(&[]);
        let sf = source_files.as_deref().unwrap_or(&[]);
        let ln = line_numbers.as_deref().unwrap_or(&[]);
        let um = udt_members.as_deref().unwrap_or(&[]);
        let ev = enum_values.as_deref().unwrap_or(&[]);
        let bc = base_classes.as_deref().unwrap_or(&[]);
        let vs = variables.as_deref().unwrap_or(&[]);

        Self {
            path: None,
            symbols_by_tag: index_by(&symbols, |s| s.tag),
            symbols_by_name: index_by(&symbols, |s| (s.tag, s.name.clone())),
            symbols_by_id,
            compilands_by_id: index_by(cs, |c| c.id),
            compilands_by_name: index_by(cs, |c| c.name.clone()),
            source_files_by_id: index_by(sf, |f| f.id),
            lines_by_compiland: index_by(ln, |l| l.compiland_id),
            members_by_udt_id: index_by(um, |m| m.udt_id),
            members_by_udt_name: index_by(um, |m| m.udt_name.clone()),
            values_by_enum_id: index_by(ev, |v| v.enum_id),
            values_by_enum_name: index_by(ev, |v| v.enum_name.clone()),
            bases_by_derived_id: index_by(bc, |b| b.derived_id),
            variables_by_kind: index_by(vs, |v| v.kind),
            variables_by_func: index_by(vs, |v| (v.func_id, v.kind)),
            symbols,
            compilands,
            source_files,
            line_numbers,
            sections,
            udt_members,
            enum_values,
            base_classes,
            variables,
        }
    }

    /// File the snapshot was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of symbols of kind `tag`.
    pub fn count(&self, tag: SymTag) -> usize {
        self.symbols_by_tag.get(&tag).map_or(0, |p| p.len())
    }

    /// Number of records in `collection`, or `None` if the snapshot lacks it.
    pub fn len(&self, collection: Collection) -> Option<usize> {
        fn n<T>(c: &Option<Vec<T>>) -> Option<usize> {
            c.as_ref().map(Vec::len)
        }
        match collection {
            Collection::Compilands => n(&self.compilands),
            Collection::SourceFiles => n(&self.source_files),
            Collection::LineNumbers => n(&self.line_numbers),
            Collection::Sections => n(&self.sections),
            Collection::UdtMembers => n(&self.udt_members),
            Collection::EnumValues => n(&self.enum_values),
            Collection::BaseClasses => n(&self.base_classes),
            Collection::Variables(kind) => self
                .variables
                .as_ref()
                .map(|_| self.variables_by_kind.get(&kind).map_or(0, |p| p.len())),
        }
    }

    /// Row counts per symbol table, then compilands and source files when
    /// present, in display order.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<(&'static str, usize)> =
            SymTag::ALL.iter().map(|t| (t.label(), self.count(*t))).collect();
        if let Some(n) = self.len(Collection::Compilands) {
            counts.push(("Compilands", n));
        }
        if let Some(n) = self.len(Collection::SourceFiles) {
            counts.push(("Source Files", n));
        }
        counts
    }

    /// The first symbol of kind `tag` with `id`.
    pub fn symbol(&self, id: u32, tag: SymTag) -> Option<&Symbol> {
        self.symbols_by_id
            .get(&(id, tag))
            .and_then(|p| p.first())
            .map(|&pos| &self.symbols[pos])
    }

    // ── Row sources ─────────────────────────────────────────────────────

    fn rows<T: Clone>(
        self: &Arc<Self>,
        records: fn(&SymbolStore) -> &[T],
        positions: Positions,
    ) -> StoreRows<T> {
        StoreRows {
            store: Arc::clone(self),
            records,
            positions,
            cursor: 0,
        }
    }

    fn listed<T: Clone, K: Hash + Eq>(
        self: &Arc<Self>,
        records: fn(&SymbolStore) -> &[T],
        index: &Index<K>,
        key: &K,
    ) -> StoreRows<T> {
        let list = index.get(key).cloned().unwrap_or_else(|| Arc::from(Vec::new()));
        self.rows(records, Positions::Listed(list))
    }

    fn require<T>(&self, collection: &Option<Vec<T>>, what: &str) -> SourceResult<()> {
        match collection {
            Some(_) => Ok(()),
            None => Err(SourceError::unavailable(format!("snapshot has no {what}"))),
        }
    }

    pub fn scan_symbols(self: &Arc<Self>, tag: SymTag) -> StoreRows<Symbol> {
        self.listed(symbols, &self.symbols_by_tag, &tag)
    }

    pub fn symbol_by_id(self: &Arc<Self>, id: u32, tag: SymTag) -> StoreRows<Symbol> {
        self.listed(symbols, &self.symbols_by_id, &(id, tag))
    }

    pub fn symbols_by_name(self: &Arc<Self>, tag: SymTag, name: &str) -> StoreRows<Symbol> {
        self.listed(symbols, &self.symbols_by_name, &(tag, name.to_string()))
    }

    pub fn scan_compilands(self: &Arc<Self>) -> SourceResult<StoreRows<Compiland>> {
        self.require(&self.compilands, "compilands")?;
        Ok(self.rows(compilands, Positions::All))
    }

    pub fn compiland_by_id(self: &Arc<Self>, id: u32) -> SourceResult<StoreRows<Compiland>> {
        self.require(&self.compilands, "compilands")?;
        Ok(self.listed(compilands, &self.compilands_by_id, &id))
    }

    pub fn compilands_by_name(self: &Arc<Self>, name: &str) -> SourceResult<StoreRows<Compiland>> {
        self.require(&self.compilands, "compilands")?;
        Ok(self.listed(compilands, &self.compilands_by_name, &name.to_string()))
    }

    pub fn scan_source_files(self: &Arc<Self>) -> SourceResult<StoreRows<SourceFile>> {
        self.require(&self.source_files, "source files")?;
        Ok(self.rows(source_files, Positions::All))
    }

    pub fn source_file_by_id(self: &Arc<Self>, id: u32) -> SourceResult<StoreRows<SourceFile>> {
        self.require(&self.source_files, "source files")?;
        Ok(self.listed(source_files, &self.source_files_by_id, &id))
    }

    pub fn scan_line_numbers(self: &Arc<Self>) -> SourceResult<StoreRows<LineNumber>> {
        self.require(&self.line_numbers, "line numbers")?;
        Ok(self.rows(line_numbers, Positions::All))
    }

    pub fn lines_by_compiland(self: &Arc<Self>, compiland_id: u32) -> SourceResult<StoreRows<LineNumber>> {
        self.require(&self.line_numbers, "line numbers")?;
        Ok(self.listed(line_numbers, &self.lines_by_compiland, &compiland_id))
    }

    pub fn scan_sections(self: &Arc<Self>) -> SourceResult<StoreRows<Section>> {
        self.require(&self.sections, "section contributions")?;
        Ok(self.rows(sections, Positions::All))
    }

    pub fn scan_udt_members(self: &Arc<Self>) -> SourceResult<StoreRows<UdtMember>> {
        self.require(&self.udt_members, "UDT members")?;
        Ok(self.rows(udt_members, Positions::All))
    }

    pub fn members_by_udt_id(self: &Arc<Self>, udt_id: u32) -> SourceResult<StoreRows<UdtMember>> {
        self.require(&self.udt_members, "UDT members")?;
        Ok(self.listed(udt_members, &self.members_by_udt_id, &udt_id))
    }

    pub fn members_by_udt_name(self: &Arc<Self>, name: &str) -> SourceResult<StoreRows<UdtMember>> {
        self.require(&self.udt_members, "UDT members")?;
        Ok(self.listed(udt_members, &self.members_by_udt_name, &name.to_string()))
    }

    pub fn scan_enum_values(self: &Arc<Self>) -> SourceResult<StoreRows<EnumValue>> {
        self.require(&self.enum_values, "enum values")?;
        Ok(self.rows(enum_values, Positions::All))
    }

    pub fn values_by_enum_id(self: &Arc<Self>, enum_id: u32) -> SourceResult<StoreRows<EnumValue>> {
        self.require(&self.enum_values, "enum values")?;
        Ok(self.listed(enum_values, &self.values_by_enum_id, &enum_id))
    }

    pub fn values_by_enum_name(self: &Arc<Self>, name: &str) -> SourceResult<StoreRows<EnumValue>> {
        self.require(&self.enum_values, "enum values")?;
        Ok(self.listed(enum_values, &self.values_by_enum_name, &name.to_string()))
    }

    pub fn scan_base_classes(self: &Arc<Self>) -> SourceResult<StoreRows<BaseClass>> {
        self.require(&self.base_classes, "base classes")?;
        Ok(self.rows(base_classes, Positions::All))
    }

    pub fn bases_by_derived_id(self: &Arc<Self>, derived_id: u32) -> SourceResult<StoreRows<BaseClass>> {
        self.require(&self.base_classes, "base classes")?;
        Ok(self.listed(base_classes, &self.bases_by_derived_id, &derived_id))
    }

    pub fn scan_variables(self: &Arc<Self>, kind: VarKind) -> SourceResult<StoreRows<Variable>> {
        self.require(&self.variables, "variables")?;
        Ok(self.listed(variables, &self.variables_by_kind, &kind))
    }

    pub fn variables_by_func(
        self: &Arc<Self>,
        func_id: u32,
        kind: VarKind,
    ) -> SourceResult<StoreRows<Variable>> {
        self.require(&self.variables, "variables")?;
        Ok(self.listed(variables, &self.variables_by_func, &(func_id, kind)))
    }
}

impl std::fmt::Debug for SymbolStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolStore")
            .field("path", &self.path)
            .field("symbols", &self.symbols.len())
            .finish_non_exhaustive()
    }
}
