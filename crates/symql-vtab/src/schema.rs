//! Table definitions: columns, row estimate, scan factory and filters.
//!
//! A [`TableDef<T>`] is a plain value describing how records of one concrete
//! type `T` become SQL rows. It is built once with [`TableBuilder`], checked
//! for consistency, and is read-only from then on. Column order is the SQL
//! column order and never changes for the lifetime of the definition.
//!
//! ```
//! use symql_vtab::{generator, TableDef};
//!
//! struct Item {
//!     id: i64,
//!     name: String,
//! }
//!
//! let def = TableDef::<Item>::builder("items")
//!     .estimate_rows(|| 2)
//!     .scan(|| {
//!         Ok(generator::from_iter(
//!             vec![
//!                 Item { id: 1, name: "a".into() },
//!                 Item { id: 2, name: "b".into() },
//!             ]
//!             .into_iter(),
//!         ))
//!     })
//!     .column_int("id", |r| r.id)
//!     .column_text("name", |r| r.name.clone())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(def.create_table_sql(), r#"CREATE TABLE x("id" INTEGER, "name" TEXT)"#);
//! ```

use std::collections::HashSet;
use std::fmt;

use rusqlite::types::Value;

use crate::error::{ExtractError, Result, SourceResult, VtabError};
use crate::filter::{
    integer_key, select_plan, text_key, FilterDef, FilterFactory, FilterKey, FilterSpec,
    OfferedConstraint, ScanPlan,
};
use crate::generator::{self, BoxGenerator};

/// Declared SQL type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

type Extractor<T> = Box<dyn Fn(&T) -> std::result::Result<Value, ExtractError> + Send + Sync>;
type ScanFactory<T> = Box<dyn Fn() -> SourceResult<BoxGenerator<T>> + Send + Sync>;
type RowEstimate = Box<dyn Fn() -> u64 + Send + Sync>;

/// One column: a name, a declared type and how to read it from a record.
pub struct ColumnDef<T> {
    name: String,
    kind: ColumnType,
    extract: Extractor<T>,
}

impl<T> ColumnDef<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnType {
        self.kind
    }

    /// Read this column from `record`.
    pub fn extract(&self, record: &T) -> std::result::Result<Value, ExtractError> {
        (self.extract)(record)
    }
}

impl<T> fmt::Debug for ColumnDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Complete, validated definition of a virtual table over records of `T`.
pub struct TableDef<T> {
    name: String,
    columns: Vec<ColumnDef<T>>,
    estimate_rows: RowEstimate,
    scan: ScanFactory<T>,
    filters: Vec<FilterDef<T>>,
}

impl<T: 'static> TableDef<T> {
    /// Start defining a table called `name`.
    pub fn builder(name: impl Into<String>) -> TableBuilder<T> {
        TableBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef<T>] {
        &self.columns
    }

    pub fn filters(&self) -> &[FilterDef<T>] {
        &self.filters
    }

    /// Index of the column called `name`.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Current row estimate for a full scan.
    pub fn estimate_rows(&self) -> u64 {
        (self.estimate_rows)()
    }

    /// `CREATE TABLE` statement handed to SQLite's `declare_vtab`.
    pub fn create_table_sql(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.kind))
            .collect();
        format!("CREATE TABLE x({})", cols.join(", "))
    }

    /// Choose between a full scan and one of the declared filters.
    pub fn plan(&self, constraints: &[OfferedConstraint]) -> ScanPlan {
        let specs: Vec<FilterSpec> = self.filters.iter().map(|f| f.spec).collect();
        select_plan(&specs, constraints, self.estimate_rows() as f64)
    }

    /// Open a full scan.
    pub fn open_scan(&self) -> SourceResult<BoxGenerator<T>> {
        (self.scan)()
    }

    /// The filter reported to SQLite as `filter_id`.
    pub fn filter(&self, filter_id: i32) -> Option<&FilterDef<T>> {
        self.filters.iter().find(|f| f.spec.filter_id == filter_id)
    }

    /// Names of the columns that accept a pushed-down equality constraint.
    pub fn filtered_columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for filter in &self.filters {
            let name = self.columns[filter.spec.column].name.as_str();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

impl<T> fmt::Debug for TableDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDef")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("filters", &self.filters)
            .finish()
    }
}

struct PendingFilter<T> {
    column: String,
    cost: f64,
    rows: f64,
    factory: FilterFactory<T>,
}

/// Builder for [`TableDef`]. Errors are reported by [`TableBuilder::build`].
pub struct TableBuilder<T> {
    name: String,
    columns: Vec<ColumnDef<T>>,
    estimate_rows: Option<RowEstimate>,
    scan: Option<ScanFactory<T>>,
    filters: Vec<PendingFilter<T>>,
}

impl<T: 'static> TableBuilder<T> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            estimate_rows: None,
            scan: None,
            filters: Vec::new(),
        }
    }

    /// Row estimate for a full scan, evaluated each time a query is planned.
    pub fn estimate_rows<F>(mut self, f: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.estimate_rows = Some(Box::new(f));
        self
    }

    /// Factory for full-scan generators.
    pub fn scan<F>(mut self, f: F) -> Self
    where
        F: Fn() -> SourceResult<BoxGenerator<T>> + Send + Sync + 'static,
    {
        self.scan = Some(Box::new(f));
        self
    }

    /// Add a column with a fallible extractor; `Err` reads as NULL.
    pub fn column_try<F>(mut self, name: impl Into<String>, kind: ColumnType, f: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<Value, ExtractError> + Send + Sync + 'static,
    {
        self.columns.push(ColumnDef {
            name: name.into(),
            kind,
            extract: Box::new(f),
        });
        self
    }

    pub fn column_int<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T) -> i64 + Send + Sync + 'static,
    {
        self.column_try(name, ColumnType::Integer, move |r| Ok(Value::Integer(f(r))))
    }

    pub fn column_real<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T) -> f64 + Send + Sync + 'static,
    {
        self.column_try(name, ColumnType::Real, move |r| Ok(Value::Real(f(r))))
    }

    pub fn column_text<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.column_try(name, ColumnType::Text, move |r| Ok(Value::Text(f(r))))
    }

    /// Text column where `None` reads as NULL.
    pub fn column_opt_text<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T) -> Option<String> + Send + Sync + 'static,
    {
        self.column_try(name, ColumnType::Text, move |r| {
            Ok(f(r).map(Value::Text).unwrap_or(Value::Null))
        })
    }

    /// Boolean stored as INTEGER 0/1.
    pub fn column_bool<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.column_try(name, ColumnType::Integer, move |r| {
            Ok(Value::Integer(i64::from(f(r))))
        })
    }

    /// Declare an equality filter on an integer column.
    ///
    /// Constraint values that cannot equal an integer yield an empty scan
    /// without calling `factory`; numeric text such as `'12.0'` falls back to
    /// a full scan.
    pub fn filter_eq_int<F>(mut self, column: impl Into<String>, cost: f64, rows: f64, factory: F) -> Self
    where
        F: Fn(i64) -> SourceResult<BoxGenerator<T>> + Send + Sync + 'static,
    {
        self.filters.push(PendingFilter {
            column: column.into(),
            cost,
            rows,
            factory: Box::new(move |value| match integer_key(value) {
                FilterKey::Exact(key) => Some(factory(key)),
                FilterKey::Nothing => Some(Ok(generator::empty())),
                FilterKey::Inexact => None,
            }),
        });
        self
    }

    /// Declare an equality filter on a text column.
    ///
    /// REAL constraint values fall back to a full scan.
    pub fn filter_eq_text<F>(mut self, column: impl Into<String>, cost: f64, rows: f64, factory: F) -> Self
    where
        F: Fn(&str) -> SourceResult<BoxGenerator<T>> + Send + Sync + 'static,
    {
        self.filters.push(PendingFilter {
            column: column.into(),
            cost,
            rows,
            factory: Box::new(move |value| match text_key(value) {
                FilterKey::Exact(key) => Some(factory(&key)),
                FilterKey::Nothing => Some(Ok(generator::empty())),
                FilterKey::Inexact => None,
            }),
        });
        self
    }

    /// Validate and produce the definition.
    pub fn build(self) -> Result<TableDef<T>> {
        let table = self.name;
        if !is_identifier(&table) {
            return Err(VtabError::invalid_schema(&table, "table name must be a plain identifier"));
        }
        if self.columns.is_empty() {
            return Err(VtabError::invalid_schema(&table, "table has no columns"));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !is_identifier(&column.name) {
                return Err(VtabError::invalid_schema(
                    &table,
                    format!("column name '{}' must be a plain identifier", column.name),
                ));
            }
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(VtabError::invalid_schema(
                    &table,
                    format!("duplicate column '{}'", column.name),
                ));
            }
        }

        let scan = self
            .scan
            .ok_or_else(|| VtabError::invalid_schema(&table, "no scan factory"))?;

        let mut filters = Vec::with_capacity(self.filters.len());
        for (i, pending) in self.filters.into_iter().enumerate() {
            let column = self
                .columns
                .iter()
                .position(|c| c.name == pending.column)
                .ok_or_else(|| {
                    VtabError::invalid_schema(
                        &table,
                        format!("filter on unknown column '{}'", pending.column),
                    )
                })?;
            if !(pending.cost.is_finite() && pending.rows.is_finite()) || pending.cost < 0.0 || pending.rows < 0.0 {
                return Err(VtabError::invalid_schema(
                    &table,
                    format!("filter on '{}' has an invalid cost or row estimate", pending.column),
                ));
            }
            filters.push(FilterDef {
                spec: FilterSpec {
                    filter_id: i as i32 + 1,
                    column,
                    cost: pending.cost,
                    rows: pending.rows,
                },
                factory: pending.factory,
            });
        }

        Ok(TableDef {
            name: table,
            columns: self.columns,
            estimate_rows: self.estimate_rows.unwrap_or_else(|| Box::new(|| DEFAULT_ROW_ESTIMATE)),
            scan,
            filters,
        })
    }
}

/// Row estimate used when a table declares none.
pub const DEFAULT_ROW_ESTIMATE: u64 = 1_000_000;

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
