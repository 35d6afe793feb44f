//! Table registry: every table of one session, bound to a connection once.
//!
//! Tables over different record types live side by side behind the
//! object-safe [`RegisteredTable`] trait; the concrete `T` is fixed when the
//! definition is added and never looked up again at query time.

use std::sync::Arc;

use rusqlite::vtab::read_only_module;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bridge::{BoundTable, GeneratorVTab, SourcePolicy};
use crate::error::{Result, VtabError};
use crate::schema::TableDef;

/// Column metadata reported by [`TableRegistry::tables`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// Table metadata reported by [`TableRegistry::tables`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Table name as used in SQL.
    pub name: String,
    /// Columns in SQL order.
    pub columns: Vec<ColumnInfo>,
    /// Planner row estimate for a full scan.
    pub estimated_rows: u64,
    /// Columns with a pushed-down equality filter.
    pub filtered_columns: Vec<String>,
}

/// A table definition with its record type erased.
pub trait RegisteredTable: Send + Sync {
    fn name(&self) -> &str;

    fn info(&self) -> TableInfo;

    /// Register the module and create the virtual table on `conn`.
    fn attach(&self, conn: &Connection, policy: SourcePolicy) -> Result<()>;
}

impl<T: 'static> RegisteredTable for Arc<TableDef<T>> {
    fn name(&self) -> &str {
        TableDef::<T>::name(self)
    }

    fn info(&self) -> TableInfo {
        TableInfo {
            name: TableDef::<T>::name(self).to_string(),
            columns: self
                .columns()
                .iter()
                .map(|c| ColumnInfo {
                    name: c.name().to_string(),
                    data_type: c.kind().to_string(),
                })
                .collect(),
            estimated_rows: self.estimate_rows(),
            filtered_columns: self.filtered_columns().into_iter().map(String::from).collect(),
        }
    }

    fn attach(&self, conn: &Connection, policy: SourcePolicy) -> Result<()> {
        let table = TableDef::<T>::name(self);
        let module = module_name(table);
        conn.create_module(
            module.as_str(),
            read_only_module::<GeneratorVTab<T>>(),
            Some(BoundTable::new(Arc::clone(self), policy)),
        )?;
        conn.execute_batch(&format!("CREATE VIRTUAL TABLE \"{table}\" USING {module}"))?;
        debug!(table, module = %module, "Attached virtual table");
        Ok(())
    }
}

/// SQLite module name for a table.
pub fn module_name(table: &str) -> String {
    format!("symql_{table}")
}

/// All tables of one session. Append-only during setup.
#[derive(Default)]
pub struct TableRegistry {
    tables: Vec<Box<dyn RegisteredTable>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. Names are unique without regard to ASCII case.
    pub fn register<T: 'static>(&mut self, def: TableDef<T>) -> Result<()> {
        self.register_shared(Arc::new(def))
    }

    /// Add a table whose definition is shared with other code.
    pub fn register_shared<T: 'static>(&mut self, def: Arc<TableDef<T>>) -> Result<()> {
        let name = TableDef::<T>::name(&def);
        if self.tables.iter().any(|t| t.name().eq_ignore_ascii_case(name)) {
            return Err(VtabError::DuplicateTable(name.to_string()));
        }
        self.tables.push(Box::new(def));
        Ok(())
    }

    /// Attach every table to `conn`.
    pub fn attach_all(&self, conn: &Connection, policy: SourcePolicy) -> Result<()> {
        for table in &self.tables {
            table.attach(conn, policy)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    pub fn tables(&self) -> Vec<TableInfo> {
        self.tables.iter().map(|t| t.info()).collect()
    }

    /// Metadata for one table, matched without regard to ASCII case.
    pub fn table(&self, name: &str) -> Option<TableInfo> {
        self.tables
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
            .map(|t| t.info())
    }
}

impl std::fmt::Debug for TableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableRegistry")
            .field("tables", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator;

    fn numbers(name: &str) -> TableDef<i64> {
        TableDef::builder(name)
            .estimate_rows(|| 3)
            .scan(|| Ok(generator::from_iter(vec![1i64, 2, 3].into_iter())))
            .column_int("n", |v: &i64| *v)
            .filter_eq_int("n", 1.0, 1.0, |n| Ok(generator::from_iter(std::iter::once(n))))
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = TableRegistry::new();
        registry.register(numbers("numbers")).unwrap();
        let err = registry.register(numbers("NUMBERS")).unwrap_err();
        assert!(matches!(err, VtabError::DuplicateTable(name) if name == "NUMBERS"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_table_info() {
        let mut registry = TableRegistry::new();
        registry.register(numbers("numbers")).unwrap();
        let info = registry.table("Numbers").unwrap();
        assert_eq!(info.name, "numbers");
        assert_eq!(info.estimated_rows, 3);
        assert_eq!(info.columns[0].data_type, "INTEGER");
        assert_eq!(info.filtered_columns, vec!["n".to_string()]);
        assert!(registry.table("missing").is_none());
    }

    #[test]
    fn test_attach_and_query() {
        let mut registry = TableRegistry::new();
        registry.register(numbers("numbers")).unwrap();
        let conn = Connection::open_in_memory().unwrap();
        registry.attach_all(&conn, SourcePolicy::Empty).unwrap();

        let sum: i64 = conn
            .query_row("SELECT SUM(n) FROM numbers", [], |r| r.get(0))
            .unwrap();
        assert_eq!(sum, 6);

        let n: i64 = conn
            .query_row("SELECT n FROM numbers WHERE n = 2", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }
}
