//! SQLite virtual-table glue.
//!
//! One [`GeneratorVTab<T>`] exists per `CREATE VIRTUAL TABLE` and one
//! [`GeneratorCursor<T>`] per table access in a running statement. The cursor
//! owns a single generator at a time and pulls exactly one record per
//! `xNext`, so SQLite's early termination (LIMIT, EXISTS, join short-circuit)
//! stops enumeration of the underlying source.
//!
//! Nothing a record source does may unwind across the FFI boundary: a panic
//! while advancing ends the scan, and a panic while extracting a column makes
//! that cell NULL.

use std::marker::PhantomData;
use std::os::raw::c_int;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::vtab::{
    sqlite3_vtab, sqlite3_vtab_cursor, Context, CreateVTab, IndexConstraintOp, IndexInfo,
    VTab, VTabConnection, VTabCursor, VTabKind, Values,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SourceResult;
use crate::filter::{constraint_op, OfferedConstraint, ScanPlan, FULL_SCAN_ID};
use crate::generator::BoxGenerator;
use crate::schema::TableDef;

/// What a scan does when its record source cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePolicy {
    /// Yield zero rows and log a warning.
    #[default]
    Empty,
    /// Fail the statement with the source's error message.
    Error,
}

/// Module auxiliary data: the table definition plus how to treat failures.
pub struct BoundTable<T> {
    pub(crate) def: Arc<TableDef<T>>,
    pub(crate) policy: SourcePolicy,
}

impl<T> BoundTable<T> {
    pub fn new(def: Arc<TableDef<T>>, policy: SourcePolicy) -> Self {
        Self { def, policy }
    }
}

/// Virtual table instance for records of `T`.
#[repr(C)]
pub struct GeneratorVTab<T: 'static> {
    /// Must be first.
    base: sqlite3_vtab,
    def: Arc<TableDef<T>>,
    policy: SourcePolicy,
}

unsafe impl<'vtab, T: 'static> VTab<'vtab> for GeneratorVTab<T> {
    type Aux = BoundTable<T>;
    type Cursor = GeneratorCursor<'vtab, T>;

    fn connect(
        _db: &mut VTabConnection,
        aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let bound = aux.ok_or_else(|| {
            rusqlite::Error::ModuleError("virtual table module registered without a table".into())
        })?;
        let vtab = GeneratorVTab {
            base: sqlite3_vtab::default(),
            def: Arc::clone(&bound.def),
            policy: bound.policy,
        };
        Ok((vtab.def.create_table_sql(), vtab))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        let offered: Vec<OfferedConstraint> = info
            .constraints()
            .enumerate()
            .map(|(index, c)| OfferedConstraint {
                index,
                column: c.column(),
                op: constraint_op(
                    matches!(c.operator(), IndexConstraintOp::SQLITE_INDEX_CONSTRAINT_EQ),
                    info.collation(index).unwrap_or(""),
                ),
                usable: c.is_usable(),
            })
            .collect();

        let plan = self.def.plan(&offered);
        if let ScanPlan::Filtered { constraint, .. } = plan {
            let mut usage = info.constraint_usage(constraint);
            usage.set_argv_index(1);
            // SQLite re-checks the predicate itself.
            usage.set_omit(false);
        }
        info.set_idx_num(plan.idx_num());
        info.set_estimated_cost(plan.cost());
        info.set_estimated_rows(plan.rows() as i64);

        debug!(
            table = self.def.name(),
            idx_num = plan.idx_num(),
            cost = plan.cost(),
            "Planned virtual table access"
        );
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<Self::Cursor> {
        Ok(GeneratorCursor::new(Arc::clone(&self.def), self.policy))
    }
}

impl<'vtab, T: 'static> CreateVTab<'vtab> for GeneratorVTab<T> {
    const KIND: VTabKind = VTabKind::Default;
}

/// One in-progress scan.
#[repr(C)]
pub struct GeneratorCursor<'vtab, T: 'static> {
    /// Must be first.
    base: sqlite3_vtab_cursor,
    def: Arc<TableDef<T>>,
    policy: SourcePolicy,
    generator: Option<BoxGenerator<T>>,
    phantom: PhantomData<&'vtab GeneratorVTab<T>>,
}

impl<'vtab, T: 'static> GeneratorCursor<'vtab, T> {
    fn new(def: Arc<TableDef<T>>, policy: SourcePolicy) -> Self {
        Self {
            base: sqlite3_vtab_cursor::default(),
            def,
            policy,
            generator: None,
            phantom: PhantomData,
        }
    }

    fn open_generator(&self, idx_num: c_int, args: &Values<'_>) -> rusqlite::Result<SourceResult<BoxGenerator<T>>> {
        if idx_num == FULL_SCAN_ID {
            return Ok(self.def.open_scan());
        }
        let filter = self.def.filter(idx_num).ok_or_else(|| {
            rusqlite::Error::ModuleError(format!(
                "table '{}' has no filter {}",
                self.def.name(),
                idx_num
            ))
        })?;
        let value: Value = args.get(0)?;
        Ok(filter.open(&value).unwrap_or_else(|| self.def.open_scan()))
    }

    /// Advance the current generator, dropping it on exhaustion or panic.
    fn step(&mut self) {
        let Some(generator) = self.generator.as_mut() else {
            return;
        };
        match catch_unwind(AssertUnwindSafe(|| generator.advance())) {
            Ok(true) => {}
            Ok(false) => self.generator = None,
            Err(_) => {
                warn!(table = self.def.name(), "Record source panicked while advancing, ending scan");
                self.generator = None;
            }
        }
    }
}

unsafe impl<T: 'static> VTabCursor for GeneratorCursor<'_, T> {
    fn filter(&mut self, idx_num: c_int, _idx_str: Option<&str>, args: &Values<'_>) -> rusqlite::Result<()> {
        self.generator = None;

        let opened = catch_unwind(AssertUnwindSafe(|| self.open_generator(idx_num, args)));
        let source = match opened {
            Ok(result) => result?,
            Err(_) => {
                warn!(table = self.def.name(), "Record source panicked while opening scan");
                return Ok(());
            }
        };

        match source {
            Ok(generator) => {
                self.generator = Some(generator);
                self.step();
                Ok(())
            }
            Err(e) => match self.policy {
                SourcePolicy::Empty => {
                    warn!(table = self.def.name(), error = %e, "Record source unavailable, scanning as empty");
                    Ok(())
                }
                SourcePolicy::Error => Err(rusqlite::Error::ModuleError(format!(
                    "table '{}': {}",
                    self.def.name(),
                    e
                ))),
            },
        }
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.step();
        Ok(())
    }

    fn eof(&self) -> bool {
        self.generator.is_none()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let record = self.generator.as_ref().and_then(|g| g.current());
        let column = usize::try_from(i).ok().and_then(|i| self.def.columns().get(i));

        let value = match (record, column) {
            (Some(record), Some(column)) => {
                match catch_unwind(AssertUnwindSafe(|| column.extract(record))) {
                    Ok(Ok(value)) => value,
                    Ok(Err(e)) => {
                        debug!(table = self.def.name(), column = column.name(), error = %e, "Column extraction failed");
                        Value::Null
                    }
                    Err(_) => {
                        warn!(table = self.def.name(), column = column.name(), "Column extractor panicked");
                        Value::Null
                    }
                }
            }
            _ => Value::Null,
        };
        ctx.set_result(&value)
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.generator.as_ref().map(|g| g.rowid()).unwrap_or(0))
    }
}
