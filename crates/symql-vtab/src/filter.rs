//! Constraint pushdown: equality filters and cost-based plan selection.
//!
//! A table may declare any number of equality filters, each bound to one
//! column and carrying an explicit cost and row estimate. When SQLite plans a
//! query it offers the constraints it found in the `WHERE` clause; the table
//! answers with the cheapest filter that applies, or with a full scan costed
//! at the table's row estimate. Only equality is ever pushed down: the record
//! sources behind these tables support point lookups (by id, by exact name)
//! and nothing like range scans.
//!
//! [`select_plan`] is deliberately free of any SQLite types so the choice can
//! be unit-tested on its own.

use rusqlite::types::Value;

use crate::error::SourceResult;
use crate::generator::BoxGenerator;

/// `idx_num` reported to SQLite for a full scan. Filters are numbered from 1.
pub const FULL_SCAN_ID: i32 = 0;

/// Default cost of a filter that narrows a lookup but is not a point query.
pub const DEFAULT_FILTER_COST: f64 = 10.0;

/// Default row estimate for such a filter.
pub const DEFAULT_FILTER_ROWS: f64 = 10.0;

/// Operator of a constraint offered by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Eq,
    /// Any operator other than equality; never pushed down.
    Other,
}

/// One constraint as offered by the planner for a single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferedConstraint {
    /// Position of the constraint in the planner's list.
    pub index: usize,
    /// Column the constraint applies to (`-1` for the rowid).
    pub column: i32,
    pub op: ConstraintOp,
    /// Whether the right-hand side is available for this plan.
    pub usable: bool,
}

/// Planning-time description of a filter: what [`select_plan`] looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub filter_id: i32,
    pub column: usize,
    pub cost: f64,
    pub rows: f64,
}

/// The plan chosen for one table access.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanPlan {
    /// Enumerate everything; SQLite post-filters.
    FullScan { cost: f64, rows: f64 },
    /// Use filter `filter_id`, fed by the constraint at `constraint`.
    Filtered {
        filter_id: i32,
        constraint: usize,
        cost: f64,
        rows: f64,
    },
}

impl ScanPlan {
    pub fn idx_num(&self) -> i32 {
        match self {
            ScanPlan::FullScan { .. } => FULL_SCAN_ID,
            ScanPlan::Filtered { filter_id, .. } => *filter_id,
        }
    }

    pub fn cost(&self) -> f64 {
        match self {
            ScanPlan::FullScan { cost, .. } | ScanPlan::Filtered { cost, .. } => *cost,
        }
    }

    pub fn rows(&self) -> f64 {
        match self {
            ScanPlan::FullScan { rows, .. } | ScanPlan::Filtered { rows, .. } => *rows,
        }
    }
}

/// Pick the cheapest applicable filter, or a full scan.
///
/// A filter applies when some usable equality constraint targets its column.
/// Candidates are ordered by `cost`, then by `rows`; on a complete tie the
/// filter declared first wins. With no candidate the plan is a full scan with
/// cost and rows equal to `full_scan_rows`.
pub fn select_plan(
    filters: &[FilterSpec],
    constraints: &[OfferedConstraint],
    full_scan_rows: f64,
) -> ScanPlan {
    let mut best: Option<ScanPlan> = None;

    for constraint in constraints {
        if !constraint.usable || constraint.op != ConstraintOp::Eq || constraint.column < 0 {
            continue;
        }
        let column = constraint.column as usize;

        for filter in filters.iter().filter(|f| f.column == column) {
            let candidate = ScanPlan::Filtered {
                filter_id: filter.filter_id,
                constraint: constraint.index,
                cost: filter.cost,
                rows: filter.rows,
            };
            let better = match &best {
                None => true,
                Some(current) => {
                    (filter.cost, filter.rows) < (current.cost(), current.rows())
                }
            };
            if better {
                best = Some(candidate);
            }
        }
    }

    best.unwrap_or(ScanPlan::FullScan {
        cost: full_scan_rows,
        rows: full_scan_rows,
    })
}

/// Factory invoked with the constraint's right-hand side.
///
/// `None` means the value has no exact lookup key and the table is scanned in
/// full instead.
pub type FilterFactory<T> =
    Box<dyn Fn(&Value) -> Option<SourceResult<BoxGenerator<T>>> + Send + Sync>;

/// A declared equality filter on one column of a table.
pub struct FilterDef<T> {
    pub(crate) spec: FilterSpec,
    pub(crate) factory: FilterFactory<T>,
}

impl<T> FilterDef<T> {
    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    /// Build the generator for a given constraint value, or `None` when the
    /// caller should fall back to a full scan.
    pub fn open(&self, value: &Value) -> Option<SourceResult<BoxGenerator<T>>> {
        (self.factory)(value)
    }
}

impl<T> std::fmt::Debug for FilterDef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterDef").field("spec", &self.spec).finish()
    }
}

/// Lookup key derived from a constraint value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKey<K> {
    /// Rows whose column equals this key are exactly the matches.
    Exact(K),
    /// No column value can equal the constraint; the scan is empty.
    Nothing,
    /// SQLite's own conversion decides equality; scan in full and let it
    /// compare.
    Inexact,
}

/// Coerce a constraint value to an integer key.
///
/// NULL, blobs, reals with a fractional part and non-numeric text never
/// equal an integer. Numeric text that is not a plain integer (`'12.0'`,
/// `'1e2'`) is left to SQLite's affinity rules.
pub fn integer_key(value: &Value) -> FilterKey<i64> {
    match value {
        Value::Integer(i) => FilterKey::Exact(*i),
        Value::Real(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            FilterKey::Exact(*f as i64)
        }
        Value::Text(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                FilterKey::Exact(i)
            } else if s.parse::<f64>().is_ok() {
                FilterKey::Inexact
            } else {
                FilterKey::Nothing
            }
        }
        Value::Real(_) | Value::Null | Value::Blob(_) => FilterKey::Nothing,
    }
}

/// Coerce a constraint value to a text key.
///
/// Integers render as SQLite renders them. A REAL's text form follows
/// SQLite's float formatting, so it is never turned into a key here.
pub fn text_key(value: &Value) -> FilterKey<String> {
    match value {
        Value::Text(s) => FilterKey::Exact(s.clone()),
        Value::Integer(i) => FilterKey::Exact(i.to_string()),
        Value::Real(_) => FilterKey::Inexact,
        Value::Null | Value::Blob(_) => FilterKey::Nothing,
    }
}

/// Planner operator for a constraint.
///
/// Only an equality compared with the `BINARY` collation is an exact-match
/// lookup; `COLLATE NOCASE` and friends match rows an index lookup would miss.
pub fn constraint_op(is_eq: bool, collation: &str) -> ConstraintOp {
    if is_eq && collation.eq_ignore_ascii_case("BINARY") {
        ConstraintOp::Eq
    } else {
        ConstraintOp::Other
    }
}
