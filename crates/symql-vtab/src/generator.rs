//! Lazy, single-pass record producers.
//!
//! A [`Generator`] is the only thing a table needs to supply to be queryable:
//! it hands out one record at a time and never looks back. The bridge in
//! [`crate::bridge`] pulls from it as SQLite asks for rows, so a query that
//! stops early (`LIMIT`, `EXISTS`, a failed join lookup) never enumerates the
//! rest of the source.
//!
//! # Contract
//!
//! - [`Generator::advance`] moves to the next record and returns `true`, or
//!   returns `false` once the source is exhausted. After the first `false`
//!   every further call also returns `false`.
//! - [`Generator::current`] is `Some` only between a successful `advance` and
//!   the next call to `advance`.
//! - [`Generator::rowid`] identifies the record within its table. The full
//!   scan and every filter of one table report the same rowid for the same
//!   record, and rowids strictly increase across successful advances of a
//!   single instance. SQLite unions the filtered scans of an `OR` by rowid.
//!
//! A generator cannot be rewound; a new scan needs a new instance.

use tracing::warn;

use crate::error::SourceError;

/// A single-pass producer of records of type `T`.
pub trait Generator<T> {
    /// Advance to the next record. Returns `false` when exhausted.
    fn advance(&mut self) -> bool;

    /// The record produced by the last successful [`advance`](Self::advance).
    fn current(&self) -> Option<&T>;

    /// Stable identifier of the current record within its table.
    fn rowid(&self) -> i64;
}

/// Boxed generator as produced by scan and filter factories.
pub type BoxGenerator<T> = Box<dyn Generator<T>>;

impl<T, G: Generator<T> + ?Sized> Generator<T> for Box<G> {
    fn advance(&mut self) -> bool {
        (**self).advance()
    }

    fn current(&self) -> Option<&T> {
        (**self).current()
    }

    fn rowid(&self) -> i64 {
        (**self).rowid()
    }
}

/// Adapts any iterator into a [`Generator`], numbering rows from zero.
///
/// Rowids are positions in the iterator, which suits full scans. A filter
/// over the same records must report the full-scan position instead; use
/// [`KeyedGenerator`] for that.
pub struct IterGenerator<T, I> {
    iter: I,
    current: Option<T>,
    rowid: i64,
    done: bool,
}

impl<T, I> IterGenerator<T, I>
where
    I: Iterator<Item = T>,
{
    pub fn new(iter: I) -> Self {
        Self {
            iter,
            current: None,
            rowid: -1,
            done: false,
        }
    }
}

impl<T, I> Generator<T> for IterGenerator<T, I>
where
    I: Iterator<Item = T>,
{
    fn advance(&mut self) -> bool {
        if self.done {
            return false;
        }
        match self.iter.next() {
            Some(record) => {
                self.current = Some(record);
                self.rowid += 1;
                true
            }
            None => {
                self.current = None;
                self.done = true;
                false
            }
        }
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn rowid(&self) -> i64 {
        self.rowid.max(0)
    }
}

/// Adapts an iterator of `(rowid, record)` pairs, taking rowids from the
/// source.
pub struct KeyedGenerator<T, I> {
    iter: I,
    current: Option<(i64, T)>,
    done: bool,
}

impl<T, I> KeyedGenerator<T, I>
where
    I: Iterator<Item = (i64, T)>,
{
    pub fn new(iter: I) -> Self {
        Self {
            iter,
            current: None,
            done: false,
        }
    }
}

impl<T, I> Generator<T> for KeyedGenerator<T, I>
where
    I: Iterator<Item = (i64, T)>,
{
    fn advance(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.current = self.iter.next();
        if self.current.is_none() {
            self.done = true;
        }
        self.current.is_some()
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref().map(|(_, record)| record)
    }

    fn rowid(&self) -> i64 {
        self.current.as_ref().map_or(0, |(rowid, _)| *rowid)
    }
}

/// Adapts an iterator of `Result`s. The first `Err` ends the scan.
///
/// This is how a source reports that enumeration broke part way: the rows
/// already produced stand, and the table simply has no more.
pub struct FallibleGenerator<T, I> {
    iter: I,
    current: Option<T>,
    rowid: i64,
    done: bool,
    label: &'static str,
}

impl<T, I> FallibleGenerator<T, I>
where
    I: Iterator<Item = Result<T, SourceError>>,
{
    /// `label` names the source in the warning logged on failure.
    pub fn new(label: &'static str, iter: I) -> Self {
        Self {
            iter,
            current: None,
            rowid: -1,
            done: false,
            label,
        }
    }
}

impl<T, I> Generator<T> for FallibleGenerator<T, I>
where
    I: Iterator<Item = Result<T, SourceError>>,
{
    fn advance(&mut self) -> bool {
        if self.done {
            return false;
        }
        match self.iter.next() {
            Some(Ok(record)) => {
                self.current = Some(record);
                self.rowid += 1;
                return true;
            }
            Some(Err(e)) => {
                warn!(source = self.label, error = %e, "Record source failed mid-scan, ending scan");
            }
            None => {}
        }
        self.current = None;
        self.done = true;
        false
    }

    fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    fn rowid(&self) -> i64 {
        self.rowid.max(0)
    }
}

/// A generator with no rows.
pub struct EmptyGenerator;

impl<T> Generator<T> for EmptyGenerator {
    fn advance(&mut self) -> bool {
        false
    }

    fn current(&self) -> Option<&T> {
        None
    }

    fn rowid(&self) -> i64 {
        0
    }
}

/// Box an [`EmptyGenerator`] for a record type.
pub fn empty<T: 'static>() -> BoxGenerator<T> {
    Box::new(EmptyGenerator)
}

/// Box an iterator as a generator numbered from zero. See [`IterGenerator`].
pub fn from_iter<T, I>(iter: I) -> BoxGenerator<T>
where
    T: 'static,
    I: Iterator<Item = T> + 'static,
{
    Box::new(IterGenerator::new(iter))
}

/// Box an iterator of `(rowid, record)` pairs as a generator.
pub fn keyed<T, I>(iter: I) -> BoxGenerator<T>
where
    T: 'static,
    I: Iterator<Item = (i64, T)> + 'static,
{
    Box::new(KeyedGenerator::new(iter))
}
