//! The storage engine boundary.
//!
//! The store never touches series data directly. It hands encoded entries to a
//! [`TimeSeriesEngine`] and reads them back through [`EntryStream`]s. Any
//! engine that keeps each series ordered by key can sit behind this trait;
//! [`MemoryEngine`] is the in-process implementation shipped with the crate.

mod memory;
mod stream;

use serde::{Deserialize, Serialize};

use crate::{error::EngineError, query::KeyQuery};

pub use memory::MemoryEngine;
pub use stream::{EntryStream, ScanProducer};

/// One stored measurement: its nanosecond key and its encoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub key: i64,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl TimeEntry {
    pub fn new(key: i64, payload: Vec<u8>) -> Self {
        Self { key, payload }
    }
}

/// A keyed, per-series ordered time-series store.
///
/// Implementations must be safe to share between threads; the store adds no
/// locking of its own, so per-series write ordering and isolation are the
/// engine's to define.
pub trait TimeSeriesEngine: Send + Sync {
    /// Inserts `entries` into `series`, creating the series if needed.
    fn append(&self, series: &str, entries: Vec<TimeEntry>) -> Result<(), EngineError>;

    /// Streams every entry of `series` in ascending key order.
    fn scan_all(&self, series: &str) -> EntryStream;

    /// Streams up to `query.limit` entries (0: no limit) with keys in
    /// `[query.start, query.end]`, in `query.sort` order. The stream's cursor
    /// is the key of the first entry past the page, if any.
    fn scan_range(&self, query: &KeyQuery) -> EntryStream;

    /// Keys of the first entry of every `query.limit`-sized page of the range,
    /// in `query.sort` order, plus the number of entries in the range.
    fn page_boundaries(&self, query: &KeyQuery) -> Result<(Vec<i64>, usize), EngineError>;

    /// Removes `series` entirely.
    fn delete_series(&self, series: &str) -> Result<(), EngineError>;

    /// Releases the engine. Called once, when the owning store disconnects.
    fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
