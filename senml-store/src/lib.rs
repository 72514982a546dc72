//! SenML measurement storage over an ordered time-series engine.
//!
//! Packs of [SenML](https://www.rfc-editor.org/rfc/rfc8428) records are
//! normalized, split by effective name into series, and stored as compact
//! payloads keyed by nanosecond time. Reads stream entries back from the
//! engine and reassemble them into packs, either whole or one page at a time.
//!
//! ```ignore
//! use senml_store::{MeasurementPack, MeasurementRecord, Query, SenmlStore, StoreConfig};
//!
//! let store = SenmlStore::connect(StoreConfig::in_memory())?;
//! store.add(&MeasurementPack::new(vec![
//!     MeasurementRecord::new("current", 1543059346.0, 1.2).with_unit("A"),
//! ]))?;
//! let page = store.query(&Query::new("current", 0.0, 2e9).with_limit(50))?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod pagination;
pub mod payload;
pub mod query;
pub mod reader;
pub mod senml;
pub mod store;
pub mod time;

#[cfg(test)]
mod test;

pub use crate::{
    config::StoreConfig,
    engine::{EntryStream, MemoryEngine, TimeEntry, TimeSeriesEngine},
    error::{EngineError, Result, StoreError},
    ingest::IngestReport,
    pagination::{Page, PageIndex, Paginator},
    query::{Query, Sort},
    reader::ScanOutcome,
    senml::{BaseFields, MeasurementPack, MeasurementRecord, Value},
    store::SenmlStore,
};
