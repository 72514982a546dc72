//! The store facade: SenML packs in, SenML packs out.
use tracing::{debug, info};

use crate::{
    config::StoreConfig,
    engine::{MemoryEngine, TimeSeriesEngine},
    error::Result,
    ingest::{self, IngestReport},
    pagination::{self, Page, PageIndex, Paginator},
    query::Query,
    reader::{self, ScanOutcome},
    senml::MeasurementPack,
};

/// A SenML measurement store over a [`TimeSeriesEngine`].
///
/// Every record is stored under its effective name, keyed by its time in
/// nanoseconds. The store is stateless apart from the engine it owns; all
/// methods take `&self` and can be called from several threads at once.
pub struct SenmlStore<E: TimeSeriesEngine = MemoryEngine> {
    engine: E,
}

impl SenmlStore<MemoryEngine> {
    /// Opens a store backed by the in-process engine.
    pub fn connect(config: StoreConfig) -> Result<Self> {
        info!(path = ?config.path, "Connecting SenML store");
        let engine = MemoryEngine::open(config)?;
        Ok(Self { engine })
    }
}

impl<E: TimeSeriesEngine> SenmlStore<E> {
    /// Wraps an already opened engine.
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Normalizes `pack` and writes every record to its series.
    ///
    /// See [`ingest::add`] for the failure contract: invalid packs are
    /// rejected before any write, but a failed append does not undo the
    /// series written before it.
    pub fn add(&self, pack: &MeasurementPack) -> Result<IngestReport> {
        if pack.is_empty() {
            info!("Add called with 0 records. No changes made.");
            return Ok(IngestReport::default());
        }
        let report = ingest::add(&self.engine, pack)?;
        info!(
            records = report.total(),
            series = report.series.len(),
            "Added measurement pack"
        );
        Ok(report)
    }

    /// Every record of `series`, oldest first.
    pub fn get(&self, series: &str) -> Result<MeasurementPack> {
        let (pack, _) = self.scan(series).into_result()?;
        Ok(pack)
    }

    /// Full scan of `series`, keeping partial results and skip counts.
    pub fn scan(&self, series: &str) -> ScanOutcome {
        debug!(series, "Scanning series");
        reader::drain(self.engine.scan_all(series))
    }

    /// One page of a range query.
    pub fn query(&self, query: &Query) -> Result<Page> {
        pagination::query(&self.engine, query)
    }

    /// Start times of every page of a range query, plus its entry count.
    pub fn get_pages(&self, query: &Query) -> Result<PageIndex> {
        pagination::pages(&self.engine, query)
    }

    /// Iterates over every page of a range query.
    pub fn paginate(&self, query: Query) -> Paginator<'_, E> {
        Paginator::new(&self.engine, query)
    }

    /// Removes `series` and all of its records.
    pub fn delete(&self, series: &str) -> Result<()> {
        self.engine.delete_series(series)?;
        info!(series, "Deleted series");
        Ok(())
    }

    /// Closes the engine, persisting it if it is configured to.
    pub fn disconnect(self) -> Result<()> {
        info!("Disconnecting SenML store");
        self.engine.close()?;
        Ok(())
    }
}
