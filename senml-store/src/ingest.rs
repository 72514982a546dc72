//! Turning measurement packs into per-series bulk appends.
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::{
    engine::{TimeEntry, TimeSeriesEngine},
    error::{Result, StoreError},
    payload,
    senml::MeasurementPack,
    time::seconds_to_key,
};

/// Entries written per series by one ingest call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub series: BTreeMap<String, usize>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.series.values().sum()
    }
}

/// Normalizes `pack`, then writes it with one append per series.
///
/// Every record is validated and encoded before anything is written, so a
/// record without a name, with an unencodable value, or with a time outside
/// the key range rejects the whole pack.
///
/// Appends are not atomic across series: series are written in name order and
/// the first failing append is returned as is, leaving the series written
/// before it in place.
pub fn add<E: TimeSeriesEngine + ?Sized>(engine: &E, pack: &MeasurementPack) -> Result<IngestReport> {
    let normalized = pack.normalize();

    let mut groups: BTreeMap<String, Vec<TimeEntry>> = BTreeMap::new();
    for (index, record) in normalized.records.iter().enumerate() {
        if record.name.is_empty() {
            return Err(StoreError::Validation(format!(
                "record {index} has an empty name after normalization"
            )));
        }
        let key = seconds_to_key(record.time)?;
        let payload = payload::encode(record)?;
        groups
            .entry(record.name.clone())
            .or_default()
            .push(TimeEntry::new(key, payload));
    }

    info!(
        records = normalized.len(),
        series = groups.len(),
        "Ingesting measurement pack"
    );

    let mut report = IngestReport::default();
    for (series, entries) in groups {
        let count = entries.len();
        engine.append(&series, entries)?;
        debug!(series = %series, count, "Appended series batch");
        report.series.insert(series, count);
    }
    Ok(report)
}
