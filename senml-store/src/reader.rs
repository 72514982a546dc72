//! Draining engine scans into measurement packs.
use tracing::{debug, warn};

use crate::{
    engine::EntryStream,
    error::{EngineError, Result},
    payload,
    senml::MeasurementPack,
};

/// Everything one scan produced.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Decoded records, in the order the engine produced them.
    pub pack: MeasurementPack,
    /// Key of the first entry past the scanned page, if any.
    pub next: Option<i64>,
    /// Terminal status reported by the engine.
    pub status: Result<(), EngineError>,
    /// Entries whose payload could not be decoded.
    pub skipped: usize,
}

impl ScanOutcome {
    /// The pack and cursor, or the engine's error. A failed scan is a failure
    /// regardless of how many records arrived before it failed.
    pub fn into_result(self) -> Result<(MeasurementPack, Option<i64>)> {
        self.status?;
        Ok((self.pack, self.next))
    }
}

/// Consumes every entry of `stream`, then its cursor and status.
///
/// Entries that fail to decode are logged and skipped; the scan carries on so
/// that one corrupt entry does not hide the rest of the series. The outcome is
/// only returned once the engine has reported its terminal status.
pub fn drain(mut stream: EntryStream) -> ScanOutcome {
    let series = stream.series().to_string();
    let mut pack = MeasurementPack::default();
    let mut skipped = 0;

    for entry in stream.by_ref() {
        match payload::decode(&entry.payload, entry.key, &series) {
            Ok(record) => pack.records.push(record),
            Err(e) => {
                skipped += 1;
                warn!(series = %series, key = entry.key, error = %e, "Skipping undecodable entry");
            }
        }
    }

    let (next, status) = match stream.finish() {
        Ok(next) => (next, Ok(())),
        Err(e) => (None, Err(e)),
    };
    debug!(
        series = %series,
        records = pack.len(),
        skipped,
        ?next,
        ok = status.is_ok(),
        "Scan drained"
    );

    ScanOutcome {
        pack,
        next,
        status,
        skipped,
    }
}
