//! In-process engine: one ordered map per series, scans streamed from a
//! producer thread, optional JSON snapshot file.
use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use super::{EntryStream, TimeEntry, TimeSeriesEngine};
use crate::{
    config::StoreConfig,
    error::EngineError,
    query::{KeyQuery, Sort},
};

type Series = BTreeMap<i64, Vec<u8>>;

// State written to the snapshot file.
#[derive(Serialize, Deserialize, Default)]
struct EngineSnapshot {
    series: BTreeMap<String, Vec<TimeEntry>>,
}

/// A [`TimeSeriesEngine`] keeping every series in memory.
///
/// Writing an existing key replaces its payload. Scans work on a snapshot of
/// the matching entries taken when the scan starts, so writers are never
/// blocked by a slow consumer.
pub struct MemoryEngine {
    series: RwLock<HashMap<String, Series>>,
    config: StoreConfig,
}

impl MemoryEngine {
    /// Creates an empty engine, ignoring any snapshot file.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Opens the engine, loading the snapshot file named by the config if it
    /// exists.
    pub fn open(config: StoreConfig) -> Result<Self, EngineError> {
        match config.path.clone() {
            Some(path) if path.exists() => {
                info!("Loading engine snapshot from: {:?}", path);
                let series = Self::load_snapshot(&path)?;
                debug!(series = series.len(), "Loaded engine snapshot");
                Ok(Self {
                    series: RwLock::new(series),
                    config,
                })
            }
            Some(path) => {
                info!(
                    "Snapshot file not found at {:?}. Starting with an empty engine.",
                    path
                );
                Ok(Self::new(config))
            }
            None => {
                debug!("No snapshot path configured. Starting in-memory engine.");
                Ok(Self::new(config))
            }
        }
    }

    fn load_snapshot(path: &Path) -> Result<HashMap<String, Series>, EngineError> {
        let file = File::open(path).map_err(|e| {
            EngineError::Persistence(format!("Failed to open snapshot {:?}: {}", path, e))
        })?;
        let snapshot: EngineSnapshot =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                EngineError::Persistence(format!(
                    "Failed to deserialize snapshot from {:?}: {}",
                    path, e
                ))
            })?;

        Ok(snapshot
            .series
            .into_iter()
            .map(|(name, entries)| {
                let series = entries.into_iter().map(|e| (e.key, e.payload)).collect();
                (name, series)
            })
            .collect())
    }

    /// Writes the whole engine state to the configured snapshot file.
    pub fn save_snapshot(&self) -> Result<(), EngineError> {
        let Some(path) = &self.config.path else {
            debug!("No snapshot path configured, nothing to save.");
            return Ok(());
        };
        info!("Saving engine snapshot to: {:?}", path);

        let snapshot = {
            let state = self.read()?;
            EngineSnapshot {
                series: state
                    .iter()
                    .map(|(name, series)| {
                        let entries = series
                            .iter()
                            .map(|(key, payload)| TimeEntry::new(*key, payload.clone()))
                            .collect();
                        (name.clone(), entries)
                    })
                    .collect(),
            }
        };

        let file = File::create(path).map_err(|e| {
            EngineError::Persistence(format!("Failed to create snapshot {:?}: {}", path, e))
        })?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &snapshot).map_err(|e| {
            EngineError::Persistence(format!("Failed to serialize snapshot to {:?}: {}", path, e))
        })?;
        writer.flush().map_err(|e| {
            EngineError::Persistence(format!("Failed to write snapshot {:?}: {}", path, e))
        })?;

        debug!(series = snapshot.series.len(), "Saved engine snapshot");
        Ok(())
    }

    /// Names of all series currently held, in no particular order.
    pub fn series_names(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.read()?.keys().cloned().collect())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Series>>, EngineError> {
        self.series.read().map_err(|_| EngineError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Series>>, EngineError> {
        self.series.write().map_err(|_| EngineError::LockPoisoned)
    }

    /// Streams `entries` to a new scan from a producer thread.
    fn stream(&self, series: &str, entries: Vec<TimeEntry>, next: Option<i64>) -> EntryStream {
        let (producer, stream) = EntryStream::channel(series, self.config.scan_channel_capacity);
        let name = series.to_string();
        let spawned = thread::Builder::new()
            .name("senml-scan".into())
            .spawn(move || {
                let total = entries.len();
                for (sent, entry) in entries.into_iter().enumerate() {
                    if !producer.send(entry) {
                        warn!(series = %name, sent, total, "Scan consumer went away, stopping producer");
                        return;
                    }
                }
                trace!(series = %name, total, ?next, "Scan producer finished");
                producer.complete(next, Ok(()));
            });

        match spawned {
            Ok(_) => stream,
            Err(e) => {
                error!(series, error = %e, "Failed to spawn scan producer");
                EntryStream::failed(series, EngineError::Spawn(e))
            }
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Entries of `series` within `[start, end]`, walked in `sort` order.
fn select<'a>(
    series: &'a Series,
    query: &KeyQuery,
) -> Box<dyn Iterator<Item = (&'a i64, &'a Vec<u8>)> + 'a> {
    // BTreeMap::range panics on an inverted range.
    if query.start > query.end {
        return Box::new(std::iter::empty());
    }
    let range = series.range(query.start..=query.end);
    match query.sort {
        Sort::Asc => Box::new(range),
        Sort::Desc => Box::new(range.rev()),
    }
}

impl TimeSeriesEngine for MemoryEngine {
    fn append(&self, series: &str, entries: Vec<TimeEntry>) -> Result<(), EngineError> {
        let mut state = self.write()?;
        let target = state.entry(series.to_string()).or_default();
        let count = entries.len();
        for entry in entries {
            target.insert(entry.key, entry.payload);
        }
        trace!(series, count, len = target.len(), "Appended entries");
        Ok(())
    }

    fn scan_all(&self, series: &str) -> EntryStream {
        let entries: Option<Vec<TimeEntry>> = match self.read() {
            Ok(state) => state.get(series).map(|data| {
                data.iter()
                    .map(|(key, payload)| TimeEntry::new(*key, payload.clone()))
                    .collect()
            }),
            Err(e) => return EntryStream::failed(series, e),
        };

        match entries {
            Some(entries) => self.stream(series, entries, None),
            None => EntryStream::failed(series, EngineError::SeriesNotFound(series.to_string())),
        }
    }

    fn scan_range(&self, query: &KeyQuery) -> EntryStream {
        let page = match self.read() {
            Ok(state) => state.get(&query.series).map(|data| {
                let take = if query.limit == 0 { usize::MAX } else { query.limit };
                let mut in_range = select(data, query);
                let entries: Vec<TimeEntry> = in_range
                    .by_ref()
                    .take(take)
                    .map(|(key, payload)| TimeEntry::new(*key, payload.clone()))
                    .collect();
                let next = in_range.next().map(|(key, _)| *key);
                (entries, next)
            }),
            Err(e) => return EntryStream::failed(&query.series, e),
        };

        match page {
            Some((entries, next)) => self.stream(&query.series, entries, next),
            None => EntryStream::failed(
                &query.series,
                EngineError::SeriesNotFound(query.series.clone()),
            ),
        }
    }

    fn page_boundaries(&self, query: &KeyQuery) -> Result<(Vec<i64>, usize), EngineError> {
        if query.limit == 0 {
            return Err(EngineError::InvalidLimit(query.limit));
        }
        let state = self.read()?;
        let data = state
            .get(&query.series)
            .ok_or_else(|| EngineError::SeriesNotFound(query.series.clone()))?;

        let mut count = 0;
        let mut boundaries = Vec::new();
        for (key, _) in select(data, query) {
            if count % query.limit == 0 {
                boundaries.push(*key);
            }
            count += 1;
        }
        Ok((boundaries, count))
    }

    fn delete_series(&self, series: &str) -> Result<(), EngineError> {
        match self.write()?.remove(series) {
            Some(removed) => {
                debug!(series, entries = removed.len(), "Deleted series");
                Ok(())
            }
            None => Err(EngineError::SeriesNotFound(series.to_string())),
        }
    }

    fn close(&self) -> Result<(), EngineError> {
        self.save_snapshot()
    }
}
