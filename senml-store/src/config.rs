//! Configuration for opening a store.
use std::path::{Path, PathBuf};

/// Default number of decoded entries buffered between a scan producer and its
/// consumer.
pub const DEFAULT_SCAN_CHANNEL_CAPACITY: usize = 1024;

/// Settings for [`SenmlStore::connect`](crate::SenmlStore::connect).
///
/// # Example
///
/// ```ignore
/// use senml_store::{SenmlStore, StoreConfig};
///
/// let store = SenmlStore::connect(StoreConfig::persistent("/var/lib/sensors/store.json"))?;
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Snapshot file of the in-process engine.
    ///
    /// When set, the engine loads the file on open (if it exists) and writes
    /// its whole state back on close. When `None` (the default) the store
    /// lives in memory only.
    pub path: Option<PathBuf>,

    /// Bound of the channel a scan streams entries through. A full channel
    /// blocks the producer until the consumer catches up.
    pub scan_channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            scan_channel_capacity: DEFAULT_SCAN_CHANNEL_CAPACITY,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn persistent(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn with_scan_channel_capacity(mut self, capacity: usize) -> Self {
        self.scan_channel_capacity = capacity.max(1);
        self
    }
}
