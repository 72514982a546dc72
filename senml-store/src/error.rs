//! Error types for the senml-store library.
use thiserror::Error;

/// Errors surfaced by a [`TimeSeriesEngine`](crate::engine::TimeSeriesEngine).
///
/// The store passes these through to callers unchanged.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The named series has never been written, or has been deleted.
    #[error("Series '{0}' not found")]
    SeriesNotFound(String),

    /// A page-size dependent operation was asked for pages of zero entries.
    #[error("Invalid page limit {0}: must be greater than zero")]
    InvalidLimit(usize),

    /// The scan producer disconnected without reporting a terminal status.
    #[error("Scan producer for series '{0}' terminated without a status")]
    ProducerLost(String),

    /// The scan producer thread could not be started.
    #[error("Failed to spawn scan producer: {0}")]
    Spawn(#[from] std::io::Error),

    /// A writer panicked while holding the engine state lock.
    #[error("Engine state lock poisoned")]
    LockPoisoned,

    /// Loading or saving the engine snapshot failed.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// The primary error type for operations within this library.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record in an ingested pack is not storable (e.g. it has no effective
    /// name). The whole pack is rejected before anything is written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A record could not be turned into a stored payload.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A stored payload could not be turned back into a record.
    #[error("Decoding error at key {key} in series '{series}': {reason}")]
    Decoding {
        series: String,
        key: i64,
        reason: String,
    },

    /// A timestamp is outside the range representable as an i64 nanosecond key.
    #[error("Time {0} is outside the representable nanosecond range")]
    Overflow(f64),

    /// Represents an error in the user-provided query parameters (e.g. a zero
    /// page limit or an inverted range).
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A SenML document could not be parsed or rendered.
    #[error("SenML codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Wraps an underlying error from the storage engine.
    #[error("Storage engine error: {0}")]
    Engine(#[from] EngineError),
}

/// A convenience type alias for `Result<T, StoreError>`.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
