//! Conversion between SenML seconds and the engine's nanosecond keys.
//!
//! SenML carries time as (possibly fractional, possibly negative) seconds in an
//! `f64`. The engine orders entries by an `i64` nanosecond key. Both directions
//! split the value into whole seconds and a nanosecond remainder so that no
//! intermediate `f64` product loses precision: every key derived from an
//! epoch-scale timestamp converts back to the very same `f64`, which in turn
//! converts back to the very same key. Pagination cursors rely on that.

use crate::error::{Result, StoreError};

/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Converts a SenML time in seconds to the nearest nanosecond key.
///
/// Fails with [`StoreError::Overflow`] for non-finite input and for times
/// beyond roughly ±292 years around zero.
pub fn seconds_to_key(seconds: f64) -> Result<i64> {
    if !seconds.is_finite() {
        return Err(StoreError::Overflow(seconds));
    }
    let whole = seconds.trunc();
    // i64 nanoseconds span ±9_223_372_036.85 seconds.
    if whole.abs() > (i64::MAX / NANOS_PER_SECOND) as f64 {
        return Err(StoreError::Overflow(seconds));
    }
    // Exact: `whole` and `seconds` share sign and exponent range.
    let fraction = seconds - whole;
    let nanos = (fraction * NANOS_PER_SECOND as f64).round() as i64;

    (whole as i64)
        .checked_mul(NANOS_PER_SECOND)
        .and_then(|n| n.checked_add(nanos))
        .ok_or(StoreError::Overflow(seconds))
}

/// Converts a nanosecond key back to SenML seconds.
pub fn key_to_seconds(key: i64) -> f64 {
    let whole = key / NANOS_PER_SECOND;
    let nanos = key % NANOS_PER_SECOND;
    whole as f64 + nanos as f64 / NANOS_PER_SECOND as f64
}
