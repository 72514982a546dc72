//! Record <-> stored payload mapping.
//!
//! A payload is a compact JSON object using the SenML short labels for the
//! fields a series entry does not already carry in its name and key: unit,
//! update time, value and sum. Absent fields are omitted.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    error::{Result, StoreError},
    senml::{MeasurementRecord, Value},
    time::key_to_seconds,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(rename = "ut", default, skip_serializing_if = "Option::is_none")]
    update_time: Option<f64>,
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(rename = "vs", default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(rename = "vd", default, skip_serializing_if = "Option::is_none")]
    data_value: Option<String>,
    #[serde(rename = "vb", default, skip_serializing_if = "Option::is_none")]
    bool_value: Option<bool>,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    sum: Option<f64>,
}

// JSON has no encoding for NaN or infinities; serde_json would write `null`
// and the value would silently come back as absent.
fn finite(label: &str, number: Option<f64>) -> Result<Option<f64>> {
    match number {
        Some(n) if !n.is_finite() => Err(StoreError::Encoding(format!(
            "field '{label}' holds non-finite number {n}"
        ))),
        other => Ok(other),
    }
}

/// Encodes the payload part of a normalized record.
pub fn encode(record: &MeasurementRecord) -> Result<Vec<u8>> {
    let (value, string_value, data_value, bool_value) = Value::into_parts(record.value.clone());
    let stored = StoredRecord {
        unit: record.unit.clone(),
        update_time: finite("ut", record.update_time)?,
        value: finite("v", value)?,
        string_value,
        data_value,
        bool_value,
        sum: finite("s", record.sum)?,
    };
    serde_json::to_vec(&stored).map_err(|e| StoreError::Encoding(e.to_string()))
}

/// Rebuilds a record of `series` from the payload stored under `key`.
///
/// The entry key is authoritative for time: both `time` and `update_time` of
/// the returned record are set from it.
pub fn decode(payload: &[u8], key: i64, series: &str) -> Result<MeasurementRecord> {
    let decoding_error = |reason: String| StoreError::Decoding {
        series: series.to_string(),
        key,
        reason,
    };
    let stored: StoredRecord =
        serde_json::from_slice(payload).map_err(|e| decoding_error(e.to_string()))?;
    let value = Value::from_parts((
        stored.value,
        stored.string_value,
        stored.data_value,
        stored.bool_value,
    ))
    .map_err(decoding_error)?;

    let time = key_to_seconds(key);
    trace!(series, key, "Decoded stored record");
    Ok(MeasurementRecord {
        name: series.to_string(),
        time,
        unit: stored.unit,
        update_time: Some(time),
        value,
        sum: stored.sum,
        ..Default::default()
    })
}
