//! SenML measurement records and packs.
//!
//! Records are kept in the shape they have on the wire (RFC 8428): each record
//! may carry base fields that apply to it and to every later record in the
//! pack until overridden. [`MeasurementPack::normalize`] resolves them once,
//! up front, so ingest and comparison code only ever see resolved records.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The single value a record carries.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `v`
    Float(f64),
    /// `vs`
    String(String),
    /// `vd`, base64 text as carried on the wire
    Data(String),
    /// `vb`
    Bool(bool),
}

/// Wire-level value fields, at most one of which may be set.
pub(crate) type ValueParts = (Option<f64>, Option<String>, Option<String>, Option<bool>);

impl Value {
    pub(crate) fn from_parts(parts: ValueParts) -> std::result::Result<Option<Value>, String> {
        let values: Vec<Value> = [
            parts.0.map(Value::Float),
            parts.1.map(Value::String),
            parts.2.map(Value::Data),
            parts.3.map(Value::Bool),
        ]
        .into_iter()
        .flatten()
        .collect();

        match values.len() {
            0 | 1 => Ok(values.into_iter().next()),
            n => Err(format!("record carries {n} values, at most one of v/vs/vd/vb is allowed")),
        }
    }

    pub(crate) fn into_parts(value: Option<Value>) -> ValueParts {
        match value {
            None => (None, None, None, None),
            Some(Value::Float(v)) => (Some(v), None, None, None),
            Some(Value::String(s)) => (None, Some(s), None, None),
            Some(Value::Data(d)) => (None, None, Some(d), None),
            Some(Value::Bool(b)) => (None, None, None, Some(b)),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Base fields of a SenML record (`bn`, `bt`, `bu`, `bver`, `bv`, `bs`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseFields {
    pub name: Option<String>,
    pub time: Option<f64>,
    pub unit: Option<String>,
    pub version: Option<i32>,
    pub value: Option<f64>,
    pub sum: Option<f64>,
}

impl BaseFields {
    pub fn is_empty(&self) -> bool {
        *self == BaseFields::default()
    }

    // Later base fields override earlier ones, field by field.
    fn absorb(&mut self, other: &BaseFields) {
        if other.name.is_some() {
            self.name = other.name.clone();
        }
        if other.time.is_some() {
            self.time = other.time;
        }
        if other.unit.is_some() {
            self.unit = other.unit.clone();
        }
        if other.version.is_some() {
            self.version = other.version;
        }
        if other.value.is_some() {
            self.value = other.value;
        }
        if other.sum.is_some() {
            self.sum = other.sum;
        }
    }
}

/// One SenML record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRecord", into = "WireRecord")]
pub struct MeasurementRecord {
    pub base: BaseFields,
    pub name: String,
    /// Seconds; relative to the base time until normalized.
    pub time: f64,
    pub unit: Option<String>,
    pub update_time: Option<f64>,
    pub value: Option<Value>,
    pub sum: Option<f64>,
}

impl MeasurementRecord {
    /// A record with a name, a time, and a value; everything else unset.
    pub fn new(name: impl Into<String>, time: f64, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            time,
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_sum(mut self, sum: f64) -> Self {
        self.sum = Some(sum);
        self
    }

    pub fn with_base(mut self, base: BaseFields) -> Self {
        self.base = base;
        self
    }

    /// Resolves this record against the accumulated base fields. Records with
    /// neither a value nor a sum only ever carried base fields and are dropped.
    fn resolve(&self, base: &BaseFields) -> Option<MeasurementRecord> {
        let value = match &self.value {
            Some(Value::Float(v)) => Some(Value::Float(offset(base.value, *v))),
            other => other.clone(),
        };
        let sum = self.sum.map(|s| offset(base.sum, s));
        if value.is_none() && sum.is_none() {
            return None;
        }

        let name = match &base.name {
            Some(prefix) => format!("{prefix}{}", self.name),
            None => self.name.clone(),
        };
        let unit = non_empty(&self.unit).or_else(|| non_empty(&base.unit));

        Some(MeasurementRecord {
            base: BaseFields::default(),
            name,
            time: offset(base.time, self.time),
            unit,
            update_time: self.update_time,
            value,
            sum,
        })
    }
}

fn offset(base: Option<f64>, value: f64) -> f64 {
    match base {
        Some(b) => b + value,
        None => value,
    }
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// An ordered batch of SenML records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementPack {
    pub records: Vec<MeasurementRecord>,
}

impl MeasurementPack {
    pub fn new(records: Vec<MeasurementRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolves base fields into every record.
    ///
    /// Pure and idempotent: normalizing a normalized pack returns an equal pack.
    pub fn normalize(&self) -> MeasurementPack {
        let mut base = BaseFields::default();
        let records = self
            .records
            .iter()
            .filter_map(|record| {
                base.absorb(&record.base);
                record.resolve(&base)
            })
            .collect();
        MeasurementPack { records }
    }

    /// Records of a normalized pack that belong to `series`, in pack order.
    pub fn series(&self, series: &str) -> MeasurementPack {
        let records = self
            .records
            .iter()
            .filter(|r| r.name == series)
            .cloned()
            .collect();
        MeasurementPack { records }
    }
}

impl FromIterator<MeasurementRecord> for MeasurementPack {
    fn from_iter<I: IntoIterator<Item = MeasurementRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Renders a pack as a SenML JSON document.
pub fn encode_json(pack: &MeasurementPack, pretty: bool) -> Result<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(pack)?
    } else {
        serde_json::to_vec(pack)?
    };
    Ok(bytes)
}

/// Parses a SenML JSON document.
pub fn decode_json(bytes: &[u8]) -> Result<MeasurementPack> {
    Ok(serde_json::from_slice(bytes)?)
}

// SenML JSON labels, RFC 8428 section 4.3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireRecord {
    #[serde(rename = "bn", default, skip_serializing_if = "Option::is_none")]
    base_name: Option<String>,
    #[serde(rename = "bt", default, skip_serializing_if = "Option::is_none")]
    base_time: Option<f64>,
    #[serde(rename = "bu", default, skip_serializing_if = "Option::is_none")]
    base_unit: Option<String>,
    #[serde(rename = "bver", default, skip_serializing_if = "Option::is_none")]
    base_version: Option<i32>,
    #[serde(rename = "bv", default, skip_serializing_if = "Option::is_none")]
    base_value: Option<f64>,
    #[serde(rename = "bs", default, skip_serializing_if = "Option::is_none")]
    base_sum: Option<f64>,
    #[serde(rename = "n", default, skip_serializing_if = "String::is_empty")]
    name: String,
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
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
    #[serde(rename = "t", default, skip_serializing_if = "is_zero")]
    time: f64,
    #[serde(rename = "ut", default, skip_serializing_if = "Option::is_none")]
    update_time: Option<f64>,
}

fn is_zero(t: &f64) -> bool {
    *t == 0.0
}

impl TryFrom<WireRecord> for MeasurementRecord {
    type Error = String;

    fn try_from(wire: WireRecord) -> std::result::Result<Self, Self::Error> {
        let value = Value::from_parts((
            wire.value,
            wire.string_value,
            wire.data_value,
            wire.bool_value,
        ))?;
        Ok(MeasurementRecord {
            base: BaseFields {
                name: wire.base_name,
                time: wire.base_time,
                unit: wire.base_unit,
                version: wire.base_version,
                value: wire.base_value,
                sum: wire.base_sum,
            },
            name: wire.name,
            time: wire.time,
            unit: wire.unit,
            update_time: wire.update_time,
            value,
            sum: wire.sum,
        })
    }
}

impl From<MeasurementRecord> for WireRecord {
    fn from(record: MeasurementRecord) -> Self {
        let (value, string_value, data_value, bool_value) = Value::into_parts(record.value);
        WireRecord {
            base_name: record.base.name,
            base_time: record.base.time,
            base_unit: record.base.unit,
            base_version: record.base.version,
            base_value: record.base.value,
            base_sum: record.base.sum,
            name: record.name,
            unit: record.unit,
            value,
            string_value,
            data_value,
            bool_value,
            sum: record.sum,
            time: record.time,
            update_time: record.update_time,
        }
    }
}
