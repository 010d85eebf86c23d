//! Uniform statistics contract for components exposing live metrics.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};

/// A single metric value.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsValue {
    /// Integer counters.
    Int(i64),
    /// Floating-point gauges and rates.
    Float(f64),
    /// Labels and state names.
    Str(String),
    /// Flags.
    Bool(bool),
}

impl StatsValue {
    /// Returns the integer value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StatsValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float value, if this is a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            StatsValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StatsValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StatsValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Renders the value as a JSON literal.
impl Display for StatsValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StatsValue::Int(v) => write!(f, "{}", v),
            StatsValue::Float(v) if v.is_finite() => write!(f, "{:.6}", v),
            StatsValue::Float(_) => f.write_str("null"),
            StatsValue::Str(v) => f.write_str(&quote(v)),
            StatsValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for StatsValue {
    fn from(value: i64) -> Self {
        StatsValue::Int(value)
    }
}

impl From<u32> for StatsValue {
    fn from(value: u32) -> Self {
        StatsValue::Int(i64::from(value))
    }
}

impl From<u64> for StatsValue {
    fn from(value: u64) -> Self {
        StatsValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for StatsValue {
    fn from(value: usize) -> Self {
        StatsValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for StatsValue {
    fn from(value: f64) -> Self {
        StatsValue::Float(value)
    }
}

impl From<&str> for StatsValue {
    fn from(value: &str) -> Self {
        StatsValue::Str(value.to_string())
    }
}

impl From<String> for StatsValue {
    fn from(value: String) -> Self {
        StatsValue::Str(value)
    }
}

impl From<bool> for StatsValue {
    fn from(value: bool) -> Self {
        StatsValue::Bool(value)
    }
}

/// Metrics keyed by name, iterated in key order.
pub type StatsMap = BTreeMap<String, StatsValue>;

/// Immutable, timestamped copy of a component's metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    component_name: String,
    timestamp: DateTime<Utc>,
    values: StatsMap,
}

impl StatsSnapshot {
    /// Creates a snapshot from already-collected values.
    pub fn new(component_name: impl Into<String>, timestamp: DateTime<Utc>, values: StatsMap) -> Self {
        Self {
            component_name: component_name.into(),
            timestamp,
            values,
        }
    }

    /// Name of the component the snapshot was taken from.
    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    /// Capture time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// All captured metrics.
    pub fn values(&self) -> &StatsMap {
        &self.values
    }

    /// Looks up a single metric.
    pub fn get(&self, key: &str) -> Option<&StatsValue> {
        self.values.get(key)
    }

    /// Serializes the snapshot.
    ///
    /// ```text
    /// {
    ///   "component": "circuit_breaker",
    ///   "timestamp": "2025-01-30T12:34:56Z",
    ///   "metrics": {
    ///     "failure_count": 2,
    ///     "is_open": true
    ///   }
    /// }
    /// ```
    pub fn to_json(&self) -> String {
        let mut json = String::from("{\n");
        json.push_str(&format!("  \"component\": {},\n", quote(&self.component_name)));
        json.push_str(&format!(
            "  \"timestamp\": \"{}\",\n",
            self.timestamp.format("%Y-%m-%dT%H:%M:%SZ")
        ));

        if self.values.is_empty() {
            json.push_str("  \"metrics\": {}\n}");
            return json;
        }

        json.push_str("  \"metrics\": {\n");
        let metrics: Vec<String> = self
            .values
            .iter()
            .map(|(key, value)| format!("    {}: {}", quote(key), value))
            .collect();
        json.push_str(&metrics.join(",\n"));
        json.push_str("\n  }\n}");
        json
    }
}

/// A component that exposes live statistics.
///
/// Implementations must compute [`get_stats`](Stats::get_stats) under their
/// own consistency boundary so that concurrent mutation never yields a torn
/// read.
pub trait Stats: Send + Sync {
    /// Stable component identifier.
    fn name(&self) -> &str;

    /// Live read of the current metrics.
    fn get_stats(&self) -> StatsMap;

    /// JSON rendering of a fresh snapshot.
    fn to_json(&self) -> String {
        self.get_snapshot().to_json()
    }

    /// Captures the current metrics as an immutable value.
    fn get_snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::new(self.name(), Utc::now(), self.get_stats())
    }
}

fn quote(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}
