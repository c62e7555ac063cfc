//! Metric snapshots fed to the evaluator.

use chrono::{DateTime, Utc};
use hub_policy::Metric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single observed metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Numeric sample.
    Number(f64),
    /// Text sample.
    Text(String),
}

impl SampleValue {
    /// Returns the sample as a finite number, parsing text if needed.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n).filter(|n| n.is_finite()),
            Self::Text(t) => t.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for SampleValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Latest value of each metric for one endpoint at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// When the values were observed.
    pub timestamp: DateTime<Utc>,
    /// Values keyed by metric.
    #[serde(default)]
    pub values: BTreeMap<Metric, SampleValue>,
}

impl MetricSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Adds a value, replacing any previous value for the metric.
    #[must_use]
    pub fn with(mut self, metric: impl Into<Metric>, value: impl Into<SampleValue>) -> Self {
        self.insert(metric, value);
        self
    }

    /// Sets a value, replacing any previous value for the metric.
    pub fn insert(&mut self, metric: impl Into<Metric>, value: impl Into<SampleValue>) {
        self.values.insert(metric.into(), value.into());
    }

    /// Returns the value for a metric.
    #[must_use]
    pub fn get(&self, metric: &Metric) -> Option<&SampleValue> {
        self.values.get(metric)
    }

    /// Number of metrics in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no metric was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sample_values_deserialize_untagged() {
        let json = r#"{"timestamp":"2024-01-15T09:00:00Z","values":{"response_time":6000,"error_message":"upstream reset"}}"#;
        let snapshot: MetricSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(
            snapshot.timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
        );
        assert_eq!(
            snapshot.get(&Metric::ResponseTime),
            Some(&SampleValue::Number(6000.0))
        );
        assert_eq!(
            snapshot.get(&Metric::ErrorMessage),
            Some(&SampleValue::Text("upstream reset".to_string()))
        );
    }

    #[test]
    fn text_samples_parse_as_numbers() {
        assert_eq!(SampleValue::from(" 42 ").as_number(), Some(42.0));
        assert_eq!(SampleValue::from("NaN").as_number(), None);
        assert_eq!(SampleValue::from("slow").as_number(), None);
        assert_eq!(SampleValue::from(503.0).to_string(), "503");
    }
}
