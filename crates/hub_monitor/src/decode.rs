//! Pluggable sample decoding.
//!
//! Two line-oriented formats are built in:
//!
//! ```text
//! timestamp,endpoint,metric,value
//! 2024-01-15T09:00:00Z,/v1/orders,response_time,6200
//! ```
//!
//! ```text
//! {"timestamp":"2024-01-15T09:00:00Z","endpoint":"/v1/orders","metric":"response_time","value":6200}
//! ```

use crate::error::{Error, Result};
use crate::sample::Sample;
use chrono::{DateTime, Utc};
use hub_evaluator::SampleValue;
use hub_policy::{Metric, MetricKind};
use serde::Deserialize;
use tracing::debug;

/// Decodes samples from one wire format.
pub trait SampleDecoder: Send + Sync {
    /// Format name, e.g. "csv".
    fn format_name(&self) -> &'static str;

    /// Checks whether this decoder can read input starting with `first_line`.
    fn can_handle(&self, first_line: &str) -> bool;

    /// Decodes one line. Blank and header lines yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not a valid sample.
    fn decode_line(&self, line: &str) -> Result<Option<Sample>>;

    /// Decodes a whole input.
    ///
    /// # Errors
    ///
    /// Returns the first line that fails to decode.
    fn decode(&self, input: &str) -> Result<Vec<Sample>> {
        let mut samples = Vec::new();
        for (number, line) in input.lines().enumerate() {
            let sample = self.decode_line(line).map_err(|e| match e {
                Error::Decode { format, reason } => Error::Decode {
                    format,
                    reason: format!("line {}: {reason}", number + 1),
                },
                other => other,
            })?;
            samples.extend(sample);
        }
        Ok(samples)
    }
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    timestamp: String,
    endpoint: String,
    metric: String,
    value: String,
}

/// Decoder for `timestamp,endpoint,metric,value` CSV.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDecoder;

impl CsvDecoder {
    const HEADER: &'static str = "timestamp,endpoint,metric,value";
}

impl SampleDecoder for CsvDecoder {
    fn format_name(&self) -> &'static str {
        "csv"
    }

    fn can_handle(&self, first_line: &str) -> bool {
        let line = first_line.trim();
        line.eq_ignore_ascii_case(Self::HEADER) || (!line.starts_with('{') && line.matches(',').count() >= 3)
    }

    fn decode_line(&self, line: &str) -> Result<Option<Sample>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.eq_ignore_ascii_case(Self::HEADER) {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(line.as_bytes());
        let record: CsvRecord = reader
            .deserialize()
            .next()
            .ok_or_else(|| Error::decode("csv", "empty record"))?
            .map_err(|e| Error::decode("csv", e.to_string()))?;

        let timestamp = parse_timestamp(&record.timestamp).map_err(|e| Error::decode("csv", e))?;
        if record.endpoint.is_empty() {
            return Err(Error::decode("csv", "missing endpoint"));
        }
        let metric = Metric::from_name(&record.metric);
        let value = csv_value(&metric, record.value);

        Ok(Some(Sample {
            timestamp,
            endpoint: record.endpoint,
            metric,
            value,
        }))
    }
}

/// Types a CSV cell by the metric it belongs to.
///
/// Only numeric metrics are parsed. Text and custom metrics keep the cell
/// verbatim, so `007` stays `007`; numeric comparisons still parse it.
fn csv_value(metric: &Metric, raw: String) -> SampleValue {
    if metric.kind() != MetricKind::Numeric {
        return SampleValue::Text(raw);
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() => SampleValue::Number(n),
        _ => SampleValue::Text(raw),
    }
}

/// Decoder for JSON lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesDecoder;

impl SampleDecoder for JsonLinesDecoder {
    fn format_name(&self) -> &'static str {
        "jsonl"
    }

    fn can_handle(&self, first_line: &str) -> bool {
        first_line.trim_start().starts_with('{')
    }

    fn decode_line(&self, line: &str) -> Result<Option<Sample>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| Error::decode("jsonl", e.to_string()))
    }
}

fn parse_timestamp(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{value}': {e}"))
}

/// Registry of available sample decoders.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn SampleDecoder>>,
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderRegistry {
    /// Creates a registry with the built-in decoders, most specific first.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: Vec::new(),
        };
        registry.register(Box::new(JsonLinesDecoder));
        registry.register(Box::new(CsvDecoder));
        registry
    }

    /// Registers a decoder at the end of the priority list.
    pub fn register(&mut self, decoder: Box<dyn SampleDecoder>) {
        self.decoders.push(decoder);
    }

    /// Names of registered decoders in priority order.
    pub fn formats(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|d| d.format_name()).collect()
    }

    /// Looks a decoder up by format name (`json` is accepted for `jsonl`).
    pub fn by_name(&self, name: &str) -> Option<&dyn SampleDecoder> {
        let name = match name.trim().to_ascii_lowercase().as_str() {
            "json" | "ndjson" => "jsonl".to_string(),
            other => other.to_string(),
        };
        self.decoders
            .iter()
            .find(|d| d.format_name() == name)
            .map(|d| &**d)
    }

    /// Picks a decoder, by name if given, else from the first non-blank line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFormat`] if no decoder matches.
    pub fn detect(&self, format: Option<&str>, first_line: &str) -> Result<&dyn SampleDecoder> {
        if let Some(name) = format {
            return self
                .by_name(name)
                .ok_or_else(|| Error::UnknownFormat(name.to_string()));
        }
        let decoder = self
            .decoders
            .iter()
            .find(|d| d.can_handle(first_line))
            .map(|d| &**d)
            .ok_or_else(|| Error::UnknownFormat(truncate(first_line, 40)))?;
        debug!(format = decoder.format_name(), "detected sample format");
        Ok(decoder)
    }

    /// Decodes a whole input, detecting the format if not given.
    ///
    /// # Errors
    ///
    /// Returns an error if the format is unknown or a line fails to decode.
    pub fn decode(&self, input: &str, format: Option<&str>) -> Result<Vec<Sample>> {
        let Some(first_line) = input.lines().find(|l| !l.trim().is_empty()) else {
            return Ok(Vec::new());
        };
        self.detect(format, first_line)?.decode(input)
    }
}

fn truncate(line: &str, max: usize) -> String {
    line.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hub_evaluator::Predicate;
    use hub_policy::{Condition, Operator};

    const CSV: &str = "timestamp,endpoint,metric,value
2024-01-15T09:00:00Z,/v1/orders,response_time,6200
2024-01-15T09:00:00Z,/v1/orders,error_message,\"upstream timeout, retrying\"
";

    #[test]
    fn csv_decodes_numbers_and_text() {
        let samples = DecoderRegistry::new().decode(CSV, None).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(
            samples[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
        );
        assert_eq!(samples[0].metric, Metric::ResponseTime);
        assert_eq!(samples[0].value, SampleValue::Number(6200.0));
        assert_eq!(
            samples[1].value,
            SampleValue::Text("upstream timeout, retrying".to_string())
        );
    }

    #[test]
    fn csv_keeps_text_metrics_verbatim() {
        let decode = |line: &str| CsvDecoder.decode_line(line).unwrap().unwrap().value;

        assert_eq!(
            decode("2024-01-15T09:00:00Z,/v1/orders,response_body,1.50"),
            SampleValue::Text("1.50".to_string())
        );
        assert_eq!(
            decode("2024-01-15T09:00:00Z,/v1/orders,queue_depth,007"),
            SampleValue::Text("007".to_string())
        );
        assert_eq!(
            decode("2024-01-15T09:00:00Z,/v1/orders,status_code,503"),
            SampleValue::Number(503.0)
        );
        assert_eq!(
            decode("2024-01-15T09:00:00Z,/v1/orders,status_code,n/a"),
            SampleValue::Text("n/a".to_string())
        );
    }

    #[test]
    fn csv_text_metric_matches_its_literal() {
        let sample = CsvDecoder
            .decode_line("2024-01-15T09:00:00Z,/v1/orders,response_body,1.50")
            .unwrap()
            .unwrap();
        let contains = Predicate::compile(&Condition::new(
            Metric::ResponseBody,
            Operator::Contains,
            "1.50",
        ))
        .unwrap();
        let equals =
            Predicate::compile(&Condition::new(Metric::ResponseBody, Operator::Equals, "1.50"))
                .unwrap();

        assert!(contains.test(&sample.value).unwrap());
        assert!(equals.test(&sample.value).unwrap());
    }

    #[test]
    fn jsonl_decodes() {
        let input = r#"{"timestamp":"2024-01-15T09:00:00Z","endpoint":"/v1/orders","metric":"status_code","value":503}

{"timestamp":"2024-01-15T09:01:00Z","endpoint":"/v1/orders","metric":"response_body","value":"maintenance"}"#;

        let registry = DecoderRegistry::new();
        let decoder = registry.detect(None, input.lines().next().unwrap()).unwrap();
        assert_eq!(decoder.format_name(), "jsonl");

        let samples = decoder.decode(input).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].value, SampleValue::Number(503.0));
    }

    #[test]
    fn decode_errors_carry_line_numbers() {
        let input = "timestamp,endpoint,metric,value\nyesterday,/v1/orders,response_time,1\n";
        let err = DecoderRegistry::new().decode(input, Some("csv")).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn unknown_format_is_rejected() {
        let registry = DecoderRegistry::new();
        assert!(matches!(
            registry.detect(None, "just some text"),
            Err(Error::UnknownFormat(_))
        ));
        assert!(registry.detect(Some("xml"), "").is_err());
        assert_eq!(registry.by_name("json").map(|d| d.format_name()), Some("jsonl"));
        assert_eq!(registry.formats(), vec!["jsonl", "csv"]);
    }
}
