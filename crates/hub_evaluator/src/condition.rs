//! Condition compilation and sample comparison.
//!
//! A [`Condition`] stores its threshold as configured text. Compiling it
//! checks the threshold against the operator and the metric's declared type
//! and yields a [`Predicate`] that can be tested against samples. A condition
//! that fails to compile never fires.

use crate::error::ConditionError;
use crate::snapshot::SampleValue;
use chrono::Duration;
use hub_policy::{Condition, Metric, MetricKind, Operator};

/// Threshold for `equals` / `not_equals`.
#[derive(Debug, Clone, PartialEq)]
pub struct Exact {
    /// Threshold text, used when either side is not numeric.
    pub text: String,
    /// Threshold as a number, if it parses.
    pub number: Option<f64>,
}

/// A compiled comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    /// Sample > threshold.
    GreaterThan(f64),
    /// Sample < threshold.
    LessThan(f64),
    /// Sample == threshold.
    Equals(Exact),
    /// Sample != threshold.
    NotEquals(Exact),
    /// Sample text contains the needle.
    Contains(String),
    /// `min <= sample <= max`.
    Between {
        /// Lower bound (inclusive).
        min: f64,
        /// Upper bound (inclusive).
        max: f64,
    },
}

/// A condition ready to be tested against samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    metric: Metric,
    comparison: Comparison,
    duration_minutes: u32,
}

impl Predicate {
    /// Compiles a condition.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::MalformedValue`] if the threshold does not fit
    /// the operator, or [`ConditionError::UnsupportedOperator`] if the operator
    /// does not apply to the metric's declared type.
    pub fn compile(condition: &Condition) -> Result<Self, ConditionError> {
        let metric = condition.metric.clone();
        let operator = condition.operator;
        let kind = metric.kind();
        let value = condition.value.trim();

        let unsupported = || ConditionError::UnsupportedOperator {
            metric: metric.clone(),
            operator,
        };
        let malformed = |expected: &str| ConditionError::MalformedValue {
            value: condition.value.clone(),
            operator,
            expected: expected.to_string(),
        };

        let comparison = match operator {
            Operator::GreaterThan | Operator::LessThan => {
                if kind == MetricKind::Text {
                    return Err(unsupported());
                }
                let threshold = parse_number(value).ok_or_else(|| malformed("a number"))?;
                if operator == Operator::GreaterThan {
                    Comparison::GreaterThan(threshold)
                } else {
                    Comparison::LessThan(threshold)
                }
            }
            Operator::Equals | Operator::NotEquals => {
                let number = if kind == MetricKind::Text {
                    None
                } else {
                    parse_number(value)
                };
                if kind == MetricKind::Numeric && number.is_none() {
                    return Err(malformed("a number"));
                }
                let exact = Exact {
                    text: value.to_string(),
                    number,
                };
                if operator == Operator::Equals {
                    Comparison::Equals(exact)
                } else {
                    Comparison::NotEquals(exact)
                }
            }
            Operator::Contains => {
                if kind == MetricKind::Numeric {
                    return Err(unsupported());
                }
                Comparison::Contains(value.to_string())
            }
            Operator::Between => {
                if kind == MetricKind::Text {
                    return Err(unsupported());
                }
                let (min, max) =
                    parse_range(value).ok_or_else(|| malformed("'min,max' with min <= max"))?;
                Comparison::Between { min, max }
            }
        };

        Ok(Self {
            metric,
            comparison,
            duration_minutes: condition.duration_minutes,
        })
    }

    /// Metric the predicate reads.
    #[must_use]
    pub const fn metric(&self) -> &Metric {
        &self.metric
    }

    /// Compiled comparison.
    #[must_use]
    pub const fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    /// Sustain window the comparison must hold for.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Tests a sample.
    ///
    /// # Errors
    ///
    /// Returns [`ConditionError::SampleType`] if a numeric comparison receives a
    /// sample that is not a number.
    pub fn test(&self, sample: &SampleValue) -> Result<bool, ConditionError> {
        match &self.comparison {
            Comparison::GreaterThan(threshold) => Ok(self.numeric(sample)? > *threshold),
            Comparison::LessThan(threshold) => Ok(self.numeric(sample)? < *threshold),
            Comparison::Between { min, max } => {
                let n = self.numeric(sample)?;
                Ok(*min <= n && n <= *max)
            }
            Comparison::Equals(exact) => self.equals(exact, sample),
            Comparison::NotEquals(exact) => self.equals(exact, sample).map(|eq| !eq),
            Comparison::Contains(needle) => Ok(sample.to_string().contains(needle.as_str())),
        }
    }

    fn equals(&self, exact: &Exact, sample: &SampleValue) -> Result<bool, ConditionError> {
        if self.metric.kind() == MetricKind::Numeric {
            let n = self.numeric(sample)?;
            return Ok(exact.number.is_some_and(|t| (t - n).abs() < f64::EPSILON));
        }
        match (exact.number, sample.as_number()) {
            (Some(t), Some(n)) => Ok((t - n).abs() < f64::EPSILON),
            _ => Ok(sample.to_string() == exact.text),
        }
    }

    fn numeric(&self, sample: &SampleValue) -> Result<f64, ConditionError> {
        sample.as_number().ok_or_else(|| ConditionError::SampleType {
            metric: self.metric.clone(),
            expected: "a number".to_string(),
            found: sample.to_string(),
        })
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses `min,max`, optionally wrapped in brackets.
fn parse_range(value: &str) -> Option<(f64, f64)> {
    let inner = value
        .strip_prefix('[')
        .and_then(|v| v.strip_suffix(']'))
        .unwrap_or(value);
    let (min, max) = inner.split_once(',')?;
    let (min, max) = (parse_number(min.trim())?, parse_number(max.trim())?);
    (min <= max).then_some((min, max))
}
