//! Aggregation over source readings
//!
//! Pure functions: no state machine access, no logging.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ha_core::{STATE_UNAVAILABLE, STATE_UNKNOWN};
use serde::{Deserialize, Serialize};

use crate::MinMaxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Min,
    #[default]
    Max,
    Mean,
    Median,
    /// Value of the most recently updated source
    Last,
    /// max - min
    Range,
    Sum,
}

impl SensorType {
    pub const ALL: [SensorType; 7] = [
        SensorType::Min,
        SensorType::Max,
        SensorType::Mean,
        SensorType::Median,
        SensorType::Last,
        SensorType::Range,
        SensorType::Sum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Min => "min",
            SensorType::Max => "max",
            SensorType::Mean => "mean",
            SensorType::Median => "median",
            SensorType::Last => "last",
            SensorType::Range => "range",
            SensorType::Sum => "sum",
        }
    }

    /// Name used when a YAML sensor has none, e.g. "Max sensor"
    pub fn default_name(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => format!("{}{} sensor", first.to_uppercase(), chars.as_str()),
            None => "Sensor".to_string(),
        }
    }
}

impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorType {
    type Err = MinMaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| MinMaxError::InvalidType(s.to_string()))
    }
}

/// Current state of one source entity
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub entity_id: String,
    pub state: String,
    pub last_updated: DateTime<Utc>,
}

impl Reading {
    /// Numeric value, if the state is a finite number
    pub fn value(&self) -> Option<f64> {
        parse_state(&self.state)
    }
}

/// Parse a state string, rejecting sentinels, garbage and non-finite numbers
pub fn parse_state(state: &str) -> Option<f64> {
    if state == STATE_UNAVAILABLE || state == STATE_UNKNOWN {
        return None;
    }
    state
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    /// Rounded result; `None` when no reading was usable
    pub value: Option<f64>,
    /// Number of readings that contributed
    pub count: usize,
    pub min_entity_id: Option<String>,
    pub max_entity_id: Option<String>,
    pub last_entity_id: Option<String>,
}

/// Aggregate `readings` and round the result to `round_digits`
///
/// Readings that are not numeric are skipped rather than counted as zero.
/// On ties the first reading in input order holds the min/max; for `last`
/// the most recent `last_updated` wins, later readings breaking ties.
pub fn aggregate(readings: &[Reading], sensor_type: SensorType, round_digits: u32) -> Aggregate {
    let valid: Vec<(&Reading, f64)> = readings
        .iter()
        .filter_map(|r| r.value().map(|v| (r, v)))
        .collect();

    let Some(&(first, first_value)) = valid.first() else {
        return Aggregate::default();
    };

    let (mut min, mut max) = ((first, first_value), (first, first_value));
    for &(reading, value) in &valid[1..] {
        if value < min.1 {
            min = (reading, value);
        }
        if value > max.1 {
            max = (reading, value);
        }
    }
    let last = valid
        .iter()
        .max_by_key(|(reading, _)| reading.last_updated)
        .map_or((first, first_value), |&(r, v)| (r, v));

    let values: Vec<f64> = valid.iter().map(|&(_, v)| v).collect();
    let raw = match sensor_type {
        SensorType::Min => min.1,
        SensorType::Max => max.1,
        SensorType::Mean => values.iter().sum::<f64>() / values.len() as f64,
        SensorType::Median => median(values),
        SensorType::Last => last.1,
        SensorType::Range => max.1 - min.1,
        SensorType::Sum => values.iter().sum(),
    };

    Aggregate {
        value: Some(round_to(raw, round_digits)),
        count: valid.len(),
        min_entity_id: Some(min.0.entity_id.clone()),
        max_entity_id: Some(max.0.entity_id.clone()),
        last_entity_id: Some(last.0.entity_id.clone()),
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Round to `digits` decimals, ties to even on the exact binary value
pub fn round_to(value: f64, digits: u32) -> f64 {
    format!("{:.*}", digits as usize, value)
        .parse()
        .unwrap_or(value)
}

/// Render a value as a state string
///
/// Shortest round-trip digits. Magnitudes in `[1e-4, 1e16)` use plain
/// notation with integral values keeping a `.0`; anything outside uses
/// exponent notation with a signed two-digit exponent (`1e-06`, `1e+16`).
pub fn format_state(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{:e}", value);
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) => {
                let exponent: i32 = exponent.parse().unwrap_or_default();
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{}e{}{:02}", mantissa, sign, exponent.abs())
            }
            None => formatted,
        };
    }

    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
