//! Serializable records shared by the registry, the API, and the state store.
//!
//! A [`ValueSpec`] is the wire/storage form of one labeled generator; a
//! [`MetricRecord`] is the full structured form of a metric. Parameters are
//! stored canonically (seconds as integers, magnitudes as floats) so that a
//! record serialized, parsed, and serialized again is byte-identical.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::units::{deserialize_duration, deserialize_size};

/// Discriminant of the five waveform kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Static,
    Ramp,
    Square,
    Sine,
    Gaussian,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Static => "static",
            ValueKind::Ramp => "ramp",
            ValueKind::Square => "square",
            ValueKind::Sine => "sine",
            ValueKind::Gaussian => "gaussian",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_duty_cycle() -> f64 {
    50.0
}

/// One labeled generator as written in config files and API bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueSpec {
    Static {
        labels: Vec<String>,
        #[serde(deserialize_with = "deserialize_size")]
        value: f64,
    },
    Ramp {
        labels: Vec<String>,
        /// Cycle length in seconds.
        #[serde(deserialize_with = "deserialize_duration")]
        period: u64,
        #[serde(deserialize_with = "deserialize_size")]
        peak: f64,
        #[serde(default, deserialize_with = "deserialize_size")]
        offset: f64,
        #[serde(default)]
        invert: bool,
    },
    Square {
        labels: Vec<String>,
        #[serde(deserialize_with = "deserialize_duration")]
        period: u64,
        #[serde(deserialize_with = "deserialize_size")]
        magnitude: f64,
        #[serde(default, deserialize_with = "deserialize_size")]
        offset: f64,
        /// Percentage (0-100) of each cycle spent high.
        #[serde(default = "default_duty_cycle")]
        duty_cycle: f64,
        #[serde(default)]
        invert: bool,
    },
    Sine {
        labels: Vec<String>,
        #[serde(deserialize_with = "deserialize_duration")]
        period: u64,
        #[serde(deserialize_with = "deserialize_size")]
        amplitude: f64,
        #[serde(default, deserialize_with = "deserialize_size")]
        offset: f64,
    },
    Gaussian {
        labels: Vec<String>,
        #[serde(deserialize_with = "deserialize_size")]
        mean: f64,
        #[serde(deserialize_with = "deserialize_size")]
        sigma: f64,
    },
}

impl ValueSpec {
    pub fn kind(&self) -> ValueKind {
        match self {
            ValueSpec::Static { .. } => ValueKind::Static,
            ValueSpec::Ramp { .. } => ValueKind::Ramp,
            ValueSpec::Square { .. } => ValueKind::Square,
            ValueSpec::Sine { .. } => ValueKind::Sine,
            ValueSpec::Gaussian { .. } => ValueKind::Gaussian,
        }
    }

    /// Ordered label values.
    pub fn labels(&self) -> &[String] {
        match self {
            ValueSpec::Static { labels, .. }
            | ValueSpec::Ramp { labels, .. }
            | ValueSpec::Square { labels, .. }
            | ValueSpec::Sine { labels, .. }
            | ValueSpec::Gaussian { labels, .. } => labels,
        }
    }

    /// Label values as an order-insensitive set, used for duplicate detection.
    pub fn label_set(&self) -> BTreeSet<&str> {
        self.labels().iter().map(String::as_str).collect()
    }
}

/// Structured form of a metric, used for inspection and persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub name: String,
    #[serde(default)]
    pub documentation: String,
    #[serde(default)]
    pub unit: String,
    pub labels: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub values: Vec<ValueSpec>,
}
