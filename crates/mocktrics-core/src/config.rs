//! mocktrics.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{MetricRecord, ValueSpec};

/// Collect interval used when the config file does not pin one.
pub const DEFAULT_COLLECT_INTERVAL: u64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MocktricsConfig {
    /// Seconds between collect passes. When set, the interval is read-only
    /// at runtime.
    pub collect_interval: Option<u64>,
    /// Export families without the `_<unit>` name suffix.
    #[serde(default)]
    pub disable_units: bool,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
}

/// A metric seeded at startup. Seeded metrics are always read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    #[serde(default)]
    pub documentation: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub values: Vec<ValueSpec>,
}

impl MetricConfig {
    pub fn to_record(&self) -> MetricRecord {
        MetricRecord {
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            unit: self.unit.clone(),
            labels: self.labels.clone(),
            read_only: true,
            values: self.values.clone(),
        }
    }
}

impl MocktricsConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: MocktricsConfig = toml::from_str(content)?;
        if config.collect_interval == Some(0) {
            anyhow::bail!("collect_interval must be at least 1 second");
        }
        Ok(config)
    }

    /// Load `path` if given, otherwise start from an empty config.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn interval_is_fixed(&self) -> bool {
        self.collect_interval.is_some()
    }

    pub fn effective_interval(&self) -> u64 {
        self.collect_interval.unwrap_or(DEFAULT_COLLECT_INTERVAL)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
