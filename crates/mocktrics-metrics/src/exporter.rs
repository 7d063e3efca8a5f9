//! Prometheus export surface.
//!
//! Wraps a private `prometheus::Registry` (never the process-wide default, so
//! tests and embedded uses stay isolated). Each metric registers one
//! [`GaugeFamily`]; the scrape endpoint renders the whole registry in the
//! text exposition format.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::{GaugeVec, Opts, Registry, TextEncoder};
use tracing::debug;

use crate::error::{MetricError, MetricResult};

/// Content type of [`Exporter::render`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

fn as_refs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

/// Handle to one registered gauge family.
#[derive(Clone)]
pub struct GaugeFamily {
    name: String,
    gauges: GaugeVec,
    /// Label-value tuples that currently have a series.
    series: Arc<Mutex<HashSet<Vec<String>>>>,
}

impl GaugeFamily {
    /// Exported family name (including any unit suffix).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sample for one label-value tuple.
    pub fn set(&self, label_values: &[String], value: f64) -> MetricResult<()> {
        let gauge = self
            .gauges
            .get_metric_with_label_values(&as_refs(label_values))
            .map_err(|e| MetricError::Export(e.to_string()))?;
        gauge.set(value);
        self.series.lock().insert(label_values.to_vec());
        Ok(())
    }

    /// Last exported sample for one label-value tuple.
    pub fn get(&self, label_values: &[String]) -> Option<f64> {
        if !self.series.lock().contains(label_values) {
            return None;
        }
        self.gauges
            .get_metric_with_label_values(&as_refs(label_values))
            .ok()
            .map(|gauge| gauge.get())
    }

    /// Drop the series for one label-value tuple. Returns false if it was
    /// never exported.
    pub fn remove(&self, label_values: &[String]) -> bool {
        self.series.lock().remove(label_values);
        self.gauges
            .remove_label_values(&as_refs(label_values))
            .is_ok()
    }
}

/// The exported-gauge sink shared by every metric.
#[derive(Clone)]
pub struct Exporter {
    registry: Registry,
    units: bool,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            units: true,
        }
    }

    /// Toggle the `_<unit>` suffix on exported family names.
    pub fn with_units(mut self, enabled: bool) -> Self {
        self.units = enabled;
        self
    }

    /// Name a family is exported under.
    pub fn exported_name(&self, name: &str, unit: &str) -> String {
        if !self.units || unit.is_empty() || name.ends_with(&format!("_{unit}")) {
            name.to_string()
        } else {
            format!("{name}_{unit}")
        }
    }

    pub fn register_family(
        &self,
        name: &str,
        documentation: &str,
        unit: &str,
        label_names: &[String],
    ) -> MetricResult<GaugeFamily> {
        let exported = self.exported_name(name, unit);
        // The prometheus crate rejects empty help strings.
        let help = if documentation.is_empty() {
            exported.as_str()
        } else {
            documentation
        };
        let gauges = GaugeVec::new(Opts::new(exported.as_str(), help), &as_refs(label_names))
            .map_err(|e| MetricError::validation("labels", e.to_string()))?;

        self.registry
            .register(Box::new(gauges.clone()))
            .map_err(|e| match e {
                prometheus::Error::AlreadyReg => MetricError::AlreadyExists(name.to_string()),
                other => MetricError::Export(other.to_string()),
            })?;

        debug!(family = %exported, "gauge family registered");
        Ok(GaugeFamily {
            name: exported,
            gauges,
            series: Arc::default(),
        })
    }

    pub fn unregister_family(&self, family: &GaugeFamily) -> MetricResult<()> {
        self.registry
            .unregister(Box::new(family.gauges.clone()))
            .map_err(|e| MetricError::Export(e.to_string()))?;
        debug!(family = %family.name, "gauge family unregistered");
        Ok(())
    }

    /// Render every registered family in the Prometheus text format.
    pub fn render(&self) -> MetricResult<String> {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .map_err(|e| MetricError::Export(e.to_string()))
    }
}
