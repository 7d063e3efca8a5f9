//! Name-keyed collection of live metrics.
//!
//! Cheap to clone; every clone shares the same map. Lookups hand out
//! `Arc<Metric>` so callers never hold the map lock while mutating a metric.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use mocktrics_core::MetricRecord;

use crate::error::{MetricError, MetricResult};
use crate::exporter::Exporter;
use crate::metric::Metric;

#[derive(Clone, Default)]
pub struct MetricRegistry {
    exporter: Exporter,
    metrics: Arc<RwLock<HashMap<String, Arc<Metric>>>>,
}

impl MetricRegistry {
    pub fn new(exporter: Exporter) -> Self {
        Self {
            exporter,
            metrics: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    /// Build a metric from `record` against this registry's exporter and
    /// insert it. Fails with `AlreadyExists` if the name is taken.
    pub fn create(&self, record: MetricRecord) -> MetricResult<String> {
        if self.contains(&record.name) {
            return Err(MetricError::AlreadyExists(record.name));
        }
        let metric = Metric::new(&self.exporter, record)?;
        Ok(self.add(metric))
    }

    /// Insert or replace a metric under its own name.
    ///
    /// Exported families are keyed by name, so a replacement can only have
    /// been built after the previous metric's family was unregistered; the
    /// replaced metric is dropped without touching the exporter.
    pub fn add(&self, metric: Metric) -> String {
        let name = metric.name().to_string();
        let previous = self.metrics.write().insert(name.clone(), Arc::new(metric));
        if previous.is_some() {
            warn!(%name, "replacing existing metric");
        } else {
            info!(%name, "metric registered");
        }
        name
    }

    pub fn get(&self, name: &str) -> Option<Arc<Metric>> {
        self.metrics.read().get(name).cloned()
    }

    /// Like [`get`](Self::get) but `NotFound` when absent.
    pub fn require(&self, name: &str) -> MetricResult<Arc<Metric>> {
        self.get(name)
            .ok_or_else(|| MetricError::NotFound(format!("metric {name}")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.read().contains_key(name)
    }

    /// Remove a metric and its exported family. Read-only metrics stay put.
    pub fn delete(&self, name: &str) -> MetricResult<()> {
        let removed = {
            let mut metrics = self.metrics.write();
            match metrics.get(name) {
                None => return Err(MetricError::NotFound(format!("metric {name}"))),
                Some(metric) if metric.read_only() => {
                    return Err(MetricError::ReadOnly(format!(
                        "metric {name} is defined in the configuration file"
                    )));
                }
                Some(_) => metrics.remove(name),
            }
        };
        // The map entry is already gone, so an unregister failure is not
        // reported to the caller.
        if let Some(metric) = removed {
            if let Err(e) = metric.unregister() {
                warn!(%name, error = %e, "failed to unregister deleted metric");
            }
        }
        info!(%name, "metric deleted");
        Ok(())
    }

    /// Snapshot of every metric, ordered by name.
    pub fn list(&self) -> BTreeMap<String, Arc<Metric>> {
        self.metrics
            .read()
            .iter()
            .map(|(name, metric)| (name.clone(), Arc::clone(metric)))
            .collect()
    }

    /// Structured form of every metric, ordered by name.
    pub fn records(&self) -> Vec<MetricRecord> {
        self.list().values().map(|m| m.serialize()).collect()
    }

    /// Run one collect pass over every metric.
    ///
    /// The map lock is released before values are evaluated, so API calls
    /// are never blocked behind a pass.
    pub fn collect_all(&self) {
        let metrics: Vec<Arc<Metric>> = self.metrics.read().values().cloned().collect();
        let now = Instant::now();
        for metric in &metrics {
            metric.collect_at(now);
        }
        debug!(metrics = metrics.len(), "collect pass finished");
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }
}
