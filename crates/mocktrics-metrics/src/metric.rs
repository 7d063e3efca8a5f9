//! A named, labeled family of waveform generators.
//!
//! Structural invariants are checked at construction and before every
//! mutation; a rejected mutation leaves the value list untouched. The value
//! list sits behind a per-metric lock so a collect pass sees each value
//! either fully present or absent.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;
use std::time::Instant;

use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, warn};

use mocktrics_core::{LabeledValue, MetricRecord, ValueSpec};

use crate::error::{MetricError, MetricResult};
use crate::exporter::{Exporter, GaugeFamily};

const MAX_NAME_LEN: usize = 200;
const MAX_DOCUMENTATION_LEN: usize = 1000;
const MAX_LABELS: usize = 100;
const MAX_LABEL_NAME_LEN: usize = 100;
const MAX_UNIT_LEN: usize = 50;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("name pattern compiles"));

static UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]*$").expect("unit pattern compiles"));

pub struct Metric {
    name: String,
    documentation: String,
    unit: String,
    labels: Vec<String>,
    read_only: bool,
    values: RwLock<Vec<LabeledValue>>,
    exporter: Exporter,
    family: GaugeFamily,
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("labels", &self.labels)
            .field("read_only", &self.read_only)
            .field("values", &self.values.read().len())
            .finish()
    }
}

fn validate_name(name: &str) -> MetricResult<()> {
    let len = name.chars().count();
    if !(1..=MAX_NAME_LEN).contains(&len) {
        return Err(MetricError::validation(
            "name",
            format!("must be between 1 and {MAX_NAME_LEN} characters long"),
        ));
    }
    if !NAME_RE.is_match(name) {
        return Err(MetricError::validation(
            "name",
            "must start with a letter and only contain letters, digits or _",
        ));
    }
    Ok(())
}

fn validate_documentation(documentation: &str) -> MetricResult<()> {
    if documentation.chars().count() > MAX_DOCUMENTATION_LEN {
        return Err(MetricError::validation(
            "documentation",
            format!("must be at most {MAX_DOCUMENTATION_LEN} characters long"),
        ));
    }
    if documentation.contains('\n') {
        return Err(MetricError::validation(
            "documentation",
            "must not contain newlines",
        ));
    }
    Ok(())
}

fn validate_labels(labels: &[String]) -> MetricResult<()> {
    if !(1..=MAX_LABELS).contains(&labels.len()) {
        return Err(MetricError::validation(
            "labels",
            format!("a metric must have between 1 and {MAX_LABELS} labels"),
        ));
    }
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        let len = label.chars().count();
        if !(1..=MAX_LABEL_NAME_LEN).contains(&len) {
            return Err(MetricError::validation(
                "labels",
                format!("label names must be between 1 and {MAX_LABEL_NAME_LEN} characters long"),
            ));
        }
        if !seen.insert(label.as_str()) {
            return Err(MetricError::validation(
                "labels",
                format!("duplicate label name {label:?}"),
            ));
        }
    }
    Ok(())
}

fn validate_unit(unit: &str) -> MetricResult<()> {
    if unit.chars().count() > MAX_UNIT_LEN {
        return Err(MetricError::validation(
            "unit",
            format!("must be at most {MAX_UNIT_LEN} characters long"),
        ));
    }
    if !UNIT_RE.is_match(unit) {
        return Err(MetricError::validation(
            "unit",
            "must only contain letters, digits or _",
        ));
    }
    Ok(())
}

/// Check a candidate value list against the metric's label names.
fn validate_values(label_count: usize, values: &[LabeledValue]) -> MetricResult<()> {
    if let Some(v) = values.iter().find(|v| v.labels().len() != label_count) {
        return Err(MetricError::LabelCountMismatch {
            expected: label_count,
            actual: v.labels().len(),
        });
    }
    let mut seen: Vec<BTreeSet<&str>> = Vec::with_capacity(values.len());
    for value in values {
        let set = value.label_set();
        if seen.contains(&set) {
            return Err(MetricError::DuplicateLabelset);
        }
        seen.push(set);
    }
    Ok(())
}

fn label_set(labels: &[String]) -> BTreeSet<&str> {
    labels.iter().map(String::as_str).collect()
}

impl Metric {
    /// Validate `record` and register its gauge family with `exporter`.
    ///
    /// Checks run in the order name, documentation, labels, unit, values; the
    /// first failure is returned.
    pub fn new(exporter: &Exporter, record: MetricRecord) -> MetricResult<Self> {
        let MetricRecord {
            name,
            documentation,
            unit,
            labels,
            read_only,
            values,
        } = record;

        validate_name(&name)?;
        validate_documentation(&documentation)?;
        validate_labels(&labels)?;
        validate_unit(&unit)?;

        let values = values
            .into_iter()
            .map(LabeledValue::new)
            .collect::<Result<Vec<_>, _>>()?;
        validate_values(labels.len(), &values)?;

        let family = exporter.register_family(&name, &documentation, &unit, &labels)?;
        debug!(%name, values = values.len(), read_only, "metric created");

        Ok(Self {
            name,
            documentation,
            unit,
            labels,
            read_only,
            values: RwLock::new(values),
            exporter: exporter.clone(),
            family,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn family(&self) -> &GaugeFamily {
        &self.family
    }

    pub fn value_count(&self) -> usize {
        self.values.read().len()
    }

    fn ensure_writable(&self) -> MetricResult<()> {
        if self.read_only {
            return Err(MetricError::ReadOnly(format!(
                "metric {} is defined in the configuration file",
                self.name
            )));
        }
        Ok(())
    }

    /// Append a labeled value. The full candidate list is validated before
    /// anything is mutated.
    pub fn add_value(&self, spec: ValueSpec) -> MetricResult<()> {
        self.ensure_writable()?;
        let value = LabeledValue::new(spec)?;

        let mut values = self.values.write();
        if value.labels().len() != self.labels.len() {
            return Err(MetricError::LabelCountMismatch {
                expected: self.labels.len(),
                actual: value.labels().len(),
            });
        }
        let candidate = value.label_set();
        if values.iter().any(|v| v.label_set() == candidate) {
            return Err(MetricError::DuplicateLabelset);
        }
        debug!(metric = %self.name, labels = ?value.labels(), kind = %value.kind(), "value added");
        values.push(value);
        Ok(())
    }

    /// Remove the value whose label set equals `labels` (order-insensitive)
    /// and drop its exported series.
    pub fn remove_value(&self, labels: &[String]) -> MetricResult<ValueSpec> {
        self.ensure_writable()?;
        if labels.len() != self.labels.len() {
            return Err(MetricError::LabelCountMismatch {
                expected: self.labels.len(),
                actual: labels.len(),
            });
        }

        let wanted = label_set(labels);
        let mut values = self.values.write();
        let index = values
            .iter()
            .position(|v| v.label_set() == wanted)
            .ok_or_else(|| {
                MetricError::NotFound(format!("labelset {labels:?} in metric {}", self.name))
            })?;
        let removed = values.remove(index);
        // Value and series leave under the same guard.
        self.family.remove(removed.labels());
        drop(values);

        debug!(metric = %self.name, labels = ?removed.labels(), "value removed");
        Ok(removed.to_spec())
    }

    /// Evaluate every value and push the samples into the gauge family.
    pub fn collect(&self) {
        self.collect_at(Instant::now());
    }

    pub fn collect_at(&self, now: Instant) {
        let values = self.values.read();
        for value in values.iter() {
            if let Err(e) = self.family.set(value.labels(), value.evaluate(now)) {
                warn!(metric = %self.name, error = %e, "failed to export sample");
            }
        }
    }

    pub fn serialize(&self) -> MetricRecord {
        MetricRecord {
            name: self.name.clone(),
            documentation: self.documentation.clone(),
            unit: self.unit.clone(),
            labels: self.labels.clone(),
            read_only: self.read_only,
            values: self.values.read().iter().map(LabeledValue::to_spec).collect(),
        }
    }

    /// Remove this metric's family from the export surface so the name can
    /// be registered again.
    pub fn unregister(&self) -> MetricResult<()> {
        self.exporter.unregister_family(&self.family)
    }
}
