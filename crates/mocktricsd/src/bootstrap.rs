//! Startup wiring: config seeding and store rehydration.

use anyhow::Context;
use tracing::{info, warn};

use mocktrics_api::ApiState;
use mocktrics_core::{MetricRecord, MocktricsConfig};
use mocktrics_metrics::{Exporter, MetricRegistry, Scheduler};
use mocktrics_state::StateStore;

/// Build the registry, scheduler and API state from a loaded config.
///
/// Configured metrics are registered read-only; a bad entry aborts startup.
/// Stored metrics are registered afterwards, skipping any name the config
/// already claimed and any record that no longer validates.
pub fn assemble(
    config: &MocktricsConfig,
    disable_units: bool,
    store: Option<StateStore>,
) -> anyhow::Result<ApiState> {
    let exporter = Exporter::new().with_units(!(disable_units || config.disable_units));
    let registry = MetricRegistry::new(exporter);

    for metric in &config.metrics {
        registry
            .create(metric.to_record())
            .with_context(|| format!("invalid metric {:?} in configuration", metric.name))?;
    }
    info!(count = config.metrics.len(), "configured metrics registered");

    if let Some(store) = &store {
        rehydrate(&registry, store)?;
    }

    let scheduler = Scheduler::new(
        registry.clone(),
        config.effective_interval(),
        config.interval_is_fixed(),
    )?;

    Ok(ApiState {
        registry,
        scheduler,
        store,
    })
}

fn rehydrate(registry: &MetricRegistry, store: &StateStore) -> anyhow::Result<()> {
    let records = store.load_all().context("failed to load stored metrics")?;
    let mut restored = 0usize;
    for record in records {
        if registry.contains(&record.name) {
            warn!(name = %record.name, "stored metric shadowed by configuration, skipping");
            continue;
        }
        let name = record.name.clone();
        let record = MetricRecord {
            read_only: false,
            ..record
        };
        match registry.create(record) {
            Ok(_) => restored += 1,
            Err(e) => warn!(%name, error = %e, "stored metric rejected, skipping"),
        }
    }
    info!(restored, "stored metrics restored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocktrics_core::ValueSpec;

    const CONFIG: &str = r#"
[[metrics]]
name = "seeded"
unit = "bytes"
labels = ["host"]
values = [{ kind = "static", labels = ["a"], value = "2k" }]
"#;

    fn stored(name: &str) -> MetricRecord {
        MetricRecord {
            name: name.to_string(),
            documentation: "from the store".to_string(),
            unit: String::new(),
            labels: vec!["host".to_string()],
            read_only: false,
            values: vec![ValueSpec::Static {
                labels: vec!["b".to_string()],
                value: 7.0,
            }],
        }
    }

    #[test]
    fn seeds_configured_metrics_read_only() {
        let config = MocktricsConfig::from_toml_str(CONFIG).unwrap();
        let state = assemble(&config, false, None).unwrap();

        let metric = state.registry.get("seeded").unwrap();
        assert!(metric.read_only());
        assert_eq!(metric.family().name(), "seeded_bytes");
        assert!(!state.scheduler.interval_is_read_only());
        assert_eq!(state.scheduler.get_interval(), 10);
    }

    #[test]
    fn fixed_interval_and_disabled_units() {
        let config =
            MocktricsConfig::from_toml_str(&format!("collect_interval = 3\n{CONFIG}")).unwrap();
        let state = assemble(&config, true, None).unwrap();
        assert!(state.scheduler.interval_is_read_only());
        assert_eq!(state.scheduler.get_interval(), 3);
        assert_eq!(state.registry.get("seeded").unwrap().family().name(), "seeded");
    }

    #[test]
    fn invalid_configured_metric_aborts() {
        let config = MocktricsConfig::from_toml_str(
            "[[metrics]]\nname = \"_bad\"\nlabels = [\"a\"]\n",
        )
        .unwrap();
        assert!(assemble(&config, false, None).is_err());
    }

    #[test]
    fn rehydrates_stored_metrics() {
        let store = StateStore::open_in_memory().unwrap();
        store.save(&stored("dynamic")).unwrap();
        store.save(&stored("seeded")).unwrap();

        let config = MocktricsConfig::from_toml_str(CONFIG).unwrap();
        let state = assemble(&config, false, Some(store)).unwrap();

        assert_eq!(state.registry.len(), 2);
        let dynamic = state.registry.get("dynamic").unwrap();
        assert!(!dynamic.read_only());
        assert_eq!(dynamic.serialize(), stored("dynamic"));
        // The configured metric wins over the stored one.
        assert!(state.registry.get("seeded").unwrap().read_only());
    }
}
