//! redb table definitions.

use redb::TableDefinition;

/// Metric records (values included) keyed by metric name.
pub const METRICS: TableDefinition<&str, &[u8]> = TableDefinition::new("metrics");
