//! mocktrics-metrics — the live metric model and its collection loop.
//!
//! # Architecture
//!
//! ```text
//! MetricRegistry (name → Arc<Metric>)
//!   ├── Metric
//!   │     ├── RwLock<Vec<LabeledValue>>   ← add_value / remove_value
//!   │     └── GaugeFamily                 ← collect() pushes samples here
//!   └── Exporter (prometheus::Registry)   → render() for /metrics
//!
//! Scheduler
//!   └── run() → collect_all() every interval, woken early on set_interval()
//! ```

pub mod error;
pub mod exporter;
pub mod metric;
pub mod registry;
pub mod scheduler;

pub use error::{MetricError, MetricResult};
pub use exporter::{Exporter, GaugeFamily};
pub use metric::Metric;
pub use registry::MetricRegistry;
pub use scheduler::Scheduler;
