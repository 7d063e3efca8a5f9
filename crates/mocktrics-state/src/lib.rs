//! mocktrics-state — durable storage for API-created metrics.
//!
//! Backed by [redb](https://docs.rs/redb). Each metric is stored as one
//! JSON-serialized [`MetricRecord`](mocktrics_core::MetricRecord) keyed by
//! its name, values included, so a record read back is equal to the record
//! written. Metrics seeded from the configuration file are never stored.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across request handlers.

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
