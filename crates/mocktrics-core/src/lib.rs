//! mocktrics-core — building blocks shared by every Mocktrics crate.
//!
//! - [`units`]: duration (`2m`) and magnitude (`3k`) parsing
//! - [`waveform`]: the static/ramp/square/sine/gaussian generators
//! - [`types`]: serializable value specs and metric records
//! - [`config`]: the `mocktrics.toml` configuration file

pub mod config;
pub mod types;
pub mod units;
pub mod waveform;

pub use config::MocktricsConfig;
pub use types::*;
pub use units::UnitError;
pub use waveform::{InvalidParameter, LabeledValue, Waveform};
