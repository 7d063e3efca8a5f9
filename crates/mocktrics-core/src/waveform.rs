//! Waveform generators.
//!
//! Every periodic generator remembers the monotonic instant it was built at;
//! its output is a pure function of the time elapsed since then. The gaussian
//! generator ignores time and draws a fresh sample from the thread RNG.

use std::collections::BTreeSet;
use std::f64::consts::TAU;
use std::time::{Duration, Instant};

use rand_distr::{Distribution, Normal};
use thiserror::Error;

use crate::types::{ValueKind, ValueSpec};

/// A waveform parameter failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {reason}")]
pub struct InvalidParameter {
    pub field: &'static str,
    pub reason: String,
}

impl InvalidParameter {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A ready-to-evaluate generator.
#[derive(Debug, Clone)]
pub enum Waveform {
    Static {
        value: f64,
    },
    Ramp {
        origin: Instant,
        period: Duration,
        peak: f64,
        offset: f64,
        invert: bool,
    },
    Square {
        origin: Instant,
        period: Duration,
        magnitude: f64,
        offset: f64,
        /// Fraction (0.0-1.0) of the cycle spent high.
        duty: f64,
        invert: bool,
    },
    Sine {
        origin: Instant,
        period: Duration,
        amplitude: f64,
        offset: f64,
    },
    Gaussian {
        distribution: Normal<f64>,
    },
}

fn finite(field: &'static str, v: f64) -> Result<f64, InvalidParameter> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(InvalidParameter::new(field, format!("must be a finite number, got {v}")))
    }
}

fn period(secs: u64) -> Result<Duration, InvalidParameter> {
    if secs == 0 {
        return Err(InvalidParameter::new("period", "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Position within the current cycle, in `[0, 1)`.
fn progress(origin: Instant, period: Duration, now: Instant) -> f64 {
    let elapsed = now.saturating_duration_since(origin).as_secs_f64();
    let period = period.as_secs_f64();
    (elapsed % period) / period
}

impl Waveform {
    /// Validate the spec and build a generator anchored at `Instant::now()`.
    pub fn from_spec(spec: &ValueSpec) -> Result<Self, InvalidParameter> {
        Self::from_spec_at(spec, Instant::now())
    }

    /// Like [`Waveform::from_spec`] with an explicit time origin.
    pub fn from_spec_at(spec: &ValueSpec, origin: Instant) -> Result<Self, InvalidParameter> {
        let waveform = match *spec {
            ValueSpec::Static { value, .. } => Waveform::Static {
                value: finite("value", value)?,
            },
            ValueSpec::Ramp {
                period: p,
                peak,
                offset,
                invert,
                ..
            } => Waveform::Ramp {
                origin,
                period: period(p)?,
                peak: finite("peak", peak)?,
                offset: finite("offset", offset)?,
                invert,
            },
            ValueSpec::Square {
                period: p,
                magnitude,
                offset,
                duty_cycle,
                invert,
                ..
            } => {
                if !(0.0..=100.0).contains(&duty_cycle) {
                    return Err(InvalidParameter::new(
                        "duty_cycle",
                        format!("must be between 0 and 100, got {duty_cycle}"),
                    ));
                }
                Waveform::Square {
                    origin,
                    period: period(p)?,
                    magnitude: finite("magnitude", magnitude)?,
                    offset: finite("offset", offset)?,
                    duty: duty_cycle / 100.0,
                    invert,
                }
            }
            ValueSpec::Sine {
                period: p,
                amplitude,
                offset,
                ..
            } => Waveform::Sine {
                origin,
                period: period(p)?,
                amplitude: finite("amplitude", amplitude)?,
                offset: finite("offset", offset)?,
            },
            ValueSpec::Gaussian { mean, sigma, .. } => {
                let mean = finite("mean", mean)?;
                let sigma = finite("sigma", sigma)?;
                if sigma < 0.0 {
                    return Err(InvalidParameter::new(
                        "sigma",
                        format!("must not be negative, got {sigma}"),
                    ));
                }
                let distribution = Normal::new(mean, sigma)
                    .map_err(|e| InvalidParameter::new("sigma", e.to_string()))?;
                Waveform::Gaussian { distribution }
            }
        };
        Ok(waveform)
    }

    /// Current output. Total: never fails, never panics.
    pub fn evaluate(&self, now: Instant) -> f64 {
        match self {
            Waveform::Static { value } => *value,
            Waveform::Ramp {
                origin,
                period,
                peak,
                offset,
                invert,
            } => {
                let v = progress(*origin, *period, now) * peak;
                let v = if *invert { peak - v } else { v };
                v + offset
            }
            Waveform::Square {
                origin,
                period,
                magnitude,
                offset,
                duty,
                invert,
            } => {
                let high = progress(*origin, *period, now) < *duty;
                if high != *invert {
                    magnitude + offset
                } else {
                    *offset
                }
            }
            Waveform::Sine {
                origin,
                period,
                amplitude,
                offset,
            } => amplitude * (TAU * progress(*origin, *period, now)).sin() + offset,
            Waveform::Gaussian { distribution } => distribution.sample(&mut rand::rng()),
        }
    }
}

/// A generator bound to one tuple of label values.
#[derive(Debug, Clone)]
pub struct LabeledValue {
    spec: ValueSpec,
    waveform: Waveform,
}

impl LabeledValue {
    pub fn new(spec: ValueSpec) -> Result<Self, InvalidParameter> {
        let waveform = Waveform::from_spec(&spec)?;
        Ok(Self { spec, waveform })
    }

    pub fn kind(&self) -> ValueKind {
        self.spec.kind()
    }

    pub fn labels(&self) -> &[String] {
        self.spec.labels()
    }

    pub fn label_set(&self) -> BTreeSet<&str> {
        self.spec.label_set()
    }

    pub fn evaluate(&self, now: Instant) -> f64 {
        self.waveform.evaluate(now)
    }

    pub fn spec(&self) -> &ValueSpec {
        &self.spec
    }

    pub fn to_spec(&self) -> ValueSpec {
        self.spec.clone()
    }
}
