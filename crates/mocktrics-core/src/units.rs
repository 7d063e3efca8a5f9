//! Duration and magnitude parsing for waveform parameters.
//!
//! Durations are whole seconds, written as an integer or as
//! `<integer><unit>` with unit in `s`, `m`, `h`, `d`. Magnitudes are plain
//! numbers or `<integer><unit>` with an SI prefix in `u`, `m`, `k`, `M`, `G`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([smhd])$").expect("duration pattern compiles"));

static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([umkMG])$").expect("size pattern compiles"));

/// Errors produced while parsing unit-suffixed values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    #[error("duration must not be negative, got {0}")]
    NegativeDuration(i64),

    #[error("invalid duration {0:?}, expected <integer><s|m|h|d>")]
    InvalidDuration(String),

    #[error("invalid size {0:?}, expected <integer><u|m|k|M|G>")]
    InvalidSize(String),
}

/// Accept an integer second count. Zero is allowed here; callers that need a
/// positive period check that themselves.
pub fn duration_from_secs(secs: i64) -> Result<u64, UnitError> {
    u64::try_from(secs).map_err(|_| UnitError::NegativeDuration(secs))
}

/// Parse `<integer><unit>` into seconds.
pub fn parse_duration(text: &str) -> Result<u64, UnitError> {
    let invalid = || UnitError::InvalidDuration(text.to_string());
    let caps = DURATION_RE.captures(text).ok_or_else(invalid)?;
    let count: u64 = caps[1].parse().map_err(|_| invalid())?;
    let multiplier = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86_400,
        _ => return Err(invalid()),
    };
    count.checked_mul(multiplier).ok_or_else(invalid)
}

/// Parse a path segment or form field that is either bare seconds (`"100"`)
/// or a unit duration (`"2m"`).
pub fn parse_seconds_or_duration(text: &str) -> Result<u64, UnitError> {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return text
            .parse()
            .map_err(|_| UnitError::InvalidDuration(text.to_string()));
    }
    parse_duration(text)
}

/// Parse `<integer><unit>` into a float magnitude.
pub fn parse_size(text: &str) -> Result<f64, UnitError> {
    let invalid = || UnitError::InvalidSize(text.to_string());
    let caps = SIZE_RE.captures(text).ok_or_else(invalid)?;
    let count: f64 = caps[1].parse().map_err(|_| invalid())?;
    let multiplier = match &caps[2] {
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        _ => return Err(invalid()),
    };
    Ok(count * multiplier)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationInput {
    Seconds(i64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeInput {
    Number(f64),
    Text(String),
}

/// serde helper: accept `120` or `"2m"` for a duration field.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match DurationInput::deserialize(deserializer)? {
        DurationInput::Seconds(secs) => duration_from_secs(secs),
        DurationInput::Text(text) => parse_duration(&text),
    }
    .map_err(serde::de::Error::custom)
}

/// serde helper: accept `1500`, `-2.5` or `"2k"` for a magnitude field.
pub fn deserialize_size<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match SizeInput::deserialize(deserializer)? {
        SizeInput::Number(n) => Ok(n),
        SizeInput::Text(text) => parse_size(&text).map_err(serde::de::Error::custom),
    }
}
