//! TTL spec parsing and lateness formatting.
//!
//! TTL specs use the compact duration grammar operators already type into
//! cron jobs and check-in URLs: `24h30m`, `90s`, `1.5h`, `250ms`.

use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static TTL_SPEC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(?:\d+(?:\.\d*)?|\.\d+)(?:ns|us|µs|μs|ms|s|m|h))+$").expect("valid ttl regex")
});
static TTL_PART_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d*)?|\.\d+)(ns|us|µs|μs|ms|s|m|h)").expect("valid ttl part regex")
});

const NANOS_PER_MICRO: f64 = 1_000.0;
const NANOS_PER_MILLI: f64 = 1_000_000.0;
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// TTL spec parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TtlParseError {
    Empty,
    Invalid(String),
    OutOfRange(String),
}

impl Display for TtlParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "ttl must not be empty"),
            Self::Invalid(spec) => write!(
                f,
                "invalid ttl `{spec}`; expected e.g. `24h30m`, `90s` or `1.5h`"
            ),
            Self::OutOfRange(spec) => write!(f, "ttl `{spec}` is out of range"),
        }
    }
}

impl Error for TtlParseError {}

/// Parses a TTL spec into a non-negative duration.
///
/// A bare `0` is accepted; every other value needs a unit on each number.
pub fn parse_ttl_spec(spec: &str) -> Result<Duration, TtlParseError> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(TtlParseError::Empty);
    }
    if trimmed == "0" {
        return Ok(Duration::zero());
    }
    if !TTL_SPEC_RE.is_match(trimmed) {
        return Err(TtlParseError::Invalid(trimmed.to_string()));
    }

    let mut total_nanos = 0f64;
    for caps in TTL_PART_RE.captures_iter(trimmed) {
        let amount: f64 = caps[1]
            .parse()
            .map_err(|_| TtlParseError::Invalid(trimmed.to_string()))?;
        total_nanos += amount * unit_nanos(&caps[2]);
    }

    let rounded = total_nanos.round();
    if !rounded.is_finite() || rounded > i64::MAX as f64 {
        return Err(TtlParseError::OutOfRange(trimmed.to_string()));
    }
    Ok(Duration::nanoseconds(rounded as i64))
}

fn unit_nanos(unit: &str) -> f64 {
    match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => NANOS_PER_MICRO,
        "ms" => NANOS_PER_MILLI,
        "s" => NANOS_PER_SECOND,
        "m" => 60.0 * NANOS_PER_SECOND,
        _ => 3_600.0 * NANOS_PER_SECOND,
    }
}

/// Renders a duration in the same compact grammar, e.g. `1h2m3s`, `-45s`,
/// `250ms`. Sub-millisecond precision is dropped.
pub fn format_duration(duration: Duration) -> String {
    let negative = duration < Duration::zero();
    let millis = duration.num_milliseconds().unsigned_abs();
    let sign = if negative { "-" } else { "" };

    if millis == 0 {
        return "0s".to_string();
    }
    if millis < 1_000 {
        return format!("{sign}{millis}ms");
    }

    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1_000) % 60;
    let sub_millis = millis % 1_000;

    let mut rendered = String::from(sign);
    if hours > 0 {
        rendered.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        rendered.push_str(&format!("{minutes}m"));
    }
    if sub_millis == 0 {
        rendered.push_str(&format!("{seconds}s"));
    } else {
        let fraction = format!("{sub_millis:03}");
        rendered.push_str(&format!("{seconds}.{}s", fraction.trim_end_matches('0')));
    }
    rendered
}
