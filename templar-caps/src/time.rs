//! Clock access and timestamp formatting.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use miette::miette;
use serde_json::{Value, json};
use templar_core::caps::{CapabilityFn, sync_cap};

use crate::args;

pub(crate) fn register(funcs: &mut BTreeMap<&'static str, CapabilityFn>) {
    funcs.insert(
        "now",
        sync_cap(|_argv| {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO);
            Ok(json!(now.as_secs_f64()))
        }),
    );
    funcs.insert(
        "time_format",
        sync_cap(|argv| {
            let timestamp = args::number("time_format", argv, 0, "timestamp")?;
            let format = args::string("time_format", argv, 1, "format")?;
            format_timestamp(timestamp, &format).map(Value::String)
        }),
    );
}

/// Formats a Unix timestamp (float seconds) in UTC. Named layouts cover the
/// common interchange formats; anything else is a strftime pattern.
fn format_timestamp(timestamp: f64, format: &str) -> miette::Result<String> {
    if !timestamp.is_finite() {
        return Err(miette!("time_format: timestamp must be a finite number"));
    }
    let total_nanos = (timestamp * 1e9).round() as i128;
    let secs = total_nanos.div_euclid(1_000_000_000) as i64;
    let nanos = total_nanos.rem_euclid(1_000_000_000) as u32;
    let time = DateTime::<Utc>::from_timestamp(secs, nanos)
        .ok_or_else(|| miette!("time_format: timestamp out of range"))?;

    let formatted = match format {
        "RFC3339" => time.to_rfc3339_opts(SecondsFormat::Secs, true),
        "RFC3339Nano" => time.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        "RFC1123" => time.format("%a, %d %b %Y %H:%M:%S %Z").to_string(),
        "RFC1123Z" => time.format("%a, %d %b %Y %H:%M:%S %z").to_string(),
        "DateTime" => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        "DateOnly" => time.format("%Y-%m-%d").to_string(),
        "TimeOnly" => time.format("%H:%M:%S").to_string(),
        pattern => {
            let mut out = String::new();
            write!(out, "{}", time.format(pattern))
                .map_err(|_| miette!("time_format: invalid format pattern: {pattern}"))?;
            out
        }
    };
    Ok(formatted)
}
