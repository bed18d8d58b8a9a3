//! Go-style duration strings (`1h30m0s`, `5m`, `250ms`).
//!
//! Installation configs carry monitoring intervals in this notation and
//! templates render them back through [`short_duration`].

use std::time::Duration;

use crate::{Error, Result};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration such as `1h30m`, `90s`, `1.5s` or `250ms`.
///
/// A bare `0` is accepted as zero. Each number may carry a decimal
/// fraction (`1.5s`, `.25h`); digits finer than a nanosecond are dropped.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid(input, "empty duration"));
    }
    if trimmed == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total: u128 = 0;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let (whole, tail) = split_digits(rest);
        let (frac, tail) = match tail.strip_prefix('.') {
            Some(after) => split_digits(after),
            None => ("", tail),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid(input, "expected a number"));
        }

        let unit_len = tail
            .chars()
            .take_while(|c| c.is_ascii_alphabetic() || *c == 'µ')
            .map(char::len_utf8)
            .sum::<usize>();
        let (unit, tail) = tail.split_at(unit_len);
        let unit_nanos: u128 = match unit {
            "h" => 3600 * NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "s" => NANOS_PER_SEC,
            "ms" => 1_000_000,
            "us" | "µs" => 1_000,
            "ns" => 1,
            "" => return Err(invalid(input, "missing unit")),
            _ => return Err(invalid(input, "unknown unit")),
        };

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| invalid(input, "number out of range"))?
        };
        total = whole
            .checked_mul(unit_nanos)
            .and_then(|n| n.checked_add(fraction_nanos(frac, unit_nanos)))
            .and_then(|n| n.checked_add(total))
            .ok_or_else(|| invalid(input, "number out of range"))?;
        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| invalid(input, "number out of range"))?;
    // Remainder of a division by 1e9 always fits.
    let subsec = (total % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, subsec))
}

fn split_digits(s: &str) -> (&str, &str) {
    let digits = s.chars().take_while(char::is_ascii_digit).count();
    s.split_at(digits)
}

/// Nanoseconds contributed by the digits after the decimal point.
fn fraction_nanos(digits: &str, unit_nanos: u128) -> u128 {
    // 18 digits is below nanosecond resolution for every unit and keeps
    // the scale inside u128.
    let digits = &digits[..digits.len().min(18)];
    let scale = 10u128.pow(digits.len() as u32);
    let value = digits
        .bytes()
        .fold(0u128, |acc, b| acc * 10 + u128::from(b - b'0'));
    value * unit_nanos / scale
}

/// Render a duration the way Go's `time.Duration.String` does.
pub fn format_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_owned();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", fraction(nanos, 1_000));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", fraction(nanos, 1_000_000));
    }

    let secs = d.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = fraction(
        u128::from(secs % 60) * NANOS_PER_SEC + u128::from(d.subsec_nanos()),
        NANOS_PER_SEC,
    );

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Like [`format_duration`] but drops trailing zero units: `5m0s` → `5m`,
/// `2h0m0s` → `2h`.
pub fn short_duration(d: Duration) -> String {
    let mut s = format_duration(d);
    if s.ends_with("m0s") {
        s.truncate(s.len() - 2);
    }
    if s.ends_with("h0m") {
        s.truncate(s.len() - 2);
    }
    s
}

fn fraction(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let rem = value % unit;
    if rem == 0 {
        return whole.to_string();
    }
    let width = unit.to_string().len() - 1;
    let digits = format!("{rem:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

fn invalid(input: &str, reason: &'static str) -> Error {
    Error::InvalidDuration {
        input: input.to_owned(),
        reason,
    }
}

/// Serde adapter storing a [`Duration`] as a Go-style string.
pub mod go_format {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
