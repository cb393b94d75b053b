// Copyright (c) 2026 - present testlens contributors
// SPDX-License-Identifier: MIT

//! Go duration literals
//!
//! The runner prints elapsed times the way Go's `time.Duration` does
//! (`0.019s`, `1m2.5s`, `350µs`). This module parses those literals and
//! formats durations back into the same shape so serialized results stay
//! diffable against fixtures produced by the runner's own tooling.

use std::time::Duration;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

/// Parse a Go duration literal such as `0.019s`, `1h2m` or `1.5ms`
///
/// Returns `None` for malformed, negative or overflowing input. A bare `0`
/// is accepted, as Go does.
#[must_use]
pub fn parse_go_duration(input: &str) -> Option<Duration> {
    let literal = input.strip_prefix('+').unwrap_or(input);
    if literal == "0" {
        return Some(Duration::ZERO);
    }
    if literal.is_empty() || literal.starts_with('-') {
        return None;
    }

    let mut rest = literal;
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, after) = rest.split_at(int_len);
        let (frac_part, after) = match after.strip_prefix('.') {
            Some(tail) => {
                let frac_len = tail.bytes().take_while(u8::is_ascii_digit).count();
                tail.split_at(frac_len)
            }
            None => ("", after),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let unit_len = after
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after.len());
        let (unit, tail) = after.split_at(unit_len);
        let scale = match unit {
            "ns" => 1,
            "us" | "\u{b5}s" | "\u{3bc}s" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => NANOS_PER_MINUTE,
            "h" => NANOS_PER_HOUR,
            _ => return None,
        };

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        total = total.checked_add(whole.checked_mul(scale)?)?;

        // Digits finer than a nanosecond are dropped, matching Go.
        let mut digit_scale = scale;
        for digit in frac_part.bytes() {
            digit_scale /= 10;
            if digit_scale == 0 {
                break;
            }
            total = total.checked_add(u128::from(digit - b'0') * digit_scale)?;
        }

        rest = tail;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).ok()?;
    let nanos = u32::try_from(total % NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, nanos))
}

/// Format a duration the way Go's `Duration.String()` does
///
/// ```
/// use std::time::Duration;
/// use testlens_core::duration::format_go_duration;
///
/// assert_eq!(format_go_duration(Duration::from_millis(19)), "19ms");
/// assert_eq!(format_go_duration(Duration::from_secs(120)), "2m0s");
/// ```
#[must_use]
pub fn format_go_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < NANOS_PER_MICRO {
        return format!("{nanos}ns");
    }
    if nanos < NANOS_PER_MILLI {
        return format!("{}\u{b5}s", with_fraction(nanos, NANOS_PER_MICRO, 3));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", with_fraction(nanos, NANOS_PER_MILLI, 6));
    }

    let hours = nanos / NANOS_PER_HOUR;
    let minutes = (nanos % NANOS_PER_HOUR) / NANOS_PER_MINUTE;
    let seconds = with_fraction(nanos % NANOS_PER_MINUTE, NANOS_PER_SEC, 9);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn with_fraction(value: u128, unit: u128, digits: usize) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0digits$}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Serde adapter storing a [`Duration`] as a Go duration string
///
/// Use with `#[serde(with = "crate::duration::go_format")]`. An empty string
/// deserializes to zero.
pub mod go_format {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::{format_go_duration, parse_go_duration};

    /// Serialize as a Go duration string
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_go_duration(*duration))
    }

    /// Deserialize from a Go duration string
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let literal = String::deserialize(deserializer)?;
        if literal.is_empty() {
            return Ok(Duration::ZERO);
        }
        parse_go_duration(&literal)
            .ok_or_else(|| de::Error::custom(format!("failed to parse duration: {literal}")))
    }
}
