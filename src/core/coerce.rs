//! Conversions from raw configuration strings to richer types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::time::Duration;

/// Parse a Go-style duration such as `1h30m`, `250ms` or `1.5s`.
///
/// A bare number is read as nanoseconds. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    let s = s.strip_prefix('+').unwrap_or(s);
    if s.starts_with('-') {
        return None;
    }

    if !s.chars().any(|c| c.is_ascii_alphabetic() || c == 'µ' || c == 'μ') {
        let nanos: f64 = s.parse().ok()?;
        return nanos_to_duration(nanos);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_len..];

        total += value * nanos_per_unit;
    }

    nanos_to_duration(total)
}

fn nanos_to_duration(nanos: f64) -> Option<Duration> {
    if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos.round() as u64))
}

/// Parse a byte size such as `512`, `1kb`, `10 MB` or `2g`.
///
/// Suffixes are powers of 1024 and the trailing `b` is optional.
pub fn parse_size_in_bytes(input: &str) -> Option<u64> {
    let mut s = input.trim().to_ascii_lowercase();
    if s.ends_with('b') {
        s.pop();
    }

    let multiplier: u64 = match s.chars().last()? {
        'k' => 1 << 10,
        'm' => 1 << 20,
        'g' => 1 << 30,
        _ => 1,
    };
    if multiplier > 1 {
        s.pop();
    }

    let size: u64 = s.trim().parse().ok()?;
    size.checked_mul(multiplier)
}

/// Parse a timestamp in RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD` or unix seconds.
///
/// Zone-less timestamps are taken as UTC.
pub fn parse_time(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }

    let secs: i64 = s.parse().ok()?;
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("10us"), Some(Duration::from_micros(10)));
        assert_eq!(parse_duration("2m3s4ms"), Some(Duration::from_millis(123_004)));
    }

    #[test]
    fn test_parse_duration_bare_number_is_nanos() {
        assert_eq!(parse_duration("1500"), Some(Duration::from_nanos(1500)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("-5s"), None);
        assert_eq!(parse_duration("5 days"), None);
        assert_eq!(parse_duration("ms"), None);
        assert_eq!(parse_duration("1x"), None);
    }

    #[test]
    fn test_parse_size_in_bytes() {
        assert_eq!(parse_size_in_bytes("512"), Some(512));
        assert_eq!(parse_size_in_bytes("1kb"), Some(1024));
        assert_eq!(parse_size_in_bytes("10 MB"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size_in_bytes("2g"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_size_in_bytes("3k"), Some(3072));
    }

    #[test]
    fn test_parse_size_in_bytes_invalid() {
        assert_eq!(parse_size_in_bytes(""), None);
        assert_eq!(parse_size_in_bytes("lots"), None);
        assert_eq!(parse_size_in_bytes("-1kb"), None);
        assert_eq!(parse_size_in_bytes("1.5mb"), None);
    }

    #[test]
    fn test_parse_time_formats() {
        let rfc = parse_time("2024-03-01T10:20:30+02:00").unwrap();
        assert_eq!(rfc.hour(), 8);

        let plain = parse_time("2024-03-01 10:20:30").unwrap();
        assert_eq!(plain.minute(), 20);

        let date = parse_time("2024-03-01").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 1));

        let unix = parse_time("0").unwrap();
        assert_eq!(unix.year(), 1970);
    }

    #[test]
    fn test_parse_time_invalid() {
        assert!(parse_time("yesterday").is_none());
    }
}
