//! Fixed-point timestamp codec used by the history file.
//!
//! Instants are written as `<seconds>.<micros>` relative to the Unix epoch.
//! `seconds` is the floor of the Unix time and `micros` the non-negative
//! sub-second remainder, always six digits, so a value written once is
//! reproduced byte-for-byte on the next save.

use thiserror::Error;
use time::{
    Duration, OffsetDateTime, PrimitiveDateTime, format_description::FormatItem,
    macros::format_description,
};

const FRACTION_DIGITS: usize = 6;

/// Legacy calendar form written by older reports for the last-check column.
const LEGACY_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
const LEGACY_FORMAT_NO_FRACTION: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// A history field could not be decoded as a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid timestamp '{0}'")]
pub struct TimestampError(pub String);

/// Encode an instant as `seconds.micros`.
pub fn encode(at: OffsetDateTime) -> String {
    format!("{}.{:06}", at.unix_timestamp(), at.microsecond())
}

/// Decode `seconds[.fraction]` or the legacy `YYYY-MM-DD HH:MM:SS[.ffffff]` form.
///
/// Fractions shorter than six digits are right-padded with zeros, longer ones
/// are truncated to microseconds.
pub fn decode(text: &str) -> Result<OffsetDateTime, TimestampError> {
    let text = text.trim();
    decode_unix(text)
        .or_else(|| decode_legacy(text))
        .ok_or_else(|| TimestampError(text.to_string()))
}

fn decode_unix(text: &str) -> Option<OffsetDateTime> {
    let (seconds, fraction) = text.split_once('.').unwrap_or((text, ""));
    let seconds: i64 = seconds.parse().ok()?;
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits: String = fraction.chars().take(FRACTION_DIGITS).collect();
    while digits.len() < FRACTION_DIGITS {
        digits.push('0');
    }
    let micros: i64 = digits.parse().ok()?;
    let base = OffsetDateTime::from_unix_timestamp(seconds).ok()?;
    base.checked_add(Duration::microseconds(micros))
}

fn decode_legacy(text: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(text, LEGACY_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(text, LEGACY_FORMAT_NO_FRACTION))
        .ok()
        .map(|parsed| parsed.assume_utc())
        .map(truncate_to_micros)
}

/// Drop sub-microsecond precision so the value survives an encode/decode cycle.
pub fn truncate_to_micros(at: OffsetDateTime) -> OffsetDateTime {
    let nanos = at.nanosecond() % 1_000;
    at - Duration::nanoseconds(i64::from(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::entry::NEVER_CHECKED;
    use time::macros::datetime;

    #[test]
    fn encodes_six_digit_fraction() {
        let at = datetime!(2023-11-14 22:13:20.000042 UTC);
        assert_eq!(encode(at), "1700000000.000042");
    }

    #[test]
    fn encodes_sentinel_before_epoch() {
        assert_eq!(encode(NEVER_CHECKED), "-2208988800.000000");
    }

    #[test]
    fn encodes_negative_fraction_as_floor_plus_remainder() {
        let at = OffsetDateTime::UNIX_EPOCH - Duration::milliseconds(1500);
        assert_eq!(encode(at), "-2.500000");
        assert_eq!(decode("-2.500000").unwrap(), at);
    }

    #[test]
    fn decode_pads_short_fraction() {
        let at = decode("1700000000.5").unwrap();
        assert_eq!(at, datetime!(2023-11-14 22:13:20.5 UTC));
    }

    #[test]
    fn decode_truncates_nanosecond_fraction() {
        let at = decode("1700000000.123456789").unwrap();
        assert_eq!(at, datetime!(2023-11-14 22:13:20.123456 UTC));
    }

    #[test]
    fn decode_accepts_missing_fraction() {
        assert_eq!(
            decode("1700000000").unwrap(),
            datetime!(2023-11-14 22:13:20 UTC)
        );
    }

    #[test]
    fn decode_accepts_legacy_calendar_form() {
        assert_eq!(
            decode("2024-02-03 04:05:06.070000").unwrap(),
            datetime!(2024-02-03 04:05:06.07 UTC)
        );
        assert_eq!(
            decode("1900-01-01 00:00:00").unwrap(),
            NEVER_CHECKED
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode("").is_err());
        assert!(decode("abc").is_err());
        assert!(decode("12.3x").is_err());
    }

    #[test]
    fn truncate_drops_nanoseconds() {
        let at = datetime!(2024-01-01 0:00:00.123456789 UTC);
        assert_eq!(truncate_to_micros(at), datetime!(2024-01-01 0:00:00.123456 UTC));
    }
}
