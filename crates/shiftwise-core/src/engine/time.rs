/// Local-time helpers for the scheduling engine.
///
/// All times are DST-free wall-clock `HH:MM` strings converted to
/// minutes-of-day. Cross-midnight ranges are represented by an end beyond
/// 1440; an end that is not after its start is read as "next day".
use chrono::{Datelike, Duration, NaiveDate};

use crate::domain::DomainError;

pub const MINUTES_PER_DAY: u32 = 1440;

/// Bucket sizes the engine supports. Anything else falls back to the default.
pub const SUPPORTED_BUCKET_MINUTES: [u32; 6] = [5, 10, 15, 20, 30, 60];
pub const DEFAULT_BUCKET_MINUTES: u32 = 60;

/// Parse `HH:MM` into minutes of day in `[0, 1440)`.
pub fn parse_hhmm(value: &str) -> Result<u32, DomainError> {
    let invalid = || DomainError::InvalidTime(value.to_string());

    let (hh, mm) = value.split_once(':').ok_or_else(invalid)?;
    if hh.len() != 2 || mm.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = hh.parse().map_err(|_| invalid())?;
    let minutes: u32 = mm.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Format minutes of day as `HH:MM`, wrapping past midnight.
pub fn format_hhmm(minutes: u32) -> String {
    let m = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", m / 60, m % 60)
}

pub fn is_valid_date_key(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn parse_date_key(value: &str) -> Result<NaiveDate, DomainError> {
    if value.len() != 10 {
        return Err(DomainError::InvalidDateKey(value.to_string()));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| DomainError::InvalidDateKey(value.to_string()))
}

/// Day of week for a date key, 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date_key: &str) -> Result<u8, DomainError> {
    let date = parse_date_key(date_key)?;
    Ok(date.weekday().num_days_from_sunday() as u8)
}

pub fn add_days(date_key: &str, days: i64) -> Result<String, DomainError> {
    let date = parse_date_key(date_key)?;
    Ok((date + Duration::days(days)).format("%Y-%m-%d").to_string())
}

/// Effective bucket size for a ruleset value; unsupported sizes fall back to
/// the 60-minute default.
pub fn normalize_bucket_minutes(bucket: Option<u32>) -> u32 {
    match bucket {
        Some(b) if SUPPORTED_BUCKET_MINUTES.contains(&b) => b,
        _ => DEFAULT_BUCKET_MINUTES,
    }
}

/// Resolve the effective end of a shift in minutes (possibly beyond 1440).
///
/// An explicit end that is not after the start crosses midnight. Without an
/// explicit end the day's closing time plus offset applies, again crossing
/// midnight when needed. Returns `None` when no end can be resolved.
pub fn resolve_shift_end(
    start: u32,
    end: Option<u32>,
    closing: Option<(u32, i64)>,
) -> Option<u32> {
    match end {
        Some(e) => {
            if e <= start {
                Some(e + MINUTES_PER_DAY)
            } else {
                Some(e)
            }
        }
        None => {
            let (closing_time, offset) = closing?;
            let effective = closing_time as i64 + offset;
            if effective < 0 {
                return None;
            }
            let effective = effective as u32;
            if effective <= start {
                Some(effective + MINUTES_PER_DAY)
            } else {
                Some(effective)
            }
        }
    }
}

fn normalize_range(start: u32, end: u32) -> (u32, u32) {
    if end <= start {
        (start, end + MINUTES_PER_DAY)
    } else {
        (start, end)
    }
}

fn open_intervals_overlap(a0: u32, a1: u32, b0: u32, b1: u32) -> bool {
    a0 < b1 && b0 < a1
}

/// Half-open overlap of two wall-clock ranges given as minutes of day.
///
/// An end at or before its start means the range runs into the next day.
/// The comparison also considers either range shifted by one day so that
/// `22:00-02:00` overlaps `01:00-03:00` of the following morning.
pub fn ranges_overlap(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    let (a0, a1) = normalize_range(a_start, a_end);
    let (b0, b1) = normalize_range(b_start, b_end);

    open_intervals_overlap(a0, a1, b0, b1)
        || open_intervals_overlap(a0, a1, b0 + MINUTES_PER_DAY, b1 + MINUTES_PER_DAY)
        || open_intervals_overlap(a0 + MINUTES_PER_DAY, a1 + MINUTES_PER_DAY, b0, b1)
}

/// Overlap check on `HH:MM` strings; unparsable times never overlap.
pub fn hhmm_ranges_overlap(a_start: &str, a_end: &str, b_start: &str, b_end: &str) -> bool {
    match (
        parse_hhmm(a_start),
        parse_hhmm(a_end),
        parse_hhmm(b_start),
        parse_hhmm(b_end),
    ) {
        (Ok(a0), Ok(a1), Ok(b0), Ok(b1)) => ranges_overlap(a0, a1, b0, b1),
        _ => false,
    }
}

/// Canonical slot key `YYYY-MM-DD|HH:MM`, bucket-aligned. Minutes past
/// midnight roll the date forward.
pub fn slot_key(date_key: &str, minutes: u32, bucket_minutes: u32) -> Result<String, DomainError> {
    let bucket = normalize_bucket_minutes(Some(bucket_minutes));
    let aligned = minutes - minutes % bucket;
    let day_offset = (aligned / MINUTES_PER_DAY) as i64;
    let date = if day_offset > 0 {
        add_days(date_key, day_offset)?
    } else {
        parse_date_key(date_key)?;
        date_key.to_string()
    };
    Ok(format!("{}|{}", date, format_hhmm(aligned)))
}

/// Split a slot key back into its date and `HH:MM` parts.
pub fn split_slot_key(slot: &str) -> Option<(&str, &str)> {
    slot.split_once('|')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hhmm_valid() {
        assert_eq!(parse_hhmm("00:00").unwrap(), 0);
        assert_eq!(parse_hhmm("08:30").unwrap(), 510);
        assert_eq!(parse_hhmm("23:59").unwrap(), 1439);
    }

    #[test]
    fn test_parse_hhmm_invalid() {
        for bad in ["24:00", "8:00", "08:60", "0800", "", "ab:cd", "08:0"] {
            assert!(parse_hhmm(bad).is_err(), "expected {} to be invalid", bad);
        }
    }

    #[test]
    fn test_format_hhmm_wraps_past_midnight() {
        assert_eq!(format_hhmm(1560), "02:00");
        assert_eq!(format_hhmm(1439), "23:59");
    }

    #[test]
    fn test_day_of_week_zero_is_sunday() {
        assert_eq!(day_of_week("2025-01-05").unwrap(), 0); // Sunday
        assert_eq!(day_of_week("2025-01-06").unwrap(), 1); // Monday
        assert_eq!(day_of_week("2025-01-11").unwrap(), 6); // Saturday
    }

    #[test]
    fn test_add_days_crosses_month() {
        assert_eq!(add_days("2025-01-31", 1).unwrap(), "2025-02-01");
        assert_eq!(add_days("2024-01-04", 1).unwrap(), "2024-01-05");
    }

    #[test]
    fn test_resolve_shift_end_explicit_cross_midnight() {
        // 22:00 -> 02:00 runs into the next day
        assert_eq!(resolve_shift_end(1320, Some(120), None), Some(1560));
        // plain end
        assert_eq!(resolve_shift_end(540, Some(720), None), Some(720));
    }

    #[test]
    fn test_resolve_shift_end_from_closing_time() {
        // closing 22:00 + 30 minutes offset
        assert_eq!(resolve_shift_end(540, None, Some((1320, 30))), Some(1350));
        // closing before start wraps to next day: start 23:00, closing 22:00
        assert_eq!(
            resolve_shift_end(1380, None, Some((1320, 0))),
            Some(1320 + MINUTES_PER_DAY)
        );
        // no closing available
        assert_eq!(resolve_shift_end(540, None, None), None);
    }

    #[rstest::rstest]
    #[case("22:00", "02:00", "01:00", "03:00", true)]
    #[case("22:00", "02:00", "03:00", "04:00", false)]
    #[case("22:00", "02:00", "23:00", "23:30", true)]
    #[case("08:00", "12:00", "11:00", "13:00", true)]
    #[case("08:00", "12:00", "12:00", "13:00", false)]
    fn test_ranges_overlap_cases(
        #[case] a_start: &str,
        #[case] a_end: &str,
        #[case] b_start: &str,
        #[case] b_end: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(
            hhmm_ranges_overlap(a_start, a_end, b_start, b_end),
            expected
        );
    }

    #[test]
    fn test_ranges_overlap_half_open_endpoints() {
        // identical endpoints do not overlap
        assert!(!hhmm_ranges_overlap("08:00", "09:00", "09:00", "10:00"));
        assert!(hhmm_ranges_overlap("08:00", "09:01", "09:00", "10:00"));
    }

    #[test]
    fn test_slot_key_alignment_and_rollover() {
        assert_eq!(slot_key("2025-01-06", 545, 60).unwrap(), "2025-01-06|09:00");
        assert_eq!(slot_key("2025-01-06", 545, 30).unwrap(), "2025-01-06|09:00");
        // 25:00 lands on the next day at 01:00
        assert_eq!(slot_key("2025-01-06", 1500, 60).unwrap(), "2025-01-07|01:00");
    }

    #[test]
    fn test_normalize_bucket_minutes() {
        assert_eq!(normalize_bucket_minutes(None), 60);
        assert_eq!(normalize_bucket_minutes(Some(15)), 15);
        assert_eq!(normalize_bucket_minutes(Some(7)), 60);
        assert_eq!(normalize_bucket_minutes(Some(0)), 60);
    }
}
