/// Normalization of raw schedule settings into seven fully populated
/// day-of-week entries (index 0 = Sunday).
use crate::domain::{DailySetting, DailySettingInput, ScheduleSettings, ScheduleSettingsInput};
use crate::engine::time::parse_hhmm;

pub const DEFAULT_OPENING_TIME: &str = "08:00";
pub const DEFAULT_CLOSING_TIME: &str = "22:00";
pub const MAX_CLOSING_OFFSET_MINUTES: i64 = 240;

/// Round a raw offset and clamp it into `[0, 240]`. Absent or non-finite
/// values become 0.
fn clamp_offset(raw: Option<f64>) -> i64 {
    let value = match raw {
        Some(v) if v.is_finite() => v.round() as i64,
        _ => 0,
    };
    value.clamp(0, MAX_CLOSING_OFFSET_MINUTES)
}

fn valid_time_or(raw: Option<&str>, fallback: &str) -> String {
    match raw {
        Some(t) if parse_hhmm(t).is_ok() => t.to_string(),
        _ => fallback.to_string(),
    }
}

fn normalize_day(raw: Option<&DailySettingInput>) -> DailySetting {
    let raw = raw.cloned().unwrap_or_default();

    let opening_time = valid_time_or(raw.opening_time.as_deref(), DEFAULT_OPENING_TIME);

    // A missing closing time inherits the unit default and is flagged as
    // inherited; an explicit closing keeps its own inherit flag (false when
    // unset).
    let closing_valid = raw
        .closing_time
        .as_deref()
        .filter(|t| parse_hhmm(t).is_ok());
    let (closing_time, closing_time_inherit) = match closing_valid {
        Some(t) => (t.to_string(), raw.closing_time_inherit.unwrap_or(false)),
        None => (DEFAULT_CLOSING_TIME.to_string(), true),
    };

    DailySetting {
        is_open: raw.is_open.unwrap_or(true),
        opening_time,
        closing_time,
        closing_time_inherit,
        closing_offset_minutes: clamp_offset(raw.closing_offset_minutes),
        quotas: raw.quotas.unwrap_or_default(),
    }
}

pub fn normalize_schedule_settings(input: &ScheduleSettingsInput) -> ScheduleSettings {
    let days = (0u8..7)
        .map(|day| normalize_day(input.daily_settings.get(&day)))
        .collect();

    ScheduleSettings {
        days,
        default_closing_time: valid_time_or(
            input.default_closing_time.as_deref(),
            DEFAULT_CLOSING_TIME,
        ),
        default_closing_offset_minutes: clamp_offset(input.default_closing_offset_minutes),
        merge_daily_settings: input.merge_daily_settings,
    }
}

/// Closing time and offset the engine should use for a given day of week.
///
/// Days flagged as inheriting fall back to the unit defaults unless
/// `merge_daily_settings` keeps the per-day values authoritative.
pub fn effective_closing(settings: &ScheduleSettings, day_of_week: u8) -> Option<(u32, i64)> {
    let day = settings.days.get(day_of_week as usize)?;
    let (closing, offset) = if day.closing_time_inherit && !settings.merge_daily_settings {
        (
            settings.default_closing_time.as_str(),
            settings.default_closing_offset_minutes,
        )
    } else {
        (day.closing_time.as_str(), day.closing_offset_minutes)
    };
    parse_hhmm(closing).ok().map(|minutes| (minutes, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn input_with_day(day: u8, setting: DailySettingInput) -> ScheduleSettingsInput {
        let mut daily_settings = BTreeMap::new();
        daily_settings.insert(day, setting);
        ScheduleSettingsInput {
            daily_settings,
            ..Default::default()
        }
    }

    #[test]
    fn test_fills_all_seven_days_with_defaults() {
        let normalized = normalize_schedule_settings(&ScheduleSettingsInput::default());

        assert_eq!(normalized.days.len(), 7);
        for day in &normalized.days {
            assert!(day.is_open);
            assert_eq!(day.opening_time, DEFAULT_OPENING_TIME);
            assert_eq!(day.closing_time, DEFAULT_CLOSING_TIME);
            assert!(day.closing_time_inherit);
            assert_eq!(day.closing_offset_minutes, 0);
        }
        assert_eq!(normalized.default_closing_time, DEFAULT_CLOSING_TIME);
    }

    #[test]
    fn test_explicit_closing_keeps_value_and_flag() {
        let input = input_with_day(
            2,
            DailySettingInput {
                closing_time: Some("23:30".to_string()),
                closing_time_inherit: Some(true),
                ..Default::default()
            },
        );

        let normalized = normalize_schedule_settings(&input);
        assert_eq!(normalized.days[2].closing_time, "23:30");
        assert!(normalized.days[2].closing_time_inherit);

        // without an explicit flag, inherit defaults to false
        let input = input_with_day(
            2,
            DailySettingInput {
                closing_time: Some("23:30".to_string()),
                ..Default::default()
            },
        );
        let normalized = normalize_schedule_settings(&input);
        assert!(!normalized.days[2].closing_time_inherit);
    }

    #[test]
    fn test_offset_rounded_and_clamped() {
        let input = input_with_day(
            0,
            DailySettingInput {
                closing_offset_minutes: Some(120.4),
                ..Default::default()
            },
        );
        assert_eq!(
            normalize_schedule_settings(&input).days[0].closing_offset_minutes,
            120
        );

        let input = input_with_day(
            0,
            DailySettingInput {
                closing_offset_minutes: Some(999.0),
                ..Default::default()
            },
        );
        assert_eq!(
            normalize_schedule_settings(&input).days[0].closing_offset_minutes,
            240
        );

        let input = input_with_day(
            0,
            DailySettingInput {
                closing_offset_minutes: Some(-15.0),
                ..Default::default()
            },
        );
        assert_eq!(
            normalize_schedule_settings(&input).days[0].closing_offset_minutes,
            0
        );
    }

    #[test]
    fn test_effective_closing_inherits_defaults() {
        let mut input = input_with_day(
            1,
            DailySettingInput {
                closing_time: None,
                ..Default::default()
            },
        );
        input.default_closing_time = Some("21:00".to_string());
        input.default_closing_offset_minutes = Some(30.0);

        let normalized = normalize_schedule_settings(&input);
        // inherit=true and merge=false: defaults win
        assert_eq!(effective_closing(&normalized, 1), Some((1260, 30)));
    }

    #[test]
    fn test_effective_closing_merge_keeps_day_values() {
        let mut input = input_with_day(
            1,
            DailySettingInput {
                closing_time: Some("20:00".to_string()),
                closing_time_inherit: Some(true),
                closing_offset_minutes: Some(10.0),
                ..Default::default()
            },
        );
        input.default_closing_time = Some("21:00".to_string());
        input.merge_daily_settings = true;

        let normalized = normalize_schedule_settings(&input);
        assert_eq!(effective_closing(&normalized, 1), Some((1200, 10)));
    }
}
