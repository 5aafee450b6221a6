/// Per-slot capacity computation.
use crate::domain::{CapacityMap, ScheduleSettings, Shift};
use crate::engine::settings::effective_closing;
use crate::engine::time::{day_of_week, parse_hhmm, resolve_shift_end, slot_key};

/// Position bucket for shifts without an assigned position.
pub const UNASSIGNED_POSITION: &str = "unassigned";

/// Resolve a shift's `[start, end)` range in minutes relative to its date
/// key (end may exceed 1440 for cross-midnight shifts). Returns `None` when
/// the start is unparsable or no end can be resolved.
pub fn resolve_shift_range(shift: &Shift, settings: &ScheduleSettings) -> Option<(u32, u32)> {
    let start = parse_hhmm(&shift.start_time).ok()?;
    // A malformed explicit end is dropped and the closing-time fallback
    // applies instead.
    let end = shift
        .end_time
        .as_deref()
        .and_then(|t| parse_hhmm(t).ok());
    let closing = day_of_week(&shift.date_key)
        .ok()
        .and_then(|day| effective_closing(settings, day));
    let end = resolve_shift_end(start, end, closing)?;
    Some((start, end))
}

/// Build the capacity map: slot key -> position id -> count of overlapping
/// shifts, at `bucket_minutes` resolution.
pub fn build_capacity_map(
    shifts: &[Shift],
    settings: &ScheduleSettings,
    bucket_minutes: u32,
) -> CapacityMap {
    let mut capacity = CapacityMap::new();

    for shift in shifts {
        let Some((start, end)) = resolve_shift_range(shift, settings) else {
            continue;
        };
        let position = shift
            .position_id
            .clone()
            .unwrap_or_else(|| UNASSIGNED_POSITION.to_string());

        let mut t = start - start % bucket_minutes;
        while t < end {
            let Ok(key) = slot_key(&shift.date_key, t, bucket_minutes) else {
                break;
            };
            *capacity
                .entry(key)
                .or_default()
                .entry(position.clone())
                .or_default() += 1;
            t += bucket_minutes;
        }
    }

    capacity
}

/// Look up the capacity for a position at a slot, defaulting to zero.
pub fn capacity_at(capacity: &CapacityMap, slot: &str, position_id: &str) -> u32 {
    capacity
        .get(slot)
        .and_then(|positions| positions.get(position_id))
        .copied()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ScheduleSettingsInput;
    use crate::engine::settings::normalize_schedule_settings;

    fn settings() -> ScheduleSettings {
        normalize_schedule_settings(&ScheduleSettingsInput::default())
    }

    fn shift(id: &str, user: &str, date: &str, start: &str, end: Option<&str>, pos: Option<&str>) -> Shift {
        Shift {
            id: id.to_string(),
            user_id: user.to_string(),
            unit_id: "unit-1".to_string(),
            date_key: date.to_string(),
            start_time: start.to_string(),
            end_time: end.map(|e| e.to_string()),
            position_id: pos.map(|p| p.to_string()),
        }
    }

    #[test]
    fn test_counts_each_covered_slot() {
        let shifts = vec![shift("s1", "u1", "2025-01-06", "09:00", Some("12:00"), Some("p1"))];
        let capacity = build_capacity_map(&shifts, &settings(), 60);

        assert_eq!(capacity_at(&capacity, "2025-01-06|09:00", "p1"), 1);
        assert_eq!(capacity_at(&capacity, "2025-01-06|11:00", "p1"), 1);
        assert_eq!(capacity_at(&capacity, "2025-01-06|12:00", "p1"), 0);
    }

    #[test]
    fn test_missing_position_counts_as_unassigned() {
        let shifts = vec![shift("s1", "u1", "2025-01-06", "09:00", Some("10:00"), None)];
        let capacity = build_capacity_map(&shifts, &settings(), 60);

        assert_eq!(capacity_at(&capacity, "2025-01-06|09:00", UNASSIGNED_POSITION), 1);
    }

    #[test]
    fn test_cross_midnight_shift_spills_to_next_day() {
        let shifts = vec![shift("s1", "u1", "2025-01-06", "22:00", Some("02:00"), Some("p1"))];
        let capacity = build_capacity_map(&shifts, &settings(), 60);

        assert_eq!(capacity_at(&capacity, "2025-01-06|23:00", "p1"), 1);
        assert_eq!(capacity_at(&capacity, "2025-01-07|00:00", "p1"), 1);
        assert_eq!(capacity_at(&capacity, "2025-01-07|01:00", "p1"), 1);
        assert_eq!(capacity_at(&capacity, "2025-01-07|02:00", "p1"), 0);
    }

    #[test]
    fn test_open_ended_shift_uses_closing_time() {
        // default closing is 22:00; shift runs 20:00 -> 22:00
        let shifts = vec![shift("s1", "u1", "2025-01-06", "20:00", None, Some("p1"))];
        let capacity = build_capacity_map(&shifts, &settings(), 60);

        assert_eq!(capacity_at(&capacity, "2025-01-06|20:00", "p1"), 1);
        assert_eq!(capacity_at(&capacity, "2025-01-06|21:00", "p1"), 1);
        assert_eq!(capacity_at(&capacity, "2025-01-06|22:00", "p1"), 0);
    }

    #[test]
    fn test_unparsable_start_contributes_nothing() {
        let shifts = vec![shift("s1", "u1", "2025-01-06", "9am", Some("12:00"), Some("p1"))];
        let capacity = build_capacity_map(&shifts, &settings(), 60);
        assert!(capacity.is_empty());
    }
}
