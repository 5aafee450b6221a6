/// Constraint evaluation: minimum coverage by position and employee
/// availability. Violations carry deterministic IDs so identical inputs
/// always produce identical violation lists.
use std::collections::BTreeMap;

use crate::domain::{
    Affected, CapacityMap, EmployeeProfile, MinCoverageRule, ScheduleSettings, Severity, Shift,
    Violation,
};
use crate::engine::capacity::{capacity_at, resolve_shift_range};
use crate::engine::time::{
    day_of_week, format_hhmm, parse_hhmm, slot_key, split_slot_key, MINUTES_PER_DAY,
};

pub const CONSTRAINT_MIN_COVERAGE: &str = "min-coverage-by-position";
pub const CONSTRAINT_EMPLOYEE_AVAILABILITY: &str = "employee-availability";

// ===== Availability resolution =====

/// Availability of one user on one date, resolved from exceptions and the
/// weekly rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayAvailability {
    AllDay,
    /// Normalized `[start, end)` windows in minutes; cross-midnight windows
    /// extend beyond 1440.
    Windows(Vec<(u32, u32)>),
    Unavailable,
}

fn normalize_windows(windows: &[crate::domain::AvailabilityWindow]) -> Vec<(u32, u32)> {
    let mut normalized: Vec<(u32, u32)> = windows
        .iter()
        .filter_map(|w| {
            let start = parse_hhmm(&w.start_hhmm).ok()?;
            let end = parse_hhmm(&w.end_hhmm).ok()?;
            let end = if end <= start { end + MINUTES_PER_DAY } else { end };
            Some((start, end))
        })
        .collect();
    normalized.sort_unstable();
    normalized
}

/// Resolve a user's availability on a date. A matching exception wins over
/// the weekly rule; a missing profile means unconditionally available.
pub fn day_availability(profile: Option<&EmployeeProfile>, date_key: &str) -> DayAvailability {
    let Some(profile) = profile else {
        return DayAvailability::AllDay;
    };

    if let Some(exception) = profile
        .availability
        .exceptions
        .iter()
        .find(|e| e.date_key == date_key)
    {
        if !exception.available {
            return DayAvailability::Unavailable;
        }
        return match &exception.windows {
            Some(windows) => DayAvailability::Windows(normalize_windows(windows)),
            None => DayAvailability::AllDay,
        };
    }

    let Ok(day) = day_of_week(date_key) else {
        return DayAvailability::Unavailable;
    };
    match profile.availability.weekly.get(&day) {
        Some(windows) if !windows.is_empty() => {
            DayAvailability::Windows(normalize_windows(windows))
        }
        // Missing or empty weekly entry means unavailable that day.
        _ => DayAvailability::Unavailable,
    }
}

/// Whether the union of the windows contains `[start, end)`.
fn windows_cover_range(windows: &[(u32, u32)], start: u32, end: u32) -> bool {
    let mut covered_until = start;
    for &(w_start, w_end) in windows {
        if covered_until >= end {
            break;
        }
        if w_start > covered_until {
            return false;
        }
        if w_end > covered_until {
            covered_until = w_end;
        }
    }
    covered_until >= end
}

/// Whether the user may work `[start, end)` (minutes, end possibly beyond
/// 1440) on the given date.
pub fn user_available_for_range(
    profile: Option<&EmployeeProfile>,
    date_key: &str,
    start: u32,
    end: u32,
) -> bool {
    match day_availability(profile, date_key) {
        DayAvailability::AllDay => true,
        DayAvailability::Unavailable => false,
        DayAvailability::Windows(windows) => windows_cover_range(&windows, start, end),
    }
}

// ===== Constraint evaluation =====

/// Aligned slot starts covered by `[start, end)` at the given bucket size.
fn slot_starts(start: u32, end: u32, bucket_minutes: u32) -> impl Iterator<Item = u32> {
    let first = start - start % bucket_minutes;
    (0..)
        .map(move |i| first + i * bucket_minutes)
        .take_while(move |t| *t < end)
}

fn evaluate_min_coverage(
    rules: &[MinCoverageRule],
    capacity: &CapacityMap,
    bucket_minutes: u32,
) -> Vec<Violation> {
    // Keyed by violation id; overlapping rules for the same slot keep the
    // occurrence with the larger deficit.
    let mut by_id: BTreeMap<String, (u32, Violation)> = BTreeMap::new();

    for rule in rules {
        let (Ok(start), Ok(end)) = (parse_hhmm(&rule.start_time), parse_hhmm(&rule.end_time))
        else {
            continue;
        };
        let end = if end <= start { end + MINUTES_PER_DAY } else { end };

        for date_key in &rule.date_keys {
            for t in slot_starts(start, end, bucket_minutes) {
                let Ok(slot) = slot_key(date_key, t, bucket_minutes) else {
                    continue;
                };
                let count = capacity_at(capacity, &slot, &rule.position_id);
                if count >= rule.min_count {
                    continue;
                }
                let deficit = rule.min_count - count;
                let (slot_date, slot_time) = match split_slot_key(&slot) {
                    Some(parts) => parts,
                    None => continue,
                };

                let id = format!(
                    "violation:{}:{}:{}:{}",
                    CONSTRAINT_MIN_COVERAGE, rule.position_id, slot_date, slot_time
                );
                let violation = Violation {
                    id: id.clone(),
                    constraint_id: CONSTRAINT_MIN_COVERAGE.to_string(),
                    severity: if deficit >= 2 {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    affected: Affected {
                        position_id: Some(rule.position_id.clone()),
                        date_keys: vec![slot_date.to_string()],
                        slots: vec![slot.clone()],
                        ..Default::default()
                    },
                    details: format!(
                        "Coverage for position {} at {} is {} of {} required",
                        rule.position_id, slot, count, rule.min_count
                    ),
                };

                let keep_existing = by_id
                    .get(&id)
                    .map(|(existing_deficit, _)| *existing_deficit >= deficit)
                    .unwrap_or(false);
                if !keep_existing {
                    by_id.insert(id, (deficit, violation));
                }
            }
        }
    }

    by_id.into_values().map(|(_, v)| v).collect()
}

fn evaluate_availability(
    shifts: &[Shift],
    profiles: &BTreeMap<String, EmployeeProfile>,
    settings: &ScheduleSettings,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for shift in shifts {
        let profile = profiles.get(&shift.user_id);
        if profile.is_none() {
            continue;
        }
        let Some((start, end)) = resolve_shift_range(shift, settings) else {
            continue;
        };
        if user_available_for_range(profile, &shift.date_key, start, end) {
            continue;
        }

        violations.push(Violation {
            id: format!(
                "violation:{}:{}:{}:{}",
                CONSTRAINT_EMPLOYEE_AVAILABILITY, shift.user_id, shift.date_key, shift.id
            ),
            constraint_id: CONSTRAINT_EMPLOYEE_AVAILABILITY.to_string(),
            severity: Severity::Medium,
            affected: Affected {
                user_ids: vec![shift.user_id.clone()],
                position_id: shift.position_id.clone(),
                date_keys: vec![shift.date_key.clone()],
                shift_ids: vec![shift.id.clone()],
                ..Default::default()
            },
            details: format!(
                "{} is scheduled {} to {} on {} outside their availability",
                shift.user_id,
                format_hhmm(start),
                format_hhmm(end),
                shift.date_key
            ),
        });
    }

    violations
}

/// Evaluate every constraint against the (already rewritten) input and
/// return the violations sorted by
/// `(dateKey, slot, constraintId, positionId, userId)`.
pub fn evaluate_constraints(
    shifts: &[Shift],
    rules: &[MinCoverageRule],
    profiles: &BTreeMap<String, EmployeeProfile>,
    settings: &ScheduleSettings,
    capacity: &CapacityMap,
    bucket_minutes: u32,
) -> Vec<Violation> {
    let mut violations = evaluate_min_coverage(rules, capacity, bucket_minutes);
    violations.extend(evaluate_availability(shifts, profiles, settings));
    violations.sort_by_key(|v| v.sort_key());
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Availability, AvailabilityException, AvailabilityWindow, ScheduleSettingsInput,
    };
    use crate::engine::capacity::build_capacity_map;
    use crate::engine::settings::normalize_schedule_settings;

    fn settings() -> ScheduleSettings {
        normalize_schedule_settings(&ScheduleSettingsInput::default())
    }

    fn window(start: &str, end: &str) -> AvailabilityWindow {
        AvailabilityWindow {
            start_hhmm: start.to_string(),
            end_hhmm: end.to_string(),
        }
    }

    fn profile_with_weekly(user: &str, day: u8, windows: Vec<AvailabilityWindow>) -> EmployeeProfile {
        let mut weekly = BTreeMap::new();
        weekly.insert(day, windows);
        EmployeeProfile {
            user_id: user.to_string(),
            unit_id: "unit-1".to_string(),
            availability: Availability {
                weekly,
                exceptions: Vec::new(),
            },
        }
    }

    fn shift(id: &str, user: &str, date: &str, start: &str, end: &str) -> Shift {
        Shift {
            id: id.to_string(),
            user_id: user.to_string(),
            unit_id: "unit-1".to_string(),
            date_key: date.to_string(),
            start_time: start.to_string(),
            end_time: Some(end.to_string()),
            position_id: Some("p1".to_string()),
        }
    }

    #[test]
    fn test_min_coverage_emits_one_violation_per_slot() {
        let rules = vec![MinCoverageRule {
            position_id: "p1".to_string(),
            date_keys: vec!["2025-01-06".to_string()],
            start_time: "08:00".to_string(),
            end_time: "10:00".to_string(),
            min_count: 1,
        }];
        let capacity = CapacityMap::new();

        let violations = evaluate_min_coverage(&rules, &capacity, 60);
        let ids: Vec<&str> = violations.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "violation:min-coverage-by-position:p1:2025-01-06:08:00",
                "violation:min-coverage-by-position:p1:2025-01-06:09:00",
            ]
        );
        assert!(violations.iter().all(|v| v.severity == Severity::Medium));
    }

    #[test]
    fn test_min_coverage_deficit_of_two_is_high_severity() {
        let rules = vec![MinCoverageRule {
            position_id: "p1".to_string(),
            date_keys: vec!["2025-01-06".to_string()],
            start_time: "08:00".to_string(),
            end_time: "09:00".to_string(),
            min_count: 2,
        }];
        let violations = evaluate_min_coverage(&rules, &CapacityMap::new(), 60);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::High);
    }

    #[test]
    fn test_min_coverage_satisfied_slot_is_silent() {
        let rules = vec![MinCoverageRule {
            position_id: "p1".to_string(),
            date_keys: vec!["2025-01-06".to_string()],
            start_time: "09:00".to_string(),
            end_time: "10:00".to_string(),
            min_count: 1,
        }];
        let shifts = vec![shift("s1", "u1", "2025-01-06", "09:00", "12:00")];
        let capacity = build_capacity_map(&shifts, &settings(), 60);

        assert!(evaluate_min_coverage(&rules, &capacity, 60).is_empty());
    }

    #[test]
    fn test_availability_violation_for_unavailable_day() {
        // 2025-01-06 is a Monday (day 1); the weekly entry is empty
        let mut profiles = BTreeMap::new();
        profiles.insert("u1".to_string(), profile_with_weekly("u1", 1, vec![]));
        let shifts = vec![shift("s1", "u1", "2025-01-06", "09:00", "12:00")];

        let violations = evaluate_availability(&shifts, &profiles, &settings());
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].id,
            "violation:employee-availability:u1:2025-01-06:s1"
        );
        assert_eq!(violations[0].affected.user_ids, vec!["u1".to_string()]);
    }

    #[test]
    fn test_availability_window_must_contain_whole_shift() {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "u1".to_string(),
            profile_with_weekly("u1", 1, vec![window("08:00", "11:00")]),
        );

        let inside = vec![shift("s1", "u1", "2025-01-06", "08:00", "11:00")];
        assert!(evaluate_availability(&inside, &profiles, &settings()).is_empty());

        let overhang = vec![shift("s2", "u1", "2025-01-06", "09:00", "12:00")];
        assert_eq!(evaluate_availability(&overhang, &profiles, &settings()).len(), 1);
    }

    #[test]
    fn test_availability_union_of_windows_covers_shift() {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "u1".to_string(),
            profile_with_weekly(
                "u1",
                1,
                vec![window("08:00", "10:00"), window("10:00", "12:00")],
            ),
        );
        let shifts = vec![shift("s1", "u1", "2025-01-06", "08:30", "11:30")];

        assert!(evaluate_availability(&shifts, &profiles, &settings()).is_empty());
    }

    #[test]
    fn test_availability_exception_overrides_weekly() {
        let mut profile = profile_with_weekly("u1", 1, vec![]);
        profile.availability.exceptions.push(AvailabilityException {
            date_key: "2025-01-06".to_string(),
            available: true,
            windows: Some(vec![window("09:00", "13:00")]),
        });
        let mut profiles = BTreeMap::new();
        profiles.insert("u1".to_string(), profile);

        let shifts = vec![shift("s1", "u1", "2025-01-06", "09:00", "12:00")];
        assert!(evaluate_availability(&shifts, &profiles, &settings()).is_empty());
    }

    #[test]
    fn test_availability_exception_unavailable_wins() {
        let mut profile = profile_with_weekly("u1", 1, vec![window("08:00", "18:00")]);
        profile.availability.exceptions.push(AvailabilityException {
            date_key: "2025-01-06".to_string(),
            available: false,
            windows: None,
        });
        let mut profiles = BTreeMap::new();
        profiles.insert("u1".to_string(), profile);

        let shifts = vec![shift("s1", "u1", "2025-01-06", "09:00", "12:00")];
        assert_eq!(evaluate_availability(&shifts, &profiles, &settings()).len(), 1);
    }

    #[test]
    fn test_missing_profile_is_unconditionally_available() {
        let shifts = vec![shift("s1", "u1", "2025-01-06", "09:00", "12:00")];
        assert!(evaluate_availability(&shifts, &BTreeMap::new(), &settings()).is_empty());
    }

    #[test]
    fn test_cross_midnight_window_covers_cross_midnight_shift() {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "u1".to_string(),
            profile_with_weekly("u1", 1, vec![window("22:00", "03:00")]),
        );
        let shifts = vec![shift("s1", "u1", "2025-01-06", "22:00", "02:00")];

        assert!(evaluate_availability(&shifts, &profiles, &settings()).is_empty());
    }

    #[test]
    fn test_violations_sorted_deterministically() {
        let rules = vec![MinCoverageRule {
            position_id: "p1".to_string(),
            date_keys: vec!["2025-01-07".to_string(), "2025-01-06".to_string()],
            start_time: "08:00".to_string(),
            end_time: "09:00".to_string(),
            min_count: 1,
        }];
        let violations = evaluate_constraints(
            &[],
            &rules,
            &BTreeMap::new(),
            &settings(),
            &CapacityMap::new(),
            60,
        );

        let dates: Vec<&str> = violations
            .iter()
            .map(|v| v.affected.date_keys[0].as_str())
            .collect();
        assert_eq!(dates, vec!["2025-01-06", "2025-01-07"]);
    }
}
