//! Reusable engine-input fixtures.
//!
//! The baseline week starts Monday 2025-01-06. Day-of-week indexes follow
//! the engine convention (0 = Sunday), so Monday is day 1.

use std::collections::BTreeMap;

use crate::domain::{
    Availability, AvailabilityWindow, EmployeeProfile, EngineInput, MinCoverageRule, Position,
    Ruleset, Shift, User,
};

pub const WEEK_START: &str = "2025-01-06";

/// Seven consecutive date keys starting at `WEEK_START`.
pub fn week_days() -> Vec<String> {
    (6..13).map(|day| format!("2025-01-{:02}", day)).collect()
}

pub fn user(id: &str, name: &str, active: bool) -> User {
    User {
        id: id.to_string(),
        display_name: name.to_string(),
        is_active: active,
    }
}

pub fn position(id: &str, name: &str) -> Position {
    Position {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn window(start: &str, end: &str) -> AvailabilityWindow {
    AvailabilityWindow {
        start_hhmm: start.to_string(),
        end_hhmm: end.to_string(),
    }
}

/// Profile with weekly windows only.
pub fn weekly_profile(user_id: &str, weekly: &[(u8, Vec<AvailabilityWindow>)]) -> EmployeeProfile {
    EmployeeProfile {
        user_id: user_id.to_string(),
        unit_id: "unit-1".to_string(),
        availability: Availability {
            weekly: weekly.iter().cloned().collect(),
            exceptions: Vec::new(),
        },
    }
}

pub fn shift(
    id: &str,
    user_id: &str,
    date_key: &str,
    start: &str,
    end: Option<&str>,
    position_id: Option<&str>,
) -> Shift {
    Shift {
        id: id.to_string(),
        user_id: user_id.to_string(),
        unit_id: "unit-1".to_string(),
        date_key: date_key.to_string(),
        start_time: start.to_string(),
        end_time: end.map(|e| e.to_string()),
        position_id: position_id.map(|p| p.to_string()),
    }
}

pub fn coverage_rule(
    position_id: &str,
    date_keys: &[&str],
    start: &str,
    end: &str,
    min_count: u32,
) -> MinCoverageRule {
    MinCoverageRule {
        position_id: position_id.to_string(),
        date_keys: date_keys.iter().map(|d| d.to_string()).collect(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        min_count,
    }
}

/// An empty but well-formed week for unit-1.
pub fn empty_input() -> EngineInput {
    EngineInput {
        unit_id: "unit-1".to_string(),
        week_start: WEEK_START.to_string(),
        week_days: week_days(),
        positions: vec![position("p1", "Bar"), position("p2", "Floor")],
        users: Vec::new(),
        shifts: Vec::new(),
        ruleset: Ruleset::default(),
        schedule_settings: Default::default(),
        employee_profiles_by_user_id: BTreeMap::new(),
        scenarios: Vec::new(),
    }
}

/// A week with one open coverage gap that exactly one user can repair:
/// position p1 requires one person Monday 08:00-09:00, u1 is unavailable on
/// Mondays and u2 is available 08:00-12:00.
pub fn input_with_open_gap() -> EngineInput {
    let mut input = empty_input();
    input.users = vec![user("u1", "Anna", true), user("u2", "Ben", true)];

    let mut profiles = BTreeMap::new();
    profiles.insert("u1".to_string(), weekly_profile("u1", &[(1, vec![])]));
    profiles.insert(
        "u2".to_string(),
        weekly_profile("u2", &[(1, vec![window("08:00", "12:00")])]),
    );
    input.employee_profiles_by_user_id = profiles;

    input.ruleset.min_coverage_by_position = vec![coverage_rule(
        "p1",
        &[WEEK_START],
        "08:00",
        "09:00",
        1,
    )];
    input
}
