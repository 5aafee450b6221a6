/// Pure application of suggestion actions to an engine input.
///
/// Validation never aborts the whole suggestion: rejected actions are
/// reported with their canonical keys and the remaining actions still apply.
use serde::{Deserialize, Serialize};

use crate::domain::{EngineInput, Shift, Suggestion, SuggestionAction};
use crate::engine::signature::compute_signature;
use crate::engine::time::{is_valid_date_key, parse_hhmm};

/// A prospective shift write produced by the apply engine. The store commits
/// these inside a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShiftWrite {
    Create(Shift),
    Update { shift_id: String, next: Shift },
}

impl ShiftWrite {
    pub fn shift(&self) -> &Shift {
        match self {
            ShiftWrite::Create(shift) => shift,
            ShiftWrite::Update { next, .. } => next,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplyActionsResult {
    pub next_shifts: Vec<Shift>,
    pub applied_action_keys: Vec<String>,
    pub rejected_action_keys: Vec<String>,
    pub issues: Vec<String>,
    pub writes: Vec<ShiftWrite>,
}

impl ApplyActionsResult {
    pub fn applied_shift_ids(&self) -> Vec<String> {
        self.writes.iter().map(|w| w.shift().id.clone()).collect()
    }
}

/// Deterministic id for a shift created by a suggestion.
pub fn generated_shift_id(
    user_id: &str,
    date_key: &str,
    start_time: &str,
    end_time: &str,
    position_id: Option<&str>,
) -> String {
    format!(
        "gen:{}:{}:{}:{}:{}",
        user_id,
        date_key,
        start_time,
        end_time,
        position_id.unwrap_or("")
    )
}

fn action_keys(suggestion: &Suggestion) -> Vec<String> {
    // Per-action canonical keys are the segments of the canonical string
    // after the version and type prefix; recompute them individually.
    suggestion
        .actions
        .iter()
        .map(|action| {
            let single = Suggestion {
                actions: vec![action.clone()],
                ..suggestion.clone()
            };
            let canonical = compute_signature(&single).canonical;
            canonical
                .splitn(3, '|')
                .nth(2)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

pub fn apply_suggestion_actions(input: &EngineInput, suggestion: &Suggestion) -> ApplyActionsResult {
    let mut result = ApplyActionsResult {
        next_shifts: input.shifts.clone(),
        ..Default::default()
    };

    let keys = action_keys(suggestion);
    for (action, key) in suggestion.actions.iter().zip(keys) {
        match apply_one(input, &mut result, action) {
            Ok(()) => result.applied_action_keys.push(key),
            Err(issue) => {
                result.issues.push(issue);
                result.rejected_action_keys.push(key);
            }
        }
    }

    result.next_shifts.sort_by(|a, b| {
        (
            &a.date_key,
            &a.start_time,
            &a.user_id,
            &a.position_id,
            &a.id,
        )
            .cmp(&(&b.date_key, &b.start_time, &b.user_id, &b.position_id, &b.id))
    });
    result
}

fn require_active_user(input: &EngineInput, user_id: &str) -> Result<(), String> {
    match input.users.iter().find(|u| u.id == user_id) {
        None => Err(format!("user {} is not part of this unit", user_id)),
        Some(user) if !user.is_active => Err(format!("user {} is inactive", user_id)),
        Some(_) => Ok(()),
    }
}

fn require_times(date_key: &str, times: &[&str]) -> Result<(), String> {
    if !is_valid_date_key(date_key) {
        return Err(format!("invalid date key {}", date_key));
    }
    for time in times {
        if parse_hhmm(time).is_err() {
            return Err(format!("invalid time {}", time));
        }
    }
    Ok(())
}

fn apply_one(
    input: &EngineInput,
    result: &mut ApplyActionsResult,
    action: &SuggestionAction,
) -> Result<(), String> {
    match action {
        SuggestionAction::CreateShift(a) => {
            require_times(&a.date_key, &[&a.start_time, &a.end_time])?;
            require_active_user(input, &a.user_id)?;

            let id = generated_shift_id(
                &a.user_id,
                &a.date_key,
                &a.start_time,
                &a.end_time,
                a.position_id.as_deref(),
            );
            let shift = Shift {
                id: id.clone(),
                user_id: a.user_id.clone(),
                unit_id: input.unit_id.clone(),
                date_key: a.date_key.clone(),
                start_time: a.start_time.clone(),
                end_time: Some(a.end_time.clone()),
                position_id: a.position_id.clone(),
            };

            // Re-creating the same deterministic shift is an upsert.
            result.next_shifts.retain(|s| s.id != id);
            result.next_shifts.push(shift.clone());
            result.writes.push(ShiftWrite::Create(shift));
            Ok(())
        }
        SuggestionAction::MoveShift(a) => {
            require_times(&a.date_key, &[&a.new_start_time, &a.new_end_time])?;
            let existing = result
                .next_shifts
                .iter()
                .find(|s| s.id == a.shift_id)
                .cloned()
                .ok_or_else(|| format!("shift {} does not exist", a.shift_id))?;
            if existing.user_id != a.user_id {
                return Err(format!(
                    "shift {} belongs to another user and cannot be reassigned",
                    a.shift_id
                ));
            }
            require_active_user(input, &a.user_id)?;

            let mut next = existing;
            next.date_key = a.date_key.clone();
            next.start_time = a.new_start_time.clone();
            next.end_time = Some(a.new_end_time.clone());
            if let Some(position_id) = &a.position_id {
                next.position_id = Some(position_id.clone());
            }

            if let Some(slot) = result.next_shifts.iter_mut().find(|s| s.id == a.shift_id) {
                *slot = next.clone();
            }
            result.writes.push(ShiftWrite::Update {
                shift_id: a.shift_id.clone(),
                next,
            });
            Ok(())
        }
        SuggestionAction::Unknown { action_type, .. } => {
            Err(format!("unknown action type {}", action_type))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CreateShiftAction, MoveShiftAction, SuggestionType, User,
    };
    use crate::engine::capacity::resolve_shift_range;
    use crate::engine::settings::normalize_schedule_settings;

    fn input_with_users_and_shifts(users: Vec<User>, shifts: Vec<Shift>) -> EngineInput {
        EngineInput {
            unit_id: "unit-1".to_string(),
            week_start: "2024-01-01".to_string(),
            week_days: (1..8).map(|i| format!("2024-01-{:02}", i)).collect(),
            positions: Vec::new(),
            users,
            shifts,
            ruleset: Default::default(),
            schedule_settings: Default::default(),
            employee_profiles_by_user_id: Default::default(),
            scenarios: Vec::new(),
        }
    }

    fn active_user(id: &str) -> User {
        User {
            id: id.to_string(),
            display_name: id.to_string(),
            is_active: true,
        }
    }

    fn suggestion_with(actions: Vec<SuggestionAction>, kind: SuggestionType) -> Suggestion {
        Suggestion {
            suggestion_type: kind,
            explanation: "x".to_string(),
            expected_impact: "y".to_string(),
            actions,
        }
    }

    #[test]
    fn test_create_shift_generates_deterministic_id() {
        let input = input_with_users_and_shifts(vec![active_user("u1")], vec![]);
        let suggestion = suggestion_with(
            vec![SuggestionAction::CreateShift(CreateShiftAction {
                user_id: "u1".to_string(),
                date_key: "2024-01-02".to_string(),
                start_time: "09:00".to_string(),
                end_time: "11:00".to_string(),
                position_id: Some("p1".to_string()),
            })],
            SuggestionType::AddShiftSuggestion,
        );

        let result = apply_suggestion_actions(&input, &suggestion);
        assert_eq!(result.rejected_action_keys.len(), 0);
        assert_eq!(result.next_shifts.len(), 1);
        assert_eq!(
            result.next_shifts[0].id,
            "gen:u1:2024-01-02:09:00:11:00:p1"
        );
        assert_eq!(result.applied_shift_ids(), vec![result.next_shifts[0].id.clone()]);
    }

    #[test]
    fn test_move_shift_cross_midnight_resolves_into_next_day() {
        let shift = Shift {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            unit_id: "unit-1".to_string(),
            date_key: "2024-01-02".to_string(),
            start_time: "09:00".to_string(),
            end_time: Some("12:00".to_string()),
            position_id: Some("p1".to_string()),
        };
        let input = input_with_users_and_shifts(vec![active_user("u1")], vec![shift]);
        let suggestion = suggestion_with(
            vec![SuggestionAction::MoveShift(MoveShiftAction {
                shift_id: "s1".to_string(),
                user_id: "u1".to_string(),
                date_key: "2024-01-04".to_string(),
                new_start_time: "22:00".to_string(),
                new_end_time: "02:00".to_string(),
                position_id: None,
            })],
            SuggestionType::ShiftMoveSuggestion,
        );

        let result = apply_suggestion_actions(&input, &suggestion);
        assert!(result.rejected_action_keys.is_empty());

        let moved = &result.next_shifts[0];
        assert_eq!(moved.date_key, "2024-01-04");
        assert_eq!(moved.start_time, "22:00");
        assert_eq!(moved.end_time.as_deref(), Some("02:00"));
        // original position kept when the action names none
        assert_eq!(moved.position_id.as_deref(), Some("p1"));

        // the resolved range runs 22:00 on the 4th to 02:00 on the 5th
        let settings = normalize_schedule_settings(&Default::default());
        assert_eq!(resolve_shift_range(moved, &settings), Some((1320, 1560)));
    }

    #[test]
    fn test_move_of_missing_shift_is_rejected_but_others_apply() {
        let input = input_with_users_and_shifts(vec![active_user("u1")], vec![]);
        let suggestion = suggestion_with(
            vec![
                SuggestionAction::MoveShift(MoveShiftAction {
                    shift_id: "ghost".to_string(),
                    user_id: "u1".to_string(),
                    date_key: "2024-01-02".to_string(),
                    new_start_time: "09:00".to_string(),
                    new_end_time: "11:00".to_string(),
                    position_id: None,
                }),
                SuggestionAction::CreateShift(CreateShiftAction {
                    user_id: "u1".to_string(),
                    date_key: "2024-01-02".to_string(),
                    start_time: "09:00".to_string(),
                    end_time: "11:00".to_string(),
                    position_id: None,
                }),
            ],
            SuggestionType::ShiftMoveSuggestion,
        );

        let result = apply_suggestion_actions(&input, &suggestion);
        assert_eq!(result.applied_action_keys.len(), 1);
        assert_eq!(result.rejected_action_keys.len(), 1);
        assert!(result.rejected_action_keys[0].starts_with("moveShift|ghost"));
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.next_shifts.len(), 1);
    }

    #[test]
    fn test_cross_user_move_is_rejected() {
        let shift = Shift {
            id: "s1".to_string(),
            user_id: "u1".to_string(),
            unit_id: "unit-1".to_string(),
            date_key: "2024-01-02".to_string(),
            start_time: "09:00".to_string(),
            end_time: Some("12:00".to_string()),
            position_id: None,
        };
        let input =
            input_with_users_and_shifts(vec![active_user("u1"), active_user("u2")], vec![shift]);
        let suggestion = suggestion_with(
            vec![SuggestionAction::MoveShift(MoveShiftAction {
                shift_id: "s1".to_string(),
                user_id: "u2".to_string(),
                date_key: "2024-01-02".to_string(),
                new_start_time: "10:00".to_string(),
                new_end_time: "12:00".to_string(),
                position_id: None,
            })],
            SuggestionType::ShiftMoveSuggestion,
        );

        let result = apply_suggestion_actions(&input, &suggestion);
        assert!(result.applied_action_keys.is_empty());
        assert_eq!(result.next_shifts[0].start_time, "09:00");
    }

    #[test]
    fn test_inactive_user_rejected() {
        let mut user = active_user("u1");
        user.is_active = false;
        let input = input_with_users_and_shifts(vec![user], vec![]);
        let suggestion = suggestion_with(
            vec![SuggestionAction::CreateShift(CreateShiftAction {
                user_id: "u1".to_string(),
                date_key: "2024-01-02".to_string(),
                start_time: "09:00".to_string(),
                end_time: "11:00".to_string(),
                position_id: None,
            })],
            SuggestionType::AddShiftSuggestion,
        );

        let result = apply_suggestion_actions(&input, &suggestion);
        assert!(result.applied_action_keys.is_empty());
        assert!(result.issues[0].contains("inactive"));
    }

    #[test]
    fn test_invalid_times_rejected() {
        let input = input_with_users_and_shifts(vec![active_user("u1")], vec![]);
        let suggestion = suggestion_with(
            vec![SuggestionAction::CreateShift(CreateShiftAction {
                user_id: "u1".to_string(),
                date_key: "2024-01-02".to_string(),
                start_time: "9am".to_string(),
                end_time: "11:00".to_string(),
                position_id: None,
            })],
            SuggestionType::AddShiftSuggestion,
        );

        let result = apply_suggestion_actions(&input, &suggestion);
        assert!(result.applied_action_keys.is_empty());
        assert!(result.next_shifts.is_empty());
    }

    #[test]
    fn test_next_shifts_sorted() {
        let shifts = vec![
            Shift {
                id: "b".to_string(),
                user_id: "u1".to_string(),
                unit_id: "unit-1".to_string(),
                date_key: "2024-01-03".to_string(),
                start_time: "09:00".to_string(),
                end_time: Some("10:00".to_string()),
                position_id: None,
            },
            Shift {
                id: "a".to_string(),
                user_id: "u1".to_string(),
                unit_id: "unit-1".to_string(),
                date_key: "2024-01-02".to_string(),
                start_time: "12:00".to_string(),
                end_time: Some("14:00".to_string()),
                position_id: None,
            },
        ];
        let input = input_with_users_and_shifts(vec![active_user("u1")], shifts);
        let suggestion = suggestion_with(vec![], SuggestionType::AddShiftSuggestion);

        let result = apply_suggestion_actions(&input, &suggestion);
        let ids: Vec<&str> = result.next_shifts.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
