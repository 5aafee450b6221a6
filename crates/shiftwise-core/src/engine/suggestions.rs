/// Greedy repair: turn min-coverage deficits into ADD_SHIFT / SHIFT_MOVE
/// suggestions that respect employee availability.
///
/// The synthesis is deterministic: candidate users are scanned in ascending
/// id order, deficit slots in slot order, and contiguous slots repaired by
/// the same user collapse into a single action with the merged range.
use std::collections::BTreeMap;

use crate::domain::{
    CreateShiftAction, EmployeeProfile, MinCoverageRule, MoveShiftAction, Position,
    ScheduleSettings, Shift, Suggestion, SuggestionAction, SuggestionType, User, Violation,
};
use crate::engine::capacity::{build_capacity_map, resolve_shift_range};
use crate::engine::constraints::{
    evaluate_constraints, user_available_for_range, CONSTRAINT_MIN_COVERAGE,
};
use crate::engine::signature::compute_signature;
use crate::engine::time::{add_days, format_hhmm, parse_hhmm, split_slot_key, MINUTES_PER_DAY};

pub struct SuggestionContext<'a> {
    pub users: &'a [User],
    pub positions: &'a [Position],
    pub profiles: &'a BTreeMap<String, EmployeeProfile>,
    pub shifts: &'a [Shift],
    pub rules: &'a [MinCoverageRule],
    pub violations: &'a [Violation],
    pub settings: &'a ScheduleSettings,
    pub bucket_minutes: u32,
}

pub fn synthesize_suggestions(ctx: &SuggestionContext) -> Vec<Suggestion> {
    let mut sorted_users: Vec<&User> = ctx.users.iter().filter(|u| u.is_active).collect();
    sorted_users.sort_by(|a, b| a.id.cmp(&b.id));

    let mut suggestions = Vec::new();

    for ((position_id, date_key), slot_starts) in deficit_slots(ctx.violations) {
        // Pick a repair user per slot, then merge contiguous slots that the
        // same user can cover.
        let choices: Vec<(u32, Option<&User>)> = slot_starts
            .iter()
            .map(|&start| {
                let end = start + ctx.bucket_minutes;
                let user = sorted_users.iter().copied().find(|user| {
                    user_available_for_range(
                        ctx.profiles.get(&user.id),
                        &date_key,
                        start,
                        end,
                    ) && !user_has_overlapping_shift(ctx, &user.id, &date_key, start, end)
                });
                (start, user)
            })
            .collect();

        for (user, range_start, range_end) in merge_runs(&choices, ctx.bucket_minutes) {
            suggestions.push(build_suggestion(
                ctx,
                user,
                &position_id,
                &date_key,
                range_start,
                range_end,
            ));
        }
    }

    // ADD before MOVE, then by canonical action key.
    suggestions.sort_by_key(|s| {
        (
            match s.suggestion_type {
                SuggestionType::AddShiftSuggestion => 0u8,
                SuggestionType::ShiftMoveSuggestion => 1u8,
            },
            compute_signature(s).canonical,
        )
    });
    suggestions
}

/// Under-covered slots from the violation list, grouped by
/// `(positionId, dateKey)` with slot starts in ascending order.
fn deficit_slots(violations: &[Violation]) -> BTreeMap<(String, String), Vec<u32>> {
    let mut grouped: BTreeMap<(String, String), Vec<u32>> = BTreeMap::new();

    for violation in violations {
        if violation.constraint_id != CONSTRAINT_MIN_COVERAGE {
            continue;
        }
        let (Some(position_id), Some(slot)) = (
            violation.affected.position_id.as_deref(),
            violation.affected.slots.first(),
        ) else {
            continue;
        };
        let Some((slot_date, slot_time)) = split_slot_key(slot) else {
            continue;
        };
        let Ok(start) = parse_hhmm(slot_time) else {
            continue;
        };
        grouped
            .entry((position_id.to_string(), slot_date.to_string()))
            .or_default()
            .push(start);
    }

    for starts in grouped.values_mut() {
        starts.sort_unstable();
        starts.dedup();
    }
    grouped
}

/// Merge consecutive slot choices that picked the same user into
/// `(user, range_start, range_end)` runs. Slots without a candidate drop out.
fn merge_runs<'a>(
    choices: &[(u32, Option<&'a User>)],
    bucket_minutes: u32,
) -> Vec<(&'a User, u32, u32)> {
    let mut runs: Vec<(&User, u32, u32)> = Vec::new();

    for &(start, user) in choices {
        let Some(user) = user else { continue };
        let extends_last = matches!(
            runs.last(),
            Some((run_user, _, run_end)) if run_user.id == user.id && *run_end == start
        );
        if extends_last {
            if let Some((_, _, run_end)) = runs.last_mut() {
                *run_end = start + bucket_minutes;
            }
        } else {
            runs.push((user, start, start + bucket_minutes));
        }
    }

    runs
}

fn user_has_overlapping_shift(
    ctx: &SuggestionContext,
    user_id: &str,
    date_key: &str,
    start: u32,
    end: u32,
) -> bool {
    let previous_day = add_days(date_key, -1).ok();
    let next_day = add_days(date_key, 1).ok();

    ctx.shifts
        .iter()
        .filter(|s| s.user_id == user_id)
        .any(|shift| {
            let Some((s_start, s_end)) = resolve_shift_range(shift, ctx.settings) else {
                return false;
            };
            if shift.date_key == date_key {
                return s_start < end && start < s_end;
            }
            // A previous-day shift may run past midnight into this window.
            if previous_day.as_deref() == Some(shift.date_key.as_str()) {
                return s_end > MINUTES_PER_DAY && start < s_end - MINUTES_PER_DAY;
            }
            // A cross-midnight window may reach into the next day's shifts.
            if next_day.as_deref() == Some(shift.date_key.as_str()) {
                return end > MINUTES_PER_DAY && s_start < end - MINUTES_PER_DAY;
            }
            false
        })
}

fn build_suggestion(
    ctx: &SuggestionContext,
    user: &User,
    position_id: &str,
    date_key: &str,
    range_start: u32,
    range_end: u32,
) -> Suggestion {
    let start_time = format_hhmm(range_start);
    let end_time = format_hhmm(range_end);
    let position_label = ctx
        .positions
        .iter()
        .find(|p| p.id == position_id)
        .map(|p| p.name.as_str())
        .unwrap_or(position_id);

    if let Some(shift) = find_movable_shift(ctx, user, position_id, date_key, range_start, range_end)
    {
        return Suggestion {
            suggestion_type: SuggestionType::ShiftMoveSuggestion,
            explanation: format!(
                "Move {}'s shift {} to {} {}-{} to cover {}.",
                user.display_name, shift.id, date_key, start_time, end_time, position_label
            ),
            expected_impact: format!(
                "Coverage for {} on {} between {} and {} reaches the required minimum without opening a gap elsewhere.",
                position_label, date_key, start_time, end_time
            ),
            actions: vec![SuggestionAction::MoveShift(MoveShiftAction {
                shift_id: shift.id.clone(),
                user_id: user.id.clone(),
                date_key: date_key.to_string(),
                new_start_time: start_time,
                new_end_time: end_time,
                position_id: Some(position_id.to_string()),
            })],
        };
    }

    Suggestion {
        suggestion_type: SuggestionType::AddShiftSuggestion,
        explanation: format!(
            "Assign {} to {} on {} from {} to {} to close a coverage gap.",
            user.display_name, position_label, date_key, start_time, end_time
        ),
        expected_impact: format!(
            "Coverage for {} on {} between {} and {} reaches the required minimum.",
            position_label, date_key, start_time, end_time
        ),
        actions: vec![SuggestionAction::CreateShift(CreateShiftAction {
            user_id: user.id.clone(),
            date_key: date_key.to_string(),
            start_time,
            end_time,
            position_id: Some(position_id.to_string()),
        })],
    }
}

/// A shift of the user on the same or an adjacent day that can be relocated
/// onto the deficit range without introducing any new violation.
fn find_movable_shift<'a>(
    ctx: &SuggestionContext<'a>,
    user: &User,
    position_id: &str,
    date_key: &str,
    range_start: u32,
    range_end: u32,
) -> Option<&'a Shift> {
    let mut nearby_days = vec![date_key.to_string()];
    if let Ok(prev) = add_days(date_key, -1) {
        nearby_days.push(prev);
    }
    if let Ok(next) = add_days(date_key, 1) {
        nearby_days.push(next);
    }

    let mut candidates: Vec<&Shift> = ctx
        .shifts
        .iter()
        .filter(|s| s.user_id == user.id && nearby_days.contains(&s.date_key))
        .collect();
    candidates.sort_by(|a, b| {
        (&a.date_key, &a.start_time, &a.id).cmp(&(&b.date_key, &b.start_time, &b.id))
    });

    let before_ids: std::collections::BTreeSet<&str> =
        ctx.violations.iter().map(|v| v.id.as_str()).collect();

    candidates.into_iter().find(|candidate| {
        let moved: Vec<Shift> = ctx
            .shifts
            .iter()
            .map(|s| {
                if s.id == candidate.id {
                    let mut next = s.clone();
                    next.date_key = date_key.to_string();
                    next.start_time = format_hhmm(range_start);
                    next.end_time = Some(format_hhmm(range_end));
                    next.position_id = Some(position_id.to_string());
                    next
                } else {
                    s.clone()
                }
            })
            .collect();

        let capacity = build_capacity_map(&moved, ctx.settings, ctx.bucket_minutes);
        let after = evaluate_constraints(
            &moved,
            ctx.rules,
            ctx.profiles,
            ctx.settings,
            &capacity,
            ctx.bucket_minutes,
        );
        after.iter().all(|v| before_ids.contains(v.id.as_str()))
    })
}
