/// Explanation assembly: violation explanations, suggestion explanations
/// with their linked-violation context, and the affected-entity union used
/// for linking.
use crate::domain::{
    Affected, AssistantSuggestion, Explanation, ExplanationKind, Severity, Suggestion,
    SuggestionAction, SuggestionType, Violation,
};
use crate::engine::constraints::{CONSTRAINT_EMPLOYEE_AVAILABILITY, CONSTRAINT_MIN_COVERAGE};
use crate::engine::time::{parse_hhmm, slot_key, MINUTES_PER_DAY};

/// At most this many violation ids are spelled out in `whyNow`.
const WHY_NOW_MAX_IDS: usize = 5;
/// Hard cap on the `whyNow` string length.
const WHY_NOW_MAX_CHARS: usize = 200;

pub fn violation_explanation(violation: &Violation) -> Explanation {
    let title = match violation.constraint_id.as_str() {
        CONSTRAINT_MIN_COVERAGE => "Coverage below minimum",
        CONSTRAINT_EMPLOYEE_AVAILABILITY => "Employee scheduled outside availability",
        _ => "Rule violation",
    };

    Explanation {
        id: violation.id.clone(),
        kind: ExplanationKind::Violation,
        severity: violation.severity,
        title: title.to_string(),
        details: violation.details.clone(),
        why: None,
        why_now: None,
        what_if_accepted: None,
        affected: violation.affected.clone(),
        related_suggestion_id: None,
        related_constraint_id: Some(violation.constraint_id.clone()),
        meta: None,
    }
}

/// Union of the entities a suggestion's actions touch, each list sorted and
/// deduplicated. The position is the lexicographically smallest one named.
pub fn suggestion_affected(suggestion: &Suggestion, bucket_minutes: u32) -> Affected {
    let mut user_ids = Vec::new();
    let mut date_keys = Vec::new();
    let mut shift_ids = Vec::new();
    let mut slots = Vec::new();
    let mut position_ids: Vec<String> = Vec::new();

    for action in &suggestion.actions {
        let (user_id, date_key, start, end, position_id, shift_id) = match action {
            SuggestionAction::CreateShift(a) => (
                Some(&a.user_id),
                Some(&a.date_key),
                parse_hhmm(&a.start_time).ok(),
                parse_hhmm(&a.end_time).ok(),
                a.position_id.as_ref(),
                None,
            ),
            SuggestionAction::MoveShift(a) => (
                Some(&a.user_id),
                Some(&a.date_key),
                parse_hhmm(&a.new_start_time).ok(),
                parse_hhmm(&a.new_end_time).ok(),
                a.position_id.as_ref(),
                Some(&a.shift_id),
            ),
            SuggestionAction::Unknown { .. } => (None, None, None, None, None, None),
        };

        if let Some(u) = user_id {
            user_ids.push(u.clone());
        }
        if let Some(d) = date_key {
            date_keys.push(d.clone());
        }
        if let Some(p) = position_id {
            position_ids.push(p.clone());
        }
        if let Some(s) = shift_id {
            shift_ids.push(s.clone());
        }
        if let (Some(d), Some(start), Some(end)) = (date_key, start, end) {
            let end = if end <= start { end + MINUTES_PER_DAY } else { end };
            let mut t = start - start % bucket_minutes;
            while t < end {
                if let Ok(key) = slot_key(d, t, bucket_minutes) {
                    slots.push(key);
                }
                t += bucket_minutes;
            }
        }
    }

    for list in [&mut user_ids, &mut date_keys, &mut shift_ids, &mut slots] {
        list.sort_unstable();
        list.dedup();
    }
    position_ids.sort_unstable();

    Affected {
        user_ids,
        position_id: position_ids.into_iter().next(),
        date_keys,
        slots,
        shift_ids,
    }
}

/// Violations sharing a position, user, shift, date, or slot with the
/// affected set.
pub fn linked_violations<'a>(
    affected: &Affected,
    violations: &'a [Violation],
) -> Vec<&'a Violation> {
    violations
        .iter()
        .filter(|v| {
            let shares_position = match (&affected.position_id, &v.affected.position_id) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            shares_position
                || v.affected.user_ids.iter().any(|u| affected.user_ids.contains(u))
                || v.affected.shift_ids.iter().any(|s| affected.shift_ids.contains(s))
                || v.affected.date_keys.iter().any(|d| affected.date_keys.contains(d))
                || v.affected.slots.iter().any(|s| affected.slots.contains(s))
        })
        .collect()
}

/// `"Linked to violations: a, b, c (+N more)"`, capped at 200 characters.
pub fn build_why_now(linked_ids: &[&str]) -> Option<String> {
    if linked_ids.is_empty() {
        return None;
    }

    let shown = &linked_ids[..linked_ids.len().min(WHY_NOW_MAX_IDS)];
    let mut text = format!("Linked to violations: {}", shown.join(", "));
    let hidden = linked_ids.len() - shown.len();
    if hidden > 0 {
        text.push_str(&format!(" (+{} more)", hidden));
    }

    if text.chars().count() > WHY_NOW_MAX_CHARS {
        text = text.chars().take(WHY_NOW_MAX_CHARS - 3).collect::<String>() + "...";
    }
    Some(text)
}

pub fn suggestion_explanation(
    suggestion: &AssistantSuggestion,
    violations: &[Violation],
    bucket_minutes: u32,
) -> Explanation {
    let affected = suggestion_affected(&suggestion.suggestion, bucket_minutes);
    let linked = linked_violations(&affected, violations);
    let linked_ids: Vec<&str> = linked.iter().map(|v| v.id.as_str()).collect();
    let related_constraint_id = linked
        .iter()
        .map(|v| v.constraint_id.as_str())
        .min()
        .map(|c| c.to_string());

    let title = match suggestion.suggestion.suggestion_type {
        SuggestionType::AddShiftSuggestion => "Add a shift",
        SuggestionType::ShiftMoveSuggestion => "Move a shift",
    };

    Explanation {
        id: format!("suggestion:{}", suggestion.id),
        kind: ExplanationKind::Suggestion,
        severity: Severity::Info,
        title: title.to_string(),
        details: suggestion.suggestion.explanation.clone(),
        why: Some(suggestion.suggestion.explanation.clone()),
        why_now: build_why_now(&linked_ids),
        what_if_accepted: Some(suggestion.suggestion.expected_impact.clone()),
        affected,
        related_suggestion_id: Some(suggestion.id.clone()),
        related_constraint_id,
        meta: None,
    }
}
