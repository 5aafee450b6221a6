/// Session decision normalization: at most one record per suggestion id,
/// picked by a fixed tie-break chain so replays are stable.
use crate::domain::{Decision, DecisionRecord, DecisionSource};

/// Hard cap on the length of a decision reason.
pub const MAX_REASON_CHARS: usize = 280;

/// Strip control characters, trim, and cap the reason length.
pub fn sanitize_reason(reason: &str) -> String {
    let cleaned: String = reason.chars().filter(|c| !c.is_control()).collect();
    cleaned.trim().chars().take(MAX_REASON_CHARS).collect()
}

fn decision_rank(decision: Decision) -> u8 {
    match decision {
        Decision::Accepted => 2,
        Decision::Rejected => 1,
    }
}

fn source_rank(source: Option<DecisionSource>) -> u8 {
    match source {
        Some(DecisionSource::System) => 2,
        Some(DecisionSource::User) => 1,
        None => 0,
    }
}

/// `(timestamp, decision rank, source rank, reason)`; the greater tuple wins.
/// A missing timestamp sorts as -1.
fn preference_key(record: &DecisionRecord) -> (i64, u8, u8, String) {
    (
        record.timestamp.unwrap_or(-1),
        decision_rank(record.decision),
        source_rank(record.source),
        record.reason.clone().unwrap_or_default(),
    )
}

/// Deduplicate decisions per suggestion id. The output is sorted by
/// suggestion id and its reasons are sanitized; normalizing twice yields the
/// same result.
pub fn normalize_decisions(decisions: &[DecisionRecord]) -> Vec<DecisionRecord> {
    let mut best: Vec<DecisionRecord> = Vec::new();

    for record in decisions {
        let mut record = record.clone();
        record.reason = record
            .reason
            .as_deref()
            .map(sanitize_reason)
            .filter(|r| !r.is_empty());

        match best
            .iter()
            .position(|existing| existing.suggestion_id == record.suggestion_id)
        {
            None => best.push(record),
            Some(idx) => {
                if preference_key(&record) > preference_key(&best[idx]) {
                    best[idx] = record;
                }
            }
        }
    }

    best.sort_by(|a, b| a.suggestion_id.cmp(&b.suggestion_id));

    #[cfg(debug_assertions)]
    {
        let again = normalize_decisions_once(&best);
        debug_assert_eq!(again, best, "decision normalization must be idempotent");
    }

    best
}

#[cfg(debug_assertions)]
fn normalize_decisions_once(decisions: &[DecisionRecord]) -> Vec<DecisionRecord> {
    let mut best: Vec<DecisionRecord> = Vec::new();
    for record in decisions {
        match best
            .iter()
            .position(|existing| existing.suggestion_id == record.suggestion_id)
        {
            None => best.push(record.clone()),
            Some(idx) => {
                if preference_key(record) > preference_key(&best[idx]) {
                    best[idx] = record.clone();
                }
            }
        }
    }
    best.sort_by(|a, b| a.suggestion_id.cmp(&b.suggestion_id));
    best
}
