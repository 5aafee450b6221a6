/// Response assembly: session validation, decision overlay, accepted-
/// suggestion hiding, and the final deterministic ordering.
use std::collections::BTreeMap;

use tracing::{debug, error};

use crate::domain::{
    AssistantResponse, AssistantSession, AssistantSuggestion, Decision, DecisionMeta,
    DecisionRecord, DecisionSource, DecisionState, EngineInput, Explanation, ExplanationKind,
    Severity, SESSION_SCHEMA_VERSION,
};
use crate::engine::context::compute_assistant_context_key;
use crate::engine::decisions::normalize_decisions;
use crate::engine::explain::{suggestion_affected, suggestion_explanation, violation_explanation};
use crate::engine::run_engine;
use crate::engine::time::normalize_bucket_minutes;

/// Invariant check: panics in debug builds, logs in release builds.
fn invariant(condition: bool, message: &str) {
    if condition {
        return;
    }
    if cfg!(debug_assertions) {
        panic!("assistant response invariant violated: {}", message);
    }
    error!(invariant = message, "assistant response invariant violated");
}

/// A session is usable only when its schema, context key and expiry all
/// match the current input; anything else behaves as "no session".
pub fn validate_session<'a>(
    session: &'a AssistantSession,
    context_key: &str,
    now_ms: i64,
) -> Option<&'a AssistantSession> {
    if session.schema_version != SESSION_SCHEMA_VERSION {
        debug!(session_id = %session.session_id, "discarding session with unknown schema version");
        return None;
    }
    if session.context_key != context_key {
        debug!(session_id = %session.session_id, "discarding session with stale context key");
        return None;
    }
    if let Some(expires_at) = session.expires_at {
        if expires_at < now_ms {
            debug!(session_id = %session.session_id, "discarding expired session");
            return None;
        }
    }
    Some(session)
}

fn decision_info_explanation(
    suggestion: &AssistantSuggestion,
    record: &DecisionRecord,
    bucket_minutes: u32,
) -> Explanation {
    let source_label = match record.source {
        Some(DecisionSource::System) => "System",
        _ => "User",
    };
    let decision_label = match record.decision {
        Decision::Accepted => "accepted",
        Decision::Rejected => "rejected",
    };
    let mut why_now = format!("{} decision: {}", source_label, decision_label);
    if let Some(reason) = &record.reason {
        why_now.push_str(&format!(" — {}", reason));
    }

    let (id, title, why, what_if_accepted) = match record.decision {
        Decision::Accepted => (
            format!("info:suggestion-applied:{}", suggestion.id),
            "Suggestion applied",
            Some(suggestion.suggestion.explanation.clone()),
            Some(suggestion.suggestion.expected_impact.clone()),
        ),
        Decision::Rejected => (
            format!("info:suggestion-dismissed:{}", suggestion.id),
            "Suggestion dismissed",
            None,
            None,
        ),
    };

    Explanation {
        id,
        kind: ExplanationKind::Info,
        severity: Severity::Info,
        title: title.to_string(),
        details: suggestion.suggestion.explanation.clone(),
        why,
        why_now: Some(why_now),
        what_if_accepted,
        affected: suggestion_affected(&suggestion.suggestion, bucket_minutes),
        related_suggestion_id: Some(suggestion.id.clone()),
        related_constraint_id: None,
        meta: Some(DecisionMeta {
            decision_source: match record.source {
                Some(DecisionSource::System) => "system".to_string(),
                _ => "user".to_string(),
            },
            has_decision_reason: record.reason.is_some(),
            decision_timestamp: record.timestamp,
            decision: record.decision,
        }),
    }
}

/// Run the engine and assemble the response, overlaying the session's
/// decisions when a valid session is supplied.
pub fn assemble_response(
    input: &EngineInput,
    session: Option<&AssistantSession>,
    now_ms: i64,
) -> AssistantResponse {
    let context_key = compute_assistant_context_key(input);
    let result = run_engine(input);
    let bucket_minutes = normalize_bucket_minutes(input.ruleset.bucket_minutes);

    let session = session.and_then(|s| validate_session(s, &context_key, now_ms));
    let session_provided = session.is_some();
    let normalized = session
        .map(|s| normalize_decisions(&s.decisions))
        .unwrap_or_default();

    // Map decisions onto current V2 ids; legacy decisions match via the V1
    // id computed for each current suggestion.
    let v1_to_v2: BTreeMap<&str, &str> = result
        .suggestions
        .iter()
        .map(|s| (s.meta.v1_suggestion_id.as_str(), s.id.as_str()))
        .collect();
    let mut decision_map: BTreeMap<String, DecisionRecord> = BTreeMap::new();
    for record in &normalized {
        let v2_id = if result.suggestions.iter().any(|s| s.id == record.suggestion_id) {
            Some(record.suggestion_id.clone())
        } else {
            v1_to_v2.get(record.suggestion_id.as_str()).map(|id| id.to_string())
        };
        if let Some(v2_id) = v2_id {
            decision_map.insert(v2_id, record.clone());
        }
    }

    let mut explanations: Vec<Explanation> =
        result.violations.iter().map(violation_explanation).collect();

    // Decision overlays reference the full suggestion set, including the
    // accepted ones that are hidden below.
    for (v2_id, record) in &decision_map {
        if let Some(suggestion) = result.suggestions.iter().find(|s| &s.id == v2_id) {
            explanations.push(decision_info_explanation(suggestion, record, bucket_minutes));
        }
    }

    let mut suggestions: Vec<AssistantSuggestion> = result
        .suggestions
        .iter()
        .filter(|s| {
            decision_map
                .get(&s.id)
                .map(|d| d.decision != Decision::Accepted)
                .unwrap_or(true)
        })
        .cloned()
        .collect();
    for suggestion in &mut suggestions {
        suggestion.decision_state = if session_provided {
            Some(match decision_map.get(&suggestion.id).map(|d| d.decision) {
                Some(Decision::Rejected) => DecisionState::Rejected,
                Some(Decision::Accepted) => DecisionState::Accepted,
                None => DecisionState::Pending,
            })
        } else {
            None
        };
    }

    explanations.extend(
        suggestions
            .iter()
            .map(|s| suggestion_explanation(s, &result.violations, bucket_minutes)),
    );

    suggestions.sort_by(|a, b| a.id.cmp(&b.id));
    explanations.sort_by(|a, b| a.id.cmp(&b.id));

    let response = AssistantResponse {
        context_key,
        capacity_map: result.capacity_map,
        violations: result.violations,
        suggestions,
        explanations,
        scenario_stats: result.scenario_stats,
    };
    check_invariants(&response, session_provided, &decision_map);
    response
}

fn check_invariants(
    response: &AssistantResponse,
    session_provided: bool,
    decision_map: &BTreeMap<String, DecisionRecord>,
) {
    let mut ids: Vec<&str> = response.suggestions.iter().map(|s| s.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    invariant(
        ids.len() == response.suggestions.len(),
        "duplicate suggestion ids in response",
    );

    invariant(
        !response.suggestions.iter().any(|s| {
            decision_map
                .get(&s.id)
                .map(|d| d.decision == Decision::Accepted)
                .unwrap_or(false)
        }),
        "accepted suggestion still listed",
    );

    invariant(
        response.explanations.iter().all(|e| {
            e.related_suggestion_id.as_deref().map_or(true, |id| {
                response.suggestions.iter().any(|s| s.id == id) || decision_map.contains_key(id)
            })
        }),
        "explanation references an unknown suggestion",
    );

    invariant(
        session_provided
            || response
                .suggestions
                .iter()
                .all(|s| s.decision_state.is_none()),
        "decision state present without a session",
    );
}
