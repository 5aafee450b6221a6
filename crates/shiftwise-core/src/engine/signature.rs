/// Canonical signatures and stable IDs for suggestions.
///
/// The V2 identity hashes only the actions, never the display text, so a
/// reworded suggestion keeps its ID. The V1 identity includes the text and
/// exists purely to translate decisions recorded by older clients.
use serde_json::Value;
use sha2::Digest;
use tracing::warn;

use crate::domain::{
    AssistantSuggestion, SignatureHashFormat, Suggestion, SuggestionAction, SuggestionMeta,
};

pub const SIGNATURE_VERSION: &str = "sig:v2";
pub const ID_PREFIX_V2: &str = "assistant-suggestion:v2";
pub const ID_PREFIX_V1: &str = "assistant-suggestion:v1";

/// Characters of the canonical string kept as a human-readable preview.
const SIGNATURE_PREVIEW_CHARS: usize = 120;

pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", sha2::Sha256::digest(input.as_bytes()))
}

/// Strip nulls recursively and order object keys lexicographically so absent
/// optionals and map ordering can never leak into a hash.
fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: std::collections::BTreeMap<&String, &Value> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .collect();
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sanitize_value(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        other => other.clone(),
    }
}

struct ActionKey {
    key: String,
    degrade_reason: Option<String>,
}

/// Canonical key for one action. Typed actions serialize their fields in a
/// fixed order; anything else degrades to a hash of the sanitized payload.
fn action_key(action: &SuggestionAction) -> ActionKey {
    match action {
        SuggestionAction::CreateShift(a) => ActionKey {
            key: format!(
                "createShift|{}|{}|{}|{}|{}",
                a.user_id,
                a.date_key,
                a.start_time,
                a.end_time,
                a.position_id.as_deref().unwrap_or("")
            ),
            degrade_reason: None,
        },
        SuggestionAction::MoveShift(a) => ActionKey {
            key: format!(
                "moveShift|{}|{}|{}|{}|{}|{}",
                a.shift_id,
                a.user_id,
                a.date_key,
                a.new_start_time,
                a.new_end_time,
                a.position_id.as_deref().unwrap_or("")
            ),
            degrade_reason: None,
        },
        SuggestionAction::Unknown {
            action_type,
            payload,
        } => {
            let sanitized = sanitize_value(&Value::Object(payload.clone()));
            let digest = sha256_hex(&sanitized.to_string());
            ActionKey {
                key: format!("unknown|{}|sha256:{}", action_type, digest),
                degrade_reason: Some(format!(
                    "action of type {} could not be canonicalized",
                    action_type
                )),
            }
        }
    }
}

pub struct SignatureOutcome {
    pub canonical: String,
    pub signature_hash: String,
    pub id_v2: String,
    pub id_v1: String,
    pub degraded: bool,
    pub degrade_reason: Option<String>,
}

/// Compute the canonical V2 string, both IDs, and the degradation state for
/// a suggestion.
pub fn compute_signature(suggestion: &Suggestion) -> SignatureOutcome {
    let keys: Vec<ActionKey> = suggestion.actions.iter().map(action_key).collect();
    let degrade_reason = keys.iter().find_map(|k| k.degrade_reason.clone());

    let canonical = {
        let mut parts = vec!["v2".to_string(), suggestion.suggestion_type.as_str().to_string()];
        parts.extend(keys.iter().map(|k| k.key.clone()));
        parts.join("|")
    };
    let signature_hash = sha256_hex(&canonical);

    // V1 includes the display text; kept only to map legacy decisions.
    let id_v1 = format!(
        "{}:{}:{}:{}:{}",
        ID_PREFIX_V1,
        suggestion.suggestion_type.as_str(),
        keys.iter()
            .map(|k| k.key.as_str())
            .collect::<Vec<_>>()
            .join(";"),
        suggestion.expected_impact,
        suggestion.explanation
    );

    SignatureOutcome {
        id_v2: format!("{}:{}", ID_PREFIX_V2, signature_hash),
        id_v1,
        degraded: degrade_reason.is_some(),
        degrade_reason,
        canonical,
        signature_hash,
    }
}

/// Attach identity metadata to a raw suggestion.
pub fn identify_suggestion(suggestion: Suggestion) -> AssistantSuggestion {
    let outcome = compute_signature(&suggestion);
    let preview: String = outcome.canonical.chars().take(SIGNATURE_PREVIEW_CHARS).collect();

    AssistantSuggestion {
        id: outcome.id_v2,
        meta: SuggestionMeta {
            v1_suggestion_id: outcome.id_v1,
            signature_version: SIGNATURE_VERSION.to_string(),
            signature_hash: outcome.signature_hash,
            signature_hash_format: SignatureHashFormat::Sha256Hex,
            signature_preview: preview,
            signature_degraded: outcome.degraded.then_some(true),
            signature_degrade_reason: outcome.degrade_reason,
        },
        decision_state: None,
        suggestion,
    }
}

/// Identify a batch of suggestions and enforce ID uniqueness.
///
/// Identical suggestions (same canonical) are deduplicated. Two distinct
/// canonicals sharing a hash would be a real collision: debug builds fail,
/// release builds keep the first occurrence and log.
pub fn identify_suggestions(suggestions: Vec<Suggestion>) -> Vec<AssistantSuggestion> {
    let mut seen: Vec<AssistantSuggestion> = Vec::new();

    for suggestion in suggestions {
        let identified = identify_suggestion(suggestion);
        let existing_preview = seen
            .iter()
            .find(|s| s.id == identified.id)
            .map(|s| s.meta.signature_preview.clone());
        match existing_preview {
            None => seen.push(identified),
            Some(preview) if preview == identified.meta.signature_preview => {
                // same canonical content twice; drop the duplicate
            }
            Some(_) => {
                if cfg!(debug_assertions) {
                    panic!(
                        "suggestion signature collision on {} for distinct canonicals",
                        identified.id
                    );
                }
                warn!(id = %identified.id, "suggestion signature collision; keeping first");
            }
        }
    }

    seen
}
