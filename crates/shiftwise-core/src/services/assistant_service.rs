use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::{
    AssistantResponse, AssistantSession, AssistantSuggestion, Decision, DecisionRecord,
    DecisionSource, EngineInput, SuggestionVersion, Violation, SESSION_SCHEMA_VERSION,
};
use crate::engine::apply::apply_suggestion_actions;
use crate::engine::assemble::{assemble_response, validate_session};
use crate::engine::context::compute_assistant_context_key;
use crate::engine::decisions::sanitize_reason;
use crate::engine::run_engine;
use crate::ports::{ApplyCommit, ApplyFailureRecord, CommitOutcome, ScheduleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    Applied,
    Noop,
    Failed,
}

/// Outcome of applying a suggestion, judged on its own actions and the
/// violation delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyDecision {
    Accepted,
    PartiallyAccepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptOutcome {
    pub status: ApplyStatus,
    pub already_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ApplyDecision>,
    pub resolved_violations: Vec<Violation>,
    pub new_violations: Vec<Violation>,
    pub applied_shift_ids: Vec<String>,
    pub rejected_action_keys: Vec<String>,
    pub issues: Vec<String>,
}

impl AcceptOutcome {
    fn noop(already_applied: bool) -> Self {
        Self {
            status: ApplyStatus::Noop,
            already_applied,
            decision: None,
            resolved_violations: Vec::new(),
            new_violations: Vec::new(),
            applied_shift_ids: Vec::new(),
            rejected_action_keys: Vec::new(),
            issues: Vec::new(),
        }
    }
}

/// Orchestrates the weekly plan and the transactional apply path on top of
/// an injected store.
pub struct AssistantService {
    store: Arc<dyn ScheduleStore>,
}

impl AssistantService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Build the assistant response, overlaying the stored session when it
    /// is still valid for this input.
    #[instrument(skip(self, input), fields(unit_id = %input.unit_id))]
    pub async fn plan(
        &self,
        input: &EngineInput,
        session_id: Option<&str>,
    ) -> Result<AssistantResponse> {
        let now_ms = Utc::now().timestamp_millis();
        let session = match session_id {
            Some(id) => self.store.get_session(id).await?,
            None => None,
        };
        Ok(assemble_response(input, session.as_ref(), now_ms))
    }

    /// Load a session only when it is still valid for the given input.
    pub async fn load_session(
        &self,
        session_id: &str,
        input: &EngineInput,
    ) -> Result<Option<AssistantSession>> {
        let Some(session) = self.store.get_session(session_id).await? else {
            return Ok(None);
        };
        let context_key = compute_assistant_context_key(input);
        let now_ms = Utc::now().timestamp_millis();
        Ok(validate_session(&session, &context_key, now_ms).cloned())
    }

    /// Fetch-or-create the session document for this input. An existing
    /// session with a stale context key is replaced.
    pub async fn ensure_session(
        &self,
        session_id: &str,
        input: &EngineInput,
    ) -> Result<AssistantSession> {
        let context_key = compute_assistant_context_key(input);
        let now_ms = Utc::now().timestamp_millis();

        if let Some(existing) = self.store.get_session(session_id).await? {
            if validate_session(&existing, &context_key, now_ms).is_some() {
                return Ok(existing);
            }
            debug!(session_id, "replacing stale assistant session");
        }

        let session = AssistantSession {
            session_id: session_id.to_string(),
            decisions: Vec::new(),
            schema_version: SESSION_SCHEMA_VERSION,
            context_key,
            created_at: now_ms,
            updated_at: now_ms,
            expires_at: None,
        };
        self.store.save_session(&session).await?;
        Ok(session)
    }

    /// Apply a suggestion with at-most-once semantics.
    ///
    /// The pure apply computes the prospective writes and the violation
    /// delta; the store commits them transactionally against the ledger key
    /// `(unitId, suggestionId)`. A transaction failure is logged and leaves
    /// decisions and shifts untouched.
    #[instrument(skip(self, input, suggestion), fields(suggestion_id = %suggestion.id))]
    pub async fn accept_suggestion(
        &self,
        input: &EngineInput,
        suggestion: &AssistantSuggestion,
        session_id: &str,
    ) -> Result<AcceptOutcome> {
        let now_ms = Utc::now().timestamp_millis();

        if self
            .store
            .get_applied_ledger(&input.unit_id, &suggestion.id)
            .await?
            .is_some()
        {
            debug!("suggestion already in applied ledger");
            return Ok(AcceptOutcome::noop(true));
        }

        let applied = apply_suggestion_actions(input, &suggestion.suggestion);

        // Violation delta from re-running the engine on the applied shifts.
        let before = run_engine(input);
        let after_input = EngineInput {
            shifts: applied.next_shifts.clone(),
            ..input.clone()
        };
        let after = run_engine(&after_input);
        let resolved_violations: Vec<Violation> = before
            .violations
            .iter()
            .filter(|v| !after.violations.iter().any(|a| a.id == v.id))
            .cloned()
            .collect();
        let new_violations: Vec<Violation> = after
            .violations
            .iter()
            .filter(|v| !before.violations.iter().any(|b| b.id == v.id))
            .cloned()
            .collect();

        let decision = if applied.applied_action_keys.is_empty() {
            ApplyDecision::Rejected
        } else if applied.rejected_action_keys.is_empty() && new_violations.is_empty() {
            ApplyDecision::Accepted
        } else {
            ApplyDecision::PartiallyAccepted
        };

        if decision == ApplyDecision::Rejected {
            let record = DecisionRecord {
                suggestion_id: suggestion.id.clone(),
                decision: Decision::Rejected,
                timestamp: Some(now_ms),
                session_id: Some(session_id.to_string()),
                suggestion_version: SuggestionVersion::V2,
                reason: None,
                source: Some(DecisionSource::System),
            };
            self.store.save_decision(session_id, &record).await?;
            return Ok(AcceptOutcome {
                decision: Some(ApplyDecision::Rejected),
                rejected_action_keys: applied.rejected_action_keys,
                issues: applied.issues,
                ..AcceptOutcome::noop(false)
            });
        }

        let commit = ApplyCommit {
            unit_id: input.unit_id.clone(),
            suggestion_id: suggestion.id.clone(),
            session_id: session_id.to_string(),
            signature_hash: suggestion.meta.signature_hash.clone(),
            applied_at: now_ms,
            writes: applied.writes.clone(),
            decision: DecisionRecord {
                suggestion_id: suggestion.id.clone(),
                decision: Decision::Accepted,
                timestamp: Some(now_ms),
                session_id: Some(session_id.to_string()),
                suggestion_version: SuggestionVersion::V2,
                reason: None,
                source: Some(DecisionSource::User),
            },
        };

        match self.store.commit_apply(&commit).await {
            Ok(CommitOutcome::Applied) => Ok(AcceptOutcome {
                status: ApplyStatus::Applied,
                already_applied: false,
                decision: Some(decision),
                resolved_violations,
                new_violations,
                applied_shift_ids: applied.applied_shift_ids(),
                rejected_action_keys: applied.rejected_action_keys,
                issues: applied.issues,
            }),
            Ok(CommitOutcome::AlreadyApplied) => Ok(AcceptOutcome::noop(true)),
            Ok(CommitOutcome::Unchanged) => Ok(AcceptOutcome {
                decision: Some(decision),
                ..AcceptOutcome::noop(false)
            }),
            Err(error) => {
                warn!(%error, "apply transaction failed");
                self.store.log_apply_failure(&ApplyFailureRecord {
                    unit_id: input.unit_id.clone(),
                    suggestion_id: suggestion.id.clone(),
                    signature_hash: suggestion.meta.signature_hash.clone(),
                    error: error.to_string(),
                    failed_at: now_ms,
                });
                Ok(AcceptOutcome {
                    status: ApplyStatus::Failed,
                    already_applied: false,
                    decision: None,
                    resolved_violations: Vec::new(),
                    new_violations: Vec::new(),
                    applied_shift_ids: Vec::new(),
                    rejected_action_keys: applied.rejected_action_keys,
                    issues: applied.issues,
                })
            }
        }
    }

    /// Record a dismissal; never touches shifts or the ledger.
    #[instrument(skip(self))]
    pub async fn reject_suggestion(
        &self,
        session_id: &str,
        suggestion_id: &str,
        reason: Option<&str>,
    ) -> Result<()> {
        let record = DecisionRecord {
            suggestion_id: suggestion_id.to_string(),
            decision: Decision::Rejected,
            timestamp: Some(Utc::now().timestamp_millis()),
            session_id: Some(session_id.to_string()),
            suggestion_version: SuggestionVersion::V2,
            reason: reason
                .map(sanitize_reason)
                .filter(|r| !r.is_empty()),
            source: Some(DecisionSource::User),
        };
        self.store.save_decision(session_id, &record).await
    }
}
