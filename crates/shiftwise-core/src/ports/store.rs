use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AppliedLedgerRecord, AssistantSession, DecisionRecord, Position, Shift, User,
};
use crate::engine::apply::ShiftWrite;

/// Everything the store must persist for one accepted suggestion. The
/// implementation commits it inside a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCommit {
    pub unit_id: String,
    pub suggestion_id: String,
    pub session_id: String,
    pub signature_hash: String,
    pub applied_at: i64,
    pub writes: Vec<ShiftWrite>,
    pub decision: DecisionRecord,
}

/// Result of the transactional commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Shifts, ledger record and decision were written.
    Applied,
    /// The ledger already held this suggestion; nothing was written.
    AlreadyApplied,
    /// The writes would not change any shift; only the decision was written.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFailureRecord {
    pub unit_id: String,
    pub suggestion_id: String,
    pub signature_hash: String,
    pub error: String,
    pub failed_at: i64,
}

/// Store collaborator for the apply path.
///
/// `commit_apply` must provide snapshot semantics: within one transaction it
/// re-reads the applied ledger (present means `AlreadyApplied`), detects
/// no-op writes by the `(userId, dateKey, startTime, endTime, positionId)`
/// fingerprint (`Unchanged`, decision only), and otherwise upserts shifts,
/// the ledger record and the decision in a single commit. The ledger key
/// `(unitId, suggestionId)` is the at-most-once token.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn list_shifts(&self, unit_id: &str) -> anyhow::Result<Vec<Shift>>;

    async fn list_positions(&self) -> anyhow::Result<Vec<Position>>;

    async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<User>>;

    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<AssistantSession>>;

    async fn save_session(&self, session: &AssistantSession) -> anyhow::Result<()>;

    /// Record a decision outside the apply transaction (reject path).
    async fn save_decision(
        &self,
        session_id: &str,
        record: &DecisionRecord,
    ) -> anyhow::Result<()>;

    async fn get_applied_ledger(
        &self,
        unit_id: &str,
        suggestion_id: &str,
    ) -> anyhow::Result<Option<AppliedLedgerRecord>>;

    async fn commit_apply(&self, commit: &ApplyCommit) -> anyhow::Result<CommitOutcome>;

    /// Side-effect log sink for failed apply transactions.
    fn log_apply_failure(&self, record: &ApplyFailureRecord);
}
