/// Database row types and enum/text conversions for the assistant DB.
use sqlx::FromRow;

use shiftwise_core::domain::{
    AppliedLedgerRecord, Decision, DecisionRecord, DecisionSource, Shift, SuggestionVersion,
};

#[derive(Debug, Clone, FromRow)]
pub struct ShiftRow {
    pub id: String,
    pub unit_id: String,
    pub user_id: String,
    pub date_key: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub position_id: Option<String>,
}

impl From<ShiftRow> for Shift {
    fn from(row: ShiftRow) -> Self {
        Shift {
            id: row.id,
            user_id: row.user_id,
            unit_id: row.unit_id,
            date_key: row.date_key,
            start_time: row.start_time,
            end_time: row.end_time,
            position_id: row.position_id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub session_id: String,
    pub context_key: String,
    pub schema_version: i64,
    pub created_at: i64, // milliseconds since epoch
    pub updated_at: i64,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DecisionRow {
    pub session_id: String,
    pub suggestion_id: String,
    pub decision: String,
    pub timestamp: Option<i64>,
    pub suggestion_version: String,
    pub reason: Option<String>,
    pub source: Option<String>,
}

impl DecisionRow {
    pub fn into_record(self) -> DecisionRecord {
        DecisionRecord {
            suggestion_id: self.suggestion_id,
            decision: decision_from_str(&self.decision),
            timestamp: self.timestamp,
            session_id: Some(self.session_id),
            suggestion_version: version_from_str(&self.suggestion_version),
            reason: self.reason,
            source: self.source.as_deref().and_then(source_from_str),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LedgerRow {
    pub unit_id: String,
    pub suggestion_id: String,
    pub signature_hash: String,
    pub applied_at: i64,
    pub applied_shift_ids: String, // JSON array of shift ids
}

impl LedgerRow {
    pub fn into_record(self) -> AppliedLedgerRecord {
        AppliedLedgerRecord {
            suggestion_id: self.suggestion_id,
            unit_id: self.unit_id,
            signature_hash: self.signature_hash,
            applied_at: self.applied_at,
            applied_shift_ids: serde_json::from_str(&self.applied_shift_ids).unwrap_or_default(),
        }
    }
}

pub fn decision_to_str(decision: Decision) -> &'static str {
    match decision {
        Decision::Accepted => "accepted",
        Decision::Rejected => "rejected",
    }
}

pub fn decision_from_str(value: &str) -> Decision {
    match value {
        "accepted" => Decision::Accepted,
        _ => Decision::Rejected,
    }
}

pub fn version_to_str(version: SuggestionVersion) -> &'static str {
    match version {
        SuggestionVersion::V2 => "v2",
        SuggestionVersion::V1 => "v1",
        SuggestionVersion::V0 => "v0",
    }
}

pub fn version_from_str(value: &str) -> SuggestionVersion {
    match value {
        "v0" => SuggestionVersion::V0,
        "v1" => SuggestionVersion::V1,
        _ => SuggestionVersion::V2,
    }
}

pub fn source_to_str(source: DecisionSource) -> &'static str {
    match source {
        DecisionSource::User => "user",
        DecisionSource::System => "system",
    }
}

pub fn source_from_str(value: &str) -> Option<DecisionSource> {
    match value {
        "user" => Some(DecisionSource::User),
        "system" => Some(DecisionSource::System),
        _ => None,
    }
}
