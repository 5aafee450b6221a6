use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ===== Core Entities =====

/// A scheduling unit (one venue / department). The engine plans one unit
/// and one week per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub unit_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub name: String,
}

/// A shift in engine form. `end_time` may be absent; the effective end is
/// then resolved from the day's closing time plus offset, crossing midnight
/// when the resolved end is not after the start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: String,
    pub user_id: String,
    pub unit_id: String,
    pub date_key: String,
    pub start_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
}

// ===== Schedule Settings =====

/// Raw per-day settings as stored by callers. Every field is optional; the
/// normalizer fills defaults for all seven days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailySettingInput {
    pub is_open: Option<bool>,
    pub opening_time: Option<String>,
    pub closing_time: Option<String>,
    pub closing_time_inherit: Option<bool>,
    pub closing_offset_minutes: Option<f64>,
    pub quotas: Option<BTreeMap<String, i64>>,
}

/// Raw schedule settings (sparse). Day indexes are 0-6 with 0 = Sunday.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleSettingsInput {
    pub daily_settings: BTreeMap<u8, DailySettingInput>,
    pub default_closing_time: Option<String>,
    pub default_closing_offset_minutes: Option<f64>,
    pub merge_daily_settings: bool,
}

/// One fully populated day-of-week setting after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySetting {
    pub is_open: bool,
    pub opening_time: String,
    pub closing_time: String,
    pub closing_time_inherit: bool,
    pub closing_offset_minutes: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub quotas: BTreeMap<String, i64>,
}

/// Normalized schedule settings: exactly seven daily settings (index 0 =
/// Sunday) plus the unit-wide defaults used when a day inherits its closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSettings {
    pub days: Vec<DailySetting>,
    pub default_closing_time: String,
    pub default_closing_offset_minutes: i64,
    pub merge_daily_settings: bool,
}

// ===== Availability =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    #[serde(rename = "startHHmm")]
    pub start_hhmm: String,
    #[serde(rename = "endHHmm")]
    pub end_hhmm: String,
}

/// A dated exception overriding the weekly availability rule.
/// `available = true` without windows means available all day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityException {
    pub date_key: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<Vec<AvailabilityWindow>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Availability {
    /// Day-of-week (0 = Sunday) to availability windows. A missing or empty
    /// list means the employee is unavailable on that day.
    pub weekly: BTreeMap<u8, Vec<AvailabilityWindow>>,
    pub exceptions: Vec<AvailabilityException>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProfile {
    pub user_id: String,
    pub unit_id: String,
    #[serde(default)]
    pub availability: Availability,
}

// ===== Ruleset =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinCoverageRule {
    pub position_id: String,
    pub date_keys: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    pub min_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ruleset {
    pub bucket_minutes: Option<u32>,
    pub min_coverage_by_position: Vec<MinCoverageRule>,
}

// ===== Scenarios =====

/// How scenario-injected coverage rules compose with the base ruleset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InheritMode {
    #[default]
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "OVERRIDE")]
    Override,
    #[serde(rename = "INHERIT_IF_EMPTY")]
    InheritIfEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinCoverageOverride {
    pub position_id: String,
    pub min_count: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SicknessPayload {
    pub user_id: String,
    pub date_keys: Vec<String>,
    pub reason: Option<String>,
    pub severity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(default)]
    pub date_keys: Vec<String>,
    pub time_range: TimeRange,
    #[serde(default)]
    pub min_coverage_overrides: Vec<MinCoverageOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_load_multiplier: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakPayload {
    #[serde(default)]
    pub date_keys: Vec<String>,
    pub time_range: TimeRange,
    #[serde(default)]
    pub min_coverage_overrides: Vec<MinCoverageOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMinutePayload {
    pub timestamp: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patches: Option<Value>,
}

/// Scenario payload, tagged by scenario type. Unknown types deserialize to
/// `Unknown` and are ignored by the rewriter (forward compatibility).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ScenarioPayload {
    #[serde(rename = "SICKNESS")]
    Sickness(SicknessPayload),
    #[serde(rename = "EVENT")]
    Event(EventPayload),
    #[serde(rename = "PEAK")]
    Peak(PeakPayload),
    #[serde(rename = "LAST_MINUTE")]
    LastMinute(LastMinutePayload),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub unit_id: String,
    pub week_start_date: String,
    #[serde(default)]
    pub date_keys: Vec<String>,
    #[serde(default)]
    pub inherit_mode: InheritMode,
    #[serde(flatten)]
    pub payload: ScenarioPayload,
}

// ===== Violations =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

/// Entities touched by a violation or explanation. All lists are sorted and
/// deduplicated before emission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Affected {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub user_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub date_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shift_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub id: String,
    pub constraint_id: String,
    pub severity: Severity,
    pub affected: Affected,
    pub details: String,
}

impl Violation {
    /// Sort key: `(dateKey, slot, constraintId, positionId, userId)`.
    pub fn sort_key(&self) -> (String, String, String, String, String) {
        (
            self.affected.date_keys.first().cloned().unwrap_or_default(),
            self.affected.slots.first().cloned().unwrap_or_default(),
            self.constraint_id.clone(),
            self.affected.position_id.clone().unwrap_or_default(),
            self.affected.user_ids.first().cloned().unwrap_or_default(),
        )
    }
}

// ===== Suggestions =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuggestionType {
    #[serde(rename = "ADD_SHIFT_SUGGESTION")]
    AddShiftSuggestion,
    #[serde(rename = "SHIFT_MOVE_SUGGESTION")]
    ShiftMoveSuggestion,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::AddShiftSuggestion => "ADD_SHIFT_SUGGESTION",
            SuggestionType::ShiftMoveSuggestion => "SHIFT_MOVE_SUGGESTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShiftAction {
    pub user_id: String,
    pub date_key: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveShiftAction {
    pub shift_id: String,
    pub user_id: String,
    pub date_key: String,
    pub new_start_time: String,
    pub new_end_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
}

/// A suggestion action, tagged by a `type` field on the wire.
///
/// Payloads that name an unknown type or are missing required fields land in
/// `Unknown` with their raw payload preserved, so signature computation can
/// degrade deterministically instead of failing the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionAction {
    CreateShift(CreateShiftAction),
    MoveShift(MoveShiftAction),
    Unknown {
        action_type: String,
        payload: serde_json::Map<String, Value>,
    },
}

impl Serialize for SuggestionAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error;

        let tagged = |value: Result<Value, serde_json::Error>, tag: &str| -> Result<Value, S::Error> {
            let mut value = value.map_err(S::Error::custom)?;
            if let Value::Object(obj) = &mut value {
                obj.insert("type".to_string(), Value::String(tag.to_string()));
            }
            Ok(value)
        };

        let value = match self {
            SuggestionAction::CreateShift(a) => tagged(serde_json::to_value(a), "createShift")?,
            SuggestionAction::MoveShift(a) => tagged(serde_json::to_value(a), "moveShift")?,
            SuggestionAction::Unknown {
                action_type,
                payload,
            } => {
                let mut obj = payload.clone();
                obj.insert("type".to_string(), Value::String(action_type.clone()));
                Value::Object(obj)
            }
        };
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SuggestionAction {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let value = Value::deserialize(deserializer)?;
        let obj = match &value {
            Value::Object(map) => map.clone(),
            _ => return Err(D::Error::custom("suggestion action must be an object")),
        };
        let action_type = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let parsed = match action_type.as_str() {
            "createShift" => serde_json::from_value::<CreateShiftAction>(value.clone())
                .map(SuggestionAction::CreateShift)
                .ok(),
            "moveShift" => serde_json::from_value::<MoveShiftAction>(value.clone())
                .map(SuggestionAction::MoveShift)
                .ok(),
            _ => None,
        };

        Ok(parsed.unwrap_or_else(|| {
            let mut payload = obj;
            payload.remove("type");
            SuggestionAction::Unknown {
                action_type,
                payload,
            }
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub suggestion_type: SuggestionType,
    pub explanation: String,
    pub expected_impact: String,
    pub actions: Vec<SuggestionAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureHashFormat {
    #[serde(rename = "sha256:hex")]
    Sha256Hex,
    #[serde(rename = "fnv1a:hex")]
    Fnv1aHex,
    #[serde(rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionMeta {
    pub v1_suggestion_id: String,
    pub signature_version: String,
    pub signature_hash: String,
    pub signature_hash_format: SignatureHashFormat,
    pub signature_preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_degraded: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_degrade_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionState {
    Accepted,
    Rejected,
    Pending,
}

/// A suggestion with its stable identity attached, as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSuggestion {
    pub id: String,
    pub meta: SuggestionMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_state: Option<DecisionState>,
    #[serde(flatten)]
    pub suggestion: Suggestion,
}

// ===== Decisions & Sessions =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionVersion {
    #[default]
    V2,
    V1,
    V0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRecord {
    pub suggestion_id: String,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub suggestion_version: SuggestionVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DecisionSource>,
}

pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// A client-scoped decision session. Sessions are opaque documents to the
/// store; the engine only reads them after validating `context_key`,
/// `schema_version` and `expires_at` against the current input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantSession {
    pub session_id: String,
    #[serde(default)]
    pub decisions: Vec<DecisionRecord>,
    pub schema_version: u32,
    pub context_key: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

// ===== Explanations =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationKind {
    Violation,
    Suggestion,
    Info,
}

/// Decision overlay metadata attached to info explanations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMeta {
    pub decision_source: String,
    pub has_decision_reason: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_timestamp: Option<i64>,
    pub decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
    pub id: String,
    pub kind: ExplanationKind,
    pub severity: Severity,
    pub title: String,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_now: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub what_if_accepted: Option<String>,
    #[serde(default)]
    pub affected: Affected,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_suggestion_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_constraint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DecisionMeta>,
}

// ===== Ledger =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedLedgerRecord {
    pub suggestion_id: String,
    pub unit_id: String,
    pub signature_hash: String,
    pub applied_at: i64,
    pub applied_shift_ids: Vec<String>,
}

// ===== Engine Input / Output =====

/// Per-slot staffing counts: slot key -> position id -> head count.
pub type CapacityMap = BTreeMap<String, BTreeMap<String, u32>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStats {
    pub removed_shifts_count: u32,
    pub added_rules_count: u32,
    pub overridden_rules_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineInput {
    pub unit_id: String,
    pub week_start: String,
    pub week_days: Vec<String>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub shifts: Vec<Shift>,
    #[serde(default)]
    pub ruleset: Ruleset,
    #[serde(default)]
    pub schedule_settings: ScheduleSettingsInput,
    #[serde(default)]
    pub employee_profiles_by_user_id: BTreeMap<String, EmployeeProfile>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResult {
    pub capacity_map: CapacityMap,
    pub violations: Vec<Violation>,
    pub suggestions: Vec<AssistantSuggestion>,
    pub scenario_stats: ScenarioStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantResponse {
    pub context_key: String,
    pub capacity_map: CapacityMap,
    pub violations: Vec<Violation>,
    pub suggestions: Vec<AssistantSuggestion>,
    pub explanations: Vec<Explanation>,
    pub scenario_stats: ScenarioStats,
}
