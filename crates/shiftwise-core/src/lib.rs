pub mod domain;
pub mod engine;
pub mod ports;
pub mod services;
pub mod testing;

// Re-export commonly used types
pub use domain::{
    Affected,
    AppliedLedgerRecord,
    AssistantResponse,
    AssistantSession,
    AssistantSuggestion,
    Availability,
    AvailabilityException,
    AvailabilityWindow,
    CapacityMap,
    CreateShiftAction,
    Decision,
    DecisionRecord,
    DecisionSource,
    DecisionState,
    DomainError,
    EmployeeProfile,
    EngineInput,
    EngineResult,
    Explanation,
    ExplanationKind,
    InheritMode,
    MinCoverageRule,
    MoveShiftAction,
    Position,
    Ruleset,
    Scenario,
    ScenarioPayload,
    ScenarioStats,
    ScheduleSettings,
    ScheduleSettingsInput,
    Severity,
    Shift,
    Suggestion,
    SuggestionAction,
    SuggestionType,
    Unit,
    User,
    Violation,
    SESSION_SCHEMA_VERSION,
};

pub use engine::{
    apply_suggestion_actions, assemble_response, compute_assistant_context_key, run_engine,
    validate_session,
};

pub use ports::{ApplyCommit, ApplyFailureRecord, CommitOutcome, ScheduleStore};

pub use services::{AcceptOutcome, ApplyDecision, ApplyStatus, AssistantService};
