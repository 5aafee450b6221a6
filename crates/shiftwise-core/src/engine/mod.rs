/// The deterministic weekly scheduling engine.
///
/// The pipeline is pure and synchronous: identical inputs produce
/// byte-identical capacity maps, violation lists and suggestion ids.
///
/// 1. **Normalization**: sparse schedule settings become seven fully
///    populated daily settings.
/// 2. **Scenario rewriting**: sickness removes shifts, events and peaks
///    inject min-coverage rules under an inherit mode.
/// 3. **Capacity**: per-slot head counts by position, cross-midnight aware.
/// 4. **Constraints**: min-coverage and availability violations with
///    deterministic ids.
/// 5. **Suggestions**: greedy repair producing create/move actions, signed
///    with content-only V2 ids.
pub mod apply;
pub mod assemble;
pub mod capacity;
pub mod constraints;
pub mod context;
pub mod decisions;
pub mod explain;
pub mod scenario;
pub mod settings;
pub mod signature;
pub mod suggestions;
pub mod time;

use crate::domain::{EngineInput, EngineResult};

pub use apply::{apply_suggestion_actions, ApplyActionsResult, ShiftWrite};
pub use assemble::{assemble_response, validate_session};
pub use capacity::build_capacity_map;
pub use constraints::evaluate_constraints;
pub use context::{assistant_context_canonical, compute_assistant_context_key};
pub use decisions::normalize_decisions;
pub use scenario::apply_scenarios;
pub use settings::normalize_schedule_settings;
pub use signature::{compute_signature, identify_suggestions};
pub use suggestions::{synthesize_suggestions, SuggestionContext};
pub use time::normalize_bucket_minutes;

/// Run the full engine pipeline on one week of input.
pub fn run_engine(input: &EngineInput) -> EngineResult {
    let settings = normalize_schedule_settings(&input.schedule_settings);
    let bucket_minutes = normalize_bucket_minutes(input.ruleset.bucket_minutes);

    let rewritten = apply_scenarios(
        &input.shifts,
        &input.ruleset.min_coverage_by_position,
        &input.scenarios,
    );

    let capacity_map = build_capacity_map(&rewritten.shifts, &settings, bucket_minutes);
    let violations = evaluate_constraints(
        &rewritten.shifts,
        &rewritten.min_coverage_rules,
        &input.employee_profiles_by_user_id,
        &settings,
        &capacity_map,
        bucket_minutes,
    );

    let raw_suggestions = synthesize_suggestions(&SuggestionContext {
        users: &input.users,
        positions: &input.positions,
        profiles: &input.employee_profiles_by_user_id,
        shifts: &rewritten.shifts,
        rules: &rewritten.min_coverage_rules,
        violations: &violations,
        settings: &settings,
        bucket_minutes,
    });
    let mut suggestions = identify_suggestions(raw_suggestions);
    suggestions.sort_by(|a, b| a.id.cmp(&b.id));

    EngineResult {
        capacity_map,
        violations,
        suggestions,
        scenario_stats: rewritten.stats,
    }
}
