/// Scenario rewriting of the engine input.
///
/// Scenarios are applied in input order to the shifts and the min-coverage
/// ruleset. Malformed pieces (bad date keys, unparsable times, non-positive
/// counts) are dropped element-wise; a scenario never aborts the pipeline.
use std::collections::BTreeSet;

use tracing::debug;

use crate::domain::{
    InheritMode, MinCoverageOverride, MinCoverageRule, Scenario, ScenarioPayload, ScenarioStats,
    Shift, TimeRange,
};
use crate::engine::time::{is_valid_date_key, parse_hhmm};

#[derive(Debug, Clone)]
pub struct RewrittenInput {
    pub shifts: Vec<Shift>,
    pub min_coverage_rules: Vec<MinCoverageRule>,
    pub stats: ScenarioStats,
}

pub fn apply_scenarios(
    shifts: &[Shift],
    rules: &[MinCoverageRule],
    scenarios: &[Scenario],
) -> RewrittenInput {
    let mut shifts = shifts.to_vec();
    let mut rules = rules.to_vec();
    let mut stats = ScenarioStats::default();

    for scenario in scenarios {
        match &scenario.payload {
            ScenarioPayload::Sickness(payload) => {
                let sick_days: BTreeSet<&str> = payload
                    .date_keys
                    .iter()
                    .chain(scenario.date_keys.iter())
                    .map(String::as_str)
                    .filter(|dk| is_valid_date_key(dk))
                    .collect();

                let before = shifts.len();
                shifts.retain(|shift| {
                    !(shift.user_id == payload.user_id && sick_days.contains(shift.date_key.as_str()))
                });
                stats.removed_shifts_count += (before - shifts.len()) as u32;
            }
            ScenarioPayload::Event(payload) => {
                let new_rules = build_coverage_rules(
                    scenario,
                    &payload.date_keys,
                    &payload.time_range,
                    &payload.min_coverage_overrides,
                );
                merge_rules(&mut rules, new_rules, scenario.inherit_mode, &mut stats);
            }
            ScenarioPayload::Peak(payload) => {
                let new_rules = build_coverage_rules(
                    scenario,
                    &payload.date_keys,
                    &payload.time_range,
                    &payload.min_coverage_overrides,
                );
                merge_rules(&mut rules, new_rules, scenario.inherit_mode, &mut stats);
            }
            // Last-minute patches are consumed by the caller, and unknown
            // scenario types are ignored for forward compatibility.
            ScenarioPayload::LastMinute(_) | ScenarioPayload::Unknown => {
                debug!(scenario_id = %scenario.id, "scenario has no engine-side effect");
            }
        }
    }

    RewrittenInput {
        shifts,
        min_coverage_rules: rules,
        stats,
    }
}

/// Build one min-coverage rule per valid override. The payload's date keys
/// win; the scenario-level date keys are the fallback.
fn build_coverage_rules(
    scenario: &Scenario,
    payload_date_keys: &[String],
    time_range: &TimeRange,
    overrides: &[MinCoverageOverride],
) -> Vec<MinCoverageRule> {
    let source_keys = if payload_date_keys.is_empty() {
        &scenario.date_keys
    } else {
        payload_date_keys
    };
    let date_keys: Vec<String> = source_keys
        .iter()
        .filter(|dk| is_valid_date_key(dk))
        .cloned()
        .collect();
    if date_keys.is_empty() {
        return Vec::new();
    }

    let times_valid = parse_hhmm(&time_range.start_time).is_ok()
        && parse_hhmm(&time_range.end_time).is_ok()
        && time_range.start_time != time_range.end_time;
    if !times_valid {
        debug!(scenario_id = %scenario.id, "dropping scenario rules with invalid time range");
        return Vec::new();
    }

    overrides
        .iter()
        .filter_map(|o| {
            let min_count = if o.min_count.is_finite() {
                o.min_count.floor()
            } else {
                return None;
            };
            if min_count < 1.0 {
                return None;
            }
            Some(MinCoverageRule {
                position_id: o.position_id.clone(),
                date_keys: date_keys.clone(),
                start_time: time_range.start_time.clone(),
                end_time: time_range.end_time.clone(),
                min_count: min_count as u32,
            })
        })
        .collect()
}

fn same_window(a: &MinCoverageRule, b: &MinCoverageRule) -> bool {
    a.position_id == b.position_id && a.start_time == b.start_time && a.end_time == b.end_time
}

fn merge_rules(
    rules: &mut Vec<MinCoverageRule>,
    new_rules: Vec<MinCoverageRule>,
    mode: InheritMode,
    stats: &mut ScenarioStats,
) {
    match mode {
        InheritMode::Add => {
            stats.added_rules_count += new_rules.len() as u32;
            rules.extend(new_rules);
        }
        InheritMode::Override => {
            for rule in new_rules {
                // A rule spanning several of the new rule's date keys is
                // counted once per matching key, so the override counter can
                // exceed the number of removed rules. Known quirk, kept.
                let mut remove: Vec<usize> = Vec::new();
                for date_key in &rule.date_keys {
                    for (idx, existing) in rules.iter().enumerate() {
                        if same_window(existing, &rule)
                            && existing.date_keys.iter().any(|dk| dk == date_key)
                        {
                            stats.overridden_rules_count += 1;
                            if !remove.contains(&idx) {
                                remove.push(idx);
                            }
                        }
                    }
                }
                remove.sort_unstable();
                for idx in remove.into_iter().rev() {
                    rules.remove(idx);
                }
                rules.push(rule);
                stats.added_rules_count += 1;
            }
        }
        InheritMode::InheritIfEmpty => {
            for rule in new_rules {
                let occupied = rule.date_keys.iter().any(|date_key| {
                    rules
                        .iter()
                        .any(|r| same_window(r, &rule) && r.date_keys.iter().any(|dk| dk == date_key))
                });
                if !occupied {
                    rules.push(rule);
                    stats.added_rules_count += 1;
                }
            }
        }
    }
}
