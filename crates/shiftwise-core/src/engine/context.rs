/// Context keys identify the input a session was built against. A session
/// whose key no longer matches the current input is silently discarded.
use serde_json::Value;

use crate::domain::EngineInput;
use crate::engine::settings::normalize_schedule_settings;
use crate::engine::signature::sha256_hex;
use crate::engine::time::normalize_bucket_minutes;

pub const CONTEXT_KEY_PREFIX: &str = "assistant-context:v1";

/// Canonical JSON with lexicographically ordered object keys.
fn canonical_json<T: serde::Serialize>(value: &T) -> String {
    fn reorder(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: std::collections::BTreeMap<&String, &Value> = map.iter().collect();
                Value::Object(
                    sorted
                        .into_iter()
                        .map(|(k, v)| (k.clone(), reorder(v)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(reorder).collect()),
            other => other.clone(),
        }
    }

    match serde_json::to_value(value) {
        Ok(v) => reorder(&v).to_string(),
        Err(_) => String::new(),
    }
}

/// The canonical context string: unit, week, sorted positions and users,
/// bucket size, serialized settings, and scenarios sorted by id.
pub fn assistant_context_canonical(input: &EngineInput) -> String {
    let mut position_ids: Vec<&str> = input.positions.iter().map(|p| p.id.as_str()).collect();
    position_ids.sort_unstable();

    let mut users: Vec<String> = input
        .users
        .iter()
        .map(|u| format!("{}:{}", u.id, u.is_active))
        .collect();
    users.sort_unstable();

    let settings = normalize_schedule_settings(&input.schedule_settings);
    let days: Vec<String> = settings
        .days
        .iter()
        .enumerate()
        .map(|(i, d)| {
            format!(
                "{}:{},{},{},{},{}",
                i,
                if d.is_open { 1 } else { 0 },
                d.opening_time,
                d.closing_time,
                if d.closing_time_inherit { 1 } else { 0 },
                d.closing_offset_minutes
            )
        })
        .collect();
    let settings_part = format!(
        "{};defaults:{},{},{}",
        days.join(";"),
        settings.default_closing_time,
        settings.default_closing_offset_minutes,
        if settings.merge_daily_settings { 1 } else { 0 }
    );

    let mut scenarios: Vec<&crate::domain::Scenario> = input.scenarios.iter().collect();
    scenarios.sort_by(|a, b| a.id.cmp(&b.id));
    let scenarios_part: Vec<String> = scenarios
        .iter()
        .map(|s| format!("{}:{}", s.id, canonical_json(&s.payload)))
        .collect();

    [
        format!("unit={}", input.unit_id),
        format!("week={}", input.week_start),
        format!("days={}", input.week_days.join(",")),
        format!("positions={}", position_ids.join(",")),
        format!("users={}", users.join(",")),
        format!(
            "bucket={}",
            normalize_bucket_minutes(input.ruleset.bucket_minutes)
        ),
        format!("settings={}", settings_part),
        format!("scenarios={}", scenarios_part.join(";")),
    ]
    .join("|")
}

pub fn compute_assistant_context_key(input: &EngineInput) -> String {
    format!(
        "{}:{}",
        CONTEXT_KEY_PREFIX,
        sha256_hex(&assistant_context_canonical(input))
    )
}
