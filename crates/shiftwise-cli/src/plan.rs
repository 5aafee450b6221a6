use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;

use shiftwise_core::{AssistantResponse, AssistantService, Severity};
use shiftwise_storage::{init_assistant_db, SqliteScheduleStore};

use crate::input::load_engine_input;

pub async fn run(db: &str, input_path: &str, session_id: Option<&str>, json: bool) -> Result<()> {
    let input = load_engine_input(input_path)?;

    let response = if let Some(session_id) = session_id {
        let pool = init_assistant_db(db).await?;
        let store = Arc::new(SqliteScheduleStore::new(pool));
        let service = AssistantService::new(store);
        service.ensure_session(session_id, &input).await?;
        service.plan(&input, Some(session_id)).await?
    } else {
        // No session: the plan is a pure function of the input file.
        shiftwise_core::assemble_response(&input, None, 0)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    print_summary(&response);
    Ok(())
}

fn print_summary(response: &AssistantResponse) {
    println!("context key : {}", response.context_key);
    println!(
        "scenarios   : -{} shifts, +{} rules, {} overridden",
        response.scenario_stats.removed_shifts_count,
        response.scenario_stats.added_rules_count,
        response.scenario_stats.overridden_rules_count
    );

    // Violations per day
    let mut per_day: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for violation in &response.violations {
        let day = violation
            .affected
            .date_keys
            .first()
            .map(String::as_str)
            .unwrap_or("-");
        let entry = per_day.entry(day).or_default();
        entry.0 += 1;
        if violation.severity == Severity::High {
            entry.1 += 1;
        }
    }
    println!("violations  : {}", response.violations.len());
    for (day, (total, high)) in per_day {
        println!("  {:<12} {:>3} ({} high)", day, total, high);
    }

    println!("suggestions : {}", response.suggestions.len());
    for suggestion in &response.suggestions {
        let state = suggestion
            .decision_state
            .map(|s| format!(" [{:?}]", s).to_lowercase())
            .unwrap_or_default();
        println!("  {}{}", suggestion.id, state);
        println!("      {}", suggestion.suggestion.explanation);
    }
}
