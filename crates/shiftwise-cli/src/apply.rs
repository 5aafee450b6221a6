use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::info;

use shiftwise_core::{run_engine, ApplyStatus, AssistantService};
use shiftwise_storage::{init_assistant_db, SqliteScheduleStore};

use crate::input::load_engine_input;

async fn service_for(db: &str) -> Result<(Arc<SqliteScheduleStore>, AssistantService)> {
    let pool = init_assistant_db(db).await?;
    let store = Arc::new(SqliteScheduleStore::new(pool));
    Ok((store.clone(), AssistantService::new(store)))
}

pub async fn accept(db: &str, input_path: &str, suggestion_id: &str, session_id: &str) -> Result<()> {
    let input = load_engine_input(input_path)?;
    let (_store, service) = service_for(db).await?;
    service.ensure_session(session_id, &input).await?;

    let result = run_engine(&input);
    let Some(suggestion) = result.suggestions.iter().find(|s| s.id == suggestion_id) else {
        bail!("suggestion {} not found in the current plan", suggestion_id);
    };

    let outcome = service
        .accept_suggestion(&input, suggestion, session_id)
        .await?;

    match outcome.status {
        ApplyStatus::Applied => {
            println!("applied; shifts written: {:?}", outcome.applied_shift_ids);
            println!(
                "resolved {} violation(s), introduced {}",
                outcome.resolved_violations.len(),
                outcome.new_violations.len()
            );
        }
        ApplyStatus::Noop if outcome.already_applied => {
            println!("noop: suggestion was already applied");
        }
        ApplyStatus::Noop => {
            println!("noop: the schedule already matches this suggestion");
        }
        ApplyStatus::Failed => {
            println!("failed: the transaction did not commit; nothing was written");
        }
    }
    for issue in &outcome.issues {
        println!("issue: {}", issue);
    }
    Ok(())
}

pub async fn reject(
    db: &str,
    input_path: &str,
    suggestion_id: &str,
    session_id: &str,
    reason: Option<&str>,
) -> Result<()> {
    let input = load_engine_input(input_path)?;
    let (_store, service) = service_for(db).await?;
    service.ensure_session(session_id, &input).await?;

    service
        .reject_suggestion(session_id, suggestion_id, reason)
        .await?;
    println!("dismissed {}", suggestion_id);
    Ok(())
}

pub async fn import(db: &str, input_path: &str) -> Result<()> {
    let input = load_engine_input(input_path)?;
    let (store, _service) = service_for(db).await?;

    for user in &input.users {
        store.upsert_user(user).await?;
    }
    for position in &input.positions {
        store.upsert_position(position).await?;
    }
    for shift in &input.shifts {
        store.upsert_shift(shift).await?;
    }

    info!(
        users = input.users.len(),
        positions = input.positions.len(),
        shifts = input.shifts.len(),
        "import complete"
    );
    println!(
        "imported {} users, {} positions, {} shifts",
        input.users.len(),
        input.positions.len(),
        input.shifts.len()
    );
    Ok(())
}
