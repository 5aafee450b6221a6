use std::fs;

use anyhow::{Context, Result};

use shiftwise_core::EngineInput;

/// Read and parse a week input file.
pub fn load_engine_input(path: &str) -> Result<EngineInput> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading input file {}", path))?;
    let input: EngineInput =
        serde_json::from_str(&raw).with_context(|| format!("parsing input file {}", path))?;

    anyhow::ensure!(
        input.week_days.len() == 7,
        "input must name exactly 7 week days, got {}",
        input.week_days.len()
    );
    Ok(input)
}
