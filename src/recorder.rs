use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::Step;

static REASONING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<reasoning>(.*?)</reasoning>").expect("reasoning pattern is valid")
});

#[derive(Debug, Serialize)]
struct Summary<'a> {
    task: &'a str,
    timestamp: String,
    total_steps: usize,
    steps: Vec<StepRecord<'a>>,
}

#[derive(Debug, Serialize)]
struct StepRecord<'a> {
    step: usize,
    url: &'a str,
    screenshot: String,
    llm_response: &'a str,
    reasoning: String,
    action: &'static str,
    action_args: Value,
    error: Option<&'a str>,
}

/// Text between the first `<reasoning>` and `</reasoning>` tags, trimmed.
pub fn extract_reasoning(response: &str) -> String {
    REASONING
        .captures(response)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default()
}

/// Persist a run as:
///
/// ```text
/// <output_dir>/<YYYYmmdd_HHMMSS>/
///     summary.json
///     screenshots/step_00.png ...
/// ```
///
/// Returns the run directory.
pub fn save_run(task: &str, steps: &[Step], output_dir: &Path) -> Result<PathBuf> {
    save_run_at(task, steps, output_dir, Utc::now())
}

fn save_run_at(
    task: &str,
    steps: &[Step],
    output_dir: &Path,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let timestamp = now.format("%Y%m%d_%H%M%S").to_string();
    let run_dir = output_dir.join(&timestamp);
    let screenshots_dir = run_dir.join("screenshots");
    std::fs::create_dir_all(&screenshots_dir)
        .with_context(|| format!("creating {}", screenshots_dir.display()))?;

    let mut records = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let name = format!("step_{i:02}.png");
        std::fs::write(screenshots_dir.join(&name), &step.state.screenshot)
            .with_context(|| format!("writing screenshot {name}"))?;

        records.push(StepRecord {
            step: i,
            url: &step.state.url,
            screenshot: format!("screenshots/{name}"),
            llm_response: &step.response,
            reasoning: extract_reasoning(&step.response),
            action: step.action.name(),
            action_args: step.action.args(),
            error: step.error(),
        });
    }

    let summary = Summary {
        task,
        timestamp,
        total_steps: steps.len(),
        steps: records,
    };
    let file = std::fs::File::create(run_dir.join("summary.json"))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &summary)?;

    info!("Run saved to {}", run_dir.display());
    Ok(run_dir)
}
