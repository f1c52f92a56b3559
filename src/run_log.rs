//! Run logging for pipeline transparency.
//!
//! Every `run`, successful or not, appends one line to `runs.jsonl` in the
//! session directory:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"location":"Cheras, KL","outcome":"structured",...}
//! {"schema_version":1,"ts":1707900360000,"location":"Ampang","outcome":"backend_unavailable",...}
//! ```
use crate::pipeline::StageOutcome;
use crate::prompts::StageKind;
use crate::proposal::SiteInputs;
use crate::session::SessionPaths;
use crate::util::{now_epoch_ms, truncate_string};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::time::Instant;

pub const RUN_LOG_SCHEMA_VERSION: u32 = 1;

const RAW_PREVIEW_BYTES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Strategist output validated against the proposal schema.
    Structured,
    /// Strategist output failed validation; the raw-text fallback was stored.
    Degraded,
    /// A stage could not reach the backend; nothing was stored.
    BackendUnavailable,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Structured => "structured",
            Self::Degraded => "degraded",
            Self::BackendUnavailable => "backend_unavailable",
        };
        f.pad(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: StageKind,
    pub duration_ms: u64,
    pub response_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the run finished.
    pub ts: u64,

    pub location: String,
    pub land_size_acres: f64,
    pub budget_rm: u64,
    pub model: String,

    /// Wall time of the whole run, geocoding excluded.
    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<StageTiming>,

    pub outcome: RunOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// First ~500 bytes of the strategist's raw output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_preview: Option<String>,
}

/// Builder for run log entries with timing.
pub struct RunLogBuilder {
    start: Instant,
    inputs: SiteInputs,
    model: String,
}

impl RunLogBuilder {
    pub fn new(inputs: &SiteInputs, model: &str) -> Self {
        Self {
            start: Instant::now(),
            inputs: inputs.clone(),
            model: model.to_string(),
        }
    }

    /// Finish the entry for a completed run.
    pub fn completed(self, stages: &[StageOutcome], raw: &str, degraded: bool) -> RunLogEntry {
        let outcome = if degraded {
            RunOutcome::Degraded
        } else {
            RunOutcome::Structured
        };
        let timings = stages
            .iter()
            .map(|stage| StageTiming {
                stage: stage.kind,
                duration_ms: stage.duration.as_millis() as u64,
                response_bytes: stage.response_bytes,
            })
            .collect();
        let preview = truncate_string(raw, RAW_PREVIEW_BYTES);
        self.build(outcome, timings, None, Some(preview))
    }

    /// Finish the entry for a run the backend failed.
    pub fn failed(self, error: impl Into<String>) -> RunLogEntry {
        self.build(
            RunOutcome::BackendUnavailable,
            Vec::new(),
            Some(error.into()),
            None,
        )
    }

    fn build(
        self,
        outcome: RunOutcome,
        stages: Vec<StageTiming>,
        error: Option<String>,
        raw_preview: Option<String>,
    ) -> RunLogEntry {
        RunLogEntry {
            schema_version: RUN_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            location: self.inputs.location,
            land_size_acres: self.inputs.land_size_acres,
            budget_rm: self.inputs.budget_rm,
            model: self.model,
            duration_ms: self.start.elapsed().as_millis() as u64,
            stages,
            outcome,
            error,
            raw_preview,
        }
    }
}

pub fn append_run_log(paths: &SessionPaths, entry: &RunLogEntry) -> Result<()> {
    let log_path = paths.run_log_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("create session directory for run log")?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open run log for append: {}", log_path.display()))?;

    let line = serde_json::to_string(entry).context("serialize run log entry")?;
    writeln!(file, "{}", line).context("write run log entry")?;
    Ok(())
}

/// Load all entries, skipping corrupt lines.
pub fn load_run_log(paths: &SessionPaths) -> Result<Vec<RunLogEntry>> {
    let log_path = paths.run_log_path();
    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let file =
        File::open(&log_path).with_context(|| format!("open run log: {}", log_path.display()))?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} of run log", line_num + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RunLogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                tracing::warn!(line = line_num + 1, error = %err, "skip corrupt run log entry");
            }
        }
    }

    Ok(entries)
}
