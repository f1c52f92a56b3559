//! Sequential four-stage prompt pipeline.
//!
//! Stages execute in the fixed order of `prompts::STAGES`. Each stage sees
//! every earlier stage's output through a shared `StageContext`. There is no
//! parallelism, early exit or retry: the first backend failure ends the run.
//!
//! The final stage's text is always returned as `raw`; `structured` is only
//! set when that text carries a JSON object that validates as a
//! `ProposalRecord`. Schema failures are not errors here; callers fall back
//! through `proposal::normalize`.
use crate::backend::{BackendError, StageRequest, TextBackend};
use crate::extract::find_json_object;
use crate::prompts::{bind_stages, BoundStage, StageContext, StageKind};
use crate::proposal::{ProposalRecord, SiteInputs};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("text-generation backend unavailable during {stage} stage")]
    BackendUnavailable {
        stage: StageKind,
        #[source]
        source: BackendError,
    },
}

/// Timing and size of one completed stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    pub kind: StageKind,
    pub duration: Duration,
    pub response_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub structured: Option<ProposalRecord>,
    pub raw: String,
    pub stages: Vec<StageOutcome>,
}

/// Stages bound to one run's inputs, executed against a shared backend.
pub struct PromptPipeline<'a, B: TextBackend + ?Sized> {
    backend: &'a B,
    stages: Vec<BoundStage>,
}

impl<'a, B: TextBackend + ?Sized> PromptPipeline<'a, B> {
    pub fn new(backend: &'a B, inputs: &SiteInputs) -> Self {
        Self {
            backend,
            stages: bind_stages(inputs),
        }
    }

    pub fn stages(&self) -> &[BoundStage] {
        &self.stages
    }

    /// Run every stage; `on_stage` fires before each one with its index.
    pub fn run_with_progress(
        &self,
        mut on_stage: impl FnMut(usize, &BoundStage),
    ) -> Result<PipelineOutput, PipelineError> {
        let mut context = StageContext::default();
        let mut outcomes = Vec::with_capacity(self.stages.len());
        let mut last_output = String::new();

        for (index, stage) in self.stages.iter().enumerate() {
            on_stage(index, stage);
            tracing::info!(stage = %stage.kind, role = stage.role, "stage started");
            let start = Instant::now();

            let system = stage.system_prompt();
            let prompt = stage.render_prompt(&context);
            let output = self
                .backend
                .generate(&StageRequest {
                    role: stage.role,
                    system: &system,
                    prompt: &prompt,
                })
                .map_err(|source| PipelineError::BackendUnavailable {
                    stage: stage.kind,
                    source,
                })?;

            let duration = start.elapsed();
            tracing::info!(
                stage = %stage.kind,
                elapsed_ms = duration.as_millis() as u64,
                response_bytes = output.len(),
                "stage complete"
            );
            outcomes.push(StageOutcome {
                kind: stage.kind,
                duration,
                response_bytes: output.len(),
            });
            context.push(stage, &output);
            last_output = output;
        }

        let structured = parse_proposal(&last_output);
        Ok(PipelineOutput {
            structured,
            raw: last_output,
            stages: outcomes,
        })
    }
}

/// Parse strategist output against the proposal schema. The first embedded
/// object that validates wins.
pub fn parse_proposal(raw: &str) -> Option<ProposalRecord> {
    find_json_object(raw, ProposalRecord::from_value)
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
