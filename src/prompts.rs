//! Stage descriptors and prompt assembly.
//!
//! The four analyst stages are fixed data: role, goal, backstory and task text
//! with `{location}`, `{land_size}` and `{budget}` placeholders. Binding a
//! stage to `SiteInputs` fills those placeholders once; rendering a bound
//! stage adds the shared context collected from earlier stages.
use crate::proposal::{ProposalRecord, SiteInputs};
use crate::util::{fill_template, format_acres};
use serde::{Deserialize, Serialize};

const SYSTEM_TEMPLATE: &str = include_str!("../prompts/system.md");
const STAGE_TEMPLATE: &str = include_str!("../prompts/stage.md");
const CONTEXT_TEMPLATE: &str = include_str!("../prompts/context.md");
const PROPOSAL_TASK: &str = include_str!("../prompts/proposal.md");

/// Position of a stage in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    MarketResearch,
    Demographics,
    Risk,
    Proposal,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MarketResearch => write!(f, "market_research"),
            Self::Demographics => write!(f, "demographics"),
            Self::Risk => write!(f, "risk"),
            Self::Proposal => write!(f, "proposal"),
        }
    }
}

/// Unbound stage descriptor.
#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    pub kind: StageKind,
    pub role: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
    pub task: &'static str,
    pub expected_output: &'static str,
}

/// Stages in execution order. The last one must produce the proposal JSON.
pub const STAGES: [StageSpec; 4] = [
    StageSpec {
        kind: StageKind::MarketResearch,
        role: "Market Data Researcher",
        goal: "Identify business types and service gaps in {location}",
        backstory: "Quick and precise urban data analyst",
        task: "Identify top businesses in {location}.",
        expected_output: "Bullet points of market gaps.",
    },
    StageSpec {
        kind: StageKind::Demographics,
        role: "Socio-Economic Analyst",
        goal: "Analyze population density and income levels for {location}",
        backstory: "Data scientist specializing in census data and buyer personas.",
        task: "Analyze demographics for {location}.",
        expected_output: "Demographic profile.",
    },
    StageSpec {
        kind: StageKind::Risk,
        role: "Risk & Compliance Specialist",
        goal: "Identify flooding, zoning, and oversaturation risks for {location}",
        backstory: "A cautious analyst who finds potential deal-breakers.",
        task: "List top 3 risks in {location}.",
        expected_output: "Risk assessment report.",
    },
    StageSpec {
        kind: StageKind::Proposal,
        role: "Lead Investment Strategist",
        goal: "Synthesize all data to propose a high-ROI project within budget.",
        backstory: "Seasoned developer who balances demand with physical and financial limits.",
        task: PROPOSAL_TASK,
        expected_output: "A flat JSON object containing the investment proposal.",
    },
];

/// Stage descriptor with site parameters substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStage {
    pub kind: StageKind,
    pub role: &'static str,
    pub goal: String,
    pub backstory: &'static str,
    pub task: String,
    pub expected_output: &'static str,
}

impl BoundStage {
    /// System message carrying the agent persona.
    pub fn system_prompt(&self) -> String {
        fill_template(
            SYSTEM_TEMPLATE,
            &[
                ("role", self.role),
                ("backstory", self.backstory),
                ("goal", &self.goal),
            ],
        )
    }

    /// User message: task, expected output and everything earlier stages said.
    pub fn render_prompt(&self, context: &StageContext) -> String {
        let context_section = context.render();
        fill_template(
            STAGE_TEMPLATE,
            &[
                ("task", self.task.trim_end()),
                ("expected_output", self.expected_output),
                ("context_section", &context_section),
            ],
        )
    }
}

/// Bind every stage to the run's site parameters, preserving order.
pub fn bind_stages(inputs: &SiteInputs) -> Vec<BoundStage> {
    let land_size = format_acres(inputs.land_size_acres);
    let budget = inputs.budget_rm.to_string();
    let field_list = ProposalRecord::FIELD_NAMES
        .iter()
        .map(|name| format!("- {name}"))
        .collect::<Vec<_>>()
        .join("\n");
    let values = [
        ("location", inputs.location.as_str()),
        ("land_size", land_size.as_str()),
        ("budget", budget.as_str()),
        ("field_list", field_list.as_str()),
    ];
    STAGES
        .iter()
        .map(|stage| BoundStage {
            kind: stage.kind,
            role: stage.role,
            goal: fill_template(stage.goal, &values),
            backstory: stage.backstory,
            task: fill_template(stage.task, &values),
            expected_output: stage.expected_output,
        })
        .collect()
}

/// Output of one completed stage, kept for later stages.
#[derive(Debug, Clone, PartialEq)]
struct ContextEntry {
    role: &'static str,
    output: String,
}

/// Shared context accumulated across the sequential run.
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    entries: Vec<ContextEntry>,
}

impl StageContext {
    pub fn push(&mut self, stage: &BoundStage, output: &str) {
        self.entries.push(ContextEntry {
            role: stage.role,
            output: output.to_string(),
        });
    }

    /// Prompt section listing earlier outputs by role; empty for the first stage.
    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return String::new();
        }
        let entries = self
            .entries
            .iter()
            .map(|entry| format!("\n## {}\n{}\n", entry.role, entry.output.trim()))
            .collect::<String>();
        fill_template(CONTEXT_TEMPLATE, &[("entries", &entries)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn inputs() -> SiteInputs {
        SiteInputs {
            location: "Cheras, KL".to_string(),
            land_size_acres: 1.0,
            budget_rm: 5_000_000,
        }
    }

    #[test]
    fn stages_run_in_fixed_order() {
        let kinds: Vec<StageKind> = bind_stages(&inputs()).iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StageKind::MarketResearch,
                StageKind::Demographics,
                StageKind::Risk,
                StageKind::Proposal
            ]
        );
    }

    #[test]
    fn binding_fills_every_placeholder() {
        let placeholder = Regex::new(r"\{[a-z_]+\}").expect("placeholder regex");
        for stage in bind_stages(&inputs()) {
            let prompt = stage.render_prompt(&StageContext::default());
            let system = stage.system_prompt();
            assert!(!placeholder.is_match(&prompt), "unfilled: {prompt}");
            assert!(!placeholder.is_match(&system), "unfilled: {system}");
        }
    }

    #[test]
    fn proposal_task_names_site_and_all_fields() {
        let stages = bind_stages(&inputs());
        let proposal = stages.last().expect("proposal stage");
        assert!(proposal
            .task
            .contains("for Cheras, KL with 1.0 acres and RM 5000000."));
        for name in ProposalRecord::FIELD_NAMES {
            assert!(proposal.task.contains(&format!("- {name}")), "missing {name}");
        }
    }

    #[test]
    fn system_prompt_carries_persona() {
        let stage = &bind_stages(&inputs())[2];
        let system = stage.system_prompt();
        assert!(system.starts_with("You are Risk & Compliance Specialist."));
        assert!(system.contains("flooding, zoning, and oversaturation risks for Cheras, KL"));
    }

    #[test]
    fn context_lists_earlier_outputs_by_role() {
        let stages = bind_stages(&inputs());
        let mut context = StageContext::default();
        assert_eq!(context.render(), "");
        context.push(&stages[0], "- no laundromats\n");
        context.push(&stages[1], "median income RM 6k");
        let prompt = stages[2].render_prompt(&context);
        assert!(prompt.contains("## Market Data Researcher\n- no laundromats\n"));
        assert!(prompt.contains("## Socio-Economic Analyst\nmedian income RM 6k\n"));
        assert!(!prompt.contains("## Risk & Compliance Specialist"));
    }

    #[test]
    fn braces_in_location_stay_literal() {
        let mut site = inputs();
        site.location = "Lot {budget}".to_string();
        let stage = &bind_stages(&site)[0];
        assert_eq!(stage.task, "Identify top businesses in Lot {budget}.");
    }
}
