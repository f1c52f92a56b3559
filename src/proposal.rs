//! Proposal data model and result normalization.
//!
//! `ProposalRecord` is the only structured entity a run produces. A record is
//! built once per run and replaced wholesale; nothing edits it field by field.
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FALLBACK_PROPOSED_BUILDING: &str = "Strategic Recommendation";
pub const FALLBACK_TARGET_SEGMENT: &str = "Identified in Report";
pub const FALLBACK_ROI: &str = "See Analysis";
pub const FALLBACK_RISK_ANALYSIS: &str = "Check Risks Tab";
pub const FALLBACK_SPACE_UTILIZATION: &str = "As per Land Size";
pub const FALLBACK_FEASIBILITY_NOTE: &str = "Validation Error - Showing Raw Text";

/// Parameters a run is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInputs {
    pub location: String,
    pub land_size_acres: f64,
    pub budget_rm: u64,
}

/// Investment proposal emitted by the strategist stage.
///
/// Every field must be a JSON string; extra keys in LM output are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub proposed_building: String,
    pub logic: String,
    pub target_segment: String,
    pub roi: String,
    pub risk_analysis: String,
    pub space_utilization: String,
    pub estimated_total_cost: String,
    pub financial_feasibility_note: String,
}

impl ProposalRecord {
    /// Field names in rendering order.
    pub const FIELD_NAMES: [&'static str; 8] = [
        "proposed_building",
        "logic",
        "target_segment",
        "roi",
        "risk_analysis",
        "space_utilization",
        "estimated_total_cost",
        "financial_feasibility_note",
    ];

    /// Pair every field name with its value, in rendering order.
    pub fn fields(&self) -> [(&'static str, &str); 8] {
        [
            (Self::FIELD_NAMES[0], self.proposed_building.as_str()),
            (Self::FIELD_NAMES[1], self.logic.as_str()),
            (Self::FIELD_NAMES[2], self.target_segment.as_str()),
            (Self::FIELD_NAMES[3], self.roi.as_str()),
            (Self::FIELD_NAMES[4], self.risk_analysis.as_str()),
            (Self::FIELD_NAMES[5], self.space_utilization.as_str()),
            (Self::FIELD_NAMES[6], self.estimated_total_cost.as_str()),
            (Self::FIELD_NAMES[7], self.financial_feasibility_note.as_str()),
        ]
    }

    /// Validate an arbitrary JSON value against the record schema.
    pub fn from_value(value: Value) -> Option<Self> {
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::debug!(error = %err, "proposal schema validation failed");
                None
            }
        }
    }

    /// Degraded record used when the strategist output is not valid JSON for
    /// the schema. `logic` carries the raw text untouched.
    pub fn degraded(raw: &str, budget_rm: u64) -> Self {
        Self {
            proposed_building: FALLBACK_PROPOSED_BUILDING.to_string(),
            logic: raw.to_string(),
            target_segment: FALLBACK_TARGET_SEGMENT.to_string(),
            roi: FALLBACK_ROI.to_string(),
            risk_analysis: FALLBACK_RISK_ANALYSIS.to_string(),
            space_utilization: FALLBACK_SPACE_UTILIZATION.to_string(),
            estimated_total_cost: format!("Within RM {budget_rm}"),
            financial_feasibility_note: FALLBACK_FEASIBILITY_NOTE.to_string(),
        }
    }
}

/// A normalized record plus whether it came from the raw-text fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub record: ProposalRecord,
    pub degraded: bool,
}

/// Pass a structured record through unchanged, or synthesize the degraded
/// one from the raw text. Never fails.
pub fn normalize(structured: Option<ProposalRecord>, raw: &str, budget_rm: u64) -> ProposalRecord {
    match structured {
        Some(record) => record,
        None => {
            tracing::warn!(
                raw_bytes = raw.len(),
                "strategist output failed schema validation; using raw text"
            );
            ProposalRecord::degraded(raw, budget_rm)
        }
    }
}

/// `normalize`, remembering whether the fallback was taken.
pub fn normalize_outcome(
    structured: Option<ProposalRecord>,
    raw: &str,
    budget_rm: u64,
) -> Normalized {
    let degraded = structured.is_none();
    Normalized {
        record: normalize(structured, raw, budget_rm),
        degraded,
    }
}
