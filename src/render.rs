//! Terminal rendering for proposals, site overviews and run history.
//!
//! Output is plain text: a KPI strip, then one titled block per tab
//! (Investment Logic, Risk Assessment, Financials).
use crate::geocode::{satellite_tile_url, street_map_url, Coordinates, SURVEY_RADIUS_M};
use crate::proposal::{ProposalRecord, SiteInputs};
use crate::run_log::RunLogEntry;
use crate::util::format_acres;
use serde::Serialize;
use std::fmt::Write;

const KPI_LABEL_WIDTH: usize = 16;

/// Machine-readable dashboard for `--json`.
#[derive(Debug, Serialize)]
pub struct DashboardJson<'a> {
    pub inputs: Option<&'a SiteInputs>,
    pub coordinates: Coordinates,
    pub degraded: bool,
    pub proposal: &'a ProposalRecord,
}

pub fn render_site_overview(location: &str, coordinates: Coordinates) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Site Overview: {location}");
    let _ = writeln!(
        out,
        "  Coordinates    {:.5}, {:.5}",
        coordinates.latitude, coordinates.longitude
    );
    let _ = writeln!(out, "  Street map     {}", street_map_url(coordinates));
    let _ = writeln!(out, "  Satellite      {}", satellite_tile_url(coordinates));
    let _ = writeln!(out, "  Survey radius  {:.1} km", f64::from(SURVEY_RADIUS_M) / 1000.0);
    out
}

pub fn render_dashboard(
    record: &ProposalRecord,
    inputs: Option<&SiteInputs>,
    degraded: bool,
) -> String {
    let mut out = String::new();
    if let Some(inputs) = inputs {
        let _ = writeln!(
            out,
            "Strategy for {} ({} acres, RM {})",
            inputs.location,
            format_acres(inputs.land_size_acres),
            inputs.budget_rm
        );
        out.push('\n');
    }

    push_kpi(&mut out, "Proposed Type", &record.proposed_building);
    push_kpi(&mut out, "Target Segment", &record.target_segment);
    push_kpi(&mut out, "ROI Potential", &record.roi);

    if degraded {
        out.push_str("\nnote: strategist output failed validation; showing raw text\n");
    }

    push_tab(&mut out, "Investment Logic", &record.logic);
    push_tab(&mut out, "Risk Assessment", &record.risk_analysis);

    let financials = format!(
        "Estimated Cost: {}\nFeasibility Note: {}\nUtilization: {}",
        record.estimated_total_cost, record.financial_feasibility_note, record.space_utilization
    );
    push_tab(&mut out, "Financials", &financials);
    out
}

pub fn render_history(entries: &[RunLogEntry]) -> String {
    if entries.is_empty() {
        return "No runs recorded.\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(
            out,
            "{ts}  {outcome:<19}  {secs:>7.1}s  {location} ({acres} acres, RM {budget})",
            ts = entry.ts,
            outcome = entry.outcome,
            secs = entry.duration_ms as f64 / 1000.0,
            location = entry.location,
            acres = format_acres(entry.land_size_acres),
            budget = entry.budget_rm,
        );
        if let Some(error) = &entry.error {
            let _ = writeln!(out, "    error: {error}");
        }
    }
    out
}

/// Values are shown as stored; an empty one leaves the label bare.
fn push_kpi(out: &mut String, label: &str, value: &str) {
    let line = format!("{label:<KPI_LABEL_WIDTH$} {value}");
    let _ = writeln!(out, "{}", line.trim_end());
}

fn push_tab(out: &mut String, title: &str, body: &str) {
    let _ = writeln!(out, "\n[{title}]");
    for line in body.trim_end().lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "  {line}");
        }
    }
}
