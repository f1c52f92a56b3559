//! Command implementations.
//!
//! Each command loads what it needs from the session directory, does one
//! thing, and writes state back atomically. Only `run` talks to the
//! text-generation backend.
use crate::backend::{OllamaBackend, TextBackend};
use crate::cli::{
    ExportArgs, HistoryArgs, InitArgs, LocateArgs, RunArgs, ShowArgs, DEFAULT_LOCATION,
};
use crate::config::{config_stub, resolve_config, AppConfig};
use crate::geocode::{resolve_coordinates, Coordinates, Geocoder, NominatimGeocoder};
use crate::pipeline::PromptPipeline;
use crate::proposal::{normalize_outcome, ProposalRecord, SiteInputs};
use crate::render::{render_dashboard, render_history, render_site_overview, DashboardJson};
use crate::report::{report_file_name, write_report};
use crate::run_log::{append_run_log, load_run_log, RunLogBuilder, RunLogEntry};
use crate::session::{
    load_session, resolve_session_root, save_session, SessionPaths, SessionState,
};
use crate::util::write_atomic;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

/// Session location and config path shared by every command.
pub struct CommandContext {
    paths: SessionPaths,
    config_path: PathBuf,
}

impl CommandContext {
    pub fn new(session: Option<&Path>, config: Option<&Path>) -> Result<Self> {
        let paths = SessionPaths::new(resolve_session_root(session)?);
        let config_path = config
            .map(Path::to_path_buf)
            .unwrap_or_else(|| paths.config_path());
        tracing::debug!(session = %paths.root().display(), "session resolved");
        Ok(Self { paths, config_path })
    }

    fn config(&self) -> Result<AppConfig> {
        resolve_config(&self.config_path)
    }
}

pub fn run_strategy(ctx: &CommandContext, args: RunArgs) -> Result<()> {
    let config = ctx.config()?;
    let backend = OllamaBackend::new(&config.backend);
    let geocoder = (!args.offline).then(|| NominatimGeocoder::new(&config.geocoder));
    let inputs = SiteInputs {
        location: args.location.clone(),
        land_size_acres: args.land_size,
        budget_rm: args.budget,
    };

    let state = execute_run(
        &ctx.paths,
        &backend,
        geocoder.as_ref().map(|g| g as &dyn Geocoder),
        &inputs,
    )?;
    let Some(record) = state.result.as_ref() else {
        return Err(anyhow!("run finished without a stored result"));
    };

    if args.json {
        print_dashboard_json(&state, record)?;
    } else {
        print!("{}", render_site_overview(&inputs.location, state.coordinates));
        println!();
        print!("{}", render_dashboard(record, state.inputs.as_ref(), state.degraded));
    }

    if !args.no_pdf {
        let path = args
            .pdf
            .unwrap_or_else(|| PathBuf::from(report_file_name(&inputs.location)));
        write_report(&path, record, &inputs.location)?;
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

/// Geocode, run every stage, normalize, and persist.
///
/// A backend failure is recorded in the run log and returned; the stored
/// result is left as it was. Only the freshly resolved coordinate is saved.
fn execute_run(
    paths: &SessionPaths,
    backend: &dyn TextBackend,
    geocoder: Option<&dyn Geocoder>,
    inputs: &SiteInputs,
) -> Result<SessionState> {
    let mut state = load_session(paths)?;
    let coordinates = site_coordinates(geocoder, &inputs.location, state.coordinates);
    state.set_coordinates(coordinates);

    let log = RunLogBuilder::new(inputs, backend.model());
    let pipeline = PromptPipeline::new(backend, inputs);
    let total = pipeline.stages().len();
    let output = pipeline.run_with_progress(|index, stage| {
        eprintln!("[{}/{}] {}: {}", index + 1, total, stage.kind, stage.role);
    });

    let output = match output {
        Ok(output) => output,
        Err(err) => {
            let err = anyhow::Error::new(err);
            record_run(paths, &log.failed(format!("{err:#}")));
            save_session(paths, &state)?;
            return Err(err);
        }
    };

    let normalized = normalize_outcome(output.structured, &output.raw, inputs.budget_rm);
    let entry = log.completed(&output.stages, &output.raw, normalized.degraded);
    state.store_result(inputs.clone(), normalized);
    save_session(paths, &state)?;
    record_run(paths, &entry);
    Ok(state)
}

fn site_coordinates(
    geocoder: Option<&dyn Geocoder>,
    location: &str,
    last_known: Coordinates,
) -> Coordinates {
    match geocoder {
        Some(geocoder) => resolve_coordinates(geocoder, location, last_known),
        None => {
            tracing::info!(location, "offline; reusing stored coordinates");
            last_known
        }
    }
}

/// The run log is best-effort; a write failure never fails the run.
fn record_run(paths: &SessionPaths, entry: &RunLogEntry) {
    if let Err(err) = append_run_log(paths, entry) {
        tracing::warn!(error = %format!("{err:#}"), "failed to append run log");
    }
}

pub fn run_show(ctx: &CommandContext, args: ShowArgs) -> Result<()> {
    let state = load_session(&ctx.paths)?;
    let Some(record) = state.result.as_ref() else {
        if args.json {
            println!("null");
        } else {
            println!("No results yet. Use `proptech run` to generate a strategy.");
        }
        return Ok(());
    };

    if args.json {
        print_dashboard_json(&state, record)?;
    } else {
        print!("{}", render_dashboard(record, state.inputs.as_ref(), state.degraded));
    }
    Ok(())
}

fn print_dashboard_json(state: &SessionState, record: &ProposalRecord) -> Result<()> {
    let dashboard = DashboardJson {
        inputs: state.inputs.as_ref(),
        coordinates: state.coordinates,
        degraded: state.degraded,
        proposal: record,
    };
    let text = serde_json::to_string_pretty(&dashboard).context("serialize dashboard")?;
    println!("{text}");
    Ok(())
}

pub fn run_export(ctx: &CommandContext, args: ExportArgs) -> Result<()> {
    let state = load_session(&ctx.paths)?;
    let record = state
        .result
        .as_ref()
        .ok_or_else(|| anyhow!("no stored result; run `proptech run` first"))?;
    let location = stored_location(&state);
    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(report_file_name(location)));
    write_report(&path, record, location)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn stored_location(state: &SessionState) -> &str {
    state
        .inputs
        .as_ref()
        .map(|inputs| inputs.location.as_str())
        .unwrap_or(DEFAULT_LOCATION)
}

pub fn run_clear(ctx: &CommandContext) -> Result<()> {
    let mut state = load_session(&ctx.paths)?;
    if state.result.is_none() {
        println!("nothing to clear");
        return Ok(());
    }
    state.clear_result();
    save_session(&ctx.paths, &state)?;
    println!("cleared stored result");
    Ok(())
}

pub fn run_locate(ctx: &CommandContext, args: LocateArgs) -> Result<()> {
    let mut state = load_session(&ctx.paths)?;
    let coordinates = if args.offline {
        site_coordinates(None, &args.location, state.coordinates)
    } else {
        let config = ctx.config()?;
        let geocoder = NominatimGeocoder::new(&config.geocoder);
        site_coordinates(Some(&geocoder), &args.location, state.coordinates)
    };
    state.set_coordinates(coordinates);
    save_session(&ctx.paths, &state)?;
    print!("{}", render_site_overview(&args.location, coordinates));
    Ok(())
}

pub fn run_history(ctx: &CommandContext, args: HistoryArgs) -> Result<()> {
    let entries = load_run_log(&ctx.paths)?;
    if args.json {
        let text = serde_json::to_string_pretty(&entries).context("serialize run log")?;
        println!("{text}");
    } else {
        print!("{}", render_history(&entries));
    }
    Ok(())
}

pub fn run_init(ctx: &CommandContext, args: InitArgs) -> Result<()> {
    if ctx.config_path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.config_path.display()
        ));
    }
    write_atomic(&ctx.config_path, format!("{}\n", config_stub()).as_bytes())?;
    println!("wrote {}", ctx.config_path.display());
    Ok(())
}
