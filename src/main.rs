//! proptech: a four-stage text-generation pipeline that turns a Malaysian
//! land parcel (location, acreage, budget) into a development proposal.
//!
//! The CLI wires config, session state and the pipeline together; every run
//! leaves a line in the session's run log.
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;
mod config;
mod extract;
mod geocode;
mod pipeline;
mod prompts;
mod proposal;
mod render;
mod report;
mod run_log;
mod session;
mod util;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_logging(args.verbose);

    let ctx = workflow::CommandContext::new(args.session.as_deref(), args.config.as_deref())?;
    match args.command {
        Command::Run(run) => workflow::run_strategy(&ctx, run),
        Command::Show(show) => workflow::run_show(&ctx, show),
        Command::Export(export) => workflow::run_export(&ctx, export),
        Command::Clear => workflow::run_clear(&ctx),
        Command::Locate(locate) => workflow::run_locate(&ctx, locate),
        Command::History(history) => workflow::run_history(&ctx, history),
        Command::Init(init) => workflow::run_init(&ctx, init),
    }
}

/// Log to stderr so stdout stays clean for `--json`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
