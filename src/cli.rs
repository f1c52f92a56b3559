//! CLI argument parsing for the site strategist.
//!
//! Input bounds (land size, budget, non-empty location) are enforced here so
//! the pipeline never sees out-of-range values.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_LOCATION: &str = "Cheras, KL";
pub const DEFAULT_LAND_SIZE_ACRES: f64 = 1.0;
pub const DEFAULT_BUDGET_RM: u64 = 5_000_000;

pub const MIN_LAND_SIZE_ACRES: f64 = 0.1;
pub const MAX_LAND_SIZE_ACRES: f64 = 100.0;
pub const MIN_BUDGET_RM: u64 = 100_000;
pub const MAX_BUDGET_RM: u64 = 100_000_000;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "proptech",
    version,
    about = "Multi-stage development strategy for a Malaysian land parcel",
    after_help = "Examples:\n  proptech run --location \"Cheras, KL\" --land-size 1.0 --budget 5000000\n  proptech show --json\n  proptech export --out /tmp/cheras.pdf\n  proptech locate --location Ampang\n  proptech history\n  proptech clear",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Session directory holding state, config and the run log
    #[arg(long, global = true, value_name = "DIR")]
    pub session: Option<PathBuf>,

    /// Config file (defaults to config.json in the session directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log progress at info level on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
    Show(ShowArgs),
    Export(ExportArgs),
    /// Drop the stored result (coordinates are kept)
    Clear,
    Locate(LocateArgs),
    History(HistoryArgs),
    Init(InitArgs),
}

/// Run command inputs: one site, one budget.
#[derive(Parser, Debug)]
#[command(about = "Run the four-stage strategy pipeline for a site")]
pub struct RunArgs {
    /// Free-text site location
    #[arg(
        long,
        value_name = "TEXT",
        default_value = DEFAULT_LOCATION,
        value_parser = parse_location
    )]
    pub location: String,

    /// Land size in acres (0.1 to 100)
    #[arg(
        long,
        value_name = "ACRES",
        default_value_t = DEFAULT_LAND_SIZE_ACRES,
        value_parser = parse_land_size
    )]
    pub land_size: f64,

    /// Budget in Malaysian Ringgit (100000 to 100000000)
    #[arg(
        long,
        value_name = "RM",
        default_value_t = DEFAULT_BUDGET_RM,
        value_parser = clap::value_parser!(u64).range(MIN_BUDGET_RM..=MAX_BUDGET_RM)
    )]
    pub budget: u64,

    /// Report path (defaults to `{location}_report.pdf` in the current directory)
    #[arg(long, value_name = "PATH", conflicts_with = "no_pdf")]
    pub pdf: Option<PathBuf>,

    /// Skip writing the PDF report
    #[arg(long)]
    pub no_pdf: bool,

    /// Emit the dashboard as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip geocoding and reuse the stored coordinate
    #[arg(long)]
    pub offline: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Render the stored result")]
pub struct ShowArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Write the PDF report for the stored result")]
pub struct ExportArgs {
    /// Output path (defaults to `{location}_report.pdf` in the current directory)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Resolve a location and print the site overview")]
pub struct LocateArgs {
    #[arg(long, value_name = "TEXT", value_parser = parse_location)]
    pub location: String,

    /// Skip geocoding and reuse the stored coordinate
    #[arg(long)]
    pub offline: bool,
}

#[derive(Parser, Debug)]
#[command(about = "List recorded runs")]
pub struct HistoryArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Write a default config.json into the session directory")]
pub struct InitArgs {
    /// Overwrite an existing config.json
    #[arg(long)]
    pub force: bool,
}

fn parse_location(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("location must be non-empty".to_string());
    }
    Ok(trimmed.to_string())
}

fn parse_land_size(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("`{raw}` is not a number"))?;
    if !(MIN_LAND_SIZE_ACRES..=MAX_LAND_SIZE_ACRES).contains(&value) {
        return Err(format!(
            "land size must be within {MIN_LAND_SIZE_ACRES}..={MAX_LAND_SIZE_ACRES} acres"
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<RootArgs, clap::Error> {
        RootArgs::try_parse_from(std::iter::once("proptech").chain(args.iter().copied()))
    }

    #[test]
    fn run_defaults() {
        let root = parse(&["run"]).expect("parse run");
        let Command::Run(args) = root.command else {
            panic!("expected run command");
        };
        assert_eq!(args.location, DEFAULT_LOCATION);
        assert!((args.land_size - DEFAULT_LAND_SIZE_ACRES).abs() < f64::EPSILON);
        assert_eq!(args.budget, 5_000_000);
        assert!(args.pdf.is_none());
        assert!(!args.no_pdf);
        assert!(!root.verbose);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let root = parse(&["show", "--session", "/tmp/s", "-v"]).expect("parse show");
        assert_eq!(root.session, Some(PathBuf::from("/tmp/s")));
        assert!(root.verbose);
    }

    #[test]
    fn land_size_bounds() {
        assert!(parse(&["run", "--land-size", "0.1"]).is_ok());
        assert!(parse(&["run", "--land-size", "100"]).is_ok());
        assert!(parse(&["run", "--land-size", "0.05"]).is_err());
        assert!(parse(&["run", "--land-size", "100.5"]).is_err());
        assert!(parse(&["run", "--land-size", "big"]).is_err());
    }

    #[test]
    fn budget_bounds() {
        assert!(parse(&["run", "--budget", "100000"]).is_ok());
        assert!(parse(&["run", "--budget", "100000000"]).is_ok());
        assert!(parse(&["run", "--budget", "99999"]).is_err());
        assert!(parse(&["run", "--budget", "100000001"]).is_err());
        assert!(parse(&["run", "--budget", "5e6"]).is_err());
    }

    #[test]
    fn blank_location_rejected() {
        assert!(parse(&["run", "--location", "   "]).is_err());
        assert!(parse(&["locate", "--location", ""]).is_err());
        let root = parse(&["locate", "--location", "  Ampang "]).expect("parse locate");
        let Command::Locate(args) = root.command else {
            panic!("expected locate command");
        };
        assert_eq!(args.location, "Ampang");
    }

    #[test]
    fn pdf_conflicts_with_no_pdf() {
        assert!(parse(&["run", "--pdf", "a.pdf", "--no-pdf"]).is_err());
    }
}
