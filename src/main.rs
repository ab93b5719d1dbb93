//! junit2jira: turn JUnit XML reports into JIRA issues and CI summaries.
//!
//! The binary has two subcommands:
//! 1. `report` walks the reports, exports a CSV, files or comments on one
//!    JIRA issue per failed test (or a single issue for a flood of failures),
//!    links the issues and writes Slack, HTML and JSON summaries.
//! 2. `check-flakes` exits nonzero unless every failed test matches a flake
//!    policy and its historical failure ratio is within the allowed threshold.
//!
//! USAGE EXAMPLE:
//!   junit2jira report --junit-reports-dir artifacts --dry-run --summary-output -

use clap::Parser;
use color_eyre::Section;
use color_eyre::eyre::Result;
use junit2jira_core::cli::{Cli, Commands};
use junit2jira_core::command::Command;
use junit2jira_core::config::{load_config, merge_flake_check_args, merge_report_args};
use junit2jira_core::error::TriageError;
use junit2jira_core::{FlakeCheckCommand, ReportCommand};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(&cli).map_err(with_suggestions)
}

fn run(cli: &Cli) -> junit2jira_core::Result<()> {
    let config = match load_config(cli.config.as_deref())? {
        Some((path, config)) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            config
        }
        None => Default::default(),
    };

    match &cli.command {
        Commands::Report(args) => {
            let settings = merge_report_args(args, &config)?;
            ReportCommand::from_settings(&settings)?.run(&settings)
        }
        Commands::CheckFlakes(args) => {
            let settings = merge_flake_check_args(args, &config)?;
            FlakeCheckCommand::from_settings(&settings)?.run(&settings)
        }
    }
}

fn with_suggestions(err: TriageError) -> color_eyre::Report {
    let suggestions = err.suggestions();
    suggestions
        .into_iter()
        .fold(color_eyre::Report::new(err), |report, s| report.suggestion(s))
}
