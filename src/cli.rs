//! Command-line interface definitions.
//!
//! Values a config file may also provide are `Option`s here so that
//! [`crate::config`] can tell an explicit flag from an unset one.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for `junit2jira`.
#[derive(Parser, Debug)]
#[command(name = "junit2jira")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Turn JUnit XML reports into JIRA issues and CI summaries",
    long_about = None
)]
pub struct Cli {
    /// Enable debug log level.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to a TOML config file. Defaults to `.junit2jira.toml` or
    /// `junit2jira.toml` in the current directory or any parent.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// File JIRA issues for failed tests and write the run's outputs.
    Report(ReportArgs),
    /// Fail unless every failed test is a known flake within its allowed ratio.
    CheckFlakes(FlakeCheckArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Directory (or single file) with JUnit XML reports.
    #[arg(long, env = "ARTIFACT_DIR")]
    pub junit_reports_dir: Option<PathBuf>,

    /// Convert XML to a CSV file (use dash [-] for stdout).
    #[arg(long, default_value = "")]
    pub csv_output: String,

    /// Generate an HTML report to this file (use dash [-] for stdout).
    #[arg(long, default_value = "")]
    pub html_output: String,

    /// Generate JSON output in Slack format (use dash [-] for stdout).
    #[arg(long, default_value = "")]
    pub slack_output: String,

    /// Write a summary in JSON to this file (use dash [-] for stdout).
    #[arg(long, default_value = "")]
    pub summary_output: String,

    /// URL of the JIRA instance [default: https://issues.redhat.com/].
    #[arg(long)]
    pub jira_url: Option<String>,

    /// The JIRA project for issues [default: ROX].
    #[arg(long)]
    pub jira_project: Option<String>,

    /// JIRA personal access token.
    #[arg(long, env = "JIRA_TOKEN", hide_env_values = true)]
    pub jira_token: Option<String>,

    /// When set, issues will NOT be created, commented or linked.
    #[arg(long)]
    pub dry_run: bool,

    /// Number of failures above which a single issue is filed; 0 or less
    /// never collapses [default: 10].
    #[arg(long, allow_negative_numbers = true)]
    pub threshold: Option<i64>,

    /// Timestamp of the CI run, RFC 3339 [default: now].
    #[arg(long)]
    pub timestamp: Option<String>,

    /// Link to source code at the exact version under test.
    #[arg(long, default_value = "")]
    pub base_link: String,

    /// Build job run ID.
    #[arg(long, default_value = "")]
    pub build_id: String,

    /// Link to build job.
    #[arg(long, default_value = "")]
    pub build_link: String,

    /// Built tag or revision.
    #[arg(long, default_value = "")]
    pub build_tag: String,

    /// Name of CI job.
    #[arg(long, default_value = "")]
    pub job_name: String,

    /// Orchestrator name (such as GKE or OpenShift), if any.
    #[arg(long, default_value = "")]
    pub orchestrator: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FlakeCheckArgs {
    /// Directory (or single file) with JUnit XML reports.
    #[arg(long, env = "ARTIFACT_DIR")]
    pub junit_reports_dir: Option<PathBuf>,

    /// YAML file with allowed flakes.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Name of CI job.
    #[arg(long, default_value = "")]
    pub job_name: String,

    /// BigQuery project billed for the ratio query [default: acs-san-stackroxci].
    #[arg(long)]
    pub bigquery_project: Option<String>,

    /// OAuth access token for BigQuery.
    #[arg(long, env = "BIGQUERY_ACCESS_TOKEN", hide_env_values = true)]
    pub bigquery_token: Option<String>,
}
