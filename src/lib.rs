//! # junit2jira - CI failure triage from JUnit reports
//!
//! junit2jira is a CLI tool and library that reads the JUnit XML reports of
//! a CI run and:
//!
//! - **Files issues**: one JIRA issue per failed test, or a comment on the
//!   open issue that already tracks it, with all of a run's issues linked
//! - **Summarizes**: CSV of every test, Slack attachments, an HTML page and
//!   a JSON count of newly created issues
//! - **Gates on flakes**: fails a job unless every failure is a known flake
//!   whose historical failure ratio is within its policy
//!
//! ## Architecture
//!
//! - [`junit`] - JUnit XML parsing into a suite tree
//! - [`testcase`] - Suite walking: ignore list, fallback names, subtest merging
//! - [`reducer`] - Collapsing a flood of failures into one
//! - [`format`] - Issue summaries and descriptions
//! - [`tracker`] - The [`IssueTracker`] seam and its JIRA client
//! - [`triage`] - Issue-or-comment filing and linking
//! - [`flake`] and [`ratio`] - Flake policies and historical ratios
//! - [`csv_report`], [`slack`], [`html_utils`], [`reporting`] - Run outputs
//! - [`cli`], [`config`] - Arguments and the optional TOML config file
//! - [`command`], [`report_command`], [`flake_command`] - The subcommands
//! - [`error`] - Centralized error types for the crate
//!
//! ## Usage as a Library
//!
//! ```rust,no_run
//! use junit2jira_core::testcase::SuiteWalker;
//! use std::path::Path;
//!
//! # fn main() -> junit2jira_core::error::Result<()> {
//! let walker = SuiteWalker::default();
//! let suites = walker.load(Path::new("artifacts"))?;
//! for tc in walker.failed_tests(&suites) {
//!     println!("{} / {}", tc.suite, tc.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All functions that can fail return [`Result<T>`], which is a type alias for
//! `std::result::Result<T, TriageError>`. See the [`error`] module for details.

pub mod cli;
pub mod command;
pub mod config;
pub mod csv_report;
pub mod error;
pub mod file_utils;
pub mod flake;
pub mod flake_command;
pub mod format;
pub mod html_utils;
pub mod junit;
pub mod ratio;
pub mod reducer;
pub mod report_command;
pub mod reporting;
pub mod slack;
pub mod testcase;
pub mod tracker;
pub mod triage;

// Public API exports
pub use crate::cli::{Cli, Commands, FlakeCheckArgs, ReportArgs};
pub use crate::command::Command;
pub use crate::flake_command::FlakeCheckCommand;
pub use crate::report_command::{ReportCommand, ReportOutcome};

// Config exports
pub use crate::config::{
    FlakeCheckSettings, FlakesConfig, JiraConfig, Junit2JiraConfig, ReportConfig, ReportSettings,
    load_config, load_config_from_path, merge_flake_check_args, merge_report_args,
};

// Domain exports
pub use crate::flake::{FlakeChecker, FlakeDetectionPolicy, FlakePolicyConfig};
pub use crate::junit::{Suite, Test, TestStatus};
pub use crate::ratio::{BigQueryClient, FlakeRatio, RatioSource};
pub use crate::testcase::{IgnoreEntry, SuiteWalker, TestCase};
pub use crate::tracker::{Issue, IssueTracker, JiraClient, NewIssue};
pub use crate::triage::{TestIssue, Triage};

// Error exports
pub use crate::error::{ErrorCollector, Result, TriageError as Error};
