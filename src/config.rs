//! Configuration file support for junit2jira.
//!
//! This module loads an optional TOML file and merges it with command-line
//! arguments. CLI arguments take precedence over config file values, which
//! take precedence over built-in defaults.

use crate::cli::{FlakeCheckArgs, ReportArgs};
use crate::error::{Result, TriageError};
use crate::format::{BuildInfo, DEFAULT_MAX_SUMMARY_LENGTH, DEFAULT_MAX_TEXT_BLOCK_LENGTH, TextLimits};
use crate::ratio::{DEFAULT_BIGQUERY_PROJECT, DEFAULT_BIGQUERY_TABLE};
use crate::testcase::{
    DEFAULT_SUBTEST_MODULE_PREFIX, IgnoreEntry, SubtestPolicy, SuiteWalker, default_ignore_list,
};
use crate::tracker::DEFAULT_JIRA_URL;
use crate::triage::DEFAULT_JIRA_PROJECT;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file names to search for.
const DEFAULT_CONFIG_FILES: &[&str] = &[".junit2jira.toml", "junit2jira.toml"];

/// Failures above which a single issue is filed.
pub const DEFAULT_THRESHOLD: usize = 10;

/// Main configuration structure representing a junit2jira configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Junit2JiraConfig {
    /// JIRA instance and project.
    #[serde(default)]
    pub jira: JiraConfig,

    /// Settings of the `report` command.
    #[serde(default)]
    pub report: ReportConfig,

    /// Settings of the `check-flakes` command.
    #[serde(default)]
    pub flakes: FlakesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JiraConfig {
    pub url: Option<String>,
    pub project: Option<String>,
}

/// Report command configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Failures above which a single issue is filed; 0 never collapses.
    pub threshold: Option<usize>,

    pub max_summary_length: Option<usize>,

    pub max_text_block_length: Option<usize>,

    /// Classname prefix of packages whose `Parent/Child` tests are merged
    /// into their parent.
    pub subtest_module_prefix: Option<String>,

    /// Tests dropped from every report, in addition to the built-in list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<IgnoreEntry>,
}

impl ReportConfig {
    pub fn text_limits(&self) -> TextLimits {
        TextLimits {
            summary: self.max_summary_length.unwrap_or(DEFAULT_MAX_SUMMARY_LENGTH),
            text_block: self
                .max_text_block_length
                .unwrap_or(DEFAULT_MAX_TEXT_BLOCK_LENGTH),
        }
    }

    /// Walker applying the configured ignore list and subtest prefix.
    pub fn suite_walker(&self) -> SuiteWalker {
        let mut ignore = default_ignore_list();
        ignore.extend(self.ignore.iter().cloned());
        let prefix = self
            .subtest_module_prefix
            .as_deref()
            .unwrap_or(DEFAULT_SUBTEST_MODULE_PREFIX);
        SuiteWalker::new(ignore, SubtestPolicy::new(prefix))
    }
}

/// Flake check configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FlakesConfig {
    /// YAML file with allowed flakes.
    pub config_file: Option<PathBuf>,
    pub bigquery_project: Option<String>,
    pub bigquery_table: Option<String>,
}

/// Load configuration from a specific file path.
///
/// # Arguments
///
/// * `path` - Path to the configuration file.
///
/// # Returns
///
/// Returns a `Junit2JiraConfig` if the file exists and can be parsed.
/// Returns `Ok(None)` if the file doesn't exist.
/// Returns an error if the file exists but cannot be parsed.
pub fn load_config_from_path(path: &Path) -> Result<Option<Junit2JiraConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)?;

    let config: Junit2JiraConfig = toml::from_str(&content).map_err(|e| TriageError::ConfigError {
        message: e.to_string(),
        path: Some(path.to_path_buf()),
        source: Some(Box::new(e)),
    })?;

    Ok(Some(config))
}

/// Discover and load configuration from default locations.
///
/// Searches the current directory and its parents for `.junit2jira.toml`
/// or `junit2jira.toml`.
pub fn discover_and_load_config() -> Result<Option<(PathBuf, Junit2JiraConfig)>> {
    let start = std::env::current_dir()?;
    discover_config_from(&start)
}

fn discover_config_from(start: &Path) -> Result<Option<(PathBuf, Junit2JiraConfig)>> {
    let mut current_dir = start.to_path_buf();

    loop {
        for config_name in DEFAULT_CONFIG_FILES {
            let config_path = current_dir.join(config_name);
            if let Some(config) = load_config_from_path(&config_path)? {
                return Ok(Some((config_path, config)));
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Ok(None)
}

/// Load configuration from a specified path or discover from default locations.
///
/// An explicitly given path must exist.
pub fn load_config(config_path: Option<&Path>) -> Result<Option<(PathBuf, Junit2JiraConfig)>> {
    match config_path {
        Some(path) => match load_config_from_path(path)? {
            Some(config) => Ok(Some((path.to_path_buf(), config))),
            None => Err(TriageError::config_error_with_path(
                "config file not found",
                path.to_path_buf(),
            )),
        },
        None => discover_and_load_config(),
    }
}

/// Fully resolved inputs of the `report` command.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub junit_reports_dir: PathBuf,
    pub csv_output: String,
    pub html_output: String,
    pub slack_output: String,
    pub summary_output: String,
    pub jira_url: String,
    pub jira_project: String,
    pub jira_token: Option<String>,
    pub dry_run: bool,
    pub threshold: usize,
    pub build: BuildInfo,
    pub limits: TextLimits,
    pub walker: SuiteWalker,
}

/// Merge report CLI args with config file values.
///
/// Priority order:
/// 1. CLI arguments (highest priority)
/// 2. Config file values
/// 3. Default values (lowest priority)
pub fn merge_report_args(cli_args: &ReportArgs, config: &Junit2JiraConfig) -> Result<ReportSettings> {
    let junit_reports_dir = required_reports_dir(&cli_args.junit_reports_dir)?;

    let jira_url = cli_args
        .jira_url
        .clone()
        .or_else(|| config.jira.url.clone())
        .unwrap_or_else(|| DEFAULT_JIRA_URL.to_string());
    let jira_project = cli_args
        .jira_project
        .clone()
        .or_else(|| config.jira.project.clone())
        .unwrap_or_else(|| DEFAULT_JIRA_PROJECT.to_string());
    let threshold = cli_args
        .threshold
        .map(|t| usize::try_from(t).unwrap_or(0))
        .or(config.report.threshold)
        .unwrap_or(DEFAULT_THRESHOLD);
    let timestamp = cli_args
        .timestamp
        .clone()
        .unwrap_or_else(|| chrono::Local::now().to_rfc3339_opts(SecondsFormat::Secs, true));

    Ok(ReportSettings {
        junit_reports_dir,
        csv_output: cli_args.csv_output.clone(),
        html_output: cli_args.html_output.clone(),
        slack_output: cli_args.slack_output.clone(),
        summary_output: cli_args.summary_output.clone(),
        jira_url,
        jira_project,
        jira_token: cli_args.jira_token.clone().filter(|t| !t.is_empty()),
        dry_run: cli_args.dry_run,
        threshold,
        build: BuildInfo {
            build_id: cli_args.build_id.clone(),
            build_link: cli_args.build_link.clone(),
            build_tag: cli_args.build_tag.clone(),
            base_link: cli_args.base_link.clone(),
            job_name: cli_args.job_name.clone(),
            orchestrator: cli_args.orchestrator.clone(),
            timestamp,
        },
        limits: config.report.text_limits(),
        walker: config.report.suite_walker(),
    })
}

/// Fully resolved inputs of the `check-flakes` command.
#[derive(Debug, Clone, PartialEq)]
pub struct FlakeCheckSettings {
    pub junit_reports_dir: PathBuf,
    pub config_file: PathBuf,
    pub job_name: String,
    pub bigquery_project: String,
    pub bigquery_table: String,
    pub bigquery_token: Option<String>,
    pub walker: SuiteWalker,
}

/// Merge flake check CLI args with config file values.
pub fn merge_flake_check_args(
    cli_args: &FlakeCheckArgs,
    config: &Junit2JiraConfig,
) -> Result<FlakeCheckSettings> {
    let junit_reports_dir = required_reports_dir(&cli_args.junit_reports_dir)?;
    let config_file = cli_args
        .config_file
        .clone()
        .or_else(|| config.flakes.config_file.clone())
        .ok_or_else(|| {
            TriageError::invalid_input_with_arg(
                "a flake policy file is required",
                "--config-file",
            )
        })?;

    Ok(FlakeCheckSettings {
        junit_reports_dir,
        config_file,
        job_name: cli_args.job_name.clone(),
        bigquery_project: cli_args
            .bigquery_project
            .clone()
            .or_else(|| config.flakes.bigquery_project.clone())
            .unwrap_or_else(|| DEFAULT_BIGQUERY_PROJECT.to_string()),
        bigquery_table: config
            .flakes
            .bigquery_table
            .clone()
            .unwrap_or_else(|| DEFAULT_BIGQUERY_TABLE.to_string()),
        bigquery_token: cli_args.bigquery_token.clone().filter(|t| !t.is_empty()),
        walker: config.report.suite_walker(),
    })
}

fn required_reports_dir(dir: &Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir.clone()),
        _ => Err(TriageError::invalid_input_with_arg(
            "a JUnit reports directory is required (or set ARTIFACT_DIR)",
            "--junit-reports-dir",
        )),
    }
}
