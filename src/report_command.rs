//! The `report` command: CSV export, JIRA triage and run summaries.

use crate::command::Command;
use crate::config::ReportSettings;
use crate::csv_report::write_csv;
use crate::error::Result;
use crate::file_utils::{open_output, write_output};
use crate::html_utils::render_issue_report;
use crate::reducer::reduce_failures;
use crate::reporting::{RunSummary, triage_table};
use crate::slack;
use crate::tracker::{IssueTracker, JiraClient};
use crate::triage::{TestIssue, Triage, TriageOutcome};

/// Files issues for a run's failures through `T` and writes the outputs.
#[derive(Debug)]
pub struct ReportCommand<T: IssueTracker> {
    tracker: T,
}

impl ReportCommand<JiraClient> {
    /// Command talking to the JIRA instance named in `settings`.
    pub fn from_settings(settings: &ReportSettings) -> Result<Self> {
        let tracker = JiraClient::new(&settings.jira_url, settings.jira_token.clone())?;
        Ok(Self::new(tracker))
    }
}

impl<T: IssueTracker> ReportCommand<T> {
    pub fn new(tracker: T) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }
}

/// Issues touched by a report run.
#[derive(Debug)]
pub struct ReportOutcome {
    pub issues: Vec<TestIssue>,
    pub summary: RunSummary,
}

impl<T: IssueTracker> Command for ReportCommand<T> {
    type Settings = ReportSettings;
    type Outcome = ReportOutcome;

    fn name() -> &'static str {
        "report"
    }

    fn description() -> &'static str {
        "File JIRA issues for failed tests and write the run's outputs"
    }

    /// Tracker failures for single tests do not stop the run: every output
    /// is still written and the failures are returned together at the end.
    #[tracing::instrument(level = "debug", skip_all, fields(dir = %settings.junit_reports_dir.display()))]
    fn execute(&self, settings: &ReportSettings) -> Result<ReportOutcome> {
        let suites = settings.walker.load(&settings.junit_reports_dir)?;
        tracing::info!(suites = suites.len(), "loaded JUnit reports");

        if let Some(out) = open_output(&settings.csv_output)? {
            write_csv(out, &suites, &settings.build)?;
        }

        let failed = settings.walker.failed_tests(&suites);
        tracing::info!(failed = failed.len(), "found failed tests");
        let failed = reduce_failures(
            failed,
            settings.threshold,
            &settings.build.job_name,
            &settings.limits,
        );

        let triage = Triage::new(
            &self.tracker,
            &settings.jira_project,
            &settings.build,
            settings.limits,
        )
        .dry_run(settings.dry_run);
        let TriageOutcome { issues, mut errors } = triage.file_issues(&failed);

        if !settings.slack_output.is_empty() {
            write_output(&settings.slack_output, slack::render(&issues)?.as_bytes())?;
        }

        errors.extend(triage.link_issues(&issues));

        let summary = RunSummary::from_issues(&issues);
        write_output(
            &settings.summary_output,
            format!("{}\n", summary.to_json()?).as_bytes(),
        )?;

        if !issues.is_empty() {
            write_output(
                &settings.html_output,
                render_issue_report(&issues, &settings.jira_url).as_bytes(),
            )?;
            if settings.dry_run {
                eprintln!("{}", triage_table(&issues));
            }
        }

        if !errors.is_empty() {
            tracing::error!(errors = errors.len(), "some issues could not be filed");
        }
        errors.into_result()?;

        tracing::info!(
            issues = issues.len(),
            new_jiras = summary.new_jiras,
            "report finished"
        );
        Ok(ReportOutcome { issues, summary })
    }
}
