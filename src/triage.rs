//! Files one JIRA issue, or a comment on an open one, per failed test.

use crate::error::{ErrorCollector, Result};
use crate::format::{self, BuildInfo, TextLimits};
use crate::testcase::TestCase;
use crate::tracker::{Issue, IssueTracker, NewIssue};

pub const DEFAULT_JIRA_PROJECT: &str = "ROX";
/// Label marking issues managed by this tool.
pub const CI_FAILURE_LABEL: &str = "CI_Failure";
pub const ISSUE_TYPE: &str = "Bug";

/// Query for open CI failure issues whose summary contains `summary`.
pub fn jql_for(project: &str, summary: &str) -> String {
    format!(
        "project in ({})\nAND issuetype = {}\nAND status != Closed\nAND labels = {}\nAND summary ~ {:?}\nORDER BY created DESC",
        project, ISSUE_TYPE, CI_FAILURE_LABEL, summary
    )
}

/// A failed test and the issue it was reported on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIssue {
    pub issue: Issue,
    /// True when the issue was created by this run.
    pub new_jira: bool,
    pub test_case: TestCase,
}

/// Outcome of filing issues: what succeeded and what failed.
#[derive(Debug, Default)]
pub struct TriageOutcome {
    pub issues: Vec<TestIssue>,
    pub errors: ErrorCollector,
}

impl TriageOutcome {
    pub fn new_jiras(&self) -> usize {
        self.issues.iter().filter(|i| i.new_jira).count()
    }
}

/// Reports failed tests to an issue tracker.
pub struct Triage<'a, T: IssueTracker + ?Sized> {
    tracker: &'a T,
    project: &'a str,
    build: &'a BuildInfo,
    limits: TextLimits,
    dry_run: bool,
}

impl<'a, T: IssueTracker + ?Sized> Triage<'a, T> {
    pub fn new(tracker: &'a T, project: &'a str, build: &'a BuildInfo, limits: TextLimits) -> Self {
        Self {
            tracker,
            project,
            build,
            limits,
            dry_run: false,
        }
    }

    /// In a dry run nothing is created, commented or linked.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Files every test; failures are collected rather than stopping the
    /// remaining tests.
    pub fn file_issues(&self, failed: &[TestCase]) -> TriageOutcome {
        let mut outcome = TriageOutcome::default();
        for tc in failed {
            if let Some(Some(issue)) = outcome.errors.collect(self.file_issue(tc)) {
                outcome.issues.push(issue);
            }
        }
        outcome
    }

    /// Comments on the open issue with exactly this test's summary, or
    /// creates one. Returns `None` for a would-be new issue in a dry run.
    pub fn file_issue(&self, tc: &TestCase) -> Result<Option<TestIssue>> {
        let summary = format::summary(tc, &self.limits);
        let description = format::description(tc, self.build, &self.limits);

        tracing::debug!(%summary, "searching for issue");
        let found = self.tracker.search(&jql_for(self.project, &summary))?;
        let existing = found.into_iter().find(|issue| issue.summary == summary);

        let Some(issue) = existing else {
            tracing::info!(%summary, "issue not found, creating new issue");
            if self.dry_run {
                tracing::debug!(%summary, %description, "dry run: will just print issue");
                return Ok(None);
            }
            let created = self.tracker.create(&NewIssue {
                project: self.project.to_string(),
                issue_type: ISSUE_TYPE.to_string(),
                summary: summary.clone(),
                description,
                labels: vec![CI_FAILURE_LABEL.to_string()],
            })?;
            tracing::info!(key = %created.key, %summary, "created new issue");
            return Ok(Some(TestIssue {
                issue: created,
                new_jira: true,
                test_case: tc.clone(),
            }));
        };

        tracing::info!(key = %issue.key, %summary, "found issue, creating a comment");
        if self.dry_run {
            tracing::debug!(key = %issue.key, %description, "dry run: will just print comment");
        } else {
            self.tracker.add_comment(&issue.id, &description)?;
            tracing::info!(key = %issue.key, "created comment");
        }
        Ok(Some(TestIssue {
            issue,
            new_jira: false,
            test_case: tc.clone(),
        }))
    }

    /// Links every pair of distinct issues so a run's failures can be found
    /// from any one of them.
    pub fn link_issues(&self, issues: &[TestIssue]) -> ErrorCollector {
        let mut errors = ErrorCollector::new();
        if self.dry_run {
            tracing::debug!(issues = issues.len(), "dry run: skipping issue links");
            return errors;
        }
        for (x, outward) in issues.iter().enumerate() {
            for inward in &issues[..x] {
                if outward.issue.key == inward.issue.key {
                    continue;
                }
                if errors
                    .collect(self.tracker.add_link(&outward.issue.key, &inward.issue.key))
                    .is_some()
                {
                    tracing::debug!(key = %outward.issue.key, to = %inward.issue.key, "created link");
                }
            }
        }
        errors
    }
}
