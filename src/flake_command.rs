//! The `check-flakes` command: gate a CI job on known flaky tests.

use crate::command::Command;
use crate::config::FlakeCheckSettings;
use crate::error::{Result, TriageError};
use crate::flake::{FlakeChecker, load_flake_config};
use crate::junit;
use crate::ratio::{BigQueryClient, RatioSource};

/// Succeeds only when every failed test of a run is a tolerated flake
/// according to ratios from `R`.
#[derive(Debug)]
pub struct FlakeCheckCommand<R: RatioSource> {
    ratios: R,
}

impl FlakeCheckCommand<BigQueryClient> {
    /// Command querying the BigQuery table named in `settings`.
    pub fn from_settings(settings: &FlakeCheckSettings) -> Result<Self> {
        let token = settings.bigquery_token.clone().ok_or_else(|| {
            TriageError::invalid_input_with_arg(
                "a BigQuery access token is required (or set BIGQUERY_ACCESS_TOKEN)",
                "--bigquery-token",
            )
        })?;
        let client = BigQueryClient::new(
            &settings.bigquery_project,
            settings.bigquery_table.as_str(),
            token,
        )?;
        Ok(Self::new(client))
    }
}

impl<R: RatioSource> FlakeCheckCommand<R> {
    pub fn new(ratios: R) -> Self {
        Self { ratios }
    }

    pub fn ratios(&self) -> &R {
        &self.ratios
    }
}

impl<R: RatioSource> Command for FlakeCheckCommand<R> {
    type Settings = FlakeCheckSettings;
    /// Number of failed tests that were checked.
    type Outcome = usize;

    fn name() -> &'static str {
        "check-flakes"
    }

    fn description() -> &'static str {
        "Fail unless every failed test is a known flake within its allowed ratio"
    }

    #[tracing::instrument(level = "debug", skip_all, fields(job = %settings.job_name))]
    fn execute(&self, settings: &FlakeCheckSettings) -> Result<usize> {
        // No ignore list here: a crash must not be waved through as a flake.
        let suites = junit::ingest(&settings.junit_reports_dir)?;
        let failed = settings.walker.failed_tests(&suites);
        tracing::info!(failed = failed.len(), "found failed tests");

        let policies = load_flake_config(&settings.config_file)?;
        tracing::debug!(policies = policies.len(), "loaded flake policies");

        FlakeChecker::new(&settings.job_name, &self.ratios).check_failed_tests(&failed, &policies)?;

        tracing::info!("All failed tests are within allowed flake thresholds");
        Ok(failed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flake::FlakePolicyConfig;
    use crate::ratio::FlakeRatio;
    use crate::testcase::SuiteWalker;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct StaticRatio(FlakeRatio);

    impl RatioSource for StaticRatio {
        fn ratio_for_test(&self, _: &FlakePolicyConfig, _: &str) -> Result<FlakeRatio> {
            Ok(self.0)
        }
    }

    const POLICIES: &str = r#"
- jobNameRegex: "pr-.*-e2e"
  className: "TestSuite"
  testNameRegex: "Test[AB]"
  ratioJobName: "main-e2e"
  ratioThreshold: 5
"#;

    fn fixture(report: &str) -> (TempDir, FlakeCheckSettings) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("report.xml"), report).unwrap();
        fs::write(dir.path().join("flakes.yaml"), POLICIES).unwrap();
        let settings = FlakeCheckSettings {
            junit_reports_dir: dir.path().join("report.xml"),
            config_file: dir.path().join("flakes.yaml"),
            job_name: "pr-gke-e2e".to_string(),
            bigquery_project: String::new(),
            bigquery_table: String::new(),
            bigquery_token: None,
            walker: SuiteWalker::default(),
        };
        (dir, settings)
    }

    fn report(test_name: &str) -> String {
        format!(
            r#"<testsuite name="TestSuite"><testcase name="{}" classname="TestSuite"><failure message="flaky"/></testcase></testsuite>"#,
            test_name
        )
    }

    fn ratio(total_runs: i64, fail_ratio: i64) -> StaticRatio {
        StaticRatio(FlakeRatio {
            total_runs,
            fail_ratio,
        })
    }

    #[test]
    fn test_known_flake_within_threshold_passes() {
        let (_dir, settings) = fixture(&report("TestA"));
        let checked = FlakeCheckCommand::new(ratio(100, 2)).execute(&settings).unwrap();
        assert_eq!(checked, 1);
    }

    #[test]
    fn test_unknown_failure_fails() {
        let (_dir, settings) = fixture(&report("TestC"));
        let err = FlakeCheckCommand::new(ratio(100, 2))
            .execute(&settings)
            .unwrap_err();
        assert_eq!(err.name(), "NoPolicyMatch");
    }

    #[test]
    fn test_ratio_above_threshold_fails() {
        let (_dir, settings) = fixture(&report("TestB"));
        let err = FlakeCheckCommand::new(ratio(100, 6))
            .execute(&settings)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "flake ratio for test is above allowed threshold: (6 > 5)"
        );
    }

    #[test]
    fn test_go_crash_is_not_ignored_by_the_gate() {
        let (_dir, settings) = fixture(
            r#"<testsuites>
<testsuite name="TestSuite"><testcase name="TestA" classname="TestSuite"><failure message="flaky"/></testcase></testsuite>
<testsuite name="runtime"><testcase name="" classname="runtime.MemStats"><failure/></testcase></testsuite>
</testsuites>"#,
        );
        let err = FlakeCheckCommand::new(ratio(100, 1))
            .execute(&settings)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"test does not match any allowed flakes: "pr-gke-e2e" / "runtime.MemStats" / "fallback-name""#
        );
    }

    #[test]
    fn test_run_without_failures_fails() {
        let (_dir, settings) = fixture(
            r#"<testsuite name="TestSuite"><testcase name="TestA" classname="TestSuite"/></testsuite>"#,
        );
        let err = FlakeCheckCommand::new(ratio(100, 0))
            .execute(&settings)
            .unwrap_err();
        assert!(matches!(err, TriageError::NoFailedTests));
    }

    #[test]
    fn test_from_settings_requires_token() {
        let (_dir, settings) = fixture(&report("TestA"));
        let err = FlakeCheckCommand::from_settings(&settings).err().unwrap();
        assert_eq!(err.name(), "InvalidInput");

        let with_token = FlakeCheckSettings {
            bigquery_token: Some("token".to_string()),
            bigquery_project: "p".to_string(),
            bigquery_table: "p.d.t".to_string(),
            junit_reports_dir: PathBuf::from("unused"),
            ..settings
        };
        assert!(FlakeCheckCommand::from_settings(&with_token).is_ok());
    }
}
