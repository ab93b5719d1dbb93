//! Known-flake gate.
//!
//! A CI job may pass despite failing tests when every failure is a known
//! flake: covered by a [`FlakeDetectionPolicy`] and historically failing no
//! more often than that policy tolerates. Anything inconclusive fails the
//! gate.

use crate::error::{Result, TriageError};
use crate::ratio::RatioSource;
use crate::testcase::TestCase;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Runs a test needs on record before its ratio is trusted.
pub const MIN_HISTORICAL_RUNS: i64 = 30;

/// One entry of the flake policy file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakePolicyConfig {
    /// CI jobs the policy applies to, e.g. PR jobs but not merges to main.
    pub job_name_regex: String,
    /// Exact class (Go package, Groovy class) of the test.
    pub class_name: String,
    /// Test names covered; lets versioned variants share a policy.
    pub test_name_regex: String,
    /// Job whose history provides the failure ratio.
    pub ratio_job_name: String,
    /// Highest tolerated failure percentage.
    pub ratio_threshold: i64,
}

/// A policy with its regexes compiled.
#[derive(Debug, Clone)]
pub struct FlakeDetectionPolicy {
    config: FlakePolicyConfig,
    job_name: Regex,
    test_name: Regex,
}

impl FlakeDetectionPolicy {
    /// Compiles a policy. Both regexes must match their whole input.
    pub fn new(config: FlakePolicyConfig) -> Result<Self> {
        if !(0..=100).contains(&config.ratio_threshold) {
            return Err(TriageError::config_error(format!(
                "ratio threshold {} for class {:?} is outside 0..=100",
                config.ratio_threshold, config.class_name
            )));
        }
        let job_name = anchored(&config.job_name_regex, "job name")?;
        let test_name = anchored(&config.test_name_regex, "test name")?;
        Ok(Self {
            config,
            job_name,
            test_name,
        })
    }

    pub fn config(&self) -> &FlakePolicyConfig {
        &self.config
    }

    pub fn matches(&self, job_name: &str, class_name: &str, test_name: &str) -> bool {
        self.job_name.is_match(job_name)
            && self.config.class_name == class_name
            && self.test_name.is_match(test_name)
    }
}

fn anchored(pattern: &str, what: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| TriageError::ConfigError {
        message: format!("invalid flake config {} regex: {}", what, pattern),
        path: None,
        source: Some(Box::new(e)),
    })
}

/// Parses the YAML policy list. A single invalid entry rejects the file.
pub fn parse_flake_config(yaml: &str) -> Result<Vec<FlakeDetectionPolicy>> {
    let configs: Vec<FlakePolicyConfig> = serde_yaml::from_str(yaml)?;
    configs.into_iter().map(FlakeDetectionPolicy::new).collect()
}

/// Loads and compiles the policy file at `path`.
pub fn load_flake_config(path: &Path) -> Result<Vec<FlakeDetectionPolicy>> {
    let content = fs::read_to_string(path)
        .map_err(|e| TriageError::io_error_with_source("read flake config", path.to_path_buf(), e))?;
    parse_flake_config(&content).map_err(|err| match err {
        TriageError::ConfigError {
            message, source, ..
        } => TriageError::ConfigError {
            message,
            path: Some(path.to_path_buf()),
            source,
        },
        other => other,
    })
}

/// First policy covering the triple.
pub fn find_policy<'p>(
    policies: &'p [FlakeDetectionPolicy],
    job_name: &str,
    class_name: &str,
    test_name: &str,
) -> Result<&'p FlakeDetectionPolicy> {
    policies
        .iter()
        .find(|p| p.matches(job_name, class_name, test_name))
        .ok_or_else(|| TriageError::no_policy_match(job_name, class_name, test_name))
}

/// Gates a job's failures against the flake policies.
pub struct FlakeChecker<'a, R: RatioSource> {
    job_name: &'a str,
    ratios: &'a R,
}

impl<'a, R: RatioSource> FlakeChecker<'a, R> {
    pub fn new(job_name: &'a str, ratios: &'a R) -> Self {
        Self { job_name, ratios }
    }

    /// Succeeds only when every failed test is a tolerated flake. Stops at
    /// the first test that is not.
    pub fn check_failed_tests(
        &self,
        failed: &[TestCase],
        policies: &[FlakeDetectionPolicy],
    ) -> Result<()> {
        if failed.is_empty() {
            return Err(TriageError::NoFailedTests);
        }

        for test in failed {
            tracing::info!(job = %self.job_name, class = %test.suite, test = %test.name, "checking failed test");
            let policy = find_policy(policies, self.job_name, &test.suite, &test.name)?;
            let config = policy.config();
            tracing::info!(
                job_regex = %config.job_name_regex,
                class = %config.class_name,
                test_regex = %config.test_name_regex,
                "match found"
            );

            let ratio = self
                .ratios
                .ratio_for_test(config, &test.name)
                .map_err(|err| match err {
                    lookup @ TriageError::RatioLookup { .. } => lookup,
                    other => TriageError::RatioLookup {
                        message: other.to_string(),
                        source: Some(Box::new(other)),
                    },
                })?;

            if ratio.total_runs < MIN_HISTORICAL_RUNS {
                return Err(TriageError::InsufficientHistory {
                    total_runs: ratio.total_runs,
                    required: MIN_HISTORICAL_RUNS,
                });
            }
            if ratio.fail_ratio > config.ratio_threshold {
                return Err(TriageError::RatioAboveThreshold {
                    fail_ratio: ratio.fail_ratio,
                    threshold: config.ratio_threshold,
                });
            }

            tracing::info!(
                test = %test.name,
                fail_ratio = ratio.fail_ratio,
                threshold = config.ratio_threshold,
                "failure will be suppressed, ratio within allowed threshold"
            );
        }
        Ok(())
    }
}
