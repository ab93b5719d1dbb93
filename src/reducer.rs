//! Collapses a flood of failures into a single ticket.

use crate::format::{self, TextLimits};
use crate::testcase::TestCase;

/// Returns `failed` unchanged unless it holds more than `threshold` tests,
/// in which case a single test case listing every failure's summary is
/// returned instead. A threshold of zero disables the collapse.
///
/// The aggregate keeps the common suite when all failures share one and
/// falls back to `job_name` otherwise.
pub fn reduce_failures(
    failed: Vec<TestCase>,
    threshold: usize,
    job_name: &str,
    limits: &TextLimits,
) -> Vec<TestCase> {
    if threshold == 0 || failed.len() <= threshold {
        return failed;
    }

    tracing::warn!(
        failed = failed.len(),
        threshold,
        "too many failed tests, reporting them as one failure"
    );

    let first_suite = failed[0].suite.as_str();
    let suite = if failed.iter().all(|tc| tc.suite == first_suite) {
        first_suite
    } else {
        job_name
    };

    let mut aggregate = TestCase::new("", suite);
    for tc in &failed {
        aggregate.message.push_str(&format::summary(tc, limits));
        aggregate.message.push('\n');
    }
    vec![aggregate]
}
