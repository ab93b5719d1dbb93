//! Failing-test extraction.
//!
//! [`SuiteWalker`] turns a parsed report tree into the flat, ordered list of
//! [`TestCase`]s that the rest of the tool files tickets for. It owns the
//! three policies applied to every report: known-noise tests on the ignore
//! list are dropped, missing names are replaced with fallbacks, and Go
//! subtests (`Parent/Child`) are folded into their parent's failure.

use crate::error::Result;
use crate::junit::{self, Suite, Test};
use std::path::Path;

/// Substituted for an empty test name.
pub const FALLBACK_NAME: &str = "fallback-name";
/// Substituted for an empty class name.
pub const FALLBACK_CLASSNAME: &str = "fallback-classname";
/// Module path whose tests are run by `go test` and report subtests.
pub const DEFAULT_SUBTEST_MODULE_PREFIX: &str = "github.com/stackrox/rox";

/// One failing test, possibly carrying the output of its failed subtests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    /// Owning class, package or suite.
    pub suite: String,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    pub error: String,
}

impl TestCase {
    /// Creates an empty test case. Empty identifiers are replaced with
    /// [`FALLBACK_NAME`] and [`FALLBACK_CLASSNAME`].
    pub fn new(name: impl Into<String>, suite: impl Into<String>) -> Self {
        Self {
            name: non_empty_or(name.into(), FALLBACK_NAME),
            suite: non_empty_or(suite.into(), FALLBACK_CLASSNAME),
            ..Self::default()
        }
    }

    /// Builds a test case from a parsed test.
    pub fn from_test(test: &Test) -> Self {
        Self {
            message: test.message.clone(),
            stdout: test.system_out.clone(),
            stderr: test.system_err.clone(),
            error: error_text(test).to_string(),
            ..Self::new(test.name.as_str(), test.classname.as_str())
        }
    }

    /// Appends a subtest's output under a `Sub test <name>:` header. Fields
    /// that are empty on the subtest are left alone.
    pub fn merge_subtest(&mut self, subtest: &Test) {
        append_section(&mut self.message, &subtest.name, &subtest.message);
        append_section(&mut self.stdout, &subtest.name, &subtest.system_out);
        append_section(&mut self.stderr, &subtest.name, &subtest.system_err);
        append_section(&mut self.error, &subtest.name, error_text(subtest));
    }
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn error_text(test: &Test) -> &str {
    test.error.as_ref().map_or("", |e| e.body.as_str())
}

fn append_section(field: &mut String, subtest_name: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    field.push_str("\nSub test ");
    field.push_str(subtest_name);
    field.push_str(": ");
    field.push_str(text);
}

/// A test that is dropped from every report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IgnoreEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub classname: String,
}

impl IgnoreEntry {
    pub fn new(name: impl Into<String>, classname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classname: classname.into(),
        }
    }

    fn matches(&self, test: &Test) -> bool {
        self.name == test.name && self.classname == test.classname
    }
}

/// Entries always ignored. `go test` emits a nameless `runtime.MemStats`
/// failure for every crashed package.
pub fn default_ignore_list() -> Vec<IgnoreEntry> {
    vec![IgnoreEntry::new("", "runtime.MemStats")]
}

/// Decides which classnames may carry `Parent/Child` subtests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtestPolicy {
    pub module_prefix: String,
}

impl Default for SubtestPolicy {
    fn default() -> Self {
        Self {
            module_prefix: DEFAULT_SUBTEST_MODULE_PREFIX.to_string(),
        }
    }
}

impl SubtestPolicy {
    pub fn new(module_prefix: impl Into<String>) -> Self {
        Self {
            module_prefix: module_prefix.into(),
        }
    }

    /// Returns the parent name when `test` is a subtest eligible for merging.
    fn parent_of<'t>(&self, test: &'t Test) -> Option<&'t str> {
        if !test.classname.starts_with(&self.module_prefix) {
            return None;
        }
        test.name.split_once('/').map(|(parent, _)| parent)
    }
}

/// Walks report trees applying the ignore list, fallback names and subtest
/// merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteWalker {
    ignore: Vec<IgnoreEntry>,
    subtests: SubtestPolicy,
}

impl Default for SuiteWalker {
    fn default() -> Self {
        Self::new(default_ignore_list(), SubtestPolicy::default())
    }
}

impl SuiteWalker {
    pub fn new(ignore: Vec<IgnoreEntry>, subtests: SubtestPolicy) -> Self {
        Self { ignore, subtests }
    }

    /// Ingests the reports at `path` and clears the resulting suites.
    pub fn load(&self, path: &Path) -> Result<Vec<Suite>> {
        let suites = junit::ingest(path)?;
        Ok(self.clear_suites(suites))
    }

    /// Drops ignored tests, fills in fallback names and removes suites left
    /// with neither tests nor child suites.
    pub fn clear_suites(&self, suites: Vec<Suite>) -> Vec<Suite> {
        suites
            .into_iter()
            .filter_map(|suite| self.clear_suite(suite))
            .collect()
    }

    fn clear_suite(&self, mut suite: Suite) -> Option<Suite> {
        suite.suites = self.clear_suites(std::mem::take(&mut suite.suites));
        suite.tests.retain(|test| {
            let ignored = self.ignore.iter().any(|entry| entry.matches(test));
            if ignored {
                tracing::debug!(name = %test.name, classname = %test.classname, "ignoring test");
            }
            !ignored
        });
        for test in &mut suite.tests {
            if test.name.is_empty() {
                test.name = FALLBACK_NAME.to_string();
            }
            if test.classname.is_empty() {
                test.classname = FALLBACK_CLASSNAME.to_string();
            }
        }
        (!suite.is_empty()).then_some(suite)
    }

    /// Extracts failing tests in report order, child suites before the
    /// suite's own tests. The ignore list is not applied here; pass suites
    /// through [`SuiteWalker::clear_suites`] first to drop ignored tests.
    pub fn failed_tests(&self, suites: &[Suite]) -> Vec<TestCase> {
        let mut failed = Vec::new();
        for suite in suites {
            self.collect_failed(suite, &mut failed);
        }
        failed
    }

    fn collect_failed(&self, suite: &Suite, failed: &mut Vec<TestCase>) {
        for child in &suite.suites {
            self.collect_failed(child, failed);
        }
        for test in suite.tests.iter().filter(|t| t.is_failing()) {
            self.add_failed_test(test, failed);
        }
    }

    fn add_failed_test(&self, test: &Test, failed: &mut Vec<TestCase>) {
        if let Some(parent_name) = self.subtests.parent_of(test) {
            if let Some(parent) = failed
                .iter_mut()
                .find(|tc| tc.name == parent_name && tc.suite == test.classname)
            {
                tracing::debug!(subtest = %test.name, parent = %parent_name, "merging subtest");
                parent.merge_subtest(test);
                return;
            }
        }
        failed.push(TestCase::from_test(test));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GO_PKG: &str = "github.com/stackrox/rox/pkg/x";

    fn suite(name: &str, tests: Vec<Test>) -> Suite {
        Suite {
            name: name.to_string(),
            suites: vec![],
            tests,
        }
    }

    fn failing(name: &str, classname: &str, message: &str) -> Test {
        Test::new(name, classname).with_failure(message, "")
    }

    #[test]
    fn test_testcase_new_substitutes_fallbacks() {
        let tc = TestCase::new("", "");
        assert_eq!(tc.name, FALLBACK_NAME);
        assert_eq!(tc.suite, FALLBACK_CLASSNAME);
    }

    #[test]
    fn test_from_test_copies_diagnostics() {
        let mut test = Test::new("TestA", "pkg").with_failure("msg", "trace");
        test.system_out = "out".to_string();
        test.system_err = "err".to_string();
        let tc = TestCase::from_test(&test);
        assert_eq!(
            tc,
            TestCase {
                name: "TestA".to_string(),
                suite: "pkg".to_string(),
                message: "msg".to_string(),
                stdout: "out".to_string(),
                stderr: "err".to_string(),
                error: "trace".to_string(),
            }
        );
    }

    #[test]
    fn test_failed_tests_merges_subtest_into_parent() {
        let walker = SuiteWalker::default();
        let suites = walker.clear_suites(vec![suite(
            "s",
            vec![
                failing("Foo", GO_PKG, "parent failed"),
                failing("Foo/Bar", GO_PKG, "bar failed"),
            ],
        )]);

        let failed = walker.failed_tests(&suites);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "Foo");
        assert_eq!(failed[0].message, "parent failed\nSub test Foo/Bar: bar failed");
    }

    #[test]
    fn test_merge_skips_empty_fields_and_keeps_full_name() {
        let walker = SuiteWalker::default();
        let mut sub = Test::new("a/b/c", GO_PKG).with_failure("", "panic");
        sub.system_out = "log line".to_string();
        let suites = vec![suite("s", vec![failing("a", GO_PKG, "m"), sub])];

        let failed = walker.failed_tests(&suites);
        assert_eq!(failed.len(), 1);
        let tc = &failed[0];
        assert_eq!(tc.message, "m");
        assert_eq!(tc.stdout, "\nSub test a/b/c: log line");
        assert_eq!(tc.stderr, "");
        assert_eq!(tc.error, "\nSub test a/b/c: panic");
    }

    #[test]
    fn test_subtest_without_module_prefix_is_independent() {
        let walker = SuiteWalker::default();
        let suites = vec![suite(
            "s",
            vec![failing("Foo", "pkg/x", "a"), failing("Foo/Bar", "pkg/x", "b")],
        )];

        let failed = walker.failed_tests(&suites);
        let names: Vec<_> = failed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Foo", "Foo/Bar"]);
    }

    #[test]
    fn test_subtest_without_matching_parent_is_independent() {
        let walker = SuiteWalker::default();
        let other_pkg = "github.com/stackrox/rox/pkg/y";
        let suites = vec![suite(
            "s",
            vec![
                failing("Foo", GO_PKG, "a"),
                failing("Foo/Bar", other_pkg, "b"),
                failing("Baz/Qux", GO_PKG, "c"),
            ],
        )];

        let failed = walker.failed_tests(&suites);
        let names: Vec<_> = failed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Foo", "Foo/Bar", "Baz/Qux"]);
        assert_eq!(failed[0].message, "a");
    }

    #[test]
    fn test_configured_module_prefix_enables_merge() {
        let walker = SuiteWalker::new(default_ignore_list(), SubtestPolicy::new("pkg/"));
        let suites = vec![suite(
            "s",
            vec![failing("Foo", "pkg/x", "a"), failing("Foo/Bar", "pkg/x", "b")],
        )];
        assert_eq!(walker.failed_tests(&suites).len(), 1);
    }

    #[test]
    fn test_child_suites_come_before_own_tests() {
        let walker = SuiteWalker::default();
        let mut parent = suite("parent", vec![failing("Own", "c", "")]);
        parent.suites.push(suite("child", vec![failing("Child", "c", "")]));

        let failed = walker.failed_tests(&[parent]);
        let names: Vec<_> = failed.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Child", "Own"]);
    }

    #[test]
    fn test_passing_and_skipped_tests_are_not_failed() {
        let walker = SuiteWalker::default();
        let mut skipped = Test::new("Skip", "c");
        skipped.status = crate::junit::TestStatus::Skipped;
        let suites = vec![suite("s", vec![Test::new("Pass", "c"), skipped])];
        assert!(walker.failed_tests(&suites).is_empty());
    }

    #[test]
    fn test_clear_suites_drops_ignored_and_empty_suites() {
        let walker = SuiteWalker::default();
        let mut root = suite("root", vec![Test::new("kept", "c")]);
        root.suites.push(suite(
            "only-noise",
            vec![failing("", "runtime.MemStats", "exit status 2")],
        ));

        let cleared = walker.clear_suites(vec![root, suite("empty", vec![])]);
        assert_eq!(cleared.len(), 1);
        assert!(cleared[0].suites.is_empty());
        assert_eq!(cleared[0].tests.len(), 1);
        assert!(walker.failed_tests(&cleared).is_empty());
    }

    #[test]
    fn test_clear_suites_fills_fallbacks_for_passing_tests() {
        let walker = SuiteWalker::default();
        let cleared = walker.clear_suites(vec![suite("s", vec![Test::new("", "")])]);
        assert_eq!(cleared[0].tests[0].name, FALLBACK_NAME);
        assert_eq!(cleared[0].tests[0].classname, FALLBACK_CLASSNAME);
    }

    #[test]
    fn test_clear_suites_honours_extra_ignore_entries() {
        let mut ignore = default_ignore_list();
        ignore.push(IgnoreEntry::new("TestNoise", "pkg"));
        let walker = SuiteWalker::new(ignore, SubtestPolicy::default());
        let cleared = walker.clear_suites(vec![suite(
            "s",
            vec![failing("TestNoise", "pkg", ""), failing("TestReal", "pkg", "")],
        )]);
        let failed = walker.failed_tests(&cleared);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "TestReal");
    }

    fn arb_test() -> impl Strategy<Value = Test> {
        (
            prop_oneof![Just(String::new()), "[a-zA-Z/]{1,8}"],
            prop_oneof![
                Just(String::new()),
                Just("runtime.MemStats".to_string()),
                Just(GO_PKG.to_string()),
                "[a-z.]{1,8}",
            ],
            any::<bool>(),
        )
            .prop_map(|(name, classname, fails)| {
                let test = Test::new(name, classname);
                if fails { test.with_failure("m", "e") } else { test }
            })
    }

    fn arb_suite() -> impl Strategy<Value = Suite> {
        let leaf = prop::collection::vec(arb_test(), 0..5).prop_map(|tests| Suite {
            name: "leaf".to_string(),
            suites: vec![],
            tests,
        });
        leaf.prop_recursive(3, 24, 4, |inner| {
            (
                prop::collection::vec(inner, 0..4),
                prop::collection::vec(arb_test(), 0..4),
            )
                .prop_map(|(suites, tests)| Suite {
                    name: "node".to_string(),
                    suites,
                    tests,
                })
        })
    }

    fn all_tests(suites: &[Suite]) -> Vec<&Test> {
        suites
            .iter()
            .flat_map(|s| {
                let mut tests = all_tests(&s.suites);
                tests.extend(s.tests.iter());
                tests
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_failed_tests_never_have_empty_identifiers(suites in prop::collection::vec(arb_suite(), 0..3)) {
            let walker = SuiteWalker::default();
            let cleared = walker.clear_suites(suites);
            for tc in walker.failed_tests(&cleared) {
                prop_assert!(!tc.name.is_empty());
                prop_assert!(!tc.suite.is_empty());
            }
            for test in all_tests(&cleared) {
                prop_assert!(!test.name.is_empty());
                prop_assert!(!test.classname.is_empty());
            }
        }

        #[test]
        fn prop_ignored_tests_never_surface(suites in prop::collection::vec(arb_suite(), 0..3)) {
            let walker = SuiteWalker::default();
            let cleared = walker.clear_suites(suites);
            prop_assert!(all_tests(&cleared)
                .iter()
                .all(|t| !(t.name.is_empty() && t.classname == "runtime.MemStats")));
            for tc in walker.failed_tests(&cleared) {
                prop_assert!(!(tc.name == FALLBACK_NAME && tc.suite == "runtime.MemStats"));
            }
        }

        #[test]
        fn prop_cleared_tree_has_no_empty_suites(suites in prop::collection::vec(arb_suite(), 0..3)) {
            fn check(suites: &[Suite]) -> bool {
                suites.iter().all(|s| !s.is_empty() && check(&s.suites))
            }
            let cleared = SuiteWalker::default().clear_suites(suites);
            prop_assert!(check(&cleared));
        }
    }
}
