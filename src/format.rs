//! Ticket text: one-line summaries and JIRA wiki-markup descriptions.

use crate::testcase::TestCase;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const DEFAULT_MAX_SUMMARY_LENGTH: usize = 200;
pub const DEFAULT_MAX_TEXT_BLOCK_LENGTH: usize = 10000;

/// Character limits applied when rendering ticket text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLimits {
    /// Longest `<suite> / <name>` kept in a summary.
    pub summary: usize,
    /// Longest text kept in a description code block.
    pub text_block: usize,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            summary: DEFAULT_MAX_SUMMARY_LENGTH,
            text_block: DEFAULT_MAX_TEXT_BLOCK_LENGTH,
        }
    }
}

/// Facts about the CI run that produced the reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub build_id: String,
    pub build_link: String,
    pub build_tag: String,
    pub base_link: String,
    pub job_name: String,
    pub orchestrator: String,
    /// RFC 3339 time of the run.
    pub timestamp: String,
}

/// Anything but letters (`L`), decimal digits (`Nd`) and `./_-`.
fn unsafe_summary_char() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{Nd}./_-]").expect("summary character class"))
}

/// Replaces every character that is not a letter, decimal digit, `.`, `/`,
/// `-` or `_` with a space. JQL `~` queries choke on the rest.
pub fn clear_string(s: &str) -> String {
    unsafe_summary_char().replace_all(s, " ").into_owned()
}

pub fn truncate_summary(s: &str, max: usize) -> String {
    truncate_with(s, max, "...")
}

pub fn truncate_block(s: &str, max: usize) -> String {
    truncate_with(s, max, "\n … too long, truncated.")
}

fn truncate_with(s: &str, max: usize, marker: &str) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{}", &s[..cut], marker),
        None => s.to_string(),
    }
}

/// `<suite> / <name> FAILED`, truncated and cleared.
pub fn summary(tc: &TestCase, limits: &TextLimits) -> String {
    let title = truncate_summary(&format!("{} / {}", tc.suite, tc.name), limits.summary);
    clear_string(&format!("{} FAILED", title))
}

/// Ticket body: one code block per non-empty diagnostic followed by the
/// build environment table.
pub fn description(tc: &TestCase, build: &BuildInfo, limits: &TextLimits) -> String {
    let mut out = String::new();
    for (title, text) in [
        ("Message", &tc.message),
        ("STDERR", &tc.stderr),
        ("STDOUT", &tc.stdout),
        ("ERROR", &tc.error),
    ] {
        if text.is_empty() {
            continue;
        }
        out.push_str("\n{code:title=");
        out.push_str(title);
        out.push_str("|borderStyle=solid}\n");
        out.push_str(&truncate_block(text, limits.text_block));
        out.push_str("\n{code}");
    }
    out.push_str(&format!(
        "\n\n||    ENV     ||      Value           ||\n\
         | BUILD ID     | [{}|{}]|\n\
         | BUILD TAG    | [{}|{}]|\n\
         | JOB NAME     |{}|\n\
         | ORCHESTRATOR |{}|\n",
        build.build_id,
        build.build_link,
        build.build_tag,
        build.base_link,
        build.job_name,
        build.orchestrator
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build() -> BuildInfo {
        BuildInfo {
            build_id: "1".to_string(),
            build_link: "https://prow/1".to_string(),
            build_tag: "0.0.1".to_string(),
            base_link: "https://github.com/stackrox/stackrox".to_string(),
            job_name: "pr-e2e".to_string(),
            orchestrator: "ocp".to_string(),
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_clear_string_replaces_punctuation_and_escapes() {
        assert_eq!(
            clear_string("a\u{1b}[31mred: {x} ünï-1.2/3_4"),
            "a  31mred   x  ünï-1.2/3_4"
        );
    }

    #[test]
    fn test_clear_string_keeps_only_decimal_digits() {
        assert_eq!(clear_string("x²½Ⅻ٣7"), "x   ٣7");
    }

    #[test]
    fn test_truncate_summary_counts_characters() {
        assert_eq!(truncate_summary("ąęść", 4), "ąęść");
        assert_eq!(truncate_summary("ąęść", 2), "ąę...");
    }

    #[test]
    fn test_truncate_block_appends_marker() {
        assert_eq!(truncate_block("abcdef", 3), "abc\n … too long, truncated.");
        assert_eq!(truncate_block("abc", 3), "abc");
    }

    #[test]
    fn test_summary_format() {
        let tc = TestCase::new("TestFoo/with spaces", "github.com/stackrox/rox/pkg");
        assert_eq!(
            summary(&tc, &TextLimits::default()),
            "github.com/stackrox/rox/pkg / TestFoo/with spaces FAILED"
        );
    }

    #[test]
    fn test_summary_respects_limit() {
        let tc = TestCase::new("name", "suite");
        let limits = TextLimits {
            summary: 5,
            ..TextLimits::default()
        };
        // "suite..." has its dots kept by clear_string.
        assert_eq!(summary(&tc, &limits), "suite... FAILED");
    }

    #[test]
    fn test_description_with_all_blocks() {
        let tc = TestCase {
            name: "n".to_string(),
            suite: "s".to_string(),
            message: "msg".to_string(),
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            error: "trace".to_string(),
        };
        let expected = "\n{code:title=Message|borderStyle=solid}\nmsg\n{code}\
                        \n{code:title=STDERR|borderStyle=solid}\nerr\n{code}\
                        \n{code:title=STDOUT|borderStyle=solid}\nout\n{code}\
                        \n{code:title=ERROR|borderStyle=solid}\ntrace\n{code}\
                        \n\n||    ENV     ||      Value           ||\
                        \n| BUILD ID     | [1|https://prow/1]|\
                        \n| BUILD TAG    | [0.0.1|https://github.com/stackrox/stackrox]|\
                        \n| JOB NAME     |pr-e2e|\
                        \n| ORCHESTRATOR |ocp|\n";
        assert_eq!(description(&tc, &build(), &TextLimits::default()), expected);
    }

    #[test]
    fn test_description_without_diagnostics_is_env_table_only() {
        let tc = TestCase::new("n", "s");
        let desc = description(&tc, &BuildInfo::default(), &TextLimits::default());
        assert!(desc.starts_with("\n\n||    ENV     ||"));
        assert!(desc.contains("| JOB NAME     ||\n"));
        assert!(!desc.contains("{code"));
    }

    #[test]
    fn test_description_truncates_long_blocks() {
        let mut tc = TestCase::new("n", "s");
        tc.stdout = "x".repeat(20);
        let limits = TextLimits {
            text_block: 10,
            ..TextLimits::default()
        };
        let desc = description(&tc, &build(), &limits);
        assert!(desc.contains(&format!("{}\n … too long, truncated.\n{{code}}", "x".repeat(10))));
    }
}
