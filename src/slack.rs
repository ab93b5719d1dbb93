//! Slack attachment payload announcing a run's failures.

use crate::error::Result;
use crate::triage::TestIssue;
use serde::Serialize;

/// Slack caps header text at 150 characters.
pub const HEADER_TEXT_LIMIT: usize = 150;
/// Slack caps non-field text objects at 3000 characters.
pub const TEXT_LIMIT: usize = 3000;
/// Failure attachments after which no more are added.
pub const MAX_FAILURE_ATTACHMENTS: usize = 4;
const FAILURE_COLOR: &str = "#bb2124";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub color: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { text: TextObject },
    Section { text: TextObject },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: TextKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    PlainText,
    Mrkdwn,
}

impl Block {
    fn header(text: impl Into<String>) -> Self {
        Self::Header {
            text: TextObject {
                kind: TextKind::PlainText,
                text: text.into(),
            },
        }
    }

    fn plain(text: impl Into<String>) -> Self {
        Self::Section {
            text: TextObject {
                kind: TextKind::PlainText,
                text: text.into(),
            },
        }
    }

    fn label(text: &str) -> Self {
        Self::Section {
            text: TextObject {
                kind: TextKind::Mrkdwn,
                text: text.to_string(),
            },
        }
    }
}

/// Shortens `s` to fewer than `limit` characters, marking the cut with `…`.
pub fn crop(s: &str, limit: usize) -> String {
    if s.chars().count() < limit {
        return s.to_string();
    }
    let kept: String = s.chars().take(limit.saturating_sub(1)).collect();
    format!("{}…", kept)
}

/// A summary attachment listing every issue, followed by details for the
/// first few failures.
pub fn attachments(issues: &[TestIssue]) -> Vec<Attachment> {
    let mut titles = Vec::new();
    let mut failures = Vec::new();

    for issue in issues {
        let tc = &issue.test_case;
        let title = crop(
            &format!("{}: {}: {}", issue.issue.key, tc.suite, tc.name),
            HEADER_TEXT_LIMIT,
        );
        titles.push(Block::plain(title.clone()));

        match failure_attachment(&title, &tc.message, &tc.error) {
            Some(attachment) => failures.push(attachment),
            None => {
                tracing::debug!(test = %tc.name, "skipping slack attachment, no failure message or error");
                continue;
            }
        }
        if failures.len() >= MAX_FAILURE_ATTACHMENTS {
            break;
        }
    }

    if titles.is_empty() {
        return Vec::new();
    }

    titles.insert(0, Block::header("Failed tests"));
    let mut out = vec![Attachment {
        color: FAILURE_COLOR.to_string(),
        blocks: titles,
    }];
    out.extend(failures);
    out
}

fn failure_attachment(title: &str, message: &str, error: &str) -> Option<Attachment> {
    let value = if error == message { "" } else { error };
    if message.is_empty() && value.is_empty() {
        return None;
    }

    let mut blocks = vec![Block::header(title)];
    if message.is_empty() {
        blocks.push(Block::label("*Info*"));
        blocks.push(Block::plain(crop(value, TEXT_LIMIT)));
    } else {
        blocks.push(Block::label("*Message*"));
        blocks.push(Block::plain(crop(message, TEXT_LIMIT)));
        if !value.is_empty() {
            blocks.push(Block::label("*Additional Info*"));
            blocks.push(Block::plain(crop(value, TEXT_LIMIT)));
        }
    }
    Some(Attachment {
        color: FAILURE_COLOR.to_string(),
        blocks,
    })
}

/// The attachments as a JSON array; `[]` when there are no issues.
pub fn render(issues: &[TestIssue]) -> Result<String> {
    Ok(serde_json::to_string(&attachments(issues))?)
}
