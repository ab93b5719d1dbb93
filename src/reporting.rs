use crate::error::Result;
use crate::triage::TestIssue;
use prettytable::{Cell, Row, Table, format};
use serde::Serialize;

/// Machine-readable outcome of a report run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    #[serde(rename = "newJIRAs")]
    pub new_jiras: usize,
}

impl RunSummary {
    pub fn from_issues(issues: &[TestIssue]) -> Self {
        Self {
            new_jiras: issues.iter().filter(|i| i.new_jira).count(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn box_format() -> format::TableFormat {
    format::FormatBuilder::new()
        .column_separator('│')
        .borders('│')
        .separators(
            &[format::LinePosition::Top],
            format::LineSeparator::new('─', '┬', '┌', '┐'),
        )
        .separators(
            &[format::LinePosition::Intern],
            format::LineSeparator::new('─', '┼', '├', '┤'),
        )
        .separators(
            &[format::LinePosition::Bottom],
            format::LineSeparator::new('─', '┴', '└', '┘'),
        )
        .padding(1, 1)
        .build()
}

/// Renders the issues of a run as a terminal table.
pub fn triage_table(issues: &[TestIssue]) -> String {
    let mut table = Table::new();
    table.set_format(box_format());

    table.add_row(Row::new(vec![
        Cell::new("Issue"),
        Cell::new("Status"),
        Cell::new("Suite"),
        Cell::new("Test"),
    ]));

    for issue in issues {
        let status = if issue.new_jira { "new" } else { "commented" };
        table.add_row(Row::new(vec![
            Cell::new(&issue.issue.key),
            Cell::new(status),
            Cell::new(&issue.test_case.suite),
            Cell::new(&issue.test_case.name),
        ]));
    }

    table.to_string()
}
