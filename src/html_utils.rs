use crate::tracker::browse_url;
use crate::triage::TestIssue;
use maud::{DOCTYPE, Markup, PreEscaped, html};

const CSS_STYLES: &str = r#"
body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif;
    margin: 0;
    background-color: #f4f4f4;
    color: #333;
    padding: 20px;
}
h1 {
    color: #333;
    text-align: center;
}
table {
    width: 90%;
    margin: 20px auto;
    border-collapse: collapse;
    box-shadow: 0 2px 15px rgba(0,0,0,0.1);
    background-color: white;
}
th, td {
    border: 1px solid #ddd;
    padding: 10px 12px;
    text-align: left;
}
th {
    background-color: #bb2124;
    color: white;
    font-weight: bold;
    position: relative;
}
tr:nth-child(even) {
    background-color: #f9f9f9;
}
tr:hover {
    background-color: #f1f1f1;
}
.new-issue {
    font-weight: bold;
    color: #bb2124;
}
.sortable-header {
    cursor: pointer;
}
.sortable-header::after {
    content: '\25b2\25bc';
    font-size: 0.9em;
    margin-left: 7px;
    color: #f3b5b8;
    position: absolute;
    right: 8px;
    top: 50%;
    transform: translateY(-50%);
}
.sortable-header.sort-asc::after {
    content: '\25b2';
    color: #ffffff;
}
.sortable-header.sort-desc::after {
    content: '\25bc';
    color: #ffffff;
}
"#;

const TABLE_SORTING_JS: &str = r###"
document.addEventListener('DOMContentLoaded', function() {
    const getCellValue = (tr, idx) =>
        (tr.children[idx].innerText || tr.children[idx].textContent).trim().toLowerCase();

    const comparer = (idx, asc) => (a, b) => {
        const comparison = getCellValue(a, idx).localeCompare(getCellValue(b, idx));
        return asc ? comparison : -comparison;
    };

    document.querySelectorAll('.sortable-table .sortable-header').forEach(th => {
        th.addEventListener('click', (() => {
            const table = th.closest('table');
            const tbody = table.querySelector('tbody');
            if (!tbody) return;

            const columnIndex = parseInt(th.dataset.columnIndex);
            const newAsc = !th.classList.contains('sort-asc');
            table.querySelectorAll('.sortable-header').forEach(otherTh => {
                otherTh.classList.remove('sort-asc', 'sort-desc');
            });
            th.classList.add(newAsc ? 'sort-asc' : 'sort-desc');

            Array.from(tbody.querySelectorAll('tr'))
                .sort(comparer(columnIndex, newAsc))
                .forEach(tr => tbody.appendChild(tr));
        }));
    });
});
"###;

/// Renders a full HTML document with the given title and body markup.
pub fn render_html_doc(title_text: &str, body_content: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title_text) }
                style { (PreEscaped(CSS_STYLES)) }
            }
            body {
                h1 { (title_text) }
                (body_content)
                script { (PreEscaped(TABLE_SORTING_JS)) }
            }
        }
    }
    .into_string()
}

/// Table of the issues a run was reported on, linked to JIRA.
pub fn render_issue_table(issues: &[TestIssue], jira_url: &str) -> Markup {
    let headers = ["Issue", "Summary", "Test", "Status"];
    html! {
        table class="sortable-table" {
            thead {
                tr {
                    @for (idx, header) in headers.iter().enumerate() {
                        th class="sortable-header" data-column-index=(idx) { (header) }
                    }
                }
            }
            tbody {
                @for issue in issues {
                    tr {
                        td { a href=(browse_url(jira_url, &issue.issue.key)) { (issue.issue.key) } }
                        td { (issue.issue.summary) }
                        td { (issue.test_case.suite) " / " (issue.test_case.name) }
                        @if issue.new_jira {
                            td class="new-issue" { "New" }
                        } @else {
                            td { "Commented" }
                        }
                    }
                }
            }
        }
    }
}

/// Standalone HTML report for `issues`.
pub fn render_issue_report(issues: &[TestIssue], jira_url: &str) -> String {
    render_html_doc("CI failures reported to JIRA", render_issue_table(issues, jira_url))
}
