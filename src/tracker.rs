//! Issue tracking service.
//!
//! [`IssueTracker`] is the seam between triage and JIRA; [`JiraClient`]
//! implements it against the JIRA REST v2 API with a personal access token.

use crate::error::{Result, TriageError};
use reqwest::blocking::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_JIRA_URL: &str = "https://issues.redhat.com/";
/// Link type between issues filed for one run. Names vary between JIRA
/// installations.
pub const RELATED_LINK_TYPE: &str = "Related";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// An existing issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub summary: String,
}

/// An issue to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub project: String,
    pub issue_type: String,
    pub summary: String,
    pub description: String,
    pub labels: Vec<String>,
}

/// Operations triage needs from an issue tracker.
pub trait IssueTracker {
    /// Runs a JQL query.
    fn search(&self, jql: &str) -> Result<Vec<Issue>>;
    fn create(&self, issue: &NewIssue) -> Result<Issue>;
    /// Comments on the issue with the given id.
    fn add_comment(&self, issue_id: &str, body: &str) -> Result<()>;
    /// Links two issues by key with [`RELATED_LINK_TYPE`].
    fn add_link(&self, outward_key: &str, inward_key: &str) -> Result<()>;
}

/// JIRA REST v2 client.
pub struct JiraClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: Option<String>,
}

impl JiraClient {
    /// # Arguments
    /// * `base_url` - JIRA root, e.g. `https://issues.redhat.com/`.
    /// * `token` - Personal access token sent as bearer auth.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(TriageError::invalid_input_with_arg(
                "JIRA URL must be http(s)",
                base_url,
            ));
        }
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("junit2jira/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            http,
            base_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    /// Web link to an issue.
    pub fn browse_url(&self, key: &str) -> String {
        browse_url(&self.base_url, key)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}rest/api/2/{}", self.base_url, path)
    }

    fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().map_err(|e| TriageError::TrackerError {
            operation: operation.to_string(),
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        tracing::error!(operation, status = status.as_u16(), %body, "JIRA request failed");
        Err(TriageError::tracker_status(operation, status.as_u16(), body))
    }

    fn send_json<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<T> {
        self.send(operation, request)?
            .json()
            .map_err(|e| TriageError::TrackerError {
                operation: operation.to_string(),
                status: None,
                message: format!("could not decode response: {}", e),
                source: Some(Box::new(e)),
            })
    }
}

/// `<base>/browse/<key>`, tolerating a missing trailing slash on `base`.
pub fn browse_url(base_url: &str, key: &str) -> String {
    format!("{}/browse/{}", base_url.trim_end_matches('/'), key)
}

impl IssueTracker for JiraClient {
    fn search(&self, jql: &str) -> Result<Vec<Issue>> {
        let request = self
            .http
            .get(self.endpoint("search"))
            .query(&[("jql", jql), ("fields", "summary")]);
        let found: SearchResponse = self.send_json("search", request)?;
        Ok(found
            .issues
            .into_iter()
            .map(|wire| Issue {
                id: wire.id,
                key: wire.key,
                summary: wire.fields.summary,
            })
            .collect())
    }

    fn create(&self, issue: &NewIssue) -> Result<Issue> {
        let body = CreateRequest {
            fields: CreateFields {
                project: KeyRef {
                    key: &issue.project,
                },
                summary: &issue.summary,
                description: &issue.description,
                issuetype: NameRef {
                    name: &issue.issue_type,
                },
                labels: &issue.labels,
            },
        };
        let request = self.http.post(self.endpoint("issue")).json(&body);
        let created: CreatedIssue = self.send_json("create issue", request)?;
        Ok(Issue {
            id: created.id,
            key: created.key,
            summary: issue.summary.clone(),
        })
    }

    fn add_comment(&self, issue_id: &str, body: &str) -> Result<()> {
        let request = self
            .http
            .post(self.endpoint(&format!("issue/{}/comment", issue_id)))
            .json(&CommentRequest { body });
        let comment: CreatedComment = self.send_json("add comment", request)?;
        tracing::debug!(issue = %issue_id, comment = %comment.id, "created comment");
        Ok(())
    }

    fn add_link(&self, outward_key: &str, inward_key: &str) -> Result<()> {
        let body = LinkRequest {
            link_type: NameRef {
                name: RELATED_LINK_TYPE,
            },
            inward_issue: KeyRef { key: inward_key },
            outward_issue: KeyRef { key: outward_key },
        };
        let request = self.http.post(self.endpoint("issueLink")).json(&body);
        self.send("link issues", request)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<WireIssue>,
}

#[derive(Debug, Deserialize)]
struct WireIssue {
    id: String,
    key: String,
    #[serde(default)]
    fields: WireFields,
}

#[derive(Debug, Default, Deserialize)]
struct WireFields {
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    id: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct CreatedComment {
    id: String,
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    fields: CreateFields<'a>,
}

#[derive(Debug, Serialize)]
struct CreateFields<'a> {
    project: KeyRef<'a>,
    summary: &'a str,
    description: &'a str,
    issuetype: NameRef<'a>,
    labels: &'a [String],
}

#[derive(Debug, Serialize)]
struct KeyRef<'a> {
    key: &'a str,
}

#[derive(Debug, Serialize)]
struct NameRef<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkRequest<'a> {
    #[serde(rename = "type")]
    link_type: NameRef<'a>,
    inward_issue: KeyRef<'a>,
    outward_issue: KeyRef<'a>,
}
