//! Historical failure ratios from the CI metrics warehouse.

use crate::error::{Result, TriageError};
use crate::flake::FlakePolicyConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BIGQUERY_PROJECT: &str = "acs-san-stackroxci";
pub const DEFAULT_BIGQUERY_TABLE: &str =
    "acs-san-stackroxci.ci_metrics.stackrox_tests__recent_flaky_tests";
const BIGQUERY_API: &str = "https://bigquery.googleapis.com/bigquery/v2";
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Recorded runs and failure percentage of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlakeRatio {
    pub total_runs: i64,
    pub fail_ratio: i64,
}

/// Looks up how often a test historically failed.
pub trait RatioSource {
    /// Ratio for `test_name` in the policy's ratio job and class.
    fn ratio_for_test(&self, policy: &FlakePolicyConfig, test_name: &str) -> Result<FlakeRatio>;
}

/// Queries BigQuery through the `jobs.query` REST endpoint.
pub struct BigQueryClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    table: String,
    token: String,
}

impl BigQueryClient {
    /// # Arguments
    /// * `project` - Project billed for the query.
    /// * `table` - Fully qualified table holding recent flaky tests.
    /// * `token` - OAuth access token, e.g. from `gcloud auth print-access-token`.
    pub fn new(project: &str, table: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("junit2jira/", env!("CARGO_PKG_VERSION")))
            .timeout(QUERY_TIMEOUT)
            .build()
            .map_err(|e| TriageError::RatioLookup {
                message: "creating BigQuery client".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            endpoint: format!("{}/projects/{}/queries", BIGQUERY_API, project),
            table: table.into(),
            token: token.into(),
        })
    }

    fn query_text(&self) -> String {
        format!(
            "SELECT TotalAll, FailRatio FROM `{}` \
             WHERE JobName = @jobName AND Classname = @className AND Name = @testName",
            self.table
        )
    }
}

impl RatioSource for BigQueryClient {
    #[tracing::instrument(level = "debug", skip(self, policy), fields(job = %policy.ratio_job_name, class = %policy.class_name))]
    fn ratio_for_test(&self, policy: &FlakePolicyConfig, test_name: &str) -> Result<FlakeRatio> {
        let request = QueryRequest {
            query: self.query_text(),
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            timeout_ms: QUERY_TIMEOUT.as_millis() as u64,
            query_parameters: vec![
                QueryParameter::string("jobName", &policy.ratio_job_name),
                QueryParameter::string("className", &policy.class_name),
                QueryParameter::string("testName", test_name),
            ],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .map_err(|e| TriageError::RatioLookup {
                message: "query data from BigQuery".to_string(),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TriageError::ratio_lookup(format!(
                "BigQuery returned {}: {}",
                status, body
            )));
        }

        let body: QueryResponse = response.json().map_err(|e| TriageError::RatioLookup {
            message: "decode BigQuery response".to_string(),
            source: Some(Box::new(e)),
        })?;
        ratio_from_response(body, test_name)
    }
}

fn ratio_from_response(body: QueryResponse, test_name: &str) -> Result<FlakeRatio> {
    if !body.job_complete {
        return Err(TriageError::ratio_lookup(
            "BigQuery query did not complete within the timeout",
        ));
    }

    let row_count = body.rows.len();
    let Some(row) = body.rows.into_iter().next() else {
        return Err(TriageError::ratio_lookup(format!(
            "no historical data for test {:?}",
            test_name
        )));
    };
    if row_count > 1 {
        tracing::warn!(rows = row_count, test = %test_name, "expected one row in DB, using the first");
    }

    match row.f.as_slice() {
        [total, ratio, ..] => Ok(FlakeRatio {
            total_runs: total.as_i64()?,
            fail_ratio: ratio.as_i64()?,
        }),
        _ => Err(TriageError::ratio_lookup("BigQuery row is missing columns")),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    query: String,
    use_legacy_sql: bool,
    parameter_mode: &'static str,
    timeout_ms: u64,
    query_parameters: Vec<QueryParameter>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryParameter {
    name: &'static str,
    parameter_type: ParameterType,
    parameter_value: ParameterValue,
}

impl QueryParameter {
    fn string(name: &'static str, value: &str) -> Self {
        Self {
            name,
            parameter_type: ParameterType { kind: "STRING" },
            parameter_value: ParameterValue {
                value: value.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ParameterType {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ParameterValue {
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    f: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    v: serde_json::Value,
}

impl Cell {
    /// BigQuery encodes integers as JSON strings.
    fn as_i64(&self) -> Result<i64> {
        let parsed = match &self.v {
            serde_json::Value::String(s) => s
                .parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.round() as i64)),
            serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            _ => None,
        };
        parsed.ok_or_else(|| {
            TriageError::ratio_lookup(format!("unexpected BigQuery cell value: {}", self.v))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> QueryResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_ratio_from_single_row() {
        let body = parse(r#"{"jobComplete":true,"totalRows":"1","rows":[{"f":[{"v":"31"},{"v":"4"}]}]}"#);
        assert_eq!(
            ratio_from_response(body, "t").unwrap(),
            FlakeRatio {
                total_runs: 31,
                fail_ratio: 4
            }
        );
    }

    #[test]
    fn test_ratio_uses_first_of_many_rows() {
        let body = parse(
            r#"{"jobComplete":true,"rows":[{"f":[{"v":"40"},{"v":"2.6"}]},{"f":[{"v":"1"},{"v":"1"}]}]}"#,
        );
        let ratio = ratio_from_response(body, "t").unwrap();
        assert_eq!(ratio.total_runs, 40);
        assert_eq!(ratio.fail_ratio, 3);
    }

    #[test]
    fn test_ratio_zero_rows_is_lookup_error() {
        let body = parse(r#"{"jobComplete":true,"totalRows":"0"}"#);
        let err = ratio_from_response(body, "TestX").unwrap_err();
        assert_eq!(err.name(), "RatioLookup");
        assert!(err.to_string().contains("TestX"));
    }

    #[test]
    fn test_ratio_incomplete_job_is_lookup_error() {
        let body = parse(r#"{"jobComplete":false}"#);
        assert!(ratio_from_response(body, "t").is_err());
    }

    #[test]
    fn test_ratio_rejects_null_cells() {
        let body = parse(r#"{"jobComplete":true,"rows":[{"f":[{"v":null},{"v":"1"}]}]}"#);
        assert!(ratio_from_response(body, "t").is_err());
    }

    #[test]
    fn test_query_request_serializes_named_parameters() {
        let request = QueryRequest {
            query: "SELECT 1".to_string(),
            use_legacy_sql: false,
            parameter_mode: "NAMED",
            timeout_ms: 60000,
            query_parameters: vec![QueryParameter::string("jobName", "main")],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["useLegacySql"], false);
        assert_eq!(json["parameterMode"], "NAMED");
        assert_eq!(json["queryParameters"][0]["name"], "jobName");
        assert_eq!(json["queryParameters"][0]["parameterType"]["type"], "STRING");
        assert_eq!(json["queryParameters"][0]["parameterValue"]["value"], "main");
    }
}
