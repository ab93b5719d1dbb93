//! Error types for junit2jira.
//!
//! Every fallible operation in the library returns [`TriageError`]. The
//! variants follow the failure taxonomy of the tool: configuration and
//! input problems are fatal, flake-gate decisions carry the reason the gate
//! refused, and issue-tracker failures are gathered by [`ErrorCollector`] so
//! one broken ticket does not block the rest.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// The main error type for junit2jira operations.
#[derive(Debug)]
pub enum TriageError {
    /// A JUnit report could not be parsed.
    ParseError {
        /// The report file that failed to parse.
        file: Option<PathBuf>,
        /// Context about what was being parsed.
        context: String,
        /// The underlying error.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An error occurred during file system operations.
    IoError {
        /// The operation being performed.
        operation: String,
        /// The path involved in the error.
        path: Option<PathBuf>,
        /// The underlying IO error.
        source: Option<io::Error>,
    },

    /// An error occurred while loading or validating configuration.
    ConfigError {
        /// Description of the configuration issue.
        message: String,
        /// The config file path, if applicable.
        path: Option<PathBuf>,
        /// The underlying error.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The reports contained no failing test, so there is nothing to gate on.
    NoFailedTests,

    /// No flake policy covers a failing test.
    NoPolicyMatch {
        /// The CI job being checked.
        job_name: String,
        /// The failing test's class.
        class_name: String,
        /// The failing test's name.
        test_name: String,
    },

    /// The historical failure ratio could not be retrieved.
    RatioLookup {
        /// Description of the failed lookup.
        message: String,
        /// The underlying error.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The test has too few recorded runs to be trusted as a known flake.
    InsufficientHistory {
        /// Runs on record.
        total_runs: i64,
        /// Runs required.
        required: i64,
    },

    /// The test fails more often than its policy tolerates.
    RatioAboveThreshold {
        /// Observed failure percentage.
        fail_ratio: i64,
        /// Tolerated failure percentage.
        threshold: i64,
    },

    /// A call to the issue tracker failed.
    TrackerError {
        /// The tracker operation, e.g. `create issue`.
        operation: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Response body or description.
        message: String,
        /// The underlying error.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Several independent failures reported together.
    Aggregate(Vec<TriageError>),

    /// An error indicating an invalid argument or input.
    InvalidInput {
        /// Description of the invalid input.
        message: String,
        /// The argument or value that was invalid.
        argument: Option<String>,
    },
}

impl TriageError {
    /// Creates a new `ParseError` with the given context.
    pub fn parse_error(context: impl Into<String>) -> Self {
        Self::ParseError {
            file: None,
            context: context.into(),
            source: None,
        }
    }

    /// Creates a new `IoError` with the given operation description.
    pub fn io_error(operation: impl Into<String>) -> Self {
        Self::IoError {
            operation: operation.into(),
            path: None,
            source: None,
        }
    }

    /// Creates a new `IoError` with a path and underlying error.
    ///
    /// # Arguments
    /// * `operation` - A description of the IO operation being performed.
    /// * `path` - The path involved in the error.
    /// * `source` - The underlying IO error.
    pub fn io_error_with_source(
        operation: impl Into<String>,
        path: PathBuf,
        source: io::Error,
    ) -> Self {
        Self::IoError {
            operation: operation.into(),
            path: Some(path),
            source: Some(source),
        }
    }

    /// Creates a new `ConfigError` with the given message.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
            path: None,
            source: None,
        }
    }

    /// Creates a new `ConfigError` with a file path.
    pub fn config_error_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::ConfigError {
            message: message.into(),
            path: Some(path),
            source: None,
        }
    }

    /// Creates a new `NoPolicyMatch` error for a failing test.
    pub fn no_policy_match(
        job_name: impl Into<String>,
        class_name: impl Into<String>,
        test_name: impl Into<String>,
    ) -> Self {
        Self::NoPolicyMatch {
            job_name: job_name.into(),
            class_name: class_name.into(),
            test_name: test_name.into(),
        }
    }

    /// Creates a new `RatioLookup` error.
    pub fn ratio_lookup(message: impl Into<String>) -> Self {
        Self::RatioLookup {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `TrackerError` from an unsuccessful HTTP response.
    pub fn tracker_status(operation: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::TrackerError {
            operation: operation.into(),
            status: Some(status),
            message: body.into(),
            source: None,
        }
    }

    /// Creates a new `InvalidInput` error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            argument: None,
        }
    }

    /// Creates a new `InvalidInput` error with an argument name.
    pub fn invalid_input_with_arg(message: impl Into<String>, argument: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            argument: Some(argument.into()),
        }
    }

    /// Returns the name of the error variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => "ParseError",
            Self::IoError { .. } => "IoError",
            Self::ConfigError { .. } => "ConfigError",
            Self::NoFailedTests => "NoFailedTests",
            Self::NoPolicyMatch { .. } => "NoPolicyMatch",
            Self::RatioLookup { .. } => "RatioLookup",
            Self::InsufficientHistory { .. } => "InsufficientHistory",
            Self::RatioAboveThreshold { .. } => "RatioAboveThreshold",
            Self::TrackerError { .. } => "TrackerError",
            Self::Aggregate(_) => "Aggregate",
            Self::InvalidInput { .. } => "InvalidInput",
        }
    }

    /// Returns suggested recovery actions for the error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ParseError { .. } => vec![
                "Ensure the report is well-formed JUnit XML".to_string(),
                "Check that the test run finished writing its report".to_string(),
            ],
            Self::IoError { operation, .. } => {
                let mut s = vec![
                    "Check that the path exists and is accessible".to_string(),
                    "Verify you have the necessary permissions".to_string(),
                ];
                if operation.contains("write") || operation.contains("create") {
                    s.push("Ensure the output directory exists".to_string());
                }
                s
            }
            Self::ConfigError { .. } => vec![
                "Check the configuration file syntax".to_string(),
                "Verify every regex in the flake policy compiles".to_string(),
                "Review the documentation for configuration options".to_string(),
            ],
            Self::NoFailedTests => vec![
                "Verify the reports directory points at the failed run".to_string(),
            ],
            Self::NoPolicyMatch { class_name, .. } => vec![format!(
                "Add a flake policy for class '{}' if this failure is a known flake",
                class_name
            )],
            Self::RatioLookup { .. } => vec![
                "Check the metrics warehouse credentials".to_string(),
                "Verify the policy's ratio job name exists in the metrics table".to_string(),
            ],
            Self::InsufficientHistory { .. } => vec![
                "Wait for more historical runs before treating this test as a flake".to_string(),
            ],
            Self::RatioAboveThreshold { .. } => vec![
                "Investigate the test as a regression".to_string(),
                "Raise the policy's ratio threshold only if the flake rate is accepted".to_string(),
            ],
            Self::TrackerError { status, .. } => {
                let mut s = vec!["Check the JIRA URL and project".to_string()];
                if matches!(status, Some(401) | Some(403)) {
                    s.push("Verify JIRA_TOKEN is a valid personal access token".to_string());
                }
                s
            }
            Self::Aggregate(errors) => errors.iter().flat_map(|e| e.suggestions()).collect(),
            Self::InvalidInput { .. } => vec![
                "Review the command-line arguments".to_string(),
                "Verify all required arguments are provided".to_string(),
            ],
        }
    }
}

impl fmt::Display for TriageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError { file, context, .. } => {
                if let Some(file) = file {
                    write!(f, "Parse error in '{}': {}", file.display(), context)
                } else {
                    write!(f, "Parse error: {}", context)
                }
            }
            Self::IoError {
                operation, path, ..
            } => {
                if let Some(p) = path {
                    write!(
                        f,
                        "IO error during '{}' at '{}': operation failed",
                        operation,
                        p.display()
                    )
                } else {
                    write!(f, "IO error during '{}': operation failed", operation)
                }
            }
            Self::ConfigError { message, path, .. } => {
                if let Some(p) = path {
                    write!(f, "Configuration error in '{}': {}", p.display(), message)
                } else {
                    write!(f, "Configuration error: {}", message)
                }
            }
            Self::NoFailedTests => write!(f, "no failed tests to process"),
            Self::NoPolicyMatch {
                job_name,
                class_name,
                test_name,
            } => write!(
                f,
                "test does not match any allowed flakes: {:?} / {:?} / {:?}",
                job_name, class_name, test_name
            ),
            Self::RatioLookup { message, .. } => {
                write!(f, "retrieving ratio for test failed: {}", message)
            }
            Self::InsufficientHistory { total_runs, .. } => write!(
                f,
                "not enough historical test runs to compute flakiness: {}",
                total_runs
            ),
            Self::RatioAboveThreshold {
                fail_ratio,
                threshold,
            } => write!(
                f,
                "flake ratio for test is above allowed threshold: ({} > {})",
                fail_ratio, threshold
            ),
            Self::TrackerError {
                operation,
                status,
                message,
                ..
            } => {
                if let Some(status) = status {
                    write!(f, "JIRA {} failed with status {}: {}", operation, status, message)
                } else {
                    write!(f, "JIRA {} failed: {}", operation, message)
                }
            }
            Self::Aggregate(errors) => {
                write!(f, "{} errors occurred:", errors.len())?;
                for err in errors {
                    write!(f, "\n\t* {}", err)?;
                }
                Ok(())
            }
            Self::InvalidInput { message, argument } => {
                if let Some(arg) = argument {
                    write!(f, "Invalid input '{}': {}", arg, message)
                } else {
                    write!(f, "Invalid input: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for TriageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ParseError { source, .. } => source.as_ref().map(|s| s.as_ref() as _),
            Self::IoError { source, .. } => source.as_ref().map(|e| e as _),
            Self::ConfigError { source, .. } => source.as_ref().map(|s| s.as_ref() as _),
            Self::RatioLookup { source, .. } => source.as_ref().map(|s| s.as_ref() as _),
            Self::TrackerError { source, .. } => source.as_ref().map(|s| s.as_ref() as _),
            Self::Aggregate(errors) => errors.first().map(|e| e as _),
            Self::NoFailedTests
            | Self::NoPolicyMatch { .. }
            | Self::InsufficientHistory { .. }
            | Self::RatioAboveThreshold { .. }
            | Self::InvalidInput { .. } => None,
        }
    }
}

impl From<io::Error> for TriageError {
    fn from(err: io::Error) -> Self {
        Self::IoError {
            operation: "file operation".to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<toml::de::Error> for TriageError {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse TOML: {}", err),
            path: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for TriageError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ConfigError {
            message: format!("Failed to parse YAML: {}", err),
            path: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<regex::Error> for TriageError {
    fn from(err: regex::Error) -> Self {
        Self::ConfigError {
            message: format!("Invalid regex: {}", err),
            path: None,
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for TriageError {
    fn from(err: serde_json::Error) -> Self {
        Self::IoError {
            operation: format!("serialize JSON: {}", err),
            path: None,
            source: Some(err.into()),
        }
    }
}

impl From<csv::Error> for TriageError {
    fn from(err: csv::Error) -> Self {
        Self::IoError {
            operation: format!("write CSV: {}", err),
            path: None,
            source: Some(err.into()),
        }
    }
}

impl From<quick_xml::Error> for TriageError {
    fn from(err: quick_xml::Error) -> Self {
        Self::ParseError {
            file: None,
            context: format!("Failed to parse JUnit XML: {}", err),
            source: Some(Box::new(err)),
        }
    }
}

impl From<reqwest::Error> for TriageError {
    fn from(err: reqwest::Error) -> Self {
        Self::TrackerError {
            operation: "request".to_string(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<walkdir::Error> for TriageError {
    fn from(err: walkdir::Error) -> Self {
        Self::IoError {
            operation: "directory traversal".to_string(),
            path: err.path().map(PathBuf::from),
            source: err.into_io_error(),
        }
    }
}

/// A type alias for `Result<T, TriageError>`.
pub type Result<T> = std::result::Result<T, TriageError>;

/// Gathers independent failures so processing can continue past them.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<TriageError>,
}

impl ErrorCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure.
    pub fn push(&mut self, err: TriageError) {
        self.errors.push(err);
    }

    /// Records the error of `result`, if any, and returns its value.
    pub fn collect<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    /// Absorbs the failures of another collector.
    pub fn extend(&mut self, other: ErrorCollector) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok` when nothing failed, the single error when one did, an
    /// [`TriageError::Aggregate`] otherwise.
    pub fn into_result(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(TriageError::Aggregate(self.errors)),
        }
    }
}
