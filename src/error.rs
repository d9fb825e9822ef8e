//! Error types for the verification harness
//!
//! `ApiError` covers the HTTP boundary with the analysis service.
//! `HarnessError` is the crate-level error wrapping it together with
//! configuration, IO and serialization failures.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Analysis service unreachable at {base_url}: {reason}")]
    ServiceUnavailable { base_url: String, reason: String },

    #[error("Log sink error ({target}): {message}")]
    Sink { target: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HarnessError {
    pub fn config(message: impl Into<String>) -> Self {
        HarnessError::Config {
            message: message.into(),
        }
    }
}

/// Errors raised while talking to the analysis service.
///
/// A client-error answer to a submission is not an `ApiError`: it is the
/// input-rejected outcome and is returned as data by `AnalysisApi::submit`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("HTTP request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Unexpected HTTP {status} from {endpoint}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Job '{job_id}' not found")]
    JobNotFound { job_id: String },

    #[error("Malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Submission accepted but no job_id was returned")]
    MissingJobId,
}

impl ApiError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::UnexpectedStatus { status, .. } => Some(*status),
            ApiError::JobNotFound { .. } => Some(404),
            _ => None,
        }
    }
}
