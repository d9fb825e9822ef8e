//! Wire types for the analysis service HTTP contract.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Body of `POST /analyze`.
///
/// `platform` is a raw string so contract probes can send values outside
/// the closed `Platform` set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzeRequest {
    pub handle: String,
    pub platform: String,
}

impl AnalyzeRequest {
    pub fn new(handle: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            platform: platform.into(),
        }
    }
}

/// `202` body of `POST /analyze`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnalyzeAccepted {
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Opaque job identifier returned by a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a submission attempt that reached the service.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted(JobHandle),
    /// Client error (4xx): the service validated and refused the input.
    Rejected { status: u16, body: String },
}

/// Job state as reported by `GET /status/{job_id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

/// One poll snapshot. Replaced on every status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobState,
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// The result document of a completed job.
///
/// Read-only view over a JSON object; the harness never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReportDocument(Map<String, Value>);

impl ReportDocument {
    /// Build a document from a decoded response body.
    ///
    /// Accepts either the bare report object or the job envelope
    /// `{job_id, report: {...}, completed_at}`. Returns `None` when the body
    /// is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        let enveloped = !map.contains_key("data_completeness")
            && matches!(map.get("report"), Some(Value::Object(_)));
        if enveloped {
            if let Some(Value::Object(inner)) = map.remove("report") {
                return Some(Self(inner));
            }
        }
        Some(Self(map))
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The `data_completeness` tag, if present and a string.
    pub fn completeness(&self) -> Option<&str> {
        self.0.get("data_completeness").and_then(Value::as_str)
    }

    /// `epistemic_state.status` (ROBUST / PARTIAL / FRAGILE). A state block
    /// without a status reads as `UNKNOWN`; no block at all is `None`.
    pub fn epistemic_status(&self) -> Option<&str> {
        let state = self.0.get("epistemic_state")?.as_object()?;
        Some(state.get("status").and_then(Value::as_str).unwrap_or("UNKNOWN"))
    }

    /// Entries of the `evidence_vault` list (empty when absent).
    pub fn evidence(&self) -> &[Value] {
        self.0
            .get("evidence_vault")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
