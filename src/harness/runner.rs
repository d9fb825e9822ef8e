//! Per-case verification runner.
//!
//! Drives submit → poll → fetch for each case, applies the check registry and
//! the case's expectation, and records one `TestResult` per case. Errors never
//! escape a case: they become `critical_error` results and a failure-log line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use super::poll::{poll_job, PollOutcome, PollPolicy};
use super::TestCase;
use crate::api::{AnalysisApi, AnalyzeRequest, JobState, SubmitOutcome};
use crate::checks::calibration::confidence_recalibrated;
use crate::checks::{check_expected_outcome, CheckOutcome, CheckRegistry, Terminal};
use crate::error::{ApiError, HarnessError};
use crate::sink::{LogSink, MemorySink};

/// Final classification of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    Timeout,
    CriticalError,
    Cancelled,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Timeout => "timeout",
            TestStatus::CriticalError => "critical_error",
            TestStatus::Cancelled => "cancelled",
        }
    }
}

/// Outcome of running a single case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub case: TestCase,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_completeness: Option<String>,
    pub polls: u32,
    /// Terminal job state seen by the poll loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_state: Option<JobState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epistemic_state: Option<String>,
    #[serde(default)]
    pub confidence_recalibrated: bool,
    pub outcomes: Vec<CheckOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_artifact: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TestResult {
    fn new(case: TestCase, started_at: DateTime<Utc>) -> Self {
        Self {
            case,
            status: TestStatus::Failed,
            job_id: None,
            data_completeness: None,
            polls: 0,
            terminal_state: None,
            epistemic_state: None,
            confidence_recalibrated: false,
            outcomes: Vec::new(),
            error: None,
            audit_artifact: None,
            started_at,
            duration_ms: 0,
        }
    }

    /// Derive passed/failed from the recorded check outcomes.
    fn settle(&mut self) {
        self.status = if self.outcomes.iter().all(|o| o.passed) {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        };
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }

    pub fn outcome(&self, check: &str) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.check == check)
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}

/// Where in the lifecycle a critical error happened.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Submission,
    Polling,
    ReportFetch,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Submission => "submission",
            Stage::Polling => "polling",
            Stage::ReportFetch => "report_fetch",
        }
    }
}

/// Audit capture filename: `{YYYYmmdd_HHMMSS}_{handle}_{platform}_{completeness}.png`.
pub fn audit_artifact_name(at: DateTime<Utc>, case: &TestCase, completeness: &str) -> String {
    format!(
        "{}_{}_{}_{}.png",
        at.format("%Y%m%d_%H%M%S"),
        filename_safe(&case.handle),
        case.platform,
        filename_safe(completeness)
    )
}

fn filename_safe(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Fail fast when the service is not reachable.
pub async fn preflight(api: &dyn AnalysisApi, base_url: &str) -> crate::error::Result<()> {
    api.health().await.map_err(|e| HarnessError::ServiceUnavailable {
        base_url: base_url.to_string(),
        reason: format!("{}. Please start the analysis service first", e),
    })?;
    tracing::info!(base_url, "Analysis service is healthy");
    Ok(())
}

pub struct HarnessRunner {
    api: Arc<dyn AnalysisApi>,
    policy: PollPolicy,
    checks: CheckRegistry,
    results_log: Arc<dyn LogSink>,
    failure_log: Arc<dyn LogSink>,
    shutdown: watch::Receiver<bool>,
    run_id: Uuid,
}

impl HarnessRunner {
    /// Runner with in-memory logs and no shutdown signal.
    pub fn new(api: Arc<dyn AnalysisApi>, policy: PollPolicy, checks: CheckRegistry) -> Self {
        // Receiver of a dropped sender keeps `false` forever.
        let (_, shutdown) = watch::channel(false);
        Self {
            api,
            policy,
            checks,
            results_log: Arc::new(MemorySink::new()),
            failure_log: Arc::new(MemorySink::new()),
            shutdown,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_sinks(mut self, results_log: Arc<dyn LogSink>, failure_log: Arc<dyn LogSink>) -> Self {
        self.results_log = results_log;
        self.failure_log = failure_log;
        self
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn api(&self) -> &dyn AnalysisApi {
        self.api.as_ref()
    }

    fn cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run every case in order. Cases not started before a shutdown are
    /// skipped; the result list then covers only the cases that ran.
    pub async fn run_batch(&self, cases: &[TestCase]) -> Vec<TestResult> {
        self.run_batch_with(cases, |_, _| {}).await
    }

    /// Like `run_batch`, calling `on_result(index, result)` after each case.
    pub async fn run_batch_with<F>(&self, cases: &[TestCase], mut on_result: F) -> Vec<TestResult>
    where
        F: FnMut(usize, &TestResult),
    {
        let mut results = Vec::with_capacity(cases.len());
        for (idx, case) in cases.iter().enumerate() {
            if self.cancelled() {
                tracing::warn!(
                    remaining = cases.len() - idx,
                    "Shutdown requested, skipping remaining cases"
                );
                break;
            }
            let result = self.run_case(case).await;
            on_result(idx, &result);
            results.push(result);
        }
        results
    }

    pub async fn run_case(&self, case: &TestCase) -> TestResult {
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();
        let mut result = TestResult::new(case.clone(), started_at);

        tracing::info!(
            case = %case.label(),
            handle = %case.handle,
            platform = %case.platform,
            expected = case.expected.as_str(),
            "Running case"
        );

        if let Err((stage, e)) = self.execute(case, &mut result).await {
            tracing::error!(
                case = %case.label(),
                stage = stage.as_str(),
                error = %e,
                "Critical error"
            );
            result.status = TestStatus::CriticalError;
            result.error = Some(e.to_string());
            self.log_failure(case, stage, &e);
        }

        result.duration_ms = clock.elapsed().as_millis() as u64;
        self.log_result(&result);

        tracing::info!(
            case = %case.label(),
            status = result.status.as_str(),
            completeness = ?result.data_completeness,
            duration_ms = result.duration_ms,
            "Case finished"
        );
        result
    }

    async fn execute(&self, case: &TestCase, result: &mut TestResult) -> Result<(), (Stage, ApiError)> {
        let req = AnalyzeRequest::new(&case.handle, case.platform.as_str());
        let job = match self
            .api
            .submit(&req)
            .await
            .map_err(|e| (Stage::Submission, e))?
        {
            SubmitOutcome::Accepted(job) => job,
            SubmitOutcome::Rejected { status, body } => {
                result.error = Some(format!("HTTP {}: {}", status, body));
                result
                    .outcomes
                    .push(check_expected_outcome(case.expected, &Terminal::Rejected { status }));
                result.settle();
                return Ok(());
            }
        };
        result.job_id = Some(job.to_string());
        tracing::debug!(case = %case.label(), job_id = %job, "Job accepted");

        let mut shutdown = self.shutdown.clone();
        let outcome = poll_job(self.api.as_ref(), &job, &self.policy, &mut shutdown)
            .await
            .map_err(|e| (Stage::Polling, e))?;
        result.polls = outcome.polls();

        match outcome {
            PollOutcome::Completed { .. } => {
                let doc = self
                    .api
                    .report(&job)
                    .await
                    .map_err(|e| (Stage::ReportFetch, e))?;
                let completeness = doc.completeness().map(str::to_string);
                result.terminal_state = Some(JobState::Completed);
                result.epistemic_state = doc.epistemic_status().map(str::to_string);
                result.confidence_recalibrated = confidence_recalibrated(&doc);

                result.outcomes = self.checks.evaluate(&doc);
                result.outcomes.push(check_expected_outcome(
                    case.expected,
                    &Terminal::Completed {
                        completeness: completeness.as_deref(),
                    },
                ));
                result.audit_artifact = Some(audit_artifact_name(
                    Utc::now(),
                    case,
                    completeness.as_deref().unwrap_or("unknown"),
                ));
                result.data_completeness = completeness;
                result.settle();
            }
            PollOutcome::Failed { message, .. } => {
                result.terminal_state = Some(JobState::Failed);
                result
                    .outcomes
                    .push(check_expected_outcome(case.expected, &Terminal::Failed { message: &message }));
                result.error = Some(message);
                result.settle();
            }
            PollOutcome::TimedOut { waited, last, .. } => {
                result.status = TestStatus::Timeout;
                let last_state = last
                    .map(|s| s.status.as_str())
                    .unwrap_or("unknown");
                result.error = Some(format!(
                    "no terminal state after {:.1}s (last status: {})",
                    waited.as_secs_f64(),
                    last_state
                ));
            }
            PollOutcome::Cancelled { .. } => {
                result.status = TestStatus::Cancelled;
                result.error = Some("cancelled before the job reached a terminal state".to_string());
            }
        }
        Ok(())
    }

    fn log_result(&self, result: &TestResult) {
        let record = match serde_json::to_value(result) {
            Ok(Value::Object(mut map)) => {
                map.insert("run_id".to_string(), json!(self.run_id));
                Value::Object(map)
            }
            Ok(other) => other,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize result record");
                return;
            }
        };
        if let Err(e) = self.results_log.append(&record) {
            tracing::warn!(error = %e, "Failed to append to results log");
        }
    }

    fn log_failure(&self, case: &TestCase, stage: Stage, error: &ApiError) {
        let record = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "run_id": self.run_id,
            "case": case.label(),
            "handle": case.handle,
            "platform": case.platform,
            "error": error.to_string(),
            "phase": stage.as_str(),
            "test_type": "job_verification",
        });
        if let Err(e) = self.failure_log.append(&record) {
            tracing::warn!(error = %e, "Failed to append to failure log");
        }
    }
}
