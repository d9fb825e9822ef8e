//! Contract probes against the service's own input validation and job store.

use serde::{Deserialize, Serialize};

use crate::api::{AnalysisApi, AnalyzeRequest, JobHandle, JobState, SubmitOutcome};
use crate::error::ApiError;

pub const INVALID_PLATFORM: &str = "invalid_platform";
pub const UNKNOWN_JOB_ID: &str = "invalid-job-id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub probe: String,
    pub passed: bool,
    pub detail: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl ProbeResult {
    fn pass(probe: &str, detail: impl Into<String>) -> Self {
        Self {
            probe: probe.to_string(),
            passed: true,
            detail: detail.into(),
            skipped: false,
        }
    }

    fn fail(probe: &str, detail: impl Into<String>) -> Self {
        Self {
            probe: probe.to_string(),
            passed: false,
            detail: detail.into(),
            skipped: false,
        }
    }

    fn skip(probe: &str, detail: impl Into<String>) -> Self {
        Self {
            skipped: true,
            ..Self::pass(probe, detail)
        }
    }
}

/// A job to re-query, with the terminal state the harness saw when it polled it.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalJob {
    pub job: JobHandle,
    pub observed: Option<JobState>,
}

impl TerminalJob {
    pub fn new(job: JobHandle, observed: JobState) -> Self {
        Self {
            job,
            observed: Some(observed),
        }
    }

    /// A job id supplied from outside; only self-consistency can be checked.
    pub fn unobserved(job: JobHandle) -> Self {
        Self {
            job,
            observed: None,
        }
    }
}

async fn expect_rejection(api: &dyn AnalysisApi, probe: &str, req: AnalyzeRequest) -> ProbeResult {
    match api.submit(&req).await {
        Ok(SubmitOutcome::Rejected { status, .. }) => {
            ProbeResult::pass(probe, format!("rejected with HTTP {}", status))
        }
        Ok(SubmitOutcome::Accepted(job)) => ProbeResult::fail(
            probe,
            format!("accepted as job {} (expected a 4xx rejection)", job),
        ),
        Err(e) => ProbeResult::fail(probe, e.to_string()),
    }
}

async fn unknown_job_not_found(api: &dyn AnalysisApi) -> ProbeResult {
    let probe = "unknown_job_not_found";
    match api.status(&JobHandle::new(UNKNOWN_JOB_ID)).await {
        Err(ApiError::JobNotFound { .. }) => ProbeResult::pass(probe, "HTTP 404"),
        Err(e) => ProbeResult::fail(probe, e.to_string()),
        Ok(status) => ProbeResult::fail(
            probe,
            format!("unknown job reported status '{}'", status.status.as_str()),
        ),
    }
}

/// Re-query a terminal job; every answer must carry the same terminal state,
/// and that state must be the one observed during polling when known.
async fn terminal_status_stable(api: &dyn AnalysisApi, target: &TerminalJob, repeats: u32) -> ProbeResult {
    let probe = "terminal_status_stable";
    let job = &target.job;
    let mut seen = Vec::with_capacity(repeats as usize);
    for _ in 0..repeats {
        match api.status(job).await {
            Ok(status) => seen.push(status.status),
            Err(e) => return ProbeResult::fail(probe, format!("job {}: {}", job, e)),
        }
    }

    let Some(first) = seen.first().copied() else {
        return ProbeResult::skip(probe, "no repeats requested");
    };
    if !first.is_terminal() {
        return ProbeResult::fail(
            probe,
            format!("job {} is not terminal ('{}')", job, first.as_str()),
        );
    }
    if seen.iter().any(|s| *s != first) {
        let states: Vec<&str> = seen.iter().map(|s| s.as_str()).collect();
        return ProbeResult::fail(probe, format!("job {} flapped: {}", job, states.join(" → ")));
    }
    match target.observed {
        Some(observed) if observed != first => ProbeResult::fail(
            probe,
            format!(
                "job {} finished as '{}' but now reports '{}'",
                job,
                observed.as_str(),
                first.as_str()
            ),
        ),
        _ => ProbeResult::pass(
            probe,
            format!("job {} stayed '{}' across {} queries", job, first.as_str(), seen.len()),
        ),
    }
}

/// Run the probe battery. The stability probe needs a job already known to be
/// terminal and is skipped without one.
pub async fn run_contract_probes(
    api: &dyn AnalysisApi,
    terminal_job: Option<&TerminalJob>,
    repeats: u32,
) -> Vec<ProbeResult> {
    let mut results = vec![
        expect_rejection(
            api,
            "invalid_platform_rejected",
            AnalyzeRequest::new("nike", INVALID_PLATFORM),
        )
        .await,
        expect_rejection(
            api,
            "empty_handle_rejected",
            AnalyzeRequest::new("", "instagram"),
        )
        .await,
        unknown_job_not_found(api).await,
    ];

    results.push(match terminal_job {
        Some(job) => terminal_status_stable(api, job, repeats).await,
        None => ProbeResult::skip("terminal_status_stable", "no terminal job available"),
    });

    for r in &results {
        if r.passed {
            tracing::info!(probe = %r.probe, skipped = r.skipped, detail = %r.detail, "Probe passed");
        } else {
            tracing::warn!(probe = %r.probe, detail = %r.detail, "Probe failed");
        }
    }
    results
}
