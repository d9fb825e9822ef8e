//! Poll loop and declarative polling policy.
//!
//! The loop queries job status until it is terminal, the policy's overall
//! budget is spent, or the shutdown signal fires. All waiting goes through
//! `tokio::time`, so tests drive it with a paused clock.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::api::{AnalysisApi, JobHandle, JobState, JobStatusResponse};
use crate::error::ApiError;

/// How often to poll and for how long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollPolicy {
    Fixed {
        interval_ms: u64,
        max_wait_ms: u64,
    },
    /// `initial_ms * multiplier^attempt`, capped at `max_interval_ms`.
    Backoff {
        initial_ms: u64,
        multiplier: f64,
        max_interval_ms: u64,
        max_wait_ms: u64,
    },
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::Fixed {
            interval_ms: 2_000,
            max_wait_ms: 120_000,
        }
    }
}

impl PollPolicy {
    pub fn backoff_default() -> Self {
        PollPolicy::Backoff {
            initial_ms: 2_000,
            multiplier: 1.5,
            max_interval_ms: 30_000,
            max_wait_ms: 120_000,
        }
    }

    pub fn max_wait(&self) -> Duration {
        match self {
            PollPolicy::Fixed { max_wait_ms, .. } | PollPolicy::Backoff { max_wait_ms, .. } => {
                Duration::from_millis(*max_wait_ms)
            }
        }
    }

    /// Wait before poll number `attempt + 1` (attempt counts from 0).
    pub fn interval_for(&self, attempt: u32) -> Duration {
        match self {
            PollPolicy::Fixed { interval_ms, .. } => Duration::from_millis(*interval_ms),
            PollPolicy::Backoff {
                initial_ms,
                multiplier,
                max_interval_ms,
                ..
            } => {
                let scaled = (*initial_ms as f64) * multiplier.powi(attempt as i32);
                let capped = scaled.min(*max_interval_ms as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            PollPolicy::Fixed { interval_ms, .. } if *interval_ms == 0 => {
                Err("poll interval_ms must be positive".to_string())
            }
            PollPolicy::Backoff {
                initial_ms,
                multiplier,
                max_interval_ms,
                ..
            } => {
                if *initial_ms == 0 {
                    Err("poll initial_ms must be positive".to_string())
                } else if !(*multiplier >= 1.0) {
                    Err(format!("poll multiplier must be >= 1.0, got {}", multiplier))
                } else if max_interval_ms < initial_ms {
                    Err("poll max_interval_ms must be >= initial_ms".to_string())
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

/// How the poll loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed {
        last: JobStatusResponse,
        polls: u32,
    },
    Failed {
        message: String,
        polls: u32,
    },
    TimedOut {
        waited: Duration,
        polls: u32,
        last: Option<JobStatusResponse>,
    },
    Cancelled {
        polls: u32,
    },
}

impl PollOutcome {
    pub fn polls(&self) -> u32 {
        match self {
            PollOutcome::Completed { polls, .. }
            | PollOutcome::Failed { polls, .. }
            | PollOutcome::TimedOut { polls, .. }
            | PollOutcome::Cancelled { polls } => *polls,
        }
    }
}

/// Poll `job` until it reaches a terminal state.
///
/// Transport errors and unknown job ids end the loop with `Err`; the caller
/// converts them into a critical result.
pub async fn poll_job(
    api: &dyn AnalysisApi,
    job: &JobHandle,
    policy: &PollPolicy,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<PollOutcome, ApiError> {
    let started = Instant::now();
    let deadline = started + policy.max_wait();
    let mut polls: u32 = 0;

    loop {
        if *shutdown.borrow() {
            return Ok(PollOutcome::Cancelled { polls });
        }

        let status = api.status(job).await?;
        polls += 1;

        match status.status {
            JobState::Completed => {
                tracing::info!(job_id = %job, polls, "Job completed");
                return Ok(PollOutcome::Completed {
                    last: status,
                    polls,
                });
            }
            JobState::Failed => {
                let message = status
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string());
                tracing::info!(job_id = %job, polls, error = %message, "Job failed");
                return Ok(PollOutcome::Failed { message, polls });
            }
            JobState::Pending | JobState::Processing => {
                tracing::debug!(
                    job_id = %job,
                    status = status.status.as_str(),
                    phase = %status.phase,
                    percent = ?status.percent,
                    "Job in progress"
                );
            }
        }
        let now = Instant::now();
        if now >= deadline {
            tracing::warn!(job_id = %job, polls, "Job did not reach a terminal state in time");
            return Ok(PollOutcome::TimedOut {
                waited: now - started,
                polls,
                last: Some(status),
            });
        }

        let wait = policy.interval_for(polls - 1).min(deadline - now);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown_requested(shutdown) => {
                tracing::info!(job_id = %job, polls, "Polling cancelled");
                return Ok(PollOutcome::Cancelled { polls });
            }
        }
    }
}

/// Resolves once the flag is `true`. A dropped sender never cancels.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
