//! `AnalysisApi`: the only boundary between the harness and the
//! analysis service. The runner depends on this trait, never on reqwest.

pub mod http;
pub mod types;

use async_trait::async_trait;

pub use http::HttpAnalysisClient;
pub use types::{
    AnalyzeRequest, JobHandle, JobState, JobStatusResponse, ReportDocument, SubmitOutcome,
};

pub type Result<T> = std::result::Result<T, crate::error::ApiError>;

#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// `GET /health` liveness probe.
    async fn health(&self) -> Result<()>;

    /// `POST /analyze`. A 4xx answer is `Ok(SubmitOutcome::Rejected)`.
    async fn submit(&self, req: &AnalyzeRequest) -> Result<SubmitOutcome>;

    /// `GET /status/{job_id}`. Unknown ids yield `ApiError::JobNotFound`.
    async fn status(&self, job: &JobHandle) -> Result<JobStatusResponse>;

    /// `GET /report/{job_id}` for a completed job.
    async fn report(&self, job: &JobHandle) -> Result<ReportDocument>;
}
