//! reqwest-backed client for the analysis service.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

use super::types::{
    AnalyzeAccepted, AnalyzeRequest, JobHandle, JobStatusResponse, ReportDocument, SubmitOutcome,
};
use super::{AnalysisApi, Result};
use crate::error::ApiError;

/// Longest response body echoed back into an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

pub struct HttpAnalysisClient {
    client: Client,
    base_url: String,
}

impl HttpAnalysisClient {
    /// Create a client rooted at `base_url` (e.g. `http://localhost:8000/api`).
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Transport {
                endpoint: base_url.to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_get(&self, path: &str) -> Result<Response> {
        self.client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| transport(path, e))
    }
}

fn transport(endpoint: &str, e: reqwest::Error) -> ApiError {
    ApiError::Transport {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

async fn read_body(endpoint: &str, response: Response) -> Result<String> {
    response.text().await.map_err(|e| transport(endpoint, e))
}

async fn unexpected(endpoint: &str, response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::UnexpectedStatus {
        endpoint: endpoint.to_string(),
        status,
        body: truncate(&body),
    }
}

fn decode<T: serde::de::DeserializeOwned>(endpoint: &str, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        message: format!("{} (body: {})", e, truncate(text)),
    })
}

#[async_trait]
impl AnalysisApi for HttpAnalysisClient {
    async fn health(&self) -> Result<()> {
        let endpoint = "/health";
        let response = self.send_get(endpoint).await?;
        if response.status() != StatusCode::OK {
            return Err(unexpected(endpoint, response).await);
        }
        Ok(())
    }

    async fn submit(&self, req: &AnalyzeRequest) -> Result<SubmitOutcome> {
        let endpoint = "/analyze";
        let response = self
            .client
            .post(self.url(endpoint))
            .json(req)
            .send()
            .await
            .map_err(|e| transport(endpoint, e))?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            let text = read_body(endpoint, response).await?;
            let accepted: AnalyzeAccepted = decode(endpoint, &text)?;
            return match accepted.job_id {
                Some(id) if !id.is_empty() => Ok(SubmitOutcome::Accepted(JobHandle::new(id))),
                _ => Err(ApiError::MissingJobId),
            };
        }

        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(
                handle = %req.handle,
                platform = %req.platform,
                status = status.as_u16(),
                "Submission rejected"
            );
            return Ok(SubmitOutcome::Rejected {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }

        Err(unexpected(endpoint, response).await)
    }

    async fn status(&self, job: &JobHandle) -> Result<JobStatusResponse> {
        let endpoint = format!("/status/{}", job);
        let response = self.send_get(&endpoint).await?;
        match response.status() {
            StatusCode::OK => {
                let text = read_body(&endpoint, response).await?;
                decode(&endpoint, &text)
            }
            StatusCode::NOT_FOUND => Err(ApiError::JobNotFound {
                job_id: job.to_string(),
            }),
            _ => Err(unexpected(&endpoint, response).await),
        }
    }

    async fn report(&self, job: &JobHandle) -> Result<ReportDocument> {
        let endpoint = format!("/report/{}", job);
        let response = self.send_get(&endpoint).await?;
        match response.status() {
            StatusCode::OK => {
                let text = read_body(&endpoint, response).await?;
                let value: serde_json::Value = decode(&endpoint, &text)?;
                ReportDocument::from_value(value).ok_or_else(|| ApiError::Decode {
                    endpoint: endpoint.clone(),
                    message: "report body is not a JSON object".to_string(),
                })
            }
            StatusCode::NOT_FOUND => Err(ApiError::JobNotFound {
                job_id: job.to_string(),
            }),
            _ => Err(unexpected(&endpoint, response).await),
        }
    }
}
