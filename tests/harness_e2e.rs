//! End-to-end tests: real `HttpAnalysisClient` and runner against an
//! in-process axum mock of the analysis service.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use scope_harness::api::{AnalysisApi, AnalyzeRequest, HttpAnalysisClient, JobHandle, SubmitOutcome};
use scope_harness::checks::CheckRegistry;
use scope_harness::harness::runner::preflight;
use scope_harness::harness::{
    run_contract_probes, ExpectedOutcome, HarnessRunner, Platform, PollPolicy, TerminalJob, TestCase,
    TestStatus,
};
use scope_harness::report::{BatchReport, Recommendation};
use scope_harness::sink::JsonlFileSink;
use scope_harness::{ApiError, HarnessError};

// ============================================================================
// Mock service
// ============================================================================

const PLATFORMS: &[&str] = &["instagram", "tiktok", "youtube"];

#[derive(Default)]
struct MockState {
    next_id: u64,
    /// job id → (handle, status queries so far)
    jobs: HashMap<String, (String, u32)>,
}

type Shared = Arc<Mutex<MockState>>;

fn pillar(score: f64, adjusted: f64, confidence: f64) -> Value {
    json!({
        "score": score,
        "signal_strength": score,
        "adjusted_score": adjusted,
        "confidence": confidence,
        "flags": [],
        "evidence_links": []
    })
}

fn full_report(handle: &str) -> Value {
    json!({
        "handle": handle,
        "platform": "instagram",
        "generated_at": "2026-10-19T10:00:00Z",
        "data_completeness": "full",
        "true_engagement": pillar(72.0, 75.0, 0.82),
        "audience_authenticity": pillar(64.0, 60.0, 0.71),
        "brand_safety": pillar(90.0, 88.0, 0.9),
        "evidence_vault": [{
            "evidence_id": "ev-1",
            "type": "post",
            "source_url": "https://www.instagram.com/p/abc123/",
            "excerpt": "Comment velocity may indicate organic reach.",
            "timestamp": "2026-10-01T08:00:00Z"
        }],
        "warning_banners": []
    })
}

/// Unavailable data but numeric scores anyway.
fn fabricated_unavailable_report(handle: &str) -> Value {
    json!({
        "handle": handle,
        "platform": "instagram",
        "generated_at": "2026-10-19T10:00:00Z",
        "data_completeness": "unavailable",
        "warning_type": "system",
        "summary": "Profile data is unavailable.",
        "true_engagement": pillar(55.0, 55.0, 0.3),
        "audience_authenticity": {"signal_strength": null},
        "brand_safety": {"signal_strength": null},
        "evidence_vault": []
    })
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn analyze(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let handle = body["handle"].as_str().unwrap_or_default().to_string();
    let platform = body["platform"].as_str().unwrap_or_default();

    if handle.is_empty() || !PLATFORMS.contains(&platform) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "invalid handle or platform"})),
        )
            .into_response();
    }
    if handle == "explode" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }

    let mut state = state.lock().unwrap();
    state.next_id += 1;
    let job_id = format!("job-{}", state.next_id);
    state.jobs.insert(job_id.clone(), (handle, 0));
    (StatusCode::ACCEPTED, Json(json!({"job_id": job_id, "status": "pending"}))).into_response()
}

async fn status(State(state): State<Shared>, Path(job_id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    let Some((handle, calls)) = state.jobs.get_mut(&job_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Job not found"}))).into_response();
    };
    *calls += 1;

    let body = match (handle.as_str(), *calls) {
        (_, 1) => json!({"status": "processing", "phase": "scraping", "percent": 30}),
        ("test_private_123", _) => {
            json!({"status": "failed", "phase": "scraping", "error_message": "Profile is private"})
        }
        _ => json!({"status": "completed", "phase": "done", "percent": 100}),
    };
    Json(body).into_response()
}

async fn report(State(state): State<Shared>, Path(job_id): Path<String>) -> Response {
    let state = state.lock().unwrap();
    let Some((handle, _)) = state.jobs.get(&job_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Job not found"}))).into_response();
    };
    let report = match handle.as_str() {
        "deleted_user_test" => fabricated_unavailable_report(handle),
        other => full_report(other),
    };
    // The service wraps reports in a job envelope.
    Json(json!({
        "job_id": job_id,
        "report": report,
        "completed_at": "2026-10-19T10:00:05Z"
    }))
    .into_response()
}

async fn spawn_mock_service() -> SocketAddr {
    let state: Shared = Arc::new(Mutex::new(MockState::default()));
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/analyze", post(analyze))
        .route("/api/status/:job_id", get(status))
        .route("/api/report/:job_id", get(report))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client(addr: SocketAddr) -> Arc<HttpAnalysisClient> {
    let base_url = format!("http://{}/api", addr);
    Arc::new(HttpAnalysisClient::new(&base_url, Duration::from_secs(5)).unwrap())
}

fn fast_policy() -> PollPolicy {
    PollPolicy::Fixed {
        interval_ms: 20,
        max_wait_ms: 5_000,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_batch_against_mock_service() {
    let addr = spawn_mock_service().await;
    let api = client(addr);
    let logs = tempfile::tempdir().unwrap();
    let results_path = logs.path().join("results.jsonl");
    let failures_path = logs.path().join("failures.jsonl");

    preflight(api.as_ref(), api.base_url()).await.unwrap();

    let runner = HarnessRunner::new(api.clone(), fast_policy(), CheckRegistry::default()).with_sinks(
        Arc::new(JsonlFileSink::new(&results_path)),
        Arc::new(JsonlFileSink::new(&failures_path)),
    );
    let cases = vec![
        TestCase::new("nike", Platform::Instagram, ExpectedOutcome::FullData),
        TestCase::new("test_private_123", Platform::Instagram, ExpectedOutcome::Unavailable),
        TestCase::new("deleted_user_test", Platform::Instagram, ExpectedOutcome::Unavailable),
        TestCase::new("", Platform::Instagram, ExpectedOutcome::Rejected),
        TestCase::new("explode", Platform::Tiktok, ExpectedOutcome::Any),
    ];

    let results = runner.run_batch(&cases).await;
    let statuses: Vec<TestStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            TestStatus::Passed,
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Passed,
            TestStatus::CriticalError,
        ],
        "{:#?}",
        results
    );

    // nike: full data, no PII, audit capture recorded
    let nike = &results[0];
    assert_eq!(nike.data_completeness.as_deref(), Some("full"));
    assert!(nike.outcome("pii_absence").unwrap().passed);
    assert_eq!(nike.polls, 2);
    assert!(nike.audit_artifact.as_ref().unwrap().ends_with("_nike_instagram_full.png"));

    // unavailable report carrying a numeric score
    let failed: Vec<&str> = results[2].failed_checks().map(|o| o.check.as_str()).collect();
    assert_eq!(failed, vec!["uncertainty_language"]);

    // 500 on submission is critical but does not stop the batch
    assert!(results[4].error.as_ref().unwrap().contains("500"));
    let failure_lines = std::fs::read_to_string(&failures_path).unwrap();
    assert_eq!(failure_lines.lines().count(), 1);
    let failure: Value = serde_json::from_str(failure_lines.trim()).unwrap();
    assert_eq!(failure["handle"], "explode");
    assert_eq!(failure["phase"], "submission");
    assert_eq!(
        std::fs::read_to_string(&results_path).unwrap().lines().count(),
        5
    );

    let report = BatchReport::build(runner.run_id(), api.base_url(), results, vec![], 80.0);
    assert_eq!(report.success_rate, 60.0);
    assert_eq!(report.recommendation, Recommendation::NoGo);
    assert_eq!(report.completeness_distribution.get("full"), Some(&1));
    assert_eq!(report.completeness_distribution.get("unavailable"), Some(&1));
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_contract_probes_against_mock_service() {
    let addr = spawn_mock_service().await;
    let api = client(addr);

    let runner = HarnessRunner::new(api.clone(), fast_policy(), CheckRegistry::default());
    let result = runner
        .run_case(&TestCase::new("nike", Platform::Instagram, ExpectedOutcome::FullData))
        .await;
    assert_eq!(result.status, TestStatus::Passed);
    let job = TerminalJob::new(JobHandle::new(result.job_id.unwrap()), result.terminal_state.unwrap());

    let probes = run_contract_probes(api.as_ref(), Some(&job), 3).await;
    let names: Vec<&str> = probes.iter().map(|p| p.probe.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "invalid_platform_rejected",
            "empty_handle_rejected",
            "unknown_job_not_found",
            "terminal_status_stable"
        ]
    );
    for p in &probes {
        assert!(p.passed && !p.skipped, "{}: {}", p.probe, p.detail);
    }
}

#[tokio::test]
async fn test_client_maps_status_codes() {
    let addr = spawn_mock_service().await;
    let api = client(addr);

    let invalid = api
        .submit(&AnalyzeRequest::new("nike", "invalid_platform"))
        .await
        .unwrap();
    assert!(matches!(invalid, SubmitOutcome::Rejected { status: 400, .. }));

    let empty = api.submit(&AnalyzeRequest::new("", "instagram")).await.unwrap();
    assert!(matches!(empty, SubmitOutcome::Rejected { status: 400, .. }));

    let missing = api.status(&JobHandle::new("invalid-job-id")).await.unwrap_err();
    assert_eq!(missing.status(), Some(404));
    assert!(matches!(missing, ApiError::JobNotFound { .. }));

    let err = api
        .submit(&AnalyzeRequest::new("explode", "tiktok"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedStatus { status: 500, .. }));
}

#[tokio::test]
async fn test_preflight_fails_when_service_is_down() {
    // Grab a free port, then close it.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(addr);
    let err = preflight(api.as_ref(), api.base_url()).await.unwrap_err();
    assert!(matches!(err, HarnessError::ServiceUnavailable { .. }));
}
