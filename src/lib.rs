//! scope-harness - job verification harness for the SponsorScope analysis API
//!
//! Submits analysis jobs, polls them to a terminal state, fetches the report
//! document and runs a fixed battery of checks over it. Per-case results are
//! aggregated into a launch readiness report with a GO/NO-GO recommendation.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scope_harness::api::HttpAnalysisClient;
//! use scope_harness::checks::CheckRegistry;
//! use scope_harness::config::HarnessConfig;
//! use scope_harness::harness::{default_cases, HarnessRunner};
//!
//! # async fn demo() -> scope_harness::error::Result<()> {
//! let config = HarnessConfig::default();
//! let client = HttpAnalysisClient::new(&config.base_url, config.request_timeout())?;
//! let runner = HarnessRunner::new(Arc::new(client), config.poll.clone(), CheckRegistry::default());
//! let results = runner.run_batch(&default_cases()).await;
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Configuration (YAML + env)
pub mod config;

// HTTP boundary with the analysis service
pub mod api;

// Document rules
pub mod checks;

// Cases, poll loop, runner, contract probes
pub mod harness;

// Result and failure logs
pub mod sink;

// Aggregation and readiness report
pub mod report;

pub use config::HarnessConfig;
pub use error::{ApiError, HarnessError, Result};
pub use harness::{HarnessRunner, TestCase, TestResult, TestStatus};
pub use report::{BatchReport, Recommendation};
