//! Job Verification Harness
//!
//! Drives submit → poll → fetch for each test case against the analysis
//! service, runs the check battery over the result and collects one
//! `TestResult` per case. Cases run sequentially so logs stay ordered.
//!
//! # Error taxonomy
//! - **input-rejected**: the service answered the submission with a 4xx
//! - **job-failed**: the job reached `failed`; compared against expectations
//! - **timeout**: no terminal state within the poll budget
//! - **network/error**: transport or protocol failure, becomes `critical_error`
//! - **assertion-failure**: a check did not hold

pub mod poll;
pub mod probes;
pub mod runner;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{HarnessError, Result};

pub use poll::{poll_job, PollOutcome, PollPolicy};
pub use probes::{run_contract_probes, ProbeResult, TerminalJob};
pub use runner::{HarnessRunner, TestResult, TestStatus};

/// Platforms the service analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Tiktok,
    Youtube,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a case expects the service to do with its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    FullData,
    PartialBlocked,
    Unavailable,
    Sparse,
    Archival,
    Rejected,
    Any,
}

impl ExpectedOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpectedOutcome::FullData => "full_data",
            ExpectedOutcome::PartialBlocked => "partial_blocked",
            ExpectedOutcome::Unavailable => "unavailable",
            ExpectedOutcome::Sparse => "sparse",
            ExpectedOutcome::Archival => "archival",
            ExpectedOutcome::Rejected => "rejected",
            ExpectedOutcome::Any => "any",
        }
    }
}

/// One handle to analyse, fixed at configuration time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub handle: String,
    pub platform: Platform,
    #[serde(default = "default_expected")]
    pub expected: ExpectedOutcome,
}

fn default_expected() -> ExpectedOutcome {
    ExpectedOutcome::Any
}

impl TestCase {
    pub fn new(handle: impl Into<String>, platform: Platform, expected: ExpectedOutcome) -> Self {
        Self {
            id: None,
            handle: handle.into(),
            platform,
            expected,
        }
    }

    /// Explicit id, or `platform:handle`.
    pub fn label(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.platform, self.handle))
    }

    fn validate(&self) -> Result<()> {
        if self.handle.trim().is_empty() && self.expected != ExpectedOutcome::Rejected {
            return Err(HarnessError::config(format!(
                "case '{}' has an empty handle but does not expect rejection",
                self.label()
            )));
        }
        Ok(())
    }
}

/// A named list of cases loaded from YAML.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestSuite {
    #[serde(default = "default_suite_name")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub cases: Vec<TestCase>,
}

fn default_suite_name() -> String {
    "default".to_string()
}

impl TestSuite {
    pub fn validate(&self) -> Result<()> {
        self.cases.iter().try_for_each(TestCase::validate)
    }
}

/// Handles the launch-readiness run has always covered.
pub fn default_cases() -> Vec<TestCase> {
    use ExpectedOutcome::*;
    use Platform::*;
    vec![
        TestCase::new("nike", Instagram, FullData),
        TestCase::new("charlidamelio", Tiktok, FullData),
        TestCase::new("test_private_123", Instagram, Unavailable),
        TestCase::new("deleted_user_test", Instagram, Unavailable),
        TestCase::new("nationalgeographic", Instagram, FullData),
        TestCase::new("addisonre", Tiktok, FullData),
    ]
}

/// Load and validate a suite from a YAML file.
pub fn load_suite(path: &Path) -> Result<TestSuite> {
    let content = std::fs::read_to_string(path)?;
    let suite: TestSuite = serde_yaml::from_str(&content)?;
    suite.validate()?;
    tracing::info!(
        path = %path.display(),
        suite = %suite.name,
        cases = suite.cases.len(),
        "Loaded test suite"
    );
    Ok(suite)
}
