//! Harness configuration
//!
//! Layered: built-in defaults, then an optional YAML file, then
//! `SCOPE_HARNESS_*` environment variables. The CLI applies its flags last.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::checks::CheckConfig;
use crate::error::{HarnessError, Result};
use crate::harness::{default_cases, PollPolicy, TestCase, TestSuite};

pub const ENV_BASE_URL: &str = "SCOPE_HARNESS_BASE_URL";
pub const ENV_THRESHOLD: &str = "SCOPE_HARNESS_THRESHOLD";
pub const ENV_OUTPUT_DIR: &str = "SCOPE_HARNESS_OUTPUT_DIR";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub poll: PollPolicy,
    /// Success-rate percentage required for GO.
    pub pass_threshold: f64,
    pub output_dir: PathBuf,
    /// Defaults to `{output_dir}/logs/results.jsonl`.
    pub results_log: Option<PathBuf>,
    /// Defaults to `{output_dir}/logs/failures.jsonl`.
    pub failure_log: Option<PathBuf>,
    pub contract_probes: bool,
    pub probe_repeats: u32,
    pub checks: CheckConfig,
    pub cases: Vec<TestCase>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 10_000,
            poll: PollPolicy::default(),
            pass_threshold: 80.0,
            output_dir: PathBuf::from("target/scope-harness"),
            results_log: None,
            failure_log: None,
            contract_probes: false,
            probe_repeats: 3,
            checks: CheckConfig::default(),
            cases: default_cases(),
        }
    }
}

impl HarnessConfig {
    /// Load from a YAML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading harness configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: HarnessConfig = serde_yaml::from_str(&content).map_err(|e| {
            HarnessError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Defaults or `path`, then environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_THRESHOLD).filter(|v| !v.is_empty()) {
            self.pass_threshold = raw.trim().parse().map_err(|_| {
                HarnessError::config(format!("{} must be a number, got '{}'", ENV_THRESHOLD, raw))
            })?;
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR).filter(|v| !v.is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| HarnessError::config(format!("invalid base_url '{}': {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HarnessError::config(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(HarnessError::config(format!(
                "pass_threshold must be within 0..=100, got {}",
                self.pass_threshold
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(HarnessError::config("request_timeout_ms must be positive"));
        }
        if self.checks.calibration_ceiling <= 0.0 {
            return Err(HarnessError::config("checks.calibration_ceiling must be positive"));
        }
        self.poll.validate().map_err(HarnessError::config)?;
        TestSuite {
            name: "config".to_string(),
            description: None,
            cases: self.cases.clone(),
        }
        .validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn results_log_path(&self) -> PathBuf {
        self.results_log
            .clone()
            .unwrap_or_else(|| self.output_dir.join("logs").join("results.jsonl"))
    }

    pub fn failure_log_path(&self) -> PathBuf {
        self.failure_log
            .clone()
            .unwrap_or_else(|| self.output_dir.join("logs").join("failures.jsonl"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{ExpectedOutcome, Platform};
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = HarnessConfig::default();
        config.validate().unwrap();
        assert_eq!(config.base_url, "http://localhost:8000/api");
        assert_eq!(config.pass_threshold, 80.0);
        assert_eq!(config.cases.len(), 6);
        assert_eq!(
            config.results_log_path(),
            PathBuf::from("target/scope-harness/logs/results.jsonl")
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
base_url: http://staging:9000/api
poll:
  kind: backoff
  initial_ms: 1000
  multiplier: 2.0
  max_interval_ms: 8000
  max_wait_ms: 60000
checks:
  calibration_ceiling: 0.1
  warning_map:
    sparse: limited
cases:
  - handle: nike
    platform: instagram
    expected: full_data
"#;
        let config: HarnessConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.base_url, "http://staging:9000/api");
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.poll.interval_for(2), Duration::from_secs(4));
        assert_eq!(config.checks.calibration_ceiling, 0.1);
        assert_eq!(config.checks.warning_map.len(), 1);
        assert_eq!(config.checks.pillars.len(), 3);
        assert_eq!(
            config.cases,
            vec![TestCase::new("nike", Platform::Instagram, ExpectedOutcome::FullData)]
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "https://scope.example.com/api"),
            (ENV_THRESHOLD, "90"),
            (ENV_OUTPUT_DIR, "/tmp/out"),
        ]
        .into_iter()
        .collect();

        let mut config = HarnessConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.base_url, "https://scope.example.com/api");
        assert_eq!(config.pass_threshold, 90.0);
        assert_eq!(config.failure_log_path(), PathBuf::from("/tmp/out/logs/failures.jsonl"));
    }

    #[test]
    fn test_bad_threshold_env_is_config_error() {
        let mut config = HarnessConfig::default();
        let err = config
            .apply_overrides(|k| (k == ENV_THRESHOLD).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Config { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = HarnessConfig {
            pass_threshold: 120.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            base_url: "ftp://svc".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = HarnessConfig {
            poll: PollPolicy::Fixed {
                interval_ms: 0,
                max_wait_ms: 1000,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_config_files_load() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("config");

        let config = HarnessConfig::load(&root.join("harness.yaml")).unwrap();
        config.validate().unwrap();
        assert!(config.contract_probes);
        assert_eq!(config.poll, PollPolicy::backoff_default());
        assert_eq!(config.checks.warning_map, CheckConfig::default().warning_map);

        let suite = crate::harness::load_suite(&root.join("launch_cases.yaml")).unwrap();
        assert_eq!(suite.cases.len(), 7);
        assert_eq!(suite.cases[6].expected, ExpectedOutcome::Rejected);
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.yaml");
        std::fs::write(&path, "pass_threshold: [not, a, number]\n").unwrap();
        let err = HarnessConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("harness.yaml"));
    }
}
