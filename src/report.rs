//! Batch aggregation, the GO/NO-GO recommendation and report persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::checks::{CALIBRATION_CHECK, PII_CHECK};
use crate::error::Result;
use crate::harness::{ProbeResult, TestResult, TestStatus};

pub const REPORT_FILE: &str = "report.json";
pub const SUMMARY_FILE: &str = "summary.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "GO")]
    Go,
    #[serde(rename = "NO-GO")]
    NoGo,
}

impl Recommendation {
    pub fn from_rate(success_rate: f64, threshold: f64) -> Self {
        if success_rate >= threshold {
            Recommendation::Go
        } else {
            Recommendation::NoGo
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Go => "GO",
            Recommendation::NoGo => "NO-GO",
        }
    }
}

/// `passed / total * 100`, 0 for an empty batch.
pub fn success_rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusTotals {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timeout: usize,
    pub critical_error: usize,
    pub cancelled: usize,
}

impl StatusTotals {
    fn count(results: &[TestResult]) -> Self {
        let mut totals = StatusTotals {
            total: results.len(),
            ..Default::default()
        };
        for r in results {
            match r.status {
                TestStatus::Passed => totals.passed += 1,
                TestStatus::Failed => totals.failed += 1,
                TestStatus::Timeout => totals.timeout += 1,
                TestStatus::CriticalError => totals.critical_error += 1,
                TestStatus::Cancelled => totals.cancelled += 1,
            }
        }
        totals
    }
}

/// Calibration compliance across documents. Cases without a report (rejected,
/// failed, timed out) are not evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub compliant: usize,
    pub non_compliant: usize,
    pub not_evaluated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub base_url: String,
    pub totals: StatusTotals,
    pub success_rate: f64,
    pub pass_threshold: f64,
    pub recommendation: Recommendation,
    pub completeness_distribution: BTreeMap<String, usize>,
    pub calibration: CalibrationSummary,
    /// Reports whose confidence was recalibrated.
    #[serde(default)]
    pub confidence_recalibrated: usize,
    /// Count per `epistemic_state.status` over reports that carry one.
    #[serde(default)]
    pub epistemic_distribution: BTreeMap<String, usize>,
    pub pii_safe: usize,
    /// Failure count per check name.
    pub check_failures: BTreeMap<String, usize>,
    #[serde(default)]
    pub probes: Vec<ProbeResult>,
    pub results: Vec<TestResult>,
}

impl BatchReport {
    pub fn build(
        run_id: Uuid,
        base_url: &str,
        results: Vec<TestResult>,
        probes: Vec<ProbeResult>,
        pass_threshold: f64,
    ) -> Self {
        let totals = StatusTotals::count(&results);
        let success_rate = success_rate(totals.passed, totals.total);

        let mut completeness_distribution = BTreeMap::new();
        let mut calibration = CalibrationSummary::default();
        let mut confidence_recalibrated = 0;
        let mut epistemic_distribution = BTreeMap::new();
        let mut pii_safe = 0;
        let mut check_failures = BTreeMap::new();

        for r in &results {
            if let Some(state) = &r.data_completeness {
                *completeness_distribution.entry(state.clone()).or_insert(0) += 1;
            }
            if let Some(state) = &r.epistemic_state {
                *epistemic_distribution.entry(state.clone()).or_insert(0) += 1;
            }
            if r.confidence_recalibrated {
                confidence_recalibrated += 1;
            }
            match r.outcome(CALIBRATION_CHECK) {
                Some(o) if o.passed => calibration.compliant += 1,
                Some(_) => calibration.non_compliant += 1,
                None => calibration.not_evaluated += 1,
            }
            if r.outcome(PII_CHECK).is_some_and(|o| o.passed) {
                pii_safe += 1;
            }
            for o in r.failed_checks() {
                *check_failures.entry(o.check.clone()).or_insert(0) += 1;
            }
        }

        Self {
            run_id,
            generated_at: Utc::now(),
            base_url: base_url.to_string(),
            totals,
            success_rate,
            pass_threshold,
            recommendation: Recommendation::from_rate(success_rate, pass_threshold),
            completeness_distribution,
            calibration,
            confidence_recalibrated,
            epistemic_distribution,
            pii_safe,
            check_failures,
            probes,
            results,
        }
    }

    pub fn probes_passed(&self) -> bool {
        self.probes.iter().all(|p| p.passed)
    }

    /// 0 for GO with every probe passing, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.recommendation == Recommendation::Go && self.probes_passed() {
            0
        } else {
            1
        }
    }

    /// Human-readable launch readiness statement.
    pub fn render_markdown(&self) -> String {
        let t = &self.totals;
        let mut md = String::new();

        let _ = writeln!(md, "# Launch Readiness Statement\n");
        let _ = writeln!(md, "- Run: `{}`", self.run_id);
        let _ = writeln!(md, "- Generated: {}", self.generated_at.to_rfc3339());
        let _ = writeln!(md, "- Service: {}\n", self.base_url);

        let _ = writeln!(md, "## Results\n");
        let _ = writeln!(md, "| Outcome | Count |");
        let _ = writeln!(md, "|---|---|");
        let _ = writeln!(md, "| Total | {} |", t.total);
        let _ = writeln!(md, "| Passed | {} |", t.passed);
        let _ = writeln!(md, "| Failed | {} |", t.failed);
        let _ = writeln!(md, "| Timeout | {} |", t.timeout);
        let _ = writeln!(md, "| Critical error | {} |", t.critical_error);
        let _ = writeln!(md, "| Cancelled | {} |", t.cancelled);
        let _ = writeln!(
            md,
            "\nSuccess rate: **{:.1}%** (threshold {:.1}%)\n",
            self.success_rate, self.pass_threshold
        );

        let _ = writeln!(md, "## Data completeness\n");
        if self.completeness_distribution.is_empty() {
            let _ = writeln!(md, "- no completed reports");
        }
        for (state, count) in &self.completeness_distribution {
            let _ = writeln!(md, "- {}: {}", state, count);
        }

        let c = &self.calibration;
        let _ = writeln!(md, "\n## Governance\n");
        let _ = writeln!(
            md,
            "- Calibration within bound: {} compliant, {} non-compliant, {} not evaluated",
            c.compliant, c.non_compliant, c.not_evaluated
        );
        let _ = writeln!(
            md,
            "- Confidence recalibration applied: {}/{}",
            self.confidence_recalibrated, t.total
        );
        let _ = writeln!(md, "- PII-safe reports: {}/{}", self.pii_safe, t.total);
        let artifacts = self
            .results
            .iter()
            .filter(|r| r.audit_artifact.is_some())
            .count();
        let _ = writeln!(md, "- Audit artifacts recorded: {}", artifacts);

        let _ = writeln!(md, "\n## Epistemic state\n");
        if self.epistemic_distribution.is_empty() {
            let _ = writeln!(md, "- no report carried an epistemic state");
        }
        for (state, count) in &self.epistemic_distribution {
            let _ = writeln!(md, "- {}: {}", state, count);
        }

        if !self.check_failures.is_empty() {
            let _ = writeln!(md, "\n## Check failures\n");
            for (check, count) in &self.check_failures {
                let _ = writeln!(md, "- {}: {}", check, count);
            }
        }

        let _ = writeln!(md, "\n## Cases\n");
        let _ = writeln!(md, "| Case | Expected | Status | Completeness | Detail |");
        let _ = writeln!(md, "|---|---|---|---|---|");
        for r in &self.results {
            let detail = r
                .failed_checks()
                .map(|o| format!("{}: {}", o.check, o.detail))
                .chain(r.error.clone().filter(|_| !r.passed()))
                .collect::<Vec<_>>()
                .join("; ");
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} |",
                r.case.label(),
                r.case.expected.as_str(),
                r.status.as_str(),
                r.data_completeness.as_deref().unwrap_or("-"),
                detail.replace('|', "\\|")
            );
        }

        if !self.probes.is_empty() {
            let _ = writeln!(md, "\n## Contract probes\n");
            for p in &self.probes {
                let mark = if p.skipped {
                    "SKIP"
                } else if p.passed {
                    "PASS"
                } else {
                    "FAIL"
                };
                let _ = writeln!(md, "- [{}] {}: {}", mark, p.probe, p.detail);
            }
        }

        let _ = writeln!(
            md,
            "\nRECOMMENDATION: **{}** for production deployment",
            self.recommendation.as_str()
        );
        md
    }

    /// Write `report.json` and `summary.md` under `dir`.
    pub fn persist(&self, dir: &Path) -> Result<PersistedReport> {
        std::fs::create_dir_all(dir)?;
        let report = dir.join(REPORT_FILE);
        let summary = dir.join(SUMMARY_FILE);
        std::fs::write(&report, serde_json::to_string_pretty(self)?)?;
        std::fs::write(&summary, self.render_markdown())?;
        tracing::info!(
            report = %report.display(),
            summary = %summary.display(),
            "Report written"
        );
        Ok(PersistedReport { report, summary })
    }
}

#[derive(Debug, Clone)]
pub struct PersistedReport {
    pub report: PathBuf,
    pub summary: PathBuf,
}
