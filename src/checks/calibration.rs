//! Bound on post-hoc score adjustment.
//!
//! For each pillar with a base and an adjusted score, the relative
//! adjustment `|adjusted - base| / base` must not exceed the configured
//! ceiling. Pillars with a non-positive base are not evaluated.

use serde_json::Value;

use super::{CheckConfig, CheckOutcome, Finding};
use crate::api::ReportDocument;

pub const NAME: &str = super::CALIBRATION_CHECK;

/// Minimum confidence shift that counts as a recalibration.
const RECALIBRATION_EPSILON: f64 = 0.01;

/// Relative deviation, or `None` when `base <= 0`.
pub fn relative_adjustment(base: f64, adjusted: f64) -> Option<f64> {
    (base > 0.0).then(|| (adjusted - base).abs() / base)
}

/// `calibration.confidence_recalibration` moved confidence by more than `RECALIBRATION_EPSILON`.
pub fn confidence_recalibrated(doc: &ReportDocument) -> bool {
    let Some(recal) = doc
        .get("calibration")
        .and_then(|c| c.get("confidence_recalibration"))
    else {
        return false;
    };
    let original = recal
        .get("original_confidence")
        .and_then(Value::as_f64)
        .unwrap_or(1.0);
    let recalibrated = recal
        .get("recalibrated_confidence")
        .and_then(Value::as_f64)
        .unwrap_or(original);
    (original - recalibrated).abs() > RECALIBRATION_EPSILON
}

pub fn check(doc: &ReportDocument, config: &CheckConfig) -> CheckOutcome {
    let mut findings = Vec::new();
    let mut evaluated = 0usize;

    for pillar in &config.pillars {
        let Some(block) = doc.get(pillar) else {
            continue;
        };
        let base = block.get(&config.base_score_key).and_then(Value::as_f64);
        let adjusted = block.get(&config.adjusted_score_key).and_then(Value::as_f64);
        let (Some(base), Some(adjusted)) = (base, adjusted) else {
            continue;
        };
        let Some(deviation) = relative_adjustment(base, adjusted) else {
            continue;
        };
        evaluated += 1;
        if deviation > config.calibration_ceiling {
            findings.push(
                Finding::new(
                    format!("/{}", pillar),
                    format!(
                        "adjusted {} vs base {}: {:.1}% exceeds {:.1}%",
                        adjusted,
                        base,
                        deviation * 100.0,
                        config.calibration_ceiling * 100.0
                    ),
                )
                .with_value(deviation),
            );
        }
    }

    let recal = if confidence_recalibrated(doc) {
        "; confidence recalibrated"
    } else {
        ""
    };
    let ok_detail = if evaluated == 0 {
        format!("no adjusted pillar scores present{}", recal)
    } else {
        format!("{} pillar adjustment(s) within bound{}", evaluated, recal)
    };
    CheckOutcome::from_findings(NAME, findings, ok_detail)
}
