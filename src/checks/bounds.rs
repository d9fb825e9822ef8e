//! Numeric range invariants: confidences in [0, 1], signal strengths in [0, 100].

use serde_json::Value;

use super::{key_matches, walk_document, CheckConfig, CheckOutcome, Finding};
use crate::api::ReportDocument;

pub const NAME: &str = "value_bounds";

const CONFIDENCE_RANGE: (f64, f64) = (0.0, 1.0);
const STRENGTH_RANGE: (f64, f64) = (0.0, 100.0);

pub fn check(doc: &ReportDocument, config: &CheckConfig) -> CheckOutcome {
    let mut findings = Vec::new();
    let mut inspected = 0usize;

    walk_document(doc, &mut |path, key, value| {
        let (Some(key), Value::Number(n)) = (key, value) else {
            return;
        };
        let range = if key_matches(key, &config.confidence_keys) {
            CONFIDENCE_RANGE
        } else if key_matches(key, &config.strength_keys) {
            STRENGTH_RANGE
        } else {
            return;
        };
        let Some(v) = n.as_f64() else {
            return;
        };
        inspected += 1;
        if !(range.0..=range.1).contains(&v) {
            findings.push(
                Finding::new(
                    path,
                    format!("{} outside [{}, {}]", v, range.0, range.1),
                )
                .with_value(v),
            );
        }
    });

    CheckOutcome::from_findings(NAME, findings, format!("{} bounded values in range", inspected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::fixtures::{doc, full_report};
    use serde_json::json;

    #[test]
    fn test_confidence_above_one_is_flagged() {
        let mut report = full_report();
        report["audience_authenticity"]["confidence"] = json!(1.2);
        let outcome = check(&doc(report), &CheckConfig::default());
        assert!(!outcome.passed);
        assert_eq!(outcome.findings[0].location, "/audience_authenticity/confidence");
        assert_eq!(outcome.findings[0].value, Some(1.2));
    }

    #[test]
    fn test_strength_checked_inside_nested_arrays() {
        let mut report = full_report();
        report["signals"] = json!([{"name": "reciprocity", "signal_strength": 140}]);
        let outcome = check(&doc(report), &CheckConfig::default());
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].location, "/signals/0/signal_strength");
    }

    #[test]
    fn test_suffix_keys_and_boundaries() {
        let report = json!({
            "calibration": {
                "confidence_recalibration": {
                    "original_confidence": 1.0,
                    "recalibrated_confidence": 0.0
                }
            },
            "brand_safety": {"signal_strength": 100}
        });
        let outcome = check(&doc(report), &CheckConfig::default());
        assert!(outcome.passed, "{}", outcome.detail);
        assert_eq!(outcome.detail, "3 bounded values in range");
    }

    #[test]
    fn test_negative_strength_is_flagged() {
        let report = json!({"true_engagement": {"signal_strength": -3}});
        assert!(!check(&doc(report), &CheckConfig::default()).passed);
    }

    #[test]
    fn test_null_values_are_skipped() {
        let report = json!({"true_engagement": {"confidence": null}});
        assert!(check(&doc(report), &CheckConfig::default()).passed);
    }
}
