//! Required-field presence.

use super::{CheckConfig, CheckOutcome, Finding};
use crate::api::ReportDocument;

pub const NAME: &str = "schema_completeness";

/// Every configured required field must be present. A present field with a
/// `null` value still counts: unavailable reports legitimately null out
/// their pillar blocks.
pub fn check(doc: &ReportDocument, config: &CheckConfig) -> CheckOutcome {
    let findings: Vec<Finding> = config
        .required_fields
        .iter()
        .filter(|field| !doc.contains(field))
        .map(|field| Finding::new(format!("/{}", field), "required field missing"))
        .collect();

    CheckOutcome::from_findings(
        NAME,
        findings,
        format!("all {} required fields present", config.required_fields.len()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::fixtures::{doc, full_report};
    use serde_json::json;

    #[test]
    fn test_missing_fields_are_listed() {
        let mut report = full_report();
        let obj = report.as_object_mut().unwrap();
        obj.remove("generated_at");
        obj.remove("evidence_vault");

        let outcome = check(&doc(report), &CheckConfig::default());
        assert!(!outcome.passed);
        let locations: Vec<_> = outcome.findings.iter().map(|f| f.location.as_str()).collect();
        assert_eq!(locations, vec!["/generated_at", "/evidence_vault"]);
    }

    #[test]
    fn test_null_field_counts_as_present() {
        let mut report = full_report();
        report["brand_safety"] = json!(null);
        assert!(check(&doc(report), &CheckConfig::default()).passed);
    }
}
