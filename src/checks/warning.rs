//! Completeness state → warning category mapping.

use serde_json::Value;

use super::{contains_term, CheckConfig, CheckOutcome};
use crate::api::ReportDocument;

pub const NAME: &str = "warning_mapping";

/// Warning categories the report carries, lowercased: the explicit
/// `warning_type` plus every entry of `warning_banners`. Banners may be bare
/// category names or objects with a `type`/`category` field.
fn reported_warnings(doc: &ReportDocument) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(t) = doc.get("warning_type").and_then(Value::as_str) {
        out.push(t.to_lowercase());
    }
    if let Some(banners) = doc.get("warning_banners").and_then(Value::as_array) {
        for banner in banners {
            let text = match banner {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map
                    .get("type")
                    .or_else(|| map.get("category"))
                    .and_then(Value::as_str),
                _ => None,
            };
            if let Some(t) = text {
                out.push(t.to_lowercase());
            }
        }
    }
    out
}

/// Expected warning category for a completeness state, if the table has one.
pub fn expected_warning<'a>(config: &'a CheckConfig, state: &str) -> Option<&'a str> {
    config.warning_map.get(state).map(String::as_str)
}

pub fn check(doc: &ReportDocument, config: &CheckConfig) -> CheckOutcome {
    let Some(state) = doc.completeness() else {
        return CheckOutcome::fail(NAME, "data_completeness missing; cannot derive expected warning");
    };
    let reported = reported_warnings(doc);

    match expected_warning(config, state) {
        None => CheckOutcome::pass(NAME, format!("state '{}' requires no warning", state)),
        Some(expected) => {
            let expected_tag = expected.to_lowercase();
            if reported.iter().any(|w| contains_term(w, &expected_tag)) {
                CheckOutcome::pass(
                    NAME,
                    format!("state '{}' carries expected '{}' warning", state, expected),
                )
            } else {
                CheckOutcome::fail(
                    NAME,
                    format!(
                        "state '{}': expected '{}' warning, got {:?}",
                        state, expected, reported
                    ),
                )
            }
        }
    }
}
