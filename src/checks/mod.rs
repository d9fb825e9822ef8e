//! Declarative verification rules over a completed job's report document.
//!
//! Each rule is an independent, side-effect-free predicate producing one
//! `CheckOutcome`. Rules are registered in an ordered `CheckRegistry` and
//! all of them are evaluated for every document: a failing rule never stops
//! the ones after it, so a single case yields a complete diagnostic.

pub mod bounds;
pub mod calibration;
pub mod expectation;
pub mod language;
pub mod pii;
pub mod schema;
pub mod warning;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::ReportDocument;

pub use expectation::{check_expected_outcome, Terminal};

/// Name of the calibration rule, used by batch aggregation.
pub const CALIBRATION_CHECK: &str = "calibration_bound";
/// Name of the PII rule, used by batch aggregation.
pub const PII_CHECK: &str = "pii_absence";

/// A single violation found by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// JSON path (or logical location) of the offending value.
    pub location: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Finding {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Outcome of one rule against one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub check: String,
    pub passed: bool,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

impl CheckOutcome {
    pub fn pass(check: &str, detail: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            passed: true,
            detail: detail.into(),
            findings: Vec::new(),
        }
    }

    pub fn fail(check: &str, detail: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            passed: false,
            detail: detail.into(),
            findings: Vec::new(),
        }
    }

    /// Passed iff `findings` is empty; the detail summarises the first one.
    pub fn from_findings(check: &str, findings: Vec<Finding>, ok_detail: impl Into<String>) -> Self {
        if findings.is_empty() {
            return Self::pass(check, ok_detail);
        }
        let detail = format!("{} violation(s); first: {}", findings.len(), findings[0]);
        Self {
            check: check.to_string(),
            passed: false,
            detail,
            findings,
        }
    }
}

/// Tunables for the rule battery. Every list is configurable because the
/// service's contract owns these values, not the harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    pub required_fields: Vec<String>,
    /// Keys matched exactly or as a `_suffix` must lie in [0, 1].
    pub confidence_keys: Vec<String>,
    /// Keys matched exactly or as a `_suffix` must lie in [0, 100].
    pub strength_keys: Vec<String>,
    pub pillars: Vec<String>,
    pub base_score_key: String,
    pub adjusted_score_key: String,
    /// Maximum relative adjustment, e.g. 0.15 for ±15%.
    pub calibration_ceiling: f64,
    /// Completeness state → expected warning category.
    pub warning_map: BTreeMap<String, String>,
    pub allowed_domains: Vec<String>,
    pub overconfident_terms: Vec<String>,
    pub uncertainty_terms: Vec<String>,
    /// Pillar keys that count as a score when fabricated for unavailable data.
    pub score_keys: Vec<String>,
    pub full_state: String,
    pub unavailable_state: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CheckConfig {
    fn default() -> Self {
        let warning_map = [
            ("partial_no_comments", "blocked"),
            ("partial_no_images", "blocked"),
            ("unavailable", "system"),
            ("archival", "system"),
            ("sparse", "sparse"),
            ("text_only", "sparse"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            required_fields: strings(&[
                "handle",
                "platform",
                "generated_at",
                "data_completeness",
                "true_engagement",
                "audience_authenticity",
                "brand_safety",
                "evidence_vault",
            ]),
            confidence_keys: strings(&["confidence"]),
            strength_keys: strings(&["strength"]),
            pillars: strings(&["true_engagement", "audience_authenticity", "brand_safety"]),
            base_score_key: "signal_strength".to_string(),
            adjusted_score_key: "adjusted_score".to_string(),
            calibration_ceiling: 0.15,
            warning_map,
            allowed_domains: strings(&[
                "instagram.com",
                "tiktok.com",
                "youtube.com",
                "twitter.com",
                "facebook.com",
                "linkedin.com",
            ]),
            overconfident_terms: strings(&[
                "definitely",
                "clearly indicates",
                "obviously",
                "certainly proves",
                "undeniably",
                "absolutely confirms",
                "guaranteed",
                "without a doubt",
            ]),
            uncertainty_terms: strings(&[
                "uncertain",
                "unknown",
                "limited",
                "partial",
                "insufficient",
                "inconclusive",
                "incomplete",
                "unavailable",
                "restricted",
                "cannot determine",
                "advisory",
                "may indicate",
                "estimate",
            ]),
            score_keys: strings(&["score", "signal_strength", "adjusted_score"]),
            full_state: "full".to_string(),
            unavailable_state: "unavailable".to_string(),
        }
    }
}

/// A rule: a named predicate over a document.
pub type RuleFn = fn(&ReportDocument, &CheckConfig) -> CheckOutcome;

#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub eval: RuleFn,
}

/// Ordered list of rules plus their shared configuration.
pub struct CheckRegistry {
    config: CheckConfig,
    rules: Vec<Rule>,
}

impl CheckRegistry {
    /// The standard battery, in reporting order.
    pub fn standard(config: CheckConfig) -> Self {
        let rules = vec![
            Rule {
                name: schema::NAME,
                eval: schema::check,
            },
            Rule {
                name: bounds::NAME,
                eval: bounds::check,
            },
            Rule {
                name: warning::NAME,
                eval: warning::check,
            },
            Rule {
                name: calibration::NAME,
                eval: calibration::check,
            },
            Rule {
                name: pii::NAME,
                eval: pii::check,
            },
            Rule {
                name: language::NAME,
                eval: language::check,
            },
        ];
        Self::with_rules(config, rules)
    }

    pub fn with_rules(config: CheckConfig, rules: Vec<Rule>) -> Self {
        Self { config, rules }
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Evaluate every rule, in order, without short-circuiting.
    pub fn evaluate(&self, doc: &ReportDocument) -> Vec<CheckOutcome> {
        self.rules
            .iter()
            .map(|rule| {
                let outcome = (rule.eval)(doc, &self.config);
                if !outcome.passed {
                    tracing::debug!(check = rule.name, detail = %outcome.detail, "Check failed");
                }
                outcome
            })
            .collect()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::standard(CheckConfig::default())
    }
}

/// `key` equals one of `names` or ends with `_<name>`.
pub(crate) fn key_matches(key: &str, names: &[String]) -> bool {
    names.iter().any(|name| {
        key == name
            || key
                .strip_suffix(name.as_str())
                .is_some_and(|prefix| prefix.ends_with('_'))
    })
}

/// `term` occurs in `text` with no alphanumeric character directly on either
/// side, so `blocked` matches `platform_blocked` but not `unblocked`.
pub(crate) fn contains_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    text.match_indices(term).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Depth-first walk over every value, with its JSON path and owning key.
pub(crate) fn walk<'a, F>(value: &'a Value, path: &str, key: Option<&'a str>, visit: &mut F)
where
    F: FnMut(&str, Option<&'a str>, &'a Value),
{
    visit(path, key, value);
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                walk(v, &format!("{}/{}", path, k), Some(k.as_str()), visit);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                walk(v, &format!("{}/{}", path, i), key, visit);
            }
        }
        _ => {}
    }
}

/// Walk every top-level field of a document.
pub(crate) fn walk_document<'a, F>(doc: &'a ReportDocument, visit: &mut F)
where
    F: FnMut(&str, Option<&'a str>, &'a Value),
{
    for (k, v) in doc.fields() {
        walk(v, &format!("/{}", k), Some(k.as_str()), visit);
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::api::ReportDocument;
    use serde_json::{json, Value};

    /// A well-formed full-data report that passes every rule.
    pub fn full_report() -> Value {
        json!({
            "id": "rep-1",
            "handle": "nike",
            "platform": "instagram",
            "generated_at": "2026-10-19T10:00:00Z",
            "methodology_version": "1.2",
            "data_completeness": "full",
            "true_engagement": {
                "score": 72.0, "signal_strength": 72.0, "adjusted_score": 75.0,
                "confidence": 0.82, "flags": [], "evidence_links": ["ev-1"]
            },
            "audience_authenticity": {
                "score": 64.0, "signal_strength": 64.0, "adjusted_score": 60.0,
                "confidence": 0.71, "flags": [], "evidence_links": []
            },
            "brand_safety": {
                "score": 90.0, "signal_strength": 90.0,
                "confidence": 0.9, "flags": [], "evidence_links": []
            },
            "evidence_vault": [
                {
                    "evidence_id": "ev-1",
                    "type": "post",
                    "source_url": "https://www.instagram.com/p/abc123/",
                    "excerpt": "Engagement pattern may indicate organic reach; assessment is advisory.",
                    "timestamp": "2026-10-01T08:00:00Z"
                }
            ],
            "is_archival": false,
            "warning_banners": []
        })
    }

    pub fn doc(value: Value) -> ReportDocument {
        ReportDocument::from_value(value).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{doc, full_report};
    use super::*;

    #[test]
    fn test_key_matches_exact_and_suffix() {
        let names = vec!["confidence".to_string()];
        assert!(key_matches("confidence", &names));
        assert!(key_matches("original_confidence", &names));
        assert!(!key_matches("confidences", &names));
        assert!(!key_matches("lowconfidence", &names));
    }

    #[test]
    fn test_contains_term_respects_word_boundaries() {
        assert!(contains_term("blocked", "blocked"));
        assert!(contains_term("comments blocked: limited", "blocked"));
        assert!(contains_term("platform_blocked", "blocked"));
        assert!(contains_term("this may indicate reach", "may indicate"));
        assert!(!contains_term("unblocked", "blocked"));
        assert!(!contains_term("unlimited reach", "limited"));
        assert!(!contains_term("blockedness", "blocked"));
        assert!(contains_term("unblocked, then blocked", "blocked"));
        assert!(!contains_term("anything", ""));
    }

    #[test]
    fn test_standard_registry_order() {
        let registry = CheckRegistry::default();
        assert_eq!(
            registry.names(),
            vec![
                "schema_completeness",
                "value_bounds",
                "warning_mapping",
                CALIBRATION_CHECK,
                PII_CHECK,
                "uncertainty_language"
            ]
        );
    }

    #[test]
    fn test_full_report_passes_every_rule() {
        let outcomes = CheckRegistry::default().evaluate(&doc(full_report()));
        for o in &outcomes {
            assert!(o.passed, "{} failed: {}", o.check, o.detail);
        }
        assert_eq!(outcomes.len(), 6);
    }

    #[test]
    fn test_failures_do_not_short_circuit() {
        let mut report = full_report();
        report.as_object_mut().unwrap().remove("handle");
        report["true_engagement"]["confidence"] = serde_json::json!(1.7);
        let outcomes = CheckRegistry::default().evaluate(&doc(report));
        assert_eq!(outcomes.len(), 6);
        assert!(!outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert!(outcomes[4].passed);
    }

    #[test]
    fn test_from_findings_summarises_first() {
        let o = CheckOutcome::from_findings(
            "x",
            vec![Finding::new("/a", "bad"), Finding::new("/b", "worse")],
            "ok",
        );
        assert!(!o.passed);
        assert_eq!(o.detail, "2 violation(s); first: /a: bad");
    }
}
