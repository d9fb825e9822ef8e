//! Epistemic language: no overconfident claims, uncertainty stated when the
//! data is incomplete, and no scores fabricated for unavailable data.

use serde_json::Value;

use super::{contains_term, walk_document, CheckConfig, CheckOutcome, Finding};
use crate::api::ReportDocument;

pub const NAME: &str = "uncertainty_language";

/// Keys whose string values are identifiers or tags, not prose.
const NON_PROSE_KEYS: &[&str] = &[
    "id",
    "handle",
    "platform",
    "type",
    "data_completeness",
    "methodology_version",
    "timestamp",
    "evidence_links",
];
const NON_PROSE_SUFFIXES: &[&str] = &["_id", "_url", "_at", "_path"];

fn is_prose_key(key: Option<&str>) -> bool {
    match key {
        None => true,
        Some(k) => {
            !NON_PROSE_KEYS.contains(&k) && !NON_PROSE_SUFFIXES.iter().any(|s| k.ends_with(s))
        }
    }
}

/// Lowercased free-text values with their paths.
pub fn free_text(doc: &ReportDocument) -> Vec<(String, String)> {
    let mut out = Vec::new();
    walk_document(doc, &mut |path, key, value| {
        if let Value::String(s) = value {
            if is_prose_key(key) {
                out.push((path.to_string(), s.to_lowercase()));
            }
        }
    });
    out
}

pub fn check(doc: &ReportDocument, config: &CheckConfig) -> CheckOutcome {
    let text = free_text(doc);
    let state = doc.completeness().unwrap_or("unknown");
    let mut findings = Vec::new();

    for (path, value) in &text {
        for term in &config.overconfident_terms {
            if contains_term(value, term) {
                findings.push(Finding::new(
                    path.as_str(),
                    format!("overconfident term '{}'", term),
                ));
            }
        }
    }

    if state != config.full_state {
        let hedged = text.iter().any(|(_, value)| {
            config
                .uncertainty_terms
                .iter()
                .any(|term| contains_term(value, term))
        });
        if !hedged {
            findings.push(Finding::new(
                "/",
                format!("state '{}' but no uncertainty or advisory language", state),
            ));
        }
    }

    if state == config.unavailable_state {
        for pillar in &config.pillars {
            let Some(block) = doc.get(pillar) else {
                continue;
            };
            for key in &config.score_keys {
                if let Some(v) = block.get(key).and_then(Value::as_f64) {
                    findings.push(
                        Finding::new(
                            format!("/{}/{}", pillar, key),
                            "score reported for unavailable data",
                        )
                        .with_value(v),
                    );
                }
            }
        }
    }

    CheckOutcome::from_findings(
        NAME,
        findings,
        format!("{} free-text value(s) appropriately hedged", text.len()),
    )
}
