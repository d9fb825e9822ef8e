//! Sensitive-content absence in the evidence vault.
//!
//! Excerpts are scanned for identifier-shaped substrings and every source
//! URL must point at an allow-listed public platform domain.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

use super::{CheckConfig, CheckOutcome, Finding};
use crate::api::ReportDocument;

pub const NAME: &str = super::PII_CHECK;

static SSN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{3}-\d{4}\b").unwrap());

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b").unwrap());

fn patterns() -> [(&'static str, &'static Regex); 4] {
    [
        ("ssn", &*SSN_RE),
        ("email", &*EMAIL_RE),
        ("phone", &*PHONE_RE),
        ("date", &*DATE_RE),
    ]
}

/// Kinds of PII found in `text`, in pattern order.
pub fn scan_text(text: &str) -> Vec<&'static str> {
    patterns()
        .into_iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(kind, _)| kind)
        .collect()
}

/// Host is one of `domains` or a subdomain of one.
pub fn is_public_url(raw: &str, domains: &[String]) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    domains.iter().any(|d| {
        let d = d.to_lowercase();
        host == d || host.ends_with(&format!(".{}", d))
    })
}

pub fn check(doc: &ReportDocument, config: &CheckConfig) -> CheckOutcome {
    let evidence = doc.evidence();
    let mut findings = Vec::new();

    for (i, item) in evidence.iter().enumerate() {
        let excerpt = item.get("excerpt").and_then(Value::as_str).unwrap_or("");
        for kind in scan_text(excerpt) {
            findings.push(Finding::new(
                format!("/evidence_vault/{}/excerpt", i),
                format!("excerpt matches {} pattern", kind),
            ));
        }

        let source = item.get("source_url").and_then(Value::as_str).unwrap_or("");
        if !source.is_empty() && !is_public_url(source, &config.allowed_domains) {
            findings.push(Finding::new(
                format!("/evidence_vault/{}/source_url", i),
                format!("source '{}' is not an allow-listed public domain", source),
            ));
        }
    }

    CheckOutcome::from_findings(
        NAME,
        findings,
        format!("{} evidence item(s) clean", evidence.len()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::fixtures::{doc, full_report};
    use serde_json::json;

    fn with_evidence(items: Value) -> ReportDocument {
        let mut report = full_report();
        report["evidence_vault"] = items;
        doc(report)
    }

    #[test]
    fn test_scan_text_kinds() {
        assert_eq!(scan_text("ssn 123-45-6789"), vec!["ssn"]);
        assert_eq!(scan_text("mail me at a.b@example.org"), vec!["email"]);
        assert_eq!(scan_text("call 555-123-4567"), vec!["phone"]);
        assert_eq!(scan_text("posted 3/14/2024"), vec!["date"]);
        assert!(scan_text("great collab with the brand, 10k likes").is_empty());
    }

    #[test]
    fn test_public_url_allow_list() {
        let domains = CheckConfig::default().allowed_domains;
        assert!(is_public_url("https://www.tiktok.com/@user/video/1", &domains));
        assert!(is_public_url("https://instagram.com/p/x", &domains));
        assert!(!is_public_url("https://instagram.com.evil.io/p/x", &domains));
        assert!(!is_public_url("https://notinstagram.com/p/x", &domains));
        assert!(!is_public_url("file:///etc/passwd", &domains));
        assert!(!is_public_url("not a url", &domains));
    }

    #[test]
    fn test_each_violation_recorded_per_item() {
        let d = with_evidence(json!([
            {"excerpt": "reach me: fan@mail.com or 555-123-4567",
             "source_url": "https://www.instagram.com/p/1"},
            {"excerpt": "fine", "source_url": "https://drive.example.com/private"}
        ]));
        let outcome = check(&d, &CheckConfig::default());
        assert!(!outcome.passed);
        let locations: Vec<_> = outcome.findings.iter().map(|f| f.location.as_str()).collect();
        assert_eq!(
            locations,
            vec![
                "/evidence_vault/0/excerpt",
                "/evidence_vault/0/excerpt",
                "/evidence_vault/1/source_url"
            ]
        );
    }

    #[test]
    fn test_empty_source_url_is_skipped() {
        let d = with_evidence(json!([{"excerpt": "statistic summary", "source_url": ""}]));
        assert!(check(&d, &CheckConfig::default()).passed);
    }
}
