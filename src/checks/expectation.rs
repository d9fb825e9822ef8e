//! Terminal state versus the test case's expected outcome.
//!
//! Unlike the document rules this one also runs for failed jobs and
//! rejected submissions, where no report exists.

use super::CheckOutcome;
use crate::harness::ExpectedOutcome;

pub const NAME: &str = "expected_outcome";

/// How a case's job ended, as far as the expectation is concerned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Terminal<'a> {
    Completed { completeness: Option<&'a str> },
    Failed { message: &'a str },
    Rejected { status: u16 },
}

impl Terminal<'_> {
    fn describe(&self) -> String {
        match self {
            Terminal::Completed { completeness } => {
                format!("completed ({})", completeness.unwrap_or("no completeness"))
            }
            Terminal::Failed { message } => format!("failed: {}", message),
            Terminal::Rejected { status } => format!("rejected with HTTP {}", status),
        }
    }
}

fn satisfied(expected: ExpectedOutcome, terminal: &Terminal<'_>) -> bool {
    use ExpectedOutcome::*;
    match terminal {
        Terminal::Rejected { .. } => matches!(expected, Rejected | Any),
        Terminal::Failed { .. } => matches!(expected, PartialBlocked | Unavailable | Any),
        Terminal::Completed { completeness } => {
            let state = completeness.unwrap_or("");
            match expected {
                Any => true,
                Rejected => false,
                FullData => state == "full",
                PartialBlocked => !state.is_empty() && state != "full",
                Unavailable => state == "unavailable",
                Sparse => matches!(state, "sparse" | "text_only"),
                Archival => state == "archival",
            }
        }
    }
}

pub fn check_expected_outcome(expected: ExpectedOutcome, terminal: &Terminal<'_>) -> CheckOutcome {
    let detail = format!("expected {}, got {}", expected.as_str(), terminal.describe());
    if satisfied(expected, terminal) {
        CheckOutcome::pass(NAME, detail)
    } else {
        CheckOutcome::fail(NAME, detail)
    }
}
