//! Parsing of the plain-text self-test report.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::domain::diagnostics::DiagnosticsError;

static TEST_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").unwrap());
static TEST_RESULT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Test Results\s*:\s*(\w+)").unwrap());

pub fn score(result: &str) -> u8 {
    match result {
        "Pass" => 2,
        "Warning" => 1,
        _ => 0,
    }
}

/// Extracts `test name -> score`. A bracketed marker names the current test,
/// which is carried over lines until a `Test Results : <verdict>` line scores it.
pub fn parse_report(text: &str) -> BTreeMap<String, u8> {
    let mut scores = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if let Some(result) = TEST_RESULT.captures(line) {
            if let Some(test) = &current {
                scores.insert(test.clone(), score(&result[1]));
            }
        } else if let Some(marker) = TEST_MARKER.captures(line) {
            current = Some(marker[1].trim().to_string());
        }
    }
    scores
}

/// Passes when every test scored above zero; otherwise names all failures.
pub fn check_scores(scores: &BTreeMap<String, u8>) -> Result<(), DiagnosticsError> {
    if scores.is_empty() {
        return Err(DiagnosticsError::EmptyReport);
    }

    let failed: Vec<String> = scores.iter().filter(|(_, score)| **score == 0).map(|(test, _)| test.clone()).collect();
    if failed.is_empty() { Ok(()) } else { Err(DiagnosticsError::TestsFailed(failed)) }
}
