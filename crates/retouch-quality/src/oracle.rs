// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Visual judgment oracle: the seam to the vision model, its prompt, and
// parsing of the verdict it returns.

use retouch_core::types::{IssueCategory, QualityIssue, Severity};
use serde::Deserialize;
use thiserror::Error;

/// Instructions given to the vision model with every comparison.
pub const SYSTEM_PROMPT: &str = r#"You are a PDF quality inspector. You will receive two images:
1. ORIGINAL: a region of the original PDF before editing.
2. EDITED: the same region after text was replaced.

Find visual DEFECTS in the EDITED version compared to the ORIGINAL. Look for:
- Table borders or lines that were erased, cut, or partially covered.
- Text that looks misaligned or shifted.
- Font weight (bold vs regular), style (italic) or size that changed.
- Colour differences in text.
- Extra white rectangles or other artefacts.

The TEXT CONTENT is expected to change; that is the edit. Do NOT report the
text change itself. Only report visual or structural damage.

Respond with ONLY valid JSON in this format:
{
  "passed": true/false,
  "issues": [
    {
      "severity": "low|medium|high",
      "category": "border|alignment|font|color|artifact|other",
      "description": "what is wrong",
      "suggestion": "how to fix it"
    }
  ]
}
If no issues are found, return {"passed": true, "issues": []}."#;

/// Text accompanying the two images.
pub const USER_PROMPT: &str = "Compare these two images. The first is the ORIGINAL, the second is the EDITED version.";

/// Failure to obtain a usable verdict.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle is not configured")]
    NotConfigured,

    #[error("oracle request timed out: {0}")]
    Timeout(String),

    #[error("cannot reach oracle: {0}")]
    Connection(String),

    #[error("oracle rejected the credential (HTTP {0})")]
    Unauthorized(u16),

    #[error("oracle returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("oracle response unusable: {0}")]
    InvalidResponse(String),
}

impl OracleError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::NotConfigured | Self::Unauthorized(_) | Self::InvalidResponse(_) => false,
        }
    }
}

/// Compares two PNG renderings of the same region and answers in free text.
pub trait VisualJudge {
    fn judge(&self, original_png: &[u8], edited_png: &[u8]) -> Result<String, OracleError>;
}

/// Parsed verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub passed: bool,
    pub issues: Vec<QualityIssue>,
}

#[derive(Debug, Deserialize)]
struct VerdictWire {
    #[serde(default = "passed_by_default")]
    passed: bool,
    #[serde(default)]
    issues: Vec<IssueWire>,
}

#[derive(Debug, Deserialize)]
struct IssueWire {
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    suggestion: String,
    #[serde(default)]
    category: Option<String>,
}

fn passed_by_default() -> bool {
    true
}

/// Remove a surrounding Markdown code fence, with or without a language tag.
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.rsplit_once("```").map_or(body, |(inner, _)| inner).trim()
}

/// Parse the model's answer. Missing fields take lenient defaults; anything
/// that is not a JSON object is an error.
pub fn parse_verdict(raw: &str) -> Result<Verdict, OracleError> {
    let wire: VerdictWire = serde_json::from_str(strip_fence(raw))
        .map_err(|err| OracleError::InvalidResponse(format!("verdict is not JSON: {err}")))?;

    let issues = wire
        .issues
        .into_iter()
        .map(|issue| QualityIssue {
            severity: Severity::parse_lenient(&issue.severity),
            description: issue.description,
            suggestion: issue.suggestion,
            category: issue.category.as_deref().map(IssueCategory::parse_lenient),
        })
        .collect();

    Ok(Verdict {
        passed: wire.passed,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_verdict() {
        let verdict = parse_verdict(r#"{"passed": true, "issues": []}"#).unwrap();
        assert!(verdict.passed);
        assert!(verdict.issues.is_empty());
    }

    #[test]
    fn fenced_verdict_with_issues() {
        let raw = "```json\n{\"passed\": false, \"issues\": [{\"severity\": \"HIGH\", \"category\": \"border\", \
                   \"description\": \"Bottom rule is cut\", \"suggestion\": \"Redraw it\"}]}\n```";
        let verdict = parse_verdict(raw).unwrap();
        assert!(!verdict.passed);
        assert_eq!(verdict.issues[0].severity, Severity::High);
        assert_eq!(verdict.issues[0].category, Some(IssueCategory::Border));
        assert!(verdict.issues[0].is_border_damage());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let verdict = parse_verdict(r#"{"issues": [{"description": "slight shift"}]}"#).unwrap();
        assert!(verdict.passed);
        assert_eq!(verdict.issues[0].severity, Severity::Low);
        assert_eq!(verdict.issues[0].category, None);
    }

    #[test]
    fn prose_is_rejected() {
        assert!(matches!(
            parse_verdict("Looks fine to me!"),
            Err(OracleError::InvalidResponse(_))
        ));
        assert!(parse_verdict("```\n```").is_err());
    }

    #[test]
    fn transient_errors_are_classified() {
        assert!(OracleError::Timeout("60s".into()).is_transient());
        assert!(OracleError::Http { status: 429, message: String::new() }.is_transient());
        assert!(OracleError::Http { status: 503, message: String::new() }.is_transient());
        assert!(!OracleError::Http { status: 400, message: String::new() }.is_transient());
        assert!(!OracleError::Unauthorized(401).is_transient());
    }
}
