//! Manager verdicts, the serious-concern override, and revision feedback.

use serde::Deserialize;

use crate::core::parse::{Parsed, de_score, de_string_list, de_text, parse_json_lenient};
use crate::core::types::{
    AuditReport, Decision, DecisionVerdict, FeedbackSource, RevisionRequest, RevisionTarget,
};

/// Words that mark a concern as a real problem rather than a nitpick.
///
/// Matched case-insensitively as substrings, in English and Hungarian.
pub const SERIOUS_CONCERN_MARKERS: [&str; 8] = [
    "error",
    "problem",
    "bad",
    "wrong",
    "mistake",
    "hiba",
    "probléma",
    "rossz",
];

pub const OVERRIDE_NOTE: &str = "(automatically revised: serious concerns raised)";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    #[serde(default, deserialize_with = "de_text")]
    decision: String,
    #[serde(default, deserialize_with = "de_score", alias = "score")]
    manager_score: u8,
    #[serde(default, deserialize_with = "de_text")]
    feedback: String,
    #[serde(default, deserialize_with = "de_string_list")]
    concerns: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    strengths: Vec<String>,
    #[serde(default, deserialize_with = "de_text")]
    first_impression: String,
    #[serde(default, alias = "revisionTargets")]
    revision_needed: Option<RawTargets>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTargets {
    #[serde(deserialize_with = "de_text")]
    design: String,
    #[serde(deserialize_with = "de_text")]
    copy: String,
}

fn parse_decision(raw: &str) -> Decision {
    match raw.trim().to_lowercase().as_str() {
        "approve" | "approved" => Decision::Approve,
        _ => Decision::Revise,
    }
}

impl DecisionVerdict {
    fn from_raw(raw: RawVerdict) -> Self {
        let targets = raw.revision_needed.unwrap_or_default();
        Self {
            decision: parse_decision(&raw.decision),
            manager_score: raw.manager_score,
            feedback: raw.feedback,
            concerns: raw.concerns,
            strengths: raw.strengths,
            first_impression: raw.first_impression,
            revision_targets: RevisionTarget::from_parts(
                Some(&targets.design),
                Some(&targets.copy),
            ),
        }
    }
}

pub fn is_serious_concern(concern: &str) -> bool {
    let lower = concern.to_lowercase();
    SERIOUS_CONCERN_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Downgrade an approval that lists a serious concern.
///
/// Returns the (possibly changed) verdict and whether the override fired.
pub fn apply_concern_override(mut verdict: DecisionVerdict) -> (DecisionVerdict, bool) {
    if verdict.decision != Decision::Approve
        || !verdict.concerns.iter().any(|c| is_serious_concern(c))
    {
        return (verdict, false);
    }
    verdict.decision = Decision::Revise;
    verdict.feedback = if verdict.feedback.trim().is_empty() {
        OVERRIDE_NOTE.to_string()
    } else {
        format!("{} {OVERRIDE_NOTE}", verdict.feedback.trim_end())
    };
    (verdict, true)
}

/// Verdict returned when the review response cannot be parsed.
pub fn verdict_fallback() -> DecisionVerdict {
    DecisionVerdict {
        decision: Decision::Revise,
        manager_score: 0,
        feedback: "The review response could not be parsed; check the post manually.".to_string(),
        concerns: vec!["unparsable review response".to_string()],
        strengths: Vec::new(),
        first_impression: String::new(),
        revision_targets: RevisionTarget::Both(
            "Check the design manually.".to_string(),
            "Check the copy manually.".to_string(),
        ),
    }
}

/// Parse a review response. The serious-concern override is applied by the caller.
pub fn verdict_from_response(raw: &str) -> Parsed<DecisionVerdict> {
    match parse_json_lenient::<RawVerdict>(raw) {
        Some(parsed) => Parsed::Parsed(DecisionVerdict::from_raw(parsed)),
        None => Parsed::Fallback(verdict_fallback()),
    }
}

/// Approving verdict synthesized for a fast-approved audit.
pub fn fast_approve_verdict(audit: &AuditReport) -> DecisionVerdict {
    DecisionVerdict {
        decision: Decision::Approve,
        manager_score: audit.overall_score,
        feedback: "Excellent audit score, approved without a full review.".to_string(),
        concerns: Vec::new(),
        strengths: audit.strengths.clone(),
        first_impression: String::new(),
        revision_targets: RevisionTarget::None,
    }
}

const GENERIC_DESIGN_FIX: &str = "Improve the visual quality and brand alignment of the design.";
const GENERIC_COPY_FIX: &str = "Improve the clarity and engagement of the copy.";

fn mentions_design(text: &str) -> bool {
    text.to_lowercase().contains("design")
}

fn mentions_copy(text: &str) -> bool {
    let lower = text.to_lowercase();
    ["text", "copy", "caption", "szöveg"]
        .iter()
        .any(|word| lower.contains(word))
}

impl RevisionRequest {
    /// Feedback from a revise verdict. A verdict naming no target revises both artifacts.
    pub fn from_verdict(verdict: &DecisionVerdict) -> Self {
        let targets = if verdict.revision_targets.is_none() {
            let text = if verdict.concerns.is_empty() {
                verdict.feedback.clone()
            } else {
                verdict.concerns.join(", ")
            };
            RevisionTarget::Both(text.clone(), text)
        } else {
            verdict.revision_targets.clone()
        };
        Self {
            source: FeedbackSource::Review,
            reason: verdict.feedback.clone(),
            targets,
        }
    }
}

/// Feedback synthesized from a failed re-audit.
///
/// The design target is the first improvement mentioning the design; the copy
/// target is the first one mentioning the text, else the first improvement,
/// else the audit feedback.
pub fn request_from_audit(audit: &AuditReport) -> RevisionRequest {
    let design = audit
        .improvements
        .iter()
        .find(|item| mentions_design(item))
        .map(String::as_str);
    let copy = audit
        .improvements
        .iter()
        .find(|item| mentions_copy(item))
        .or_else(|| audit.improvements.first())
        .map(String::as_str)
        .or(Some(audit.feedback.as_str()));

    let mut targets = RevisionTarget::from_parts(design, copy);
    if targets.is_none() {
        targets = RevisionTarget::Copy(GENERIC_COPY_FIX.to_string());
    }
    RevisionRequest {
        source: FeedbackSource::Audit,
        reason: format!("audit score {} below approval", audit.overall_score),
        targets,
    }
}

/// Feedback for a fast-rejected audit: both artifacts, all improvements.
pub fn quick_reject_request(audit: &AuditReport) -> RevisionRequest {
    let targets = if audit.improvements.is_empty() {
        RevisionTarget::Both(GENERIC_DESIGN_FIX.to_string(), GENERIC_COPY_FIX.to_string())
    } else {
        let joined = audit.improvements.join(", ");
        RevisionTarget::Both(joined.clone(), joined)
    };
    RevisionRequest {
        source: FeedbackSource::QuickReject,
        reason: format!("audit score {} too low", audit.overall_score),
        targets,
    }
}
