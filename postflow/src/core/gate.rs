//! Audit floor and quick-decision thresholds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::parse::{
    Parsed, de_flag, de_score, de_score_map, de_string_list, de_text, parse_json_lenient,
};
use crate::core::types::AuditReport;

/// Reports scoring below this can never be approved.
pub const AUDIT_APPROVAL_FLOOR: u8 = 80;
/// Approved reports at or above this skip the full manager review.
pub const FAST_APPROVE_SCORE: u8 = 95;
/// Reports below this go straight to revision without a manager review.
pub const FAST_REJECT_BELOW: u8 = 70;

/// Weighted rubric categories the auditor scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubricCategory {
    BrandAlignment,
    Quality,
    PlatformOptimization,
    LanguageCorrectness,
}

impl RubricCategory {
    pub const ALL: [RubricCategory; 4] = [
        RubricCategory::BrandAlignment,
        RubricCategory::Quality,
        RubricCategory::PlatformOptimization,
        RubricCategory::LanguageCorrectness,
    ];

    /// Key used in the audit breakdown.
    pub fn key(self) -> &'static str {
        match self {
            RubricCategory::BrandAlignment => "brandAlignment",
            RubricCategory::Quality => "quality",
            RubricCategory::PlatformOptimization => "platformOptimization",
            RubricCategory::LanguageCorrectness => "languageCorrectness",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RubricCategory::BrandAlignment => "Brand alignment",
            RubricCategory::Quality => "Content quality",
            RubricCategory::PlatformOptimization => "Platform optimization",
            RubricCategory::LanguageCorrectness => "Language correctness",
        }
    }

    /// Maximum points of the category; the weights sum to 100.
    pub fn weight(self) -> u8 {
        match self {
            RubricCategory::BrandAlignment | RubricCategory::Quality => 30,
            RubricCategory::PlatformOptimization | RubricCategory::LanguageCorrectness => 20,
        }
    }
}

/// Audit as the provider delivers it, before the floor is applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAudit {
    #[serde(default, deserialize_with = "de_score", alias = "score")]
    overall_score: u8,
    #[serde(default, deserialize_with = "de_score_map")]
    breakdown: BTreeMap<String, u8>,
    #[serde(default, deserialize_with = "de_string_list")]
    issues: Vec<String>,
    #[serde(default, deserialize_with = "de_flag")]
    approved: Option<bool>,
    #[serde(default, deserialize_with = "de_text")]
    feedback: String,
    #[serde(default, deserialize_with = "de_string_list")]
    improvements: Vec<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    strengths: Vec<String>,
}

/// Approval after the floor: below 80 never passes, an explicit `false` blocks,
/// and an omitted claim passes at or above the floor.
pub fn apply_audit_floor(overall_score: u8, claimed: Option<bool>) -> bool {
    overall_score >= AUDIT_APPROVAL_FLOOR && claimed != Some(false)
}

impl AuditReport {
    fn from_raw(raw: RawAudit) -> Self {
        Self {
            approved: apply_audit_floor(raw.overall_score, raw.approved),
            overall_score: raw.overall_score,
            breakdown: raw.breakdown,
            issues: raw.issues,
            feedback: raw.feedback,
            improvements: raw.improvements,
            strengths: raw.strengths,
        }
    }
}

/// Report returned when the audit response cannot be parsed.
pub fn audit_fallback() -> AuditReport {
    AuditReport {
        overall_score: 0,
        breakdown: BTreeMap::new(),
        issues: vec!["unparsable audit response".to_string()],
        approved: false,
        feedback: "The audit response could not be parsed; manual review needed.".to_string(),
        improvements: Vec::new(),
        strengths: Vec::new(),
    }
}

/// Parse an audit response and enforce the approval floor.
pub fn audit_from_response(raw: &str) -> Parsed<AuditReport> {
    match parse_json_lenient::<RawAudit>(raw) {
        Some(parsed) => Parsed::Parsed(AuditReport::from_raw(parsed)),
        None => Parsed::Fallback(audit_fallback()),
    }
}

/// Shortcut taken after the first audit of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuickDecision {
    FastApprove,
    FastReject,
    FullReview,
}

impl QuickDecision {
    pub fn reason(self) -> &'static str {
        match self {
            QuickDecision::FastApprove => "excellent audit score, full review skipped",
            QuickDecision::FastReject => "audit score too low, revising before review",
            QuickDecision::FullReview => "audit score needs a holistic review",
        }
    }
}

pub fn quick_decision(report: &AuditReport) -> QuickDecision {
    if report.overall_score >= FAST_APPROVE_SCORE && report.approved {
        QuickDecision::FastApprove
    } else if report.overall_score < FAST_REJECT_BELOW {
        QuickDecision::FastReject
    } else {
        QuickDecision::FullReview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(score: u8, approved: bool) -> AuditReport {
        AuditReport {
            overall_score: score,
            approved,
            ..audit_fallback()
        }
    }

    #[test]
    fn floor_overrides_provider_claim() {
        let parsed = audit_from_response(r#"{"overallScore": 79, "approved": true}"#);
        let report = parsed.into_inner();
        assert_eq!(report.overall_score, 79);
        assert!(!report.approved);
    }

    #[test]
    fn floor_approves_when_claim_omitted() {
        let report = audit_from_response(r#"{"overallScore": 80}"#).into_inner();
        assert!(report.approved);
    }

    #[test]
    fn explicit_rejection_blocks_approval() {
        let report =
            audit_from_response(r#"{"overallScore": 88, "approved": false}"#).into_inner();
        assert!(!report.approved);
    }

    #[test]
    fn floor_holds_for_every_score() {
        for score in 0..=100u8 {
            for claim in [None, Some(true), Some(false)] {
                let approved = apply_audit_floor(score, claim);
                if score < AUDIT_APPROVAL_FLOOR {
                    assert!(!approved, "score {score} must not pass");
                } else {
                    assert_eq!(approved, claim != Some(false), "score {score} claim {claim:?}");
                }
            }
        }
    }

    #[test]
    fn tolerates_loose_field_types() {
        let raw = r#"Audit done:
        {
          "overallScore": "86.6",
          "breakdown": {"brandAlignment": 27.4, "quality": "25"},
          "issues": "Slightly long caption",
          "approved": "true",
          "improvements": ["Shorten caption",],
        }"#;
        let parsed = audit_from_response(raw);
        assert!(!parsed.is_fallback());
        let report = parsed.into_inner();
        assert_eq!(report.overall_score, 87);
        assert_eq!(report.breakdown.get("brandAlignment"), Some(&27));
        assert_eq!(report.breakdown.get("quality"), Some(&25));
        assert_eq!(report.issues, vec!["Slightly long caption".to_string()]);
        assert!(report.approved);
    }

    #[test]
    fn unparsable_audit_falls_back_to_rejection() {
        let parsed = audit_from_response("The design looks great!");
        assert!(parsed.is_fallback());
        let report = parsed.into_inner();
        assert_eq!(report.overall_score, 0);
        assert!(!report.approved);
    }

    #[test]
    fn quick_decision_boundaries() {
        assert_eq!(quick_decision(&report(95, true)), QuickDecision::FastApprove);
        assert_eq!(quick_decision(&report(95, false)), QuickDecision::FullReview);
        assert_eq!(quick_decision(&report(94, true)), QuickDecision::FullReview);
        assert_eq!(quick_decision(&report(70, false)), QuickDecision::FullReview);
        assert_eq!(quick_decision(&report(69, false)), QuickDecision::FastReject);
    }

    #[test]
    fn rubric_weights_sum_to_hundred() {
        let total: u32 = RubricCategory::ALL.iter().map(|c| u32::from(c.weight())).sum();
        assert_eq!(total, 100);
    }
}
