//! Decision authority: quick triage of audits and the holistic final review.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::gate::{QuickDecision, quick_decision};
use crate::core::parse::Parsed;
use crate::core::platform::Platform;
use crate::core::types::{AuditReport, DecisionVerdict, PostDraft};
use crate::core::verdict::{apply_concern_override, verdict_from_response};
use crate::io::provider::{Provider, Role};

use super::{AgentContext, TEXT_MAX_TOKENS};

#[derive(Debug, Clone)]
pub struct ManagerAgent {
    ctx: AgentContext,
}

impl ManagerAgent {
    pub(crate) fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// Triage the first audit of a run. No provider call.
    pub fn quick_decision(&self, audit: &AuditReport) -> QuickDecision {
        let decision = quick_decision(audit);
        info!(
            score = audit.overall_score,
            approved = audit.approved,
            decision = ?decision,
            "{}",
            decision.reason()
        );
        decision
    }

    /// Holistic review of an audited draft.
    ///
    /// An approval that lists a serious concern is turned into a revise
    /// verdict before it is returned.
    #[instrument(skip_all, fields(platform = %platform, audit_score = audit.overall_score))]
    pub fn review<P: Provider>(
        &self,
        provider: &P,
        platform: Platform,
        draft: &PostDraft,
        audit: &AuditReport,
    ) -> Result<Parsed<DecisionVerdict>> {
        let prompt = self.ctx.prompts.build_review(
            &self.ctx.brand,
            platform,
            &draft.design,
            &draft.copy,
            audit,
        )?;
        let raw = self
            .ctx
            .generate(provider, Role::Review, prompt, Vec::new(), TEXT_MAX_TOKENS)?;
        let parsed = verdict_from_response(&raw);
        if parsed.is_fallback() {
            warn!("review response unparsable; requesting a manual revision");
        }
        let verdict = parsed.map(|verdict| {
            let (verdict, overridden) = apply_concern_override(verdict);
            if overridden {
                info!(concerns = ?verdict.concerns, "approval overridden by serious concerns");
            }
            verdict
        });
        let inner = verdict.as_inner();
        info!(
            decision = ?inner.decision,
            score = inner.manager_score,
            "review complete"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Decision, RevisionTarget};
    use crate::core::verdict::OVERRIDE_NOTE;
    use crate::test_support::{
        ScriptedProvider, even_breakdown, sample_draft, test_crew, verdict_response,
    };

    fn audit(score: u8, approved: bool) -> AuditReport {
        AuditReport {
            overall_score: score,
            breakdown: even_breakdown(score / 4),
            issues: Vec::new(),
            approved,
            feedback: "ok".to_string(),
            improvements: Vec::new(),
            strengths: Vec::new(),
        }
    }

    #[test]
    fn quick_decision_boundaries() {
        let manager = test_crew().manager;
        assert_eq!(manager.quick_decision(&audit(95, true)), QuickDecision::FastApprove);
        assert_eq!(manager.quick_decision(&audit(94, true)), QuickDecision::FullReview);
        assert_eq!(manager.quick_decision(&audit(70, false)), QuickDecision::FullReview);
        assert_eq!(manager.quick_decision(&audit(69, false)), QuickDecision::FastReject);
    }

    #[test]
    fn review_approves_without_concerns() {
        let provider = ScriptedProvider::new()
            .with(Role::Review, verdict_response("approve", 90, &[], None, None));
        let verdict = test_crew()
            .manager
            .review(
                &provider,
                Platform::Instagram,
                &sample_draft(Platform::Instagram),
                &audit(88, true),
            )
            .expect("review")
            .into_inner();

        assert_eq!(verdict.decision, Decision::Approve);
        assert_eq!(verdict.manager_score, 90);
    }

    #[test]
    fn review_overrides_approval_with_serious_concern() {
        let provider = ScriptedProvider::new().with(
            Role::Review,
            verdict_response("approve", 85, &["Súlyos probléma a logóval"], None, None),
        );
        let verdict = test_crew()
            .manager
            .review(
                &provider,
                Platform::Instagram,
                &sample_draft(Platform::Instagram),
                &audit(88, true),
            )
            .expect("review")
            .into_inner();

        assert_eq!(verdict.decision, Decision::Revise);
        assert!(verdict.feedback.ends_with(OVERRIDE_NOTE));
    }

    #[test]
    fn unparsable_review_requests_both_revisions() {
        let provider = ScriptedProvider::new().with(Role::Review, "I like it");
        let verdict = test_crew()
            .manager
            .review(
                &provider,
                Platform::LinkedIn,
                &sample_draft(Platform::LinkedIn),
                &audit(85, true),
            )
            .expect("review");

        assert!(verdict.is_fallback());
        let verdict = verdict.into_inner();
        assert_eq!(verdict.decision, Decision::Revise);
        assert!(matches!(verdict.revision_targets, RevisionTarget::Both(_, _)));
    }
}
