//! Quality auditor: scores a draft against the weighted rubric.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::gate::audit_from_response;
use crate::core::parse::Parsed;
use crate::core::platform::Platform;
use crate::core::types::{AuditReport, PostDraft};
use crate::io::provider::{Provider, Role};

use super::{AgentContext, TEXT_MAX_TOKENS};

#[derive(Debug, Clone)]
pub struct AuditorAgent {
    ctx: AgentContext,
}

impl AuditorAgent {
    pub(crate) fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    /// One provider call carrying the full rubric. The approval floor is
    /// enforced on the parsed report; an unparsable response yields a zero
    /// score that is never approved.
    #[instrument(skip_all, fields(platform = %platform))]
    pub fn audit<P: Provider>(
        &self,
        provider: &P,
        platform: Platform,
        draft: &PostDraft,
    ) -> Result<Parsed<AuditReport>> {
        let prompt = self
            .ctx
            .prompts
            .build_audit(&self.ctx.brand, platform, &draft.design, &draft.copy)?;
        let raw = self
            .ctx
            .generate(provider, Role::Audit, prompt, Vec::new(), TEXT_MAX_TOKENS)?;
        let report = audit_from_response(&raw);
        if report.is_fallback() {
            warn!("audit response unparsable; treating as not approved");
        }
        let audit = report.as_inner();
        info!(
            score = audit.overall_score,
            approved = audit.approved,
            issues = audit.issues.len(),
            "audit complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedProvider, audit_response, sample_draft, test_crew};

    #[test]
    fn floor_overrides_provider_approval() {
        let provider = ScriptedProvider::new().with(Role::Audit, audit_response(79, true, &[]));
        let report = test_crew()
            .auditor
            .audit(&provider, Platform::Instagram, &sample_draft(Platform::Instagram))
            .expect("audit");

        let report = report.into_inner();
        assert_eq!(report.overall_score, 79);
        assert!(!report.approved);
    }

    #[test]
    fn prompt_carries_rubric_and_draft() {
        let provider = ScriptedProvider::new().with(Role::Audit, audit_response(88, true, &[]));
        let report = test_crew()
            .auditor
            .audit(&provider, Platform::LinkedIn, &sample_draft(Platform::LinkedIn))
            .expect("audit");

        assert!(report.as_inner().approved);
        let prompt = &provider.requests()[0].prompt;
        assert!(prompt.contains("brandAlignment"));
        assert!(prompt.contains("#morning #routine"));
        assert!(prompt.contains("<h1>Morning</h1>"));
    }

    #[test]
    fn prose_response_falls_back_to_unapproved() {
        let provider = ScriptedProvider::new().with(Role::Audit, "Looks great to me!");
        let report = test_crew()
            .auditor
            .audit(&provider, Platform::Instagram, &sample_draft(Platform::Instagram))
            .expect("audit");

        assert!(report.is_fallback());
        assert_eq!(report.as_inner().overall_score, 0);
        assert!(!report.as_inner().approved);
    }
}
