//! Designer agent: topic in, self-contained HTML markup out.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::parse::{Parsed, extract_markup};
use crate::core::platform::Platform;
use crate::core::types::{DesignArtifact, Topic};
use crate::io::brand::load_reference_images;
use crate::io::provider::{Provider, Role};

use super::AgentContext;

/// Markup responses are long; give the designer more room than the text roles.
pub const DESIGN_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone)]
pub struct DesignerAgent {
    ctx: AgentContext,
    templates_dir: PathBuf,
    max_reference_images: usize,
}

impl DesignerAgent {
    pub(crate) fn new(
        ctx: AgentContext,
        templates_dir: PathBuf,
        max_reference_images: usize,
    ) -> Self {
        Self {
            ctx,
            templates_dir,
            max_reference_images,
        }
    }

    /// First design for a topic, sized to the platform's canvas.
    ///
    /// Reference images from `<templates_dir>/<platform>/` are attached when
    /// present. A response without recognizable markup is kept verbatim and
    /// reported as a fallback.
    #[instrument(skip_all, fields(platform = %platform))]
    pub fn create<P: Provider>(
        &self,
        provider: &P,
        topic: &Topic,
        platform: Platform,
    ) -> Result<Parsed<DesignArtifact>> {
        let images =
            load_reference_images(&self.templates_dir, platform, self.max_reference_images);
        let prompt = self.ctx.prompts.build_design(
            &self.ctx.brand,
            platform,
            topic.as_str(),
            images.len(),
        )?;
        let raw = self
            .ctx
            .generate(provider, Role::Design, prompt, images, DESIGN_MAX_TOKENS)?;
        let design = extract_markup(&raw).map(|markup| DesignArtifact {
            markup,
            dimensions: platform.dimensions(),
        });
        log_outcome(&design, "design created");
        Ok(design)
    }

    /// Rework `prior` according to `feedback`. Dimensions carry over unchanged.
    #[instrument(skip_all, fields(platform = %platform))]
    pub fn revise<P: Provider>(
        &self,
        provider: &P,
        platform: Platform,
        prior: &DesignArtifact,
        feedback: &str,
    ) -> Result<Parsed<DesignArtifact>> {
        let prompt = self
            .ctx
            .prompts
            .build_design_revision(&self.ctx.brand, platform, prior, feedback)?;
        let raw = self
            .ctx
            .generate(provider, Role::Design, prompt, Vec::new(), DESIGN_MAX_TOKENS)?;
        let design = extract_markup(&raw).map(|markup| DesignArtifact {
            markup,
            dimensions: prior.dimensions,
        });
        log_outcome(&design, "design revised");
        Ok(design)
    }
}

fn log_outcome(design: &Parsed<DesignArtifact>, message: &str) {
    let artifact = design.as_inner();
    if design.is_fallback() {
        warn!(bytes = artifact.markup.len(), "designer returned no markup; keeping raw text");
    } else {
        info!(bytes = artifact.markup.len(), dimensions = %artifact.dimensions, "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Dimensions;
    use crate::test_support::{ScriptedProvider, design_response, test_crew};

    fn topic() -> Topic {
        Topic::new("Morning routine tips").expect("topic")
    }

    #[test]
    fn create_uses_platform_dimensions() {
        let provider = ScriptedProvider::new().with(Role::Design, design_response("Hello"));
        let crew = test_crew();

        let design = crew
            .designer
            .create(&provider, &topic(), Platform::LinkedIn)
            .expect("create");

        assert!(!design.is_fallback());
        assert_eq!(design.as_inner().dimensions, Dimensions::new(1200, 627));
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, DESIGN_MAX_TOKENS);
        assert!(requests[0].prompt.contains("Morning routine tips"));
        assert!(requests[0].images.is_empty());
    }

    #[test]
    fn create_keeps_raw_text_when_no_markup() {
        let provider = ScriptedProvider::new().with(Role::Design, "Sorry, no design today.");
        let design = test_crew()
            .designer
            .create(&provider, &topic(), Platform::Instagram)
            .expect("create");

        assert!(design.is_fallback());
        assert_eq!(design.into_inner().markup, "Sorry, no design today.");
    }

    #[test]
    fn revise_keeps_prior_dimensions_and_sends_feedback() {
        let provider = ScriptedProvider::new().with(Role::Design, design_response("Bigger"));
        let prior = DesignArtifact {
            markup: design_response("Small"),
            dimensions: Dimensions::new(640, 480),
        };

        let design = test_crew()
            .designer
            .revise(&provider, Platform::Instagram, &prior, "Make the headline larger")
            .expect("revise");

        assert_eq!(design.as_inner().dimensions, Dimensions::new(640, 480));
        assert!(design.as_inner().markup.contains("Bigger"));
        let prompt = &provider.requests()[0].prompt;
        assert!(prompt.contains("Make the headline larger"));
        assert!(prompt.contains("Small"));
    }

    #[test]
    fn provider_failure_propagates() {
        let provider = ScriptedProvider::new().with_error(Role::Design, "overloaded");
        let err = test_crew()
            .designer
            .create(&provider, &topic(), Platform::Instagram)
            .unwrap_err();
        assert!(err.to_string().contains("design provider call"));
    }
}
