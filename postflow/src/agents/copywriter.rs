//! Copywriter agent: caption, hashtags, hook and call to action.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::parse::{Parsed, copy_from_response};
use crate::core::platform::Platform;
use crate::core::types::{CopyArtifact, Topic};
use crate::io::provider::{Provider, Role};

use super::{AgentContext, TEXT_MAX_TOKENS};

#[derive(Debug, Clone)]
pub struct CopywriterAgent {
    ctx: AgentContext,
}

impl CopywriterAgent {
    pub(crate) fn new(ctx: AgentContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip_all, fields(platform = %platform))]
    pub fn create<P: Provider>(
        &self,
        provider: &P,
        topic: &Topic,
        platform: Platform,
    ) -> Result<Parsed<CopyArtifact>> {
        let prompt = self
            .ctx
            .prompts
            .build_copy(&self.ctx.brand, platform, topic.as_str())?;
        let raw = self
            .ctx
            .generate(provider, Role::Copy, prompt, Vec::new(), TEXT_MAX_TOKENS)?;
        let copy = copy_from_response(&raw);
        log_outcome(&copy, platform);
        Ok(copy)
    }

    #[instrument(skip_all, fields(platform = %platform))]
    pub fn revise<P: Provider>(
        &self,
        provider: &P,
        platform: Platform,
        prior: &CopyArtifact,
        feedback: &str,
    ) -> Result<Parsed<CopyArtifact>> {
        let prompt = self
            .ctx
            .prompts
            .build_copy_revision(&self.ctx.brand, platform, prior, feedback)?;
        let raw = self
            .ctx
            .generate(provider, Role::Copy, prompt, Vec::new(), TEXT_MAX_TOKENS)?;
        let copy = copy_from_response(&raw);
        log_outcome(&copy, platform);
        Ok(copy)
    }
}

fn log_outcome(copy: &Parsed<CopyArtifact>, platform: Platform) {
    let artifact = copy.as_inner();
    let chars = artifact.caption_with_hashtags().chars().count();
    if copy.is_fallback() {
        warn!(chars, "copy response was not JSON; using raw text as the caption");
    } else {
        info!(chars, hashtags = artifact.hashtags.len(), "copy ready");
    }
    let rules = platform.rules();
    if chars > rules.caption_max_chars {
        warn!(chars, max = rules.caption_max_chars, "caption exceeds platform limit");
    }
}
