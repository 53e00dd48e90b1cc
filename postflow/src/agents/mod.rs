//! Role agents: designer, copywriter, auditor and manager.
//!
//! Each agent owns its prompt settings and turns one provider call into a
//! typed, tolerant-parsed result. Agents never retry; provider failures are
//! returned to the caller unchanged.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::io::brand::BrandContext;
use crate::io::config::PostflowConfig;
use crate::io::prompt::{PromptBuilder, PromptPack};
use crate::io::provider::{GenerateRequest, Provider, ReferenceImage, Role};

pub mod auditor;
pub mod copywriter;
pub mod designer;
pub mod manager;

pub use auditor::AuditorAgent;
pub use copywriter::CopywriterAgent;
pub use designer::DesignerAgent;
pub use manager::ManagerAgent;

/// Output budget for text roles (copy, audit, review).
pub const TEXT_MAX_TOKENS: u32 = 2048;

/// Settings shared by every agent of a run.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub prompt_budget_bytes: usize,
    pub provider_timeout: Duration,
    pub templates_dir: PathBuf,
    pub max_reference_images: usize,
}

impl AgentSettings {
    pub fn from_config(config: &PostflowConfig) -> Self {
        Self {
            prompt_budget_bytes: config.prompt_budget_bytes,
            provider_timeout: config.provider.timeout(),
            templates_dir: config.templates_dir.clone(),
            max_reference_images: config.max_reference_images,
        }
    }
}

/// Brand context, prompt builder and timeout, as used by a single agent.
#[derive(Debug, Clone)]
pub(crate) struct AgentContext {
    pub brand: BrandContext,
    pub prompts: PromptBuilder,
    pub timeout: Duration,
}

impl AgentContext {
    fn new(brand: &BrandContext, settings: &AgentSettings) -> Self {
        Self {
            brand: brand.clone(),
            prompts: PromptBuilder::new(settings.prompt_budget_bytes),
            timeout: settings.provider_timeout,
        }
    }

    pub fn generate<P: Provider>(
        &self,
        provider: &P,
        role: Role,
        prompt: PromptPack,
        images: Vec<ReferenceImage>,
        max_tokens: u32,
    ) -> Result<String> {
        debug!(%role, prompt_bytes = prompt.len(), images = images.len(), "calling provider");
        let request = GenerateRequest {
            role,
            prompt: prompt.render(),
            images,
            max_tokens,
            timeout: self.timeout,
        };
        provider
            .generate(&request)
            .with_context(|| format!("{role} provider call"))
    }
}

/// The four agents of a pipeline run, constructed once and passed explicitly.
#[derive(Debug, Clone)]
pub struct Crew {
    pub designer: DesignerAgent,
    pub copywriter: CopywriterAgent,
    pub auditor: AuditorAgent,
    pub manager: ManagerAgent,
}

impl Crew {
    pub fn new(brand: &BrandContext, settings: &AgentSettings) -> Self {
        let ctx = AgentContext::new(brand, settings);
        Self {
            designer: DesignerAgent::new(
                ctx.clone(),
                settings.templates_dir.clone(),
                settings.max_reference_images,
            ),
            copywriter: CopywriterAgent::new(ctx.clone()),
            auditor: AuditorAgent::new(ctx.clone()),
            manager: ManagerAgent::new(ctx),
        }
    }
}
