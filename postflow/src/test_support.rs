//! Test-only collaborators and fixtures for driving the pipeline without
//! network access or a browser.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use serde_json::json;

use crate::agents::{AgentSettings, Crew};
use crate::core::platform::Platform;
use crate::core::types::{CopyArtifact, DesignArtifact, PostDraft};
use crate::io::brand::BrandContext;
use crate::io::config::BrandConfig;
use crate::io::provider::{GenerateRequest, Provider, ProviderError, Role};
use crate::io::renderer::{RenderRequest, RenderedImage, Renderer};

/// Provider that replays queued responses per role and records every request.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: RefCell<HashMap<Role, VecDeque<Result<String, String>>>>,
    requests: RefCell<Vec<GenerateRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for `role`.
    pub fn with(self, role: Role, response: impl Into<String>) -> Self {
        self.responses
            .borrow_mut()
            .entry(role)
            .or_default()
            .push_back(Ok(response.into()));
        self
    }

    /// Queue a failed call for `role`.
    pub fn with_error(self, role: Role, message: impl Into<String>) -> Self {
        self.responses
            .borrow_mut()
            .entry(role)
            .or_default()
            .push_back(Err(message.into()));
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.borrow().clone()
    }

    /// Roles in call order.
    pub fn roles(&self) -> Vec<Role> {
        self.requests.borrow().iter().map(|req| req.role).collect()
    }

    pub fn calls(&self, role: Role) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|req| req.role == role)
            .count()
    }

    /// Panic if any queued response was never consumed.
    pub fn assert_drained(&self) {
        let responses = self.responses.borrow();
        let leftover: Vec<_> = responses
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(role, queue)| format!("{role}: {}", queue.len()))
            .collect();
        assert!(leftover.is_empty(), "unconsumed responses: {leftover:?}");
    }
}

impl Provider for ScriptedProvider {
    fn generate(&self, request: &GenerateRequest) -> Result<String> {
        self.requests.borrow_mut().push(request.clone());
        let next = self
            .responses
            .borrow_mut()
            .get_mut(&request.role)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(ProviderError::Api {
                status: 500,
                message,
            })),
            None => bail!("no scripted response left for {}", request.role),
        }
    }
}

/// Renderer that writes a placeholder PNG instead of launching a browser.
#[derive(Debug, Default)]
pub struct ScriptedRenderer {
    fail_with: Option<String>,
    rendered: RefCell<Vec<PathBuf>>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            rendered: RefCell::new(Vec::new()),
        }
    }

    pub fn rendered(&self) -> Vec<PathBuf> {
        self.rendered.borrow().clone()
    }
}

impl Renderer for ScriptedRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedImage> {
        if let Some(message) = &self.fail_with {
            bail!("render failed: {message}");
        }
        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let markup_path = request.output_path.with_extension("html");
        fs::write(&markup_path, request.markup)?;
        fs::write(request.output_path, b"\x89PNG\r\n\x1a\n")?;
        self.rendered
            .borrow_mut()
            .push(request.output_path.to_path_buf());
        Ok(RenderedImage {
            path: request.output_path.to_path_buf(),
            markup_path,
            dimensions: request.dimensions,
        })
    }
}

/// Audit JSON with an even breakdown and the given claim.
pub fn audit_response(score: u8, approved: bool, improvements: &[&str]) -> String {
    json!({
        "overallScore": score,
        "breakdown": {
            "brandAlignment": score,
            "quality": score,
            "platformOptimization": score,
            "languageCorrectness": score,
        },
        "issues": [],
        "approved": approved,
        "feedback": format!("scored {score}"),
        "improvements": improvements,
        "strengths": ["clear layout"],
    })
    .to_string()
}

/// Manager verdict JSON. `design`/`copy` become the revision targets.
pub fn verdict_response(
    decision: &str,
    score: u8,
    concerns: &[&str],
    design: Option<&str>,
    copy: Option<&str>,
) -> String {
    json!({
        "decision": decision,
        "managerScore": score,
        "feedback": format!("manager says {decision}"),
        "concerns": concerns,
        "strengths": [],
        "firstImpression": "fine",
        "revisionNeeded": {
            "design": design,
            "copy": copy,
        },
    })
    .to_string()
}

pub fn copy_response(body: &str, hashtags: &[&str]) -> String {
    json!({
        "body": body,
        "hashtags": hashtags,
        "hook": body.lines().next().unwrap_or_default(),
        "cta": "Follow for more",
    })
    .to_string()
}

pub fn design_response(headline: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><body><div class=\"card\"><h1>{headline}</h1></div></body></html>"
    )
}

pub fn sample_draft(platform: Platform) -> PostDraft {
    PostDraft {
        design: DesignArtifact {
            markup: design_response("Morning"),
            dimensions: platform.dimensions(),
        },
        copy: CopyArtifact {
            body: "Good morning!\nStart the day slow.".to_string(),
            hashtags: vec!["morning".to_string(), "routine".to_string()],
            hook: "Good morning!".to_string(),
            cta: "Follow for more".to_string(),
        },
    }
}

pub fn test_brand() -> BrandContext {
    BrandContext::defaults(&BrandConfig::default())
}

/// Crew with default brand material and an empty templates directory.
pub fn test_crew() -> Crew {
    Crew::new(
        &test_brand(),
        &AgentSettings {
            prompt_budget_bytes: 60_000,
            provider_timeout: Duration::from_secs(5),
            templates_dir: PathBuf::from("does-not-exist"),
            max_reference_images: 3,
        },
    )
}

/// Breakdown map with every rubric category at `score`.
pub fn even_breakdown(score: u8) -> BTreeMap<String, u8> {
    crate::core::gate::RubricCategory::ALL
        .iter()
        .map(|category| (category.key().to_string(), score))
        .collect()
}
