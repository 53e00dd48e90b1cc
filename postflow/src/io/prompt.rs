//! Prompt builder for the role agents.
//!
//! Templates are embedded minijinja files split into sections by
//! `<!-- section:KEY required|droppable -->` markers. When a rendered prompt
//! exceeds the byte budget, droppable brand sections go first and the longest
//! remaining section is truncated last.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::core::gate::{AUDIT_APPROVAL_FLOOR, RubricCategory};
use crate::core::platform::Platform;
use crate::core::types::{AuditReport, CopyArtifact, DesignArtifact};
use crate::io::brand::BrandContext;

const TEMPLATES: [(&str, &str); 6] = [
    ("design", include_str!("prompts/design.md")),
    ("design_revise", include_str!("prompts/design_revise.md")),
    ("copy", include_str!("prompts/copy.md")),
    ("copy_revise", include_str!("prompts/copy_revise.md")),
    ("audit", include_str!("prompts/audit.md")),
    ("review", include_str!("prompts/review.md")),
];

/// Droppable sections, least important first.
const DROP_ORDER: [&str; 3] = ["about", "visual", "voice"];

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .expect("section regex should be valid")
});

static ENGINE: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    for (name, source) in TEMPLATES {
        env.add_template(name, source)
            .expect("embedded prompt template should be valid");
    }
    env
});

#[derive(Debug, Clone, Serialize)]
struct BrandView<'a> {
    name: &'a str,
    language: &'a str,
    about: &'a str,
    voice_tone: &'a str,
    visual_guide: &'a str,
}

impl<'a> From<&'a BrandContext> for BrandView<'a> {
    fn from(brand: &'a BrandContext) -> Self {
        Self {
            name: &brand.name,
            language: &brand.language,
            about: &brand.about,
            voice_tone: &brand.voice_tone,
            visual_guide: &brand.visual_guide,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct PlatformView {
    name: &'static str,
    width: u32,
    height: u32,
    caption_max_chars: usize,
    hashtags_min: usize,
    hashtags_max: usize,
    tone: &'static str,
    guidance: &'static [&'static str],
}

impl From<Platform> for PlatformView {
    fn from(platform: Platform) -> Self {
        let rules = platform.rules();
        Self {
            name: platform.display_name(),
            width: rules.dimensions.width,
            height: rules.dimensions.height,
            caption_max_chars: rules.caption_max_chars,
            hashtags_min: rules.hashtags_min,
            hashtags_max: rules.hashtags_max,
            tone: rules.tone,
            guidance: rules.guidance,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RubricView {
    key: &'static str,
    label: &'static str,
    weight: u8,
}

fn rubric() -> Vec<RubricView> {
    RubricCategory::ALL
        .iter()
        .map(|category| RubricView {
            key: category.key(),
            label: category.label(),
            weight: category.weight(),
        })
        .collect()
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct Section {
    key: String,
    required: bool,
    content: String,
}

fn parse_sections(rendered: &str) -> Vec<Section> {
    let markers: Vec<_> = SECTION_RE.captures_iter(rendered).collect();
    let mut sections = Vec::with_capacity(markers.len());
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(rendered.len(), |m| m.start());
        let content = rendered[whole.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(Section {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }
    sections
}

fn total_len(sections: &[Section]) -> usize {
    sections.iter().map(|s| s.content.len()).sum()
}

fn apply_budget(sections: &mut Vec<Section>, budget: usize) {
    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            return;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    let total = total_len(sections);
    if total <= budget {
        return;
    }
    let Some(longest) = sections.iter_mut().max_by_key(|s| s.content.len()) else {
        return;
    };
    let before_len = longest.content.len();
    let allowed = before_len.saturating_sub(total - budget);
    truncate_at_char_boundary(&mut longest.content, allowed.saturating_sub(12));
    longest.content.push_str("\n[truncated]");
    debug!(
        section = %longest.key,
        before_len,
        after_len = longest.content.len(),
        "truncated section for budget"
    );
}

fn truncate_at_char_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// Builds role prompts within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<PromptPack> {
        let template = ENGINE
            .get_template(name)
            .with_context(|| format!("load prompt template {name}"))?;
        let rendered = template
            .render(ctx)
            .with_context(|| format!("render prompt template {name}"))?;
        let mut sections = parse_sections(&rendered);
        apply_budget(&mut sections, self.budget_bytes);
        Ok(PromptPack {
            content: sections
                .iter()
                .map(|s| s.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        })
    }

    pub fn build_design(
        &self,
        brand: &BrandContext,
        platform: Platform,
        topic: &str,
        reference_count: usize,
    ) -> Result<PromptPack> {
        self.render(
            "design",
            context! {
                brand => BrandView::from(brand),
                platform => PlatformView::from(platform),
                topic => topic.trim(),
                reference_count => reference_count,
            },
        )
    }

    pub fn build_design_revision(
        &self,
        brand: &BrandContext,
        platform: Platform,
        prior: &DesignArtifact,
        feedback: &str,
    ) -> Result<PromptPack> {
        let mut view = PlatformView::from(platform);
        view.width = prior.dimensions.width;
        view.height = prior.dimensions.height;
        self.render(
            "design_revise",
            context! {
                brand => BrandView::from(brand),
                platform => view,
                prior => prior.markup.trim(),
                feedback => feedback.trim(),
            },
        )
    }

    pub fn build_copy(
        &self,
        brand: &BrandContext,
        platform: Platform,
        topic: &str,
    ) -> Result<PromptPack> {
        self.render(
            "copy",
            context! {
                brand => BrandView::from(brand),
                platform => PlatformView::from(platform),
                topic => topic.trim(),
            },
        )
    }

    pub fn build_copy_revision(
        &self,
        brand: &BrandContext,
        platform: Platform,
        prior: &CopyArtifact,
        feedback: &str,
    ) -> Result<PromptPack> {
        let prior = serde_json::to_string_pretty(prior).context("serialize prior copy")?;
        self.render(
            "copy_revise",
            context! {
                brand => BrandView::from(brand),
                platform => PlatformView::from(platform),
                prior => prior,
                feedback => feedback.trim(),
            },
        )
    }

    pub fn build_audit(
        &self,
        brand: &BrandContext,
        platform: Platform,
        design: &DesignArtifact,
        copy: &CopyArtifact,
    ) -> Result<PromptPack> {
        self.render(
            "audit",
            context! {
                brand => BrandView::from(brand),
                platform => PlatformView::from(platform),
                rubric => rubric(),
                floor => AUDIT_APPROVAL_FLOOR,
                design => design.markup.trim(),
                copy => copy.caption_with_hashtags(),
            },
        )
    }

    pub fn build_review(
        &self,
        brand: &BrandContext,
        platform: Platform,
        design: &DesignArtifact,
        copy: &CopyArtifact,
        audit: &AuditReport,
    ) -> Result<PromptPack> {
        self.render(
            "review",
            context! {
                brand => BrandView::from(brand),
                platform => PlatformView::from(platform),
                audit => context! {
                    overall_score => audit.overall_score,
                    feedback => audit.feedback.trim(),
                    strengths => audit.strengths.clone(),
                },
                design => design.markup.trim(),
                copy => copy.caption_with_hashtags(),
            },
        )
    }
}

/// A rendered prompt ready to send to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPack {
    content: String,
}

impl PromptPack {
    pub fn render(&self) -> String {
        self.content.clone()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Dimensions;
    use crate::io::config::BrandConfig;

    fn brand() -> BrandContext {
        BrandContext::defaults(&BrandConfig {
            name: "Acme".to_string(),
            language: "Hungarian".to_string(),
        })
    }

    fn copy() -> CopyArtifact {
        CopyArtifact {
            body: "Rise early.".to_string(),
            hashtags: vec!["morning".to_string()],
            hook: "Rise early.".to_string(),
            cta: "Follow us".to_string(),
        }
    }

    #[test]
    fn copy_prompt_embeds_platform_rules_in_order() {
        let content = PromptBuilder::new(60_000)
            .build_copy(&brand(), Platform::LinkedIn, "  10 tips for better morning routines ")
            .expect("build")
            .render();

        let contract = content.find("### Copywriter Contract").expect("contract");
        let voice = content.find("### Voice and Tone").expect("voice");
        let rules = content.find("### Platform Rules").expect("rules");
        let topic = content
            .find("<topic>\n10 tips for better morning routines\n</topic>")
            .expect("topic");
        assert!(contract < voice && voice < rules && rules < topic);
        assert!(content.contains("at most 3000 characters"));
        assert!(content.contains("Hashtags: 3 to 5."));
        assert!(content.contains("in Hungarian"));
        assert!(!content.contains("<!-- section:"));
    }

    #[test]
    fn design_prompt_mentions_reference_images_only_when_present() {
        let builder = PromptBuilder::new(60_000);
        let with = builder
            .build_design(&brand(), Platform::Instagram, "topic text here", 2)
            .expect("build")
            .render();
        assert!(with.contains("2 reference image(s)"));
        assert!(with.contains("1080x1080"));

        let without = builder
            .build_design(&brand(), Platform::Instagram, "topic text here", 0)
            .expect("build")
            .render();
        assert!(!without.contains("reference image"));
    }

    #[test]
    fn design_revision_keeps_prior_dimensions() {
        let prior = DesignArtifact {
            markup: "<html>old</html>".to_string(),
            dimensions: Dimensions::new(800, 600),
        };
        let content = PromptBuilder::new(60_000)
            .build_design_revision(&brand(), Platform::Instagram, &prior, "bigger headline")
            .expect("build")
            .render();
        assert!(content.contains("800x600"));
        assert!(content.contains("<feedback>\nbigger headline\n</feedback>"));
        assert!(content.contains("<html>old</html>"));
    }

    #[test]
    fn audit_prompt_lists_weighted_rubric() {
        let design = DesignArtifact {
            markup: "<html></html>".to_string(),
            dimensions: Dimensions::new(1080, 1080),
        };
        let content = PromptBuilder::new(60_000)
            .build_audit(&brand(), Platform::Instagram, &design, &copy())
            .expect("build")
            .render();
        assert!(content.contains("brandAlignment (Brand alignment): 0-30 points"));
        assert!(content.contains("languageCorrectness (Language correctness): 0-20 points"));
        assert!(content.contains("overall score of 80 or more"));
        assert!(content.contains("Rise early.\n\n#morning"));
    }

    #[test]
    fn budget_drops_brand_sections_first() {
        let mut brand = brand();
        brand.about = "about ".repeat(200);
        brand.visual_guide = "visual ".repeat(200);
        brand.voice_tone = "voice ".repeat(200);
        let design = DesignArtifact {
            markup: "<html></html>".to_string(),
            dimensions: Dimensions::new(1080, 1080),
        };
        let content = PromptBuilder::new(2_000)
            .build_audit(&brand, Platform::Instagram, &design, &copy())
            .expect("build")
            .render();
        assert!(!content.contains("### About the Brand"));
        assert!(!content.contains("### Visual Guide"));
        assert!(content.contains("### Rubric"));
        assert!(content.contains("### Caption"));
        assert!(content.contains("### Output"));
    }

    #[test]
    fn budget_truncates_longest_required_section() {
        let design = DesignArtifact {
            markup: format!("<html>{}</html>", "x".repeat(5_000)),
            dimensions: Dimensions::new(1080, 1080),
        };
        let pack = PromptBuilder::new(2_500)
            .build_audit(&brand(), Platform::Instagram, &design, &copy());
        let content = pack.expect("build").render();
        assert!(content.contains("[truncated]"));
        assert!(content.contains("### Output"));
        assert!(content.len() <= 2_500 + 64);
    }
}
