//! Shared deterministic types for the post pipeline.
//!
//! These types define the contracts between generators, the auditor, and the
//! manager. They do not depend on external state or I/O.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Free-text seed for a post, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Topic(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic must be at least {min} characters (got {actual})")]
    TooShort { min: usize, actual: usize },
}

impl Topic {
    /// Minimum length in characters, counted after trimming.
    pub const MIN_CHARS: usize = 10;

    pub fn new(raw: &str) -> Result<Self, TopicError> {
        let trimmed = raw.trim();
        let actual = trimmed.chars().count();
        if actual < Self::MIN_CHARS {
            return Err(TopicError::TooShort {
                min: Self::MIN_CHARS,
                actual,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pixel size of a rendered design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Visual markup produced by the designer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignArtifact {
    pub markup: String,
    pub dimensions: Dimensions,
}

/// Caption text produced by the copywriter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyArtifact {
    #[serde(alias = "caption")]
    pub body: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub hook: String,
    #[serde(default)]
    pub cta: String,
}

impl CopyArtifact {
    /// Treat an unparsable provider response as the body itself.
    ///
    /// The hook becomes the first non-empty line.
    pub fn fallback_from_text(raw: &str) -> Self {
        let body = raw.trim().to_string();
        let hook = body
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();
        Self {
            body,
            hashtags: Vec::new(),
            hook,
            cta: String::new(),
        }
    }

    /// Hashtags normalised to carry exactly one leading `#`.
    pub fn formatted_hashtags(&self) -> Vec<String> {
        self.hashtags
            .iter()
            .map(|tag| tag.trim().trim_start_matches('#'))
            .filter(|tag| !tag.is_empty())
            .map(|tag| format!("#{tag}"))
            .collect()
    }

    /// Publishable caption: body, a blank line, then the hashtags.
    pub fn caption_with_hashtags(&self) -> String {
        let tags = self.formatted_hashtags();
        if tags.is_empty() {
            return self.body.clone();
        }
        format!("{}\n\n{}", self.body, tags.join(" "))
    }
}

/// The current (design, copy) pair of a run. Replaced wholesale on revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDraft {
    pub design: DesignArtifact,
    pub copy: CopyArtifact,
}

/// Scored audit of a draft against the rubric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub overall_score: u8,
    pub breakdown: BTreeMap<String, u8>,
    pub issues: Vec<String>,
    pub approved: bool,
    pub feedback: String,
    pub improvements: Vec<String>,
    pub strengths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Revise,
}

/// Which artifacts a revision round must regenerate, with the instruction for each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum RevisionTarget {
    None,
    Design(String),
    Copy(String),
    Both(String, String),
}

impl RevisionTarget {
    /// Build a target from optional per-artifact instructions; blank text counts as absent.
    pub fn from_parts(design: Option<&str>, copy: Option<&str>) -> Self {
        let clean = |s: Option<&str>| {
            s.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        match (clean(design), clean(copy)) {
            (None, None) => RevisionTarget::None,
            (Some(d), None) => RevisionTarget::Design(d),
            (None, Some(c)) => RevisionTarget::Copy(c),
            (Some(d), Some(c)) => RevisionTarget::Both(d, c),
        }
    }

    pub fn design(&self) -> Option<&str> {
        match self {
            RevisionTarget::Design(d) | RevisionTarget::Both(d, _) => Some(d),
            RevisionTarget::None | RevisionTarget::Copy(_) => None,
        }
    }

    pub fn copy(&self) -> Option<&str> {
        match self {
            RevisionTarget::Copy(c) | RevisionTarget::Both(_, c) => Some(c),
            RevisionTarget::None | RevisionTarget::Design(_) => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, RevisionTarget::None)
    }
}

/// Holistic accept/revise judgment from the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionVerdict {
    pub decision: Decision,
    pub manager_score: u8,
    pub feedback: String,
    pub concerns: Vec<String>,
    pub strengths: Vec<String>,
    pub first_impression: String,
    pub revision_targets: RevisionTarget,
}

impl DecisionVerdict {
    pub fn is_approved(&self) -> bool {
        self.decision == Decision::Approve
    }
}

/// Where the feedback driving a revision round came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    QuickReject,
    Audit,
    Review,
}

/// Feedback handed to the revision loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRequest {
    pub source: FeedbackSource,
    pub reason: String,
    pub targets: RevisionTarget,
}
