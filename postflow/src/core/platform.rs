//! Closed set of target platforms and their publishing rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::types::Dimensions;

/// Social network a post is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    #[serde(rename = "linkedin")]
    LinkedIn,
}

/// Static rules applied when generating and auditing content for a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformRules {
    pub caption_max_chars: usize,
    pub hashtags_min: usize,
    pub hashtags_max: usize,
    pub dimensions: Dimensions,
    pub tone: &'static str,
    pub guidance: &'static [&'static str],
}

const INSTAGRAM_RULES: PlatformRules = PlatformRules {
    caption_max_chars: 2200,
    hashtags_min: 5,
    hashtags_max: 10,
    dimensions: Dimensions {
        width: 1080,
        height: 1080,
    },
    tone: "warm and personal, informal address is fine",
    guidance: &[
        "Use emoji sparingly (3-5 across the whole caption at most).",
        "The first line is what shows in the feed, so it must hook the reader.",
        "Break the caption into short paragraphs for readability.",
    ],
};

const LINKEDIN_RULES: PlatformRules = PlatformRules {
    caption_max_chars: 3000,
    hashtags_min: 3,
    hashtags_max: 5,
    dimensions: Dimensions {
        width: 1200,
        height: 627,
    },
    tone: "professional, clear business value",
    guidance: &[
        "The first 2-3 lines are shown before \"see more\" and carry the post.",
        "Use a structured, easy to scan format.",
        "Communicate concrete business value.",
    ],
};

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Instagram, Platform::LinkedIn];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::LinkedIn => "linkedin",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::LinkedIn => "LinkedIn",
        }
    }

    pub fn rules(self) -> &'static PlatformRules {
        match self {
            Platform::Instagram => &INSTAGRAM_RULES,
            Platform::LinkedIn => &LINKEDIN_RULES,
        }
    }

    pub fn dimensions(self) -> Dimensions {
        self.rules().dimensions
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "linkedin" => Ok(Platform::LinkedIn),
            other => Err(format!("unknown platform '{other}' (expected instagram or linkedin)")),
        }
    }
}
