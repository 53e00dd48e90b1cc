//! Brand context and reference images loaded from the workspace.
//!
//! Loading is best-effort: a missing or unreadable brand file degrades to a
//! built-in default with a warning, never an error.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::core::platform::Platform;
use crate::io::config::BrandConfig;
use crate::io::provider::ReferenceImage;

pub const ABOUT_FILE: &str = "about.md";
pub const VOICE_TONE_FILE: &str = "voice-tone.md";
pub const VISUAL_GUIDE_FILE: &str = "visual-guide.md";

pub const DEFAULT_ABOUT: &str =
    "A company that shares practical, useful content with its audience.";
pub const DEFAULT_VOICE_TONE: &str =
    "Friendly, clear, and confident. Short sentences, no jargon, no exaggerated promises.";
pub const DEFAULT_VISUAL_GUIDE: &str = "Clean, modern layout with generous whitespace. \
One strong headline, high contrast text, at most two accent colors, readable sans-serif fonts.";

/// Brand material embedded into every prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandContext {
    pub name: String,
    pub language: String,
    pub about: String,
    pub voice_tone: String,
    pub visual_guide: String,
}

impl BrandContext {
    pub fn load(dir: &Path, config: &BrandConfig) -> Self {
        Self {
            name: config.name.clone(),
            language: config.language.clone(),
            about: read_or_default(&dir.join(ABOUT_FILE), DEFAULT_ABOUT),
            voice_tone: read_or_default(&dir.join(VOICE_TONE_FILE), DEFAULT_VOICE_TONE),
            visual_guide: read_or_default(&dir.join(VISUAL_GUIDE_FILE), DEFAULT_VISUAL_GUIDE),
        }
    }

    /// Built-in context, used when no brand directory exists.
    pub fn defaults(config: &BrandConfig) -> Self {
        Self {
            name: config.name.clone(),
            language: config.language.clone(),
            about: DEFAULT_ABOUT.to_string(),
            voice_tone: DEFAULT_VOICE_TONE.to_string(),
            visual_guide: DEFAULT_VISUAL_GUIDE.to_string(),
        }
    }
}

fn read_or_default(path: &Path, default: &str) -> String {
    match fs::read_to_string(path) {
        Ok(contents) if !contents.trim().is_empty() => contents.trim().to_string(),
        Ok(_) => {
            warn!(path = %path.display(), "brand file is empty, using default");
            default.to_string()
        }
        Err(err) => {
            warn!(path = %path.display(), err = %err, "brand file unavailable, using default");
            default.to_string()
        }
    }
}

fn media_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Reference image files for a platform, sorted by file name.
pub fn list_reference_templates(templates_dir: &Path, platform: Platform) -> Result<Vec<PathBuf>> {
    let dir = templates_dir.join(platform.as_str());
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("read {}", dir.display()))? {
        let path = entry
            .with_context(|| format!("read entry in {}", dir.display()))?
            .path();
        if path.is_file() && media_type(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Up to `max` reference images for a platform, base64 encoded.
///
/// Unreadable files are skipped with a warning.
pub fn load_reference_images(
    templates_dir: &Path,
    platform: Platform,
    max: usize,
) -> Vec<ReferenceImage> {
    let paths = match list_reference_templates(templates_dir, platform) {
        Ok(paths) => paths,
        Err(err) => {
            warn!(err = %err, "could not list reference templates");
            return Vec::new();
        }
    };
    let mut images = Vec::new();
    for path in paths.into_iter().take(max) {
        let Some(media_type) = media_type(&path) else {
            continue;
        };
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "loaded reference image");
                images.push(ReferenceImage {
                    data_base64: STANDARD.encode(&bytes),
                    path,
                    media_type,
                });
            }
            Err(err) => {
                warn!(path = %path.display(), err = %err, "skipping unreadable reference image");
            }
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brand_config() -> BrandConfig {
        BrandConfig {
            name: "Acme".to_string(),
            language: "Hungarian".to_string(),
        }
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join(ABOUT_FILE), "  We bake bread.  \n").expect("write");
        fs::write(temp.path().join(VOICE_TONE_FILE), "   ").expect("write");

        let brand = BrandContext::load(temp.path(), &brand_config());
        assert_eq!(brand.name, "Acme");
        assert_eq!(brand.language, "Hungarian");
        assert_eq!(brand.about, "We bake bread.");
        assert_eq!(brand.voice_tone, DEFAULT_VOICE_TONE);
        assert_eq!(brand.visual_guide, DEFAULT_VISUAL_GUIDE);
    }

    #[test]
    fn reference_images_are_sorted_filtered_and_capped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("instagram");
        fs::create_dir_all(&dir).expect("mkdir");
        for name in ["c.png", "a.JPG", "b.jpeg", "notes.txt", "d.png"] {
            fs::write(dir.join(name), b"img").expect("write");
        }

        let listed = list_reference_templates(temp.path(), Platform::Instagram).expect("list");
        assert_eq!(listed.len(), 4);

        let images = load_reference_images(temp.path(), Platform::Instagram, 3);
        let names: Vec<_> = images
            .iter()
            .map(|image| {
                image
                    .path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.jpeg", "c.png"]);
        assert_eq!(images[0].media_type, "image/jpeg");
        assert_eq!(images[0].data_base64, "aW1n");
    }

    #[test]
    fn missing_platform_dir_yields_no_images() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_reference_images(temp.path(), Platform::LinkedIn, 3).is_empty());
    }
}
