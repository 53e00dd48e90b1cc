//! Settings report for `postflow check`.

use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::core::platform::Platform;
use crate::io::brand::{ABOUT_FILE, VISUAL_GUIDE_FILE, VOICE_TONE_FILE, list_reference_templates};
use crate::io::config::{Credentials, PostflowConfig, ProviderKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialStatus {
    pub name: &'static str,
    pub set: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrandFileStatus {
    pub file: &'static str,
    /// `None` when the file is missing and the built-in default is used.
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateStatus {
    pub platform: Platform,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsReport {
    pub credentials: Vec<CredentialStatus>,
    pub brand_files: Vec<BrandFileStatus>,
    pub templates: Vec<TemplateStatus>,
    pub max_iterations: u32,
    pub provider: String,
}

impl SettingsReport {
    /// True when content creation can start (the provider key is set or a
    /// command provider is configured).
    pub fn can_create(&self, config: &PostflowConfig) -> bool {
        config.provider.kind == ProviderKind::Command
            || self
                .credentials
                .iter()
                .any(|status| status.name == "ANTHROPIC_API_KEY" && status.set)
    }
}

/// Inspect credentials, brand files and reference templates. Paths in
/// `config` must already be resolved.
pub fn settings_report(
    config: &PostflowConfig,
    credentials: &Credentials,
) -> Result<SettingsReport> {
    let credentials = credentials
        .status()
        .into_iter()
        .map(|(name, set)| CredentialStatus { name, set })
        .collect();

    let brand_files = [ABOUT_FILE, VOICE_TONE_FILE, VISUAL_GUIDE_FILE]
        .into_iter()
        .map(|file| BrandFileStatus {
            file,
            bytes: file_size(&config.brand_dir.join(file)),
        })
        .collect();

    let mut templates = Vec::new();
    for platform in Platform::ALL {
        templates.push(TemplateStatus {
            platform,
            count: list_reference_templates(&config.templates_dir, platform)?.len(),
        });
    }

    Ok(SettingsReport {
        credentials,
        brand_files,
        templates,
        max_iterations: config.max_iterations,
        provider: config.provider.kind.as_str().to_string(),
    })
}

fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}
