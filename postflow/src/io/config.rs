//! Configuration stored in `postflow.toml` plus credentials from the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "postflow.toml";

/// Configuration errors a caller may branch on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {field}")]
    Missing { field: &'static str },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Workspace configuration (TOML).
///
/// Intended to be edited by humans. Every field has a default, so an absent
/// file and a partial file both load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PostflowConfig {
    /// Revision rounds allowed before a post is reported as exhausted.
    pub max_iterations: u32,
    /// Rendered images and run logs are written here.
    pub output_dir: PathBuf,
    /// `about.md`, `voice-tone.md`, `visual-guide.md`.
    pub brand_dir: PathBuf,
    /// Reference images, one subdirectory per platform.
    pub templates_dir: PathBuf,
    pub prompt_budget_bytes: usize,
    pub max_reference_images: usize,
    pub brand: BrandConfig,
    pub provider: ProviderConfig,
    pub renderer: RendererConfig,
    pub publisher: PublisherConfig,
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrandConfig {
    pub name: String,
    /// Language every generated text must be written in.
    pub language: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Command,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Command => "command",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Argv for `kind = "command"`; the prompt is written to stdin.
    pub command: Vec<String>,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RendererConfig {
    /// Argv template. Placeholders: `{html}`, `{png}`, `{width}`, `{height}`, `{settle_ms}`.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Delay granted to fonts and animations before capture.
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublisherConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Root of the archive; `ready/` and `published/` live below it.
    pub dir: PathBuf,
}

impl Default for PostflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            output_dir: PathBuf::from("output"),
            brand_dir: PathBuf::from("brand"),
            templates_dir: PathBuf::from("templates"),
            prompt_budget_bytes: 60_000,
            max_reference_images: 3,
            brand: BrandConfig::default(),
            provider: ProviderConfig::default(),
            renderer: RendererConfig::default(),
            publisher: PublisherConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            name: "Our brand".to_string(),
            language: "English".to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            timeout_secs: 120,
            command: Vec::new(),
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: [
                "chromium",
                "--headless",
                "--disable-gpu",
                "--hide-scrollbars",
                "--window-size={width},{height}",
                "--virtual-time-budget={settle_ms}",
                "--screenshot={png}",
                "file://{html}",
            ]
            .map(str::to_string)
            .to_vec(),
            timeout_secs: 30,
            settle_ms: 500,
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.publer.io/api/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("archive"),
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RendererConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PostflowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.max_iterations == 0 {
            return invalid("max_iterations must be > 0");
        }
        if self.prompt_budget_bytes == 0 {
            return invalid("prompt_budget_bytes must be > 0");
        }
        if self.provider.timeout_secs == 0 {
            return invalid("provider.timeout_secs must be > 0");
        }
        if self.provider.output_limit_bytes == 0 {
            return invalid("provider.output_limit_bytes must be > 0");
        }
        if self.provider.kind == ProviderKind::Command && is_blank_argv(&self.provider.command) {
            return invalid("provider.command must be a non-empty array when kind = \"command\"");
        }
        if is_blank_argv(&self.renderer.command) {
            return invalid("renderer.command must be a non-empty array");
        }
        if self.renderer.timeout_secs == 0 {
            return invalid("renderer.timeout_secs must be > 0");
        }
        if self.publisher.base_url.trim().is_empty() {
            return invalid("publisher.base_url must not be empty");
        }
        Ok(())
    }

    /// Resolve relative directories against the directory holding the config file.
    pub fn resolve_paths(&mut self, base: &Path) {
        for dir in [
            &mut self.output_dir,
            &mut self.brand_dir,
            &mut self.templates_dir,
            &mut self.archive.dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}

fn is_blank_argv(argv: &[String]) -> bool {
    argv.first().is_none_or(|program| program.trim().is_empty())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PostflowConfig::default()`.
pub fn load_config(path: &Path) -> Result<PostflowConfig> {
    if !path.exists() {
        let cfg = PostflowConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PostflowConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PostflowConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// Secrets and account ids, read from the environment only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    anthropic_api_key: Option<String>,
    publer_api_key: Option<String>,
    instagram_account_id: Option<String>,
    linkedin_account_id: Option<String>,
}

/// Environment variables read by [`Credentials`], canonical name first.
pub const CREDENTIAL_VARS: [(&str, &[&str]); 4] = [
    ("ANTHROPIC_API_KEY", &["ANTHROPIC_API_KEY"]),
    ("PUBLER_API_KEY", &["PUBLER_API_KEY"]),
    (
        "INSTAGRAM_ACCOUNT_ID",
        &["INSTAGRAM_ACCOUNT_ID", "PUBLER_INSTAGRAM_ID"],
    ),
    (
        "LINKEDIN_ACCOUNT_ID",
        &["LINKEDIN_ACCOUNT_ID", "PUBLER_LINKEDIN_ID"],
    ),
];

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let find = |names: &[&str]| {
            names
                .iter()
                .filter_map(|&name| lookup(name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };
        let [anthropic, publer, instagram, linkedin] =
            CREDENTIAL_VARS.map(|(_, names)| find(names));
        Self {
            anthropic_api_key: anthropic,
            publer_api_key: publer,
            instagram_account_id: instagram,
            linkedin_account_id: linkedin,
        }
    }

    pub fn anthropic_api_key(&self) -> Result<&str, ConfigError> {
        required(&self.anthropic_api_key, "ANTHROPIC_API_KEY")
    }

    pub fn publer_api_key(&self) -> Result<&str, ConfigError> {
        required(&self.publer_api_key, "PUBLER_API_KEY")
    }

    pub fn instagram_account_id(&self) -> Result<&str, ConfigError> {
        required(&self.instagram_account_id, "INSTAGRAM_ACCOUNT_ID")
    }

    pub fn linkedin_account_id(&self) -> Result<&str, ConfigError> {
        required(&self.linkedin_account_id, "LINKEDIN_ACCOUNT_ID")
    }

    /// Set/missing status per canonical variable name, for `check`.
    pub fn status(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("ANTHROPIC_API_KEY", self.anthropic_api_key.is_some()),
            ("PUBLER_API_KEY", self.publer_api_key.is_some()),
            ("INSTAGRAM_ACCOUNT_ID", self.instagram_account_id.is_some()),
            ("LINKEDIN_ACCOUNT_ID", self.linkedin_account_id.is_some()),
        ]
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ConfigError> {
    value.as_deref().ok_or(ConfigError::Missing { field })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PostflowConfig::default());
        assert_eq!(cfg.max_iterations, 3);
        assert_eq!(cfg.renderer.timeout_secs, 30);
        assert_eq!(cfg.renderer.settle_ms, 500);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("postflow.toml");
        let mut cfg = PostflowConfig::default();
        cfg.brand.language = "Hungarian".to_string();
        write_config(&path, &cfg).expect("write");
        assert!(!temp.path().join("postflow.toml.tmp").exists());
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("postflow.toml");
        fs::write(
            &path,
            "max_iterations = 5\n[provider]\nkind = \"command\"\ncommand = [\"llm\"]\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_iterations, 5);
        assert_eq!(cfg.provider.kind, ProviderKind::Command);
        assert_eq!(cfg.provider.model, "claude-sonnet-4-20250514");
        assert_eq!(cfg.prompt_budget_bytes, 60_000);
    }

    #[test]
    fn validate_rejects_command_kind_without_argv() {
        let mut cfg = PostflowConfig::default();
        cfg.provider.kind = ProviderKind::Command;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        cfg.max_iterations = 0;
        cfg.provider.command = vec!["llm".to_string()];
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Invalid("max_iterations must be > 0".to_string()))
        );
    }

    #[test]
    fn resolve_paths_keeps_absolute_dirs() {
        let mut cfg = PostflowConfig::default();
        let abs = std::env::temp_dir().join("postflow-out");
        cfg.output_dir = abs.clone();
        cfg.resolve_paths(Path::new("/work"));
        assert_eq!(cfg.output_dir, abs);
        assert_eq!(cfg.brand_dir, Path::new("/work").join("brand"));
        assert_eq!(cfg.archive.dir, Path::new("/work").join("archive"));
    }

    #[test]
    fn credentials_accept_aliases_and_ignore_blanks() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PUBLER_API_KEY", "  "),
            ("PUBLER_INSTAGRAM_ID", "ig-1"),
            ("LINKEDIN_ACCOUNT_ID", "li-1"),
            ("PUBLER_LINKEDIN_ID", "li-alias"),
        ]);
        let creds = Credentials::from_lookup(|name| env.get(name).map(|v| v.to_string()));
        assert_eq!(creds.instagram_account_id(), Ok("ig-1"));
        assert_eq!(creds.linkedin_account_id(), Ok("li-1"));
        assert_eq!(
            creds.publer_api_key(),
            Err(ConfigError::Missing {
                field: "PUBLER_API_KEY"
            })
        );
        assert_eq!(
            creds.status(),
            vec![
                ("ANTHROPIC_API_KEY", false),
                ("PUBLER_API_KEY", false),
                ("INSTAGRAM_ACCOUNT_ID", true),
                ("LINKEDIN_ACCOUNT_ID", true),
            ]
        );
    }
}
