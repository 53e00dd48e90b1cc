//! Scaffolding for a new postflow workspace.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::core::platform::Platform;
use crate::io::brand::{
    ABOUT_FILE, DEFAULT_ABOUT, DEFAULT_VISUAL_GUIDE, DEFAULT_VOICE_TONE, VISUAL_GUIDE_FILE,
    VOICE_TONE_FILE,
};
use crate::io::config::{DEFAULT_CONFIG_FILE, PostflowConfig, write_config};

/// Canonical paths of a workspace rooted at `root`, using default directories.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub env_example_path: PathBuf,
    pub brand_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = PostflowConfig::default();
        Self {
            config_path: root.join(DEFAULT_CONFIG_FILE),
            env_example_path: root.join(".env.example"),
            brand_dir: root.join(&defaults.brand_dir),
            templates_dir: root.join(&defaults.templates_dir),
            output_dir: root.join(&defaults.output_dir),
            root,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Overwrite existing config and brand files.
    pub force: bool,
}

/// Write a default `postflow.toml`, brand files, and the template/output folders.
///
/// Fails if the config already exists unless `options.force` is set.
pub fn init_workspace(root: &Path, options: &InitOptions) -> Result<WorkspacePaths> {
    let paths = WorkspacePaths::new(root);
    if paths.config_path.exists() && !options.force {
        return Err(anyhow!(
            "postflow init: {} already exists (use --force to overwrite)",
            paths.config_path.display()
        ));
    }

    write_config(&paths.config_path, &PostflowConfig::default())?;
    write_file(&paths.env_example_path, ENV_EXAMPLE)?;
    write_file(&paths.brand_dir.join(ABOUT_FILE), &brand_file("About", DEFAULT_ABOUT))?;
    write_file(
        &paths.brand_dir.join(VOICE_TONE_FILE),
        &brand_file("Voice and tone", DEFAULT_VOICE_TONE),
    )?;
    write_file(
        &paths.brand_dir.join(VISUAL_GUIDE_FILE),
        &brand_file("Visual guide", DEFAULT_VISUAL_GUIDE),
    )?;
    for platform in Platform::ALL {
        create_dir(&paths.templates_dir.join(platform.as_str()))?;
    }
    create_dir(&paths.output_dir)?;

    Ok(paths)
}

fn brand_file(title: &str, body: &str) -> String {
    format!("# {title}\n\n{body}\n")
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}

const ENV_EXAMPLE: &str = "\
ANTHROPIC_API_KEY=
PUBLER_API_KEY=
INSTAGRAM_ACCOUNT_ID=
LINKEDIN_ACCOUNT_ID=
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;

    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_workspace(temp.path(), &InitOptions { force: false }).expect("init");

        assert!(paths.config_path.is_file());
        assert!(paths.env_example_path.is_file());
        assert!(paths.brand_dir.join(ABOUT_FILE).is_file());
        assert!(paths.brand_dir.join(VOICE_TONE_FILE).is_file());
        assert!(paths.brand_dir.join(VISUAL_GUIDE_FILE).is_file());
        assert!(paths.templates_dir.join("instagram").is_dir());
        assert!(paths.templates_dir.join("linkedin").is_dir());
        assert!(paths.output_dir.is_dir());
        assert_eq!(
            load_config(&paths.config_path).expect("load"),
            PostflowConfig::default()
        );
    }

    #[test]
    fn init_without_force_refuses_existing_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        init_workspace(temp.path(), &InitOptions { force: false }).expect("init");
        let err = init_workspace(temp.path(), &InitOptions { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn init_with_force_rewrites_brand_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_workspace(temp.path(), &InitOptions { force: false }).expect("init");
        let about = paths.brand_dir.join(ABOUT_FILE);
        fs::write(&about, "custom").expect("write custom");

        init_workspace(temp.path(), &InitOptions { force: true }).expect("re-init");
        assert_eq!(
            fs::read_to_string(&about).expect("read"),
            brand_file("About", DEFAULT_ABOUT)
        );
    }
}
