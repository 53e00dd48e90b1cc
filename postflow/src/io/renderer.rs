//! Rendering design markup into a PNG through an external command.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::core::types::Dimensions;
use crate::io::config::RendererConfig;
use crate::io::process::run_command_with_timeout;

const RENDER_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub markup: &'a str,
    pub dimensions: Dimensions,
    pub output_path: &'a Path,
}

/// Handle to a rendered image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedImage {
    pub path: PathBuf,
    /// The markup the image was rendered from, kept next to it.
    pub markup_path: PathBuf,
    pub dimensions: Dimensions,
}

pub trait Renderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedImage>;
}

/// Renderer that runs a headless browser (or any command) over an HTML file.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    argv: Vec<String>,
    timeout: Duration,
    settle_ms: u64,
}

impl CommandRenderer {
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            argv: config.command.clone(),
            timeout: config.timeout(),
            settle_ms: config.settle_ms,
        }
    }
}

/// Substitute `{html}`, `{png}`, `{width}`, `{height}` and `{settle_ms}` in every argument.
pub fn expand_placeholders(
    argv: &[String],
    html: &Path,
    png: &Path,
    dimensions: Dimensions,
    settle_ms: u64,
) -> Vec<String> {
    let html = html.display().to_string();
    let png = png.display().to_string();
    let width = dimensions.width.to_string();
    let height = dimensions.height.to_string();
    let settle = settle_ms.to_string();
    argv.iter()
        .map(|arg| {
            arg.replace("{html}", &html)
                .replace("{png}", &png)
                .replace("{width}", &width)
                .replace("{height}", &height)
                .replace("{settle_ms}", &settle)
        })
        .collect()
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("resolve current directory")?
        .join(path))
}

impl Renderer for CommandRenderer {
    #[instrument(skip_all, fields(output = %request.output_path.display(), dimensions = %request.dimensions))]
    fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedImage> {
        let png = absolute(request.output_path)?;
        let html = png.with_extension("html");
        if let Some(parent) = png.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create render dir {}", parent.display()))?;
        }
        fs::write(&html, request.markup)
            .with_context(|| format!("write markup {}", html.display()))?;
        if png.exists() {
            fs::remove_file(&png).with_context(|| format!("remove stale {}", png.display()))?;
        }

        let argv = expand_placeholders(&self.argv, &html, &png, request.dimensions, self.settle_ms);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("renderer.command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args);

        let output = run_command_with_timeout(cmd, None, self.timeout, RENDER_OUTPUT_LIMIT_BYTES)
            .context("run renderer")?;
        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "renderer timed out");
            bail!("renderer timed out after {:?}", self.timeout);
        }
        if !output.succeeded() {
            bail!(
                "renderer exited with {:?}: {}",
                output.status.code(),
                output.stderr_summary()
            );
        }
        if !png.is_file() {
            bail!("renderer finished but produced no image at {}", png.display());
        }

        info!("rendered image");
        Ok(RenderedImage {
            path: png,
            markup_path: html,
            dimensions: request.dimensions,
        })
    }
}
