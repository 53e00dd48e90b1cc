//! Run logging helpers for `<output_dir>/runs/<run-id>/`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

pub const RUNS_DIR: &str = "runs";
pub const RESULT_FILE: &str = "result.json";

/// Per-run directory of JSON snapshots, one file per pipeline stage.
///
/// File names are prefixed with the revision round (`00` for the initial
/// generation) so a directory listing reads in execution order.
#[derive(Debug, Clone)]
pub struct RunLog {
    dir: PathBuf,
}

impl RunLog {
    /// Claim a fresh directory for `run_id`. When another run already owns
    /// it, `{run_id}-2`, `{run_id}-3`, ... are tried in turn.
    pub fn create(output_dir: &Path, run_id: &str) -> Result<Self> {
        let runs = output_dir.join(RUNS_DIR);
        fs::create_dir_all(&runs).with_context(|| format!("create {}", runs.display()))?;
        let mut attempt = 1u32;
        loop {
            let name = if attempt == 1 {
                run_id.to_string()
            } else {
                format!("{run_id}-{attempt}")
            };
            let dir = runs.join(name);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok(Self { dir }),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("create run log dir {}", dir.display()));
                }
            }
        }
    }

    /// Name of the claimed directory, which may carry a `-N` suffix.
    pub fn run_id(&self) -> &str {
        self.dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stage_path(&self, iteration: u32, stage: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{iteration:02}-{stage}.{extension}"))
    }

    pub fn write_stage<T: Serialize>(
        &self,
        iteration: u32,
        stage: &str,
        value: &T,
    ) -> Result<PathBuf> {
        let path = self.stage_path(iteration, stage, "json");
        write_json(&path, value)?;
        Ok(path)
    }

    pub fn write_markup(&self, iteration: u32, markup: &str) -> Result<PathBuf> {
        let path = self.stage_path(iteration, "design", "html");
        write_text(&path, markup)?;
        Ok(path)
    }

    pub fn write_result<T: Serialize>(&self, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(RESULT_FILE);
        write_json(&path, value)?;
        Ok(path)
    }
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    write_text(path, &buf)
}
