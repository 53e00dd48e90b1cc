//! Optional archival of rendered images into `ready/` and `published/` folders.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::io::outputs::unused_file_name;

pub const READY_DIR: &str = "ready";
pub const PUBLISHED_DIR: &str = "published";

/// A file placed in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedFile {
    pub path: PathBuf,
    pub file_name: String,
}

/// Archives never replace an existing file; a taken name gets a numeric
/// suffix and the returned [`ArchivedFile`] carries the name actually used.
pub trait Archive {
    /// Place a copy of `source` into the ready folder under `file_name`.
    fn upload_ready(&self, source: &Path, file_name: &str) -> Result<ArchivedFile>;
    /// Move a ready file into the published folder.
    fn move_to_published(&self, file: &ArchivedFile) -> Result<ArchivedFile>;
}

/// Archive backed by local folders.
#[derive(Debug, Clone)]
pub struct FsArchive {
    root: PathBuf,
}

impl FsArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn ready_dir(&self) -> PathBuf {
        self.root.join(READY_DIR)
    }

    pub fn published_dir(&self) -> PathBuf {
        self.root.join(PUBLISHED_DIR)
    }
}

impl Archive for FsArchive {
    #[instrument(skip_all, fields(file_name = %file_name))]
    fn upload_ready(&self, source: &Path, file_name: &str) -> Result<ArchivedFile> {
        let dir = self.ready_dir();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let file_name = unused_file_name(&dir, file_name);
        let path = dir.join(&file_name);
        fs::copy(source, &path)
            .with_context(|| format!("copy {} to {}", source.display(), path.display()))?;
        debug!(path = %path.display(), "archived into ready");
        Ok(ArchivedFile { path, file_name })
    }

    #[instrument(skip_all, fields(file_name = %file.file_name))]
    fn move_to_published(&self, file: &ArchivedFile) -> Result<ArchivedFile> {
        if !file.path.is_file() {
            bail!("archived file {} no longer exists", file.path.display());
        }
        let dir = self.published_dir();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let file_name = unused_file_name(&dir, &file.file_name);
        let path = dir.join(&file_name);
        fs::rename(&file.path, &path)
            .with_context(|| format!("move {} to {}", file.path.display(), path.display()))?;
        debug!(path = %path.display(), "archived into published");
        Ok(ArchivedFile { path, file_name })
    }
}
