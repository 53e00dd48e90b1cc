//! Output directory helpers: collision-free names and the `history` listing.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputEntry {
    pub path: PathBuf,
    pub bytes: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// First name in `dir` not taken yet: `file_name`, then `{stem}_2.{ext}`,
/// `{stem}_3.{ext}` and so on.
pub fn unused_file_name(dir: &Path, file_name: &str) -> String {
    if !dir.join(file_name).exists() {
        return file_name.to_string();
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };
    (2u32..)
        .map(|n| match ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        })
        .find(|candidate| !dir.join(candidate).exists())
        .unwrap_or_else(|| file_name.to_string())
}

fn is_output_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("png" | "html")
    )
}

/// The `limit` most recently modified images and markup files in `output_dir`.
///
/// A missing directory yields an empty list.
pub fn list_recent_outputs(output_dir: &Path, limit: usize) -> Result<Vec<OutputEntry>> {
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries = Vec::new();
    let dir = fs::read_dir(output_dir)
        .with_context(|| format!("read {}", output_dir.display()))?;
    for entry in dir {
        let entry = entry.with_context(|| format!("read entry in {}", output_dir.display()))?;
        let path = entry.path();
        if !path.is_file() || !is_output_file(&path) {
            continue;
        }
        let metadata = entry
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?;
        entries.push(OutputEntry {
            bytes: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            path,
        });
    }
    // Newest first; names break ties so the order is deterministic.
    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
    entries.truncate(limit);
    Ok(entries)
}
