//! Turning user-supplied paths into attachments.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quill_smtp::Attachment;
use tracing::warn;

/// Expands each path into the files to attach.
///
/// A directory contributes the regular files directly inside it, sorted by
/// name. Paths that do not exist are skipped with a warning.
pub async fn expand(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        let Ok(metadata) = tokio::fs::metadata(path).await else {
            warn!(path = %path.display(), "No such file, skipping");
            continue;
        };

        if metadata.is_dir() {
            files.extend(directory_files(path).await?);
        } else {
            files.push(path.clone());
        }
    }

    Ok(files)
}

async fn directory_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot list {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Reads every file into an attachment named after its final component.
pub async fn load(files: &[PathBuf]) -> Result<Vec<Attachment>> {
    let mut attachments = Vec::with_capacity(files.len());
    for file in files {
        let data = tokio::fs::read(file)
            .await
            .with_context(|| format!("cannot read {}", file.display()))?;
        let filename = file
            .file_name()
            .map_or_else(|| file.to_string_lossy(), |name| name.to_string_lossy())
            .into_owned();
        attachments.push(Attachment::new(filename, data));
    }
    Ok(attachments)
}
