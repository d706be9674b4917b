use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::SelectedFile;

/// Expand file and directory arguments into the upload selection.
///
/// Directories are walked recursively in file-name order. Files that are
/// not videos are skipped unless `any_type` is set.
pub fn collect_files(paths: &[PathBuf], any_type: bool) -> Result<Vec<SelectedFile>> {
    let mut selected = Vec::new();

    for path in paths {
        if !path.exists() {
            bail!("No such file or directory: {:?}", path);
        }

        if path.is_file() {
            push_file(&mut selected, path.clone(), any_type)?;
            continue;
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry =
                entry.with_context(|| format!("Failed to read directory entry under {:?}", path))?;
            if entry.file_type().is_file() {
                push_file(&mut selected, entry.into_path(), any_type)?;
            }
        }
    }

    debug!("Selected {} file(s)", selected.len());
    Ok(selected)
}

fn push_file(selected: &mut Vec<SelectedFile>, path: PathBuf, any_type: bool) -> Result<()> {
    let file = SelectedFile::from_path(&path)?;
    if !any_type && !file.is_video() {
        warn!("Skipping {:?}: {} is not a video", path, file.mime_type);
        return Ok(());
    }
    selected.push(file);
    Ok(())
}
