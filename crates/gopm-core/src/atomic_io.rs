//! Crash-safe persistence for small state files such as the workspace
//! credentials file.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Replaces `path` with `content` so a crash mid-write leaves either the
/// previous file or the new one, never a truncated mix. The text goes to a
/// sibling scratch file, is flushed to disk, and is then renamed over the
/// destination. Missing parent directories are created.
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("refusing to persist to an empty path");
    }
    if path.is_dir() {
        bail!("cannot persist to '{}': it is a directory", path.display());
    }

    let parent_dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent_dir)
        .with_context(|| format!("failed to create directory {}", parent_dir.display()))?;

    let scratch_path = scratch_path_for(path, &parent_dir);
    let mut scratch = File::create(&scratch_path)
        .with_context(|| format!("failed to open scratch file {}", scratch_path.display()))?;
    scratch
        .write_all(content.as_bytes())
        .and_then(|_| scratch.sync_all())
        .with_context(|| format!("failed to write scratch file {}", scratch_path.display()))?;
    drop(scratch);

    fs::rename(&scratch_path, path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            scratch_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

// The pid suffix keeps concurrent processes off each other's scratch files;
// within one process the credentials file is written under a single lock.
fn scratch_path_for(path: &Path, parent_dir: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("workspace-tokens");
    parent_dir.join(format!(".{file_name}.{}.partial", std::process::id()))
}
