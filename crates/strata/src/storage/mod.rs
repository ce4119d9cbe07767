//! File persistence helpers
//!
//! Single files are written to a temporary sibling and renamed over the
//! destination. Whole tenant directories are built in a staging sibling and
//! swapped in, with the old directory parked until the swap lands.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::{Result, StrataError};

/// Write `bytes` to `path` through a temp file + rename in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = parent_or_cwd(path);
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| {
        StrataError::Storage(format!("Failed to persist {}: {}", path.display(), e.error))
    })?;

    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| {
        StrataError::Storage(format!("Failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        StrataError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn parent_or_cwd(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Hidden siblings of `target` used by a directory swap: `(staging, previous)`
pub fn swap_paths(target: &Path) -> Result<(PathBuf, PathBuf)> {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            StrataError::Storage(format!("Cannot stage {}: no directory name", target.display()))
        })?;
    let parent = parent_or_cwd(target);

    Ok((
        parent.join(format!(".{name}.staging")),
        parent.join(format!(".{name}.previous")),
    ))
}

/// Create an empty staging directory for `target`, clearing any leftover
pub fn begin_staging(target: &Path) -> Result<PathBuf> {
    let (staging, _) = swap_paths(target)?;
    if staging.exists() {
        std::fs::remove_dir_all(&staging)?;
    }
    std::fs::create_dir_all(&staging)?;
    Ok(staging)
}

/// Swap a fully written `staging` directory into `target`
///
/// The old `target` is renamed aside first and only removed once the new
/// directory is in place. If the final rename fails it is moved back.
pub fn commit_staging(staging: &Path, target: &Path) -> Result<()> {
    let (_, previous) = swap_paths(target)?;
    // A parked copy with no target is the only snapshot left, keep it for now
    if target.exists() {
        if previous.exists() {
            std::fs::remove_dir_all(&previous)?;
        }
        std::fs::rename(target, &previous)?;
    }

    if let Err(e) = std::fs::rename(staging, target) {
        if previous.exists() {
            if let Err(restore) = std::fs::rename(&previous, target) {
                tracing::error!(
                    "Failed to restore {} after aborted swap: {}",
                    target.display(),
                    restore
                );
            }
        }
        return Err(StrataError::Storage(format!(
            "Failed to swap {} into place: {}",
            target.display(),
            e
        )));
    }

    if previous.exists() {
        if let Err(e) = std::fs::remove_dir_all(&previous) {
            tracing::warn!("Left stale snapshot at {}: {}", previous.display(), e);
        }
    }
    Ok(())
}

/// Directory holding the last complete snapshot of `target`
///
/// Normally `target` itself. When a swap was interrupted after the old
/// directory was parked, the parked copy is returned instead.
pub fn committed_dir(target: &Path) -> PathBuf {
    if !target.exists() {
        if let Ok((_, previous)) = swap_paths(target) {
            if previous.is_dir() {
                tracing::warn!(
                    "{} missing, reading parked snapshot {}",
                    target.display(),
                    previous.display()
                );
                return previous;
            }
        }
    }
    target.to_path_buf()
}
