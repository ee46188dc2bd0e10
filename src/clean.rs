//! Output cleaning
//!
//! Deletes everything the clean glob matches. Errors are returned, never
//! swallowed; an entry that is already gone is not an error.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{FrontpipeError, Result};

/// Remove every file and directory matching `pattern` under `root`.
///
/// Returns the number of entries removed. Directories are removed with
/// their contents, so matches inside an already removed directory are
/// skipped.
pub async fn clean(root: &Path, pattern: &str) -> Result<usize> {
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        pattern
    );

    let mut matches: Vec<PathBuf> = glob::glob(&full)
        .map_err(|e| FrontpipeError::InvalidGlob {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| {
            let path = e.path().to_path_buf();
            FrontpipeError::fs(path, e.into())
        })?;

    // Parents sort before their children
    matches.sort();

    let mut removed: Vec<PathBuf> = Vec::new();
    for path in matches {
        if removed.iter().any(|r| path.starts_with(r)) {
            continue;
        }

        let metadata = match tokio::fs::symlink_metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(FrontpipeError::fs(path, e)),
        };

        let result = if metadata.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };

        match result {
            Ok(()) => {
                debug!(path = %path.display(), "removed");
                removed.push(path);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(FrontpipeError::fs(path, e)),
        }
    }

    info!(pattern, removed = removed.len(), "cleaned");
    Ok(removed.len())
}
