//! Atomic file replacement shared by the config file and the domains file.
//!
//! Content is written to a sibling `.tmp` file, flushed, and renamed over the
//! target so readers never observe a half-written file.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;

/// Write `contents` to `path` atomically, creating parent directories.
///
/// When `mode` is given (unix only) the temporary file gets those permission
/// bits before it is renamed into place.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8], mode: Option<u32>) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    let temp_path = temp_path(path);
    {
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            Error::config(format!(
                "Failed to create temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        file.write_all(contents).await.map_err(|e| {
            Error::config(format!(
                "Failed to write to temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        file.flush().await.map_err(|e| {
            Error::config(format!(
                "Failed to flush temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = mode {
            fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(mode)).await?;
        }
    }
    #[cfg(not(unix))]
    let _ = mode;

    fs::rename(&temp_path, path).await.map_err(|e| {
        Error::config(format!(
            "Failed to rename {} to {}: {}",
            temp_path.display(),
            path.display(),
            e
        ))
    })?;

    tracing::trace!("Wrote {}", path.display());
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
