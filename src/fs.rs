//! Atomic file replacement using a temp-file-and-rename strategy.

use crate::errors::{Error, Result};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Atomically replaces the contents of `path` with `content`.
///
/// The bytes go to a temporary file in the same directory, which is synced
/// and then renamed over the target, so readers see either the old file or
/// the new one, never a truncated mix. The replacement keeps the original
/// file's permissions. On any error the original is left untouched and the
/// temporary file is removed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    atomic_write_with(path, content, |_| Ok(()))
}

/// Same as [`atomic_write`], calling `before_rename` once the temporary file
/// is complete. An error from the hook aborts the replacement.
pub(crate) fn atomic_write_with<F>(path: &Path, content: &[u8], before_rename: F) -> Result<()>
where
    F: FnOnce(&NamedTempFile) -> io::Result<()>,
{
    let write_err = |source: io::Error| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
    debug!(temp = %temp.path().display(), "writing temporary file");

    temp.write_all(content).map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;

    if let Ok(metadata) = std::fs::metadata(path) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(write_err)?;
    }

    before_rename(&temp).map_err(write_err)?;

    temp.persist(path).map_err(|e| write_err(e.error))?;
    debug!(path = %path.display(), bytes = content.len(), "replaced file");
    Ok(())
}
