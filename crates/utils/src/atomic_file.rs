//! Crash-safe file writes
//!
//! Readers of a published layout must never observe a half-written blob
//! or ref, so every write lands in a temporary file in the destination
//! directory and is renamed into place.

use kresolve_core::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Write data to a file atomically by writing to a temporary file and renaming
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).ok_or_else(|| {
        Error::configuration(format!(
            "invalid file path '{}': no parent directory",
            path.display()
        ))
    })?;

    fs::create_dir_all(parent)
        .map_err(|e| Error::file_system(parent, "create parent directory", e))?;

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|e| Error::file_system(parent, "create temporary file", e))?;
    temp.write_all(content)
        .map_err(|e| Error::file_system(temp.path(), "write to temporary file", e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| Error::file_system(temp.path(), "sync temporary file", e))?;

    // The temporary file is removed on drop if the rename fails.
    temp.persist(path)
        .map_err(|e| Error::file_system(path, "atomic rename", e.error))?;

    Ok(())
}

/// Write `content` unless `path` already holds exactly those bytes.
///
/// Returns whether anything was written.
pub fn write_atomic_if_changed(path: &Path, content: &[u8]) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == content => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(Error::file_system(path, "read existing file", e)),
    }
    write_atomic(path, content)?;
    Ok(true)
}
