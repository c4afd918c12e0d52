use kresolve_core::{Error, Result, TargetKey};
use std::path::PathBuf;

/// Maps a target key to the filesystem paths whose changes affect it
pub trait SourceLocator: Send + Sync {
    fn sources(&self, key: &TargetKey) -> Result<Vec<PathBuf>>;
}

/// Targets are directories relative to a root
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    root: PathBuf,
}

impl DirectoryLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SourceLocator for DirectoryLocator {
    fn sources(&self, key: &TargetKey) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(key.as_str());
        let canonical = dir
            .canonicalize()
            .map_err(|e| Error::dependency(key.as_str(), format!("locating {}: {e}", dir.display())))?;
        if !canonical.is_dir() {
            return Err(Error::dependency(
                key.as_str(),
                format!("{} is not a directory", canonical.display()),
            ));
        }
        Ok(vec![canonical])
    }
}
