//! Builder that packs a source directory into an artifact
//!
//! A target key names a directory relative to the build root. Building it
//! walks the directory in sorted order and writes each regular file as
//! `<relative path> NUL <length as u64 BE> <bytes>` into a gzip stream with
//! a zeroed header timestamp, so identical trees always produce identical
//! bytes and digests.

use async_trait::async_trait;
use bytes::Bytes;
use flate2::{Compression, GzBuilder};
use kresolve_core::types::keys::strip_scheme;
use kresolve_core::{Artifact, Builder, Error, Result, TargetKey};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct SourceBuilder {
    root: PathBuf,
}

impl SourceBuilder {
    /// Fails if `root` does not exist
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| Error::file_system(root, "resolve build root", e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory `key` names, if it exists strictly inside the root
    fn target_dir(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty() || relative.is_absolute() {
            return None;
        }
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return None;
        }
        let dir = self.root.join(relative).canonicalize().ok()?;
        (dir.is_dir() && dir != self.root && dir.starts_with(&self.root)).then_some(dir)
    }
}

#[async_trait]
impl Builder for SourceBuilder {
    /// Scheme references may name a target directory directly; anything
    /// else only counts when it is an explicit `./` path.
    fn is_supported_reference(&self, reference: &str) -> bool {
        let key = strip_scheme(reference);
        if key.len() == reference.len() && !key.starts_with("./") {
            return false;
        }
        self.target_dir(key).is_some()
    }

    async fn build(&self, key: &TargetKey) -> Result<Artifact> {
        let dir = self
            .target_dir(key.as_str())
            .ok_or_else(|| Error::build(key.as_str(), "not a directory inside the build root"))?;

        let name = key.to_string();
        let data = tokio::task::spawn_blocking(move || pack(&dir))
            .await?
            .map_err(|message| Error::build(name, message))?;

        debug!(key = %key, bytes = data.len(), "packed target");
        Ok(Artifact::new(key.clone(), data))
    }
}

fn pack(dir: &Path) -> std::result::Result<Bytes, String> {
    let mut encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::default());

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| format!("walking sources: {e}"))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| format!("walking sources: {e}"))?;
        let contents = std::fs::read(entry.path())
            .map_err(|e| format!("reading {}: {e}", entry.path().display()))?;

        let name = relative.to_string_lossy().replace('\\', "/");
        write_entry(&mut encoder, &name, &contents).map_err(|e| format!("packing {name}: {e}"))?;
    }

    encoder
        .finish()
        .map(Bytes::from)
        .map_err(|e| format!("finishing archive: {e}"))
}

fn write_entry(out: &mut impl Write, name: &str, contents: &[u8]) -> std::io::Result<()> {
    out.write_all(name.as_bytes())?;
    out.write_all(&[0])?;
    out.write_all(&(contents.len() as u64).to_be_bytes())?;
    out.write_all(contents)
}
