//! Publisher writing artifacts into a local directory layout
//!
//! ```text
//! <layout>/blobs/sha256/<hex>      artifact bytes
//! <layout>/refs/<name>             digest of the latest artifact for <name>
//! <layout>/tags/<name>/<tag>       digest, one file per configured tag
//! ```

use super::DryRunPublisher;
use async_trait::async_trait;
use kresolve_config::NamingStrategy;
use kresolve_core::{Artifact, Error, ImageReference, Publisher, Result};
use kresolve_utils::{write_atomic, write_atomic_if_changed};
use std::path::PathBuf;
use tracing::{debug, info};

pub struct LayoutPublisher {
    path: PathBuf,
    tags: Vec<String>,
    references: DryRunPublisher,
}

impl LayoutPublisher {
    pub fn new(
        path: impl Into<PathBuf>,
        repository: impl Into<String>,
        naming: NamingStrategy,
        tags: Vec<String>,
    ) -> Self {
        Self {
            path: path.into(),
            tags,
            references: DryRunPublisher::new(repository, naming),
        }
    }
}

#[async_trait]
impl Publisher for LayoutPublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ImageReference> {
        let reference = self.references.reference(artifact);
        let name = crate::naming::image_name(self.references.naming, artifact.key.as_str());

        let blob = self.path.join("blobs/sha256").join(artifact.digest.hex());
        let ref_file = self.path.join("refs").join(&name);
        let tag_files: Vec<PathBuf> = self
            .tags
            .iter()
            .map(|tag| self.path.join("tags").join(&name).join(tag))
            .collect();

        let data = artifact.data.clone();
        let digest = format!("{}\n", artifact.digest);
        let key = artifact.key.to_string();

        let wrote_blob = tokio::task::spawn_blocking(move || -> Result<bool> {
            let wrote = if blob.exists() {
                false
            } else {
                write_atomic(&blob, &data)?;
                true
            };
            write_atomic_if_changed(&ref_file, digest.as_bytes())?;
            for tag_file in &tag_files {
                write_atomic_if_changed(tag_file, digest.as_bytes())?;
            }
            Ok(wrote)
        })
        .await?
        .map_err(|e| Error::publish(key, e.to_string()))?;

        if wrote_blob {
            info!(key = %artifact.key, layout = %self.path.display(), "wrote blob");
        } else {
            debug!(key = %artifact.key, "blob already present");
        }
        Ok(reference)
    }
}
