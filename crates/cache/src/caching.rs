//! Memoizing decorators for the build and publish capabilities

use crate::concurrent::MemoizingExecutor;
use async_trait::async_trait;
use kresolve_core::{Artifact, Builder, ImageReference, Publisher, Result, TargetKey};
use std::sync::Arc;
use tracing::info;

/// Builder that shares one build per target key until the key is invalidated.
///
/// When the same target is referenced from several manifests, the later
/// requests block on the first build instead of starting their own. In watch
/// mode the keys affected by a change are invalidated before their manifests
/// are re-enqueued, so unchanged targets in the same manifest stay cached.
pub struct CachingBuilder {
    inner: Arc<dyn Builder>,
    results: MemoizingExecutor<Artifact>,
}

impl CachingBuilder {
    pub fn new(inner: impl Builder + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            results: MemoizingExecutor::new("build"),
        }
    }

    /// Drop the cached build of `key`; returns whether one existed
    pub fn invalidate(&self, key: &str) -> bool {
        self.results.invalidate(key)
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.results.contains(key)
    }
}

#[async_trait]
impl Builder for CachingBuilder {
    fn is_supported_reference(&self, reference: &str) -> bool {
        self.inner.is_supported_reference(reference)
    }

    async fn build(&self, key: &TargetKey) -> Result<Artifact> {
        let inner = Arc::clone(&self.inner);
        self.results
            .execute(key.as_str(), move |key| async move {
                let key = TargetKey::new(key);
                let artifact = inner.build(&key).await?;
                info!(key = %key, digest = %artifact.digest, "built target");
                Ok(artifact)
            })
            .await
    }
}

/// Publisher that publishes each distinct artifact once.
///
/// Entries are keyed by `<target key>@<artifact digest>`, so a rebuilt
/// artifact with new content is published again without any invalidation.
pub struct CachingPublisher {
    inner: Arc<dyn Publisher>,
    results: MemoizingExecutor<ImageReference>,
}

impl CachingPublisher {
    pub fn new(inner: impl Publisher + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            results: MemoizingExecutor::new("publish"),
        }
    }

    fn cache_key(artifact: &Artifact) -> String {
        format!("{}@{}", artifact.key, artifact.digest)
    }
}

#[async_trait]
impl Publisher for CachingPublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ImageReference> {
        let inner = Arc::clone(&self.inner);
        let owned = artifact.clone();
        self.results
            .execute(&Self::cache_key(artifact), move |_| async move {
                let reference = inner.publish(&owned).await?;
                info!(key = %owned.key, reference = %reference, "published target");
                Ok(reference)
            })
            .await
    }
}
