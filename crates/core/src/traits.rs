//! Capabilities consumed by the resolution engine

use crate::errors::Result;
use crate::types::{Artifact, ImageReference, TargetKey};
use async_trait::async_trait;
use std::sync::Arc;

/// Turns a target key into a build artifact
#[async_trait]
pub trait Builder: Send + Sync {
    /// Whether `reference` (with or without the `ko://` scheme) names a
    /// target this builder can build
    fn is_supported_reference(&self, reference: &str) -> bool;

    /// Build the target. May be slow and allocate real resources.
    async fn build(&self, key: &TargetKey) -> Result<Artifact>;
}

/// Pushes an artifact somewhere and reports where it landed
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, artifact: &Artifact) -> Result<ImageReference>;
}

#[async_trait]
impl<T: Builder + ?Sized> Builder for Arc<T> {
    fn is_supported_reference(&self, reference: &str) -> bool {
        (**self).is_supported_reference(reference)
    }

    async fn build(&self, key: &TargetKey) -> Result<Artifact> {
        (**self).build(key).await
    }
}

#[async_trait]
impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    async fn publish(&self, artifact: &Artifact) -> Result<ImageReference> {
        (**self).publish(artifact).await
    }
}
