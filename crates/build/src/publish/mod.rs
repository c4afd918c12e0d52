//! Publishers turning artifacts into image references

mod layout;

pub use layout::LayoutPublisher;

use crate::naming::image_name;
use async_trait::async_trait;
use kresolve_config::NamingStrategy;
use kresolve_core::{Artifact, Error, ImageReference, Publisher, Result};
use tracing::debug;

/// Computes the reference an artifact would be pulled by, without pushing
#[derive(Debug, Clone)]
pub struct DryRunPublisher {
    repository: String,
    naming: NamingStrategy,
}

impl DryRunPublisher {
    pub fn new(repository: impl Into<String>, naming: NamingStrategy) -> Self {
        Self {
            repository: repository.into(),
            naming,
        }
    }

    pub(crate) fn reference(&self, artifact: &Artifact) -> ImageReference {
        let name = image_name(self.naming, artifact.key.as_str());
        ImageReference::by_digest(&self.repository, &name, &artifact.digest)
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ImageReference> {
        let reference = self.reference(artifact);
        debug!(key = %artifact.key, reference = %reference, "computed reference");
        Ok(reference)
    }
}

/// Publishes to every inner publisher in order and reports the last reference
pub struct MultiPublisher {
    publishers: Vec<Box<dyn Publisher>>,
}

impl MultiPublisher {
    pub fn new(publishers: Vec<Box<dyn Publisher>>) -> Self {
        Self { publishers }
    }
}

#[async_trait]
impl Publisher for MultiPublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ImageReference> {
        let mut last = None;
        for publisher in &self.publishers {
            last = Some(publisher.publish(artifact).await?);
        }
        last.ok_or_else(|| Error::publish(artifact.key.as_str(), "no publishers configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kresolve_core::TargetKey;

    fn artifact() -> Artifact {
        Artifact::new(TargetKey::new("./cmd/app"), b"bytes".to_vec())
    }

    #[tokio::test]
    async fn test_dry_run_reference_shape() {
        let publisher = DryRunPublisher::new("registry.example/team/", NamingStrategy::Base);
        let artifact = artifact();

        let reference = publisher.publish(&artifact).await.unwrap();
        assert_eq!(
            reference.as_str(),
            format!("registry.example/team/app@{}", artifact.digest)
        );
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl Publisher for Fixed {
        async fn publish(&self, _artifact: &Artifact) -> Result<ImageReference> {
            Ok(ImageReference::new(self.0))
        }
    }

    struct Failing;

    #[async_trait]
    impl Publisher for Failing {
        async fn publish(&self, artifact: &Artifact) -> Result<ImageReference> {
            Err(Error::publish(artifact.key.as_str(), "denied"))
        }
    }

    #[tokio::test]
    async fn test_multi_returns_last_reference() {
        let multi = MultiPublisher::new(vec![Box::new(Fixed("first")), Box::new(Fixed("second"))]);
        assert_eq!(multi.publish(&artifact()).await.unwrap().as_str(), "second");
    }

    #[tokio::test]
    async fn test_multi_stops_at_first_failure() {
        let multi = MultiPublisher::new(vec![Box::new(Failing), Box::new(Fixed("unreached"))]);
        assert!(matches!(
            multi.publish(&artifact()).await.unwrap_err(),
            Error::Publish { .. }
        ));

        let empty = MultiPublisher::new(Vec::new());
        assert!(empty.publish(&artifact()).await.is_err());
    }
}
