//! Assembles the build and publish stack a run uses
//!
//! Builds go through `CachingBuilder(Limiter(SourceBuilder))`, so only
//! cache misses take a build permit. Publishes go through
//! `CachingPublisher([Limiter](publisher))` where the publisher writes the
//! local layout when one is configured and always reports the repository
//! reference.

use kresolve_build::{DryRunPublisher, LayoutPublisher, MultiPublisher, SourceBuilder};
use kresolve_cache::{CachingBuilder, CachingPublisher, Limiter};
use kresolve_config::Config;
use kresolve_core::{Publisher, Result, ResultExt};
use kresolve_resolve::{Pipeline, PipelineOptions, Selector, WatchSettings};
use kresolve_watch::DirectoryLocator;
use std::sync::Arc;
use tracing::debug;

pub fn builder(config: &Config) -> Result<Arc<CachingBuilder>> {
    let source = SourceBuilder::new(&config.build.root)?;
    debug!(
        root = %source.root().display(),
        concurrent_builds = config.build.concurrent_builds,
        "build stack ready"
    );
    Ok(Arc::new(CachingBuilder::new(Limiter::new(
        source,
        config.build.concurrent_builds,
    ))))
}

pub fn publisher(config: &Config) -> Arc<dyn Publisher> {
    let publish = &config.publish;
    let mut publishers: Vec<Box<dyn Publisher>> = Vec::new();

    if let Some(layout) = &publish.oci_layout_path {
        publishers.push(Box::new(LayoutPublisher::new(
            layout,
            publish.repository.clone(),
            publish.naming,
            publish.tags.clone(),
        )));
    }
    publishers.push(Box::new(DryRunPublisher::new(
        publish.repository.clone(),
        publish.naming,
    )));

    let inner: Arc<dyn Publisher> = Arc::new(MultiPublisher::new(publishers));
    let inner: Arc<dyn Publisher> = match publish.concurrent_publishes {
        Some(permits) => Arc::new(Limiter::new(inner, permits)),
        None => inner,
    };
    Arc::new(CachingPublisher::new(inner))
}

pub fn selector(config: &Config) -> Result<Option<Selector>> {
    config
        .selector
        .selector
        .as_deref()
        .map(Selector::parse)
        .transpose()
        .context("invalid --selector")
}

/// The full pipeline for `config`. Fails on configuration problems only.
pub fn pipeline(config: &Config) -> Result<Pipeline> {
    let selector = selector(config)?;
    let builder = builder(config)?;

    let watch = config.filenames.watch.then(|| {
        WatchSettings::new(
            Arc::new(DirectoryLocator::new(&config.build.root)),
            config.watch.debounce,
        )
    });

    Ok(Pipeline::new(
        builder,
        publisher(config),
        PipelineOptions {
            strict: config.strict.strict,
            selector,
            watch,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kresolve_core::{Artifact, Builder, Error, TargetKey};
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &std::path::Path) -> Config {
        Config::builder()
            .root(root)
            .repository("registry.example/team")
            .filenames(vec![root.join("deploy")])
            .concurrent_builds(2)
            .build()
    }

    #[test]
    fn test_invalid_selector_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.selector.selector = Some("app in (".into());

        let err = selector(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_stack_builds_and_publishes_into_layout() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("cmd/app")).unwrap();
        fs::write(dir.path().join("cmd/app/main.go"), "package main\n").unwrap();

        let mut config = config(dir.path());
        config.publish.oci_layout_path = Some(dir.path().join("layout"));

        let builder = builder(&config).unwrap();
        let publisher = publisher(&config);
        assert!(builder.is_supported_reference("ko://./cmd/app"));

        let artifact: Artifact = builder.build(&TargetKey::new("./cmd/app")).await.unwrap();
        let reference = publisher.publish(&artifact).await.unwrap();

        assert!(reference.as_str().starts_with("registry.example/team/app-"));
        assert!(reference.as_str().ends_with(artifact.digest.as_str()));
        assert!(dir
            .path()
            .join("layout/blobs/sha256")
            .join(artifact.digest.hex())
            .is_file());
    }
}
