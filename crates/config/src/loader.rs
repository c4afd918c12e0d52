//! Configuration loader for kresolve
//!
//! Merges explicit settings (usually command line flags) with the process
//! environment and validates the result, so the rest of the run only ever
//! sees a configuration that is known to be usable.

use crate::config::{Config, ConfigBuilder};
use kresolve_core::{Result, DOCKER_REPO_VAR};
use std::sync::Arc;
use tracing::debug;

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Loader that fills gaps in a [`ConfigBuilder`] from the environment
pub struct ConfigLoader {
    builder: ConfigBuilder,
    repository: Option<String>,
    env: EnvLookup,
}

impl ConfigLoader {
    pub fn new(builder: ConfigBuilder) -> Self {
        Self {
            builder,
            repository: None,
            env: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Explicit destination repository; takes precedence over the environment
    pub fn repository(mut self, repository: Option<String>) -> Self {
        self.repository = repository.filter(|r| !r.is_empty());
        self
    }

    /// Replace the environment lookup, for tests
    pub fn env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Assemble and validate the configuration
    pub fn load(self) -> Result<Arc<Config>> {
        let repository = match self.repository {
            Some(repository) => repository,
            None => (self.env)(DOCKER_REPO_VAR).unwrap_or_default(),
        };

        let config = self.builder.repository(repository).build();
        config.validate()?;

        debug!(
            repository = %config.publish.repository,
            inputs = config.filenames.filenames.len(),
            watch = config.filenames.watch,
            concurrent_builds = config.build.concurrent_builds,
            "configuration loaded"
        );
        Ok(Arc::new(config))
    }
}
