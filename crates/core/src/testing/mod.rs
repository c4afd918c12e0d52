//! In-memory builder and publisher fakes for tests across the workspace
//!
//! Both fakes count their physical invocations per key so tests can assert
//! memoization, and both can be told to fail or stall for specific keys.

use crate::errors::{Error, Result};
use crate::traits::{Builder, Publisher};
use crate::types::{Artifact, ImageReference, TargetKey};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Registry used by [`FakePublisher`] references
pub const FAKE_REGISTRY: &str = "registry.example";

/// Builder whose artifacts embed the key and how many times it was built
#[derive(Default)]
pub struct FakeBuilder {
    calls: DashMap<String, usize>,
    delays: DashMap<String, Duration>,
    failures: DashMap<String, String>,
    transient: DashMap<String, String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every build of `key` take `delay`
    pub fn with_delay(self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    /// Make every build of `key` fail with `message`
    pub fn with_failure(self, key: &str, message: &str) -> Self {
        self.failures.insert(key.to_string(), message.to_string());
        self
    }

    /// Make only the next build of `key` fail with `message`
    pub fn with_transient_failure(self, key: &str, message: &str) -> Self {
        self.transient.insert(key.to_string(), message.to_string());
        self
    }

    /// Number of physical builds of `key`
    pub fn calls(&self, key: &str) -> usize {
        self.calls.get(key).map_or(0, |count| *count)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }

    /// Highest number of builds observed running at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Builder for FakeBuilder {
    fn is_supported_reference(&self, reference: &str) -> bool {
        crate::types::keys::strip_scheme(reference).starts_with("./")
    }

    async fn build(&self, key: &TargetKey) -> Result<Artifact> {
        let generation = {
            let mut count = self.calls.entry(key.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = self.delays.get(key.as_str()).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = self.failures.get(key.as_str()) {
            return Err(Error::build(key.as_str(), message.value().clone()));
        }
        if let Some((_, message)) = self.transient.remove(key.as_str()) {
            return Err(Error::build(key.as_str(), message));
        }

        Ok(Artifact::new(
            key.clone(),
            format!("artifact:{key}:{generation}").into_bytes(),
        ))
    }
}

/// Publisher returning `registry.example/<name>@<digest>`
#[derive(Default)]
pub struct FakePublisher {
    calls: DashMap<String, usize>,
    failures: DashMap<String, String>,
}

impl FakePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(self, key: &str, message: &str) -> Self {
        self.failures.insert(key.to_string(), message.to_string());
        self
    }

    /// Number of publishes of artifacts built from `key`
    pub fn calls(&self, key: &str) -> usize {
        self.calls.get(key).map_or(0, |count| *count)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }

    /// The reference [`FakePublisher`] produces for an artifact
    pub fn reference_for(artifact: &Artifact) -> ImageReference {
        let name = artifact.key.trim_start_matches("./").replace('/', "-");
        ImageReference::by_digest(FAKE_REGISTRY, &name, &artifact.digest)
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, artifact: &Artifact) -> Result<ImageReference> {
        *self.calls.entry(artifact.key.to_string()).or_insert(0) += 1;

        if let Some(message) = self.failures.get(artifact.key.as_str()) {
            return Err(Error::publish(artifact.key.as_str(), message.value().clone()));
        }

        Ok(Self::reference_for(artifact))
    }
}
