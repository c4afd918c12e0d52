//! Records the targets one resolution task actually builds

use async_trait::async_trait;
use indexmap::IndexSet;
use kresolve_core::{Artifact, Builder, Result, TargetKey};
use parking_lot::Mutex;

/// Builder decorator scoped to a single resolution task.
///
/// Every key passed to `build` is appended to an insertion-ordered set
/// before the call is delegated unchanged, whether or not the build
/// succeeds.
pub struct Recorder<B> {
    builder: B,
    import_paths: Mutex<IndexSet<TargetKey>>,
}

impl<B> Recorder<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            import_paths: Mutex::new(IndexSet::new()),
        }
    }

    /// Keys built so far, in first-seen order
    pub fn import_paths(&self) -> Vec<TargetKey> {
        self.import_paths.lock().iter().cloned().collect()
    }

    pub fn into_import_paths(self) -> Vec<TargetKey> {
        self.import_paths.into_inner().into_iter().collect()
    }
}

#[async_trait]
impl<B: Builder> Builder for Recorder<B> {
    fn is_supported_reference(&self, reference: &str) -> bool {
        self.builder.is_supported_reference(reference)
    }

    async fn build(&self, key: &TargetKey) -> Result<Artifact> {
        self.import_paths.lock().insert(key.clone());
        self.builder.build(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kresolve_core::testing::FakeBuilder;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_records_in_order_without_duplicates() {
        let fake = Arc::new(FakeBuilder::new().with_failure("./cmd/bad", "nope"));
        let recorder = Recorder::new(Arc::clone(&fake));

        for key in ["./cmd/b", "./cmd/a", "./cmd/b", "./cmd/bad"] {
            let _ = recorder.build(&TargetKey::new(key)).await;
        }

        let recorded: Vec<String> = recorder
            .into_import_paths()
            .into_iter()
            .map(TargetKey::into_string)
            .collect();
        assert_eq!(recorded, vec!["./cmd/b", "./cmd/a", "./cmd/bad"]);
        assert_eq!(fake.calls("./cmd/b"), 2);
    }

    #[tokio::test]
    async fn test_delegates_supported_reference() {
        let recorder = Recorder::new(FakeBuilder::new());
        assert!(recorder.is_supported_reference("ko://./cmd/app"));
        assert!(!recorder.is_supported_reference("nginx"));
        assert!(recorder.import_paths().is_empty());
    }
}
