//! Dependency graph from source paths to build targets
//!
//! Targets are added as resolutions build them. Each one is resolved to its
//! source paths through a [`SourceLocator`] and those paths are watched.
//! When a debounced batch of changes arrives, the set of targets whose
//! sources contain a changed path is handed to the change callback.

use crate::debounce;
use crate::locator::SourceLocator;
use crate::notifier::{FsNotifier, Notifier, NotifierEvent};
use kresolve_core::{Error, Result, TargetKey};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct GraphState {
    locator: Arc<dyn SourceLocator>,
    notifier: Arc<dyn Notifier>,
    /// target -> source roots being watched for it
    targets: Mutex<HashMap<TargetKey, Vec<PathBuf>>>,
}

impl GraphState {
    fn affected(&self, changed: &HashSet<PathBuf>) -> HashSet<TargetKey> {
        let targets = self.targets.lock();
        targets
            .iter()
            .filter(|(_, roots)| {
                changed
                    .iter()
                    .any(|path| roots.iter().any(|root| path.starts_with(root)))
            })
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// Watches the sources of every added target until dropped
pub struct DependencyGraph {
    state: Arc<GraphState>,
    event_task: JoinHandle<()>,
}

impl DependencyGraph {
    /// Create a graph backed by the platform filesystem watcher.
    ///
    /// The returned receiver yields at most one error: the notifier failure
    /// that ended the session.
    pub fn new<F>(
        locator: Arc<dyn SourceLocator>,
        window: Duration,
        on_change: F,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Error>)>
    where
        F: Fn(HashSet<TargetKey>) + Send + Sync + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let notifier = FsNotifier::new(event_tx)?;
        Ok(Self::with_notifier(
            Arc::new(notifier),
            event_rx,
            locator,
            window,
            on_change,
        ))
    }

    /// Create a graph on top of an arbitrary notifier and its event stream
    pub fn with_notifier<F>(
        notifier: Arc<dyn Notifier>,
        events: mpsc::UnboundedReceiver<NotifierEvent>,
        locator: Arc<dyn SourceLocator>,
        window: Duration,
        on_change: F,
    ) -> (Self, mpsc::UnboundedReceiver<Error>)
    where
        F: Fn(HashSet<TargetKey>) + Send + Sync + 'static,
    {
        let state = Arc::new(GraphState {
            locator,
            notifier,
            targets: Mutex::new(HashMap::new()),
        });
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let event_task = tokio::spawn(Self::event_loop(
            Arc::clone(&state),
            events,
            window,
            on_change,
            error_tx,
        ));

        (
            Self {
                state,
                event_task,
            },
            error_rx,
        )
    }

    async fn event_loop<F>(
        state: Arc<GraphState>,
        mut events: mpsc::UnboundedReceiver<NotifierEvent>,
        window: Duration,
        on_change: F,
        errors: mpsc::UnboundedSender<Error>,
    ) where
        F: Fn(HashSet<TargetKey>) + Send + Sync + 'static,
    {
        while let Some(batch) = debounce::next_batch(&mut events, window).await {
            match batch {
                Ok(paths) => {
                    let affected = state.affected(&paths);
                    debug!(changed = paths.len(), affected = affected.len(), "change batch");
                    if !affected.is_empty() {
                        info!(targets = ?affected, "targets changed");
                        on_change(affected);
                    }
                }
                Err(error) => {
                    warn!(error = %error, "filesystem watcher failed");
                    let _ = errors.send(error);
                    return;
                }
            }
        }
    }

    /// Register interest in `key`; a no-op if it is already tracked.
    ///
    /// The target table stays locked while the sources are located and
    /// watched, so concurrent adds of one key watch its roots once.
    pub fn add(&self, key: &TargetKey) -> Result<()> {
        let mut targets = self.state.targets.lock();
        if targets.contains_key(key) {
            return Ok(());
        }

        let roots = self.state.locator.sources(key)?;
        for root in &roots {
            self.state
                .notifier
                .watch(root)
                .map_err(|e| Error::dependency(key.as_str(), e.to_string()))?;
        }

        debug!(key = %key, roots = ?roots, "tracking target");
        targets.insert(key.clone(), roots);
        Ok(())
    }

    /// Targets whose sources contain any of `changed`
    pub fn affected(&self, changed: &HashSet<PathBuf>) -> HashSet<TargetKey> {
        self.state.affected(changed)
    }

    pub fn contains(&self, key: &TargetKey) -> bool {
        self.state.targets.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.targets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.targets.lock().is_empty()
    }

    /// Stop the notifier and the event loop
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for DependencyGraph {
    fn drop(&mut self) {
        self.state.notifier.shutdown();
        self.event_task.abort();
    }
}
