//! Filesystem change notification
//!
//! [`FsNotifier`] adapts the `notify` crate's callback-based watcher into a
//! stream of [`NotifierEvent`]s on a tokio channel. Anything implementing
//! [`Notifier`] can stand in for it.

use kresolve_core::{Error, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// One raw notification, before debouncing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    Changed(Vec<PathBuf>),
    Failed(String),
}

/// Something that can be told to watch paths and later be stopped
pub trait Notifier: Send + Sync {
    /// Start watching `path` recursively
    fn watch(&self, path: &Path) -> Result<()>;

    /// Stop delivering events and release the underlying resources
    fn shutdown(&self);
}

/// `notify`-backed notifier
pub struct FsNotifier {
    watcher: Mutex<Option<RecommendedWatcher>>,
}

impl FsNotifier {
    /// Create a watcher delivering into `events`. Fails if the platform
    /// watcher cannot be initialised.
    pub fn new(events: mpsc::UnboundedSender<NotifierEvent>) -> Result<Self> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                        trace!(paths = ?event.paths, kind = ?event.kind, "fs event");
                        NotifierEvent::Changed(event.paths)
                    }
                    _ => return,
                },
                Err(e) => NotifierEvent::Failed(e.to_string()),
            };
            // The receiver is gone once the owner shut down; nothing to report to.
            let _ = events.send(event);
        })
        .map_err(|e| Error::notifier(format!("initialising filesystem watcher: {e}")))?;

        Ok(Self {
            watcher: Mutex::new(Some(watcher)),
        })
    }
}

impl Notifier for FsNotifier {
    fn watch(&self, path: &Path) -> Result<()> {
        let mut guard = self.watcher.lock();
        let watcher = guard
            .as_mut()
            .ok_or_else(|| Error::notifier("watcher already shut down"))?;
        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| Error::notifier(format!("watching {}: {e}", path.display())))?;
        debug!(path = %path.display(), "watching");
        Ok(())
    }

    fn shutdown(&self) {
        // Dropping the watcher stops its background thread.
        if self.watcher.lock().take().is_some() {
            debug!("filesystem watcher stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_watch_after_shutdown_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let notifier = FsNotifier::new(tx).unwrap();
        let temp_dir = TempDir::new().unwrap();

        notifier.watch(temp_dir.path()).unwrap();
        notifier.shutdown();

        let err = notifier.watch(temp_dir.path()).unwrap_err();
        assert!(matches!(err, Error::Notifier { .. }));
    }

    #[test]
    fn test_watch_missing_path_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let notifier = FsNotifier::new(tx).unwrap();
        let temp_dir = TempDir::new().unwrap();

        assert!(notifier.watch(&temp_dir.path().join("absent")).is_err());
    }
}
