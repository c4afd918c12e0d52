//! The stream of manifest files to resolve
//!
//! In one-shot mode the stream yields every input once and closes. In watch
//! mode it stays open: manifests created or modified under the inputs are
//! emitted again, and a [`Resubmitter`] lets the dependency graph re-enqueue
//! files whose targets changed.

use kresolve_config::FilenameOptions;
use kresolve_core::{Error, FileId, Result, MANIFEST_EXTENSIONS};
use kresolve_watch::debounce;
use kresolve_watch::{FsNotifier, Notifier};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Re-enqueues files into an open [`FileSource`]
#[derive(Debug, Clone)]
pub struct Resubmitter {
    sender: mpsc::UnboundedSender<Result<FileId>>,
}

impl Resubmitter {
    /// Returns `false` once the source has been dropped
    pub fn resubmit(&self, file: FileId) -> bool {
        self.sender.send(Ok(file)).is_ok()
    }
}

pub struct FileSource {
    receiver: mpsc::UnboundedReceiver<Result<FileId>>,
    resubmitter: Option<Resubmitter>,
    watcher: Option<ManifestWatcher>,
}

impl FileSource {
    /// A finite stream over `files`
    pub fn once(files: Vec<FileId>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        for file in files {
            let _ = sender.send(Ok(file));
        }
        Self {
            receiver,
            resubmitter: None,
            watcher: None,
        }
    }

    /// An open stream fed only through the returned [`Resubmitter`]
    pub fn open(files: Vec<FileId>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let resubmitter = Resubmitter { sender };
        for file in files {
            resubmitter.resubmit(file);
        }
        Self {
            receiver,
            resubmitter: Some(resubmitter),
            watcher: None,
        }
    }

    /// Enumerate the configured inputs, finite unless `options.watch` is set
    pub fn enumerate(options: &FilenameOptions, window: Duration) -> Result<Self> {
        let files = list_files(options)?;
        if !options.watch {
            return Ok(Self::once(files));
        }

        let mut source = Self::open(files);
        if let Some(resubmitter) = &source.resubmitter {
            source.watcher = Some(ManifestWatcher::start(
                options,
                window,
                resubmitter.sender.clone(),
            )?);
        }
        Ok(source)
    }

    /// Handle for re-enqueueing files; `None` for finite streams
    pub fn resubmitter(&self) -> Option<Resubmitter> {
        self.resubmitter.clone()
    }

    /// Next file, or an error that ends the run. `None` once a finite
    /// stream is exhausted.
    pub async fn next(&mut self) -> Option<Result<FileId>> {
        self.receiver.recv().await
    }

    /// Stop watching and let the stream drain and close
    pub fn close(&mut self) {
        self.resubmitter = None;
        self.watcher = None;
    }
}

/// Expand the configured filenames into manifest file identifiers.
///
/// Directories contribute their `.yaml`, `.yml` and `.json` files in sorted
/// order, descending only when `recursive` is set.
pub fn list_files(options: &FilenameOptions) -> Result<Vec<FileId>> {
    let mut files = Vec::new();
    for input in &options.filenames {
        let id = FileId::from(input.as_path());
        let FileId::Path(path) = id else {
            files.push(FileId::Stdin);
            continue;
        };

        let metadata = std::fs::metadata(&path)
            .map_err(|e| Error::file_system(&path, "inspect input", e))?;
        if !metadata.is_dir() {
            files.push(FileId::Path(path));
            continue;
        }

        let max_depth = if options.recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(&path)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                Error::file_system(&path, "list directory", source)
            })?;
            if entry.file_type().is_file() && is_manifest(entry.path()) {
                files.push(FileId::Path(entry.into_path()));
            }
        }
    }
    debug!(files = files.len(), "enumerated inputs");
    Ok(files)
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}

/// A watched input: the path as given on the command line and its canonical form
#[derive(Debug, Clone)]
struct WatchedInput {
    given: PathBuf,
    canonical: PathBuf,
    is_dir: bool,
}

impl WatchedInput {
    /// Map a changed canonical path back to the identifier used for it
    fn identify(&self, changed: &Path, recursive: bool) -> Option<FileId> {
        if !self.is_dir {
            return (changed == self.canonical).then(|| FileId::Path(self.given.clone()));
        }
        let relative = changed.strip_prefix(&self.canonical).ok()?;
        if !recursive && relative.components().count() != 1 {
            return None;
        }
        Some(FileId::Path(self.given.join(relative)))
    }
}

/// Emits manifests that change under the watched inputs
struct ManifestWatcher {
    notifier: std::sync::Arc<FsNotifier>,
    task: JoinHandle<()>,
}

impl ManifestWatcher {
    fn start(
        options: &FilenameOptions,
        window: Duration,
        sender: mpsc::UnboundedSender<Result<FileId>>,
    ) -> Result<Self> {
        let mut inputs = Vec::new();
        for given in &options.filenames {
            let canonical = given
                .canonicalize()
                .map_err(|e| Error::file_system(given, "resolve watched input", e))?;
            inputs.push(WatchedInput {
                given: given.clone(),
                is_dir: canonical.is_dir(),
                canonical,
            });
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let notifier = std::sync::Arc::new(FsNotifier::new(event_tx)?);
        let roots: HashSet<PathBuf> = inputs
            .iter()
            .map(|input| {
                if input.is_dir {
                    input.canonical.clone()
                } else {
                    input.canonical.parent().map_or_else(|| input.canonical.clone(), Path::to_path_buf)
                }
            })
            .collect();
        for root in &roots {
            notifier.watch(root)?;
        }

        let recursive = options.recursive;
        let task = tokio::spawn(async move {
            while let Some(batch) = debounce::next_batch(&mut event_rx, window).await {
                let paths = match batch {
                    Ok(paths) => paths,
                    Err(error) => {
                        let _ = sender.send(Err(error));
                        return;
                    }
                };

                let mut changed = BTreeSet::new();
                for path in paths {
                    if !is_manifest(&path) || !path.is_file() {
                        continue;
                    }
                    let canonical = path.canonicalize().unwrap_or(path);
                    changed.extend(inputs.iter().filter_map(|i| i.identify(&canonical, recursive)));
                }

                for file in changed {
                    info!(file = %file, "manifest changed");
                    if sender.send(Ok(file)).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Self { notifier, task })
    }
}

impl Drop for ManifestWatcher {
    fn drop(&mut self) {
        self.notifier.shutdown();
        self.task.abort();
    }
}
