//! Ordered, concurrent resolution of a stream of manifest files
//!
//! Every file taken from the [`FileSource`] gets a result slot appended to
//! a queue and a worker task resolving it. The coordinator loop waits on
//! three things at once: the next file, the slot at the head of the queue,
//! and run-level failure. Outputs are written when their slot reaches the
//! head, so the sink sees files in submission order whatever order the
//! workers finish in.
//!
//! In one-shot mode the first per-file error cancels the run. In watch mode
//! a per-file error is logged and that file produces no output; only a
//! notifier or dependency-tracking failure ends the session.

use crate::enumerate::FileSource;
use crate::file::resolve_file;
use crate::selector::Selector;
use bytes::Bytes;
use kresolve_cache::{CachingBuilder, Recorder};
use kresolve_core::{Error, FileId, Publisher, Result, TargetKey, RECORD_SEPARATOR};
use kresolve_watch::{DependencyGraph, FileTargets, Notifier, NotifierEvent, SourceLocator};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Builds the notifier a watch session uses, given the channel it must
/// deliver events into
pub type NotifierFactory = Arc<
    dyn Fn(mpsc::UnboundedSender<NotifierEvent>) -> Result<Arc<dyn Notifier>> + Send + Sync,
>;

/// Watch-mode settings; their presence turns watch mode on
pub struct WatchSettings {
    pub locator: Arc<dyn SourceLocator>,
    pub debounce: Duration,
    /// Notifier to use instead of the platform filesystem watcher
    pub notifier: Option<NotifierFactory>,
}

impl WatchSettings {
    pub fn new(locator: Arc<dyn SourceLocator>, debounce: Duration) -> Self {
        Self {
            locator,
            debounce,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, factory: NotifierFactory) -> Self {
        self.notifier = Some(factory);
        self
    }
}

#[derive(Default)]
pub struct PipelineOptions {
    pub strict: bool,
    pub selector: Option<Selector>,
    pub watch: Option<WatchSettings>,
}

pub struct Pipeline {
    builder: Arc<CachingBuilder>,
    publisher: Arc<dyn Publisher>,
    options: PipelineOptions,
}

/// Output slot of one file; `None` means the file was skipped
type Slot = oneshot::Receiver<Option<Bytes>>;

/// First fatal error of a run, and the token that cancels the run
struct Failure {
    token: CancellationToken,
    first: Mutex<Option<Error>>,
}

impl Failure {
    fn fail(&self, error: Error) {
        {
            let mut first = self.first.lock();
            if first.is_none() {
                error!(error = %error, "resolution failed");
                *first = Some(error);
            } else {
                debug!(error = %error, "further failure after cancellation");
            }
        }
        self.token.cancel();
    }

    fn take(&self) -> Option<Error> {
        self.first.lock().take()
    }
}

struct WatchContext {
    graph: DependencyGraph,
    targets: Arc<FileTargets>,
}

/// State shared by the workers of one run
struct RunContext {
    builder: Arc<CachingBuilder>,
    publisher: Arc<dyn Publisher>,
    selector: Option<Selector>,
    strict: bool,
    watch: Option<WatchContext>,
    failure: Failure,
}

impl Pipeline {
    pub fn new(
        builder: Arc<CachingBuilder>,
        publisher: Arc<dyn Publisher>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            builder,
            publisher,
            options,
        }
    }

    pub fn is_watching(&self) -> bool {
        self.options.watch.is_some()
    }

    /// Resolve every file `source` yields and write the results to `out`.
    ///
    /// Returns once the source is exhausted and every output is written,
    /// when `shutdown` is cancelled (successfully, after in-flight work is
    /// abandoned), or with the first fatal error.
    pub async fn run<W>(
        &self,
        mut source: FileSource,
        out: &mut W,
        shutdown: CancellationToken,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let failure = Failure {
            token: shutdown.child_token(),
            first: Mutex::new(None),
        };

        let (watch, mut graph_errors) = match &self.options.watch {
            Some(settings) => {
                let (context, errors) = self.start_watch(&source, settings)?;
                (Some(context), Some(errors))
            }
            None => (None, None),
        };

        let context = Arc::new(RunContext {
            builder: Arc::clone(&self.builder),
            publisher: Arc::clone(&self.publisher),
            selector: self.options.selector.clone(),
            strict: self.options.strict,
            watch,
            failure,
        });

        let mut workers = JoinSet::new();
        let mut pending: VecDeque<(FileId, Slot)> = VecDeque::new();
        let mut enumerating = true;
        let mut submitted = 0usize;
        let mut written = 0usize;

        let outcome = loop {
            if !enumerating && pending.is_empty() {
                break Ok(());
            }

            tokio::select! {
                biased;

                _ = context.failure.token.cancelled() => {
                    break context.failure.take().map_or(Ok(()), Err);
                }

                error = next_graph_error(&mut graph_errors) => {
                    break Err(error);
                }

                next = source.next(), if enumerating => match next {
                    Some(Ok(file)) => {
                        let (sender, slot) = oneshot::channel();
                        pending.push_back((file.clone(), slot));
                        submitted += 1;
                        debug!(file = %file, position = submitted, "submitted file");
                        workers.spawn(resolve_one(Arc::clone(&context), file, sender));
                    }
                    Some(Err(error)) => break Err(error),
                    None => {
                        debug!(outstanding = pending.len(), "file source exhausted");
                        enumerating = false;
                    }
                },

                head = head_slot(&mut pending) => {
                    let Some((file, _)) = pending.pop_front() else {
                        continue;
                    };
                    match head {
                        Ok(Some(bytes)) => {
                            if let Err(error) = write_record(out, &bytes).await {
                                break Err(error);
                            }
                            written += 1;
                        }
                        Ok(None) => debug!(file = %file, "no output for skipped file"),
                        // The worker either recorded a failure, which the
                        // cancellation branch reports, or it panicked.
                        Err(_) if context.failure.token.is_cancelled() => {}
                        Err(_) => {
                            break Err(Error::internal(format!(
                                "resolution of '{file}' ended without a result"
                            )));
                        }
                    }
                }
            }
        };

        context.failure.token.cancel();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!(error = %e, "resolution task panicked");
                }
            }
        }

        info!(submitted, written, "resolution finished");
        outcome
    }

    fn start_watch(
        &self,
        source: &FileSource,
        settings: &WatchSettings,
    ) -> Result<(WatchContext, mpsc::UnboundedReceiver<Error>)> {
        let resubmitter = source
            .resubmitter()
            .ok_or_else(|| Error::configuration("watch mode needs an open file source"))?;
        let targets = Arc::new(FileTargets::new());

        let builder = Arc::clone(&self.builder);
        let recorded = Arc::clone(&targets);
        let on_change = move |changed: HashSet<TargetKey>| {
            recorded.retrigger(
                &changed,
                |key| {
                    builder.invalidate(key.as_str());
                },
                |file| {
                    resubmitter.resubmit(file);
                },
            );
        };
        let locator = Arc::clone(&settings.locator);
        let (graph, errors) = match &settings.notifier {
            Some(factory) => {
                let (event_tx, event_rx) = mpsc::unbounded_channel();
                let notifier = factory(event_tx)?;
                DependencyGraph::with_notifier(notifier, event_rx, locator, settings.debounce, on_change)
            }
            None => DependencyGraph::new(locator, settings.debounce, on_change)?,
        };

        info!(debounce_ms = settings.debounce.as_millis() as u64, "watching for changes");
        Ok((WatchContext { graph, targets }, errors))
    }
}

/// Resolve one file and deliver its output to `slot`.
///
/// Fatal errors go to the run's [`Failure`] and leave the slot unfilled.
async fn resolve_one(context: Arc<RunContext>, file: FileId, slot: oneshot::Sender<Option<Bytes>>) {
    let recorder = Recorder::new(Arc::clone(&context.builder));

    let resolved = tokio::select! {
        biased;
        _ = context.failure.token.cancelled() => return,
        resolved = resolve_file(
            &file,
            &recorder,
            context.publisher.as_ref(),
            context.selector.as_ref(),
            context.strict,
        ) => resolved,
    };

    let Some(watch) = &context.watch else {
        match resolved {
            Ok(bytes) => {
                let _ = slot.send(Some(bytes));
            }
            Err(error) => context.failure.fail(error),
        }
        return;
    };

    // Targets a failed resolution tried to build are tracked as well, so
    // fixing their sources resubmits the file.
    if let Err(error) = track(watch, &file, recorder.into_import_paths()) {
        context.failure.fail(error);
        return;
    }
    match resolved {
        Ok(bytes) => {
            let _ = slot.send(Some(bytes));
        }
        Err(error) => {
            warn!(file = %file, error = %error, "skipping file");
            let _ = slot.send(None);
        }
    }
}

/// Watch the sources of `keys` and make them the targets of `file`
fn track(watch: &WatchContext, file: &FileId, keys: Vec<TargetKey>) -> Result<()> {
    for key in &keys {
        watch.graph.add(key)?;
    }
    watch.targets.record(file.clone(), keys);
    Ok(())
}

/// Wait for the head of the queue, or forever if it is empty
async fn head_slot(
    pending: &mut VecDeque<(FileId, Slot)>,
) -> std::result::Result<Option<Bytes>, oneshot::error::RecvError> {
    match pending.front_mut() {
        Some((_, slot)) => slot.await,
        None => std::future::pending().await,
    }
}

/// Wait for a notifier failure, or forever outside watch mode
async fn next_graph_error(errors: &mut Option<mpsc::UnboundedReceiver<Error>>) -> Error {
    if let Some(receiver) = errors {
        if let Some(error) = receiver.recv().await {
            return error;
        }
    }
    std::future::pending().await
}

async fn write_record<W>(out: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let write = async {
        out.write_all(bytes).await?;
        // The separator goes last so a streaming consumer knows the
        // preceding documents are complete.
        out.write_all(RECORD_SEPARATOR.as_bytes()).await?;
        out.flush().await
    };
    write
        .await
        .map_err(|e| Error::file_system("<output>", "write resolved manifests", e))
}
