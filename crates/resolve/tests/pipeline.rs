//! End-to-end tests of the ordered resolution pipeline

use kresolve_cache::{CachingBuilder, CachingPublisher};
use kresolve_core::testing::{FakeBuilder, FakePublisher};
use kresolve_core::{Error, FileId, Result, Stage, TargetKey, RECORD_SEPARATOR};
use kresolve_resolve::{FileSource, NotifierFactory, Pipeline, PipelineOptions, WatchSettings};
use kresolve_watch::{DirectoryLocator, Notifier, NotifierEvent, SourceLocator};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn pipeline(
    builder: &Arc<FakeBuilder>,
    publisher: &Arc<FakePublisher>,
    options: PipelineOptions,
) -> Pipeline {
    Pipeline::new(
        Arc::new(CachingBuilder::new(Arc::clone(builder))),
        Arc::new(CachingPublisher::new(Arc::clone(publisher))),
        options,
    )
}

fn write_manifest(dir: &Path, name: &str, contents: &str) -> FileId {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    FileId::from(path)
}

fn image_manifest(target: &str) -> String {
    format!("metadata:\n  name: {target}\nspec:\n  image: ko://./cmd/{target}\n")
}

fn blocks(output: &[u8]) -> Vec<String> {
    std::str::from_utf8(output)
        .unwrap()
        .split(RECORD_SEPARATOR)
        .filter(|block| !block.is_empty())
        .map(str::to_string)
        .collect()
}

fn name_of(block: &str) -> &str {
    block
        .lines()
        .find_map(|line| line.trim().strip_prefix("name: "))
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_output_follows_submission_order_not_completion_order() {
    let dir = TempDir::new().unwrap();
    let targets = ["t1", "t2", "t3", "t4", "t5"];

    // File 1 is the slowest, file 5 the fastest.
    let mut builder = FakeBuilder::new();
    for (i, target) in targets.iter().enumerate() {
        let delay = Duration::from_millis(100 * (targets.len() - i) as u64);
        builder = builder.with_delay(&format!("./cmd/{target}"), delay);
    }
    let builder = Arc::new(builder);
    let publisher = Arc::new(FakePublisher::new());

    let files = targets
        .iter()
        .map(|t| write_manifest(dir.path(), &format!("{t}.yaml"), &image_manifest(t)))
        .collect();

    let mut out = Vec::new();
    pipeline(&builder, &publisher, PipelineOptions::default())
        .run(FileSource::once(files), &mut out, CancellationToken::new())
        .await
        .unwrap();

    let blocks = blocks(&out);
    let names: Vec<&str> = blocks.iter().map(|b| name_of(b)).collect();
    assert_eq!(names, targets);
    for block in &blocks {
        assert!(block.contains("image: registry.example/cmd-t"));
        assert!(!block.contains("ko://"));
    }
}

fn run_with_delays(delays: &[u64]) -> Vec<String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async {
        let dir = TempDir::new().unwrap();
        let mut builder = FakeBuilder::new();
        let mut files = Vec::new();
        for (i, delay) in delays.iter().enumerate() {
            let target = format!("p{i}");
            builder = builder.with_delay(&format!("./cmd/{target}"), Duration::from_millis(*delay));
            files.push(write_manifest(dir.path(), &format!("{target}.yaml"), &image_manifest(&target)));
        }
        let builder = Arc::new(builder);
        let publisher = Arc::new(FakePublisher::new());

        let mut out = Vec::new();
        pipeline(&builder, &publisher, PipelineOptions::default())
            .run(FileSource::once(files), &mut out, CancellationToken::new())
            .await
            .unwrap();

        blocks(&out).iter().map(|b| name_of(b).to_string()).collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_order_is_independent_of_latency(delays in prop::collection::vec(0u64..200, 1..8)) {
        let names = run_with_delays(&delays);
        let expected: Vec<String> = (0..delays.len()).map(|i| format!("p{i}")).collect();
        prop_assert_eq!(names, expected);
    }
}

#[tokio::test]
async fn test_reference_free_documents_round_trip_without_builds() {
    let dir = TempDir::new().unwrap();
    let input = "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  level: debug
---
apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  selector:
    app: web
";
    let file = write_manifest(dir.path(), "plain.yaml", input);
    let builder = Arc::new(FakeBuilder::new());
    let publisher = Arc::new(FakePublisher::new());

    let mut out = Vec::new();
    pipeline(&builder, &publisher, PipelineOptions::default())
        .run(FileSource::once(vec![file]), &mut out, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), format!("{input}{RECORD_SEPARATOR}"));
    assert_eq!(builder.total_calls(), 0);
    assert_eq!(publisher.total_calls(), 0);
}

#[tokio::test]
async fn test_comments_and_list_layout_survive_without_references() {
    let dir = TempDir::new().unwrap();
    let input = "\
# app deployment
kind: Deployment
spec:
  containers:
    - name: web # main
      image: nginx
";
    let file = write_manifest(dir.path(), "deployment.yaml", input);
    let builder = Arc::new(FakeBuilder::new());
    let publisher = Arc::new(FakePublisher::new());

    let mut out = Vec::new();
    pipeline(&builder, &publisher, PipelineOptions::default())
        .run(FileSource::once(vec![file]), &mut out, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), format!("{input}{RECORD_SEPARATOR}"));
    assert_eq!(builder.total_calls(), 0);
}

#[tokio::test]
async fn test_shared_target_is_built_and_published_once() {
    let dir = TempDir::new().unwrap();
    let builder = Arc::new(FakeBuilder::new().with_delay("./cmd/shared", Duration::from_millis(20)));
    let publisher = Arc::new(FakePublisher::new());

    let files = (0..4)
        .map(|i| {
            write_manifest(
                dir.path(),
                &format!("f{i}.yaml"),
                &format!("metadata:\n  name: f{i}\nspec:\n  image: ko://./cmd/shared\n"),
            )
        })
        .collect();

    let mut out = Vec::new();
    pipeline(&builder, &publisher, PipelineOptions::default())
        .run(FileSource::once(files), &mut out, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(builder.calls("./cmd/shared"), 1);
    assert_eq!(publisher.calls("./cmd/shared"), 1);

    let images: Vec<String> = blocks(&out)
        .iter()
        .map(|b| b.lines().find(|l| l.contains("image:")).unwrap().to_string())
        .collect();
    assert_eq!(images.len(), 4);
    assert!(images.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_one_shot_failure_aborts_run() {
    let dir = TempDir::new().unwrap();
    let builder = Arc::new(FakeBuilder::new().with_delay("./cmd/late", Duration::from_millis(200)));
    let publisher = Arc::new(FakePublisher::new());

    let files = vec![
        write_manifest(dir.path(), "first.yaml", "metadata:\n  name: first\n"),
        write_manifest(dir.path(), "broken.yaml", "metadata: [unclosed\n"),
        write_manifest(dir.path(), "late.yaml", &image_manifest("late")),
    ];

    let mut out = Vec::new();
    let err = pipeline(&builder, &publisher, PipelineOptions::default())
        .run(FileSource::once(files), &mut out, CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        Error::File { file, stage, .. } => {
            assert!(file.ends_with("broken.yaml"));
            assert_eq!(*stage, Stage::Parse);
        }
        other => panic!("unexpected error: {other}"),
    }
    let output = String::from_utf8(out).unwrap();
    assert!(!output.contains("late"));
}

#[tokio::test]
async fn test_cached_build_failure_is_reported_once_built_once() {
    let dir = TempDir::new().unwrap();
    let builder = Arc::new(FakeBuilder::new().with_failure("./cmd/bad", "undefined: main"));
    let publisher = Arc::new(FakePublisher::new());

    let files = (0..3)
        .map(|i| write_manifest(dir.path(), &format!("b{i}.yaml"), &image_manifest("bad")))
        .collect();

    let mut out = Vec::new();
    let err = pipeline(&builder, &publisher, PipelineOptions::default())
        .run(FileSource::once(files), &mut out, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("undefined: main"));
    assert_eq!(builder.calls("./cmd/bad"), 1);
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_shutdown_ends_open_source_cleanly() {
    let builder = Arc::new(FakeBuilder::new());
    let publisher = Arc::new(FakePublisher::new());
    let shutdown = CancellationToken::new();

    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let mut out = Vec::new();
    pipeline(&builder, &publisher, PipelineOptions::default())
        .run(FileSource::open(Vec::new()), &mut out, shutdown)
        .await
        .unwrap();
    assert!(out.is_empty());
}

/// Source tree with one directory per target, and manifests referencing them
struct WatchFixture {
    dir: TempDir,
}

impl WatchFixture {
    fn new(targets: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        for target in targets {
            let src = dir.path().join("cmd").join(target);
            fs::create_dir_all(&src).unwrap();
            fs::write(src.join("main.go"), "package main\n").unwrap();
        }
        fs::create_dir_all(dir.path().join("deploy")).unwrap();
        Self { dir }
    }

    fn manifest(&self, name: &str, contents: &str) -> FileId {
        write_manifest(&self.dir.path().join("deploy"), name, contents)
    }

    fn settings(&self) -> WatchSettings {
        WatchSettings::new(
            Arc::new(DirectoryLocator::new(self.dir.path())),
            Duration::from_millis(50),
        )
    }

    fn options(&self) -> PipelineOptions {
        watching(self.settings())
    }
}

fn watching(settings: WatchSettings) -> PipelineOptions {
    PipelineOptions {
        watch: Some(settings),
        ..PipelineOptions::default()
    }
}

/// Notifier that accepts every path and never reports on its own
struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn watch(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn shutdown(&self) {}
}

/// A factory for [`SilentNotifier`] that hands its event channel to the test
fn silent_notifier() -> (NotifierFactory, Arc<Mutex<Option<mpsc::UnboundedSender<NotifierEvent>>>>) {
    let events = Arc::new(Mutex::new(None));
    let stash = Arc::clone(&events);
    let factory: NotifierFactory = Arc::new(move |sender| {
        *stash.lock() = Some(sender);
        Ok(Arc::new(SilentNotifier) as Arc<dyn Notifier>)
    });
    (factory, events)
}

/// Locator that refuses every target
struct RefusingLocator;

impl SourceLocator for RefusingLocator {
    fn sources(&self, key: &TargetKey) -> Result<Vec<PathBuf>> {
        Err(Error::dependency(key.as_str(), "outside the source tree"))
    }
}

/// Read from `reader` until `count` records have arrived
async fn read_records(reader: &mut tokio::io::DuplexStream, buffer: &mut Vec<u8>, count: usize) {
    let read = async {
        let mut chunk = [0u8; 4096];
        while blocks(buffer).len() < count || !buffer.ends_with(RECORD_SEPARATOR.as_bytes()) {
            let n = reader.read(&mut chunk).await.unwrap();
            assert!(n > 0, "output closed early");
            buffer.extend_from_slice(&chunk[..n]);
        }
    };
    tokio::time::timeout(Duration::from_secs(10), read)
        .await
        .expect("timed out waiting for output");
}

#[tokio::test]
async fn test_watch_mode_skips_invalid_file_and_keeps_running() {
    let fixture = WatchFixture::new(&["a", "b"]);
    let files = vec![
        fixture.manifest("a.yaml", &image_manifest("a")),
        fixture.manifest("broken.yaml", "metadata: [unclosed\n"),
        fixture.manifest("b.yaml", &image_manifest("b")),
    ];
    let builder = Arc::new(FakeBuilder::new());
    let publisher = Arc::new(FakePublisher::new());
    let pipeline = pipeline(&builder, &publisher, fixture.options());

    let (mut writer, mut reader) = tokio::io::duplex(1 << 16);
    let shutdown = CancellationToken::new();
    let run = {
        let shutdown = shutdown.clone();
        async move {
            pipeline
                .run(FileSource::open(files), &mut writer, shutdown)
                .await
        }
    };
    let run = tokio::spawn(run);

    let mut buffer = Vec::new();
    read_records(&mut reader, &mut buffer, 2).await;
    shutdown.cancel();
    run.await.unwrap().unwrap();

    let names: Vec<String> = blocks(&buffer).iter().map(|b| name_of(b).to_string()).collect();
    assert_eq!(names, ["a", "b"]);
}

#[tokio::test]
async fn test_watch_mode_rebuilds_only_changed_target() {
    let fixture = WatchFixture::new(&["a", "b"]);
    let files = vec![
        fixture.manifest("a.yaml", &image_manifest("a")),
        fixture.manifest("b.yaml", &image_manifest("b")),
    ];
    let builder = Arc::new(FakeBuilder::new());
    let publisher = Arc::new(FakePublisher::new());
    let pipeline = pipeline(&builder, &publisher, fixture.options());

    let (mut writer, mut reader) = tokio::io::duplex(1 << 16);
    let shutdown = CancellationToken::new();
    let run = {
        let shutdown = shutdown.clone();
        async move {
            pipeline
                .run(FileSource::open(files), &mut writer, shutdown)
                .await
        }
    };
    let run = tokio::spawn(run);

    let mut buffer = Vec::new();
    read_records(&mut reader, &mut buffer, 2).await;
    let first_a = blocks(&buffer)[0].clone();

    // Give the watcher a moment to register before touching sources.
    tokio::time::sleep(Duration::from_millis(200)).await;
    fs::write(
        fixture.dir.path().join("cmd/a/main.go"),
        "package main\n\nfunc main() {}\n",
    )
    .unwrap();

    read_records(&mut reader, &mut buffer, 3).await;
    shutdown.cancel();
    run.await.unwrap().unwrap();

    let blocks = blocks(&buffer);
    assert_eq!(name_of(&blocks[2]), "a");
    assert_ne!(blocks[2], first_a, "a should resolve to a rebuilt image");
    assert!(builder.calls("./cmd/a") >= 2);
    assert_eq!(builder.calls("./cmd/b"), 1);
}

#[tokio::test]
async fn test_watch_mode_recovers_once_failed_target_is_fixed() {
    let fixture = WatchFixture::new(&["a"]);
    let files = vec![fixture.manifest("a.yaml", &image_manifest("a"))];
    let builder = Arc::new(FakeBuilder::new().with_transient_failure("./cmd/a", "syntax error"));
    let publisher = Arc::new(FakePublisher::new());
    let pipeline = pipeline(&builder, &publisher, fixture.options());

    let (mut writer, mut reader) = tokio::io::duplex(1 << 16);
    let shutdown = CancellationToken::new();
    let run = {
        let shutdown = shutdown.clone();
        async move {
            pipeline
                .run(FileSource::open(files), &mut writer, shutdown)
                .await
        }
    };
    let run = tokio::spawn(run);

    // The first build fails and the file produces nothing.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(builder.calls("./cmd/a"), 1);
    fs::write(
        fixture.dir.path().join("cmd/a/main.go"),
        "package main\n\nfunc main() {}\n",
    )
    .unwrap();

    let mut buffer = Vec::new();
    read_records(&mut reader, &mut buffer, 1).await;
    shutdown.cancel();
    run.await.unwrap().unwrap();

    let blocks = blocks(&buffer);
    assert_eq!(blocks.len(), 1);
    assert_eq!(name_of(&blocks[0]), "a");
    assert!(blocks[0].contains("image: registry.example/cmd-a@sha256:"));
    assert_eq!(builder.calls("./cmd/a"), 2);
}

#[tokio::test]
async fn test_watch_session_ends_on_notifier_failure() {
    let fixture = WatchFixture::new(&["a"]);
    let files = vec![fixture.manifest("a.yaml", &image_manifest("a"))];
    let builder = Arc::new(FakeBuilder::new());
    let publisher = Arc::new(FakePublisher::new());
    let (factory, events) = silent_notifier();
    let pipeline = pipeline(
        &builder,
        &publisher,
        watching(fixture.settings().with_notifier(factory)),
    );

    let (mut writer, mut reader) = tokio::io::duplex(1 << 16);
    let run = tokio::spawn(async move {
        pipeline
            .run(FileSource::open(files), &mut writer, CancellationToken::new())
            .await
    });

    let mut buffer = Vec::new();
    read_records(&mut reader, &mut buffer, 1).await;
    events
        .lock()
        .as_ref()
        .expect("notifier was created")
        .send(NotifierEvent::Failed("inotify watch limit reached".into()))
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("session should end")
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, Error::Notifier { .. }));
    assert!(err.to_string().contains("inotify watch limit reached"));
}

#[tokio::test]
async fn test_watch_session_ends_when_target_cannot_be_tracked() {
    let fixture = WatchFixture::new(&["a", "b"]);
    let files = vec![
        fixture.manifest("a.yaml", &image_manifest("a")),
        fixture.manifest("b.yaml", &image_manifest("b")),
    ];
    let builder = Arc::new(FakeBuilder::new().with_delay("./cmd/b", Duration::from_millis(100)));
    let publisher = Arc::new(FakePublisher::new());
    let (factory, _events) = silent_notifier();
    let settings =
        WatchSettings::new(Arc::new(RefusingLocator), Duration::from_millis(50)).with_notifier(factory);
    let pipeline = pipeline(&builder, &publisher, watching(settings));

    let mut out = Vec::new();
    let err = tokio::time::timeout(
        Duration::from_secs(10),
        pipeline.run(FileSource::open(files), &mut out, CancellationToken::new()),
    )
    .await
    .expect("session should end")
    .unwrap_err();

    match &err {
        Error::Dependency { .. } => assert!(err.to_string().contains("outside the source tree")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(out.is_empty());
}
