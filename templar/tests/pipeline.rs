//! End-to-end tests of the rendering pipeline with a scripted engine.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use miette::miette;
use pretty_assertions::assert_eq;
use templar::{Templar, TemplarOptions};
use templar_core::{EvalJob, EvalRequest, Source, TemplateEngine};
use tempfile::TempDir;

/// Engine with pre-scripted outcomes, consumed one per evaluation.
struct ScriptedEngine {
    outcomes: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    fn new(outcomes: impl IntoIterator<Item = Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn ok(document: &str) -> Arc<Self> {
        Self::new([Ok(document.to_string())])
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemplateEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn evaluate(&self, _job: EvalJob<'_>) -> miette::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcomes.lock().unwrap().pop_front() {
            Some(Ok(document)) => Ok(document),
            Some(Err(message)) => Err(miette!(message)),
            None => Err(miette!("no scripted outcome left")),
        }
    }
}

/// Engine that only finishes when told to stop.
struct SlowEngine;

#[async_trait]
impl TemplateEngine for SlowEngine {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn evaluate(&self, job: EvalJob<'_>) -> miette::Result<String> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(10)) => Ok("{}\n".to_string()),
            _ = job.cancel.cancelled() => Err(miette!("evaluation was cancelled")),
        }
    }
}

/// `Write` target that outlives the pipeline task, so tests can read what
/// was streamed after `run` returns.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn templar_with(engine: Arc<dyn TemplateEngine>) -> (Templar, TempDir) {
    let dir = TempDir::new().unwrap();
    let templar = Templar::new(TemplarOptions {
        engine: Some(engine),
        cache_dir: Some(dir.path().join("cache")),
        user_agent: None,
    });
    (templar, dir)
}

fn template_file(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("template.jsonnet");
    std::fs::write(&path, contents).unwrap();
    path
}

fn file_request(path: &Path) -> EvalRequest {
    EvalRequest::new(Source::File(path.to_path_buf()))
}

/// Rewinds the cache entry for `request` so it looks `age` old.
fn age_cache_entry(cache_dir: &Path, request: &EvalRequest, age: Duration) {
    let source = request.source.read_to_string().unwrap();
    let key = templar_cache::generate_key(request, &source).unwrap();
    let path = cache_dir.join(format!("{key}.json"));
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

#[tokio::test]
async fn test_renders_to_the_default_stream() {
    let engine = ScriptedEngine::ok("{\"ok\":true}\n");
    let (templar, dir) = templar_with(engine.clone());
    let template = template_file(&dir, "{ ok: true }");

    let out = SharedBuf::default();
    templar
        .run(file_request(&template), out.clone())
        .await
        .unwrap();

    assert_eq!(out.contents(), "{\"ok\":true}\n");
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_fresh_cache_hit_skips_evaluation() {
    let engine = ScriptedEngine::new([
        Ok("{\"run\":1}\n".to_string()),
        Ok("{\"run\":2}\n".to_string()),
    ]);
    let (templar, dir) = templar_with(engine.clone());
    let template = template_file(&dir, "{ run: 1 }");

    let mut request = file_request(&template);
    request.cache_ttl = Some(Duration::from_secs(3600));

    let first = SharedBuf::default();
    templar.run(request.clone(), first.clone()).await.unwrap();
    let second = SharedBuf::default();
    templar.run(request, second.clone()).await.unwrap();

    assert_eq!(first.contents(), "{\"run\":1}\n");
    assert_eq!(second.contents(), "{\"run\":1}\n");
    assert_eq!(engine.calls(), 1, "second run must come from the cache");
}

#[tokio::test]
async fn test_distinct_variables_cache_separately() {
    let engine = ScriptedEngine::new([
        Ok("{\"x\":1}\n".to_string()),
        Ok("{\"x\":2}\n".to_string()),
    ]);
    let (templar, dir) = templar_with(engine.clone());
    let template = template_file(&dir, "{ x: std.extVar('x') }");

    let mut one = file_request(&template);
    one.cache_ttl = Some(Duration::from_secs(3600));
    one.ext_str.insert("x".to_string(), "1".to_string());
    let mut two = one.clone();
    two.ext_str.insert("x".to_string(), "2".to_string());

    let first = SharedBuf::default();
    templar.run(one.clone(), first.clone()).await.unwrap();
    let second = SharedBuf::default();
    templar.run(two, second.clone()).await.unwrap();
    // Back to the first binding: still cached.
    let third = SharedBuf::default();
    templar.run(one, third.clone()).await.unwrap();

    assert_eq!(first.contents(), "{\"x\":1}\n");
    assert_eq!(second.contents(), "{\"x\":2}\n");
    assert_eq!(third.contents(), "{\"x\":1}\n");
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_stale_entry_serves_when_evaluation_fails() {
    let engine = ScriptedEngine::new([
        Ok("{\"good\":true}\n".to_string()),
        Err("backend unreachable".to_string()),
    ]);
    let (templar, dir) = templar_with(engine.clone());
    let template = template_file(&dir, "{}");

    let mut request = file_request(&template);
    request.cache_ttl = Some(Duration::from_secs(60));
    request.stale_extension = Some(Duration::from_secs(600));

    templar
        .run(request.clone(), SharedBuf::default())
        .await
        .unwrap();
    age_cache_entry(
        &dir.path().join("cache"),
        &request,
        Duration::from_secs(120),
    );

    let out = SharedBuf::default();
    templar.run(request, out.clone()).await.unwrap();

    assert_eq!(out.contents(), "{\"good\":true}\n");
    assert_eq!(engine.calls(), 2, "stale entries are only served after a failed evaluation");
}

#[tokio::test]
async fn test_expired_entries_are_not_served() {
    let engine = ScriptedEngine::new([
        Ok("{\"run\":1}\n".to_string()),
        Ok("{\"run\":2}\n".to_string()),
    ]);
    let (templar, dir) = templar_with(engine.clone());
    let template = template_file(&dir, "{}");

    let mut request = file_request(&template);
    request.cache_ttl = Some(Duration::from_secs(60));
    request.stale_extension = Some(Duration::from_secs(60));

    templar
        .run(request.clone(), SharedBuf::default())
        .await
        .unwrap();
    // Past the TTL and the whole stale window.
    age_cache_entry(
        &dir.path().join("cache"),
        &request,
        Duration::from_secs(300),
    );

    let out = SharedBuf::default();
    templar.run(request, out.clone()).await.unwrap();

    assert_eq!(out.contents(), "{\"run\":2}\n");
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_evaluation_failure_without_cache_is_fatal() {
    let engine = ScriptedEngine::new([Err("unbound variable".to_string())]);
    let (templar, dir) = templar_with(engine);
    let template = template_file(&dir, "{}");

    let error = templar
        .run(file_request(&template), SharedBuf::default())
        .await
        .unwrap_err();
    assert!(error.to_string().contains("unbound variable"));
}

#[tokio::test]
async fn test_missing_template_is_reported() {
    let engine = ScriptedEngine::ok("{}\n");
    let (templar, _dir) = templar_with(engine);

    let request = file_request(Path::new("/nonexistent/template.jsonnet"));
    let error = templar
        .run(request, SharedBuf::default())
        .await
        .unwrap_err();
    assert!(
        error
            .to_string()
            .contains("failed to read /nonexistent/template.jsonnet")
    );
}

#[tokio::test]
async fn test_deadline_interrupts_slow_evaluation() {
    let (templar, dir) = templar_with(Arc::new(SlowEngine));
    let template = template_file(&dir, "{}");

    let mut request = file_request(&template);
    request.timeout = Some(Duration::from_millis(100));

    let started = Instant::now();
    let error = templar
        .run(request, SharedBuf::default())
        .await
        .unwrap_err();

    assert!(error.to_string().contains("timed out after 100ms"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_deadline_covers_slow_destinations() {
    // Accepts the connection but never responds.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let engine = ScriptedEngine::ok("{}\n");
    let (templar, dir) = templar_with(engine);
    let template = template_file(&dir, "{}");

    let mut request = file_request(&template);
    request.destinations = vec![url];
    request.timeout = Some(Duration::from_millis(200));

    let started = Instant::now();
    let error = templar
        .run(request, SharedBuf::default())
        .await
        .unwrap_err();

    assert!(error.to_string().contains("timed out after 200ms"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_unusable_cache_directory_degrades_gracefully() {
    let engine = ScriptedEngine::ok("{\"ok\":true}\n");
    let dir = TempDir::new().unwrap();
    // A file where the cache directory should be.
    let blocked = dir.path().join("cache");
    std::fs::write(&blocked, "in the way").unwrap();
    let templar = Templar::new(TemplarOptions {
        engine: Some(engine),
        cache_dir: Some(blocked),
        user_agent: None,
    });
    let template = template_file(&dir, "{}");

    let mut request = file_request(&template);
    request.cache_ttl = Some(Duration::from_secs(3600));

    let out = SharedBuf::default();
    templar.run(request, out.clone()).await.unwrap();
    assert_eq!(out.contents(), "{\"ok\":true}\n");
}

#[tokio::test]
async fn test_delivery_failure_is_fatal() {
    let engine = ScriptedEngine::ok("{}\n");
    let (templar, dir) = templar_with(engine);
    let template = template_file(&dir, "{}");

    let mut request = file_request(&template);
    let destination = dir.path().join("missing-dir").join("out.json");
    request.destinations = vec![destination.to_string_lossy().into_owned()];

    let error = templar
        .run(request, SharedBuf::default())
        .await
        .unwrap_err();
    assert!(error.to_string().contains("delivery failed"));
    assert!(error.to_string().contains("out.json"));
}

#[tokio::test]
async fn test_tee_streams_and_writes_the_file() {
    let engine = ScriptedEngine::ok("{\"ok\":true}\n");
    let (templar, dir) = templar_with(engine);
    let template = template_file(&dir, "{}");
    let destination = dir.path().join("out.json");

    let mut request = file_request(&template);
    request.destinations = vec![destination.to_string_lossy().into_owned()];
    request.also_stdout = true;

    let out = SharedBuf::default();
    templar.run(request, out.clone()).await.unwrap();

    assert_eq!(out.contents(), "{\"ok\":true}\n");
    assert_eq!(
        std::fs::read_to_string(&destination).unwrap(),
        "{\"ok\":true}\n"
    );
}
