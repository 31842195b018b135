//! The rendering pipeline: cache lookup, evaluation, delivery, all under
//! one optional deadline.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use miette::{Result, miette};
use templar_cache::{CacheStore, Lookup, generate_key};
use templar_caps::Builder as CapsBuilder;
use templar_core::{EvalJob, EvalRequest, TemplateEngine};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::engine::ProcessEngine;
use crate::output::OutputRouter;

const USER_AGENT: &str = concat!("templar/", env!("CARGO_PKG_VERSION"));

/// Construction-time knobs for [`Templar`]. Everything has a sensible
/// default; tests swap the engine and the cache directory.
#[derive(Default)]
pub struct TemplarOptions {
    pub engine: Option<Arc<dyn TemplateEngine>>,
    pub cache_dir: Option<PathBuf>,
    pub user_agent: Option<String>,
}

#[derive(Clone)]
pub struct Templar {
    engine: Arc<dyn TemplateEngine>,
    output: OutputRouter,
    cache_dir: PathBuf,
    user_agent: String,
    cancel: CancellationToken,
}

impl Templar {
    pub fn new(options: TemplarOptions) -> Self {
        let user_agent = options.user_agent.unwrap_or_else(|| USER_AGENT.to_string());
        Self {
            engine: options
                .engine
                .unwrap_or_else(|| Arc::new(ProcessEngine::new())),
            output: OutputRouter::new(user_agent.clone()),
            cache_dir: options
                .cache_dir
                .unwrap_or_else(templar_cache::default_cache_dir),
            user_agent,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the current run; the binary wires it to Ctrl-C.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Renders one request and delivers the document, within the request's
    /// deadline when it has one.
    ///
    /// The deadline covers the whole pipeline. When it fires, the pipeline
    /// task is told to stop and the run reports failure immediately rather
    /// than waiting for a slow evaluation or destination to notice.
    pub async fn run<W: Write + Send + 'static>(&self, request: EvalRequest, out: W) -> Result<()> {
        let limit = request.timeout.filter(|limit| !limit.is_zero());
        let cancel = self.cancel.child_token();

        let (tx, rx) = oneshot::channel();
        let this = self.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let result = this.execute(request, task_cancel, out).await;
            // The receiver is gone when the deadline has already fired.
            let _ = tx.send(result);
        });

        match limit {
            Some(limit) => {
                tokio::select! {
                    result = rx => {
                        result.map_err(|_| miette!("rendering task stopped unexpectedly"))?
                    }
                    _ = tokio::time::sleep(limit) => {
                        cancel.cancel();
                        Err(miette!(
                            "evaluation timed out after {}",
                            humantime::format_duration(limit)
                        ))
                    }
                }
            }
            None => rx
                .await
                .map_err(|_| miette!("rendering task stopped unexpectedly"))?,
        }
    }

    async fn execute<W: Write + Send>(
        self,
        request: EvalRequest,
        cancel: CancellationToken,
        mut out: W,
    ) -> Result<()> {
        let store = request
            .caching_enabled()
            .then(|| CacheStore::new(self.cache_dir.clone(), request.ttl(), request.stale()));

        // Sweep expired entries in the background while this run proceeds.
        if let Some(store) = &store {
            let store = store.clone();
            tokio::task::spawn_blocking(move || match store.clean() {
                Ok(0) => {}
                Ok(count) => debug!(count, "Removed expired cache entries"),
                Err(e) => warn!(error = %e, "Cache cleanup failed"),
            });
        }

        let source = request
            .source
            .read_to_string()
            .map_err(|e| miette!("failed to read {}: {e}", request.source))?;

        let mut cache_key = None;
        let mut stale_fallback = None;
        if let Some(store) = &store {
            match generate_key(&request, &source) {
                Ok(key) => {
                    match store.get_with_stale(&key) {
                        Lookup::Fresh(document) => {
                            return self.deliver(&document, &request, &cancel, &mut out).await;
                        }
                        Lookup::Stale(document) => stale_fallback = Some(document),
                        Lookup::Miss => {}
                    }
                    cache_key = Some(key);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to derive cache key, skipping cache for this run");
                }
            }
        }

        let capabilities = CapsBuilder::new()
            .cancellation(cancel.clone())
            .user_agent(self.user_agent.clone())
            .build();

        debug!(engine = self.engine.name(), source = %request.source, "Evaluating template");
        let job = EvalJob {
            origin: &request.source,
            source: &source,
            ext_str: &request.ext_str,
            ext_code: &request.ext_code,
            capabilities: &capabilities,
            cancel: cancel.clone(),
        };
        let document = match self.engine.evaluate(job).await {
            Ok(document) => document,
            Err(e) => {
                if let Some(document) = stale_fallback {
                    warn!(source = %request.source, error = %e, "Evaluation failed, serving stale cache");
                    return self.deliver(&document, &request, &cancel, &mut out).await;
                }
                return Err(e);
            }
        };

        // Cache write failures are logged, not fatal.
        if let (Some(store), Some(key)) = (&store, &cache_key)
            && let Err(e) = store.put(key, &document)
        {
            warn!(cache_key = %key.short(), error = %e, "Failed to store result in cache");
        }

        self.deliver(&document, &request, &cancel, &mut out).await
    }

    async fn deliver<W: Write + Send>(
        &self,
        document: &str,
        request: &EvalRequest,
        cancel: &CancellationToken,
        out: &mut W,
    ) -> Result<()> {
        self.output
            .deliver(
                document,
                &request.destinations,
                request.also_stdout,
                request.write_if_changed,
                cancel,
                out,
            )
            .await
    }
}
