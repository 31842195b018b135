//! The seam between the pipeline and a template evaluator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::caps::CapabilityRegistry;
use crate::request::Source;

/// One evaluation handed to an engine.
///
/// `source` is the already-read template text; `origin` says where it came
/// from, for error reporting and for engines that re-open the file to
/// resolve relative imports.
pub struct EvalJob<'a> {
    pub origin: &'a Source,
    pub source: &'a str,
    pub ext_str: &'a BTreeMap<String, String>,
    pub ext_code: &'a BTreeMap<String, String>,
    pub capabilities: &'a CapabilityRegistry,
    /// Cooperative stop signal. Long-running engines check it and give up
    /// instead of being killed.
    pub cancel: CancellationToken,
}

/// A template evaluator.
///
/// Implementations must be `Send + Sync`: the pipeline evaluates on a
/// spawned task.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    /// Short engine name for log lines.
    fn name(&self) -> &'static str;

    /// Renders the job into the output document.
    async fn evaluate(&self, job: EvalJob<'_>) -> miette::Result<String>;
}
