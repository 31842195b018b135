//! Evaluation through an external interpreter process.

use std::process::Stdio;

use async_trait::async_trait;
use miette::{bail, miette};
use templar_core::{EvalJob, Source, TemplateEngine};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs `jsonnet` (or a flag-compatible interpreter) as a subprocess.
///
/// File templates are handed over by path so the interpreter can resolve
/// relative imports itself; stdin templates are piped in.
#[derive(Clone, Debug)]
pub struct ProcessEngine {
    program: String,
}

impl ProcessEngine {
    pub fn new() -> Self {
        Self::with_program("jsonnet")
    }

    /// Uses a different interpreter binary, e.g. a jrsonnet build.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateEngine for ProcessEngine {
    fn name(&self) -> &'static str {
        "jsonnet"
    }

    async fn evaluate(&self, job: EvalJob<'_>) -> miette::Result<String> {
        let program = which::which(&self.program)
            .map_err(|_| miette!("{} not found on PATH", self.program))?;

        if !job.capabilities.is_empty() {
            debug!("External interpreter cannot call capability functions in-process");
        }

        let mut command = Command::new(program);
        for (name, value) in job.ext_str {
            command.arg("--ext-str").arg(format!("{name}={value}"));
        }
        for (name, expr) in job.ext_code {
            command.arg("--ext-code").arg(format!("{name}={expr}"));
        }
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match job.origin {
            Source::File(path) => {
                command.arg(path).stdin(Stdio::null());
            }
            Source::Stdin => {
                command.arg("-").stdin(Stdio::piped());
            }
        }
        let mut child = command
            .spawn()
            .map_err(|e| miette!("failed to run {}: {e}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(job.source.as_bytes())
                .await
                .map_err(|e| miette!("failed to feed template to {}: {e}", self.program))?;
        }

        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| miette!("failed to run {}: {e}", self.program))?
            }
            _ = job.cancel.cancelled() => {
                bail!("evaluation was cancelled");
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("failed to evaluate {}: {}", job.origin, stderr.trim());
        }
        String::from_utf8(output.stdout)
            .map_err(|_| miette!("interpreter produced non-UTF-8 output"))
    }
}
