//! Delivery of rendered documents.

use std::io::Write;
use std::path::Path;

use miette::{Result, bail, miette};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Routes a rendered document to its destinations: the default stream,
/// files, and http(s) URLs.
#[derive(Clone, Debug)]
pub struct OutputRouter {
    client: reqwest::Client,
    user_agent: String,
}

impl OutputRouter {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_agent: user_agent.into(),
        }
    }

    /// Delivers `document` everywhere the request asks for. Every
    /// destination is attempted even when an earlier one fails, and the
    /// failures are reported together at the end.
    pub async fn deliver<W: Write + Send>(
        &self,
        document: &str,
        destinations: &[String],
        also_stdout: bool,
        write_if_changed: bool,
        cancel: &CancellationToken,
        out: &mut W,
    ) -> Result<()> {
        let mut failures = Vec::new();

        if destinations.is_empty() || also_stdout {
            if let Err(e) = out.write_all(document.as_bytes()) {
                failures.push(format!("stdout: {e}"));
            }
        }

        for destination in destinations {
            let result = if is_url(destination) {
                self.send(destination, document, cancel).await
            } else {
                self.write_file(Path::new(destination), document, write_if_changed)
            };
            if let Err(e) = result {
                warn!(destination = %destination, error = %e, "Delivery failed");
                failures.push(format!("{destination}: {e}"));
            }
        }

        if !failures.is_empty() {
            bail!("delivery failed: {}", failures.join("; "));
        }
        Ok(())
    }

    fn write_file(&self, path: &Path, document: &str, write_if_changed: bool) -> Result<()> {
        if write_if_changed && content_unchanged(path, document.as_bytes()).unwrap_or(false) {
            debug!(path = %path.display(), "Document unchanged, skipping write");
            return Ok(());
        }
        templar_core::write_atomic(path, document.as_bytes(), 0o644)
            .map_err(|e| miette!("failed to write {}: {e}", path.display()))
    }

    async fn send(&self, url: &str, document: &str, cancel: &CancellationToken) -> Result<()> {
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, self.user_agent.as_str())
            .body(document.to_string());

        let response = tokio::select! {
            response = request.send() => {
                response.map_err(|e| miette!("request failed: {e}"))?
            }
            _ = cancel.cancelled() => {
                bail!("delivery to {url} was cancelled");
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".to_string());
            bail!(
                "{url} responded with HTTP {}: {}",
                status.as_u16(),
                body.trim()
            );
        }
        Ok(())
    }
}

fn is_url(destination: &str) -> bool {
    destination.starts_with("http://") || destination.starts_with("https://")
}

/// Compares the file on disk with the new content without holding both in
/// memory: sizes first, then content hashes.
fn content_unchanged(path: &Path, new: &[u8]) -> std::io::Result<bool> {
    let metadata = std::fs::metadata(path)?;
    if metadata.len() != new.len() as u64 {
        return Ok(false);
    }
    let mut hasher = blake3::Hasher::new();
    let mut file = std::fs::File::open(path)?;
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize() == blake3::hash(new))
}
