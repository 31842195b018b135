//! Cache-key derivation.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use templar_core::request::{EvalRequest, Source};

use crate::error::{CacheError, CacheResult};

/// BLAKE3 digest identifying one (request, source text) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Abbreviated form for log lines. Full keys stay out of logs.
    pub fn short(&self) -> String {
        format!("{}...", &self.0[..8])
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The request fields that determine what gets rendered. Destination and
/// writer knobs are excluded: where a document goes never changes its
/// content.
#[derive(Serialize)]
struct KeyMaterial<'a> {
    source: Cow<'a, str>,
    ext_str: &'a BTreeMap<String, String>,
    ext_code: &'a BTreeMap<String, String>,
}

/// Derives the cache key for a request and its source text.
///
/// Deterministic: the material serializes with canonically ordered maps and
/// file paths lexically resolved to absolute form, so equal requests agree
/// on the key no matter how they were built or from which directory.
pub fn generate_key(request: &EvalRequest, source_text: &str) -> CacheResult<CacheKey> {
    let source = match &request.source {
        Source::File(path) => {
            let absolute = std::path::absolute(path)
                .map_err(|e| CacheError::path_resolution(path, e))?;
            Cow::Owned(absolute.to_string_lossy().into_owned())
        }
        Source::Stdin => Cow::Borrowed("-"),
    };
    let material = KeyMaterial {
        source,
        ext_str: &request.ext_str,
        ext_code: &request.ext_code,
    };

    let mut hasher = blake3::Hasher::new();
    hasher.update(&serde_json::to_vec(&material)?);
    hasher.update(source_text.as_bytes());
    Ok(CacheKey(hasher.finalize().to_hex().to_string()))
}
