//! The on-disk store: one `<hex key>.json` file per entry, aged by file
//! modification time.

use std::fs;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use templar_core::atomic::write_atomic;

use crate::error::CacheResult;
use crate::key::CacheKey;

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Entry younger than the TTL; serve it without evaluating.
    Fresh(String),
    /// Entry past the TTL but inside the stale window; serve it only when
    /// live evaluation fails.
    Stale(String),
    Miss,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    ttl: Duration,
    stale_extension: Duration,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, stale_extension: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            stale_extension,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Age of a file, saturating to zero under clock skew.
    fn entry_age(path: &Path) -> std::io::Result<Duration> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO))
    }

    /// Looks up `key`, distinguishing fresh entries from stale-but-servable
    /// ones. Read failures degrade to a miss; this never returns an error.
    pub fn get_with_stale(&self, key: &CacheKey) -> Lookup {
        if self.ttl.is_zero() {
            return Lookup::Miss;
        }
        let path = self.entry_path(key);
        let age = match Self::entry_age(&path) {
            Ok(age) => age,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Lookup::Miss,
            Err(e) => {
                warn!(cache_key = %key.short(), error = %e, "Failed to inspect cache entry, treating as miss");
                return Lookup::Miss;
            }
        };

        if age > self.ttl + self.stale_extension {
            // Expired outright. Sweep it so later lookups stat nothing.
            if let Err(e) = fs::remove_file(&path) {
                warn!(cache_key = %key.short(), error = %e, "Failed to remove expired cache entry");
            }
            return Lookup::Miss;
        }

        let document = match fs::read_to_string(&path) {
            Ok(document) => document,
            Err(e) => {
                warn!(cache_key = %key.short(), error = %e, "Failed to read cache entry, treating as miss");
                return Lookup::Miss;
            }
        };

        if age <= self.ttl {
            debug!(cache_key = %key.short(), "Cache hit");
            Lookup::Fresh(document)
        } else {
            debug!(cache_key = %key.short(), "Stale cache entry within the serve window");
            Lookup::Stale(document)
        }
    }

    /// Stores a rendered document. A no-op when caching is disabled.
    ///
    /// The cache directory is created with owner-only traversal and entries
    /// are written atomically with owner-only permissions.
    pub fn put(&self, key: &CacheKey, document: &str) -> CacheResult<()> {
        if self.ttl.is_zero() {
            return Ok(());
        }
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.dir)?;
        write_atomic(&self.entry_path(key), document.as_bytes(), 0o600)?;
        Ok(())
    }

    /// Removes entries older than the longest horizon the store can serve,
    /// `max(ttl, stale_extension)`. Returns how many were removed.
    pub fn clean(&self) -> CacheResult<usize> {
        if self.ttl.is_zero() {
            return Ok(0);
        }
        let max_age = self.ttl.max(self.stale_extension);
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::entry_age(&path) {
                Ok(age) if age > max_age => {
                    if let Err(e) = fs::remove_file(&path) {
                        warn!(error = %e, "Failed to remove expired cache entry");
                    } else {
                        removed += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to inspect cache entry"),
            }
        }
        Ok(removed)
    }
}

/// Resolves the cache directory: the `TEMPLAR_CACHE_DIR` override, then the
/// XDG cache home, then a directory under the system temp dir.
pub fn default_cache_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("TEMPLAR_CACHE_DIR") {
        return PathBuf::from(dir);
    }
    match xdg::BaseDirectories::with_prefix("templar").get_cache_home() {
        Some(dir) => dir,
        None => std::env::temp_dir().join("templar-cache"),
    }
}
