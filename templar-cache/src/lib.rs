//! Disk cache of rendered documents.
//!
//! Rendered documents are stored one file per cache key, with freshness
//! decided by file age against the request's TTL and an optional stale
//! window used as a fallback when live evaluation fails.

pub mod error;
pub mod key;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use key::{CacheKey, generate_key};
pub use store::{CacheStore, Lookup, default_cache_dir};
