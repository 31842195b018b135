//! The request model: everything one rendering run needs.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

/// Where the template text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A template file on disk.
    File(PathBuf),
    /// The standard input stream, spelled `-` on the command line.
    Stdin,
}

impl Source {
    /// Reads the template text. Templates are UTF-8; anything else is an
    /// input error.
    pub fn read_to_string(&self) -> io::Result<String> {
        match self {
            Source::File(path) => std::fs::read_to_string(path),
            Source::Stdin => {
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer)?;
                Ok(buffer)
            }
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Stdin => f.write_str("-"),
        }
    }
}

/// One rendering run, fully described.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub source: Source,
    /// External string variables handed to the engine.
    pub ext_str: BTreeMap<String, String>,
    /// External code bindings handed to the engine.
    pub ext_code: BTreeMap<String, String>,
    /// Wall-clock bound over the whole pipeline. `None` or zero means
    /// unbounded.
    pub timeout: Option<Duration>,
    /// Freshness TTL for cached results. `None` or zero disables caching.
    pub cache_ttl: Option<Duration>,
    /// Extra window past the TTL during which a cached result may still be
    /// served when evaluation fails.
    pub stale_extension: Option<Duration>,
    /// File paths or http(s) URLs the document is delivered to.
    pub destinations: Vec<String>,
    /// Write to the default stream even when destinations are configured.
    pub also_stdout: bool,
    /// Skip file destinations whose content would not change.
    pub write_if_changed: bool,
}

impl EvalRequest {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            ext_str: BTreeMap::new(),
            ext_code: BTreeMap::new(),
            timeout: None,
            cache_ttl: None,
            stale_extension: None,
            destinations: Vec::new(),
            also_stdout: false,
            write_if_changed: false,
        }
    }

    /// Effective TTL, with `None` normalized to zero.
    pub fn ttl(&self) -> Duration {
        self.cache_ttl.unwrap_or(Duration::ZERO)
    }

    /// Effective stale extension, with `None` normalized to zero.
    pub fn stale(&self) -> Duration {
        self.stale_extension.unwrap_or(Duration::ZERO)
    }

    pub fn caching_enabled(&self) -> bool {
        !self.ttl().is_zero()
    }
}
