//! The standard capability-function set.
//!
//! Templates reach back into the host through these functions. The set is
//! assembled once per invocation with [`Builder`], which threads in the
//! cancellation token and client identification, and produces an immutable
//! [`CapabilityRegistry`](templar_core::caps::CapabilityRegistry) shared
//! with the engine.

mod args;
mod encode;
mod env;
mod exec;
mod file;
mod hash;
mod http;
mod net;
mod path;
mod pattern;
mod random;
mod time;

use std::collections::BTreeMap;
use std::time::Duration;

use templar_core::caps::{CapabilityFn, CapabilityRegistry};
use tokio_util::sync::CancellationToken;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Context shared by functions that run processes or talk to the network.
#[derive(Clone)]
pub(crate) struct CapContext {
    pub cancel: CancellationToken,
    pub user_agent: String,
    pub exec_timeout: Duration,
    pub http_timeout: Duration,
}

/// Assembles the standard registry.
#[derive(Clone)]
pub struct Builder {
    cancel: CancellationToken,
    user_agent: String,
    exec_timeout: Duration,
    http_timeout: Duration,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            user_agent: concat!("templar/", env!("CARGO_PKG_VERSION")).to_string(),
            exec_timeout: DEFAULT_TIMEOUT,
            http_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Token observed by the `exec` and `http` families.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// User-Agent sent by `http_get`/`http_request` unless the template
    /// supplies its own header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = timeout;
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn build(self) -> CapabilityRegistry {
        let ctx = CapContext {
            cancel: self.cancel,
            user_agent: self.user_agent,
            exec_timeout: self.exec_timeout,
            http_timeout: self.http_timeout,
        };
        let mut funcs: BTreeMap<&'static str, CapabilityFn> = BTreeMap::new();
        hash::register(&mut funcs);
        env::register(&mut funcs);
        encode::register(&mut funcs);
        file::register(&mut funcs);
        random::register(&mut funcs);
        time::register(&mut funcs);
        pattern::register(&mut funcs);
        path::register(&mut funcs);
        exec::register(&mut funcs, &ctx);
        http::register(&mut funcs, &ctx);
        net::register(&mut funcs);
        CapabilityRegistry::from_map(funcs)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
