//! Core types shared across the templar workspace: the request model, the
//! engine seam, capability-function plumbing and the atomic file writer.

pub mod atomic;
pub mod caps;
pub mod engine;
pub mod request;

pub use atomic::write_atomic;
pub use caps::{CapabilityFn, CapabilityRegistry, sync_cap};
pub use engine::{EvalJob, TemplateEngine};
pub use request::{EvalRequest, Source};
