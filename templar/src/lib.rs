pub mod cli;
pub mod engine;
pub mod log;
pub mod output;
pub mod templar;

pub use engine::ProcessEngine;
pub use output::OutputRouter;
pub use templar::{Templar, TemplarOptions};
