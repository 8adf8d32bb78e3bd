//! Core orchestration logic.
//!
//! - Orchestrator: drives one pass of the archive pipeline
//! - RunLock: keeps concurrent runs out

pub mod lock;
pub mod orchestrator;

pub use lock::RunLock;
pub use orchestrator::{Orchestrator, RunOptions, Services};
