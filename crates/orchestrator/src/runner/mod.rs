//! Detection orchestrator -- classifies payloads, runs detectors and fuses
//! their results.
//!
//! Split into focused submodules:
//! - `core`: DetectionOrchestrator struct, constructors, training, feedback and accessors
//! - `selection`: method selection by recommendation, preset and priority, plus memory estimates
//! - `execution`: the per-request lifecycle and concurrent method execution

mod core;
mod execution;
mod selection;

pub use self::core::DetectionOrchestrator;
pub use self::selection::{estimate_memory, select_methods};
