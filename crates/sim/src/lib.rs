//! Trading simulation engine: the round scheduler and its registry.

pub mod registry;
pub mod scheduler;

pub use registry::SimRegistry;
pub use scheduler::{RoundScheduler, SchedulerConfig, SimPhase, SimStatus};
