//! Scheduler runner -- owns the task slots and drives them tick by tick.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructors, add/remove, and accessor methods
//! - `execution`: the tick pass and the per-task step loop
//! - `maintenance`: slot compaction and duplicate-slot validation

mod core;
mod execution;
mod maintenance;

pub use self::core::Scheduler;
