//! Cooperative time-slicing for single-threaded tick loops.
//!
//! Long-running work is broken into resumable steps. Every tick, the
//! [`Scheduler`] gives each task repeated steps until its per-tick time
//! budget is spent, then moves on, so no tick is blocked by one task.

pub mod clock;
pub mod config;
pub mod error;
pub mod estimator;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock, TickClock};
pub use config::SchedulerConfig;
pub use error::{Result, SliceError, StepFault};
pub use estimator::TimeBudgetEstimator;
pub use scheduler::*;
