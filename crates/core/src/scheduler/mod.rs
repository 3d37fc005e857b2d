pub mod metrics;
pub mod queue;
pub mod runner;
pub mod step;
pub mod task;
pub mod types;

pub use metrics::SchedulerMetrics;
pub use queue::{Handle, PriorityQueue};
pub use runner::Scheduler;
pub use step::{ActionReturn, ActionSequence, ResumableStep, StepResult, StepReturn};
pub use task::Task;
pub use types::{HandleStatus, IntoBudget, Priority, TaskId, TaskStatus, TickReport};
