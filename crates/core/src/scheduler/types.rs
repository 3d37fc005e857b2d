use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SliceError};

/// Scheduler-unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Lifecycle status of a [`Task`](super::task::Task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not managed by a scheduler: freshly built, or removed and finalized.
    Detached,
    /// Tracked by the scheduler, waiting for its next step.
    Queued,
    /// A step is running right now.
    Executing,
    /// The step reported completion.
    Finished,
    /// Cancellation requested; finalized to `Detached` on the next scan.
    PendingRemove,
}

impl TaskStatus {
    /// Whether the scheduler will keep stepping a task in this status.
    pub fn is_scheduled(self) -> bool {
        matches!(self, TaskStatus::Queued | TaskStatus::Executing)
    }
}

/// Lane of a [`PriorityQueue`](super::queue::PriorityQueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Priority {
    High = 0,
    #[default]
    Medium = 1,
    Low = 2,
}

impl Priority {
    /// Lanes in the order they are drained.
    pub const DRAIN_ORDER: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub(crate) fn lane(self) -> usize {
        self as usize
    }
}

/// State of a single item enqueued with a [`Handle`](super::queue::Handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleStatus {
    Queued,
    /// Cancelled before it ran; the item is skipped when dequeued.
    Detached,
    Finished,
}

/// Summary of one scheduler pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Slots visited (the slot count when the tick began).
    pub scanned: usize,
    /// Step calls made across all tasks.
    pub steps: usize,
    /// Tasks whose step reported completion.
    pub finished: usize,
    /// Tasks finalized after a cancellation.
    pub cancelled: usize,
    /// Step faults caught during the pass.
    pub faults: usize,
    /// Tombstoned slots counted during the pass, old and new.
    pub removed: usize,
    /// Whether the slot collection was compacted.
    pub compacted: bool,
}

/// Values accepted as a per-tick time budget.
///
/// `Duration` is always valid; `f64` seconds are checked for sign and
/// finiteness.
pub trait IntoBudget {
    fn into_budget(self) -> Result<Duration>;
}

impl IntoBudget for Duration {
    fn into_budget(self) -> Result<Duration> {
        Ok(self)
    }
}

impl IntoBudget for f64 {
    fn into_budget(self) -> Result<Duration> {
        if !self.is_finite() || self < 0.0 {
            return Err(SliceError::Config(format!(
                "time budget must be a finite value >= 0, got {self}"
            )));
        }
        Ok(Duration::from_secs_f64(self))
    }
}

impl IntoBudget for f32 {
    fn into_budget(self) -> Result<Duration> {
        f64::from(self).into_budget()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_order_is_high_to_low() {
        assert_eq!(
            Priority::DRAIN_ORDER,
            [Priority::High, Priority::Medium, Priority::Low]
        );
        assert!(Priority::High < Priority::Medium);
        assert_eq!(Priority::default(), Priority::Medium);
    }

    #[test]
    fn scheduled_statuses() {
        assert!(TaskStatus::Queued.is_scheduled());
        assert!(TaskStatus::Executing.is_scheduled());
        assert!(!TaskStatus::Detached.is_scheduled());
        assert!(!TaskStatus::Finished.is_scheduled());
        assert!(!TaskStatus::PendingRemove.is_scheduled());
    }

    #[test]
    fn budget_from_seconds() {
        assert_eq!(0.25_f64.into_budget().unwrap(), Duration::from_millis(250));
        assert_eq!(0.0_f64.into_budget().unwrap(), Duration::ZERO);
        assert!(matches!((-0.1_f64).into_budget(), Err(SliceError::Config(_))));
        assert!(matches!(f64::NAN.into_budget(), Err(SliceError::Config(_))));
        assert!(matches!(f64::INFINITY.into_budget(), Err(SliceError::Config(_))));
    }

    #[test]
    fn task_id_display() {
        assert_eq!(TaskId(3).to_string(), "Task(3)");
    }
}
