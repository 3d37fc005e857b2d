use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info};

use crate::clock::{Clock, SystemClock, TickClock};
use crate::config::SchedulerConfig;
use crate::error::{Result, SliceError};
use crate::scheduler::metrics::SchedulerMetrics;
use crate::scheduler::task::Task;
use crate::scheduler::types::{TaskId, TaskStatus};

/// The time-slicing scheduler.
///
/// Once per tick the host calls [`Scheduler::tick`], which gives every live
/// task a turn of repeated steps until the task's budget is spent. A
/// `Scheduler` is a cheap clonable handle to shared single-threaded state, so
/// steps may capture a clone and add or cancel tasks while a tick runs.
#[derive(Clone)]
pub struct Scheduler {
    pub(super) inner: Rc<SchedulerInner>,
}

pub(super) struct SchedulerInner {
    pub(super) config: SchedulerConfig,
    pub(super) clock: Rc<TickClock>,
    /// Task slots in insertion order. `None` is a tombstone awaiting compaction.
    pub(super) slots: RefCell<Vec<Option<Task>>>,
    pub(super) metrics: RefCell<SchedulerMetrics>,
    pub(super) next_id: Cell<u64>,
    pub(super) ticking: Cell<bool>,
}

impl Scheduler {
    /// Create a scheduler driven by the system clock.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_clock(config, Rc::new(SystemClock))
    }

    /// Create a scheduler that reads time from `clock`.
    pub fn with_clock(config: SchedulerConfig, clock: Rc<dyn Clock>) -> Self {
        info!(
            target_tick_rate = config.target_tick_rate,
            validate = config.validate,
            "scheduler created"
        );
        Self {
            inner: Rc::new(SchedulerInner {
                config,
                clock: Rc::new(TickClock::new(clock)),
                slots: RefCell::new(Vec::new()),
                metrics: RefCell::new(SchedulerMetrics::default()),
                next_id: Cell::new(1),
                ticking: Cell::new(false),
            }),
        }
    }

    /// Start tracking `task`.
    ///
    /// A detached task gets a new slot. A task with a pending removal keeps
    /// its slot and the removal is rescinded. Any other status is an illegal
    /// transition.
    pub fn add(&self, task: &Task) -> Result<()> {
        match task.status() {
            TaskStatus::PendingRemove => {
                task.set_status(TaskStatus::Queued);
                debug!(task = %task.id(), "pending removal rescinded");
                Ok(())
            }
            TaskStatus::Detached => {
                if self.inner.config.validate && self.is_tracking(task) {
                    return Err(SliceError::DuplicateTask(task.id()));
                }
                self.inner.slots.borrow_mut().push(Some(task.clone()));
                task.set_status(TaskStatus::Queued);
                Ok(())
            }
            from => Err(SliceError::InvalidTransition {
                task: task.id(),
                action: "add",
                from,
            }),
        }
    }

    /// Request removal of `task`. See [`Task::cancel`].
    pub fn remove(&self, task: &Task) -> bool {
        task.cancel()
    }

    /// Number of slots, tombstones included.
    pub fn slot_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Number of slots holding a task.
    pub fn live_count(&self) -> usize {
        self.inner.slots.borrow().iter().flatten().count()
    }

    /// Whether `task` occupies a live slot of this scheduler.
    pub fn is_tracking(&self, task: &Task) -> bool {
        self.inner
            .slots
            .borrow()
            .iter()
            .flatten()
            .any(|tracked| tracked.ptr_eq(task))
    }

    /// Snapshot of the cumulative metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.inner.metrics.borrow().clone()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// The clock marking tick starts; shareable with a
    /// [`TimeBudgetEstimator`](crate::estimator::TimeBudgetEstimator).
    pub fn tick_clock(&self) -> Rc<TickClock> {
        Rc::clone(&self.inner.clock)
    }

    pub fn is_ticking(&self) -> bool {
        self.inner.ticking.get()
    }

    pub(crate) fn next_task_id(&self) -> TaskId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        TaskId(id)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("slots", &self.slot_count())
            .field("live", &self.live_count())
            .field("ticking", &self.is_ticking())
            .finish_non_exhaustive()
    }
}
