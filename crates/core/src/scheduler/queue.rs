//! A three-lane priority work queue drained by a single scheduled task.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe, Location};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, error};

use crate::error::{Result, StepFault};

use super::runner::Scheduler;
use super::step::{Action, ActionReturn, ResumableStep, StepResult};
use super::task::Task;
use super::types::{HandleStatus, IntoBudget, Priority, TaskStatus};

/// Lanes are created on first use.
#[derive(Default)]
struct Lanes {
    lanes: [Option<VecDeque<Action>>; 3],
}

impl Lanes {
    fn push(&mut self, priority: Priority, action: Action) {
        self.lanes[priority.lane()]
            .get_or_insert_with(VecDeque::new)
            .push_back(action);
    }

    fn pop(&mut self, priority: Priority) -> Option<Action> {
        self.lanes[priority.lane()].as_mut()?.pop_front()
    }

    fn len(&self, priority: Priority) -> usize {
        self.lanes[priority.lane()].as_ref().map_or(0, VecDeque::len)
    }

    fn total(&self) -> usize {
        Priority::DRAIN_ORDER.iter().map(|&p| self.len(p)).sum()
    }

    fn clear(&mut self) {
        for lane in self.lanes.iter_mut().flatten() {
            lane.clear();
        }
    }
}

/// The step behind a queue's task: one item per step, highest lane first.
struct DrainStep {
    lanes: Rc<RefCell<Lanes>>,
    faults: Rc<Cell<u64>>,
}

impl DrainStep {
    fn run(&self, action: Action, priority: Priority) {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(outcome) => outcome,
            Err(payload) => Err(StepFault::from_panic(payload)),
        };
        if let Err(fault) = outcome {
            self.faults.set(self.faults.get() + 1);
            error!(?priority, error = %fault, "queued item failed");
        }
    }
}

impl ResumableStep for DrainStep {
    fn step(&mut self) -> StepResult {
        for priority in Priority::DRAIN_ORDER {
            let next = self.lanes.borrow_mut().pop(priority);
            let Some(action) = next else {
                continue;
            };
            self.run(action, priority);
            if self.lanes.borrow().len(priority) > 0 {
                return Ok(false);
            }
        }
        // Items enqueued into an already visited lane keep the task alive.
        let drained = self.lanes.borrow().total() == 0;
        Ok(drained)
    }
}

/// Cancellation handle for one enqueued item.
#[derive(Debug, Clone)]
pub struct Handle {
    status: Rc<Cell<HandleStatus>>,
}

impl Handle {
    fn new() -> Self {
        Self {
            status: Rc::new(Cell::new(HandleStatus::Queued)),
        }
    }

    pub fn status(&self) -> HandleStatus {
        self.status.get()
    }

    /// Prevent the item from running. Returns `false` once it has run or was
    /// already cancelled.
    pub fn cancel(&self) -> bool {
        if self.status.get() != HandleStatus::Queued {
            return false;
        }
        self.status.set(HandleStatus::Detached);
        true
    }
}

/// Prioritized work queue layered on a single scheduler task.
///
/// Items are zero-argument actions placed in one of three lanes. While work
/// is pending the queue's task runs items, highest lane first, inside its
/// own time budget. When the queue drains, the task finishes and is re-added
/// by the next enqueue.
pub struct PriorityQueue {
    scheduler: Scheduler,
    task: Task,
    lanes: Rc<RefCell<Lanes>>,
    faults: Rc<Cell<u64>>,
}

impl PriorityQueue {
    /// Create a queue whose task is scheduled right away.
    #[track_caller]
    pub fn new(scheduler: &Scheduler, budget: impl IntoBudget) -> Result<Self> {
        let origin = Location::caller();
        let lanes = Rc::new(RefCell::new(Lanes::default()));
        let faults = Rc::new(Cell::new(0));
        let task = Task::start(
            scheduler,
            budget,
            DrainStep {
                lanes: Rc::clone(&lanes),
                faults: Rc::clone(&faults),
            },
        )?;
        debug!(task = %task.id(), origin = %origin, "priority queue created");
        Ok(Self {
            scheduler: scheduler.clone(),
            task,
            lanes,
            faults,
        })
    }

    /// Append `action` to the lane for `priority`.
    pub fn enqueue<F, R>(&self, action: F, priority: Priority) -> Result<()>
    where
        F: FnOnce() -> R + 'static,
        R: ActionReturn,
    {
        self.push(priority, Box::new(move || action().into_action_result()))
    }

    /// Append `action` to the medium lane.
    pub fn enqueue_default<F, R>(&self, action: F) -> Result<()>
    where
        F: FnOnce() -> R + 'static,
        R: ActionReturn,
    {
        self.enqueue(action, Priority::Medium)
    }

    /// Enqueue `action` and return a handle that can cancel it before it runs.
    ///
    /// The handle reads `Finished` once the action has run, even if it failed.
    pub fn enqueue_with_handle<F, R>(&self, action: F, priority: Priority) -> Result<Handle>
    where
        F: FnOnce() -> R + 'static,
        R: ActionReturn,
    {
        let handle = Handle::new();
        let status = Rc::clone(&handle.status);
        self.push(
            priority,
            Box::new(move || {
                if status.get() != HandleStatus::Queued {
                    return Ok(());
                }
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| action().into_action_result()));
                status.set(HandleStatus::Finished);
                match outcome {
                    Ok(outcome) => outcome,
                    Err(payload) => Err(StepFault::from_panic(payload)),
                }
            }),
        )?;
        Ok(handle)
    }

    fn push(&self, priority: Priority, action: Action) -> Result<()> {
        self.lanes.borrow_mut().push(priority, action);
        self.reactivate()
    }

    /// Put the backing task back on the scheduler if it is not scheduled.
    fn reactivate(&self) -> Result<()> {
        match self.task.status() {
            TaskStatus::Queued | TaskStatus::Executing => Ok(()),
            TaskStatus::PendingRemove => self.scheduler.add(&self.task),
            TaskStatus::Finished | TaskStatus::Detached => {
                self.task.reset_detached();
                self.scheduler.add(&self.task)
            }
        }
    }

    /// Stop draining without discarding pending items. The next enqueue or
    /// [`resume`] puts the task back on the scheduler.
    ///
    /// [`resume`]: PriorityQueue::resume
    pub fn pause(&self) {
        if self.task.is_scheduled() {
            self.scheduler.remove(&self.task);
        }
        debug!(task = %self.task.id(), pending = self.pending_total(), "queue paused");
    }

    /// Resume draining. A no-op when the queue is already scheduled.
    pub fn resume(&self) -> Result<()> {
        debug!(task = %self.task.id(), pending = self.pending_total(), "queue resumed");
        self.reactivate()
    }

    /// Discard every pending item. Handles of discarded items stay `Queued`.
    pub fn clear_all(&self) {
        self.lanes.borrow_mut().clear();
    }

    pub fn pending_count(&self, priority: Priority) -> usize {
        self.lanes.borrow().len(priority)
    }

    pub fn pending_total(&self) -> usize {
        self.lanes.borrow().total()
    }

    /// Whether the backing task is currently scheduled.
    pub fn is_scheduling(&self) -> bool {
        self.task.is_scheduled()
    }

    pub fn budget(&self) -> Duration {
        self.task.budget()
    }

    pub fn set_budget(&self, budget: impl IntoBudget) -> Result<()> {
        self.task.set_budget(budget)
    }

    /// Faults raised by queued items so far.
    pub fn fault_count(&self) -> u64 {
        self.faults.get()
    }

    /// The task that drains this queue.
    pub fn task(&self) -> &Task {
        &self.task
    }
}

impl std::fmt::Debug for PriorityQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("task", &self.task)
            .field("pending", &self.pending_total())
            .field("scheduling", &self.is_scheduling())
            .finish_non_exhaustive()
    }
}
