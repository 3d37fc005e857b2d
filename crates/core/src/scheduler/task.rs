use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};
use std::rc::Rc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::error::{Result, StepFault};

use super::runner::Scheduler;
use super::step::{self, ActionReturn, ActionSequence, ResumableStep, StepResult, StepReturn};
use super::types::{IntoBudget, TaskId, TaskStatus};

/// A unit of incremental work plus its per-tick time budget.
///
/// `Task` is a cheap, clonable handle; clones refer to the same task. It is
/// bound to the thread that created it.
#[derive(Clone)]
pub struct Task {
    inner: Rc<TaskInner>,
}

struct TaskInner {
    id: TaskId,
    status: Cell<TaskStatus>,
    budget: Cell<Duration>,
    tick_interval: Option<Duration>,
    step: RefCell<Box<dyn ResumableStep>>,
    origin: &'static Location<'static>,
    faults: Cell<u64>,
}

impl Task {
    /// Wrap `step` in a task and add it to `scheduler`.
    ///
    /// The caller's source location is recorded as the task's origin and
    /// shows up in every diagnostic the task produces.
    #[track_caller]
    pub fn start<B, S>(scheduler: &Scheduler, budget: B, step: S) -> Result<Task>
    where
        B: IntoBudget,
        S: ResumableStep + 'static,
    {
        let origin = Location::caller();
        let budget = budget.into_budget()?;
        let task = Task {
            inner: Rc::new(TaskInner {
                id: scheduler.next_task_id(),
                status: Cell::new(TaskStatus::Detached),
                budget: Cell::new(budget),
                tick_interval: scheduler.config().tick_interval(),
                step: RefCell::new(Box::new(step)),
                origin,
                faults: Cell::new(0),
            }),
        };
        task.warn_if_over_interval(budget);
        scheduler.add(&task)?;
        debug!(
            task = %task.id(),
            origin = %origin,
            budget_secs = budget.as_secs_f64(),
            "task started"
        );
        Ok(task)
    }

    /// Start a task whose step function receives adapter-owned state.
    #[track_caller]
    pub fn with_state<B, S, F, R>(scheduler: &Scheduler, budget: B, initial: S, func: F) -> Result<Task>
    where
        B: IntoBudget,
        S: 'static,
        F: FnMut(&mut S) -> R + 'static,
        R: StepReturn,
    {
        Task::start(scheduler, budget, step::stateful(initial, func))
    }

    /// Start a task from a step function that carries its own state.
    #[track_caller]
    pub fn closed<B, F, R>(scheduler: &Scheduler, budget: B, func: F) -> Result<Task>
    where
        B: IntoBudget,
        F: FnMut() -> R + 'static,
        R: StepReturn,
    {
        Task::start(scheduler, budget, step::closed(func))
    }

    /// Start a task that runs one action per step. An empty list is rejected.
    #[track_caller]
    pub fn actions<B, F, R>(scheduler: &Scheduler, budget: B, actions: Vec<F>) -> Result<Task>
    where
        B: IntoBudget,
        F: FnOnce() -> R + 'static,
        R: ActionReturn,
    {
        Task::start(scheduler, budget, ActionSequence::fixed(actions)?)
    }

    /// Like [`Task::actions`], but the actions are produced lazily.
    #[track_caller]
    pub fn action_iter<B, I, F, R>(scheduler: &Scheduler, budget: B, actions: I) -> Result<Task>
    where
        B: IntoBudget,
        I: IntoIterator<Item = F>,
        I::IntoIter: 'static,
        F: FnOnce() -> R + 'static,
        R: ActionReturn,
    {
        Task::start(scheduler, budget, ActionSequence::lazy(actions))
    }

    /// Start a task that pulls one value from `iter` per step.
    #[track_caller]
    pub fn producer<B, I>(scheduler: &Scheduler, budget: B, iter: I) -> Result<Task>
    where
        B: IntoBudget,
        I: IntoIterator,
        I::IntoIter: 'static,
    {
        Task::start(scheduler, budget, step::producer(iter))
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn status(&self) -> TaskStatus {
        self.inner.status.get()
    }

    pub fn budget(&self) -> Duration {
        self.inner.budget.get()
    }

    /// Change the per-tick budget. Takes effect from the task's next turn.
    pub fn set_budget(&self, budget: impl IntoBudget) -> Result<()> {
        let budget = budget.into_budget()?;
        self.warn_if_over_interval(budget);
        self.inner.budget.set(budget);
        Ok(())
    }

    /// Where the task was created.
    pub fn origin(&self) -> &'static Location<'static> {
        self.inner.origin
    }

    /// Number of faults the task's step has raised so far.
    pub fn fault_count(&self) -> u64 {
        self.inner.faults.get()
    }

    pub fn is_scheduled(&self) -> bool {
        self.status().is_scheduled()
    }

    /// Request removal. Returns `false` (and changes nothing) unless the task
    /// is queued or executing.
    ///
    /// The task keeps its slot until the next scheduler pass finalizes it to
    /// `Detached`; re-adding before then simply rescinds the request.
    pub fn cancel(&self) -> bool {
        let status = self.status();
        if !status.is_scheduled() {
            debug!(task = %self.id(), ?status, "cancel ignored");
            return false;
        }
        self.set_status(TaskStatus::PendingRemove);
        debug!(task = %self.id(), ?status, "cancel requested");
        true
    }

    pub fn ptr_eq(&self, other: &Task) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ── Scheduler-side ──────────────────────────────────────────────

    pub(crate) fn set_status(&self, status: TaskStatus) {
        self.inner.status.set(status);
    }

    /// Make a finished or removed task addable again.
    pub(crate) fn reset_detached(&self) {
        if self.status() == TaskStatus::Finished {
            self.set_status(TaskStatus::Detached);
        }
    }

    /// Identity used for duplicate-slot detection.
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Run one step, turning a panic into a fault.
    pub(crate) fn run_step(&self) -> StepResult {
        let Ok(mut step) = self.inner.step.try_borrow_mut() else {
            return Err(StepFault::Failed(anyhow!("{} stepped re-entrantly", self.id())));
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| step.step()));
        match result {
            Ok(outcome) => outcome,
            Err(payload) => Err(StepFault::from_panic(payload)),
        }
    }

    pub(crate) fn record_fault(&self) {
        self.inner.faults.set(self.inner.faults.get() + 1);
    }

    fn warn_if_over_interval(&self, budget: Duration) {
        if let Some(interval) = self.inner.tick_interval {
            if budget >= interval {
                warn!(
                    task = %self.id(),
                    origin = %self.origin(),
                    budget_secs = budget.as_secs_f64(),
                    interval_secs = interval.as_secs_f64(),
                    "task budget is not smaller than the tick interval"
                );
            }
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("status", &self.status())
            .field("budget", &self.budget())
            .field("origin", &format_args!("{}", self.origin()))
            .finish()
    }
}
