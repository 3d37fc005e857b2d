//! The resumable-step capability and its adapters.
//!
//! Every task is driven through one interface, [`ResumableStep`]. The four
//! adapters below turn the usual shapes of incremental work into that
//! interface; the scheduler never knows which one backs a task.

use std::iter::Peekable;

use tracing::warn;

use crate::error::{Result, SliceError, StepFault};

/// Outcome of one step: `Ok(true)` once the work is finished.
pub type StepResult = std::result::Result<bool, StepFault>;

/// Advance by one unit of work and report whether the work is finished.
pub trait ResumableStep {
    fn step(&mut self) -> StepResult;
}

impl<S: ResumableStep + ?Sized> ResumableStep for Box<S> {
    fn step(&mut self) -> StepResult {
        (**self).step()
    }
}

/// Return types accepted from step functions.
///
/// A plain `bool` never faults; a `Result` faults on `Err`.
pub trait StepReturn {
    fn into_step_result(self) -> StepResult;
}

impl StepReturn for bool {
    fn into_step_result(self) -> StepResult {
        Ok(self)
    }
}

impl<E: Into<anyhow::Error>> StepReturn for std::result::Result<bool, E> {
    fn into_step_result(self) -> StepResult {
        self.map_err(|e| StepFault::Failed(e.into()))
    }
}

/// Return types accepted from zero-argument actions.
pub trait ActionReturn {
    fn into_action_result(self) -> std::result::Result<(), StepFault>;
}

impl ActionReturn for () {
    fn into_action_result(self) -> std::result::Result<(), StepFault> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> ActionReturn for std::result::Result<(), E> {
    fn into_action_result(self) -> std::result::Result<(), StepFault> {
        self.map_err(|e| StepFault::Failed(e.into()))
    }
}

pub(crate) type Action = Box<dyn FnOnce() -> std::result::Result<(), StepFault>>;

// ── State-ref ───────────────────────────────────────────────────────

/// Adapter-owned state threaded into a step function on every call.
pub struct StatefulStep<S> {
    state: S,
    func: Box<dyn FnMut(&mut S) -> StepResult>,
}

/// Build a [`StatefulStep`] from an initial state and a step function.
pub fn stateful<S, F, R>(initial: S, mut func: F) -> StatefulStep<S>
where
    F: FnMut(&mut S) -> R + 'static,
    R: StepReturn,
{
    StatefulStep {
        state: initial,
        func: Box::new(move |state: &mut S| func(state).into_step_result()),
    }
}

impl<S> StatefulStep<S> {
    pub fn state(&self) -> &S {
        &self.state
    }
}

impl<S> ResumableStep for StatefulStep<S> {
    fn step(&mut self) -> StepResult {
        (self.func)(&mut self.state)
    }
}

// ── Closed ──────────────────────────────────────────────────────────

/// A step function that keeps its own state.
pub struct ClosedStep {
    func: Box<dyn FnMut() -> StepResult>,
}

pub fn closed<F, R>(mut func: F) -> ClosedStep
where
    F: FnMut() -> R + 'static,
    R: StepReturn,
{
    ClosedStep {
        func: Box::new(move || func().into_step_result()),
    }
}

impl ResumableStep for ClosedStep {
    fn step(&mut self) -> StepResult {
        (self.func)()
    }
}

// ── Ordered actions ─────────────────────────────────────────────────

/// Runs one action per step; finished once the last action has run.
pub struct ActionSequence {
    actions: Peekable<Box<dyn Iterator<Item = Action>>>,
    ran: usize,
}

impl ActionSequence {
    /// A fixed list of actions. An empty list is a configuration error.
    pub fn fixed<F, R>(actions: Vec<F>) -> Result<Self>
    where
        F: FnOnce() -> R + 'static,
        R: ActionReturn,
    {
        if actions.is_empty() {
            return Err(SliceError::Config("no actions provided".to_string()));
        }
        Ok(Self::from_iter_unchecked(actions))
    }

    /// A lazily produced sequence of actions.
    ///
    /// The first action is produced up front to detect an empty sequence,
    /// which is accepted with a warning and finishes on its first step.
    pub fn lazy<I, F, R>(actions: I) -> Self
    where
        I: IntoIterator<Item = F>,
        I::IntoIter: 'static,
        F: FnOnce() -> R + 'static,
        R: ActionReturn,
    {
        let mut sequence = Self::from_iter_unchecked(actions);
        if sequence.actions.peek().is_none() {
            warn!("action sequence is empty; the task will finish on its first step");
        }
        sequence
    }

    fn from_iter_unchecked<I, F, R>(actions: I) -> Self
    where
        I: IntoIterator<Item = F>,
        I::IntoIter: 'static,
        F: FnOnce() -> R + 'static,
        R: ActionReturn,
    {
        let boxed: Box<dyn Iterator<Item = Action>> = Box::new(
            actions
                .into_iter()
                .map(|action| Box::new(move || action().into_action_result()) as Action),
        );
        Self {
            actions: boxed.peekable(),
            ran: 0,
        }
    }

    /// Number of actions run so far.
    pub fn ran(&self) -> usize {
        self.ran
    }
}

impl ResumableStep for ActionSequence {
    fn step(&mut self) -> StepResult {
        match self.actions.next() {
            Some(action) => {
                self.ran += 1;
                action()?;
                Ok(self.actions.peek().is_none())
            }
            None if self.ran == 0 => Ok(true),
            None => Err(StepFault::Exhausted),
        }
    }
}

// ── Incremental producer ────────────────────────────────────────────

/// Pulls one value from an iterator per step; finished when it runs dry.
///
/// Produced values are dropped; the work happens inside the iterator.
pub struct ProducerStep<I> {
    iter: I,
    produced: usize,
}

pub fn producer<I: IntoIterator>(iter: I) -> ProducerStep<I::IntoIter> {
    ProducerStep {
        iter: iter.into_iter(),
        produced: 0,
    }
}

impl<I> ProducerStep<I> {
    pub fn produced(&self) -> usize {
        self.produced
    }
}

impl<I: Iterator> ResumableStep for ProducerStep<I> {
    fn step(&mut self) -> StepResult {
        match self.iter.next() {
            Some(_) => {
                self.produced += 1;
                Ok(false)
            }
            None => Ok(true),
        }
    }
}
