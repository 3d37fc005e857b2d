use std::cell::Cell;

use tracing::{debug, error, trace};

use crate::error::{Result, SliceError};
use crate::scheduler::task::Task;
use crate::scheduler::types::{TaskStatus, TickReport};

use super::Scheduler;

/// Clears the re-entrancy flag however the tick ends.
struct TickGuard<'a>(&'a Cell<bool>);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Scheduler {
    /// Run one scheduling pass.
    ///
    /// Visits the slots that existed when the pass began, in insertion
    /// order. Tasks added during the pass wait for the next one. Each live
    /// task is stepped repeatedly until it finishes, cancels itself, or has
    /// used its budget; at least one step is always made. Step faults are
    /// logged and counted, never propagated.
    ///
    /// Errors only on a broken lifecycle invariant or a nested call.
    pub fn tick(&self) -> Result<TickReport> {
        if self.inner.ticking.replace(true) {
            return Err(SliceError::ReentrantTick);
        }
        let _guard = TickGuard(&self.inner.ticking);

        let tick_start = self.inner.clock.begin_tick();
        let scanned = self.inner.slots.borrow().len();
        let mut report = TickReport {
            scanned,
            ..TickReport::default()
        };

        for index in 0..scanned {
            let slot = self.inner.slots.borrow()[index].clone();
            let Some(task) = slot else {
                report.removed += 1;
                continue;
            };

            match task.status() {
                TaskStatus::Queued => self.run_turn(index, &task, &mut report)?,
                TaskStatus::PendingRemove => {
                    self.finalize_removal(index, &task, &mut report);
                }
                from => {
                    return Err(SliceError::InvalidTransition {
                        task: task.id(),
                        action: "schedule",
                        from,
                    });
                }
            }
        }

        if self.should_compact(report.removed, scanned) {
            self.compact();
            report.compacted = true;
        }
        if self.inner.config.validate {
            self.check_duplicates()?;
        }

        let elapsed = self.inner.clock.now().saturating_duration_since(tick_start);
        self.inner.metrics.borrow_mut().record_tick(&report, elapsed);
        trace!(
            scanned = report.scanned,
            steps = report.steps,
            removed = report.removed,
            elapsed_us = elapsed.as_micros() as u64,
            "tick complete"
        );
        Ok(report)
    }

    /// Step one task until it finishes, cancels, or spends its budget.
    fn run_turn(&self, index: usize, task: &Task, report: &mut TickReport) -> Result<()> {
        let budget = task.budget();
        let turn_start = self.inner.clock.now();

        loop {
            task.set_status(TaskStatus::Executing);
            report.steps += 1;
            let done = match task.run_step() {
                Ok(done) => done,
                Err(fault) => {
                    task.record_fault();
                    report.faults += 1;
                    error!(
                        task = %task.id(),
                        origin = %task.origin(),
                        error = %fault,
                        "step failed"
                    );
                    false
                }
            };

            match task.status() {
                TaskStatus::Executing => {}
                TaskStatus::PendingRemove => {
                    self.finalize_removal(index, task, report);
                    return Ok(());
                }
                from => {
                    return Err(SliceError::InvalidTransition {
                        task: task.id(),
                        action: "resume after step",
                        from,
                    });
                }
            }

            if done {
                task.set_status(TaskStatus::Finished);
                self.tombstone(index);
                report.removed += 1;
                report.finished += 1;
                debug!(task = %task.id(), "task finished");
                return Ok(());
            }
            task.set_status(TaskStatus::Queued);

            if self.inner.clock.now().saturating_duration_since(turn_start) >= budget {
                return Ok(());
            }
        }
    }

    fn finalize_removal(&self, index: usize, task: &Task, report: &mut TickReport) {
        task.set_status(TaskStatus::Detached);
        self.tombstone(index);
        report.removed += 1;
        report.cancelled += 1;
        debug!(task = %task.id(), "task removed");
    }

    fn tombstone(&self, index: usize) {
        self.inner.slots.borrow_mut()[index] = None;
    }
}
