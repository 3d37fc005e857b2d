//! Frame-budget helper for work that runs outside the scheduler.
//!
//! Given a target tick rate and a [`TickClock`], the estimator tells callers
//! how much of the current tick is left and runs work only when its
//! expected cost still fits.

use std::rc::Rc;
use std::time::Duration;

use tracing::warn;

use crate::clock::TickClock;
use crate::config::SchedulerConfig;
use crate::error::{Result, SliceError};
use crate::scheduler::runner::Scheduler;
use crate::scheduler::types::IntoBudget;

#[derive(Debug, Clone)]
pub struct TimeBudgetEstimator {
    interval: Duration,
    clock: Rc<TickClock>,
}

impl TimeBudgetEstimator {
    /// Build from an explicit tick interval.
    pub fn new(interval: Duration, clock: Rc<TickClock>) -> Self {
        Self { interval, clock }
    }

    /// Build from the config's target tick rate. An uncapped rate (0) has no
    /// interval to budget against and is rejected.
    pub fn from_config(config: &SchedulerConfig, clock: Rc<TickClock>) -> Result<Self> {
        let interval = config.tick_interval().ok_or_else(|| {
            SliceError::Config("target_tick_rate must be > 0 to estimate a time budget".to_string())
        })?;
        Ok(Self::new(interval, clock))
    }

    /// Share the scheduler's config and tick clock.
    pub fn for_scheduler(scheduler: &Scheduler) -> Result<Self> {
        Self::from_config(scheduler.config(), scheduler.tick_clock())
    }

    pub fn tick_interval(&self) -> Duration {
        self.interval
    }

    /// Time left in the current tick; zero once the tick has overrun.
    ///
    /// Clamped for reporting. [`fits`](Self::fits) compares against the
    /// elapsed time instead, so an overrun tick fits nothing.
    pub fn remaining_budget(&self) -> Duration {
        self.interval.saturating_sub(self.clock.since_tick_start())
    }

    /// Whether work costing `expected` fits in what is left of the tick.
    pub fn fits(&self, expected: impl IntoBudget) -> Result<bool> {
        let expected = expected.into_budget()?;
        if expected >= self.interval {
            warn!(
                expected_secs = expected.as_secs_f64(),
                interval_secs = self.interval.as_secs_f64(),
                "expected cost is not smaller than the tick interval; it can never fit"
            );
        }
        let elapsed = self.clock.since_tick_start();
        Ok(elapsed
            .checked_add(expected)
            .is_some_and(|total| total <= self.interval))
    }

    /// Run `action` if it fits. Returns whether it ran.
    pub fn try_execute<F: FnOnce()>(&self, action: F, expected: impl IntoBudget) -> Result<bool> {
        if !self.fits(expected)? {
            return Ok(false);
        }
        action();
        Ok(true)
    }

    /// Run `action(data)` if it fits. `data` is dropped unused otherwise.
    pub fn try_execute_with<T, F: FnOnce(T)>(&self, action: F, data: T, expected: impl IntoBudget) -> Result<bool> {
        self.try_execute(|| action(data), expected)
    }

    /// Compute a value if it fits; `None` when it was skipped.
    pub fn try_compute<R, F: FnOnce() -> R>(&self, compute: F, expected: impl IntoBudget) -> Result<Option<R>> {
        if !self.fits(expected)? {
            return Ok(None);
        }
        Ok(Some(compute()))
    }

    pub fn try_compute_with<T, R, F: FnOnce(T) -> R>(
        &self,
        compute: F,
        data: T,
        expected: impl IntoBudget,
    ) -> Result<Option<R>> {
        self.try_compute(|| compute(data), expected)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::clock::ManualClock;

    use super::*;

    fn estimator(rate: u32) -> (TimeBudgetEstimator, ManualClock) {
        let manual = ManualClock::new();
        let clock = Rc::new(TickClock::new(Rc::new(manual.clone())));
        let config = SchedulerConfig {
            target_tick_rate: rate,
            ..SchedulerConfig::default()
        };
        (TimeBudgetEstimator::from_config(&config, clock).unwrap(), manual)
    }

    #[test]
    fn remaining_budget_shrinks_with_time() {
        let (est, clock) = estimator(50);
        assert_eq!(est.remaining_budget(), Duration::from_millis(20));
        clock.advance(Duration::from_millis(15));
        assert_eq!(est.remaining_budget(), Duration::from_millis(5));
        clock.advance(Duration::from_millis(15));
        assert_eq!(est.remaining_budget(), Duration::ZERO);
    }

    #[test]
    fn try_execute_runs_only_when_it_fits() {
        let (est, clock) = estimator(50);
        let ran = Cell::new(0);

        assert!(est.try_execute(|| ran.set(ran.get() + 1), 0.005).unwrap());
        clock.advance(Duration::from_millis(18));
        assert!(!est.try_execute(|| ran.set(ran.get() + 1), 0.005).unwrap());
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn try_compute_returns_value_or_none() {
        let (est, clock) = estimator(50);
        assert_eq!(est.try_compute(|| 6 * 7, Duration::from_millis(1)).unwrap(), Some(42));
        assert_eq!(est.try_compute_with(|x: i32| x + 1, 1, 0.001).unwrap(), Some(2));

        clock.advance(Duration::from_millis(20));
        assert_eq!(est.try_compute(|| 6 * 7, Duration::from_millis(1)).unwrap(), None);
    }

    #[test]
    fn zero_cost_fits_until_the_tick_is_used_up() {
        let (est, clock) = estimator(50);
        assert!(est.fits(0.0).unwrap());
        clock.advance(Duration::from_millis(20));
        assert!(est.fits(0.0).unwrap());
    }

    #[test]
    fn overrun_tick_skips_even_zero_cost_work() {
        let (est, clock) = estimator(50);
        let ran = Cell::new(false);
        clock.advance(Duration::from_millis(25));

        assert!(!est.try_execute(|| ran.set(true), 0.0).unwrap());
        assert!(!ran.get());
        assert_eq!(est.try_compute(|| 1, Duration::ZERO).unwrap(), None);
        assert_eq!(est.remaining_budget(), Duration::ZERO);
    }

    #[test]
    fn negative_cost_rejected() {
        let (est, _clock) = estimator(60);
        let ran = Cell::new(false);
        assert!(est.try_execute(|| ran.set(true), -0.001).is_err());
        assert!(!ran.get());
    }

    #[test]
    fn uncapped_rate_rejected() {
        let clock = Rc::new(TickClock::new(Rc::new(ManualClock::new())));
        let config = SchedulerConfig {
            target_tick_rate: 0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            TimeBudgetEstimator::from_config(&config, clock),
            Err(SliceError::Config(_))
        ));
    }

    #[test]
    fn data_is_passed_through() {
        let (est, _clock) = estimator(60);
        let seen = Cell::new(0);
        assert!(est.try_execute_with(|v: i32| seen.set(v), 9, 0.0).unwrap());
        assert_eq!(seen.get(), 9);
    }
}
