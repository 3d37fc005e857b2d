//! Monotonic time sources.
//!
//! The scheduler never reads `Instant::now()` directly; it goes through a
//! [`Clock`] so hosts and tests can inject their own notion of time.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A monotonic wall-clock reader.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Real time, backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Steps in tests advance it to simulate their own cost, which makes the
/// number of steps a tick runs fully deterministic.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    /// Move time forward. Clones share the same timeline.
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}

/// A clock plus the moment the current tick began.
///
/// The scheduler marks the tick start on every pass; code without a
/// scheduler can call [`TickClock::begin_tick`] itself.
pub struct TickClock {
    clock: Rc<dyn Clock>,
    tick_start: Cell<Instant>,
}

impl TickClock {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        let tick_start = Cell::new(clock.now());
        Self { clock, tick_start }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Record the start of a new tick and return its timestamp.
    pub fn begin_tick(&self) -> Instant {
        let now = self.clock.now();
        self.tick_start.set(now);
        now
    }

    pub fn tick_start(&self) -> Instant {
        self.tick_start.get()
    }

    /// Time spent in the current tick so far.
    pub fn since_tick_start(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.tick_start.get())
    }
}

impl std::fmt::Debug for TickClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickClock")
            .field("tick_start", &self.tick_start.get())
            .finish_non_exhaustive()
    }
}
