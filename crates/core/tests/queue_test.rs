//! Integration tests for the PriorityQueue.
//!
//! Every queued item advances a manual clock by a fixed cost, so the number
//! of items a tick drains is fully determined by the queue's budget.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use timeslice_core::{
    HandleStatus, ManualClock, Priority, PriorityQueue, Scheduler, SchedulerConfig,
};

const ITEM_COST: Duration = Duration::from_millis(1);

struct Fixture {
    scheduler: Scheduler,
    clock: ManualClock,
    log: Rc<RefCell<Vec<String>>>,
}

impl Fixture {
    fn new() -> Self {
        let clock = ManualClock::new();
        let scheduler = Scheduler::with_clock(SchedulerConfig::default(), Rc::new(clock.clone()));
        Self {
            scheduler,
            clock,
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// An item that records `name` and costs `ITEM_COST`.
    fn item(&self, name: &str) -> impl FnOnce() + 'static {
        let log = Rc::clone(&self.log);
        let clock = self.clock.clone();
        let name = name.to_string();
        move || {
            log.borrow_mut().push(name);
            clock.advance(ITEM_COST);
        }
    }

    fn ran(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

#[test]
fn higher_lane_is_serviced_first() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::from_millis(2)).unwrap();
    queue.enqueue(fx.item("L1"), Priority::Low).unwrap();
    queue.enqueue(fx.item("M1"), Priority::Medium).unwrap();
    queue.enqueue(fx.item("H1"), Priority::High).unwrap();
    queue.enqueue(fx.item("M2"), Priority::Medium).unwrap();
    queue.enqueue(fx.item("H2"), Priority::High).unwrap();

    fx.scheduler.tick().unwrap();

    // Step 1 runs H1. Step 2 empties High with H2 and falls through to M1.
    assert_eq!(fx.ran(), vec!["H1", "H2", "M1"]);
    assert_eq!(queue.pending_count(Priority::Medium), 1);
    assert_eq!(queue.pending_count(Priority::Low), 1);

    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["H1", "H2", "M1", "M2", "L1"]);
    assert_eq!(queue.pending_total(), 0);
}

// A step that empties its lane moves on to the next lane in the same step,
// so one zero-budget step drains High, Medium and Low singletons together.
#[test]
fn emptied_lane_falls_through_within_one_step() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::ZERO).unwrap();
    queue.enqueue(fx.item("L"), Priority::Low).unwrap();
    queue.enqueue(fx.item("M"), Priority::Medium).unwrap();
    queue.enqueue(fx.item("H"), Priority::High).unwrap();

    let report = fx.scheduler.tick().unwrap();
    assert_eq!(report.steps, 1);
    assert_eq!(fx.ran(), vec!["H", "M", "L"]);
    assert!(!queue.is_scheduling());
}

#[test]
fn lanes_are_fifo() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::from_secs(1)).unwrap();
    for name in ["a", "b", "c"] {
        queue.enqueue_default(fx.item(name)).unwrap();
    }

    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["a", "b", "c"]);
}

#[test]
fn enqueue_reactivates_an_idle_queue() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::ZERO).unwrap();
    assert!(queue.is_scheduling());

    fx.scheduler.tick().unwrap();
    assert!(!queue.is_scheduling());

    queue.enqueue(fx.item("late"), Priority::Low).unwrap();
    assert!(queue.is_scheduling());

    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["late"]);
    assert!(!queue.is_scheduling());
}

#[test]
fn cancelled_handle_skips_the_item() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::ZERO).unwrap();
    let first = queue.enqueue_with_handle(fx.item("first"), Priority::Medium).unwrap();
    let second = queue.enqueue_with_handle(fx.item("second"), Priority::Medium).unwrap();
    assert_eq!(queue.pending_count(Priority::Medium), 2);

    assert!(first.cancel());
    fx.scheduler.tick().unwrap();

    // The cancelled item was dequeued but never ran.
    assert!(fx.ran().is_empty());
    assert_eq!(queue.pending_count(Priority::Medium), 1);
    assert_eq!(first.status(), HandleStatus::Detached);

    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["second"]);
    assert_eq!(second.status(), HandleStatus::Finished);
    assert!(!second.cancel());
}

#[test]
fn handle_finishes_even_when_the_item_fails() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::ZERO).unwrap();
    let handle = queue
        .enqueue_with_handle(
            || -> anyhow::Result<()> { Err(anyhow::anyhow!("item failed")) },
            Priority::High,
        )
        .unwrap();

    fx.scheduler.tick().unwrap();
    assert_eq!(handle.status(), HandleStatus::Finished);
    assert_eq!(queue.fault_count(), 1);
}

#[test]
fn failing_item_does_not_stop_the_queue() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::from_secs(1)).unwrap();
    queue
        .enqueue(|| -> anyhow::Result<()> { anyhow::bail!("broken") }, Priority::High)
        .unwrap();
    queue
        .enqueue(|| -> anyhow::Result<()> { panic!("also broken") }, Priority::High)
        .unwrap();
    queue.enqueue(fx.item("after"), Priority::High).unwrap();

    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["after"]);
    assert_eq!(queue.fault_count(), 2);
    assert!(!queue.is_scheduling());
}

#[test]
fn pause_keeps_items_until_resume() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::from_secs(1)).unwrap();
    queue.enqueue(fx.item("before"), Priority::Medium).unwrap();

    queue.pause();
    assert!(!queue.is_scheduling());
    fx.scheduler.tick().unwrap();
    fx.scheduler.tick().unwrap();
    assert!(fx.ran().is_empty());
    assert_eq!(queue.pending_total(), 1);

    queue.resume().unwrap();
    assert!(queue.is_scheduling());
    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["before"]);
    assert_eq!(fx.scheduler.live_count(), 0);
}

#[test]
fn enqueue_into_paused_queue_reactivates_it() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::from_secs(1)).unwrap();
    queue.enqueue(fx.item("before"), Priority::Medium).unwrap();

    queue.pause();
    fx.scheduler.tick().unwrap();
    assert!(!queue.is_scheduling());

    queue.enqueue(fx.item("during"), Priority::High).unwrap();
    assert!(queue.is_scheduling());
    assert_eq!(fx.scheduler.slot_count(), 1);

    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["during", "before"]);
}

#[test]
fn enqueue_right_after_pause_rescinds_the_removal() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::ZERO).unwrap();
    queue.pause();
    queue.enqueue(fx.item("x"), Priority::Low).unwrap();

    assert!(queue.is_scheduling());
    assert_eq!(fx.scheduler.slot_count(), 1);
    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["x"]);
}

#[test]
fn resume_right_after_pause_keeps_one_slot() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::ZERO).unwrap();
    queue.pause();
    queue.resume().unwrap();
    queue.enqueue(fx.item("x"), Priority::Low).unwrap();

    assert_eq!(fx.scheduler.slot_count(), 1);
    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["x"]);
}

#[test]
fn clear_all_discards_pending_items() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, Duration::ZERO).unwrap();
    for priority in Priority::DRAIN_ORDER {
        queue.enqueue(fx.item("dropped"), priority).unwrap();
    }
    queue.clear_all();
    assert_eq!(queue.pending_total(), 0);

    fx.scheduler.tick().unwrap();
    assert!(fx.ran().is_empty());
    assert!(!queue.is_scheduling());
}

#[test]
fn item_can_enqueue_more_work() {
    let fx = Fixture::new();
    let queue = Rc::new(PriorityQueue::new(&fx.scheduler, Duration::ZERO).unwrap());
    let follow_up = fx.item("follow-up");
    let inner = Rc::clone(&queue);
    queue
        .enqueue(
            move || inner.enqueue(follow_up, Priority::High),
            Priority::Low,
        )
        .unwrap();

    // The Low item enqueues into the already visited High lane, so the drain
    // is not done after this step.
    fx.scheduler.tick().unwrap();
    assert!(queue.is_scheduling());
    assert_eq!(queue.pending_count(Priority::High), 1);

    fx.scheduler.tick().unwrap();
    assert_eq!(fx.ran(), vec!["follow-up"]);
    assert!(!queue.is_scheduling());
}

#[test]
fn budget_is_adjustable() {
    let fx = Fixture::new();
    let queue = PriorityQueue::new(&fx.scheduler, 0.002).unwrap();
    assert_eq!(queue.budget(), Duration::from_millis(2));
    queue.set_budget(Duration::from_millis(5)).unwrap();
    assert_eq!(queue.budget(), Duration::from_millis(5));
    assert!(queue.set_budget(-1.0).is_err());
    assert!(PriorityQueue::new(&fx.scheduler, -1.0).is_err());
}
