//! Demo workloads, one per step shape the scheduler supports.
//!
//! Every unit of work spins for a short, index-dependent time to stand in
//! for real CPU work, and bumps a shared counter so the host can report
//! progress.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info};

use timeslice_core::{Priority, PriorityQueue, Scheduler, Task, TaskStatus};

use crate::cli::Scenario;

const ACTIONS_PER_TASK: usize = 10;
const CANCEL_ACTIONS: usize = 1000;
const ITEMS_PER_LANE: usize = 60;
const GRID_RANGE: usize = 8;
const GRID_SPACING: f32 = 3.0;

/// Busy-wait for `cost` to stand in for real work.
fn simulate_work(cost: Duration) {
    let start = Instant::now();
    while start.elapsed() < cost {
        std::hint::spin_loop();
    }
}

/// 100µs to 500µs, varying with the index.
fn unit_cost(index: usize) -> Duration {
    Duration::from_micros(100 * (1 + (index % 5) as u64))
}

/// The live pieces of a running scenario.
pub struct Demo {
    scenario: Scenario,
    tasks: Vec<Task>,
    queues: Vec<PriorityQueue>,
    cancel_at: Option<(u64, Task)>,
    work_done: Rc<Cell<usize>>,
    placements: Rc<RefCell<Vec<(f32, f32)>>>,
}

impl Demo {
    fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            tasks: Vec::new(),
            queues: Vec::new(),
            cancel_at: None,
            work_done: Rc::new(Cell::new(0)),
            placements: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// A unit of work that reports progress when it runs.
    fn unit(&self, label: String, index: usize) -> impl FnOnce() + 'static {
        let work_done = Rc::clone(&self.work_done);
        move || {
            simulate_work(unit_cost(index));
            work_done.set(work_done.get() + 1);
            debug!(unit = %label, "work unit done");
        }
    }

    /// Hook run before each tick.
    pub fn before_tick(&mut self, tick: u64) {
        if let Some((at, task)) = &self.cancel_at {
            if tick >= *at {
                let cancelled = task.cancel();
                info!(tick, task = %task.id(), cancelled, "cancelling long task");
                self.cancel_at = None;
            }
        }
    }

    /// Whether every task and queue of the scenario has wound down.
    pub fn is_idle(&self) -> bool {
        let settled = |status: TaskStatus| matches!(status, TaskStatus::Finished | TaskStatus::Detached);
        self.tasks.iter().all(|t| settled(t.status()))
            && self.queues.iter().all(|q| settled(q.task().status()))
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// Units of work completed so far.
    pub fn work_done(&self) -> usize {
        self.work_done.get()
    }

    pub fn placements(&self) -> usize {
        self.placements.borrow().len()
    }
}

/// Create the tasks for `scenario` on `scheduler`.
pub fn build(scenario: Scenario, scheduler: &Scheduler, budget: Duration, cancel_after: u64) -> Result<Demo> {
    let mut demo = Demo::new(scenario);
    match scenario {
        Scenario::Basic => build_basic(&mut demo, scheduler, budget)?,
        Scenario::Cancel => build_cancel(&mut demo, scheduler, budget, cancel_after)?,
        Scenario::Queue => build_queue(&mut demo, scheduler, budget)?,
        Scenario::Generator => build_generator(&mut demo, scheduler, budget)?,
    }
    info!(
        scenario = scenario.name(),
        tasks = demo.tasks.len(),
        queues = demo.queues.len(),
        "scenario ready"
    );
    Ok(demo)
}

// ── basic ───────────────────────────────────────────────────────────

fn build_basic(demo: &mut Demo, scheduler: &Scheduler, budget: Duration) -> Result<()> {
    let actions: Vec<_> = (1..=ACTIONS_PER_TASK)
        .map(|i| demo.unit(format!("list {i}"), i))
        .collect();
    demo.tasks.push(Task::actions(scheduler, budget, actions)?);

    let work_done = Rc::clone(&demo.work_done);
    let lazy = (1..=ACTIONS_PER_TASK).map(move |i| {
        let work_done = Rc::clone(&work_done);
        move || {
            simulate_work(unit_cost(i));
            work_done.set(work_done.get() + 1);
        }
    });
    demo.tasks.push(Task::action_iter(scheduler, budget, lazy)?);

    let work_done = Rc::clone(&demo.work_done);
    demo.tasks.push(Task::with_state(scheduler, budget, 1_usize, move |state: &mut usize| {
        simulate_work(unit_cost(*state));
        work_done.set(work_done.get() + 1);
        let done = *state == ACTIONS_PER_TASK;
        *state += 1;
        done
    })?);

    let work_done = Rc::clone(&demo.work_done);
    let produced = (1..=ACTIONS_PER_TASK).map(move |i| {
        simulate_work(unit_cost(i));
        work_done.set(work_done.get() + 1);
    });
    demo.tasks.push(Task::producer(scheduler, budget, produced)?);
    Ok(())
}

// ── cancel ──────────────────────────────────────────────────────────

fn build_cancel(demo: &mut Demo, scheduler: &Scheduler, budget: Duration, cancel_after: u64) -> Result<()> {
    let work_done = Rc::clone(&demo.work_done);
    let actions = (1..=CANCEL_ACTIONS).map(move |i| {
        let work_done = Rc::clone(&work_done);
        move || {
            simulate_work(unit_cost(i));
            work_done.set(work_done.get() + 1);
        }
    });
    let task = Task::action_iter(scheduler, budget, actions)?;
    demo.cancel_at = Some((cancel_after, task.clone()));
    demo.tasks.push(task);
    Ok(())
}

// ── queue ───────────────────────────────────────────────────────────

fn build_queue(demo: &mut Demo, scheduler: &Scheduler, budget: Duration) -> Result<()> {
    let queue = PriorityQueue::new(scheduler, budget)?;
    let mut index = 0;
    for priority in [Priority::High, Priority::Medium, Priority::Low] {
        for _ in 0..ITEMS_PER_LANE {
            index += 1;
            queue.enqueue(demo.unit(format!("{index} {priority:?}"), index), priority)?;
        }
    }

    let mut cancelled = 0;
    for i in 1..=ITEMS_PER_LANE {
        index += 1;
        let handle = queue.enqueue_with_handle(demo.unit(format!("{index} handled"), index), Priority::Medium)?;
        if i % 2 == 1 && handle.cancel() {
            cancelled += 1;
        }
    }
    info!(pending = queue.pending_total(), cancelled, "queue filled");
    demo.queues.push(queue);
    Ok(())
}

// ── generator ───────────────────────────────────────────────────────

fn build_generator(demo: &mut Demo, scheduler: &Scheduler, budget: Duration) -> Result<()> {
    let placements = Rc::clone(&demo.placements);
    let work_done = Rc::clone(&demo.work_done);
    let origin = -GRID_SPACING * 0.5 * GRID_RANGE as f32;
    let grid = (0..GRID_RANGE * GRID_RANGE).map(move |index| {
        let (x, y) = (index / GRID_RANGE, index % GRID_RANGE);
        simulate_work(unit_cost(index));
        placements.borrow_mut().push((
            origin + GRID_SPACING * x as f32,
            origin + GRID_SPACING * y as f32,
        ));
        work_done.set(work_done.get() + 1);
    });
    demo.tasks.push(Task::producer(scheduler, budget, grid)?);
    Ok(())
}
