//! The host loop: one scheduler tick per cycle at the target tick rate.

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use timeslice_core::{Scheduler, SchedulerMetrics};

use crate::scenarios::Demo;

/// Outcome of one host run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub ticks: u64,
    /// Whether all work wound down before the tick limit.
    pub completed: bool,
    pub work_units: usize,
    pub placements: usize,
    pub live_tasks: usize,
    pub metrics: SchedulerMetrics,
}

/// Tick `scheduler` until `demo` is idle or `max_ticks` have run.
///
/// With a capped tick rate each tick waits on a tokio interval; uncapped
/// runs yield to the runtime between ticks.
pub async fn run(scheduler: &Scheduler, demo: &mut Demo, max_ticks: u64) -> Result<RunSummary> {
    let mut interval = scheduler.config().tick_interval().map(|period| {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    let mut ticks = 0;
    let mut completed = false;
    while ticks < max_ticks {
        match interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => tokio::task::yield_now().await,
        }

        demo.before_tick(ticks);
        let report = scheduler
            .tick()
            .with_context(|| format!("tick {ticks} failed"))?;
        ticks += 1;
        debug!(
            tick = ticks,
            steps = report.steps,
            finished = report.finished,
            faults = report.faults,
            "tick"
        );

        if demo.is_idle() {
            completed = true;
            break;
        }
    }

    if completed {
        info!(ticks, work_units = demo.work_done(), "scenario finished");
    } else {
        warn!(ticks, work_units = demo.work_done(), "tick limit reached with work pending");
    }

    Ok(RunSummary {
        scenario: demo.scenario().name().to_string(),
        ticks,
        completed,
        work_units: demo.work_done(),
        placements: demo.placements(),
        live_tasks: scheduler.live_count(),
        metrics: scheduler.metrics(),
    })
}

/// One-line human-readable summary.
pub fn describe(summary: &RunSummary) -> String {
    let avg = summary.metrics.avg_tick_duration;
    format!(
        "{}: {} ticks, {} work units, {} steps, {} faults, avg tick {:.3} ms{}",
        summary.scenario,
        summary.ticks,
        summary.work_units,
        summary.metrics.steps,
        summary.metrics.faults,
        avg.as_secs_f64() * 1000.0,
        if summary.completed { "" } else { " (incomplete)" },
    )
}
