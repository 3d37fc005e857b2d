use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::TickReport;

/// Cumulative scheduler counters, updated once per tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerMetrics {
    /// Ticks completed.
    pub ticks: u64,
    /// Step calls made across all tasks.
    pub steps: u64,
    /// Tasks that reported completion.
    pub finished: u64,
    /// Tasks finalized after cancellation.
    pub cancelled: u64,
    /// Step faults caught.
    pub faults: u64,
    /// Times the slot collection was compacted.
    pub compactions: u64,
    /// Average wall time of one tick.
    pub avg_tick_duration: Duration,
    /// Longest tick seen.
    pub max_tick_duration: Duration,
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl SchedulerMetrics {
    /// Fold one tick into the counters.
    pub fn record_tick(&mut self, report: &TickReport, duration: Duration) {
        self.ticks += 1;
        self.steps += report.steps as u64;
        self.finished += report.finished as u64;
        self.cancelled += report.cancelled as u64;
        self.faults += report.faults as u64;
        if report.compacted {
            self.compactions += 1;
        }
        self.last_tick_at = Some(Utc::now());
        self.max_tick_duration = self.max_tick_duration.max(duration);

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_tick_duration = if self.ticks == 1 {
            duration
        } else {
            let prev_nanos = self.avg_tick_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / self.ticks as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }
}
