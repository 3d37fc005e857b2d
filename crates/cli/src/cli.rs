use clap::{Parser, ValueEnum};

/// Demo host for the time-slicing scheduler.
///
/// Runs one of the bundled workloads and drives the scheduler once per tick
/// at the configured rate until the work is done or the tick limit is hit.
#[derive(Parser, Debug)]
#[command(name = "timeslice", about = "Drive time-sliced demo workloads tick by tick")]
pub struct CliArgs {
    /// Path to config file (default: ~/.config/timeslice/config.toml)
    #[arg(long, env = "TIMESLICE_CONFIG")]
    pub config: Option<String>,

    /// Workload to run
    #[arg(long, value_enum, default_value = "basic")]
    pub scenario: Scenario,

    /// Stop after this many ticks even if work remains (overrides config)
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Target ticks per second, 0 for uncapped (overrides config)
    #[arg(long)]
    pub tick_rate: Option<u32>,

    /// Enable scheduler invariant checks
    #[arg(long)]
    pub validate: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scenario {
    /// One task per step shape: action list, lazy actions, state-ref, producer
    Basic,
    /// A 1000-action task cancelled part way through
    Cancel,
    /// A priority queue fed on all lanes, with half the handled items cancelled
    Queue,
    /// A grid of placements produced one per step
    Generator,
}

impl Scenario {
    pub fn name(self) -> &'static str {
        match self {
            Scenario::Basic => "basic",
            Scenario::Cancel => "cancel",
            Scenario::Queue => "queue",
            Scenario::Generator => "generator",
        }
    }
}
