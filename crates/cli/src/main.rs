mod cli;
mod config;
mod host;
mod scenarios;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use timeslice_core::Scheduler;

use crate::cli::CliArgs;
use crate::config::CliConfig;

// ── main ────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    // Load config, then let flags win over file and environment
    let mut config = CliConfig::load(args.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(rate) = args.tick_rate {
        config.scheduler.target_tick_rate = rate;
    }
    if args.validate {
        config.scheduler.validate = true;
    }
    let max_ticks = args.ticks.unwrap_or(config.max_ticks);
    let budget = config
        .scheduler
        .default_budget()
        .context("invalid default budget")?;

    info!(
        scenario = args.scenario.name(),
        tick_rate = config.scheduler.target_tick_rate,
        budget_ms = budget.as_secs_f64() * 1000.0,
        max_ticks,
        "timeslice starting"
    );

    let scheduler = Scheduler::new(config.scheduler.clone());
    let mut demo = scenarios::build(args.scenario, &scheduler, budget, config.cancel_after_ticks)
        .context("failed to build scenario")?;

    let summary = host::run(&scheduler, &mut demo, max_ticks).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", host::describe(&summary));
    }
    Ok(())
}
