use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SliceError};
use crate::scheduler::types::IntoBudget;

/// Scheduler configuration, typically parsed from TOML.
///
/// ```toml
/// target_tick_rate = 60
/// validate = true
/// default_budget_secs = 0.003
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Ticks per second the host aims for. 0 = uncapped (no interval known).
    #[serde(default = "default_tick_rate")]
    pub target_tick_rate: u32,

    /// Enable runtime invariant checks (duplicate slots, double adds).
    #[serde(default)]
    pub validate: bool,

    /// Budget used by hosts that do not pick one per task.
    #[serde(default = "default_budget_secs")]
    pub default_budget_secs: f64,
}

fn default_tick_rate() -> u32 {
    60
}

fn default_budget_secs() -> f64 {
    0.003
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            target_tick_rate: default_tick_rate(),
            validate: false,
            default_budget_secs: default_budget_secs(),
        }
    }
}

impl SchedulerConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Expected duration of one tick, if the tick rate is capped.
    pub fn tick_interval(&self) -> Option<Duration> {
        if self.target_tick_rate == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(1.0 / f64::from(self.target_tick_rate)))
        }
    }

    pub fn default_budget(&self) -> Result<Duration> {
        self.default_budget_secs.into_budget()
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// - `TIMESLICE_TICK_RATE` → `target_tick_rate`
    /// - `TIMESLICE_VALIDATE` → `validate` (`1`/`true`/`yes`)
    /// - `TIMESLICE_DEFAULT_BUDGET_SECS` → `default_budget_secs`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TIMESLICE_TICK_RATE") {
            if let Ok(rate) = v.parse::<u32>() {
                self.target_tick_rate = rate;
            }
        }
        if let Ok(v) = std::env::var("TIMESLICE_VALIDATE") {
            self.validate = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("TIMESLICE_DEFAULT_BUDGET_SECS") {
            if let Ok(secs) = v.parse::<f64>() {
                self.default_budget_secs = secs;
            }
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    /// Reject values the scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        let budget = self.default_budget().map_err(|e| match e {
            SliceError::Config(msg) => SliceError::Config(format!("default_budget_secs: {msg}")),
            other => other,
        })?;

        if let Some(interval) = self.tick_interval() {
            if budget >= interval {
                warn!(
                    budget_secs = budget.as_secs_f64(),
                    interval_secs = interval.as_secs_f64(),
                    "default budget is not smaller than the tick interval"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.target_tick_rate, 60);
        assert!(!config.validate);
        assert_eq!(config.default_budget_secs, 0.003);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: SchedulerConfig = toml::from_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn parse_full_toml() {
        let config: SchedulerConfig = toml::from_str(
            r#"
            target_tick_rate = 30
            validate = true
            default_budget_secs = 0.01
            "#,
        )
        .unwrap();
        assert_eq!(config.target_tick_rate, 30);
        assert!(config.validate);
        assert_eq!(config.default_budget().unwrap(), Duration::from_millis(10));
    }

    #[test]
    fn tick_interval_from_rate() {
        let mut config = SchedulerConfig::default();
        config.target_tick_rate = 50;
        assert_eq!(config.tick_interval(), Some(Duration::from_millis(20)));

        config.target_tick_rate = 0;
        assert_eq!(config.tick_interval(), None);
    }

    #[test]
    fn negative_default_budget_rejected() {
        let mut config = SchedulerConfig::default();
        config.default_budget_secs = -1.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SliceError::Config(ref msg) if msg.starts_with("default_budget_secs")));
    }

    #[test]
    fn env_overrides_apply() {
        std::env::set_var("TIMESLICE_TICK_RATE", "120");
        std::env::set_var("TIMESLICE_VALIDATE", "yes");
        std::env::set_var("TIMESLICE_DEFAULT_BUDGET_SECS", "not-a-number");

        let mut config = SchedulerConfig::default();
        config.apply_env_overrides();

        std::env::remove_var("TIMESLICE_TICK_RATE");
        std::env::remove_var("TIMESLICE_VALIDATE");
        std::env::remove_var("TIMESLICE_DEFAULT_BUDGET_SECS");

        assert_eq!(config.target_tick_rate, 120);
        assert!(config.validate);
        // Unparseable values are ignored.
        assert_eq!(config.default_budget_secs, 0.003);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = toml::from_str::<SchedulerConfig>("target_tick_rate = \"fast\"").unwrap_err();
        let err: SliceError = err.into();
        assert!(matches!(err, SliceError::ConfigParse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SchedulerConfig::from_file("/definitely/not/here/timeslice.toml").unwrap_err();
        assert!(matches!(err, SliceError::ConfigIo(_)));
    }
}
