use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use timeslice_core::SchedulerConfig;

/// CLI configuration loaded from TOML file.
///
/// ```toml
/// max_ticks = 600
///
/// [scheduler]
/// target_tick_rate = 60
/// validate = false
/// default_budget_secs = 0.003
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Upper bound on ticks per run
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Tick after which the cancel scenario cancels its task
    #[serde(default = "default_cancel_after_ticks")]
    pub cancel_after_ticks: u64,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_max_ticks() -> u64 {
    600
}

fn default_cancel_after_ticks() -> u64 {
    30
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            cancel_after_ticks: default_cancel_after_ticks(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/timeslice/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("timeslice");
        Ok(config_dir)
    }

    /// Return the default config file path.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// Returns default config if the file does not exist.
    ///
    /// Environment overrides are applied to the scheduler section and the
    /// result is validated.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        let mut config = if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            let config = Self::default();
            if let Err(e) = Self::write_default(&config_path, &config) {
                warn!(?config_path, error = %e, "could not write default config");
            }
            config
        };

        config.scheduler.apply_env_overrides();
        config
            .scheduler
            .validate()
            .context("invalid [scheduler] config")?;
        Ok(config)
    }

    /// Create the parent directory and write `config` as TOML.
    fn write_default(path: &Path, config: &Self) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let toml_str = toml::to_string_pretty(config).context("failed to serialize default config")?;
        std::fs::write(path, toml_str)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

        fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
