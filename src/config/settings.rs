//! Application settings loaded from config.toml
//!
//! Every field has a default, so a missing file or an empty table yields a working
//! configuration. The file location comes from `HABIT_BUDDY_CONFIG`.

use crate::{
    core::state::StateDefaults,
    errors::{Error, Result},
};
use serde::Deserialize;
use std::{path::Path, time::Duration};
use tracing::info;

/// Environment variable naming the settings file.
pub const CONFIG_PATH_VAR: &str = "HABIT_BUDDY_CONFIG";

/// Settings file used when [`CONFIG_PATH_VAR`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Click target of delivered notifications
    pub app_url: String,
    /// Categories of a fresh state document
    pub default_categories: Vec<String>,
    /// Category reinstated when the last one is deleted
    pub fallback_category: String,
    /// Reminder scheduling knobs
    pub reminders: ReminderSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let defaults = StateDefaults::default();
        Self {
            app_url: "./".to_string(),
            default_categories: defaults.categories,
            fallback_category: defaults.fallback_category,
            reminders: ReminderSettings::default(),
        }
    }
}

/// The `[reminders]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    /// Foreground due-check interval
    pub poll_interval_secs: u64,
    /// Foreground day-rollover interval
    pub rollover_interval_secs: u64,
    /// Background periodic wake interval
    pub worker_wake_interval_secs: u64,
    /// Foreground ledger size that triggers a prune
    pub foreground_high_water: usize,
    /// Foreground ledger size after a prune
    pub foreground_low_water: usize,
    /// Background ledger size that triggers a prune
    pub background_high_water: usize,
    /// Background ledger size after a prune
    pub background_low_water: usize,
    /// Capacity of the foreground -> background channel
    pub channel_capacity: usize,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            rollover_interval_secs: 60,
            worker_wake_interval_secs: 60,
            foreground_high_water: 600,
            foreground_low_water: 500,
            background_high_water: 700,
            background_low_water: 550,
            channel_capacity: 32,
        }
    }
}

impl ReminderSettings {
    /// Foreground due-check period.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Foreground rollover period.
    #[must_use]
    pub const fn rollover_interval(&self) -> Duration {
        Duration::from_secs(self.rollover_interval_secs)
    }

    /// Background periodic wake period.
    #[must_use]
    pub const fn worker_wake_interval(&self) -> Duration {
        Duration::from_secs(self.worker_wake_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        let intervals = [
            ("poll_interval_secs", self.poll_interval_secs),
            ("rollover_interval_secs", self.rollover_interval_secs),
            ("worker_wake_interval_secs", self.worker_wake_interval_secs),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
            return Err(Error::Config {
                message: format!("reminders.{name} must be greater than 0"),
            });
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config {
                message: "reminders.channel_capacity must be greater than 0".to_string(),
            });
        }
        let marks = [
            ("foreground", self.foreground_low_water, self.foreground_high_water),
            ("background", self.background_low_water, self.background_high_water),
        ];
        for (side, low, high) in marks {
            if low >= high {
                return Err(Error::Config {
                    message: format!(
                        "reminders.{side}_low_water ({low}) must be below {side}_high_water ({high})"
                    ),
                });
            }
        }
        Ok(())
    }
}

impl Settings {
    /// Rejects settings the reminder machinery cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.fallback_category.trim().is_empty() {
            return Err(Error::Config {
                message: "fallback_category must not be empty".to_string(),
            });
        }
        self.reminders.validate()
    }

    /// Defaults for a fresh or unreadable state document.
    #[must_use]
    pub fn state_defaults(&self) -> StateDefaults {
        StateDefaults {
            categories: self.default_categories.clone(),
            fallback_category: self.fallback_category.trim().to_string(),
        }
    }
}

/// Parses and validates settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Loads settings from a TOML file
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Returns
/// * `Ok(Settings)` - Parsed settings, or defaults if the file does not exist
/// * `Err(Error)` - The file exists but cannot be read, parsed, or validated
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "No settings file found, using defaults");
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `HABIT_BUDDY_CONFIG`, or ./config.toml when unset
pub fn load_default_settings() -> Result<Settings> {
    let path =
        std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_settings(path)
}
