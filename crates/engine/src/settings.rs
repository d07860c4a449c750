//! Engine settings: polling cadence and bounds, loaded from a JSON file.
//!
//! ```json
//! {
//!   "jobPoll": { "intervalMs": 1000, "maxAttempts": 120 },
//!   "startPoll": { "intervalMs": 2000, "maxAttempts": 60, "deadlineMs": 180000 }
//! }
//! ```

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`default_settings_path`].
pub const CONFIG_PATH_ENV: &str = "FOUNDRY_CONFIG_PATH";

/// Cadence and bounds of a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PollSettings {
    /// Pause between two polls.
    pub interval_ms: u64,
    /// Maximum number of polls before giving up.
    pub max_attempts: u32,
    /// Optional wall-clock bound across all polls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

impl PollSettings {
    pub const fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
            deadline_ms: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    fn validate(&self, section: &'static str) -> Result<(), SettingsError> {
        if self.interval_ms == 0 {
            return Err(SettingsError::invalid(section, "intervalMs must be greater than zero"));
        }
        if self.max_attempts == 0 {
            return Err(SettingsError::invalid(section, "maxAttempts must be at least 1"));
        }
        if self.deadline_ms == Some(0) {
            return Err(SettingsError::invalid(section, "deadlineMs must be greater than zero when set"));
        }
        Ok(())
    }
}

/// Settings consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct EngineSettings {
    /// Server-side job polling (copy bits).
    pub job_poll: PollSettings,
    /// Waiting for a started application to report a running instance.
    pub start_poll: PollSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            job_poll: PollSettings::new(1_000, 120),
            start_poll: PollSettings::new(2_000, 60),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.job_poll.validate("jobPoll")?;
        self.start_poll.validate("startPoll")
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {section} settings: {reason}")]
    Invalid { section: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(section: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section,
            reason: reason.into(),
        }
    }
}

/// Returns the default path for the engine settings file.
pub fn default_settings_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("foundry").join("engine.json")
}

/// Loads settings from the default path.
pub fn load_settings() -> Result<EngineSettings, SettingsError> {
    load_settings_from_path(&default_settings_path())
}

/// Loads settings from `path`; a missing file yields the defaults.
pub fn load_settings_from_path(path: &Path) -> Result<EngineSettings, SettingsError> {
    if !path.exists() {
        return Ok(EngineSettings::default());
    }

    let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let settings: EngineSettings = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.validate()?;
    Ok(settings)
}
