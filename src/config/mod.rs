// Settings persistence
// RON by default, JSON when the file extension asks for it

pub mod serialization;
pub mod types;

pub use serialization::ConfigFormat;
pub use types::{MetronomeConfig, SchedulerSettings, Settings};

use crate::sequencer::SchedulerError;
use std::path::{Path, PathBuf};

/// Settings error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("File system error: {0}")]
    FileSystemError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid settings: {0}")]
    Invalid(#[from] SchedulerError),

    #[error("No configuration directory on this platform")]
    NoConfigDir,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// `<config dir>/clicktrack/settings.ron`
pub fn default_settings_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("clicktrack").join("settings.ron"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Load and validate settings; a missing file yields defaults
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!(target: "clicktrack::config", "No settings at {:?}, using defaults", path);
        return Ok(Settings::default());
    }

    let data = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::FileSystemError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let settings = serialization::deserialize(&data, ConfigFormat::from_path(path))?;
    settings.validate()?;

    log::debug!(target: "clicktrack::config", "Loaded settings from {:?}", path);
    Ok(settings)
}

/// Validate and write settings, creating parent directories
pub fn save_settings<P: AsRef<Path>>(settings: &Settings, path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    settings.validate()?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ConfigError::FileSystemError(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let data = serialization::serialize(settings, ConfigFormat::from_path(path))?;
    std::fs::write(path, data).map_err(|e| {
        ConfigError::FileSystemError(format!("Failed to write {}: {}", path.display(), e))
    })?;

    log::debug!(target: "clicktrack::config", "Saved settings to {:?}", path);
    Ok(())
}
