// Serialization utilities for settings persistence

use crate::config::ConfigError;
use crate::config::types::Settings;
use ron::ser::PrettyConfig;
use std::path::Path;

/// On-disk settings format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Ron,
    Json,
}

impl ConfigFormat {
    /// `.json` files are JSON, everything else is RON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Ron,
        }
    }
}

/// Serialize settings to RON format
pub fn serialize_to_ron(settings: &Settings) -> Result<String, ConfigError> {
    ron::ser::to_string_pretty(settings, PrettyConfig::default()).map_err(|e| {
        ConfigError::SerializationError(format!("Failed to serialize to RON: {}", e))
    })
}

/// Deserialize settings from RON format
pub fn deserialize_from_ron(ron_data: &str) -> Result<Settings, ConfigError> {
    ron::from_str(ron_data).map_err(|e| {
        ConfigError::SerializationError(format!("Failed to deserialize from RON: {}", e))
    })
}

/// Serialize settings to JSON format
pub fn serialize_to_json(settings: &Settings) -> Result<String, ConfigError> {
    Ok(serde_json::to_string_pretty(settings)?)
}

/// Deserialize settings from JSON format
pub fn deserialize_from_json(json_data: &str) -> Result<Settings, ConfigError> {
    Ok(serde_json::from_str(json_data)?)
}

pub fn serialize(settings: &Settings, format: ConfigFormat) -> Result<String, ConfigError> {
    match format {
        ConfigFormat::Ron => serialize_to_ron(settings),
        ConfigFormat::Json => serialize_to_json(settings),
    }
}

pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Settings, ConfigError> {
    match format {
        ConfigFormat::Ron => deserialize_from_ron(data),
        ConfigFormat::Json => deserialize_from_json(data),
    }
}
