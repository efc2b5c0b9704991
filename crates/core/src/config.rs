use crate::controller::DEFAULT_CONTROLLER;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-system settings. Every field has a default, so a partial JSON document
/// (or `{}`) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SystemConfig {
    /// Controller used by method join points that do not name one.
    pub default_controller: String,
    /// Remove synthetic dispatch frames from exceptions rethrown to callers.
    pub hide_dispatch_frames: bool,
    /// Upper bound on cached throws join points; the cache is flushed when
    /// exceeded.
    pub throws_cache_limit: usize,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            default_controller: DEFAULT_CONTROLLER.to_string(),
            hide_dispatch_frames: true,
            throws_cache_limit: 1024,
            log_filter: None,
        }
    }
}

impl SystemConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SystemConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SystemConfig::default());
        assert_eq!(config.default_controller, DEFAULT_CONTROLLER);
        assert!(config.hide_dispatch_frames);
    }

    #[test]
    fn partial_document_overrides_only_named_fields() {
        let config =
            SystemConfig::from_json_str(r#"{"hide_dispatch_frames": false, "throws_cache_limit": 8}"#)
                .unwrap();
        assert!(!config.hide_dispatch_frames);
        assert_eq!(config.throws_cache_limit, 8);
        assert_eq!(config.default_controller, DEFAULT_CONTROLLER);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_controller": "reversed", "log_filter": "debug"}}"#).unwrap();
        let config = SystemConfig::from_path(file.path()).unwrap();
        assert_eq!(config.default_controller, "reversed");
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            SystemConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }
}
