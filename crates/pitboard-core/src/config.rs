use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::overlay::{Position, Size};

pub const APP_NAME: &str = "pitboard";
pub const CONFIG_FILE: &str = "config.json";

/// Smallest overlay window allowed, whatever the config file says.
pub const MIN_OVERLAY_SIZE: Size = Size {
    width: 400.0,
    height: 300.0,
};

/// Application settings, read once at startup.
/// Every field falls back to its default so a partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub app_name: String,
    /// Base document every overlay window loads, parameterized by query.
    /// A relative path names a bundled asset; an absolute URL (a dev server,
    /// say) is loaded as is.
    pub content_url: String,
    pub show_timeout_ms: u64,
    pub min_width: f64,
    pub min_height: f64,
    pub default_position: Position,
    pub positions_file: String,
    pub telemetry_update_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            content_url: "index.html".to_string(),
            show_timeout_ms: 1000,
            min_width: MIN_OVERLAY_SIZE.width,
            min_height: MIN_OVERLAY_SIZE.height,
            default_position: Position { x: 200.0, y: 200.0 },
            positions_file: "overlay-positions.json".to_string(),
            telemetry_update_interval_ms: 100,
        }
    }
}

impl AppConfig {
    /// `<config_dir>/pitboard/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Load the config at `path`. A missing file yields defaults silently,
    /// an unreadable or malformed one yields defaults with a warning.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Failed to read config, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Invalid config, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_default() -> Self {
        Self::default_path()
            .map(|path| Self::load(&path))
            .unwrap_or_default()
    }

    pub fn show_timeout(&self) -> Duration {
        Duration::from_millis(self.show_timeout_ms)
    }

    pub fn telemetry_update_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_update_interval_ms)
    }

    /// Size floor for overlay windows. Configured values can only raise it.
    pub fn min_size(&self) -> Size {
        Size {
            width: self.min_width,
            height: self.min_height,
        }
        .clamped(MIN_OVERLAY_SIZE)
    }

    /// `<config_dir>/<app_name>/<positions_file>`.
    pub fn positions_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(&self.app_name).join(&self.positions_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.json"));
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.show_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{ "showTimeoutMs": 250, "contentUrl": "http://localhost:5173/" }"#)
            .unwrap();

        let config = AppConfig::load(&path);
        assert_eq!(config.show_timeout_ms, 250);
        assert_eq!(config.content_url, "http://localhost:5173/");
        assert_eq!(config.min_size(), Size { width: 400.0, height: 300.0 });
        assert_eq!(config.positions_file, "overlay-positions.json");
    }

    #[test]
    fn configured_floor_cannot_go_below_minimum() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "minWidth": 100, "minHeight": 50 }"#).unwrap();
        assert_eq!(config.min_size(), MIN_OVERLAY_SIZE);

        let config: AppConfig =
            serde_json::from_str(r#"{ "minWidth": 640, "minHeight": 50 }"#).unwrap();
        assert_eq!(config.min_size(), Size { width: 640.0, height: 300.0 });
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(AppConfig::load(&path), AppConfig::default());
    }
}
