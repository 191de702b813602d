//! User configuration
//!
//! Stored as JSON at `<config dir>/matchday-gallery/config.json`. A missing
//! file means defaults; a file that exists but does not parse is an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::ingest::IngestLimits;
use crate::repo::Viewer;
use crate::state::selection::DEFAULT_DOWNLOAD_DELAY;

const APP_DIR: &str = "matchday-gallery";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Signed-in viewer; `None` browses read-only
    pub viewer_id: Option<String>,
    pub admin: bool,
    /// Catalog and payload location
    pub data_dir: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    pub download_delay_ms: u64,
    pub limits: IngestLimits,
    /// Fallback filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            viewer_id: None,
            admin: false,
            data_dir: None,
            download_dir: None,
            download_delay_ms: DEFAULT_DOWNLOAD_DELAY.as_millis() as u64,
            limits: IngestLimits::default(),
            log_level: "info".to_string(),
        }
    }
}

impl GalleryConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
    }

    /// Load from the default location
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
        })
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(crate::download::DirectoryDownloader::default_dir)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    /// `admin` only applies to a signed-in viewer
    pub fn viewer(&self) -> Viewer {
        let id = self
            .viewer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Viewer {
            admin: self.admin && id.is_some(),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GalleryConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, GalleryConfig::default());
        assert_eq!(config.download_delay(), Duration::from_millis(300));
        assert_eq!(config.viewer(), Viewer::anonymous());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "viewer_id": "coach", "admin": true, "limits": { "max_video_secs": 30 } }"#,
        )
        .unwrap();

        let config = GalleryConfig::load_from(&path).unwrap();
        assert_eq!(config.viewer(), Viewer::admin("coach"));
        assert_eq!(config.limits.max_video_secs, 30);
        assert_eq!(config.limits.max_width, 1920);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ viewer_id: ").unwrap();
        assert!(matches!(
            GalleryConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_blank_viewer_is_anonymous() {
        let config = GalleryConfig {
            viewer_id: Some("  ".into()),
            admin: true,
            ..GalleryConfig::default()
        };
        assert_eq!(config.viewer(), Viewer::anonymous());
    }
}
