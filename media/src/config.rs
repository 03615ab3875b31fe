//! Media scope configuration.
//!
//! Stored as YAML, for example:
//!
//! ```yaml
//! data_dir: Audio
//! default_format:
//!   channels: 1
//!   sample_rate: 22050
//!   bit_depth: 16
//! enforce_single_format: true
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use talkbook_audio::PcmFormatInfo;

use crate::data_provider_manager::DEFAULT_DATA_DIR;
use crate::error::{MediaError, MediaResult};

/// Settings applied when a media scope is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Data directory name, relative to the scope root.
    pub data_dir: String,

    /// Format given to new audio media data.
    pub default_format: PcmFormatInfo,

    /// Require every audio media data to use `default_format`.
    pub enforce_single_format: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
            default_format: PcmFormatInfo::default(),
            enforce_single_format: false,
        }
    }
}

impl MediaConfig {
    /// Parses a YAML document. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> MediaResult<Self> {
        let config: MediaConfig = serde_yaml::from_str(yaml)?;
        if config.data_dir.is_empty() {
            return Err(MediaError::Config("data_dir must not be empty".into()));
        }
        Ok(config)
    }

    /// Loads the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> MediaResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Writes the configuration to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> MediaResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
