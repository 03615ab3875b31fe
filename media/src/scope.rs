//! A document's media scope.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::MediaConfig;
use crate::data_provider_manager::DataProviderManager;
use crate::error::MediaResult;
use crate::media_data::MediaData;
use crate::media_data_manager::MediaDataManager;

/// The media owned by one document: a provider manager rooted at the
/// document directory and the media data manager built on it.
#[derive(Debug, Clone)]
pub struct MediaScope {
    data_providers: DataProviderManager,
    media_data: MediaDataManager,
}

impl MediaScope {
    /// Opens a scope rooted at `root` with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let data_providers = DataProviderManager::new(root);
        let media_data = MediaDataManager::new(data_providers.clone());
        Self {
            data_providers,
            media_data,
        }
    }

    /// Opens a scope rooted at `root` configured by `config`.
    pub fn open(root: impl Into<PathBuf>, config: &MediaConfig) -> MediaResult<Self> {
        let scope = Self::new(root);
        scope
            .data_providers
            .set_data_file_directory(&config.data_dir)?;
        scope
            .media_data
            .set_default_pcm_format(config.default_format)?;
        scope
            .media_data
            .set_enforce_single_pcm_format(config.enforce_single_format)?;
        debug!(
            "media: opened scope at {} (data dir {:?}, {})",
            scope.root().display(),
            config.data_dir,
            config.default_format
        );
        Ok(scope)
    }

    pub fn root(&self) -> &Path {
        self.data_providers.root()
    }

    pub fn data_providers(&self) -> &DataProviderManager {
        &self.data_providers
    }

    pub fn media_data(&self) -> &MediaDataManager {
        &self.media_data
    }

    /// Removes every provider no registered media data uses.
    pub fn remove_unused_data_providers(&self, delete: bool) -> MediaResult<Vec<String>> {
        self.media_data.remove_unused_data_providers(delete)
    }

    /// Copies the media data `uid` into `destination`.
    pub fn export_media_data(
        &self,
        uid: &str,
        destination: &MediaScope,
    ) -> MediaResult<Arc<dyn MediaData>> {
        self.media_data
            .export_media_data(uid, &destination.media_data)
    }
}
