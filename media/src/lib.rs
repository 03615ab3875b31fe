//! Managed media storage for talking-book documents.
//!
//! Bulk audio is kept outside the document tree in per-document data files,
//! addressed by manager-scoped UIDs:
//!
//! - [`DataProviderManager`] owns the [`FileDataProvider`]s of a scope, one
//!   file each under the data directory
//! - [`MediaDataManager`] owns the [`MediaData`] entities and the PCM format
//!   policy
//! - [`AudioMediaData`] implements time-domain edits (insert, remove, split,
//!   merge) on top of immutable WAVE files
//! - [`MediaScope`] ties the two managers to a document directory
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use talkbook_media::{MediaConfig, MediaScope};
//!
//! # fn main() -> talkbook_media::MediaResult<()> {
//! let scope = MediaScope::open("book", &MediaConfig::default())?;
//! let audio = scope.media_data().create_audio_media_data()?;
//! audio.append_from_riff_wave_file("chapter1.wav")?;
//!
//! let rest = audio.split(Duration::from_secs(30))?;
//! audio.merge_with(&rest)?;
//! scope.remove_unused_data_providers(true)?;
//! # Ok(())
//! # }
//! ```

pub mod audio_media_data;
pub mod codec;
pub mod config;
pub mod data_provider;
pub mod data_provider_manager;
pub mod error;
pub mod events;
pub mod io;
pub mod media_data;
pub mod media_data_manager;
pub mod mime;
pub mod scope;

pub use audio_media_data::{AudioDataReader, AudioMediaData};
pub use codec::{PcmCodec, WavCodec};
pub use config::MediaConfig;
pub use data_provider::{FileDataProvider, ProviderReader, ProviderWriter};
pub use data_provider_manager::DataProviderManager;
pub use error::{MediaError, MediaResult};
pub use events::{EventBus, MediaEvent, SubscriptionId};
pub use media_data::{MediaData, MediaDataConstructor, MediaDataCore, downcast_audio};
pub use media_data_manager::{MediaDataManager, WeakMediaDataManager};
pub use scope::MediaScope;

pub use talkbook_audio::PcmFormatInfo;
