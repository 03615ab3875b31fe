//! The managed media data abstraction.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio_media_data::AudioMediaData;
use crate::data_provider::FileDataProvider;
use crate::error::MediaResult;
use crate::media_data_manager::{MediaDataManager, WeakMediaDataManager};

/// State every media data entity carries: its manager and UID.
pub struct MediaDataCore {
    manager: WeakMediaDataManager,
    uid: Mutex<Option<String>>,
}

impl MediaDataCore {
    pub fn new(manager: &MediaDataManager) -> Self {
        Self {
            manager: manager.downgrade(),
            uid: Mutex::new(None),
        }
    }

    /// The owning manager, if it is still alive.
    pub fn manager(&self) -> Option<MediaDataManager> {
        self.manager.upgrade()
    }

    /// UID under which the entity is registered, if any.
    pub fn uid(&self) -> Option<String> {
        self.uid.lock().clone()
    }

    pub(crate) fn set_uid(&self, uid: Option<String>) {
        *self.uid.lock() = uid;
    }

    pub(crate) fn belongs_to(&self, manager: &MediaDataManager) -> bool {
        self.manager.points_to(manager)
    }
}

impl fmt::Debug for MediaDataCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDataCore")
            .field("uid", &self.uid())
            .finish()
    }
}

/// A logical media resource composed from data providers.
pub trait MediaData: Send + Sync + fmt::Debug {
    fn core(&self) -> &MediaDataCore;

    /// Type name used for factory lookups.
    fn type_name(&self) -> &'static str;

    /// Every provider this entity references.
    fn used_data_providers(&self) -> Vec<FileDataProvider>;

    /// Copies value and resources into a new entity registered with
    /// `destination`.
    fn copy_to(&self, destination: &MediaDataManager) -> MediaResult<Arc<dyn MediaData>>;

    /// True if `other` is of the same type and holds the same content.
    fn value_equals(&self, other: &dyn MediaData) -> MediaResult<bool>;

    fn as_audio(&self) -> Option<&AudioMediaData> {
        None
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn uid(&self) -> Option<String> {
        self.core().uid()
    }

    fn manager(&self) -> Option<MediaDataManager> {
        self.core().manager()
    }
}

/// Constructs an unregistered entity bound to a manager.
pub type MediaDataConstructor = fn(&MediaDataManager) -> Arc<dyn MediaData>;

/// Recovers the concrete audio entity behind a trait object.
pub fn downcast_audio(media: Arc<dyn MediaData>) -> Option<Arc<AudioMediaData>> {
    media.into_any().downcast::<AudioMediaData>().ok()
}

pub(crate) fn same_entity(a: &dyn MediaData, b: &dyn MediaData) -> bool {
    std::ptr::addr_eq(a, b)
}
