//! Registry of the media data of one document scope.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use talkbook_audio::PcmFormatInfo;
use tracing::{debug, info};

use crate::audio_media_data::AudioMediaData;
use crate::codec::WAV_AUDIO_MEDIA_DATA;
use crate::data_provider::FileDataProvider;
use crate::data_provider_manager::DataProviderManager;
use crate::error::{MediaError, MediaResult};
use crate::events::{EventBus, MediaEvent, SubscriptionId};
use crate::media_data::{MediaData, MediaDataConstructor, downcast_audio, same_entity};

/// Owns every [`MediaData`] of a document scope and the PCM format policy.
///
/// Entities are keyed by manager-local UIDs (`md1`, `md2`, ...). When the
/// single-format policy is on, every registered audio entity has the
/// default format. `MediaDataManager` is a cheap handle; clones share the
/// same registry.
#[derive(Clone)]
pub struct MediaDataManager {
    shared: Arc<MediaShared>,
}

/// Non-owning reference to a [`MediaDataManager`].
#[derive(Clone)]
pub struct WeakMediaDataManager {
    inner: Weak<MediaShared>,
}

impl WeakMediaDataManager {
    pub fn upgrade(&self) -> Option<MediaDataManager> {
        self.inner.upgrade().map(|shared| MediaDataManager { shared })
    }

    pub(crate) fn points_to(&self, manager: &MediaDataManager) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&manager.shared))
    }
}

struct MediaShared {
    data_providers: DataProviderManager,
    events: EventBus,
    state: Mutex<MediaState>,
}

struct MediaState {
    media: BTreeMap<String, Arc<dyn MediaData>>,
    uid_counter: u64,
    default_format: PcmFormatInfo,
    enforce_single_format: bool,
    factories: BTreeMap<String, MediaDataConstructor>,
}

impl MediaState {
    fn next_uid(&mut self) -> String {
        loop {
            self.uid_counter += 1;
            let uid = format!("md{}", self.uid_counter);
            if !self.media.contains_key(&uid) {
                return uid;
            }
        }
    }

    fn uid_of(&self, media: &dyn MediaData) -> Option<String> {
        self.media
            .iter()
            .find(|(_, m)| same_entity(m.as_ref(), media))
            .map(|(uid, _)| uid.clone())
    }
}

impl MediaDataManager {
    /// Creates a manager storing its data through `data_providers`.
    pub fn new(data_providers: DataProviderManager) -> Self {
        let mut factories: BTreeMap<String, MediaDataConstructor> = BTreeMap::new();
        factories.insert(WAV_AUDIO_MEDIA_DATA.to_string(), AudioMediaData::create);
        Self {
            shared: Arc::new(MediaShared {
                data_providers,
                events: EventBus::new(),
                state: Mutex::new(MediaState {
                    media: BTreeMap::new(),
                    uid_counter: 0,
                    default_format: PcmFormatInfo::default(),
                    enforce_single_format: false,
                    factories,
                }),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakMediaDataManager {
        WeakMediaDataManager {
            inner: Arc::downgrade(&self.shared),
        }
    }

    /// True if both handles refer to the same manager.
    pub fn ptr_eq(&self, other: &MediaDataManager) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// The provider manager backing this scope's media.
    pub fn data_providers(&self) -> &DataProviderManager {
        &self.shared.data_providers
    }

    /// The bus carrying this scope's change notifications.
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Registers a handler for every change notification of this scope.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(handler)
    }

    /// Makes `type_name` constructible through [`create_media_data`].
    ///
    /// [`create_media_data`]: MediaDataManager::create_media_data
    pub fn register_media_data_type(&self, type_name: &str, constructor: MediaDataConstructor) {
        self.shared
            .state
            .lock()
            .factories
            .insert(type_name.to_string(), constructor);
    }

    /// Constructs and registers a new entity of the named type.
    pub fn create_media_data(&self, type_name: &str) -> MediaResult<Arc<dyn MediaData>> {
        let constructor = self
            .shared
            .state
            .lock()
            .factories
            .get(type_name)
            .copied()
            .ok_or_else(|| MediaError::Factory(format!("media data type {type_name:?}")))?;
        let media = constructor(self);
        self.add_media_data(&media, None)?;
        Ok(media)
    }

    /// Constructs and registers a new WAVE-backed audio entity.
    pub fn create_audio_media_data(&self) -> MediaResult<Arc<AudioMediaData>> {
        let media = self.create_media_data(WAV_AUDIO_MEDIA_DATA)?;
        downcast_audio(media).ok_or_else(|| {
            MediaError::Factory(format!("{WAV_AUDIO_MEDIA_DATA} is not audio media data"))
        })
    }

    /// Registers `media`, under `uid` or a generated UID.
    pub fn add_media_data(
        &self,
        media: &Arc<dyn MediaData>,
        uid: Option<&str>,
    ) -> MediaResult<String> {
        if !media.core().belongs_to(self) {
            return Err(MediaError::NotManagerOf(format!(
                "{} created by another manager",
                media.type_name()
            )));
        }
        let audio_format = media.as_audio().map(AudioMediaData::pcm_format);

        let uid = {
            let mut state = self.shared.state.lock();
            if let Some(existing) = state.uid_of(media.as_ref()) {
                return Err(MediaError::AlreadyManagerOf(existing));
            }
            if let Some(format) = audio_format {
                check_format(&state, &format)?;
            }
            let uid = match uid {
                Some("") => {
                    return Err(MediaError::InvalidArgument("empty media data uid".into()));
                }
                Some(uid) if state.media.contains_key(uid) => {
                    return Err(MediaError::AlreadyManagerOf(uid.to_string()));
                }
                Some(uid) => uid.to_string(),
                None => state.next_uid(),
            };
            media.core().set_uid(Some(uid.clone()));
            state.media.insert(uid.clone(), Arc::clone(media));
            uid
        };
        debug!("media: added {} {}", media.type_name(), uid);
        self.shared
            .events
            .publish(&MediaEvent::MediaDataAdded { uid: uid.clone() });
        Ok(uid)
    }

    /// Re-keys a registered entity.
    pub fn set_media_data_uid(&self, media: &dyn MediaData, uid: &str) -> MediaResult<()> {
        if uid.is_empty() {
            return Err(MediaError::InvalidArgument("empty media data uid".into()));
        }
        let mut state = self.shared.state.lock();
        let current = state.uid_of(media).ok_or_else(|| {
            MediaError::NotManagerOf(format!("unregistered {}", media.type_name()))
        })?;
        if current == uid {
            return Ok(());
        }
        if state.media.contains_key(uid) {
            return Err(MediaError::AlreadyManagerOf(uid.to_string()));
        }
        if let Some(entry) = state.media.remove(&current) {
            entry.core().set_uid(Some(uid.to_string()));
            state.media.insert(uid.to_string(), entry);
        }
        Ok(())
    }

    /// Deregisters the entity `uid`.
    ///
    /// Its providers stay registered until the next unused-provider sweep.
    pub fn remove_media_data(&self, uid: &str) -> MediaResult<Arc<dyn MediaData>> {
        let media = self
            .shared
            .state
            .lock()
            .media
            .remove(uid)
            .ok_or_else(|| MediaError::NotFound(format!("media data {uid}")))?;
        media.core().set_uid(None);
        debug!("media: removed {} {}", media.type_name(), uid);
        self.shared
            .events
            .publish(&MediaEvent::MediaDataRemoved { uid: uid.to_string() });
        Ok(media)
    }

    /// Looks up an entity by UID.
    pub fn media_data(&self, uid: &str) -> MediaResult<Arc<dyn MediaData>> {
        self.shared
            .state
            .lock()
            .media
            .get(uid)
            .cloned()
            .ok_or_else(|| MediaError::NotFound(format!("media data {uid}")))
    }

    /// Looks up an audio entity by UID.
    pub fn audio_media_data(&self, uid: &str) -> MediaResult<Arc<AudioMediaData>> {
        let media = self.media_data(uid)?;
        downcast_audio(media)
            .ok_or_else(|| MediaError::InvalidArgument(format!("{uid} is not audio media data")))
    }

    /// True if an entity is registered under `uid`.
    pub fn is_manager_of(&self, uid: &str) -> bool {
        self.shared.state.lock().media.contains_key(uid)
    }

    /// UIDs of all registered entities, in order.
    pub fn uids(&self) -> Vec<String> {
        self.shared.state.lock().media.keys().cloned().collect()
    }

    /// All registered entities, ordered by UID.
    pub fn media(&self) -> Vec<Arc<dyn MediaData>> {
        self.shared.state.lock().media.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().media.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Format given to new audio entities.
    pub fn default_pcm_format(&self) -> PcmFormatInfo {
        self.shared.state.lock().default_format
    }

    /// True when every audio entity must use the default format.
    pub fn enforce_single_pcm_format(&self) -> bool {
        self.shared.state.lock().enforce_single_format
    }

    /// Changes the default format.
    ///
    /// With the single-format policy on, fails unless every registered audio
    /// entity already has `format`.
    pub fn set_default_pcm_format(&self, format: PcmFormatInfo) -> MediaResult<()> {
        if self.enforce_single_pcm_format() {
            self.check_all_audio(&format)?;
        }
        self.shared.state.lock().default_format = format;
        Ok(())
    }

    /// Turns the single-format policy on or off.
    ///
    /// Turning it on fails unless every registered audio entity has the
    /// default format.
    pub fn set_enforce_single_pcm_format(&self, enforce: bool) -> MediaResult<()> {
        if enforce {
            let default = self.default_pcm_format();
            self.check_all_audio(&default)?;
        }
        self.shared.state.lock().enforce_single_format = enforce;
        Ok(())
    }

    fn check_all_audio(&self, format: &PcmFormatInfo) -> MediaResult<()> {
        for media in self.media() {
            if let Some(audio) = media.as_audio() {
                let current = audio.pcm_format();
                if current != *format {
                    return Err(MediaError::InvalidFormat(format!(
                        "{} has format {current}, expected {format}",
                        media.uid().unwrap_or_default()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Fails if the single-format policy forbids `format`.
    pub(crate) fn check_pcm_format(&self, format: &PcmFormatInfo) -> MediaResult<()> {
        check_format(&self.shared.state.lock(), format)
    }

    /// Every provider used by a registered entity, without duplicates.
    pub fn used_data_providers(&self) -> Vec<FileDataProvider> {
        let mut seen = HashSet::new();
        let mut used = Vec::new();
        for media in self.media() {
            for provider in media.used_data_providers() {
                if seen.insert(provider.id()) {
                    used.push(provider);
                }
            }
        }
        used
    }

    /// Copies the entity `uid` into a new entity of this manager.
    ///
    /// A UID this manager does not hold is `NotManagerOf`.
    pub fn copy_media_data(&self, uid: &str) -> MediaResult<Arc<dyn MediaData>> {
        let media = self
            .shared
            .state
            .lock()
            .media
            .get(uid)
            .cloned()
            .ok_or_else(|| MediaError::NotManagerOf(format!("media data {uid}")))?;
        media.copy_to(self)
    }

    /// Copies a registered entity into a new entity of this manager.
    pub fn copy_media_data_ref(&self, media: &dyn MediaData) -> MediaResult<Arc<dyn MediaData>> {
        if self.shared.state.lock().uid_of(media).is_none() {
            return Err(MediaError::NotManagerOf(format!(
                "unregistered {}",
                media.type_name()
            )));
        }
        media.copy_to(self)
    }

    /// Copies the entity `uid` into `destination`, re-homing its data in
    /// the destination's provider manager.
    pub fn export_media_data(
        &self,
        uid: &str,
        destination: &MediaDataManager,
    ) -> MediaResult<Arc<dyn MediaData>> {
        let media = self.media_data(uid)?;
        let exported = media.copy_to(destination)?;
        info!(
            "media: exported {} as {}",
            uid,
            exported.uid().unwrap_or_default()
        );
        Ok(exported)
    }

    /// Removes every provider no registered entity uses.
    pub fn remove_unused_data_providers(&self, delete: bool) -> MediaResult<Vec<String>> {
        self.shared
            .data_providers
            .remove_unused_data_providers(self, delete)
    }
}

fn check_format(state: &MediaState, format: &PcmFormatInfo) -> MediaResult<()> {
    if state.enforce_single_format && *format != state.default_format {
        return Err(MediaError::InvalidFormat(format!(
            "{format} differs from the enforced format {}",
            state.default_format
        )));
    }
    Ok(())
}

impl fmt::Debug for MediaDataManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("MediaDataManager")
            .field("media", &state.media.len())
            .field("default_format", &state.default_format)
            .field("enforce_single_format", &state.enforce_single_format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_data::MediaDataCore;
    use std::any::Any;
    use std::time::Duration;
    use tempfile::TempDir;

    fn manager() -> (TempDir, MediaDataManager) {
        let dir = TempDir::new().unwrap();
        let manager = MediaDataManager::new(DataProviderManager::new(dir.path()));
        (dir, manager)
    }

    #[derive(Debug)]
    struct Note {
        core: MediaDataCore,
    }

    impl MediaData for Note {
        fn core(&self) -> &MediaDataCore {
            &self.core
        }

        fn type_name(&self) -> &'static str {
            "Note"
        }

        fn used_data_providers(&self) -> Vec<FileDataProvider> {
            Vec::new()
        }

        fn copy_to(&self, destination: &MediaDataManager) -> MediaResult<Arc<dyn MediaData>> {
            destination.create_media_data("Note")
        }

        fn value_equals(&self, other: &dyn MediaData) -> MediaResult<bool> {
            Ok(other.type_name() == "Note")
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    fn new_note(manager: &MediaDataManager) -> Arc<dyn MediaData> {
        Arc::new(Note {
            core: MediaDataCore::new(manager),
        })
    }

    #[test]
    fn test_create_and_lookup() {
        let (_dir, manager) = manager();
        let audio = manager.create_audio_media_data().unwrap();
        assert_eq!(audio.uid().as_deref(), Some("md1"));
        assert!(manager.is_manager_of("md1"));
        assert!(manager.audio_media_data("md1").is_ok());
        assert_eq!(audio.pcm_format(), manager.default_pcm_format());
        assert!(matches!(
            manager.media_data("md2"),
            Err(MediaError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_type() {
        let (_dir, manager) = manager();
        assert!(matches!(
            manager.create_media_data("VideoMediaData"),
            Err(MediaError::Factory(_))
        ));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_register_media_data_type() {
        let (_dir, manager) = manager();
        manager.register_media_data_type("Note", new_note);
        let note = manager.create_media_data("Note").unwrap();
        assert_eq!(note.type_name(), "Note");
        assert!(note.as_audio().is_none());
        assert!(matches!(
            manager.audio_media_data(&note.uid().unwrap()),
            Err(MediaError::InvalidArgument(_))
        ));

        let copy = manager.copy_media_data_ref(note.as_ref()).unwrap();
        assert_ne!(copy.uid(), note.uid());
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_media_data_checks() {
        let (_other_dir, other) = manager();
        let (_dir, manager) = manager();

        let media = new_note(&manager);
        assert_eq!(manager.add_media_data(&media, None).unwrap(), "md1");
        assert!(matches!(
            manager.add_media_data(&media, None),
            Err(MediaError::AlreadyManagerOf(_))
        ));

        let second = new_note(&manager);
        assert!(matches!(
            manager.add_media_data(&second, Some("md1")),
            Err(MediaError::AlreadyManagerOf(_))
        ));
        assert!(matches!(
            manager.add_media_data(&second, Some("")),
            Err(MediaError::InvalidArgument(_))
        ));
        assert!(matches!(
            other.add_media_data(&second, None),
            Err(MediaError::NotManagerOf(_))
        ));
        assert_eq!(manager.add_media_data(&second, Some("custom")).unwrap(), "custom");
    }

    #[test]
    fn test_uid_regenerated_on_collision() {
        let (_dir, manager) = manager();
        let a = new_note(&manager);
        manager.add_media_data(&a, Some("md1")).unwrap();
        let b = new_note(&manager);
        assert_eq!(manager.add_media_data(&b, None).unwrap(), "md2");
    }

    #[test]
    fn test_set_media_data_uid() {
        let (_dir, manager) = manager();
        let a = manager.create_audio_media_data().unwrap();
        let b = manager.create_audio_media_data().unwrap();
        assert!(matches!(
            manager.set_media_data_uid(a.as_ref(), "md2"),
            Err(MediaError::AlreadyManagerOf(_))
        ));
        manager.set_media_data_uid(a.as_ref(), "intro").unwrap();
        assert_eq!(a.uid().as_deref(), Some("intro"));
        assert!(!manager.is_manager_of("md1"));
        assert!(manager.is_manager_of("intro"));
        assert_eq!(b.uid().as_deref(), Some("md2"));
    }

    #[test]
    fn test_remove_media_data() {
        let (_dir, manager) = manager();
        let audio = manager.create_audio_media_data().unwrap();
        let removed = manager.remove_media_data("md1").unwrap();
        assert!(removed.uid().is_none());
        assert!(audio.uid().is_none());
        assert!(manager.is_empty());
        assert!(matches!(
            manager.remove_media_data("md1"),
            Err(MediaError::NotFound(_))
        ));
    }

    #[test]
    fn test_events() {
        let (_dir, manager) = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.subscribe(move |e| sink.lock().push(e.clone()));

        manager.create_audio_media_data().unwrap();
        manager.remove_media_data("md1").unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                MediaEvent::MediaDataAdded { uid: "md1".into() },
                MediaEvent::MediaDataRemoved { uid: "md1".into() },
            ]
        );
    }

    #[test]
    fn test_single_format_enforcement() {
        let (_dir, manager) = manager();
        let stereo = PcmFormatInfo::STEREO_44K;
        manager.create_audio_media_data().unwrap();

        let odd = AudioMediaData::new(&manager);
        odd.set_pcm_format(stereo).unwrap();
        let odd: Arc<dyn MediaData> = Arc::new(odd);

        manager.set_enforce_single_pcm_format(true).unwrap();
        assert!(matches!(
            manager.add_media_data(&odd, None),
            Err(MediaError::InvalidFormat(_))
        ));
        assert_eq!(manager.len(), 1);

        manager.set_enforce_single_pcm_format(false).unwrap();
        let uid = manager.add_media_data(&odd, None).unwrap();

        assert!(matches!(
            manager.set_enforce_single_pcm_format(true),
            Err(MediaError::InvalidFormat(_))
        ));
        assert!(!manager.enforce_single_pcm_format());

        manager.remove_media_data(&uid).unwrap();
        manager.set_enforce_single_pcm_format(true).unwrap();
        assert!(manager.enforce_single_pcm_format());
    }

    #[test]
    fn test_default_format_change_is_all_or_nothing() {
        let (_dir, manager) = manager();
        let audio = manager.create_audio_media_data().unwrap();
        manager.set_enforce_single_pcm_format(true).unwrap();

        assert!(matches!(
            manager.set_default_pcm_format(PcmFormatInfo::MONO_48K),
            Err(MediaError::InvalidFormat(_))
        ));
        assert_eq!(manager.default_pcm_format(), PcmFormatInfo::MONO_44K);
        assert!(matches!(
            audio.set_pcm_format(PcmFormatInfo::MONO_48K),
            Err(MediaError::InvalidFormat(_))
        ));

        manager.set_enforce_single_pcm_format(false).unwrap();
        manager.set_default_pcm_format(PcmFormatInfo::MONO_48K).unwrap();
        audio.set_pcm_format(PcmFormatInfo::MONO_48K).unwrap();
        manager.set_enforce_single_pcm_format(true).unwrap();
    }

    #[test]
    fn test_copy_media_data_rejects_unheld_uid() {
        let (_other_dir, other) = manager();
        let (_dir, manager) = manager();
        other.create_audio_media_data().unwrap();
        assert!(matches!(
            manager.copy_media_data("md1"),
            Err(MediaError::NotManagerOf(_))
        ));
        assert!(matches!(
            manager.copy_media_data("missing"),
            Err(MediaError::NotManagerOf(_))
        ));

        manager.create_audio_media_data().unwrap();
        let copy = manager.copy_media_data("md1").unwrap();
        assert_eq!(copy.uid().as_deref(), Some("md2"));
    }

    #[test]
    fn test_used_data_providers_deduplicates() {
        let (_dir, manager) = manager();
        let audio = manager.create_audio_media_data().unwrap();
        let format = audio.pcm_format();
        audio
            .append(&mut format.silence(Duration::from_millis(10)), Duration::from_millis(10))
            .unwrap();
        let copy = manager.copy_media_data("md1").unwrap();
        let used = manager.used_data_providers();
        assert_eq!(used.len(), 2);
        assert_eq!(copy.used_data_providers().len(), 1);
    }
}
