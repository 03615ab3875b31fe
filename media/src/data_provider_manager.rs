//! Registry of the data providers of one document scope.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data_provider::FileDataProvider;
use crate::error::{MediaError, MediaResult};
use crate::media_data_manager::MediaDataManager;
use crate::mime;

/// Name of the data directory when none is configured.
pub const DEFAULT_DATA_DIR: &str = "Data";

/// Type name of [`FileDataProvider`] for factory lookups.
pub const FILE_DATA_PROVIDER_TYPE: &str = "FileDataProvider";

/// Owns every [`FileDataProvider`] of a document scope.
///
/// Providers are keyed by manager-local UIDs (`dp1`, `dp2`, ...). Their files
/// live in a data directory relative to the scope root. `DataProviderManager`
/// is a cheap handle; clones share the same registry.
#[derive(Clone)]
pub struct DataProviderManager {
    shared: Arc<ManagerShared>,
}

pub(crate) struct ManagerShared {
    root: PathBuf,
    data_dir: RwLock<Option<String>>,
    registry: Mutex<Registry>,
}

#[derive(Default)]
struct Registry {
    providers: BTreeMap<String, FileDataProvider>,
    uid_counter: u64,
    // Every relative path ever handed out, so paths are never reused.
    issued_paths: HashSet<String>,
}

impl Registry {
    fn next_uid(&mut self) -> String {
        loop {
            self.uid_counter += 1;
            let uid = format!("dp{}", self.uid_counter);
            if !self.providers.contains_key(&uid) {
                return uid;
            }
        }
    }

    fn position_of(&self, provider: &FileDataProvider) -> Option<String> {
        self.providers
            .iter()
            .find(|(_, p)| p.ptr_eq(provider))
            .map(|(uid, _)| uid.clone())
    }
}

impl ManagerShared {
    pub(crate) fn data_dir_path(&self) -> PathBuf {
        self.root.join(self.data_dir_name())
    }

    fn data_dir_name(&self) -> String {
        if let Some(name) = self.data_dir.read().as_ref() {
            return name.clone();
        }
        let mut dir = self.data_dir.write();
        dir.get_or_insert_with(|| DEFAULT_DATA_DIR.to_string()).clone()
    }
}

impl DataProviderManager {
    /// Creates a manager whose data directory lives under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                root: root.into(),
                data_dir: RwLock::new(None),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<ManagerShared>) -> Self {
        Self { shared }
    }

    /// True if both handles refer to the same manager.
    pub fn ptr_eq(&self, other: &DataProviderManager) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Root directory of the document scope.
    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// Name of the data directory, relative to the root.
    ///
    /// Falls back to [`DEFAULT_DATA_DIR`] on first use when none was set.
    pub fn data_file_directory(&self) -> String {
        self.shared.data_dir_name()
    }

    /// Absolute path of the data directory.
    pub fn data_file_directory_path(&self) -> PathBuf {
        self.shared.data_dir_path()
    }

    /// Sets the data directory name. Can only be done once, before the
    /// directory is first used.
    pub fn set_data_file_directory(&self, name: &str) -> MediaResult<()> {
        validate_dir_name(name)?;
        let mut dir = self.shared.data_dir.write();
        if let Some(current) = dir.as_ref() {
            return Err(MediaError::AlreadyInitialized(format!(
                "data file directory is already {current:?}"
            )));
        }
        *dir = Some(name.to_string());
        Ok(())
    }

    /// Creates and registers a provider for a fresh data file.
    ///
    /// The file name is random with an extension derived from `mime_type`;
    /// it never collides with a managed path or a file already on disk.
    pub fn create_file_data_provider(&self, mime_type: &str) -> MediaResult<FileDataProvider> {
        if mime_type.is_empty() {
            return Err(MediaError::InvalidArgument("empty MIME type".into()));
        }
        let data_dir = self.data_file_directory_path();
        let ext = mime::extension_for(mime_type);

        let mut registry = self.shared.registry.lock();
        let relative_path = loop {
            let name = format!("{}{}", Uuid::new_v4().simple(), ext);
            if !registry.issued_paths.contains(&name) && !data_dir.join(&name).exists() {
                break name;
            }
        };
        registry.issued_paths.insert(relative_path.clone());

        let provider = FileDataProvider::new(
            Arc::downgrade(&self.shared),
            mime_type,
            relative_path,
            false,
        );
        let uid = registry.next_uid();
        provider.set_uid(Some(uid.clone()));
        registry.providers.insert(uid.clone(), provider.clone());
        debug!(
            "media: created data provider {} at {}",
            uid,
            provider.relative_path()
        );
        Ok(provider)
    }

    /// Creates a provider from its type name.
    pub fn create_data_provider(
        &self,
        type_name: &str,
        mime_type: &str,
    ) -> MediaResult<FileDataProvider> {
        match type_name {
            FILE_DATA_PROVIDER_TYPE => self.create_file_data_provider(mime_type),
            other => Err(MediaError::Factory(format!("data provider type {other:?}"))),
        }
    }

    /// Re-creates the entry of a provider whose file already exists, as
    /// recorded by a persisted document.
    pub fn restore_file_data_provider(
        &self,
        uid: &str,
        mime_type: &str,
        relative_path: &str,
    ) -> MediaResult<FileDataProvider> {
        if uid.is_empty() {
            return Err(MediaError::InvalidArgument("empty data provider uid".into()));
        }
        validate_relative_path(relative_path)?;

        let mut registry = self.shared.registry.lock();
        if registry.providers.contains_key(uid) {
            return Err(MediaError::AlreadyManagerOf(uid.to_string()));
        }
        if registry
            .providers
            .values()
            .any(|p| p.relative_path() == relative_path)
        {
            return Err(MediaError::AlreadyManagerOf(relative_path.to_string()));
        }
        registry.issued_paths.insert(relative_path.to_string());

        let provider = FileDataProvider::new(
            Arc::downgrade(&self.shared),
            mime_type,
            relative_path.to_string(),
            true,
        );
        provider.set_uid(Some(uid.to_string()));
        registry.providers.insert(uid.to_string(), provider.clone());
        Ok(provider)
    }

    /// Registers `provider`, under `uid` or a generated UID.
    ///
    /// The provider must have been created by this manager and must not be
    /// registered already.
    pub fn add_data_provider(
        &self,
        provider: &FileDataProvider,
        uid: Option<&str>,
    ) -> MediaResult<String> {
        if !provider.belongs_to(&self.shared) {
            return Err(MediaError::NotManagerOf(format!(
                "data provider {}",
                provider.relative_path()
            )));
        }
        let mut registry = self.shared.registry.lock();
        if let Some(existing) = registry.position_of(provider) {
            return Err(MediaError::AlreadyManagerOf(existing));
        }
        let uid = match uid {
            Some("") => {
                return Err(MediaError::InvalidArgument("empty data provider uid".into()));
            }
            Some(uid) if registry.providers.contains_key(uid) => {
                return Err(MediaError::AlreadyManagerOf(uid.to_string()));
            }
            Some(uid) => uid.to_string(),
            None => registry.next_uid(),
        };
        registry.issued_paths.insert(provider.relative_path().to_string());
        provider.set_uid(Some(uid.clone()));
        registry.providers.insert(uid.clone(), provider.clone());
        Ok(uid)
    }

    /// Deregisters the provider `uid`, deleting its file if `delete` is set.
    pub fn remove_data_provider(&self, uid: &str, delete: bool) -> MediaResult<FileDataProvider> {
        let provider = self.data_provider(uid)?;
        self.remove_data_provider_ref(&provider, delete)?;
        Ok(provider)
    }

    /// Deregisters `provider`, deleting its file if `delete` is set.
    pub fn remove_data_provider_ref(
        &self,
        provider: &FileDataProvider,
        delete: bool,
    ) -> MediaResult<()> {
        if self.shared.registry.lock().position_of(provider).is_none() {
            return Err(MediaError::NotManagerOf(format!(
                "data provider {}",
                provider.relative_path()
            )));
        }
        if delete {
            provider.delete()
        } else {
            self.detach(provider);
            Ok(())
        }
    }

    pub(crate) fn detach(&self, provider: &FileDataProvider) {
        let mut registry = self.shared.registry.lock();
        if let Some(uid) = registry.position_of(provider) {
            registry.providers.remove(&uid);
            debug!("media: removed data provider {}", uid);
        }
        provider.set_uid(None);
    }

    /// Looks up a provider by UID.
    pub fn data_provider(&self, uid: &str) -> MediaResult<FileDataProvider> {
        self.shared
            .registry
            .lock()
            .providers
            .get(uid)
            .cloned()
            .ok_or_else(|| MediaError::NotFound(format!("data provider {uid}")))
    }

    /// True if a provider is registered under `uid`.
    pub fn is_manager_of(&self, uid: &str) -> bool {
        self.shared.registry.lock().providers.contains_key(uid)
    }

    /// UIDs of all registered providers, in order.
    pub fn uids(&self) -> Vec<String> {
        self.shared.registry.lock().providers.keys().cloned().collect()
    }

    /// All registered providers, ordered by UID.
    pub fn data_providers(&self) -> Vec<FileDataProvider> {
        self.shared.registry.lock().providers.values().cloned().collect()
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.shared.registry.lock().providers.len()
    }

    /// True if no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every provider not used by a media data entity registered
    /// with `media`. Returns the UIDs removed.
    ///
    /// When `delete` is set all candidates must be idle; otherwise nothing
    /// is removed.
    pub fn remove_unused_data_providers(
        &self,
        media: &MediaDataManager,
        delete: bool,
    ) -> MediaResult<Vec<String>> {
        let used: HashSet<usize> = media
            .used_data_providers()
            .iter()
            .map(FileDataProvider::id)
            .collect();
        let unused: Vec<FileDataProvider> = self
            .data_providers()
            .into_iter()
            .filter(|p| !used.contains(&p.id()))
            .collect();

        if delete {
            for provider in &unused {
                provider.check_idle()?;
            }
        }

        let mut removed = Vec::with_capacity(unused.len());
        for provider in unused {
            let uid = provider.uid();
            if delete {
                provider.delete()?;
            } else {
                self.detach(&provider);
            }
            removed.extend(uid);
        }
        if !removed.is_empty() {
            info!(
                "media: removed {} unused data providers (delete={})",
                removed.len(),
                delete
            );
        }
        Ok(removed)
    }

    /// Moves every data file to the directory `new_dir` under the root.
    ///
    /// Every provider must be idle. Existing destination files are only
    /// replaced when `overwrite` is set. Source files are removed afterwards
    /// when `delete_source` is set.
    pub fn move_data_files(
        &self,
        new_dir: &str,
        delete_source: bool,
        overwrite: bool,
    ) -> MediaResult<()> {
        validate_dir_name(new_dir)?;
        let old_dir = self.data_file_directory();
        if old_dir == new_dir {
            return Err(MediaError::InvalidArgument(format!(
                "data files are already in {new_dir:?}"
            )));
        }
        let old_path = self.shared.root.join(&old_dir);
        let new_path = self.shared.root.join(new_dir);

        let providers = self.data_providers();
        let mut moves = Vec::with_capacity(providers.len());
        for provider in &providers {
            provider.check_idle()?;
            let source = old_path.join(provider.relative_path());
            let destination = new_path.join(provider.relative_path());
            if !source.exists() {
                if provider.is_initialized() {
                    return Err(MediaError::DataMissing(source));
                }
                continue;
            }
            if destination.exists() && !overwrite {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} already exists", destination.display()),
                )
                .into());
            }
            moves.push((source, destination));
        }

        fs::create_dir_all(&new_path)?;
        for (source, destination) in &moves {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(source, destination)?;
        }
        *self.shared.data_dir.write() = Some(new_dir.to_string());

        if delete_source {
            for (source, _) in &moves {
                if let Err(e) = fs::remove_file(source) {
                    warn!("media: failed to remove {}: {}", source.display(), e);
                }
            }
            // Only succeeds when nothing else lives there.
            let _ = fs::remove_dir(&old_path);
        }
        info!(
            "media: moved {} data files from {:?} to {:?}",
            moves.len(),
            old_dir,
            new_dir
        );
        Ok(())
    }
}

impl fmt::Debug for DataProviderManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataProviderManager")
            .field("root", &self.shared.root)
            .field("data_dir", &*self.shared.data_dir.read())
            .field("providers", &self.len())
            .finish()
    }
}

fn validate_dir_name(name: &str) -> MediaResult<()> {
    if name.is_empty() {
        return Err(MediaError::InvalidArgument("empty data directory name".into()));
    }
    validate_relative_path(name)
}

fn validate_relative_path(path: &str) -> MediaResult<()> {
    let p = Path::new(path);
    let escapes = p.components().any(|c| matches!(c, Component::ParentDir));
    if path.is_empty() || p.is_absolute() || escapes {
        return Err(MediaError::InvalidArgument(format!(
            "{path:?} is not a relative path inside the scope"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::TempDir;

    fn manager() -> (TempDir, DataProviderManager) {
        let dir = TempDir::new().unwrap();
        let manager = DataProviderManager::new(dir.path());
        (dir, manager)
    }

    fn write_all(provider: &FileDataProvider, bytes: &[u8]) {
        let mut out = provider.output_stream().unwrap();
        out.write_all(bytes).unwrap();
    }

    #[test]
    fn test_generated_paths_follow_mime_table() {
        let (_dir, manager) = manager();
        let wav = manager.create_file_data_provider("audio/x-wav").unwrap();
        assert!(wav.relative_path().ends_with(".wav"));
        let unknown = manager.create_file_data_provider("application/x-foo").unwrap();
        assert!(unknown.relative_path().ends_with(".bin"));
        assert_ne!(wav.relative_path(), unknown.relative_path());
    }

    #[test]
    fn test_uids_are_monotonic() {
        let (_dir, manager) = manager();
        let a = manager.create_file_data_provider("text/plain").unwrap();
        let b = manager.create_file_data_provider("text/plain").unwrap();
        assert_eq!(a.uid().as_deref(), Some("dp1"));
        assert_eq!(b.uid().as_deref(), Some("dp2"));
        assert_eq!(manager.uids(), vec!["dp1".to_string(), "dp2".to_string()]);
    }

    #[test]
    fn test_uid_regenerated_on_collision() {
        let (_dir, manager) = manager();
        let a = manager.create_file_data_provider("text/plain").unwrap();
        manager.remove_data_provider("dp1", false).unwrap();
        manager.add_data_provider(&a, Some("dp2")).unwrap();

        let b = manager.create_file_data_provider("text/plain").unwrap();
        assert_eq!(b.uid().as_deref(), Some("dp3"));
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let (_dir, manager) = manager();
        let a = manager.create_file_data_provider("text/plain").unwrap();
        assert!(matches!(
            manager.add_data_provider(&a, None),
            Err(MediaError::AlreadyManagerOf(_))
        ));

        let b = manager.create_file_data_provider("text/plain").unwrap();
        let b_uid = b.uid().unwrap();
        manager.remove_data_provider(&b_uid, false).unwrap();
        assert_eq!(b.uid(), None);
        assert!(matches!(
            manager.add_data_provider(&b, Some("dp1")),
            Err(MediaError::AlreadyManagerOf(_))
        ));
        assert!(matches!(
            manager.add_data_provider(&b, Some("")),
            Err(MediaError::InvalidArgument(_))
        ));
        assert_eq!(manager.add_data_provider(&b, Some("custom")).unwrap(), "custom");
        assert!(manager.data_provider("custom").unwrap().ptr_eq(&b));
    }

    #[test]
    fn test_add_rejects_foreign_provider() {
        let (_other_dir, other) = manager();
        let (_dir, manager) = manager();
        let foreign = other.create_file_data_provider("text/plain").unwrap();
        other.remove_data_provider_ref(&foreign, false).unwrap();
        assert!(matches!(
            manager.add_data_provider(&foreign, None),
            Err(MediaError::NotManagerOf(_))
        ));
    }

    #[test]
    fn test_remove_with_open_stream() {
        let (_dir, manager) = manager();
        let provider = manager.create_file_data_provider("text/plain").unwrap();
        let uid = provider.uid().unwrap();
        let writer = provider.output_stream().unwrap();
        assert!(matches!(
            manager.remove_data_provider(&uid, true),
            Err(MediaError::OutputStreamOpen)
        ));
        assert!(manager.is_manager_of(&uid));
        drop(writer);

        let path = provider.data_file_path().unwrap();
        assert!(path.exists());
        manager.remove_data_provider(&uid, true).unwrap();
        assert!(!path.exists());
        assert!(!manager.is_manager_of(&uid));
    }

    #[test]
    fn test_remove_without_delete_keeps_file() {
        let (_dir, manager) = manager();
        let provider = manager.create_file_data_provider("text/plain").unwrap();
        write_all(&provider, b"keep");
        let uid = provider.uid().unwrap();
        let removed = manager.remove_data_provider(&uid, false).unwrap();
        assert!(removed.data_file_path().unwrap().exists());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_create_data_provider_by_type_name() {
        let (_dir, manager) = manager();
        assert!(
            manager
                .create_data_provider(FILE_DATA_PROVIDER_TYPE, "text/plain")
                .is_ok()
        );
        assert!(matches!(
            manager.create_data_provider("MemoryDataProvider", "text/plain"),
            Err(MediaError::Factory(_))
        ));
    }

    #[test]
    fn test_set_data_file_directory_once() {
        let (dir, manager) = manager();
        manager.set_data_file_directory("Audio").unwrap();
        assert_eq!(manager.data_file_directory(), "Audio");
        assert_eq!(manager.data_file_directory_path(), dir.path().join("Audio"));
        assert!(matches!(
            manager.set_data_file_directory("Other"),
            Err(MediaError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_default_data_file_directory() {
        let (_dir, manager) = manager();
        assert_eq!(manager.data_file_directory(), DEFAULT_DATA_DIR);
        assert!(manager.set_data_file_directory("Late").is_err());
        assert!(manager.set_data_file_directory("").is_err());
    }

    #[test]
    fn test_restore_file_data_provider() {
        let (_dir, manager) = manager();
        let original = manager.create_file_data_provider("text/plain").unwrap();
        write_all(&original, b"persisted");
        let path = original.relative_path().to_string();
        manager.remove_data_provider_ref(&original, false).unwrap();

        let restored = manager
            .restore_file_data_provider("dp7", "text/plain", &path)
            .unwrap();
        assert!(restored.is_initialized());
        let mut data = String::new();
        restored
            .input_stream()
            .unwrap()
            .read_to_string(&mut data)
            .unwrap();
        assert_eq!(data, "persisted");

        assert!(matches!(
            manager.restore_file_data_provider("dp7", "text/plain", "other.txt"),
            Err(MediaError::AlreadyManagerOf(_))
        ));
        assert!(
            manager
                .restore_file_data_provider("dp8", "text/plain", "../escape.txt")
                .is_err()
        );

        let missing = manager
            .restore_file_data_provider("dp9", "text/plain", "gone.txt")
            .unwrap();
        assert!(matches!(
            missing.input_stream(),
            Err(MediaError::DataMissing(_))
        ));
    }

    #[test]
    fn test_move_data_files() {
        let (dir, manager) = manager();
        let a = manager.create_file_data_provider("text/plain").unwrap();
        let b = manager.create_file_data_provider("text/plain").unwrap();
        let never_written = manager.create_file_data_provider("text/plain").unwrap();
        write_all(&a, b"aaa");
        write_all(&b, b"bbb");
        let old_a = a.data_file_path().unwrap();

        manager.move_data_files("Moved", true, false).unwrap();
        assert_eq!(manager.data_file_directory(), "Moved");
        assert!(!old_a.exists());
        assert!(!dir.path().join(DEFAULT_DATA_DIR).exists());
        assert!(a.data_file_path().unwrap().starts_with(dir.path().join("Moved")));

        let mut data = Vec::new();
        b.input_stream().unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, b"bbb");
        assert_eq!(never_written.len().unwrap(), 0);
    }

    #[test]
    fn test_move_data_files_keeps_source() {
        let (_dir, manager) = manager();
        let a = manager.create_file_data_provider("text/plain").unwrap();
        write_all(&a, b"aaa");
        let old = a.data_file_path().unwrap();
        manager.move_data_files("Copy", false, false).unwrap();
        assert!(old.exists());
        assert!(a.data_file_path().unwrap().exists());
    }

    #[test]
    fn test_move_data_files_failures() {
        let (dir, manager) = manager();
        let a = manager.create_file_data_provider("text/plain").unwrap();
        write_all(&a, b"aaa");

        let reader = a.input_stream().unwrap();
        assert!(matches!(
            manager.move_data_files("Moved", true, false),
            Err(MediaError::InputStreamOpen)
        ));
        drop(reader);

        let clash = dir.path().join("Moved").join(a.relative_path());
        fs::create_dir_all(clash.parent().unwrap()).unwrap();
        fs::write(&clash, b"old").unwrap();
        assert!(matches!(
            manager.move_data_files("Moved", true, false),
            Err(MediaError::Io(_))
        ));
        assert_eq!(manager.data_file_directory(), DEFAULT_DATA_DIR);

        manager.move_data_files("Moved", true, true).unwrap();
        assert_eq!(fs::read(&clash).unwrap(), b"aaa");

        fs::remove_file(&clash).unwrap();
        assert!(matches!(
            manager.move_data_files("Again", false, false),
            Err(MediaError::DataMissing(_))
        ));
    }
}
