//! File-backed byte resources with exclusive stream semantics.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use talkbook_audio::riff;
use tracing::{debug, warn};

use crate::data_provider_manager::{DataProviderManager, ManagerShared};
use crate::error::{MediaError, MediaResult};
use crate::io::copy_exact;

/// A byte resource stored in one file under its manager's data directory.
///
/// `FileDataProvider` is a cheap handle; clones refer to the same resource.
/// At any time the resource is idle, has one or more readers, or has exactly
/// one writer. Streams are released when the returned reader or writer is
/// dropped (or explicitly closed).
#[derive(Clone)]
pub struct FileDataProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    manager: Weak<ManagerShared>,
    mime_type: String,
    relative_path: String,
    uid: Mutex<Option<String>>,
    streams: Mutex<StreamState>,
    initialized: AtomicBool,
    deleted: AtomicBool,
}

#[derive(Default)]
struct StreamState {
    readers: usize,
    writer: bool,
}

impl StreamState {
    fn check_idle(&self) -> MediaResult<()> {
        if self.writer {
            return Err(MediaError::OutputStreamOpen);
        }
        if self.readers > 0 {
            return Err(MediaError::InputStreamOpen);
        }
        Ok(())
    }
}

impl FileDataProvider {
    pub(crate) fn new(
        manager: Weak<ManagerShared>,
        mime_type: &str,
        relative_path: String,
        initialized: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                manager,
                mime_type: mime_type.to_string(),
                relative_path,
                uid: Mutex::new(None),
                streams: Mutex::new(StreamState::default()),
                initialized: AtomicBool::new(initialized),
                deleted: AtomicBool::new(false),
            }),
        }
    }

    /// UID under which the provider is registered, if any.
    pub fn uid(&self) -> Option<String> {
        self.inner.uid.lock().clone()
    }

    pub(crate) fn set_uid(&self, uid: Option<String>) {
        *self.inner.uid.lock() = uid;
    }

    /// MIME type of the stored bytes.
    pub fn mime_type(&self) -> &str {
        &self.inner.mime_type
    }

    /// Path of the backing file relative to the data directory.
    pub fn relative_path(&self) -> &str {
        &self.inner.relative_path
    }

    /// The manager this provider was created by, if it is still alive.
    pub fn manager(&self) -> Option<DataProviderManager> {
        self.inner.manager.upgrade().map(DataProviderManager::from_shared)
    }

    pub(crate) fn belongs_to(&self, shared: &Arc<ManagerShared>) -> bool {
        std::ptr::eq(self.inner.manager.as_ptr(), Arc::as_ptr(shared))
    }

    /// True if both handles refer to the same resource.
    pub fn ptr_eq(&self, other: &FileDataProvider) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Absolute path of the backing file.
    pub fn data_file_path(&self) -> MediaResult<PathBuf> {
        let manager = self.inner.manager.upgrade().ok_or_else(|| {
            MediaError::NotManagerOf(format!(
                "data provider {} outlived its manager",
                self.inner.relative_path
            ))
        })?;
        Ok(manager.data_dir_path().join(&self.inner.relative_path))
    }

    /// True once the backing file has been materialized.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Relaxed)
    }

    /// True when no stream is open.
    pub fn is_idle(&self) -> bool {
        let streams = self.inner.streams.lock();
        streams.readers == 0 && !streams.writer
    }

    /// Number of open readers.
    pub fn open_readers(&self) -> usize {
        self.inner.streams.lock().readers
    }

    /// True while a writer is open.
    pub fn has_writer(&self) -> bool {
        self.inner.streams.lock().writer
    }

    pub(crate) fn check_idle(&self) -> MediaResult<()> {
        self.inner.streams.lock().check_idle()
    }

    /// Size of the stored content in bytes.
    pub fn len(&self) -> MediaResult<u64> {
        let path = self.data_file_path()?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == io::ErrorKind::NotFound && !self.is_initialized() => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(MediaError::DataMissing(path)),
            Err(e) => Err(e.into()),
        }
    }

    /// True if the stored content is empty.
    pub fn is_empty(&self) -> MediaResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Opens a reader over the stored bytes.
    ///
    /// The backing file is created empty on first use. Fails while a writer
    /// is open, or with [`MediaError::DataMissing`] if the file was created
    /// before and has since disappeared.
    pub fn input_stream(&self) -> MediaResult<ProviderReader> {
        let mut streams = self.inner.streams.lock();
        if streams.writer {
            return Err(MediaError::OutputStreamOpen);
        }
        let path = self.data_file_path()?;
        if self.inner.deleted.load(Ordering::Relaxed) {
            return Err(MediaError::DataMissing(path));
        }
        if !path.exists() {
            if self.is_initialized() {
                return Err(MediaError::DataMissing(path));
            }
            create_parent(&path)?;
            File::create(&path)?;
            self.inner.initialized.store(true, Ordering::Relaxed);
        }
        let file = File::open(&path)?;
        streams.readers += 1;
        Ok(ProviderReader {
            file,
            provider: Arc::clone(&self.inner),
        })
    }

    /// Opens the single writer, truncating the stored bytes.
    pub fn output_stream(&self) -> MediaResult<ProviderWriter> {
        let mut streams = self.inner.streams.lock();
        streams.check_idle()?;
        let path = self.data_file_path()?;
        if self.inner.deleted.load(Ordering::Relaxed) {
            return Err(MediaError::DataMissing(path));
        }
        create_parent(&path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        self.inner.initialized.store(true, Ordering::Relaxed);
        streams.writer = true;
        Ok(ProviderWriter {
            file,
            provider: Arc::clone(&self.inner),
        })
    }

    /// Removes the backing file and deregisters the provider.
    ///
    /// Fails if any stream is open.
    pub fn delete(&self) -> MediaResult<()> {
        {
            let streams = self.inner.streams.lock();
            streams.check_idle()?;
            let path = self.data_file_path()?;
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            self.inner.deleted.store(true, Ordering::Relaxed);
            debug!("media: deleted data file {}", path.display());
        }
        if let Some(manager) = self.manager() {
            manager.detach(self);
        }
        Ok(())
    }

    /// Copies the content into a new provider of the same manager.
    pub fn copy(&self) -> MediaResult<FileDataProvider> {
        let manager = self.manager().ok_or_else(|| {
            MediaError::NotManagerOf(format!(
                "data provider {} outlived its manager",
                self.inner.relative_path
            ))
        })?;
        self.export(&manager)
    }

    /// Copies the content into a new provider created by `destination`.
    pub fn export(&self, destination: &DataProviderManager) -> MediaResult<FileDataProvider> {
        let mut input = self.input_stream()?;
        let len = input.seek(SeekFrom::End(0))?;
        input.seek(SeekFrom::Start(0))?;

        let copy = destination.create_file_data_provider(self.mime_type())?;
        let result = copy.fill_from(&mut input, len);
        drop(input);
        if let Err(e) = result {
            if let Err(cleanup) = destination.remove_data_provider_ref(&copy, true) {
                warn!("media: failed to discard partial copy: {}", cleanup);
            }
            return Err(e);
        }
        Ok(copy)
    }

    fn fill_from(&self, input: &mut dyn Read, len: u64) -> MediaResult<()> {
        let mut out = self.output_stream()?;
        copy_exact(input, &mut out, len, None)?;
        out.close()?;
        Ok(())
    }

    /// True if both providers have the same MIME type and identical bytes.
    pub fn value_equals(&self, other: &FileDataProvider) -> MediaResult<bool> {
        if self.mime_type() != other.mime_type() {
            return Ok(false);
        }
        if self.ptr_eq(other) {
            return Ok(true);
        }
        let len = self.len()?;
        if len != other.len()? {
            return Ok(false);
        }
        let mut a = self.input_stream()?;
        let mut b = other.input_stream()?;
        Ok(riff::compare_stream_data(&mut a, &mut b, len)?)
    }
}

impl fmt::Debug for FileDataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDataProvider")
            .field("uid", &self.uid())
            .field("mime_type", &self.inner.mime_type)
            .field("relative_path", &self.inner.relative_path)
            .finish()
    }
}

fn create_parent(path: &std::path::Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

/// A tracked reader over a [`FileDataProvider`].
///
/// The provider counts this reader as open until it is dropped.
pub struct ProviderReader {
    file: File,
    provider: Arc<ProviderInner>,
}

impl ProviderReader {
    /// Closes the reader.
    pub fn close(self) {}
}

impl Read for ProviderReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for ProviderReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Drop for ProviderReader {
    fn drop(&mut self) {
        let mut streams = self.provider.streams.lock();
        streams.readers = streams.readers.saturating_sub(1);
    }
}

impl fmt::Debug for ProviderReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderReader")
            .field("relative_path", &self.provider.relative_path)
            .finish()
    }
}

/// The tracked writer of a [`FileDataProvider`].
///
/// The provider refuses other streams until it is dropped.
pub struct ProviderWriter {
    file: File,
    provider: Arc<ProviderInner>,
}

impl ProviderWriter {
    /// Flushes and closes the writer.
    pub fn close(mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Write for ProviderWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Seek for ProviderWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl Drop for ProviderWriter {
    fn drop(&mut self) {
        self.provider.streams.lock().writer = false;
    }
}

impl fmt::Debug for ProviderWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderWriter")
            .field("relative_path", &self.provider.relative_path)
            .finish()
    }
}
