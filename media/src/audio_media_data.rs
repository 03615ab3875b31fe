//! Audio media data and its time-domain edit operations.
//!
//! The PCM of an [`AudioMediaData`] is an ordered list of clips. Each clip
//! is a byte range inside one container file written by the [`PcmCodec`].
//! Container files are never rewritten: an insert writes a new file and
//! splices a clip in, a remove cuts clips, and a merge within one provider
//! manager moves clips without touching any bytes.
//!
//! ```text
//! clips:  [dp1 44..8864] [dp3 44..1808] [dp1 8864..17684]
//!          \___________ audio_data() reads these in order _____/
//! ```

use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use parking_lot::Mutex;
use talkbook_audio::{PcmFormatInfo, riff};
use tracing::{debug, warn};

use crate::codec::{PcmCodec, WavCodec};
use crate::data_provider::{FileDataProvider, ProviderReader};
use crate::data_provider_manager::DataProviderManager;
use crate::error::{MediaError, MediaResult};
use crate::events::{EventBus, MediaEvent};
use crate::media_data::{MediaData, MediaDataCore, downcast_audio, same_entity};
use crate::media_data_manager::MediaDataManager;

static WAV: WavCodec = WavCodec;

#[derive(Clone)]
struct PcmClip {
    provider: FileDataProvider,
    begin: u64,
    end: u64,
}

impl PcmClip {
    fn len(&self) -> u64 {
        self.end - self.begin
    }
}

struct AudioState {
    name: String,
    format: PcmFormatInfo,
    clips: Vec<PcmClip>,
}

impl AudioState {
    fn pcm_len(&self) -> u64 {
        self.clips.iter().map(PcmClip::len).sum()
    }

    fn duration(&self) -> Duration {
        self.format.duration(self.pcm_len())
    }

    /// Byte offset of `time`, which must lie within `[0, duration]`.
    fn offset_of(&self, time: Duration) -> MediaResult<u64> {
        let duration = self.duration();
        if time > duration {
            return Err(MediaError::TimeOutOfBounds { time, duration });
        }
        Ok(self.format.data_length(time).min(self.pcm_len()))
    }

    /// Ensures a clip boundary at `offset` and returns the index of the
    /// first clip starting there.
    fn split_at(&mut self, offset: u64) -> usize {
        let mut pos = 0;
        for i in 0..self.clips.len() {
            if offset == pos {
                return i;
            }
            let len = self.clips[i].len();
            if offset < pos + len {
                let cut = self.clips[i].begin + (offset - pos);
                let mut tail = self.clips[i].clone();
                tail.begin = cut;
                self.clips[i].end = cut;
                self.clips.insert(i + 1, tail);
                return i + 1;
            }
            pos += len;
        }
        self.clips.len()
    }

    fn cut(&mut self, begin: u64, end: u64) -> Vec<PcmClip> {
        let i = self.split_at(begin);
        let j = self.split_at(end);
        self.clips.drain(i..j).collect()
    }

    fn insert_clips(&mut self, offset: u64, clips: Vec<PcmClip>) {
        let i = self.split_at(offset);
        self.clips.splice(i..i, clips);
    }

    /// The clip pieces covering `[begin, end)`.
    fn segments(&self, begin: u64, end: u64) -> Vec<PcmClip> {
        let mut pos = 0;
        let mut out = Vec::new();
        for clip in &self.clips {
            let next = pos + clip.len();
            let lo = begin.max(pos);
            let hi = end.min(next);
            if lo < hi {
                out.push(PcmClip {
                    provider: clip.provider.clone(),
                    begin: clip.begin + (lo - pos),
                    end: clip.begin + (hi - pos),
                });
            }
            pos = next;
        }
        out
    }
}

/// PCM audio stored in managed container files.
///
/// Time offsets are converted to byte offsets through the entity's
/// [`PcmFormatInfo`]. Every bound is checked before anything is written, and
/// a failed write discards the file it was writing.
pub struct AudioMediaData {
    core: MediaDataCore,
    codec: &'static dyn PcmCodec,
    data_providers: DataProviderManager,
    events: EventBus,
    state: Mutex<AudioState>,
}

impl AudioMediaData {
    /// Creates an empty, unregistered entity in the default format of
    /// `manager`.
    pub fn new(manager: &MediaDataManager) -> Self {
        Self {
            core: MediaDataCore::new(manager),
            codec: &WAV,
            data_providers: manager.data_providers().clone(),
            events: manager.events().clone(),
            state: Mutex::new(AudioState {
                name: String::new(),
                format: manager.default_pcm_format(),
                clips: Vec::new(),
            }),
        }
    }

    /// Factory entry for [`MediaDataManager::register_media_data_type`].
    pub fn create(manager: &MediaDataManager) -> Arc<dyn MediaData> {
        Arc::new(Self::new(manager))
    }

    /// The provider manager holding this entity's files.
    pub fn data_provider_manager(&self) -> &DataProviderManager {
        &self.data_providers
    }

    pub fn name(&self) -> String {
        self.state.lock().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.state.lock().name = name.to_string();
    }

    pub fn pcm_format(&self) -> PcmFormatInfo {
        self.state.lock().format
    }

    /// Changes the PCM format.
    ///
    /// Fails if the owning manager enforces a different format, or if the
    /// entity already holds audio in another format.
    pub fn set_pcm_format(&self, format: PcmFormatInfo) -> MediaResult<()> {
        if let Some(manager) = self.core.manager() {
            manager.check_pcm_format(&format)?;
        }
        let previous = {
            let mut state = self.state.lock();
            if state.format == format {
                return Ok(());
            }
            if !state.clips.is_empty() {
                return Err(MediaError::InvalidFormat(format!(
                    "cannot change {} to {format} while audio is stored",
                    state.format
                )));
            }
            std::mem::replace(&mut state.format, format)
        };
        self.publish(MediaEvent::FormatChanged {
            uid: self.uid(),
            previous,
            current: format,
        });
        Ok(())
    }

    /// Total length of the stored PCM in bytes.
    pub fn pcm_length(&self) -> u64 {
        self.state.lock().pcm_len()
    }

    /// Byte length of `duration` in this entity's format.
    pub fn pcm_length_for(&self, duration: Duration) -> u64 {
        self.pcm_format().data_length(duration)
    }

    pub fn audio_duration(&self) -> Duration {
        self.state.lock().duration()
    }

    /// Number of stored clips.
    pub fn clip_count(&self) -> usize {
        self.state.lock().clips.len()
    }

    /// Appends `duration` of PCM read from `input`.
    pub fn append(&self, input: &mut dyn Read, duration: Duration) -> MediaResult<()> {
        let len = self.pcm_length_for(duration);
        self.insert_pcm(input, None, len, None)
    }

    /// Inserts `duration` of PCM read from `input` at `point`.
    pub fn insert(
        &self,
        input: &mut dyn Read,
        point: Duration,
        duration: Duration,
    ) -> MediaResult<()> {
        let len = self.pcm_length_for(duration);
        self.insert_pcm(input, Some(point), len, None)
    }

    /// Replaces `[point, point + duration)` with PCM read from `input`.
    pub fn replace(
        &self,
        input: &mut dyn Read,
        point: Duration,
        duration: Duration,
    ) -> MediaResult<()> {
        let (format, begin, end) = {
            let state = self.state.lock();
            let end_time = point.saturating_add(duration);
            let end = state.offset_of(end_time)?;
            (state.format, state.offset_of(point)?, end)
        };
        let clip = self.write_clip(&format, input, format.data_length(duration), None)?;
        {
            let mut state = self.state.lock();
            state.cut(begin, end);
            state.insert_clips(begin, clip.into_iter().collect());
        }
        let uid = self.uid();
        self.publish(MediaEvent::DataRemoved {
            uid: uid.clone(),
            begin: point,
            duration,
        });
        self.publish(MediaEvent::DataInserted {
            uid,
            point,
            duration,
        });
        Ok(())
    }

    /// Removes `[begin, end)`.
    pub fn remove(&self, begin: Duration, end: Duration) -> MediaResult<()> {
        if begin > end {
            return Err(MediaError::TimeOutOfBounds {
                time: begin,
                duration: end,
            });
        }
        {
            let mut state = self.state.lock();
            let e = state.offset_of(end)?;
            let b = state.offset_of(begin)?;
            state.cut(b, e);
        }
        self.publish(MediaEvent::DataRemoved {
            uid: self.uid(),
            begin,
            duration: end - begin,
        });
        Ok(())
    }

    /// Removes everything from `begin` to the end.
    pub fn remove_from(&self, begin: Duration) -> MediaResult<()> {
        self.remove(begin, self.audio_duration())
    }

    /// Moves `[point, duration)` into a new entity of the same type,
    /// registered with the owning manager.
    pub fn split(&self, point: Duration) -> MediaResult<Arc<AudioMediaData>> {
        let manager = self
            .core
            .manager()
            .ok_or_else(|| MediaError::Factory(format!("{} without a manager", self.type_name())))?;
        let (format, begin, total, duration) = {
            let state = self.state.lock();
            (
                state.format,
                state.offset_of(point)?,
                state.pcm_len(),
                state.duration(),
            )
        };

        let created = manager.create_media_data(self.type_name())?;
        let Some(tail) = downcast_audio(Arc::clone(&created)) else {
            discard_media(&manager, created.as_ref());
            return Err(MediaError::Factory(format!(
                "{} is not audio media data",
                self.type_name()
            )));
        };
        if let Err(e) = self.copy_tail(&tail, &format, begin, total) {
            discard_media(&manager, created.as_ref());
            return Err(e);
        }

        self.state.lock().cut(begin, total);
        self.publish(MediaEvent::DataRemoved {
            uid: self.uid(),
            begin: point,
            duration: duration.saturating_sub(point),
        });
        debug!(
            "media: split {} at {:?} into {}",
            self.uid().unwrap_or_default(),
            point,
            tail.uid().unwrap_or_default()
        );
        Ok(tail)
    }

    fn copy_tail(
        &self,
        tail: &AudioMediaData,
        format: &PcmFormatInfo,
        begin: u64,
        total: u64,
    ) -> MediaResult<()> {
        tail.set_pcm_format(*format)?;
        let mut reader = self.reader(begin, total)?;
        tail.insert_pcm(&mut reader, None, total - begin, None)
    }

    /// Appends all audio of `other` and leaves `other` empty.
    ///
    /// Entities sharing a provider manager hand over their clips without
    /// copying; otherwise the PCM is streamed into a new file.
    pub fn merge_with(&self, other: &AudioMediaData) -> MediaResult<()> {
        if std::ptr::eq(self, other) {
            return Err(MediaError::InvalidArgument(
                "cannot merge audio media data with itself".into(),
            ));
        }
        let format = self.pcm_format();
        let other_format = other.pcm_format();
        if !format.is_compatible_with(&other_format) {
            return Err(MediaError::InvalidFormat(format!(
                "cannot merge {other_format} into {format}"
            )));
        }
        let moved = other.audio_duration();

        let clips = if self.data_providers.ptr_eq(&other.data_providers) {
            std::mem::take(&mut other.state.lock().clips)
        } else {
            let len = other.pcm_length();
            let mut reader = other.audio_data()?;
            let clip = self.write_clip(&format, &mut reader, len, None)?;
            drop(reader);
            other.state.lock().clips.clear();
            clip.into_iter().collect()
        };
        let point = {
            let mut state = self.state.lock();
            let point = state.duration();
            let at = state.pcm_len();
            state.insert_clips(at, clips);
            point
        };

        other.publish(MediaEvent::DataRemoved {
            uid: other.uid(),
            begin: Duration::ZERO,
            duration: moved,
        });
        self.publish(MediaEvent::DataInserted {
            uid: self.uid(),
            point,
            duration: moved,
        });
        Ok(())
    }

    /// Appends the PCM of a RIFF/WAVE stream. Returns the appended duration.
    ///
    /// The stream format must be compatible with this entity's format.
    pub fn append_from_riff_wave(&self, input: &mut dyn Read) -> MediaResult<Duration> {
        self.import_wave(input, None)
    }

    /// Like [`append_from_riff_wave`], aborting with
    /// [`MediaError::Cancelled`] once `cancel` is raised.
    ///
    /// [`append_from_riff_wave`]: AudioMediaData::append_from_riff_wave
    pub fn append_from_riff_wave_cancellable(
        &self,
        input: &mut dyn Read,
        cancel: &AtomicBool,
    ) -> MediaResult<Duration> {
        self.import_wave(input, Some(cancel))
    }

    /// Appends the PCM of the RIFF/WAVE file at `path`.
    pub fn append_from_riff_wave_file(&self, path: impl AsRef<Path>) -> MediaResult<Duration> {
        let mut input = BufReader::new(File::open(path.as_ref())?);
        self.import_wave(&mut input, None)
    }

    fn import_wave(
        &self,
        input: &mut dyn Read,
        cancel: Option<&AtomicBool>,
    ) -> MediaResult<Duration> {
        let (format, payload) = self.codec.read_layout(input)?;
        let current = self.pcm_format();
        if !format.is_compatible_with(&current) {
            return Err(MediaError::InvalidFormat(format!(
                "{format} is not compatible with {current}"
            )));
        }
        let len = format.align_down(payload.end - payload.start);
        self.insert_pcm(input, None, len, cancel)?;
        Ok(format.duration(len))
    }

    /// Attaches a whole container file already registered with this
    /// entity's provider manager.
    pub fn append_data_provider(&self, provider: &FileDataProvider) -> MediaResult<()> {
        let registered = provider
            .uid()
            .and_then(|uid| self.data_providers.data_provider(&uid).ok())
            .is_some_and(|p| p.ptr_eq(provider));
        if !registered {
            return Err(MediaError::NotManagerOf(format!(
                "data provider {}",
                provider.relative_path()
            )));
        }
        if !provider.mime_type().eq_ignore_ascii_case(self.codec.mime_type()) {
            return Err(MediaError::InvalidFormat(format!(
                "{} data provider cannot back {}",
                provider.mime_type(),
                self.type_name()
            )));
        }

        let (format, payload) = {
            let mut input = provider.input_stream()?;
            self.codec.read_layout(&mut input)?
        };
        let current = self.pcm_format();
        if !format.is_compatible_with(&current) {
            return Err(MediaError::InvalidFormat(format!(
                "{format} is not compatible with {current}"
            )));
        }
        let stored = provider.len()?;
        if stored < payload.end {
            return Err(MediaError::InputTooShort {
                expected: payload.end,
                actual: stored,
            });
        }

        let len = format.align_down(payload.end - payload.start);
        if len == 0 {
            return Ok(());
        }
        let point = {
            let mut state = self.state.lock();
            let point = state.duration();
            state.clips.push(PcmClip {
                provider: provider.clone(),
                begin: payload.start,
                end: payload.start + len,
            });
            point
        };
        self.publish(MediaEvent::DataInserted {
            uid: self.uid(),
            point,
            duration: format.duration(len),
        });
        Ok(())
    }

    /// Reads all stored PCM.
    pub fn audio_data(&self) -> MediaResult<AudioDataReader> {
        let end = self.audio_duration();
        self.audio_data_range(Duration::ZERO, end)
    }

    /// Reads the stored PCM from `begin` to the end.
    pub fn audio_data_from(&self, begin: Duration) -> MediaResult<AudioDataReader> {
        let end = self.audio_duration();
        self.audio_data_range(begin, end)
    }

    /// Reads the stored PCM in `[begin, end)`.
    ///
    /// The files involved refuse writers until the reader is dropped.
    pub fn audio_data_range(
        &self,
        begin: Duration,
        end: Duration,
    ) -> MediaResult<AudioDataReader> {
        if begin > end {
            return Err(MediaError::TimeOutOfBounds {
                time: begin,
                duration: end,
            });
        }
        let (b, e) = {
            let state = self.state.lock();
            (state.offset_of(begin)?, state.offset_of(end)?)
        };
        self.reader(b, e)
    }

    fn reader(&self, begin: u64, end: u64) -> MediaResult<AudioDataReader> {
        let segments = self.state.lock().segments(begin, end);
        let mut parts = VecDeque::with_capacity(segments.len());
        for clip in segments {
            let mut input = clip.provider.input_stream()?;
            input.seek(SeekFrom::Start(clip.begin))?;
            parts.push_back(input.take(clip.len()));
        }
        Ok(AudioDataReader {
            parts,
            remaining: end - begin,
        })
    }

    /// Deletes every provider no other registered entity uses, then
    /// deregisters this entity.
    ///
    /// If a file cannot be deleted the entity stays registered and keeps
    /// only the clips whose files still exist.
    pub fn delete(&self) -> MediaResult<()> {
        let mine = self.used_data_providers();
        for provider in &mine {
            provider.check_idle()?;
        }
        let manager = self.core.manager();
        let mut still_used = HashSet::new();
        if let Some(manager) = &manager {
            for media in manager.media() {
                if !same_entity(media.as_ref(), self) {
                    let used = media.used_data_providers();
                    still_used.extend(used.iter().map(FileDataProvider::id));
                }
            }
        }
        for provider in mine {
            if still_used.contains(&provider.id()) || provider.uid().is_none() {
                continue;
            }
            if let Err(e) = provider.delete() {
                let mut state = self.state.lock();
                state.clips.retain(|clip| clip.provider.uid().is_some());
                warn!(
                    "media: delete stopped at {}, {} clips kept: {}",
                    provider.relative_path(),
                    state.clips.len(),
                    e
                );
                return Err(e);
            }
        }
        if let (Some(manager), Some(uid)) = (&manager, self.uid()) {
            manager.remove_media_data(&uid)?;
        }
        self.state.lock().clips.clear();
        Ok(())
    }

    fn insert_pcm(
        &self,
        input: &mut dyn Read,
        point: Option<Duration>,
        len: u64,
        cancel: Option<&AtomicBool>,
    ) -> MediaResult<()> {
        let (format, offset, point) = {
            let state = self.state.lock();
            match point {
                Some(point) => (state.format, state.offset_of(point)?, point),
                None => (state.format, state.pcm_len(), state.duration()),
            }
        };
        let Some(clip) = self.write_clip(&format, input, len, cancel)? else {
            return Ok(());
        };
        self.state.lock().insert_clips(offset, vec![clip]);
        self.publish(MediaEvent::DataInserted {
            uid: self.uid(),
            point,
            duration: format.duration(len),
        });
        Ok(())
    }

    /// Writes `len` bytes of `input` into a new container file.
    fn write_clip(
        &self,
        format: &PcmFormatInfo,
        input: &mut dyn Read,
        len: u64,
        cancel: Option<&AtomicBool>,
    ) -> MediaResult<Option<PcmClip>> {
        if len == 0 {
            return Ok(None);
        }
        let provider = self
            .data_providers
            .create_file_data_provider(self.codec.mime_type())?;
        match self.fill(&provider, format, input, len, cancel) {
            Ok(payload) => Ok(Some(PcmClip {
                provider,
                begin: payload.start,
                end: payload.end,
            })),
            Err(e) => {
                let discarded = self.data_providers.remove_data_provider_ref(&provider, true);
                if let Err(cleanup) = discarded {
                    warn!("media: failed to discard {}: {}", provider.relative_path(), cleanup);
                }
                Err(e)
            }
        }
    }

    fn fill(
        &self,
        provider: &FileDataProvider,
        format: &PcmFormatInfo,
        input: &mut dyn Read,
        len: u64,
        cancel: Option<&AtomicBool>,
    ) -> MediaResult<Range<u64>> {
        let mut out = provider.output_stream()?;
        let payload = self.codec.write_pcm(&mut out, format, input, len, cancel)?;
        out.close()?;
        Ok(payload)
    }

    fn publish(&self, event: MediaEvent) {
        self.events.publish(&event);
    }

    fn snapshot(&self) -> (String, PcmFormatInfo, Vec<PcmClip>) {
        let state = self.state.lock();
        (state.name.clone(), state.format, state.clips.clone())
    }
}

fn discard_media(manager: &MediaDataManager, media: &dyn MediaData) {
    if let Some(uid) = media.uid() {
        if let Err(e) = manager.remove_media_data(&uid) {
            warn!("media: failed to discard {}: {}", uid, e);
        }
    }
}

fn export_clips(
    clips: &[PcmClip],
    destination: &DataProviderManager,
    exported: &mut HashMap<usize, FileDataProvider>,
) -> MediaResult<Vec<PcmClip>> {
    let mut out = Vec::with_capacity(clips.len());
    for clip in clips {
        let provider = match exported.get(&clip.provider.id()) {
            Some(provider) => provider.clone(),
            None => {
                let provider = clip.provider.export(destination)?;
                exported.insert(clip.provider.id(), provider.clone());
                provider
            }
        };
        out.push(PcmClip {
            provider,
            begin: clip.begin,
            end: clip.end,
        });
    }
    Ok(out)
}

fn discard_providers(
    destination: &DataProviderManager,
    providers: HashMap<usize, FileDataProvider>,
) {
    for provider in providers.into_values() {
        if let Err(e) = destination.remove_data_provider_ref(&provider, true) {
            warn!("media: failed to discard {}: {}", provider.relative_path(), e);
        }
    }
}

impl MediaData for AudioMediaData {
    fn core(&self) -> &MediaDataCore {
        &self.core
    }

    fn type_name(&self) -> &'static str {
        self.codec.media_data_type()
    }

    fn used_data_providers(&self) -> Vec<FileDataProvider> {
        let state = self.state.lock();
        let mut seen = HashSet::new();
        state
            .clips
            .iter()
            .filter(|clip| seen.insert(clip.provider.id()))
            .map(|clip| clip.provider.clone())
            .collect()
    }

    fn copy_to(&self, destination: &MediaDataManager) -> MediaResult<Arc<dyn MediaData>> {
        let (name, format, clips) = self.snapshot();
        destination.check_pcm_format(&format)?;

        let target = destination.data_providers();
        let mut exported = HashMap::new();
        let clips = match export_clips(&clips, target, &mut exported) {
            Ok(clips) => clips,
            Err(e) => {
                discard_providers(target, exported);
                return Err(e);
            }
        };

        let copy = AudioMediaData::new(destination);
        {
            let mut state = copy.state.lock();
            state.name = name;
            state.format = format;
            state.clips = clips;
        }
        let copy: Arc<dyn MediaData> = Arc::new(copy);
        if let Err(e) = destination.add_media_data(&copy, None) {
            discard_providers(target, exported);
            return Err(e);
        }
        Ok(copy)
    }

    fn value_equals(&self, other: &dyn MediaData) -> MediaResult<bool> {
        let Some(other) = other.as_audio() else {
            return Ok(false);
        };
        if same_entity(self, other) {
            return Ok(true);
        }
        if self.type_name() != other.type_name()
            || self.name() != other.name()
            || self.pcm_format() != other.pcm_format()
        {
            return Ok(false);
        }
        let len = self.pcm_length();
        if len != other.pcm_length() {
            return Ok(false);
        }
        let mut a = self.audio_data()?;
        let mut b = other.audio_data()?;
        Ok(riff::compare_stream_data(&mut a, &mut b, len)?)
    }

    fn as_audio(&self) -> Option<&AudioMediaData> {
        Some(self)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for AudioMediaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("AudioMediaData")
            .field("uid", &self.core.uid())
            .field("name", &state.name)
            .field("format", &state.format)
            .field("clips", &state.clips.len())
            .field("pcm_len", &state.pcm_len())
            .finish()
    }
}

/// Sequential reader over a range of an [`AudioMediaData`].
///
/// Holds a reader on every file it spans until dropped.
pub struct AudioDataReader {
    parts: VecDeque<io::Take<ProviderReader>>,
    remaining: u64,
}

impl AudioDataReader {
    /// Bytes left to read.
    pub fn len(&self) -> u64 {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Releases the underlying readers.
    pub fn close(self) {}
}

impl Read for AudioDataReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(part) = self.parts.front_mut() {
            if part.limit() == 0 {
                self.parts.pop_front();
                continue;
            }
            let n = part.read(buf)?;
            if n == 0 && !buf.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "media: data file shorter than its clip",
                ));
            }
            self.remaining -= n as u64;
            return Ok(n);
        }
        Ok(0)
    }
}

impl fmt::Debug for AudioDataReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioDataReader")
            .field("parts", &self.parts.len())
            .field("remaining", &self.remaining)
            .finish()
    }
}
