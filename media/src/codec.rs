//! Container codecs for stored PCM.

use std::io::{Read, Write};
use std::ops::Range;
use std::sync::atomic::AtomicBool;

use talkbook_audio::{PcmFormatInfo, riff};

use crate::error::MediaResult;
use crate::io::copy_exact;
use crate::mime;

/// Wraps raw PCM in a container and locates it again.
///
/// Implementations describe where the payload of a stored file lives so
/// audio media data can address it by byte range.
pub trait PcmCodec: Send + Sync {
    /// Type name of the media data backed by this codec.
    fn media_data_type(&self) -> &'static str;

    /// MIME type of the container files.
    fn mime_type(&self) -> &'static str;

    /// Writes a container holding exactly `len` bytes of PCM read from `pcm`.
    ///
    /// Returns the byte range of the payload within the written stream.
    fn write_pcm(
        &self,
        w: &mut dyn Write,
        format: &PcmFormatInfo,
        pcm: &mut dyn Read,
        len: u64,
        cancel: Option<&AtomicBool>,
    ) -> MediaResult<Range<u64>>;

    /// Reads the container header, returning the format and payload range.
    fn read_layout(&self, r: &mut dyn Read) -> MediaResult<(PcmFormatInfo, Range<u64>)>;
}

/// RIFF/WAVE container with a canonical 44-byte header.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavCodec;

/// Type name of WAVE-backed audio media data.
pub const WAV_AUDIO_MEDIA_DATA: &str = "WavAudioMediaData";

impl PcmCodec for WavCodec {
    fn media_data_type(&self) -> &'static str {
        WAV_AUDIO_MEDIA_DATA
    }

    fn mime_type(&self) -> &'static str {
        mime::AUDIO_WAV
    }

    fn write_pcm(
        &self,
        w: &mut dyn Write,
        format: &PcmFormatInfo,
        pcm: &mut dyn Read,
        len: u64,
        cancel: Option<&AtomicBool>,
    ) -> MediaResult<Range<u64>> {
        riff::write_header(w, format, len)?;
        copy_exact(pcm, w, len, cancel)?;
        Ok(riff::HEADER_LEN..riff::HEADER_LEN + len)
    }

    fn read_layout(&self, r: &mut dyn Read) -> MediaResult<(PcmFormatInfo, Range<u64>)> {
        let header = riff::parse_header(r)?;
        Ok((
            header.format,
            header.data_offset..header.data_offset + header.data_len,
        ))
    }
}
