//! RIFF/WAVE header parsing and writing.
//!
//! Only linear PCM payloads are accepted: format tag 1, or
//! `WAVE_FORMAT_EXTENSIBLE` carrying the PCM sub-format GUID.
//!
//! ```text
//! "RIFF" [4B riff size] "WAVE"
//! "fmt " [4B size] [2B tag] [2B channels] [4B sample rate]
//!                  [4B byte rate] [2B block align] [2B bits] [ext...]
//! ...other chunks, word aligned...
//! "data" [4B size] PCM bytes
//! ```
//!
//! All multi-byte values are little-endian.

use std::io::{self, Read, Write};
use std::time::Duration;

use crate::error::{AudioError, AudioResult};
use crate::pcm::PcmFormatInfo;

/// Length of the canonical header written by [`write_header`].
pub const HEADER_LEN: u64 = 44;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;
const COMPARE_CHUNK: usize = 8192;
// Longest `fmt ` body this parser reads: WAVE_FORMAT_EXTENSIBLE.
const FMT_BODY_MAX: u64 = 40;

/// Result of [`parse_header`]: the PCM layout and where its payload lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveHeader {
    /// Layout of the samples in the `data` chunk.
    pub format: PcmFormatInfo,
    /// Offset of the first PCM byte from the start of the stream.
    pub data_offset: u64,
    /// Declared length of the `data` chunk in bytes.
    pub data_len: u64,
}

impl WaveHeader {
    /// Duration of the declared payload.
    pub fn duration(&self) -> Duration {
        self.format.duration(self.data_len)
    }
}

/// Parses a RIFF/WAVE header, leaving `r` positioned at the first PCM byte.
pub fn parse_header<R: Read + ?Sized>(r: &mut R) -> AudioResult<WaveHeader> {
    let mut riff = [0u8; 12];
    read_header_bytes(r, &mut riff)?;
    if &riff[0..4] != b"RIFF" {
        return Err(invalid(format!("expected RIFF, found {:?}", &riff[0..4])));
    }
    if &riff[8..12] != b"WAVE" {
        return Err(invalid(format!("expected WAVE form, found {:?}", &riff[8..12])));
    }

    let mut offset: u64 = 12;
    let mut format: Option<PcmFormatInfo> = None;

    loop {
        let mut chunk = [0u8; 8];
        read_header_bytes(r, &mut chunk)?;
        offset += 8;
        let id = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let size = u64::from(u32_at(&chunk, 4));

        match &id {
            b"fmt " => {
                if size < 16 {
                    return Err(invalid(format!("fmt chunk too short: {size} bytes")));
                }
                let read = size.min(FMT_BODY_MAX);
                let mut body = [0u8; FMT_BODY_MAX as usize];
                read_header_bytes(r, &mut body[..read as usize])?;
                let padded = size + (size & 1);
                skip_bytes(r, padded - read, &id)?;
                offset += padded;
                format = Some(parse_fmt(&body[..read as usize])?);
            }
            b"data" => {
                let format = format.ok_or_else(|| invalid("data chunk before fmt chunk"))?;
                return Ok(WaveHeader {
                    format,
                    data_offset: offset,
                    data_len: size,
                });
            }
            _ => {
                let skip = size + (size & 1);
                skip_bytes(r, skip, &id)?;
                offset += skip;
            }
        }
    }
}

fn skip_bytes<R: Read + ?Sized>(r: &mut R, n: u64, id: &[u8; 4]) -> AudioResult<()> {
    let skipped = io::copy(&mut (&mut *r).take(n), &mut io::sink())?;
    if skipped < n {
        return Err(invalid(format!(
            "truncated {:?} chunk",
            String::from_utf8_lossy(id)
        )));
    }
    Ok(())
}

fn parse_fmt(body: &[u8]) -> AudioResult<PcmFormatInfo> {
    let mut tag = u16_at(body, 0);
    let channels = u16_at(body, 2);
    let sample_rate = u32_at(body, 4);
    let byte_rate = u32_at(body, 8);
    let block_align = u16_at(body, 12);
    let bit_depth = u16_at(body, 14);

    if tag == WAVE_FORMAT_EXTENSIBLE {
        if body.len() < 40 {
            return Err(invalid("extensible fmt chunk too short"));
        }
        // The sub-format GUID starts at byte 24; its first two bytes carry the tag.
        tag = u16_at(body, 24);
    }
    if tag != WAVE_FORMAT_PCM {
        return Err(invalid(format!("unsupported format tag {tag:#06x}")));
    }

    let format = PcmFormatInfo::new(channels, sample_rate, bit_depth)
        .map_err(|e| invalid(e.to_string()))?;
    if format.block_align() != block_align {
        return Err(invalid(format!(
            "block align {block_align} does not match {format}"
        )));
    }
    if format.byte_rate() != byte_rate {
        return Err(invalid(format!(
            "byte rate {byte_rate} does not match {format}"
        )));
    }
    Ok(format)
}

/// Writes the canonical 44-byte header for `data_len` bytes of PCM.
pub fn write_header<W: Write + ?Sized>(
    w: &mut W,
    format: &PcmFormatInfo,
    data_len: u64,
) -> AudioResult<()> {
    let data_len = u32::try_from(data_len)
        .ok()
        .filter(|len| *len <= u32::MAX - 36)
        .ok_or_else(|| invalid(format!("{data_len} bytes do not fit a RIFF container")))?;

    let mut header = Vec::with_capacity(HEADER_LEN as usize);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(36 + data_len).to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    header.extend_from_slice(&format.channels().to_le_bytes());
    header.extend_from_slice(&format.sample_rate().to_le_bytes());
    header.extend_from_slice(&format.byte_rate().to_le_bytes());
    header.extend_from_slice(&format.block_align().to_le_bytes());
    header.extend_from_slice(&format.bit_depth().to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_len.to_le_bytes());

    w.write_all(&header)?;
    Ok(())
}

/// Compares the next `n` bytes of two streams.
///
/// Returns `false` if the contents differ or either stream ends early.
pub fn compare_stream_data<A, B>(a: &mut A, b: &mut B, n: u64) -> io::Result<bool>
where
    A: Read + ?Sized,
    B: Read + ?Sized,
{
    let mut buf_a = vec![0u8; COMPARE_CHUNK];
    let mut buf_b = vec![0u8; COMPARE_CHUNK];
    let mut remaining = n;

    while remaining > 0 {
        let want = remaining.min(COMPARE_CHUNK as u64) as usize;
        let got_a = read_full(a, &mut buf_a[..want])?;
        let got_b = read_full(b, &mut buf_b[..want])?;
        if got_a != want || got_b != want {
            return Ok(false);
        }
        if buf_a[..want] != buf_b[..want] {
            return Ok(false);
        }
        remaining -= want as u64;
    }
    Ok(true)
}

fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_header_bytes<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> AudioResult<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => invalid("truncated RIFF header"),
        _ => AudioError::Io(e),
    })
}

fn u16_at(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn invalid(msg: impl Into<String>) -> AudioError {
    AudioError::InvalidFormat(msg.into())
}
