//! PCM audio primitives for managed media.
//!
//! This crate provides:
//!
//! - `pcm`: the [`PcmFormatInfo`] value type and duration/length conversion
//! - `riff`: RIFF/WAVE header parsing, writing and stream comparison
//!
//! # Example
//!
//! ```rust
//! use talkbook_audio::{riff, PcmFormatInfo};
//! use std::io::Cursor;
//!
//! let format = PcmFormatInfo::STEREO_44K;
//! let mut wav = Vec::new();
//! riff::write_header(&mut wav, &format, 4).unwrap();
//! wav.extend_from_slice(&[0, 0, 0, 0]);
//!
//! let header = riff::parse_header(&mut Cursor::new(wav)).unwrap();
//! assert!(header.format.is_compatible_with(&format));
//! assert_eq!(header.data_len, 4);
//! ```

pub mod error;
pub mod pcm;
pub mod riff;

pub use error::{AudioError, AudioResult};
pub use pcm::PcmFormatInfo;
