//! PCM (Pulse Code Modulation) format handling.
//!
//! [`PcmFormatInfo`] is a small value type describing interleaved PCM
//! samples. It converts between playback durations and byte lengths, which
//! is how time-addressed edits are mapped onto byte-addressed storage.
//!
//! # Example
//!
//! ```rust
//! use talkbook_audio::pcm::PcmFormatInfo;
//! use std::time::Duration;
//!
//! let format = PcmFormatInfo::MONO_44K;
//!
//! // 20ms of 16-bit mono audio at 44.1kHz
//! assert_eq!(format.data_length(Duration::from_millis(20)), 1764);
//! assert_eq!(format.duration(1764), Duration::from_millis(20));
//! ```

mod format;

pub use format::PcmFormatInfo;
