use std::io;

use thiserror::Error;

/// Errors produced by PCM format handling and RIFF/WAVE parsing.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio: {field} out of bounds: {value}")]
    OutOfBounds { field: &'static str, value: u64 },

    #[error("audio: invalid format: {0}")]
    InvalidFormat(String),

    #[error("audio: io: {0}")]
    Io(#[from] io::Error),
}

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;
