use std::io;
use std::path::PathBuf;
use std::time::Duration;

use talkbook_audio::AudioError;
use thiserror::Error;

/// Errors produced by managed media operations.
///
/// Every operation validates its arguments and the state it depends on
/// before mutating anything, so an error leaves the entities involved as
/// they were. The only exception is [`MediaError::Io`] raised half-way
/// through a copy or move, after which the destination must be treated as
/// invalid.
#[derive(Error, Debug)]
pub enum MediaError {
    // --- Validation ---
    #[error("media: invalid argument: {0}")]
    InvalidArgument(String),

    #[error("media: out of bounds: {0}")]
    OutOfBounds(String),

    #[error("media: time {time:?} out of bounds [0, {duration:?}]")]
    TimeOutOfBounds { time: Duration, duration: Duration },

    // --- Resource state ---
    #[error("media: an input stream is open")]
    InputStreamOpen,

    #[error("media: an output stream is open")]
    OutputStreamOpen,

    #[error("media: data file missing: {0}")]
    DataMissing(PathBuf),

    #[error("media: input too short: expected {expected} bytes, got {actual}")]
    InputTooShort { expected: u64, actual: u64 },

    // --- Format ---
    #[error("media: invalid format: {0}")]
    InvalidFormat(String),

    // --- Registry ---
    #[error("media: already manager of {0}")]
    AlreadyManagerOf(String),

    #[error("media: not manager of {0}")]
    NotManagerOf(String),

    #[error("media: not found: {0}")]
    NotFound(String),

    #[error("media: already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("media: factory cannot create {0}")]
    Factory(String),

    // --- Other ---
    #[error("media: cancelled")]
    Cancelled,

    #[error("media: config: {0}")]
    Config(String),

    #[error("media: io: {0}")]
    Io(#[from] io::Error),
}

/// Result type for managed media operations.
pub type MediaResult<T> = Result<T, MediaError>;

impl From<AudioError> for MediaError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::OutOfBounds { .. } => MediaError::OutOfBounds(e.to_string()),
            AudioError::InvalidFormat(msg) => MediaError::InvalidFormat(msg),
            AudioError::Io(io) => MediaError::Io(io),
        }
    }
}

impl From<serde_yaml::Error> for MediaError {
    fn from(e: serde_yaml::Error) -> Self {
        MediaError::Config(e.to_string())
    }
}
