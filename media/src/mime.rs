//! MIME type to file extension mapping for generated data file names.

/// MIME type of RIFF/WAVE audio.
pub const AUDIO_WAV: &str = "audio/x-wav";

/// Extension used for MIME types not in the table.
pub const DEFAULT_EXTENSION: &str = ".bin";

const EXTENSIONS: &[(&str, &str)] = &[
    (AUDIO_WAV, ".wav"),
    ("audio/mpeg", ".mp3"),
    ("audio/mpeg-generic", ".mp4"),
    ("image/jpeg", ".jpg"),
    ("image/png", ".png"),
    ("image/svg+xml", ".svg"),
    ("text/css", ".css"),
    ("text/plain", ".txt"),
];

/// Returns the file extension (with leading dot) for `mime_type`.
pub fn extension_for(mime_type: &str) -> &'static str {
    EXTENSIONS
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(mime_type))
        .map(|(_, ext)| *ext)
        .unwrap_or(DEFAULT_EXTENSION)
}
