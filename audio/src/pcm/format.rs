//! PCM format description.

use std::fmt;
use std::io::{self, Read};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, AudioResult};

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Describes the layout of interleaved PCM samples.
///
/// The fields are only reachable through validating constructors and setters,
/// so a value always satisfies `channels >= 1`, `sample_rate >= 1` and
/// `bit_depth` being a non-zero multiple of 8. The block align must fit in a
/// `u16` and the byte rate in a `u32`, as in a RIFF `fmt ` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPcmFormat")]
pub struct PcmFormatInfo {
    channels: u16,
    sample_rate: u32,
    bit_depth: u16,
}

#[derive(Deserialize)]
struct RawPcmFormat {
    channels: u16,
    sample_rate: u32,
    bit_depth: u16,
}

impl TryFrom<RawPcmFormat> for PcmFormatInfo {
    type Error = AudioError;

    fn try_from(raw: RawPcmFormat) -> AudioResult<Self> {
        PcmFormatInfo::new(raw.channels, raw.sample_rate, raw.bit_depth)
    }
}

impl PcmFormatInfo {
    /// Creates a validated format.
    pub fn new(channels: u16, sample_rate: u32, bit_depth: u16) -> AudioResult<Self> {
        check_channels(channels)?;
        check_sample_rate(sample_rate)?;
        check_bit_depth(bit_depth)?;
        check_layout(channels, sample_rate, bit_depth)?;
        Ok(Self {
            channels,
            sample_rate,
            bit_depth,
        })
    }

    const fn preset(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            bit_depth: 16,
        }
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Sample frames per second.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Bits per sample of one channel.
    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
    }

    /// Sets the channel count. Fails and leaves the value unchanged if zero
    /// or if the resulting frame size overflows.
    pub fn set_channels(&mut self, channels: u16) -> AudioResult<()> {
        check_channels(channels)?;
        check_layout(channels, self.sample_rate, self.bit_depth)?;
        self.channels = channels;
        Ok(())
    }

    /// Sets the sample rate. Fails and leaves the value unchanged if zero or
    /// if the byte rate overflows.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> AudioResult<()> {
        check_sample_rate(sample_rate)?;
        check_layout(self.channels, sample_rate, self.bit_depth)?;
        self.sample_rate = sample_rate;
        Ok(())
    }

    /// Sets the bit depth. Fails and leaves the value unchanged unless it is
    /// a non-zero multiple of 8 that keeps the frame size in range.
    pub fn set_bit_depth(&mut self, bit_depth: u16) -> AudioResult<()> {
        check_bit_depth(bit_depth)?;
        check_layout(self.channels, self.sample_rate, bit_depth)?;
        self.bit_depth = bit_depth;
        Ok(())
    }

    /// Bytes per sample frame (all channels).
    pub fn block_align(&self) -> u16 {
        self.channels * (self.bit_depth / 8)
    }

    /// Bytes per second.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.block_align())
    }

    /// True when both formats describe the same sample layout.
    ///
    /// No implicit resampling or channel conversion is ever assumed.
    pub fn is_compatible_with(&self, other: &PcmFormatInfo) -> bool {
        self.channels == other.channels
            && self.sample_rate == other.sample_rate
            && self.bit_depth == other.bit_depth
    }

    /// Returns the byte length of `duration`, rounded to the nearest whole
    /// sample frame.
    pub fn data_length(&self, duration: Duration) -> u64 {
        let rate = u128::from(self.sample_rate);
        let blocks = (duration.as_nanos() * rate + NANOS_PER_SEC / 2) / NANOS_PER_SEC;
        saturate(blocks * u128::from(self.block_align()))
    }

    /// Returns the playback duration of `byte_len` bytes, rounded to the
    /// nearest nanosecond.
    pub fn duration(&self, byte_len: u64) -> Duration {
        let byte_rate = u128::from(self.byte_rate());
        let nanos = (u128::from(byte_len) * NANOS_PER_SEC + byte_rate / 2) / byte_rate;
        Duration::from_nanos(saturate(nanos))
    }

    /// Number of whole sample frames in `byte_len` bytes.
    pub fn block_count(&self, byte_len: u64) -> u64 {
        byte_len / u64::from(self.block_align())
    }

    /// Rounds `byte_len` down to a whole number of sample frames.
    pub fn align_down(&self, byte_len: u64) -> u64 {
        self.block_count(byte_len) * u64::from(self.block_align())
    }

    /// Returns a reader producing `duration` worth of zeroed PCM.
    pub fn silence(&self, duration: Duration) -> io::Take<io::Repeat> {
        io::repeat(0).take(self.data_length(duration))
    }
}

// Common format presets
impl PcmFormatInfo {
    /// 16-bit 22.05kHz mono
    pub const MONO_22K: PcmFormatInfo = PcmFormatInfo::preset(1, 22050);
    /// 16-bit 44.1kHz mono
    pub const MONO_44K: PcmFormatInfo = PcmFormatInfo::preset(1, 44100);
    /// 16-bit 48kHz mono
    pub const MONO_48K: PcmFormatInfo = PcmFormatInfo::preset(1, 48000);
    /// 16-bit 44.1kHz stereo (CD quality)
    pub const STEREO_44K: PcmFormatInfo = PcmFormatInfo::preset(2, 44100);
    /// 16-bit 48kHz stereo
    pub const STEREO_48K: PcmFormatInfo = PcmFormatInfo::preset(2, 48000);
}

impl Default for PcmFormatInfo {
    fn default() -> Self {
        Self::MONO_44K
    }
}

impl fmt::Display for PcmFormatInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch {}Hz {}bit",
            self.channels, self.sample_rate, self.bit_depth
        )
    }
}

fn check_channels(channels: u16) -> AudioResult<()> {
    if channels == 0 {
        return Err(AudioError::OutOfBounds {
            field: "channels",
            value: 0,
        });
    }
    Ok(())
}

fn check_sample_rate(sample_rate: u32) -> AudioResult<()> {
    if sample_rate == 0 {
        return Err(AudioError::OutOfBounds {
            field: "sample rate",
            value: 0,
        });
    }
    Ok(())
}

fn check_bit_depth(bit_depth: u16) -> AudioResult<()> {
    if bit_depth == 0 || bit_depth % 8 != 0 {
        return Err(AudioError::OutOfBounds {
            field: "bit depth",
            value: u64::from(bit_depth),
        });
    }
    Ok(())
}

/// Block align must fit in `u16` and byte rate in `u32`.
fn check_layout(channels: u16, sample_rate: u32, bit_depth: u16) -> AudioResult<()> {
    let block_align = channels
        .checked_mul(bit_depth / 8)
        .ok_or(AudioError::OutOfBounds {
            field: "block align",
            value: u64::from(channels) * u64::from(bit_depth / 8),
        })?;
    sample_rate
        .checked_mul(u32::from(block_align))
        .ok_or(AudioError::OutOfBounds {
            field: "byte rate",
            value: u64::from(sample_rate) * u64::from(block_align),
        })?;
    Ok(())
}

fn saturate(v: u128) -> u64 {
    u64::try_from(v).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_properties() {
        let format = PcmFormatInfo::MONO_44K;
        assert_eq!(format.channels(), 1);
        assert_eq!(format.sample_rate(), 44100);
        assert_eq!(format.bit_depth(), 16);
        assert_eq!(format.block_align(), 2);
        assert_eq!(format.byte_rate(), 88200);

        let stereo = PcmFormatInfo::new(2, 48000, 24).unwrap();
        assert_eq!(stereo.block_align(), 6);
        assert_eq!(stereo.byte_rate(), 288000);
    }

    #[test]
    fn test_new_rejects_out_of_bounds() {
        assert!(matches!(
            PcmFormatInfo::new(0, 44100, 16),
            Err(AudioError::OutOfBounds { field: "channels", .. })
        ));
        assert!(matches!(
            PcmFormatInfo::new(1, 0, 16),
            Err(AudioError::OutOfBounds { field: "sample rate", .. })
        ));
        assert!(PcmFormatInfo::new(1, 44100, 0).is_err());
        assert!(PcmFormatInfo::new(1, 44100, 12).is_err());
        assert!(PcmFormatInfo::new(1, 44100, 8).is_ok());
    }

    #[test]
    fn test_new_rejects_overflowing_layout() {
        assert!(matches!(
            PcmFormatInfo::new(65535, 44100, 16),
            Err(AudioError::OutOfBounds { field: "block align", value: 131070 })
        ));
        assert!(matches!(
            PcmFormatInfo::new(2, 4_000_000_000, 16),
            Err(AudioError::OutOfBounds { field: "byte rate", value: 16_000_000_000 })
        ));
        assert!(PcmFormatInfo::new(1, 1, 65528).is_ok());

        let widest = PcmFormatInfo::new(32767, 1, 16).unwrap();
        assert_eq!(widest.block_align(), 65534);
        assert_eq!(widest.byte_rate(), 65534);
        assert_eq!(widest.block_count(131068), 2);
    }

    #[test]
    fn test_setters_reject_overflowing_layout() {
        let mut format = PcmFormatInfo::STEREO_48K;
        assert!(format.set_channels(40000).is_err());
        assert!(format.set_sample_rate(u32::MAX).is_err());
        assert_eq!(format, PcmFormatInfo::STEREO_48K);

        let mut wide = PcmFormatInfo::new(8192, 1, 16).unwrap();
        assert!(wide.set_bit_depth(64).is_err());
        assert_eq!(wide.bit_depth(), 16);
    }

    #[test]
    fn test_setters_leave_value_on_error() {
        let mut format = PcmFormatInfo::MONO_44K;
        assert!(format.set_channels(0).is_err());
        assert!(format.set_sample_rate(0).is_err());
        assert!(format.set_bit_depth(7).is_err());
        assert_eq!(format, PcmFormatInfo::MONO_44K);

        format.set_channels(2).unwrap();
        format.set_sample_rate(22050).unwrap();
        format.set_bit_depth(8).unwrap();
        assert_eq!(format, PcmFormatInfo::new(2, 22050, 8).unwrap());
    }

    #[test]
    fn test_data_length() {
        let format = PcmFormatInfo::MONO_44K;
        assert_eq!(format.data_length(Duration::from_secs(1)), 88200);
        assert_eq!(format.data_length(Duration::from_millis(400)), 35280);
        assert_eq!(format.data_length(Duration::ZERO), 0);

        let stereo = PcmFormatInfo::STEREO_44K;
        assert_eq!(stereo.data_length(Duration::from_millis(100)), 17640);
    }

    #[test]
    fn test_duration() {
        let format = PcmFormatInfo::MONO_44K;
        assert_eq!(format.duration(88200), Duration::from_secs(1));
        assert_eq!(format.duration(35280), Duration::from_millis(400));
        assert_eq!(format.duration(0), Duration::ZERO);
    }

    #[test]
    fn test_length_duration_round_trip_within_one_block() {
        let formats = [
            PcmFormatInfo::MONO_22K,
            PcmFormatInfo::MONO_44K,
            PcmFormatInfo::STEREO_48K,
            PcmFormatInfo::new(3, 8000, 8).unwrap(),
            PcmFormatInfo::new(2, 96000, 32).unwrap(),
            PcmFormatInfo::new(1, 1, 16).unwrap(),
        ];
        let lengths = [0u64, 1, 2, 3, 5, 100, 999, 4097, 88_199, 1_000_003, 123_456_789];
        for format in formats {
            let block = u64::from(format.block_align());
            for n in lengths {
                let back = format.data_length(format.duration(n));
                assert!(
                    back.abs_diff(n) <= block,
                    "{format}: {n} -> {back} (block {block})"
                );
            }
        }
    }

    #[test]
    fn test_compatibility_is_pointwise_equality() {
        let formats = [
            PcmFormatInfo::MONO_44K,
            PcmFormatInfo::STEREO_44K,
            PcmFormatInfo::MONO_48K,
            PcmFormatInfo::new(1, 44100, 8).unwrap(),
        ];
        for a in &formats {
            assert!(a.is_compatible_with(a));
            for b in &formats {
                assert_eq!(a.is_compatible_with(b), b.is_compatible_with(a));
                assert_eq!(a.is_compatible_with(b), a == b);
            }
        }
    }

    #[test]
    fn test_copy_is_independent() {
        let original = PcmFormatInfo::MONO_44K;
        let mut copy = original;
        copy.set_channels(2).unwrap();
        assert_eq!(original.channels(), 1);
        assert_eq!(copy.channels(), 2);
    }

    #[test]
    fn test_silence() {
        let format = PcmFormatInfo::MONO_44K;
        let mut data = Vec::new();
        format
            .silence(Duration::from_millis(10))
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(data.len(), 882);
        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_align_down() {
        let format = PcmFormatInfo::STEREO_44K;
        assert_eq!(format.block_count(10), 2);
        assert_eq!(format.align_down(10), 8);
        assert_eq!(format.align_down(8), 8);
    }

    #[test]
    fn test_serde_validates() {
        let format: PcmFormatInfo =
            serde_yaml::from_str("channels: 2\nsample_rate: 48000\nbit_depth: 16\n").unwrap();
        assert_eq!(format, PcmFormatInfo::STEREO_48K);

        let bad: Result<PcmFormatInfo, _> =
            serde_yaml::from_str("channels: 0\nsample_rate: 48000\nbit_depth: 16\n");
        assert!(bad.is_err());

        let yaml = serde_yaml::to_string(&PcmFormatInfo::MONO_44K).unwrap();
        assert!(yaml.contains("sample_rate: 44100"));
    }

    #[test]
    fn test_display() {
        assert_eq!(PcmFormatInfo::STEREO_44K.to_string(), "2ch 44100Hz 16bit");
    }
}
