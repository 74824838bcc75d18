//! XA ADPCM audio stream records.
//!
//! An interleaved XA stream occupies every `stride`th sector of the disc for
//! one (file, channel) pair. The stride together with the audio format fixes
//! the drive speed the stream was mastered for.
//!
//! ## Persisted Form
//!
//! [`FinalizedAudioStream`] serializes as a flat map of human-readable keys.
//! Deserialization validates every invariant, so a damaged record is rejected
//! on its own without affecting its neighbours in an index file.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::utils::bitset::SectorBitSet;
use crate::utils::disc_speed::DiscSpeed;
use crate::utils::errors::RecordError;

/// Samples per sound unit.
pub const SAMPLES_PER_SOUND_UNIT: usize = 28;
pub const SOUND_GROUPS_PER_SECTOR: usize = 18;
pub const SOUND_GROUP_SIZE: usize = 128;
pub const SOUND_GROUP_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub file: u8,
    pub channel: u8,
    pub sample_rate: u32,
    pub bits_per_sample: u8,
    pub stereo: bool,
}

impl AudioFormat {
    /// Decodes the subheader coding info byte. Reserved values yield `None`.
    pub fn from_coding_info(file: u8, channel: u8, coding_info: u8) -> Option<Self> {
        let stereo = match coding_info & 0x03 {
            0 => false,
            1 => true,
            _ => return None,
        };
        let sample_rate = match (coding_info >> 2) & 0x03 {
            0 => 37800,
            1 => 18900,
            _ => return None,
        };
        let bits_per_sample = match (coding_info >> 4) & 0x03 {
            0 => 4,
            1 => 8,
            _ => return None,
        };

        Some(Self {
            file,
            channel,
            sample_rate,
            bits_per_sample,
            stereo,
        })
    }

    pub fn to_coding_info(&self) -> u8 {
        let stereo = self.stereo as u8;
        let rate = if self.sample_rate == 18900 { 1 } else { 0 };
        let bits = if self.bits_per_sample == 8 { 1 } else { 0 };

        stereo | (rate << 2) | (bits << 4)
    }

    pub fn channels(&self) -> u32 {
        if self.stereo { 2 } else { 1 }
    }

    /// Sample frames (one sample per channel) carried by one sector.
    pub fn sample_frames_per_sector(&self) -> u32 {
        let units_per_group = if self.bits_per_sample == 4 { 8 } else { 4 };
        let samples = SOUND_GROUPS_PER_SECTOR * units_per_group * SAMPLES_PER_SOUND_UNIT;

        samples as u32 / self.channels()
    }

    fn validate(&self) -> Result<(), RecordError> {
        if !matches!(self.sample_rate, 18900 | 37800) {
            return Err(RecordError::InvalidSampleRate(self.sample_rate));
        }
        if !matches!(self.bits_per_sample, 4 | 8) {
            return Err(RecordError::InvalidBitsPerSample(self.bits_per_sample));
        }
        Ok(())
    }
}

impl Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "file {} channel {}, {} Hz {}-bit {}",
            self.file,
            self.channel,
            self.sample_rate,
            self.bits_per_sample,
            if self.stereo { "stereo" } else { "mono" }
        )
    }
}

/// Sector distance between consecutive sectors of one audio stream.
///
/// `-1` means the stream never saw a second sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorStride(i32);

impl SectorStride {
    pub const UNKNOWN: SectorStride = SectorStride(-1);

    pub const LEGAL: [i32; 7] = [-1, 1, 2, 4, 8, 16, 32];

    pub fn get(&self) -> i32 {
        self.0
    }

    pub fn is_known(&self) -> bool {
        self.0 > 0
    }
}

impl TryFrom<i32> for SectorStride {
    type Error = RecordError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if Self::LEGAL.contains(&value) {
            Ok(Self(value))
        } else {
            Err(RecordError::InvalidStride(value))
        }
    }
}

impl Display for SectorStride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A completed audio stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AudioStreamFields", into = "AudioStreamFields")]
pub struct FinalizedAudioStream {
    pub start_sector: u32,
    pub end_sector: u32,
    pub format: AudioFormat,
    pub stride: SectorStride,
    pub disc_speed: Option<DiscSpeed>,
    /// Stream-relative ordinals of sectors holding non-silent audio.
    pub audible_sectors: SectorBitSet,
}

impl FinalizedAudioStream {
    /// Builds a record, enforcing the stride and disc speed invariants.
    pub fn new(
        start_sector: u32,
        end_sector: u32,
        format: AudioFormat,
        stride: SectorStride,
        audible_sectors: SectorBitSet,
    ) -> Result<Self, RecordError> {
        if end_sector < start_sector {
            return Err(RecordError::InvalidSectorRange {
                start: start_sector,
                end: end_sector,
            });
        }
        format.validate()?;

        let disc_speed = if stride.get() > 1 {
            DiscSpeed::calculate(
                format.sample_rate,
                format.stereo,
                format.bits_per_sample,
                stride.get(),
            )
        } else {
            None
        };

        Ok(Self {
            start_sector,
            end_sector,
            format,
            stride,
            disc_speed,
            audible_sectors,
        })
    }

    /// Number of sectors the stream occupies.
    pub fn sector_count(&self) -> u32 {
        match self.stride.get() {
            s if s > 0 => (self.end_sector - self.start_sector) / s as u32 + 1,
            _ => 1,
        }
    }

    pub fn sample_frames(&self) -> u64 {
        self.sector_count() as u64 * self.format.sample_frames_per_sector() as u64
    }

    pub fn duration_secs(&self) -> f64 {
        self.sample_frames() as f64 / self.format.sample_rate as f64
    }

    pub fn is_silent(&self) -> bool {
        self.audible_sectors.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct AudioStreamFields {
    #[serde(rename = "Start sector")]
    start_sector: u32,
    #[serde(rename = "End sector")]
    end_sector: u32,
    #[serde(rename = "File")]
    file: u8,
    #[serde(rename = "Channel")]
    channel: u8,
    #[serde(rename = "Samples/sec")]
    sample_rate: u32,
    #[serde(rename = "Bits/sample")]
    bits_per_sample: u8,
    #[serde(rename = "Stereo")]
    stereo: bool,
    #[serde(rename = "Sector stride")]
    stride: i32,
    #[serde(rename = "Disc speed")]
    disc_speed: String,
    #[serde(rename = "Audible sectors", default)]
    audible_sectors: String,
}

impl TryFrom<AudioStreamFields> for FinalizedAudioStream {
    type Error = RecordError;

    fn try_from(fields: AudioStreamFields) -> Result<Self, Self::Error> {
        let stride = SectorStride::try_from(fields.stride)?;
        let declared_speed = DiscSpeed::from_field(&fields.disc_speed)?;
        let format = AudioFormat {
            file: fields.file,
            channel: fields.channel,
            sample_rate: fields.sample_rate,
            bits_per_sample: fields.bits_per_sample,
            stereo: fields.stereo,
        };

        let stream = Self::new(
            fields.start_sector,
            fields.end_sector,
            format,
            stride,
            fields.audible_sectors.parse()?,
        )?;

        if stream.disc_speed != declared_speed {
            return Err(RecordError::DiscSpeedMismatch {
                speed: fields.disc_speed,
                stride: fields.stride,
            });
        }

        Ok(stream)
    }
}

impl From<FinalizedAudioStream> for AudioStreamFields {
    fn from(stream: FinalizedAudioStream) -> Self {
        Self {
            start_sector: stream.start_sector,
            end_sector: stream.end_sector,
            file: stream.format.file,
            channel: stream.format.channel,
            sample_rate: stream.format.sample_rate,
            bits_per_sample: stream.format.bits_per_sample,
            stereo: stream.format.stereo,
            stride: stream.stride.get(),
            disc_speed: DiscSpeed::to_field(stream.disc_speed),
            audible_sectors: stream.audible_sectors.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_stream() -> FinalizedAudioStream {
        let mut audible = SectorBitSet::new();
        audible.set(0, true);
        audible.set(2, true);

        FinalizedAudioStream::new(
            100,
            124,
            AudioFormat {
                file: 1,
                channel: 3,
                sample_rate: 37800,
                bits_per_sample: 4,
                stereo: true,
            },
            SectorStride::try_from(8).unwrap(),
            audible,
        )
        .unwrap()
    }

    #[test]
    fn coding_info_fields() {
        let format = AudioFormat::from_coding_info(1, 2, 0b0001_0101).unwrap();
        assert!(format.stereo);
        assert_eq!(format.sample_rate, 18900);
        assert_eq!(format.bits_per_sample, 8);
        assert_eq!(format.to_coding_info(), 0b0001_0101);
        assert_eq!(format.sample_frames_per_sector(), 1008);

        assert!(AudioFormat::from_coding_info(0, 0, 0b0000_0010).is_none());
        assert!(AudioFormat::from_coding_info(0, 0, 0b0010_0000).is_none());
    }

    #[test]
    fn stride_invariant() {
        for stride in SectorStride::LEGAL {
            assert!(SectorStride::try_from(stride).is_ok());
        }
        for stride in [0, 3, 5, 64, -2] {
            assert_eq!(
                SectorStride::try_from(stride),
                Err(RecordError::InvalidStride(stride))
            );
        }

        let stream = sample_stream();
        assert_eq!(stream.disc_speed, Some(DiscSpeed::Double));
        assert_eq!(stream.sector_count(), 4);

        let single = FinalizedAudioStream::new(
            5,
            5,
            stream.format,
            SectorStride::UNKNOWN,
            SectorBitSet::new(),
        )
        .unwrap();
        assert_eq!(single.disc_speed, None);
        assert_eq!(single.sector_count(), 1);
    }

    #[test]
    fn audio_record_round_trip() -> anyhow::Result<()> {
        let stream = sample_stream();
        let yaml = serde_yaml_ng::to_string(&stream)?;
        assert!(yaml.contains("Sector stride: 8"));
        assert!(yaml.contains("Disc speed: 2x"));
        assert!(yaml.contains("Audible sectors:"));

        let parsed: FinalizedAudioStream = serde_yaml_ng::from_str(&yaml)?;
        assert_eq!(parsed, stream);
        Ok(())
    }

    #[test]
    fn audio_record_rejects_bad_fields() -> anyhow::Result<()> {
        let yaml = serde_yaml_ng::to_string(&sample_stream())?;

        let bad_stride = yaml.replace("Sector stride: 8", "Sector stride: 3");
        let err = serde_yaml_ng::from_str::<FinalizedAudioStream>(&bad_stride).unwrap_err();
        assert!(err.to_string().contains("Sector stride"));

        let bad_speed = yaml.replace("Disc speed: 2x", "Disc speed: 4x");
        assert!(serde_yaml_ng::from_str::<FinalizedAudioStream>(&bad_speed).is_err());

        let wrong_speed = yaml.replace("Disc speed: 2x", "Disc speed: 1x");
        assert!(serde_yaml_ng::from_str::<FinalizedAudioStream>(&wrong_speed).is_err());
        Ok(())
    }
}
