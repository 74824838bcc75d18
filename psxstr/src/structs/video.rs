//! STR video stream records.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::utils::disc_speed::DiscSpeed;
use crate::utils::errors::{IndexError, RecordError};
use crate::utils::fraction::Fraction;

/// How frame numbers of a stream are written: their range, the decimal width
/// needed to print the largest, and whether counting starts at one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameNumberFormat {
    pub first: u32,
    pub last: u32,
    pub digits: u8,
    pub one_based: bool,
}

impl FrameNumberFormat {
    pub fn new(first: u32, last: u32) -> Result<Self, RecordError> {
        if last < first {
            return Err(RecordError::InvalidFrameRange { first, last });
        }

        Ok(Self {
            first,
            last,
            digits: digits(last),
            one_based: first == 1,
        })
    }

    /// Zero-padded label for a frame number.
    pub fn label(&self, number: u32) -> String {
        format!("{:0width$}", number, width = self.digits as usize)
    }
}

fn digits(value: u32) -> u8 {
    value.checked_ilog10().map_or(1, |log| log as u8 + 1)
}

/// Accumulates frame numbers in arrival order.
#[derive(Debug, Clone)]
pub struct FrameNumberFormatBuilder {
    first: u32,
    last: u32,
    max: u32,
}

impl FrameNumberFormatBuilder {
    pub fn new(first: u32) -> Self {
        Self {
            first,
            last: first,
            max: first,
        }
    }

    pub fn last(&self) -> u32 {
        self.last
    }

    /// Records the next frame number. Repeats and numbers lower than the
    /// previous one are reported but still recorded.
    pub fn add(&mut self, number: u32, channel: u8, sector: u32) -> Result<(), IndexError> {
        let previous = self.last;
        self.last = number;
        self.max = self.max.max(number);
        self.first = self.first.min(number);

        if number == previous {
            Err(IndexError::DuplicateFrameNumber {
                channel,
                frame: number,
                sector,
            })
        } else if number < previous {
            Err(IndexError::FrameNumberBackwards {
                channel,
                frame: number,
                previous,
                sector,
            })
        } else {
            Ok(())
        }
    }

    pub fn build(&self) -> FrameNumberFormat {
        FrameNumberFormat {
            first: self.first,
            last: self.max,
            digits: digits(self.max),
            one_based: self.first == 1,
        }
    }
}

/// A completed video stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VideoStreamFields", into = "VideoStreamFields")]
pub struct FinalizedVideoStream {
    pub start_sector: u32,
    pub end_sector: u32,
    pub channel: u8,
    pub width: u16,
    pub height: u16,
    pub frame_count: u32,
    pub frame_format: FrameNumberFormat,
    pub sectors_per_frame: Fraction,
    /// Sectors between the stream start and the end of its first frame, when
    /// the first frame can be presented.
    pub presentation_offset: u32,
}

impl FinalizedVideoStream {
    /// Frames per second when played at `speed`.
    pub fn frames_per_second(&self, speed: DiscSpeed) -> Option<f64> {
        if self.sectors_per_frame.numerator() == 0 {
            return None;
        }
        Some(speed.sectors_per_second() as f64 / self.sectors_per_frame.as_f64())
    }

    pub fn duration_secs(&self, speed: DiscSpeed) -> Option<f64> {
        self.frames_per_second(speed)
            .map(|fps| self.frame_count as f64 / fps)
    }
}

impl Display for FinalizedVideoStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "channel {} {}x{}, {} frames ({}-{}), sectors {}-{}, {} sectors/frame",
            self.channel,
            self.width,
            self.height,
            self.frame_count,
            self.frame_format.first,
            self.frame_format.last,
            self.start_sector,
            self.end_sector,
            self.sectors_per_frame
        )
    }
}

#[derive(Serialize, Deserialize)]
struct VideoStreamFields {
    #[serde(rename = "Start sector")]
    start_sector: u32,
    #[serde(rename = "End sector")]
    end_sector: u32,
    #[serde(rename = "Channel")]
    channel: u8,
    #[serde(rename = "Width")]
    width: u16,
    #[serde(rename = "Height")]
    height: u16,
    #[serde(rename = "Frames")]
    frame_count: u32,
    #[serde(rename = "Frame digits")]
    digits: u8,
    #[serde(rename = "First frame")]
    first_frame: u32,
    #[serde(rename = "Last frame")]
    last_frame: u32,
    #[serde(rename = "Sectors/frame")]
    sectors_per_frame: String,
    #[serde(rename = "Presentation offset")]
    presentation_offset: u32,
}

impl TryFrom<VideoStreamFields> for FinalizedVideoStream {
    type Error = RecordError;

    fn try_from(fields: VideoStreamFields) -> Result<Self, Self::Error> {
        if fields.end_sector < fields.start_sector {
            return Err(RecordError::InvalidSectorRange {
                start: fields.start_sector,
                end: fields.end_sector,
            });
        }
        if fields.width == 0 || fields.height == 0 {
            return Err(RecordError::InvalidDimensions {
                width: fields.width,
                height: fields.height,
            });
        }
        if fields.frame_count == 0 {
            return Err(RecordError::NoFrames);
        }

        let mut frame_format = FrameNumberFormat::new(fields.first_frame, fields.last_frame)?;
        frame_format.digits = frame_format.digits.max(fields.digits);

        Ok(Self {
            start_sector: fields.start_sector,
            end_sector: fields.end_sector,
            channel: fields.channel,
            width: fields.width,
            height: fields.height,
            frame_count: fields.frame_count,
            frame_format,
            sectors_per_frame: fields.sectors_per_frame.parse()?,
            presentation_offset: fields.presentation_offset,
        })
    }
}

impl From<FinalizedVideoStream> for VideoStreamFields {
    fn from(stream: FinalizedVideoStream) -> Self {
        Self {
            start_sector: stream.start_sector,
            end_sector: stream.end_sector,
            channel: stream.channel,
            width: stream.width,
            height: stream.height,
            frame_count: stream.frame_count,
            digits: stream.frame_format.digits,
            first_frame: stream.frame_format.first,
            last_frame: stream.frame_format.last,
            sectors_per_frame: stream.sectors_per_frame.to_string(),
            presentation_offset: stream.presentation_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_number_builder() {
        let mut builder = FrameNumberFormatBuilder::new(1);
        for number in 2..=120 {
            assert!(builder.add(number, 0, number * 10).is_ok());
        }
        assert!(matches!(
            builder.add(120, 0, 1210),
            Err(IndexError::DuplicateFrameNumber { frame: 120, .. })
        ));
        assert!(matches!(
            builder.add(7, 0, 1220),
            Err(IndexError::FrameNumberBackwards { previous: 120, .. })
        ));

        let format = builder.build();
        assert_eq!((format.first, format.last, format.digits), (1, 120, 3));
        assert!(format.one_based);
        assert_eq!(format.label(7), "007");

        let format = FrameNumberFormatBuilder::new(0).build();
        assert!(!format.one_based);
        assert_eq!(format.digits, 1);
    }

    #[test]
    fn video_record_round_trip() -> anyhow::Result<()> {
        let stream = FinalizedVideoStream {
            start_sector: 150,
            end_sector: 1649,
            channel: 1,
            width: 320,
            height: 240,
            frame_count: 200,
            frame_format: FrameNumberFormat::new(1, 200)?,
            sectors_per_frame: Fraction::new(15, 2).unwrap(),
            presentation_offset: 7,
        };

        let yaml = serde_yaml_ng::to_string(&stream)?;
        assert!(yaml.contains("Sectors/frame: 15/2"));
        let parsed: FinalizedVideoStream = serde_yaml_ng::from_str(&yaml)?;
        assert_eq!(parsed, stream);
        assert_eq!(parsed.frames_per_second(DiscSpeed::Double), Some(20.0));

        let bad = yaml.replace("Width: 320", "Width: 0");
        assert!(serde_yaml_ng::from_str::<FinalizedVideoStream>(&bad).is_err());
        let bad = yaml.replace("Sectors/frame: 15/2", "Sectors/frame: 15/0");
        assert!(serde_yaml_ng::from_str::<FinalizedVideoStream>(&bad).is_err());
        Ok(())
    }
}
