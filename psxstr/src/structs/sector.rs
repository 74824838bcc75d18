//! Raw CD sector model and classifier.
//!
//! ## Layout
//!
//! A raw sector is 2352 bytes: a 12-byte sync pattern, a 4-byte header
//! (BCD minute, second, frame and the mode byte), and for Mode 2 an 8-byte
//! subheader stored twice. User data follows: 2048 bytes for Form 1, 2324
//! bytes for Form 2.
//!
//! ## Classification
//!
//! - **XA audio**: Form 2 sectors with the audio submode bit and a valid
//!   coding info byte.
//! - **STR video**: sectors whose user data starts with the 32-byte chunk
//!   header (`0x0160` status, `0x8001` type).
//! - Everything else is [`SectorKind::Other`].

use log::trace;

use crate::structs::audio::{
    AudioFormat, SOUND_GROUP_HEADER_SIZE, SOUND_GROUP_SIZE, SOUND_GROUPS_PER_SECTOR,
};
use crate::utils::errors::SectorError;

pub const SECTOR_SIZE: usize = 2352;
pub const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];
pub const SUBHEADER_OFFSET: usize = 16;
pub const USER_DATA_OFFSET: usize = 24;
pub const FORM1_USER_DATA_SIZE: usize = 2048;
pub const FORM2_USER_DATA_SIZE: usize = 2324;

pub const VIDEO_CHUNK_HEADER_SIZE: usize = 32;
pub const VIDEO_CHUNK_PAYLOAD_SIZE: usize = 2016;
pub const VIDEO_STATUS: u16 = 0x0160;
pub const VIDEO_TYPE: u16 = 0x8001;

/// Subheader submode flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubMode(pub u8);

impl SubMode {
    pub const END_OF_RECORD: u8 = 0x01;
    pub const VIDEO: u8 = 0x02;
    pub const AUDIO: u8 = 0x04;
    pub const DATA: u8 = 0x08;
    pub const TRIGGER: u8 = 0x10;
    pub const FORM2: u8 = 0x20;
    pub const REAL_TIME: u8 = 0x40;
    pub const END_OF_FILE: u8 = 0x80;

    #[inline(always)]
    pub fn has(&self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn end_of_record(&self) -> bool {
        self.has(Self::END_OF_RECORD)
    }

    pub fn end_of_file(&self) -> bool {
        self.has(Self::END_OF_FILE)
    }

    pub fn form2(&self) -> bool {
        self.has(Self::FORM2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubHeader {
    pub file: u8,
    pub channel: u8,
    pub submode: SubMode,
    pub coding_info: u8,
}

impl SubHeader {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            file: bytes[0],
            channel: bytes[1],
            submode: SubMode(bytes[2]),
            coding_info: bytes[3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XaAudioSector {
    pub format: AudioFormat,
    pub silent: bool,
}

/// Chunk header at the start of every STR video sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoSectorHeader {
    pub chunk_index: u16,
    pub chunk_count: u16,
    pub frame_number: u32,
    pub frame_size: u32,
    pub width: u16,
    pub height: u16,
    /// Copy of the first 8 bytes of the frame bitstream header.
    pub frame_header: [u8; 8],
}

impl VideoSectorHeader {
    /// Parses a chunk header. Returns `None` when the magic does not match or
    /// a field is out of range.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let u16_at = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);

        if data.len() < VIDEO_CHUNK_HEADER_SIZE
            || u16_at(0) != VIDEO_STATUS
            || u16_at(2) != VIDEO_TYPE
        {
            return None;
        }

        let mut frame_header = [0u8; 8];
        frame_header.copy_from_slice(&data[20..28]);

        let header = Self {
            chunk_index: u16_at(4),
            chunk_count: u16_at(6),
            frame_number: u32_at(8),
            frame_size: u32_at(12),
            width: u16_at(16),
            height: u16_at(18),
            frame_header,
        };

        header.is_valid().then_some(header)
    }

    pub fn is_valid(&self) -> bool {
        self.chunk_index < self.chunk_count
            && self.width != 0
            && self.height != 0
            && self.frame_size as usize <= self.chunk_count as usize * VIDEO_CHUNK_PAYLOAD_SIZE
    }

    pub fn to_bytes(&self) -> [u8; VIDEO_CHUNK_HEADER_SIZE] {
        let mut out = [0u8; VIDEO_CHUNK_HEADER_SIZE];
        out[0..2].copy_from_slice(&VIDEO_STATUS.to_le_bytes());
        out[2..4].copy_from_slice(&VIDEO_TYPE.to_le_bytes());
        out[4..6].copy_from_slice(&self.chunk_index.to_le_bytes());
        out[6..8].copy_from_slice(&self.chunk_count.to_le_bytes());
        out[8..12].copy_from_slice(&self.frame_number.to_le_bytes());
        out[12..16].copy_from_slice(&self.frame_size.to_le_bytes());
        out[16..18].copy_from_slice(&self.width.to_le_bytes());
        out[18..20].copy_from_slice(&self.height.to_le_bytes());
        out[20..28].copy_from_slice(&self.frame_header);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSector {
    pub header: VideoSectorHeader,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectorKind {
    Audio(XaAudioSector),
    Video(VideoSector),
    Other,
}

/// One classified disc sector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    pub number: u32,
    pub subheader: Option<SubHeader>,
    pub kind: SectorKind,
}

impl Sector {
    pub fn other(number: u32, subheader: Option<SubHeader>) -> Self {
        Self {
            number,
            subheader,
            kind: SectorKind::Other,
        }
    }

    pub fn audio(number: u32, format: AudioFormat, submode: SubMode, silent: bool) -> Self {
        Self {
            number,
            subheader: Some(SubHeader {
                file: format.file,
                channel: format.channel,
                submode: SubMode(submode.0 | SubMode::AUDIO | SubMode::FORM2),
                coding_info: format.to_coding_info(),
            }),
            kind: SectorKind::Audio(XaAudioSector { format, silent }),
        }
    }

    pub fn video(number: u32, channel: u8, submode: SubMode, header: VideoSectorHeader, payload: Vec<u8>) -> Self {
        Self {
            number,
            subheader: Some(SubHeader {
                file: 1,
                channel,
                submode: SubMode(submode.0 | SubMode::DATA),
                coding_info: 0,
            }),
            kind: SectorKind::Video(VideoSector { header, payload }),
        }
    }

    pub fn channel(&self) -> u8 {
        self.subheader.map_or(0, |sh| sh.channel)
    }

    pub fn end_of_file(&self) -> bool {
        self.subheader.is_some_and(|sh| sh.submode.end_of_file())
    }

    /// Classifies one raw 2352-byte sector.
    pub fn from_raw(number: u32, raw: &[u8]) -> Result<Self, SectorError> {
        if raw.len() != SECTOR_SIZE {
            return Err(SectorError::InvalidLength(raw.len()));
        }
        if raw[..12] != SYNC_PATTERN {
            return Err(SectorError::MissingSyncPattern(number));
        }

        match raw[15] {
            0 | 1 => return Ok(Self::other(number, None)),
            2 => {}
            mode => return Err(SectorError::UnsupportedMode { sector: number, mode }),
        }

        let subheader_bytes = &raw[SUBHEADER_OFFSET..USER_DATA_OFFSET];
        if subheader_bytes[..4] != subheader_bytes[4..] {
            return Err(SectorError::SubheaderMismatch(number));
        }
        let subheader = SubHeader::from_bytes(subheader_bytes);

        let user_size = if subheader.submode.form2() {
            FORM2_USER_DATA_SIZE
        } else {
            FORM1_USER_DATA_SIZE
        };
        let user_data = &raw[USER_DATA_OFFSET..USER_DATA_OFFSET + user_size];

        if subheader.submode.has(SubMode::AUDIO) && subheader.submode.form2() {
            let Some(format) = AudioFormat::from_coding_info(
                subheader.file,
                subheader.channel,
                subheader.coding_info,
            ) else {
                trace!(
                    "Sector {number}: audio submode with reserved coding info {:#04X}",
                    subheader.coding_info
                );
                return Ok(Self::other(number, Some(subheader)));
            };

            return Ok(Self {
                number,
                subheader: Some(subheader),
                kind: SectorKind::Audio(XaAudioSector {
                    format,
                    silent: is_silent(user_data),
                }),
            });
        }

        if let Some(header) = VideoSectorHeader::from_bytes(user_data) {
            let payload = user_data
                [VIDEO_CHUNK_HEADER_SIZE..VIDEO_CHUNK_HEADER_SIZE + VIDEO_CHUNK_PAYLOAD_SIZE]
                .to_vec();

            return Ok(Self {
                number,
                subheader: Some(subheader),
                kind: SectorKind::Video(VideoSector { header, payload }),
            });
        }

        Ok(Self::other(number, Some(subheader)))
    }
}

/// True when every sound group carries all-zero sample data.
pub fn is_silent(user_data: &[u8]) -> bool {
    user_data
        .chunks_exact(SOUND_GROUP_SIZE)
        .take(SOUND_GROUPS_PER_SECTOR)
        .all(|group| group[SOUND_GROUP_HEADER_SIZE..].iter().all(|&b| b == 0))
}

/// Builds a raw Mode 2 sector. Used to synthesize disc images.
pub fn build_raw(subheader: SubHeader, user_data: &[u8]) -> [u8; SECTOR_SIZE] {
    let mut raw = [0u8; SECTOR_SIZE];
    raw[..12].copy_from_slice(&SYNC_PATTERN);
    raw[15] = 2;

    let sh = [
        subheader.file,
        subheader.channel,
        subheader.submode.0,
        subheader.coding_info,
    ];
    raw[16..20].copy_from_slice(&sh);
    raw[20..24].copy_from_slice(&sh);

    let len = user_data.len().min(FORM2_USER_DATA_SIZE);
    raw[USER_DATA_OFFSET..USER_DATA_OFFSET + len].copy_from_slice(&user_data[..len]);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_audio_sector() -> anyhow::Result<()> {
        let subheader = SubHeader {
            file: 1,
            channel: 4,
            submode: SubMode(SubMode::AUDIO | SubMode::FORM2 | SubMode::REAL_TIME),
            coding_info: 0b0000_0001,
        };

        let mut user_data = vec![0u8; FORM2_USER_DATA_SIZE];
        // Sound group headers alone do not make a sector audible.
        user_data[..SOUND_GROUP_HEADER_SIZE].fill(0x0C);
        let sector = Sector::from_raw(10, &build_raw(subheader, &user_data))?;
        let SectorKind::Audio(audio) = &sector.kind else {
            panic!("expected audio, got {:?}", sector.kind);
        };
        assert!(audio.silent);
        assert_eq!(audio.format.sample_rate, 37800);
        assert!(audio.format.stereo);

        user_data[SOUND_GROUP_SIZE * 17 + 100] = 0x11;
        let sector = Sector::from_raw(11, &build_raw(subheader, &user_data))?;
        assert!(matches!(sector.kind, SectorKind::Audio(XaAudioSector { silent: false, .. })));
        Ok(())
    }

    #[test]
    fn classify_video_sector() -> anyhow::Result<()> {
        let header = VideoSectorHeader {
            chunk_index: 1,
            chunk_count: 3,
            frame_number: 42,
            frame_size: 5000,
            width: 320,
            height: 240,
            frame_header: [0; 8],
        };
        let mut user_data = header.to_bytes().to_vec();
        user_data.extend(std::iter::repeat_n(0xAB, VIDEO_CHUNK_PAYLOAD_SIZE));

        let subheader = SubHeader {
            file: 1,
            channel: 2,
            submode: SubMode(SubMode::DATA | SubMode::REAL_TIME),
            coding_info: 0,
        };
        let sector = Sector::from_raw(20, &build_raw(subheader, &user_data))?;
        let SectorKind::Video(video) = &sector.kind else {
            panic!("expected video, got {:?}", sector.kind);
        };
        assert_eq!(video.header, header);
        assert_eq!(video.payload.len(), VIDEO_CHUNK_PAYLOAD_SIZE);
        assert_eq!(sector.channel(), 2);

        // Chunk index past the count is not a video sector.
        let bad = VideoSectorHeader {
            chunk_index: 3,
            ..header
        };
        let mut user_data = bad.to_bytes().to_vec();
        user_data.resize(FORM1_USER_DATA_SIZE, 0);
        let sector = Sector::from_raw(21, &build_raw(subheader, &user_data))?;
        assert_eq!(sector.kind, SectorKind::Other);
        Ok(())
    }

    #[test]
    fn reject_malformed_sectors() {
        assert!(matches!(
            Sector::from_raw(0, &[0u8; 100]),
            Err(SectorError::InvalidLength(100))
        ));
        assert!(matches!(
            Sector::from_raw(5, &[0u8; SECTOR_SIZE]),
            Err(SectorError::MissingSyncPattern(5))
        ));

        let mut raw = build_raw(SubHeader::default(), &[]);
        raw[20] = 9;
        assert!(matches!(
            Sector::from_raw(6, &raw),
            Err(SectorError::SubheaderMismatch(6))
        ));

        raw[15] = 7;
        assert!(matches!(
            Sector::from_raw(7, &raw),
            Err(SectorError::UnsupportedMode { mode: 7, .. })
        ));
    }
}
