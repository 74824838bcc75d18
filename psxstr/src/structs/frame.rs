//! STR frame bitstream variants and headers.
//!
//! Every frame starts with an 8-byte header followed by the entropy-coded
//! macroblocks. The header layout tells the variants apart:
//!
//! | Variant | Bytes 0-1        | Bytes 2-3 | Bytes 4-5     | Bytes 6-7 |
//! |---------|------------------|-----------|---------------|-----------|
//! | STRv2   | half code count  | `0x3800`  | qscale        | 2         |
//! | STRv3   | half code count  | `0x3800`  | qscale        | 3         |
//! | FF7     | half code count  | `0x3800`  | qscale        | 1         |
//! | Lain    | luma q, chroma q | `0x3800`  | code count    | 0         |
//!
//! All multi-byte fields are little-endian.

use std::fmt::Display;
use std::str::FromStr;

use crate::utils::bitstream_io::WordOrder;
use crate::utils::errors::HeaderError;
use crate::utils::vlc::{AcVlc, LAIN_AC_TABLE, MPEG1_AC_TABLE};

pub const FRAME_HEADER_SIZE: usize = 8;
pub const FRAME_MAGIC: u16 = 0x3800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    StrV2,
    StrV3,
    Lain,
    Ff7,
}

impl Variant {
    /// Order in which variants are tried against an unknown frame.
    pub const DETECTION_ORDER: [Variant; 4] =
        [Variant::StrV3, Variant::StrV2, Variant::Lain, Variant::Ff7];

    pub fn name(&self) -> &'static str {
        match self {
            Variant::StrV2 => "STRv2",
            Variant::StrV3 => "STRv3",
            Variant::Lain => "Lain",
            Variant::Ff7 => "FF7",
        }
    }

    pub fn version(&self) -> u16 {
        match self {
            Variant::Lain => 0,
            Variant::Ff7 => 1,
            Variant::StrV2 => 2,
            Variant::StrV3 => 3,
        }
    }

    pub fn word_order(&self) -> WordOrder {
        match self {
            Variant::Lain => WordOrder::Bytes,
            _ => WordOrder::Le16,
        }
    }

    /// Whether DC values are coded as differentials against the previous block.
    pub fn has_differential_dc(&self) -> bool {
        matches!(self, Variant::StrV3)
    }

    /// AC code table of the variant's bitstream.
    pub fn ac_table(&self) -> &'static [AcVlc] {
        match self {
            Variant::Lain => &LAIN_AC_TABLE,
            _ => &MPEG1_AC_TABLE,
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Variant {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v2" | "strv2" => Ok(Variant::StrV2),
            "v3" | "strv3" => Ok(Variant::StrV3),
            "lain" => Ok(Variant::Lain),
            "ff7" => Ok(Variant::Ff7),
            _ => Err(HeaderError::UnknownVariant),
        }
    }
}

/// Parsed 8-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub variant: Variant,
    pub luma_qscale: u8,
    pub chroma_qscale: u8,
    /// Half the code count rounded up to 32 for the STR family, the plain
    /// code count for Lain.
    pub code_count: u16,
}

impl FrameHeader {
    /// Reads the header as `variant`. Any mismatch means the frame is not of
    /// that variant.
    pub fn read(variant: Variant, data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(HeaderError::TooShort(data.len()));
        }
        let u16_at = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);

        let magic = u16_at(2);
        if magic != FRAME_MAGIC {
            return Err(HeaderError::InvalidMagic(magic));
        }

        let version = u16_at(6);
        if version != variant.version() {
            return Err(HeaderError::VersionMismatch {
                read: version,
                expected: variant.version(),
            });
        }

        let check_qscale = |q: u16| {
            if (1..=63).contains(&q) {
                Ok(q as u8)
            } else {
                Err(HeaderError::QuantizationScaleOutOfRange(q))
            }
        };

        match variant {
            Variant::Lain => Ok(Self {
                variant,
                luma_qscale: check_qscale(data[0] as u16)?,
                chroma_qscale: check_qscale(data[1] as u16)?,
                code_count: u16_at(4),
            }),
            _ => {
                let count = u16_at(0) as i16;
                if count < 0 {
                    return Err(HeaderError::NegativeCodeCount(count));
                }
                let qscale = check_qscale(u16_at(4))?;

                Ok(Self {
                    variant,
                    luma_qscale: qscale,
                    chroma_qscale: qscale,
                    code_count: count as u16,
                })
            }
        }
    }

    /// Tries each variant in [`Variant::DETECTION_ORDER`] and returns the
    /// first that accepts the header.
    pub fn detect(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < FRAME_HEADER_SIZE {
            return Err(HeaderError::TooShort(data.len()));
        }

        Variant::DETECTION_ORDER
            .iter()
            .find_map(|&variant| Self::read(variant, data).ok())
            .ok_or(HeaderError::UnknownVariant)
    }

    /// Quantization scale applied to block `block` (0 Cr, 1 Cb, 2-5 Y).
    pub fn qscale_for_block(&self, block: usize) -> u8 {
        if block < 2 {
            self.chroma_qscale
        } else {
            self.luma_qscale
        }
    }

    pub fn to_bytes(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut out = [0u8; FRAME_HEADER_SIZE];
        match self.variant {
            Variant::Lain => {
                out[0] = self.luma_qscale;
                out[1] = self.chroma_qscale;
                out[4..6].copy_from_slice(&self.code_count.to_le_bytes());
            }
            _ => {
                out[0..2].copy_from_slice(&self.code_count.to_le_bytes());
                out[4..6].copy_from_slice(&(self.luma_qscale as u16).to_le_bytes());
            }
        }
        out[2..4].copy_from_slice(&FRAME_MAGIC.to_le_bytes());
        out[6..8].copy_from_slice(&self.variant.version().to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_detection() -> anyhow::Result<()> {
        let v2 = [0x40, 0x00, 0x00, 0x38, 0x08, 0x00, 0x02, 0x00];
        let header = FrameHeader::detect(&v2)?;
        assert_eq!(header.variant, Variant::StrV2);
        assert_eq!(header.luma_qscale, 8);
        assert_eq!(header.code_count, 0x40);

        let v3 = [0x20, 0x00, 0x00, 0x38, 0x01, 0x00, 0x03, 0x00];
        assert_eq!(FrameHeader::detect(&v3)?.variant, Variant::StrV3);

        let lain = [0x0A, 0x0C, 0x00, 0x38, 0x90, 0x01, 0x00, 0x00];
        let header = FrameHeader::detect(&lain)?;
        assert_eq!(header.variant, Variant::Lain);
        assert_eq!((header.luma_qscale, header.chroma_qscale), (10, 12));
        assert_eq!(header.qscale_for_block(0), 12);
        assert_eq!(header.qscale_for_block(5), 10);
        assert_eq!(header.code_count, 400);

        let ff7 = [0x20, 0x00, 0x00, 0x38, 0x3F, 0x00, 0x01, 0x00];
        assert_eq!(FrameHeader::detect(&ff7)?.variant, Variant::Ff7);

        for header in [
            FrameHeader::detect(&v2)?,
            FrameHeader::detect(&lain)?,
        ] {
            assert_eq!(FrameHeader::read(header.variant, &header.to_bytes())?, header);
        }
        Ok(())
    }

    #[test]
    fn header_rejection() {
        let bad_magic = [0x40, 0x00, 0x01, 0x38, 0x08, 0x00, 0x02, 0x00];
        assert_eq!(
            FrameHeader::read(Variant::StrV2, &bad_magic),
            Err(HeaderError::InvalidMagic(0x3801))
        );

        let zero_q = [0x40, 0x00, 0x00, 0x38, 0x00, 0x00, 0x02, 0x00];
        assert_eq!(
            FrameHeader::read(Variant::StrV2, &zero_q),
            Err(HeaderError::QuantizationScaleOutOfRange(0))
        );

        let negative = [0x00, 0x80, 0x00, 0x38, 0x08, 0x00, 0x02, 0x00];
        assert!(matches!(
            FrameHeader::read(Variant::StrV2, &negative),
            Err(HeaderError::NegativeCodeCount(_))
        ));

        let v2 = [0x40, 0x00, 0x00, 0x38, 0x08, 0x00, 0x02, 0x00];
        assert_eq!(
            FrameHeader::read(Variant::StrV3, &v2),
            Err(HeaderError::VersionMismatch {
                read: 2,
                expected: 3
            })
        );

        let unknown = [0x40, 0x00, 0x00, 0x38, 0x08, 0x00, 0x09, 0x00];
        assert_eq!(FrameHeader::detect(&unknown), Err(HeaderError::UnknownVariant));
        assert_eq!(FrameHeader::detect(&[0; 4]), Err(HeaderError::TooShort(4)));
    }
}
