use crate::process::decode::{BLOCKS_PER_MACROBLOCK, PreviousDc, macroblock_count};
use crate::structs::frame::{FrameHeader, Variant};
use crate::structs::mdec::MdecCode;
use crate::utils::bitstream_io::BitstreamIoWriter;
use crate::utils::errors::EncodeError;
use crate::utils::vlc::{
    self, DC_CHROMA_TABLE, DC_LUMA_TABLE, END_OF_BLOCK, ESCAPE_CODE, ESCAPE_LEN,
};

/// Writes MDEC codes back into a frame bitstream.
///
/// Codes must come as whole blocks: a DC code, any AC codes, then
/// [`MdecCode::END_OF_BLOCK`], six blocks per macroblock. AC pairs missing
/// from the code table fall back to the variant's escape format.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    variant: Variant,
}

impl FrameEncoder {
    pub fn new(variant: Variant) -> Self {
        Self { variant }
    }

    pub fn encode(&self, codes: &[MdecCode], width: u16, height: u16) -> Result<Vec<u8>, EncodeError> {
        let blocks = split_blocks(codes)?;
        let expected = macroblock_count(width, height);
        if blocks.len() != expected * BLOCKS_PER_MACROBLOCK {
            return Err(EncodeError::BlockCountMismatch {
                expected,
                actual: blocks.len(),
            });
        }

        let header = self.header(&blocks, codes.len())?;
        let mut writer = BitstreamIoWriter::default();
        let mut previous_dc = PreviousDc::default();

        for (i, block) in blocks.iter().enumerate() {
            let position = i % BLOCKS_PER_MACROBLOCK;
            self.write_dc(&mut writer, &mut previous_dc, position, block[0])?;

            for code in &block[1..block.len() - 1] {
                self.write_ac(&mut writer, *code)?;
            }
            writer.put_n(END_OF_BLOCK.len, END_OF_BLOCK.code)?;
        }

        let mut frame = header.to_bytes().to_vec();
        frame.extend(writer.finish(self.variant.word_order())?);

        Ok(frame)
    }

    fn header(&self, blocks: &[&[MdecCode]], code_count: usize) -> Result<FrameHeader, EncodeError> {
        let qscale = |block: usize| {
            let q = blocks.get(block).map_or(1, |b| b[0].top6);
            if (1..=63).contains(&q) {
                Ok(q)
            } else {
                Err(EncodeError::QuantizationScale(q))
            }
        };

        let (luma_qscale, chroma_qscale, code_count) = match self.variant {
            Variant::Lain => (qscale(2)?, qscale(0)?, code_count as u16),
            _ => {
                let q = qscale(0)?;
                let half = (code_count.div_ceil(2) + 31) & !31;
                (q, q, half as u16)
            }
        };

        Ok(FrameHeader {
            variant: self.variant,
            luma_qscale,
            chroma_qscale,
            code_count,
        })
    }

    fn write_dc(
        &self,
        writer: &mut BitstreamIoWriter,
        previous_dc: &mut PreviousDc,
        block: usize,
        code: MdecCode,
    ) -> Result<(), EncodeError> {
        if !self.variant.has_differential_dc() {
            writer.put_s(10, code.bottom10)?;
            return Ok(());
        }

        let previous = previous_dc.slot(block);
        let diff = code.bottom10 as i32 - *previous;
        if diff % 4 != 0 {
            return Err(EncodeError::UnreachableDc {
                value: code.bottom10,
                previous: *previous as i16,
            });
        }

        let diff = diff / 4;
        let size = vlc::dc_size_of(diff);
        let table: &'static [vlc::DcVlc] = if block < 2 {
            &DC_CHROMA_TABLE
        } else {
            &DC_LUMA_TABLE
        };
        let Some(entry) = vlc::find_dc_size(table, size) else {
            return Err(EncodeError::DcDifferentialTooLarge(diff));
        };

        writer.put_n(entry.len, entry.code)?;
        writer.put_n(size, vlc::dc_differential_bits(diff, size))?;
        *previous = code.bottom10 as i32;

        Ok(())
    }

    fn write_ac(&self, writer: &mut BitstreamIoWriter, code: MdecCode) -> Result<(), EncodeError> {
        let (run, level) = (code.top6, code.bottom10);
        if run > 63 {
            return Err(EncodeError::RunOutOfRange(run));
        }

        let table = self.variant.ac_table();
        let magnitude = level.unsigned_abs();
        if let Some(entry) = u8::try_from(magnitude)
            .ok()
            .and_then(|m| vlc::find_ac(table, run, m))
        {
            writer.put_n(entry.len, entry.code)?;
            writer.put(level < 0)?;
            return Ok(());
        }

        writer.put_n(ESCAPE_LEN, ESCAPE_CODE)?;
        writer.put_n(6, run)?;

        let out_of_range = EncodeError::LevelOutOfRange {
            level,
            variant: self.variant.name(),
        };
        match self.variant {
            Variant::Lain => match level {
                -127..=127 if level != 0 => writer.put_n(8, level as i8 as u8)?,
                0..=255 => {
                    writer.put_n(8, 0x00u8)?;
                    writer.put_n(8, level as u8)?;
                }
                -256..=-128 => {
                    writer.put_n(8, 0x80u8)?;
                    writer.put_n(8, (level + 256) as u8)?;
                }
                _ => return Err(out_of_range),
            },
            _ => {
                if !(-512..=511).contains(&level) {
                    return Err(out_of_range);
                }
                writer.put_s(10, level)?;
            }
        }

        Ok(())
    }
}

/// Splits a code sequence into blocks, each running from its DC code through
/// its end-of-block code.
fn split_blocks(codes: &[MdecCode]) -> Result<Vec<&[MdecCode]>, EncodeError> {
    let mut blocks = Vec::new();
    let mut rest = codes;

    while !rest.is_empty() {
        if rest[0].is_end_of_block() {
            return Err(EncodeError::MissingDc(blocks.len()));
        }
        let Some(end) = rest[1..].iter().position(MdecCode::is_end_of_block) else {
            return Err(EncodeError::UnterminatedBlock(blocks.len()));
        };

        let (block, tail) = rest.split_at(end + 2);
        blocks.push(block);
        rest = tail;
    }

    Ok(blocks)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_codes(variant: Variant, macroblocks: usize) -> Vec<MdecCode> {
        // The first four pairs code differently in the MPEG-1 and Lain tables.
        let ac = [
            (1, 1),
            (0, -2),
            (0, 3),
            (2, -3),
            (0, 40),
            (1, -18),
            (5, 100),
            (0, -200),
            (3, 255),
            (10, -256),
        ];

        let mut codes = Vec::new();
        for mb in 0..macroblocks {
            for block in 0..BLOCKS_PER_MACROBLOCK {
                let qscale = match (variant, block) {
                    (Variant::Lain, 0 | 1) => 12,
                    (Variant::Lain, _) => 10,
                    _ => 8,
                };
                let dc = ((mb * 37 + block * 11) % 64) as i16 * 4 - 128;
                codes.push(MdecCode::dc(qscale, dc));

                // Vary the block contents so every code path is hit.
                let take = (mb * 5 + block) % (ac.len() + 1);
                codes.extend(ac[..take].iter().map(|&(run, level)| MdecCode::ac(run, level)));
                codes.push(MdecCode::END_OF_BLOCK);
            }
        }
        codes
    }

    #[test]
    fn round_trip_every_variant() -> anyhow::Result<()> {
        use crate::process::decode::FrameDecoder;

        for variant in Variant::DETECTION_ORDER {
            let codes = sample_codes(variant, 6);
            let frame = FrameEncoder::new(variant).encode(&codes, 48, 32)?;

            let mut decoder = FrameDecoder::new(&frame, 48, 32)?;
            assert_eq!(decoder.header().variant, variant);

            let decoded = decoder.by_ref().collect::<Result<Vec<_>, _>>()?;
            assert_eq!(decoded, codes, "{variant}");
            assert!(decoder.next().is_none());
        }
        Ok(())
    }

    #[test]
    fn str_header_counts_half_codes() -> anyhow::Result<()> {
        let codes = sample_codes(Variant::StrV2, 1);
        let frame = FrameEncoder::new(Variant::StrV2).encode(&codes, 16, 16)?;
        let header = FrameHeader::read(Variant::StrV2, &frame)?;

        assert_eq!(header.code_count as usize, (codes.len().div_ceil(2) + 31) & !31);
        assert_eq!(header.luma_qscale, 8);
        assert_eq!((frame.len() - 8) % 2, 0);
        Ok(())
    }

    #[test]
    fn encoder_rejects_bad_sequences() {
        let encoder = FrameEncoder::new(Variant::StrV3);
        let mut codes = sample_codes(Variant::StrV3, 1);

        assert!(matches!(
            encoder.encode(&codes, 32, 16),
            Err(EncodeError::BlockCountMismatch { expected: 2, actual: 6 })
        ));

        codes[0] = MdecCode::dc(8, 3);
        assert!(matches!(
            encoder.encode(&codes, 16, 16),
            Err(EncodeError::UnreachableDc { value: 3, previous: 0 })
        ));

        let codes = sample_codes(Variant::Lain, 1);
        let mut lain = codes.clone();
        lain.insert(1, MdecCode::ac(0, 300));
        assert!(matches!(
            FrameEncoder::new(Variant::Lain).encode(&lain, 16, 16),
            Err(EncodeError::LevelOutOfRange { level: 300, .. })
        ));

        assert!(matches!(
            FrameEncoder::new(Variant::StrV2).encode(&codes[..codes.len() - 1], 16, 16),
            Err(EncodeError::UnterminatedBlock(5))
        ));
    }
}
