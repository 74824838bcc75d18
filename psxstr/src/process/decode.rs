use std::io;

use anyhow::Result;
use log::Level::Warn;
use log::trace;

use crate::log_or_err;
use crate::process::demux::DemuxedFrame;
use crate::structs::frame::{FRAME_HEADER_SIZE, FrameHeader, Variant};
use crate::structs::mdec::MdecCode;
use crate::utils::bitstream_io::BsIoVecReader;
use crate::utils::errors::{DecodeError, FrameError};
use crate::utils::vlc::{
    self, DC_CHROMA_TABLE, DC_LUMA_TABLE, END_OF_BLOCK, ESCAPE_CODE, ESCAPE_LEN, MAX_AC_LEN,
    MAX_DC_LEN,
};

pub const BLOCKS_PER_MACROBLOCK: usize = 6;
pub const COEFFICIENTS_PER_BLOCK: usize = 64;

/// Number of 16x16 macroblocks covering a `width` x `height` frame.
pub fn macroblock_count(width: u16, height: u16) -> usize {
    (width as usize).div_ceil(16) * (height as usize).div_ceil(16)
}

/// Running DC values for STRv3 differential prediction, one per component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviousDc {
    pub cr: i32,
    pub cb: i32,
    pub y: i32,
}

impl PreviousDc {
    pub fn slot(&mut self, block: usize) -> &mut i32 {
        match block {
            0 => &mut self.cr,
            1 => &mut self.cb,
            _ => &mut self.y,
        }
    }
}

/// Cursor over the macroblock structure of one frame.
#[derive(Debug, Clone, Default)]
pub struct DecoderState {
    pub macroblock: usize,
    /// 0 Cr, 1 Cb, 2-5 Y.
    pub block: usize,
    /// Coefficients consumed in the current block, DC included.
    pub position: usize,
    pub expecting_dc: bool,
    pub previous_dc: PreviousDc,
}

/// Pull decoder turning one frame bitstream into MDEC codes.
///
/// Each block yields its DC code, its AC codes and an end-of-block code.
/// After the last block of the last macroblock [`next_code`] returns
/// `Ok(None)`. The first error ends the frame: later calls return `Ok(None)`.
///
/// [`next_code`]: FrameDecoder::next_code
#[derive(Debug)]
pub struct FrameDecoder {
    header: FrameHeader,
    reader: BsIoVecReader,
    macroblocks: usize,
    state: DecoderState,
    done: bool,
}

impl FrameDecoder {
    /// Detects the variant from the frame header.
    pub fn new(data: &[u8], width: u16, height: u16) -> Result<Self, FrameError> {
        let header = FrameHeader::detect(data)?;
        Self::with_header(header, data, width, height)
    }

    /// Decodes as `variant` without trying the others.
    pub fn with_variant(variant: Variant, data: &[u8], width: u16, height: u16) -> Result<Self, FrameError> {
        let header = FrameHeader::read(variant, data)?;
        Self::with_header(header, data, width, height)
    }

    fn with_header(header: FrameHeader, data: &[u8], width: u16, height: u16) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::InvalidDimensions { width, height });
        }

        Ok(Self {
            header,
            reader: BsIoVecReader::with_order(&data[FRAME_HEADER_SIZE..], header.variant.word_order()),
            macroblocks: macroblock_count(width, height),
            state: DecoderState {
                expecting_dc: true,
                ..Default::default()
            },
            done: false,
        })
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn state(&self) -> &DecoderState {
        &self.state
    }

    /// Returns the next code, or `None` once every macroblock is decoded.
    pub fn next_code(&mut self) -> Result<Option<MdecCode>, FrameError> {
        if self.done {
            return Ok(None);
        }
        if self.state.macroblock >= self.macroblocks {
            self.done = true;
            return Ok(None);
        }

        let result = if self.state.expecting_dc {
            self.read_dc()
        } else {
            self.read_ac()
        };

        match result {
            Ok(code) => Ok(Some(code)),
            Err(error) => {
                self.done = true;
                Err(error)
            }
        }
    }

    fn end_of_input(&self, error: io::Error) -> FrameError {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            FrameError::EndOfInput {
                macroblock: self.state.macroblock,
                block: self.state.block,
            }
        } else {
            FrameError::Io(error)
        }
    }

    fn read_dc(&mut self) -> Result<MdecCode, FrameError> {
        let block = self.state.block;
        let qscale = self.header.qscale_for_block(block);

        let value = if self.header.variant.has_differential_dc() {
            self.read_dc_differential()?
        } else {
            self.reader
                .get_s::<i16>(10)
                .map_err(|e| self.end_of_input(e))? as i32
        };

        self.state.expecting_dc = false;
        self.state.position = 1;

        Ok(MdecCode::dc(qscale, value as i16))
    }

    fn read_dc_differential(&mut self) -> Result<i32, FrameError> {
        let block = self.state.block;
        if self.reader.available().map_err(|e| self.end_of_input(e))? == 0 {
            return Err(self.end_of_input(io::ErrorKind::UnexpectedEof.into()));
        }

        let table: &'static [vlc::DcVlc] = if block < 2 {
            &DC_CHROMA_TABLE
        } else {
            &DC_LUMA_TABLE
        };
        let window = self
            .reader
            .peek_n(MAX_DC_LEN)
            .map_err(|e| self.end_of_input(e))?;
        let Some(entry) = vlc::lookup_dc_size(table, window) else {
            return Err(FrameError::UnknownDcCode {
                bits: window,
                macroblock: self.state.macroblock,
                block,
            });
        };

        self.reader
            .skip_n(entry.len)
            .map_err(|e| self.end_of_input(e))?;
        let raw = if entry.size > 0 {
            self.reader
                .get_n::<u32>(entry.size)
                .map_err(|e| self.end_of_input(e))?
        } else {
            0
        };

        let previous = self.state.previous_dc.slot(block);
        let value = *previous + vlc::dc_differential(raw, entry.size) * 4;
        if !(-512..=511).contains(&value) {
            return Err(FrameError::DcOutOfRange {
                value,
                macroblock: self.state.macroblock,
                block,
            });
        }
        *previous = value;

        Ok(value)
    }

    fn read_ac(&mut self) -> Result<MdecCode, FrameError> {
        if self.reader.available().map_err(|e| self.end_of_input(e))? == 0 {
            return Err(self.end_of_input(io::ErrorKind::UnexpectedEof.into()));
        }

        let window = self
            .reader
            .peek_n(MAX_AC_LEN)
            .map_err(|e| self.end_of_input(e))?;

        if END_OF_BLOCK.matches(window, MAX_AC_LEN) {
            self.reader
                .skip_n(END_OF_BLOCK.len)
                .map_err(|e| self.end_of_input(e))?;
            self.next_block();
            return Ok(MdecCode::END_OF_BLOCK);
        }

        let (run, level) = if window >> (MAX_AC_LEN - ESCAPE_LEN) == ESCAPE_CODE {
            self.reader
                .skip_n(ESCAPE_LEN)
                .map_err(|e| self.end_of_input(e))?;
            self.read_escape()?
        } else {
            let Some(entry) = vlc::lookup_ac(self.header.variant.ac_table(), window) else {
                return Err(FrameError::UnknownAcCode {
                    bits: window,
                    macroblock: self.state.macroblock,
                    block: self.state.block,
                });
            };
            self.reader
                .skip_n(entry.len)
                .map_err(|e| self.end_of_input(e))?;
            let negative = self.reader.get().map_err(|e| self.end_of_input(e))?;
            let level = entry.level as i16;

            (entry.run, if negative { -level } else { level })
        };

        self.state.position += run as usize + 1;
        if self.state.position > COEFFICIENTS_PER_BLOCK {
            return Err(FrameError::CoefficientOverflow {
                macroblock: self.state.macroblock,
                block: self.state.block,
                position: self.state.position,
            });
        }

        Ok(MdecCode::ac(run, level))
    }

    fn read_escape(&mut self) -> Result<(u8, i16), FrameError> {
        let run = self
            .reader
            .get_n::<u8>(6)
            .map_err(|e| self.end_of_input(e))?;

        let level = match self.header.variant {
            Variant::Lain => {
                let first = self
                    .reader
                    .get_n::<u8>(8)
                    .map_err(|e| self.end_of_input(e))?;
                match first {
                    0x00 => self
                        .reader
                        .get_n::<u8>(8)
                        .map_err(|e| self.end_of_input(e))? as i16,
                    0x80 => {
                        self.reader
                            .get_n::<u8>(8)
                            .map_err(|e| self.end_of_input(e))? as i16
                            - 256
                    }
                    byte => byte as i8 as i16,
                }
            }
            _ => self
                .reader
                .get_s::<i16>(10)
                .map_err(|e| self.end_of_input(e))?,
        };

        Ok((run, level))
    }

    fn next_block(&mut self) {
        self.state.expecting_dc = true;
        self.state.position = 0;
        self.state.block += 1;

        if self.state.block == BLOCKS_PER_MACROBLOCK {
            self.state.block = 0;
            self.state.macroblock += 1;
        }
    }
}

impl Iterator for FrameDecoder {
    type Item = Result<MdecCode, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_code().transpose()
    }
}

/// All MDEC codes of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub channel: u8,
    pub frame_number: u32,
    pub variant: Variant,
    pub codes: Vec<MdecCode>,
}

impl DecodedFrame {
    /// Codes as little-endian 16-bit words, the layout the MDEC consumes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.codes
            .iter()
            .flat_map(|code| code.to_u16().to_le_bytes())
            .collect()
    }
}

/// Decodes whole demuxed frames, containing corrupt frames.
///
/// A frame that fails to decode is reported and skipped; with a fail level of
/// [`log::Level::Warn`] it is an error instead.
#[derive(Debug)]
pub struct Decoder {
    variant: Option<Variant>,
    fail_level: log::Level,
    frames_decoded: usize,
    frames_aborted: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            variant: None,
            fail_level: log::Level::Error,
            frames_decoded: 0,
            frames_aborted: 0,
        }
    }
}

impl Decoder {
    /// Forces a variant instead of detecting one per frame.
    pub fn set_variant(&mut self, variant: Option<Variant>) {
        self.variant = variant;
    }

    /// Sets the failure level for aborted frames.
    ///
    /// - `log::Level::Error`: Aborted frames are logged and skipped (default)
    /// - `log::Level::Warn`: Aborted frames are errors (strict mode)
    pub fn set_fail_level(&mut self, level: log::Level) {
        self.fail_level = level;
    }

    /// Decodes `frame` to completion. Returns `None` when the frame was
    /// aborted.
    pub fn decode_frame(&mut self, frame: &DemuxedFrame) -> Result<Option<DecodedFrame>> {
        match self.try_decode(frame) {
            Ok(decoded) => {
                self.frames_decoded += 1;
                trace!(
                    "Frame {} on channel {}: {} codes ({})",
                    frame.frame_number,
                    frame.channel,
                    decoded.codes.len(),
                    decoded.variant
                );
                Ok(Some(decoded))
            }
            Err(error) => {
                self.frames_aborted += 1;
                log_or_err!(
                    self,
                    Warn,
                    DecodeError::AbortedFrame {
                        frame: frame.frame_number,
                        channel: frame.channel,
                        start: frame.start_sector,
                        end: frame.end_sector,
                        source: error,
                    }
                );
                Ok(None)
            }
        }
    }

    fn try_decode(&self, frame: &DemuxedFrame) -> Result<DecodedFrame, FrameError> {
        let mut decoder = match self.variant {
            Some(variant) => FrameDecoder::with_variant(variant, &frame.data, frame.width, frame.height)?,
            None => FrameDecoder::new(&frame.data, frame.width, frame.height)?,
        };

        let mut codes = Vec::with_capacity(frame.data.len());
        while let Some(code) = decoder.next_code()? {
            codes.push(code);
        }

        Ok(DecodedFrame {
            channel: frame.channel,
            frame_number: frame.frame_number,
            variant: decoder.header().variant,
            codes,
        })
    }

    pub fn frames_decoded(&self) -> usize {
        self.frames_decoded
    }

    pub fn frames_aborted(&self) -> usize {
        self.frames_aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::bitstream_io::BitstreamIoWriter;

    fn build_frame(
        header: FrameHeader,
        write: impl FnOnce(&mut BitstreamIoWriter) -> io::Result<()>,
    ) -> Vec<u8> {
        let mut writer = BitstreamIoWriter::default();
        write(&mut writer).unwrap();

        let mut frame = header.to_bytes().to_vec();
        frame.extend(writer.finish(header.variant.word_order()).unwrap());
        frame
    }

    fn demuxed(frame_number: u32, data: Vec<u8>, width: u16, height: u16) -> DemuxedFrame {
        DemuxedFrame {
            channel: 0,
            frame_number,
            width,
            height,
            start_sector: frame_number * 10,
            end_sector: frame_number * 10 + 9,
            data,
        }
    }

    #[test]
    fn lain_escape_edge_values() -> anyhow::Result<()> {
        let header = FrameHeader {
            variant: Variant::Lain,
            luma_qscale: 1,
            chroma_qscale: 2,
            code_count: 0,
        };
        let frame = build_frame(header, |w| {
            w.put_s(10, -5i16)?;
            // +128 through the 0x00 prefix.
            w.put_n(6, 0b000001u8)?;
            w.put_n(6, 0u8)?;
            w.put_n(16, 0b00000000_10000000u16)?;
            // -256 through the 0x80 prefix.
            w.put_n(6, 0b000001u8)?;
            w.put_n(6, 1u8)?;
            w.put_n(16, 0b10000000_00000000u16)?;
            // 0x80 0x80 is -128, not a second reading of the prefix.
            w.put_n(6, 0b000001u8)?;
            w.put_n(6, 0u8)?;
            w.put_n(16, 0b10000000_10000000u16)?;
            // A plain signed byte.
            w.put_n(6, 0b000001u8)?;
            w.put_n(6, 0u8)?;
            w.put_n(8, 0x81u8)?;
            w.put_n(2, 0b10u8)
        });

        let mut decoder = FrameDecoder::new(&frame, 16, 16)?;
        assert_eq!(decoder.next_code()?, Some(MdecCode::dc(2, -5)));
        assert_eq!(decoder.next_code()?, Some(MdecCode::ac(0, 128)));
        assert_eq!(decoder.next_code()?, Some(MdecCode::ac(1, -256)));
        assert_eq!(decoder.next_code()?, Some(MdecCode::ac(0, -128)));
        assert_eq!(decoder.next_code()?, Some(MdecCode::ac(0, -127)));
        assert_eq!(decoder.next_code()?, Some(MdecCode::END_OF_BLOCK));
        assert_eq!(decoder.state().block, 1);
        assert!(decoder.state().expecting_dc);
        Ok(())
    }

    #[test]
    fn str_escape_edge_values() -> anyhow::Result<()> {
        let header = FrameHeader {
            variant: Variant::StrV2,
            luma_qscale: 4,
            chroma_qscale: 4,
            code_count: 0,
        };
        let frame = build_frame(header, |w| {
            w.put_s(10, 511i16)?;
            w.put_n(6, 0b000001u8)?;
            w.put_n(6, 2u8)?;
            w.put_s(10, -512i16)?;
            w.put_n(6, 0b000001u8)?;
            w.put_n(6, 0u8)?;
            w.put_s(10, 511i16)
        });

        let codes = FrameDecoder::new(&frame, 16, 16)?
            .take(3)
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(
            codes,
            vec![MdecCode::dc(4, 511), MdecCode::ac(2, -512), MdecCode::ac(0, 511)]
        );
        Ok(())
    }

    #[test]
    fn corrupt_codes_abort_the_frame() -> anyhow::Result<()> {
        let header = FrameHeader {
            variant: Variant::StrV2,
            luma_qscale: 4,
            chroma_qscale: 4,
            code_count: 0,
        };

        // A run of 63 after the DC overruns the 64 coefficients.
        let overflow = build_frame(header, |w| {
            w.put_s(10, 0i16)?;
            w.put_n(6, 0b000001u8)?;
            w.put_n(6, 63u8)?;
            w.put_s(10, 1i16)
        });
        let mut decoder = FrameDecoder::new(&overflow, 16, 16)?;
        decoder.next_code()?;
        assert!(matches!(
            decoder.next_code(),
            Err(FrameError::CoefficientOverflow { position: 65, .. })
        ));
        assert!(decoder.next_code()?.is_none());

        let unknown = build_frame(header, |w| {
            w.put_s(10, 0i16)?;
            w.put_n(16, 0u16)
        });
        let mut decoder = FrameDecoder::new(&unknown, 16, 16)?;
        decoder.next_code()?;
        assert!(matches!(
            decoder.next_code(),
            Err(FrameError::UnknownAcCode { .. })
        ));

        let truncated = build_frame(header, |w| w.put_s(10, 0i16));
        let mut decoder = FrameDecoder::new(&truncated, 16, 16)?;
        decoder.next_code()?;
        // The remaining 6 padding bits are zero and cannot hold a code.
        assert!(decoder.next_code().is_err());

        let empty = header.to_bytes();
        let mut decoder = FrameDecoder::new(&empty, 16, 16)?;
        assert!(matches!(
            decoder.next_code(),
            Err(FrameError::EndOfInput { macroblock: 0, block: 0 })
        ));

        assert!(matches!(
            FrameDecoder::new(&empty, 0, 16),
            Err(FrameError::InvalidDimensions { .. })
        ));
        Ok(())
    }

    #[test]
    fn decoder_contains_corrupt_frames() -> anyhow::Result<()> {
        use crate::process::encode::FrameEncoder;
        use crate::process::encode::tests::sample_codes;

        let codes = sample_codes(Variant::StrV3, 1);
        let good = FrameEncoder::new(Variant::StrV3).encode(&codes, 16, 16)?;
        let mut corrupt = good.clone();
        corrupt.truncate(12);

        let mut decoder = Decoder::default();
        let first = decoder.decode_frame(&demuxed(1, good.clone(), 16, 16))?;
        assert_eq!(first.map(|f| f.codes), Some(codes.clone()));

        assert!(decoder.decode_frame(&demuxed(2, corrupt.clone(), 16, 16))?.is_none());
        assert!(decoder.decode_frame(&demuxed(3, vec![0; 16], 16, 16))?.is_none());

        let third = decoder.decode_frame(&demuxed(4, good.clone(), 16, 16))?.unwrap();
        assert_eq!(third.codes, codes);
        assert_eq!(third.to_bytes().len(), codes.len() * 2);
        assert_eq!((decoder.frames_decoded(), decoder.frames_aborted()), (2, 2));

        // A frame aborted mid-block leaves no state behind.
        let header = FrameHeader {
            variant: Variant::StrV2,
            luma_qscale: 4,
            chroma_qscale: 4,
            code_count: 0,
        };
        let overflow = build_frame(header, |w| {
            w.put_s(10, 0i16)?;
            w.put_n(6, 0b000001u8)?;
            w.put_n(6, 63u8)?;
            w.put_s(10, 1i16)
        });
        assert!(decoder.decode_frame(&demuxed(5, overflow, 16, 16))?.is_none());
        let after = decoder.decode_frame(&demuxed(6, good.clone(), 16, 16))?;
        assert_eq!(after.map(|f| f.codes), Some(codes.clone()));
        assert_eq!((decoder.frames_decoded(), decoder.frames_aborted()), (3, 3));

        // A forced variant does not fall back to detection.
        decoder.set_variant(Some(Variant::StrV2));
        assert!(decoder.decode_frame(&demuxed(7, good, 16, 16))?.is_none());

        decoder.set_variant(None);
        decoder.set_fail_level(Warn);
        assert!(decoder.decode_frame(&demuxed(8, corrupt, 16, 16)).is_err());
        Ok(())
    }
}
