//! Bitstream I/O utilities for frame parsing.
//!
//! STR frames store their bitstream as little-endian 16-bit words consumed from
//! the most significant bit down. [`WordOrder`] describes how the frame bytes
//! map onto a big-endian bit sequence so a single reader and writer serve every
//! variant.

use std::io;
use std::io::SeekFrom;

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter, SignedInteger, UnsignedInteger};

/// Byte layout of a frame bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordOrder {
    /// 16-bit little-endian words, bits read from the high bit of each word.
    Le16,
    /// Plain byte stream, bits read from the high bit of each byte.
    Bytes,
}

impl WordOrder {
    /// Rearranges frame bytes into big-endian bit order (and back, the swap is
    /// its own inverse). Odd trailing bytes are padded with zero.
    pub fn reorder(self, data: &[u8]) -> Vec<u8> {
        match self {
            WordOrder::Bytes => data.to_vec(),
            WordOrder::Le16 => {
                let mut out = Vec::with_capacity(data.len() + 1);
                for pair in data.chunks(2) {
                    let lo = pair[0];
                    let hi = pair.get(1).copied().unwrap_or(0);
                    out.push(hi);
                    out.push(lo);
                }
                out
            }
        }
    }
}

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

pub type BsIoVecReader = BitstreamIoReader<io::Cursor<Vec<u8>>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        match self.bs.read_unsigned_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                // Only call position() on error path to avoid overhead
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "get_n({}): out of bounds bits at {}",
                        n,
                        self.bs.position_in_bits().unwrap_or(0)
                    ),
                ))
            }
            Err(e) => Err(e),
        }
    }

    #[inline(always)]
    pub fn get_s<S: SignedInteger>(&mut self, n: u32) -> io::Result<S> {
        match self.bs.read_signed_var(n) {
            Ok(val) => Ok(val),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_s({}): out of bounds bits at {}",
                    n,
                    self.bs.position_in_bits().unwrap_or(0)
                ),
            )),
            Err(e) => Err(e),
        }
    }

    /// Returns the next `n` bits (n <= 32) without consuming them. Bits past
    /// the end of the stream read as zero.
    #[inline(always)]
    pub fn peek_n(&mut self, n: u32) -> io::Result<u32> {
        let available = self.available()?;
        let take = (n as u64).min(available) as u32;
        if take == 0 {
            return Ok(0);
        }

        let value: u32 = self.bs.read_unsigned_var(take)?;
        self.bs.seek_bits(SeekFrom::Current(-(take as i64)))?;

        Ok(value << (n - take))
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs
            .position_in_bits()
            .map(|pos| self.len.saturating_sub(pos))
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        if n as u64 > self.available()? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "skip_n: out of bounds bits",
            ));
        }
        self.bs.skip(n)
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl BsIoVecReader {
    /// Builds a reader over `data` laid out in `order`.
    pub fn with_order(data: &[u8], order: WordOrder) -> Self {
        let bytes = order.reorder(data);
        let len = bytes.len() as u64;

        Self::new(io::Cursor::new(bytes), len)
    }
}

impl Default for BsIoSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

/// Big-endian bit writer producing frame bytes in a chosen [`WordOrder`].
pub struct BitstreamIoWriter {
    bs: BitWriter<Vec<u8>, BigEndian>,
    bits: u64,
}

impl Default for BitstreamIoWriter {
    fn default() -> Self {
        Self {
            bs: BitWriter::new(Vec::new()),
            bits: 0,
        }
    }
}

impl BitstreamIoWriter {
    #[inline(always)]
    pub fn put(&mut self, bit: bool) -> io::Result<()> {
        self.bits += 1;
        self.bs.write_bit(bit)
    }

    #[inline(always)]
    pub fn put_n<U: UnsignedInteger>(&mut self, n: u32, value: U) -> io::Result<()> {
        if n == 0 {
            return Ok(());
        }
        self.bits += n as u64;
        self.bs.write_unsigned_var(n, value)
    }

    #[inline(always)]
    pub fn put_s<S: SignedInteger>(&mut self, n: u32, value: S) -> io::Result<()> {
        self.bits += n as u64;
        self.bs.write_signed_var(n, value)
    }

    pub fn bits_written(&self) -> u64 {
        self.bits
    }

    /// Pads with zero bits to a 16-bit boundary and returns the bytes in `order`.
    pub fn finish(mut self, order: WordOrder) -> io::Result<Vec<u8>> {
        let pad = (16 - (self.bits % 16) as u32) % 16;
        self.put_n::<u32>(pad, 0)?;

        Ok(order.reorder(&self.bs.into_writer()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_does_not_consume() -> anyhow::Result<()> {
        let data = [0b1010_0000u8, 0xFF];
        let mut reader = BsIoSliceReader::from_slice(&data);

        assert_eq!(reader.peek_n(3)?, 0b101);
        assert_eq!(reader.peek_n(3)?, 0b101);
        assert_eq!(reader.get_n::<u8>(4)?, 0b1010);
        assert_eq!(reader.position()?, 4);
        assert_eq!(reader.available()?, 12);

        // Peeking past the end pads with zeros.
        reader.skip_n(8)?;
        assert_eq!(reader.peek_n(8)?, 0b1111_0000);
        Ok(())
    }

    #[test]
    fn le16_words_read_high_byte_first() -> anyhow::Result<()> {
        let frame = [0x34u8, 0x12, 0x78, 0x56];
        let mut reader = BsIoVecReader::with_order(&frame, WordOrder::Le16);

        assert_eq!(reader.get_n::<u16>(16)?, 0x1234);
        assert_eq!(reader.get_n::<u16>(16)?, 0x5678);
        assert!(reader.get().is_err());
        Ok(())
    }

    #[test]
    fn writer_pads_to_words() -> anyhow::Result<()> {
        let mut writer = BitstreamIoWriter::default();
        writer.put_n(4, 0xAu8)?;
        writer.put_s(6, -1i8)?;
        assert_eq!(writer.bits_written(), 10);

        let bytes = writer.finish(WordOrder::Le16)?;
        assert_eq!(bytes, vec![0xC0, 0xAF]);

        let mut reader = BsIoVecReader::with_order(&bytes, WordOrder::Le16);
        assert_eq!(reader.get_n::<u8>(4)?, 0xA);
        assert_eq!(reader.get_s::<i8>(6)?, -1);
        Ok(())
    }
}
