//! Variable-length code tables for the frame bitstream.
//!
//! Tables are `(length, pattern, value)` arrays sorted by code length, so a
//! linear scan over a peeked window finds the shortest matching prefix first.
//! AC codes are followed by one sign bit that is not part of the pattern.

/// End-of-block pattern `10`.
pub const END_OF_BLOCK: AcVlc = AcVlc {
    len: 2,
    code: 0b10,
    run: 0,
    level: 0,
};

/// Escape pattern `000001`.
pub const ESCAPE_LEN: u32 = 6;
pub const ESCAPE_CODE: u32 = 0b000001;

/// Longest table code, sign bit excluded.
pub const MAX_AC_LEN: u32 = 16;

/// Longest DC size code.
pub const MAX_DC_LEN: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcVlc {
    pub len: u32,
    pub code: u32,
    pub run: u8,
    pub level: u8,
}

impl AcVlc {
    #[inline(always)]
    pub fn matches(&self, window: u32, window_len: u32) -> bool {
        window >> (window_len - self.len) == self.code
    }
}

const fn ac(len: u32, code: u32, run: u8, level: u8) -> AcVlc {
    AcVlc {
        len,
        code,
        run,
        level,
    }
}

/// MPEG-1 (run, |level|) codes, used by STRv2, STRv3 and FF7.
pub const MPEG1_AC_TABLE: [AcVlc; 111] = [
    ac(2, 0b11, 0, 1),
    ac(3, 0b011, 1, 1),
    ac(4, 0b0100, 0, 2),
    ac(4, 0b0101, 2, 1),
    ac(5, 0b00101, 0, 3),
    ac(5, 0b00111, 3, 1),
    ac(5, 0b00110, 4, 1),
    ac(6, 0b000110, 1, 2),
    ac(6, 0b000111, 5, 1),
    ac(6, 0b000101, 6, 1),
    ac(6, 0b000100, 7, 1),
    ac(7, 0b0000110, 0, 4),
    ac(7, 0b0000100, 2, 2),
    ac(7, 0b0000111, 8, 1),
    ac(7, 0b0000101, 9, 1),
    ac(8, 0b00100110, 0, 5),
    ac(8, 0b00100001, 0, 6),
    ac(8, 0b00100101, 1, 3),
    ac(8, 0b00100100, 3, 2),
    ac(8, 0b00100111, 10, 1),
    ac(8, 0b00100011, 11, 1),
    ac(8, 0b00100010, 12, 1),
    ac(8, 0b00100000, 13, 1),
    ac(10, 0b0000001010, 0, 7),
    ac(10, 0b0000001100, 1, 4),
    ac(10, 0b0000001011, 2, 3),
    ac(10, 0b0000001111, 4, 2),
    ac(10, 0b0000001001, 5, 2),
    ac(10, 0b0000001110, 14, 1),
    ac(10, 0b0000001101, 15, 1),
    ac(10, 0b0000001000, 16, 1),
    ac(12, 0b000000011101, 0, 8),
    ac(12, 0b000000011000, 0, 9),
    ac(12, 0b000000010011, 0, 10),
    ac(12, 0b000000010000, 0, 11),
    ac(12, 0b000000011011, 1, 5),
    ac(12, 0b000000010100, 2, 4),
    ac(12, 0b000000011100, 3, 3),
    ac(12, 0b000000010010, 4, 3),
    ac(12, 0b000000011110, 6, 2),
    ac(12, 0b000000010101, 7, 2),
    ac(12, 0b000000010001, 8, 2),
    ac(12, 0b000000011111, 17, 1),
    ac(12, 0b000000011010, 18, 1),
    ac(12, 0b000000011001, 19, 1),
    ac(12, 0b000000010111, 20, 1),
    ac(12, 0b000000010110, 21, 1),
    ac(13, 0b0000000011010, 0, 12),
    ac(13, 0b0000000011001, 0, 13),
    ac(13, 0b0000000011000, 0, 14),
    ac(13, 0b0000000010111, 0, 15),
    ac(13, 0b0000000010110, 1, 6),
    ac(13, 0b0000000010101, 1, 7),
    ac(13, 0b0000000010100, 2, 5),
    ac(13, 0b0000000010011, 3, 4),
    ac(13, 0b0000000010010, 5, 3),
    ac(13, 0b0000000010001, 9, 2),
    ac(13, 0b0000000010000, 10, 2),
    ac(13, 0b0000000011111, 22, 1),
    ac(13, 0b0000000011110, 23, 1),
    ac(13, 0b0000000011101, 24, 1),
    ac(13, 0b0000000011100, 25, 1),
    ac(13, 0b0000000011011, 26, 1),
    ac(14, 0b00000000011111, 0, 16),
    ac(14, 0b00000000011110, 0, 17),
    ac(14, 0b00000000011101, 0, 18),
    ac(14, 0b00000000011100, 0, 19),
    ac(14, 0b00000000011011, 0, 20),
    ac(14, 0b00000000011010, 0, 21),
    ac(14, 0b00000000011001, 0, 22),
    ac(14, 0b00000000011000, 0, 23),
    ac(14, 0b00000000010111, 0, 24),
    ac(14, 0b00000000010110, 0, 25),
    ac(14, 0b00000000010101, 0, 26),
    ac(14, 0b00000000010100, 0, 27),
    ac(14, 0b00000000010011, 0, 28),
    ac(14, 0b00000000010010, 0, 29),
    ac(14, 0b00000000010001, 0, 30),
    ac(14, 0b00000000010000, 0, 31),
    ac(15, 0b000000000011000, 0, 32),
    ac(15, 0b000000000010111, 0, 33),
    ac(15, 0b000000000010110, 0, 34),
    ac(15, 0b000000000010101, 0, 35),
    ac(15, 0b000000000010100, 0, 36),
    ac(15, 0b000000000010011, 0, 37),
    ac(15, 0b000000000010010, 0, 38),
    ac(15, 0b000000000010001, 0, 39),
    ac(15, 0b000000000010000, 0, 40),
    ac(15, 0b000000000011111, 1, 8),
    ac(15, 0b000000000011110, 1, 9),
    ac(15, 0b000000000011101, 1, 10),
    ac(15, 0b000000000011100, 1, 11),
    ac(15, 0b000000000011011, 1, 12),
    ac(15, 0b000000000011010, 1, 13),
    ac(15, 0b000000000011001, 1, 14),
    ac(16, 0b0000000000010011, 1, 15),
    ac(16, 0b0000000000010010, 1, 16),
    ac(16, 0b0000000000010001, 1, 17),
    ac(16, 0b0000000000010000, 1, 18),
    ac(16, 0b0000000000010100, 6, 3),
    ac(16, 0b0000000000011010, 11, 2),
    ac(16, 0b0000000000011001, 12, 2),
    ac(16, 0b0000000000011000, 13, 2),
    ac(16, 0b0000000000010111, 14, 2),
    ac(16, 0b0000000000010110, 15, 2),
    ac(16, 0b0000000000010101, 16, 2),
    ac(16, 0b0000000000011111, 27, 1),
    ac(16, 0b0000000000011110, 28, 1),
    ac(16, 0b0000000000011101, 29, 1),
    ac(16, 0b0000000000011100, 30, 1),
    ac(16, 0b0000000000011011, 31, 1),
];

/// Lain's own assignment of (run, |level|) pairs to the same code patterns,
/// favouring small levels over long runs.
pub const LAIN_AC_TABLE: [AcVlc; 111] = [
    ac(2, 0b11, 0, 1),
    ac(3, 0b011, 0, 2),
    ac(4, 0b0100, 1, 1),
    ac(4, 0b0101, 0, 3),
    ac(5, 0b00101, 1, 2),
    ac(5, 0b00110, 2, 1),
    ac(5, 0b00111, 0, 4),
    ac(6, 0b000100, 1, 3),
    ac(6, 0b000101, 2, 2),
    ac(6, 0b000110, 3, 1),
    ac(6, 0b000111, 0, 5),
    ac(7, 0b0000100, 1, 4),
    ac(7, 0b0000101, 2, 3),
    ac(7, 0b0000110, 3, 2),
    ac(7, 0b0000111, 4, 1),
    ac(8, 0b00100000, 0, 6),
    ac(8, 0b00100001, 1, 5),
    ac(8, 0b00100010, 2, 4),
    ac(8, 0b00100011, 3, 3),
    ac(8, 0b00100100, 4, 2),
    ac(8, 0b00100101, 5, 1),
    ac(8, 0b00100110, 0, 7),
    ac(8, 0b00100111, 1, 6),
    ac(10, 0b0000001000, 2, 5),
    ac(10, 0b0000001001, 3, 4),
    ac(10, 0b0000001010, 4, 3),
    ac(10, 0b0000001011, 5, 2),
    ac(10, 0b0000001100, 6, 1),
    ac(10, 0b0000001101, 0, 8),
    ac(10, 0b0000001110, 1, 7),
    ac(10, 0b0000001111, 5, 3),
    ac(12, 0b000000010000, 6, 2),
    ac(12, 0b000000010001, 7, 1),
    ac(12, 0b000000010010, 0, 9),
    ac(12, 0b000000010011, 1, 8),
    ac(12, 0b000000010100, 6, 3),
    ac(12, 0b000000010101, 7, 2),
    ac(12, 0b000000010110, 8, 1),
    ac(12, 0b000000010111, 0, 10),
    ac(12, 0b000000011000, 1, 9),
    ac(12, 0b000000011001, 8, 2),
    ac(12, 0b000000011010, 9, 1),
    ac(12, 0b000000011011, 0, 11),
    ac(12, 0b000000011100, 1, 10),
    ac(12, 0b000000011101, 9, 2),
    ac(12, 0b000000011110, 10, 1),
    ac(12, 0b000000011111, 0, 12),
    ac(13, 0b0000000010000, 1, 11),
    ac(13, 0b0000000010001, 10, 2),
    ac(13, 0b0000000010010, 11, 1),
    ac(13, 0b0000000010011, 0, 13),
    ac(13, 0b0000000010100, 1, 12),
    ac(13, 0b0000000010101, 11, 2),
    ac(13, 0b0000000010110, 12, 1),
    ac(13, 0b0000000010111, 0, 14),
    ac(13, 0b0000000011000, 1, 13),
    ac(13, 0b0000000011001, 12, 2),
    ac(13, 0b0000000011010, 13, 1),
    ac(13, 0b0000000011011, 0, 15),
    ac(13, 0b0000000011100, 1, 14),
    ac(13, 0b0000000011101, 13, 2),
    ac(13, 0b0000000011110, 14, 1),
    ac(13, 0b0000000011111, 0, 16),
    ac(14, 0b00000000010000, 1, 15),
    ac(14, 0b00000000010001, 14, 2),
    ac(14, 0b00000000010010, 15, 1),
    ac(14, 0b00000000010011, 0, 17),
    ac(14, 0b00000000010100, 1, 16),
    ac(14, 0b00000000010101, 15, 2),
    ac(14, 0b00000000010110, 16, 1),
    ac(14, 0b00000000010111, 0, 18),
    ac(14, 0b00000000011000, 1, 17),
    ac(14, 0b00000000011001, 16, 2),
    ac(14, 0b00000000011010, 17, 1),
    ac(14, 0b00000000011011, 0, 19),
    ac(14, 0b00000000011100, 1, 18),
    ac(14, 0b00000000011101, 18, 1),
    ac(14, 0b00000000011110, 0, 20),
    ac(14, 0b00000000011111, 19, 1),
    ac(15, 0b000000000010000, 0, 21),
    ac(15, 0b000000000010001, 20, 1),
    ac(15, 0b000000000010010, 0, 22),
    ac(15, 0b000000000010011, 21, 1),
    ac(15, 0b000000000010100, 0, 23),
    ac(15, 0b000000000010101, 22, 1),
    ac(15, 0b000000000010110, 0, 24),
    ac(15, 0b000000000010111, 23, 1),
    ac(15, 0b000000000011000, 0, 25),
    ac(15, 0b000000000011001, 24, 1),
    ac(15, 0b000000000011010, 0, 26),
    ac(15, 0b000000000011011, 25, 1),
    ac(15, 0b000000000011100, 0, 27),
    ac(15, 0b000000000011101, 26, 1),
    ac(15, 0b000000000011110, 0, 28),
    ac(15, 0b000000000011111, 27, 1),
    ac(16, 0b0000000000010000, 0, 29),
    ac(16, 0b0000000000010001, 28, 1),
    ac(16, 0b0000000000010010, 0, 30),
    ac(16, 0b0000000000010011, 29, 1),
    ac(16, 0b0000000000010100, 0, 31),
    ac(16, 0b0000000000010101, 30, 1),
    ac(16, 0b0000000000010110, 0, 32),
    ac(16, 0b0000000000010111, 31, 1),
    ac(16, 0b0000000000011000, 0, 33),
    ac(16, 0b0000000000011001, 0, 34),
    ac(16, 0b0000000000011010, 0, 35),
    ac(16, 0b0000000000011011, 0, 36),
    ac(16, 0b0000000000011100, 0, 37),
    ac(16, 0b0000000000011101, 0, 38),
    ac(16, 0b0000000000011110, 0, 39),
    ac(16, 0b0000000000011111, 0, 40),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DcVlc {
    pub len: u32,
    pub code: u32,
    pub size: u32,
}

const fn dc(len: u32, code: u32, size: u32) -> DcVlc {
    DcVlc { len, code, size }
}

/// Luma DC differential size codes, sorted by length.
pub const DC_LUMA_TABLE: [DcVlc; 9] = [
    dc(2, 0b00, 1),
    dc(2, 0b01, 2),
    dc(3, 0b100, 0),
    dc(3, 0b101, 3),
    dc(3, 0b110, 4),
    dc(4, 0b1110, 5),
    dc(5, 0b11110, 6),
    dc(6, 0b111110, 7),
    dc(7, 0b1111110, 8),
];

/// Chroma DC differential size codes, sorted by length.
pub const DC_CHROMA_TABLE: [DcVlc; 9] = [
    dc(2, 0b00, 0),
    dc(2, 0b01, 1),
    dc(2, 0b10, 2),
    dc(3, 0b110, 3),
    dc(4, 0b1110, 4),
    dc(5, 0b11110, 5),
    dc(6, 0b111110, 6),
    dc(7, 0b1111110, 7),
    dc(8, 0b11111110, 8),
];

/// Finds the AC table entry whose pattern prefixes a `MAX_AC_LEN`-bit window.
pub fn lookup_ac(table: &'static [AcVlc], window: u32) -> Option<&'static AcVlc> {
    table.iter().find(|vlc| vlc.matches(window, MAX_AC_LEN))
}

/// Finds the code for a (run, |level|) pair, if the table has one.
pub fn find_ac(table: &'static [AcVlc], run: u8, level: u8) -> Option<&'static AcVlc> {
    table
        .iter()
        .find(|vlc| vlc.run == run && vlc.level == level)
}

/// Finds the DC size entry prefixing a `MAX_DC_LEN`-bit window.
pub fn lookup_dc_size(table: &'static [DcVlc], window: u32) -> Option<&'static DcVlc> {
    table
        .iter()
        .find(|vlc| window >> (MAX_DC_LEN - vlc.len) == vlc.code)
}

pub fn find_dc_size(table: &'static [DcVlc], size: u32) -> Option<&'static DcVlc> {
    table.iter().find(|vlc| vlc.size == size)
}

/// Number of bits needed to express a DC differential magnitude.
pub fn dc_size_of(diff: i32) -> u32 {
    32 - diff.unsigned_abs().leading_zeros()
}

/// Decodes `size` raw differential bits into a signed value. A clear top bit
/// marks a negative differential.
pub fn dc_differential(raw: u32, size: u32) -> i32 {
    if size == 0 {
        return 0;
    }
    if raw >> (size - 1) == 0 {
        raw as i32 - ((1 << size) - 1)
    } else {
        raw as i32
    }
}

/// Inverse of [`dc_differential`].
pub fn dc_differential_bits(diff: i32, size: u32) -> u32 {
    if diff < 0 {
        (diff + (1 << size) - 1) as u32
    } else {
        diff as u32
    }
}
