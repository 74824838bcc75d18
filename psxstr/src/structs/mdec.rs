use std::fmt::Display;

/// One 16-bit MDEC input code.
///
/// The top 6 bits hold the quantization scale for a DC code or the zero run
/// for an AC code. The bottom 10 bits hold the signed DC value or AC level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MdecCode {
    pub top6: u8,
    pub bottom10: i16,
}

impl MdecCode {
    /// End-of-block marker `0xFE00`.
    pub const END_OF_BLOCK: MdecCode = MdecCode {
        top6: 63,
        bottom10: -512,
    };

    pub fn dc(qscale: u8, value: i16) -> Self {
        Self {
            top6: qscale,
            bottom10: value,
        }
    }

    pub fn ac(run: u8, level: i16) -> Self {
        Self {
            top6: run,
            bottom10: level,
        }
    }

    pub fn is_end_of_block(&self) -> bool {
        *self == Self::END_OF_BLOCK
    }

    pub fn to_u16(&self) -> u16 {
        ((self.top6 as u16 & 0x3F) << 10) | (self.bottom10 as u16 & 0x3FF)
    }

    pub fn from_u16(code: u16) -> Self {
        // Sign-extend the low 10 bits.
        let bottom10 = ((code << 6) as i16) >> 6;
        Self {
            top6: (code >> 10) as u8,
            bottom10,
        }
    }
}

impl Display for MdecCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_end_of_block() {
            write!(f, "EOB")
        } else {
            write!(f, "({}, {})", self.top6, self.bottom10)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mdec_code_packing() {
        assert_eq!(MdecCode::END_OF_BLOCK.to_u16(), 0xFE00);
        assert_eq!(MdecCode::from_u16(0xFE00), MdecCode::END_OF_BLOCK);

        let code = MdecCode::ac(3, -2);
        assert_eq!(code.to_u16(), 0x0FFE);
        assert_eq!(MdecCode::from_u16(0x0FFE), code);

        assert_eq!(MdecCode::dc(8, 511).to_u16(), 0x21FF);
        assert_eq!(MdecCode::ac(0, -512).to_string(), "(0, -512)");
    }
}
