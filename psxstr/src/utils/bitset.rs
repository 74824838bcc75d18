use std::fmt::Display;
use std::str::FromStr;

use crate::utils::errors::RecordError;

/// Growable set of stream-relative sector ordinals.
///
/// Bit `i` lives in byte `i / 8` at position `i % 8`. The persisted form is
/// the byte vector in hex with trailing zero bytes dropped.
#[derive(Debug, Clone, Default)]
pub struct SectorBitSet {
    bytes: Vec<u8>,
}

impl SectorBitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: usize, value: bool) {
        let byte = index / 8;
        if byte >= self.bytes.len() {
            if !value {
                return;
            }
            self.bytes.resize(byte + 1, 0);
        }

        let mask = 1u8 << (index % 8);
        if value {
            self.bytes[byte] |= mask;
        } else {
            self.bytes[byte] &= !mask;
        }
    }

    pub fn get(&self, index: usize) -> bool {
        self.bytes
            .get(index / 8)
            .is_some_and(|byte| byte & (1 << (index % 8)) != 0)
    }

    /// True when no bit is set.
    pub fn is_empty(&self) -> bool {
        self.bytes.iter().all(|&byte| byte == 0)
    }

    pub fn count(&self) -> usize {
        self.bytes.iter().map(|byte| byte.count_ones() as usize).sum()
    }

    fn used(&self) -> &[u8] {
        let used = self
            .bytes
            .iter()
            .rposition(|&byte| byte != 0)
            .map_or(0, |last| last + 1);
        &self.bytes[..used]
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bytes.iter().enumerate().flat_map(|(i, &byte)| {
            (0..8).filter(move |bit| byte & (1 << bit) != 0).map(move |bit| i * 8 + bit)
        })
    }
}

impl PartialEq for SectorBitSet {
    fn eq(&self, other: &Self) -> bool {
        self.used() == other.used()
    }
}

impl Eq for SectorBitSet {}

impl Display for SectorBitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in self.used() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for SectorBitSet {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() % 2 != 0 || !s.is_ascii() {
            return Err(RecordError::InvalidBitSet(s.to_string()));
        }

        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| RecordError::InvalidBitSet(s.to_string()))?;

        Ok(Self { bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitset_hex() -> anyhow::Result<()> {
        let mut bits = SectorBitSet::new();
        assert!(bits.is_empty());
        assert_eq!(bits.to_string(), "");

        bits.set(0, true);
        bits.set(9, true);
        bits.set(30, false);
        assert_eq!(bits.to_string(), "0102");
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![0, 9]);
        assert_eq!(bits.count(), 2);

        let parsed: SectorBitSet = "0102".parse()?;
        assert!(parsed.get(9) && !parsed.get(8));
        assert_eq!(parsed, bits);

        assert!("123".parse::<SectorBitSet>().is_err());
        assert!("zz".parse::<SectorBitSet>().is_err());
        Ok(())
    }
}
