use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use crate::utils::errors::RecordError;

/// Non-negative rational number kept in lowest terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fraction {
    num: u64,
    den: u64,
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Fraction {
    /// Returns `None` for a zero denominator.
    pub fn new(num: u64, den: u64) -> Option<Self> {
        if den == 0 {
            return None;
        }
        let g = gcd(num, den).max(1);
        Some(Self {
            num: num / g,
            den: den / g,
        })
    }

    pub const fn integer(value: u64) -> Self {
        Self { num: value, den: 1 }
    }

    pub fn numerator(&self) -> u64 {
        self.num
    }

    pub fn denominator(&self) -> u64 {
        self.den
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Simplest fraction (smallest denominator, then numerator) strictly
    /// between `lo` and `hi`, found by descending the Stern-Brocot tree.
    /// Returns `None` when the interval is empty.
    pub fn simplest_between(lo: Fraction, hi: Fraction) -> Option<Fraction> {
        if lo >= hi {
            return None;
        }

        let (lo_n, lo_d) = (lo.num as i128, lo.den as i128);
        let (hi_n, hi_d) = (hi.num as i128, hi.den as i128);

        let (mut left_n, mut left_d) = (0i128, 1i128);
        let (mut right_n, mut right_d) = (1i128, 0i128);

        loop {
            let (m_n, m_d) = (left_n + right_n, left_d + right_d);

            if m_n * lo_d <= lo_n * m_d {
                // Mediant at or below the interval: walk right as far as possible.
                let k = (lo_n * left_d - left_n * lo_d) / (right_n * lo_d - lo_n * right_d);
                let k = k.max(1);
                left_n += k * right_n;
                left_d += k * right_d;
            } else if m_n * hi_d >= hi_n * m_d {
                let k = (right_n * hi_d - hi_n * right_d) / (hi_n * left_d - left_n * hi_d);
                let k = k.max(1);
                right_n += k * left_n;
                right_d += k * left_d;
            } else {
                return Fraction::new(m_n as u64, m_d as u64);
            }
        }
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.num as u128 * other.den as u128).cmp(&(other.num as u128 * self.den as u128))
    }
}

impl Display for Fraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Fraction {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RecordError::InvalidFraction(s.to_string());

        let (num, den) = match s.trim().split_once('/') {
            Some((num, den)) => (num.trim(), den.trim()),
            None => (s.trim(), "1"),
        };
        let num = num.parse::<u64>().map_err(|_| invalid())?;
        let den = den.parse::<u64>().map_err(|_| invalid())?;

        Fraction::new(num, den).ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_reduces_and_parses() -> anyhow::Result<()> {
        let f = Fraction::new(30, 4).unwrap();
        assert_eq!((f.numerator(), f.denominator()), (15, 2));
        assert_eq!(f.to_string(), "15/2");
        assert_eq!("15/2".parse::<Fraction>()?, f);
        assert_eq!("10".parse::<Fraction>()?, Fraction::integer(10));
        assert!("1/0".parse::<Fraction>().is_err());
        assert!("a/b".parse::<Fraction>().is_err());
        assert!(Fraction::new(1, 3).unwrap() < Fraction::new(1, 2).unwrap());
        Ok(())
    }

    #[test]
    fn simplest_fraction_in_interval() {
        let frac = |n, d| Fraction::new(n, d).unwrap();

        assert_eq!(
            Fraction::simplest_between(frac(29, 4), frac(31, 4)),
            Some(frac(15, 2))
        );
        assert_eq!(
            Fraction::simplest_between(frac(9, 1), frac(11, 1)),
            Some(frac(10, 1))
        );
        assert_eq!(
            Fraction::simplest_between(frac(0, 1), frac(1, 1000)),
            Some(frac(1, 1001))
        );
        assert_eq!(
            Fraction::simplest_between(frac(3333, 1000), frac(3334, 1000)),
            Some(frac(10, 3))
        );
        assert_eq!(Fraction::simplest_between(frac(2, 1), frac(2, 1)), None);
    }
}
