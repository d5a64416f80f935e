use core::fmt;

use crate::error::{ReaderError, Result};

const SIGN_MASK: u32 = 0x8000_0000;
const SCALE_MASK: u32 = 0x00ff_0000;
const SCALE_SHIFT: u32 = 16;

/// The largest scale a `Decimal` may carry.
pub const MAX_SCALE: u8 = 28;

/// A 128-bit decimal floating-point value, in the layout used by .NET's `System.Decimal`.
///
/// The value is `(-1)^sign * mantissa / 10^scale`, where `mantissa` is a 96-bit unsigned integer
/// split into `lo`, `mid` and `hi` 32-bit words, and `sign` and `scale` live in the `flags` word.
///
/// On the wire a decimal is four 4-byte integers in the order `lo, mid, hi, flags`. Each word is
/// stored in the reader's byte order on its own; the 16 bytes are never reversed as one unit.
///
/// Equality is structural: `1.0` and `1.00` have different scales and compare unequal.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Decimal {
    lo: u32,
    mid: u32,
    hi: u32,
    flags: u32,
}

impl Decimal {
    /// Zero, with scale 0.
    pub const ZERO: Decimal = Decimal {
        lo: 0,
        mid: 0,
        hi: 0,
        flags: 0,
    };

    /// The largest representable value, 79228162514264337593543950335.
    pub const MAX: Decimal = Decimal {
        lo: u32::MAX,
        mid: u32::MAX,
        hi: u32::MAX,
        flags: 0,
    };

    /// The smallest representable value, -79228162514264337593543950335.
    pub const MIN: Decimal = Decimal {
        lo: u32::MAX,
        mid: u32::MAX,
        hi: u32::MAX,
        flags: SIGN_MASK,
    };

    /// Builds a decimal from its four words, validating the flags word.
    ///
    /// Fails with `ReaderError::InvalidDecimal` if `flags` has bits set outside the sign bit and
    /// the scale field, or if the scale exceeds [`MAX_SCALE`].
    pub fn from_parts(lo: u32, mid: u32, hi: u32, flags: u32) -> Result<Self> {
        let scale = (flags & SCALE_MASK) >> SCALE_SHIFT;
        if flags & !(SIGN_MASK | SCALE_MASK) != 0 || scale > u32::from(MAX_SCALE) {
            return Err(ReaderError::InvalidDecimal(flags));
        }
        Ok(Self { lo, mid, hi, flags })
    }

    /// Builds `mantissa / 10^scale`.
    ///
    /// Returns `None` if `|mantissa|` does not fit in 96 bits or `scale` exceeds [`MAX_SCALE`].
    pub fn new(mantissa: i128, scale: u8) -> Option<Self> {
        let magnitude = mantissa.unsigned_abs();
        if magnitude >> 96 != 0 || scale > MAX_SCALE {
            return None;
        }
        let mut flags = u32::from(scale) << SCALE_SHIFT;
        if mantissa < 0 {
            flags |= SIGN_MASK;
        }
        Some(Self {
            lo: magnitude as u32,
            mid: (magnitude >> 32) as u32,
            hi: (magnitude >> 64) as u32,
            flags,
        })
    }

    /// Returns the four words in wire order: `[lo, mid, hi, flags]`.
    pub fn parts(&self) -> [u32; 4] {
        [self.lo, self.mid, self.hi, self.flags]
    }

    /// The signed 96-bit mantissa.
    pub fn mantissa(&self) -> i128 {
        let magnitude = self.magnitude() as i128;
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }

    /// The power of ten the mantissa is divided by.
    pub fn scale(&self) -> u8 {
        ((self.flags & SCALE_MASK) >> SCALE_SHIFT) as u8
    }

    /// Returns `true` if the sign bit is set. This includes negative zero.
    pub fn is_negative(&self) -> bool {
        self.flags & SIGN_MASK != 0
    }

    /// Converts to the nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        self.mantissa() as f64 / 10f64.powi(i32::from(self.scale()))
    }

    fn magnitude(&self) -> u128 {
        (u128::from(self.hi) << 64) | (u128::from(self.mid) << 32) | u128::from(self.lo)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.magnitude();
        let scale = usize::from(self.scale());
        let mut digits = magnitude.to_string();
        if digits.len() <= scale {
            digits.insert_str(0, &"0".repeat(scale + 1 - digits.len()));
        }
        if self.is_negative() && magnitude != 0 {
            f.write_str("-")?;
        }
        let (whole, frac) = digits.split_at(digits.len() - scale);
        f.write_str(whole)?;
        if !frac.is_empty() {
            write!(f, ".{frac}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Decimal::ZERO.to_string(), "0");
        assert_eq!(Decimal::new(12345, 2).unwrap().to_string(), "123.45");
        assert_eq!(Decimal::new(-5, 3).unwrap().to_string(), "-0.005");
        assert_eq!(Decimal::new(1, 28).unwrap().to_string(), "0.0000000000000000000000000001");
        assert_eq!(Decimal::MAX.to_string(), "79228162514264337593543950335");
        assert_eq!(Decimal::MIN.to_string(), "-79228162514264337593543950335");
    }

    #[test]
    fn new_rejects_out_of_range() {
        assert_eq!(Decimal::new(1 << 96, 0), None);
        assert_eq!(Decimal::new(1, MAX_SCALE + 1), None);
        assert_eq!(Decimal::new(-((1 << 96) - 1), 0), Some(Decimal::MIN));
    }

    #[test]
    fn from_parts_validates_flags() {
        assert!(Decimal::from_parts(1, 0, 0, 0x001c_0000).is_ok());
        assert!(Decimal::from_parts(1, 0, 0, 0x8000_0000).is_ok());
        assert!(matches!(
            Decimal::from_parts(1, 0, 0, 0x001d_0000),
            Err(ReaderError::InvalidDecimal(0x001d_0000))
        ));
        assert!(matches!(
            Decimal::from_parts(1, 0, 0, 0x0000_0001),
            Err(ReaderError::InvalidDecimal(1))
        ));
    }

    #[test]
    fn mantissa_and_scale() {
        let d = Decimal::new(-987654321012345678901234567, 10).unwrap();
        assert_eq!(d.mantissa(), -987654321012345678901234567);
        assert_eq!(d.scale(), 10);
        assert!(d.is_negative());
        assert_eq!(Decimal::new(25, 1).unwrap().to_f64(), 2.5);
    }
}
