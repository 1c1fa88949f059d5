//! Fractions used by ISO 21496-1 gain map metadata.
//!
//! Floats are converted by scaling with a fixed denominator of 1,000,000,
//! rounding, and reducing by the gcd. Values whose scaled numerator does not
//! fit in 32 bits get a smaller power-of-ten denominator.

use alloc::format;

use crate::types::{Error, Result};

const DENOMINATOR: u32 = 1_000_000;

/// A signed fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Fraction {
    /// The numerator of the fraction.
    pub numerator: i32,
    /// The denominator of the fraction (must be non-zero for valid fractions).
    pub denominator: u32,
}

/// An unsigned fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UnsignedFraction {
    /// The numerator of the fraction.
    pub numerator: u32,
    /// The denominator of the fraction (must be non-zero for valid fractions).
    pub denominator: u32,
}

impl Fraction {
    /// Create a new fraction with the given numerator and denominator.
    pub const fn new(numerator: i32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Approximate a float.
    ///
    /// Fails for non-finite values and values too large for any denominator.
    pub fn from_f64(value: f64) -> Result<Self> {
        let (numerator, denominator) = to_fraction(value, i32::MIN as f64, i32::MAX as f64)?;
        Ok(Self::new(numerator as i32, denominator))
    }

    /// Convert to a float. Fails if the denominator is zero.
    pub fn to_f64(self) -> Result<f64> {
        if self.denominator == 0 {
            return Err(Error::InvalidParameter("fraction has a zero denominator".into()));
        }
        Ok(self.numerator as f64 / self.denominator as f64)
    }

    /// Returns true if the denominator is non-zero.
    pub fn is_valid(self) -> bool {
        self.denominator != 0
    }
}

impl UnsignedFraction {
    /// Create a new fraction with the given numerator and denominator.
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Approximate a non-negative float.
    ///
    /// Fails for negative or non-finite values and values too large for any
    /// denominator.
    pub fn from_f64(value: f64) -> Result<Self> {
        if value < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "{} cannot be stored as an unsigned fraction",
                value
            )));
        }
        let (numerator, denominator) = to_fraction(value, 0.0, u32::MAX as f64)?;
        Ok(Self::new(numerator as u32, denominator))
    }

    /// Convert to a float. Fails if the denominator is zero.
    pub fn to_f64(self) -> Result<f64> {
        if self.denominator == 0 {
            return Err(Error::InvalidParameter("fraction has a zero denominator".into()));
        }
        Ok(self.numerator as f64 / self.denominator as f64)
    }

    /// Returns true if the denominator is non-zero.
    pub fn is_valid(self) -> bool {
        self.denominator != 0
    }
}

/// Scale, round half up, and reduce.
fn to_fraction(value: f64, min: f64, max: f64) -> Result<(i64, u32)> {
    if !value.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "{} has no fractional representation",
            value
        )));
    }

    let mut denominator = DENOMINATOR;
    loop {
        let numerator = (value * denominator as f64 + 0.5).floor();
        if numerator >= min && numerator <= max {
            let numerator = numerator as i64;
            let divisor = gcd(numerator.unsigned_abs(), denominator as u64).max(1);
            return Ok((
                numerator / divisor as i64,
                (denominator as u64 / divisor) as u32,
            ));
        }
        if denominator == 1 {
            return Err(Error::InvalidParameter(format!(
                "{} is out of range for a 32-bit fraction",
                value
            )));
        }
        denominator /= 10;
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
