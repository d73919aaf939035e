//! IEEE 754-2008 decimal128 (binary integer decimal encoding).
//!
//! Values are kept as their 16 wire bytes; conversion to and from the
//! decimal string form is exact and never rounds.

use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

const EXPONENT_BIAS: i32 = 6176;
const EXPONENT_MIN: i32 = -6176;
const EXPONENT_MAX: i32 = 6111;
const MAX_DIGITS: usize = 34;
const COEFFICIENT_MASK: u128 = (1u128 << 113) - 1;
const NAN_BITS: u128 = 0x7c00u128 << 112;
const INFINITY_BITS: u128 = 0x7800u128 << 112;
const SIGN_BIT: u128 = 1u128 << 127;

/// A 128-bit decimal floating point value, stored as little-endian bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal128([u8; 16]);

impl Decimal128 {
    /// Wrap raw little-endian wire bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The raw little-endian wire bytes.
    pub fn bytes(&self) -> [u8; 16] {
        self.0
    }

    fn bits(&self) -> u128 {
        u128::from_le_bytes(self.0)
    }

    fn from_bits(bits: u128) -> Self {
        Self(bits.to_le_bytes())
    }

    pub fn is_nan(&self) -> bool {
        (self.bits() >> 122) & 0x1f == 0x1f
    }

    pub fn is_infinite(&self) -> bool {
        (self.bits() >> 122) & 0x1f == 0x1e
    }

    pub fn is_sign_negative(&self) -> bool {
        self.bits() & SIGN_BIT != 0
    }

    /// Split a finite value into (coefficient, unbiased exponent).
    fn finite_parts(&self) -> (u128, i32) {
        let bits = self.bits();
        if (bits >> 125) & 0b11 == 0b11 {
            // Implied leading `100` makes the coefficient exceed 10^34 - 1,
            // which the format defines as zero.
            let biased = ((bits >> 111) & 0x3fff) as i32;
            return (0, biased - EXPONENT_BIAS);
        }
        let biased = ((bits >> 113) & 0x3fff) as i32;
        let mut coefficient = bits & COEFFICIENT_MASK;
        if coefficient >= 10u128.pow(MAX_DIGITS as u32) {
            coefficient = 0;
        }
        (coefficient, biased - EXPONENT_BIAS)
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nan() {
            return f.write_str("NaN");
        }
        let sign = if self.is_sign_negative() { "-" } else { "" };
        if self.is_infinite() {
            return write!(f, "{sign}Infinity");
        }

        let (coefficient, exponent) = self.finite_parts();
        let digits = coefficient.to_string();
        let adjusted = exponent + digits.len() as i32 - 1;

        if exponent <= 0 && adjusted >= -6 {
            if exponent == 0 {
                return write!(f, "{sign}{digits}");
            }
            let point = digits.len() as i32 + exponent;
            if point > 0 {
                let (int_part, frac_part) = digits.split_at(point as usize);
                write!(f, "{sign}{int_part}.{frac_part}")
            } else {
                let zeros = "0".repeat((-point) as usize);
                write!(f, "{sign}0.{zeros}{digits}")
            }
        } else {
            let (head, tail) = digits.split_at(1);
            let exp_sign = if adjusted < 0 { "-" } else { "+" };
            if tail.is_empty() {
                write!(f, "{sign}{head}E{exp_sign}{}", adjusted.abs())
            } else {
                write!(f, "{sign}{head}.{tail}E{exp_sign}{}", adjusted.abs())
            }
        }
    }
}

impl fmt::Debug for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal128({self})")
    }
}

impl FromStr for Decimal128 {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidDecimal(s.to_string());

        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let sign = if negative { SIGN_BIT } else { 0 };

        if body.eq_ignore_ascii_case("nan") {
            return Ok(Self::from_bits(NAN_BITS));
        }
        if body.eq_ignore_ascii_case("infinity") || body.eq_ignore_ascii_case("inf") {
            return Ok(Self::from_bits(INFINITY_BITS | sign));
        }

        let (mantissa, exp_part) = match body.find(['e', 'E']) {
            Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
            None => (body, None),
        };
        let mut exponent: i32 = match exp_part {
            Some(e) => e.parse().map_err(|_| invalid())?,
            None => 0,
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        exponent = exponent
            .checked_sub(frac_part.len() as i32)
            .ok_or_else(invalid)?;

        let mut digits: String = format!("{int_part}{frac_part}")
            .trim_start_matches('0')
            .to_string();
        if digits.is_empty() {
            digits.push('0');
        }

        while digits.len() > MAX_DIGITS && digits.ends_with('0') {
            digits.pop();
            exponent = exponent.checked_add(1).ok_or_else(invalid)?;
        }
        if digits.len() > MAX_DIGITS {
            return Err(invalid());
        }

        let is_zero = digits == "0";
        while exponent > EXPONENT_MAX && !is_zero && digits.len() < MAX_DIGITS {
            digits.push('0');
            exponent -= 1;
        }
        while exponent < EXPONENT_MIN && !is_zero && digits.ends_with('0') {
            digits.pop();
            exponent = exponent.checked_add(1).ok_or_else(invalid)?;
        }
        if is_zero {
            exponent = exponent.clamp(EXPONENT_MIN, EXPONENT_MAX);
        }
        if !(EXPONENT_MIN..=EXPONENT_MAX).contains(&exponent) {
            return Err(invalid());
        }

        let coefficient: u128 = digits.parse().map_err(|_| invalid())?;
        let biased = (exponent + EXPONENT_BIAS) as u128;
        Ok(Self::from_bits(sign | (biased << 113) | coefficient))
    }
}
