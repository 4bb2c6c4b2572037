// Copyright (C) 2013-2020 Blockstack PBC, a public benefit corporation
// Copyright (C) 2020-2024 Stacks Open Internet Foundation
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Signed fixed-point decimal arithmetic.
//!
//! Ledger amounts, timestamps and emission formulas are all decimal quantities that the
//! ledger quantizes to a handful of fraction digits.  `FixedDecimal` carries 18 fraction
//! digits in an `i128`, which is exact for every quantity the verifier handles, and
//! rounds half-to-even whenever precision is dropped.

use std::cmp::Ordering;
use std::{error, fmt, ops};

/// Number of fraction digits carried by a `FixedDecimal`
pub const FRACTION_DIGITS: u32 = 18;

const SCALE: i128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum DecimalError {
    /// Not a decimal number
    Malformed(String),
    /// Too large to represent
    Overflow,
    /// Division by zero
    DivisionByZero,
}

impl fmt::Display for DecimalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DecimalError::Malformed(ref s) => write!(f, "malformed decimal '{}'", s),
            DecimalError::Overflow => write!(f, "decimal overflow"),
            DecimalError::DivisionByZero => write!(f, "decimal division by zero"),
        }
    }
}

impl error::Error for DecimalError {
    fn cause(&self) -> Option<&dyn error::Error> {
        None
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FixedDecimal(i128);

fn pow10(exp: u32) -> i128 {
    10i128.pow(exp)
}

/// Divide `num` by a positive `den`, rounding half to even.
fn div_round_half_even(num: i128, den: i128) -> i128 {
    let q = num.div_euclid(den);
    let r = num.rem_euclid(den);
    // r in [0, den); compare 2r against den without overflowing
    match r.cmp(&(den - r)) {
        Ordering::Less => q,
        Ordering::Greater => q + 1,
        Ordering::Equal => {
            if q % 2 == 0 {
                q
            } else {
                q + 1
            }
        }
    }
}

impl FixedDecimal {
    pub const ZERO: FixedDecimal = FixedDecimal(0);
    pub const ONE: FixedDecimal = FixedDecimal(SCALE);

    pub fn from_int(i: i64) -> FixedDecimal {
        FixedDecimal(i as i128 * SCALE)
    }

    /// Build `units * 10^-places`, e.g. `from_units(5, 1)` is 0.5
    pub fn from_units(units: i64, places: u32) -> FixedDecimal {
        assert!(places <= FRACTION_DIGITS);
        FixedDecimal(units as i128 * pow10(FRACTION_DIGITS - places))
    }

    /// Exact binary value of `f`, rounded half to even at 18 fraction digits
    pub fn from_f64(f: f64) -> Result<FixedDecimal, DecimalError> {
        if !f.is_finite() {
            return Err(DecimalError::Malformed(format!("{}", f)));
        }
        FixedDecimal::parse(&format!("{:.18}", f))
    }

    /// Parse a decimal literal: optional sign, digits, optional fraction, optional exponent.
    /// Digits beyond the 18th fraction digit are rounded half to even.
    pub fn parse(s: &str) -> Result<FixedDecimal, DecimalError> {
        let malformed = || DecimalError::Malformed(s.to_string());
        let trimmed = s.trim();
        let (negative, rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (mantissa, exponent) = match rest.find(|c| c == 'e' || c == 'E') {
            Some(idx) => {
                let exp = rest[idx + 1..].parse::<i32>().map_err(|_| malformed())?;
                (&rest[..idx], exp)
            }
            None => (rest, 0),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(idx) => (&mantissa[..idx], &mantissa[idx + 1..]),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(malformed());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }

        // all significant digits, with the decimal point shifted by the exponent
        let digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .map(|b| b - b'0')
            .collect();
        let point = int_part.len() as i64 + exponent as i64;

        let mut units: i128 = 0;
        let mut tail: Vec<u8> = vec![];
        let mut tail_pos = FRACTION_DIGITS as i64;
        for (i, d) in digits.iter().enumerate() {
            // position of this digit relative to the decimal point: 0 is the first fraction digit
            let frac_pos = i as i64 - point;
            if frac_pos < FRACTION_DIGITS as i64 {
                units = units
                    .checked_mul(10)
                    .and_then(|u| u.checked_add(*d as i128))
                    .ok_or(DecimalError::Overflow)?;
            } else {
                if tail.is_empty() {
                    tail_pos = frac_pos;
                }
                tail.push(*d);
            }
        }
        // scale up to 18 fraction digits if the literal had fewer
        let last_pos = digits.len() as i64 - point;
        if last_pos < FRACTION_DIGITS as i64 {
            let shift = (FRACTION_DIGITS as i64 - last_pos.max(-(i64::from(u8::MAX)))) as u32;
            let factor = 10i128.checked_pow(shift).ok_or(DecimalError::Overflow)?;
            units = units.checked_mul(factor).ok_or(DecimalError::Overflow)?;
        }
        // round half to even on the discarded tail; a tail starting past the
        // 19th fraction digit is always below half
        if tail_pos > FRACTION_DIGITS as i64 {
            tail.clear();
        }
        if let Some((first, rest)) = tail.split_first() {
            let above_half = *first > 5 || (*first == 5 && rest.iter().any(|d| *d != 0));
            let is_half = *first == 5 && rest.iter().all(|d| *d == 0);
            if above_half || (is_half && units % 2 == 1) {
                units = units.checked_add(1).ok_or(DecimalError::Overflow)?;
            }
        }
        Ok(FixedDecimal(if negative { -units } else { units }))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> FixedDecimal {
        FixedDecimal(self.0.abs())
    }

    /// Round half to even at `places` fraction digits
    pub fn quantize(&self, places: u32) -> FixedDecimal {
        if places >= FRACTION_DIGITS {
            return *self;
        }
        let unit = pow10(FRACTION_DIGITS - places);
        FixedDecimal(div_round_half_even(self.0, unit) * unit)
    }

    /// Integer part, truncated toward zero
    pub fn trunc(&self) -> i128 {
        self.0 / SCALE
    }

    pub fn max(self, other: FixedDecimal) -> FixedDecimal {
        if self >= other {
            self
        } else {
            other
        }
    }

    pub fn checked_add(&self, other: &FixedDecimal) -> Option<FixedDecimal> {
        self.0.checked_add(other.0).map(FixedDecimal)
    }

    pub fn checked_sub(&self, other: &FixedDecimal) -> Option<FixedDecimal> {
        self.0.checked_sub(other.0).map(FixedDecimal)
    }

    pub fn checked_mul_int(&self, k: i64) -> Option<FixedDecimal> {
        self.0.checked_mul(k as i128).map(FixedDecimal)
    }

    /// Product rounded half to even at 18 fraction digits
    pub fn checked_mul(&self, other: &FixedDecimal) -> Option<FixedDecimal> {
        let negative = (self.0 < 0) != (other.0 < 0);
        let (a, b) = (self.0.checked_abs()?, other.0.checked_abs()?);
        let (a_int, a_frac) = (a / SCALE, a % SCALE);
        let (b_int, b_frac) = (b / SCALE, b % SCALE);
        // a*b/S = a*b_int + a_int*b_frac + a_frac*b_frac/S
        let whole = a
            .checked_mul(b_int)?
            .checked_add(a_int.checked_mul(b_frac)?)?;
        let part = div_round_half_even(a_frac.checked_mul(b_frac)?, SCALE);
        let product = whole.checked_add(part)?;
        Some(FixedDecimal(if negative { -product } else { product }))
    }

    /// Quotient rounded half to even at 18 fraction digits
    pub fn checked_div(&self, other: &FixedDecimal) -> Result<FixedDecimal, DecimalError> {
        if other.0 == 0 {
            return Err(DecimalError::DivisionByZero);
        }
        let negative = (self.0 < 0) != (other.0 < 0);
        let num = self.0.checked_abs().ok_or(DecimalError::Overflow)?;
        let den = other.0.checked_abs().ok_or(DecimalError::Overflow)?;

        // long division, one fraction digit at a time, so the numerator never needs scaling
        let mut quotient = num / den;
        let mut rem = num % den;
        for _ in 0..FRACTION_DIGITS {
            let r10 = rem.checked_mul(10).ok_or(DecimalError::Overflow)?;
            quotient = quotient
                .checked_mul(10)
                .and_then(|q| q.checked_add(r10 / den))
                .ok_or(DecimalError::Overflow)?;
            rem = r10 % den;
        }
        match rem.cmp(&(den - rem)) {
            Ordering::Greater => quotient += 1,
            Ordering::Equal if quotient % 2 == 1 => quotient += 1,
            _ => {}
        }
        Ok(FixedDecimal(if negative { -quotient } else { quotient }))
    }

    /// Render with exactly `places` fraction digits, rounding half to even
    pub fn to_string_places(&self, places: u32) -> String {
        let places = places.min(FRACTION_DIGITS);
        let q = self.quantize(places);
        let units = q.0 / pow10(FRACTION_DIGITS - places);
        let sign = if units < 0 { "-" } else { "" };
        let units = units.abs();
        let base = pow10(places);
        if places == 0 {
            format!("{}{}", sign, units)
        } else {
            format!(
                "{}{}.{:0width$}",
                sign,
                units / base,
                units % base,
                width = places as usize
            )
        }
    }
}

impl fmt::Display for FixedDecimal {
    /// Shortest rendering without trailing fraction zeros
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let full = self.to_string_places(FRACTION_DIGITS);
        let trimmed = full.trim_end_matches('0').trim_end_matches('.');
        write!(f, "{}", trimmed)
    }
}

impl fmt::Debug for FixedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FixedDecimal({})", self)
    }
}

impl std::str::FromStr for FixedDecimal {
    type Err = DecimalError;
    fn from_str(s: &str) -> Result<FixedDecimal, DecimalError> {
        FixedDecimal::parse(s)
    }
}

impl ops::Neg for FixedDecimal {
    type Output = FixedDecimal;
    fn neg(self) -> FixedDecimal {
        FixedDecimal(-self.0)
    }
}

impl serde::Serialize for FixedDecimal {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

struct FixedDecimalVisitor;

impl<'de> serde::de::Visitor<'de> for FixedDecimalVisitor {
    type Value = FixedDecimal;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a decimal number or a string holding one")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<FixedDecimal, E> {
        FixedDecimal::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<FixedDecimal, E> {
        Ok(FixedDecimal::from_int(v))
    }

    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<FixedDecimal, E> {
        let v = i64::try_from(v).map_err(|_| E::custom(DecimalError::Overflow))?;
        Ok(FixedDecimal::from_int(v))
    }

    /// Floats in config files are read as the shortest text that round-trips, i.e. what
    /// the author typed, not their binary expansion
    fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<FixedDecimal, E> {
        if !v.is_finite() {
            return Err(E::custom(DecimalError::Malformed(v.to_string())));
        }
        FixedDecimal::parse(&v.to_string()).map_err(E::custom)
    }
}

impl<'de> serde::Deserialize<'de> for FixedDecimal {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<FixedDecimal, D::Error> {
        d.deserialize_any(FixedDecimalVisitor)
    }
}

#[cfg(test)]
mod test {
    use rand::{thread_rng, Rng};

    use super::*;

    fn dec(s: &str) -> FixedDecimal {
        FixedDecimal::parse(s).unwrap()
    }

    #[test]
    fn parse_forms() {
        assert_eq!(dec("1"), FixedDecimal::ONE);
        assert_eq!(dec("0.5"), FixedDecimal::from_units(5, 1));
        assert_eq!(dec(".5"), FixedDecimal::from_units(5, 1));
        assert_eq!(dec("-2.25"), -FixedDecimal::from_units(225, 2));
        assert_eq!(dec("1e3"), FixedDecimal::from_int(1000));
        assert_eq!(dec("5E-1"), FixedDecimal::from_units(5, 1));
        assert_eq!(dec("0E-8"), FixedDecimal::ZERO);
        assert_eq!(dec("  12.00000000 "), FixedDecimal::from_int(12));
        assert_eq!(dec("1493755375.23").to_string(), "1493755375.23");

        assert!(FixedDecimal::parse("").is_err());
        assert!(FixedDecimal::parse(".").is_err());
        assert!(FixedDecimal::parse("abc").is_err());
        assert!(FixedDecimal::parse("1.2.3").is_err());
        assert!(FixedDecimal::parse("1e").is_err());
        assert!(FixedDecimal::parse("NaN").is_err());
    }

    #[test]
    fn parse_rounds_half_even_past_18_digits() {
        // 19th digit 5, nothing after: ties go to even
        assert_eq!(
            dec("0.0000000000000000005"),
            FixedDecimal::ZERO
        );
        assert_eq!(
            dec("0.0000000000000000015").to_string_places(18),
            "0.000000000000000002"
        );
        assert_eq!(
            dec("0.00000000000000000051").to_string_places(18),
            "0.000000000000000001"
        );
    }

    #[test]
    fn quantize_half_even() {
        assert_eq!(dec("0.125").to_string_places(2), "0.12");
        assert_eq!(dec("0.135").to_string_places(2), "0.14");
        assert_eq!(dec("-0.125").to_string_places(2), "-0.12");
        assert_eq!(dec("2.5").quantize(0), FixedDecimal::from_int(2));
        assert_eq!(dec("3.5").quantize(0), FixedDecimal::from_int(4));
        assert_eq!(dec("1.000000005").to_string_places(8), "1.00000000");
        assert_eq!(dec("1.000000015").to_string_places(8), "1.00000002");
        assert_eq!(dec("7").to_string_places(8), "7.00000000");
        assert_eq!(dec("-0.004").to_string_places(2), "0.00");
    }

    #[test]
    fn trunc_toward_zero() {
        assert_eq!(dec("108.9571").trunc(), 108);
        assert_eq!(dec("-3.9").trunc(), -3);
        assert_eq!(dec("0.999").trunc(), 0);
    }

    #[test]
    fn mul_and_div() {
        assert_eq!(
            dec("12.6").checked_mul(&dec("0.1")).unwrap(),
            dec("1.26")
        );
        assert_eq!(
            dec("-1.5").checked_mul(&dec("4")).unwrap(),
            dec("-6")
        );
        assert_eq!(
            dec("1000000").checked_mul(&dec("1000000")).unwrap(),
            dec("1000000000000")
        );
        assert_eq!(
            dec("190").checked_div(&dec("180")).unwrap().to_string_places(10),
            "1.0555555556"
        );
        assert_eq!(
            dec("1").checked_div(&dec("3")).unwrap().to_string_places(18),
            "0.333333333333333333"
        );
        assert_eq!(
            dec("2").checked_div(&dec("3")).unwrap().to_string_places(18),
            "0.666666666666666667"
        );
        assert_eq!(
            dec("800000").checked_div(&dec("1000000")).unwrap(),
            dec("0.8")
        );
        assert_eq!(
            dec("-1").checked_div(&dec("8")).unwrap(),
            dec("-0.125")
        );
        assert_eq!(
            dec("1").checked_div(&FixedDecimal::ZERO),
            Err(DecimalError::DivisionByZero)
        );
    }

    #[test]
    fn from_f64_is_exact_binary_value() {
        // 0.1 is slightly above one tenth in binary
        assert_eq!(
            FixedDecimal::from_f64(0.1).unwrap().to_string_places(18),
            "0.100000000000000006"
        );
        assert_eq!(
            FixedDecimal::from_f64(1493755375.23).unwrap().to_string_places(2),
            "1493755375.23"
        );
        assert!(FixedDecimal::from_f64(f64::NAN).is_err());
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(dec("15.000").to_string(), "15");
        assert_eq!(dec("0.50").to_string(), "0.5");
        assert_eq!(dec("-0.25").to_string(), "-0.25");
    }

    #[test]
    fn random_cents_round_trip_through_text() {
        let mut rng = thread_rng();
        for _ in 0..1000 {
            let cents: i64 = rng.gen_range(-10_000_000_000..10_000_000_000);
            let d = FixedDecimal::from_units(cents, 2);
            assert_eq!(dec(&d.to_string_places(2)), d);
        }
    }
}
