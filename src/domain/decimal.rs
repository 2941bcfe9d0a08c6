//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Provides canonical parsing from strings, formatting without exponent notation,
//! and the handful of helpers the cost-basis engine needs (zero-safe division,
//! millisecond ratios, clamping).

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lossless decimal numeric type for amounts, prices and settlement values.
///
/// Serializes to a JSON string so cached payloads and API responses round-trip
/// without passing through `f64`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "canonical_str")] RustDecimal);

mod canonical_str {
    use rust_decimal::Decimal;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.normalize())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let raw = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        Decimal::from_str(raw.trim()).map_err(de::Error::custom)
    }
}

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent, no trailing zeros).
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    /// Ratio of two millisecond spans, e.g. an interpolation weight.
    ///
    /// Returns zero when `denominator_ms` is zero.
    pub fn from_ms_ratio(numerator_ms: i64, denominator_ms: i64) -> Self {
        Self::from_i64(numerator_ms).safe_div(Self::from_i64(denominator_ms))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Division that resolves a zero divisor to zero instead of panicking.
    ///
    /// Average cost over a flat position is defined as 0.
    pub fn safe_div(self, rhs: Decimal) -> Decimal {
        if rhs.is_zero() {
            return Decimal::zero();
        }
        self.0.checked_div(rhs.0).map(Decimal).unwrap_or_default()
    }

    pub fn clamp(self, lo: Decimal, hi: Decimal) -> Decimal {
        if self < lo {
            lo
        } else if self > hi {
            hi
        } else {
            self
        }
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_decimal_canonical_strips_trailing_zeros() {
        assert_eq!(d("2000.0000").to_canonical_string(), "2000");
        assert_eq!(d("0.050").to_canonical_string(), "0.05");
        assert!(!d("123").to_canonical_string().contains('e'));
    }

    #[test]
    fn test_decimal_parse_trims_whitespace() {
        assert_eq!(d(" 42.5 "), d("42.5"));
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = d("10.5");
        let b = d("2.5");
        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
        assert_eq!((a / b).to_canonical_string(), "4.2");
    }

    #[test]
    fn test_safe_div_by_zero_is_zero() {
        assert_eq!(d("750").safe_div(Decimal::zero()), Decimal::zero());
        assert_eq!(d("750").safe_div(d("0.5")), d("1500"));
    }

    #[test]
    fn test_ms_ratio() {
        assert_eq!(Decimal::from_ms_ratio(15_000, 60_000), d("0.25"));
        assert_eq!(Decimal::from_ms_ratio(1, 0), Decimal::zero());
    }

    #[test]
    fn test_clamp() {
        let lo = Decimal::zero();
        let hi = Decimal::one();
        assert_eq!(d("1.3").clamp(lo, hi), hi);
        assert_eq!(d("-0.2").clamp(lo, hi), lo);
        assert_eq!(d("0.4").clamp(lo, hi), d("0.4"));
    }

    #[test]
    fn test_decimal_json_is_string() {
        let json = serde_json::to_value(d("0.05")).unwrap();
        assert_eq!(json, serde_json::json!("0.05"));
        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, d("0.05"));

        let json = serde_json::to_value(d("2500.0") * d("0.10")).unwrap();
        assert_eq!(json, serde_json::json!("250"));
        assert!(serde_json::from_value::<Decimal>(serde_json::json!("abc")).is_err());
    }

    #[test]
    fn test_decimal_sum() {
        let total: Decimal = vec![d("1"), d("2.5"), d("-0.5")].into_iter().sum();
        assert_eq!(total, d("3"));
    }
}
