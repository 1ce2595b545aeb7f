//! Fixed-point production amounts
//!
//! Amounts are `rust_decimal` values normalized to the ledger's scale.
//! Addition of values at one scale is exact, so a sum does not depend on
//! the order it was taken in. A result that no longer fits at that scale
//! is an overflow (`None`), never a rounded value.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Largest scale `rust_decimal` can represent
pub const MAX_SCALE: u32 = 28;

/// A fixed-point production amount.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Zero carrying `scale` fractional digits
    pub fn zero(scale: u32) -> Self {
        let mut value = Decimal::ZERO;
        value.rescale(scale.min(MAX_SCALE));
        Self(value)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Fractional digits carried
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// Round half-to-even to `scale` digits, then pin the scale so the text
    /// form always carries exactly `scale` fractional digits.
    ///
    /// `None` when the integer part is too large to carry `scale` digits.
    pub fn normalize(self, scale: u32) -> Option<Self> {
        let scale = scale.min(MAX_SCALE);
        let mut value = self
            .0
            .round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
        value.rescale(scale);
        (value.scale() == scale).then_some(Self(value))
    }

    /// Exact sum; `None` when it overflows or would lose fractional digits.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        let sum = self.0.checked_add(other.0)?;
        (sum.scale() >= self.0.scale().max(other.0.scale())).then_some(Amount(sum))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_pins_scale() {
        let a: Amount = "1.5".parse().unwrap();
        assert_eq!(a.normalize(4).unwrap().to_string(), "1.5000");
        assert_eq!(Amount::from(3).normalize(2).unwrap().to_string(), "3.00");
        assert_eq!(Amount::zero(8).to_string(), "0.00000000");
    }

    #[test]
    fn test_normalize_bankers_rounding() {
        let half_even: Amount = "0.125".parse().unwrap();
        assert_eq!(half_even.normalize(2).unwrap().to_string(), "0.12");
        let half_odd: Amount = "0.135".parse().unwrap();
        assert_eq!(half_odd.normalize(2).unwrap().to_string(), "0.14");
    }

    #[test]
    fn test_sum_is_order_independent() {
        let values: Vec<Amount> = ["0.10", "0.20", "0.30", "1000000.01"]
            .iter()
            .map(|s| s.parse::<Amount>().unwrap().normalize(2).unwrap())
            .collect();
        let forward = values
            .iter()
            .try_fold(Amount::ZERO, |acc, v| acc.checked_add(*v))
            .unwrap();
        let backward = values
            .iter()
            .rev()
            .try_fold(Amount::ZERO, |acc, v| acc.checked_add(*v))
            .unwrap();
        assert_eq!(forward.to_string(), backward.to_string());
        assert_eq!(forward.to_string(), "1000000.61");
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Amount::new(Decimal::MAX);
        assert!(max.checked_add(Amount::from(1)).is_none());
    }

    #[test]
    fn test_checked_add_rejects_lost_digits() {
        let half: Amount = "500000000000000000000.12345678".parse().unwrap();
        assert_eq!(half.scale(), 8);
        assert!(half.checked_add(half).is_none());

        let small: Amount = "0.12345678".parse().unwrap();
        let sum = half.checked_add(small).unwrap();
        assert_eq!(sum.to_string(), "500000000000000000000.24691356");
    }

    #[test]
    fn test_normalize_rejects_unrepresentable_scale() {
        let big: Amount = "50000000000000000000000".parse().unwrap();
        assert!(big.normalize(8).is_none());
        assert_eq!(big.normalize(2).unwrap().scale(), 2);
    }

    #[test]
    fn test_serde_round_trip_preserves_text() {
        let a = "12.34000000".parse::<Amount>().unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"12.34000000\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), "12.34000000");
    }

    #[test]
    fn test_deserialize_from_number() {
        let a: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(a, Amount::from(42));
    }
}
