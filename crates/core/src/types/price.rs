//! Decimal prices and their table-storage string form.
//!
//! Table storage has no decimal column type, so prices are persisted as
//! fixed two-place strings (`"29.99"`). Reading that form back is lenient:
//! anything that does not parse becomes zero, which matches rows written by
//! older tooling. Form input goes through [`Price::parse_input`] instead,
//! which rejects bad values.

use core::fmt;
use core::ops::Add;
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when parsing a [`Price`] from user input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// No value was entered.
    #[error("Price is required")]
    Missing,
    /// The value is not a decimal number.
    #[error("Please enter a valid price (e.g., 29.99)")]
    Invalid,
    /// The value is above [`Price::MAX_INPUT`].
    #[error("Price must not exceed $1,000,000,000.00")]
    TooLarge,
}

/// A monetary amount in the store currency.
///
/// Serializes as the two-decimal storage string.
///
/// ```
/// use cloudmart_core::Price;
///
/// let price = Price::parse_input(" 19.5 ").unwrap();
/// assert_eq!(price.to_storage_string(), "19.50");
/// assert_eq!(Price::from_storage_str("not a price"), Price::ZERO);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Largest price accepted from a form.
    pub const MAX_INPUT: Self = Self(Decimal::from_parts(1_000_000_000, 0, 0, false, 0));

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Build a price from an integer number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Parse the persisted string form. Unparseable input yields zero.
    #[must_use]
    pub fn from_storage_str(s: &str) -> Self {
        Decimal::from_str(s.trim()).map_or(Self::ZERO, Self)
    }

    /// Format for persistence: two decimal places, midpoint away from zero.
    #[must_use]
    pub fn to_storage_string(&self) -> String {
        let rounded = self
            .0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{rounded:.2}")
    }

    /// Parse a price typed into a form.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Missing` for blank input, `PriceError::Invalid`
    /// when the text is not a decimal number and `PriceError::TooLarge`
    /// above [`Price::MAX_INPUT`].
    pub fn parse_input(s: &str) -> Result<Self, PriceError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PriceError::Missing);
        }
        let amount = Decimal::from_str(trimmed).map_err(|_| PriceError::Invalid)?;
        if amount > Self::MAX_INPUT.0 {
            return Err(PriceError::TooLarge);
        }
        Ok(Self::from_storage_str(&Self(amount).to_storage_string()))
    }

    /// Total for `quantity` units, or `None` if it does not fit.
    #[must_use]
    pub fn checked_mul(self, quantity: i32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).map(Self)
    }

    /// Total for `quantity` units, clamped at the largest representable amount.
    #[must_use]
    pub fn saturating_mul(self, quantity: i32) -> Self {
        Self(self.0.saturating_mul(Decimal::from(quantity)))
    }

    /// Divide evenly across `quantity` units, or zero when quantity is not positive.
    #[must_use]
    pub fn per_unit(&self, quantity: i32) -> Self {
        if quantity <= 0 {
            return Self::ZERO;
        }
        Self(self.0 / Decimal::from(quantity))
    }

    /// Human-readable amount with currency symbol, e.g. `$19.99`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("${}", self.to_storage_string())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_string())
    }
}

/// Saturates instead of overflowing.
impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl core::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_storage_string())
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map_or(Self::ZERO, |s| Self::from_storage_str(&s)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_string_has_two_places() {
        assert_eq!(Price::from_cents(2999).to_storage_string(), "29.99");
        assert_eq!(Price::new(Decimal::from(5)).to_storage_string(), "5.00");
    }

    #[test]
    fn test_storage_string_rounds_midpoint_away_from_zero() {
        let price = Price::new(Decimal::from_str("2.345").unwrap());
        assert_eq!(price.to_storage_string(), "2.35");
        let price = Price::new(Decimal::from_str("2.344").unwrap());
        assert_eq!(price.to_storage_string(), "2.34");
    }

    #[test]
    fn test_from_storage_str_is_lenient() {
        assert_eq!(Price::from_storage_str("12.50"), Price::from_cents(1250));
        assert_eq!(Price::from_storage_str(" 7 "), Price::from_cents(700));
        assert_eq!(Price::from_storage_str("abc"), Price::ZERO);
        assert_eq!(Price::from_storage_str(""), Price::ZERO);
    }

    #[test]
    fn test_parse_input_errors() {
        assert_eq!(Price::parse_input("   "), Err(PriceError::Missing));
        assert_eq!(Price::parse_input("twelve"), Err(PriceError::Invalid));
        assert_eq!(Price::parse_input("9.999").unwrap(), Price::from_cents(1000));
    }

    #[test]
    fn test_parse_input_caps_amount() {
        assert_eq!(
            Price::parse_input("100000000000000000000000000"),
            Err(PriceError::TooLarge)
        );
        assert_eq!(Price::parse_input("1000000000.01"), Err(PriceError::TooLarge));
        assert_eq!(Price::parse_input("1000000000").unwrap(), Price::MAX_INPUT);
    }

    #[test]
    fn test_huge_amount_times_quantity_does_not_panic() {
        let huge = Price::new(Decimal::from_str("100000000000000000000000000").unwrap());
        assert_eq!(huge.checked_mul(1000), None);
        assert_eq!(huge.saturating_mul(1000), Price::new(Decimal::MAX));
        assert_eq!(huge.saturating_mul(1000) + huge, Price::new(Decimal::MAX));
        assert!(Price::MAX_INPUT.checked_mul(i32::MAX).is_some());
    }

    #[test]
    fn test_line_total_and_sum() {
        let unit = Price::from_cents(1999);
        assert_eq!(unit.checked_mul(3), Some(Price::from_cents(5997)));
        let total: Price = [unit, Price::from_cents(1)].into_iter().sum();
        assert_eq!(total, Price::from_cents(2000));
    }

    #[test]
    fn test_per_unit() {
        assert_eq!(Price::from_cents(3000).per_unit(3), Price::from_cents(1000));
        assert_eq!(Price::from_cents(3000).per_unit(0), Price::ZERO);
    }

    #[test]
    fn test_serde_uses_storage_string() {
        let json = serde_json::to_string(&Price::from_cents(450)).unwrap();
        assert_eq!(json, "\"4.50\"");
        let parsed: Price = serde_json::from_str("\"oops\"").unwrap();
        assert_eq!(parsed, Price::ZERO);
        let parsed: Price = serde_json::from_str("null").unwrap();
        assert_eq!(parsed, Price::ZERO);
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_cents(1999).display(), "$19.99");
    }
}
