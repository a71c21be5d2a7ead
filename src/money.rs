//! Exact Numeric Value Types
//!
//! Price, Quantity, and Money with fixed per-value decimal precision.
//! Construction quantizes half-up to the declared precision; arithmetic on
//! two values widens to the larger precision. Floating point never appears
//! on any path that affects fills, balances, or PnL.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::error::ValueError;

#[inline]
fn quantize(value: Decimal, precision: u8) -> Decimal {
    value.round_dp_with_strategy(precision as u32, RoundingStrategy::MidpointAwayFromZero)
}

// =============================================================================
// PRICE
// =============================================================================

/// Immutable price value with fixed decimal precision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Price {
    pub value: Decimal,
    pub precision: u8,
}

impl Price {
    pub fn new(value: Decimal, precision: u8) -> Self {
        Self {
            value: quantize(value, precision),
            precision,
        }
    }

    pub fn from_str(value: &str, precision: u8) -> Result<Self, ValueError> {
        let d = Decimal::from_str(value).map_err(|e| ValueError::InvalidConstruction {
            what: "Price",
            reason: format!("'{value}': {e}"),
        })?;
        Ok(Self::new(d, precision))
    }

    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl Add for Price {
    type Output = Price;
    fn add(self, rhs: Price) -> Price {
        Price::new(self.value + rhs.value, self.precision.max(rhs.precision))
    }
}

impl Sub for Price {
    type Output = Price;
    fn sub(self, rhs: Price) -> Price {
        Price::new(self.value - rhs.value, self.precision.max(rhs.precision))
    }
}

impl Mul<Decimal> for Price {
    type Output = Price;
    fn mul(self, rhs: Decimal) -> Price {
        Price::new(self.value * rhs, self.precision)
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Price {}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl std::hash::Hash for Price {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

// =============================================================================
// QUANTITY
// =============================================================================

/// Immutable non-negative quantity with fixed decimal precision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quantity {
    pub value: Decimal,
    pub precision: u8,
}

impl Quantity {
    pub fn new(value: Decimal, precision: u8) -> Result<Self, ValueError> {
        let q = quantize(value, precision);
        if q.is_sign_negative() && !q.is_zero() {
            return Err(ValueError::NegativeQuantity(q.to_string()));
        }
        Ok(Self {
            value: q,
            precision,
        })
    }

    pub fn from_str(value: &str, precision: u8) -> Result<Self, ValueError> {
        let d = Decimal::from_str(value).map_err(|e| ValueError::InvalidConstruction {
            what: "Quantity",
            reason: format!("'{value}': {e}"),
        })?;
        Self::new(d, precision)
    }

    pub fn zero(precision: u8) -> Self {
        Self {
            value: Decimal::ZERO,
            precision,
        }
    }

    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Saturating subtraction clamped at zero.
    pub fn saturating_sub(&self, rhs: Quantity) -> Quantity {
        let v = (self.value - rhs.value).max(Decimal::ZERO);
        Quantity {
            value: quantize(v, self.precision.max(rhs.precision)),
            precision: self.precision.max(rhs.precision),
        }
    }
}

impl Add for Quantity {
    type Output = Quantity;
    fn add(self, rhs: Quantity) -> Quantity {
        let precision = self.precision.max(rhs.precision);
        Quantity {
            value: quantize(self.value + rhs.value, precision),
            precision,
        }
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Quantity {}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl std::hash::Hash for Quantity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

// =============================================================================
// MONEY
// =============================================================================

/// Immutable monetary value: amount quantized to the currency's precision.
///
/// Arithmetic is only defined between values of the same currency; mixing
/// currencies fails with [`ValueError::CurrencyMismatch`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: quantize(amount, currency.precision),
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn checked_add(&self, rhs: &Money) -> Result<Money, ValueError> {
        self.check_currency(rhs)?;
        Ok(Money::new(self.amount + rhs.amount, self.currency.clone()))
    }

    pub fn checked_sub(&self, rhs: &Money) -> Result<Money, ValueError> {
        self.check_currency(rhs)?;
        Ok(Money::new(self.amount - rhs.amount, self.currency.clone()))
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    fn check_currency(&self, rhs: &Money) -> Result<(), ValueError> {
        if self.currency != rhs.currency {
            return Err(ValueError::CurrencyMismatch {
                lhs: self.currency.code.clone(),
                rhs: rhs.currency.code.clone(),
            });
        }
        Ok(())
    }
}

impl Mul<Decimal> for Money {
    type Output = Money;
    fn mul(self, rhs: Decimal) -> Money {
        Money::new(self.amount * rhs, self.currency)
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money::new(-self.amount, self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::usd;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_quantizes_half_up() {
        assert_eq!(Price::new(dec!(100.005), 2).value, dec!(100.01));
        assert_eq!(Price::new(dec!(100.004), 2).value, dec!(100.00));
        assert_eq!(Price::from_str("99.999", 2).unwrap().value, dec!(100.00));
    }

    #[test]
    fn test_price_arithmetic_widens_precision() {
        let a = Price::new(dec!(100.5), 1);
        let b = Price::new(dec!(0.25), 2);
        let sum = a + b;
        assert_eq!(sum.value, dec!(100.75));
        assert_eq!(sum.precision, 2);
    }

    #[test]
    fn test_price_ordering() {
        assert!(Price::new(dec!(100), 2) < Price::new(dec!(100.01), 2));
        assert_eq!(Price::new(dec!(100.0), 2), Price::new(dec!(100), 1));
    }

    #[test]
    fn test_quantity_rejects_negative() {
        assert!(Quantity::new(dec!(-1), 0).is_err());
        assert!(Quantity::new(dec!(0), 0).is_ok());
    }

    #[test]
    fn test_quantity_saturating_sub() {
        let a = Quantity::new(dec!(5), 0).unwrap();
        let b = Quantity::new(dec!(8), 0).unwrap();
        assert!(a.saturating_sub(b).is_zero());
        assert_eq!(b.saturating_sub(a).value, dec!(3));
    }

    #[test]
    fn test_money_currency_mismatch() {
        let a = Money::new(dec!(10), usd());
        let b = Money::new(dec!(10), Currency::from_code("EUR").unwrap());
        assert!(matches!(
            a.checked_add(&b),
            Err(ValueError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn test_money_quantizes_to_currency_precision() {
        let m = Money::new(dec!(10.005), usd());
        assert_eq!(m.amount, dec!(10.01));

        let jpy = Currency::from_code("JPY").unwrap();
        assert_eq!(Money::new(dec!(1000.4), jpy).amount, dec!(1000));
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::new(dec!(10.50), usd());
        let b = Money::new(dec!(2.25), usd());
        assert_eq!(a.checked_add(&b).unwrap().amount, dec!(12.75));
        assert_eq!(a.checked_sub(&b).unwrap().amount, dec!(8.25));
        assert_eq!((a * dec!(2)).amount, dec!(21.00));
    }
}
