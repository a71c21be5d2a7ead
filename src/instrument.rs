//! Instrument Definitions
//!
//! Pricing metadata consumed by the matching engine, position tracking, and
//! risk calculations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;
use crate::identifiers::{InstrumentId, Venue};
use crate::money::{Money, Price, Quantity};

/// Instrument definition.
///
/// Notional value is `qty * price * multiplier` for linear instruments and
/// `qty / price * multiplier` for inverse contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub quote_currency: Currency,
    pub is_inverse: bool,
    pub price_precision: u8,
    pub size_precision: u8,
    pub price_increment: Price,
    pub size_increment: Quantity,
    pub multiplier: Decimal,
    pub lot_size: Option<Quantity>,
    pub max_quantity: Option<Quantity>,
    pub min_quantity: Option<Quantity>,
    pub max_price: Option<Price>,
    pub min_price: Option<Price>,
    pub margin_init: Decimal,
    pub margin_maint: Decimal,
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
}

impl Instrument {
    /// A linear instrument with sensible defaults for everything beyond
    /// precisions and fees.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: InstrumentId,
        quote_currency: Currency,
        price_precision: u8,
        size_precision: u8,
        price_increment: Price,
        size_increment: Quantity,
        maker_fee: Decimal,
        taker_fee: Decimal,
    ) -> Self {
        Self {
            id,
            quote_currency,
            is_inverse: false,
            price_precision,
            size_precision,
            price_increment,
            size_increment,
            multiplier: Decimal::ONE,
            lot_size: None,
            max_quantity: None,
            min_quantity: None,
            max_price: None,
            min_price: None,
            margin_init: Decimal::ZERO,
            margin_maint: Decimal::ZERO,
            maker_fee,
            taker_fee,
        }
    }

    #[inline]
    pub fn symbol(&self) -> &str {
        &self.id.symbol
    }

    #[inline]
    pub fn venue(&self) -> &Venue {
        &self.id.venue
    }

    /// Round a raw value to this instrument's price precision.
    pub fn make_price(&self, value: Decimal) -> Price {
        Price::new(value, self.price_precision)
    }

    /// Round a raw value to this instrument's size precision.
    pub fn make_qty(&self, value: Decimal) -> Quantity {
        Quantity::new(value.max(Decimal::ZERO), self.size_precision)
            .expect("non-negative by clamp")
    }

    /// Contract notional value in the quote currency.
    pub fn notional_value(&self, quantity: Quantity, price: Price) -> Money {
        let notional = if self.is_inverse {
            quantity.value / price.value * self.multiplier
        } else {
            quantity.value * price.value * self.multiplier
        };
        Money::new(notional, self.quote_currency.clone())
    }
}
