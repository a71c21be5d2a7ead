//! Venue Simulation Models
//!
//! The fill model controls fill probability at the limit price and market
//! order slippage; the fee model computes commissions per fill. All
//! randomness flows through a seeded `ChaCha8Rng` so runs are reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;

use crate::enums::{LiquiditySide, OrderSide};
use crate::instrument::Instrument;
use crate::money::{Money, Price, Quantity};
use crate::orders::Order;

// =============================================================================
// FILL MODEL
// =============================================================================

/// Controls whether and at what price an order fills in simulation.
#[derive(Debug, Clone)]
pub struct FillModel {
    /// Probability [0,1] a limit order fills when price trades exactly at
    /// the limit (a trade through the limit always fills).
    pub prob_fill_on_limit: f64,
    /// Probability [0,1] of extra ticks of slippage on market fills.
    pub prob_slippage: f64,
    /// Maximum slippage in ticks of the instrument price increment.
    pub max_slippage_ticks: u32,
    rng: ChaCha8Rng,
}

impl FillModel {
    pub fn new(
        prob_fill_on_limit: f64,
        prob_slippage: f64,
        max_slippage_ticks: u32,
        seed: u64,
    ) -> Self {
        Self {
            prob_fill_on_limit,
            prob_slippage,
            max_slippage_ticks,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Should a limit order fill when the market is exactly at the limit?
    pub fn is_limit_filled(&mut self, is_exactly_at_limit: bool) -> bool {
        if !is_exactly_at_limit {
            return true;
        }
        self.rng.gen::<f64>() < self.prob_fill_on_limit
    }

    /// Apply slippage to a market fill price: worse for the trader, up to
    /// `max_slippage_ticks` of the instrument price increment.
    pub fn apply_slippage(
        &mut self,
        price: Price,
        side: OrderSide,
        instrument: &Instrument,
    ) -> Price {
        if self.prob_slippage <= 0.0
            || self.max_slippage_ticks == 0
            || self.rng.gen::<f64>() >= self.prob_slippage
        {
            return price;
        }
        let ticks = Decimal::from(self.rng.gen_range(1..=self.max_slippage_ticks));
        let offset = instrument.price_increment.value * ticks;
        let value = match side {
            OrderSide::Buy => price.value + offset,
            OrderSide::Sell => price.value - offset,
        };
        Price::new(value, instrument.price_precision)
    }
}

impl Default for FillModel {
    /// Guaranteed fills at the limit, no slippage.
    fn default() -> Self {
        Self::new(1.0, 0.0, 0, 42)
    }
}

// =============================================================================
// FEE MODEL
// =============================================================================

/// Calculates trading commissions per fill.
pub trait FeeModel {
    fn commission(
        &self,
        order: &Order,
        fill_qty: Quantity,
        fill_px: Price,
        instrument: &Instrument,
        liquidity_side: LiquiditySide,
    ) -> Money;
}

/// Percentage fee on notional, using the instrument's maker/taker rates.
#[derive(Debug, Clone, Default)]
pub struct MakerTakerFeeModel;

impl FeeModel for MakerTakerFeeModel {
    fn commission(
        &self,
        _order: &Order,
        fill_qty: Quantity,
        fill_px: Price,
        instrument: &Instrument,
        liquidity_side: LiquiditySide,
    ) -> Money {
        let rate = match liquidity_side {
            LiquiditySide::Maker => instrument.maker_fee,
            LiquiditySide::Taker => instrument.taker_fee,
        };
        instrument.notional_value(fill_qty, fill_px) * rate
    }
}

/// Flat fee per trade (e.g. $1 per contract fill for futures).
#[derive(Debug, Clone)]
pub struct FixedFeeModel {
    pub fee_per_trade: Money,
}

impl FeeModel for FixedFeeModel {
    fn commission(
        &self,
        _order: &Order,
        _fill_qty: Quantity,
        _fill_px: Price,
        _instrument: &Instrument,
        _liquidity_side: LiquiditySide,
    ) -> Money {
        self.fee_per_trade.clone()
    }
}

/// Per-share fee (common for US equity brokers).
#[derive(Debug, Clone)]
pub struct PerShareFeeModel {
    pub fee_per_share: Money,
}

impl FeeModel for PerShareFeeModel {
    fn commission(
        &self,
        _order: &Order,
        fill_qty: Quantity,
        _fill_px: Price,
        _instrument: &Instrument,
        _liquidity_side: LiquiditySide,
    ) -> Money {
        self.fee_per_share.clone() * fill_qty.value
    }
}

/// No commissions.
#[derive(Debug, Clone, Default)]
pub struct ZeroFeeModel;

impl FeeModel for ZeroFeeModel {
    fn commission(
        &self,
        _order: &Order,
        _fill_qty: Quantity,
        _fill_px: Price,
        instrument: &Instrument,
        _liquidity_side: LiquiditySide,
    ) -> Money {
        Money::zero(instrument.quote_currency.clone())
    }
}
