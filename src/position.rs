//! Position Tracking
//!
//! A position aggregates fills for a single instrument: one shared position
//! per `(instrument, strategy)` in NETTING mode, or one per opening order in
//! HEDGING mode. Signed quantity is positive long / negative short; the open
//! price is the volume-weighted average of the fills that built the current
//! open leg.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clock::Nanos;
use crate::currency::Currency;
use crate::enums::{OrderSide, PositionSide};
use crate::events::OrderFilled;
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, TradeId, TraderId,
};
use crate::money::{Price, Quantity};

/// An open or closed position built from `OrderFilled` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub instrument_id: InstrumentId,
    pub account_id: AccountId,
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub currency: Currency,
    pub multiplier: Decimal,

    /// Signed net quantity: positive = long, negative = short.
    pub signed_qty: Decimal,
    pub buy_qty: Decimal,
    pub buy_cost: Decimal,
    pub sell_qty: Decimal,
    pub sell_cost: Decimal,

    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub commissions: Decimal,

    pub opening_order_id: ClientOrderId,
    pub closing_order_id: Option<ClientOrderId>,
    pub ts_opened: Nanos,
    pub ts_closed: Option<Nanos>,
    pub ts_last: Nanos,

    pub trade_ids: Vec<TradeId>,
    pub fills: Vec<OrderFilled>,

    size_precision: u8,
}

impl Position {
    /// Open a position from its first fill.
    pub fn new(position_id: PositionId, opening_fill: &OrderFilled, multiplier: Decimal) -> Self {
        let mut position = Self {
            id: position_id,
            instrument_id: opening_fill.core.instrument_id.clone(),
            account_id: opening_fill.account_id.clone(),
            trader_id: opening_fill.core.trader_id.clone(),
            strategy_id: opening_fill.core.strategy_id.clone(),
            currency: opening_fill.currency.clone(),
            multiplier,
            signed_qty: Decimal::ZERO,
            buy_qty: Decimal::ZERO,
            buy_cost: Decimal::ZERO,
            sell_qty: Decimal::ZERO,
            sell_cost: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            commissions: Decimal::ZERO,
            opening_order_id: opening_fill.core.client_order_id.clone(),
            closing_order_id: None,
            ts_opened: opening_fill.core.ts_event,
            ts_closed: None,
            ts_last: opening_fill.core.ts_event,
            trade_ids: Vec::new(),
            fills: Vec::new(),
            size_precision: opening_fill.last_qty.precision,
        };
        position.apply(opening_fill);
        position
    }

    // === State ===

    #[inline]
    pub fn side(&self) -> PositionSide {
        if self.signed_qty > Decimal::ZERO {
            PositionSide::Long
        } else if self.signed_qty < Decimal::ZERO {
            PositionSide::Short
        } else {
            PositionSide::Flat
        }
    }

    /// Net absolute quantity currently held.
    pub fn quantity(&self) -> Quantity {
        Quantity {
            value: self.signed_qty.abs(),
            precision: self.size_precision,
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        !self.signed_qty.is_zero()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.signed_qty.is_zero() && !self.fills.is_empty()
    }

    #[inline]
    pub fn is_long(&self) -> bool {
        self.signed_qty > Decimal::ZERO
    }

    #[inline]
    pub fn is_short(&self) -> bool {
        self.signed_qty < Decimal::ZERO
    }

    /// Volume-weighted average open price for the current open leg.
    pub fn avg_px_open(&self) -> Decimal {
        if self.signed_qty > Decimal::ZERO {
            if self.buy_qty.is_zero() {
                Decimal::ZERO
            } else {
                self.buy_cost / self.buy_qty
            }
        } else if self.signed_qty < Decimal::ZERO {
            if self.sell_qty.is_zero() {
                Decimal::ZERO
            } else {
                self.sell_cost / self.sell_qty
            }
        } else {
            Decimal::ZERO
        }
    }

    #[inline]
    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl
    }

    // === Fill application ===

    /// Apply a fill to the position.
    ///
    /// A fill in the position's direction adds to the open leg. A fill in
    /// the opposite direction realizes PnL on `min(q, |signed_qty|)` and, if
    /// it flips the position, re-seeds the open leg from the overflow at the
    /// fill price.
    pub fn apply(&mut self, fill: &OrderFilled) {
        let qty = fill.last_qty.value;
        let px = fill.last_px.value;
        let commission = fill.commission.amount;

        self.commissions += commission;
        self.trade_ids.push(fill.trade_id.clone());

        match fill.order_side {
            OrderSide::Buy => {
                if self.signed_qty < Decimal::ZERO {
                    let close_qty = qty.min(self.signed_qty.abs());
                    let realized = close_qty * (self.avg_px_open() - px) * self.multiplier;
                    self.realized_pnl += realized - commission;

                    let overflow = qty - close_qty;
                    self.signed_qty += qty;
                    if overflow > Decimal::ZERO {
                        // Flipped short -> long: open leg restarts here.
                        self.buy_qty = overflow;
                        self.buy_cost = overflow * px;
                        self.sell_qty = Decimal::ZERO;
                        self.sell_cost = Decimal::ZERO;
                    }
                } else {
                    self.signed_qty += qty;
                    self.buy_qty += qty;
                    self.buy_cost += qty * px;
                }
            }
            OrderSide::Sell => {
                if self.signed_qty > Decimal::ZERO {
                    let close_qty = qty.min(self.signed_qty);
                    let realized = close_qty * (px - self.avg_px_open()) * self.multiplier;
                    self.realized_pnl += realized - commission;

                    let overflow = qty - close_qty;
                    self.signed_qty -= qty;
                    if overflow > Decimal::ZERO {
                        // Flipped long -> short: open leg restarts here.
                        self.sell_qty = overflow;
                        self.sell_cost = overflow * px;
                        self.buy_qty = Decimal::ZERO;
                        self.buy_cost = Decimal::ZERO;
                    }
                } else {
                    self.signed_qty -= qty;
                    self.sell_qty += qty;
                    self.sell_cost += qty * px;
                }
            }
        }

        if self.signed_qty.is_zero() {
            self.ts_closed = Some(fill.core.ts_event);
            self.closing_order_id = Some(fill.core.client_order_id.clone());
            self.unrealized_pnl = Decimal::ZERO;
        }

        self.fills.push(fill.clone());
        self.ts_last = fill.core.ts_event;
    }

    /// Recompute unrealized PnL from a mark price.
    pub fn update_unrealized(&mut self, mark: Price) {
        let open_qty = self.signed_qty.abs();
        if open_qty.is_zero() {
            self.unrealized_pnl = Decimal::ZERO;
            return;
        }
        let mp = mark.value;
        self.unrealized_pnl = if self.signed_qty > Decimal::ZERO {
            open_qty * (mp - self.avg_px_open()) * self.multiplier
        } else {
            open_qty * (self.avg_px_open() - mp) * self.multiplier
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::usd;
    use crate::enums::{LiquiditySide, OrderType};
    use crate::events::OrderEventCore;
    use crate::identifiers::{Venue, VenueOrderId};
    use crate::money::Money;
    use rust_decimal_macros::dec;

    fn fill(side: OrderSide, qty: Decimal, px: Decimal, commission: Decimal, ts: Nanos) -> OrderFilled {
        let iid = InstrumentId::new("AAPL", Venue::new("SIM").unwrap()).unwrap();
        OrderFilled {
            core: OrderEventCore::new(
                TraderId::new("TRADER-001").unwrap(),
                StrategyId::new("S1").unwrap(),
                iid,
                ClientOrderId::new(format!("O-S1-{ts}")).unwrap(),
                ts,
            ),
            venue_order_id: VenueOrderId::new("V-SIM-1").unwrap(),
            account_id: AccountId::new("SIM-001").unwrap(),
            trade_id: TradeId::new(format!("T-SIM-{ts}")).unwrap(),
            order_side: side,
            order_type: OrderType::Market,
            last_qty: Quantity::new(qty, 0).unwrap(),
            last_px: Price::new(px, 2),
            currency: usd(),
            commission: Money::new(commission, usd()),
            liquidity_side: LiquiditySide::Taker,
            position_id: None,
        }
    }

    fn position(opening: &OrderFilled) -> Position {
        Position::new(PositionId::new("P-S1-AAPL-1").unwrap(), opening, dec!(1))
    }

    #[test]
    fn test_open_long() {
        let pos = position(&fill(OrderSide::Buy, dec!(10), dec!(100), dec!(0), 1));
        assert_eq!(pos.side(), PositionSide::Long);
        assert_eq!(pos.signed_qty, dec!(10));
        assert_eq!(pos.avg_px_open(), dec!(100));
        assert!(pos.is_open());
        assert!(!pos.is_closed());
    }

    #[test]
    fn test_vwap_accumulates_on_adds() {
        let mut pos = position(&fill(OrderSide::Buy, dec!(10), dec!(100), dec!(0), 1));
        pos.apply(&fill(OrderSide::Buy, dec!(10), dec!(110), dec!(0), 2));
        assert_eq!(pos.signed_qty, dec!(20));
        assert_eq!(pos.avg_px_open(), dec!(105));
    }

    #[test]
    fn test_close_long_realizes_pnl() {
        let mut pos = position(&fill(OrderSide::Buy, dec!(10), dec!(100), dec!(0), 1));
        pos.apply(&fill(OrderSide::Sell, dec!(10), dec!(94), dec!(0), 2));
        assert!(pos.is_closed());
        assert_eq!(pos.realized_pnl, dec!(-60));
        assert_eq!(pos.ts_closed, Some(2));
        assert_eq!(pos.unrealized_pnl, dec!(0));
    }

    #[test]
    fn test_partial_close_keeps_avg() {
        let mut pos = position(&fill(OrderSide::Buy, dec!(10), dec!(100), dec!(0), 1));
        pos.apply(&fill(OrderSide::Sell, dec!(4), dec!(110), dec!(0), 2));
        assert_eq!(pos.signed_qty, dec!(6));
        assert_eq!(pos.avg_px_open(), dec!(100));
        assert_eq!(pos.realized_pnl, dec!(40));
    }

    #[test]
    fn test_flip_reseeds_vwap_from_overflow() {
        let mut pos = position(&fill(OrderSide::Buy, dec!(10), dec!(100), dec!(0), 1));
        // Sell 15 at 105: closes 10 (+50), opens 5 short at 105.
        pos.apply(&fill(OrderSide::Sell, dec!(15), dec!(105), dec!(0), 2));
        assert_eq!(pos.signed_qty, dec!(-5));
        assert_eq!(pos.side(), PositionSide::Short);
        assert_eq!(pos.realized_pnl, dec!(50));
        assert_eq!(pos.avg_px_open(), dec!(105));
    }

    #[test]
    fn test_commissions_reduce_realized_on_close() {
        let mut pos = position(&fill(OrderSide::Buy, dec!(10), dec!(100), dec!(1.50), 1));
        pos.apply(&fill(OrderSide::Sell, dec!(10), dec!(101), dec!(1.50), 2));
        // Gross 10, closing commission subtracted from realized.
        assert_eq!(pos.realized_pnl, dec!(8.50));
        assert_eq!(pos.commissions, dec!(3.00));
    }

    #[test]
    fn test_short_position_pnl() {
        let mut pos = position(&fill(OrderSide::Sell, dec!(10), dec!(100), dec!(0), 1));
        assert_eq!(pos.side(), PositionSide::Short);
        assert_eq!(pos.avg_px_open(), dec!(100));

        pos.update_unrealized(Price::new(dec!(95), 2));
        assert_eq!(pos.unrealized_pnl, dec!(50));

        pos.apply(&fill(OrderSide::Buy, dec!(10), dec!(95), dec!(0), 2));
        assert!(pos.is_closed());
        assert_eq!(pos.realized_pnl, dec!(50));
    }

    #[test]
    fn test_signed_qty_equals_fill_sum() {
        let mut pos = position(&fill(OrderSide::Buy, dec!(10), dec!(100), dec!(0), 1));
        pos.apply(&fill(OrderSide::Sell, dec!(3), dec!(101), dec!(0), 2));
        pos.apply(&fill(OrderSide::Buy, dec!(5), dec!(102), dec!(0), 3));

        let buys: Decimal = pos
            .fills
            .iter()
            .filter(|f| f.order_side == OrderSide::Buy)
            .map(|f| f.last_qty.value)
            .sum();
        let sells: Decimal = pos
            .fills
            .iter()
            .filter(|f| f.order_side == OrderSide::Sell)
            .map(|f| f.last_qty.value)
            .sum();
        assert_eq!(pos.signed_qty, buys - sells);
    }
}
