//! Pre-Trade Risk Gate
//!
//! Every order passes through the risk engine before reaching a venue.
//! Failures produce a deny reason string surfaced as an `OrderDenied` event
//! by the execution engine.

use rust_decimal::Decimal;

use crate::cache::Cache;
use crate::enums::{OrderSide, TradingState};
use crate::orders::Order;

/// Pre-trade risk checks: trading state, reduce-only validation, and an
/// optional per-order notional cap.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine {
    pub trading_state: TradingState,
    /// Maximum notional per order in quote currency (None = unlimited).
    pub max_notional_per_order: Option<Decimal>,
}

impl RiskEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_trading_state(&mut self, state: TradingState) {
        self.trading_state = state;
    }

    /// Run all checks on an order. Returns the deny reason on failure.
    ///
    /// The reduce-only check uses the net open position for
    /// `(instrument, strategy)`: a reduce-only BUY requires a short, a
    /// reduce-only SELL requires a long.
    pub fn check_order(&self, order: &Order, cache: &Cache) -> Result<(), String> {
        match self.trading_state {
            TradingState::Halted => return Err("trading is halted".to_string()),
            TradingState::Reducing if !order.reduce_only => {
                return Err("trading state is REDUCING; only reduce-only orders allowed".to_string());
            }
            _ => {}
        }

        if order.reduce_only {
            let net = cache.net_position(&order.instrument_id, Some(&order.strategy_id));
            if net.is_zero() {
                return Err("reduce-only order denied: no open position to reduce".to_string());
            }
            match order.side {
                OrderSide::Buy if net >= Decimal::ZERO => {
                    return Err("reduce-only BUY denied: position is not short".to_string());
                }
                OrderSide::Sell if net <= Decimal::ZERO => {
                    return Err("reduce-only SELL denied: position is not long".to_string());
                }
                _ => {}
            }
        }

        if let Some(max_notional) = self.max_notional_per_order {
            if let (Some(instrument), Some(price)) =
                (cache.instrument(&order.instrument_id), order.price)
            {
                let notional = instrument.notional_value(order.quantity, price);
                if notional.amount > max_notional {
                    return Err(format!(
                        "order notional {} exceeds max {max_notional}",
                        notional.amount
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::usd;
    use crate::events::{OrderEventCore, OrderFilled};
    use crate::identifiers::{
        AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, TradeId, TraderId,
        VenueOrderId,
    };
    use crate::instrument::Instrument;
    use crate::money::{Money, Price, Quantity};
    use crate::orders::OrderFactory;
    use crate::position::Position;
    use rust_decimal_macros::dec;

    fn instrument_id() -> InstrumentId {
        InstrumentId::from_str("AAPL.SIM").unwrap()
    }

    fn factory() -> OrderFactory {
        OrderFactory::new(
            TraderId::new("TRADER-001").unwrap(),
            StrategyId::new("S1").unwrap(),
        )
    }

    fn long_position(qty: Decimal) -> Position {
        let fill = OrderFilled {
            core: OrderEventCore::new(
                TraderId::new("TRADER-001").unwrap(),
                StrategyId::new("S1").unwrap(),
                instrument_id(),
                ClientOrderId::new("O-S1-99").unwrap(),
                1,
            ),
            venue_order_id: VenueOrderId::new("V-SIM-1").unwrap(),
            account_id: AccountId::new("SIM-001").unwrap(),
            trade_id: TradeId::new("T-SIM-1").unwrap(),
            order_side: OrderSide::Buy,
            order_type: crate::enums::OrderType::Market,
            last_qty: Quantity::new(qty, 0).unwrap(),
            last_px: Price::new(dec!(100), 2),
            currency: usd(),
            commission: Money::zero(usd()),
            liquidity_side: crate::enums::LiquiditySide::Taker,
            position_id: None,
        };
        Position::new(PositionId::new("P-S1-AAPL-1").unwrap(), &fill, dec!(1))
    }

    #[test]
    fn test_halted_denies_everything() {
        let mut risk = RiskEngine::new();
        risk.set_trading_state(TradingState::Halted);
        let cache = Cache::new();
        let order = factory().market(
            instrument_id(),
            OrderSide::Buy,
            Quantity::new(dec!(1), 0).unwrap(),
            0,
        );
        assert!(risk.check_order(&order, &cache).is_err());
    }

    #[test]
    fn test_reducing_allows_only_reduce_only() {
        let mut risk = RiskEngine::new();
        risk.set_trading_state(TradingState::Reducing);
        let mut cache = Cache::new();
        cache.add_position(long_position(dec!(10)));

        let mut f = factory();
        let plain = f.market(
            instrument_id(),
            OrderSide::Sell,
            Quantity::new(dec!(1), 0).unwrap(),
            0,
        );
        assert!(risk.check_order(&plain, &cache).is_err());

        let reduce = f
            .market(
                instrument_id(),
                OrderSide::Sell,
                Quantity::new(dec!(1), 0).unwrap(),
                0,
            )
            .with_reduce_only();
        assert!(risk.check_order(&reduce, &cache).is_ok());
    }

    #[test]
    fn test_reduce_only_requires_opposite_position() {
        let risk = RiskEngine::new();
        let mut cache = Cache::new();

        let mut f = factory();
        let sell_reduce = f
            .market(
                instrument_id(),
                OrderSide::Sell,
                Quantity::new(dec!(5), 0).unwrap(),
                0,
            )
            .with_reduce_only();

        // Flat: denied.
        assert!(risk.check_order(&sell_reduce, &cache).is_err());

        // Long: SELL reduce-only passes, BUY reduce-only denied.
        cache.add_position(long_position(dec!(10)));
        assert!(risk.check_order(&sell_reduce, &cache).is_ok());

        let buy_reduce = f
            .market(
                instrument_id(),
                OrderSide::Buy,
                Quantity::new(dec!(5), 0).unwrap(),
                0,
            )
            .with_reduce_only();
        assert!(risk.check_order(&buy_reduce, &cache).is_err());
    }

    #[test]
    fn test_max_notional_cap() {
        let risk = RiskEngine {
            trading_state: TradingState::Active,
            max_notional_per_order: Some(dec!(10000)),
        };
        let mut cache = Cache::new();
        cache.add_instrument(Instrument::new(
            instrument_id(),
            usd(),
            2,
            0,
            Price::new(dec!(0.01), 2),
            Quantity::new(dec!(1), 0).unwrap(),
            dec!(0),
            dec!(0),
        ));

        let mut f = factory();
        let small = f.limit(
            instrument_id(),
            OrderSide::Buy,
            Quantity::new(dec!(10), 0).unwrap(),
            Price::new(dec!(100), 2),
            0,
        );
        assert!(risk.check_order(&small, &cache).is_ok());

        let large = f.limit(
            instrument_id(),
            OrderSide::Buy,
            Quantity::new(dec!(200), 0).unwrap(),
            Price::new(dec!(100), 2),
            0,
        );
        assert!(risk.check_order(&large, &cache).is_err());
    }
}
