//! Integration test: a full backtest run through the public API.
//!
//! Drives a moving-average crossover strategy over a generated bar series
//! and verifies the run produces a consistent, reproducible result.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use marketsim::{
    BacktestConfig, BacktestEngine, Bar, BarAggregation, BarType, InstrumentId, Instrument,
    MarketEventAny, Money, OmsType, OrderStatus, Price, Quantity, Strategy, StrategyContext,
    StrategyId, VenueConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn instrument_id() -> InstrumentId {
    InstrumentId::from_str("BTCUSDT.SIM").unwrap()
}

fn bar_type() -> BarType {
    BarType::new(instrument_id(), 1, BarAggregation::Minute)
}

fn instrument() -> Instrument {
    Instrument::new(
        instrument_id(),
        marketsim::usd(),
        2,
        0,
        Price::new(dec!(0.01), 2),
        Quantity::new(dec!(1), 0).unwrap(),
        dec!(0),
        dec!(0.0005),
    )
}

/// Deterministic synthetic price path: a slow sine wave around 100.
fn generate_bars(count: usize) -> Vec<MarketEventAny> {
    let mut bars = Vec::with_capacity(count);
    for i in 0..count {
        let phase = i as f64 / 12.0;
        let level = 100.0 + 8.0 * phase.sin();
        let open = Decimal::try_from(level).unwrap().round_dp(2);
        let close = Decimal::try_from(level + phase.cos()).unwrap().round_dp(2);
        let high = open.max(close) + dec!(0.50);
        let low = open.min(close) - dec!(0.50);
        bars.push(MarketEventAny::Bar(Bar {
            bar_type: bar_type(),
            open: Price::new(open, 2),
            high: Price::new(high, 2),
            low: Price::new(low, 2),
            close: Price::new(close, 2),
            volume: Quantity::new(dec!(500), 0).unwrap(),
            ts_event: (i as i64 + 1) * 60_000_000_000,
            ts_init: (i as i64 + 1) * 60_000_000_000,
        }));
    }
    bars
}

/// Simple SMA crossover: long when the fast mean crosses above the slow
/// mean, flat on the cross back down. Closes any open position on stop.
struct SmaCross {
    fast: usize,
    slow: usize,
    closes: Vec<f64>,
    is_long: bool,
}

impl SmaCross {
    fn new(fast: usize, slow: usize) -> Self {
        Self {
            fast,
            slow,
            closes: Vec::new(),
            is_long: false,
        }
    }

    fn mean_of_last(&self, n: usize) -> Option<f64> {
        if self.closes.len() < n {
            return None;
        }
        let tail = &self.closes[self.closes.len() - n..];
        Some(tail.iter().sum::<f64>() / n as f64)
    }
}

impl Strategy for SmaCross {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::new("SMA-CROSS").unwrap()
    }

    fn on_start(&mut self, ctx: &StrategyContext) {
        ctx.subscribe_bars(bar_type());
    }

    fn on_bar(&mut self, ctx: &StrategyContext, bar: &Bar) {
        self.closes.push(bar.close.value.to_f64().unwrap());
        let (Some(fast), Some(slow)) = (self.mean_of_last(self.fast), self.mean_of_last(self.slow))
        else {
            return;
        };

        if fast > slow && !self.is_long {
            self.is_long = true;
            ctx.buy(&instrument_id(), Quantity::new(dec!(10), 0).unwrap());
        } else if fast < slow && self.is_long {
            self.is_long = false;
            ctx.close_all_positions(&instrument_id());
        }
    }

    fn on_stop(&mut self, ctx: &StrategyContext) {
        ctx.close_all_positions(&instrument_id());
    }
}

fn run_backtest() -> BacktestEngine {
    init_tracing();
    let mut engine = BacktestEngine::new(BacktestConfig::default()).unwrap();
    engine
        .add_venue(
            VenueConfig::new("SIM", vec![Money::new(dec!(1000000), marketsim::usd())])
                .with_oms_type(OmsType::Netting),
        )
        .unwrap();
    engine.add_instrument(instrument()).unwrap();
    engine.add_strategy(SmaCross::new(5, 20));
    engine.add_data(generate_bars(240));
    engine.run(None, None);
    engine
}

#[test]
fn test_full_run_produces_consistent_result() {
    let engine = run_backtest();
    let result = engine.result().unwrap();

    assert_eq!(result.trader_id, "BACKTESTER-001");
    assert!(result.total_orders > 0, "strategy should have traded");
    assert!(result.total_positions > 0);
    assert!(result.total_fills > 0);
    assert!(result.run_time_s >= 0.0);

    // Curve: one initial point, one per bar, one final point.
    assert_eq!(result.balance_curve.len(), 240 + 2);
    let (_, final_equity) = result.balance_curve.last().unwrap();
    assert_eq!(*final_equity, result.ending_balance);

    // Total return ties out against the balances.
    assert_eq!(
        result.total_return,
        result.ending_balance - result.starting_balance
    );
    assert_eq!(result.starting_balance, dec!(1000000));
}

#[test]
fn test_full_run_accounting_ties_out() {
    let engine = run_backtest();
    let result = engine.result().unwrap().clone();
    let cache = engine.cache();

    // Every position was closed by on_stop's close_all_positions or during
    // the run; realized PnL net of commissions must equal the cash change.
    let positions = cache.positions(None, None);
    let open_count = positions.iter().filter(|p| p.is_open()).count();
    assert_eq!(open_count, 0, "all positions closed at run end");

    let realized: Decimal = positions.iter().map(|p| p.realized_pnl).sum();
    // Position realized PnL subtracts only closing commissions; opening
    // commissions hit cash separately.
    let opening_commissions: Decimal = positions
        .iter()
        .flat_map(|p| p.fills.iter())
        .filter(|f| f.order_side == marketsim::OrderSide::Buy)
        .map(|f| f.commission.amount)
        .sum();
    assert_eq!(
        result.ending_balance - result.starting_balance,
        realized - opening_commissions,
    );

    // Order FSM invariants hold across every order.
    for order in cache.orders(None, None) {
        assert_eq!(
            order.filled_qty.value + order.leaves_qty.value,
            order.quantity.value
        );
        assert!(matches!(
            order.status,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Expired
        ));
    }
}

#[test]
fn test_full_run_is_reproducible() {
    let a = run_backtest();
    let b = run_backtest();

    let mut va = serde_json::to_value(a.result().unwrap()).unwrap();
    let mut vb = serde_json::to_value(b.result().unwrap()).unwrap();
    va.as_object_mut().unwrap().remove("run_time_s");
    vb.as_object_mut().unwrap().remove("run_time_s");
    assert_eq!(va, vb);
}
