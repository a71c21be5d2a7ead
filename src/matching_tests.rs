//! Matching engine tests: admission, sweeps, bar traversal, triggers,
//! contingencies, and time-in-force semantics.

use std::rc::Rc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::currency::usd;
use crate::data::{Bar, BarType, BookOrder, OrderBookDelta};
use crate::enums::{
    BarAggregation, BookAction, LiquiditySide, OrderSide, TimeInForce, TrailingOffsetType,
};
use crate::events::OrderEventAny;
use crate::identifiers::{AccountId, InstrumentId, StrategyId, TraderId, VenueOrderId};
use crate::instrument::Instrument;
use crate::matching::OrderMatchingEngine;
use crate::models::{FillModel, MakerTakerFeeModel, ZeroFeeModel};
use crate::money::{Price, Quantity};
use crate::orders::{Order, OrderFactory};

fn instrument_id() -> InstrumentId {
    InstrumentId::from_str("AAPL.SIM").unwrap()
}

fn instrument() -> Instrument {
    Instrument::new(
        instrument_id(),
        usd(),
        2,
        0,
        Price::new(dec!(0.01), 2),
        Quantity::new(dec!(1), 0).unwrap(),
        dec!(0),
        dec!(0),
    )
}

fn engine() -> OrderMatchingEngine {
    OrderMatchingEngine::new(
        instrument(),
        AccountId::new("SIM-001").unwrap(),
        FillModel::default(),
        Rc::new(ZeroFeeModel),
        dec!(0.0001),
    )
}

fn factory() -> OrderFactory {
    OrderFactory::new(
        TraderId::new("TRADER-001").unwrap(),
        StrategyId::new("S1").unwrap(),
    )
}

fn qty(v: Decimal) -> Quantity {
    Quantity::new(v, 0).unwrap()
}

fn px(v: Decimal) -> Price {
    Price::new(v, 2)
}

/// Walk an order into the Accepted state the way the venue would.
fn accepted(mut order: Order) -> Order {
    use crate::events::{OrderAccepted, OrderEventCore, OrderSubmitted};
    let core = |o: &Order| {
        OrderEventCore::new(
            o.trader_id.clone(),
            o.strategy_id.clone(),
            o.instrument_id.clone(),
            o.client_order_id.clone(),
            0,
        )
    };
    order
        .apply(&OrderEventAny::Submitted(OrderSubmitted {
            core: core(&order),
            account_id: AccountId::new("SIM-001").unwrap(),
        }))
        .unwrap();
    order
        .apply(&OrderEventAny::Accepted(OrderAccepted {
            core: core(&order),
            venue_order_id: VenueOrderId::new("V-SIM-0").unwrap(),
            account_id: AccountId::new("SIM-001").unwrap(),
        }))
        .unwrap();
    order
}

fn seed_ask(engine: &mut OrderMatchingEngine, price: Decimal, size: Decimal, seq: u64) {
    seed_level(engine, OrderSide::Sell, price, size, seq);
}

fn seed_bid(engine: &mut OrderMatchingEngine, price: Decimal, size: Decimal, seq: u64) {
    seed_level(engine, OrderSide::Buy, price, size, seq);
}

fn seed_level(
    engine: &mut OrderMatchingEngine,
    side: OrderSide,
    price: Decimal,
    size: Decimal,
    seq: u64,
) {
    let delta = OrderBookDelta {
        instrument_id: instrument_id(),
        action: BookAction::Add,
        order: Some(BookOrder {
            side,
            price: px(price),
            size: qty(size),
        }),
        sequence: seq,
        ts_event: 0,
        ts_init: 0,
    };
    engine.process_book_delta(&delta, 0);
}

fn bar(open: Decimal, high: Decimal, low: Decimal, close: Decimal, ts: i64) -> Bar {
    Bar {
        bar_type: BarType::new(instrument_id(), 1, BarAggregation::Minute),
        open: px(open),
        high: px(high),
        low: px(low),
        close: px(close),
        volume: qty(dec!(1000)),
        ts_event: ts,
        ts_init: ts,
    }
}

fn fills(events: &[OrderEventAny]) -> Vec<(Decimal, Decimal)> {
    events
        .iter()
        .filter_map(|e| match e {
            OrderEventAny::Filled(f) => Some((f.last_px.value, f.last_qty.value)),
            _ => None,
        })
        .collect()
}

fn has_cancel(events: &[OrderEventAny]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, OrderEventAny::Canceled(_)))
}

// === Market orders ===

#[test]
fn test_market_sweep_best_first() {
    let mut eng = engine();
    seed_ask(&mut eng, dec!(101), dec!(5), 1);
    seed_ask(&mut eng, dec!(102), dec!(3), 2);

    let order = accepted(factory().market(instrument_id(), OrderSide::Buy, qty(dec!(6)), 0));
    let events = eng.process_order(order, 1);

    assert_eq!(fills(&events), vec![(dec!(101), dec!(5)), (dec!(102), dec!(1))]);
    assert_eq!(eng.book.best_ask_price(), Some(dec!(102)));
}

#[test]
fn test_market_ioc_cancels_remainder() {
    let mut eng = engine();
    seed_ask(&mut eng, dec!(101), dec!(4), 1);

    let order = accepted(
        factory()
            .market(instrument_id(), OrderSide::Buy, qty(dec!(10)), 0)
            .with_time_in_force(TimeInForce::Ioc),
    );
    let events = eng.process_order(order, 1);

    assert_eq!(fills(&events), vec![(dec!(101), dec!(4))]);
    assert!(has_cancel(&events));
    assert_eq!(eng.open_order_count(), 0);
}

#[test]
fn test_market_fok_insufficient_book_cancels_entirely() {
    // S4: asks [101x5, 102x3], FOK market BUY 10 -> no fills, Canceled.
    let mut eng = engine();
    seed_ask(&mut eng, dec!(101), dec!(5), 1);
    seed_ask(&mut eng, dec!(102), dec!(3), 2);

    let order = accepted(
        factory()
            .market(instrument_id(), OrderSide::Buy, qty(dec!(10)), 0)
            .with_time_in_force(TimeInForce::Fok),
    );
    let events = eng.process_order(order, 1);

    assert!(fills(&events).is_empty());
    assert!(has_cancel(&events));
}

#[test]
fn test_market_fok_sufficient_book_fills_fully() {
    let mut eng = engine();
    seed_ask(&mut eng, dec!(101), dec!(5), 1);
    seed_ask(&mut eng, dec!(102), dec!(5), 2);

    let order = accepted(
        factory()
            .market(instrument_id(), OrderSide::Buy, qty(dec!(8)), 0)
            .with_time_in_force(TimeInForce::Fok),
    );
    let events = eng.process_order(order, 1);

    assert_eq!(fills(&events), vec![(dec!(101), dec!(5)), (dec!(102), dec!(3))]);
    assert!(!has_cancel(&events));
}

#[test]
fn test_queued_market_order_fills_at_bar_open() {
    let mut eng = engine();

    // No book yet: the market order queues.
    let order = accepted(factory().market(instrument_id(), OrderSide::Buy, qty(dec!(10)), 0));
    let events = eng.process_order(order, 0);
    assert!(fills(&events).is_empty());
    assert_eq!(eng.open_order_count(), 1);

    // S1 bar: fills at the open price.
    let events = eng.process_bar(&bar(dec!(100), dec!(110), dec!(95), dec!(105), 1));
    assert_eq!(fills(&events), vec![(dec!(100), dec!(10))]);
    assert_eq!(eng.open_order_count(), 0);
}

// === Limit orders ===

#[test]
fn test_limit_taker_fill_never_worse_than_limit() {
    let mut eng = engine();
    seed_ask(&mut eng, dec!(100), dec!(5), 1);

    // Buy limit above the ask: fills at the ask level, not the limit.
    let order = accepted(factory().limit(
        instrument_id(),
        OrderSide::Buy,
        qty(dec!(5)),
        px(dec!(102)),
        0,
    ));
    let events = eng.process_order(order, 1);
    assert_eq!(fills(&events), vec![(dec!(100), dec!(5))]);
}

#[test]
fn test_limit_rests_and_fills_on_book_cross() {
    let mut eng = engine();
    seed_ask(&mut eng, dec!(105), dec!(5), 1);

    let order = accepted(factory().limit(
        instrument_id(),
        OrderSide::Buy,
        qty(dec!(5)),
        px(dec!(100)),
        0,
    ));
    let events = eng.process_order(order, 1);
    assert!(fills(&events).is_empty());
    assert_eq!(eng.open_order_count(), 1);

    // Ask drops through the limit: resting order fills as maker at the
    // better level price.
    let delta = OrderBookDelta {
        instrument_id: instrument_id(),
        action: BookAction::Add,
        order: Some(BookOrder {
            side: OrderSide::Sell,
            price: px(dec!(99)),
            size: qty(dec!(5)),
        }),
        sequence: 2,
        ts_event: 2,
        ts_init: 2,
    };
    let events = eng.process_book_delta(&delta, 2);
    assert_eq!(fills(&events), vec![(dec!(99), dec!(5))]);
    let maker = events.iter().any(|e| {
        matches!(e, OrderEventAny::Filled(f) if f.liquidity_side == LiquiditySide::Maker)
    });
    assert!(maker);
    assert_eq!(eng.open_order_count(), 0);
}

#[test]
fn test_post_only_rejects_crossing_limit_as_cancel() {
    // S5: best ask 100, post-only limit BUY at 101 -> Canceled, no fill.
    let mut eng = engine();
    seed_ask(&mut eng, dec!(100), dec!(5), 1);

    let order = accepted(
        factory()
            .limit(instrument_id(), OrderSide::Buy, qty(dec!(5)), px(dec!(101)), 0)
            .with_post_only(),
    );
    let events = eng.process_order(order, 1);

    assert!(fills(&events).is_empty());
    assert!(has_cancel(&events));
    assert_eq!(eng.open_order_count(), 0);
    assert_eq!(eng.book.best_ask_price(), Some(dec!(100)));
}

#[test]
fn test_post_only_rests_when_not_crossing() {
    let mut eng = engine();
    seed_ask(&mut eng, dec!(100), dec!(5), 1);

    let order = accepted(
        factory()
            .limit(instrument_id(), OrderSide::Buy, qty(dec!(5)), px(dec!(99)), 0)
            .with_post_only(),
    );
    let events = eng.process_order(order, 1);
    assert!(events.is_empty());
    assert_eq!(eng.open_order_count(), 1);
}

#[test]
fn test_resting_sell_limit_fills_at_limit_on_bar_high() {
    let mut eng = engine();
    let order = accepted(factory().limit(
        instrument_id(),
        OrderSide::Sell,
        qty(dec!(10)),
        px(dec!(110)),
        0,
    ));
    eng.process_order(order, 0);

    // High 112 trades through 110: fill at the limit, not the high.
    let events = eng.process_bar(&bar(dec!(101), dec!(112), dec!(99), dec!(108), 1));
    assert_eq!(fills(&events), vec![(dec!(110), dec!(10))]);
}

#[test]
fn test_resting_buy_limit_fills_at_limit_on_bar_low() {
    let mut eng = engine();
    let order = accepted(factory().limit(
        instrument_id(),
        OrderSide::Buy,
        qty(dec!(10)),
        px(dec!(96)),
        0,
    ));
    eng.process_order(order, 0);

    let events = eng.process_bar(&bar(dec!(102), dec!(106), dec!(94), dec!(98), 1));
    assert_eq!(fills(&events), vec![(dec!(96), dec!(10))]);
}

// === Stop and MIT orders ===

#[test]
fn test_stop_sell_fires_on_bar_low_with_conservative_price() {
    // S2: stop SELL trigger 96, bar low 94 -> fill at min(96, 94) = 94.
    let mut eng = engine();
    eng.process_bar(&bar(dec!(100), dec!(110), dec!(95), dec!(105), 1));

    let order = accepted(factory().stop_market(
        instrument_id(),
        OrderSide::Sell,
        qty(dec!(10)),
        px(dec!(96)),
        1,
    ));
    let events = eng.process_order(order, 1);
    assert!(fills(&events).is_empty());
    assert_eq!(eng.open_order_count(), 1);

    let events = eng.process_bar(&bar(dec!(102), dec!(106), dec!(94), dec!(98), 2));
    assert!(events
        .iter()
        .any(|e| matches!(e, OrderEventAny::Triggered(_))));
    assert_eq!(fills(&events), vec![(dec!(94), dec!(10))]);
}

#[test]
fn test_stop_buy_fires_on_gap_up_at_trigger() {
    let mut eng = engine();
    eng.process_bar(&bar(dec!(100), dec!(101), dec!(99), dec!(100), 1));

    let order = accepted(factory().stop_market(
        instrument_id(),
        OrderSide::Buy,
        qty(dec!(5)),
        px(dec!(103)),
        1,
    ));
    eng.process_order(order, 1);

    // Open gaps to 106: buy stop fills at max(trigger, open) = 106.
    let events = eng.process_bar(&bar(dec!(106), dec!(108), dec!(105), dec!(107), 2));
    assert_eq!(fills(&events), vec![(dec!(106), dec!(5))]);
}

#[test]
fn test_stop_already_triggered_at_admission_matches_as_market() {
    let mut eng = engine();
    eng.process_bar(&bar(dec!(100), dec!(110), dec!(95), dec!(105), 1));

    // Last price 105 >= trigger 104: matches immediately against the book.
    let order = accepted(factory().stop_market(
        instrument_id(),
        OrderSide::Buy,
        qty(dec!(5)),
        px(dec!(104)),
        1,
    ));
    let events = eng.process_order(order, 1);
    let filled = fills(&events);
    assert_eq!(filled.len(), 1);
    assert_eq!(filled[0].1, dec!(5));
    // Filled at the synthetic ask around close 105.
    assert!(filled[0].0 > dec!(105));
}

#[test]
fn test_mit_buy_triggers_on_dip() {
    let mut eng = engine();
    eng.process_bar(&bar(dec!(100), dec!(101), dec!(99), dec!(100), 1));

    let order = accepted(factory().market_if_touched(
        instrument_id(),
        OrderSide::Buy,
        qty(dec!(5)),
        px(dec!(97)),
        1,
    ));
    eng.process_order(order, 1);
    assert_eq!(eng.open_order_count(), 1);

    // Low touches 96 <= 97: MIT fires; conservative max(trigger, low)=97.
    let events = eng.process_bar(&bar(dec!(99), dec!(100), dec!(96), dec!(98), 2));
    assert_eq!(fills(&events), vec![(dec!(97), dec!(5))]);
}

#[test]
fn test_stop_limit_converts_to_resting_limit() {
    let mut eng = engine();
    eng.process_bar(&bar(dec!(100), dec!(101), dec!(99), dec!(100), 1));

    let order = accepted(factory().stop_limit(
        instrument_id(),
        OrderSide::Sell,
        qty(dec!(10)),
        px(dec!(98)),
        px(dec!(97.50)),
        1,
    ));
    eng.process_order(order, 1);

    // Low 96 triggers the stop; it becomes a resting limit at 97.50 and
    // fills at its limit during the same traversal? No - conversion happens
    // during the low visit, after resting-limit checks, so it rests.
    let events = eng.process_bar(&bar(dec!(100), dec!(100), dec!(96), dec!(99), 2));
    assert!(events
        .iter()
        .any(|e| matches!(e, OrderEventAny::Triggered(_))));
    assert_eq!(eng.open_order_count(), 1);

    // The next bar's open at 99 >= 97.50 fills it.
    let events = eng.process_bar(&bar(dec!(99), dec!(100), dec!(98), dec!(99), 3));
    assert_eq!(fills(&events), vec![(dec!(99), dec!(10))]);
}

// === Trailing stops ===

#[test]
fn test_trailing_stop_ratchets_and_fires_at_trigger() {
    // S6: trailing SELL offset 5, closes 100,105,110,107,106 then 104.
    let mut eng = engine();

    let order = accepted(factory().trailing_stop_market(
        instrument_id(),
        OrderSide::Sell,
        qty(dec!(10)),
        dec!(5),
        TrailingOffsetType::Price,
        0,
    ));
    eng.process_order(order, 0);

    for (i, close) in [dec!(100), dec!(105), dec!(110), dec!(107), dec!(106)]
        .iter()
        .enumerate()
    {
        let events = eng.process_bar(&bar(*close, *close, *close, *close, i as i64 + 1));
        assert!(fills(&events).is_empty(), "must not fire at close {close}");
    }

    let events = eng.process_bar(&bar(dec!(104), dec!(104), dec!(104), dec!(104), 6));
    assert_eq!(fills(&events), vec![(dec!(105), dec!(10))]);
}

#[test]
fn test_trailing_stop_limit_rests_at_offset_limit() {
    let mut eng = engine();

    let order = accepted(factory().trailing_stop_limit(
        instrument_id(),
        OrderSide::Sell,
        qty(dec!(10)),
        dec!(5),
        TrailingOffsetType::Price,
        dec!(1),
        0,
    ));
    eng.process_order(order, 0);

    eng.process_bar(&bar(dec!(100), dec!(100), dec!(100), dec!(100), 1));
    // Trigger 95; close 94 fires it and rests a limit at 95 - 1 = 94.
    let events = eng.process_bar(&bar(dec!(94), dec!(94), dec!(94), dec!(94), 2));
    assert!(events
        .iter()
        .any(|e| matches!(e, OrderEventAny::Triggered(_))));
    assert!(fills(&events).is_empty());
    assert_eq!(eng.open_order_count(), 1);

    // Next bar trades at 95 >= 94: the resting limit fills.
    let events = eng.process_bar(&bar(dec!(95), dec!(95), dec!(95), dec!(95), 3));
    assert_eq!(fills(&events), vec![(dec!(95), dec!(10))]);
}

// === Contingencies ===

#[test]
fn test_oco_full_fill_cancels_sibling() {
    // S3: OCO {limit SELL 110, stop SELL 95}; high 112 fills the limit and
    // the stop sibling is canceled.
    let mut eng = engine();
    eng.process_bar(&bar(dec!(100), dec!(110), dec!(95), dec!(105), 1));

    let mut f = factory();
    let mut tp = f.limit(instrument_id(), OrderSide::Sell, qty(dec!(10)), px(dec!(110)), 1);
    let mut sl = f.stop_market(instrument_id(), OrderSide::Sell, qty(dec!(10)), px(dec!(95)), 1);
    f.oco_pair(&mut tp, &mut sl);
    let sl_id = sl.client_order_id.clone();

    eng.process_order(accepted(tp), 1);
    eng.process_order(accepted(sl), 1);
    assert_eq!(eng.open_order_count(), 2);

    let events = eng.process_bar(&bar(dec!(101), dec!(112), dec!(99), dec!(108), 2));
    assert_eq!(fills(&events), vec![(dec!(110), dec!(10))]);

    let sibling_canceled = events.iter().any(|e| {
        matches!(e, OrderEventAny::Canceled(c) if c.core.client_order_id == sl_id)
    });
    assert!(sibling_canceled);
    assert_eq!(eng.open_order_count(), 0);
}

#[test]
fn test_oco_partial_fill_keeps_sibling() {
    let mut eng = engine();

    let mut f = factory();
    let mut tp = f.limit(instrument_id(), OrderSide::Sell, qty(dec!(10)), px(dec!(110)), 0);
    let mut sl = f.stop_market(instrument_id(), OrderSide::Sell, qty(dec!(10)), px(dec!(90)), 0);
    f.oco_pair(&mut tp, &mut sl);

    // A thin real book partially fills the taker side of the limit.
    seed_bid(&mut eng, dec!(111), dec!(4), 1);
    let events = eng.process_order(accepted(tp), 1);
    assert_eq!(fills(&events), vec![(dec!(111), dec!(4))]);
    assert!(!has_cancel(&events));

    eng.process_order(accepted(sl), 1);
    // Partial fill must not cancel the sibling: remainder + stop both open.
    assert_eq!(eng.open_order_count(), 2);
}

// === Time in force ===

#[test]
fn test_day_orders_expire_at_bar_close() {
    let mut eng = engine();
    let order = accepted(
        factory()
            .limit(instrument_id(), OrderSide::Buy, qty(dec!(10)), px(dec!(50)), 0)
            .with_time_in_force(TimeInForce::Day),
    );
    eng.process_order(order, 0);
    assert_eq!(eng.open_order_count(), 1);

    let events = eng.process_bar(&bar(dec!(100), dec!(101), dec!(99), dec!(100), 1));
    assert!(events
        .iter()
        .any(|e| matches!(e, OrderEventAny::Expired(_))));
    assert_eq!(eng.open_order_count(), 0);
}

#[test]
fn test_gtd_orders_expire_against_the_clock() {
    let mut eng = engine();
    let order = accepted(
        factory()
            .limit(instrument_id(), OrderSide::Buy, qty(dec!(10)), px(dec!(50)), 0)
            .with_expire_time(1_000),
    );
    eng.process_order(order, 0);

    assert!(eng.expire_gtd_orders(999).is_empty());
    let events = eng.expire_gtd_orders(1_000);
    assert!(events
        .iter()
        .any(|e| matches!(e, OrderEventAny::Expired(_))));
    assert_eq!(eng.open_order_count(), 0);
}

// === Modify / cancel ===

#[test]
fn test_modify_tightened_limit_fills_immediately() {
    let mut eng = engine();
    seed_ask(&mut eng, dec!(100), dec!(5), 1);

    let order = accepted(factory().limit(
        instrument_id(),
        OrderSide::Buy,
        qty(dec!(5)),
        px(dec!(95)),
        0,
    ));
    let id = order.client_order_id.clone();
    eng.process_order(order, 1);
    assert_eq!(eng.open_order_count(), 1);

    let events = eng.modify_order(&id, None, Some(px(dec!(100))), None, 2);
    assert!(events
        .iter()
        .any(|e| matches!(e, OrderEventAny::Updated(_))));
    assert_eq!(fills(&events), vec![(dec!(100), dec!(5))]);
    assert_eq!(eng.open_order_count(), 0);
}

#[test]
fn test_cancel_removes_from_every_queue() {
    let mut eng = engine();
    let mut f = factory();

    let resting = accepted(f.limit(instrument_id(), OrderSide::Buy, qty(dec!(1)), px(dec!(50)), 0));
    let stop = accepted(f.stop_market(instrument_id(), OrderSide::Sell, qty(dec!(1)), px(dec!(40)), 0));
    let trailing = accepted(f.trailing_stop_market(
        instrument_id(),
        OrderSide::Sell,
        qty(dec!(1)),
        dec!(2),
        TrailingOffsetType::Price,
        0,
    ));

    let ids = [
        resting.clone(),
        stop.clone(),
        trailing.clone(),
    ];
    eng.process_order(resting, 0);
    eng.process_order(stop, 0);
    eng.process_order(trailing, 0);
    assert_eq!(eng.open_order_count(), 3);

    for order in &ids {
        let events = eng.cancel_order(order, 1);
        assert!(has_cancel(&events));
    }
    assert_eq!(eng.open_order_count(), 0);
}

// === Fees and order state ===

#[test]
fn test_taker_fee_applied_on_aggressive_fill() {
    let mut inst = instrument();
    inst.taker_fee = dec!(0.001);
    let mut eng = OrderMatchingEngine::new(
        inst,
        AccountId::new("SIM-001").unwrap(),
        FillModel::default(),
        Rc::new(MakerTakerFeeModel),
        dec!(0.0001),
    );
    seed_ask(&mut eng, dec!(100), dec!(10), 1);

    let order = accepted(factory().market(instrument_id(), OrderSide::Buy, qty(dec!(10)), 0));
    let events = eng.process_order(order, 1);

    let commission = events
        .iter()
        .find_map(|e| match e {
            OrderEventAny::Filled(f) => Some(f.commission.amount),
            _ => None,
        })
        .unwrap();
    // 10 * 100 * 0.001 = 1.00
    assert_eq!(commission, dec!(1.00));
}

#[test]
fn test_partial_then_full_fill_progression() {
    let mut eng = engine();
    seed_ask(&mut eng, dec!(100), dec!(4), 1);

    let order = accepted(factory().limit(
        instrument_id(),
        OrderSide::Buy,
        qty(dec!(10)),
        px(dec!(100)),
        0,
    ));
    let events = eng.process_order(order, 1);
    assert_eq!(fills(&events), vec![(dec!(100), dec!(4))]);
    assert_eq!(eng.open_order_count(), 1);

    // More size appears at the limit: the remainder fills as maker.
    let events = eng.process_book_delta(
        &OrderBookDelta {
            instrument_id: instrument_id(),
            action: BookAction::Update,
            order: Some(BookOrder {
                side: OrderSide::Sell,
                price: px(dec!(100)),
                size: qty(dec!(10)),
            }),
            sequence: 2,
            ts_event: 2,
            ts_init: 2,
        },
        2,
    );
    assert_eq!(fills(&events), vec![(dec!(100), dec!(6))]);
    assert_eq!(eng.open_order_count(), 0);
}

#[test]
fn test_book_never_crossed_through_bar_traversal() {
    let mut eng = engine();
    for (i, b) in [
        bar(dec!(100), dec!(110), dec!(95), dec!(105), 1),
        bar(dec!(105), dec!(107), dec!(101), dec!(102), 2),
        bar(dec!(102), dec!(103), dec!(97), dec!(99), 3),
    ]
    .iter()
    .enumerate()
    {
        eng.process_bar(b);
        assert!(!eng.book.is_crossed(), "book crossed after bar {i}");
    }
}

#[test]
fn test_limit_fill_probability_zero_never_fills_at_limit() {
    let mut eng = OrderMatchingEngine::new(
        instrument(),
        AccountId::new("SIM-001").unwrap(),
        FillModel::new(0.0, 0.0, 0, 1),
        Rc::new(ZeroFeeModel),
        dec!(0.0001),
    );

    let order = accepted(factory().limit(
        instrument_id(),
        OrderSide::Sell,
        qty(dec!(10)),
        px(dec!(110)),
        0,
    ));
    eng.process_order(order, 0);

    // High exactly touches the limit: with prob 0 the order must not fill.
    let events = eng.process_bar(&bar(dec!(101), dec!(110), dec!(99), dec!(108), 1));
    assert!(fills(&events).is_empty());
    assert_eq!(eng.open_order_count(), 1);

    // Trading through the limit always fills regardless of probability.
    let events = eng.process_bar(&bar(dec!(101), dec!(112), dec!(99), dec!(108), 2));
    assert_eq!(fills(&events), vec![(dec!(110), dec!(10))]);
}
