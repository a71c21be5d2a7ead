//! Order Matching Engine
//!
//! Per-instrument matching against an L2 book with resting, stop, and
//! trailing queues. Responsibilities:
//!   - Match incoming market/limit orders against the book (taker fills)
//!   - Park stop/MIT orders until their trigger predicate holds
//!   - Walk OHLCV bars deterministically: open, high, low, close
//!   - Ratchet trailing stops on every quote/trade/bar close
//!   - Enforce IOC/FOK semantics synchronously at admission
//!   - Cancel OCO siblings when an order fully fills
//!   - Expire Day orders at bar close and Gtd orders against the clock
//!
//! The engine works on its own copies of open orders; every state change is
//! emitted as an event which the execution engine applies to the canonical
//! order in the cache. Queues iterate in insertion order, so ties at the
//! same price resolve deterministically.

use std::rc::Rc;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::book::OrderBook;
use crate::clock::Nanos;
use crate::enums::{LiquiditySide, OrderSide, OrderType, TimeInForce};
use crate::events::{
    OrderCanceled, OrderEventAny, OrderEventCore, OrderExpired, OrderFilled, OrderPendingUpdate,
    OrderTriggered, OrderUpdated,
};
use crate::data::{Bar, OrderBookDelta, OrderBookDeltas, QuoteTick, TradeTick};
use crate::identifiers::{AccountId, ClientOrderId, OrderListId, TradeId, VenueOrderId};
use crate::instrument::Instrument;
use crate::models::{FeeModel, FillModel};
use crate::money::{Price, Quantity};
use crate::orders::Order;

/// Which bar price is being visited during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BarStep {
    Open,
    High,
    Low,
}

/// Per-instrument matching engine.
pub struct OrderMatchingEngine {
    instrument: Instrument,
    account_id: AccountId,
    fill_model: FillModel,
    fee_model: Rc<dyn FeeModel>,
    book_spread_pct: Decimal,

    pub book: OrderBook,

    /// Resting limit orders (and queued market orders awaiting a bar open).
    resting: IndexMap<ClientOrderId, Order>,
    /// Stop/MIT orders awaiting their trigger.
    stops: IndexMap<ClientOrderId, Order>,
    /// Trailing stops, updated on every market price.
    trailing: IndexMap<ClientOrderId, Order>,
    /// Contingency groups: order list -> member client order ids.
    contingency_groups: IndexMap<OrderListId, Vec<ClientOrderId>>,

    last_price: Option<Price>,
    last_bid: Option<Price>,
    last_ask: Option<Price>,

    trade_count: u64,
    venue_order_count: u64,
}

impl OrderMatchingEngine {
    pub fn new(
        instrument: Instrument,
        account_id: AccountId,
        fill_model: FillModel,
        fee_model: Rc<dyn FeeModel>,
        book_spread_pct: Decimal,
    ) -> Self {
        let book = OrderBook::new(instrument.id.clone());
        Self {
            instrument,
            account_id,
            fill_model,
            fee_model,
            book_spread_pct,
            book,
            resting: IndexMap::new(),
            stops: IndexMap::new(),
            trailing: IndexMap::new(),
            contingency_groups: IndexMap::new(),
            last_price: None,
            last_bid: None,
            last_ask: None,
            trade_count: 0,
            venue_order_count: 0,
        }
    }

    pub fn last_price(&self) -> Option<Price> {
        self.last_price
    }

    pub fn last_bid(&self) -> Option<Price> {
        self.last_bid
    }

    pub fn last_ask(&self) -> Option<Price> {
        self.last_ask
    }

    pub fn open_order_count(&self) -> usize {
        self.resting.len() + self.stops.len() + self.trailing.len()
    }

    pub fn reset(&mut self) {
        self.resting.clear();
        self.stops.clear();
        self.trailing.clear();
        self.contingency_groups.clear();
        self.book.clear();
        self.last_price = None;
        self.last_bid = None;
        self.last_ask = None;
        self.trade_count = 0;
        self.venue_order_count = 0;
    }

    // === Order admission ===

    /// Process an order just accepted by the venue, routing it by type.
    pub fn process_order(&mut self, mut order: Order, ts: Nanos) -> Vec<OrderEventAny> {
        let mut out = Vec::new();
        self.register_contingency(&order);

        match order.order_type {
            OrderType::Market => {
                self.match_market(&mut order, ts, &mut out);
                // Remainder of a GTC-like market order waits for the next
                // bar open; IOC/FOK resolved inside the sweep.
                if order.is_open()
                    && !order.leaves_qty.is_zero()
                    && !matches!(order.time_in_force, TimeInForce::Ioc | TimeInForce::Fok)
                {
                    self.resting.insert(order.client_order_id.clone(), order);
                }
            }
            OrderType::Limit => {
                self.match_limit_or_rest(order, ts, &mut out);
            }
            OrderType::StopMarket | OrderType::MarketIfTouched => {
                if self.is_triggered_now(&order) {
                    self.match_market(&mut order, ts, &mut out);
                } else {
                    self.stops.insert(order.client_order_id.clone(), order);
                }
            }
            OrderType::StopLimit => {
                if self.is_triggered_now(&order) {
                    self.convert_stop_to_limit(order, ts, &mut out);
                } else {
                    self.stops.insert(order.client_order_id.clone(), order);
                }
            }
            OrderType::LimitIfTouched => {
                if self.is_triggered_now(&order) {
                    self.resting.insert(order.client_order_id.clone(), order);
                } else {
                    self.stops.insert(order.client_order_id.clone(), order);
                }
            }
            OrderType::TrailingStopMarket | OrderType::TrailingStopLimit => {
                self.trailing.insert(order.client_order_id.clone(), order);
            }
        }

        out
    }

    /// Remove an order from every queue and emit `Canceled`.
    pub fn cancel_order(&mut self, order: &Order, ts: Nanos) -> Vec<OrderEventAny> {
        let mut out = Vec::new();
        let id = &order.client_order_id;
        let local = self
            .resting
            .shift_remove(id)
            .or_else(|| self.stops.shift_remove(id))
            .or_else(|| self.trailing.shift_remove(id));

        let mut working = local.unwrap_or_else(|| order.clone());
        self.fire_cancel(&mut working, ts, &mut out);
        out
    }

    /// Apply an amendment and immediately re-evaluate the order (a
    /// tightened limit may fill at once).
    pub fn modify_order(
        &mut self,
        client_order_id: &ClientOrderId,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
        ts: Nanos,
    ) -> Vec<OrderEventAny> {
        let mut out = Vec::new();

        let was_resting = self.resting.contains_key(client_order_id);
        let mut order = match self
            .resting
            .shift_remove(client_order_id)
            .or_else(|| self.stops.shift_remove(client_order_id))
            .or_else(|| self.trailing.shift_remove(client_order_id))
        {
            Some(order) => order,
            None => return out,
        };

        // Amendments move through PendingUpdate before returning to
        // Accepted with the new values applied.
        let pending = OrderEventAny::PendingUpdate(OrderPendingUpdate {
            core: self.core_for(&order, ts),
            venue_order_id: order.venue_order_id.clone(),
            account_id: self.account_id.clone(),
        });
        if let Err(err) = order.apply(&pending) {
            tracing::warn!(%err, "amendment dropped by order state machine");
            self.requeue(order);
            return out;
        }
        out.push(pending);

        let event = OrderEventAny::Updated(OrderUpdated {
            core: self.core_for(&order, ts),
            venue_order_id: order.venue_order_id.clone(),
            account_id: self.account_id.clone(),
            quantity,
            price,
            trigger_price,
        });
        if let Err(err) = order.apply(&event) {
            tracing::warn!(%err, "amendment dropped by order state machine");
            self.requeue(order);
            return out;
        }
        out.push(event);

        // Re-admit through the normal queues; a tightened resting limit is
        // re-checked against the book at once.
        if was_resting && order.price.is_some() {
            self.fill_limit(&mut order, ts, LiquiditySide::Maker, &mut out);
            if order.is_open() {
                self.resting.insert(order.client_order_id.clone(), order);
            }
        } else {
            self.requeue(order);
        }

        out
    }

    fn requeue(&mut self, order: Order) {
        let id = order.client_order_id.clone();
        match order.order_type {
            OrderType::TrailingStopMarket | OrderType::TrailingStopLimit => {
                self.trailing.insert(id, order);
            }
            t if t.is_stop_like() && !order.is_triggered => {
                self.stops.insert(id, order);
            }
            _ => {
                self.resting.insert(id, order);
            }
        }
    }

    // === Data processing ===

    pub fn process_book_delta(&mut self, delta: &OrderBookDelta, ts: Nanos) -> Vec<OrderEventAny> {
        self.book.apply_delta(delta);
        let mut out = Vec::new();
        self.check_resting_orders(ts, &mut out);
        out
    }

    pub fn process_book_deltas(
        &mut self,
        deltas: &OrderBookDeltas,
        ts: Nanos,
    ) -> Vec<OrderEventAny> {
        self.book.apply_deltas(deltas);
        let mut out = Vec::new();
        self.check_resting_orders(ts, &mut out);
        out
    }

    pub fn process_quote_tick(&mut self, tick: &QuoteTick) -> Vec<OrderEventAny> {
        self.last_bid = Some(tick.bid_price);
        self.last_ask = Some(tick.ask_price);
        let mid = tick.mid_price();
        self.last_price = Some(mid);
        self.book.update_from_quote(tick);

        let mut out = Vec::new();
        self.update_trailing_stops(mid, tick.ts_event, &mut out);
        self.check_resting_orders(tick.ts_event, &mut out);
        out
    }

    pub fn process_trade_tick(&mut self, tick: &TradeTick) -> Vec<OrderEventAny> {
        self.last_price = Some(tick.price);

        let mut out = Vec::new();
        self.update_trailing_stops(tick.price, tick.ts_event, &mut out);
        self.check_resting_orders(tick.ts_event, &mut out);
        out
    }

    /// Walk a bar through the fixed four price visits:
    ///   1. Open  - fill queued market orders, check stop/MIT triggers
    ///   2. High  - fill resting sell limits, buy-stop / sell-MIT triggers
    ///   3. Low   - fill resting buy limits, sell-stop / buy-MIT triggers
    ///   4. Close - update trailing stops, expire Day orders
    pub fn process_bar(&mut self, bar: &Bar) -> Vec<OrderEventAny> {
        let ts = bar.ts_event;
        let mut out = Vec::new();

        self.book.update_from_bar(bar, self.book_spread_pct);

        self.process_at_price(bar.open, ts, BarStep::Open, &mut out);
        self.process_at_price(bar.high, ts, BarStep::High, &mut out);
        self.process_at_price(bar.low, ts, BarStep::Low, &mut out);

        self.last_price = Some(bar.close);
        self.update_trailing_stops(bar.close, ts, &mut out);
        self.expire_day_orders(ts, &mut out);

        out
    }

    /// Expire Gtd orders whose expiry has passed; called on every tick.
    pub fn expire_gtd_orders(&mut self, now: Nanos) -> Vec<OrderEventAny> {
        let mut expired: Vec<ClientOrderId> = Vec::new();
        for queue in [&self.resting, &self.stops, &self.trailing] {
            for (id, order) in queue.iter() {
                if order.time_in_force == TimeInForce::Gtd
                    && order.expire_time_ns.is_some_and(|t| now >= t)
                {
                    expired.push(id.clone());
                }
            }
        }

        let mut events = Vec::new();
        for id in expired {
            if let Some(mut order) = self
                .resting
                .shift_remove(&id)
                .or_else(|| self.stops.shift_remove(&id))
                .or_else(|| self.trailing.shift_remove(&id))
            {
                self.fire_expired(&mut order, now, &mut events);
            }
        }
        events
    }

    // === Matching internals ===

    /// Sweep the opposite side of the book for a market-style order.
    fn match_market(&mut self, order: &mut Order, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        let fills = self
            .book
            .simulate_market_fill(order.side, order.leaves_qty.value);

        if order.time_in_force == TimeInForce::Fok {
            let available: Decimal = fills.iter().map(|(_, q)| *q).sum();
            if available < order.leaves_qty.value {
                self.fire_cancel(order, ts, out);
                return;
            }
        }

        for (level_px, avail) in fills {
            if order.leaves_qty.is_zero() {
                break;
            }
            let fill_qty = avail.min(order.leaves_qty.value);
            let px = Price::new(level_px, self.instrument.price_precision);
            let px = self.fill_model.apply_slippage(px, order.side, &self.instrument);
            self.fire_fill(order, px, fill_qty, LiquiditySide::Taker, ts, out);
        }

        if order.time_in_force == TimeInForce::Ioc && !order.leaves_qty.is_zero() {
            self.fire_cancel(order, ts, out);
        }
    }

    /// Try to fill a limit order as taker, then rest any remainder.
    fn match_limit_or_rest(&mut self, mut order: Order, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        // Maker-only protection: cancel instead of crossing the spread.
        if order.post_only && self.would_fill_immediately(&order) {
            self.fire_cancel(&mut order, ts, out);
            return;
        }

        self.fill_limit(&mut order, ts, LiquiditySide::Taker, out);

        if !order.leaves_qty.is_zero() && order.is_open() {
            match order.time_in_force {
                TimeInForce::Ioc | TimeInForce::Fok => self.fire_cancel(&mut order, ts, out),
                _ => {
                    self.resting.insert(order.client_order_id.clone(), order);
                }
            }
        }
    }

    /// Fill a limit order against the book. The trader never receives a
    /// price worse than the limit: BUY fills at `min(level, limit)`, SELL
    /// at `max(level, limit)`.
    fn fill_limit(
        &mut self,
        order: &mut Order,
        ts: Nanos,
        liquidity_side: LiquiditySide,
        out: &mut Vec<OrderEventAny>,
    ) {
        let limit = match order.price {
            Some(limit) => limit.value,
            None => return,
        };

        let levels: Vec<(Decimal, Decimal)> = match order.side {
            OrderSide::Buy => self.book.asks(),
            OrderSide::Sell => self.book.bids(),
        };

        for (level_px, avail) in levels {
            if order.leaves_qty.is_zero() || order.is_closed() {
                break;
            }
            let crossing = match order.side {
                OrderSide::Buy => level_px <= limit,
                OrderSide::Sell => level_px >= limit,
            };
            if !crossing {
                break;
            }
            // The fill model may hold back fills exactly at the limit.
            if level_px == limit && !self.fill_model.is_limit_filled(true) {
                break;
            }

            let fill_qty = avail.min(order.leaves_qty.value);
            let fill_px = match order.side {
                OrderSide::Buy => level_px.min(limit),
                OrderSide::Sell => level_px.max(limit),
            };
            let fill_px = Price::new(fill_px, self.instrument.price_precision);
            self.fire_fill(order, fill_px, fill_qty, liquidity_side, ts, out);
        }
    }

    /// A triggered stop-limit emits `Triggered` and rests at its limit.
    fn convert_stop_to_limit(&mut self, mut order: Order, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        self.fire_triggered(&mut order, ts, out);
        if order.is_open() {
            self.resting.insert(order.client_order_id.clone(), order);
        }
    }

    /// Re-check resting limit orders after a book change (maker fills).
    ///
    /// Orders are cloned out, processed, and written back into the same
    /// queue slot so insertion order survives untouched entries.
    fn check_resting_orders(&mut self, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        let ids: Vec<ClientOrderId> = self.resting.keys().cloned().collect();
        for id in ids {
            let mut order = match self.resting.get(&id) {
                Some(order) if order.price.is_some() && order.is_open() => order.clone(),
                Some(order) if order.is_closed() => {
                    self.resting.shift_remove(&id);
                    continue;
                }
                _ => continue,
            };
            self.fill_limit(&mut order, ts, LiquiditySide::Maker, out);
            if order.is_open() {
                self.resting.insert(id, order);
            } else {
                self.resting.shift_remove(&id);
            }
        }
    }

    /// Triggers and fills at a single visited bar price.
    fn process_at_price(
        &mut self,
        price: Price,
        ts: Nanos,
        step: BarStep,
        out: &mut Vec<OrderEventAny>,
    ) {
        self.last_price = Some(price);

        // 1. Queued market orders fill at the bar open.
        if step == BarStep::Open {
            let market_ids: Vec<ClientOrderId> = self
                .resting
                .iter()
                .filter(|(_, o)| o.order_type == OrderType::Market && o.is_open())
                .map(|(id, _)| id.clone())
                .collect();
            for id in market_ids {
                if let Some(mut order) = self.resting.shift_remove(&id) {
                    let px = self
                        .fill_model
                        .apply_slippage(price, order.side, &self.instrument);
                    let leaves = order.leaves_qty.value;
                    self.fire_fill(&mut order, px, leaves, LiquiditySide::Taker, ts, out);
                }
            }
        }

        // 2. Stop/MIT triggers at the visited price.
        let triggered: Vec<ClientOrderId> = self
            .stops
            .iter()
            .filter(|(_, o)| {
                o.is_open()
                    && (Self::is_stop_triggered(o, price) || Self::is_mit_triggered(o, price))
            })
            .map(|(id, _)| id.clone())
            .collect();
        // Drop any dead entries left behind.
        self.stops.retain(|_, o| o.is_open());

        for id in triggered {
            let mut order = match self.stops.shift_remove(&id) {
                Some(order) => order,
                None => continue,
            };
            match order.order_type {
                OrderType::StopMarket | OrderType::MarketIfTouched => {
                    self.fire_triggered(&mut order, ts, out);
                    if order.is_closed() {
                        continue;
                    }
                    // Conservative fill: the worse of trigger and the
                    // visited price for the trader.
                    let trigger = order.trigger_price.expect("stop carries trigger").value;
                    let fill_px = match order.side {
                        OrderSide::Buy => trigger.max(price.value),
                        OrderSide::Sell => trigger.min(price.value),
                    };
                    let fill_px = Price::new(fill_px, self.instrument.price_precision);
                    let leaves = order.leaves_qty.value;
                    self.fire_fill(&mut order, fill_px, leaves, LiquiditySide::Taker, ts, out);
                }
                OrderType::StopLimit | OrderType::LimitIfTouched => {
                    self.convert_stop_to_limit(order, ts, out);
                }
                _ => {}
            }
        }

        // 3. Resting limit fills at the visited price.
        let ids: Vec<ClientOrderId> = self.resting.keys().cloned().collect();
        for id in ids {
            let mut order = match self.resting.get(&id) {
                Some(order) if order.is_open() => order.clone(),
                Some(_) => {
                    self.resting.shift_remove(&id);
                    continue;
                }
                None => continue,
            };
            let limit = match order.price {
                Some(limit) => limit,
                None => continue,
            };

            let (should_fill, fill_px) = match step {
                // At the open the book genuinely trades at the open price,
                // so crossing limits fill at the better of the two.
                BarStep::Open => match order.side {
                    OrderSide::Buy if price <= limit => {
                        (true, limit.value.min(price.value))
                    }
                    OrderSide::Sell if price >= limit => {
                        (true, limit.value.max(price.value))
                    }
                    _ => (false, Decimal::ZERO),
                },
                // High/low visits only prove the limit level traded; the
                // fill happens at the limit itself.
                BarStep::High if order.side == OrderSide::Sell && price >= limit => {
                    (true, limit.value)
                }
                BarStep::Low if order.side == OrderSide::Buy && price <= limit => {
                    (true, limit.value)
                }
                _ => (false, Decimal::ZERO),
            };

            if should_fill {
                let exactly_at_limit = fill_px == limit.value && price == limit;
                if !self.fill_model.is_limit_filled(exactly_at_limit) {
                    continue;
                }
                let fill_px = Price::new(fill_px, self.instrument.price_precision);
                let leaves = order.leaves_qty.value;
                self.fire_fill(&mut order, fill_px, leaves, LiquiditySide::Maker, ts, out);
            }
            if order.is_open() {
                self.resting.insert(id, order);
            } else {
                self.resting.shift_remove(&id);
            }
        }
    }

    /// Ratchet trailing stops and fire any whose trigger is reached.
    fn update_trailing_stops(&mut self, market: Price, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        let ids: Vec<ClientOrderId> = self.trailing.keys().cloned().collect();
        for id in ids {
            let mut order = match self.trailing.get(&id) {
                Some(order) if order.is_open() => order.clone(),
                Some(_) => {
                    self.trailing.shift_remove(&id);
                    continue;
                }
                None => continue,
            };

            let fired = order.update_trailing(market, self.instrument.price_increment.value);
            if !fired {
                self.trailing.insert(id, order);
                continue;
            }

            self.trailing.shift_remove(&id);
            self.fire_triggered(&mut order, ts, out);
            if order.is_closed() {
                continue;
            }
            if order.order_type == OrderType::TrailingStopLimit {
                order.price = order.trailing_limit_price();
                self.resting.insert(order.client_order_id.clone(), order);
            } else {
                let fill_px = order.trigger_price.unwrap_or(market);
                let leaves = order.leaves_qty.value;
                self.fire_fill(&mut order, fill_px, leaves, LiquiditySide::Taker, ts, out);
            }
        }
    }

    /// Day orders expire deterministically at bar close.
    fn expire_day_orders(&mut self, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        let ids: Vec<ClientOrderId> = self
            .resting
            .iter()
            .filter(|(_, o)| o.time_in_force == TimeInForce::Day)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            if let Some(mut order) = self.resting.shift_remove(&id) {
                self.fire_expired(&mut order, ts, out);
            }
        }
    }

    // === Contingency management ===

    fn register_contingency(&mut self, order: &Order) {
        if order.contingency_type == crate::enums::ContingencyType::None {
            return;
        }
        if let Some(list_id) = &order.order_list_id {
            let group = self.contingency_groups.entry(list_id.clone()).or_default();
            if !group.contains(&order.client_order_id) {
                group.push(order.client_order_id.clone());
            }
        }
    }

    /// On a full fill of an OCO order, cancel every open sibling.
    fn handle_contingency_fill(&mut self, order: &Order, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        if order.contingency_type != crate::enums::ContingencyType::Oco {
            return;
        }
        let Some(list_id) = &order.order_list_id else {
            return;
        };
        let siblings = self
            .contingency_groups
            .get(list_id)
            .cloned()
            .unwrap_or_default();
        for sibling_id in siblings {
            if sibling_id == order.client_order_id {
                continue;
            }
            let sibling = self
                .resting
                .shift_remove(&sibling_id)
                .or_else(|| self.stops.shift_remove(&sibling_id))
                .or_else(|| self.trailing.shift_remove(&sibling_id));
            if let Some(mut sibling) = sibling {
                if sibling.is_open() {
                    self.fire_cancel(&mut sibling, ts, out);
                }
            }
        }
    }

    // === Event firing ===

    fn core_for(&self, order: &Order, ts: Nanos) -> OrderEventCore {
        OrderEventCore::new(
            order.trader_id.clone(),
            order.strategy_id.clone(),
            order.instrument_id.clone(),
            order.client_order_id.clone(),
            ts,
        )
    }

    fn fire_fill(
        &mut self,
        order: &mut Order,
        fill_px: Price,
        fill_qty: Decimal,
        liquidity_side: LiquiditySide,
        ts: Nanos,
        out: &mut Vec<OrderEventAny>,
    ) {
        if order.is_closed() {
            return;
        }
        let fill_qty = fill_qty.min(order.leaves_qty.value);
        let last_qty = match Quantity::new(fill_qty, order.quantity.precision) {
            Ok(q) if !q.is_zero() => q,
            _ => return,
        };

        self.trade_count += 1;
        let venue_order_id = order.venue_order_id.clone().unwrap_or_else(|| {
            self.venue_order_count += 1;
            VenueOrderId::new(format!(
                "V-{}-{}",
                self.instrument.venue(),
                self.venue_order_count
            ))
            .expect("generated id is non-empty")
        });
        let trade_id = TradeId::new(format!(
            "T-{}-{}",
            self.instrument.venue(),
            self.trade_count
        ))
        .expect("generated id is non-empty");

        let commission = self.fee_model.commission(
            order,
            last_qty,
            fill_px,
            &self.instrument,
            liquidity_side,
        );

        let event = OrderEventAny::Filled(OrderFilled {
            core: self.core_for(order, ts),
            venue_order_id,
            account_id: self.account_id.clone(),
            trade_id,
            order_side: order.side,
            order_type: order.order_type,
            last_qty,
            last_px: fill_px,
            currency: self.instrument.quote_currency.clone(),
            commission,
            liquidity_side,
            position_id: None,
        });

        if let Err(err) = order.apply(&event) {
            tracing::warn!(%err, "fill dropped by order state machine");
            return;
        }
        out.push(event);

        if order.is_filled() {
            self.handle_contingency_fill(order, ts, out);
        }
    }

    fn fire_cancel(&mut self, order: &mut Order, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        let event = OrderEventAny::Canceled(OrderCanceled {
            core: self.core_for(order, ts),
            venue_order_id: order.venue_order_id.clone(),
            account_id: self.account_id.clone(),
        });
        if let Err(err) = order.apply(&event) {
            tracing::warn!(%err, "cancel dropped by order state machine");
            return;
        }
        out.push(event);
    }

    fn fire_expired(&mut self, order: &mut Order, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        let event = OrderEventAny::Expired(OrderExpired {
            core: self.core_for(order, ts),
            venue_order_id: order.venue_order_id.clone(),
            account_id: self.account_id.clone(),
        });
        if let Err(err) = order.apply(&event) {
            tracing::warn!(%err, "expiry dropped by order state machine");
            return;
        }
        out.push(event);
    }

    fn fire_triggered(&mut self, order: &mut Order, ts: Nanos, out: &mut Vec<OrderEventAny>) {
        let event = OrderEventAny::Triggered(OrderTriggered {
            core: self.core_for(order, ts),
            venue_order_id: order.venue_order_id.clone(),
            account_id: self.account_id.clone(),
        });
        if let Err(err) = order.apply(&event) {
            tracing::warn!(%err, "trigger dropped by order state machine");
            return;
        }
        out.push(event);
    }

    // === Trigger predicates ===

    fn is_triggered_now(&self, order: &Order) -> bool {
        match self.last_price {
            Some(last) => match order.order_type {
                OrderType::StopMarket | OrderType::StopLimit => {
                    Self::is_stop_triggered(order, last)
                }
                OrderType::MarketIfTouched | OrderType::LimitIfTouched => {
                    Self::is_mit_triggered(order, last)
                }
                _ => false,
            },
            None => false,
        }
    }

    /// Stop BUY triggers at `market >= trigger`; stop SELL at
    /// `market <= trigger`.
    fn is_stop_triggered(order: &Order, market: Price) -> bool {
        if !matches!(order.order_type, OrderType::StopMarket | OrderType::StopLimit) {
            return false;
        }
        let Some(trigger) = order.trigger_price else {
            return false;
        };
        match order.side {
            OrderSide::Buy => market >= trigger,
            OrderSide::Sell => market <= trigger,
        }
    }

    /// MIT triggers on touch in the opposite direction from a stop:
    /// BUY at `market <= trigger` (buy the dip), SELL at `market >= trigger`.
    fn is_mit_triggered(order: &Order, market: Price) -> bool {
        if !matches!(
            order.order_type,
            OrderType::MarketIfTouched | OrderType::LimitIfTouched
        ) {
            return false;
        }
        let Some(trigger) = order.trigger_price else {
            return false;
        };
        match order.side {
            OrderSide::Buy => market <= trigger,
            OrderSide::Sell => market >= trigger,
        }
    }

    /// Would this limit order cross the current best opposite price?
    fn would_fill_immediately(&self, order: &Order) -> bool {
        let Some(limit) = order.price else {
            return false;
        };
        match order.side {
            OrderSide::Buy => self
                .book
                .best_ask_price()
                .is_some_and(|ask| limit.value >= ask),
            OrderSide::Sell => self
                .book
                .best_bid_price()
                .is_some_and(|bid| limit.value <= bid),
        }
    }
}
