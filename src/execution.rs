//! Execution Engine
//!
//! Mediates between strategies, the risk gate, venues, and the state cache:
//!   - `submit_order` runs risk checks (deny), caches the order, emits
//!     `Submitted`, and routes to the owning venue
//!   - every order event returned by a venue is applied to the canonical
//!     order FSM in the cache (invalid transitions are logged and dropped,
//!     never leaked to accounts or positions)
//!   - fills drive the position lifecycle: NETTING reconciles the single
//!     open position per `(instrument, strategy)`, HEDGING follows the
//!     order's position id
//!   - order events publish on `events.order.{strategy_id}`, position
//!     events on `events.position.{strategy_id}`

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::cache::Cache;
use crate::clock::Nanos;
use crate::data::MarketEventAny;
use crate::enums::OmsType;
use crate::events::{
    OrderDenied, OrderEventAny, OrderEventCore, OrderFilled, OrderSubmitted, PositionChanged,
    PositionClosed, PositionEventAny, PositionOpened,
};
use crate::identifiers::{ClientOrderId, PositionId, Venue};
use crate::msgbus::{BusMessage, MessageBus};
use crate::money::{Price, Quantity};
use crate::orders::Order;
use crate::position::Position;
use crate::risk::RiskEngine;
use crate::venue::SimulatedExchange;

pub struct ExecutionEngine {
    cache: Rc<RefCell<Cache>>,
    msgbus: Rc<MessageBus>,
    pub risk: RiskEngine,
    venues: IndexMap<Venue, SimulatedExchange>,
    pos_count: u64,
}

impl ExecutionEngine {
    pub fn new(cache: Rc<RefCell<Cache>>, msgbus: Rc<MessageBus>, risk: RiskEngine) -> Self {
        Self {
            cache,
            msgbus,
            risk,
            venues: IndexMap::new(),
            pos_count: 0,
        }
    }

    // === Venue registration ===

    pub fn register_venue(&mut self, exchange: SimulatedExchange) {
        self.venues.insert(exchange.venue.clone(), exchange);
    }

    pub fn venue(&self, venue: &Venue) -> Option<&SimulatedExchange> {
        self.venues.get(venue)
    }

    pub fn venue_mut(&mut self, venue: &Venue) -> Option<&mut SimulatedExchange> {
        self.venues.get_mut(venue)
    }

    pub fn venues(&self) -> impl Iterator<Item = &SimulatedExchange> {
        self.venues.values()
    }

    /// Total cash across all venues, each in its base currency.
    pub fn total_cash_balance(&self) -> Decimal {
        self.venues.values().map(|v| v.total_cash_balance()).sum()
    }

    pub fn total_commissions(&self) -> Decimal {
        self.venues
            .values()
            .map(|v| v.account.total_commissions())
            .sum()
    }

    pub fn reset(&mut self) {
        for venue in self.venues.values_mut() {
            venue.reset();
        }
        self.pos_count = 0;
    }

    // === Order commands ===

    /// Risk-gate, cache, and route a new order.
    pub fn submit_order(&mut self, order: Order, ts: Nanos) {
        let deny_reason = order
            .validate()
            .err()
            .map(|e| e.to_string())
            .or_else(|| {
                self.risk
                    .check_order(&order, &self.cache.borrow())
                    .err()
            });

        if let Some(reason) = deny_reason {
            let event = OrderEventAny::Denied(OrderDenied {
                core: Self::core_for(&order, ts),
                reason,
            });
            self.process_event(event);
            return;
        }

        let venue_key = order.instrument_id.venue.clone();
        let Some(account_id) = self.venues.get(&venue_key).map(|v| v.account.id.clone()) else {
            let event = OrderEventAny::Denied(OrderDenied {
                core: Self::core_for(&order, ts),
                reason: format!("no venue registered for '{venue_key}'"),
            });
            self.process_event(event);
            return;
        };

        self.cache.borrow_mut().add_order(order.clone());

        let submitted = OrderEventAny::Submitted(OrderSubmitted {
            core: Self::core_for(&order, ts),
            account_id,
        });
        self.process_event(submitted);

        // Route the post-submission snapshot to the venue.
        let snapshot = self
            .cache
            .borrow()
            .order(&order.client_order_id)
            .cloned()
            .unwrap_or(order);
        let events = self
            .venues
            .get_mut(&venue_key)
            .map(|venue| venue.process_order(&snapshot, ts))
            .unwrap_or_default();
        for event in events {
            self.process_event(event);
        }
    }

    /// Pass a cancel through to the owning venue.
    pub fn cancel_order(&mut self, client_order_id: &ClientOrderId, ts: Nanos) {
        let Some(order) = self.cache.borrow().order(client_order_id).cloned() else {
            warn!(%client_order_id, "cancel for unknown order ignored");
            return;
        };
        let venue_key = order.instrument_id.venue.clone();
        let events = self
            .venues
            .get_mut(&venue_key)
            .map(|venue| venue.cancel_order(&order, ts))
            .unwrap_or_default();
        for event in events {
            self.process_event(event);
        }
    }

    /// Pass an amendment through to the owning venue.
    pub fn modify_order(
        &mut self,
        client_order_id: &ClientOrderId,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
        ts: Nanos,
    ) {
        let Some(order) = self.cache.borrow().order(client_order_id).cloned() else {
            warn!(%client_order_id, "amendment for unknown order ignored");
            return;
        };
        let venue_key = order.instrument_id.venue.clone();
        let events = self
            .venues
            .get_mut(&venue_key)
            .map(|venue| {
                venue.modify_order(
                    &order.instrument_id,
                    client_order_id,
                    quantity,
                    price,
                    trigger_price,
                    ts,
                )
            })
            .unwrap_or_default();
        for event in events {
            self.process_event(event);
        }
    }

    // === Data routing ===

    /// Route a market event to the venue owning the instrument and process
    /// every order event the matching engine produced.
    pub fn process_data(&mut self, event: &MarketEventAny) {
        let venue_key = event.instrument_id().venue.clone();
        let Some(venue) = self.venues.get_mut(&venue_key) else {
            return;
        };
        let events = match event {
            MarketEventAny::Bar(bar) => venue.process_bar(bar),
            MarketEventAny::Quote(tick) => venue.process_quote_tick(tick),
            MarketEventAny::Trade(tick) => venue.process_trade_tick(tick),
            MarketEventAny::BookDelta(delta) => venue.process_book_delta(delta),
            MarketEventAny::BookDeltas(deltas) => venue.process_book_deltas(deltas),
        };
        for event in events {
            self.process_event(event);
        }
    }

    // === Event processing ===

    /// Apply an order event to the canonical order, reconcile positions on
    /// fills, and publish to the strategy's topic.
    pub fn process_event(&mut self, event: OrderEventAny) {
        let mut apply_failed = false;
        {
            let mut cache = self.cache.borrow_mut();
            if let Some(order) = cache.order_mut(event.client_order_id()) {
                if let Err(err) = order.apply(&event) {
                    warn!(%err, "event dropped by order state machine");
                    apply_failed = true;
                }
            }
        }

        if let OrderEventAny::Filled(fill) = &event {
            if apply_failed {
                // Never leak a rejected fill into positions or accounts.
                return;
            }
            let position_event = self.handle_fill(fill);

            // The venue settled the fill against its account; refresh the
            // cache's snapshot so strategies read current balances.
            if let Some(venue) = self.venues.get(&fill.core.instrument_id.venue) {
                self.cache.borrow_mut().add_account(venue.account.clone());
            }

            let topic = format!("events.position.{}", position_event.strategy_id());
            self.msgbus
                .publish(&topic, &BusMessage::PositionEvent(position_event));
        }

        let topic = format!("events.order.{}", event.strategy_id());
        self.msgbus.publish(&topic, &BusMessage::OrderEvent(event));
    }

    // === Position lifecycle ===

    fn handle_fill(&mut self, fill: &OrderFilled) -> PositionEventAny {
        let instrument_id = &fill.core.instrument_id;
        let oms_type = self
            .venues
            .get(&instrument_id.venue)
            .map(|v| v.oms_type)
            .unwrap_or(OmsType::Netting);
        let multiplier = self
            .cache
            .borrow()
            .instrument(instrument_id)
            .map(|i| i.multiplier)
            .unwrap_or(Decimal::ONE);

        match oms_type {
            OmsType::Netting => {
                let open_id: Option<PositionId> = self
                    .cache
                    .borrow()
                    .positions_open(Some(instrument_id), Some(&fill.core.strategy_id))
                    .first()
                    .map(|p| p.id.clone());
                match open_id {
                    Some(position_id) => self.apply_to_position(&position_id, fill),
                    None => self.open_position(fill, multiplier),
                }
            }
            OmsType::Hedging => {
                let position_id = self
                    .cache
                    .borrow()
                    .order(&fill.core.client_order_id)
                    .and_then(|o| o.position_id.clone())
                    .or_else(|| fill.position_id.clone());
                match position_id {
                    Some(pid) if self.cache.borrow().position(&pid).is_some() => {
                        self.apply_to_position(&pid, fill)
                    }
                    _ => self.open_position(fill, multiplier),
                }
            }
        }
    }

    fn open_position(&mut self, fill: &OrderFilled, multiplier: Decimal) -> PositionEventAny {
        self.pos_count += 1;
        let position_id = PositionId::new(format!(
            "P-{}-{}-{}",
            fill.core.strategy_id, fill.core.instrument_id.symbol, self.pos_count
        ))
        .expect("generated id is non-empty");

        let position = Position::new(position_id.clone(), fill, multiplier);
        let event = PositionEventAny::Opened(PositionOpened {
            trader_id: position.trader_id.clone(),
            strategy_id: position.strategy_id.clone(),
            instrument_id: position.instrument_id.clone(),
            position_id: position_id.clone(),
            account_id: position.account_id.clone(),
            opening_order_id: position.opening_order_id.clone(),
            entry_side: fill.order_side,
            entry_price: fill.last_px,
            quantity: fill.last_qty,
            currency: position.currency.clone(),
            ts_event: fill.core.ts_event,
            ts_init: fill.core.ts_init,
            event_id: Uuid::new_v4(),
        });

        let mut cache = self.cache.borrow_mut();
        cache.add_position(position);
        if let Some(order) = cache.order_mut(&fill.core.client_order_id) {
            order.position_id = Some(position_id);
        }

        event
    }

    fn apply_to_position(&mut self, position_id: &PositionId, fill: &OrderFilled) -> PositionEventAny {
        let mark = self.cache.borrow().mark_price(&fill.core.instrument_id);

        let mut cache = self.cache.borrow_mut();
        let position = cache
            .position_mut(position_id)
            .expect("position resolved before apply");
        position.apply(fill);

        if position.is_closed() {
            PositionEventAny::Closed(PositionClosed {
                trader_id: position.trader_id.clone(),
                strategy_id: position.strategy_id.clone(),
                instrument_id: position.instrument_id.clone(),
                position_id: position_id.clone(),
                account_id: position.account_id.clone(),
                closing_order_id: fill.core.client_order_id.clone(),
                realized_pnl: position.realized_pnl,
                currency: position.currency.clone(),
                ts_event: fill.core.ts_event,
                ts_init: fill.core.ts_init,
                event_id: Uuid::new_v4(),
            })
        } else {
            if let Some(mark) = mark {
                position.update_unrealized(mark);
            }
            PositionEventAny::Changed(PositionChanged {
                trader_id: position.trader_id.clone(),
                strategy_id: position.strategy_id.clone(),
                instrument_id: position.instrument_id.clone(),
                position_id: position_id.clone(),
                account_id: position.account_id.clone(),
                quantity: position.quantity(),
                realized_pnl: position.realized_pnl,
                unrealized_pnl: position.unrealized_pnl,
                ts_event: fill.core.ts_event,
                ts_init: fill.core.ts_init,
                event_id: Uuid::new_v4(),
            })
        }
    }

    fn core_for(order: &Order, ts: Nanos) -> OrderEventCore {
        OrderEventCore::new(
            order.trader_id.clone(),
            order.strategy_id.clone(),
            order.instrument_id.clone(),
            order.client_order_id.clone(),
            ts,
        )
    }
}
