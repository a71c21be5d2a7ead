//! Simulated Exchange
//!
//! The venue simulation for backtesting: one matching engine per
//! instrument, an owned account, pre-trade balance checks (venue-side
//! rejects), and account settlement on fills. Data events are routed to the
//! owning instrument's matching engine; order events produced there are
//! returned to the execution engine for FSM application and publication.

use std::rc::Rc;

use indexmap::IndexMap;
use rust_decimal::Decimal;

use crate::account::Account;
use crate::clock::Nanos;
use crate::data::{Bar, OrderBookDelta, OrderBookDeltas, QuoteTick, TradeTick};
use crate::enums::{AccountType, OmsType, OrderSide};
use crate::events::{OrderAccepted, OrderEventAny, OrderRejected};
use crate::identifiers::{AccountId, ClientOrderId, InstrumentId, Venue, VenueOrderId};
use crate::instrument::Instrument;
use crate::matching::OrderMatchingEngine;
use crate::models::{FeeModel, FillModel};
use crate::money::{Price, Quantity};
use crate::orders::Order;

/// Simulated exchange venue.
pub struct SimulatedExchange {
    pub venue: Venue,
    pub oms_type: OmsType,
    pub account: Account,
    fill_model: FillModel,
    fee_model: Rc<dyn FeeModel>,
    book_spread_pct: Decimal,

    instruments: IndexMap<InstrumentId, Instrument>,
    engines: IndexMap<InstrumentId, OrderMatchingEngine>,
    venue_order_count: u64,
}

impl SimulatedExchange {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        venue: Venue,
        oms_type: OmsType,
        account_type: AccountType,
        base_currency: crate::currency::Currency,
        starting_balances: Vec<crate::money::Money>,
        default_leverage: Decimal,
        book_spread_pct: Decimal,
        fill_model: FillModel,
        fee_model: Rc<dyn FeeModel>,
    ) -> Self {
        let account_id = AccountId::new(format!("{venue}-001")).expect("venue id is non-empty");
        let mut account = match account_type {
            AccountType::Cash => Account::cash(account_id, base_currency),
            AccountType::Margin => Account::margin(account_id, base_currency, default_leverage),
        };
        for money in starting_balances {
            account.credit(money.amount, &money.currency);
        }

        Self {
            venue,
            oms_type,
            account,
            fill_model,
            fee_model,
            book_spread_pct,
            instruments: IndexMap::new(),
            engines: IndexMap::new(),
            venue_order_count: 0,
        }
    }

    // === Instrument management ===

    pub fn add_instrument(&mut self, instrument: Instrument) {
        let engine = OrderMatchingEngine::new(
            instrument.clone(),
            self.account.id.clone(),
            self.fill_model.clone(),
            Rc::clone(&self.fee_model),
            self.book_spread_pct,
        );
        self.engines.insert(instrument.id.clone(), engine);
        self.instruments.insert(instrument.id.clone(), instrument);
    }

    pub fn instrument(&self, instrument_id: &InstrumentId) -> Option<&Instrument> {
        self.instruments.get(instrument_id)
    }

    // === Order routing ===

    /// Admit an order: instrument limits and balance pre-check (reject on
    /// failure), accept with a venue order id, then route to the matching
    /// engine.
    pub fn process_order(&mut self, order: &Order, ts: Nanos) -> Vec<OrderEventAny> {
        if let Err(reason) = self.validate_order(order).and_then(|_| self.check_balance(order)) {
            return vec![OrderEventAny::Rejected(OrderRejected {
                core: self.core_for(order, ts),
                account_id: self.account.id.clone(),
                reason,
            })];
        }

        self.venue_order_count += 1;
        let venue_order_id =
            VenueOrderId::new(format!("V-{}-{}", self.venue, self.venue_order_count))
                .expect("generated id is non-empty");

        let accepted = OrderEventAny::Accepted(OrderAccepted {
            core: self.core_for(order, ts),
            venue_order_id,
            account_id: self.account.id.clone(),
        });

        let mut working = order.clone();
        if let Err(err) = working.apply(&accepted) {
            tracing::warn!(%err, "acceptance dropped by order state machine");
            return Vec::new();
        }

        let mut events = vec![accepted];
        if let Some(engine) = self.engines.get_mut(&order.instrument_id) {
            events.extend(engine.process_order(working, ts));
        } else {
            events.push(OrderEventAny::Rejected(OrderRejected {
                core: self.core_for(order, ts),
                account_id: self.account.id.clone(),
                reason: format!("instrument {} unknown at venue", order.instrument_id),
            }));
        }

        self.settle_fills(&events);
        events
    }

    pub fn cancel_order(&mut self, order: &Order, ts: Nanos) -> Vec<OrderEventAny> {
        match self.engines.get_mut(&order.instrument_id) {
            Some(engine) => engine.cancel_order(order, ts),
            None => Vec::new(),
        }
    }

    pub fn modify_order(
        &mut self,
        instrument_id: &InstrumentId,
        client_order_id: &ClientOrderId,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
        ts: Nanos,
    ) -> Vec<OrderEventAny> {
        let events = match self.engines.get_mut(instrument_id) {
            Some(engine) => engine.modify_order(client_order_id, quantity, price, trigger_price, ts),
            None => Vec::new(),
        };
        self.settle_fills(&events);
        events
    }

    // === Data routing ===

    pub fn process_bar(&mut self, bar: &Bar) -> Vec<OrderEventAny> {
        let mut events = self.expire_gtd(bar.instrument_id(), bar.ts_event);
        if let Some(engine) = self.engines.get_mut(bar.instrument_id()) {
            events.extend(engine.process_bar(bar));
        }
        self.settle_fills(&events);
        events
    }

    pub fn process_quote_tick(&mut self, tick: &QuoteTick) -> Vec<OrderEventAny> {
        let mut events = self.expire_gtd(&tick.instrument_id, tick.ts_event);
        if let Some(engine) = self.engines.get_mut(&tick.instrument_id) {
            events.extend(engine.process_quote_tick(tick));
        }
        self.settle_fills(&events);
        events
    }

    pub fn process_trade_tick(&mut self, tick: &TradeTick) -> Vec<OrderEventAny> {
        let mut events = self.expire_gtd(&tick.instrument_id, tick.ts_event);
        if let Some(engine) = self.engines.get_mut(&tick.instrument_id) {
            events.extend(engine.process_trade_tick(tick));
        }
        self.settle_fills(&events);
        events
    }

    pub fn process_book_delta(&mut self, delta: &OrderBookDelta) -> Vec<OrderEventAny> {
        let mut events = self.expire_gtd(&delta.instrument_id, delta.ts_event);
        if let Some(engine) = self.engines.get_mut(&delta.instrument_id) {
            events.extend(engine.process_book_delta(delta, delta.ts_event));
        }
        self.settle_fills(&events);
        events
    }

    pub fn process_book_deltas(&mut self, deltas: &OrderBookDeltas) -> Vec<OrderEventAny> {
        let mut events = self.expire_gtd(&deltas.instrument_id, deltas.ts_event);
        if let Some(engine) = self.engines.get_mut(&deltas.instrument_id) {
            events.extend(engine.process_book_deltas(deltas, deltas.ts_event));
        }
        self.settle_fills(&events);
        events
    }

    // === Queries ===

    pub fn open_order_count(&self) -> usize {
        self.engines.values().map(|e| e.open_order_count()).sum()
    }

    pub fn best_bid_price(&self, instrument_id: &InstrumentId) -> Option<Decimal> {
        self.engines
            .get(instrument_id)
            .and_then(|e| e.book.best_bid_price())
    }

    pub fn best_ask_price(&self, instrument_id: &InstrumentId) -> Option<Decimal> {
        self.engines
            .get(instrument_id)
            .and_then(|e| e.book.best_ask_price())
    }

    /// Total cash in the venue's base currency.
    pub fn total_cash_balance(&self) -> Decimal {
        self.account
            .balance_total(&self.account.base_currency.clone())
            .map(|m| m.amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn reset(&mut self) {
        for engine in self.engines.values_mut() {
            engine.reset();
        }
        self.venue_order_count = 0;
    }

    // === Internal helpers ===

    fn expire_gtd(&mut self, instrument_id: &InstrumentId, now: Nanos) -> Vec<OrderEventAny> {
        match self.engines.get_mut(instrument_id) {
            Some(engine) => engine.expire_gtd_orders(now),
            None => Vec::new(),
        }
    }

    /// Apply account balance updates for every fill in a batch of events.
    fn settle_fills(&mut self, events: &[OrderEventAny]) {
        for event in events {
            if let OrderEventAny::Filled(fill) = event {
                self.account.apply_fill(
                    fill.order_side,
                    fill.last_qty.value,
                    fill.last_px.value,
                    fill.commission.amount,
                );
            }
        }
    }

    /// Validate order size and price against the instrument's limits.
    fn validate_order(&self, order: &Order) -> Result<(), String> {
        let Some(instrument) = self.instruments.get(&order.instrument_id) else {
            return Ok(());
        };
        if let Some(min) = instrument.min_quantity {
            if order.quantity < min {
                return Err(format!("quantity {} below minimum {min}", order.quantity));
            }
        }
        if let Some(max) = instrument.max_quantity {
            if order.quantity > max {
                return Err(format!("quantity {} above maximum {max}", order.quantity));
            }
        }
        if let Some(price) = order.price {
            if let Some(min) = instrument.min_price {
                if price < min {
                    return Err(format!("price {price} below minimum {min}"));
                }
            }
            if let Some(max) = instrument.max_price {
                if price > max {
                    return Err(format!("price {price} above maximum {max}"));
                }
            }
        }
        Ok(())
    }

    /// Pre-trade balance check using the order's limit/trigger price, or
    /// the best opposite book price; skipped when no price is known.
    fn check_balance(&self, order: &Order) -> Result<(), String> {
        let instrument = self.instruments.get(&order.instrument_id);

        let price = order
            .price
            .or(order.trigger_price)
            .map(|p| p.value)
            .or_else(|| match order.side {
                OrderSide::Buy => self.best_ask_price(&order.instrument_id),
                OrderSide::Sell => self.best_bid_price(&order.instrument_id),
            });

        match price {
            Some(px) => self
                .account
                .can_submit_order(instrument, order.quantity.value, px),
            None => Ok(()),
        }
    }

    fn core_for(&self, order: &Order, ts: Nanos) -> crate::events::OrderEventCore {
        crate::events::OrderEventCore::new(
            order.trader_id.clone(),
            order.strategy_id.clone(),
            order.instrument_id.clone(),
            order.client_order_id.clone(),
            ts,
        )
    }
}
