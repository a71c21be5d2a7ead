//! Data Engine
//!
//! Receives market data from the event loop, updates the cache, then
//! publishes to the bus topics strategies subscribe on:
//! `data.bars.{bar_type}`, `data.quotes.{instrument_id}`,
//! `data.trades.{instrument_id}`, `data.book.{instrument_id}`.
//!
//! The venue's matching engine always processes an event before the data
//! engine publishes it, so strategies observe their fills ahead of the data
//! that caused them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::cache::Cache;
use crate::data::{Bar, OrderBookDelta, OrderBookDeltas, QuoteTick, TradeTick};
use crate::msgbus::{BusMessage, MessageBus};

pub struct DataEngine {
    cache: Rc<RefCell<Cache>>,
    msgbus: Rc<MessageBus>,
}

impl DataEngine {
    pub fn new(cache: Rc<RefCell<Cache>>, msgbus: Rc<MessageBus>) -> Self {
        Self { cache, msgbus }
    }

    pub fn process_bar(&self, bar: &Bar) {
        self.cache.borrow_mut().update_bar(bar.clone());
        let topic = format!("data.bars.{}", bar.bar_type);
        self.msgbus.publish(&topic, &BusMessage::Bar(bar.clone()));
    }

    pub fn process_quote_tick(&self, tick: &QuoteTick) {
        self.cache.borrow_mut().update_quote_tick(tick.clone());
        let topic = format!("data.quotes.{}", tick.instrument_id);
        self.msgbus.publish(&topic, &BusMessage::Quote(tick.clone()));
    }

    pub fn process_trade_tick(&self, tick: &TradeTick) {
        self.cache.borrow_mut().update_trade_tick(tick.clone());
        let topic = format!("data.trades.{}", tick.instrument_id);
        self.msgbus.publish(&topic, &BusMessage::Trade(tick.clone()));
    }

    pub fn process_book_delta(&self, delta: &OrderBookDelta) {
        let topic = format!("data.book.{}", delta.instrument_id);
        self.msgbus
            .publish(&topic, &BusMessage::BookDelta(delta.clone()));
    }

    pub fn process_book_deltas(&self, deltas: &OrderBookDeltas) {
        for delta in &deltas.deltas {
            self.process_book_delta(delta);
        }
    }
}
