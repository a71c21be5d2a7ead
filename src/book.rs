//! L2 Order Book
//!
//! Aggregated-by-price-level book: bids best = highest, asks best = lowest.
//! Supports real updates from book deltas and synthetic rebuilds from quote
//! ticks and bars for simulation. A non-empty book is never crossed
//! (`best_bid < best_ask`); synthetic builds place bid/ask symmetrically
//! around the mid.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::clock::Nanos;
use crate::data::{Bar, OrderBookDelta, OrderBookDeltas, QuoteTick};
use crate::enums::{BookAction, OrderSide};
use crate::identifiers::InstrumentId;

/// Synthetic level size used when rebuilding the book from bars, large
/// enough that bar-driven fills never run out of book.
fn synthetic_size() -> Decimal {
    Decimal::from(1_000_000_000u64)
}

/// Full L2 order book aggregated by price level.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub instrument_id: InstrumentId,
    pub sequence: u64,
    pub ts_last: Nanos,
    /// price -> total size; best bid is the highest key.
    bids: BTreeMap<Decimal, Decimal>,
    /// price -> total size; best ask is the lowest key.
    asks: BTreeMap<Decimal, Decimal>,
}

impl OrderBook {
    pub fn new(instrument_id: InstrumentId) -> Self {
        Self {
            instrument_id,
            sequence: 0,
            ts_last: 0,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    // === Book updates ===

    /// Apply a single delta to the book.
    pub fn apply_delta(&mut self, delta: &OrderBookDelta) {
        match delta.action {
            BookAction::Clear => self.clear(),
            BookAction::Add => {
                if let Some(order) = &delta.order {
                    self.add_size(order.side, order.price.value, order.size.value);
                }
            }
            BookAction::Update => {
                if let Some(order) = &delta.order {
                    self.set_size(order.side, order.price.value, order.size.value);
                }
            }
            BookAction::Delete => {
                if let Some(order) = &delta.order {
                    self.delete_level(order.side, order.price.value);
                }
            }
        }
        self.sequence = delta.sequence;
        self.ts_last = delta.ts_event;
    }

    pub fn apply_deltas(&mut self, deltas: &OrderBookDeltas) {
        for delta in &deltas.deltas {
            self.apply_delta(delta);
        }
    }

    /// Synthetic L1 rebuild from a quote tick.
    pub fn update_from_quote(&mut self, quote: &QuoteTick) {
        self.clear();
        self.set_size(OrderSide::Buy, quote.bid_price.value, quote.bid_size.value);
        self.set_size(OrderSide::Sell, quote.ask_price.value, quote.ask_size.value);
        self.ts_last = quote.ts_event;
    }

    /// Synthetic L1 rebuild from a bar close, with
    /// bid = mid * (1 - spread/2) and ask = mid * (1 + spread/2).
    pub fn update_from_bar(&mut self, bar: &Bar, spread_pct: Decimal) {
        self.clear();
        let mid = bar.close.value;
        let half_spread = mid * spread_pct / Decimal::TWO;
        self.set_size(OrderSide::Buy, mid - half_spread, synthetic_size());
        self.set_size(OrderSide::Sell, mid + half_spread, synthetic_size());
        self.ts_last = bar.ts_event;
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
    }

    // === Best price / spread ===

    #[inline]
    pub fn best_bid_price(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    #[inline]
    pub fn best_ask_price(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    pub fn best_bid_size(&self) -> Option<Decimal> {
        self.bids.iter().next_back().map(|(_, &s)| s)
    }

    pub fn best_ask_size(&self) -> Option<Decimal> {
        self.asks.iter().next().map(|(_, &s)| s)
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid_price(), self.best_ask_price()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid_price(), self.best_ask_price()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// True when `best_bid >= best_ask`, which a consistent book never is.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid_price(), self.best_ask_price()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    // === Depth queries ===

    /// Bid levels as (price, size), best (highest) first.
    pub fn bids(&self) -> Vec<(Decimal, Decimal)> {
        self.bids.iter().rev().map(|(&p, &s)| (p, s)).collect()
    }

    /// Ask levels as (price, size), best (lowest) first.
    pub fn asks(&self) -> Vec<(Decimal, Decimal)> {
        self.asks.iter().map(|(&p, &s)| (p, s)).collect()
    }

    /// Simulate sweeping the book for a market order of `quantity`.
    ///
    /// Returns (price, fill_qty) pairs best-first. Does not mutate the book.
    pub fn simulate_market_fill(
        &self,
        side: OrderSide,
        quantity: Decimal,
    ) -> Vec<(Decimal, Decimal)> {
        let mut fills = Vec::new();
        let mut remaining = quantity;

        let levels: Vec<(Decimal, Decimal)> = match side {
            OrderSide::Buy => self.asks(),
            OrderSide::Sell => self.bids(),
        };

        for (price, avail) in levels {
            if remaining <= Decimal::ZERO {
                break;
            }
            let fill_qty = remaining.min(avail);
            fills.push((price, fill_qty));
            remaining -= fill_qty;
        }

        fills
    }

    // === Internal helpers ===

    fn side_mut(&mut self, side: OrderSide) -> &mut BTreeMap<Decimal, Decimal> {
        match side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        }
    }

    fn add_size(&mut self, side: OrderSide, price: Decimal, size: Decimal) {
        if size <= Decimal::ZERO {
            self.delete_level(side, price);
            return;
        }
        *self.side_mut(side).entry(price).or_insert(Decimal::ZERO) += size;
    }

    fn set_size(&mut self, side: OrderSide, price: Decimal, size: Decimal) {
        if size <= Decimal::ZERO {
            self.delete_level(side, price);
            return;
        }
        self.side_mut(side).insert(price, size);
    }

    fn delete_level(&mut self, side: OrderSide, price: Decimal) {
        self.side_mut(side).remove(&price);
    }
}
