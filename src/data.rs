//! Market Data Types
//!
//! Canonical market data events for the simulation: OHLCV bars, quote and
//! trade ticks, and L2 book deltas. All carry `ts_event` (occurrence time)
//! and `ts_init` (object creation time) in nanoseconds, and are wrapped in
//! the tagged [`MarketEventAny`] consumed by the event loop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Nanos;
use crate::enums::{AggressorSide, BarAggregation, BookAction, OrderSide, PriceType};
use crate::identifiers::InstrumentId;
use crate::money::{Price, Quantity};

/// Specification of bar aggregation: step + unit + price series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarSpec {
    pub step: u32,
    pub aggregation: BarAggregation,
    pub price_type: PriceType,
}

impl fmt::Display for BarSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.step, self.aggregation, self.price_type)
    }
}

/// Fully qualified bar type: instrument + spec.
///
/// Formats as `"{symbol}.{venue}-{step}-{aggregation}-{price_type}"`,
/// e.g. `BTCUSDT.BINANCE-1-MINUTE-LAST`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BarType {
    pub instrument_id: InstrumentId,
    pub spec: BarSpec,
}

impl BarType {
    pub fn new(instrument_id: InstrumentId, step: u32, aggregation: BarAggregation) -> Self {
        Self {
            instrument_id,
            spec: BarSpec {
                step,
                aggregation,
                price_type: PriceType::Last,
            },
        }
    }
}

impl fmt::Display for BarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.instrument_id, self.spec)
    }
}

/// OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub bar_type: BarType,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: Quantity,
    pub ts_event: Nanos,
    pub ts_init: Nanos,
}

impl Bar {
    #[inline]
    pub fn instrument_id(&self) -> &InstrumentId {
        &self.bar_type.instrument_id
    }
}

/// Best bid/ask snapshot (Level 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTick {
    pub instrument_id: InstrumentId,
    pub bid_price: Price,
    pub ask_price: Price,
    pub bid_size: Quantity,
    pub ask_size: Quantity,
    pub ts_event: Nanos,
    pub ts_init: Nanos,
}

impl QuoteTick {
    /// Mid price at the quote's precision.
    pub fn mid_price(&self) -> Price {
        Price::new(
            (self.bid_price.value + self.ask_price.value) / rust_decimal::Decimal::TWO,
            self.bid_price.precision.max(self.ask_price.precision),
        )
    }
}

/// Individual trade / market print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTick {
    pub instrument_id: InstrumentId,
    pub price: Price,
    pub size: Quantity,
    pub aggressor_side: AggressorSide,
    pub trade_id: String,
    pub ts_event: Nanos,
    pub ts_init: Nanos,
}

/// A single order at a price level (used by book deltas).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookOrder {
    pub side: OrderSide,
    pub price: Price,
    pub size: Quantity,
}

/// A single incremental update to the order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookDelta {
    pub instrument_id: InstrumentId,
    pub action: BookAction,
    /// The level being added, updated, or deleted. `None` for `Clear`.
    pub order: Option<BookOrder>,
    pub sequence: u64,
    pub ts_event: Nanos,
    pub ts_init: Nanos,
}

/// Batch of book deltas for a single snapshot or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookDeltas {
    pub instrument_id: InstrumentId,
    pub deltas: Vec<OrderBookDelta>,
    pub ts_event: Nanos,
    pub ts_init: Nanos,
}

/// Tagged sum over all market data events consumed by the event loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEventAny {
    Bar(Bar),
    Quote(QuoteTick),
    Trade(TradeTick),
    BookDelta(OrderBookDelta),
    BookDeltas(OrderBookDeltas),
}

impl MarketEventAny {
    /// Occurrence timestamp used for event-loop ordering.
    #[inline]
    pub fn ts_event(&self) -> Nanos {
        match self {
            MarketEventAny::Bar(b) => b.ts_event,
            MarketEventAny::Quote(q) => q.ts_event,
            MarketEventAny::Trade(t) => t.ts_event,
            MarketEventAny::BookDelta(d) => d.ts_event,
            MarketEventAny::BookDeltas(d) => d.ts_event,
        }
    }

    /// The instrument the event belongs to.
    #[inline]
    pub fn instrument_id(&self) -> &InstrumentId {
        match self {
            MarketEventAny::Bar(b) => b.instrument_id(),
            MarketEventAny::Quote(q) => &q.instrument_id,
            MarketEventAny::Trade(t) => &t.instrument_id,
            MarketEventAny::BookDelta(d) => &d.instrument_id,
            MarketEventAny::BookDeltas(d) => &d.instrument_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::Venue;
    use rust_decimal_macros::dec;

    fn instrument_id() -> InstrumentId {
        InstrumentId::new("AAPL", Venue::new("SIM").unwrap()).unwrap()
    }

    #[test]
    fn test_bar_type_format() {
        let bt = BarType::new(instrument_id(), 5, BarAggregation::Minute);
        assert_eq!(bt.to_string(), "AAPL.SIM-5-MINUTE-LAST");
    }

    #[test]
    fn test_quote_mid_price() {
        let q = QuoteTick {
            instrument_id: instrument_id(),
            bid_price: Price::new(dec!(100.00), 2),
            ask_price: Price::new(dec!(100.10), 2),
            bid_size: Quantity::new(dec!(500), 0).unwrap(),
            ask_size: Quantity::new(dec!(400), 0).unwrap(),
            ts_event: 1,
            ts_init: 1,
        };
        assert_eq!(q.mid_price().value, dec!(100.05));
    }

    #[test]
    fn test_market_event_ts_dispatch() {
        let bar = Bar {
            bar_type: BarType::new(instrument_id(), 1, BarAggregation::Minute),
            open: Price::new(dec!(100), 2),
            high: Price::new(dec!(110), 2),
            low: Price::new(dec!(95), 2),
            close: Price::new(dec!(105), 2),
            volume: Quantity::new(dec!(1000), 0).unwrap(),
            ts_event: 42,
            ts_init: 42,
        };
        let ev = MarketEventAny::Bar(bar);
        assert_eq!(ev.ts_event(), 42);
        assert_eq!(ev.instrument_id().symbol, "AAPL");
    }
}
