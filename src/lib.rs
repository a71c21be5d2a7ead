//! Deterministic Event-Driven Market Backtester
//!
//! Single-threaded, time-ordered simulation of historical market data
//! against per-instrument matching engines, with exact decimal accounting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BacktestEngine                           │
//! │  (owns SimClock, drives event loop, records the balance curve)  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!             ┌──────────────────┼──────────────────┐
//!             ▼                  ▼                  ▼
//!      ┌────────────┐     ┌────────────┐     ┌────────────┐
//!      │  SimClock  │     │ DataEngine │     │ MessageBus │
//!      │  (nanos)   │     │ (publish)  │     │ (pub/sub)  │
//!      └────────────┘     └────────────┘     └────────────┘
//!                                │
//!                                ▼
//! ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐
//! │  Strategy   │───▶│ RiskEngine  │───▶│ ExecutionEngine  │
//! │  (trait)    │    │ (gate)      │    │ (FSM, positions) │
//! └─────────────┘    └─────────────┘    └────────┬─────────┘
//!                                                │
//!                                                ▼
//!                                   ┌─────────────────────────┐
//!                                   │   SimulatedExchange     │
//!                                   │  OrderMatchingEngine    │
//!                                   │  per instrument + L2    │
//!                                   └─────────────────────────┘
//! ```
//!
//! # Determinism Guarantees
//!
//! - **Clock**: never reads system time; all time from `SimClock`
//! - **Ordering**: events process strictly by `ts_event`, stable on ties;
//!   order queues iterate in insertion order
//! - **RNG**: fill model randomness is a seeded `ChaCha8Rng` only
//! - **Numerics**: prices, quantities, and money are exact decimals on
//!   every path that touches fills, balances, or PnL

pub mod account;
pub mod book;
pub mod cache;
pub mod clock;
pub mod config;
pub mod currency;
pub mod data;
pub mod data_engine;
pub mod engine;
pub mod enums;
pub mod error;
pub mod events;
pub mod execution;
pub mod identifiers;
pub mod instrument;
pub mod matching;
pub mod models;
pub mod money;
pub mod msgbus;
pub mod orders;
pub mod position;
pub mod results;
pub mod risk;
pub mod stats;
pub mod strategy;
pub mod venue;

#[cfg(test)]
mod matching_tests;

// Re-exports for convenience
pub use account::{Account, AccountBalance};
pub use book::OrderBook;
pub use cache::Cache;
pub use clock::{
    datetime_to_nanos, nanos_to_datetime, parse_timestamp, Nanos, SimClock, TimeEvent,
    NANOS_PER_MICRO, NANOS_PER_MILLI, NANOS_PER_SEC,
};
pub use config::{BacktestConfig, VenueConfig};
pub use currency::{usd, Currency};
pub use data::{
    Bar, BarSpec, BarType, BookOrder, MarketEventAny, OrderBookDelta, OrderBookDeltas, QuoteTick,
    TradeTick,
};
pub use data_engine::DataEngine;
pub use engine::BacktestEngine;
pub use enums::{
    AccountType, AggressorSide, BarAggregation, BookAction, ContingencyType, CurrencyKind,
    LiquiditySide, OmsType, OrderSide, OrderStatus, OrderType, PositionSide, PriceType,
    TimeInForce, TradingState, TrailingOffsetType,
};
pub use error::{EngineError, OrderError, ValueError};
pub use events::{
    OrderAccepted, OrderCanceled, OrderDenied, OrderEventAny, OrderEventCore, OrderExpired,
    OrderFilled, OrderPendingCancel, OrderPendingUpdate, OrderRejected, OrderSubmitted,
    OrderTriggered, OrderUpdated, PositionChanged, PositionClosed, PositionEventAny,
    PositionOpened,
};
pub use execution::ExecutionEngine;
pub use identifiers::{
    AccountId, ActorId, ClientId, ClientOrderId, InstrumentId, OrderListId, PositionId,
    StrategyId, TradeId, TraderId, Venue, VenueOrderId,
};
pub use instrument::Instrument;
pub use matching::OrderMatchingEngine;
pub use models::{
    FeeModel, FillModel, FixedFeeModel, MakerTakerFeeModel, PerShareFeeModel, ZeroFeeModel,
};
pub use money::{Money, Price, Quantity};
pub use msgbus::{BusMessage, MessageBus, Subscription};
pub use orders::{Order, OrderFactory};
pub use position::Position;
pub use results::BacktestResult;
pub use risk::RiskEngine;
pub use stats::PerformanceStats;
pub use strategy::{Actor, Strategy, StrategyContext, TradingCommand};
pub use venue::SimulatedExchange;
