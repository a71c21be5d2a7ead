//! Shared Enumerations
//!
//! All enums used across the engine: order lifecycle, time in force,
//! contingencies, accounting modes, and market data classification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[inline]
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("BUY"),
            OrderSide::Sell => f.write_str("SELL"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    StopLimit,
    /// Triggers on touch (opposite direction from stop), fills as market.
    MarketIfTouched,
    /// Triggers on touch, rests as limit.
    LimitIfTouched,
    /// Trailing trigger, fills as market.
    TrailingStopMarket,
    /// Trailing trigger, rests as limit.
    TrailingStopLimit,
}

impl OrderType {
    /// True for order types that park awaiting a trigger.
    #[inline]
    pub fn is_stop_like(&self) -> bool {
        matches!(
            self,
            OrderType::StopMarket
                | OrderType::StopLimit
                | OrderType::MarketIfTouched
                | OrderType::LimitIfTouched
        )
    }

    /// True for trailing order types.
    #[inline]
    pub fn is_trailing(&self) -> bool {
        matches!(
            self,
            OrderType::TrailingStopMarket | OrderType::TrailingStopLimit
        )
    }
}

/// Time-in-force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled.
    Gtc,
    /// Immediate or cancel: fill what you can, cancel the rest.
    Ioc,
    /// Fill or kill: fully fill or entirely cancel.
    Fok,
    /// Good till date (expires at `expire_time_ns`).
    Gtd,
    /// Expires at session end (bar-close step).
    Day,
}

/// Order status (FSM states).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Initialized,
    Denied,
    Submitted,
    Accepted,
    Rejected,
    Canceled,
    Expired,
    Triggered,
    PendingUpdate,
    PendingCancel,
    PartiallyFilled,
    Filled,
}

impl OrderStatus {
    /// True for terminal statuses that no event can leave.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Denied
                | OrderStatus::Rejected
                | OrderStatus::Canceled
                | OrderStatus::Expired
                | OrderStatus::Filled
        )
    }

    /// Static transition table: is `from -> to` a legal FSM edge?
    pub fn transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::*;
        match from {
            Initialized => matches!(to, Denied | Submitted),
            Submitted => matches!(to, Accepted | Rejected | Canceled),
            Accepted => matches!(
                to,
                Canceled
                    | Expired
                    | Triggered
                    | PendingUpdate
                    | PendingCancel
                    | PartiallyFilled
                    | Filled
            ),
            Triggered => matches!(
                to,
                Canceled | Expired | PendingUpdate | PendingCancel | PartiallyFilled | Filled
            ),
            PendingUpdate => matches!(
                to,
                Accepted | Canceled | Expired | Triggered | PartiallyFilled | Filled
            ),
            PendingCancel => matches!(to, Canceled | Accepted | PartiallyFilled | Filled),
            PartiallyFilled => matches!(
                to,
                Canceled | Expired | PendingUpdate | PendingCancel | PartiallyFilled | Filled
            ),
            Denied | Rejected | Canceled | Expired | Filled => false,
        }
    }
}

/// Contingency linkage between orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContingencyType {
    #[default]
    None,
    /// One cancels other: sibling canceled when one fully fills.
    Oco,
    /// One triggers other: child submitted when parent fills.
    Oto,
    /// One updates other: updates linked order quantity.
    Ouo,
}

/// How a trailing offset is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrailingOffsetType {
    /// Absolute price offset.
    Price,
    /// Basis points of the market price (1 bp = 0.01%).
    BasisPoints,
    /// Multiples of the instrument price increment.
    Ticks,
}

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

/// Account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Cash,
    Margin,
}

/// Order-management scheme per venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OmsType {
    /// Single aggregate position per (instrument, strategy).
    Netting,
    /// Multiple concurrent positions per (instrument, strategy).
    Hedging,
}

/// Whether a fill removed or provided liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquiditySide {
    Maker,
    Taker,
}

/// Aggressor side of a public trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggressorSide {
    Buyer,
    Seller,
    NoAggressor,
}

/// Bar aggregation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarAggregation {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Tick,
    Volume,
    Value,
}

impl fmt::Display for BarAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BarAggregation::Millisecond => "MILLISECOND",
            BarAggregation::Second => "SECOND",
            BarAggregation::Minute => "MINUTE",
            BarAggregation::Hour => "HOUR",
            BarAggregation::Day => "DAY",
            BarAggregation::Week => "WEEK",
            BarAggregation::Month => "MONTH",
            BarAggregation::Tick => "TICK",
            BarAggregation::Volume => "VOLUME",
            BarAggregation::Value => "VALUE",
        };
        f.write_str(s)
    }
}

/// Which price series a bar aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceType {
    Bid,
    Ask,
    Mid,
    Last,
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PriceType::Bid => "BID",
            PriceType::Ask => "ASK",
            PriceType::Mid => "MID",
            PriceType::Last => "LAST",
        };
        f.write_str(s)
    }
}

/// Order book delta action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookAction {
    Add,
    Update,
    Delete,
    Clear,
}

/// Engine-wide trading state controlling the risk gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TradingState {
    #[default]
    Active,
    /// Only reduce-only orders pass the risk gate.
    Reducing,
    /// All orders are denied.
    Halted,
}

/// Currency classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
    Commodity,
}
