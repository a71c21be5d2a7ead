//! Order and Position Events
//!
//! Immutable event payloads describing every mutation of an order or
//! position. Orders are mutated exclusively by applying these events to the
//! order state machine; positions are mutated by `OrderFilled` only. Each
//! event carries `ts_event`, `ts_init`, and a unique `event_id`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Nanos;
use crate::currency::Currency;
use crate::enums::{LiquiditySide, OrderSide, OrderStatus, OrderType};
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, TradeId, TraderId,
    VenueOrderId,
};
use crate::money::{Money, Price, Quantity};

/// Common identity fields shared by every order event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEventCore {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub client_order_id: ClientOrderId,
    pub ts_event: Nanos,
    pub ts_init: Nanos,
    pub event_id: Uuid,
}

impl OrderEventCore {
    pub fn new(
        trader_id: TraderId,
        strategy_id: StrategyId,
        instrument_id: InstrumentId,
        client_order_id: ClientOrderId,
        ts_event: Nanos,
    ) -> Self {
        Self {
            trader_id,
            strategy_id,
            instrument_id,
            client_order_id,
            ts_event,
            ts_init: ts_event,
            event_id: Uuid::new_v4(),
        }
    }
}

/// Pre-trade risk check failed; the order never reached a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDenied {
    pub core: OrderEventCore,
    pub reason: String,
}

/// Order handed to the execution engine and routed towards a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmitted {
    pub core: OrderEventCore,
    pub account_id: AccountId,
}

/// Venue accepted the order and assigned a venue order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub core: OrderEventCore,
    pub venue_order_id: VenueOrderId,
    pub account_id: AccountId,
}

/// Venue-side check failed (insufficient balance, unknown instrument).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRejected {
    pub core: OrderEventCore,
    pub account_id: AccountId,
    pub reason: String,
}

/// Order removed from the venue's queues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCanceled {
    pub core: OrderEventCore,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: AccountId,
}

/// Order expired by time-in-force rules (Day at bar close, Gtd on clock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderExpired {
    pub core: OrderEventCore,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: AccountId,
}

/// A stop/MIT trigger price was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTriggered {
    pub core: OrderEventCore,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: AccountId,
}

/// Modification request in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPendingUpdate {
    pub core: OrderEventCore,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: AccountId,
}

/// Cancel request in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPendingCancel {
    pub core: OrderEventCore,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: AccountId,
}

/// Order quantity/price/trigger amended; transitions back to Accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdated {
    pub core: OrderEventCore,
    pub venue_order_id: Option<VenueOrderId>,
    pub account_id: AccountId,
    pub quantity: Option<Quantity>,
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
}

/// A fill (partial or complete) against the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilled {
    pub core: OrderEventCore,
    pub venue_order_id: VenueOrderId,
    pub account_id: AccountId,
    pub trade_id: TradeId,
    pub order_side: OrderSide,
    pub order_type: OrderType,
    pub last_qty: Quantity,
    pub last_px: Price,
    pub currency: Currency,
    pub commission: Money,
    pub liquidity_side: LiquiditySide,
    pub position_id: Option<PositionId>,
}

/// Tagged sum over all order events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEventAny {
    Denied(OrderDenied),
    Submitted(OrderSubmitted),
    Accepted(OrderAccepted),
    Rejected(OrderRejected),
    Canceled(OrderCanceled),
    Expired(OrderExpired),
    Triggered(OrderTriggered),
    PendingUpdate(OrderPendingUpdate),
    PendingCancel(OrderPendingCancel),
    Updated(OrderUpdated),
    Filled(OrderFilled),
}

impl OrderEventAny {
    /// Common identity fields of the wrapped event.
    pub fn core(&self) -> &OrderEventCore {
        match self {
            OrderEventAny::Denied(e) => &e.core,
            OrderEventAny::Submitted(e) => &e.core,
            OrderEventAny::Accepted(e) => &e.core,
            OrderEventAny::Rejected(e) => &e.core,
            OrderEventAny::Canceled(e) => &e.core,
            OrderEventAny::Expired(e) => &e.core,
            OrderEventAny::Triggered(e) => &e.core,
            OrderEventAny::PendingUpdate(e) => &e.core,
            OrderEventAny::PendingCancel(e) => &e.core,
            OrderEventAny::Updated(e) => &e.core,
            OrderEventAny::Filled(e) => &e.core,
        }
    }

    #[inline]
    pub fn client_order_id(&self) -> &ClientOrderId {
        &self.core().client_order_id
    }

    #[inline]
    pub fn strategy_id(&self) -> &StrategyId {
        &self.core().strategy_id
    }

    #[inline]
    pub fn ts_event(&self) -> Nanos {
        self.core().ts_event
    }

    /// The order status this event maps to in the state machine.
    /// `Updated` maps back to `Accepted`; `Filled` depends on leaves and is
    /// resolved during application.
    pub fn target_status(&self) -> Option<OrderStatus> {
        match self {
            OrderEventAny::Denied(_) => Some(OrderStatus::Denied),
            OrderEventAny::Submitted(_) => Some(OrderStatus::Submitted),
            OrderEventAny::Accepted(_) => Some(OrderStatus::Accepted),
            OrderEventAny::Rejected(_) => Some(OrderStatus::Rejected),
            OrderEventAny::Canceled(_) => Some(OrderStatus::Canceled),
            OrderEventAny::Expired(_) => Some(OrderStatus::Expired),
            OrderEventAny::Triggered(_) => Some(OrderStatus::Triggered),
            OrderEventAny::PendingUpdate(_) => Some(OrderStatus::PendingUpdate),
            OrderEventAny::PendingCancel(_) => Some(OrderStatus::PendingCancel),
            OrderEventAny::Updated(_) => Some(OrderStatus::Accepted),
            OrderEventAny::Filled(_) => None,
        }
    }
}

// =============================================================================
// POSITION EVENTS
// =============================================================================

/// A fill opened a new position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionOpened {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub position_id: PositionId,
    pub account_id: AccountId,
    pub opening_order_id: ClientOrderId,
    pub entry_side: OrderSide,
    pub entry_price: Price,
    pub quantity: Quantity,
    pub currency: Currency,
    pub ts_event: Nanos,
    pub ts_init: Nanos,
    pub event_id: Uuid,
}

/// A fill changed an open position's quantity or PnL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionChanged {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub position_id: PositionId,
    pub account_id: AccountId,
    pub quantity: Quantity,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub ts_event: Nanos,
    pub ts_init: Nanos,
    pub event_id: Uuid,
}

/// A fill brought the position's signed quantity back to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionClosed {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub instrument_id: InstrumentId,
    pub position_id: PositionId,
    pub account_id: AccountId,
    pub closing_order_id: ClientOrderId,
    pub realized_pnl: Decimal,
    pub currency: Currency,
    pub ts_event: Nanos,
    pub ts_init: Nanos,
    pub event_id: Uuid,
}

/// Tagged sum over all position events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PositionEventAny {
    Opened(PositionOpened),
    Changed(PositionChanged),
    Closed(PositionClosed),
}

impl PositionEventAny {
    #[inline]
    pub fn strategy_id(&self) -> &StrategyId {
        match self {
            PositionEventAny::Opened(e) => &e.strategy_id,
            PositionEventAny::Changed(e) => &e.strategy_id,
            PositionEventAny::Closed(e) => &e.strategy_id,
        }
    }

    #[inline]
    pub fn position_id(&self) -> &PositionId {
        match self {
            PositionEventAny::Opened(e) => &e.position_id,
            PositionEventAny::Changed(e) => &e.position_id,
            PositionEventAny::Closed(e) => &e.position_id,
        }
    }
}
