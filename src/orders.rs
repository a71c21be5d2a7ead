//! Orders and the Order State Machine
//!
//! A single [`Order`] struct carries identity, specification, type-specific
//! price fields, contingency linkage, and fill state. Orders are mutated
//! exclusively by applying events; every transition is validated against the
//! static FSM table in [`OrderStatus::transition_allowed`].
//!
//! The [`OrderFactory`] is the only constructor strategies use: it assigns
//! deterministic client order ids and validates type-specific required
//! fields at build time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clock::Nanos;
use crate::enums::{
    ContingencyType, OrderSide, OrderStatus, OrderType, TimeInForce, TrailingOffsetType,
};
use crate::error::OrderError;
use crate::events::OrderEventAny;
use crate::identifiers::{
    ClientOrderId, InstrumentId, OrderListId, PositionId, StrategyId, TraderId, VenueOrderId,
};
use crate::money::{Price, Quantity};

/// An order in any lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub client_order_id: ClientOrderId,
    pub instrument_id: InstrumentId,
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    pub venue_order_id: Option<VenueOrderId>,

    // Specification
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Quantity,
    pub time_in_force: TimeInForce,
    pub expire_time_ns: Option<Nanos>,
    pub post_only: bool,
    pub reduce_only: bool,
    pub display_qty: Option<Quantity>,
    pub tags: Vec<String>,

    // Type-specific fields
    pub price: Option<Price>,
    pub trigger_price: Option<Price>,
    pub trailing_offset: Option<Decimal>,
    pub trailing_offset_type: Option<TrailingOffsetType>,
    pub limit_offset: Option<Decimal>,
    pub activation_price: Option<Price>,
    pub is_triggered: bool,
    is_activated: bool,
    extreme_price: Option<Decimal>,

    // Contingency
    pub contingency_type: ContingencyType,
    pub order_list_id: Option<OrderListId>,
    pub linked_order_ids: Vec<ClientOrderId>,
    pub parent_order_id: Option<ClientOrderId>,

    // Fill state
    pub status: OrderStatus,
    pub filled_qty: Quantity,
    pub leaves_qty: Quantity,
    pub avg_px: Decimal,
    pub position_id: Option<PositionId>,

    // History
    pub events: Vec<OrderEventAny>,
    pub ts_init: Nanos,
    pub ts_last: Nanos,
}

impl Order {
    // === State predicates ===

    /// Open = working at the venue (can still fill or be canceled).
    #[inline]
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Accepted
                | OrderStatus::Triggered
                | OrderStatus::PendingUpdate
                | OrderStatus::PendingCancel
                | OrderStatus::PartiallyFilled
        )
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.status.is_terminal()
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    #[inline]
    pub fn is_buy(&self) -> bool {
        self.side == OrderSide::Buy
    }

    #[inline]
    pub fn is_sell(&self) -> bool {
        self.side == OrderSide::Sell
    }

    // === Event application (FSM) ===

    /// Apply an order event, updating the FSM state.
    ///
    /// Returns `OrderError::InvalidTransition` for illegal transitions; the
    /// order is left unchanged in that case.
    pub fn apply(&mut self, event: &OrderEventAny) -> Result<(), OrderError> {
        match event {
            OrderEventAny::Filled(fill) => {
                let fill_qty = fill.last_qty.value.min(self.leaves_qty.value);
                let new_filled = self.filled_qty.value + fill_qty;
                let target = if new_filled >= self.quantity.value {
                    OrderStatus::Filled
                } else {
                    OrderStatus::PartiallyFilled
                };
                self.transition(target)?;

                // Quantity-weighted average fill price.
                if new_filled > Decimal::ZERO {
                    self.avg_px = (self.avg_px * self.filled_qty.value
                        + fill.last_px.value * fill_qty)
                        / new_filled;
                }
                self.filled_qty = Quantity {
                    value: new_filled,
                    precision: self.quantity.precision,
                };
                self.leaves_qty = Quantity {
                    value: (self.quantity.value - new_filled).max(Decimal::ZERO),
                    precision: self.quantity.precision,
                };
                self.venue_order_id = Some(fill.venue_order_id.clone());
                if let Some(pid) = &fill.position_id {
                    self.position_id = Some(pid.clone());
                }
            }
            OrderEventAny::Updated(update) => {
                self.transition(OrderStatus::Accepted)?;
                if let Some(qty) = update.quantity {
                    self.quantity = qty;
                    self.leaves_qty = Quantity {
                        value: (qty.value - self.filled_qty.value).max(Decimal::ZERO),
                        precision: qty.precision,
                    };
                }
                if let Some(px) = update.price {
                    self.price = Some(px);
                }
                if let Some(tp) = update.trigger_price {
                    self.trigger_price = Some(tp);
                }
            }
            other => {
                let target = other
                    .target_status()
                    .expect("every non-fill event maps to a status");
                self.transition(target)?;

                match other {
                    OrderEventAny::Accepted(e) => {
                        self.venue_order_id = Some(e.venue_order_id.clone());
                    }
                    OrderEventAny::Triggered(e) => {
                        self.is_triggered = true;
                        if let Some(vid) = &e.venue_order_id {
                            self.venue_order_id = Some(vid.clone());
                        }
                    }
                    _ => {}
                }
            }
        }

        self.events.push(event.clone());
        self.ts_last = event.ts_event();
        Ok(())
    }

    fn transition(&mut self, to: OrderStatus) -> Result<(), OrderError> {
        if !OrderStatus::transition_allowed(self.status, to) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to,
                client_order_id: self.client_order_id.to_string(),
            });
        }
        self.status = to;
        Ok(())
    }

    // === Trailing stop logic ===

    /// Update the trailing trigger from the latest market price.
    ///
    /// The trigger only ratchets in the favorable direction: up for a SELL
    /// trailing stop (protecting a long), down for a BUY (protecting a
    /// short). Returns `true` when the stop should fire.
    pub fn update_trailing(&mut self, market: Price, price_increment: Decimal) -> bool {
        let mp = market.value;

        if !self.is_activated {
            match (self.side, &self.activation_price) {
                (OrderSide::Sell, Some(ap)) if mp >= ap.value => self.is_activated = true,
                (OrderSide::Buy, Some(ap)) if mp <= ap.value => self.is_activated = true,
                (_, None) => self.is_activated = true,
                _ => return false,
            }
        }

        let offset = self.trailing_offset_value(mp, price_increment);

        match self.side {
            OrderSide::Sell => {
                let extreme = match self.extreme_price {
                    Some(e) => e.max(mp),
                    None => mp,
                };
                self.extreme_price = Some(extreme);
                let candidate = extreme - offset;
                let trigger = match self.trigger_price {
                    Some(t) => t.value.max(candidate),
                    None => candidate,
                };
                self.trigger_price = Some(Price::new(trigger, market.precision));
                mp <= trigger
            }
            OrderSide::Buy => {
                let extreme = match self.extreme_price {
                    Some(e) => e.min(mp),
                    None => mp,
                };
                self.extreme_price = Some(extreme);
                let candidate = extreme + offset;
                let trigger = match self.trigger_price {
                    Some(t) => t.value.min(candidate),
                    None => candidate,
                };
                self.trigger_price = Some(Price::new(trigger, market.precision));
                mp >= trigger
            }
        }
    }

    fn trailing_offset_value(&self, market: Decimal, price_increment: Decimal) -> Decimal {
        let offset = self.trailing_offset.unwrap_or(Decimal::ZERO);
        match self.trailing_offset_type.unwrap_or(TrailingOffsetType::Price) {
            TrailingOffsetType::Price => offset,
            TrailingOffsetType::BasisPoints => market * offset / Decimal::from(10_000),
            TrailingOffsetType::Ticks => offset * price_increment,
        }
    }

    /// The limit price a triggered trailing-stop-limit rests at:
    /// `trigger - limit_offset` for SELL, `trigger + limit_offset` for BUY.
    pub fn trailing_limit_price(&self) -> Option<Price> {
        if let Some(px) = self.price {
            return Some(px);
        }
        let trigger = self.trigger_price?;
        let offset = self.limit_offset.unwrap_or(Decimal::ZERO);
        let value = match self.side {
            OrderSide::Sell => trigger.value - offset,
            OrderSide::Buy => trigger.value + offset,
        };
        Some(Price::new(value, trigger.precision))
    }
}

// =============================================================================
// ORDER FACTORY
// =============================================================================

/// Per-strategy order constructor assigning `O-{strategy}-{seq}` ids.
#[derive(Debug, Clone)]
pub struct OrderFactory {
    trader_id: TraderId,
    strategy_id: StrategyId,
    order_count: u64,
    list_count: u64,
}

impl OrderFactory {
    pub fn new(trader_id: TraderId, strategy_id: StrategyId) -> Self {
        Self {
            trader_id,
            strategy_id,
            order_count: 0,
            list_count: 0,
        }
    }

    fn next_order_id(&mut self) -> ClientOrderId {
        self.order_count += 1;
        ClientOrderId::new(format!("O-{}-{}", self.strategy_id, self.order_count))
            .expect("generated id is non-empty")
    }

    /// Next contingency list id (`OL-{strategy}-{seq}`).
    pub fn next_order_list_id(&mut self) -> OrderListId {
        self.list_count += 1;
        OrderListId::new(format!("OL-{}-{}", self.strategy_id, self.list_count))
            .expect("generated id is non-empty")
    }

    fn base(
        &mut self,
        instrument_id: InstrumentId,
        side: OrderSide,
        order_type: OrderType,
        quantity: Quantity,
        ts_init: Nanos,
    ) -> Order {
        Order {
            client_order_id: self.next_order_id(),
            instrument_id,
            trader_id: self.trader_id.clone(),
            strategy_id: self.strategy_id.clone(),
            venue_order_id: None,
            side,
            order_type,
            quantity,
            time_in_force: TimeInForce::Gtc,
            expire_time_ns: None,
            post_only: false,
            reduce_only: false,
            display_qty: None,
            tags: Vec::new(),
            price: None,
            trigger_price: None,
            trailing_offset: None,
            trailing_offset_type: None,
            limit_offset: None,
            activation_price: None,
            is_triggered: false,
            is_activated: false,
            extreme_price: None,
            contingency_type: ContingencyType::None,
            order_list_id: None,
            linked_order_ids: Vec::new(),
            parent_order_id: None,
            status: OrderStatus::Initialized,
            filled_qty: Quantity::zero(quantity.precision),
            leaves_qty: quantity,
            avg_px: Decimal::ZERO,
            position_id: None,
            events: Vec::new(),
            ts_init,
            ts_last: ts_init,
        }
    }

    pub fn market(
        &mut self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        ts_init: Nanos,
    ) -> Order {
        self.base(instrument_id, side, OrderType::Market, quantity, ts_init)
    }

    pub fn limit(
        &mut self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        price: Price,
        ts_init: Nanos,
    ) -> Order {
        let mut order = self.base(instrument_id, side, OrderType::Limit, quantity, ts_init);
        order.price = Some(price);
        order
    }

    pub fn stop_market(
        &mut self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        trigger_price: Price,
        ts_init: Nanos,
    ) -> Order {
        let mut order = self.base(instrument_id, side, OrderType::StopMarket, quantity, ts_init);
        order.trigger_price = Some(trigger_price);
        order
    }

    pub fn stop_limit(
        &mut self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        trigger_price: Price,
        price: Price,
        ts_init: Nanos,
    ) -> Order {
        let mut order = self.base(instrument_id, side, OrderType::StopLimit, quantity, ts_init);
        order.trigger_price = Some(trigger_price);
        order.price = Some(price);
        order
    }

    pub fn market_if_touched(
        &mut self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        trigger_price: Price,
        ts_init: Nanos,
    ) -> Order {
        let mut order = self.base(
            instrument_id,
            side,
            OrderType::MarketIfTouched,
            quantity,
            ts_init,
        );
        order.trigger_price = Some(trigger_price);
        order
    }

    pub fn limit_if_touched(
        &mut self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        trigger_price: Price,
        price: Price,
        ts_init: Nanos,
    ) -> Order {
        let mut order = self.base(
            instrument_id,
            side,
            OrderType::LimitIfTouched,
            quantity,
            ts_init,
        );
        order.trigger_price = Some(trigger_price);
        order.price = Some(price);
        order
    }

    pub fn trailing_stop_market(
        &mut self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        trailing_offset: Decimal,
        trailing_offset_type: TrailingOffsetType,
        ts_init: Nanos,
    ) -> Order {
        let mut order = self.base(
            instrument_id,
            side,
            OrderType::TrailingStopMarket,
            quantity,
            ts_init,
        );
        order.trailing_offset = Some(trailing_offset);
        order.trailing_offset_type = Some(trailing_offset_type);
        order
    }

    #[allow(clippy::too_many_arguments)]
    pub fn trailing_stop_limit(
        &mut self,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Quantity,
        trailing_offset: Decimal,
        trailing_offset_type: TrailingOffsetType,
        limit_offset: Decimal,
        ts_init: Nanos,
    ) -> Order {
        let mut order = self.base(
            instrument_id,
            side,
            OrderType::TrailingStopLimit,
            quantity,
            ts_init,
        );
        order.trailing_offset = Some(trailing_offset);
        order.trailing_offset_type = Some(trailing_offset_type);
        order.limit_offset = Some(limit_offset);
        order
    }

    /// Link two orders as an OCO pair: filling one cancels the other.
    pub fn oco_pair(&mut self, first: &mut Order, second: &mut Order) -> OrderListId {
        let list_id = self.next_order_list_id();
        let first_id = first.client_order_id.clone();
        let second_id = second.client_order_id.clone();
        for (order, sibling) in [(&mut *first, second_id), (&mut *second, first_id)] {
            order.contingency_type = ContingencyType::Oco;
            order.order_list_id = Some(list_id.clone());
            order.linked_order_ids = vec![sibling];
        }
        list_id
    }
}

/// Builder-style modifiers used at order creation time.
impl Order {
    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn with_expire_time(mut self, expire_time_ns: Nanos) -> Self {
        self.time_in_force = TimeInForce::Gtd;
        self.expire_time_ns = Some(expire_time_ns);
        self
    }

    pub fn with_post_only(mut self) -> Self {
        self.post_only = true;
        self
    }

    pub fn with_reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    pub fn with_activation_price(mut self, activation_price: Price) -> Self {
        self.activation_price = Some(activation_price);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Validate type-specific required fields.
    pub fn validate(&self) -> Result<(), OrderError> {
        let missing = |field| OrderError::MissingField {
            client_order_id: self.client_order_id.to_string(),
            field,
        };
        match self.order_type {
            OrderType::Limit | OrderType::StopLimit | OrderType::LimitIfTouched
                if self.price.is_none() =>
            {
                return Err(missing("price"));
            }
            OrderType::StopMarket
            | OrderType::StopLimit
            | OrderType::MarketIfTouched
            | OrderType::LimitIfTouched
                if self.trigger_price.is_none() =>
            {
                return Err(missing("trigger_price"));
            }
            OrderType::TrailingStopMarket | OrderType::TrailingStopLimit
                if self.trailing_offset.is_none() =>
            {
                return Err(missing("trailing_offset"));
            }
            _ => {}
        }
        if self.time_in_force == TimeInForce::Gtd && self.expire_time_ns.is_none() {
            return Err(missing("expire_time_ns"));
        }
        Ok(())
    }
}
