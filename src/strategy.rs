//! Strategies and Actors
//!
//! Strategies receive data and order/position event callbacks and issue
//! commands through a [`StrategyContext`] handle. The context never mutates
//! engine state directly: commands are buffered and drained by the engine
//! within the same tick, so cascading submissions cannot recurse.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashSet, VecDeque};
use std::rc::Rc;

use crate::cache::Cache;
use crate::clock::{Nanos, SimClock, TimeEvent};
use crate::data::{Bar, BarType, QuoteTick, TradeTick};
use crate::enums::OrderSide;
use crate::events::{
    OrderAccepted, OrderCanceled, OrderDenied, OrderExpired, OrderFilled, OrderRejected,
    OrderSubmitted, OrderTriggered, PositionChanged, PositionClosed, PositionOpened,
};
use crate::identifiers::{ActorId, ClientOrderId, InstrumentId, StrategyId, TraderId};
use crate::money::{Price, Quantity};
use crate::orders::{Order, OrderFactory};
use crate::position::Position;

/// A trading command buffered for the engine to execute.
#[derive(Debug, Clone)]
pub enum TradingCommand {
    Submit(Order),
    Cancel(ClientOrderId),
    Modify {
        client_order_id: ClientOrderId,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
    },
}

/// Handle through which strategies (and actors) interact with the engine.
///
/// Cheap to clone; all clones share the same command queue, cache handle,
/// clock, and subscription sets.
#[derive(Clone)]
pub struct StrategyContext {
    pub trader_id: TraderId,
    pub strategy_id: StrategyId,
    clock: Rc<RefCell<SimClock>>,
    cache: Rc<RefCell<Cache>>,
    commands: Rc<RefCell<VecDeque<TradingCommand>>>,
    factory: Rc<RefCell<OrderFactory>>,
    bar_subs: Rc<RefCell<HashSet<BarType>>>,
    quote_subs: Rc<RefCell<HashSet<InstrumentId>>>,
    trade_subs: Rc<RefCell<HashSet<InstrumentId>>>,
}

impl StrategyContext {
    pub fn new(
        trader_id: TraderId,
        strategy_id: StrategyId,
        clock: Rc<RefCell<SimClock>>,
        cache: Rc<RefCell<Cache>>,
        commands: Rc<RefCell<VecDeque<TradingCommand>>>,
    ) -> Self {
        let factory = OrderFactory::new(trader_id.clone(), strategy_id.clone());
        Self {
            trader_id,
            strategy_id,
            clock,
            cache,
            commands,
            factory: Rc::new(RefCell::new(factory)),
            bar_subs: Rc::new(RefCell::new(HashSet::new())),
            quote_subs: Rc::new(RefCell::new(HashSet::new())),
            trade_subs: Rc::new(RefCell::new(HashSet::new())),
        }
    }

    // === Time ===

    pub fn timestamp_ns(&self) -> Nanos {
        self.clock.borrow().timestamp_ns()
    }

    /// Register a one-shot alarm fired by the engine clock.
    pub fn set_time_alert(&self, name: impl Into<String>, alert_time_ns: Nanos) {
        self.clock.borrow_mut().set_time_alert(name, alert_time_ns);
    }

    /// Register a repeating timer fired by the engine clock.
    pub fn set_timer(&self, name: impl Into<String>, interval_ns: Nanos) {
        self.clock.borrow_mut().set_timer(name, interval_ns, None);
    }

    pub fn cancel_timer(&self, name: &str) {
        self.clock.borrow_mut().cancel_timer(name);
    }

    // === State access ===

    /// Read-only view of the engine cache.
    pub fn cache(&self) -> Ref<'_, Cache> {
        self.cache.borrow()
    }

    /// The strategy's order factory.
    pub fn order_factory(&self) -> RefMut<'_, OrderFactory> {
        self.factory.borrow_mut()
    }

    // === Order management ===

    pub fn submit_order(&self, order: Order) {
        self.commands
            .borrow_mut()
            .push_back(TradingCommand::Submit(order));
    }

    pub fn cancel_order(&self, order: &Order) {
        self.commands
            .borrow_mut()
            .push_back(TradingCommand::Cancel(order.client_order_id.clone()));
    }

    pub fn modify_order(
        &self,
        order: &Order,
        quantity: Option<Quantity>,
        price: Option<Price>,
        trigger_price: Option<Price>,
    ) {
        self.commands.borrow_mut().push_back(TradingCommand::Modify {
            client_order_id: order.client_order_id.clone(),
            quantity,
            price,
            trigger_price,
        });
    }

    /// Cancel every open order for the instrument owned by this strategy.
    pub fn cancel_all_orders(&self, instrument_id: &InstrumentId) {
        let ids: Vec<ClientOrderId> = self
            .cache
            .borrow()
            .orders_open(Some(instrument_id), Some(&self.strategy_id))
            .iter()
            .map(|o| o.client_order_id.clone())
            .collect();
        let mut commands = self.commands.borrow_mut();
        for id in ids {
            commands.push_back(TradingCommand::Cancel(id));
        }
    }

    /// Close a position with a reduce-only market order.
    pub fn close_position(&self, position: &Position) {
        if !position.is_open() {
            return;
        }
        let side = if position.is_long() {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let order = self
            .factory
            .borrow_mut()
            .market(
                position.instrument_id.clone(),
                side,
                position.quantity(),
                self.timestamp_ns(),
            )
            .with_reduce_only();
        self.submit_order(order);
    }

    /// Close every open position for the instrument owned by this strategy.
    pub fn close_all_positions(&self, instrument_id: &InstrumentId) {
        let positions: Vec<Position> = self
            .cache
            .borrow()
            .positions_open(Some(instrument_id), Some(&self.strategy_id))
            .into_iter()
            .cloned()
            .collect();
        for position in positions {
            self.close_position(&position);
        }
    }

    // === Convenience order helpers ===

    /// Submit a market buy.
    pub fn buy(&self, instrument_id: &InstrumentId, quantity: Quantity) {
        let order = self.factory.borrow_mut().market(
            instrument_id.clone(),
            OrderSide::Buy,
            quantity,
            self.timestamp_ns(),
        );
        self.submit_order(order);
    }

    /// Submit a market sell.
    pub fn sell(&self, instrument_id: &InstrumentId, quantity: Quantity) {
        let order = self.factory.borrow_mut().market(
            instrument_id.clone(),
            OrderSide::Sell,
            quantity,
            self.timestamp_ns(),
        );
        self.submit_order(order);
    }

    pub fn buy_limit(&self, instrument_id: &InstrumentId, quantity: Quantity, price: Price) {
        let order = self.factory.borrow_mut().limit(
            instrument_id.clone(),
            OrderSide::Buy,
            quantity,
            price,
            self.timestamp_ns(),
        );
        self.submit_order(order);
    }

    pub fn sell_limit(&self, instrument_id: &InstrumentId, quantity: Quantity, price: Price) {
        let order = self.factory.borrow_mut().limit(
            instrument_id.clone(),
            OrderSide::Sell,
            quantity,
            price,
            self.timestamp_ns(),
        );
        self.submit_order(order);
    }

    // === Data subscriptions ===

    pub fn subscribe_bars(&self, bar_type: BarType) {
        self.bar_subs.borrow_mut().insert(bar_type);
    }

    pub fn subscribe_quote_ticks(&self, instrument_id: InstrumentId) {
        self.quote_subs.borrow_mut().insert(instrument_id);
    }

    pub fn subscribe_trade_ticks(&self, instrument_id: InstrumentId) {
        self.trade_subs.borrow_mut().insert(instrument_id);
    }

    pub fn is_subscribed_bars(&self, bar_type: &BarType) -> bool {
        self.bar_subs.borrow().contains(bar_type)
    }

    pub fn is_subscribed_quotes(&self, instrument_id: &InstrumentId) -> bool {
        self.quote_subs.borrow().contains(instrument_id)
    }

    pub fn is_subscribed_trades(&self, instrument_id: &InstrumentId) -> bool {
        self.trade_subs.borrow().contains(instrument_id)
    }
}

/// Trading strategy callbacks. All hooks default to no-ops; implement the
/// ones the strategy cares about.
#[allow(unused_variables)]
pub trait Strategy {
    fn strategy_id(&self) -> StrategyId;

    // Lifecycle
    fn on_start(&mut self, ctx: &StrategyContext) {}
    fn on_stop(&mut self, ctx: &StrategyContext) {}
    fn on_reset(&mut self, ctx: &StrategyContext) {}

    // Market data
    fn on_bar(&mut self, ctx: &StrategyContext, bar: &Bar) {}
    fn on_quote_tick(&mut self, ctx: &StrategyContext, tick: &QuoteTick) {}
    fn on_trade_tick(&mut self, ctx: &StrategyContext, tick: &TradeTick) {}
    fn on_time_event(&mut self, ctx: &StrategyContext, event: &TimeEvent) {}

    // Order events
    fn on_order_submitted(&mut self, ctx: &StrategyContext, event: &OrderSubmitted) {}
    fn on_order_accepted(&mut self, ctx: &StrategyContext, event: &OrderAccepted) {}
    fn on_order_rejected(&mut self, ctx: &StrategyContext, event: &OrderRejected) {}
    fn on_order_denied(&mut self, ctx: &StrategyContext, event: &OrderDenied) {}
    fn on_order_canceled(&mut self, ctx: &StrategyContext, event: &OrderCanceled) {}
    fn on_order_expired(&mut self, ctx: &StrategyContext, event: &OrderExpired) {}
    fn on_order_filled(&mut self, ctx: &StrategyContext, event: &OrderFilled) {}
    fn on_order_triggered(&mut self, ctx: &StrategyContext, event: &OrderTriggered) {}

    // Position events
    fn on_position_opened(&mut self, ctx: &StrategyContext, event: &PositionOpened) {}
    fn on_position_changed(&mut self, ctx: &StrategyContext, event: &PositionChanged) {}
    fn on_position_closed(&mut self, ctx: &StrategyContext, event: &PositionClosed) {}
}

/// Non-trading component receiving lifecycle and data callbacks.
#[allow(unused_variables)]
pub trait Actor {
    fn actor_id(&self) -> ActorId;

    fn on_start(&mut self, ctx: &StrategyContext) {}
    fn on_stop(&mut self, ctx: &StrategyContext) {}
    fn on_reset(&mut self, ctx: &StrategyContext) {}

    fn on_bar(&mut self, ctx: &StrategyContext, bar: &Bar) {}
    fn on_quote_tick(&mut self, ctx: &StrategyContext, tick: &QuoteTick) {}
    fn on_trade_tick(&mut self, ctx: &StrategyContext, tick: &TradeTick) {}
    fn on_time_event(&mut self, ctx: &StrategyContext, event: &TimeEvent) {}
}
