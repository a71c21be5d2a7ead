//! Backtest Engine
//!
//! The orchestrator: owns the clock, bus, cache, data engine, and execution
//! engine, and drives the deterministic event loop.
//!
//! Data flow per tick:
//!   1. Advance the clock to the event time, firing due timers
//!   2. Dispatch the event to the owning venue's matching engine (fills,
//!      cancels, triggers flow through the execution engine and publish)
//!   3. Dispatch to the data engine (strategy data callbacks)
//!   4. Drain buffered strategy commands, capped per tick
//!   5. After a bar only, record total cash on the balance curve
//!
//! Everything happens synchronously within the tick, so strategies observe
//! their fills before the bar that caused them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::clock::{Nanos, SimClock};
use crate::config::{BacktestConfig, VenueConfig};
use crate::data::MarketEventAny;
use crate::data_engine::DataEngine;
use crate::error::EngineError;
use crate::events::OrderEventAny;
use crate::execution::ExecutionEngine;
use crate::identifiers::{ActorId, StrategyId, TraderId, Venue};
use crate::instrument::Instrument;
use crate::msgbus::{BusMessage, MessageBus};
use crate::results::BacktestResult;
use crate::risk::RiskEngine;
use crate::stats::PerformanceStats;
use crate::strategy::{Actor, Strategy, StrategyContext, TradingCommand};
use crate::venue::SimulatedExchange;

struct StrategyHandle {
    cell: Rc<RefCell<Box<dyn Strategy>>>,
    ctx: StrategyContext,
}

struct ActorHandle {
    #[allow(dead_code)]
    actor_id: ActorId,
    cell: Rc<RefCell<Box<dyn Actor>>>,
    ctx: StrategyContext,
}

/// Event-driven backtest engine.
pub struct BacktestEngine {
    config: BacktestConfig,
    trader_id: TraderId,
    clock: Rc<RefCell<SimClock>>,
    msgbus: Rc<MessageBus>,
    cache: Rc<RefCell<Cache>>,
    data_engine: DataEngine,
    exec: ExecutionEngine,
    commands: Rc<RefCell<VecDeque<TradingCommand>>>,
    strategies: Vec<StrategyHandle>,
    actors: Vec<ActorHandle>,
    data: Vec<MarketEventAny>,
    result: Option<BacktestResult>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, EngineError> {
        let trader_id = TraderId::new(config.trader_id.clone())
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        let clock = Rc::new(RefCell::new(SimClock::new(0)));
        let msgbus = Rc::new(MessageBus::new());
        let cache = Rc::new(RefCell::new(Cache::new()));
        let data_engine = DataEngine::new(Rc::clone(&cache), Rc::clone(&msgbus));
        let exec = ExecutionEngine::new(Rc::clone(&cache), Rc::clone(&msgbus), RiskEngine::new());

        Ok(Self {
            config,
            trader_id,
            clock,
            msgbus,
            cache,
            data_engine,
            exec,
            commands: Rc::new(RefCell::new(VecDeque::new())),
            strategies: Vec::new(),
            actors: Vec::new(),
            data: Vec::new(),
            result: None,
        })
    }

    // === Registration ===

    /// Register a simulated venue.
    pub fn add_venue(&mut self, config: VenueConfig) -> Result<(), EngineError> {
        let venue = Venue::new(config.name.clone())
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        let exchange = SimulatedExchange::new(
            venue,
            config.oms_type,
            config.account_type,
            config.base_currency.clone(),
            config.starting_balances.clone(),
            config.default_leverage,
            config.book_spread_pct,
            config.fill_model.clone(),
            Rc::clone(&config.fee_model),
        );
        self.cache.borrow_mut().add_account(exchange.account.clone());
        self.exec.register_venue(exchange);
        Ok(())
    }

    /// Register an instrument with the engine and its venue.
    pub fn add_instrument(&mut self, instrument: Instrument) -> Result<(), EngineError> {
        let venue = instrument.venue().clone();
        let Some(exchange) = self.exec.venue_mut(&venue) else {
            return Err(EngineError::UnknownVenue(venue.to_string()));
        };
        exchange.add_instrument(instrument.clone());
        self.cache.borrow_mut().add_instrument(instrument);
        Ok(())
    }

    /// Add market data to the run; events are sorted by `ts_event` at run
    /// start (stable on ties).
    pub fn add_data(&mut self, data: Vec<MarketEventAny>) {
        self.data.extend(data);
    }

    /// Access the pre-trade risk engine for configuration.
    pub fn risk_mut(&mut self) -> &mut RiskEngine {
        &mut self.exec.risk
    }

    /// Register a strategy, wiring its bus subscriptions and context.
    pub fn add_strategy(&mut self, strategy: impl Strategy + 'static) {
        let strategy_id = strategy.strategy_id();
        let ctx = StrategyContext::new(
            self.trader_id.clone(),
            strategy_id.clone(),
            Rc::clone(&self.clock),
            Rc::clone(&self.cache),
            Rc::clone(&self.commands),
        );
        let cell: Rc<RefCell<Box<dyn Strategy>>> = Rc::new(RefCell::new(Box::new(strategy)));

        self.wire_strategy_subscriptions(&strategy_id, &cell, &ctx);
        self.strategies.push(StrategyHandle { cell, ctx });
    }

    /// Register a non-trading actor.
    pub fn add_actor(&mut self, actor: impl Actor + 'static) {
        let actor_id = actor.actor_id();
        let ctx = StrategyContext::new(
            self.trader_id.clone(),
            StrategyId::new(actor_id.as_str()).expect("actor id is non-empty"),
            Rc::clone(&self.clock),
            Rc::clone(&self.cache),
            Rc::clone(&self.commands),
        );
        let cell: Rc<RefCell<Box<dyn Actor>>> = Rc::new(RefCell::new(Box::new(actor)));

        self.wire_actor_subscriptions(&cell, &ctx);
        self.actors.push(ActorHandle {
            actor_id,
            cell,
            ctx,
        });
    }

    // === Run ===

    /// Run the backtest over the optional inclusive `[start, end]` range.
    pub fn run(&mut self, start: Option<Nanos>, end: Option<Nanos>) {
        let wall_start = std::time::Instant::now();

        // Stable sort keeps insertion order on equal timestamps.
        self.data.sort_by_key(|e| e.ts_event());
        let data: Vec<MarketEventAny> = self
            .data
            .iter()
            .filter(|e| start.map_or(true, |s| e.ts_event() >= s))
            .filter(|e| end.map_or(true, |t| e.ts_event() <= t))
            .cloned()
            .collect();

        info!(
            trader_id = %self.trader_id,
            events = data.len(),
            strategies = self.strategies.len(),
            "backtest run starting"
        );

        for actor in &self.actors {
            actor.cell.borrow_mut().on_start(&actor.ctx);
        }
        for strategy in &self.strategies {
            strategy.cell.borrow_mut().on_start(&strategy.ctx);
        }
        self.drain_commands();

        let starting_balance = self.exec.total_cash_balance();
        let mut balance_curve: Vec<(Nanos, Decimal)> = Vec::new();
        if let Some(first) = data.first() {
            balance_curve.push((first.ts_event(), starting_balance));
        }

        for event in &data {
            let ts = event.ts_event();

            // 1. Advance the clock; due timers fire in ascending order.
            let time_events = self.clock.borrow_mut().advance_time(ts);
            for te in &time_events {
                for actor in &self.actors {
                    actor.cell.borrow_mut().on_time_event(&actor.ctx, te);
                }
                for strategy in &self.strategies {
                    strategy.cell.borrow_mut().on_time_event(&strategy.ctx, te);
                }
            }
            if !time_events.is_empty() {
                self.drain_commands();
            }

            // 2. Venue matching first, so fills precede the data publish.
            self.exec.process_data(event);

            // 3. Data engine: cache update + strategy data callbacks.
            match event {
                MarketEventAny::Bar(bar) => self.data_engine.process_bar(bar),
                MarketEventAny::Quote(tick) => self.data_engine.process_quote_tick(tick),
                MarketEventAny::Trade(tick) => self.data_engine.process_trade_tick(tick),
                MarketEventAny::BookDelta(delta) => self.data_engine.process_book_delta(delta),
                MarketEventAny::BookDeltas(deltas) => self.data_engine.process_book_deltas(deltas),
            }

            // 4. Execute buffered strategy commands within the same tick.
            self.drain_commands();

            // 5. Bars sample the balance curve.
            if matches!(event, MarketEventAny::Bar(_)) {
                balance_curve.push((ts, self.exec.total_cash_balance()));
            }
        }

        for strategy in &self.strategies {
            strategy.cell.borrow_mut().on_stop(&strategy.ctx);
        }
        for actor in &self.actors {
            actor.cell.borrow_mut().on_stop(&actor.ctx);
        }
        self.drain_commands();

        // Final equity must reflect any liquidation done in on_stop.
        let final_balance = self.exec.total_cash_balance();
        if let Some(&(last_ts, _)) = balance_curve.last() {
            balance_curve.push((last_ts, final_balance));
        }

        let run_time_s = wall_start.elapsed().as_secs_f64();
        self.result =
            Some(self.build_result(starting_balance, final_balance, balance_curve, run_time_s));

        info!(
            run_time_s,
            ending_balance = %final_balance,
            "backtest run complete"
        );
    }

    /// The completed run's result.
    pub fn result(&self) -> Result<&BacktestResult, EngineError> {
        self.result.as_ref().ok_or(EngineError::MissingResult)
    }

    /// Read-only view of the engine cache.
    pub fn cache(&self) -> std::cell::Ref<'_, Cache> {
        self.cache.borrow()
    }

    /// Reset for a fresh run, keeping venues, instruments, strategies, and
    /// subscriptions.
    pub fn reset(&mut self) {
        self.data.clear();
        self.result = None;
        self.commands.borrow_mut().clear();
        self.cache.borrow_mut().reset();
        self.exec.reset();
        *self.clock.borrow_mut() = SimClock::new(0);
        for strategy in &self.strategies {
            strategy.cell.borrow_mut().on_reset(&strategy.ctx);
        }
        for actor in &self.actors {
            actor.cell.borrow_mut().on_reset(&actor.ctx);
        }
    }

    /// Full teardown.
    pub fn dispose(&mut self) {
        self.data.clear();
        self.strategies.clear();
        self.actors.clear();
        self.result = None;
        self.msgbus.reset();
    }

    // === Internal helpers ===

    fn drain_commands(&mut self) {
        let mut processed = 0usize;
        loop {
            let cmd = self.commands.borrow_mut().pop_front();
            let Some(cmd) = cmd else { break };

            if processed >= self.config.max_orders_per_tick {
                warn!(
                    cap = self.config.max_orders_per_tick,
                    "max orders per tick reached; dropping remaining commands"
                );
                self.commands.borrow_mut().clear();
                break;
            }

            let now = self.clock.borrow().timestamp_ns();
            match cmd {
                TradingCommand::Submit(order) => self.exec.submit_order(order, now),
                TradingCommand::Cancel(client_order_id) => {
                    self.exec.cancel_order(&client_order_id, now)
                }
                TradingCommand::Modify {
                    client_order_id,
                    quantity,
                    price,
                    trigger_price,
                } => self
                    .exec
                    .modify_order(&client_order_id, quantity, price, trigger_price, now),
            }
            processed += 1;
        }
    }

    fn build_result(
        &self,
        starting_balance: Decimal,
        ending_balance: Decimal,
        balance_curve: Vec<(Nanos, Decimal)>,
        run_time_s: f64,
    ) -> BacktestResult {
        let cache = self.cache.borrow();
        let positions = cache.positions(None, None);
        let total_fills = cache.orders_filled(None, None).len();

        let stats = PerformanceStats::compute(
            &balance_curve,
            &positions,
            starting_balance,
            ending_balance,
            self.config.periods_per_year,
        );

        let start_ns = balance_curve.first().map(|(t, _)| *t).unwrap_or(0);
        let end_ns = balance_curve.last().map(|(t, _)| *t).unwrap_or(0);

        BacktestResult {
            trader_id: self.trader_id.to_string(),
            start_ns,
            end_ns,
            run_time_s,
            starting_balance,
            ending_balance,
            total_return: ending_balance - starting_balance,
            total_orders: cache.order_count(),
            total_positions: cache.position_count(),
            total_fills,
            total_commissions: self.exec.total_commissions(),
            total_return_pct: stats.total_return_pct,
            annualized_return_pct: stats.annualized_return_pct,
            annualized_volatility_pct: stats.annualized_volatility_pct,
            sharpe_ratio: stats.sharpe_ratio,
            sortino_ratio: stats.sortino_ratio,
            calmar_ratio: stats.calmar_ratio,
            max_drawdown_pct: stats.max_drawdown_pct,
            max_drawdown_abs: stats.max_drawdown_abs,
            win_rate: stats.win_rate,
            profit_factor: stats.profit_factor,
            expectancy: stats.expectancy,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            balance_curve,
        }
    }

    fn wire_strategy_subscriptions(
        &self,
        strategy_id: &StrategyId,
        cell: &Rc<RefCell<Box<dyn Strategy>>>,
        ctx: &StrategyContext,
    ) {
        // Order events, exact topic per strategy.
        {
            let cell = Rc::clone(cell);
            let ctx = ctx.clone();
            self.msgbus.subscribe(
                format!("events.order.{strategy_id}"),
                Rc::new(move |msg| {
                    let BusMessage::OrderEvent(event) = msg else {
                        return;
                    };
                    let mut strategy = cell.borrow_mut();
                    match event {
                        OrderEventAny::Submitted(e) => strategy.on_order_submitted(&ctx, e),
                        OrderEventAny::Accepted(e) => strategy.on_order_accepted(&ctx, e),
                        OrderEventAny::Rejected(e) => strategy.on_order_rejected(&ctx, e),
                        OrderEventAny::Denied(e) => strategy.on_order_denied(&ctx, e),
                        OrderEventAny::Canceled(e) => strategy.on_order_canceled(&ctx, e),
                        OrderEventAny::Expired(e) => strategy.on_order_expired(&ctx, e),
                        OrderEventAny::Filled(e) => strategy.on_order_filled(&ctx, e),
                        OrderEventAny::Triggered(e) => strategy.on_order_triggered(&ctx, e),
                        OrderEventAny::PendingUpdate(_)
                        | OrderEventAny::PendingCancel(_)
                        | OrderEventAny::Updated(_) => {}
                    }
                }),
            );
        }

        // Position events, exact topic per strategy.
        {
            let cell = Rc::clone(cell);
            let ctx = ctx.clone();
            self.msgbus.subscribe(
                format!("events.position.{strategy_id}"),
                Rc::new(move |msg| {
                    let BusMessage::PositionEvent(event) = msg else {
                        return;
                    };
                    let mut strategy = cell.borrow_mut();
                    match event {
                        crate::events::PositionEventAny::Opened(e) => {
                            strategy.on_position_opened(&ctx, e)
                        }
                        crate::events::PositionEventAny::Changed(e) => {
                            strategy.on_position_changed(&ctx, e)
                        }
                        crate::events::PositionEventAny::Closed(e) => {
                            strategy.on_position_closed(&ctx, e)
                        }
                    }
                }),
            );
        }

        // Market data, prefix wildcards filtered by the context's
        // subscription sets.
        {
            let cell = Rc::clone(cell);
            let ctx = ctx.clone();
            self.msgbus.subscribe(
                "data.bars.*",
                Rc::new(move |msg| {
                    if let BusMessage::Bar(bar) = msg {
                        if ctx.is_subscribed_bars(&bar.bar_type) {
                            cell.borrow_mut().on_bar(&ctx, bar);
                        }
                    }
                }),
            );
        }
        {
            let cell = Rc::clone(cell);
            let ctx = ctx.clone();
            self.msgbus.subscribe(
                "data.quotes.*",
                Rc::new(move |msg| {
                    if let BusMessage::Quote(tick) = msg {
                        if ctx.is_subscribed_quotes(&tick.instrument_id) {
                            cell.borrow_mut().on_quote_tick(&ctx, tick);
                        }
                    }
                }),
            );
        }
        {
            let cell = Rc::clone(cell);
            let ctx = ctx.clone();
            self.msgbus.subscribe(
                "data.trades.*",
                Rc::new(move |msg| {
                    if let BusMessage::Trade(tick) = msg {
                        if ctx.is_subscribed_trades(&tick.instrument_id) {
                            cell.borrow_mut().on_trade_tick(&ctx, tick);
                        }
                    }
                }),
            );
        }
    }

    fn wire_actor_subscriptions(&self, cell: &Rc<RefCell<Box<dyn Actor>>>, ctx: &StrategyContext) {
        {
            let cell = Rc::clone(cell);
            let ctx = ctx.clone();
            self.msgbus.subscribe(
                "data.bars.*",
                Rc::new(move |msg| {
                    if let BusMessage::Bar(bar) = msg {
                        if ctx.is_subscribed_bars(&bar.bar_type) {
                            cell.borrow_mut().on_bar(&ctx, bar);
                        }
                    }
                }),
            );
        }
        {
            let cell = Rc::clone(cell);
            let ctx = ctx.clone();
            self.msgbus.subscribe(
                "data.quotes.*",
                Rc::new(move |msg| {
                    if let BusMessage::Quote(tick) = msg {
                        if ctx.is_subscribed_quotes(&tick.instrument_id) {
                            cell.borrow_mut().on_quote_tick(&ctx, tick);
                        }
                    }
                }),
            );
        }
        {
            let cell = Rc::clone(cell);
            let ctx = ctx.clone();
            self.msgbus.subscribe(
                "data.trades.*",
                Rc::new(move |msg| {
                    if let BusMessage::Trade(tick) = msg {
                        if ctx.is_subscribed_trades(&tick.instrument_id) {
                            cell.borrow_mut().on_trade_tick(&ctx, tick);
                        }
                    }
                }),
            );
        }
    }
}
