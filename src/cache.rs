//! State Cache
//!
//! Authoritative in-memory store for instruments, orders, positions,
//! accounts, and the last known market data per instrument. Secondary
//! indices by instrument and strategy keep lookups O(1). The cache is owned
//! by the engine and mutated only from the event loop; strategies read it
//! through a shared handle.

use indexmap::{IndexMap, IndexSet};

use crate::account::Account;
use crate::data::{Bar, BarType, QuoteTick, TradeTick};
use crate::identifiers::{
    AccountId, ClientOrderId, InstrumentId, PositionId, StrategyId, Venue,
};
use crate::instrument::Instrument;
use crate::money::Price;
use crate::orders::Order;
use crate::position::Position;
use rust_decimal::Decimal;

#[derive(Default)]
pub struct Cache {
    instruments: IndexMap<InstrumentId, Instrument>,

    orders: IndexMap<ClientOrderId, Order>,
    orders_by_instrument: IndexMap<InstrumentId, IndexSet<ClientOrderId>>,
    orders_by_strategy: IndexMap<StrategyId, IndexSet<ClientOrderId>>,

    positions: IndexMap<PositionId, Position>,
    positions_by_instrument: IndexMap<InstrumentId, IndexSet<PositionId>>,
    positions_by_strategy: IndexMap<StrategyId, IndexSet<PositionId>>,

    accounts: IndexMap<AccountId, Account>,

    last_quote: IndexMap<InstrumentId, QuoteTick>,
    last_trade: IndexMap<InstrumentId, TradeTick>,
    last_bar: IndexMap<BarType, Bar>,
    bars: IndexMap<BarType, Vec<Bar>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    // === Instruments ===

    pub fn add_instrument(&mut self, instrument: Instrument) {
        self.instruments.insert(instrument.id.clone(), instrument);
    }

    pub fn instrument(&self, instrument_id: &InstrumentId) -> Option<&Instrument> {
        self.instruments.get(instrument_id)
    }

    pub fn instruments(&self, venue: Option<&Venue>) -> Vec<&Instrument> {
        match venue {
            None => self.instruments.values().collect(),
            Some(v) => self
                .instruments
                .values()
                .filter(|i| i.venue() == v)
                .collect(),
        }
    }

    // === Orders ===

    pub fn add_order(&mut self, order: Order) {
        self.orders_by_instrument
            .entry(order.instrument_id.clone())
            .or_default()
            .insert(order.client_order_id.clone());
        self.orders_by_strategy
            .entry(order.strategy_id.clone())
            .or_default()
            .insert(order.client_order_id.clone());
        self.orders.insert(order.client_order_id.clone(), order);
    }

    pub fn order(&self, client_order_id: &ClientOrderId) -> Option<&Order> {
        self.orders.get(client_order_id)
    }

    pub fn order_mut(&mut self, client_order_id: &ClientOrderId) -> Option<&mut Order> {
        self.orders.get_mut(client_order_id)
    }

    pub fn orders(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Order> {
        match (instrument_id, strategy_id) {
            (Some(iid), _) => self
                .orders_by_instrument
                .get(iid)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| self.orders.get(id))
                        .filter(|o| strategy_id.map_or(true, |sid| &o.strategy_id == sid))
                        .collect()
                })
                .unwrap_or_default(),
            (None, Some(sid)) => self
                .orders_by_strategy
                .get(sid)
                .map(|ids| ids.iter().filter_map(|id| self.orders.get(id)).collect())
                .unwrap_or_default(),
            (None, None) => self.orders.values().collect(),
        }
    }

    pub fn orders_open(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Order> {
        self.orders(instrument_id, strategy_id)
            .into_iter()
            .filter(|o| o.is_open())
            .collect()
    }

    pub fn orders_filled(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Order> {
        self.orders(instrument_id, strategy_id)
            .into_iter()
            .filter(|o| o.is_filled())
            .collect()
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    // === Positions ===

    pub fn add_position(&mut self, position: Position) {
        self.positions_by_instrument
            .entry(position.instrument_id.clone())
            .or_default()
            .insert(position.id.clone());
        self.positions_by_strategy
            .entry(position.strategy_id.clone())
            .or_default()
            .insert(position.id.clone());
        self.positions.insert(position.id.clone(), position);
    }

    pub fn position(&self, position_id: &PositionId) -> Option<&Position> {
        self.positions.get(position_id)
    }

    pub fn position_mut(&mut self, position_id: &PositionId) -> Option<&mut Position> {
        self.positions.get_mut(position_id)
    }

    pub fn positions(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Position> {
        match (instrument_id, strategy_id) {
            (Some(iid), _) => self
                .positions_by_instrument
                .get(iid)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| self.positions.get(id))
                        .filter(|p| strategy_id.map_or(true, |sid| &p.strategy_id == sid))
                        .collect()
                })
                .unwrap_or_default(),
            (None, Some(sid)) => self
                .positions_by_strategy
                .get(sid)
                .map(|ids| ids.iter().filter_map(|id| self.positions.get(id)).collect())
                .unwrap_or_default(),
            (None, None) => self.positions.values().collect(),
        }
    }

    pub fn positions_open(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Position> {
        self.positions(instrument_id, strategy_id)
            .into_iter()
            .filter(|p| p.is_open())
            .collect()
    }

    pub fn positions_closed(
        &self,
        instrument_id: Option<&InstrumentId>,
        strategy_id: Option<&StrategyId>,
    ) -> Vec<&Position> {
        self.positions(instrument_id, strategy_id)
            .into_iter()
            .filter(|p| p.is_closed())
            .collect()
    }

    /// Signed net quantity across open positions for `(instrument, strategy)`.
    pub fn net_position(
        &self,
        instrument_id: &InstrumentId,
        strategy_id: Option<&StrategyId>,
    ) -> Decimal {
        self.positions_open(Some(instrument_id), strategy_id)
            .iter()
            .map(|p| p.signed_qty)
            .sum()
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    // === Accounts ===

    pub fn add_account(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub fn account(&self, account_id: &AccountId) -> Option<&Account> {
        self.accounts.get(account_id)
    }

    pub fn accounts(&self) -> Vec<&Account> {
        self.accounts.values().collect()
    }

    // === Market data ===

    pub fn update_quote_tick(&mut self, tick: QuoteTick) {
        self.last_quote.insert(tick.instrument_id.clone(), tick);
    }

    pub fn update_trade_tick(&mut self, tick: TradeTick) {
        self.last_trade.insert(tick.instrument_id.clone(), tick);
    }

    pub fn update_bar(&mut self, bar: Bar) {
        self.last_bar.insert(bar.bar_type.clone(), bar.clone());
        self.bars.entry(bar.bar_type.clone()).or_default().push(bar);
    }

    pub fn quote_tick(&self, instrument_id: &InstrumentId) -> Option<&QuoteTick> {
        self.last_quote.get(instrument_id)
    }

    pub fn trade_tick(&self, instrument_id: &InstrumentId) -> Option<&TradeTick> {
        self.last_trade.get(instrument_id)
    }

    pub fn bar(&self, bar_type: &BarType) -> Option<&Bar> {
        self.last_bar.get(bar_type)
    }

    /// The most recent `count` bars for a bar type (all when `None`).
    pub fn bars(&self, bar_type: &BarType, count: Option<usize>) -> Vec<&Bar> {
        let history = match self.bars.get(bar_type) {
            Some(h) => h,
            None => return Vec::new(),
        };
        match count {
            Some(n) if n < history.len() => history[history.len() - n..].iter().collect(),
            _ => history.iter().collect(),
        }
    }

    /// Best available mark price for an instrument: quote mid, else last
    /// trade, else last bar close.
    pub fn mark_price(&self, instrument_id: &InstrumentId) -> Option<Price> {
        if let Some(quote) = self.last_quote.get(instrument_id) {
            return Some(quote.mid_price());
        }
        if let Some(trade) = self.last_trade.get(instrument_id) {
            return Some(trade.price);
        }
        self.last_bar
            .iter()
            .find(|(bt, _)| &bt.instrument_id == instrument_id)
            .map(|(_, bar)| bar.close)
    }

    // === Reset ===

    /// Clear run state, keeping instruments and accounts.
    pub fn reset(&mut self) {
        self.orders.clear();
        self.orders_by_instrument.clear();
        self.orders_by_strategy.clear();
        self.positions.clear();
        self.positions_by_instrument.clear();
        self.positions_by_strategy.clear();
        self.last_quote.clear();
        self.last_trade.clear();
        self.last_bar.clear();
        self.bars.clear();
    }
}
