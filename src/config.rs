//! Configuration
//!
//! Run-level and per-venue configuration consumed by the backtest engine.

use std::rc::Rc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::currency::Currency;
use crate::enums::{AccountType, OmsType};
use crate::models::{FeeModel, FillModel, MakerTakerFeeModel};
use crate::money::Money;

/// Engine-level configuration.
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub trader_id: String,
    /// Cap on orders executed per tick; commands beyond the cap are dropped
    /// with a warning so a cascading strategy cannot stall the run.
    pub max_orders_per_tick: usize,
    /// Periods per year used to annualize post-run statistics.
    pub periods_per_year: u32,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            trader_id: "BACKTESTER-001".to_string(),
            max_orders_per_tick: 1_000,
            periods_per_year: 252,
        }
    }
}

/// Per-venue configuration.
#[derive(Clone)]
pub struct VenueConfig {
    pub name: String,
    pub oms_type: OmsType,
    pub account_type: AccountType,
    pub base_currency: Currency,
    pub starting_balances: Vec<Money>,
    pub default_leverage: Decimal,
    /// Synthetic spread applied when building an L2 book from bars.
    pub book_spread_pct: Decimal,
    pub fill_model: FillModel,
    pub fee_model: Rc<dyn FeeModel>,
}

impl VenueConfig {
    /// A venue with the given starting balances; the base currency is taken
    /// from the first balance. Defaults: HEDGING, cash account, no leverage,
    /// 1 bp synthetic spread, guaranteed fills, maker/taker fees.
    pub fn new(name: impl Into<String>, starting_balances: Vec<Money>) -> Self {
        let base_currency = starting_balances
            .first()
            .map(|m| m.currency.clone())
            .unwrap_or_else(crate::currency::usd);
        Self {
            name: name.into(),
            oms_type: OmsType::Hedging,
            account_type: AccountType::Cash,
            base_currency,
            starting_balances,
            default_leverage: Decimal::ONE,
            book_spread_pct: dec!(0.0001),
            fill_model: FillModel::default(),
            fee_model: Rc::new(MakerTakerFeeModel),
        }
    }

    pub fn with_oms_type(mut self, oms_type: OmsType) -> Self {
        self.oms_type = oms_type;
        self
    }

    pub fn with_account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = account_type;
        self
    }

    pub fn with_leverage(mut self, leverage: Decimal) -> Self {
        self.default_leverage = leverage;
        self
    }

    pub fn with_book_spread_pct(mut self, spread_pct: Decimal) -> Self {
        self.book_spread_pct = spread_pct;
        self
    }

    pub fn with_fill_model(mut self, fill_model: FillModel) -> Self {
        self.fill_model = fill_model;
        self
    }

    pub fn with_fee_model(mut self, fee_model: Rc<dyn FeeModel>) -> Self {
        self.fee_model = fee_model;
        self
    }
}
