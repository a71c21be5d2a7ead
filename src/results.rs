//! Backtest Results
//!
//! Immutable result container exposed to reporting after a completed run.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clock::Nanos;

/// Complete backtest result: run metadata, balances, activity counters, and
/// post-run performance statistics with the recorded balance curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    // Run metadata
    pub trader_id: String,
    pub start_ns: Nanos,
    pub end_ns: Nanos,
    /// Wall-clock run duration; the only non-reproducible field.
    pub run_time_s: f64,

    // Balances (exact decimal)
    pub starting_balance: Decimal,
    pub ending_balance: Decimal,
    pub total_return: Decimal,

    // Activity
    pub total_orders: usize,
    pub total_positions: usize,
    pub total_fills: usize,
    pub total_commissions: Decimal,

    // Performance (post-run float reductions)
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub annualized_volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown_pct: f64,
    pub max_drawdown_abs: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,

    /// Equity curve sampled on bar events: `(ts_ns, total cash)`.
    pub balance_curve: Vec<(Nanos, Decimal)>,
}

impl std::fmt::Display for BacktestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "BacktestResult(")?;
        writeln!(f, "  return    = {:.2}%", self.total_return_pct)?;
        writeln!(f, "  sharpe    = {:.3}", self.sharpe_ratio)?;
        writeln!(f, "  sortino   = {:.3}", self.sortino_ratio)?;
        writeln!(f, "  max_dd    = {:.2}%", self.max_drawdown_pct)?;
        writeln!(f, "  win_rate  = {:.1}%", self.win_rate * 100.0)?;
        writeln!(f, "  orders    = {}", self.total_orders)?;
        writeln!(f, "  positions = {}", self.total_positions)?;
        write!(f, ")")
    }
}
