//! Performance Statistics
//!
//! Post-run reductions over the recorded balance curve and closed
//! positions. This is the only layer where floating point is permitted; the
//! curve itself stays exact decimal and is immutable by the time these run.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::clock::Nanos;
use crate::position::Position;

/// Full suite of post-run performance metrics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceStats {
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
}

/// Period-over-period returns of the balance curve.
pub fn compute_returns(curve: &[(Nanos, Decimal)]) -> Vec<f64> {
    if curve.len() < 2 {
        return Vec::new();
    }
    let values: Vec<f64> = curve
        .iter()
        .map(|(_, v)| v.to_f64().unwrap_or(0.0))
        .collect();
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}

/// Annualized Sharpe ratio.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: u32) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let excess: Vec<f64> = returns
        .iter()
        .map(|r| r - risk_free_rate / periods_per_year as f64)
        .collect();
    let sd = std_dev(&excess);
    if sd == 0.0 {
        return 0.0;
    }
    mean(&excess) / sd * (periods_per_year as f64).sqrt()
}

/// Annualized Sortino ratio (penalizes only downside volatility).
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: u32) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let excess: Vec<f64> = returns
        .iter()
        .map(|r| r - risk_free_rate / periods_per_year as f64)
        .collect();
    let downside: Vec<f64> = excess.iter().copied().filter(|r| *r < 0.0).collect();
    let sd = std_dev(&downside);
    if sd == 0.0 {
        return if mean(&excess) <= 0.0 { 0.0 } else { f64::INFINITY };
    }
    mean(&excess) / sd * (periods_per_year as f64).sqrt()
}

/// Geometric annualized return.
pub fn annualized_return(returns: &[f64], periods_per_year: u32) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let total: f64 = returns.iter().map(|r| 1.0 + r).product();
    total.powf(periods_per_year as f64 / returns.len() as f64) - 1.0
}

/// Annualized standard deviation of returns.
pub fn annualized_volatility(returns: &[f64], periods_per_year: u32) -> f64 {
    std_dev(returns) * (periods_per_year as f64).sqrt()
}

/// Maximum drawdown as a fraction of the running peak.
pub fn max_drawdown_pct(curve: &[(Nanos, Decimal)]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;
    for (_, value) in curve {
        let v = value.to_f64().unwrap_or(0.0);
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            max_dd = f64::max(max_dd, (peak - v) / peak);
        }
    }
    max_dd
}

/// Maximum drawdown in absolute terms.
pub fn max_drawdown_abs(curve: &[(Nanos, Decimal)]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;
    for (_, value) in curve {
        let v = value.to_f64().unwrap_or(0.0);
        if v > peak {
            peak = v;
        }
        max_dd = f64::max(max_dd, peak - v);
    }
    max_dd
}

/// Calmar ratio: annualized return over max drawdown.
pub fn calmar_ratio(returns: &[f64], curve: &[(Nanos, Decimal)], periods_per_year: u32) -> f64 {
    let mdd = max_drawdown_pct(curve);
    if mdd == 0.0 {
        return 0.0;
    }
    annualized_return(returns, periods_per_year) / mdd
}

fn closed_pnls(positions: &[&Position]) -> Vec<f64> {
    positions
        .iter()
        .filter(|p| p.is_closed())
        .map(|p| p.realized_pnl.to_f64().unwrap_or(0.0))
        .collect()
}

/// Fraction of closed positions that were profitable.
pub fn win_rate(positions: &[&Position]) -> f64 {
    let pnls = closed_pnls(positions);
    if pnls.is_empty() {
        return 0.0;
    }
    pnls.iter().filter(|p| **p > 0.0).count() as f64 / pnls.len() as f64
}

/// Gross profit over gross loss.
pub fn profit_factor(positions: &[&Position]) -> f64 {
    let pnls = closed_pnls(positions);
    let gross_profit: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = -pnls.iter().filter(|p| **p < 0.0).sum::<f64>();
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        0.0
    }
}

/// Average win and average loss (absolute value).
pub fn avg_win_loss(positions: &[&Position]) -> (f64, f64) {
    let pnls = closed_pnls(positions);
    let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();
    (mean(&wins), mean(&losses).abs())
}

/// Expected value per trade:
/// `win_rate * avg_win - (1 - win_rate) * avg_loss`.
pub fn expectancy(positions: &[&Position]) -> f64 {
    let wr = win_rate(positions);
    let (aw, al) = avg_win_loss(positions);
    wr * aw - (1.0 - wr) * al
}

impl PerformanceStats {
    pub fn compute(
        curve: &[(Nanos, Decimal)],
        positions: &[&Position],
        starting_balance: Decimal,
        ending_balance: Decimal,
        periods_per_year: u32,
    ) -> Self {
        let returns = compute_returns(curve);
        let risk_free = 0.0;

        let total_return_pct = if starting_balance.is_zero() {
            0.0
        } else {
            ((ending_balance - starting_balance) / starting_balance)
                .to_f64()
                .unwrap_or(0.0)
                * 100.0
        };
        let (avg_win, avg_loss) = avg_win_loss(positions);

        Self {
            total_return_pct,
            annualized_return_pct: annualized_return(&returns, periods_per_year) * 100.0,
            annualized_volatility_pct: annualized_volatility(&returns, periods_per_year) * 100.0,
            sharpe_ratio: sharpe_ratio(&returns, risk_free, periods_per_year),
            sortino_ratio: sortino_ratio(&returns, risk_free, periods_per_year),
            calmar_ratio: calmar_ratio(&returns, curve, periods_per_year),
            max_drawdown_pct: max_drawdown_pct(curve) * 100.0,
            max_drawdown_abs: max_drawdown_abs(curve),
            win_rate: win_rate(positions),
            profit_factor: profit_factor(positions),
            expectancy: expectancy(positions),
            avg_win,
            avg_loss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn curve(values: &[i64]) -> Vec<(Nanos, Decimal)> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as Nanos, Decimal::from(*v)))
            .collect()
    }

    #[test]
    fn test_returns() {
        let c = curve(&[100, 110, 99]);
        let r = compute_returns(&c);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.1).abs() < 1e-12);
        assert!((r[1] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown() {
        let c = curve(&[100, 120, 90, 110, 80]);
        assert!((max_drawdown_pct(&c) - (120.0 - 80.0) / 120.0).abs() < 1e-12);
        assert!((max_drawdown_abs(&c) - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_curve_has_no_drawdown_or_sharpe() {
        let c = curve(&[100, 100, 100]);
        assert_eq!(max_drawdown_pct(&c), 0.0);
        let r = compute_returns(&c);
        assert_eq!(sharpe_ratio(&r, 0.0, 252), 0.0);
    }

    #[test]
    fn test_sharpe_positive_for_steady_gains() {
        let c = curve(&[100, 101, 102, 103, 105, 106]);
        let r = compute_returns(&c);
        assert!(sharpe_ratio(&r, 0.0, 252) > 0.0);
        assert!(annualized_return(&r, 252) > 0.0);
    }

    #[test]
    fn test_stats_struct_total_return() {
        let c = curve(&[100_000, 101_000]);
        let stats = PerformanceStats::compute(&c, &[], dec!(100000), dec!(101000), 252);
        assert!((stats.total_return_pct - 1.0).abs() < 1e-9);
        assert_eq!(stats.win_rate, 0.0);
    }
}
