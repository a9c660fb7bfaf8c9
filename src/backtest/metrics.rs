//! Performance metrics for a replayed trade ledger.
//!
//! The Sharpe ratio here scales per-trade returns by
//! `sqrt(annualization_constant)`. Trades are not evenly spaced in time, so
//! the figure is a relative score for comparing strategies over the same
//! history, not a calendar-accurate Sharpe ratio.

use serde::Serialize;

use super::runner::Trade;

/// Default Sharpe scaling (daily returns over a trading year).
pub const DEFAULT_ANNUALIZATION: f64 = 252.0;

/// Aggregate results of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestMetrics {
    pub total_bets: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_staked: f64,
    pub net_profit: f64,
    pub total_roi_pct: f64,
    pub final_bankroll: f64,
    pub peak_bankroll: f64,
    pub max_drawdown_pct: f64,
    /// Gross winnings over gross losses. `None` when no trade lost.
    pub profit_factor: Option<f64>,
    pub sharpe_ratio: f64,
    /// Mean squared error of the traded probabilities against outcomes.
    pub brier_score: f64,
}

impl BacktestMetrics {
    pub fn compute(trades: &[Trade], starting_bankroll: f64, annualization_constant: f64) -> Self {
        let total_bets = trades.len();
        let wins = trades.iter().filter(|t| t.won).count();
        let losses = total_bets - wins;
        let total_staked: f64 = trades.iter().map(|t| t.stake).sum();
        let net_profit: f64 = trades.iter().map(|t| t.profit).sum();

        let equity: Vec<f64> = std::iter::once(starting_bankroll)
            .chain(trades.iter().map(|t| t.bankroll_after))
            .collect();
        let final_bankroll = equity.last().copied().unwrap_or(starting_bankroll);
        let peak_bankroll = equity.iter().copied().fold(starting_bankroll, f64::max);

        let returns: Vec<f64> = trades
            .iter()
            .filter(|t| t.stake > 0.0)
            .map(|t| t.profit / t.stake * 100.0)
            .collect();

        Self {
            total_bets,
            wins,
            losses,
            win_rate: if total_bets > 0 { wins as f64 / total_bets as f64 } else { 0.0 },
            total_staked,
            net_profit,
            total_roi_pct: if total_staked > 0.0 { net_profit / total_staked * 100.0 } else { 0.0 },
            final_bankroll,
            peak_bankroll,
            max_drawdown_pct: max_drawdown_pct(&equity),
            profit_factor: profit_factor(trades),
            sharpe_ratio: sharpe_ratio(&returns, annualization_constant),
            brier_score: brier_score(trades.iter().map(|t| (t.probability, t.won))),
        }
    }
}

/// Largest peak-to-trough decline of an equity curve, in percent.
pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak * 100.0);
        }
    }
    max_dd
}

/// Gross winnings / |gross losses|; `None` when nothing was lost.
pub fn profit_factor(trades: &[Trade]) -> Option<f64> {
    let gross_wins: f64 = trades.iter().filter(|t| t.profit > 0.0).map(|t| t.profit).sum();
    let gross_losses: f64 = trades.iter().filter(|t| t.profit < 0.0).map(|t| t.profit).sum();
    if gross_losses == 0.0 {
        None
    } else {
        Some(gross_wins / gross_losses.abs())
    }
}

/// `mean / std * sqrt(annualization_constant)` over per-trade returns.
///
/// Uses the sample standard deviation; 0 with fewer than two returns or no dispersion.
pub fn sharpe_ratio(returns: &[f64], annualization_constant: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if std_dev < 1e-10 {
        return 0.0;
    }

    (mean / std_dev) * annualization_constant.max(0.0).sqrt()
}

/// Brier = (1/N) · Σ(predicted − outcome)². 0.0 is perfect, 0.25 is a coin flip.
pub fn brier_score(points: impl IntoIterator<Item = (f64, bool)>) -> f64 {
    let (sum, count) = points.into_iter().fold((0.0, 0usize), |(sum, count), (p, won)| {
        let outcome = if won { 1.0 } else { 0.0 };
        (sum + (p - outcome).powi(2), count + 1)
    });
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
