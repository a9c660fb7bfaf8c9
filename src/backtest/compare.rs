//! Strategy comparison.
//!
//! Replays one history under several strategy filters and ranks the results.

use std::cmp::Ordering;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::metrics::BacktestMetrics;
use super::runner::{BacktestRun, Backtester, HistoricalMatch, StrategyFilter};
use crate::strategy::risk::AlertPolicy;

/// Primary ranking key. Remaining keys break ties in the order ROI, Sharpe, drawdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RankBy {
    #[default]
    Roi,
    Sharpe,
    /// Lowest max drawdown first.
    #[value(alias = "max_drawdown")]
    Drawdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyRanking {
    /// 1-based position.
    pub rank: usize,
    pub strategy: String,
    pub metrics: BacktestMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub rank_by: RankBy,
    pub rankings: Vec<StrategyRanking>,
    pub runs: Vec<BacktestRun>,
}

fn by_roi(a: &BacktestMetrics, b: &BacktestMetrics) -> Ordering {
    b.total_roi_pct.total_cmp(&a.total_roi_pct)
}

fn by_sharpe(a: &BacktestMetrics, b: &BacktestMetrics) -> Ordering {
    b.sharpe_ratio.total_cmp(&a.sharpe_ratio)
}

fn by_drawdown(a: &BacktestMetrics, b: &BacktestMetrics) -> Ordering {
    a.max_drawdown_pct.total_cmp(&b.max_drawdown_pct)
}

/// Order two results best-first under `rank_by`.
pub fn compare_metrics(rank_by: RankBy, a: &BacktestMetrics, b: &BacktestMetrics) -> Ordering {
    let tie_breaks = by_roi(a, b)
        .then_with(|| by_sharpe(a, b))
        .then_with(|| by_drawdown(a, b));
    match rank_by {
        RankBy::Roi => tie_breaks,
        RankBy::Sharpe => by_sharpe(a, b).then(tie_breaks),
        RankBy::Drawdown => by_drawdown(a, b).then(tie_breaks),
    }
}

/// Rank finished runs. Equal results keep their input order.
pub fn rank_runs(runs: &[BacktestRun], rank_by: RankBy) -> Vec<StrategyRanking> {
    let mut ordered: Vec<&BacktestRun> = runs.iter().collect();
    ordered.sort_by(|a, b| compare_metrics(rank_by, &a.metrics, &b.metrics));

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, run)| StrategyRanking {
            rank: i + 1,
            strategy: run.strategy.clone(),
            metrics: run.metrics.clone(),
        })
        .collect()
}

/// Run every strategy over `history` (in parallel) and rank the results.
pub fn compare_strategies(
    backtester: &Backtester,
    history: &[HistoricalMatch],
    strategies: &[StrategyFilter],
    starting_bankroll: f64,
    policy: &AlertPolicy,
    rank_by: RankBy,
) -> Comparison {
    let runs = backtester.run_all(history, strategies, starting_bankroll, policy);
    let rankings = rank_runs(&runs, rank_by);

    if let Some(best) = rankings.first() {
        info!(
            strategies = runs.len(),
            best = %best.strategy,
            roi = format!("{:.2}%", best.metrics.total_roi_pct),
            ?rank_by,
            "Strategy comparison complete"
        );
    }

    Comparison {
        rank_by,
        rankings,
        runs,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
