//! Historical backtesting engine.
//!
//! Replays settled matches in chronological order through the edge and
//! staking pipeline against a simulated bankroll. Drawdown and streak feed
//! back into stake sizing, so trades are settled strictly one after another.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::metrics::{BacktestMetrics, DEFAULT_ANNUALIZATION};
use crate::strategy::kelly::RiskState;
use crate::strategy::risk::{Alert, AlertPolicy};
use crate::strategy::EdgeEngine;
use crate::types::{is_valid_odds, is_valid_probability, EngineError, MarketContext, MatchRecord};

// ---------------------------------------------------------------------------
// Historical data
// ---------------------------------------------------------------------------

/// A settled match with its market context, used for backtesting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalMatch {
    #[serde(flatten)]
    pub record: MatchRecord,
    #[serde(default)]
    pub context: MarketContext,
    /// Whether the priced selection won. Rows without an outcome are rejected.
    #[serde(default)]
    pub won: Option<bool>,
}

impl HistoricalMatch {
    /// Check the row is usable, returning its outcome.
    pub fn validate(&self) -> Result<bool, EngineError> {
        let r = &self.record;
        let malformed = |reason: &str| EngineError::MalformedRecord {
            id: r.id.clone(),
            reason: reason.to_string(),
        };

        if !is_valid_odds(r.current_odds) {
            return Err(malformed("current odds must be finite and above 1.0"));
        }
        if !r.opening_odds.is_finite() {
            return Err(malformed("opening odds are not finite"));
        }
        if !is_valid_probability(r.market_probability) {
            return Err(malformed("market probability outside [0, 1]"));
        }
        if r.model_probability.is_some_and(|p| !is_valid_probability(p)) {
            return Err(malformed("model probability outside [0, 1]"));
        }
        if !(r.hours_to_match.is_finite() && r.hours_to_match >= 0.0) {
            return Err(malformed("hours to match must be non-negative"));
        }
        self.won.ok_or_else(|| malformed("missing outcome"))
    }
}

// ---------------------------------------------------------------------------
// Strategy filter & configuration
// ---------------------------------------------------------------------------

/// Which opportunities a strategy takes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyFilter {
    pub name: String,
    /// Minimum composite edge, percent.
    pub min_edge: f64,
    /// Minimum confidence, 0–10.
    pub min_confidence: u8,
    /// Skip prices above this.
    pub max_odds: f64,
    /// Per-trade stake cap, percent of bankroll.
    pub max_stake_pct: f64,
}

impl Default for StrategyFilter {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            min_edge: 3.0,
            min_confidence: 0,
            max_odds: 10.0,
            max_stake_pct: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub starting_bankroll: f64,
    /// Sharpe-ratio scaling constant.
    pub annualization_constant: f64,
    pub strategies: Vec<StrategyFilter>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            starting_bankroll: 1000.0,
            annualization_constant: DEFAULT_ANNUALIZATION,
            strategies: vec![StrategyFilter::default()],
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.starting_bankroll > 0.0) {
            return Err(EngineError::Config(format!(
                "starting_bankroll must be positive, got {}",
                self.starting_bankroll
            )));
        }
        if !(self.annualization_constant > 0.0) {
            return Err(EngineError::Config(format!(
                "annualization_constant must be positive, got {}",
                self.annualization_constant
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Backtest results
// ---------------------------------------------------------------------------

/// Individual trade in the backtest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub match_id: String,
    pub start_time: DateTime<Utc>,
    pub selection: String,
    pub odds: f64,
    /// Probability behind the base edge.
    pub probability: f64,
    pub composite_edge: f64,
    pub confidence: u8,
    pub stake_pct: f64,
    pub stake: f64,
    pub won: bool,
    pub profit: f64,
    pub bankroll_after: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BacktestPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Complete record of one strategy replay.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestRun {
    pub strategy: String,
    pub period: Option<BacktestPeriod>,
    pub starting_bankroll: f64,
    pub trades: Vec<Trade>,
    pub metrics: BacktestMetrics,
    /// Malformed rows skipped.
    pub rejected_rows: usize,
    /// Valid rows the strategy declined.
    pub filtered_rows: usize,
    pub alerts: Vec<Alert>,
    /// The bankroll was exhausted before the history ended.
    pub busted: bool,
}

// ---------------------------------------------------------------------------
// Bankroll state
// ---------------------------------------------------------------------------

/// Running state owned by a single replay.
#[derive(Debug, Clone)]
struct BankrollState {
    bankroll: f64,
    peak: f64,
    /// +n after n straight wins, −n after n straight losses.
    streak: i32,
}

impl BankrollState {
    fn new(starting_bankroll: f64) -> Self {
        Self {
            bankroll: starting_bankroll,
            peak: starting_bankroll,
            streak: 0,
        }
    }

    fn drawdown_pct(&self) -> f64 {
        if self.peak <= 0.0 {
            0.0
        } else {
            ((self.peak - self.bankroll) / self.peak * 100.0).max(0.0)
        }
    }

    fn settle(&mut self, profit: f64, won: bool) {
        self.bankroll += profit;
        if self.bankroll > self.peak {
            self.peak = self.bankroll;
        }
        self.streak = match (won, self.streak) {
            (true, s) if s > 0 => s + 1,
            (true, _) => 1,
            (false, s) if s < 0 => s - 1,
            (false, _) => -1,
        };
    }

    fn is_alive(&self) -> bool {
        self.bankroll > 0.0
    }
}

// ---------------------------------------------------------------------------
// Backtester
// ---------------------------------------------------------------------------

pub struct Backtester {
    engine: EdgeEngine,
    annualization_constant: f64,
}

impl Backtester {
    pub fn new(engine: EdgeEngine, annualization_constant: f64) -> Self {
        Self {
            engine,
            annualization_constant,
        }
    }

    pub fn engine(&self) -> &EdgeEngine {
        &self.engine
    }

    /// Replay `history` under one strategy.
    ///
    /// Rows are stably sorted by start time first. Each call owns its own
    /// bankroll state, so identical inputs give identical runs.
    pub fn run(
        &self,
        history: &[HistoricalMatch],
        filter: &StrategyFilter,
        starting_bankroll: f64,
        policy: &AlertPolicy,
    ) -> BacktestRun {
        let mut ordered: Vec<&HistoricalMatch> = history.iter().collect();
        ordered.sort_by_key(|m| m.record.start_time);

        let period = match (ordered.first(), ordered.last()) {
            (Some(first), Some(last)) => Some(BacktestPeriod {
                start: first.record.start_time,
                end: last.record.start_time,
            }),
            _ => None,
        };

        let mut state = BankrollState::new(starting_bankroll);
        let mut trades: Vec<Trade> = Vec::new();
        let mut alerts: Vec<Alert> = Vec::new();
        let mut rejected_rows = 0usize;
        let mut filtered_rows = 0usize;
        let mut busted = !state.is_alive();

        for row in ordered {
            if !state.is_alive() {
                busted = true;
                break;
            }

            let won = match row.validate() {
                Ok(won) => won,
                Err(err) => {
                    warn!(strategy = %filter.name, error = %err, "Skipping malformed row");
                    rejected_rows += 1;
                    continue;
                }
            };

            let record = &row.record;
            if record.current_odds > filter.max_odds {
                filtered_rows += 1;
                continue;
            }

            let (assessment, _, _) = self.engine.assess(record, &row.context);
            if assessment.composite_edge < filter.min_edge
                || assessment.confidence < filter.min_confidence
            {
                debug!(
                    match_id = %record.id,
                    edge = format!("{:.2}%", assessment.composite_edge),
                    confidence = assessment.confidence,
                    "Filtered by strategy"
                );
                filtered_rows += 1;
                continue;
            }

            let risk = RiskState::in_sequence(state.drawdown_pct(), state.streak);
            let rec = self.engine.kelly().recommend(
                assessment.composite_edge,
                record.current_odds,
                state.bankroll,
                &risk,
            );
            let stake_pct = rec.clamped_stake_pct.min(filter.max_stake_pct.max(0.0));
            let stake = rec.stake_amount.min(state.bankroll * stake_pct / 100.0);
            if stake <= 0.0 {
                filtered_rows += 1;
                continue;
            }

            let profit = if won {
                stake * (record.current_odds - 1.0)
            } else {
                -stake
            };

            let previous_drawdown = state.drawdown_pct();
            state.settle(profit, won);
            alerts.extend(policy.check_drawdown(previous_drawdown, state.drawdown_pct()));
            alerts.extend(policy.check_streak(state.streak));

            trades.push(Trade {
                match_id: record.id.clone(),
                start_time: record.start_time,
                selection: record.selection.clone(),
                odds: record.current_odds,
                probability: record.base_probability(),
                composite_edge: assessment.composite_edge,
                confidence: assessment.confidence,
                stake_pct,
                stake,
                won,
                profit,
                bankroll_after: state.bankroll,
            });
        }

        if !state.is_alive() {
            busted = true;
        }

        let metrics =
            BacktestMetrics::compute(&trades, starting_bankroll, self.annualization_constant);

        info!(
            strategy = %filter.name,
            trades = metrics.total_bets,
            win_rate = format!("{:.1}%", metrics.win_rate * 100.0),
            roi = format!("{:.2}%", metrics.total_roi_pct),
            sharpe = format!("{:.2}", metrics.sharpe_ratio),
            max_drawdown = format!("{:.1}%", metrics.max_drawdown_pct),
            rejected = rejected_rows,
            filtered = filtered_rows,
            "Backtest complete"
        );

        BacktestRun {
            strategy: filter.name.clone(),
            period,
            starting_bankroll,
            trades,
            metrics,
            rejected_rows,
            filtered_rows,
            alerts,
            busted,
        }
    }

    /// Replay the same history under several strategies in parallel.
    ///
    /// Every run gets its own bankroll; output order matches `strategies`.
    pub fn run_all(
        &self,
        history: &[HistoricalMatch],
        strategies: &[StrategyFilter],
        starting_bankroll: f64,
        policy: &AlertPolicy,
    ) -> Vec<BacktestRun> {
        strategies
            .par_iter()
            .map(|filter| self.run(history, filter, starting_bankroll, policy))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
