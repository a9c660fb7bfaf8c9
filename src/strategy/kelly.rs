//! Kelly criterion stake sizing.
//!
//! Uses the simplified form in which the `(odds - 1)` terms cancel and full
//! Kelly reduces to the edge fraction itself (`edge_pct / 100`), rather than
//! the textbook `f* = (p·b − q) / b`. The fraction, clamps and adjustment
//! constants below are tuned against that simplified value; changing the
//! formula changes every recommended stake.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{is_valid_odds, EngineError, StakeRecommendation};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Kelly sizing configuration. Percent fields are percent of bankroll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly).
    pub kelly_fraction: f64,
    pub min_stake_pct: f64,
    pub max_stake_pct: f64,
    /// Drawdown (percent) the strategy is prepared to sit through.
    pub max_drawdown_tolerance: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            kelly_fraction: 0.25, // Quarter-Kelly
            min_stake_pct: 0.5,
            max_stake_pct: 5.0,
            max_drawdown_tolerance: 20.0,
        }
    }
}

impl KellyConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.kelly_fraction > 0.0 && self.kelly_fraction <= 1.0) {
            return Err(EngineError::Config(format!(
                "kelly_fraction must be in (0, 1], got {}",
                self.kelly_fraction
            )));
        }
        if !(self.min_stake_pct >= 0.0 && self.min_stake_pct <= self.max_stake_pct) {
            return Err(EngineError::Config(format!(
                "stake bounds must satisfy 0 <= min ({}) <= max ({})",
                self.min_stake_pct, self.max_stake_pct
            )));
        }
        if self.max_stake_pct > 100.0 {
            return Err(EngineError::Config(format!(
                "max_stake_pct cannot exceed 100, got {}",
                self.max_stake_pct
            )));
        }
        if !(self.max_drawdown_tolerance > 0.0) {
            return Err(EngineError::Config(format!(
                "max_drawdown_tolerance must be positive, got {}",
                self.max_drawdown_tolerance
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Risk state
// ---------------------------------------------------------------------------

/// State-dependent inputs to the stake adjustments.
///
/// Each adjustment applies only when its input is present: the backtester
/// supplies drawdown and streak, live evaluation supplies drawdown and
/// (optionally) a historical variance estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskState {
    /// Current drawdown from peak, in percent.
    pub drawdown_pct: f64,
    /// Signed run of results: +n after n wins, −n after n losses.
    pub streak: Option<i32>,
    /// Historical variance estimate in [0, 1].
    pub variance: Option<f64>,
}

impl RiskState {
    pub fn with_drawdown(drawdown_pct: f64) -> Self {
        Self {
            drawdown_pct,
            ..Default::default()
        }
    }

    pub fn in_sequence(drawdown_pct: f64, streak: i32) -> Self {
        Self {
            drawdown_pct,
            streak: Some(streak),
            variance: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Adjustments
// ---------------------------------------------------------------------------

/// Scale down as drawdown eats into the tolerance.
pub fn drawdown_multiplier(drawdown_pct: f64, tolerance_pct: f64) -> f64 {
    if drawdown_pct > 0.75 * tolerance_pct {
        0.5
    } else if drawdown_pct > 0.5 * tolerance_pct {
        0.75
    } else {
        1.0
    }
}

/// Press on win streaks of three or more, back off after three or more losses.
pub fn streak_multiplier(streak: i32) -> f64 {
    if streak >= 3 {
        1.0 + (streak as f64 * 0.10).min(0.30)
    } else if streak < -2 {
        (1.0 - streak.unsigned_abs() as f64 * 0.15).max(0.0)
    } else {
        1.0
    }
}

pub fn variance_multiplier(variance: f64) -> f64 {
    let v = if variance.is_finite() { variance.clamp(0.0, 1.0) } else { 0.0 };
    1.0 - v * 0.5
}

// ---------------------------------------------------------------------------
// Kelly calculator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KellyCalculator {
    config: KellyConfig,
}

impl Default for KellyCalculator {
    fn default() -> Self {
        Self::new(KellyConfig::default())
    }
}

impl KellyCalculator {
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    /// Access the Kelly configuration.
    pub fn config(&self) -> &KellyConfig {
        &self.config
    }

    /// Full Kelly under the simplified formula: the edge as a fraction.
    pub fn full_kelly_pct(edge_pct: f64) -> f64 {
        edge_pct / 100.0
    }

    /// Fractional Kelly after all adjustments that apply to `risk`, before clamping.
    pub fn adjusted_kelly_pct(&self, edge_pct: f64, risk: &RiskState) -> f64 {
        let mut pct = Self::full_kelly_pct(edge_pct) * self.config.kelly_fraction;

        if let Some(variance) = risk.variance {
            pct *= variance_multiplier(variance);
        }
        pct *= drawdown_multiplier(risk.drawdown_pct, self.config.max_drawdown_tolerance);
        if let Some(streak) = risk.streak {
            pct *= streak_multiplier(streak);
        }
        pct
    }

    /// Clamp into `[min_stake_pct, max_stake_pct]`; non-positive sizes become 0.
    pub fn clamp_stake_pct(&self, pct: f64) -> f64 {
        if !pct.is_finite() || pct <= 0.0 {
            return 0.0;
        }
        pct.clamp(self.config.min_stake_pct, self.config.max_stake_pct)
    }

    /// Recommend a stake for `edge_pct` at decimal `odds`.
    ///
    /// Degenerate odds (≤ 1.0), non-finite edges and empty bankrolls give a
    /// zero recommendation rather than an error.
    pub fn recommend(
        &self,
        edge_pct: f64,
        odds: f64,
        bankroll: f64,
        risk: &RiskState,
    ) -> StakeRecommendation {
        if !is_valid_odds(odds) || !edge_pct.is_finite() || !(bankroll > 0.0) {
            debug!(edge_pct, odds, bankroll, "Degenerate stake inputs, zero stake");
            return StakeRecommendation::default();
        }

        let full_kelly_pct = Self::full_kelly_pct(edge_pct);
        let fractional_kelly_pct = self.adjusted_kelly_pct(edge_pct, risk);
        let clamped_stake_pct = self.clamp_stake_pct(fractional_kelly_pct);

        let kelly_amount = bankroll * clamped_stake_pct / 100.0;
        let cap_amount = bankroll * self.config.max_stake_pct / 100.0;
        let stake_amount = kelly_amount.min(cap_amount).max(0.0);

        debug!(
            edge = format!("{:.2}%", edge_pct),
            full_kelly = full_kelly_pct,
            fractional = fractional_kelly_pct,
            stake_pct = format!("{:.2}%", clamped_stake_pct),
            stake = format!("{:.2}", stake_amount),
            drawdown = risk.drawdown_pct,
            streak = ?risk.streak,
            "Stake sized"
        );

        StakeRecommendation {
            full_kelly_pct,
            fractional_kelly_pct,
            clamped_stake_pct,
            stake_amount,
            potential_return: stake_amount * odds,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
