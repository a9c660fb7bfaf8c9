//! Alert policy.
//!
//! Thresholds for the conditions a downstream notifier cares about. The
//! policy is a plain value passed into whichever component raises alerts;
//! components never keep their own copy of the thresholds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ArbitrageOpportunity, EdgeAssessment};

/// Alert thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPolicy {
    /// Raise when drawdown (percent) reaches this level.
    pub drawdown_alert_pct: f64,
    /// Raise when this many consecutive losses have been recorded.
    pub loss_streak_alert: u32,
    /// Raise when a composite edge (percent) is at least this large.
    pub high_edge_pct: f64,
    /// Minimum confidence for a high-edge alert.
    pub high_edge_min_confidence: u8,
    /// Raise for arbitrage at or above this margin (percent).
    pub arbitrage_alert_pct: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            drawdown_alert_pct: 15.0,
            loss_streak_alert: 5,
            high_edge_pct: 8.0,
            high_edge_min_confidence: 6,
            arbitrage_alert_pct: 1.0,
        }
    }
}

/// A condition the notification collaborator should surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    Drawdown { drawdown_pct: f64, threshold_pct: f64 },
    LossStreak { losses: u32 },
    HighEdge { match_id: String, composite_edge: f64, confidence: u8 },
    Arbitrage { match_id: String, arbitrage_pct: f64 },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::Drawdown { drawdown_pct, threshold_pct } => {
                write!(f, "Drawdown {drawdown_pct:.1}% (alert at {threshold_pct:.1}%)")
            }
            Alert::LossStreak { losses } => write!(f, "{losses} consecutive losses"),
            Alert::HighEdge { match_id, composite_edge, confidence } => {
                write!(f, "High edge on {match_id}: {composite_edge:.2}% (conf {confidence}/10)")
            }
            Alert::Arbitrage { match_id, arbitrage_pct } => {
                write!(f, "Arbitrage on {match_id}: {arbitrage_pct:.2}%")
            }
        }
    }
}

impl AlertPolicy {
    /// Alert when drawdown crosses the threshold from below.
    ///
    /// Comparing against the previous drawdown keeps a long drawdown from
    /// raising the same alert on every trade.
    pub fn check_drawdown(&self, previous_pct: f64, current_pct: f64) -> Option<Alert> {
        (previous_pct < self.drawdown_alert_pct && current_pct >= self.drawdown_alert_pct).then(
            || Alert::Drawdown {
                drawdown_pct: current_pct,
                threshold_pct: self.drawdown_alert_pct,
            },
        )
    }

    /// Alert exactly when the loss streak reaches the threshold.
    pub fn check_streak(&self, streak: i32) -> Option<Alert> {
        let losses = if streak < 0 { streak.unsigned_abs() } else { 0 };
        (self.loss_streak_alert > 0 && losses == self.loss_streak_alert)
            .then_some(Alert::LossStreak { losses })
    }

    pub fn check_edge(&self, match_id: &str, assessment: &EdgeAssessment) -> Option<Alert> {
        (assessment.composite_edge >= self.high_edge_pct
            && assessment.confidence >= self.high_edge_min_confidence)
            .then(|| Alert::HighEdge {
                match_id: match_id.to_string(),
                composite_edge: assessment.composite_edge,
                confidence: assessment.confidence,
            })
    }

    pub fn check_arbitrage(&self, opportunity: &ArbitrageOpportunity) -> Option<Alert> {
        (opportunity.arbitrage_pct >= self.arbitrage_alert_pct).then(|| Alert::Arbitrage {
            match_id: opportunity.match_id.clone(),
            arbitrage_pct: opportunity.arbitrage_pct,
        })
    }
}
