//! Edge signals and composite scoring.
//!
//! Independent calculators for base edge, line movement and smart-money
//! flow, plus the weighted aggregator that fuses them into one composite
//! edge and a 0–10 confidence score.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{EdgeAssessment, EngineError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Fusion weights for the composite edge. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeWeights {
    pub base: f64,
    pub arbitrage: f64,
    pub movement: f64,
    pub model: f64,
}

impl Default for EdgeWeights {
    fn default() -> Self {
        Self {
            base: 0.60,
            arbitrage: 0.20,
            movement: 0.10,
            model: 0.10,
        }
    }
}

impl EdgeWeights {
    const SUM_TOLERANCE: f64 = 1e-6;

    pub fn sum(&self) -> f64 {
        self.base + self.arbitrage + self.movement + self.model
    }

    /// Reject weight sets that are negative or do not sum to 1.0.
    pub fn validate(&self) -> Result<(), EngineError> {
        let parts = [self.base, self.arbitrage, self.movement, self.model];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::Config(format!(
                "edge weights must be finite and non-negative: {self:?}"
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(EngineError::InvalidWeights { sum });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Signal calculators
// ---------------------------------------------------------------------------

/// Relative edge of `model_prob` over `market_prob`, in percent.
///
/// Returns 0 when the market probability is zero or degenerate.
pub fn base_edge(model_prob: f64, market_prob: f64) -> f64 {
    if !market_prob.is_finite() || market_prob <= 0.0 || !model_prob.is_finite() {
        return 0.0;
    }
    (model_prob - market_prob) / market_prob * 100.0
}

/// Model-derived edge. Same formula as [`base_edge`], fed by the probability source.
pub fn model_edge(model_prob: f64, market_prob: f64) -> f64 {
    base_edge(model_prob, market_prob)
}

/// Action suggested by line movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementAction {
    LayerBet,
    Hold,
}

/// Line movement between opening and current odds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineMovement {
    /// Fractional change `(current - opening) / opening`.
    pub movement: f64,
    /// Heuristic score `|movement| * 50`; not a probability.
    pub edge_opportunity: f64,
    /// `min(10, hours_elapsed / 6)`.
    pub confidence: f64,
    pub recommendation: MovementAction,
}

impl LineMovement {
    fn zeroed() -> Self {
        Self {
            movement: 0.0,
            edge_opportunity: 0.0,
            confidence: 0.0,
            recommendation: MovementAction::Hold,
        }
    }
}

const MOVEMENT_SCALE: f64 = 50.0;
const LAYER_BET_MOVEMENT: f64 = 0.02;

pub fn line_movement(opening_odds: f64, current_odds: f64, hours_elapsed: f64) -> LineMovement {
    if !opening_odds.is_finite() || opening_odds <= 0.0 || !current_odds.is_finite() {
        return LineMovement::zeroed();
    }

    let movement = (current_odds - opening_odds) / opening_odds;
    let hours = if hours_elapsed.is_finite() { hours_elapsed.max(0.0) } else { 0.0 };

    LineMovement {
        movement,
        edge_opportunity: movement.abs() * MOVEMENT_SCALE,
        confidence: (hours / 6.0).min(10.0),
        recommendation: if movement > LAYER_BET_MOVEMENT {
            MovementAction::LayerBet
        } else {
            MovementAction::Hold
        },
    }
}

/// Smart-money detection result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmartMoneySignal {
    pub detected: bool,
    /// Absolute fractional odds movement over the recent window.
    pub movement: f64,
    /// Summed volume over the recent window.
    pub recent_volume: f64,
    pub confidence: u8,
    pub action: Option<SmartMoneyAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SmartMoneyAction {
    FollowSmartMoney,
}

impl SmartMoneySignal {
    fn not_detected(movement: f64, recent_volume: f64) -> Self {
        Self {
            detected: false,
            movement,
            recent_volume,
            confidence: 0,
            action: None,
        }
    }
}

const SMART_MONEY_WINDOW: usize = 3;
const SMART_MONEY_MOVEMENT: f64 = 0.05;
const SMART_MONEY_MAX_VOLUME: f64 = 100.0;
const SMART_MONEY_CONFIDENCE: u8 = 8;

/// Sharp odds movement on thin volume.
///
/// Looks at the last three observations (fewer if the history is shorter).
pub fn smart_money(odds_history: &[f64], volume_history: &[f64]) -> SmartMoneySignal {
    if odds_history.len() < 2 {
        return SmartMoneySignal::not_detected(0.0, 0.0);
    }

    let window = &odds_history[odds_history.len().saturating_sub(SMART_MONEY_WINDOW)..];
    let first = window[0];
    let last = window[window.len() - 1];
    let movement = if first.is_finite() && first > 0.0 && last.is_finite() {
        ((last - first) / first).abs()
    } else {
        0.0
    };

    let recent_volume: f64 = volume_history
        [volume_history.len().saturating_sub(SMART_MONEY_WINDOW)..]
        .iter()
        .filter(|v| v.is_finite())
        .sum();

    if movement > SMART_MONEY_MOVEMENT && recent_volume < SMART_MONEY_MAX_VOLUME {
        debug!(
            movement = format!("{:.1}%", movement * 100.0),
            recent_volume,
            "Smart money detected"
        );
        SmartMoneySignal {
            detected: true,
            movement,
            recent_volume,
            confidence: SMART_MONEY_CONFIDENCE,
            action: Some(SmartMoneyAction::FollowSmartMoney),
        }
    } else {
        SmartMoneySignal::not_detected(movement, recent_volume)
    }
}

// ---------------------------------------------------------------------------
// Confidence scoring
// ---------------------------------------------------------------------------

/// 0–3 points for agreement between the non-zero edge signals.
fn agreement_points(edges: &[f64]) -> u8 {
    let non_zero: Vec<f64> = edges.iter().copied().filter(|e| *e != 0.0).collect();
    if non_zero.is_empty() {
        return 0;
    }

    let n = non_zero.len() as f64;
    let mean = non_zero.iter().sum::<f64>() / n;
    let variance = non_zero.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    let agreement = 1.0 - (variance / 100.0).min(1.0);

    if agreement > 0.8 {
        3
    } else if agreement > 0.6 {
        2
    } else if agreement > 0.4 {
        1
    } else {
        0
    }
}

/// 0–3 points for how much history backs the estimate.
fn data_points_score(data_points: usize) -> u8 {
    match data_points {
        n if n > 20 => 3,
        n if n > 10 => 2,
        n if n > 5 => 1,
        _ => 0,
    }
}

/// 0–4 points for time left before the match.
fn time_to_match_points(hours_to_match: f64) -> u8 {
    if hours_to_match > 48.0 {
        4
    } else if hours_to_match > 24.0 {
        3
    } else if hours_to_match > 6.0 {
        2
    } else if hours_to_match > 1.0 {
        1
    } else {
        0
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Raw signal inputs to the composite score.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeSignals {
    pub base_edge: f64,
    pub arbitrage_edge: f64,
    pub movement_edge: f64,
    pub model_edge: f64,
    pub data_points: usize,
    pub hours_to_match: f64,
}

/// Fixed-weight fusion of edge signals.
#[derive(Debug, Clone)]
pub struct CompositeEdgeAggregator {
    weights: EdgeWeights,
}

impl Default for CompositeEdgeAggregator {
    fn default() -> Self {
        Self::new(EdgeWeights::default())
    }
}

impl CompositeEdgeAggregator {
    pub fn new(weights: EdgeWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &EdgeWeights {
        &self.weights
    }

    pub fn assess(&self, signals: &EdgeSignals) -> EdgeAssessment {
        let clean = |x: f64| if x.is_finite() { x } else { 0.0 };
        let base = clean(signals.base_edge);
        let arbitrage = clean(signals.arbitrage_edge);
        let movement = clean(signals.movement_edge);
        let model = clean(signals.model_edge);

        let composite = base * self.weights.base
            + arbitrage * self.weights.arbitrage
            + movement * self.weights.movement
            + model * self.weights.model;

        let confidence = agreement_points(&[base, arbitrage, movement, model])
            + data_points_score(signals.data_points)
            + time_to_match_points(signals.hours_to_match);

        EdgeAssessment {
            base_edge: base,
            arbitrage_edge: arbitrage,
            movement_edge: movement,
            model_edge: model,
            composite_edge: composite,
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
