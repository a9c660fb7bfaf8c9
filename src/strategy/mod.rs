//! Strategy engine: edge signals, composite scoring, Kelly sizing and alerts.

pub mod edge;
pub mod kelly;
pub mod risk;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::arbitrage::selection_spread_pct;
use crate::model::{resolve_probability, ProbabilityEstimate, ProbabilitySource};
use crate::types::{
    EdgeAssessment, EngineError, MarketContext, MatchRecord, Recommendation, StakeRecommendation,
};
use edge::{
    base_edge, line_movement, model_edge, smart_money, CompositeEdgeAggregator, EdgeSignals,
    EdgeWeights, LineMovement, SmartMoneySignal,
};
use kelly::{KellyCalculator, KellyConfig, RiskState};
use risk::{Alert, AlertPolicy};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Engine-wide sizing and scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub kelly: KellyConfig,
    /// Composite edge (percent) required for a `Play` recommendation.
    pub min_edge_threshold: f64,
    pub edge_weights: EdgeWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kelly: KellyConfig::default(),
            min_edge_threshold: 3.0,
            edge_weights: EdgeWeights::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.kelly.validate()?;
        self.edge_weights.validate()?;
        if !self.min_edge_threshold.is_finite() {
            return Err(EngineError::Config(
                "min_edge_threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Everything the engine concluded about one priced selection.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub match_id: String,
    /// Probability behind the base edge (upstream estimate or neutral).
    pub base_probability: f64,
    /// Probability source output behind the model edge.
    pub model_probability: ProbabilityEstimate,
    pub assessment: EdgeAssessment,
    pub stake: StakeRecommendation,
    pub line_movement: LineMovement,
    pub smart_money: SmartMoneySignal,
    pub recommendation: Recommendation,
    pub alerts: Vec<Alert>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Pipelines signals → composite edge → Kelly stake → recommendation.
///
/// Every method is a pure function of its arguments and the engine's
/// configuration, so one engine can be shared across threads.
pub struct EdgeEngine {
    aggregator: CompositeEdgeAggregator,
    kelly: KellyCalculator,
    min_edge_threshold: f64,
    source: Option<Box<dyn ProbabilitySource>>,
}

impl EdgeEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            aggregator: CompositeEdgeAggregator::new(config.edge_weights),
            kelly: KellyCalculator::new(config.kelly),
            min_edge_threshold: config.min_edge_threshold,
            source: None,
        }
    }

    /// Attach a probability source for the model edge.
    pub fn with_source(mut self, source: Box<dyn ProbabilitySource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn kelly(&self) -> &KellyCalculator {
        &self.kelly
    }

    pub fn min_edge_threshold(&self) -> f64 {
        self.min_edge_threshold
    }

    /// Compute the edge signals and composite assessment for one record.
    pub fn assess(
        &self,
        record: &MatchRecord,
        context: &MarketContext,
    ) -> (EdgeAssessment, ProbabilityEstimate, LineMovement) {
        let base_probability = record.base_probability();
        let model_probability =
            resolve_probability(self.source.as_deref(), record.features.as_deref());
        let movement =
            line_movement(record.opening_odds, record.current_odds, context.hours_tracked);

        let signals = EdgeSignals {
            base_edge: base_edge(base_probability, record.market_probability),
            arbitrage_edge: selection_spread_pct(
                &context.quotes,
                &record.id,
                record.market_type,
                &record.selection,
            ),
            movement_edge: movement.edge_opportunity,
            model_edge: model_edge(model_probability.probability, record.market_probability),
            data_points: context.data_points,
            hours_to_match: record.hours_to_match,
        };

        let assessment = self.aggregator.assess(&signals);
        debug!(
            match_id = %record.id,
            %assessment,
            model_fallback = model_probability.fallback,
            "Edge assessed"
        );
        (assessment, model_probability, movement)
    }

    /// Full evaluation of one record against a bankroll and risk state.
    pub fn evaluate(
        &self,
        record: &MatchRecord,
        context: &MarketContext,
        bankroll: f64,
        risk: &RiskState,
        policy: &AlertPolicy,
    ) -> Evaluation {
        let (assessment, model_probability, line_movement) = self.assess(record, context);

        let risk = RiskState {
            variance: risk.variance.or(context.historical_variance),
            ..*risk
        };
        let stake = self.kelly.recommend(
            assessment.composite_edge,
            record.current_odds,
            bankroll,
            &risk,
        );

        let recommendation =
            if assessment.composite_edge >= self.min_edge_threshold && !stake.is_zero() {
                Recommendation::Play
            } else {
                Recommendation::Pass
            };

        let alerts: Vec<Alert> = policy.check_edge(&record.id, &assessment).into_iter().collect();

        Evaluation {
            match_id: record.id.clone(),
            base_probability: record.base_probability(),
            model_probability,
            assessment,
            stake,
            line_movement,
            smart_money: smart_money(&context.odds_history, &context.volume_history),
            recommendation,
            alerts,
        }
    }

    /// Evaluate many records in parallel. Output order matches input order.
    pub fn evaluate_batch(
        &self,
        items: &[(MatchRecord, MarketContext)],
        bankroll: f64,
        risk: &RiskState,
        policy: &AlertPolicy,
    ) -> Vec<Evaluation> {
        let evaluations: Vec<Evaluation> = items
            .par_iter()
            .map(|(record, context)| self.evaluate(record, context, bankroll, risk, policy))
            .collect();

        info!(
            evaluated = evaluations.len(),
            plays = evaluations
                .iter()
                .filter(|e| e.recommendation == Recommendation::Play)
                .count(),
            "Batch evaluation complete"
        );
        evaluations
    }

    /// `Play` evaluations ranked by composite edge × confidence, best first.
    pub fn rank_plays(evaluations: &[Evaluation]) -> Vec<&Evaluation> {
        let mut plays: Vec<&Evaluation> = evaluations
            .iter()
            .filter(|e| e.recommendation == Recommendation::Play)
            .collect();
        let score =
            |e: &Evaluation| e.assessment.composite_edge * f64::from(e.assessment.confidence);
        plays.sort_by(|a, b| score(b).total_cmp(&score(a)));
        plays
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FixedProbability;
    use crate::types::{MarketType, OddsQuote};

    fn make_engine() -> EdgeEngine {
        EdgeEngine::new(EngineConfig::default())
    }

    fn make_record(id: &str, model_prob: f64, odds: f64) -> MatchRecord {
        MatchRecord {
            id: id.to_string(),
            model_probability: Some(model_prob),
            market_probability: 1.0 / odds,
            opening_odds: odds,
            current_odds: odds,
            ..MatchRecord::sample()
        }
    }

    #[test]
    fn test_example_evaluation() {
        let engine = make_engine();
        let record = make_record("m1", 0.55, 2.0);
        let eval = engine.evaluate(
            &record,
            &MarketContext::default(),
            1000.0,
            &RiskState::default(),
            &AlertPolicy::default(),
        );
        assert!((eval.assessment.base_edge - 10.0).abs() < 1e-9);
        // No source: model edge priced off neutral 0.5 = market → 0
        assert!(eval.model_probability.fallback);
        assert_eq!(eval.assessment.model_edge, 0.0);
        assert!((eval.assessment.composite_edge - 6.0).abs() < 1e-9);
        assert!(eval.stake.clamped_stake_pct >= 0.5 && eval.stake.clamped_stake_pct <= 5.0);
        assert_eq!(eval.recommendation, Recommendation::Play);
    }

    #[test]
    fn test_negative_edge_passes() {
        let engine = make_engine();
        let record = make_record("m1", 0.40, 2.0);
        let eval = engine.evaluate(
            &record,
            &MarketContext::default(),
            1000.0,
            &RiskState::default(),
            &AlertPolicy::default(),
        );
        assert!(eval.assessment.composite_edge < 0.0);
        assert!(eval.stake.is_zero());
        assert_eq!(eval.recommendation, Recommendation::Pass);
    }

    #[test]
    fn test_missing_model_probability_uses_neutral() {
        let engine = make_engine();
        let mut record = make_record("m1", 0.0, 2.5);
        record.model_probability = None;
        let (assessment, _, _) = engine.assess(&record, &MarketContext::default());
        // 0.5 vs 0.4 → +25%
        assert!((assessment.base_edge - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_probability_source_feeds_model_edge() {
        let engine = make_engine().with_source(Box::new(FixedProbability::new(0.6)));
        let mut record = make_record("m1", 0.5, 2.0);
        record.features = Some(vec![1.0]);
        let (assessment, estimate, _) = engine.assess(&record, &MarketContext::default());
        assert!(!estimate.fallback);
        assert!((assessment.model_edge - 20.0).abs() < 1e-9);
        assert_eq!(assessment.base_edge, 0.0);
    }

    #[test]
    fn test_quotes_feed_arbitrage_edge() {
        let engine = make_engine();
        let record = make_record("m1", 0.5, 2.0);
        let quote = |book: &str, price: f64| OddsQuote {
            match_id: "m1".to_string(),
            bookmaker: book.to_string(),
            market_type: MarketType::Moneyline,
            outcome: "home".to_string(),
            price,
            timestamp: record.start_time,
        };
        let context = MarketContext {
            quotes: vec![quote("A", 2.0), quote("B", 2.2)],
            ..Default::default()
        };
        let (assessment, _, _) = engine.assess(&record, &context);
        assert!((assessment.arbitrage_edge - 10.0).abs() < 1e-9);
        assert!((assessment.composite_edge - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_context_variance_reduces_fractional_kelly() {
        let engine = make_engine();
        let record = make_record("m1", 0.70, 2.0);
        let risk = RiskState::default();
        let policy = AlertPolicy::default();
        let plain = engine.evaluate(&record, &MarketContext::default(), 1000.0, &risk, &policy);
        let context = MarketContext {
            historical_variance: Some(1.0),
            ..Default::default()
        };
        let damped = engine.evaluate(&record, &context, 1000.0, &risk, &policy);
        let ratio = damped.stake.fractional_kelly_pct / plain.stake.fractional_kelly_pct;
        assert!((ratio - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_high_edge_alert_raised() {
        let engine = make_engine();
        let mut record = make_record("m1", 0.80, 2.0);
        record.hours_to_match = 72.0;
        let context = MarketContext {
            data_points: 30,
            ..Default::default()
        };
        let eval = engine.evaluate(
            &record,
            &context,
            1000.0,
            &RiskState::default(),
            &AlertPolicy::default(),
        );
        assert!(eval.alerts.iter().any(|a| matches!(a, Alert::HighEdge { .. })));
    }

    #[test]
    fn test_batch_preserves_order_and_ranks() {
        let engine = make_engine();
        let items: Vec<_> = [("weak", 0.53), ("strong", 0.70), ("none", 0.45)]
            .iter()
            .map(|(id, p)| (make_record(id, *p, 2.0), MarketContext::default()))
            .collect();
        let evals =
            engine.evaluate_batch(&items, 1000.0, &RiskState::default(), &AlertPolicy::default());
        let ids: Vec<_> = evals.iter().map(|e| e.match_id.as_str()).collect();
        assert_eq!(ids, vec!["weak", "strong", "none"]);

        let ranked = EdgeEngine::rank_plays(&evals);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].match_id, "strong");
    }

    #[test]
    fn test_engine_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        let bad = EngineConfig {
            edge_weights: EdgeWeights { base: 0.5, ..EdgeWeights::default() },
            ..EngineConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
