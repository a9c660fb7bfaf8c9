//! Mock probability source for integration testing.
//!
//! A `mockall` double of `ProbabilitySource` so the model-edge path can be
//! exercised with controlled predictions and call expectations.

use mockall::mock;

use sharpline::model::ProbabilitySource;
use sharpline::strategy::kelly::RiskState;
use sharpline::strategy::risk::AlertPolicy;
use sharpline::strategy::{EdgeEngine, EngineConfig};
use sharpline::types::{MarketContext, MarketType, MatchRecord, Recommendation};

mock! {
    pub Source {}

    impl ProbabilitySource for Source {
        fn predict(&self, features: &[f64]) -> Option<f64>;
        fn name(&self) -> &str;
    }
}

fn make_record(features: Option<Vec<f64>>) -> MatchRecord {
    MatchRecord {
        id: "nba-001".to_string(),
        home_team: "Celtics".to_string(),
        away_team: "Knicks".to_string(),
        sport: "basketball".to_string(),
        market_type: MarketType::Moneyline,
        selection: "home".to_string(),
        start_time: "2026-02-10T00:30:00Z".parse().unwrap(),
        opening_odds: 2.0,
        current_odds: 2.0,
        model_probability: Some(0.5),
        market_probability: 0.5,
        hours_to_match: 30.0,
        features,
    }
}

#[test]
fn test_source_prediction_drives_model_edge() {
    let mut source = MockSource::new();
    source
        .expect_predict()
        .withf(|features| features.to_vec() == vec![1.5, -0.2])
        .times(1)
        .return_const(Some(0.65));
    source.expect_name().return_const("mock".to_string());

    let engine = EdgeEngine::new(EngineConfig::default()).with_source(Box::new(source));
    let (assessment, estimate, _) =
        engine.assess(&make_record(Some(vec![1.5, -0.2])), &MarketContext::default());

    assert!(!estimate.fallback);
    assert_eq!(estimate.probability, 0.65);
    // (0.65 / 0.50 - 1) * 100
    assert!((assessment.model_edge - 30.0).abs() < 1e-9);
    // Only the model edge is non-zero: 0.1 * 30
    assert!((assessment.composite_edge - 3.0).abs() < 1e-9);
}

#[test]
fn test_source_without_estimate_falls_back_to_neutral() {
    let mut source = MockSource::new();
    source.expect_predict().times(1).return_const(None::<f64>);
    source.expect_name().return_const("mock".to_string());

    let engine = EdgeEngine::new(EngineConfig::default()).with_source(Box::new(source));
    let (assessment, estimate, _) =
        engine.assess(&make_record(Some(vec![0.0])), &MarketContext::default());

    assert!(estimate.fallback);
    assert_eq!(estimate.probability, 0.5);
    assert_eq!(assessment.model_edge, 0.0);
}

#[test]
fn test_out_of_range_prediction_is_ignored() {
    let mut source = MockSource::new();
    source.expect_predict().return_const(Some(1.4));
    source.expect_name().return_const("mock".to_string());

    let engine = EdgeEngine::new(EngineConfig::default()).with_source(Box::new(source));
    let (_, estimate, _) = engine.assess(&make_record(Some(vec![2.0])), &MarketContext::default());
    assert!(estimate.fallback);
}

#[test]
fn test_source_not_called_without_features() {
    let mut source = MockSource::new();
    source.expect_predict().times(0);
    source.expect_name().return_const("mock".to_string());

    let engine = EdgeEngine::new(EngineConfig::default()).with_source(Box::new(source));
    let (_, estimate, _) = engine.assess(&make_record(None), &MarketContext::default());
    assert!(estimate.fallback);
}

#[test]
fn test_strong_model_signal_turns_pass_into_play() {
    let mut source = MockSource::new();
    source.expect_predict().return_const(Some(0.80));
    source.expect_name().return_const("mock".to_string());

    let record = make_record(Some(vec![1.0]));
    let baseline = EdgeEngine::new(EngineConfig::default()).evaluate(
        &record,
        &MarketContext::default(),
        1000.0,
        &RiskState::default(),
        &AlertPolicy::default(),
    );
    assert_eq!(baseline.recommendation, Recommendation::Pass);

    let engine = EdgeEngine::new(EngineConfig::default()).with_source(Box::new(source));
    let eval = engine.evaluate(
        &record,
        &MarketContext::default(),
        1000.0,
        &RiskState::default(),
        &AlertPolicy::default(),
    );
    // 0.1 * 60% model edge
    assert!((eval.assessment.composite_edge - 6.0).abs() < 1e-9);
    assert_eq!(eval.recommendation, Recommendation::Play);
    assert!(eval.stake.stake_amount > 0.0);
}
