//! Season simulation harness.
//!
//! Replays a generated season of settled matches through the full
//! edge → stake → settle pipeline and checks replay determinism,
//! strategy ranking, arbitrage scanning and calibration.

use chrono::{DateTime, Duration, Utc};

use sharpline::arbitrage::ArbitrageScanner;
use sharpline::backtest::{
    compare_strategies, Backtester, Calibrator, HistoricalMatch, RankBy, StrategyFilter,
};
use sharpline::strategy::kelly::{KellyCalculator, RiskState};
use sharpline::strategy::risk::AlertPolicy;
use sharpline::strategy::{EdgeEngine, EngineConfig};
use sharpline::types::{decode_rows, MarketContext, MarketType, MatchRecord, OddsQuote};

fn season_start() -> DateTime<Utc> {
    "2026-08-01T14:00:00Z".parse().unwrap()
}

/// Deterministic pseudo-season: prices cycle 1.8–2.6, estimates sit a few
/// points either side of the market, about 55% of selections win.
fn generate_season(n: usize) -> Vec<HistoricalMatch> {
    (0..n)
        .map(|i| {
            let odds = 1.8 + (i % 5) as f64 * 0.2;
            let market = 1.0 / odds;
            let tilt = ((i * 7) % 11) as f64 / 100.0 - 0.03;
            HistoricalMatch {
                record: MatchRecord {
                    id: format!("epl-{i:03}"),
                    home_team: format!("Home {i}"),
                    away_team: format!("Away {i}"),
                    sport: if i % 2 == 0 { "soccer" } else { "tennis" }.to_string(),
                    market_type: MarketType::Moneyline,
                    selection: "home".to_string(),
                    start_time: season_start() + Duration::hours(6 * i as i64),
                    opening_odds: odds + 0.05,
                    current_odds: odds,
                    model_probability: Some((market + tilt).clamp(0.05, 0.95)),
                    market_probability: market,
                    hours_to_match: 12.0 + (i % 4) as f64 * 12.0,
                    features: None,
                },
                context: MarketContext {
                    data_points: i % 25,
                    hours_tracked: 24.0,
                    ..Default::default()
                },
                won: Some((i * 13) % 20 < 11),
            }
        })
        .collect()
}

fn backtester() -> Backtester {
    Backtester::new(EdgeEngine::new(EngineConfig::default()), 252.0)
}

#[test]
fn test_json_history_replay() {
    let json = r#"[
        {"id": "m1", "home_team": "Arsenal", "away_team": "Chelsea", "sport": "soccer",
         "start_time": "2026-03-01T15:00:00Z", "opening_odds": 2.1, "current_odds": 2.0,
         "model_probability": 0.6, "market_probability": 0.5, "hours_to_match": 30.0,
         "won": true, "context": {"data_points": 12}},
        {"id": "m2", "home_team": "Leeds", "away_team": "Spurs", "sport": "soccer",
         "start_time": "2026-03-02T15:00:00Z", "opening_odds": 2.5, "current_odds": 1.0,
         "market_probability": 0.5, "hours_to_match": 30.0, "won": false},
        {"id": "m3", "home_team": "Lakers", "away_team": "Suns", "sport": "basketball",
         "market_type": "moneyline", "start_time": "2026-03-03T02:00:00Z",
         "opening_odds": 2.4, "current_odds": 2.5, "model_probability": 0.5,
         "market_probability": 0.4, "hours_to_match": 8.0, "won": false}
    ]"#;
    let history: Vec<HistoricalMatch> = serde_json::from_str(json).unwrap();
    assert_eq!(history[0].record.selection, "home");
    assert_eq!(history[0].context.data_points, 12);
    assert!(history[1].record.model_probability.is_none());

    let run = backtester().run(
        &history,
        &StrategyFilter::default(),
        1000.0,
        &AlertPolicy::default(),
    );
    assert_eq!(run.rejected_rows, 1);
    assert_eq!(run.metrics.total_bets, 2);
    assert_eq!(run.metrics.wins, 1);
    assert_eq!(run.trades[0].match_id, "m1");
    assert_eq!(run.trades[1].match_id, "m3");

    let serialized = serde_json::to_value(&run).unwrap();
    assert_eq!(serialized["strategy"], "default");
    assert!(serialized["metrics"]["sharpe_ratio"].is_number());
}

#[test]
fn test_undecodable_history_row_skipped() {
    let json = r#"[
        {"id": "m1", "home_team": "Arsenal", "away_team": "Chelsea", "sport": "soccer",
         "start_time": "2026-03-01T15:00:00Z", "opening_odds": 2.1, "current_odds": 2.0,
         "model_probability": 0.6, "market_probability": 0.5, "hours_to_match": 30.0,
         "won": true},
        {"id": "m2", "home_team": "Leeds", "away_team": "Spurs", "sport": "soccer",
         "start_time": "2026-03-02T15:00:00Z", "opening_odds": 2.5,
         "market_probability": 0.5, "hours_to_match": 30.0, "won": false},
        {"id": "m3", "home_team": "Lakers", "away_team": "Suns", "sport": "basketball",
         "start_time": "2026-03-03T02:00:00Z", "opening_odds": 2.4, "current_odds": 2.5,
         "model_probability": 0.5, "market_probability": 0.4, "hours_to_match": 8.0}
    ]"#;
    // Strict decoding of the whole array fails on the row missing current_odds.
    assert!(serde_json::from_str::<Vec<HistoricalMatch>>(json).is_err());

    let rows: Vec<serde_json::Value> = serde_json::from_str(json).unwrap();
    let (history, rejected) = decode_rows::<HistoricalMatch>(rows, "match");
    assert_eq!(rejected, 1);
    let ids: Vec<_> = history.iter().map(|m| m.record.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m3"]);
    assert!(history[1].won.is_none());
}

#[test]
fn test_replay_is_deterministic() {
    let season = generate_season(120);
    let bt = backtester();
    let policy = AlertPolicy::default();

    let first = bt.run(&season, &StrategyFilter::default(), 1000.0, &policy);
    let second = bt.run(&season, &StrategyFilter::default(), 1000.0, &policy);
    assert!(first.metrics.total_bets > 0);
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first.trades, second.trades);

    // Input order does not matter, replay is chronological.
    let mut reversed = season.clone();
    reversed.reverse();
    let third = bt.run(&reversed, &StrategyFilter::default(), 1000.0, &policy);
    assert_eq!(first.trades, third.trades);
}

#[test]
fn test_stakes_stay_within_bounds() {
    let season = generate_season(120);
    let run = backtester().run(
        &season,
        &StrategyFilter::default(),
        1000.0,
        &AlertPolicy::default(),
    );
    for trade in &run.trades {
        assert!(trade.stake_pct >= 0.5 && trade.stake_pct <= 5.0, "{}", trade.stake_pct);
        assert!(trade.composite_edge >= 3.0);
    }
    let last = run.trades.last().unwrap();
    assert_eq!(last.bankroll_after, run.metrics.final_bankroll);
}

#[test]
fn test_strategy_comparison_ranks_all_runs() {
    let season = generate_season(120);
    let strategies = vec![
        StrategyFilter { name: "loose".into(), min_edge: 1.0, ..StrategyFilter::default() },
        StrategyFilter {
            name: "strict".into(),
            min_edge: 8.0,
            min_confidence: 6,
            ..StrategyFilter::default()
        },
        StrategyFilter { name: "short_prices".into(), max_odds: 2.1, ..StrategyFilter::default() },
    ];

    let comparison = compare_strategies(
        &backtester(),
        &season,
        &strategies,
        1000.0,
        &AlertPolicy::default(),
        RankBy::Roi,
    );

    assert_eq!(comparison.runs.len(), 3);
    assert_eq!(comparison.rankings.len(), 3);
    let ranks: Vec<usize> = comparison.rankings.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    for pair in comparison.rankings.windows(2) {
        assert!(pair[0].metrics.total_roi_pct >= pair[1].metrics.total_roi_pct);
    }

    let trades = |name: &str| {
        comparison
            .runs
            .iter()
            .find(|r| r.strategy == name)
            .map(|r| r.metrics.total_bets)
            .unwrap()
    };
    assert!(trades("strict") <= trades("loose"));
}

#[test]
fn test_winning_streak_does_not_shrink_stake() {
    let kelly = KellyCalculator::default();
    let flat = kelly.recommend(40.0, 2.0, 1000.0, &RiskState::in_sequence(0.0, 0));
    let hot = kelly.recommend(40.0, 2.0, 1000.0, &RiskState::in_sequence(0.0, 3));
    assert!(hot.stake_amount >= flat.stake_amount);
    assert!(hot.fractional_kelly_pct > flat.fractional_kelly_pct);
}

#[test]
fn test_arbitrage_scan_over_quote_book() {
    let ts = season_start();
    let quote = |match_id: &str, book: &str, outcome: &str, price: f64| OddsQuote {
        match_id: match_id.to_string(),
        bookmaker: book.to_string(),
        market_type: MarketType::Moneyline,
        outcome: outcome.to_string(),
        price,
        timestamp: ts,
    };
    let quotes = vec![
        // 1/2.10 + 1/2.05 ≈ 0.964
        quote("m1", "BookA", "home", 2.10),
        quote("m1", "BookB", "away", 2.05),
        // 1/1.95 + 1/2.05 ≈ 1.0006
        quote("m2", "BookA", "home", 1.95),
        quote("m2", "BookB", "away", 2.05),
        quote("m3", "BookA", "home", 3.4),
        quote("m3", "BookB", "draw", 3.3),
        quote("m3", "BookC", "away", 2.3),
    ];

    let report = ArbitrageScanner::default().scan(&quotes);
    assert_eq!(report.markets_scanned, 3);
    assert_eq!(report.multi_outcome_markets, 1);
    assert_eq!(report.opportunities.len(), 1);

    let opp = &report.opportunities[0];
    assert_eq!(opp.match_id, "m1");
    assert!((opp.stake_a * opp.odds_a - 100.0).abs() < 1e-9);
    assert!((opp.stake_b * opp.odds_b - 100.0).abs() < 1e-9);
    assert!(opp.guaranteed_profit > 0.0);

    let alert = AlertPolicy::default().check_arbitrage(opp);
    assert!(alert.is_some());
}

#[test]
fn test_calibration_over_season() {
    let season = generate_season(120);
    let report = Calibrator::from_history(&season).report();
    assert_eq!(report.total_predictions, 120);
    assert!(report.overall_brier > 0.0 && report.overall_brier < 1.0);
    assert!(report.market_brier.is_some());
    assert_eq!(report.sport_brier.len(), 2);
    let binned: usize = report.calibration_curve.iter().map(|b| b.count).sum();
    assert_eq!(binned, 120);
}
