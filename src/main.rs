//! SHARPLINE — sports betting edge engine
//!
//! Entry point. Loads configuration, initialises structured logging, reads a
//! JSON history file, replays every configured strategy, scans the quotes for
//! arbitrage and prints the combined report as JSON on stdout.
//!
//! Usage: `sharpline <history.json> [--config config.toml] [--rank-by roi|sharpe|drawdown]`

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use sharpline::arbitrage::{ArbitrageScanner, ScanReport};
use sharpline::backtest::{
    compare_strategies, Backtester, CalibrationReport, Calibrator, HistoricalMatch, RankBy,
    StrategyRanking,
};
use sharpline::config::AppConfig;
use sharpline::strategy::kelly::RiskState;
use sharpline::strategy::risk::Alert;
use sharpline::strategy::{EdgeEngine, Evaluation};
use sharpline::types::{decode_rows, OddsQuote};

/// Input file: settled matches for replay plus any upcoming ones, and quotes.
///
/// Rows stay raw here and are decoded one at a time so a single bad row is
/// skipped rather than failing the whole file.
#[derive(Debug, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    matches: Vec<serde_json::Value>,
    #[serde(default)]
    quotes: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct Report {
    rank_by: RankBy,
    rankings: Vec<StrategyRanking>,
    plays: Vec<Evaluation>,
    arbitrage: ScanReport,
    calibration: CalibrationReport,
    alerts: Vec<Alert>,
    /// Match rows dropped because they did not decode.
    parse_rejected: usize,
    /// Quote rows dropped because they did not decode.
    quotes_rejected: usize,
}

/// Sports betting edge engine: backtest, live plays and arbitrage scan.
#[derive(Debug, Parser)]
#[command(name = "sharpline", version)]
struct Args {
    /// JSON history file with `matches` and `quotes`.
    history: PathBuf,

    /// Path to the TOML config.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Primary key for the strategy ranking.
    #[arg(long, value_enum, default_value_t)]
    rank_by: RankBy,
}

fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args = Args::parse();
    let cfg = AppConfig::load(&args.config)?;

    init_logging();

    let contents = fs::read_to_string(&args.history)
        .with_context(|| format!("Failed to read history file: {}", args.history.display()))?;
    let history: HistoryFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse history file: {}", args.history.display()))?;

    let (matches, parse_rejected) = decode_rows::<HistoricalMatch>(history.matches, "match");
    let (quotes, quotes_rejected) = decode_rows::<OddsQuote>(history.quotes, "quote");
    if parse_rejected + quotes_rejected > 0 {
        warn!(
            matches = parse_rejected,
            quotes = quotes_rejected,
            "Dropped undecodable history rows"
        );
    }

    info!(
        matches = matches.len(),
        quotes = quotes.len(),
        strategies = cfg.backtest.strategies.len(),
        bankroll = cfg.backtest.starting_bankroll,
        "SHARPLINE starting up"
    );

    // -- Components --------------------------------------------------------

    let mut engine = EdgeEngine::new(cfg.engine.clone());
    match cfg.model.clone() {
        Some(model) => {
            info!(features = model.weights.len(), "Using logistic model for model edge");
            engine = engine.with_source(Box::new(model));
        }
        None => warn!("No model configured, model edge uses neutral probability"),
    }
    let backtester = Backtester::new(engine, cfg.backtest.annualization_constant);
    let scanner = ArbitrageScanner::new(cfg.arbitrage.clone());

    // -- Backtest ----------------------------------------------------------

    let (settled, upcoming): (Vec<HistoricalMatch>, Vec<HistoricalMatch>) =
        matches.into_iter().partition(|m| m.won.is_some());

    let comparison = compare_strategies(
        &backtester,
        &settled,
        &cfg.backtest.strategies,
        cfg.backtest.starting_bankroll,
        &cfg.alerts,
        args.rank_by,
    );
    let mut alerts: Vec<Alert> = comparison
        .runs
        .iter()
        .flat_map(|run| run.alerts.iter().cloned())
        .collect();

    // -- Live evaluation ---------------------------------------------------

    let items: Vec<_> = upcoming
        .into_iter()
        .map(|m| (m.record, m.context))
        .collect();
    let evaluations = backtester.engine().evaluate_batch(
        &items,
        cfg.backtest.starting_bankroll,
        &RiskState::default(),
        &cfg.alerts,
    );
    let plays: Vec<Evaluation> = EdgeEngine::rank_plays(&evaluations)
        .into_iter()
        .cloned()
        .collect();
    alerts.extend(evaluations.iter().flat_map(|e| e.alerts.iter().cloned()));

    // -- Arbitrage ---------------------------------------------------------

    let arbitrage = scanner.scan(&quotes);
    alerts.extend(
        arbitrage
            .opportunities
            .iter()
            .filter_map(|opp| cfg.alerts.check_arbitrage(opp)),
    );

    let calibrator = Calibrator::from_history(&settled);
    info!("{}", calibrator.summary());
    let calibration = calibrator.report();

    for alert in &alerts {
        warn!(%alert, "Alert");
    }

    let report = Report {
        rank_by: comparison.rank_by,
        rankings: comparison.rankings,
        plays,
        arbitrage,
        calibration,
        alerts,
        parse_rejected,
        quotes_rejected,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Initialise tracing subscriber with env filter and optional JSON output.
///
/// Logs go to stderr so stdout carries only the JSON report.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sharpline=info"));

    let json_logging = std::env::var("SHARPLINE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
