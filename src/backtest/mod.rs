//! Backtesting: historical replay, performance metrics, strategy comparison
//! and probability calibration.

pub mod calibration;
pub mod compare;
pub mod metrics;
pub mod runner;

pub use calibration::{CalibrationReport, Calibrator};
pub use compare::{compare_strategies, rank_runs, Comparison, RankBy, StrategyRanking};
pub use metrics::BacktestMetrics;
pub use runner::{BacktestConfig, BacktestRun, Backtester, HistoricalMatch, StrategyFilter, Trade};
