//! SHARPLINE — sports betting edge engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod arbitrage;
pub mod backtest;
pub mod config;
pub mod model;
pub mod strategy;
pub mod types;
