//! Integration test harness.
//!
//! Drives the public engine API end to end: JSON history replay, strategy
//! comparison, arbitrage scanning and a mocked probability source.

mod mock_source;
mod simulation;
