//! Cross-bookmaker arbitrage scanner.
//!
//! Collects the best price per outcome across bookmakers for each match and
//! market, flags two-outcome markets whose best opposing prices from two
//! different books imply less than `1 - margin_threshold`, and sizes the
//! equal-payout stake split. Per-outcome odds spread is exposed as a
//! standalone mispricing signal and reported for every market, including
//! those with more than two outcomes.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::types::{ArbitrageOpportunity, EngineError, MarketType, OddsQuote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbitrageConfig {
    /// Minimum guaranteed margin (fraction) before an opportunity is flagged.
    pub margin_threshold: f64,
    /// Payout each leg is sized to return.
    pub payout_target: f64,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            margin_threshold: 0.01,
            payout_target: 100.0,
        }
    }
}

impl ArbitrageConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(0.0..1.0).contains(&self.margin_threshold) {
            return Err(EngineError::Config(format!(
                "arbitrage margin_threshold must be in [0, 1), got {}",
                self.margin_threshold
            )));
        }
        if !(self.payout_target > 0.0) {
            return Err(EngineError::Config(format!(
                "arbitrage payout_target must be positive, got {}",
                self.payout_target
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Price helpers
// ---------------------------------------------------------------------------

/// Best available price for one outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestOdds {
    pub outcome: String,
    pub bookmaker: String,
    pub price: f64,
}

/// Equal-payout stakes for a two-leg arbitrage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StakeSplit {
    pub stake_a: f64,
    pub stake_b: f64,
    pub guaranteed_profit: f64,
}

/// Size both legs so each returns `total` if it wins.
///
/// `stake_a * odds_a == stake_b * odds_b == total`, and the profit is
/// whatever is left of `total` after both stakes.
pub fn stake_split(total: f64, odds_a: f64, odds_b: f64) -> StakeSplit {
    let stake_a = total / odds_a;
    let stake_b = total / odds_b;
    StakeSplit {
        stake_a,
        stake_b,
        guaranteed_profit: total - (stake_a + stake_b),
    }
}

/// Keep usable quotes only, one per (bookmaker, outcome), latest timestamp wins.
fn latest_usable<'a>(quotes: &[&'a OddsQuote]) -> Vec<&'a OddsQuote> {
    let mut latest: BTreeMap<(&str, &str), &OddsQuote> = BTreeMap::new();
    for quote in quotes.iter().copied().filter(|q| q.is_usable()) {
        let key = (quote.bookmaker.as_str(), quote.outcome.as_str());
        match latest.get(&key) {
            Some(existing) if existing.timestamp >= quote.timestamp => {}
            _ => {
                latest.insert(key, quote);
            }
        }
    }
    latest.into_values().collect()
}

/// Best price per outcome (argmax across bookmakers), ordered by outcome.
pub fn best_odds(quotes: &[&OddsQuote]) -> BTreeMap<String, BestOdds> {
    let mut best: BTreeMap<String, BestOdds> = BTreeMap::new();
    for quote in latest_usable(quotes) {
        let better = best
            .get(&quote.outcome)
            .map_or(true, |current| quote.price > current.price);
        if better {
            best.insert(
                quote.outcome.clone(),
                BestOdds {
                    outcome: quote.outcome.clone(),
                    bookmaker: quote.bookmaker.clone(),
                    price: quote.price,
                },
            );
        }
    }
    best
}

/// `(max - min) / min * 100` of one outcome's price across bookmakers.
///
/// Zero when fewer than two books quote the outcome.
pub fn odds_spread_pct(quotes: &[&OddsQuote], outcome: &str) -> f64 {
    let prices: Vec<f64> = latest_usable(quotes)
        .into_iter()
        .filter(|q| q.outcome == outcome)
        .map(|q| q.price)
        .collect();
    if prices.len() < 2 {
        return 0.0;
    }
    let max = prices.iter().copied().fold(f64::MIN, f64::max);
    let min = prices.iter().copied().fold(f64::MAX, f64::min);
    (max - min) / min * 100.0
}

/// Best prices and per-outcome spreads for one (match, market) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub match_id: String,
    pub market_type: MarketType,
    /// Best price per outcome.
    pub best: BTreeMap<String, BestOdds>,
    /// Odds spread percent per outcome.
    pub spreads: BTreeMap<String, f64>,
}

/// Summarise a group of quotes. Works for any number of outcomes.
pub fn summarize_market(
    match_id: &str,
    market_type: MarketType,
    quotes: &[&OddsQuote],
) -> MarketSummary {
    let usable = latest_usable(quotes);
    let best = best_odds(&usable);
    let spreads = best
        .keys()
        .map(|outcome| (outcome.clone(), odds_spread_pct(&usable, outcome)))
        .collect();
    MarketSummary {
        match_id: match_id.to_string(),
        market_type,
        best,
        spreads,
    }
}

/// Odds spread for one selection of one match, taken from a mixed quote list.
pub fn selection_spread_pct(
    quotes: &[OddsQuote],
    match_id: &str,
    market_type: MarketType,
    outcome: &str,
) -> f64 {
    let relevant: Vec<&OddsQuote> = quotes
        .iter()
        .filter(|q| q.match_id == match_id && q.market_type == market_type)
        .collect();
    odds_spread_pct(&relevant, outcome)
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Result of scanning a batch of quotes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub opportunities: Vec<ArbitrageOpportunity>,
    /// Best odds and spreads for every group, ordered like the scan.
    pub markets: Vec<MarketSummary>,
    /// (match, market) groups examined.
    pub markets_scanned: usize,
    /// Groups with more than two outcomes; spreads only, no arbitrage check.
    pub multi_outcome_markets: usize,
    /// Quotes dropped for unusable prices.
    pub skipped_quotes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ArbitrageScanner {
    config: ArbitrageConfig,
}

enum MarketVerdict {
    Opportunity(ArbitrageOpportunity),
    NoArbitrage,
    MultiOutcome,
}

impl ArbitrageScanner {
    pub fn new(config: ArbitrageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ArbitrageConfig {
        &self.config
    }

    /// Scan every (match, market) group in `quotes`.
    ///
    /// Groups are independent and checked in parallel; output order follows
    /// (match id, market type).
    pub fn scan(&self, quotes: &[OddsQuote]) -> ScanReport {
        let skipped_quotes = quotes.iter().filter(|q| !q.is_usable()).count();

        let mut groups: BTreeMap<(&str, MarketType), Vec<&OddsQuote>> = BTreeMap::new();
        for quote in quotes {
            groups
                .entry((quote.match_id.as_str(), quote.market_type))
                .or_default()
                .push(quote);
        }

        let results: Vec<(MarketSummary, MarketVerdict)> = groups
            .into_par_iter()
            .map(|((match_id, market_type), group)| {
                (
                    summarize_market(match_id, market_type, &group),
                    self.check_market(match_id, market_type, &group),
                )
            })
            .collect();

        let mut report = ScanReport {
            markets_scanned: results.len(),
            skipped_quotes,
            ..Default::default()
        };
        for (summary, verdict) in results {
            report.markets.push(summary);
            match verdict {
                MarketVerdict::Opportunity(opp) => report.opportunities.push(opp),
                MarketVerdict::MultiOutcome => report.multi_outcome_markets += 1,
                MarketVerdict::NoArbitrage => {}
            }
        }

        info!(
            markets = report.markets_scanned,
            opportunities = report.opportunities.len(),
            skipped_quotes = report.skipped_quotes,
            "Arbitrage scan complete"
        );
        report
    }

    /// Check one market's quotes for a two-outcome arbitrage.
    pub fn find_opportunity(
        &self,
        match_id: &str,
        market_type: MarketType,
        quotes: &[&OddsQuote],
    ) -> Option<ArbitrageOpportunity> {
        match self.check_market(match_id, market_type, quotes) {
            MarketVerdict::Opportunity(opp) => Some(opp),
            _ => None,
        }
    }

    fn check_market(
        &self,
        match_id: &str,
        market_type: MarketType,
        quotes: &[&OddsQuote],
    ) -> MarketVerdict {
        let usable = latest_usable(quotes);

        let mut by_outcome: BTreeMap<&str, Vec<&OddsQuote>> = BTreeMap::new();
        for quote in &usable {
            by_outcome.entry(quote.outcome.as_str()).or_default().push(quote);
        }

        if by_outcome.len() > 2 {
            debug!(
                match_id,
                market = %market_type,
                outcomes = by_outcome.len(),
                "Multi-outcome market, arbitrage check skipped"
            );
            return MarketVerdict::MultiOutcome;
        }
        let mut outcomes = by_outcome.into_values();
        let (Some(side_a), Some(side_b)) = (outcomes.next(), outcomes.next()) else {
            return MarketVerdict::NoArbitrage;
        };

        // Cheapest opposing pair whose legs sit with different bookmakers.
        let mut best_pair: Option<(&OddsQuote, &OddsQuote, f64)> = None;
        for a in &side_a {
            for b in &side_b {
                if a.bookmaker == b.bookmaker {
                    continue;
                }
                let implied_sum = 1.0 / a.price + 1.0 / b.price;
                if best_pair.map_or(true, |(_, _, best)| implied_sum < best) {
                    best_pair = Some((a, b, implied_sum));
                }
            }
        }
        let Some((a, b, implied_sum)) = best_pair else {
            return MarketVerdict::NoArbitrage;
        };

        if implied_sum >= 1.0 - self.config.margin_threshold {
            debug!(
                match_id,
                market = %market_type,
                implied_sum = format!("{:.4}", implied_sum),
                "No arbitrage"
            );
            return MarketVerdict::NoArbitrage;
        }

        let split = stake_split(self.config.payout_target, a.price, b.price);
        let opportunity = ArbitrageOpportunity {
            match_id: match_id.to_string(),
            market_type,
            book_a: a.bookmaker.clone(),
            odds_a: a.price,
            selection_a: a.outcome.clone(),
            book_b: b.bookmaker.clone(),
            odds_b: b.price,
            selection_b: b.outcome.clone(),
            implied_sum,
            arbitrage_pct: (1.0 - implied_sum) * 100.0,
            stake_a: split.stake_a,
            stake_b: split.stake_b,
            guaranteed_profit: split.guaranteed_profit,
        };

        info!(
            match_id,
            market = %market_type,
            arbitrage = format!("{:.2}%", opportunity.arbitrage_pct),
            book_a = %opportunity.book_a,
            book_b = %opportunity.book_b,
            "Arbitrage detected"
        );
        MarketVerdict::Opportunity(opportunity)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
