//! Shared types for the SHARPLINE engine.
//!
//! These types form the data model used across all modules. Input records
//! (`MatchRecord`, `OddsQuote`) come from an upstream ingestion collaborator;
//! output records (`EdgeAssessment`, `StakeRecommendation`,
//! `ArbitrageOpportunity`) are flat and JSON-serialisable so a downstream
//! notification or storage collaborator can consume them as-is.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Neutral probability used whenever no estimate is available.
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Match input
// ---------------------------------------------------------------------------

/// A single priced selection on an upcoming match.
///
/// `current_odds` and `opening_odds` price the outcome named by `selection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub sport: String,
    #[serde(default)]
    pub market_type: MarketType,
    /// Outcome label priced by `current_odds` ("home", "away", "over", ...).
    #[serde(default = "default_selection")]
    pub selection: String,
    pub start_time: DateTime<Utc>,
    pub opening_odds: f64,
    pub current_odds: f64,
    /// Upstream (manual or model) win probability for the selection.
    #[serde(default)]
    pub model_probability: Option<f64>,
    /// Market-implied probability for the selection.
    pub market_probability: f64,
    pub hours_to_match: f64,
    /// Feature vector for a learned probability source.
    #[serde(default)]
    pub features: Option<Vec<f64>>,
}

fn default_selection() -> String {
    "home".to_string()
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} vs {} ({} {} @ {:.2} | market {:.1}% | {:.0}h to go)",
            self.sport,
            self.home_team,
            self.away_team,
            self.market_type,
            self.selection,
            self.current_odds,
            self.market_probability * 100.0,
            self.hours_to_match,
        )
    }
}

impl MatchRecord {
    /// Upstream probability, falling back to neutral when absent.
    pub fn base_probability(&self) -> f64 {
        self.model_probability.unwrap_or(NEUTRAL_PROBABILITY)
    }

    /// Helper to build a test/sample record with sensible defaults.
    #[cfg(test)]
    pub fn sample() -> Self {
        MatchRecord {
            id: "match-001".to_string(),
            home_team: "Arsenal".to_string(),
            away_team: "Chelsea".to_string(),
            sport: "soccer".to_string(),
            market_type: MarketType::Moneyline,
            selection: "home".to_string(),
            start_time: "2026-03-01T15:00:00Z".parse().unwrap(),
            opening_odds: 2.0,
            current_odds: 2.0,
            model_probability: Some(0.55),
            market_probability: 0.50,
            hours_to_match: 30.0,
            features: None,
        }
    }
}

/// Optional per-match signal inputs supplied alongside a `MatchRecord`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketContext {
    /// Chronological odds observations for the selection.
    #[serde(default)]
    pub odds_history: Vec<f64>,
    /// Matched volume per observation.
    #[serde(default)]
    pub volume_history: Vec<f64>,
    /// Cross-bookmaker quotes for this match.
    #[serde(default)]
    pub quotes: Vec<OddsQuote>,
    /// Number of historical data points behind the probability estimate.
    #[serde(default)]
    pub data_points: usize,
    /// Hours the line has been tracked since opening.
    #[serde(default)]
    pub hours_tracked: f64,
    /// Caller-supplied historical variance estimate in [0, 1].
    #[serde(default)]
    pub historical_variance: Option<f64>,
}

/// A bookmaker's price on one outcome of one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsQuote {
    pub match_id: String,
    pub bookmaker: String,
    #[serde(default)]
    pub market_type: MarketType,
    pub outcome: String,
    /// Decimal odds; only prices strictly above 1.0 are usable.
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl OddsQuote {
    /// Whether the price can take part in stake/edge math.
    pub fn is_usable(&self) -> bool {
        is_valid_odds(self.price)
    }
}

impl fmt::Display for OddsQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {:.2} ({})",
            self.bookmaker, self.market_type, self.outcome, self.price, self.match_id
        )
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Market type of a quote or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    #[default]
    Moneyline,
    Spread,
    Total,
    #[serde(other)]
    Other,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Moneyline => write!(f, "moneyline"),
            MarketType::Spread => write!(f, "spread"),
            MarketType::Total => write!(f, "total"),
            MarketType::Other => write!(f, "other"),
        }
    }
}

/// Parse a market type (case-insensitive). Unknown names map to `Other`.
impl std::str::FromStr for MarketType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "moneyline" | "h2h" | "match_winner" => Ok(MarketType::Moneyline),
            "spread" | "spreads" | "handicap" => Ok(MarketType::Spread),
            "total" | "totals" | "over_under" => Ok(MarketType::Total),
            "" => Err(anyhow::anyhow!("empty market type")),
            _ => Ok(MarketType::Other),
        }
    }
}

/// Overall call on an evaluated opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Play,
    Pass,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Play => write!(f, "PLAY"),
            Recommendation::Pass => write!(f, "PASS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Output records
// ---------------------------------------------------------------------------

/// Edge signals for one evaluation. All edges are percentages.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeAssessment {
    pub base_edge: f64,
    pub arbitrage_edge: f64,
    pub movement_edge: f64,
    pub model_edge: f64,
    pub composite_edge: f64,
    /// 0–10.
    pub confidence: u8,
}

impl fmt::Display for EdgeAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "composite {:.2}% (base {:.2}% | arb {:.2}% | move {:.2}% | model {:.2}%) conf {}/10",
            self.composite_edge,
            self.base_edge,
            self.arbitrage_edge,
            self.movement_edge,
            self.model_edge,
            self.confidence,
        )
    }
}

/// Recommended stake derived from an edge, odds, bankroll and risk state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StakeRecommendation {
    pub full_kelly_pct: f64,
    /// After fractional scaling and risk adjustments.
    pub fractional_kelly_pct: f64,
    /// Percent of bankroll, within `[min_stake_pct, max_stake_pct]` or zero.
    pub clamped_stake_pct: f64,
    pub stake_amount: f64,
    /// Total return (stake included) if the selection wins.
    pub potential_return: f64,
}

impl StakeRecommendation {
    pub fn is_zero(&self) -> bool {
        self.stake_amount <= 0.0
    }
}

/// A guaranteed-profit pair of opposing quotes from two bookmakers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub match_id: String,
    pub market_type: MarketType,
    pub book_a: String,
    pub odds_a: f64,
    pub selection_a: String,
    pub book_b: String,
    pub odds_b: f64,
    pub selection_b: String,
    pub implied_sum: f64,
    pub arbitrage_pct: f64,
    pub stake_a: f64,
    pub stake_b: f64,
    pub guaranteed_profit: f64,
}

impl fmt::Display for ArbitrageOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} {} @ {:.2} / {} {} @ {:.2} → {:.2}% (profit {:.2})",
            self.match_id,
            self.market_type,
            self.book_a,
            self.selection_a,
            self.odds_a,
            self.book_b,
            self.selection_b,
            self.odds_b,
            self.arbitrage_pct,
            self.guaranteed_profit,
        )
    }
}

// ---------------------------------------------------------------------------
// Numeric guards
// ---------------------------------------------------------------------------

/// Decimal odds usable in stake/edge math: finite and strictly above 1.0.
pub fn is_valid_odds(odds: f64) -> bool {
    odds.is_finite() && odds > 1.0
}

/// Probability in [0, 1].
pub fn is_valid_probability(p: f64) -> bool {
    p.is_finite() && (0.0..=1.0).contains(&p)
}

/// `1 / odds`, or 0 for degenerate prices.
pub fn implied_probability(odds: f64) -> f64 {
    if is_valid_odds(odds) {
        1.0 / odds
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

/// Decode JSON rows one by one, dropping rows that do not fit `T`.
///
/// Returns the decoded rows and the number dropped. A bad row never costs
/// the good ones around it.
pub fn decode_rows<T: DeserializeOwned>(
    rows: Vec<serde_json::Value>,
    kind: &str,
) -> (Vec<T>, usize) {
    let mut decoded = Vec::with_capacity(rows.len());
    let mut rejected = 0usize;
    for (index, row) in rows.into_iter().enumerate() {
        match serde_json::from_value::<T>(row) {
            Ok(value) => decoded.push(value),
            Err(err) => {
                warn!(kind, index, error = %err, "Skipping undecodable row");
                rejected += 1;
            }
        }
    }
    (decoded, rejected)
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SHARPLINE.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Edge weights must sum to 1.0, got {sum:.4}")]
    InvalidWeights { sum: f64 },

    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_type_from_str() {
        assert_eq!("h2h".parse::<MarketType>().unwrap(), MarketType::Moneyline);
        assert_eq!("Totals".parse::<MarketType>().unwrap(), MarketType::Total);
        assert_eq!("corners".parse::<MarketType>().unwrap(), MarketType::Other);
        assert!("".parse::<MarketType>().is_err());
    }

    #[test]
    fn test_market_type_unknown_deserializes_to_other() {
        let mt: MarketType = serde_json::from_str("\"asian_handicap\"").unwrap();
        assert_eq!(mt, MarketType::Other);
        let mt: MarketType = serde_json::from_str("\"spread\"").unwrap();
        assert_eq!(mt, MarketType::Spread);
    }

    #[test]
    fn test_match_record_defaults_from_json() {
        let json = r#"{
            "id": "m1",
            "home_team": "A",
            "away_team": "B",
            "sport": "tennis",
            "start_time": "2026-01-01T12:00:00Z",
            "opening_odds": 1.9,
            "current_odds": 1.8,
            "market_probability": 0.55,
            "hours_to_match": 12.0
        }"#;
        let record: MatchRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.selection, "home");
        assert_eq!(record.market_type, MarketType::Moneyline);
        assert!(record.model_probability.is_none());
        assert_eq!(record.base_probability(), NEUTRAL_PROBABILITY);
    }

    #[test]
    fn test_decode_rows_keeps_good_rows() {
        let rows: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
                {"match_id": "m1", "bookmaker": "BookA", "outcome": "home", "price": 2.1,
                 "timestamp": "2026-03-01T12:00:00Z"},
                {"match_id": "m1", "bookmaker": "BookB", "outcome": "away",
                 "timestamp": "2026-03-01T12:00:00Z"},
                {"match_id": "m1", "bookmaker": "BookC", "outcome": "away", "price": "2.0",
                 "timestamp": "2026-03-01T12:00:00Z"},
                {"match_id": "m1", "bookmaker": "BookD", "outcome": "away", "price": 2.05,
                 "timestamp": "2026-03-01T12:00:00Z"}
            ]"#,
        )
        .unwrap();
        let (quotes, rejected) = decode_rows::<OddsQuote>(rows, "quote");
        assert_eq!(rejected, 2);
        let books: Vec<_> = quotes.iter().map(|q| q.bookmaker.as_str()).collect();
        assert_eq!(books, vec!["BookA", "BookD"]);
    }

    #[test]
    fn test_implied_probability_guards() {
        assert!((implied_probability(2.0) - 0.5).abs() < 1e-12);
        assert_eq!(implied_probability(1.0), 0.0);
        assert_eq!(implied_probability(0.0), 0.0);
        assert_eq!(implied_probability(f64::NAN), 0.0);
    }

    #[test]
    fn test_valid_probability() {
        assert!(is_valid_probability(0.0));
        assert!(is_valid_probability(1.0));
        assert!(!is_valid_probability(1.01));
        assert!(!is_valid_probability(f64::NAN));
    }

    #[test]
    fn test_output_records_serialize_flat() {
        let assessment = EdgeAssessment {
            base_edge: 10.0,
            composite_edge: 6.0,
            confidence: 7,
            ..Default::default()
        };
        let value = serde_json::to_value(assessment).unwrap();
        assert_eq!(value["base_edge"], 10.0);
        assert_eq!(value["confidence"], 7);

        let rec = Recommendation::Play;
        assert_eq!(serde_json::to_string(&rec).unwrap(), "\"PLAY\"");
    }

    #[test]
    fn test_match_record_display() {
        let record = MatchRecord::sample();
        let s = format!("{record}");
        assert!(s.contains("Arsenal vs Chelsea"));
        assert!(s.contains("2.00"));
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::InvalidWeights { sum: 0.9 };
        assert_eq!(err.to_string(), "Edge weights must sum to 1.0, got 0.9000");
    }
}
