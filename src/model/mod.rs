//! Probability sources for model-derived edge.
//!
//! Defines the `ProbabilitySource` trait and provides a learned logistic
//! regression model and a fixed manual estimate. The edge engine only ever
//! consumes the scalar probability these return.

pub mod logistic;

use serde::Serialize;
use tracing::debug;

use crate::types::{is_valid_probability, NEUTRAL_PROBABILITY};

pub use logistic::LogisticModel;

/// Abstraction over win-probability estimators.
///
/// Implementors map a feature vector to a probability in [0, 1]. Returning
/// `None` signals that no estimate could be produced for these features.
#[cfg_attr(test, mockall::automock)]
pub trait ProbabilitySource: Send + Sync {
    /// Estimate the selection's win probability.
    fn predict(&self, features: &[f64]) -> Option<f64>;

    /// Source identifier for logging.
    fn name(&self) -> &str;
}

/// A manual estimate that ignores features.
#[derive(Debug, Clone)]
pub struct FixedProbability {
    probability: f64,
}

impl FixedProbability {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl ProbabilitySource for FixedProbability {
    fn predict(&self, _features: &[f64]) -> Option<f64> {
        Some(self.probability)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Probability handed to the edge calculators, with provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbabilityEstimate {
    pub probability: f64,
    /// True when no source or no usable prediction was available.
    pub fallback: bool,
}

impl ProbabilityEstimate {
    pub fn neutral() -> Self {
        Self {
            probability: NEUTRAL_PROBABILITY,
            fallback: true,
        }
    }
}

/// Ask `source` for a probability, falling back to neutral 0.5.
///
/// Missing source, missing features, `None` predictions and out-of-range
/// outputs all resolve to the neutral fallback.
pub fn resolve_probability(
    source: Option<&dyn ProbabilitySource>,
    features: Option<&[f64]>,
) -> ProbabilityEstimate {
    let (Some(source), Some(features)) = (source, features) else {
        return ProbabilityEstimate::neutral();
    };

    match source.predict(features) {
        Some(p) if is_valid_probability(p) => ProbabilityEstimate {
            probability: p,
            fallback: false,
        },
        other => {
            debug!(
                source = source.name(),
                prediction = ?other,
                "Probability source gave no usable estimate, using neutral"
            );
            ProbabilityEstimate::neutral()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
