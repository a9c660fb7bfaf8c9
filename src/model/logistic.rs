//! Logistic regression probability source.
//!
//! Coefficients are fitted offline and supplied through configuration;
//! this module only scores feature vectors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ProbabilitySource;

/// A fitted logistic regression: `p = σ(intercept + Σ wᵢ·xᵢ)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub weights: Vec<f64>,
    /// Optional per-feature (mean, std) standardisation applied before scoring.
    #[serde(default)]
    pub scaling: Option<Vec<(f64, f64)>>,
}

impl LogisticModel {
    pub fn new(intercept: f64, weights: Vec<f64>) -> Self {
        Self {
            intercept,
            weights,
            scaling: None,
        }
    }

    pub fn with_scaling(mut self, scaling: Vec<(f64, f64)>) -> Self {
        self.scaling = Some(scaling);
        self
    }

    fn standardise(&self, index: usize, x: f64) -> f64 {
        match self.scaling.as_ref().and_then(|s| s.get(index)) {
            Some(&(mean, std)) if std > 0.0 => (x - mean) / std,
            _ => x,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ProbabilitySource for LogisticModel {
    fn predict(&self, features: &[f64]) -> Option<f64> {
        if features.len() != self.weights.len() {
            debug!(
                expected = self.weights.len(),
                got = features.len(),
                "Feature vector length mismatch"
            );
            return None;
        }
        if features.iter().any(|x| !x.is_finite()) {
            return None;
        }

        let z = self.intercept
            + features
                .iter()
                .enumerate()
                .map(|(i, &x)| self.weights[i] * self.standardise(i, x))
                .sum::<f64>();

        let p = sigmoid(z);
        p.is_finite().then_some(p)
    }

    fn name(&self) -> &str {
        "logistic"
    }
}
