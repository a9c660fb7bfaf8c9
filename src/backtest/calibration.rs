//! Calibration module.
//!
//! Measures how well the probabilities behind our edges match reality.
//! Computes calibration curves, Brier scores per sport, a market baseline
//! Brier for comparison, and a diagnosis.

use std::collections::BTreeMap;

use serde::Serialize;

use super::metrics::brier_score;
use super::runner::HistoricalMatch;

// ---------------------------------------------------------------------------
// Calibration data
// ---------------------------------------------------------------------------

/// A single prediction–outcome pair for calibration tracking.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationPoint {
    pub match_id: String,
    pub sport: String,
    pub predicted_probability: f64,
    /// Market-implied probability of the same selection, when known.
    pub market_probability: Option<f64>,
    pub won: bool,
}

/// Calibration analysis results.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    pub total_predictions: usize,
    pub overall_brier: f64,
    /// Brier score of the market-implied probabilities over the same points.
    pub market_brier: Option<f64>,
    pub sport_brier: BTreeMap<String, f64>,
    /// For each 10% bin, the predicted vs actual rate.
    pub calibration_curve: Vec<CalibrationBucket>,
    pub diagnosis: CalibrationDiagnosis,
}

/// A bucket in the calibration curve (e.g., all predictions between 0.60-0.70).
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationBucket {
    pub bin_start: f64,
    pub bin_end: f64,
    pub mean_predicted: f64,
    pub actual_rate: f64,
    pub count: usize,
    /// |mean_predicted - actual_rate|
    pub deviation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationDiagnosis {
    WellCalibrated,
    OverConfident,    // Predicted probabilities too extreme
    UnderConfident,   // Predicted probabilities too central
    InsufficientData,
}

// ---------------------------------------------------------------------------
// Calibrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Calibrator {
    points: Vec<CalibrationPoint>,
    num_bins: usize,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Calibrator {
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            num_bins: 10,
        }
    }

    /// Build from settled history, using each row's base probability.
    ///
    /// Rows without an outcome or with an out-of-range probability are ignored.
    pub fn from_history(history: &[HistoricalMatch]) -> Self {
        let mut cal = Self::new();
        cal.add_points(history.iter().filter_map(|m| {
            let won = m.won?;
            let predicted = m.record.base_probability();
            if !(0.0..=1.0).contains(&predicted) {
                return None;
            }
            let market = m.record.market_probability;
            Some(CalibrationPoint {
                match_id: m.record.id.clone(),
                sport: m.record.sport.clone(),
                predicted_probability: predicted,
                market_probability: (0.0..=1.0).contains(&market).then_some(market),
                won,
            })
        }));
        cal
    }

    pub fn add_point(&mut self, point: CalibrationPoint) {
        self.points.push(point);
    }

    pub fn add_points(&mut self, points: impl IntoIterator<Item = CalibrationPoint>) {
        self.points.extend(points);
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    /// Generate a full calibration report.
    pub fn report(&self) -> CalibrationReport {
        if self.points.is_empty() {
            return CalibrationReport {
                total_predictions: 0,
                overall_brier: 0.0,
                market_brier: None,
                sport_brier: BTreeMap::new(),
                calibration_curve: Vec::new(),
                diagnosis: CalibrationDiagnosis::InsufficientData,
            };
        }

        let calibration_curve = self.compute_calibration_curve();
        let diagnosis = self.diagnose(&calibration_curve);

        CalibrationReport {
            total_predictions: self.points.len(),
            overall_brier: brier_score(
                self.points
                    .iter()
                    .map(|p| (p.predicted_probability, p.won)),
            ),
            market_brier: self.compute_market_brier(),
            sport_brier: self.compute_sport_brier(),
            calibration_curve,
            diagnosis,
        }
    }

    /// Market baseline, only when every point carries a market probability.
    fn compute_market_brier(&self) -> Option<f64> {
        let pairs: Option<Vec<(f64, bool)>> = self
            .points
            .iter()
            .map(|p| p.market_probability.map(|m| (m, p.won)))
            .collect();
        pairs.map(|pairs| brier_score(pairs))
    }

    fn compute_sport_brier(&self) -> BTreeMap<String, f64> {
        let mut by_sport: BTreeMap<&str, Vec<(f64, bool)>> = BTreeMap::new();
        for p in &self.points {
            by_sport
                .entry(p.sport.as_str())
                .or_default()
                .push((p.predicted_probability, p.won));
        }

        by_sport
            .into_iter()
            .map(|(sport, points)| (sport.to_string(), brier_score(points)))
            .collect()
    }

    fn compute_calibration_curve(&self) -> Vec<CalibrationBucket> {
        let bin_width = 1.0 / self.num_bins as f64;
        let last = self.num_bins - 1;
        // 1.0 belongs to the top bin.
        let bin_of = |x: f64| ((x * self.num_bins as f64).floor().max(0.0) as usize).min(last);

        (0..self.num_bins)
            .map(|i| {
                let bin_start = i as f64 * bin_width;
                let bin_end = bin_start + bin_width;

                let in_bin: Vec<&CalibrationPoint> = self
                    .points
                    .iter()
                    .filter(|p| bin_of(p.predicted_probability) == i)
                    .collect();

                if in_bin.is_empty() {
                    return CalibrationBucket {
                        bin_start,
                        bin_end,
                        mean_predicted: (bin_start + bin_end) / 2.0,
                        actual_rate: 0.0,
                        count: 0,
                        deviation: 0.0,
                    };
                }

                let count = in_bin.len();
                let mean_predicted =
                    in_bin.iter().map(|p| p.predicted_probability).sum::<f64>() / count as f64;
                let actual_rate = in_bin.iter().filter(|p| p.won).count() as f64 / count as f64;

                CalibrationBucket {
                    bin_start,
                    bin_end,
                    mean_predicted,
                    actual_rate,
                    count,
                    deviation: (mean_predicted - actual_rate).abs(),
                }
            })
            .collect()
    }

    fn diagnose(&self, curve: &[CalibrationBucket]) -> CalibrationDiagnosis {
        let populated: Vec<&CalibrationBucket> = curve.iter().filter(|b| b.count >= 3).collect();

        if populated.len() < 3 || self.points.len() < 20 {
            return CalibrationDiagnosis::InsufficientData;
        }

        let mut overconfident_signals = 0;
        let mut underconfident_signals = 0;

        for bucket in &populated {
            if bucket.deviation < 0.05 {
                continue;
            }

            let mid = (bucket.bin_start + bucket.bin_end) / 2.0;
            if mid < 0.3 {
                if bucket.actual_rate > bucket.mean_predicted {
                    overconfident_signals += 1;
                } else {
                    underconfident_signals += 1;
                }
            } else if mid > 0.7 {
                if bucket.actual_rate < bucket.mean_predicted {
                    overconfident_signals += 1;
                } else {
                    underconfident_signals += 1;
                }
            }
        }

        if overconfident_signals > underconfident_signals + 1 {
            CalibrationDiagnosis::OverConfident
        } else if underconfident_signals > overconfident_signals + 1 {
            CalibrationDiagnosis::UnderConfident
        } else {
            CalibrationDiagnosis::WellCalibrated
        }
    }

    /// Human-readable summary for logs and the CLI.
    pub fn summary(&self) -> String {
        let report = self.report();
        let mut parts = vec![
            format!("Calibration over {} settled predictions", report.total_predictions),
            format!("Overall Brier: {:.3}", report.overall_brier),
        ];

        if let Some(market) = report.market_brier {
            parts.push(format!("Market Brier: {market:.3}"));
        }
        for (sport, brier) in &report.sport_brier {
            parts.push(format!("  {sport} Brier: {brier:.3}"));
        }

        let diagnosis = match report.diagnosis {
            CalibrationDiagnosis::OverConfident => {
                "Diagnosis: over-confident, probabilities too extreme"
            }
            CalibrationDiagnosis::UnderConfident => {
                "Diagnosis: under-confident, probabilities too central"
            }
            CalibrationDiagnosis::WellCalibrated => "Diagnosis: well calibrated",
            CalibrationDiagnosis::InsufficientData => "Diagnosis: not enough data",
        };
        parts.push(diagnosis.to_string());

        parts.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
