//! Reduction of per-trial metrics into summary statistics.

use serde::Serialize;

use crate::metrics::TrialResult;

/// Moments and range of one metric over N trials.
///
/// `std_dev` is the sample standard deviation (`n - 1` denominator);
/// with a single sample both `std_dev` and `sem` are zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SummaryStats {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub sem: f64,
    pub min: f64,
    pub max: f64,
}

impl SummaryStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self {
                n: 0,
                mean: f64::NAN,
                std_dev: f64::NAN,
                sem: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }

        let mean = samples.iter().sum::<f64>() / n as f64;
        let std_dev = if n > 1 {
            let ss: f64 = samples.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };

        Self {
            n,
            mean,
            std_dev,
            sem: std_dev / (n as f64).sqrt(),
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Same statistics with every value scaled, e.g. rates to percent.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            n: self.n,
            mean: self.mean * factor,
            std_dev: self.std_dev * factor.abs(),
            sem: self.sem * factor.abs(),
            min: (self.min * factor).min(self.max * factor),
            max: (self.min * factor).max(self.max * factor),
        }
    }
}

/// Statistics of one method or parameter combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub label: String,
    pub n_trials: usize,
    /// Seeds used, in trial order.
    pub seeds: Vec<u64>,
    /// Success indicator (0 or 1) per trial.
    pub success: SummaryStats,
    pub compliance: SummaryStats,
    pub avg_abs_error: SummaryStats,
    pub chattering: SummaryStats,
}

impl AggregateResult {
    pub fn from_trials(label: impl Into<String>, seeds: Vec<u64>, trials: &[TrialResult]) -> Self {
        let column = |f: fn(&TrialResult) -> f64| -> Vec<f64> { trials.iter().map(f).collect() };

        Self {
            label: label.into(),
            n_trials: trials.len(),
            seeds,
            success: SummaryStats::from_samples(&column(|r| if r.success { 1.0 } else { 0.0 })),
            compliance: SummaryStats::from_samples(&column(|r| r.compliance_rate)),
            avg_abs_error: SummaryStats::from_samples(&column(|r| r.avg_abs_error)),
            chattering: SummaryStats::from_samples(&column(|r| r.chattering_count as f64)),
        }
    }

    pub fn success_rate_percent(&self) -> f64 {
        self.success.mean * 100.0
    }

    pub fn compliance_percent(&self) -> SummaryStats {
        self.compliance.scaled(100.0)
    }

    /// Inclusive seed range, if any trial ran.
    pub fn seed_range(&self) -> Option<(u64, u64)> {
        let lo = self.seeds.iter().min()?;
        let hi = self.seeds.iter().max()?;
        Some((*lo, *hi))
    }
}
