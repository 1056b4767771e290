//! Double-well calibration against an observed state series
//!
//! Estimates `(a, b)` by least squares of the empirical drift `dx/dt`
//! against `a x - b x^3` inside a parameter box, then re-simulates the
//! fitted model open loop and scores it against the series.
//!
//! A synthetic exam-stress series stands in for measured data.

use std::f64::consts::TAU;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::SimError;

/// Acute stress event: an exponentially decaying drop starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressEvent {
    pub start: f64,
    pub duration: f64,
    pub magnitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSeriesConfig {
    pub duration: f64,
    pub dt: f64,
    pub baseline: f64,
    pub wave_amplitude: f64,
    pub wave_period: f64,
    pub events: Vec<StressEvent>,
    /// Decay time constant of every event [s]
    pub decay: f64,
    pub noise_std: f64,
    /// Series is clipped to `[-clip, clip]`.
    pub clip: f64,
}

impl Default for SyntheticSeriesConfig {
    fn default() -> Self {
        Self {
            duration: 1800.0,
            dt: 1.0,
            baseline: 0.9,
            wave_amplitude: 0.1,
            wave_period: 600.0,
            events: vec![
                StressEvent {
                    start: 600.0,
                    duration: 120.0,
                    magnitude: -0.6,
                },
                StressEvent {
                    start: 1200.0,
                    duration: 180.0,
                    magnitude: -0.8,
                },
            ],
            decay: 30.0,
            noise_std: 0.05,
            clip: 1.0,
        }
    }
}

/// Uniformly sampled observation series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub dt: f64,
    pub values: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn time(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.values.len()).map(move |i| i as f64 * self.dt)
    }
}

pub fn synthetic_series(config: &SyntheticSeriesConfig, seed: u64) -> Result<Series, SimError> {
    if !(config.dt.is_finite() && config.dt > 0.0) {
        return Err(SimError::invalid("calibration.dt", "must be finite and > 0"));
    }
    if !(config.wave_period.is_finite() && config.wave_period > 0.0) {
        return Err(SimError::invalid("calibration.wave_period", "must be finite and > 0"));
    }
    let noise = Normal::new(0.0, config.noise_std)
        .map_err(|err| SimError::invalid("calibration.noise_std", err.to_string()))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let n = (config.duration / config.dt).ceil().max(0.0) as usize;
    let values = (0..n)
        .map(|i| {
            let t = i as f64 * config.dt;
            let mut x = config.baseline + config.wave_amplitude * (TAU * t / config.wave_period).sin();
            for event in &config.events {
                if t >= event.start && t < event.start + event.duration {
                    x += event.magnitude * (-(t - event.start) / config.decay).exp();
                }
            }
            x += noise.sample(&mut rng);
            x.clamp(-config.clip, config.clip)
        })
        .collect();

    Ok(Series {
        dt: config.dt,
        values,
    })
}

/// Box constraint applied to both fitted parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitBounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for FitBounds {
    fn default() -> Self {
        Self {
            lower: 0.1,
            upper: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DoubleWellFit {
    pub a: f64,
    pub b: f64,
    /// Sum of squared drift residuals at the optimum.
    pub residual: f64,
}

/// Moment sums of the regression `y = a x - b x^3`.
struct Moments {
    xx: f64,
    x4: f64,
    x6: f64,
    xy: f64,
    x3y: f64,
    yy: f64,
}

impl Moments {
    fn sse(&self, a: f64, b: f64) -> f64 {
        self.yy - 2.0 * a * self.xy + 2.0 * b * self.x3y + a * a * self.xx - 2.0 * a * b * self.x4
            + b * b * self.x6
    }

    fn best_b_given_a(&self, a: f64) -> f64 {
        (a * self.x4 - self.x3y) / self.x6
    }

    fn best_a_given_b(&self, b: f64) -> f64 {
        (self.xy + b * self.x4) / self.xx
    }
}

/// Least-squares fit of the double-well drift to `series`.
///
/// The quadratic objective is minimised over the box exactly: the interior
/// optimum if it is feasible, otherwise the best point on the box edges.
pub fn fit_double_well(series: &Series, bounds: FitBounds) -> Result<DoubleWellFit, SimError> {
    if series.len() < 3 {
        return Err(SimError::DegenerateFit(format!(
            "need at least 3 samples, got {}",
            series.len()
        )));
    }
    if !(bounds.lower.is_finite() && bounds.upper.is_finite() && bounds.lower <= bounds.upper) {
        return Err(SimError::invalid("calibration.bounds", "must be finite with lower <= upper"));
    }

    let mut m = Moments {
        xx: 0.0,
        x4: 0.0,
        x6: 0.0,
        xy: 0.0,
        x3y: 0.0,
        yy: 0.0,
    };
    for pair in series.values.windows(2) {
        let x = pair[0];
        let y = (pair[1] - pair[0]) / series.dt;
        let x2 = x * x;
        let x3 = x2 * x;
        m.xx += x2;
        m.x4 += x2 * x2;
        m.x6 += x3 * x3;
        m.xy += x * y;
        m.x3y += x3 * y;
        m.yy += y * y;
    }

    let det = m.xx * m.x6 - m.x4 * m.x4;
    if !(m.xx > 0.0 && m.x6 > 0.0) || det <= 1e-12 * m.xx * m.x6 {
        return Err(SimError::DegenerateFit(
            "state amplitude does not vary enough to separate a from b".to_string(),
        ));
    }

    let clamp = |v: f64| v.clamp(bounds.lower, bounds.upper);
    let a_free = (m.xy * m.x6 - m.x3y * m.x4) / det;
    let b_free = (m.xy * m.x4 - m.x3y * m.xx) / det;

    let inside = |v: f64| bounds.lower <= v && v <= bounds.upper;
    let candidates = if inside(a_free) && inside(b_free) {
        vec![(a_free, b_free)]
    } else {
        vec![
            (bounds.lower, clamp(m.best_b_given_a(bounds.lower))),
            (bounds.upper, clamp(m.best_b_given_a(bounds.upper))),
            (clamp(m.best_a_given_b(bounds.lower)), bounds.lower),
            (clamp(m.best_a_given_b(bounds.upper)), bounds.upper),
        ]
    };

    candidates
        .into_iter()
        .map(|(a, b)| DoubleWellFit {
            a,
            b,
            residual: m.sse(a, b).max(0.0),
        })
        .min_by(|l, r| l.residual.total_cmp(&r.residual))
        .ok_or_else(|| SimError::DegenerateFit("no feasible candidate".to_string()))
}

/// Uncontrolled, undisturbed run of the fitted model clipped to `[-1, 1]`.
pub fn simulate_open_loop(
    fit: &DoubleWellFit,
    x0: f64,
    dt: f64,
    n: usize,
    sigma: f64,
    seed: u64,
) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x = Vec::with_capacity(n);
    if n == 0 {
        return x;
    }
    x.push(x0);
    for i in 1..n {
        let prev = x[i - 1];
        let z: f64 = StandardNormal.sample(&mut rng);
        let next = prev + (fit.a * prev - fit.b * prev * prev * prev) * dt + sigma * dt.sqrt() * z;
        x.push(next.clamp(-1.0, 1.0));
    }
    x
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitValidation {
    pub rmse: f64,
    /// Pearson correlation; `None` when either series is constant.
    pub correlation: Option<f64>,
    pub predicted: Vec<f64>,
}

pub fn validate_fit(
    series: &Series,
    fit: &DoubleWellFit,
    sigma: f64,
    seed: u64,
) -> Result<FitValidation, SimError> {
    let observed = &series.values;
    let x0 = *observed
        .first()
        .ok_or_else(|| SimError::DegenerateFit("empty series".to_string()))?;
    let predicted = simulate_open_loop(fit, x0, series.dt, observed.len(), sigma, seed);

    let mse = observed
        .iter()
        .zip(&predicted)
        .map(|(o, p)| (o - p).powi(2))
        .sum::<f64>()
        / observed.len() as f64;

    Ok(FitValidation {
        rmse: mse.sqrt(),
        correlation: pearson(observed, &predicted),
        predicted,
    })
}

fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x[..n].iter().zip(&y[..n]) {
        let (da, db) = (a - mean_x, b - mean_y);
        sxy += da * db;
        sxx += da * da;
        syy += db * db;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub samples: usize,
    pub mean: f64,
    pub fit: DoubleWellFit,
    pub validation: FitValidation,
}

/// Generates the synthetic series, fits it and validates the fit.
pub fn calibrate(
    config: &SyntheticSeriesConfig,
    sigma: f64,
    seed: u64,
) -> Result<CalibrationReport, SimError> {
    let series = synthetic_series(config, seed)?;
    let fit = fit_double_well(&series, FitBounds::default())?;
    let validation = validate_fit(&series, &fit, sigma, seed.wrapping_add(1))?;
    tracing::info!(a = fit.a, b = fit.b, rmse = validation.rmse, "double-well calibration finished");
    Ok(CalibrationReport {
        samples: series.len(),
        mean: series.values.iter().sum::<f64>() / series.len().max(1) as f64,
        fit,
        validation,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{calibrate, fit_double_well, synthetic_series, FitBounds, Series, SyntheticSeriesConfig};
    use crate::SimError;

    fn euler_double_well(a: f64, b: f64, x0: f64, dt: f64, n: usize) -> Series {
        let mut values = vec![x0];
        for _ in 1..n {
            let x = values[values.len() - 1];
            values.push(x + (a * x - b * x * x * x) * dt);
        }
        Series { dt, values }
    }

    #[test]
    fn recovers_noiseless_parameters() {
        let series = euler_double_well(2.0, 1.0, 0.1, 0.01, 1000);
        let fit = fit_double_well(&series, FitBounds::default()).expect("fit");
        assert_relative_eq!(fit.a, 2.0, epsilon = 1e-6);
        assert_relative_eq!(fit.b, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn fit_respects_bounds() {
        let series = euler_double_well(20.0, 1.0, 0.05, 0.001, 2000);
        let fit = fit_double_well(&series, FitBounds::default()).expect("fit");
        assert!(fit.a <= 10.0 && fit.a >= 0.1);
        assert!(fit.b <= 10.0 && fit.b >= 0.1);
    }

    #[test]
    fn constant_series_is_degenerate() {
        let series = Series {
            dt: 1.0,
            values: vec![0.9; 50],
        };
        assert!(matches!(
            fit_double_well(&series, FitBounds::default()),
            Err(SimError::DegenerateFit(_))
        ));
    }

    #[test]
    fn synthetic_series_is_clipped_and_dips_during_events() {
        let series = synthetic_series(&SyntheticSeriesConfig::default(), 11).expect("series");
        assert_eq!(series.len(), 1800);
        assert!(series.values.iter().all(|v| (-1.0..=1.0).contains(v)));
        // Start of the second event sits ~0.8 below the baseline wave.
        assert!(series.values[1200] < 0.5);
    }

    #[test]
    fn calibration_report_is_finite() {
        let report = calibrate(&SyntheticSeriesConfig::default(), 0.05, 3).expect("calibration");
        assert_eq!(report.samples, 1800);
        assert!(report.validation.rmse.is_finite());
        assert_eq!(report.validation.predicted.len(), 1800);
        assert!((0.1..=10.0).contains(&report.fit.a));
    }
}
