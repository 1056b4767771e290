//! Per-trial metrics
//!
//! All metrics are computed over every sample of the trajectory, including
//! the initial state at `t = 0`.

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::trial::Trajectory;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// The state never dropped to or below the failure threshold.
    pub success: bool,
    /// Fraction of samples inside the inclusive compliance band, in `[0, 1]`.
    pub compliance_rate: f64,
    /// Mean of `|x - r|`.
    pub avg_abs_error: f64,
    /// Sign reversals of the control increment.
    pub chattering_count: usize,
    pub min_state: f64,
    pub final_state: f64,
}

impl TrialResult {
    pub fn from_trajectory(trajectory: &Trajectory, config: &SimulationConfig) -> Self {
        let states = trajectory.states();
        let eval = &config.evaluation;
        let (band_lower, band_upper) = eval.band(config.reference);
        let n = states.len().max(1) as f64;

        let min_state = states.iter().copied().fold(f64::INFINITY, f64::min);
        let in_band = states
            .iter()
            .filter(|&&x| band_lower <= x && x <= band_upper)
            .count();
        let abs_error: f64 = states.iter().map(|x| (x - config.reference).abs()).sum();

        Self {
            success: states.iter().all(|&x| x > eval.failure_threshold),
            compliance_rate: in_band as f64 / n,
            avg_abs_error: abs_error / n,
            chattering_count: chattering_count(trajectory.controls()),
            min_state,
            final_state: states.last().copied().unwrap_or(config.initial_state),
        }
    }
}

/// Counts sign reversals between consecutive non-zero control increments.
///
/// Zero increments are skipped, so a flat stretch between two opposite moves
/// still counts as one reversal.
pub fn chattering_count(controls: &[f64]) -> usize {
    let mut count = 0;
    let mut last_sign = 0.0;
    for pair in controls.windows(2) {
        let diff = pair[1] - pair[0];
        if diff == 0.0 || diff.is_nan() {
            continue;
        }
        let sign = diff.signum();
        if last_sign != 0.0 && sign != last_sign {
            count += 1;
        }
        last_sign = sign;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::{chattering_count, TrialResult};
    use crate::config::SimulationConfig;
    use crate::disturbance::DisturbanceSchedule;
    use crate::plant::{PlantConfig, PlantModel};
    use crate::trial::run_trial;

    #[test]
    fn chattering_ignores_flat_segments() {
        assert_eq!(chattering_count(&[]), 0);
        assert_eq!(chattering_count(&[1.0]), 0);
        assert_eq!(chattering_count(&[0.0, 1.0, 2.0, 3.0]), 0);
        assert_eq!(chattering_count(&[0.0, 1.0, 0.0, 1.0]), 2);
        assert_eq!(chattering_count(&[0.0, 1.0, 1.0, 1.0, 0.0]), 1);
        assert_eq!(chattering_count(&[2.0, 2.0, 2.0]), 0);
    }

    #[test]
    fn noiseless_equilibrium_is_fully_compliant() {
        let config = SimulationConfig {
            duration: 20.0,
            initial_state: 1.0,
            plant: PlantConfig {
                model: PlantModel::DoubleWell { a: 1.0, b: 1.0 },
                sigma: 0.0,
                disturbance_gain: 1.0,
            },
            disturbance: DisturbanceSchedule::quiet(),
            ..SimulationConfig::default()
        };
        let (_, result) = run_trial(&config, 0).expect("trial runs");
        assert!(result.success);
        assert_eq!(result.compliance_rate, 1.0);
        assert_eq!(result.avg_abs_error, 0.0);
        assert_eq!(result.chattering_count, 0);
        assert_eq!(result.min_state, 1.0);
        assert_eq!(result.final_state, 1.0);
    }

    #[test]
    fn compliance_band_follows_reference() {
        let config = SimulationConfig {
            duration: 20.0,
            reference: 0.0,
            initial_state: 0.0,
            plant: PlantConfig {
                model: PlantModel::OrnsteinUhlenbeck { theta: 0.5 },
                sigma: 0.0,
                disturbance_gain: 1.0,
            },
            disturbance: DisturbanceSchedule::quiet(),
            ..SimulationConfig::default()
        };
        let (_, result) = run_trial(&config, 0).expect("trial runs");
        assert_eq!(result.compliance_rate, 1.0);
        assert_eq!(result.avg_abs_error, 0.0);

        let shifted = SimulationConfig {
            reference: -2.0,
            initial_state: -2.0,
            ..config
        };
        let (_, result) = run_trial(&shifted, 0).expect("trial runs");
        assert_eq!(result.compliance_rate, 1.0);
        assert!(!result.success);
    }

    #[test]
    fn initial_sample_counts_towards_success() {
        let config = SimulationConfig {
            duration: 1.0,
            initial_state: 0.0,
            ..SimulationConfig::default()
        };
        let (trajectory, _) = run_trial(&config, 0).expect("trial runs");
        let result = TrialResult::from_trajectory(&trajectory, &config);
        assert!(!result.success);
        assert_eq!(result.min_state, 0.0);
    }
}
