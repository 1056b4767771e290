//! Canonical experiment presets
//!
//! Appendix verification, the baseline comparison, the sensitivity base,
//! the four controller "phases" per plant family and the open-loop
//! stability contrast. Every preset is a plain [`SimulationConfig`] so it can
//! be tweaked before running.

use serde::{Deserialize, Serialize};

use crate::config::{ControllerKind, SimulationConfig, StateBounds};
use crate::disturbance::{DisturbanceSchedule, PulseWindow};
use crate::monte_carlo::{run_batches, MethodSpec, MonteCarloConfig, TrialBatch};
use crate::plant::{PlantConfig, PlantModel};
use crate::sensitivity::ParameterGrid;
use crate::stats::SummaryStats;
use crate::SimError;

pub const APPENDIX_TRIALS: usize = 100;
pub const BASELINE_TRIALS: usize = 100;
pub const SENSITIVITY_TRIALS: usize = 50;

fn panic_pulse(amplitude: f64, period: f64, magnitude: f64) -> DisturbanceSchedule {
    DisturbanceSchedule {
        amplitude,
        period,
        pulse: PulseWindow::Absolute {
            start: 720.0,
            end: 840.0,
        },
        pulse_magnitude: magnitude,
    }
}

/// Double-well, K = 5, phi = 0.3, 30 minutes at 10 ms.
pub fn appendix_verification() -> SimulationConfig {
    SimulationConfig {
        dt: 0.01,
        duration: 1800.0,
        plant: PlantConfig {
            model: PlantModel::DoubleWell { a: 1.0, b: 1.0 },
            sigma: 0.1,
            disturbance_gain: 1.0,
        },
        controller: ControllerKind::csmc(5.0, 0.3),
        disturbance: panic_pulse(0.5, 150.0, -2.5),
        reference: 1.0,
        initial_state: 0.9,
        ..SimulationConfig::default()
    }
}

/// Published compliance figure and the tolerance used to accept a rerun.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedCompliance {
    /// Mean compliance [%]
    pub mean: f64,
    /// Spread across trials [%]
    pub std_dev: f64,
    pub mean_tolerance: f64,
    pub std_tolerance: f64,
}

impl Default for ReportedCompliance {
    fn default() -> Self {
        Self {
            mean: 99.6,
            std_dev: 0.3,
            mean_tolerance: 1.0,
            std_tolerance: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    /// Compliance statistics in percent.
    pub observed: SummaryStats,
    pub reported: ReportedCompliance,
    pub passed: bool,
}

impl ReportedCompliance {
    pub fn check(&self, observed: SummaryStats) -> Verification {
        let passed = (observed.mean - self.mean).abs() < self.mean_tolerance
            && (observed.std_dev - self.std_dev).abs() < self.std_tolerance;
        Verification {
            observed,
            reported: *self,
            passed,
        }
    }
}

pub const APPENDIX_LABEL: &str = "C-SMC (appendix)";

/// Reruns the appendix experiment on `config` and compares its compliance
/// with the reported figure. The raw trials are returned for export.
pub fn verify_appendix(
    config: &SimulationConfig,
    mc: &MonteCarloConfig,
) -> Result<(TrialBatch, Verification), SimError> {
    let runs = vec![(APPENDIX_LABEL.to_string(), config.clone())];
    let batch = run_batches(&runs, mc)?
        .pop()
        .ok_or_else(|| SimError::invalid("n_trials", "verification produced no trials"))?;
    let observed = batch.aggregate().compliance_percent();
    let verdict = ReportedCompliance::default().check(observed);
    tracing::info!(
        mean = verdict.observed.mean,
        std_dev = verdict.observed.std_dev,
        passed = verdict.passed,
        "appendix verification finished"
    );
    Ok((batch, verdict))
}

/// Deep double-well with strong noise and a +/-1.5 clamp.
pub fn baseline_comparison() -> SimulationConfig {
    SimulationConfig {
        plant: PlantConfig {
            model: PlantModel::DoubleWell { a: 2.0, b: 1.0 },
            sigma: 0.3,
            disturbance_gain: 1.0,
        },
        controller: ControllerKind::csmc(5.0, 0.3),
        disturbance: panic_pulse(0.2, 300.0, -2.5),
        reference: 1.0,
        initial_state: 1.0,
        state_bounds: StateBounds::new(-1.5, 1.5),
        ..SimulationConfig::default()
    }
}

pub fn baseline_methods() -> Vec<MethodSpec> {
    MethodSpec::standard_set(5.0, 0.3)
}

/// Same plant as [`baseline_comparison`].
pub fn sensitivity_base() -> SimulationConfig {
    baseline_comparison()
}

/// K x phi plane at the nominal pulse of -2.5.
pub fn gain_layer_grid() -> ParameterGrid {
    ParameterGrid {
        pulse_magnitudes: vec![-2.5],
        ..ParameterGrid::default()
    }
}

/// Pulse magnitudes at the nominal K = 5, phi = 0.3.
pub fn disturbance_grid() -> ParameterGrid {
    ParameterGrid {
        gains: vec![5.0],
        boundary_layers: vec![0.3],
        ..ParameterGrid::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlantFamily {
    DoubleWell,
    OrnsteinUhlenbeck,
    DriftDiffusion,
}

impl PlantFamily {
    pub const ALL: [PlantFamily; 3] = [
        PlantFamily::DoubleWell,
        PlantFamily::OrnsteinUhlenbeck,
        PlantFamily::DriftDiffusion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PlantFamily::DoubleWell => "double-well",
            PlantFamily::OrnsteinUhlenbeck => "ornstein-uhlenbeck",
            PlantFamily::DriftDiffusion => "drift-diffusion",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, SimError> {
        Self::ALL
            .into_iter()
            .find(|family| family.name() == name)
            .or(match name {
                "ou" => Some(PlantFamily::OrnsteinUhlenbeck),
                "ddm" => Some(PlantFamily::DriftDiffusion),
                _ => None,
            })
            .ok_or_else(|| SimError::UnknownKind {
                what: "plant",
                name: name.to_string(),
                expected: crate::plant::PLANT_KINDS,
            })
    }

    /// Shallow-well / slow-reversion / weak-drift plant with its nominal stress.
    pub fn phase_base(&self) -> SimulationConfig {
        match self {
            PlantFamily::DoubleWell => SimulationConfig {
                plant: PlantConfig {
                    model: PlantModel::DoubleWell { a: 0.5, b: 1.0 },
                    sigma: 0.05,
                    disturbance_gain: 1.0,
                },
                disturbance: panic_pulse(0.3, 150.0, -2.5),
                initial_state: 1.0,
                ..SimulationConfig::default()
            },
            PlantFamily::OrnsteinUhlenbeck => SimulationConfig {
                plant: PlantConfig {
                    model: PlantModel::OrnsteinUhlenbeck { theta: 0.5 },
                    sigma: 0.05,
                    disturbance_gain: 1.0,
                },
                disturbance: panic_pulse(0.5, 150.0, -4.0),
                initial_state: 1.0,
                ..SimulationConfig::default()
            },
            PlantFamily::DriftDiffusion => SimulationConfig {
                plant: PlantConfig {
                    model: PlantModel::DriftDiffusion { drift: 0.05 },
                    sigma: 0.05,
                    disturbance_gain: 1.0,
                },
                disturbance: panic_pulse(0.5, 150.0, -4.0),
                initial_state: 0.05,
                ..SimulationConfig::default()
            },
        }
    }
}

/// The four controller settings contrasted in the phase experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Near-sign law acting on a lagged measurement.
    DelayDivergence,
    /// Smooth but too weak to hold the state through the pulse.
    WeakGain,
    /// High gain with a very thin boundary layer.
    Chattering,
    Optimized,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::DelayDivergence,
        Phase::WeakGain,
        Phase::Chattering,
        Phase::Optimized,
    ];

    pub fn number(&self) -> usize {
        match self {
            Phase::DelayDivergence => 1,
            Phase::WeakGain => 2,
            Phase::Chattering => 3,
            Phase::Optimized => 4,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Phase::DelayDivergence => "Delay Divergence",
            Phase::WeakGain => "Weak Gain",
            Phase::Chattering => "Chattering",
            Phase::Optimized => "Optimized C-SMC",
        }
    }

    pub fn label(&self) -> String {
        format!("Phase {}: {}", self.number(), self.title())
    }
}

/// Configuration of `phase` on `family`.
pub fn phase_config(family: PlantFamily, phase: Phase) -> SimulationConfig {
    let base = family.phase_base();
    let (controller, delay_steps) = match (family, phase) {
        (PlantFamily::DriftDiffusion, Phase::DelayDivergence) => {
            (ControllerKind::csmc(15.0, 0.001), 0)
        }
        (_, Phase::DelayDivergence) => (ControllerKind::chattering(8.0), 100),
        (PlantFamily::OrnsteinUhlenbeck, Phase::WeakGain) => (ControllerKind::csmc(1.0, 1.0), 0),
        (_, Phase::WeakGain) => (ControllerKind::csmc(0.5, 1.0), 0),
        (PlantFamily::DriftDiffusion, Phase::Chattering) => (ControllerKind::csmc(10.0, 0.05), 0),
        (_, Phase::Chattering) => (ControllerKind::chattering(10.0), 0),
        (PlantFamily::DriftDiffusion, Phase::Optimized) => (ControllerKind::csmc(3.0, 0.3), 0),
        (_, Phase::Optimized) => (ControllerKind::csmc(5.0, 0.3), 0),
    };
    SimulationConfig {
        controller,
        delay_steps,
        ..base
    }
}

/// All four phases of `family`, labelled for a Monte Carlo run.
pub fn phase_suite(family: PlantFamily) -> Vec<(String, SimulationConfig)> {
    Phase::ALL
        .iter()
        .map(|&phase| (phase.label(), phase_config(family, phase)))
        .collect()
}

/// Uncontrolled high- vs low-sensitivity variants of `family`.
pub fn open_loop_contrast(family: PlantFamily) -> Vec<(String, SimulationConfig)> {
    let open = |config: SimulationConfig| config.with_controller(ControllerKind::None);
    match family {
        PlantFamily::DoubleWell => {
            let well = |a: f64| {
                open(SimulationConfig {
                    plant: PlantConfig {
                        model: PlantModel::DoubleWell { a, b: 1.0 },
                        sigma: 0.05,
                        disturbance_gain: 1.0,
                    },
                    disturbance: panic_pulse(0.3, 150.0, -3.0),
                    initial_state: 1.0,
                    ..SimulationConfig::default()
                })
            };
            vec![
                ("Low Sensitivity (deep well)".to_string(), well(2.0)),
                ("High Sensitivity (shallow well)".to_string(), well(0.5)),
            ]
        }
        PlantFamily::OrnsteinUhlenbeck => {
            let scaled = |gain: f64| {
                let mut config = open(family.phase_base());
                config.plant.disturbance_gain = gain;
                config
            };
            vec![
                ("Low Sensitivity (damped input)".to_string(), scaled(0.2)),
                ("High Sensitivity (full input)".to_string(), scaled(1.0)),
            ]
        }
        PlantFamily::DriftDiffusion => {
            // Slower responders see both drift and stress divided by their time constant.
            let responder = |tau: f64, duration: f64| {
                open(SimulationConfig {
                    duration,
                    plant: PlantConfig {
                        model: PlantModel::DriftDiffusion { drift: -0.05 / tau },
                        sigma: 0.05,
                        disturbance_gain: 1.0 / tau,
                    },
                    disturbance: DisturbanceSchedule {
                        amplitude: 0.5,
                        period: 30.0,
                        pulse: PulseWindow::Absolute {
                            start: 150.0,
                            end: 250.0,
                        },
                        pulse_magnitude: -4.0,
                    },
                    initial_state: 1.0,
                    ..SimulationConfig::default()
                })
            };
            vec![
                ("Low Sensitivity (tau = 5)".to_string(), responder(5.0, 1800.0)),
                ("High Sensitivity (tau = 1)".to_string(), responder(1.0, 360.0)),
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        appendix_verification, baseline_comparison, disturbance_grid, gain_layer_grid,
        open_loop_contrast, phase_config, phase_suite, Phase, PlantFamily, ReportedCompliance,
    };
    use crate::config::ControllerKind;
    use crate::stats::SummaryStats;

    #[test]
    fn every_preset_validates() {
        assert!(appendix_verification().validate().is_ok());
        assert!(baseline_comparison().validate().is_ok());
        for family in PlantFamily::ALL {
            for (_, config) in phase_suite(family) {
                assert!(config.validate().is_ok(), "{family:?}");
            }
            for (_, config) in open_loop_contrast(family) {
                assert!(config.validate().is_ok(), "{family:?}");
                assert_eq!(config.controller, ControllerKind::None);
            }
        }
    }

    #[test]
    fn appendix_runs_for_thirty_minutes() {
        let config = appendix_verification();
        assert_eq!(config.step_count(), 180_000);
        assert_eq!(config.initial_state, 0.9);
    }

    #[test]
    fn delay_phase_lags_one_second() {
        let config = phase_config(PlantFamily::DoubleWell, Phase::DelayDivergence);
        assert_eq!(config.delay_steps, 100);
        assert_eq!(config.controller, ControllerKind::chattering(8.0));
        let config = phase_config(PlantFamily::OrnsteinUhlenbeck, Phase::WeakGain);
        assert_eq!(config.controller, ControllerKind::csmc(1.0, 1.0));
    }

    #[test]
    fn sensitivity_grids_split_the_axes() {
        assert_eq!(gain_layer_grid().len(), 9);
        assert_eq!(disturbance_grid().len(), 3);
    }

    #[test]
    fn family_names_accept_aliases() {
        assert_eq!(PlantFamily::from_name("ou").unwrap(), PlantFamily::OrnsteinUhlenbeck);
        assert_eq!(PlantFamily::from_name("double-well").unwrap(), PlantFamily::DoubleWell);
        assert!(PlantFamily::from_name("lorenz").is_err());
    }

    #[test]
    fn verdict_uses_both_tolerances() {
        let reported = ReportedCompliance::default();
        let stats = |mean: f64, std_dev: f64| SummaryStats {
            n: 100,
            mean,
            std_dev,
            sem: std_dev / 10.0,
            min: mean - 1.0,
            max: 100.0,
        };
        assert!(reported.check(stats(99.4, 0.4)).passed);
        assert!(!reported.check(stats(98.0, 0.3)).passed);
        assert!(!reported.check(stats(99.6, 1.2)).passed);
    }
}
