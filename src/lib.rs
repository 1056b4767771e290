//! C-SMC - Continuous Sliding-Mode Control evaluation engine
//!
//! Integrates a stochastic "cognitive state" model (double-well potential,
//! Ornstein-Uhlenbeck, or constant drift) with Euler-Maruyama steps, closes
//! the loop with a bounded `tanh` sliding-mode law or one of the baseline
//! controllers, injects a scripted stress disturbance, and reduces many
//! seeded Monte Carlo trials into comparison and sensitivity statistics.

use thiserror::Error;

pub mod calibration;
pub mod config;
pub mod controller;
pub mod disturbance;
pub mod metrics;
pub mod monte_carlo;
pub mod plant;
pub mod report;
pub mod scenarios;
pub mod sensitivity;
pub mod stats;
pub mod trial;

// Re-export main types
pub use config::{
    ControllerKind, EvaluationCriteria, PidGains, RuleTable, SimulationConfig, StateBounds,
};
pub use controller::{build_controller, ControlLaw, ControllerState};
pub use disturbance::{disturbance, DisturbanceSchedule, PulseWindow};
pub use metrics::TrialResult;
pub use monte_carlo::{
    compare_methods, run_monte_carlo, Execution, MethodSpec, MonteCarloConfig, SeedStrategy,
};
pub use plant::{PlantConfig, PlantModel};
pub use sensitivity::{run_sweep, ParameterGrid, ParameterPoint, SweepAxes, SweepKey, SweepResult};
pub use stats::{AggregateResult, SummaryStats};
pub use trial::{run_trial, Trajectory, TrajectorySample};

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: `{parameter}` {reason}")]
    InvalidConfig {
        parameter: &'static str,
        reason: String,
    },
    #[error("unknown {what} kind `{name}` (expected one of: {expected})")]
    UnknownKind {
        what: &'static str,
        name: String,
        expected: &'static str,
    },
    #[error("numeric instability at step {step} (t = {time:.4}): state became {value}")]
    NumericInstability { step: usize, time: f64, value: f64 },
    #[error("trial {trial} of `{label}` (seed {seed}) failed: {source}")]
    TrialFailed {
        label: String,
        trial: usize,
        seed: u64,
        #[source]
        source: Box<SimError>,
    },
    #[error("degenerate calibration data: {0}")]
    DegenerateFit(String),
}

impl SimError {
    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        SimError::InvalidConfig {
            parameter,
            reason: reason.into(),
        }
    }
}
