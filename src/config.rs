use serde::{Deserialize, Serialize};

use crate::disturbance::DisturbanceSchedule;
use crate::plant::{PlantConfig, PlantModel};
use crate::SimError;

pub const CONTROLLER_KINDS: &str = "none, pid, rule, csmc, chattering";

/// Boundary layer used by the near-discontinuous "chattering" law.
pub const CHATTERING_BOUNDARY_LAYER: f64 = 0.01;

/// Absolute slack when converting `duration / dt` into a step count.
const STEP_COUNT_TOLERANCE: f64 = 1e-9;

/// Hard safety clamp applied to the state after every step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateBounds {
    pub lower: f64,
    pub upper: f64,
}

impl StateBounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.lower, self.upper)
    }

    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x <= self.upper
    }
}

impl Default for StateBounds {
    fn default() -> Self {
        Self::new(-3.0, 3.0)
    }
}

/// How a trajectory is scored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCriteria {
    /// Half width of the inclusive compliance band `[r - w, r + w]`.
    pub band_half_width: f64,
    /// A trial succeeds only if the state stays strictly above this value.
    pub failure_threshold: f64,
}

impl EvaluationCriteria {
    /// Compliance band centred on `reference`.
    pub fn band(&self, reference: f64) -> (f64, f64) {
        (reference - self.band_half_width, reference + self.band_half_width)
    }
}

impl Default for EvaluationCriteria {
    fn default() -> Self {
        Self {
            band_half_width: 0.2,
            failure_threshold: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Output is clipped to `[-output_limit, output_limit]`.
    pub output_limit: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 3.0,
            ki: 0.1,
            kd: 0.5,
            output_limit: 10.0,
        }
    }
}

/// Three-tier threshold intervention table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    pub strong_below: f64,
    pub strong_output: f64,
    pub moderate_below: f64,
    pub moderate_output: f64,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self {
            strong_below: 0.5,
            strong_output: 5.0,
            moderate_below: 0.8,
            moderate_output: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControllerKind {
    None,
    Pid(PidGains),
    Rule(RuleTable),
    /// `u = -gain * tanh((x - r) / boundary_layer)`
    Csmc { gain: f64, boundary_layer: f64 },
}

impl ControllerKind {
    pub fn csmc(gain: f64, boundary_layer: f64) -> Self {
        ControllerKind::Csmc {
            gain,
            boundary_layer,
        }
    }

    /// The same saturating law squeezed towards a sign switch.
    pub fn chattering(gain: f64) -> Self {
        Self::csmc(gain, CHATTERING_BOUNDARY_LAYER)
    }

    /// Builds a controller from its tag, using the default tuning for baselines.
    pub fn from_name(name: &str, gain: f64, boundary_layer: f64) -> Result<Self, SimError> {
        match name {
            "none" => Ok(ControllerKind::None),
            "pid" => Ok(ControllerKind::Pid(PidGains::default())),
            "rule" => Ok(ControllerKind::Rule(RuleTable::default())),
            "csmc" => Ok(Self::csmc(gain, boundary_layer)),
            "chattering" => Ok(Self::chattering(gain)),
            other => Err(SimError::UnknownKind {
                what: "controller",
                name: other.to_string(),
                expected: CONTROLLER_KINDS,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControllerKind::None => "none",
            ControllerKind::Pid(_) => "pid",
            ControllerKind::Rule(_) => "rule",
            ControllerKind::Csmc { .. } => "csmc",
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        match *self {
            ControllerKind::None => Ok(()),
            ControllerKind::Pid(gains) => {
                if ![gains.kp, gains.ki, gains.kd].iter().all(|g| g.is_finite()) {
                    return Err(SimError::invalid("controller.pid", "gains must be finite"));
                }
                if !(gains.output_limit.is_finite() && gains.output_limit > 0.0) {
                    return Err(SimError::invalid(
                        "controller.pid.output_limit",
                        format!("must be finite and > 0, got {}", gains.output_limit),
                    ));
                }
                Ok(())
            }
            ControllerKind::Rule(table) => {
                let values = [
                    table.strong_below,
                    table.strong_output,
                    table.moderate_below,
                    table.moderate_output,
                ];
                if !values.iter().all(|v| v.is_finite()) {
                    return Err(SimError::invalid("controller.rule", "entries must be finite"));
                }
                if table.strong_below > table.moderate_below {
                    return Err(SimError::invalid(
                        "controller.rule.strong_below",
                        format!(
                            "must not exceed moderate_below ({} > {})",
                            table.strong_below, table.moderate_below
                        ),
                    ));
                }
                Ok(())
            }
            ControllerKind::Csmc {
                gain,
                boundary_layer,
            } => {
                if !(gain.is_finite() && gain >= 0.0) {
                    return Err(SimError::invalid(
                        "controller.csmc.gain",
                        format!("must be finite and >= 0, got {gain}"),
                    ));
                }
                if !(boundary_layer.is_finite() && boundary_layer > 0.0) {
                    return Err(SimError::invalid(
                        "controller.csmc.boundary_layer",
                        format!("must be finite and > 0, got {boundary_layer}"),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Immutable parameters of one trial.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Integration step [s]
    pub dt: f64,
    /// Total simulated time [s]
    pub duration: f64,
    pub plant: PlantConfig,
    pub controller: ControllerKind,
    pub disturbance: DisturbanceSchedule,
    /// Target state `r`
    pub reference: f64,
    /// State at `t = 0`
    pub initial_state: f64,
    /// Steps of measurement lag seen by the controller
    #[serde(default)]
    pub delay_steps: usize,
    #[serde(default)]
    pub state_bounds: StateBounds,
    #[serde(default)]
    pub evaluation: EvaluationCriteria,
    /// Base seed; Monte Carlo trial seeds are derived from it.
    #[serde(default)]
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            duration: 1800.0,
            plant: PlantConfig::default(),
            controller: ControllerKind::csmc(5.0, 0.3),
            disturbance: DisturbanceSchedule::default(),
            reference: 1.0,
            initial_state: 0.9,
            delay_steps: 0,
            state_bounds: StateBounds::default(),
            evaluation: EvaluationCriteria::default(),
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Number of samples in a trajectory, `floor(duration / dt)`.
    pub fn step_count(&self) -> usize {
        (self.duration / self.dt + STEP_COUNT_TOLERANCE).floor() as usize
    }

    pub fn time_at(&self, step: usize) -> f64 {
        step as f64 * self.dt
    }

    pub fn with_controller(mut self, controller: ControllerKind) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_plant_model(mut self, model: PlantModel) -> Self {
        self.plant.model = model;
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimError::invalid(
                "dt",
                format!("must be finite and > 0, got {}", self.dt),
            ));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(SimError::invalid(
                "duration",
                format!("must be finite and > 0, got {}", self.duration),
            ));
        }
        if self.step_count() == 0 {
            return Err(SimError::invalid(
                "duration",
                format!(
                    "must cover at least one step of dt = {} (got {})",
                    self.dt, self.duration
                ),
            ));
        }

        self.plant.validate()?;
        self.controller.validate()?;
        self.disturbance.validate()?;

        if !self.reference.is_finite() {
            return Err(SimError::invalid("reference", "must be finite"));
        }

        let bounds = self.state_bounds;
        if !(bounds.lower.is_finite() && bounds.upper.is_finite() && bounds.lower < bounds.upper) {
            return Err(SimError::invalid(
                "state_bounds",
                format!(
                    "must be finite with lower < upper, got [{}, {}]",
                    bounds.lower, bounds.upper
                ),
            ));
        }
        if !(self.initial_state.is_finite() && bounds.contains(self.initial_state)) {
            return Err(SimError::invalid(
                "initial_state",
                format!(
                    "must lie inside state_bounds [{}, {}], got {}",
                    bounds.lower, bounds.upper, self.initial_state
                ),
            ));
        }

        let eval = self.evaluation;
        if !(eval.band_half_width.is_finite() && eval.band_half_width >= 0.0) {
            return Err(SimError::invalid(
                "evaluation.band_half_width",
                format!("must be finite and >= 0, got {}", eval.band_half_width),
            ));
        }
        if !eval.failure_threshold.is_finite() {
            return Err(SimError::invalid(
                "evaluation.failure_threshold",
                "must be finite",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ControllerKind, SimulationConfig, StateBounds};
    use crate::SimError;

    fn assert_rejects(config: &SimulationConfig, parameter: &str) {
        match config.validate() {
            Err(SimError::InvalidConfig { parameter: p, .. }) => assert_eq!(p, parameter),
            other => panic!("expected rejection of {parameter}, got {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.step_count(), 180_000);
    }

    #[test]
    fn step_count_floors_ratio() {
        let config = SimulationConfig {
            duration: 1.0,
            dt: 0.3,
            ..SimulationConfig::default()
        };
        assert_eq!(config.step_count(), 3);

        let config = SimulationConfig {
            duration: 360.0,
            dt: 0.01,
            ..SimulationConfig::default()
        };
        assert_eq!(config.step_count(), 36_000);
    }

    #[test]
    fn zero_boundary_layer_is_rejected() {
        let config = SimulationConfig::default().with_controller(ControllerKind::csmc(5.0, 0.0));
        assert_rejects(&config, "controller.csmc.boundary_layer");
    }

    #[test]
    fn non_positive_dt_and_duration_are_rejected() {
        let mut config = SimulationConfig::default();
        config.dt = 0.0;
        assert_rejects(&config, "dt");

        let mut config = SimulationConfig::default();
        config.duration = -5.0;
        assert_rejects(&config, "duration");

        let mut config = SimulationConfig::default();
        config.duration = 0.001;
        assert_rejects(&config, "duration");
    }

    #[test]
    fn initial_state_outside_clamp_is_rejected() {
        let mut config = SimulationConfig::default();
        config.state_bounds = StateBounds::new(-1.5, 1.5);
        config.initial_state = 2.0;
        assert_rejects(&config, "initial_state");
    }

    #[test]
    fn negative_band_width_is_rejected() {
        let mut config = SimulationConfig::default();
        config.evaluation.band_half_width = -0.1;
        assert_rejects(&config, "evaluation.band_half_width");
        let (lo, hi) = SimulationConfig::default().evaluation.band(1.0);
        assert!((lo - 0.8).abs() < 1e-12 && (hi - 1.2).abs() < 1e-12);
    }

    #[test]
    fn unknown_controller_name_is_rejected() {
        let err = ControllerKind::from_name("bang-bang", 5.0, 0.3).unwrap_err();
        assert!(matches!(err, SimError::UnknownKind { what: "controller", .. }));
    }

    #[test]
    fn chattering_uses_narrow_boundary_layer() {
        match ControllerKind::chattering(10.0) {
            ControllerKind::Csmc {
                gain,
                boundary_layer,
            } => {
                assert_eq!(gain, 10.0);
                assert_eq!(boundary_layer, 0.01);
            }
            other => panic!("unexpected controller {other:?}"),
        }
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = SimulationConfig::default()
            .with_controller(ControllerKind::Pid(Default::default()));
        let raw = serde_json::to_string(&config).expect("serialize");
        let back: SimulationConfig = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(config, back);
    }
}
