//! Plant dynamics
//!
//! Drift models of the controlled cognitive state and the Euler-Maruyama
//! update that advances them by one step:
//!
//! `x' = x + (f(x) + u + g*d) dt + sigma sqrt(dt) N(0, 1)`
//!
//! followed by a hard clamp to the configured state range.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SimulationConfig;
use crate::SimError;

pub const PLANT_KINDS: &str = "double-well, ornstein-uhlenbeck, drift-diffusion";

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PlantModel {
    /// Bistable potential `V(x) = -a/2 x^2 + b/4 x^4`, drift `a x - b x^3`.
    DoubleWell { a: f64, b: f64 },
    /// Mean reversion towards the reference, drift `theta (r - x)`.
    OrnsteinUhlenbeck { theta: f64 },
    /// Constant drift `v` (drift-diffusion model).
    DriftDiffusion { drift: f64 },
}

impl PlantModel {
    pub fn drift(&self, x: f64, reference: f64) -> f64 {
        match *self {
            PlantModel::DoubleWell { a, b } => a * x - b * x * x * x,
            PlantModel::OrnsteinUhlenbeck { theta } => theta * (reference - x),
            PlantModel::DriftDiffusion { drift } => drift,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlantModel::DoubleWell { .. } => "double-well",
            PlantModel::OrnsteinUhlenbeck { .. } => "ornstein-uhlenbeck",
            PlantModel::DriftDiffusion { .. } => "drift-diffusion",
        }
    }

    /// Builds a model from its kebab-case name with the given parameters.
    ///
    /// `p1` is `a`, `theta` or the drift; `p2` is `b` and ignored otherwise.
    pub fn from_name(name: &str, p1: f64, p2: f64) -> Result<Self, SimError> {
        match name {
            "double-well" => Ok(PlantModel::DoubleWell { a: p1, b: p2 }),
            "ornstein-uhlenbeck" | "ou" => Ok(PlantModel::OrnsteinUhlenbeck { theta: p1 }),
            "drift-diffusion" | "ddm" => Ok(PlantModel::DriftDiffusion { drift: p1 }),
            other => Err(SimError::UnknownKind {
                what: "plant",
                name: other.to_string(),
                expected: PLANT_KINDS,
            }),
        }
    }

    fn validate(&self) -> Result<(), SimError> {
        let finite = match *self {
            PlantModel::DoubleWell { a, b } => a.is_finite() && b.is_finite(),
            PlantModel::OrnsteinUhlenbeck { theta } => theta.is_finite(),
            PlantModel::DriftDiffusion { drift } => drift.is_finite(),
        };
        if !finite {
            return Err(SimError::invalid(
                "plant.model",
                format!("{} parameters must be finite", self.name()),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlantConfig {
    pub model: PlantModel,
    /// Diffusion scale of the Wiener increment.
    pub sigma: f64,
    /// Gain applied to the disturbance inside the plant.
    #[serde(default = "unit_gain")]
    pub disturbance_gain: f64,
}

fn unit_gain() -> f64 {
    1.0
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            model: PlantModel::DoubleWell { a: 1.0, b: 1.0 },
            sigma: 0.1,
            disturbance_gain: 1.0,
        }
    }
}

impl PlantConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        self.model.validate()?;
        if !(self.sigma.is_finite() && self.sigma >= 0.0) {
            return Err(SimError::invalid(
                "plant.sigma",
                format!("must be finite and >= 0, got {}", self.sigma),
            ));
        }
        if !self.disturbance_gain.is_finite() {
            return Err(SimError::invalid(
                "plant.disturbance_gain",
                "must be finite",
            ));
        }
        Ok(())
    }
}

/// The raw Euler-Maruyama update left the finite range.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("state update produced non-finite value {value}")]
pub struct NonFiniteState {
    pub value: f64,
}

/// Advances the plant by one step and clamps the result.
///
/// Draws exactly one standard normal sample from `rng`.
pub fn step<R: Rng + ?Sized>(
    x_prev: f64,
    u: f64,
    d: f64,
    config: &SimulationConfig,
    rng: &mut R,
) -> Result<f64, NonFiniteState> {
    let plant = &config.plant;
    let dt = config.dt;

    let z: f64 = rng.sample(StandardNormal);
    let drift = plant.model.drift(x_prev, config.reference);
    let raw = x_prev + (drift + u + plant.disturbance_gain * d) * dt + plant.sigma * dt.sqrt() * z;

    if !raw.is_finite() {
        return Err(NonFiniteState { value: raw });
    }
    Ok(config.state_bounds.clamp(raw))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{step, PlantConfig, PlantModel};
    use crate::config::{SimulationConfig, StateBounds};

    fn noiseless(model: PlantModel) -> SimulationConfig {
        SimulationConfig {
            plant: PlantConfig {
                model,
                sigma: 0.0,
                disturbance_gain: 1.0,
            },
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn double_well_equilibria_have_zero_drift() {
        let model = PlantModel::DoubleWell { a: 1.0, b: 1.0 };
        assert_eq!(model.drift(1.0, 1.0), 0.0);
        assert_eq!(model.drift(-1.0, 1.0), 0.0);
        assert_eq!(model.drift(0.0, 1.0), 0.0);
        assert!(model.drift(0.5, 1.0) > 0.0);
        assert!(model.drift(1.5, 1.0) < 0.0);
    }

    #[test]
    fn ou_drift_reverts_to_reference() {
        let model = PlantModel::OrnsteinUhlenbeck { theta: 0.5 };
        assert!((model.drift(0.0, 1.0) - 0.5).abs() < 1e-12);
        assert!((model.drift(2.0, 1.0) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn euler_step_without_noise_matches_formula() {
        let config = noiseless(PlantModel::OrnsteinUhlenbeck { theta: 0.5 });
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let x = step(0.5, 0.2, -0.1, &config, &mut rng).expect("finite step");
        let expected = 0.5 + (0.5 * 0.5 + 0.2 - 0.1) * config.dt;
        assert!((x - expected).abs() < 1e-12);
    }

    #[test]
    fn step_clamps_to_bounds() {
        let mut config = noiseless(PlantModel::DriftDiffusion { drift: 0.0 });
        config.state_bounds = StateBounds::new(-1.5, 1.5);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let x = step(1.4, 1_000.0, 0.0, &config, &mut rng).expect("finite step");
        assert_eq!(x, 1.5);
        let x = step(-1.4, -1_000.0, 0.0, &config, &mut rng).expect("finite step");
        assert_eq!(x, -1.5);
    }

    #[test]
    fn non_finite_update_is_reported() {
        let config = noiseless(PlantModel::DriftDiffusion { drift: 0.0 });
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(step(0.0, f64::NAN, 0.0, &config, &mut rng).is_err());
        assert!(step(0.0, f64::INFINITY, 0.0, &config, &mut rng).is_err());
    }

    #[test]
    fn unknown_plant_name_is_rejected() {
        assert!(PlantModel::from_name("triple-well", 1.0, 1.0).is_err());
        assert_eq!(
            PlantModel::from_name("ou", 0.5, 0.0).unwrap(),
            PlantModel::OrnsteinUhlenbeck { theta: 0.5 }
        );
    }
}
