//! Trial runner
//!
//! Drives one closed-loop trajectory: seeded noise stream, disturbance,
//! control law, Euler-Maruyama plant step and clamp, then metric extraction.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::config::SimulationConfig;
use crate::controller::{build_controller, ControllerState};
use crate::disturbance::disturbance;
use crate::metrics::TrialResult;
use crate::plant;
use crate::SimError;

/// One row of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectorySample {
    pub t: f64,
    pub x: f64,
    pub u: f64,
    pub d: f64,
}

/// Time series produced by a single trial.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trajectory {
    time: Vec<f64>,
    state: Vec<f64>,
    control: Vec<f64>,
    disturbance: Vec<f64>,
}

impl Trajectory {
    fn with_capacity(n: usize) -> Self {
        Self {
            time: Vec::with_capacity(n),
            state: Vec::with_capacity(n),
            control: Vec::with_capacity(n),
            disturbance: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, t: f64, x: f64, u: f64, d: f64) {
        self.time.push(t);
        self.state.push(x);
        self.control.push(u);
        self.disturbance.push(d);
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn states(&self) -> &[f64] {
        &self.state
    }

    pub fn controls(&self) -> &[f64] {
        &self.control
    }

    pub fn disturbances(&self) -> &[f64] {
        &self.disturbance
    }

    pub fn sample(&self, n: usize) -> Option<TrajectorySample> {
        Some(TrajectorySample {
            t: *self.time.get(n)?,
            x: *self.state.get(n)?,
            u: *self.control.get(n)?,
            d: *self.disturbance.get(n)?,
        })
    }

    pub fn samples(&self) -> impl Iterator<Item = TrajectorySample> + '_ {
        (0..self.len()).filter_map(move |n| self.sample(n))
    }

    /// Keeps every `stride`-th sample; used to thin long runs before export.
    pub fn decimate(&self, stride: usize) -> Vec<TrajectorySample> {
        self.samples().step_by(stride.max(1)).collect()
    }
}

/// Runs one trial of `config` on the noise stream seeded by `seed`.
///
/// The same `(config, seed)` always yields a bit-identical trajectory.
pub fn run_trial(
    config: &SimulationConfig,
    seed: u64,
) -> Result<(Trajectory, TrialResult), SimError> {
    config.validate()?;
    let trajectory = simulate(config, seed)?;
    let result = TrialResult::from_trajectory(&trajectory, config);
    Ok((trajectory, result))
}

fn simulate(config: &SimulationConfig, seed: u64) -> Result<Trajectory, SimError> {
    let n_steps = config.step_count();
    let controller = build_controller(config);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut trajectory = Trajectory::with_capacity(n_steps);
    trajectory.push(
        0.0,
        config.initial_state,
        0.0,
        disturbance(0.0, config),
    );

    let mut controller_state = ControllerState::default();
    let mut x = config.initial_state;

    for step in 1..n_steps {
        let t = config.time_at(step);
        let d = disturbance(t, config);

        // Measurement lag only applies once enough history exists.
        let measured = match (step - 1).checked_sub(config.delay_steps) {
            Some(lagged) => trajectory.state[lagged],
            None => x,
        };

        let (u, next_state) = controller.control(measured, controller_state);
        controller_state = next_state;

        x = plant::step(x, u, d, config, &mut rng).map_err(|err| {
            tracing::debug!(step, t, value = err.value, "plant update left the finite range");
            SimError::NumericInstability {
                step,
                time: t,
                value: err.value,
            }
        })?;

        trajectory.push(t, x, u, d);
    }

    Ok(trajectory)
}
