//! Feedback control laws
//!
//! Every law maps the (possibly delayed) measured state to a control input.
//! Per-trial memory, which only the PID baseline uses, travels in an explicit
//! [`ControllerState`] value owned by the trial runner.

pub mod baselines;

use crate::config::{ControllerKind, SimulationConfig};

pub use baselines::{NoControl, PidController, RuleBasedController};

/// Memory threaded from one control step to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerState {
    /// Accumulated error integral
    pub integral: f64,
    /// Error seen on the previous step
    pub prev_error: f64,
}

pub trait ControlLaw: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the control input and the state for the next step.
    fn control(&self, measured: f64, state: ControllerState) -> (f64, ControllerState);
}

/// Continuous sliding-mode law with a `tanh` boundary layer.
///
/// The sliding variable is the tracking error `s = x - r`. The output is odd
/// and monotone in `s` and bounded by `gain`; `boundary_layer -> 0`
/// approaches `-gain * sign(s)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsmcController {
    pub gain: f64,
    pub boundary_layer: f64,
    pub reference: f64,
}

impl CsmcController {
    pub fn new(gain: f64, boundary_layer: f64, reference: f64) -> Self {
        Self {
            gain,
            boundary_layer,
            reference,
        }
    }

    pub fn sliding_variable(&self, x: f64) -> f64 {
        x - self.reference
    }

    pub fn output(&self, x: f64) -> f64 {
        let s = self.sliding_variable(x);
        -self.gain * (s / self.boundary_layer).tanh()
    }
}

impl ControlLaw for CsmcController {
    fn name(&self) -> &'static str {
        "csmc"
    }

    fn control(&self, measured: f64, state: ControllerState) -> (f64, ControllerState) {
        (self.output(measured), state)
    }
}

/// Builds the control law described by `config.controller`.
///
/// The configuration is expected to be validated already.
pub fn build_controller(config: &SimulationConfig) -> Box<dyn ControlLaw> {
    match config.controller {
        ControllerKind::None => Box::new(NoControl),
        ControllerKind::Pid(gains) => {
            Box::new(PidController::new(gains, config.reference, config.dt))
        }
        ControllerKind::Rule(table) => Box::new(RuleBasedController::new(table)),
        ControllerKind::Csmc {
            gain,
            boundary_layer,
        } => Box::new(CsmcController::new(gain, boundary_layer, config.reference)),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_controller, ControlLaw, ControllerState, CsmcController};
    use crate::config::{ControllerKind, SimulationConfig};

    #[test]
    fn csmc_is_zero_on_sliding_surface() {
        let law = CsmcController::new(5.0, 0.3, 1.0);
        assert_eq!(law.output(1.0), 0.0);
    }

    #[test]
    fn csmc_is_odd_around_reference() {
        let law = CsmcController::new(5.0, 0.3, 1.0);
        let up = law.output(1.2);
        let down = law.output(0.8);
        assert!(up < 0.0);
        assert!((up + down).abs() < 1e-12);
    }

    #[test]
    fn csmc_saturates_below_gain() {
        let law = CsmcController::new(5.0, 0.3, 1.0);
        let u = law.output(1.0 - 1.5);
        assert!(u > 4.5 && u < 5.0);
    }

    #[test]
    fn smaller_boundary_layer_is_steeper() {
        let wide = CsmcController::new(5.0, 1.0, 1.0);
        let narrow = CsmcController::new(5.0, 0.01, 1.0);
        assert!(narrow.output(0.95) > wide.output(0.95));
    }

    #[test]
    fn builder_dispatches_on_kind() {
        let config = SimulationConfig::default();
        for (kind, name) in [
            (ControllerKind::None, "none"),
            (ControllerKind::Pid(Default::default()), "pid"),
            (ControllerKind::Rule(Default::default()), "rule"),
            (ControllerKind::csmc(5.0, 0.3), "csmc"),
        ] {
            let law = build_controller(&config.clone().with_controller(kind));
            assert_eq!(law.name(), name);
            let (_, state) = law.control(1.0, ControllerState::default());
            assert!(state.integral.is_finite());
        }
    }
}
