//! Baseline controllers used only for comparison against C-SMC.

use crate::config::{PidGains, RuleTable};
use crate::controller::{ControlLaw, ControllerState};

/// Open loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoControl;

impl ControlLaw for NoControl {
    fn name(&self) -> &'static str {
        "none"
    }

    fn control(&self, _measured: f64, state: ControllerState) -> (f64, ControllerState) {
        (0.0, state)
    }
}

/// Discrete PID on `e = r - x` with a clipped output.
#[derive(Debug, Clone, Copy)]
pub struct PidController {
    gains: PidGains,
    reference: f64,
    dt: f64,
}

impl PidController {
    pub fn new(gains: PidGains, reference: f64, dt: f64) -> Self {
        Self {
            gains,
            reference,
            dt,
        }
    }
}

impl ControlLaw for PidController {
    fn name(&self) -> &'static str {
        "pid"
    }

    fn control(&self, measured: f64, state: ControllerState) -> (f64, ControllerState) {
        let error = self.reference - measured;
        let integral = state.integral + error * self.dt;
        let derivative = (error - state.prev_error) / self.dt;

        let raw = self.gains.kp * error + self.gains.ki * integral + self.gains.kd * derivative;
        let limit = self.gains.output_limit;
        let u = raw.clamp(-limit, limit);

        (
            u,
            ControllerState {
                integral,
                prev_error: error,
            },
        )
    }
}

/// Stateless threshold intervention.
#[derive(Debug, Clone, Copy)]
pub struct RuleBasedController {
    table: RuleTable,
}

impl RuleBasedController {
    pub fn new(table: RuleTable) -> Self {
        Self { table }
    }
}

impl ControlLaw for RuleBasedController {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn control(&self, measured: f64, state: ControllerState) -> (f64, ControllerState) {
        let u = if measured < self.table.strong_below {
            self.table.strong_output
        } else if measured < self.table.moderate_below {
            self.table.moderate_output
        } else {
            0.0
        };
        (u, state)
    }
}
