//! Scripted stress disturbance
//!
//! A slow sinusoidal baseline plus one pulse window. The value is a pure
//! function of simulated time, so trials never carry disturbance state.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::SimError;

/// Where the adverse pulse sits on the time axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "timing", rename_all = "snake_case")]
pub enum PulseWindow {
    /// No pulse at all.
    Off,
    /// Absolute seconds, independent of the trial duration.
    Absolute { start: f64, end: f64 },
    /// Fractions of the trial duration, e.g. `0.4..=0.4667`.
    Fraction { start: f64, end: f64 },
}

impl PulseWindow {
    /// Inclusive `[start, end]` in seconds for a trial of `duration`.
    pub fn resolve(&self, duration: f64) -> Option<(f64, f64)> {
        match *self {
            PulseWindow::Off => None,
            PulseWindow::Absolute { start, end } => Some((start, end)),
            PulseWindow::Fraction { start, end } => Some((start * duration, end * duration)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisturbanceSchedule {
    /// Amplitude of the periodic baseline stress.
    pub amplitude: f64,
    /// Period of the baseline stress [s].
    pub period: f64,
    pub pulse: PulseWindow,
    /// Added inside the pulse window; negative for an adverse shock.
    pub pulse_magnitude: f64,
}

impl Default for DisturbanceSchedule {
    fn default() -> Self {
        Self {
            amplitude: 0.5,
            period: 150.0,
            pulse: PulseWindow::Absolute {
                start: 720.0,
                end: 840.0,
            },
            pulse_magnitude: -2.5,
        }
    }
}

impl DisturbanceSchedule {
    /// No baseline wave and no pulse.
    pub fn quiet() -> Self {
        Self {
            amplitude: 0.0,
            pulse: PulseWindow::Off,
            pulse_magnitude: 0.0,
            ..Self::default()
        }
    }

    pub fn with_pulse_magnitude(mut self, magnitude: f64) -> Self {
        self.pulse_magnitude = magnitude;
        self
    }

    pub fn value_at(&self, t: f64, duration: f64) -> f64 {
        let mut d = self.amplitude * (TAU * t / self.period).sin();
        if let Some((start, end)) = self.pulse.resolve(duration) {
            if start <= t && t <= end {
                d += self.pulse_magnitude;
            }
        }
        d
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !self.amplitude.is_finite() {
            return Err(SimError::invalid("disturbance.amplitude", "must be finite"));
        }
        if !(self.period.is_finite() && self.period > 0.0) {
            return Err(SimError::invalid(
                "disturbance.period",
                format!("must be finite and > 0, got {}", self.period),
            ));
        }
        if !self.pulse_magnitude.is_finite() {
            return Err(SimError::invalid(
                "disturbance.pulse_magnitude",
                "must be finite",
            ));
        }
        match self.pulse {
            PulseWindow::Off => {}
            PulseWindow::Absolute { start, end } => {
                if !(start.is_finite() && end.is_finite() && start <= end) {
                    return Err(SimError::invalid(
                        "disturbance.pulse",
                        format!("absolute window must satisfy start <= end, got [{start}, {end}]"),
                    ));
                }
            }
            PulseWindow::Fraction { start, end } => {
                if !((0.0..=1.0).contains(&start) && (0.0..=1.0).contains(&end) && start <= end) {
                    return Err(SimError::invalid(
                        "disturbance.pulse",
                        format!("fractional window must lie in [0, 1] with start <= end, got [{start}, {end}]"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Disturbance acting on the plant at simulated time `t`.
pub fn disturbance(t: f64, config: &SimulationConfig) -> f64 {
    config.disturbance.value_at(t, config.duration)
}

#[cfg(test)]
mod tests {
    use super::{DisturbanceSchedule, PulseWindow};

    #[test]
    fn pulse_is_added_on_inclusive_window() {
        let schedule = DisturbanceSchedule {
            amplitude: 0.0,
            period: 150.0,
            pulse: PulseWindow::Absolute {
                start: 720.0,
                end: 840.0,
            },
            pulse_magnitude: -2.5,
        };

        assert_eq!(schedule.value_at(719.99, 1800.0), 0.0);
        assert_eq!(schedule.value_at(720.0, 1800.0), -2.5);
        assert_eq!(schedule.value_at(840.0, 1800.0), -2.5);
        assert_eq!(schedule.value_at(840.01, 1800.0), 0.0);
    }

    #[test]
    fn baseline_wave_follows_period() {
        let schedule = DisturbanceSchedule {
            pulse: PulseWindow::Off,
            ..DisturbanceSchedule::default()
        };

        assert!(schedule.value_at(0.0, 1800.0).abs() < 1e-12);
        assert!((schedule.value_at(37.5, 1800.0) - 0.5).abs() < 1e-12);
        assert!((schedule.value_at(112.5, 1800.0) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn fractional_window_scales_with_duration() {
        let schedule = DisturbanceSchedule {
            amplitude: 0.0,
            pulse: PulseWindow::Fraction {
                start: 0.4,
                end: 0.5,
            },
            pulse_magnitude: -4.0,
            ..DisturbanceSchedule::default()
        };

        assert_eq!(schedule.value_at(150.0, 360.0), -4.0);
        assert_eq!(schedule.value_at(150.0, 1800.0), 0.0);
        assert_eq!(schedule.value_at(800.0, 1800.0), -4.0);
    }

    #[test]
    fn rejects_non_positive_period() {
        let schedule = DisturbanceSchedule {
            period: 0.0,
            ..DisturbanceSchedule::default()
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn rejects_inverted_window() {
        let schedule = DisturbanceSchedule {
            pulse: PulseWindow::Absolute {
                start: 840.0,
                end: 720.0,
            },
            ..DisturbanceSchedule::default()
        };
        assert!(schedule.validate().is_err());
    }
}
