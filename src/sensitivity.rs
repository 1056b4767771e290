//! Sensitivity sweeps
//!
//! A sweep is either a list of methods run against one base configuration or
//! the cartesian product of C-SMC gains, boundary layers and pulse
//! magnitudes. Both reduce to labelled Monte Carlo combinations.

use serde::{Deserialize, Serialize};

use crate::config::{ControllerKind, SimulationConfig};
use crate::disturbance::PulseWindow;
use crate::monte_carlo::{run_monte_carlo, MethodSpec, MonteCarloConfig};
use crate::stats::AggregateResult;
use crate::SimError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    /// C-SMC gains `K`
    pub gains: Vec<f64>,
    /// Boundary layers `phi`
    pub boundary_layers: Vec<f64>,
    /// Pulse magnitudes `d`
    pub pulse_magnitudes: Vec<f64>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            gains: vec![3.0, 5.0, 7.0],
            boundary_layers: vec![0.2, 0.3, 0.4],
            pulse_magnitudes: vec![-2.0, -2.5, -3.0],
        }
    }
}

impl ParameterGrid {
    pub fn len(&self) -> usize {
        self.gains.len() * self.boundary_layers.len() * self.pulse_magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid points with gain outermost and pulse magnitude innermost.
    pub fn points(&self) -> Vec<ParameterPoint> {
        let mut points = Vec::with_capacity(self.len());
        for &gain in &self.gains {
            for &boundary_layer in &self.boundary_layers {
                for &pulse_magnitude in &self.pulse_magnitudes {
                    points.push(ParameterPoint {
                        gain,
                        boundary_layer,
                        pulse_magnitude,
                    });
                }
            }
        }
        points
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let axes = [
            ("grid.gains", &self.gains),
            ("grid.boundary_layers", &self.boundary_layers),
            ("grid.pulse_magnitudes", &self.pulse_magnitudes),
        ];
        for (name, values) in axes {
            if values.is_empty() {
                return Err(SimError::invalid(name, "axis must not be empty"));
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(SimError::invalid(name, "values must be finite"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterPoint {
    pub gain: f64,
    pub boundary_layer: f64,
    pub pulse_magnitude: f64,
}

impl ParameterPoint {
    pub fn label(&self) -> String {
        format!(
            "K={} phi={} d={}",
            self.gain, self.boundary_layer, self.pulse_magnitude
        )
    }

    pub fn apply(&self, base: &SimulationConfig) -> SimulationConfig {
        let mut config = base
            .clone()
            .with_controller(ControllerKind::csmc(self.gain, self.boundary_layer));
        config.disturbance.pulse_magnitude = self.pulse_magnitude;
        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepAxes {
    Methods(Vec<MethodSpec>),
    Grid(ParameterGrid),
    /// Explicit grid points, run in the given order.
    Points(Vec<ParameterPoint>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKey {
    Method(String),
    Point(ParameterPoint),
}

/// Aggregates of a sweep in combination order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepResult {
    pub entries: Vec<(SweepKey, AggregateResult)>,
}

/// Success rates over the (K, phi) plane at one pulse magnitude.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessGrid {
    pub pulse_magnitude: f64,
    pub gains: Vec<f64>,
    pub boundary_layers: Vec<f64>,
    /// `rates[i][j]` is the success percentage at `gains[i]`, `boundary_layers[j]`.
    pub rates: Vec<Vec<f64>>,
}

impl SweepResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn aggregates(&self) -> impl Iterator<Item = &AggregateResult> {
        self.entries.iter().map(|(_, agg)| agg)
    }

    pub fn method(&self, label: &str) -> Option<&AggregateResult> {
        self.entries.iter().find_map(|(key, agg)| match key {
            SweepKey::Method(name) if name == label => Some(agg),
            _ => None,
        })
    }

    pub fn point(
        &self,
        gain: f64,
        boundary_layer: f64,
        pulse_magnitude: f64,
    ) -> Option<&AggregateResult> {
        self.entries.iter().find_map(|(key, agg)| match key {
            SweepKey::Point(p)
                if p.gain == gain
                    && p.boundary_layer == boundary_layer
                    && p.pulse_magnitude == pulse_magnitude =>
            {
                Some(agg)
            }
            _ => None,
        })
    }

    fn grid_points(&self) -> impl Iterator<Item = &ParameterPoint> {
        self.entries.iter().filter_map(|(key, _)| match key {
            SweepKey::Point(p) => Some(p),
            SweepKey::Method(_) => None,
        })
    }

    /// Success grid indexed by (K, phi) at `pulse_magnitude`.
    ///
    /// Returns `None` if the sweep holds no grid point at that magnitude.
    pub fn success_grid(&self, pulse_magnitude: f64) -> Option<SuccessGrid> {
        let mut gains = Vec::new();
        let mut boundary_layers = Vec::new();
        for p in self.grid_points().filter(|p| p.pulse_magnitude == pulse_magnitude) {
            if !gains.contains(&p.gain) {
                gains.push(p.gain);
            }
            if !boundary_layers.contains(&p.boundary_layer) {
                boundary_layers.push(p.boundary_layer);
            }
        }
        if gains.is_empty() {
            return None;
        }

        let rates = gains
            .iter()
            .map(|&gain| {
                boundary_layers
                    .iter()
                    .map(|&phi| {
                        self.point(gain, phi, pulse_magnitude)
                            .map_or(f64::NAN, AggregateResult::success_rate_percent)
                    })
                    .collect()
            })
            .collect();

        Some(SuccessGrid {
            pulse_magnitude,
            gains,
            boundary_layers,
            rates,
        })
    }

    /// Success rate per pulse magnitude at a fixed (K, phi).
    ///
    /// A magnitude that appears more than once keeps its first entry.
    pub fn disturbance_table(&self, gain: f64, boundary_layer: f64) -> Vec<(f64, f64)> {
        let mut rows: Vec<(f64, f64)> = Vec::new();
        for (key, agg) in &self.entries {
            if let SweepKey::Point(p) = key {
                if p.gain == gain
                    && p.boundary_layer == boundary_layer
                    && !rows.iter().any(|(m, _)| *m == p.pulse_magnitude)
                {
                    rows.push((p.pulse_magnitude, agg.success_rate_percent()));
                }
            }
        }
        rows
    }
}

fn point_runs(
    base: &SimulationConfig,
    points: Vec<ParameterPoint>,
) -> Result<(Vec<SweepKey>, Vec<(String, SimulationConfig)>), SimError> {
    if base.disturbance.pulse == PulseWindow::Off {
        if let Some(first) = points.first() {
            if points.iter().any(|p| p.pulse_magnitude != first.pulse_magnitude) {
                return Err(SimError::invalid(
                    "grid.pulse_magnitudes",
                    "base configuration has no pulse window, so magnitudes cannot differ",
                ));
            }
        }
    }
    Ok(points
        .into_iter()
        .map(|p| (SweepKey::Point(p), (p.label(), p.apply(base))))
        .unzip())
}

/// Runs every combination named by `axes` against `base`.
pub fn run_sweep(
    base: &SimulationConfig,
    axes: &SweepAxes,
    mc: &MonteCarloConfig,
) -> Result<SweepResult, SimError> {
    let (keys, runs): (Vec<SweepKey>, Vec<(String, SimulationConfig)>) = match axes {
        SweepAxes::Methods(methods) => {
            if methods.is_empty() {
                return Err(SimError::invalid("methods", "must name at least one method"));
            }
            methods
                .iter()
                .map(|m| {
                    (
                        SweepKey::Method(m.label.clone()),
                        (m.label.clone(), base.clone().with_controller(m.controller)),
                    )
                })
                .unzip()
        }
        SweepAxes::Grid(grid) => {
            grid.validate()?;
            point_runs(base, grid.points())?
        }
        SweepAxes::Points(points) => {
            if points.is_empty() {
                return Err(SimError::invalid("points", "must name at least one grid point"));
            }
            point_runs(base, points.clone())?
        }
    };

    tracing::info!(combinations = runs.len(), "running sensitivity sweep");
    let aggregates = run_monte_carlo(&runs, mc)?;

    Ok(SweepResult {
        entries: keys.into_iter().zip(aggregates).collect(),
    })
}
