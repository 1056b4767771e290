use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use csmc::scenarios::PlantFamily;
use csmc::{Execution, MethodSpec, MonteCarloConfig, ParameterGrid, SeedStrategy, SimulationConfig};
use serde::{Deserialize, Serialize};

use crate::io::OUTPUT_SCHEMA_VERSION;

/// Experiment settings loaded from TOML.
///
/// Everything is optional; a missing value falls back to the preset of the
/// command being run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default = "default_schema")]
    pub schema_version: String,
    /// Base seed; overrides the preset's seed when set.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub n_trials: Option<usize>,
    #[serde(default)]
    pub seed_strategy: SeedStrategy,
    #[serde(default)]
    pub execution: Execution,
    /// Keep every n-th sample of exported example trajectories.
    #[serde(default = "default_stride")]
    pub trajectory_stride: usize,
    /// Replaces the preset base configuration.
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
    #[serde(default)]
    pub methods: Option<Vec<MethodSpec>>,
    #[serde(default)]
    pub grid: Option<ParameterGrid>,
    #[serde(default)]
    pub families: Option<Vec<PlantFamily>>,
}

fn default_schema() -> String {
    OUTPUT_SCHEMA_VERSION.to_string()
}

fn default_stride() -> usize {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema(),
            seed: None,
            n_trials: None,
            seed_strategy: SeedStrategy::default(),
            execution: Execution::default(),
            trajectory_stride: default_stride(),
            simulation: None,
            methods: None,
            grid: None,
            families: None,
        }
    }
}

impl Settings {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse TOML config: {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != OUTPUT_SCHEMA_VERSION {
            bail!(
                "config schema_version {} does not match output schema {}",
                self.schema_version,
                OUTPUT_SCHEMA_VERSION
            );
        }
        if self.n_trials == Some(0) {
            bail!("n_trials must be > 0");
        }
        if self.trajectory_stride == 0 {
            bail!("trajectory_stride must be > 0");
        }
        if let Some(config) = &self.simulation {
            config.validate().context("invalid [simulation] table")?;
        }
        if let Some(methods) = &self.methods {
            if methods.is_empty() {
                bail!("methods list cannot be empty");
            }
        }
        if let Some(grid) = &self.grid {
            grid.validate().context("invalid [grid] table")?;
        }
        Ok(())
    }

    /// Applies command-line flags on top of the file values.
    pub fn with_overrides(mut self, trials: Option<usize>, seed: Option<u64>, sequential: bool) -> Self {
        if trials.is_some() {
            self.n_trials = trials;
        }
        if seed.is_some() {
            self.seed = seed;
        }
        if sequential {
            self.execution = Execution::Sequential;
        }
        self
    }

    pub fn monte_carlo(&self, default_trials: usize) -> MonteCarloConfig {
        MonteCarloConfig {
            n_trials: self.n_trials.unwrap_or(default_trials),
            seed_strategy: self.seed_strategy,
            execution: self.execution,
        }
    }

    /// The configured base, or `preset`, with the seed override applied.
    pub fn base_or(&self, preset: SimulationConfig) -> SimulationConfig {
        let base = self.simulation.clone().unwrap_or(preset);
        self.seeded(base)
    }

    pub fn seeded(&self, config: SimulationConfig) -> SimulationConfig {
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

/// Loads `path` if given, otherwise the defaults.
pub fn load(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(path) => Settings::from_toml_file(path),
        None => Ok(Settings::default()),
    }
}
