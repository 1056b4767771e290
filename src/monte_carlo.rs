//! Monte Carlo driver
//!
//! Runs `n_trials` seeded trials for each labelled configuration, optionally
//! on the rayon pool, and reduces them to [`AggregateResult`]s. Work items are
//! `(combination, trial)` pairs collected back in index order, so sequential
//! and parallel execution produce identical results.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ControllerKind, PidGains, RuleTable, SimulationConfig};
use crate::metrics::TrialResult;
use crate::stats::AggregateResult;
use crate::trial::run_trial;
use crate::SimError;

pub const DEFAULT_TRIALS: usize = 100;

/// How per-trial seeds are derived from the base seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedStrategy {
    /// Trial `i` of every combination uses `base + i` (common random numbers).
    #[default]
    Shared,
    /// Seeds are mixed with the combination index so combinations are independent.
    PerCombination,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Execution {
    Sequential,
    #[default]
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub n_trials: usize,
    #[serde(default)]
    pub seed_strategy: SeedStrategy,
    #[serde(default)]
    pub execution: Execution,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_trials: DEFAULT_TRIALS,
            seed_strategy: SeedStrategy::Shared,
            execution: Execution::Parallel,
        }
    }
}

impl MonteCarloConfig {
    pub fn with_trials(n_trials: usize) -> Self {
        Self {
            n_trials,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.n_trials == 0 {
            return Err(SimError::invalid("n_trials", "must be at least 1"));
        }
        Ok(())
    }

    pub fn seed_for(&self, base: u64, combination: usize, trial: usize) -> u64 {
        derive_seed(self.seed_strategy, base, combination, trial)
    }
}

/// Deterministic seed of trial `trial` in combination `combination`.
pub fn derive_seed(strategy: SeedStrategy, base: u64, combination: usize, trial: usize) -> u64 {
    match strategy {
        SeedStrategy::Shared => base.wrapping_add(trial as u64),
        SeedStrategy::PerCombination => {
            let mixed = splitmix64(base ^ splitmix64(combination as u64));
            splitmix64(mixed.wrapping_add(trial as u64))
        }
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A labelled controller entered into a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub label: String,
    pub controller: ControllerKind,
}

impl MethodSpec {
    pub fn new(label: impl Into<String>, controller: ControllerKind) -> Self {
        Self {
            label: label.into(),
            controller,
        }
    }

    /// No control, PID, rule table and C-SMC with the given tuning.
    pub fn standard_set(gain: f64, boundary_layer: f64) -> Vec<Self> {
        vec![
            Self::new("No Control", ControllerKind::None),
            Self::new("PID", ControllerKind::Pid(PidGains::default())),
            Self::new("Rule-Based", ControllerKind::Rule(RuleTable::default())),
            Self::new("C-SMC", ControllerKind::csmc(gain, boundary_layer)),
        ]
    }
}

/// Raw per-trial results of one combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBatch {
    pub label: String,
    pub seeds: Vec<u64>,
    pub trials: Vec<TrialResult>,
}

impl TrialBatch {
    pub fn aggregate(&self) -> AggregateResult {
        AggregateResult::from_trials(self.label.clone(), self.seeds.clone(), &self.trials)
    }
}

/// Runs every labelled configuration and keeps the per-trial results.
///
/// The first failing trial, in combination/trial order, aborts the run.
pub fn run_batches(
    runs: &[(String, SimulationConfig)],
    mc: &MonteCarloConfig,
) -> Result<Vec<TrialBatch>, SimError> {
    mc.validate()?;
    for (_, config) in runs {
        config.validate()?;
    }

    let n_trials = mc.n_trials;
    tracing::info!(
        combinations = runs.len(),
        n_trials,
        execution = ?mc.execution,
        "starting monte carlo run"
    );

    let jobs: Vec<(usize, usize)> = (0..runs.len())
        .flat_map(|combo| (0..n_trials).map(move |trial| (combo, trial)))
        .collect();

    let run_job = |&(combo, trial): &(usize, usize)| -> Result<(u64, TrialResult), SimError> {
        let (label, config) = &runs[combo];
        let seed = mc.seed_for(config.seed, combo, trial);
        run_trial(config, seed)
            .map(|(_, result)| (seed, result))
            .map_err(|source| SimError::TrialFailed {
                label: label.clone(),
                trial,
                seed,
                source: Box::new(source),
            })
    };

    let outcomes: Vec<Result<(u64, TrialResult), SimError>> = match mc.execution {
        Execution::Sequential => jobs.iter().map(run_job).collect(),
        Execution::Parallel => jobs.par_iter().map(run_job).collect(),
    };

    let mut outcomes = outcomes.into_iter();
    let mut batches = Vec::with_capacity(runs.len());
    for (label, _) in runs {
        let mut seeds = Vec::with_capacity(n_trials);
        let mut trials = Vec::with_capacity(n_trials);
        for outcome in outcomes.by_ref().take(n_trials) {
            let (seed, result) = outcome.map_err(|err| {
                tracing::warn!(%err, "monte carlo run aborted");
                err
            })?;
            seeds.push(seed);
            trials.push(result);
        }
        tracing::debug!(label = %label, n_trials, "combination finished");
        batches.push(TrialBatch {
            label: label.clone(),
            seeds,
            trials,
        });
    }

    Ok(batches)
}

/// Runs every labelled configuration and reduces each to aggregate statistics.
pub fn run_monte_carlo(
    runs: &[(String, SimulationConfig)],
    mc: &MonteCarloConfig,
) -> Result<Vec<AggregateResult>, SimError> {
    Ok(run_batches(runs, mc)?
        .iter()
        .map(TrialBatch::aggregate)
        .collect())
}

/// Evaluates each method on `base` with the controller swapped in.
pub fn compare_methods(
    base: &SimulationConfig,
    methods: &[MethodSpec],
    mc: &MonteCarloConfig,
) -> Result<Vec<AggregateResult>, SimError> {
    let runs: Vec<(String, SimulationConfig)> = methods
        .iter()
        .map(|method| {
            (
                method.label.clone(),
                base.clone().with_controller(method.controller),
            )
        })
        .collect();
    run_monte_carlo(&runs, mc)
}

#[cfg(test)]
mod tests {
    use super::{
        compare_methods, derive_seed, run_batches, run_monte_carlo, Execution, MethodSpec,
        MonteCarloConfig, SeedStrategy,
    };
    use crate::config::{ControllerKind, SimulationConfig};
    use crate::plant::PlantModel;
    use crate::SimError;

    fn short_base() -> SimulationConfig {
        SimulationConfig::default().with_duration(20.0).with_seed(7)
    }

    #[test]
    fn shared_seeds_repeat_across_combinations() {
        for combo in 0..4 {
            assert_eq!(derive_seed(SeedStrategy::Shared, 100, combo, 3), 103);
        }
        let a = derive_seed(SeedStrategy::PerCombination, 100, 0, 3);
        let b = derive_seed(SeedStrategy::PerCombination, 100, 1, 3);
        assert_ne!(a, b);
        assert_eq!(a, derive_seed(SeedStrategy::PerCombination, 100, 0, 3));
    }

    #[test]
    fn sequential_and_parallel_runs_are_identical() {
        let methods = MethodSpec::standard_set(5.0, 0.3);
        let base = short_base();
        let sequential = compare_methods(
            &base,
            &methods,
            &MonteCarloConfig {
                n_trials: 6,
                seed_strategy: SeedStrategy::PerCombination,
                execution: Execution::Sequential,
            },
        )
        .expect("sequential run");
        let parallel = compare_methods(
            &base,
            &methods,
            &MonteCarloConfig {
                n_trials: 6,
                seed_strategy: SeedStrategy::PerCombination,
                execution: Execution::Parallel,
            },
        )
        .expect("parallel run");
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn batches_keep_labels_and_seed_order() {
        let base = short_base();
        let runs = vec![
            ("a".to_string(), base.clone()),
            ("b".to_string(), base.clone().with_controller(ControllerKind::None)),
        ];
        let batches = run_batches(&runs, &MonteCarloConfig::with_trials(3)).expect("run");
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].label, "a");
        assert_eq!(batches[1].seeds, vec![7, 8, 9]);
        assert_eq!(batches[1].trials.len(), 3);
    }

    #[test]
    fn zero_trials_is_rejected() {
        let runs = vec![("a".to_string(), short_base())];
        let err = run_monte_carlo(&runs, &MonteCarloConfig::with_trials(0)).unwrap_err();
        assert!(matches!(err, SimError::InvalidConfig { parameter: "n_trials", .. }));
    }

    #[test]
    fn unstable_trial_aborts_with_context() {
        // The cubic term overflows on the first update from the clamp edge.
        let mut base = short_base().with_plant_model(PlantModel::DoubleWell {
            a: 1.0,
            b: f64::MAX,
        });
        base.initial_state = 3.0;
        base.controller = ControllerKind::None;
        let runs = vec![("runaway".to_string(), base)];
        let err = run_monte_carlo(&runs, &MonteCarloConfig::with_trials(2)).unwrap_err();
        match err {
            SimError::TrialFailed {
                label,
                trial,
                seed,
                source,
            } => {
                assert_eq!(label, "runaway");
                assert_eq!(trial, 0);
                assert_eq!(seed, 7);
                assert!(matches!(*source, SimError::NumericInstability { step: 1, .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
