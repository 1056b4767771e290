//! One function per CLI subcommand. Each runs its experiment, writes the
//! artifacts into `outdir` and returns the text report printed by the binary.

use std::path::Path;

use anyhow::{Context, Result};
use csmc::calibration::{calibrate, SyntheticSeriesConfig};
use csmc::monte_carlo::{run_batches, TrialBatch};
use csmc::report;
use csmc::scenarios::{
    self, baseline_methods, disturbance_grid, gain_layer_grid, PlantFamily,
};
use csmc::{
    run_sweep, run_trial, AggregateResult, ParameterGrid, ParameterPoint, SimulationConfig,
    SweepAxes, TrajectorySample,
};

use crate::io::{
    utc_now, write_json, write_manifest_json, write_series_csv, write_summary_csv,
    write_sweep_csv, write_trajectories_csv, write_trials_csv, Manifest, OUTPUT_SCHEMA_VERSION,
};
use crate::settings::Settings;

fn manifest(command: &str, n_trials: usize, seed: u64, labels: Vec<String>, note: &str) -> Manifest {
    Manifest {
        schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
        command: command.to_string(),
        created_utc: utc_now(),
        n_trials,
        seed,
        labels,
        note: note.to_string(),
    }
}

/// First trial of every run, thinned for plotting.
fn example_trajectories(
    runs: &[(String, SimulationConfig)],
    batches: &[TrialBatch],
    stride: usize,
) -> Result<Vec<(String, Vec<TrajectorySample>)>> {
    runs.iter()
        .zip(batches)
        .map(|((label, config), batch)| {
            let seed = batch.seeds.first().copied().unwrap_or(config.seed);
            let (trajectory, _) = run_trial(config, seed)
                .with_context(|| format!("failed to replay example trajectory for {label}"))?;
            Ok((label.clone(), trajectory.decimate(stride)))
        })
        .collect()
}

fn run_and_export(
    runs: &[(String, SimulationConfig)],
    settings: &Settings,
    default_trials: usize,
    outdir: &Path,
) -> Result<Vec<AggregateResult>> {
    let mc = settings.monte_carlo(default_trials);
    let batches = run_batches(runs, &mc).context("monte carlo run failed")?;
    export_batches(runs, &batches, settings, outdir)
}

fn export_batches(
    runs: &[(String, SimulationConfig)],
    batches: &[TrialBatch],
    settings: &Settings,
    outdir: &Path,
) -> Result<Vec<AggregateResult>> {
    let aggregates: Vec<AggregateResult> = batches.iter().map(TrialBatch::aggregate).collect();

    write_summary_csv(&outdir.join("summary.csv"), &aggregates)?;
    write_trials_csv(&outdir.join("trials.csv"), batches)?;
    let examples = example_trajectories(runs, batches, settings.trajectory_stride)?;
    write_trajectories_csv(&outdir.join("trajectories.csv"), &examples)?;
    write_json(&outdir.join("summary.json"), &aggregates)?;
    Ok(aggregates)
}

pub fn compare(settings: &Settings, outdir: &Path) -> Result<String> {
    let base = settings.base_or(scenarios::baseline_comparison());
    let methods = settings.methods.clone().unwrap_or_else(baseline_methods);
    let runs: Vec<(String, SimulationConfig)> = methods
        .iter()
        .map(|m| (m.label.clone(), base.clone().with_controller(m.controller)))
        .collect();

    let aggregates = run_and_export(&runs, settings, scenarios::BASELINE_TRIALS, outdir)?;
    let labels = runs.iter().map(|(label, _)| label.clone()).collect();
    write_manifest_json(
        outdir,
        &manifest(
            "compare",
            settings.monte_carlo(scenarios::BASELINE_TRIALS).n_trials,
            base.seed,
            labels,
            "Baseline controller comparison",
        ),
    )?;

    Ok(report::comparison_table(&aggregates))
}

pub fn sensitivity(settings: &Settings, outdir: &Path) -> Result<String> {
    let base = settings.base_or(scenarios::sensitivity_base());
    let mc = settings.monte_carlo(scenarios::SENSITIVITY_TRIALS);

    let grids: Vec<ParameterGrid> = match &settings.grid {
        Some(grid) => vec![grid.clone()],
        None => vec![gain_layer_grid(), disturbance_grid()],
    };

    // The default grids overlap at the nominal point; each point runs once.
    let mut points: Vec<ParameterPoint> = Vec::new();
    for grid in &grids {
        grid.validate().context("invalid sensitivity grid")?;
        for point in grid.points() {
            if !points.contains(&point) {
                points.push(point);
            }
        }
    }
    let combined =
        run_sweep(&base, &SweepAxes::Points(points), &mc).context("sensitivity sweep failed")?;
    write_sweep_csv(&outdir.join("sensitivity.csv"), &combined)?;
    write_json(&outdir.join("sensitivity.json"), &combined)?;

    let mut out = String::new();
    let mut magnitudes: Vec<f64> = Vec::new();
    for (key, _) in &combined.entries {
        if let csmc::SweepKey::Point(p) = key {
            if !magnitudes.contains(&p.pulse_magnitude) {
                magnitudes.push(p.pulse_magnitude);
            }
        }
    }
    for magnitude in magnitudes {
        if let Some(grid) = combined.success_grid(magnitude) {
            if grid.gains.len() > 1 || grid.boundary_layers.len() > 1 {
                out.push_str(&report::success_grid_table(&grid));
                out.push('\n');
            }
        }
    }
    if let csmc::ControllerKind::Csmc {
        gain,
        boundary_layer,
    } = base.controller
    {
        let rows = combined.disturbance_table(gain, boundary_layer);
        if rows.len() > 1 {
            out.push_str(&report::disturbance_table(gain, boundary_layer, &rows));
        }
    }

    let labels = combined.aggregates().map(|agg| agg.label.clone()).collect();
    write_manifest_json(
        outdir,
        &manifest("sensitivity", mc.n_trials, base.seed, labels, "C-SMC parameter sensitivity"),
    )?;
    Ok(out)
}

pub fn verify(settings: &Settings, outdir: &Path) -> Result<String> {
    let config = settings.base_or(scenarios::appendix_verification());
    let mc = settings.monte_carlo(scenarios::APPENDIX_TRIALS);
    let (batch, verdict) =
        scenarios::verify_appendix(&config, &mc).context("appendix verification failed")?;

    let runs = vec![(scenarios::APPENDIX_LABEL.to_string(), config.clone())];
    export_batches(&runs, &[batch], settings, outdir)?;
    write_json(&outdir.join("verification.json"), &verdict)?;
    write_manifest_json(
        outdir,
        &manifest(
            "verify",
            mc.n_trials,
            config.seed,
            vec![runs[0].0.clone()],
            "Appendix compliance verification",
        ),
    )?;

    Ok(report::verification_summary(&verdict))
}

pub fn phases(settings: &Settings, families: &[PlantFamily], outdir: &Path) -> Result<String> {
    let mut runs: Vec<(String, SimulationConfig)> = Vec::new();
    for family in families {
        for (label, config) in scenarios::phase_suite(*family)
            .into_iter()
            .chain(scenarios::open_loop_contrast(*family))
        {
            runs.push((format!("{} / {label}", family.name()), settings.seeded(config)));
        }
    }

    // Phase experiments are single illustrative runs unless asked otherwise.
    let aggregates = run_and_export(&runs, settings, 1, outdir)?;
    let labels = runs.iter().map(|(label, _)| label.clone()).collect();
    write_manifest_json(
        outdir,
        &manifest(
            "phases",
            settings.monte_carlo(1).n_trials,
            settings.seed.unwrap_or_default(),
            labels,
            "Phase 1-4 controller experiments and open-loop contrast",
        ),
    )?;

    Ok(report::compliance_table(&aggregates))
}

pub fn calibration(settings: &Settings, outdir: &Path) -> Result<String> {
    let seed = settings.seed.unwrap_or_default();
    let report = calibrate(&SyntheticSeriesConfig::default(), 0.05, seed).context("calibration failed")?;

    let series = csmc::calibration::synthetic_series(&SyntheticSeriesConfig::default(), seed)?;
    write_series_csv(
        &outdir.join("calibration.csv"),
        series.dt,
        &series.values,
        &report.validation.predicted,
    )?;
    write_json(&outdir.join("calibration.json"), &report)?;
    write_manifest_json(
        outdir,
        &manifest("calibrate", 1, seed, vec!["synthetic".to_string()], "Double-well calibration"),
    )?;

    let correlation = report
        .validation
        .correlation
        .map_or_else(|| "n/a".to_string(), |c| format!("{c:.4}"));
    Ok(format!(
        "Samples: {}\nMean state: {:.3}\nFitted a = {:.3}, b = {:.3}\nRMSE = {:.4}\nCorrelation = {}\n",
        report.samples, report.mean, report.fit.a, report.fit.b, report.validation.rmse, correlation
    ))
}
