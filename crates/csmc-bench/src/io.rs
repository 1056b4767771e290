use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use csv::WriterBuilder;
use csmc::monte_carlo::TrialBatch;
use csmc::sensitivity::SweepKey;
use csmc::{AggregateResult, SweepResult, TrajectorySample};
use serde::Serialize;

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub command: String,
    pub created_utc: String,
    pub n_trials: usize,
    pub seed: u64,
    pub labels: Vec<String>,
    pub note: String,
}

fn fmt_f64(v: f64) -> String {
    format!("{v:.10}")
}

pub fn ensure_outdir(outdir: &Path) -> Result<()> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("failed to create output directory: {}", outdir.display()))
}

/// Creates a fresh `<base>/<UTC timestamp>` directory for one invocation.
pub fn create_run_dir(base: &Path) -> Result<PathBuf> {
    ensure_outdir(base)?;

    let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut candidate = base.join(&stamp);
    let mut suffix = 1_u32;
    while candidate.exists() {
        candidate = base.join(format!("{stamp}-{suffix:02}"));
        suffix += 1;
    }

    ensure_outdir(&candidate)?;
    Ok(candidate)
}

pub fn utc_now() -> String {
    Utc::now().to_rfc3339()
}

pub fn write_summary_csv(path: &Path, rows: &[AggregateResult]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open summary csv for writing: {}", path.display()))?;

    wtr.write_record([
        "label",
        "n_trials",
        "seed_first",
        "seed_last",
        "success_rate",
        "compliance_mean",
        "compliance_std",
        "compliance_sem",
        "avg_abs_error_mean",
        "avg_abs_error_sem",
        "chattering_mean",
        "chattering_sem",
        "schema_version",
    ])?;

    for row in rows {
        let (first, last) = row.seed_range().unwrap_or_default();
        wtr.write_record([
            row.label.as_str(),
            &row.n_trials.to_string(),
            &first.to_string(),
            &last.to_string(),
            &fmt_f64(row.success.mean),
            &fmt_f64(row.compliance.mean),
            &fmt_f64(row.compliance.std_dev),
            &fmt_f64(row.compliance.sem),
            &fmt_f64(row.avg_abs_error.mean),
            &fmt_f64(row.avg_abs_error.sem),
            &fmt_f64(row.chattering.mean),
            &fmt_f64(row.chattering.sem),
            OUTPUT_SCHEMA_VERSION,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_trials_csv(path: &Path, batches: &[TrialBatch]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open trials csv for writing: {}", path.display()))?;

    wtr.write_record([
        "label",
        "trial",
        "seed",
        "success",
        "compliance_rate",
        "avg_abs_error",
        "chattering_count",
        "min_state",
        "final_state",
    ])?;

    for batch in batches {
        for (trial, (seed, result)) in batch.seeds.iter().zip(&batch.trials).enumerate() {
            wtr.write_record([
                batch.label.as_str(),
                &trial.to_string(),
                &seed.to_string(),
                if result.success { "1" } else { "0" },
                &fmt_f64(result.compliance_rate),
                &fmt_f64(result.avg_abs_error),
                &result.chattering_count.to_string(),
                &fmt_f64(result.min_state),
                &fmt_f64(result.final_state),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_sweep_csv(path: &Path, sweep: &SweepResult) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open sweep csv for writing: {}", path.display()))?;

    wtr.write_record([
        "label",
        "gain",
        "boundary_layer",
        "pulse_magnitude",
        "success_rate",
        "compliance_mean",
        "avg_abs_error_mean",
        "chattering_mean",
    ])?;

    for (key, agg) in &sweep.entries {
        let (gain, phi, magnitude) = match key {
            SweepKey::Point(p) => (
                fmt_f64(p.gain),
                fmt_f64(p.boundary_layer),
                fmt_f64(p.pulse_magnitude),
            ),
            SweepKey::Method(_) => ("NA".to_string(), "NA".to_string(), "NA".to_string()),
        };
        wtr.write_record([
            agg.label.as_str(),
            &gain,
            &phi,
            &magnitude,
            &fmt_f64(agg.success.mean),
            &fmt_f64(agg.compliance.mean),
            &fmt_f64(agg.avg_abs_error.mean),
            &fmt_f64(agg.chattering.mean),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Example trajectories in long format, one row per (label, sample).
pub fn write_trajectories_csv(path: &Path, rows: &[(String, Vec<TrajectorySample>)]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| {
            format!(
                "failed to open trajectories csv for writing: {}",
                path.display()
            )
        })?;

    wtr.write_record(["label", "t", "x", "u", "d"])?;
    for (label, samples) in rows {
        for s in samples {
            wtr.write_record([
                label.as_str(),
                &fmt_f64(s.t),
                &fmt_f64(s.x),
                &fmt_f64(s.u),
                &fmt_f64(s.d),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_series_csv(path: &Path, dt: f64, observed: &[f64], predicted: &[f64]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open series csv for writing: {}", path.display()))?;

    wtr.write_record(["t", "observed", "predicted"])?;
    for (i, (o, p)) in observed.iter().zip(predicted).enumerate() {
        wtr.write_record([&fmt_f64(i as f64 * dt), &fmt_f64(*o), &fmt_f64(*p)])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_manifest_json(outdir: &Path, manifest: &Manifest) -> Result<PathBuf> {
    let path = outdir.join("manifest.json");
    write_json(&path, manifest)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{create_run_dir, write_trials_csv};
    use csmc::monte_carlo::TrialBatch;
    use csmc::TrialResult;

    #[test]
    fn run_dirs_do_not_collide() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let first = create_run_dir(tmp.path()).expect("first");
        let second = create_run_dir(tmp.path()).expect("second");
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
    }

    #[test]
    fn trials_csv_has_one_row_per_trial() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("trials.csv");
        let result = TrialResult {
            success: true,
            compliance_rate: 1.0,
            avg_abs_error: 0.0,
            chattering_count: 0,
            min_state: 1.0,
            final_state: 1.0,
        };
        let batch = TrialBatch {
            label: "C-SMC".to_string(),
            seeds: vec![4, 5],
            trials: vec![result, result],
        };
        write_trials_csv(&path, &[batch]).expect("write");
        let raw = std::fs::read_to_string(&path).expect("read");
        assert_eq!(raw.lines().count(), 3);
        assert!(raw.lines().nth(2).is_some_and(|l| l.starts_with("C-SMC,1,5,1,")));
    }
}
