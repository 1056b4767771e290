use std::fs;
use std::path::PathBuf;

use csmc::scenarios::{self, PlantFamily};
use csmc::{Execution, ParameterGrid};
use csmc_bench::commands;
use csmc_bench::settings::Settings;

fn quick_settings(duration: f64) -> Settings {
    Settings {
        n_trials: Some(2),
        execution: Execution::Sequential,
        simulation: Some(scenarios::baseline_comparison().with_duration(duration)),
        ..Settings::default()
    }
}

#[test]
fn shipped_config_parses() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs/baseline.toml");
    let settings = Settings::from_toml_file(&path).expect("baseline.toml is valid");
    assert_eq!(settings.methods.as_ref().map(Vec::len), Some(4));
    assert_eq!(settings.grid.as_ref().map(ParameterGrid::len), Some(27));
}

#[test]
fn compare_writes_summary_and_trials() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let report = commands::compare(&quick_settings(20.0), tmp.path()).expect("compare");

    assert!(report.contains("C-SMC"));
    assert!(report.contains("No Control"));
    for file in ["summary.csv", "trials.csv", "trajectories.csv", "summary.json", "manifest.json"] {
        assert!(tmp.path().join(file).is_file(), "missing {file}");
    }
    let trials = fs::read_to_string(tmp.path().join("trials.csv")).expect("read trials");
    assert_eq!(trials.lines().count(), 1 + 4 * 2);
}

#[test]
fn sensitivity_uses_configured_grid() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        grid: Some(ParameterGrid {
            gains: vec![3.0, 5.0],
            boundary_layers: vec![0.3],
            pulse_magnitudes: vec![-2.5],
        }),
        ..quick_settings(10.0)
    };
    let report = commands::sensitivity(&settings, tmp.path()).expect("sensitivity");
    assert!(report.contains("Success rate"));

    let rows = fs::read_to_string(tmp.path().join("sensitivity.csv")).expect("read sweep");
    assert_eq!(rows.lines().count(), 3);
}

#[test]
fn default_grids_share_the_nominal_point_once() {
    let tmp = tempfile::tempdir().expect("tempdir");
    commands::sensitivity(&quick_settings(10.0), tmp.path()).expect("sensitivity");

    let rows = fs::read_to_string(tmp.path().join("sensitivity.csv")).expect("read sweep");
    // 9 gain/layer points plus 3 magnitudes, sharing K=5 phi=0.3 d=-2.5.
    assert_eq!(rows.lines().count(), 1 + 11);
    let nominal = rows
        .lines()
        .filter(|line| line.contains("K=5 phi=0.3 d=-2.5"))
        .count();
    assert_eq!(nominal, 1);
}

#[test]
fn verify_writes_verdict() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        simulation: Some(scenarios::appendix_verification().with_duration(30.0)),
        ..quick_settings(30.0)
    };
    let report = commands::verify(&settings, tmp.path()).expect("verify");
    assert!(report.contains("Compliance Rate"));
    assert!(tmp.path().join("verification.json").is_file());
}

#[test]
fn phases_cover_requested_family() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let settings = Settings {
        n_trials: Some(1),
        execution: Execution::Sequential,
        ..Settings::default()
    };
    let report =
        commands::phases(&settings, &[PlantFamily::DoubleWell], tmp.path()).expect("phases");
    assert!(report.contains("Phase 4: Optimized C-SMC"));
    assert!(report.contains("High Sensitivity"));
}

#[test]
fn calibration_writes_series() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let report = commands::calibration(&Settings::default(), tmp.path()).expect("calibrate");
    assert!(report.contains("Fitted a ="));
    let rows = fs::read_to_string(tmp.path().join("calibration.csv")).expect("read series");
    assert_eq!(rows.lines().count(), 1801);
}
