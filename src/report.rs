//! Fixed-width text tables for terminal output.

use std::fmt::Write;

use crate::scenarios::Verification;
use crate::sensitivity::SuccessGrid;
use crate::stats::AggregateResult;

const RULE_WIDTH: usize = 70;

fn rule(out: &mut String, ch: char) {
    out.extend(std::iter::repeat(ch).take(RULE_WIDTH));
    out.push('\n');
}

/// Method, success %, mean |x - r| +/- sem, chattering +/- sem.
pub fn comparison_table(results: &[AggregateResult]) -> String {
    let mut out = String::new();
    rule(&mut out, '=');
    let _ = writeln!(
        out,
        "{:<20} {:>10} {:>18} {:>18}",
        "Method", "Success %", "Avg Error", "Chattering"
    );
    rule(&mut out, '-');
    for agg in results {
        let _ = writeln!(
            out,
            "{:<20} {:>10.1} {:>18} {:>18}",
            agg.label,
            agg.success_rate_percent(),
            format!("{:.4} ± {:.4}", agg.avg_abs_error.mean, agg.avg_abs_error.sem),
            format!("{:.1} ± {:.1}", agg.chattering.mean, agg.chattering.sem),
        );
    }
    rule(&mut out, '=');
    out
}

/// Compliance mean +/- std and range per label, in percent.
pub fn compliance_table(results: &[AggregateResult]) -> String {
    let mut out = String::new();
    rule(&mut out, '=');
    let _ = writeln!(
        out,
        "{:<36} {:>16} {:>16}",
        "Run", "Compliance %", "Range %"
    );
    rule(&mut out, '-');
    for agg in results {
        let c = agg.compliance_percent();
        let _ = writeln!(
            out,
            "{:<36} {:>16} {:>16}",
            agg.label,
            format!("{:.1} ± {:.1}", c.mean, c.std_dev),
            format!("[{:.1}, {:.1}]", c.min, c.max),
        );
    }
    rule(&mut out, '=');
    out
}

/// Success percentage per (K, phi) cell.
pub fn success_grid_table(grid: &SuccessGrid) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Success rate (%) at disturbance = {:.1}", grid.pulse_magnitude);
    let _ = write!(out, "{:>8}", "K \\ phi");
    for phi in &grid.boundary_layers {
        let _ = write!(out, " {:>8.2}", phi);
    }
    out.push('\n');
    for (gain, row) in grid.gains.iter().zip(&grid.rates) {
        let _ = write!(out, "{:>8.1}", gain);
        for rate in row {
            let _ = write!(out, " {:>8.1}", rate);
        }
        out.push('\n');
    }
    out
}

/// Success percentage per pulse magnitude.
pub fn disturbance_table(gain: f64, boundary_layer: f64, rows: &[(f64, f64)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Disturbance robustness (K={gain:.1}, phi={boundary_layer:.1})");
    for (magnitude, rate) in rows {
        let _ = writeln!(out, "  Disturbance = {magnitude:>5.1}: Success Rate = {rate:>5.1}%");
    }
    out
}

pub fn verification_summary(verdict: &Verification) -> String {
    let mut out = String::new();
    let observed = &verdict.observed;
    let reported = &verdict.reported;
    let _ = writeln!(
        out,
        "Compliance Rate: {:.1}% ± {:.1}% (n={})",
        observed.mean, observed.std_dev, observed.n
    );
    let _ = writeln!(out, "Range: [{:.1}%, {:.1}%]", observed.min, observed.max);
    if verdict.passed {
        let _ = writeln!(
            out,
            "PASS: consistent with reported values ({}% ± {}%)",
            reported.mean, reported.std_dev
        );
    } else {
        let _ = writeln!(
            out,
            "FAIL: expected {}% ± {}%, got {:.1}% ± {:.1}%",
            reported.mean, reported.std_dev, observed.mean, observed.std_dev
        );
    }
    out
}
