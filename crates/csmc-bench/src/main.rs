use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use csmc::scenarios::PlantFamily;
use tracing_subscriber::EnvFilter;

use csmc_bench::commands;
use csmc_bench::io::create_run_dir;
use csmc_bench::settings;

#[derive(Debug, Parser)]
#[command(name = "csmc-bench")]
#[command(about = "Monte Carlo evaluation of continuous sliding-mode control on stochastic state models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Monte Carlo trials per combination
    #[arg(long)]
    trials: Option<usize>,

    /// Base random seed
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "output-csmc-bench")]
    outdir: PathBuf,

    /// Run trials on the calling thread instead of the rayon pool
    #[arg(long, default_value_t = false)]
    sequential: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// No control vs PID vs rule-based vs C-SMC
    Compare(CommonArgs),
    /// K x phi success grid and disturbance robustness
    Sensitivity(CommonArgs),
    /// Rerun the appendix experiment and check the reported compliance
    Verify(CommonArgs),
    /// Phase 1-4 experiments and the open-loop contrast per plant family
    Phases {
        #[command(flatten)]
        common: CommonArgs,

        /// double-well, ornstein-uhlenbeck or drift-diffusion; all when omitted
        #[arg(long)]
        plant: Option<String>,
    },
    /// Fit the double-well model to a synthetic stress series
    Calibrate(CommonArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (common, name) = match &cli.command {
        Command::Compare(c) => (c, "compare"),
        Command::Sensitivity(c) => (c, "sensitivity"),
        Command::Verify(c) => (c, "verify"),
        Command::Phases { common, .. } => (common, "phases"),
        Command::Calibrate(c) => (c, "calibrate"),
    };

    let settings = settings::load(common.config.as_ref())?.with_overrides(
        common.trials,
        common.seed,
        common.sequential,
    );
    settings.validate()?;

    let outdir = create_run_dir(&common.outdir.join(name))?;
    tracing::info!(command = name, outdir = %outdir.display(), "run started");

    let report = match &cli.command {
        Command::Compare(_) => commands::compare(&settings, &outdir)?,
        Command::Sensitivity(_) => commands::sensitivity(&settings, &outdir)?,
        Command::Verify(_) => commands::verify(&settings, &outdir)?,
        Command::Phases { plant, .. } => {
            let families = match plant {
                Some(name) => vec![PlantFamily::from_name(name).context("invalid --plant")?],
                None => settings
                    .families
                    .clone()
                    .unwrap_or_else(|| PlantFamily::ALL.to_vec()),
            };
            commands::phases(&settings, &families, &outdir)?
        }
        Command::Calibrate(_) => commands::calibration(&settings, &outdir)?,
    };

    println!("{report}");
    println!("artifacts written to {}", outdir.display());
    Ok(())
}
