//! featqa — QA checks for feat analysis directories.
//!
//! Opens one feat-style output directory, cross-references its artifacts
//! against the design specification, and prints the resulting warnings as
//! text lines or a JSON report. Exits 0 when the directory is clean, 1
//! when there are findings to review, 2 on a fatal error.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use nifti::{IntoNdArray, NiftiObject, NiftiVolume, ReaderOptions};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use featqa_core::{
    Analysis, CheckConfig, CheckRunner, QaReport, Volume, VolumeError, VolumeSource,
};

#[derive(Parser)]
#[command(name = "featqa")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Quality assurance checks for feat analysis directories", long_about = None)]
struct Cli {
    /// Feat directory to validate
    #[arg(short = 'd', long = "featdir")]
    featdir: PathBuf,

    /// VIF above this flags a design column as collinear
    #[arg(long, default_value_t = 5.0)]
    threshold: f64,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Initialise the global tracing subscriber.
///
/// Respects `RUST_LOG` when set; safe to call only once per process.
fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .ok();
}

/// NIfTI-backed implementation of the volume loader seam.
struct NiftiVolumeSource;

impl VolumeSource for NiftiVolumeSource {
    fn load(&self, path: &Path) -> Result<Volume, VolumeError> {
        if !path.is_file() {
            return Err(VolumeError::Missing(path.to_path_buf()));
        }
        let unreadable = |reason: String| VolumeError::Unreadable {
            path: path.to_path_buf(),
            reason,
        };

        let object = ReaderOptions::new()
            .read_file(path)
            .map_err(|e| unreadable(e.to_string()))?;
        let volume = object.into_volume();
        let dims: Vec<usize> = volume.dim().iter().map(|&d| d as usize).collect();
        let data: Vec<f64> = volume
            .into_ndarray::<f64>()
            .map_err(|e| unreadable(e.to_string()))?
            .iter()
            .copied()
            .collect();
        Volume::new(dims, data)
    }
}

fn run(cli: &Cli) -> anyhow::Result<QaReport> {
    let mut analysis = Analysis::open(&cli.featdir)
        .with_context(|| format!("opening feat directory {}", cli.featdir.display()))?;

    let config = CheckConfig {
        vif_threshold: cli.threshold,
        ..CheckConfig::default()
    };
    let report = CheckRunner::new(config).run(&mut analysis, &NiftiVolumeSource);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.passed() {
        println!("{}: no warnings", cli.featdir.display());
    } else {
        for warning in &report.warnings {
            println!("{warning}");
        }
        println!("{} warning(s)", report.warning_count());
    }

    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(report) if report.passed() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
