//! tgen runner
//!
//! Drives one verification run against a traffic-generator controller.
//!
//! - Reads a TOML run file (controller, expectation, waits, optional fault)
//! - Pushes the OTG topology JSON the run file points at
//! - Walks the run state machine and prints the run report
//! - Exits non-zero when the run fails, after printing where it stopped

mod config;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tgen_client::HttpController;
use tgen_verify::Run;
use tgen_verify::report::format_snapshot;
use tracing_subscriber::EnvFilter;

use crate::config::RunFile;

/// Traffic-generator verification runner.
#[derive(Parser, Debug)]
#[command(name = "tgen-runner", about = "Run one traffic-generator verification")]
struct Cli {
    /// TOML run file.
    #[arg(long)]
    run_file: PathBuf,

    /// Controller location, overriding the run file.
    #[arg(long)]
    controller: Option<String>,

    /// Do not log snapshot tables while polling.
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the final report as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let text = std::fs::read_to_string(&cli.run_file)
        .with_context(|| format!("reading run file {}", cli.run_file.display()))?;
    let mut run_file = RunFile::from_toml_str(&text)
        .with_context(|| format!("loading run file {}", cli.run_file.display()))?;

    if let Some(location) = cli.controller {
        run_file.controller.location = location;
    }
    if cli.headless {
        run_file.plan.report = false;
    }
    if let Some(path) = &run_file.topology {
        let path = relative_to(&cli.run_file, path);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading topology {}", path.display()))?;
        let topology: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing topology {}", path.display()))?;
        run_file.plan.topology = Some(topology);
    }

    tracing::info!(
        controller = %run_file.controller.location,
        packet_count = run_file.expectation.packet_count(),
        packet_rate = run_file.expectation.packet_rate(),
        fault = run_file.plan.fault.is_some(),
        "tgen-runner starting"
    );

    let controller = HttpController::new(&run_file.controller)?;
    let mut run = Run::new(&controller, run_file.plan, run_file.expectation);

    match run.execute().await {
        Ok(report) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
            Ok(())
        }
        Err(e) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(run.report())?);
            } else {
                println!("{}", run.report());
                if let Some(snapshot) = e.last_snapshot() {
                    println!("last observed:{}", format_snapshot(snapshot));
                }
            }
            Err(e.into())
        }
    }
}

/// Resolve `path` against the directory holding the run file.
fn relative_to(run_file: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    run_file
        .parent()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|| path.to_path_buf())
}
