//! CLI binary for dsp-timing.

use clap::{Parser, Subcommand};
use dsp_timing::preflight::run_preflight;
use dsp_timing::trial::{run_glitch_trial, run_latency_trial};
use dsp_timing::{
    AdbGateway, HarnessConfig, Report, RunContext, SessionOutcome, TrialOutcome,
    run_timing_series, with_offset_restored,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Sweep the AAudio MMAP output offset and record glitch counts.
#[derive(Parser)]
#[command(name = "dsp-timing", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial of the target device (overrides the config file).
    #[arg(short, long)]
    serial: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run preflight checks, then the full glitch sweep.
    Sweep,

    /// Only run the root and fast-path checks.
    Preflight,

    /// Run a single glitch trial.
    Glitch {
        /// Output offset in microseconds.
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Run a single latency trial.
    Latency {
        /// Output offset in microseconds.
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Print the fields of a report file saved locally.
    Inspect {
        /// Report file pulled from the device.
        file: PathBuf,
    },

    /// Write a config file holding the default settings.
    InitConfig {
        /// Destination (defaults to the standard config path).
        path: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr; stdout carries progress and the result table.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dsp_timing=info")),
        )
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Sweep);

    if let Command::InitConfig { path, force } = command {
        let path = path.unwrap_or_else(HarnessConfig::default_config_path);
        init_config(&path, force)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let config = resolve_config(
        cli.config.as_deref(),
        &HarnessConfig::default_config_path(),
        cli.serial,
    )?;

    match command {
        Command::Sweep => sweep(config),
        Command::Preflight => preflight(config),
        Command::Glitch { offset } => glitch(config, offset),
        Command::Latency { offset } => latency(config, offset),
        Command::Inspect { file } => {
            print!("{}", render_report(&Report::load_from_file(&file)?));
            Ok(())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

/// Load the explicit config if given, else `fallback` when it exists, else
/// defaults. A `--serial` flag replaces the configured serial.
fn resolve_config(
    explicit: Option<&Path>,
    fallback: &Path,
    serial: Option<String>,
) -> anyhow::Result<HarnessConfig> {
    let mut config = match explicit {
        Some(path) => HarnessConfig::from_file(path)?,
        None if fallback.exists() => HarnessConfig::from_file(fallback)?,
        None => HarnessConfig::default(),
    };
    if serial.is_some() {
        config.device.serial = serial;
    }
    Ok(config)
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    HarnessConfig::default().save_to_file(path)?;
    Ok(())
}

/// One `name = value` line per field, sorted by name.
fn render_report(report: &Report) -> String {
    report
        .sorted()
        .into_iter()
        .map(|(name, value)| format!("{name} = {value}\n"))
        .collect()
}

fn sweep(config: HarnessConfig) -> anyhow::Result<()> {
    let gateway = AdbGateway::from_config(&config.device);
    let ctx = RunContext::starting_now(config);
    match run_timing_series(&gateway, &ctx)? {
        SessionOutcome::Swept { record, .. } => {
            if record.halted() {
                tracing::warn!(trials = record.len(), "sweep halted early");
            }
            Ok(())
        }
        SessionOutcome::Skipped(failure) => {
            anyhow::bail!("timing series not supported on this device: {failure}")
        }
    }
}

fn preflight(config: HarnessConfig) -> anyhow::Result<()> {
    let gateway = AdbGateway::from_config(&config.device);
    let ctx = RunContext::starting_now(config);
    match with_offset_restored(&gateway, || run_preflight(&gateway, &ctx))? {
        Ok(stream) => {
            println!(
                "preflight passed: capacity = {} frames at {} Hz",
                stream.capacity_frames, stream.sample_rate
            );
            Ok(())
        }
        Err(failure) => anyhow::bail!("preflight failed: {failure}"),
    }
}

fn glitch(config: HarnessConfig, offset: i64) -> anyhow::Result<()> {
    let gateway = AdbGateway::from_config(&config.device);
    let ctx = RunContext::starting_now(config);
    match with_offset_restored(&gateway, || run_glitch_trial(&gateway, &ctx, offset))? {
        TrialOutcome::Measured(count) => {
            println!("offset = {offset}, glitches = {count}");
            Ok(())
        }
        TrialOutcome::Failed(failure) => anyhow::bail!("glitch trial failed: {failure}"),
    }
}

fn latency(config: HarnessConfig, offset: i64) -> anyhow::Result<()> {
    let gateway = AdbGateway::from_config(&config.device);
    let ctx = RunContext::starting_now(config);
    match with_offset_restored(&gateway, || run_latency_trial(&gateway, &ctx, offset))? {
        TrialOutcome::Measured(msec) => {
            println!("offset = {offset}, latency = {msec} msec");
            Ok(())
        }
        TrialOutcome::Failed(failure) => anyhow::bail!("latency trial failed: {failure}"),
    }
}
