//! One complete timing run: identify the device, run preflight, sweep, and
//! put the output offset back.

use crate::config::HarnessConfig;
use crate::device::DeviceGateway;
use crate::device::properties::{build_info, get_output_offset, set_output_offset};
use crate::error::Result;
use crate::preflight::{PreflightFailure, StreamInfo, run_preflight};
use crate::sweep::{SweepRecord, run_sweep};
use crate::trial::run_glitch_trial;
use chrono::{DateTime, Local};
use tracing::{error, info, warn};

/// State scoped to one run, passed explicitly to every trial.
#[derive(Debug, Clone)]
pub struct RunContext {
    config: HarnessConfig,
    output_file: String,
}

impl RunContext {
    /// Context whose result file is named after `started_at`, so artifacts
    /// from earlier runs can never be mistaken for ours.
    pub fn new(config: HarnessConfig, started_at: DateTime<Local>) -> Self {
        let output_file = format!(
            "{}{}.txt",
            config.trial.output_file_prefix,
            started_at.format("%Y%m%d_%H%M%S")
        );
        Self {
            config,
            output_file,
        }
    }

    pub fn starting_now(config: HarnessConfig) -> Self {
        Self::new(config, Local::now())
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Device path the test app writes its report to.
    pub fn output_file(&self) -> &str {
        &self.output_file
    }
}

/// Writes the original output offset back when dropped, if armed.
pub struct OffsetGuard<'a> {
    gateway: &'a dyn DeviceGateway,
    original_us: i64,
    armed: bool,
}

impl<'a> OffsetGuard<'a> {
    pub fn new(gateway: &'a dyn DeviceGateway, original_us: i64, armed: bool) -> Self {
        Self {
            gateway,
            original_us,
            armed,
        }
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Restore now and report any transport error.
    pub fn restore(mut self) -> Result<()> {
        self.armed = false;
        set_output_offset(self.gateway, self.original_us)?;
        info!(offset_us = self.original_us, "output offset restored");
        Ok(())
    }
}

impl Drop for OffsetGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match set_output_offset(self.gateway, self.original_us) {
            Ok(()) => info!(offset_us = self.original_us, "output offset restored"),
            Err(e) => error!(
                offset_us = self.original_us,
                error = %e,
                "failed to restore output offset"
            ),
        }
    }
}

/// Run `f`, then write the current output offset back whether `f`
/// succeeds, reports a failure, or hits a transport error.
pub fn with_offset_restored<T>(
    gateway: &dyn DeviceGateway,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let initial_offset = get_output_offset(gateway)?;
    let guard = OffsetGuard::new(gateway, initial_offset, true);
    let value = f()?;
    guard.restore()?;
    Ok(value)
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Preflight passed and the sweep ran (possibly halting early).
    Swept {
        stream: StreamInfo,
        record: SweepRecord,
    },
    /// Preflight failed; no sweep was attempted.
    Skipped(PreflightFailure),
}

/// Run preflight and, if it passes, the glitch sweep.
///
/// Once the sweep starts the initial offset is restored on every exit
/// path, including a transport error. A failed preflight restores it only
/// when `preflight.restore_offset_on_failure` is set.
pub fn run_timing_series(
    gateway: &dyn DeviceGateway,
    ctx: &RunContext,
) -> Result<SessionOutcome> {
    println!("output file = {}", ctx.output_file());

    let initial_offset = get_output_offset(gateway)?;
    println!("initial offset = {initial_offset}");

    let build = build_info(gateway)?;
    println!("Android version = {}", build.id);
    println!("    release {}", build.release);

    let config = ctx.config();
    let mut guard = OffsetGuard::new(
        gateway,
        initial_offset,
        config.preflight.restore_offset_on_failure,
    );

    let stream = match run_preflight(gateway, ctx)? {
        Ok(stream) => stream,
        Err(failure) => {
            println!("ERROR: {failure}");
            if !guard.is_armed() {
                warn!(
                    initial_offset,
                    "preflight failed, output offset not restored"
                );
            }
            return Ok(SessionOutcome::Skipped(failure));
        }
    };

    guard.arm();
    let record = run_sweep(&config.sweep, |offset_us| {
        run_glitch_trial(gateway, ctx, offset_us)
    })?;
    guard.restore()?;

    Ok(SessionOutcome::Swept { stream, record })
}
