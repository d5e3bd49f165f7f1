//! One glitch or latency trial at a given output offset.
//!
//! A trial is linear: set the offset, clear any stale result file, launch
//! the test activity, wait for the report, then interpret it. Unusable
//! reports come back as [`TrialOutcome::Failed`]; only transport errors are
//! returned as `Err`.

use crate::device::DeviceGateway;
use crate::device::properties::{
    OUTPUT_OFFSET_PROPERTY, get_property, remove_file, set_output_offset,
};
use crate::error::Result;
use crate::poller::await_result;
use crate::report::Report;
use crate::session::RunContext;
use tracing::{debug, info};

pub const PEAK_AMPLITUDE: &str = "peak.amplitude";
pub const GLITCH_COUNT: &str = "glitch.count";
pub const LATENCY_MSEC: &str = "latency.msec";

/// Which test the on-device app runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialKind {
    Glitch,
    Latency,
}

impl TrialKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Glitch => "glitch",
            Self::Latency => "latency",
        }
    }
}

/// Why a trial produced no usable measurement.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrialFailure {
    #[error("no {0}")]
    MissingField(&'static str),

    #[error("invalid {field} = {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("peakAmplitude = {peak} < {minimum}, turn up volume")]
    QuietSignal { peak: f64, minimum: f64 },
}

/// Result of one trial.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome<T> {
    Measured(T),
    Failed(TrialFailure),
}

impl<T> TrialOutcome<T> {
    pub fn measured(&self) -> Option<&T> {
        match self {
            Self::Measured(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl<T> From<std::result::Result<T, TrialFailure>> for TrialOutcome<T> {
    fn from(result: std::result::Result<T, TrialFailure>) -> Self {
        match result {
            Ok(value) => Self::Measured(value),
            Err(failure) => Self::Failed(failure),
        }
    }
}

/// `am start` arguments for a trial writing its report to `file`.
pub fn launch_args(
    kind: TrialKind,
    component: &str,
    file: &str,
    buffer_bursts: u32,
) -> Vec<String> {
    let mut args: Vec<String> = ["shell", "am", "start", "-n", component]
        .into_iter()
        .map(str::to_owned)
        .collect();
    let mut extra = |flag: &str, key: &str, value: &str| {
        args.extend([flag.to_owned(), key.to_owned(), value.to_owned()]);
    };

    extra("--es", "test", kind.as_str());
    extra("--es", "file", file);
    if kind == TrialKind::Glitch {
        extra("--es", "in_perf", "lowlat");
        extra("--es", "out_perf", "lowlat");
        extra("--es", "in_sharing", "exclusive");
        extra("--es", "out_sharing", "exclusive");
    }
    extra("--ei", "buffer_bursts", &buffer_bursts.to_string());
    args
}

/// Reject a report whose signal is too quiet to trust.
///
/// Only amplitudes strictly below `minimum` fail.
pub fn check_peak_amplitude(
    report: &Report,
    minimum: f64,
) -> std::result::Result<f64, TrialFailure> {
    let peak = parse_f64(report, PEAK_AMPLITUDE)?;
    if peak < minimum {
        return Err(TrialFailure::QuietSignal { peak, minimum });
    }
    Ok(peak)
}

pub fn interpret_glitch_report(report: &Report, min_peak_amplitude: f64) -> TrialOutcome<u32> {
    let count = check_peak_amplitude(report, min_peak_amplitude).and_then(|_| {
        let raw = report
            .get(GLITCH_COUNT)
            .ok_or(TrialFailure::MissingField(GLITCH_COUNT))?;
        raw.trim()
            .parse::<u32>()
            .map_err(|_| TrialFailure::InvalidField {
                field: GLITCH_COUNT,
                value: raw.to_owned(),
            })
    });
    count.into()
}

pub fn interpret_latency_report(report: &Report) -> TrialOutcome<f64> {
    parse_f64(report, LATENCY_MSEC).into()
}

fn parse_f64(report: &Report, field: &'static str) -> std::result::Result<f64, TrialFailure> {
    match report.get_f64(field) {
        None => Err(TrialFailure::MissingField(field)),
        Some(Ok(value)) => Ok(value),
        Some(Err(value)) => Err(TrialFailure::InvalidField { field, value }),
    }
}

/// Run one trial and return the raw report.
///
/// An empty report means the app never wrote a result before the poll
/// timeout.
pub fn run_trial_report(
    gateway: &dyn DeviceGateway,
    ctx: &RunContext,
    kind: TrialKind,
    offset_us: i64,
) -> Result<Report> {
    println!("==========================");
    set_output_offset(gateway, offset_us)?;
    println!(
        "try offset = {}",
        get_property(gateway, OUTPUT_OFFSET_PROPERTY)?
    );
    remove_file(gateway, ctx.output_file());

    let config = ctx.config();
    let args = launch_args(
        kind,
        &config.device.component,
        ctx.output_file(),
        config.trial.buffer_bursts,
    );
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    info!(kind = kind.as_str(), offset_us, "launching trial");
    let launch_output = gateway.run(&args)?;
    println!("{}", launch_output.trim_end());

    await_result(gateway, ctx.output_file(), &config.poll)
}

/// Run a glitch trial and return the glitch count.
pub fn run_glitch_trial(
    gateway: &dyn DeviceGateway,
    ctx: &RunContext,
    offset_us: i64,
) -> Result<TrialOutcome<u32>> {
    let report = run_trial_report(gateway, ctx, TrialKind::Glitch, offset_us)?;
    let outcome = interpret_glitch_report(&report, ctx.config().trial.min_peak_amplitude);
    report_failure(&outcome, TrialKind::Glitch, offset_us);
    Ok(outcome)
}

/// Run a latency trial and return the measured latency in milliseconds.
pub fn run_latency_trial(
    gateway: &dyn DeviceGateway,
    ctx: &RunContext,
    offset_us: i64,
) -> Result<TrialOutcome<f64>> {
    let report = run_trial_report(gateway, ctx, TrialKind::Latency, offset_us)?;
    let outcome = interpret_latency_report(&report);
    report_failure(&outcome, TrialKind::Latency, offset_us);
    Ok(outcome)
}

fn report_failure<T>(outcome: &TrialOutcome<T>, kind: TrialKind, offset_us: i64) {
    if let Some(line) = failure_line(outcome) {
        println!("{line}");
        debug!(kind = kind.as_str(), offset_us, "trial failed");
    }
}

/// Operator-facing line for a failed trial; `None` when it measured.
fn failure_line<T>(outcome: &TrialOutcome<T>) -> Option<String> {
    match outcome {
        TrialOutcome::Measured(_) => None,
        TrialOutcome::Failed(failure) => Some(format!("ERROR {failure}")),
    }
}
