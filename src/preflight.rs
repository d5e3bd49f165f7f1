//! Checks that must pass before a sweep is worth running.
//!
//! The sweep only means something when the shell is root (so properties can
//! be written) and the device actually uses the MMAP fast path in both
//! directions with an offset that moves the measured latency.

use crate::device::DeviceGateway;
use crate::device::properties::{
    MMAP_POLICY_PROPERTY, current_user, get_property, request_root,
};
use crate::error::Result;
use crate::report::Report;
use crate::session::RunContext;
use crate::trial::{
    TrialFailure, TrialKind, TrialOutcome, run_latency_trial, run_trial_report,
};
use tracing::{info, warn};

pub const OUT_BURST_FRAMES: &str = "out.burst.frames";
pub const OUT_CAPACITY_FRAMES: &str = "out.buffer.capacity.frames";
pub const OUT_RATE: &str = "out.rate";
pub const IN_MMAP: &str = "in.mmap";
pub const OUT_MMAP: &str = "out.mmap";

const ROOT_USER: &str = "root";

/// Why the device cannot run a meaningful sweep.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PreflightFailure {
    #[error("cannot set 'adb root', shell runs as {user:?}")]
    NotRoot { user: String },

    #[error("AAudio MMAP not enabled, aaudio.mmap_policy = {value:?} (need >= {minimum})")]
    MmapPolicyDisabled { value: String, minimum: i64 },

    #[error("latency report has no {0}")]
    MissingField(&'static str),

    #[error("invalid {field} = {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("capacity = {0}")]
    NegativeCapacity(i64),

    #[error("not using input fast path (in.mmap = {0:?})")]
    InputNotMmap(String),

    #[error("not using output fast path (out.mmap = {0:?})")]
    OutputNotMmap(String),

    #[error("latency probe at offset {offset_us} failed: {failure}")]
    ProbeFailed {
        offset_us: i64,
        failure: TrialFailure,
    },

    #[error(
        "latency not affected by changing offset: {low_ms} => {high_ms} msec, \
         expected an increase of at least {required_ms} msec"
    )]
    LatencyUnaffected {
        low_ms: f64,
        high_ms: f64,
        required_ms: f64,
    },
}

/// Outcome of one preflight check.
pub type Check<T> = std::result::Result<T, PreflightFailure>;

/// Output stream properties reported by a latency trial.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub burst_frames: Option<i64>,
    pub capacity_frames: i64,
    pub sample_rate: i64,
}

impl StreamInfo {
    /// Buffer capacity expressed as time.
    pub fn capacity_ms(&self) -> f64 {
        self.capacity_frames as f64 * 1000.0 / self.sample_rate as f64
    }
}

/// Make sure the device shell runs as root, asking adbd to restart as root
/// once if it does not.
pub fn check_root(gateway: &dyn DeviceGateway) -> Result<Check<()>> {
    let user = current_user(gateway)?;
    if user == ROOT_USER {
        return Ok(Ok(()));
    }

    println!("WARNING: changing to 'adb root'");
    warn!(user = %user, "device shell is not root, requesting adb root");
    if !request_root(gateway) {
        warn!("adb root returned failure");
    }

    let user = current_user(gateway)?;
    if user == ROOT_USER {
        Ok(Ok(()))
    } else {
        Ok(Err(PreflightFailure::NotRoot { user }))
    }
}

/// Interpret the MMAP policy property. Anything unparsable counts as disabled.
pub fn evaluate_mmap_policy(value: &str, minimum: i64) -> Check<i64> {
    match value.trim().parse::<i64>() {
        Ok(policy) if policy >= minimum => Ok(policy),
        _ => Err(PreflightFailure::MmapPolicyDisabled {
            value: value.trim().to_owned(),
            minimum,
        }),
    }
}

/// Validate the stream fields of a latency report.
pub fn evaluate_stream_info(report: &Report) -> Check<StreamInfo> {
    let burst_frames = match report.get_i64(OUT_BURST_FRAMES) {
        None => None,
        Some(Ok(frames)) => Some(frames),
        Some(Err(value)) => {
            return Err(PreflightFailure::InvalidField {
                field: OUT_BURST_FRAMES,
                value,
            });
        }
    };

    let capacity_frames = required_i64(report, OUT_CAPACITY_FRAMES)?;
    if capacity_frames < 0 {
        return Err(PreflightFailure::NegativeCapacity(capacity_frames));
    }

    let sample_rate = required_i64(report, OUT_RATE)?;
    if sample_rate <= 0 {
        return Err(PreflightFailure::InvalidField {
            field: OUT_RATE,
            value: sample_rate.to_string(),
        });
    }

    let in_mmap = required_str(report, IN_MMAP)?;
    if in_mmap.trim() != "yes" {
        return Err(PreflightFailure::InputNotMmap(in_mmap.trim().to_owned()));
    }
    let out_mmap = required_str(report, OUT_MMAP)?;
    if out_mmap.trim() != "yes" {
        return Err(PreflightFailure::OutputNotMmap(out_mmap.trim().to_owned()));
    }

    Ok(StreamInfo {
        burst_frames,
        capacity_frames,
        sample_rate,
    })
}

/// The high-offset latency must exceed the low one by half the buffer.
pub fn evaluate_latency_probe(low_ms: f64, high_ms: f64, capacity_ms: f64) -> Check<()> {
    let required_ms = capacity_ms / 2.0;
    if high_ms < low_ms + required_ms {
        return Err(PreflightFailure::LatencyUnaffected {
            low_ms,
            high_ms,
            required_ms,
        });
    }
    Ok(())
}

/// Verify the MMAP policy, the stream mode of both directions, and that the
/// output offset actually moves the measured latency.
pub fn check_fast_path(
    gateway: &dyn DeviceGateway,
    ctx: &RunContext,
) -> Result<Check<StreamInfo>> {
    let config = ctx.config();

    let policy = get_property(gateway, MMAP_POLICY_PROPERTY)?;
    if let Err(failure) = evaluate_mmap_policy(&policy, config.preflight.min_mmap_policy) {
        return Ok(Err(failure));
    }

    let low_offset = config.sweep.offset_min_us;
    let report = run_trial_report(gateway, ctx, TrialKind::Latency, low_offset)?;
    let stream = match evaluate_stream_info(&report) {
        Ok(stream) => stream,
        Err(failure) => return Ok(Err(failure)),
    };
    match stream.burst_frames {
        Some(frames) => println!("burst = {frames}"),
        None => println!("burst = unknown"),
    }
    println!("capacityMillis = {}", stream.capacity_ms());

    let high_offset = config.sweep.probe_high_offset_us();
    let low_ms = match probe_latency(gateway, ctx, low_offset)? {
        Ok(ms) => ms,
        Err(failure) => return Ok(Err(failure)),
    };
    let high_ms = match probe_latency(gateway, ctx, high_offset)? {
        Ok(ms) => ms,
        Err(failure) => return Ok(Err(failure)),
    };
    println!("latency = {low_ms} => {high_ms}");

    Ok(evaluate_latency_probe(low_ms, high_ms, stream.capacity_ms()).map(|()| stream))
}

fn probe_latency(
    gateway: &dyn DeviceGateway,
    ctx: &RunContext,
    offset_us: i64,
) -> Result<Check<f64>> {
    Ok(match run_latency_trial(gateway, ctx, offset_us)? {
        TrialOutcome::Measured(ms) => Ok(ms),
        TrialOutcome::Failed(failure) => {
            Err(PreflightFailure::ProbeFailed { offset_us, failure })
        }
    })
}

/// Root check followed by the fast-path check.
pub fn run_preflight(
    gateway: &dyn DeviceGateway,
    ctx: &RunContext,
) -> Result<Check<StreamInfo>> {
    if let Err(failure) = check_root(gateway)? {
        return Ok(Err(failure));
    }
    let result = check_fast_path(gateway, ctx)?;
    if let Ok(stream) = &result {
        info!(
            capacity_frames = stream.capacity_frames,
            sample_rate = stream.sample_rate,
            "preflight passed"
        );
    }
    Ok(result)
}

fn required_str<'a>(report: &'a Report, field: &'static str) -> Check<&'a str> {
    report.get(field).ok_or(PreflightFailure::MissingField(field))
}

fn required_i64(report: &Report, field: &'static str) -> Check<i64> {
    match report.get_i64(field) {
        None => Err(PreflightFailure::MissingField(field)),
        Some(Ok(value)) => Ok(value),
        Some(Err(value)) => Err(PreflightFailure::InvalidField { field, value }),
    }
}
