//! dsp-timing: characterize the DSP timing profile of an Android device.
//!
//! The harness sweeps the AAudio output MMAP offset
//! (`aaudio.out_mmap_offset_usec`) through `adb`, runs an OboeTester glitch
//! test at each step, and prints a table of offsets against glitch counts.
//!
//! # Architecture
//!
//! - **device**: [`device::DeviceGateway`] is the single choke point for
//!   talking to the phone; [`device::AdbGateway`] implements it over `adb`
//! - **report**: parses the flat `name=value` files the test app writes
//! - **poller**: waits for a result file and always removes it afterwards
//! - **trial**: one glitch or latency measurement at a given offset
//! - **sweep**: walks the offset range, halting at the first failed trial
//! - **preflight**: root and MMAP fast-path checks gating the sweep
//! - **session**: ties a full run together and restores the offset

pub mod config;
pub mod device;
pub mod error;
pub mod poller;
pub mod preflight;
pub mod report;
pub mod session;
pub mod sweep;
pub mod trial;

pub use config::HarnessConfig;
pub use device::{AdbGateway, DeviceGateway};
pub use error::{HarnessError, Result};
pub use report::Report;
pub use session::{RunContext, SessionOutcome, run_timing_series, with_offset_restored};
pub use sweep::SweepRecord;
pub use trial::{TrialFailure, TrialOutcome};
