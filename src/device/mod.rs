//! Device command gateway.
//!
//! Every interaction with the phone goes through [`DeviceGateway`], so the
//! trial runner, poller and preflight checks never depend on how the device
//! is reached. [`AdbGateway`] is the production transport.

pub mod adb;
pub mod properties;

pub use adb::AdbGateway;

use crate::error::Result;

/// Issues commands to a connected device.
///
/// `args` are the bridge arguments without the program name, for example
/// `["shell", "getprop", "ro.build.id"]`.
pub trait DeviceGateway {
    /// Run a command whose output is needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HarnessError::DeviceCommand`] if the tool cannot be
    /// reached or exits non-zero.
    fn run(&self, args: &[&str]) -> Result<String>;

    /// Run a command where only success matters. Never fails; a transport
    /// problem is reported as `false`.
    fn try_run(&self, args: &[&str]) -> bool;
}
