//! `adb` transport for [`DeviceGateway`].

use super::DeviceGateway;
use crate::config::DeviceConfig;
use crate::error::{HarnessError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Reaches the device through the Android Debug Bridge.
#[derive(Debug, Clone)]
pub struct AdbGateway {
    program: PathBuf,
    serial: Option<String>,
}

impl AdbGateway {
    pub fn new(program: impl Into<PathBuf>, serial: Option<String>) -> Self {
        Self {
            program: program.into(),
            serial,
        }
    }

    /// Build a gateway from config.
    ///
    /// Uses `adb_path` when set, otherwise the first `adb` on `PATH`, and
    /// finally the bare name so the OS reports a clear spawn error.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let program = config
            .adb_path
            .clone()
            .or_else(|| which::which("adb").ok())
            .unwrap_or_else(|| PathBuf::from("adb"));
        Self::new(program, config.serial.clone())
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        cmd
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut parts = vec![self.program.display().to_string()];
        if let Some(serial) = &self.serial {
            parts.push("-s".to_owned());
            parts.push(serial.clone());
        }
        parts.extend(args.iter().map(|a| (*a).to_owned()));
        parts.join(" ")
    }
}

impl DeviceGateway for AdbGateway {
    fn run(&self, args: &[&str]) -> Result<String> {
        let description = self.describe(args);
        debug!(command = %description, "running device command");

        let output = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| HarnessError::DeviceCommand {
                command: description.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::DeviceCommand {
                command: description,
                reason: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn try_run(&self, args: &[&str]) -> bool {
        let description = self.describe(args);
        match self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => {
                debug!(
                    command = %description,
                    success = status.success(),
                    "device command finished"
                );
                status.success()
            }
            Err(e) => {
                debug!(command = %description, error = %e, "device command could not start");
                false
            }
        }
    }
}
