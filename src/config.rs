//! Configuration types for the DSP timing harness.
//!
//! Every field has a default equal to the fixed measurement constants, so an
//! empty (or missing) config file reproduces the standard sweep.

use crate::error::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// How to reach the device.
    pub device: DeviceConfig,
    /// Offset sweep range.
    pub sweep: SweepConfig,
    /// Per-trial parameters and validity thresholds.
    pub trial: TrialConfig,
    /// Result file polling.
    pub poll: PollConfig,
    /// Preflight thresholds.
    pub preflight: PreflightConfig,
}

/// Device bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Explicit path to the `adb` binary (None = look it up on `PATH`).
    pub adb_path: Option<PathBuf>,
    /// Device serial passed as `adb -s` (None = the only attached device).
    pub serial: Option<String>,
    /// Activity component that runs the tests.
    pub component: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb_path: None,
            serial: None,
            component: "com.mobileer.oboetester/.MainActivity".to_owned(),
        }
    }
}

/// Output offset sweep range, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// First offset tried (inclusive).
    pub offset_min_us: i64,
    /// End of the sweep (exclusive).
    pub offset_max_us: i64,
    /// Increment between trials. Must be positive.
    pub offset_step_us: i64,
    /// The latency probe runs its high trial at `offset_max_us + probe_margin_us`.
    pub probe_margin_us: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            offset_min_us: 0,
            offset_max_us: 4_000,
            offset_step_us: 100,
            probe_margin_us: 1_000,
        }
    }
}

impl SweepConfig {
    /// Offsets visited by the sweep, ascending.
    pub fn offsets(&self) -> std::iter::StepBy<std::ops::Range<i64>> {
        let step = usize::try_from(self.offset_step_us.max(1)).unwrap_or(usize::MAX);
        (self.offset_min_us..self.offset_max_us).step_by(step)
    }

    /// Offset used for the high side of the latency probe.
    pub fn probe_high_offset_us(&self) -> i64 {
        self.offset_max_us.saturating_add(self.probe_margin_us)
    }
}

/// Trial launch and validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    /// Peak amplitudes strictly below this are too quiet to trust.
    pub min_peak_amplitude: f64,
    /// Device path prefix for the per-run result file.
    pub output_file_prefix: String,
    /// `buffer_bursts` extra passed to every test.
    pub buffer_bursts: u32,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            min_peak_amplitude: 0.04,
            output_file_prefix: "/sdcard/dsp_timing_".to_owned(),
            buffer_bursts: 1,
        }
    }
}

/// Result file polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Number of existence checks before giving up.
    pub max_attempts: u32,
    /// Sleep between failed checks in milliseconds.
    pub delay_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_ms: 2_000,
        }
    }
}

impl PollConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Preflight settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    /// Minimum `aaudio.mmap_policy` that enables the MMAP path.
    pub min_mmap_policy: i64,
    /// Write the initial offset back when preflight fails.
    ///
    /// Off by default: a failed preflight historically leaves the offset
    /// where the latency probe put it.
    pub restore_offset_on_failure: bool,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            min_mmap_policy: 2,
            restore_offset_on_failure: false,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// [`HarnessConfig::validate`].
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| HarnessError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as TOML, creating parent directories.
    ///
    /// Backs `dsp-timing init-config`.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<()> {
        let body =
            toml::to_string_pretty(self).map_err(|e| HarnessError::Config(e.to_string()))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, format!("# dsp-timing settings\n\n{body}"))?;
        Ok(())
    }

    /// Returns the default config file path.
    ///
    /// `DSP_TIMING_CONFIG_DIR` overrides the directory; otherwise
    /// `dirs::config_dir()/dsp-timing/` is used.
    pub fn default_config_path() -> PathBuf {
        if let Some(dir) = std::env::var_os("DSP_TIMING_CONFIG_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        dirs::config_dir()
            .map(|d| d.join("dsp-timing"))
            .unwrap_or_else(|| PathBuf::from("/tmp/dsp-timing-config"))
            .join("config.toml")
    }

    /// Reject settings that would make the sweep or poller meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.sweep.offset_step_us <= 0 {
            return Err(HarnessError::Config(format!(
                "sweep.offset_step_us must be positive, got {}",
                self.sweep.offset_step_us
            )));
        }
        if self.sweep.offset_max_us <= self.sweep.offset_min_us {
            return Err(HarnessError::Config(format!(
                "sweep.offset_max_us ({}) must be greater than sweep.offset_min_us ({})",
                self.sweep.offset_max_us, self.sweep.offset_min_us
            )));
        }
        if self.poll.max_attempts == 0 {
            return Err(HarnessError::Config(
                "poll.max_attempts must be at least 1".to_owned(),
            ));
        }
        if self.trial.output_file_prefix.trim().is_empty() {
            return Err(HarnessError::Config(
                "trial.output_file_prefix must not be empty".to_owned(),
            ));
        }
        if self.device.component.trim().is_empty() {
            return Err(HarnessError::Config(
                "device.component must not be empty".to_owned(),
            ));
        }
        Ok(())
    }
}
