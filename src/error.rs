//! Error types for the DSP timing harness.

/// Top-level error type for the harness.
///
/// Only transport and setup problems are errors. A trial that produced an
/// unusable report is a [`crate::trial::TrialFailure`] value, and a device
/// that cannot run the sweep is a [`crate::preflight::PreflightFailure`].
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The device-control tool could not be spawned or exited non-zero.
    #[error("device command `{command}` failed: {reason}")]
    DeviceCommand { command: String, reason: String },

    /// A device command succeeded but printed something we cannot interpret.
    #[error("unexpected {what}: {output:?}")]
    UnexpectedOutput { what: String, output: String },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, HarnessError>;
