//! Bounded wait for the result file written by the on-device test.
//!
//! The file is treated as a scoped resource: [`RemoteArtifact`] removes it
//! from the device when dropped, so a result can never leak into the next
//! trial whether the wait succeeded, timed out, or failed mid-read.

use crate::config::PollConfig;
use crate::device::DeviceGateway;
use crate::device::properties::{file_exists, read_file, remove_file};
use crate::error::Result;
use crate::report::Report;
use tracing::{debug, warn};

/// A result file on the device, removed on drop.
pub struct RemoteArtifact<'a> {
    gateway: &'a dyn DeviceGateway,
    path: &'a str,
}

impl<'a> RemoteArtifact<'a> {
    pub fn new(gateway: &'a dyn DeviceGateway, path: &'a str) -> Self {
        Self { gateway, path }
    }

    pub fn path(&self) -> &str {
        self.path
    }

    pub fn exists(&self) -> bool {
        file_exists(self.gateway, self.path)
    }

    pub fn read(&self) -> Result<String> {
        read_file(self.gateway, self.path)
    }
}

impl Drop for RemoteArtifact<'_> {
    fn drop(&mut self) {
        if !remove_file(self.gateway, self.path) {
            warn!(path = self.path, "could not remove result file from device");
        }
    }
}

/// Wait for `path` to appear, read it, and remove it.
///
/// Checks up to `config.max_attempts` times, sleeping `config.delay_ms`
/// after each miss. A timeout is not an error: it yields an empty report,
/// and callers detect it through missing fields.
pub fn await_result(
    gateway: &dyn DeviceGateway,
    path: &str,
    config: &PollConfig,
) -> Result<Report> {
    let artifact = RemoteArtifact::new(gateway, path);

    for attempt in 0..config.max_attempts {
        if artifact.exists() {
            let text = artifact.read()?;
            debug!(path, attempt, bytes = text.len(), "result file ready");
            return Ok(Report::parse(&text));
        }
        println!("{attempt}: waiting until test finishes...");
        std::thread::sleep(config.delay());
    }

    warn!(
        path,
        attempts = config.max_attempts,
        "no result file before timeout"
    );
    Ok(Report::default())
}
