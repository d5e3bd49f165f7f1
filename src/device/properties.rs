//! Typed helpers over [`DeviceGateway`]: system properties, identity and
//! remote files.

use super::DeviceGateway;
use crate::error::{HarnessError, Result};
use tracing::debug;

/// Delay applied to the output MMAP buffer pointer, in microseconds.
pub const OUTPUT_OFFSET_PROPERTY: &str = "aaudio.out_mmap_offset_usec";

/// AAudio MMAP policy (2 = enabled when possible, 3 = always).
pub const MMAP_POLICY_PROPERTY: &str = "aaudio.mmap_policy";

const BUILD_ID_PROPERTY: &str = "ro.build.id";
const BUILD_RELEASE_PROPERTY: &str = "ro.build.version.release";

/// Read a system property, trimmed. Unset properties read as `""`.
pub fn get_property(gateway: &dyn DeviceGateway, name: &str) -> Result<String> {
    let value = gateway.run(&["shell", "getprop", name])?;
    Ok(value.trim().to_owned())
}

pub fn set_property(gateway: &dyn DeviceGateway, name: &str, value: &str) -> Result<()> {
    debug!(property = name, value, "setting device property");
    gateway.run(&["shell", "setprop", name, value])?;
    Ok(())
}

/// Current output offset. An unset property counts as zero.
pub fn get_output_offset(gateway: &dyn DeviceGateway) -> Result<i64> {
    let text = get_property(gateway, OUTPUT_OFFSET_PROPERTY)?;
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<i64>()
        .map_err(|_| HarnessError::UnexpectedOutput {
            what: format!("value for {OUTPUT_OFFSET_PROPERTY}"),
            output: text,
        })
}

pub fn set_output_offset(gateway: &dyn DeviceGateway, offset_us: i64) -> Result<()> {
    set_property(gateway, OUTPUT_OFFSET_PROPERTY, &offset_us.to_string())
}

/// User the device shell runs as.
pub fn current_user(gateway: &dyn DeviceGateway) -> Result<String> {
    let user = gateway.run(&["shell", "whoami"])?;
    Ok(user.trim().to_owned())
}

/// Ask adbd to restart with root privileges.
pub fn request_root(gateway: &dyn DeviceGateway) -> bool {
    gateway.try_run(&["root"])
}

/// Build identifiers printed at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub id: String,
    pub release: String,
}

pub fn build_info(gateway: &dyn DeviceGateway) -> Result<BuildInfo> {
    Ok(BuildInfo {
        id: get_property(gateway, BUILD_ID_PROPERTY)?,
        release: get_property(gateway, BUILD_RELEASE_PROPERTY)?,
    })
}

pub fn file_exists(gateway: &dyn DeviceGateway, path: &str) -> bool {
    gateway.try_run(&["shell", "ls", path, "2>/dev/null"])
}

pub fn read_file(gateway: &dyn DeviceGateway, path: &str) -> Result<String> {
    gateway.run(&["shell", "cat", path])
}

/// Best-effort removal; a missing file is not an error.
pub fn remove_file(gateway: &dyn DeviceGateway, path: &str) -> bool {
    gateway.try_run(&["shell", "rm", "-f", path])
}
