//! Shared helpers for integration tests.
//!
//! [`SimulatedPhone`] stands in for `adb`: it keeps system properties and
//! files in memory, and each `am start` consumes the next scripted launch.

use chrono::TimeZone;
use dsp_timing::config::HarnessConfig;
use dsp_timing::device::properties::{MMAP_POLICY_PROPERTY, OUTPUT_OFFSET_PROPERTY};
use dsp_timing::{DeviceGateway, HarnessError, RunContext};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// What the test app does when launched.
#[derive(Debug, Clone)]
pub(crate) enum Launch {
    /// Write this report to the requested file.
    Report(String),
    /// Never write a result.
    NoReport,
    /// The bridge drops: the launch command itself fails.
    Offline,
}

#[derive(Debug, Default)]
struct PhoneState {
    properties: HashMap<String, String>,
    files: HashMap<String, String>,
    user: String,
    grants_root: bool,
    launches: VecDeque<Launch>,
    calls: Vec<Vec<String>>,
}

pub(crate) struct SimulatedPhone {
    state: RefCell<PhoneState>,
}

impl SimulatedPhone {
    /// A rooted phone with MMAP enabled and offset 0.
    pub(crate) fn rooted() -> Self {
        let phone = Self {
            state: RefCell::new(PhoneState {
                user: "root".to_owned(),
                grants_root: true,
                ..PhoneState::default()
            }),
        };
        phone.set_property(MMAP_POLICY_PROPERTY, "2");
        phone.set_property(OUTPUT_OFFSET_PROPERTY, "0");
        phone.set_property("ro.build.id", "UQ1A.240205.004");
        phone.set_property("ro.build.version.release", "14");
        phone
    }

    pub(crate) fn with_user(self, user: &str, grants_root: bool) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.user = user.to_owned();
            state.grants_root = grants_root;
        }
        self
    }

    pub(crate) fn set_property(&self, name: &str, value: &str) {
        self.state
            .borrow_mut()
            .properties
            .insert(name.to_owned(), value.to_owned());
    }

    pub(crate) fn property(&self, name: &str) -> Option<String> {
        self.state.borrow().properties.get(name).cloned()
    }

    pub(crate) fn put_file(&self, path: &str, contents: &str) {
        self.state
            .borrow_mut()
            .files
            .insert(path.to_owned(), contents.to_owned());
    }

    pub(crate) fn has_file(&self, path: &str) -> bool {
        self.state.borrow().files.contains_key(path)
    }

    pub(crate) fn queue(&self, launch: Launch) {
        self.state.borrow_mut().launches.push_back(launch);
    }

    pub(crate) fn queue_report(&self, text: &str) {
        self.queue(Launch::Report(text.to_owned()));
    }

    /// Every command issued, space-joined.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.state
            .borrow()
            .calls
            .iter()
            .map(|c| c.join(" "))
            .collect()
    }

    pub(crate) fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    /// Values written to the output offset property, in order.
    pub(crate) fn offset_writes(&self) -> Vec<String> {
        let prefix = format!("shell setprop {OUTPUT_OFFSET_PROPERTY} ");
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_owned))
            .collect()
    }

    fn dispatch(&self, args: &[&str]) -> Result<String, String> {
        let mut state = self.state.borrow_mut();
        state
            .calls
            .push(args.iter().map(|a| (*a).to_owned()).collect());

        match args {
            ["root"] => {
                if state.grants_root {
                    state.user = "root".to_owned();
                    Ok("restarting adbd as root\n".to_owned())
                } else {
                    Err("adbd cannot run as root in production builds".to_owned())
                }
            }
            ["shell", "whoami"] => Ok(format!("{}\n", state.user)),
            ["shell", "getprop", name] => Ok(format!(
                "{}\n",
                state.properties.get(*name).cloned().unwrap_or_default()
            )),
            ["shell", "setprop", name, value] => {
                state
                    .properties
                    .insert((*name).to_owned(), (*value).to_owned());
                Ok(String::new())
            }
            ["shell", "ls", path, ..] => {
                if state.files.contains_key(*path) {
                    Ok(format!("{path}\n"))
                } else {
                    Err(format!("ls: {path}: No such file or directory"))
                }
            }
            ["shell", "cat", path] => state
                .files
                .get(*path)
                .cloned()
                .ok_or_else(|| format!("cat: {path}: No such file or directory")),
            ["shell", "rm", "-f", path] => {
                state.files.remove(*path);
                Ok(String::new())
            }
            ["shell", "am", "start", rest @ ..] => {
                let file = rest
                    .windows(3)
                    .find(|w| w[0] == "--es" && w[1] == "file")
                    .map(|w| w[2].to_owned())
                    .ok_or_else(|| "no file extra".to_owned())?;
                match state.launches.pop_front() {
                    Some(Launch::Report(text)) => {
                        state.files.insert(file, text);
                    }
                    Some(Launch::NoReport) => {}
                    Some(Launch::Offline) | None => {
                        return Err("error: device offline".to_owned());
                    }
                }
                Ok("Starting: Intent { cmp=com.mobileer.oboetester/.MainActivity }\n".to_owned())
            }
            other => Err(format!("unsupported command: {other:?}")),
        }
    }
}

impl DeviceGateway for SimulatedPhone {
    fn run(&self, args: &[&str]) -> dsp_timing::Result<String> {
        self.dispatch(args)
            .map_err(|reason| HarnessError::DeviceCommand {
                command: args.join(" "),
                reason,
            })
    }

    fn try_run(&self, args: &[&str]) -> bool {
        self.dispatch(args).is_ok()
    }
}

/// Default config with polling that never sleeps.
pub(crate) fn fast_config() -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.poll.delay_ms = 0;
    config
}

/// Config sweeping only 0, 100 and 200 us.
pub(crate) fn short_sweep_config() -> HarnessConfig {
    let mut config = fast_config();
    config.sweep.offset_max_us = 300;
    config
}

pub(crate) fn context(config: HarnessConfig) -> RunContext {
    let started_at = chrono::Local
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid local time");
    RunContext::new(config, started_at)
}

pub(crate) const OUTPUT_FILE: &str = "/sdcard/dsp_timing_20240601_120000.txt";

/// Latency report describing a 1920-frame, 48 kHz MMAP stream (40 ms).
pub(crate) fn latency_report(latency_ms: f64) -> String {
    format!(
        "test=latency\n\
         latency.msec={latency_ms}\n\
         out.burst.frames=96\n\
         out.buffer.capacity.frames=1920\n\
         out.rate=48000\n\
         in.mmap=yes\n\
         out.mmap=yes\n"
    )
}

pub(crate) fn glitch_report(peak: f64, glitches: u32) -> String {
    format!("test=glitch\npeak.amplitude={peak}\nglitch.count={glitches}\n")
}

/// Queue the three latency launches of a passing preflight.
pub(crate) fn queue_passing_preflight(phone: &SimulatedPhone) {
    phone.queue_report(&latency_report(20.0));
    phone.queue_report(&latency_report(20.0));
    phone.queue_report(&latency_report(45.0));
}
