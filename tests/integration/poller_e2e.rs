use crate::helpers::{SimulatedPhone, fast_config};
use dsp_timing::DeviceGateway;
use dsp_timing::poller::await_result;

const PATH: &str = "/sdcard/dsp_timing_poll.txt";

#[test]
fn returns_report_and_removes_file() {
    let phone = SimulatedPhone::rooted();
    phone.put_file(PATH, "latency.msec=31.5\nout.rate=48000\n");

    let report = await_result(&phone, PATH, &fast_config().poll).expect("await result");

    assert_eq!(report.get("latency.msec"), Some("31.5"));
    assert!(!phone.has_file(PATH));
    assert_eq!(phone.count_calls("shell ls"), 1);
}

#[test]
fn timeout_yields_empty_report_after_bounded_attempts() {
    let phone = SimulatedPhone::rooted();
    let mut poll = fast_config().poll;
    poll.max_attempts = 4;

    let report = await_result(&phone, PATH, &poll).expect("timeout is not an error");

    assert!(report.is_empty());
    assert_eq!(phone.count_calls("shell ls"), 4);
    assert_eq!(phone.count_calls("shell cat"), 0);
    // The artifact is still cleared so a late write cannot leak into the next trial.
    assert_eq!(phone.count_calls("shell rm -f"), 1);
}

#[test]
fn removal_happens_even_when_read_fails() {
    struct UnreadableFile(SimulatedPhone);

    impl DeviceGateway for UnreadableFile {
        fn run(&self, args: &[&str]) -> dsp_timing::Result<String> {
            if args.get(1) == Some(&"cat") {
                return Err(dsp_timing::HarnessError::DeviceCommand {
                    command: args.join(" "),
                    reason: "permission denied".to_owned(),
                });
            }
            self.0.run(args)
        }

        fn try_run(&self, args: &[&str]) -> bool {
            self.0.try_run(args)
        }
    }

    let device = UnreadableFile(SimulatedPhone::rooted());
    device.0.put_file(PATH, "glitch.count=1\n");

    let err = await_result(&device, PATH, &fast_config().poll).expect_err("cat failure propagates");

    assert!(err.to_string().contains("permission denied"));
    assert!(!device.0.has_file(PATH));
}
