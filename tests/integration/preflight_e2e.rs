use crate::helpers::{
    SimulatedPhone, context, fast_config, latency_report, queue_passing_preflight,
};
use dsp_timing::device::properties::MMAP_POLICY_PROPERTY;
use dsp_timing::preflight::{PreflightFailure, check_fast_path, check_root, run_preflight};
use dsp_timing::trial::TrialFailure;

#[test]
fn root_shell_passes_without_elevation() {
    let phone = SimulatedPhone::rooted();
    assert_eq!(check_root(&phone).expect("root check"), Ok(()));
    assert_eq!(phone.count_calls("root"), 0);
}

#[test]
fn elevation_is_attempted_once() {
    let phone = SimulatedPhone::rooted().with_user("shell", true);
    assert_eq!(check_root(&phone).expect("root check"), Ok(()));
    assert_eq!(phone.count_calls("root"), 1);
}

#[test]
fn production_build_fails_root_check() {
    let phone = SimulatedPhone::rooted().with_user("shell", false);
    let verdict = check_root(&phone).expect("root check");
    assert_eq!(
        verdict,
        Err(PreflightFailure::NotRoot {
            user: "shell".to_owned()
        })
    );
    assert_eq!(phone.count_calls("root"), 1);
    assert_eq!(phone.count_calls("shell whoami"), 2);
}

#[test]
fn disabled_mmap_policy_fails_before_any_trial() {
    let phone = SimulatedPhone::rooted();
    phone.set_property(MMAP_POLICY_PROPERTY, "1");
    let ctx = context(fast_config());

    let verdict = check_fast_path(&phone, &ctx).expect("fast path check");

    assert!(matches!(
        verdict,
        Err(PreflightFailure::MmapPolicyDisabled { .. })
    ));
    assert_eq!(phone.count_calls("shell am start"), 0);
}

#[test]
fn input_without_mmap_fails_fast_path_check() {
    let phone = SimulatedPhone::rooted();
    phone.queue_report(
        "in.mmap=no\nout.mmap=yes\nout.burst.frames=96\n\
         out.buffer.capacity.frames=1920\nout.rate=48000\nlatency.msec=20\n",
    );
    let ctx = context(fast_config());

    let failure = check_fast_path(&phone, &ctx)
        .expect("fast path check")
        .expect_err("input is not MMAP");

    assert_eq!(failure, PreflightFailure::InputNotMmap("no".to_owned()));
    assert!(failure.to_string().contains("not using input fast path"));
    assert_eq!(phone.count_calls("shell am start"), 1);
}

#[test]
fn passing_probe_reports_stream_info() {
    let phone = SimulatedPhone::rooted();
    queue_passing_preflight(&phone);
    let ctx = context(fast_config());

    let stream = run_preflight(&phone, &ctx)
        .expect("preflight")
        .expect("device supports the sweep");

    assert_eq!(stream.capacity_frames, 1920);
    assert_eq!(stream.sample_rate, 48_000);
    assert_eq!(phone.offset_writes(), vec!["0", "0", "5000"]);
}

#[test]
fn offset_that_does_not_move_latency_fails() {
    let phone = SimulatedPhone::rooted();
    phone.queue_report(&latency_report(20.0));
    phone.queue_report(&latency_report(20.0));
    phone.queue_report(&latency_report(21.0));
    let ctx = context(fast_config());

    let failure = check_fast_path(&phone, &ctx)
        .expect("fast path check")
        .expect_err("latency barely moved");

    assert!(matches!(failure, PreflightFailure::LatencyUnaffected { .. }));
}

#[test]
fn failed_probe_trial_fails_check() {
    let phone = SimulatedPhone::rooted();
    phone.queue_report(&latency_report(20.0));
    phone.queue_report("in.mmap=yes\nout.mmap=yes\n");
    let ctx = context(fast_config());

    let failure = check_fast_path(&phone, &ctx)
        .expect("fast path check")
        .expect_err("probe trial has no latency");

    assert_eq!(
        failure,
        PreflightFailure::ProbeFailed {
            offset_us: 0,
            failure: TrialFailure::MissingField("latency.msec"),
        }
    );
}
