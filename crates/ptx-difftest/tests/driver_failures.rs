//! Execution failures stay local to their point: timeouts, driver errors
//! and broken driver processes are recorded and the run carries on.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ptx_difftest::buffer::{Buffer, BufferSpec};
use ptx_difftest::codegen::Kernel;
use ptx_difftest::config::RunConfig;
use ptx_difftest::driver::{CommandDriver, Deadline, EmulatorDriver, ExecutionDriver};
use ptx_difftest::error::ExecutionFailure;
use ptx_difftest::matrix::Selection;
use ptx_difftest::report::Outcome;

/// Single-slot device that ignores deadlines and records how many calls
/// overlap.
#[derive(Default)]
struct OverrunningDriver {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ExecutionDriver for OverrunningDriver {
    fn name(&self) -> &str {
        "overrunning"
    }

    fn concurrency_limit(&self) -> usize {
        1
    }

    fn run(&self, _: &Kernel, _: &[Buffer], _: &[BufferSpec], _: &Deadline) -> Result<Vec<Buffer>, ExecutionFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(250));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Err(ExecutionFailure::Driver("too slow".to_string()))
    }
}

#[test]
fn stalled_point_times_out_and_run_continues() {
    let driver = Arc::new(common::StallingDriver {
        inner: EmulatorDriver::new(common::registry()),
        opcode: "shl.b32",
        delay: Duration::from_secs(3),
    });
    let cfg = RunConfig {
        timeout_ms: 200,
        ..common::config()
    };
    let report = common::run(driver, cfg, common::templates(&["shift"]));
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].point.name, "shift/shl.b32");
    assert!(matches!(
        &failed[0].outcome,
        Outcome::ExecutionFailure { reason } if reason.starts_with("timeout")
    ));
    assert_eq!(report.summary.execution_failures, 1);
    assert_eq!(report.summary.passed, report.summary.total - 1);
}

#[test]
fn driver_error_is_recorded_per_point() {
    let driver = Arc::new(common::RejectingDriver {
        inner: EmulatorDriver::new(common::registry()),
        opcode: "fma.rn.f64",
    });
    let report = common::run(driver, common::config(), common::templates(&["ternary"]));
    let failed: Vec<_> = report.failures().map(|r| r.point.name.as_str()).collect();
    assert_eq!(failed, vec!["ternary/fma.rn.f64"]);
    assert!(matches!(
        &report.failures().next().unwrap().outcome,
        Outcome::ExecutionFailure { reason } if reason.contains("not supported")
    ));
    assert!(!report.all_passed());
}

#[cfg(unix)]
#[test]
fn crashing_driver_process_fails_every_point() {
    let driver = Arc::new(
        CommandDriver::new("sh", vec!["-c".into(), "cat >/dev/null; exit 7".into()]).with_concurrency(2),
    );
    let sel = Selection::all().with_filter("^unary/not").unwrap();
    let report = common::run(driver, common::config(), sel);
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.execution_failures, 3);
    for r in &report.results {
        assert!(matches!(&r.outcome, Outcome::ExecutionFailure { reason } if reason.contains("exited")));
    }
}

#[cfg(unix)]
#[test]
fn garbage_driver_output_is_an_execution_failure() {
    let driver = Arc::new(CommandDriver::new(
        "sh",
        vec!["-c".into(), "cat >/dev/null; echo not-json".into()],
    ));
    let sel = Selection::all().with_filter("^unary/not.b16$").unwrap();
    let report = common::run(driver, common::config(), sel);
    assert_eq!(report.results.len(), 1);
    assert!(matches!(
        &report.results[0].outcome,
        Outcome::ExecutionFailure { reason } if reason.contains("malformed driver response")
    ));
}

#[test]
fn timed_out_calls_still_count_against_concurrency() {
    let driver = Arc::new(OverrunningDriver::default());
    let cfg = RunConfig {
        timeout_ms: 50,
        jobs: 4,
        ..common::config()
    };
    let sel = Selection::all().with_filter("^unary/not").unwrap();
    let report = common::run(Arc::clone(&driver) as Arc<dyn ExecutionDriver>, cfg, sel);

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.execution_failures, 3);
    assert_eq!(driver.peak.load(Ordering::SeqCst), 1);
    // the run does not return while an abandoned call is still running
    assert_eq!(driver.in_flight.load(Ordering::SeqCst), 0);
    assert!(driver.calls.load(Ordering::SeqCst) >= 1);
}

#[cfg(unix)]
#[test]
fn driver_process_is_killed_at_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran-to-completion");
    let script = format!("cat >/dev/null; sleep 1; touch '{}'", marker.display());
    let driver = Arc::new(CommandDriver::new("sh", vec!["-c".into(), script]));
    let cfg = RunConfig {
        timeout_ms: 100,
        ..common::config()
    };
    let sel = Selection::all().with_filter("^unary/not.b32$").unwrap();

    let started = Instant::now();
    let report = common::run(driver, cfg, sel);
    assert!(started.elapsed() < Duration::from_millis(900));
    assert_eq!(report.results.len(), 1);
    assert!(matches!(
        &report.results[0].outcome,
        Outcome::ExecutionFailure { reason } if reason.starts_with("timeout")
    ));

    std::thread::sleep(Duration::from_millis(1500));
    assert!(!marker.exists());
}
