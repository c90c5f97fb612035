//! Execution drivers: the boundary to whatever actually runs a kernel.
//!
//! A driver compiles and launches one generated kernel over a set of
//! input buffers and returns the output buffers. Launch geometry and
//! device selection belong to the driver. The kernel's parameters are
//! the input buffers in order, then the output buffers, then a `u32`
//! element count.
//!
//! [`submit`] runs a driver call on its own thread so the caller can
//! compute the oracle while the device works, and bounds the wait with a
//! [`Deadline`]. The deadline is handed to the driver as well: a driver
//! must give up soon after it expires. Each call holds one of the
//! driver's [`DriverSlots`] until it has really returned, so calls the
//! caller stopped waiting for still count against the driver's
//! concurrency limit.

pub mod command;
pub mod emulator;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

pub use command::CommandDriver;
pub use emulator::EmulatorDriver;

use crate::buffer::{Buffer, BufferSpec};
use crate::codegen::Kernel;
use crate::error::ExecutionFailure;

pub trait ExecutionDriver: Send + Sync {
    fn name(&self) -> &str;

    /// How many kernels this driver accepts at once.
    fn concurrency_limit(&self) -> usize {
        1
    }

    /// Run `kernel` and return one buffer per entry of `outputs`.
    ///
    /// Implementations should stop work and return once `deadline` has
    /// expired; the call keeps its slot until it returns.
    ///
    /// # Errors
    ///
    /// Any [`ExecutionFailure`]; it is recorded against the point and the
    /// run continues.
    fn run(
        &self,
        kernel: &Kernel,
        inputs: &[Buffer],
        outputs: &[BufferSpec],
        deadline: &Deadline,
    ) -> Result<Vec<Buffer>, ExecutionFailure>;
}

/// When a driver call has to be finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    /// `None` when the timeout is too large to represent.
    at: Option<Instant>,
    timeout: Duration,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, or `None` for an unrepresentable deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// The failure recorded when this deadline passes.
    pub fn failure(&self) -> ExecutionFailure {
        ExecutionFailure::Timeout(self.timeout)
    }

    /// Receive from `rx`, giving up when the deadline passes.
    ///
    /// # Errors
    ///
    /// [`ExecutionFailure::Timeout`] on expiry,
    /// [`ExecutionFailure::Disconnected`] if every sender is gone.
    pub fn recv<T>(&self, rx: &Receiver<T>) -> Result<T, ExecutionFailure> {
        match self.at {
            None => rx.recv().map_err(|_| ExecutionFailure::Disconnected),
            Some(at) => rx.recv_deadline(at).map_err(|e| match e {
                RecvTimeoutError::Timeout => self.failure(),
                RecvTimeoutError::Disconnected => ExecutionFailure::Disconnected,
            }),
        }
    }
}

/// Counting semaphore over driver calls.
///
/// Built on a bounded channel pre-filled with one token per slot.
#[derive(Debug, Clone)]
pub struct DriverSlots {
    tx: Sender<()>,
    rx: Receiver<()>,
    capacity: usize,
}

impl DriverSlots {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        for _ in 0..capacity {
            // cannot fail: the channel holds exactly `capacity` tokens
            let _ = tx.send(());
        }
        Self { tx, rx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Calls currently holding a slot.
    pub fn in_use(&self) -> usize {
        self.capacity - self.rx.len()
    }

    /// Take a slot, waiting at most until `deadline`.
    ///
    /// # Errors
    ///
    /// [`ExecutionFailure::Timeout`] if no slot frees up in time.
    pub fn acquire(&self, deadline: &Deadline) -> Result<Slot, ExecutionFailure> {
        deadline.recv(&self.rx)?;
        Ok(Slot { tx: self.tx.clone() })
    }

    /// Block until every slot is free again.
    pub fn wait_idle(&self) {
        let held: Vec<()> = (0..self.capacity).filter_map(|_| self.rx.recv().ok()).collect();
        for token in held {
            let _ = self.tx.send(token);
        }
    }
}

/// A held driver slot, returned on drop.
#[derive(Debug)]
pub struct Slot {
    tx: Sender<()>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        let _ = self.tx.send(());
    }
}

/// A driver call in flight.
#[derive(Debug)]
pub struct PendingExecution {
    rx: Receiver<Result<Vec<Buffer>, ExecutionFailure>>,
    deadline: Deadline,
}

impl PendingExecution {
    /// Block until the driver answers or the deadline passes.
    ///
    /// # Errors
    ///
    /// [`ExecutionFailure::Timeout`] if the deadline passes,
    /// [`ExecutionFailure::Disconnected`] if the worker died without
    /// answering, or whatever the driver itself returned.
    pub fn wait(self) -> Result<Vec<Buffer>, ExecutionFailure> {
        self.deadline.recv(&self.rx).and_then(|result| result)
    }
}

/// Start `kernel` on `driver` without waiting for it.
///
/// The timeout clock starts now and covers waiting for a free slot as well
/// as the call itself. The slot is released by the worker thread when
/// `driver.run` returns, not when the caller stops waiting.
///
/// # Errors
///
/// [`ExecutionFailure::Timeout`] if no slot frees up before the deadline,
/// [`ExecutionFailure::Spawn`] if the worker thread cannot be created.
pub fn submit(
    driver: Arc<dyn ExecutionDriver>,
    slots: &DriverSlots,
    kernel: Kernel,
    inputs: Vec<Buffer>,
    outputs: Vec<BufferSpec>,
    timeout: Duration,
) -> Result<PendingExecution, ExecutionFailure> {
    let deadline = Deadline::after(timeout);
    let slot = slots.acquire(&deadline)?;
    let (tx, rx) = bounded(1);
    thread::Builder::new()
        .name(format!("driver-{}", kernel.entry))
        .spawn(move || {
            let result = driver
                .run(&kernel, &inputs, &outputs, &deadline)
                .and_then(|buffers| check_outputs(&outputs, buffers));
            drop(slot);
            // receiver gone means the caller already timed out
            let _ = tx.send(result);
        })
        .map_err(|e| ExecutionFailure::Spawn(e.to_string()))?;
    Ok(PendingExecution { rx, deadline })
}

/// Order `buffers` as `specs` and check their shapes.
fn check_outputs(specs: &[BufferSpec], mut buffers: Vec<Buffer>) -> Result<Vec<Buffer>, ExecutionFailure> {
    specs
        .iter()
        .map(|spec| {
            let pos = buffers
                .iter()
                .position(|b| b.name == spec.name)
                .ok_or_else(|| ExecutionFailure::MissingOutput {
                    name: spec.name.clone(),
                })?;
            let buffer = buffers.swap_remove(pos);
            spec.check(&buffer)?;
            Ok(Buffer::new(buffer.name, spec.ty, buffer.data))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::U32;

    struct Echo;

    impl ExecutionDriver for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn run(&self, _: &Kernel, inputs: &[Buffer], outputs: &[BufferSpec], _: &Deadline) -> Result<Vec<Buffer>, ExecutionFailure> {
            Ok(vec![Buffer::new(&outputs[0].name, outputs[0].ty, inputs[0].data.clone())])
        }
    }

    /// Ignores its deadline.
    struct Sleepy(Duration);

    impl ExecutionDriver for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn run(&self, _: &Kernel, _: &[Buffer], _: &[BufferSpec], _: &Deadline) -> Result<Vec<Buffer>, ExecutionFailure> {
            thread::sleep(self.0);
            Ok(vec![])
        }
    }

    struct Misnamed;

    impl ExecutionDriver for Misnamed {
        fn name(&self) -> &str {
            "misnamed"
        }

        fn run(&self, _: &Kernel, _: &[Buffer], _: &[BufferSpec], _: &Deadline) -> Result<Vec<Buffer>, ExecutionFailure> {
            Ok(vec![Buffer::new("result", U32, vec![0])])
        }
    }

    fn kernel() -> Kernel {
        Kernel {
            entry: "k".to_string(),
            source: String::new(),
        }
    }

    fn io(n: usize) -> (Vec<Buffer>, Vec<BufferSpec>) {
        let input = Buffer::new("input_a", U32, (0..n as u64).collect());
        let spec = BufferSpec {
            name: "output".to_string(),
            ty: U32,
            len: n,
        };
        (vec![input], vec![spec])
    }

    fn execute(driver: Arc<dyn ExecutionDriver>, n: usize, timeout: Duration) -> Result<Vec<Buffer>, ExecutionFailure> {
        let (inputs, outputs) = io(n);
        submit(driver, &DriverSlots::new(1), kernel(), inputs, outputs, timeout)?.wait()
    }

    #[test]
    fn result_is_delivered() {
        let out = execute(Arc::new(Echo), 4, Duration::from_secs(5)).unwrap();
        assert_eq!(out[0].data, vec![0, 1, 2, 3]);
        assert_eq!(out[0].name, "output");
    }

    #[test]
    fn slow_driver_times_out() {
        let timeout = Duration::from_millis(20);
        let err = execute(Arc::new(Sleepy(Duration::from_millis(500))), 1, timeout).unwrap_err();
        assert_eq!(err, ExecutionFailure::Timeout(timeout));
    }

    #[test]
    fn missing_output_is_reported() {
        let err = execute(Arc::new(Misnamed), 1, Duration::from_secs(5)).unwrap_err();
        assert_eq!(
            err,
            ExecutionFailure::MissingOutput {
                name: "output".to_string()
            }
        );
    }

    #[test]
    fn short_output_is_reported() {
        let (inputs, mut outputs) = io(2);
        outputs[0].len = 3;
        let err = submit(Arc::new(Echo), &DriverSlots::new(1), kernel(), inputs, outputs, Duration::from_secs(5))
            .unwrap()
            .wait()
            .unwrap_err();
        assert!(matches!(err, ExecutionFailure::OutputShape { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn abandoned_call_keeps_its_slot() {
        let slots = DriverSlots::new(1);
        let driver: Arc<dyn ExecutionDriver> = Arc::new(Sleepy(Duration::from_millis(300)));
        let (inputs, outputs) = io(1);
        let first = submit(Arc::clone(&driver), &slots, kernel(), inputs, outputs, Duration::from_millis(20)).unwrap();
        assert!(matches!(first.wait(), Err(ExecutionFailure::Timeout(_))));
        assert_eq!(slots.in_use(), 1);

        // the abandoned call still runs, so a second one cannot start in time
        let (inputs, outputs) = io(1);
        let err = submit(driver, &slots, kernel(), inputs, outputs, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, ExecutionFailure::Timeout(_)));

        slots.wait_idle();
        assert_eq!(slots.in_use(), 0);
    }

    #[test]
    fn slot_is_released_after_success() {
        let slots = DriverSlots::new(2);
        let (inputs, outputs) = io(1);
        submit(Arc::new(Echo), &slots, kernel(), inputs, outputs, Duration::from_secs(5))
            .unwrap()
            .wait()
            .unwrap();
        slots.wait_idle();
        assert_eq!(slots.in_use(), 0);
        assert_eq!(slots.capacity(), 2);
    }

    #[test]
    fn deadline_reports_remaining_time() {
        let d = Deadline::after(Duration::from_secs(60));
        assert!(!d.expired());
        assert!(d.remaining().unwrap() <= Duration::from_secs(60));
        let past = Deadline::after(Duration::ZERO);
        assert!(past.expired());
        assert_eq!(past.failure(), ExecutionFailure::Timeout(Duration::ZERO));
        assert_eq!(Deadline::after(Duration::MAX).remaining(), None);
    }

    #[test]
    fn default_concurrency_is_one() {
        assert_eq!(Echo.concurrency_limit(), 1);
    }
}
