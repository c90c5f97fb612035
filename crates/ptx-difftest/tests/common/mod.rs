#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ptx_difftest::buffer::{Buffer, BufferSpec};
use ptx_difftest::codegen::Kernel;
use ptx_difftest::config::RunConfig;
use ptx_difftest::driver::{Deadline, EmulatorDriver, ExecutionDriver};
use ptx_difftest::error::ExecutionFailure;
use ptx_difftest::kernels::bitwise::ShiftPolicy;
use ptx_difftest::matrix::Selection;
use ptx_difftest::oracle::Oracle;
use ptx_difftest::registry::Registry;
use ptx_difftest::report::RunReport;
use ptx_difftest::runner::Runner;
use ptx_difftest::template::TemplateStore;

pub fn registry() -> Registry {
    Registry::builtin(ShiftPolicy::Clamp)
}

pub fn store() -> TemplateStore {
    TemplateStore::builtin().expect("bundled templates load")
}

pub fn config() -> RunConfig {
    RunConfig {
        random_samples: 16,
        jobs: 4,
        ..RunConfig::default()
    }
}

pub fn emulator() -> Arc<dyn ExecutionDriver> {
    Arc::new(EmulatorDriver::new(registry()))
}

pub fn templates(ids: &[&str]) -> Selection {
    Selection {
        templates: ids.iter().map(|s| (*s).to_string()).collect(),
        ..Selection::all()
    }
}

pub fn run(driver: Arc<dyn ExecutionDriver>, config: RunConfig, selection: Selection) -> RunReport {
    let reg = registry();
    Runner::new(&reg, driver, config)
        .with_selection(selection)
        .run(&store())
        .expect("run completes")
}

pub fn run_with_oracle(oracle: Oracle<'_>, selection: Selection) -> RunReport {
    Runner::new(oracle.registry(), emulator(), config())
        .with_oracle(oracle.clone())
        .with_selection(selection)
        .run(&store())
        .expect("run completes")
}

/// True when the kernel's compute instruction is `opcode`.
fn computes(kernel: &Kernel, opcode: &str) -> bool {
    kernel.source.lines().any(|l| {
        let l = l.trim_start();
        l.starts_with(opcode) && l[opcode.len()..].trim_start().starts_with("%d,")
    })
}

/// Emulator that stalls on one opcode, giving up at the deadline.
pub struct StallingDriver {
    pub inner: EmulatorDriver,
    pub opcode: &'static str,
    pub delay: Duration,
}

impl ExecutionDriver for StallingDriver {
    fn name(&self) -> &str {
        "stalling"
    }

    fn concurrency_limit(&self) -> usize {
        4
    }

    fn run(
        &self,
        kernel: &Kernel,
        inputs: &[Buffer],
        outputs: &[BufferSpec],
        deadline: &Deadline,
    ) -> Result<Vec<Buffer>, ExecutionFailure> {
        if computes(kernel, self.opcode) {
            std::thread::sleep(deadline.remaining().map_or(self.delay, |left| left.min(self.delay)));
            if deadline.expired() {
                return Err(deadline.failure());
            }
        }
        self.inner.run(kernel, inputs, outputs, deadline)
    }
}

/// Emulator that rejects one opcode.
pub struct RejectingDriver {
    pub inner: EmulatorDriver,
    pub opcode: &'static str,
}

impl ExecutionDriver for RejectingDriver {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn concurrency_limit(&self) -> usize {
        4
    }

    fn run(
        &self,
        kernel: &Kernel,
        inputs: &[Buffer],
        outputs: &[BufferSpec],
        deadline: &Deadline,
    ) -> Result<Vec<Buffer>, ExecutionFailure> {
        if computes(kernel, self.opcode) {
            return Err(ExecutionFailure::Driver(format!("{} is not supported on this device", self.opcode)));
        }
        self.inner.run(kernel, inputs, outputs, deadline)
    }
}

/// Emulator whose device gets one opcode wrong in the low bit.
pub struct FaultyDriver {
    pub inner: EmulatorDriver,
    pub opcode: &'static str,
}

impl ExecutionDriver for FaultyDriver {
    fn name(&self) -> &str {
        "faulty"
    }

    fn concurrency_limit(&self) -> usize {
        4
    }

    fn run(
        &self,
        kernel: &Kernel,
        inputs: &[Buffer],
        outputs: &[BufferSpec],
        deadline: &Deadline,
    ) -> Result<Vec<Buffer>, ExecutionFailure> {
        let mut out = self.inner.run(kernel, inputs, outputs, deadline)?;
        if computes(kernel, self.opcode)
            && let Some(first) = out.first_mut()
            && let Some(v) = first.data.first_mut()
        {
            *v ^= 1;
        }
        Ok(out)
    }
}
