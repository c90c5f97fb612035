//! Driver backed by an external executable.
//!
//! Each kernel is one process invocation: a [`DriverRequest`] is written to
//! the child's stdin as JSON and a [`DriverResponse`] is read back from its
//! stdout. The child must consume the whole request before replying.
//! A child still running at the deadline is killed.

use std::io::{Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Deadline, ExecutionDriver};
use crate::buffer::{Buffer, BufferSpec};
use crate::codegen::Kernel;
use crate::error::ExecutionFailure;

/// Buffer contents on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBuffer {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub data: Vec<u64>,
}

impl From<&Buffer> for WireBuffer {
    fn from(b: &Buffer) -> Self {
        Self {
            name: b.name.clone(),
            ty: b.ty.name.to_string(),
            data: b.data.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub len: usize,
}

impl From<&BufferSpec> for WireSpec {
    fn from(s: &BufferSpec) -> Self {
        Self {
            name: s.name.clone(),
            ty: s.ty.name.to_string(),
            len: s.len,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRequest {
    pub entry: String,
    pub source: String,
    /// Value of the kernel's trailing `n` parameter.
    pub elements: usize,
    pub inputs: Vec<WireBuffer>,
    pub outputs: Vec<WireSpec>,
}

impl DriverRequest {
    pub fn new(kernel: &Kernel, inputs: &[Buffer], outputs: &[BufferSpec]) -> Self {
        Self {
            entry: kernel.entry.clone(),
            source: kernel.source.clone(),
            elements: inputs.first().map_or(0, Buffer::len),
            inputs: inputs.iter().map(WireBuffer::from).collect(),
            outputs: outputs.iter().map(WireSpec::from).collect(),
        }
    }
}

/// Either `outputs` or `error` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverResponse {
    #[serde(default)]
    pub outputs: Vec<WireBuffer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DriverResponse {
    pub fn ok(outputs: &[Buffer]) -> Self {
        Self {
            outputs: outputs.iter().map(WireBuffer::from).collect(),
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            outputs: Vec::new(),
            error: Some(reason.into()),
        }
    }

    /// Convert to typed buffers, taking element types from `outputs`.
    ///
    /// # Errors
    ///
    /// [`ExecutionFailure::Driver`] when the response reports an error,
    /// [`ExecutionFailure::MissingOutput`] when a requested buffer is absent.
    pub fn into_buffers(self, outputs: &[BufferSpec]) -> Result<Vec<Buffer>, ExecutionFailure> {
        if let Some(reason) = self.error {
            return Err(ExecutionFailure::Driver(reason));
        }
        outputs
            .iter()
            .map(|spec| {
                self.outputs
                    .iter()
                    .find(|w| w.name == spec.name)
                    .map(|w| Buffer::new(&spec.name, spec.ty, w.data.clone()))
                    .ok_or_else(|| ExecutionFailure::MissingOutput {
                        name: spec.name.clone(),
                    })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CommandDriver {
    program: String,
    args: Vec<String>,
    concurrency: usize,
}

impl CommandDriver {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            concurrency: 1,
        }
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn invoke(&self, request: &DriverRequest, deadline: &Deadline) -> Result<DriverResponse, ExecutionFailure> {
        let payload = serde_json::to_vec(request).map_err(|e| ExecutionFailure::Driver(e.to_string()))?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExecutionFailure::Driver(format!("cannot start {}: {e}", self.program)))?;

        let outcome = self.supervise(&mut child, payload, deadline);
        if outcome.is_err() {
            // already exited is fine; anything else still needs reaping
            let _ = child.kill();
            let _ = child.wait();
        }
        let (status, stdout, stderr) = outcome?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(ExecutionFailure::Driver(format!(
                "{} exited with {}: {}",
                self.program,
                status,
                stderr.trim()
            )));
        }
        serde_json::from_slice(&stdout)
            .map_err(|e| ExecutionFailure::Driver(format!("malformed driver response: {e}")))
    }

    /// Feed the request and collect the reply, polling the child against
    /// `deadline`. Pipes are serviced on their own threads so a chatty or
    /// stuck child cannot block the poll.
    fn supervise(
        &self,
        child: &mut Child,
        payload: Vec<u8>,
        deadline: &Deadline,
    ) -> Result<(ExitStatus, Vec<u8>, Vec<u8>), ExecutionFailure> {
        if let Some(mut stdin) = child.stdin.take() {
            let program = self.program.clone();
            thread::Builder::new()
                .name("driver-stdin".to_string())
                .spawn(move || {
                    // a child that exits early closes the pipe; its status says why
                    if let Err(e) = stdin.write_all(&payload) {
                        debug!(%program, error = %e, "driver closed stdin early");
                    }
                })
                .map_err(|e| ExecutionFailure::Spawn(e.to_string()))?;
        }
        let stdout = read_pipe("driver-stdout", child.stdout.take())?;
        let stderr = read_pipe("driver-stderr", child.stderr.take())?;

        let status = loop {
            if let Some(status) = child.try_wait().map_err(|e| ExecutionFailure::Driver(e.to_string()))? {
                break status;
            }
            if deadline.expired() {
                warn!(program = %self.program, timeout = ?deadline.timeout(), "killing driver past its deadline");
                return Err(deadline.failure());
            }
            thread::sleep(POLL_INTERVAL);
        };
        Ok((status, collect(&stdout, deadline)?, collect(&stderr, deadline)?))
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Drain `pipe` to the end on a helper thread.
fn read_pipe<R: Read + Send + 'static>(name: &str, pipe: Option<R>) -> Result<Receiver<Vec<u8>>, ExecutionFailure> {
    let (tx, rx) = bounded(1);
    if let Some(mut pipe) = pipe {
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = tx.send(buf);
            })
            .map_err(|e| ExecutionFailure::Spawn(e.to_string()))?;
    }
    Ok(rx)
}

/// Output of a pipe reader; a pipe that was never opened reads as empty.
fn collect(rx: &Receiver<Vec<u8>>, deadline: &Deadline) -> Result<Vec<u8>, ExecutionFailure> {
    match deadline.recv(rx) {
        Err(ExecutionFailure::Disconnected) => Ok(Vec::new()),
        other => other,
    }
}

impl ExecutionDriver for CommandDriver {
    fn name(&self) -> &str {
        &self.program
    }

    fn concurrency_limit(&self) -> usize {
        self.concurrency
    }

    fn run(
        &self,
        kernel: &Kernel,
        inputs: &[Buffer],
        outputs: &[BufferSpec],
        deadline: &Deadline,
    ) -> Result<Vec<Buffer>, ExecutionFailure> {
        let request = DriverRequest::new(kernel, inputs, outputs);
        self.invoke(&request, deadline)?.into_buffers(outputs)
    }
}
