//! Host emulator for generated kernels.
//!
//! Understands the single-instruction kernels produced from the bundled
//! templates: the compute instruction is the one writing `%d`, bit-field
//! operands are its trailing immediates.
//!
//! Address arithmetic is traced per register: each buffer parameter's
//! base address is followed through `cvta` and `add.u64` to the
//! `ld.global`/`st.global` that dereferences it, and the `mul.wide.u32`
//! stride added on the way must equal that buffer's element size, and the
//! access width its element width. A kernel indexing one buffer with
//! another buffer's stride fails here the way it would corrupt offsets on
//! a device.
//!
//! Results are computed with the registry's reference semantics, which
//! makes this a loopback driver: useful for exercising the harness end to
//! end without a GPU, useless for validating the reference itself.

use std::collections::{BTreeMap, BTreeSet};

use super::command::{DriverRequest, DriverResponse};
use super::{Deadline, ExecutionDriver};
use crate::buffer::{Buffer, BufferSpec};
use crate::codegen::Kernel;
use crate::error::ExecutionFailure;
use crate::registry::{BitField, OperationProfile, Registry, TypeProfile};

#[derive(Debug, Clone)]
pub struct EmulatorDriver {
    registry: Registry,
}

struct Instruction {
    op: OperationProfile,
    ty: TypeProfile,
    field: Option<BitField>,
}

impl EmulatorDriver {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Run one kernel over `inputs`.
    ///
    /// # Errors
    ///
    /// [`ExecutionFailure::Driver`] when the kernel cannot be understood or
    /// its addressing does not fit the buffers.
    pub fn emulate(&self, source: &str, inputs: &[Buffer], outputs: &[BufferSpec]) -> Result<Vec<Buffer>, ExecutionFailure> {
        let output = outputs
            .first()
            .ok_or_else(|| ExecutionFailure::Driver("kernel has no output buffer".to_string()))?;
        check_addressing(source, inputs, outputs)?;
        let inst = self.decode(source)?;
        let semantics = self
            .registry
            .semantics_of(&inst.op, &inst.ty)
            .map_err(|e| ExecutionFailure::Driver(e.to_string()))?;

        let n = inputs.first().map_or(0, Buffer::len);
        let mut data = Vec::with_capacity(n);
        for i in 0..n {
            let operands: Vec<u64> = inputs.iter().map(|b| b.data.get(i).copied().unwrap_or(0)).collect();
            let value = semantics
                .apply(&operands, inst.field)
                .map_err(|e| ExecutionFailure::Driver(e.to_string()))?;
            data.push(value);
        }
        Ok(vec![Buffer::new(&output.name, output.ty, data)])
    }

    /// Answer a wire request, as `pdt emulate` does on stdin/stdout.
    pub fn serve(&self, request: &DriverRequest) -> DriverResponse {
        match self.serve_inner(request) {
            Ok(outputs) => DriverResponse::ok(&outputs),
            Err(e) => DriverResponse::failed(e.to_string()),
        }
    }

    fn serve_inner(&self, request: &DriverRequest) -> Result<Vec<Buffer>, ExecutionFailure> {
        let inputs = request
            .inputs
            .iter()
            .map(|w| Ok(Buffer::new(&w.name, self.type_named(&w.ty)?, w.data.clone())))
            .collect::<Result<Vec<_>, ExecutionFailure>>()?;
        let outputs = request
            .outputs
            .iter()
            .map(|w| {
                Ok(BufferSpec {
                    name: w.name.clone(),
                    ty: self.type_named(&w.ty)?,
                    len: w.len,
                })
            })
            .collect::<Result<Vec<_>, ExecutionFailure>>()?;
        self.emulate(&request.source, &inputs, &outputs)
    }

    fn type_named(&self, name: &str) -> Result<TypeProfile, ExecutionFailure> {
        self.registry
            .type_named(name)
            .copied()
            .ok_or_else(|| ExecutionFailure::Driver(format!("unknown element type {name}")))
    }

    fn decode(&self, source: &str) -> Result<Instruction, ExecutionFailure> {
        for line in source.lines() {
            let line = line.trim().trim_end_matches(';');
            let Some((opcode, rest)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let operands: Vec<&str> = rest.split(',').map(str::trim).collect();
            if operands.first() != Some(&"%d") {
                continue;
            }
            let Some((op, ty)) = self.registry.decode_opcode(opcode) else {
                return Err(ExecutionFailure::Driver(format!("unsupported instruction {opcode}")));
            };
            let field = if op.class.has_bit_field() {
                let [.., pos, len] = operands.as_slice() else {
                    return Err(ExecutionFailure::Driver(format!("{opcode}: missing bit-field operands")));
                };
                Some(BitField::new(immediate(pos)?, immediate(len)?))
            } else {
                None
            };
            return Ok(Instruction { op, ty, field });
        }
        Err(ExecutionFailure::Driver("no instruction writes %d".to_string()))
    }
}

impl ExecutionDriver for EmulatorDriver {
    fn name(&self) -> &str {
        "emulator"
    }

    fn concurrency_limit(&self) -> usize {
        std::thread::available_parallelism().map_or(1, std::num::NonZero::get)
    }

    /// Emulation is quick enough that the deadline is not polled.
    fn run(
        &self,
        kernel: &Kernel,
        inputs: &[Buffer],
        outputs: &[BufferSpec],
        _deadline: &Deadline,
    ) -> Result<Vec<Buffer>, ExecutionFailure> {
        self.emulate(&kernel.source, inputs, outputs)
    }
}

fn immediate(token: &str) -> Result<u32, ExecutionFailure> {
    token
        .parse()
        .map_err(|_| ExecutionFailure::Driver(format!("expected an immediate, found `{token}`")))
}

/// What a 64-bit register holds during address arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Addr<'s> {
    /// Base of the buffer passed as `param`, plus the element offset once
    /// one has been added.
    Pointer { param: &'s str, stride: Option<u32> },
    /// Thread index scaled by a byte stride.
    Offset(u32),
}

fn addressing_error(message: String) -> ExecutionFailure {
    ExecutionFailure::Driver(message)
}

fn check_addressing(source: &str, inputs: &[Buffer], outputs: &[BufferSpec]) -> Result<(), ExecutionFailure> {
    let types: BTreeMap<&str, TypeProfile> = inputs
        .iter()
        .map(|b| (b.name.as_str(), b.ty))
        .chain(outputs.iter().map(|s| (s.name.as_str(), s.ty)))
        .collect();
    let mut regs: BTreeMap<&str, Addr<'_>> = BTreeMap::new();
    let mut loaded = BTreeSet::new();
    let mut stored = BTreeSet::new();

    for line in source.lines() {
        let line = line.trim().trim_end_matches(';');
        let Some((opcode, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let ops: Vec<&str> = rest
            .split(',')
            .map(|o| o.trim().trim_start_matches('[').trim_end_matches(']').trim())
            .collect();

        match (opcode, ops.as_slice()) {
            ("ld.param.u64", [dst, param]) => {
                regs.insert(*dst, Addr::Pointer { param: *param, stride: None });
            }
            ("cvta.to.global.u64", [dst, src]) => match regs.get(src).copied() {
                Some(addr) => {
                    regs.insert(*dst, addr);
                }
                None => {
                    regs.remove(dst);
                }
            },
            ("mul.wide.u32", [dst, _, stride]) => match stride.parse::<u32>() {
                Ok(stride) => {
                    regs.insert(*dst, Addr::Offset(stride));
                }
                Err(_) => {
                    regs.remove(dst);
                }
            },
            ("add.u64", [dst, a, b]) => {
                let sum = match (regs.get(a).copied(), regs.get(b).copied()) {
                    (Some(Addr::Pointer { param, stride: None }), Some(Addr::Offset(stride)))
                    | (Some(Addr::Offset(stride)), Some(Addr::Pointer { param, stride: None })) => Some(Addr::Pointer {
                        param,
                        stride: Some(stride),
                    }),
                    (Some(Addr::Pointer { param, stride: Some(_) }), Some(Addr::Offset(_)))
                    | (Some(Addr::Offset(_)), Some(Addr::Pointer { param, stride: Some(_) })) => {
                        return Err(addressing_error(format!("{param} is offset twice")));
                    }
                    _ => None,
                };
                match sum {
                    Some(addr) => {
                        regs.insert(*dst, addr);
                    }
                    None => {
                        regs.remove(dst);
                    }
                }
            }
            _ => {}
        }

        if let Some(width) = opcode.strip_prefix("ld.global.")
            && let Some(addr) = ops.get(1)
        {
            loaded.insert(check_access(opcode, width, addr, &regs, &types)?);
        }
        if let Some(width) = opcode.strip_prefix("st.global.")
            && let Some(addr) = ops.first()
        {
            stored.insert(check_access(opcode, width, addr, &regs, &types)?);
        }
    }

    if let Some(unread) = inputs.iter().find(|b| !loaded.contains(b.name.as_str())) {
        return Err(addressing_error(format!("{} is never loaded", unread.name)));
    }
    if let Some(unwritten) = outputs.iter().find(|s| !stored.contains(s.name.as_str())) {
        return Err(addressing_error(format!("{} is never stored", unwritten.name)));
    }
    Ok(())
}

/// Check one global access through `reg` and return the buffer it hits.
fn check_access<'s>(
    opcode: &str,
    width: &str,
    reg: &str,
    regs: &BTreeMap<&str, Addr<'s>>,
    types: &BTreeMap<&str, TypeProfile>,
) -> Result<&'s str, ExecutionFailure> {
    let bits: u32 = width
        .get(1..)
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| addressing_error(format!("{opcode}: unknown access width")))?;
    let (param, stride) = match regs.get(reg) {
        Some(Addr::Pointer { param, stride: Some(stride) }) => (*param, *stride),
        Some(Addr::Pointer { param, stride: None }) => {
            return Err(addressing_error(format!("{opcode} accesses {param} without an element offset")));
        }
        _ => return Err(addressing_error(format!("{opcode}: {reg} is not a buffer address"))),
    };
    let ty = types
        .get(param)
        .ok_or_else(|| addressing_error(format!("{opcode}: {param} is not a launch buffer")))?;
    if stride != ty.bytes {
        return Err(addressing_error(format!(
            "{param} is indexed with stride {stride} but holds {} ({} bytes)",
            ty.name, ty.bytes
        )));
    }
    if bits != ty.bits {
        return Err(addressing_error(format!(
            "{opcode} accesses {param} as {bits} bits but it holds {}",
            ty.name
        )));
    }
    Ok(param)
}
