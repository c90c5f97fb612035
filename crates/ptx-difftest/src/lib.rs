//! # ptx-difftest
//!
//! Differential validation of PTX integer, bit-field and float
//! instructions.
//!
//! Parameterized kernel templates are expanded over every
//! (operation, type, bit-field) combination they can host, executed
//! through a pluggable driver, and compared element by element against a
//! host reference oracle.
//!
//! ## Modules
//!
//! - [`registry`] — Element types, operations and their reference semantics
//! - [`kernels`] — Scalar bit-exact semantics and ULP distance
//! - [`template`] — Load and validate kernel templates
//! - [`codegen`] — Typed placeholder substitution
//! - [`matrix`] — Enumerate test points and build input buffers
//! - [`oracle`] — Expected outputs, with injectable overrides
//! - [`driver`] — Execution drivers, timeouts and the host emulator
//! - [`compare`] — Element comparison with ULP tolerance
//! - [`runner`] — Parallel orchestration of a run
//! - [`report`] — Results, summaries, text and JSON rendering
//! - [`config`] — YAML run configuration

pub mod buffer;
pub mod codegen;
pub mod compare;
pub mod config;
pub mod driver;
pub mod error;
pub mod kernels;
pub mod matrix;
pub mod oracle;
pub mod registry;
pub mod report;
pub mod runner;
pub mod template;
