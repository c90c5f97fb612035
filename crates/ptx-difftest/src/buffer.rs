//! Typed element buffers exchanged with execution drivers.
//!
//! Elements are held as raw bit patterns in `u64`s, masked to the element
//! width. On the wire every element occupies exactly `ty.bytes` bytes,
//! little-endian.

use serde::Serialize;

use crate::error::ExecutionFailure;
use crate::registry::TypeProfile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Buffer {
    pub name: String,
    pub ty: TypeProfile,
    pub data: Vec<u64>,
}

impl Buffer {
    /// Build a buffer; values wider than the element are truncated.
    pub fn new(name: impl Into<String>, ty: TypeProfile, data: Vec<u64>) -> Self {
        let mask = ty.mask();
        Self {
            name: name.into(),
            ty,
            data: data.into_iter().map(|v| v & mask).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shape of this buffer, without its contents.
    pub fn spec(&self) -> BufferSpec {
        BufferSpec {
            name: self.name.clone(),
            ty: self.ty,
            len: self.data.len(),
        }
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        let width = self.ty.bytes as usize;
        let mut out = Vec::with_capacity(self.data.len() * width);
        for v in &self.data {
            out.extend_from_slice(&v.to_le_bytes()[..width]);
        }
        out
    }

    /// Decode a little-endian byte image.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionFailure::Driver`] if `bytes` is not a whole
    /// number of elements.
    pub fn from_le_bytes(name: impl Into<String>, ty: TypeProfile, bytes: &[u8]) -> Result<Self, ExecutionFailure> {
        let name = name.into();
        let width = ty.bytes as usize;
        if width == 0 || bytes.len() % width != 0 {
            return Err(ExecutionFailure::Driver(format!(
                "{name}: {} byte(s) is not a whole number of {}-byte elements",
                bytes.len(),
                width
            )));
        }
        let data = bytes
            .chunks_exact(width)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word[..width].copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        Ok(Self { name, ty, data })
    }
}

/// Expected shape of a driver output buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferSpec {
    pub name: String,
    pub ty: TypeProfile,
    pub len: usize,
}

impl BufferSpec {
    /// Check that `buffer` has this spec's length.
    ///
    /// # Errors
    ///
    /// [`ExecutionFailure::OutputShape`] on a length mismatch.
    pub fn check(&self, buffer: &Buffer) -> Result<(), ExecutionFailure> {
        if buffer.len() != self.len {
            return Err(ExecutionFailure::OutputShape {
                name: self.name.clone(),
                expected: self.len,
                actual: buffer.len(),
            });
        }
        Ok(())
    }
}
