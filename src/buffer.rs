//! Machine Code Buffer
//!
//! Growable byte buffer that backends append encoded instructions to.
//! Offsets of bytes already written never change, so an offset recorded
//! earlier can be used later to overwrite a placeholder in place.

use crate::error::{CompileError, ErrorKind};

/// Machine code buffer for emitting instructions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodeBuffer {
    code: Vec<u8>,
}

impl CodeBuffer {
    pub fn new() -> Self {
        Self { code: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            code: Vec::with_capacity(capacity),
        }
    }

    /// Get current code offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Emit a single byte
    #[inline]
    pub fn emit(&mut self, byte: u8) {
        self.code.push(byte);
    }

    /// Emit multiple bytes
    #[inline]
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.code.extend_from_slice(bytes);
    }

    /// Emit a 16-bit little-endian value
    #[inline]
    pub fn emit_u16_le(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit little-endian value
    #[inline]
    pub fn emit_u32_le(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit little-endian value
    #[inline]
    pub fn emit_u64_le(&mut self, value: u64) {
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 16-bit big-endian value
    #[inline]
    pub fn emit_u16_be(&mut self, value: u16) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Emit a 32-bit big-endian value
    #[inline]
    pub fn emit_u32_be(&mut self, value: u32) {
        self.code.extend_from_slice(&value.to_be_bytes());
    }

    /// Make room for `additional` more bytes, reporting allocation failure
    /// instead of aborting.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), CompileError> {
        self.code.try_reserve(additional).map_err(|e| {
            CompileError::new(
                ErrorKind::AllocationFailed,
                format!("failed to grow code buffer: {}", e),
            )
        })
    }

    /// Overwrite previously emitted bytes starting at `offset`.
    ///
    /// The patch must lie entirely inside the written region; the length of
    /// the buffer never changes.
    pub fn patch(&mut self, offset: usize, bytes: &[u8]) {
        self.code[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Get the generated code
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Take ownership of the generated code
    pub fn into_code(self) -> Vec<u8> {
        self.code
    }
}

impl AsRef<[u8]> for CodeBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.code
    }
}
