//! Endian-aware Serialization
//!
//! Packs fixed-width integers in the byte order of the target architecture.
//! The ELF writer uses this for every multi-byte header field.

use std::io::{self, Write};

/// Byte order of a target, as recorded in `e_ident[EI_DATA]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Endian {
    /// ELFDATA2LSB
    Little = 1,
    /// ELFDATA2MSB
    Big = 2,
}

impl Endian {
    pub fn u16_bytes(self, value: u16) -> [u8; 2] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }

    pub fn u64_bytes(self, value: u64) -> [u8; 8] {
        match self {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        }
    }
}

/// Writes integers to an underlying writer in a fixed byte order
pub struct FieldWriter<'w, W: Write> {
    inner: &'w mut W,
    endian: Endian,
}

impl<'w, W: Write> FieldWriter<'w, W> {
    pub fn new(inner: &'w mut W, endian: Endian) -> Self {
        Self { inner, endian }
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    pub fn u8(&mut self, value: u8) -> io::Result<()> {
        self.inner.write_all(&[value])
    }

    pub fn u16(&mut self, value: u16) -> io::Result<()> {
        self.inner.write_all(&self.endian.u16_bytes(value))
    }

    pub fn u32(&mut self, value: u32) -> io::Result<()> {
        self.inner.write_all(&self.endian.u32_bytes(value))
    }

    pub fn u64(&mut self, value: u64) -> io::Result<()> {
        self.inner.write_all(&self.endian.u64_bytes(value))
    }
}
