//! x86 Register Definitions
//!
//! Only the eight legacy general-purpose registers are used, so no REX.R or
//! REX.B extension bits are ever needed.

use std::fmt;

/// Register names without their width prefix, by encoding
const NAMES: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];

/// x86-64 64-bit general purpose register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg64 {
    RAX = 0,
    RCX = 1,
    RDX = 2,
    RBX = 3,
    RSP = 4,
    RBP = 5,
    RSI = 6,
    RDI = 7,
}

impl Reg64 {
    /// Get the 3-bit encoding for ModR/M bytes and `+rd` opcodes
    #[inline]
    pub fn encoding(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Reg64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", NAMES[self.encoding() as usize])
    }
}

/// i386 32-bit general purpose register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg32 {
    EAX = 0,
    ECX = 1,
    EDX = 2,
    EBX = 3,
    ESP = 4,
    EBP = 5,
    ESI = 6,
    EDI = 7,
}

impl Reg32 {
    #[inline]
    pub fn encoding(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Reg32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", NAMES[self.encoding() as usize])
    }
}
