//! ARM64 (AArch64) Register Definitions

use std::fmt;

/// ARM64 General-Purpose Registers (64-bit X registers)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg64 {
    X0 = 0,
    X1 = 1,
    X2 = 2,
    X3 = 3,
    X4 = 4,
    X5 = 5,
    X6 = 6,
    X7 = 7,
    X8 = 8, // Syscall number
    X9 = 9,
    X10 = 10,
    X11 = 11,
    X12 = 12,
    X13 = 13,
    X14 = 14,
    X15 = 15,
    X16 = 16,
    X17 = 17, // Scratch (IP1)
    X18 = 18,
    X19 = 19,
    X20 = 20,
    X21 = 21,
    X22 = 22,
    X23 = 23,
    X24 = 24,
    X25 = 25,
    X26 = 26,
    X27 = 27,
    X28 = 28,
    X29 = 29, // Frame Pointer (FP)
    X30 = 30, // Link Register (LR)
    // Note: X31 is either SP or XZR depending on context
}

/// Encoding of the zero register where an instruction reads it as XZR/WZR
pub const ZR: u32 = 31;

impl Reg64 {
    /// Get the register encoding (0-30)
    #[inline]
    pub fn encoding(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Reg64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.encoding())
    }
}
