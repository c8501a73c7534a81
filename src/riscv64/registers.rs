//! RISC-V Register Definitions
//!
//! Only the registers the generated code touches, by ABI mnemonic.

use std::fmt;

/// RISC-V integer register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    /// Hardwired zero (x0)
    Zero = 0,
    T1 = 6,
    S0 = 8,
    A0 = 10,
    A1 = 11,
    A2 = 12,
    A7 = 17,
}

impl Reg {
    #[inline]
    pub fn encoding(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg::Zero => "zero",
            Reg::T1 => "t1",
            Reg::S0 => "s0",
            Reg::A0 => "a0",
            Reg::A1 => "a1",
            Reg::A2 => "a2",
            Reg::A7 => "a7",
        };
        write!(f, "{}", name)
    }
}
