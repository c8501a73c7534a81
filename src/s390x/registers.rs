//! z/Architecture Register Definitions

use std::fmt;

/// General purpose register. Writing a nonzero value to r0 is never done,
/// so it doubles as a zero source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reg {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    /// Call-clobbered scratch
    R5 = 5,
    R8 = 8,
}

impl Reg {
    #[inline]
    pub fn encoding(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%r{}", self.encoding())
    }
}
