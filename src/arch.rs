//! Architecture Interface
//!
//! Every backend implements [`ArchInter`]: a fixed set of encoding
//! operations plus the constants the generator and ELF writer need
//! (registers, syscall numbers, ELF machine fields). The code generator is
//! generic over this trait and never looks at which architecture it drives.
//!
//! Backends are compiled in through cargo features. [`Arch`] names every
//! known target whether or not its backend is enabled, so a request for a
//! disabled target is reported as unsupported rather than unknown.

use std::fmt;
use std::str::FromStr;

use crate::buffer::CodeBuffer;
use crate::elf::ElfClass;
use crate::error::{CompileError, ErrorKind};
use crate::serialize::Endian;

/// Result of an encoding operation that can fail
pub type EncodeResult = Result<(), CompileError>;

/// Registers used by generated code
#[derive(Debug, Clone, Copy)]
pub struct Registers<R: Copy> {
    /// Holds the syscall number
    pub sc_num: R,
    pub arg1: R,
    pub arg2: R,
    pub arg3: R,
    /// Holds the address of the current tape cell
    pub bf_ptr: R,
}

/// Linux syscall numbers for the target
#[derive(Debug, Clone, Copy)]
pub struct SyscallNums {
    pub read: i64,
    pub write: i64,
    pub exit: i64,
}

/// Operations and metadata a backend provides.
///
/// Jump offsets are byte distances measured from the end of the jump
/// sequence, which is always exactly `JUMP_SIZE` bytes long. On failure,
/// jump encoders leave the buffer untouched.
pub trait ArchInter {
    type Reg: Copy + fmt::Debug;

    /// Canonical target name
    const NAME: &'static str;
    /// Size of both the loop-open filler and every jump sequence
    const JUMP_SIZE: usize;
    const REGISTERS: Registers<Self::Reg>;
    const SC_NUMS: SyscallNums;
    const ELF_MACHINE: u16;
    const ELF_CLASS: ElfClass;
    const E_FLAGS: u32;
    const ENDIAN: Endian;

    /// Load `imm` into `reg` with as few instructions as possible
    fn set_reg(buf: &mut CodeBuffer, reg: Self::Reg, imm: i64) -> EncodeResult;
    fn reg_copy(buf: &mut CodeBuffer, dst: Self::Reg, src: Self::Reg);
    fn syscall(buf: &mut CodeBuffer);
    /// Reserve `JUMP_SIZE` bytes for a loop-open jump to be patched in later
    fn nop_loop_open(buf: &mut CodeBuffer);
    /// Jump `offset` bytes if the byte at `[reg]` is zero
    fn jump_zero(buf: &mut CodeBuffer, reg: Self::Reg, offset: i64) -> EncodeResult;
    /// Jump `offset` bytes if the byte at `[reg]` is not zero
    fn jump_not_zero(buf: &mut CodeBuffer, reg: Self::Reg, offset: i64) -> EncodeResult;
    fn inc_reg(buf: &mut CodeBuffer, reg: Self::Reg);
    fn dec_reg(buf: &mut CodeBuffer, reg: Self::Reg);
    fn inc_byte(buf: &mut CodeBuffer, reg: Self::Reg);
    fn dec_byte(buf: &mut CodeBuffer, reg: Self::Reg);
    fn add_reg(buf: &mut CodeBuffer, reg: Self::Reg, imm: u64) -> EncodeResult;
    fn sub_reg(buf: &mut CodeBuffer, reg: Self::Reg, imm: u64) -> EncodeResult;
    fn add_byte(buf: &mut CodeBuffer, reg: Self::Reg, imm: u8);
    fn sub_byte(buf: &mut CodeBuffer, reg: Self::Reg, imm: u8);
    fn zero_byte(buf: &mut CodeBuffer, reg: Self::Reg);
}

/// Error for a jump that doesn't fit the branch encoding
pub(crate) fn jump_too_long(offset: i64, bits: u32) -> CompileError {
    CompileError::new(
        ErrorKind::JumpTooLong,
        format!(
            "jump offset {} is outside the range of possible {}-bit signed values",
            offset, bits
        ),
    )
}

/// Error for a jump that doesn't land on an instruction boundary
pub(crate) fn misaligned_jump(offset: i64, alignment: i64) -> CompileError {
    CompileError::new(
        ErrorKind::InvalidJumpAlignment,
        format!("jump offset {} is not a multiple of {}", offset, alignment),
    )
}

/// Does `value` fit in a two's-complement integer of `bits` bits?
#[inline]
pub(crate) fn bit_fits(value: i64, bits: u32) -> bool {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    (min..=max).contains(&value)
}

/// Sign-extend the low `bits` bits of `value`
#[inline]
pub(crate) fn sign_extend(value: i64, bits: u32) -> i64 {
    let shift = 64 - bits;
    (value << shift) >> shift
}

/// Target architectures known to the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    I386,
    Arm64,
    Riscv64,
    S390x,
}

impl Arch {
    pub const ALL: [Arch; 5] = [Arch::X86_64, Arch::I386, Arch::Arm64, Arch::Riscv64, Arch::S390x];

    /// Canonical name
    pub fn name(self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::I386 => "i386",
            Arch::Arm64 => "arm64",
            Arch::Riscv64 => "riscv64",
            Arch::S390x => "s390x",
        }
    }

    /// Accepted alternative names
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Arch::X86_64 => &["x64", "amd64", "x86-64"],
            Arch::I386 => &["x86", "i686"],
            Arch::Arm64 => &["aarch64"],
            Arch::Riscv64 => &["riscv"],
            Arch::S390x => &["s390", "z/architecture"],
        }
    }

    /// Look up a target by canonical name or alias (case-insensitive)
    pub fn from_name(name: &str) -> Result<Self, CompileError> {
        let lower = name.to_ascii_lowercase();
        Arch::ALL
            .into_iter()
            .find(|arch| arch.name() == lower || arch.aliases().contains(&lower.as_str()))
            .ok_or_else(|| {
                CompileError::new(
                    ErrorKind::UnknownArch,
                    format!("'{}' is not a recognized target architecture", name),
                )
            })
    }

    /// Whether this backend was compiled in
    pub fn is_enabled(self) -> bool {
        match self {
            Arch::X86_64 => cfg!(feature = "x86_64"),
            Arch::I386 => cfg!(feature = "i386"),
            Arch::Arm64 => cfg!(feature = "arm64"),
            Arch::Riscv64 => cfg!(feature = "riscv64"),
            Arch::S390x => cfg!(feature = "s390x"),
        }
    }

    /// All targets with an enabled backend
    pub fn enabled() -> impl Iterator<Item = Arch> {
        Arch::ALL.into_iter().filter(|arch| arch.is_enabled())
    }

    /// The architecture this compiler itself is running on, if known
    pub fn host() -> Option<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Some(Arch::X86_64),
            "x86" => Some(Arch::I386),
            "aarch64" => Some(Arch::Arm64),
            "riscv64" => Some(Arch::Riscv64),
            "s390x" => Some(Arch::S390x),
            _ => None,
        }
    }

    /// The host architecture if its backend is enabled, otherwise the first
    /// enabled backend
    pub fn default_target() -> Option<Self> {
        Arch::host()
            .filter(|arch| arch.is_enabled())
            .or_else(|| Arch::enabled().next())
    }

    pub fn unsupported(self) -> CompileError {
        CompileError::new(
            ErrorKind::UnsupportedArch,
            format!("support for '{}' was not enabled in this build", self.name()),
        )
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Arch {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::from_name(s)
    }
}
