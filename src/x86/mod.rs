//! x86 Backends
//!
//! The x86-64 and i386 backends share nearly all of their encodings: the
//! 64-bit forms are the 32-bit ones behind a REX.W prefix.
//!
//! ## Modules
//!
//! - `registers`: general purpose register definitions
//! - `encoding`: instruction encoding (REX, ModR/M)
//! - `x86_64`: x86-64 backend (Linux syscall ABI)
//! - `i386`: i386 backend (`int 0x80` ABI)
//!
//! ## Loop Jumps
//!
//! ```text
//! F6 /0 FF        test byte [ptr], 0xff
//! 0F 84/85 rel32  jz/jnz rel32
//! ```

pub mod encoding;
pub mod registers;

#[cfg(feature = "i386")]
pub mod i386;
#[cfg(feature = "x86_64")]
pub mod x86_64;

#[cfg(feature = "i386")]
pub use i386::I386;
#[cfg(feature = "x86_64")]
pub use x86_64::X86_64;

use crate::arch::{jump_too_long, EncodeResult};
use crate::buffer::CodeBuffer;
use encoding::Cond;

/// TEST (3 bytes) + Jcc rel32 (6 bytes)
pub const JUMP_SIZE: usize = 9;

/// Emit a conditional loop jump on the byte at `[reg]`
pub(crate) fn test_jcc(buf: &mut CodeBuffer, cond: Cond, reg: u8, offset: i64) -> EncodeResult {
    let rel = i32::try_from(offset).map_err(|_| jump_too_long(offset, 32))?;
    buf.test_m8_imm8(reg, 0xFF);
    buf.jcc_rel32(cond, rel);
    Ok(())
}

/// Loop-open placeholder: traps if it is ever executed unpatched
pub(crate) fn pad_loop_open(buf: &mut CodeBuffer) {
    buf.ud2();
    for _ in 0..JUMP_SIZE - 2 {
        buf.nop();
    }
}
