//! ARM64 (AArch64) Backend
//!
//! ## Modules
//!
//! - `registers`: ARM64 register definitions (X0-X30)
//! - `encoding`: ARM64 instruction encoding (fixed 32-bit)
//!
//! ## Loop Jumps
//!
//! ```text
//! ldrb w17, [x19], #0
//! tst  x17, #0xff
//! b.eq / b.ne
//! ```
//!
//! The branch sits 4 bytes before the end of the sequence, so its word
//! offset is one more than the distance from the end divided by four.

pub mod encoding;
pub mod registers;

use crate::arch::{
    bit_fits, jump_too_long, misaligned_jump, ArchInter, EncodeResult, Registers, SyscallNums,
};
use crate::buffer::CodeBuffer;
use crate::elf::consts::EM_AARCH64;
use crate::elf::ElfClass;
use crate::serialize::Endian;
use encoding::{AddSub, Condition, MoveKind};
use registers::Reg64;

/// Scratch register for byte loads and large immediates
const SCRATCH: Reg64 = Reg64::X17;

/// ARM64 Linux target
#[derive(Debug, Clone, Copy)]
pub struct Arm64;

impl Arm64 {
    fn add_sub(buf: &mut CodeBuffer, op: AddSub, reg: Reg64, imm: u64) -> EncodeResult {
        if imm == 0 {
            return Ok(());
        }
        if imm < 0x1000 {
            encoding::add_sub_imm(buf, op, reg, reg, imm as u16, false);
        } else if imm < 0x100_0000 {
            encoding::add_sub_imm(buf, op, reg, reg, (imm >> 12) as u16, true);
            let low = (imm & 0xfff) as u16;
            if low != 0 {
                encoding::add_sub_imm(buf, op, reg, reg, low, false);
            }
        } else {
            Self::set_reg(buf, SCRATCH, imm as i64)?;
            encoding::add_sub_reg(buf, op, reg, reg, SCRATCH);
        }
        Ok(())
    }

    fn branch(buf: &mut CodeBuffer, cond: Condition, reg: Reg64, offset: i64) -> EncodeResult {
        if offset % 4 != 0 {
            return Err(misaligned_jump(offset, 4));
        }
        let displacement = offset
            .checked_add(4)
            .filter(|d| bit_fits(*d, 21))
            .ok_or_else(|| jump_too_long(offset, 21))?;
        encoding::ldrb(buf, SCRATCH, reg);
        encoding::tst_low_byte(buf, SCRATCH);
        encoding::b_cond(buf, cond, (displacement >> 2) as i32);
        Ok(())
    }

    fn byte_arith(buf: &mut CodeBuffer, op: AddSub, reg: Reg64, imm: u8) {
        encoding::ldrb(buf, SCRATCH, reg);
        encoding::add_sub_imm(buf, op, SCRATCH, SCRATCH, imm as u16, false);
        encoding::strb(buf, SCRATCH, reg);
    }
}

impl ArchInter for Arm64 {
    type Reg = Reg64;

    const NAME: &'static str = "arm64";
    const JUMP_SIZE: usize = 12;
    const REGISTERS: Registers<Reg64> = Registers {
        sc_num: Reg64::X8,
        arg1: Reg64::X0,
        arg2: Reg64::X1,
        arg3: Reg64::X2,
        bf_ptr: Reg64::X19,
    };
    const SC_NUMS: SyscallNums = SyscallNums {
        read: 63,
        write: 64,
        exit: 93,
    };
    const ELF_MACHINE: u16 = EM_AARCH64;
    const ELF_CLASS: ElfClass = ElfClass::Elf64;
    const E_FLAGS: u32 = 0;
    const ENDIAN: Endian = Endian::Little;

    fn set_reg(buf: &mut CodeBuffer, reg: Reg64, imm: i64) -> EncodeResult {
        // Halfwords equal to the fill come for free from the lead instruction
        let (fill, lead) = if imm < 0 {
            (0xffff, MoveKind::Invert)
        } else {
            (0, MoveKind::Zero)
        };
        let mut kind = lead;
        for shift in [0u8, 16, 32, 48] {
            let chunk = (imm >> shift) as u16;
            if chunk != fill {
                encoding::mov_wide(buf, kind, reg, chunk, shift);
                kind = MoveKind::Keep;
            }
        }
        if kind == lead {
            encoding::mov_wide(buf, lead, reg, fill, 0);
        }
        Ok(())
    }

    fn reg_copy(buf: &mut CodeBuffer, dst: Reg64, src: Reg64) {
        encoding::mov_x(buf, dst, src);
    }

    fn syscall(buf: &mut CodeBuffer) {
        encoding::svc(buf);
    }

    fn nop_loop_open(buf: &mut CodeBuffer) {
        encoding::brk(buf);
        encoding::nop(buf);
        encoding::nop(buf);
    }

    fn jump_zero(buf: &mut CodeBuffer, reg: Reg64, offset: i64) -> EncodeResult {
        Self::branch(buf, Condition::EQ, reg, offset)
    }

    fn jump_not_zero(buf: &mut CodeBuffer, reg: Reg64, offset: i64) -> EncodeResult {
        Self::branch(buf, Condition::NE, reg, offset)
    }

    fn inc_reg(buf: &mut CodeBuffer, reg: Reg64) {
        encoding::add_sub_imm(buf, AddSub::Add, reg, reg, 1, false);
    }

    fn dec_reg(buf: &mut CodeBuffer, reg: Reg64) {
        encoding::add_sub_imm(buf, AddSub::Sub, reg, reg, 1, false);
    }

    fn inc_byte(buf: &mut CodeBuffer, reg: Reg64) {
        Self::byte_arith(buf, AddSub::Add, reg, 1);
    }

    fn dec_byte(buf: &mut CodeBuffer, reg: Reg64) {
        Self::byte_arith(buf, AddSub::Sub, reg, 1);
    }

    fn add_reg(buf: &mut CodeBuffer, reg: Reg64, imm: u64) -> EncodeResult {
        Self::add_sub(buf, AddSub::Add, reg, imm)
    }

    fn sub_reg(buf: &mut CodeBuffer, reg: Reg64, imm: u64) -> EncodeResult {
        Self::add_sub(buf, AddSub::Sub, reg, imm)
    }

    fn add_byte(buf: &mut CodeBuffer, reg: Reg64, imm: u8) {
        Self::byte_arith(buf, AddSub::Add, reg, imm);
    }

    fn sub_byte(buf: &mut CodeBuffer, reg: Reg64, imm: u8) {
        Self::byte_arith(buf, AddSub::Sub, reg, imm);
    }

    fn zero_byte(buf: &mut CodeBuffer, reg: Reg64) {
        encoding::strb_zero(buf, reg);
    }
}
