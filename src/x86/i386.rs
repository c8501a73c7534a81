//! i386 Backend
//!
//! Registers are 32 bits wide. Immediates that don't fit are truncated
//! after the bytes are emitted and reported as `ImmediateTooLarge`.

use super::encoding::{ArithOp, Cond};
use super::registers::Reg32;
use super::{pad_loop_open, test_jcc, JUMP_SIZE};
use crate::arch::{ArchInter, EncodeResult, Registers, SyscallNums};
use crate::buffer::CodeBuffer;
use crate::elf::consts::EM_386;
use crate::elf::ElfClass;
use crate::error::{CompileError, ErrorKind};
use crate::serialize::Endian;

/// i386 Linux target
#[derive(Debug, Clone, Copy)]
pub struct I386;

fn immediate_too_large(imm: impl std::fmt::Display) -> CompileError {
    CompileError::new(
        ErrorKind::ImmediateTooLarge,
        format!("{} does not fit in a 32-bit register", imm),
    )
}

impl I386 {
    fn arith_reg(buf: &mut CodeBuffer, op: ArithOp, reg: Reg32, imm: u64) -> EncodeResult {
        let r = reg.encoding();
        match imm {
            0 => {}
            1..=127 => buf.arith_r32_imm8(op, r, imm as i8),
            _ => {
                buf.arith_r32_imm32(op, r, imm as u32);
                if imm > u32::MAX as u64 {
                    return Err(immediate_too_large(imm));
                }
            }
        }
        Ok(())
    }
}

impl ArchInter for I386 {
    type Reg = Reg32;

    const NAME: &'static str = "i386";
    const JUMP_SIZE: usize = JUMP_SIZE;
    const REGISTERS: Registers<Reg32> = Registers {
        sc_num: Reg32::EAX,
        arg1: Reg32::EBX,
        arg2: Reg32::ECX,
        arg3: Reg32::EDX,
        bf_ptr: Reg32::ESI,
    };
    const SC_NUMS: SyscallNums = SyscallNums {
        read: 3,
        write: 4,
        exit: 1,
    };
    const ELF_MACHINE: u16 = EM_386;
    const ELF_CLASS: ElfClass = ElfClass::Elf32;
    const E_FLAGS: u32 = 0;
    const ENDIAN: Endian = Endian::Little;

    fn set_reg(buf: &mut CodeBuffer, reg: Reg32, imm: i64) -> EncodeResult {
        let r = reg.encoding();
        if imm == 0 {
            buf.xor_r32_r32(r);
            return Ok(());
        }
        buf.mov_r32_imm32(r, imm as u32);
        if (i32::MIN as i64..=u32::MAX as i64).contains(&imm) {
            Ok(())
        } else {
            Err(immediate_too_large(imm))
        }
    }

    fn reg_copy(buf: &mut CodeBuffer, dst: Reg32, src: Reg32) {
        buf.mov_r32_r32(dst.encoding(), src.encoding());
    }

    fn syscall(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0xCD, 0x80]); // int 0x80
    }

    fn nop_loop_open(buf: &mut CodeBuffer) {
        pad_loop_open(buf);
    }

    fn jump_zero(buf: &mut CodeBuffer, reg: Reg32, offset: i64) -> EncodeResult {
        test_jcc(buf, Cond::Zero, reg.encoding(), offset)
    }

    fn jump_not_zero(buf: &mut CodeBuffer, reg: Reg32, offset: i64) -> EncodeResult {
        test_jcc(buf, Cond::NotZero, reg.encoding(), offset)
    }

    fn inc_reg(buf: &mut CodeBuffer, reg: Reg32) {
        buf.inc_r32(reg.encoding());
    }

    fn dec_reg(buf: &mut CodeBuffer, reg: Reg32) {
        buf.dec_r32(reg.encoding());
    }

    fn inc_byte(buf: &mut CodeBuffer, reg: Reg32) {
        buf.inc_m8(reg.encoding());
    }

    fn dec_byte(buf: &mut CodeBuffer, reg: Reg32) {
        buf.dec_m8(reg.encoding());
    }

    fn add_reg(buf: &mut CodeBuffer, reg: Reg32, imm: u64) -> EncodeResult {
        Self::arith_reg(buf, ArithOp::Add, reg, imm)
    }

    fn sub_reg(buf: &mut CodeBuffer, reg: Reg32, imm: u64) -> EncodeResult {
        Self::arith_reg(buf, ArithOp::Sub, reg, imm)
    }

    fn add_byte(buf: &mut CodeBuffer, reg: Reg32, imm: u8) {
        buf.arith_m8_imm8(ArithOp::Add, reg.encoding(), imm);
    }

    fn sub_byte(buf: &mut CodeBuffer, reg: Reg32, imm: u8) {
        buf.arith_m8_imm8(ArithOp::Sub, reg.encoding(), imm);
    }

    fn zero_byte(buf: &mut CodeBuffer, reg: Reg32) {
        buf.mov_m8_imm8(reg.encoding(), 0);
    }
}
