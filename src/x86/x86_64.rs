//! x86-64 Backend

use super::encoding::{ArithOp, Cond, Rex};
use super::registers::Reg64;
use super::{pad_loop_open, test_jcc, JUMP_SIZE};
use crate::arch::{ArchInter, EncodeResult, Registers, SyscallNums};
use crate::buffer::CodeBuffer;
use crate::elf::consts::EM_X86_64;
use crate::elf::ElfClass;
use crate::serialize::Endian;

/// x86-64 Linux target
#[derive(Debug, Clone, Copy)]
pub struct X86_64;

impl X86_64 {
    fn rex_w(buf: &mut CodeBuffer) {
        buf.emit(Rex::new().w().encode());
    }

    fn arith_reg(buf: &mut CodeBuffer, op: ArithOp, reg: Reg64, imm: u64) -> EncodeResult {
        let r = reg.encoding();
        match imm {
            0 => {}
            1..=127 => {
                Self::rex_w(buf);
                buf.arith_r32_imm8(op, r, imm as i8);
            }
            128..=0x7FFF_FFFF => {
                Self::rex_w(buf);
                buf.arith_r32_imm32(op, r, imm as u32);
            }
            _ => {
                // No imm64 form: go through RCX
                Self::set_reg(buf, Reg64::RCX, imm as i64)?;
                Self::rex_w(buf);
                buf.arith_r32_r32(op, r, Reg64::RCX.encoding());
            }
        }
        Ok(())
    }
}

impl ArchInter for X86_64 {
    type Reg = Reg64;

    const NAME: &'static str = "x86_64";
    const JUMP_SIZE: usize = JUMP_SIZE;
    const REGISTERS: Registers<Reg64> = Registers {
        sc_num: Reg64::RAX,
        arg1: Reg64::RDI,
        arg2: Reg64::RSI,
        arg3: Reg64::RDX,
        bf_ptr: Reg64::RBX,
    };
    const SC_NUMS: SyscallNums = SyscallNums {
        read: 0,
        write: 1,
        exit: 60,
    };
    const ELF_MACHINE: u16 = EM_X86_64;
    const ELF_CLASS: ElfClass = ElfClass::Elf64;
    const E_FLAGS: u32 = 0;
    const ENDIAN: Endian = Endian::Little;

    fn set_reg(buf: &mut CodeBuffer, reg: Reg64, imm: i64) -> EncodeResult {
        let r = reg.encoding();
        if imm == 0 {
            buf.xor_r32_r32(r);
        } else if let Ok(imm32) = u32::try_from(imm) {
            // 32-bit writes zero the upper half
            buf.mov_r32_imm32(r, imm32);
        } else if let Ok(imm32) = i32::try_from(imm) {
            Self::rex_w(buf);
            buf.mov_rm32_imm32(r, imm32);
        } else {
            Self::rex_w(buf);
            buf.emit(0xB8 + r); // REX.W B8+rd io
            buf.emit_u64_le(imm as u64);
        }
        Ok(())
    }

    fn reg_copy(buf: &mut CodeBuffer, dst: Reg64, src: Reg64) {
        Self::rex_w(buf);
        buf.mov_r32_r32(dst.encoding(), src.encoding());
    }

    fn syscall(buf: &mut CodeBuffer) {
        buf.emit_bytes(&[0x0F, 0x05]);
    }

    fn nop_loop_open(buf: &mut CodeBuffer) {
        pad_loop_open(buf);
    }

    fn jump_zero(buf: &mut CodeBuffer, reg: Reg64, offset: i64) -> EncodeResult {
        test_jcc(buf, Cond::Zero, reg.encoding(), offset)
    }

    fn jump_not_zero(buf: &mut CodeBuffer, reg: Reg64, offset: i64) -> EncodeResult {
        test_jcc(buf, Cond::NotZero, reg.encoding(), offset)
    }

    fn inc_reg(buf: &mut CodeBuffer, reg: Reg64) {
        Self::rex_w(buf);
        buf.inc_r32(reg.encoding());
    }

    fn dec_reg(buf: &mut CodeBuffer, reg: Reg64) {
        Self::rex_w(buf);
        buf.dec_r32(reg.encoding());
    }

    fn inc_byte(buf: &mut CodeBuffer, reg: Reg64) {
        buf.inc_m8(reg.encoding());
    }

    fn dec_byte(buf: &mut CodeBuffer, reg: Reg64) {
        buf.dec_m8(reg.encoding());
    }

    fn add_reg(buf: &mut CodeBuffer, reg: Reg64, imm: u64) -> EncodeResult {
        Self::arith_reg(buf, ArithOp::Add, reg, imm)
    }

    fn sub_reg(buf: &mut CodeBuffer, reg: Reg64, imm: u64) -> EncodeResult {
        Self::arith_reg(buf, ArithOp::Sub, reg, imm)
    }

    fn add_byte(buf: &mut CodeBuffer, reg: Reg64, imm: u8) {
        buf.arith_m8_imm8(ArithOp::Add, reg.encoding(), imm);
    }

    fn sub_byte(buf: &mut CodeBuffer, reg: Reg64, imm: u8) {
        buf.arith_m8_imm8(ArithOp::Sub, reg.encoding(), imm);
    }

    fn zero_byte(buf: &mut CodeBuffer, reg: Reg64) {
        buf.mov_m8_imm8(reg.encoding(), 0);
    }
}
