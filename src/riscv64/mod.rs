//! RISC-V 64 Backend
//!
//! Targets RV64GC Linux. Compressed instructions are used wherever they fit,
//! so generated code is not 4-byte aligned and jump offsets only need to be
//! even.
//!
//! ## Loop Jumps
//!
//! Conditional branches only reach 4 KiB, so each loop jump is an inverted
//! branch over an unconditional JAL:
//!
//! ```text
//! lb   t1, 0(s0)
//! bnez t1, 8        (beqz for jump_not_zero)
//! jal  zero, offset
//! ```

pub mod encoding;
pub mod registers;

use crate::arch::{
    bit_fits, jump_too_long, misaligned_jump, ArchInter, EncodeResult, Registers, SyscallNums,
};
use crate::buffer::CodeBuffer;
use crate::elf::consts::{EF_RISCV_FLOAT_ABI_DOUBLE, EF_RISCV_RVC, EM_RISCV};
use crate::elf::ElfClass;
use crate::serialize::Endian;
use encoding::BranchZero;
use registers::Reg;

/// Scratch register for byte loads and large immediates
const SCRATCH: Reg = Reg::T1;

/// RISC-V 64 Linux target
#[derive(Debug, Clone, Copy)]
pub struct Riscv64;

impl Riscv64 {
    fn cond_jump(buf: &mut CodeBuffer, skip_if: BranchZero, reg: Reg, offset: i64) -> EncodeResult {
        if offset % 2 != 0 {
            return Err(misaligned_jump(offset, 2));
        }
        // JAL is the last 4 bytes of the sequence
        let displacement = offset
            .checked_add(4)
            .filter(|d| bit_fits(*d, 21))
            .ok_or_else(|| jump_too_long(offset, 21))?;
        encoding::lb(buf, SCRATCH, reg);
        encoding::branch_zero(buf, skip_if, SCRATCH, 8);
        encoding::jal(buf, Reg::Zero, displacement);
        Ok(())
    }

    fn add_signed(buf: &mut CodeBuffer, reg: Reg, imm: i64) {
        if imm == 0 {
            return;
        }
        if bit_fits(imm, 6) {
            encoding::c_addi(buf, reg, imm);
        } else if bit_fits(imm, 12) {
            encoding::addi(buf, reg, reg, imm);
        } else {
            encoding::li(buf, SCRATCH, imm);
            encoding::c_add(buf, reg, SCRATCH);
        }
    }

    fn add_byte_signed(buf: &mut CodeBuffer, reg: Reg, imm: i8) {
        if imm == 0 {
            return;
        }
        let imm = imm as i64;
        encoding::lb(buf, SCRATCH, reg);
        if bit_fits(imm, 6) {
            encoding::c_addi(buf, SCRATCH, imm);
        } else {
            encoding::addi(buf, SCRATCH, SCRATCH, imm);
        }
        encoding::sb(buf, SCRATCH, reg);
    }
}

impl ArchInter for Riscv64 {
    type Reg = Reg;

    const NAME: &'static str = "riscv64";
    const JUMP_SIZE: usize = 12;
    const REGISTERS: Registers<Reg> = Registers {
        sc_num: Reg::A7,
        arg1: Reg::A0,
        arg2: Reg::A1,
        arg3: Reg::A2,
        bf_ptr: Reg::S0,
    };
    const SC_NUMS: SyscallNums = SyscallNums {
        read: 63,
        write: 64,
        exit: 93,
    };
    const ELF_MACHINE: u16 = EM_RISCV;
    const ELF_CLASS: ElfClass = ElfClass::Elf64;
    const E_FLAGS: u32 = EF_RISCV_RVC | EF_RISCV_FLOAT_ABI_DOUBLE;
    const ENDIAN: Endian = Endian::Little;

    fn set_reg(buf: &mut CodeBuffer, reg: Reg, imm: i64) -> EncodeResult {
        encoding::li(buf, reg, imm);
        Ok(())
    }

    fn reg_copy(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
        encoding::c_mv(buf, dst, src);
    }

    fn syscall(buf: &mut CodeBuffer) {
        encoding::ecall(buf);
    }

    fn nop_loop_open(buf: &mut CodeBuffer) {
        for _ in 0..3 {
            encoding::nop(buf);
        }
    }

    fn jump_zero(buf: &mut CodeBuffer, reg: Reg, offset: i64) -> EncodeResult {
        Self::cond_jump(buf, BranchZero::Ne, reg, offset)
    }

    fn jump_not_zero(buf: &mut CodeBuffer, reg: Reg, offset: i64) -> EncodeResult {
        Self::cond_jump(buf, BranchZero::Eq, reg, offset)
    }

    fn inc_reg(buf: &mut CodeBuffer, reg: Reg) {
        encoding::c_addi(buf, reg, 1);
    }

    fn dec_reg(buf: &mut CodeBuffer, reg: Reg) {
        encoding::c_addi(buf, reg, -1);
    }

    fn inc_byte(buf: &mut CodeBuffer, reg: Reg) {
        Self::add_byte_signed(buf, reg, 1);
    }

    fn dec_byte(buf: &mut CodeBuffer, reg: Reg) {
        Self::add_byte_signed(buf, reg, -1);
    }

    fn add_reg(buf: &mut CodeBuffer, reg: Reg, imm: u64) -> EncodeResult {
        Self::add_signed(buf, reg, imm as i64);
        Ok(())
    }

    fn sub_reg(buf: &mut CodeBuffer, reg: Reg, imm: u64) -> EncodeResult {
        // i64::MIN negates to itself, and adding or subtracting it is the same
        Self::add_signed(buf, reg, (imm as i64).wrapping_neg());
        Ok(())
    }

    fn add_byte(buf: &mut CodeBuffer, reg: Reg, imm: u8) {
        Self::add_byte_signed(buf, reg, imm as i8);
    }

    fn sub_byte(buf: &mut CodeBuffer, reg: Reg, imm: u8) {
        Self::add_byte_signed(buf, reg, (imm as i8).wrapping_neg());
    }

    fn zero_byte(buf: &mut CodeBuffer, reg: Reg) {
        encoding::sb(buf, Reg::Zero, reg);
    }
}
