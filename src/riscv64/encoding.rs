//! RISC-V Instruction Encoding
//!
//! RV64I base instructions (4 bytes) and the RVC compressed subset
//! (2 bytes) used by the backend.

use super::registers::Reg;
use crate::arch::{bit_fits, sign_extend};
use crate::buffer::CodeBuffer;

fn emit32(buf: &mut CodeBuffer, insn: u32) {
    buf.emit_u32_le(insn);
}

fn emit16(buf: &mut CodeBuffer, insn: u16) {
    buf.emit_u16_le(insn);
}

/// CI format: imm[5] in bit 12, rd in bits 7-11, imm[4:0] in bits 2-6
fn ci(base: u16, rd: Reg, imm6: i64) -> u16 {
    let imm = imm6 as u32;
    (base as u32 | (((imm & 0x20) | rd.encoding()) << 7) | ((imm & 0x1f) << 2)) as u16
}

/// I format with funct3 = 0
fn i_type(opcode: u32, rd: Reg, rs1: Reg, imm12: i64) -> u32 {
    ((imm12 as u32) << 20) | (rs1.encoding() << 15) | (rd.encoding() << 7) | opcode
}

// =============================================================================
// Base Integer Instructions
// =============================================================================

/// ADDI rd, rs1, imm12
pub fn addi(buf: &mut CodeBuffer, rd: Reg, rs1: Reg, imm12: i64) {
    emit32(buf, i_type(0x13, rd, rs1, imm12));
}

/// ADDIW rd, rs1, imm12
pub fn addiw(buf: &mut CodeBuffer, rd: Reg, rs1: Reg, imm12: i64) {
    emit32(buf, i_type(0x1b, rd, rs1, imm12));
}

/// LUI rd, imm20
pub fn lui(buf: &mut CodeBuffer, rd: Reg, imm20: i64) {
    emit32(buf, ((imm20 as u32) << 12) | (rd.encoding() << 7) | 0x37);
}

/// LB rd, 0(rs1)
pub fn lb(buf: &mut CodeBuffer, rd: Reg, rs1: Reg) {
    emit32(buf, i_type(0x03, rd, rs1, 0));
}

/// SB rs2, 0(rs1)
pub fn sb(buf: &mut CodeBuffer, rs2: Reg, rs1: Reg) {
    emit32(buf, (rs2.encoding() << 20) | (rs1.encoding() << 15) | 0x23);
}

/// Branch comparison against the zero register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BranchZero {
    /// BEQZ (BEQ rs, zero)
    Eq = 0b000,
    /// BNEZ (BNE rs, zero)
    Ne = 0b001,
}

/// BEQZ/BNEZ rs, offset (B format, offset must be even and fit 13 bits)
pub fn branch_zero(buf: &mut CodeBuffer, cond: BranchZero, rs: Reg, offset: i64) {
    let off = offset as u32;
    let insn = (((off >> 12) & 1) << 31)
        | (((off >> 5) & 0x3f) << 25)
        | (rs.encoding() << 15)
        | ((cond as u32) << 12)
        | (((off >> 1) & 0xf) << 8)
        | (((off >> 11) & 1) << 7)
        | 0x63;
    emit32(buf, insn);
}

/// JAL rd, offset (J format, offset must be even and fit 21 bits)
pub fn jal(buf: &mut CodeBuffer, rd: Reg, offset: i64) {
    // imm[20|10:1|11|19:12]
    let d = offset as u32;
    let insn = ((d & (1 << 20)) << 11)
        | ((d & 0x7fe) << 20)
        | ((d & (1 << 11)) << 9)
        | (d & 0xff000)
        | (rd.encoding() << 7)
        | 0x6f;
    emit32(buf, insn);
}

/// ECALL
pub fn ecall(buf: &mut CodeBuffer) {
    emit32(buf, 0x73);
}

/// NOP (ADDI zero, zero, 0)
pub fn nop(buf: &mut CodeBuffer) {
    addi(buf, Reg::Zero, Reg::Zero, 0);
}

// =============================================================================
// Compressed Instructions
// =============================================================================

/// C.ADDI rd, imm6
pub fn c_addi(buf: &mut CodeBuffer, rd: Reg, imm6: i64) {
    emit16(buf, ci(0x0001, rd, imm6));
}

/// C.ADDIW rd, imm6
pub fn c_addiw(buf: &mut CodeBuffer, rd: Reg, imm6: i64) {
    emit16(buf, ci(0x2001, rd, imm6));
}

/// C.LI rd, imm6
pub fn c_li(buf: &mut CodeBuffer, rd: Reg, imm6: i64) {
    emit16(buf, ci(0x4001, rd, imm6));
}

/// C.LUI rd, imm6 (nonzero)
pub fn c_lui(buf: &mut CodeBuffer, rd: Reg, imm6: i64) {
    emit16(buf, ci(0x6001, rd, imm6));
}

/// C.SLLI rd, shamt
pub fn c_slli(buf: &mut CodeBuffer, rd: Reg, shamt: u32) {
    emit16(buf, ci(0x0002, rd, shamt as i64));
}

/// C.MV rd, rs
pub fn c_mv(buf: &mut CodeBuffer, rd: Reg, rs: Reg) {
    emit16(buf, (0x8002 | (rd.encoding() << 7) | (rs.encoding() << 2)) as u16);
}

/// C.ADD rd, rs
pub fn c_add(buf: &mut CodeBuffer, rd: Reg, rs: Reg) {
    emit16(buf, (0x9002 | (rd.encoding() << 7) | (rs.encoding() << 2)) as u16);
}

// =============================================================================
// Pseudo-instructions
// =============================================================================

/// LI rd, val - load an arbitrary 64-bit immediate.
///
/// Follows the LLVM expansion: LUI/ADDIW for 32-bit values, otherwise load
/// the upper bits recursively and shift them into place, preferring the
/// compressed forms wherever the immediate fits.
pub fn li(buf: &mut CodeBuffer, rd: Reg, val: i64) {
    let lo12 = sign_extend(val, 12);

    if bit_fits(val, 32) {
        let hi20 = sign_extend((((val as u64).wrapping_add(0x800)) >> 12) as i64, 20);
        if hi20 != 0 && bit_fits(hi20, 6) {
            c_lui(buf, rd, hi20);
        } else if hi20 != 0 {
            lui(buf, rd, hi20);
        }
        if lo12 != 0 || hi20 == 0 {
            match (bit_fits(lo12, 6), hi20 != 0) {
                (true, true) => c_addiw(buf, rd, lo12),
                (true, false) => c_li(buf, rd, lo12),
                (false, true) => addiw(buf, rd, rd, lo12),
                (false, false) => addi(buf, rd, Reg::Zero, lo12),
            }
        }
        return;
    }

    let upper = (val as u64).wrapping_add(0x800) >> 12;
    let mut shift = upper.trailing_zeros() + 12;
    let mut hi52 = sign_extend((upper >> (shift - 12)) as i64, 64 - shift);

    // Shift by 12 less if that lets the upper part load with a bare LUI
    if shift > 12 && !bit_fits(hi52, 12) && bit_fits(((hi52 as u64) << 12) as i64, 32) {
        shift -= 12;
        hi52 = ((hi52 as u64) << 12) as i64;
    }

    li(buf, rd, hi52);
    c_slli(buf, rd, shift);

    if lo12 != 0 && bit_fits(lo12, 6) {
        c_addi(buf, rd, lo12);
    } else if lo12 != 0 {
        addi(buf, rd, rd, lo12);
    }
}
