//! ARM64 (AArch64) Instruction Encoding
//!
//! Encodes ARM64 instructions into 32-bit machine code.
//! All ARM64 instructions are exactly 4 bytes.

use super::registers::{Reg64, ZR};
use crate::buffer::CodeBuffer;

/// Encode a 32-bit instruction and append to buffer
fn emit(buf: &mut CodeBuffer, insn: u32) {
    buf.emit_u32_le(insn);
}

// =============================================================================
// Move Wide
// =============================================================================

/// Move-wide variant, as the `opc` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MoveKind {
    /// MOVN: write the inverted immediate
    Invert = 0b00,
    /// MOVZ: write the immediate, zero the rest
    Zero = 0b10,
    /// MOVK: replace one halfword, keep the rest
    Keep = 0b11,
}

/// MOVN/MOVZ/MOVK Xd, #imm16, LSL #shift
///
/// `imm16` is the halfword the register should hold afterwards; for MOVN it
/// is inverted before encoding.
pub fn mov_wide(buf: &mut CodeBuffer, kind: MoveKind, rd: Reg64, imm16: u16, shift: u8) {
    // sf=1 opc 100101 hw imm16 Rd
    let imm = if kind == MoveKind::Invert { !imm16 } else { imm16 };
    let hw = (shift / 16) as u32;
    let insn = 0x92800000 | ((kind as u32) << 29) | (hw << 21) | ((imm as u32) << 5) | rd.encoding();
    emit(buf, insn);
}

// =============================================================================
// Arithmetic
// =============================================================================

/// Add or subtract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddSub {
    Add,
    Sub,
}

/// ADD/SUB (immediate) Xd, Xn, #imm12{, LSL #12}
pub fn add_sub_imm(buf: &mut CodeBuffer, op: AddSub, rd: Reg64, rn: Reg64, imm12: u16, lsl12: bool) {
    // sf op S 100010 sh imm12 Rn Rd
    let base: u32 = match op {
        AddSub::Add => 0x91000000,
        AddSub::Sub => 0xD1000000,
    };
    let insn = base
        | ((lsl12 as u32) << 22)
        | (((imm12 & 0xfff) as u32) << 10)
        | (rn.encoding() << 5)
        | rd.encoding();
    emit(buf, insn);
}

/// ADD/SUB (shifted register) Xd, Xn, Xm
pub fn add_sub_reg(buf: &mut CodeBuffer, op: AddSub, rd: Reg64, rn: Reg64, rm: Reg64) {
    // sf op S 01011 shift 0 Rm imm6 Rn Rd
    let base: u32 = match op {
        AddSub::Add => 0x8B000000,
        AddSub::Sub => 0xCB000000,
    };
    let insn = base | (rm.encoding() << 16) | (rn.encoding() << 5) | rd.encoding();
    emit(buf, insn);
}

/// MOV (register) - alias for ORR Xd, XZR, Xm
pub fn mov_x(buf: &mut CodeBuffer, rd: Reg64, rm: Reg64) {
    let insn = 0xAA0003E0 | (rm.encoding() << 16) | rd.encoding();
    emit(buf, insn);
}

/// TST Xn, #0xff - alias for ANDS XZR, Xn, #0xff
pub fn tst_low_byte(buf: &mut CodeBuffer, rn: Reg64) {
    let insn = 0xF2401C00 | (rn.encoding() << 5) | ZR;
    emit(buf, insn);
}

// =============================================================================
// Loads and Stores
// =============================================================================

/// LDRB Wt, [Xn], #0 (post-index form, address unchanged)
pub fn ldrb(buf: &mut CodeBuffer, rt: Reg64, rn: Reg64) {
    let insn = 0x38400400 | (rn.encoding() << 5) | rt.encoding();
    emit(buf, insn);
}

/// STRB Wt, [Xn], #0
pub fn strb(buf: &mut CodeBuffer, rt: Reg64, rn: Reg64) {
    let insn = 0x38000400 | (rn.encoding() << 5) | rt.encoding();
    emit(buf, insn);
}

/// STRB WZR, [Xn], #0
pub fn strb_zero(buf: &mut CodeBuffer, rn: Reg64) {
    let insn = 0x38000400 | (rn.encoding() << 5) | ZR;
    emit(buf, insn);
}

// =============================================================================
// Branches
// =============================================================================

/// Branch condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Condition {
    EQ = 0b0000,
    NE = 0b0001,
}

/// B.cond with a pre-scaled 19-bit word offset
pub fn b_cond(buf: &mut CodeBuffer, cond: Condition, imm19: i32) {
    let insn = 0x54000000 | (((imm19 as u32) & 0x7ffff) << 5) | cond as u32;
    emit(buf, insn);
}

// =============================================================================
// System
// =============================================================================

/// SVC #0
pub fn svc(buf: &mut CodeBuffer) {
    emit(buf, 0xD4000001);
}

/// BRK #1
pub fn brk(buf: &mut CodeBuffer) {
    emit(buf, 0xD4200020);
}

/// NOP
pub fn nop(buf: &mut CodeBuffer) {
    emit(buf, 0xD503201F);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(buf: &CodeBuffer) -> Vec<u32> {
        buf.code()
            .chunks(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn test_mov_wide() {
        let mut buf = CodeBuffer::new();
        mov_wide(&mut buf, MoveKind::Zero, Reg64::X0, 42, 0);
        mov_wide(&mut buf, MoveKind::Keep, Reg64::X8, 0x4111, 16);
        mov_wide(&mut buf, MoveKind::Invert, Reg64::X8, 0, 0);
        // MOVZ X0, #42; MOVK X8, #0x4111, LSL #16; MOVN X8, #0xffff
        assert_eq!(words(&buf), [0xD2800540, 0xF2A82228, 0x929FFFE8]);
    }

    #[test]
    fn test_loads_and_stores() {
        let mut buf = CodeBuffer::new();
        ldrb(&mut buf, Reg64::X17, Reg64::X19);
        tst_low_byte(&mut buf, Reg64::X17);
        strb(&mut buf, Reg64::X17, Reg64::X19);
        strb_zero(&mut buf, Reg64::X19);
        assert_eq!(words(&buf), [0x38400671, 0xF2401E3F, 0x38000671, 0x3800067F]);
    }

    #[test]
    fn test_add_sub() {
        let mut buf = CodeBuffer::new();
        add_sub_imm(&mut buf, AddSub::Add, Reg64::X17, Reg64::X17, 1, false);
        add_sub_imm(&mut buf, AddSub::Sub, Reg64::X19, Reg64::X19, 0x12, true);
        add_sub_reg(&mut buf, AddSub::Add, Reg64::X0, Reg64::X1, Reg64::X2);
        // ADD X17, X17, #1; SUB X19, X19, #0x12, LSL #12; ADD X0, X1, X2
        assert_eq!(words(&buf), [0x91000631, 0xD1404A73, 0x8B020020]);
    }

    #[test]
    fn test_mov_and_svc() {
        let mut buf = CodeBuffer::new();
        mov_x(&mut buf, Reg64::X1, Reg64::X19);
        svc(&mut buf);
        assert_eq!(buf.code(), &[0xE1, 0x03, 0x13, 0xAA, 0x01, 0x00, 0x00, 0xD4]);
    }

    #[test]
    fn test_b_cond() {
        let mut buf = CodeBuffer::new();
        b_cond(&mut buf, Condition::EQ, 9);
        b_cond(&mut buf, Condition::NE, -7);
        assert_eq!(words(&buf), [0x54000120, 0x54FFFF21]);
    }
}
