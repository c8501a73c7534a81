//! z/Architecture Instruction Encoding
//!
//! Instructions are 2, 4 or 6 bytes, always big-endian.
//!
//! ## Formats Used
//!
//! ```text
//! I      [op8][imm8]
//! RI     [op_hi8][r1:4|op_lo4][imm16]
//! RIL    [op_hi8][r1:4|op_lo4][imm32]
//! RX     [op8][r1:4|x2:4][b2:4|d2:12]
//! RXY    [op_hi8][r1:4|x2:4][b2:4|dl2:12][dh2:8][op_lo8]
//! RRE    [op16][0x00][r1:4|r2:4]
//! ```
//!
//! Memory operands only ever use an index register with zero base and
//! displacement.

use super::registers::Reg;
use crate::buffer::CodeBuffer;

/// Branch condition mask, tested against the condition code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mask {
    /// CC0 (equal / zero)
    Eq = 0b1000,
    /// CC1 or CC2 (low or high)
    Ne = 0b0110,
    Always = 0b1111,
}

/// First two bytes of an RI/RIL instruction with a 12-bit opcode
fn ri_op(buf: &mut CodeBuffer, op: u16, r1: u8) {
    buf.emit((op >> 4) as u8);
    buf.emit((r1 << 4) | (op & 0xf) as u8);
}

fn ri(buf: &mut CodeBuffer, op: u16, r1: u8, imm: u16) {
    ri_op(buf, op, r1);
    buf.emit_u16_be(imm);
}

fn ril(buf: &mut CodeBuffer, op: u16, r1: u8, imm: u32) {
    ri_op(buf, op, r1);
    buf.emit_u32_be(imm);
}

// =============================================================================
// Loads
// =============================================================================

/// LGR r1, r2 - 64-bit register copy
pub fn lgr(buf: &mut CodeBuffer, r1: Reg, r2: Reg) {
    buf.emit_bytes(&[0xb9, 0x04, 0x00, (r1.encoding() << 4) | r2.encoding()]);
}

/// LGHI r1, imm16 - load sign-extended halfword immediate
pub fn lghi(buf: &mut CodeBuffer, r1: Reg, imm: i16) {
    ri(buf, 0xa79, r1.encoding(), imm as u16);
}

/// LGFI r1, imm32 - load sign-extended word immediate
pub fn lgfi(buf: &mut CodeBuffer, r1: Reg, imm: i32) {
    ril(buf, 0xc01, r1.encoding(), imm as u32);
}

/// IIHH r1, imm16 - insert into bits 0-15
pub fn iihh(buf: &mut CodeBuffer, r1: Reg, imm: u16) {
    ri(buf, 0xa50, r1.encoding(), imm);
}

/// IIHL r1, imm16 - insert into bits 16-31
pub fn iihl(buf: &mut CodeBuffer, r1: Reg, imm: u16) {
    ri(buf, 0xa51, r1.encoding(), imm);
}

/// IIHF r1, imm32 - insert into bits 0-31
pub fn iihf(buf: &mut CodeBuffer, r1: Reg, imm: u32) {
    ril(buf, 0xc08, r1.encoding(), imm);
}

/// LLGC r1, 0(x2) - load zero-extended byte
pub fn llgc(buf: &mut CodeBuffer, r1: Reg, x2: Reg) {
    buf.emit_bytes(&[0xe3, (r1.encoding() << 4) | x2.encoding(), 0x00, 0x00, 0x00, 0x90]);
}

/// STC r1, 0(x2) - store low byte
pub fn stc(buf: &mut CodeBuffer, r1: Reg, x2: Reg) {
    buf.emit_bytes(&[0x42, (r1.encoding() << 4) | x2.encoding(), 0x00, 0x00]);
}

// =============================================================================
// Arithmetic
// =============================================================================

/// AGHI r1, imm16
pub fn aghi(buf: &mut CodeBuffer, r1: Reg, imm: i16) {
    ri(buf, 0xa7b, r1.encoding(), imm as u16);
}

/// AGFI r1, imm32
pub fn agfi(buf: &mut CodeBuffer, r1: Reg, imm: i32) {
    ril(buf, 0xc28, r1.encoding(), imm as u32);
}

/// AIH r1, imm32 - add to bits 0-31 only
pub fn aih(buf: &mut CodeBuffer, r1: Reg, imm: i32) {
    ril(buf, 0xcc8, r1.encoding(), imm as u32);
}

/// CFI r1, imm32 - compare low word, sets the condition code
pub fn cfi(buf: &mut CodeBuffer, r1: Reg, imm: i32) {
    ril(buf, 0xc2d, r1.encoding(), imm as u32);
}

// =============================================================================
// Branches
// =============================================================================

/// BRC mask, imm16 - relative halfword offset from this instruction
pub fn brc(buf: &mut CodeBuffer, mask: Mask, halfwords: i16) {
    ri(buf, 0xa74, mask as u8, halfwords as u16);
}

/// BRCL mask, imm32 - relative halfword offset from this instruction
pub fn brcl(buf: &mut CodeBuffer, mask: Mask, halfwords: i32) {
    ril(buf, 0xc04, mask as u8, halfwords as u32);
}

// =============================================================================
// System
// =============================================================================

/// SVC 0 - syscall number is taken from r1
pub fn svc(buf: &mut CodeBuffer) {
    buf.emit_bytes(&[0x0a, 0x00]);
}

/// NOP (BC 0, 0)
pub fn nop(buf: &mut CodeBuffer) {
    buf.emit_bytes(&[0x47, 0x00, 0x00, 0x00]);
}

/// NOPR (BCR 0, 0)
pub fn nopr(buf: &mut CodeBuffer) {
    buf.emit_bytes(&[0x07, 0x00]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_store() {
        let mut buf = CodeBuffer::new();
        llgc(&mut buf, Reg::R5, Reg::R8);
        stc(&mut buf, Reg::R5, Reg::R8);
        stc(&mut buf, Reg::R8, Reg::R5);
        assert_eq!(
            buf.code(),
            &[0xe3, 0x58, 0, 0, 0, 0x90, 0x42, 0x58, 0, 0, 0x42, 0x85, 0, 0]
        );
    }

    #[test]
    fn test_immediates_are_big_endian() {
        let mut buf = CodeBuffer::new();
        lghi(&mut buf, Reg::R5, 12345);
        lgfi(&mut buf, Reg::R4, 0x1234abcd);
        assert_eq!(
            buf.code(),
            &[0xa7, 0x59, 0x30, 0x39, 0xc0, 0x41, 0x12, 0x34, 0xab, 0xcd]
        );
    }

    #[test]
    fn test_reg_copy() {
        let mut buf = CodeBuffer::new();
        lgr(&mut buf, Reg::R2, Reg::R1);
        assert_eq!(buf.code(), &[0xb9, 0x04, 0x00, 0x21]);
    }

    #[test]
    fn test_branches() {
        let mut buf = CodeBuffer::new();
        brc(&mut buf, Mask::Always, 1);
        brcl(&mut buf, Mask::Ne, -3);
        assert_eq!(
            buf.code(),
            &[0xa7, 0xf4, 0x00, 0x01, 0xc0, 0x64, 0xff, 0xff, 0xff, 0xfd]
        );
    }
}
