//! s390x (z/Architecture) Backend
//!
//! The only big-endian target, which keeps the endian handling in the ELF
//! writer honest.
//!
//! ## Loop Jumps
//!
//! Bytes can't be compared in memory directly, so the cell is loaded into
//! the scratch register first:
//!
//! ```text
//! llgc %r5, 0(%r8)
//! cfi  %r5, 0
//! brcl mask, offset      (mask 8 = equal, 6 = not equal)
//! ```
//!
//! BRCL counts halfwords from its own address, 6 bytes before the end of
//! the sequence.

pub mod encoding;
pub mod registers;

use crate::arch::{
    jump_too_long, misaligned_jump, ArchInter, EncodeResult, Registers, SyscallNums,
};
use crate::buffer::CodeBuffer;
use crate::elf::consts::EM_S390;
use crate::elf::ElfClass;
use crate::serialize::Endian;
use encoding::Mask;
use registers::Reg;

/// Scratch register for byte loads
const SCRATCH: Reg = Reg::R5;

/// s390x Linux target
#[derive(Debug, Clone, Copy)]
pub struct S390x;

impl S390x {
    fn branch(buf: &mut CodeBuffer, mask: Mask, reg: Reg, offset: i64) -> EncodeResult {
        if offset % 2 != 0 {
            return Err(misaligned_jump(offset, 2));
        }
        let halfwords = offset
            .checked_add(6)
            .and_then(|d| i32::try_from(d >> 1).ok())
            .ok_or_else(|| jump_too_long(offset, 33))?;
        encoding::llgc(buf, SCRATCH, reg);
        encoding::cfi(buf, SCRATCH, 0);
        encoding::brcl(buf, mask, halfwords);
        Ok(())
    }

    fn add_signed(buf: &mut CodeBuffer, reg: Reg, imm: i64) {
        if let Ok(imm16) = i16::try_from(imm) {
            encoding::aghi(buf, reg, imm16);
        } else if let Ok(imm32) = i32::try_from(imm) {
            encoding::agfi(buf, reg, imm32);
        } else {
            // AGFI sign-extends the low word into the high one, so AIH
            // adds whatever is left after it
            let low = imm as i32;
            let high = (imm.wrapping_sub(low as i64) >> 32) as i32;
            if low != 0 {
                Self::add_signed(buf, reg, low as i64);
            }
            encoding::aih(buf, reg, high);
        }
    }

    fn add_byte_signed(buf: &mut CodeBuffer, reg: Reg, imm: i64) {
        encoding::llgc(buf, SCRATCH, reg);
        Self::add_signed(buf, SCRATCH, imm);
        encoding::stc(buf, SCRATCH, reg);
    }
}

impl ArchInter for S390x {
    type Reg = Reg;

    const NAME: &'static str = "s390x";
    const JUMP_SIZE: usize = 18;
    const REGISTERS: Registers<Reg> = Registers {
        sc_num: Reg::R1,
        arg1: Reg::R2,
        arg2: Reg::R3,
        arg3: Reg::R4,
        bf_ptr: Reg::R8,
    };
    const SC_NUMS: SyscallNums = SyscallNums {
        read: 3,
        write: 4,
        exit: 1,
    };
    const ELF_MACHINE: u16 = EM_S390;
    const ELF_CLASS: ElfClass = ElfClass::Elf64;
    const E_FLAGS: u32 = 0;
    const ENDIAN: Endian = Endian::Big;

    fn set_reg(buf: &mut CodeBuffer, reg: Reg, imm: i64) -> EncodeResult {
        if imm == 0 {
            encoding::lgr(buf, reg, Reg::R0);
        } else if let Ok(imm16) = i16::try_from(imm) {
            encoding::lghi(buf, reg, imm16);
        } else if let Ok(imm32) = i32::try_from(imm) {
            encoding::lgfi(buf, reg, imm32);
        } else {
            let low = imm as i32;
            let upper = (imm >> 32) as u32;
            Self::set_reg(buf, reg, low as i64)?;
            // The low load sign-extends, so the high halfwords already hold
            // copies of its sign bit
            let fill: u16 = if low < 0 { 0xffff } else { 0 };
            if (upper >> 16) as u16 == fill {
                encoding::iihl(buf, reg, upper as u16);
            } else if upper as u16 == fill {
                encoding::iihh(buf, reg, (upper >> 16) as u16);
            } else {
                encoding::iihf(buf, reg, upper);
            }
        }
        Ok(())
    }

    fn reg_copy(buf: &mut CodeBuffer, dst: Reg, src: Reg) {
        encoding::lgr(buf, dst, src);
    }

    fn syscall(buf: &mut CodeBuffer) {
        encoding::svc(buf);
    }

    fn nop_loop_open(buf: &mut CodeBuffer) {
        // Branch into its own second halfword traps, as __builtin_trap() does
        encoding::brc(buf, Mask::Always, 1);
        for _ in 0..3 {
            encoding::nop(buf);
        }
        encoding::nopr(buf);
    }

    fn jump_zero(buf: &mut CodeBuffer, reg: Reg, offset: i64) -> EncodeResult {
        Self::branch(buf, Mask::Eq, reg, offset)
    }

    fn jump_not_zero(buf: &mut CodeBuffer, reg: Reg, offset: i64) -> EncodeResult {
        Self::branch(buf, Mask::Ne, reg, offset)
    }

    fn inc_reg(buf: &mut CodeBuffer, reg: Reg) {
        Self::add_signed(buf, reg, 1);
    }

    fn dec_reg(buf: &mut CodeBuffer, reg: Reg) {
        Self::add_signed(buf, reg, -1);
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
        Self::add_signed(buf, reg, (imm as i64).wrapping_neg());
        Ok(())
    }

    fn add_byte(buf: &mut CodeBuffer, reg: Reg, imm: u8) {
        Self::add_byte_signed(buf, reg, imm as i64);
    }

    fn sub_byte(buf: &mut CodeBuffer, reg: Reg, imm: u8) {
        Self::add_byte_signed(buf, reg, -(imm as i64));
    }

    fn zero_byte(buf: &mut CodeBuffer, reg: Reg) {
        encoding::stc(buf, Reg::R0, reg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn set(reg: Reg, imm: i64) -> Vec<u8> {
        let mut buf = CodeBuffer::new();
        S390x::set_reg(&mut buf, reg, imm).unwrap();
        buf.into_code()
    }

    #[test]
    fn test_set_reg_zero_copies_r0() {
        let mut buf = CodeBuffer::new();
        S390x::reg_copy(&mut buf, Reg::R2, Reg::R0);
        assert_eq!(set(Reg::R2, 0), buf.code());
    }

    #[test]
    fn test_set_reg_small_and_medium() {
        // lghi %r8, -12345
        assert_eq!(set(Reg::R8, -12345), [0xa7, 0x89, 0xcf, 0xc7]);
        // lgfi %r4, -0x1234abcd
        assert_eq!(set(Reg::R4, -0x1234abcd), [0xc0, 0x41, 0xed, 0xcb, 0x54, 0x33]);
    }

    #[test]
    fn test_set_reg_upper_halfword() {
        // lgfi %r1, 0xbeef; iihl %r1, 0xdead
        assert_eq!(
            set(Reg::R1, 0xdead_0000_beef),
            [0xc0, 0x11, 0x00, 0x00, 0xbe, 0xef, 0xa5, 0x11, 0xde, 0xad]
        );
        // lgfi %r2, -0xbeef; iihl %r2, 0x2152
        assert_eq!(
            set(Reg::R2, -0xdead_0000_beef),
            [0xc0, 0x21, 0xff, 0xff, 0x41, 0x11, 0xa5, 0x21, 0x21, 0x52]
        );
        // lgr %r3, %r0; iihl %r3, 0xdead
        assert_eq!(
            set(Reg::R3, 0xdead_0000_0000),
            [0xb9, 0x04, 0x00, 0x30, 0xa5, 0x31, 0xde, 0xad]
        );
        // lgr %r5, %r0; iihh %r5, 0x1234
        assert_eq!(
            set(Reg::R5, 0x1234_0000_0000_0000),
            [0xb9, 0x04, 0x00, 0x50, 0xa5, 0x50, 0x12, 0x34]
        );
    }

    #[test]
    fn test_set_reg_fill_follows_low_word_sign() {
        // The low word is -1, so the high halfword must be written too
        // lghi %r4, -1; iihf %r4, 0x7fff0000
        assert_eq!(
            set(Reg::R4, i64::MAX ^ (0xffff << 32)),
            [0xa7, 0x49, 0xff, 0xff, 0xc0, 0x48, 0x7f, 0xff, 0x00, 0x00]
        );
        // lgfi %r8, 0x9abcdef0; iihf %r8, 0x12345678
        assert_eq!(
            set(Reg::R8, 0x1234_5678_9abc_def0),
            [0xc0, 0x81, 0x9a, 0xbc, 0xde, 0xf0, 0xc0, 0x88, 0x12, 0x34, 0x56, 0x78]
        );
    }

    #[test]
    fn test_reg_arith() {
        let mut a = CodeBuffer::new();
        let mut b = CodeBuffer::new();
        S390x::add_reg(&mut a, Reg::R8, 1).unwrap();
        S390x::inc_reg(&mut b, Reg::R8);
        assert_eq!(a, b);
        // aghi %r8, 1
        assert_eq!(a.code(), &[0xa7, 0x8b, 0x00, 0x01]);

        let mut buf = CodeBuffer::new();
        S390x::sub_reg(&mut buf, Reg::R8, 0x123456).unwrap();
        // agfi %r8, -0x123456
        assert_eq!(buf.code(), &[0xc2, 0x88, 0xff, 0xed, 0xcb, 0xaa]);
    }

    #[test]
    fn test_reg_arith_large() {
        let mut buf = CodeBuffer::new();
        S390x::add_reg(&mut buf, Reg::R8, 9_876_543_210).unwrap();
        // agfi %r8, 1286608618; aih %r8, 2
        assert_eq!(
            buf.code(),
            &[0xc2, 0x88, 0x4c, 0xb0, 0x16, 0xea, 0xcc, 0x88, 0x00, 0x00, 0x00, 0x02]
        );

        let mut buf = CodeBuffer::new();
        S390x::sub_reg(&mut buf, Reg::R8, 9_876_543_210).unwrap();
        // agfi %r8, -1286608618; aih %r8, -2
        assert_eq!(
            buf.code(),
            &[0xc2, 0x88, 0xb3, 0x4f, 0xe9, 0x16, 0xcc, 0x88, 0xff, 0xff, 0xff, 0xfe]
        );

        let mut buf = CodeBuffer::new();
        S390x::add_reg(&mut buf, Reg::R8, 1 << 33).unwrap();
        // low word is zero: aih %r8, 2 only
        assert_eq!(buf.code(), &[0xcc, 0x88, 0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_jumps() {
        let mut buf = CodeBuffer::new();
        S390x::jump_zero(&mut buf, Reg::R3, 18).unwrap();
        S390x::jump_not_zero(&mut buf, Reg::R3, -36).unwrap();
        assert_eq!(
            buf.code(),
            &[
                0xe3, 0x53, 0x00, 0x00, 0x00, 0x90, // llgc %r5, 0(%r3)
                0xc2, 0x5d, 0x00, 0x00, 0x00, 0x00, // cfi %r5, 0
                0xc0, 0x84, 0x00, 0x00, 0x00, 0x0c, // brcl 8, +24
                0xe3, 0x53, 0x00, 0x00, 0x00, 0x90, // llgc %r5, 0(%r3)
                0xc2, 0x5d, 0x00, 0x00, 0x00, 0x00, // cfi %r5, 0
                0xc0, 0x64, 0xff, 0xff, 0xff, 0xf1, // brcl 6, -30
            ]
        );
    }

    #[test]
    fn test_jump_errors() {
        let mut buf = CodeBuffer::new();
        let err = S390x::jump_zero(&mut buf, Reg::R8, 7).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidJumpAlignment);
        let err = S390x::jump_zero(&mut buf, Reg::R8, 1 << 40).unwrap_err();
        assert_eq!(err.kind, ErrorKind::JumpTooLong);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_loop_open_filler() {
        let mut buf = CodeBuffer::new();
        S390x::nop_loop_open(&mut buf);
        assert_eq!(buf.len(), S390x::JUMP_SIZE);
        assert_eq!(&buf.code()[..4], &[0xa7, 0xf4, 0x00, 0x01]);
        assert_eq!(&buf.code()[16..], &[0x07, 0x00]);
    }

    #[test]
    fn test_byte_ops() {
        let mut buf = CodeBuffer::new();
        S390x::dec_byte(&mut buf, Reg::R8);
        S390x::zero_byte(&mut buf, Reg::R8);
        assert_eq!(
            buf.code(),
            &[
                0xe3, 0x58, 0x00, 0x00, 0x00, 0x90, // llgc %r5, 0(%r8)
                0xa7, 0x5b, 0xff, 0xff, // aghi %r5, -1
                0x42, 0x58, 0x00, 0x00, // stc %r5, 0(%r8)
                0x42, 0x08, 0x00, 0x00, // stc %r0, 0(%r8)
            ]
        );
    }
}
