//! x86 Instruction Encoding
//!
//! Encoders shared by the x86-64 and i386 backends. Every method emits the
//! 32-bit operand-size form; the x86-64 backend prefixes REX.W where it
//! needs the 64-bit form.
//!
//! ## Instruction Format
//!
//! ```text
//! [REX] [Opcode] [ModR/M] [Imm]
//! ```

use crate::buffer::CodeBuffer;

/// REX prefix builder
#[derive(Debug, Clone, Copy, Default)]
pub struct Rex {
    w: bool, // 64-bit operand size
}

impl Rex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set W bit (64-bit operand size)
    pub fn w(mut self) -> Self {
        self.w = true;
        self
    }

    /// Encode to byte (0x40-0x4F)
    pub fn encode(&self) -> u8 {
        0x40 | ((self.w as u8) << 3)
    }
}

/// ModR/M byte builder
#[derive(Debug, Clone, Copy)]
pub struct ModRM {
    mode: u8, // 2 bits: 00=indirect, 11=register
    reg: u8,  // 3 bits: register or opcode extension
    rm: u8,   // 3 bits: register or memory base
}

impl ModRM {
    /// Register-direct: both operands are registers
    pub fn reg_reg(reg: u8, rm: u8) -> Self {
        Self {
            mode: 0b11,
            reg: reg & 0x07,
            rm: rm & 0x07,
        }
    }

    /// Register-direct with an opcode extension in the reg field (/0../7)
    pub fn reg_opext(opext: u8, rm: u8) -> Self {
        Self::reg_reg(opext, rm)
    }

    /// `[rm]` with no displacement and an opcode extension in the reg field.
    /// `rm` must not be SP or BP, which select SIB and RIP-relative forms.
    pub fn indirect_opext(opext: u8, rm: u8) -> Self {
        debug_assert!(rm != 4 && rm != 5, "rm={} needs SIB or displacement", rm);
        Self {
            mode: 0b00,
            reg: opext & 0x07,
            rm: rm & 0x07,
        }
    }

    pub fn encode(&self) -> u8 {
        (self.mode << 6) | (self.reg << 3) | self.rm
    }
}

/// Arithmetic operation, as its /digit opcode extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArithOp {
    Add = 0,
    Sub = 5,
}

impl ArithOp {
    /// Opcode of the `r/m, reg` form (ADD 01 /r, SUB 29 /r)
    fn rm_reg_opcode(self) -> u8 {
        match self {
            ArithOp::Add => 0x01,
            ArithOp::Sub => 0x29,
        }
    }
}

/// Condition code (tttn) for Jcc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cond {
    Zero = 0x4,
    NotZero = 0x5,
}

impl CodeBuffer {
    /// XOR r32, r32 (also clears the upper half on x86-64)
    pub fn xor_r32_r32(&mut self, reg: u8) {
        self.emit(0x31); // 31 /r
        self.emit(ModRM::reg_reg(reg, reg).encode());
    }

    /// MOV r32, imm32
    pub fn mov_r32_imm32(&mut self, dst: u8, imm: u32) {
        self.emit(0xB8 + dst); // B8+rd
        self.emit_u32_le(imm);
    }

    /// MOV r/m32, imm32 (sign-extended to 64 bits when REX.W is set)
    pub fn mov_rm32_imm32(&mut self, dst: u8, imm: i32) {
        self.emit(0xC7); // C7 /0
        self.emit(ModRM::reg_opext(0, dst).encode());
        self.emit_u32_le(imm as u32);
    }

    /// MOV r32, r32
    pub fn mov_r32_r32(&mut self, dst: u8, src: u8) {
        self.emit(0x89); // 89 /r
        self.emit(ModRM::reg_reg(src, dst).encode());
    }

    /// INC r32
    pub fn inc_r32(&mut self, reg: u8) {
        self.emit(0xFF); // FF /0
        self.emit(ModRM::reg_opext(0, reg).encode());
    }

    /// DEC r32
    pub fn dec_r32(&mut self, reg: u8) {
        self.emit(0xFF); // FF /1
        self.emit(ModRM::reg_opext(1, reg).encode());
    }

    /// ADD/SUB r32, imm8 (sign-extended)
    pub fn arith_r32_imm8(&mut self, op: ArithOp, reg: u8, imm: i8) {
        self.emit(0x83); // 83 /0 or /5
        self.emit(ModRM::reg_opext(op as u8, reg).encode());
        self.emit(imm as u8);
    }

    /// ADD/SUB r32, imm32
    pub fn arith_r32_imm32(&mut self, op: ArithOp, reg: u8, imm: u32) {
        self.emit(0x81); // 81 /0 or /5
        self.emit(ModRM::reg_opext(op as u8, reg).encode());
        self.emit_u32_le(imm);
    }

    /// ADD/SUB r32, r32
    pub fn arith_r32_r32(&mut self, op: ArithOp, dst: u8, src: u8) {
        self.emit(op.rm_reg_opcode());
        self.emit(ModRM::reg_reg(src, dst).encode());
    }

    /// INC byte [reg]
    pub fn inc_m8(&mut self, reg: u8) {
        self.emit(0xFE); // FE /0
        self.emit(ModRM::indirect_opext(0, reg).encode());
    }

    /// DEC byte [reg]
    pub fn dec_m8(&mut self, reg: u8) {
        self.emit(0xFE); // FE /1
        self.emit(ModRM::indirect_opext(1, reg).encode());
    }

    /// ADD/SUB byte [reg], imm8
    pub fn arith_m8_imm8(&mut self, op: ArithOp, reg: u8, imm: u8) {
        self.emit(0x80); // 80 /0 or /5
        self.emit(ModRM::indirect_opext(op as u8, reg).encode());
        self.emit(imm);
    }

    /// MOV byte [reg], imm8
    pub fn mov_m8_imm8(&mut self, reg: u8, imm: u8) {
        self.emit(0xC6); // C6 /0
        self.emit(ModRM::indirect_opext(0, reg).encode());
        self.emit(imm);
    }

    /// TEST byte [reg], imm8
    pub fn test_m8_imm8(&mut self, reg: u8, imm: u8) {
        self.emit(0xF6); // F6 /0
        self.emit(ModRM::indirect_opext(0, reg).encode());
        self.emit(imm);
    }

    /// Jcc rel32, relative to the end of the instruction
    pub fn jcc_rel32(&mut self, cond: Cond, rel: i32) {
        self.emit(0x0F);
        self.emit(0x80 | cond as u8); // 0F 80+cc
        self.emit_u32_le(rel as u32);
    }

    /// UD2 - guaranteed invalid opcode
    pub fn ud2(&mut self) {
        self.emit(0x0F);
        self.emit(0x0B);
    }

    /// NOP
    pub fn nop(&mut self) {
        self.emit(0x90);
    }
}
