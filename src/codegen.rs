//! Brainfuck to Machine Code Generation
//!
//! Translates source or IR into machine code for any [`ArchInter`] backend.
//!
//! Loops are compiled in one pass: `[` reserves `JUMP_SIZE` bytes of filler
//! and pushes its offset, and `]` pops it, patches the conditional forward
//! jump into the filler, then appends the conditional backward jump. Both
//! jump sequences have the same fixed size, so the distance is known as
//! soon as the `]` is reached.
//!
//! ```text
//! open:   jump_zero     ptr, distance   ; patched in at `]`
//! body:   ...
//! close:  jump_not_zero ptr, -distance
//! ```

use std::marker::PhantomData;

use log::{trace, warn};

use crate::arch::ArchInter;
use crate::buffer::CodeBuffer;
use crate::elf::consts::TAPE_ADDRESS;
use crate::error::{CompileError, ErrorKind, SourceLocation};
use crate::ir::{IrOp, IrParser};

/// A `[` waiting for its `]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpEntry {
    /// Position in the source (absent when compiling IR)
    pub location: Option<SourceLocation>,
    /// Offset of the loop-open filler in the code buffer
    pub offset: usize,
}

/// Per-file code generator state
#[derive(Debug)]
pub struct CodeGen<A: ArchInter> {
    code: CodeBuffer,
    jump_stack: Vec<JumpEntry>,
    _arch: PhantomData<A>,
}

impl<A: ArchInter> Default for CodeGen<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: ArchInter> CodeGen<A> {
    pub fn new() -> Self {
        Self {
            code: CodeBuffer::with_capacity(4096),
            jump_stack: Vec::new(),
            _arch: PhantomData,
        }
    }

    /// Point the tape register at the start of the tape
    pub fn prologue(&mut self) -> Result<(), CompileError> {
        A::set_reg(&mut self.code, A::REGISTERS.bf_ptr, TAPE_ADDRESS as i64)
    }

    /// Exit with status 0
    pub fn epilogue(&mut self) -> Result<(), CompileError> {
        let regs = A::REGISTERS;
        A::set_reg(&mut self.code, regs.sc_num, A::SC_NUMS.exit)?;
        A::set_reg(&mut self.code, regs.arg1, 0)?;
        A::syscall(&mut self.code);
        Ok(())
    }

    /// Compile raw Brainfuck source. Bytes other than the eight operators
    /// are comments.
    pub fn compile_source(&mut self, source: &[u8]) -> Result<(), CompileError> {
        self.code.try_reserve(source.len())?;
        let mut loc = SourceLocation::default();
        for &c in source {
            loc.advance(c);
            if let Some(op) = IrOp::from_bf(c) {
                self.emit_op(op, Some(loc))
                    .map_err(|e| e.or_context(char::from(c), Some(loc)))?;
            }
        }
        self.check_closed()
    }

    /// Compile an IR stream produced by [`crate::ir::to_ir`]
    pub fn compile_ir(&mut self, ir: &[u8]) -> Result<(), CompileError> {
        self.code.try_reserve(ir.len())?;
        for op in IrParser::new(ir) {
            let op = op?;
            self.emit_op(op, None)
                .map_err(|e| e.or_context(op.symbol(), None))?;
        }
        self.check_closed()
    }

    /// Bytes generated so far
    pub fn code(&self) -> &[u8] {
        self.code.code()
    }

    /// Number of loops still waiting for a `]`
    pub fn open_loops(&self) -> usize {
        self.jump_stack.len()
    }

    /// Take the generated code, complete or not
    pub fn finish(self) -> CodeBuffer {
        self.code
    }

    fn emit_op(&mut self, op: IrOp, location: Option<SourceLocation>) -> Result<(), CompileError> {
        let ptr = A::REGISTERS.bf_ptr;
        let buf = &mut self.code;
        match op {
            IrOp::Add(1) => A::inc_byte(buf, ptr),
            IrOp::Sub(1) => A::dec_byte(buf, ptr),
            IrOp::Right(1) => A::inc_reg(buf, ptr),
            IrOp::Left(1) => A::dec_reg(buf, ptr),
            IrOp::Add(n) => {
                if let Some(imm) = cell_delta(n, op) {
                    A::add_byte(buf, ptr, imm);
                }
            }
            IrOp::Sub(n) => {
                if let Some(imm) = cell_delta(n, op) {
                    A::sub_byte(buf, ptr, imm);
                }
            }
            IrOp::Right(n) => A::add_reg(buf, ptr, n)?,
            IrOp::Left(n) => A::sub_reg(buf, ptr, n)?,
            IrOp::Zero => A::zero_byte(buf, ptr),
            IrOp::Output => self.io(A::SC_NUMS.write, 1)?,
            IrOp::Input => self.io(A::SC_NUMS.read, 0)?,
            IrOp::LoopOpen => self.open_loop(location)?,
            IrOp::LoopClose => self.close_loop()?,
        }
        Ok(())
    }

    /// read(0, ptr, 1) or write(1, ptr, 1)
    fn io(&mut self, sc_num: i64, fd: i64) -> Result<(), CompileError> {
        let regs = A::REGISTERS;
        A::set_reg(&mut self.code, regs.sc_num, sc_num)?;
        A::set_reg(&mut self.code, regs.arg1, fd)?;
        A::reg_copy(&mut self.code, regs.arg2, regs.bf_ptr);
        A::set_reg(&mut self.code, regs.arg3, 1)?;
        A::syscall(&mut self.code);
        Ok(())
    }

    fn open_loop(&mut self, location: Option<SourceLocation>) -> Result<(), CompileError> {
        self.jump_stack.try_reserve(1).map_err(|e| {
            CompileError::new(
                ErrorKind::AllocationFailed,
                format!("failed to grow the loop stack: {}", e),
            )
        })?;
        self.jump_stack.push(JumpEntry {
            location,
            offset: self.code.offset(),
        });
        A::nop_loop_open(&mut self.code);
        Ok(())
    }

    fn close_loop(&mut self) -> Result<(), CompileError> {
        let entry = self.jump_stack.pop().ok_or_else(|| {
            CompileError::new(ErrorKind::UnmatchedClose, "found ']' without a matching '['")
        })?;
        let distance = i64::try_from(self.code.offset() - entry.offset).map_err(|_| {
            CompileError::new(ErrorKind::TooManyInstructions, "loop body is too large")
        })?;

        let mut open_jump = CodeBuffer::with_capacity(A::JUMP_SIZE);
        A::jump_zero(&mut open_jump, A::REGISTERS.bf_ptr, distance)?;
        assert_eq!(
            open_jump.len(),
            A::JUMP_SIZE,
            "{} loop jump does not match its reserved size",
            A::NAME
        );
        self.code.patch(entry.offset, open_jump.code());
        trace!(
            "{}: patched loop at {:#x}, distance {:#x}",
            A::NAME,
            entry.offset,
            distance
        );

        A::jump_not_zero(&mut self.code, A::REGISTERS.bf_ptr, -distance)
    }

    fn check_closed(&self) -> Result<(), CompileError> {
        match self.jump_stack.first() {
            Some(entry) => {
                let err = CompileError::new(
                    ErrorKind::UnmatchedOpen,
                    "reached the end of the file with an unmatched '['",
                )
                .with_instruction('[');
                Err(match entry.location {
                    Some(loc) => err.with_location(loc),
                    None => err,
                })
            }
            None => Ok(()),
        }
    }
}

/// Reduce a repeated cell adjustment modulo 256; `None` if it cancels out
fn cell_delta(n: u64, op: IrOp) -> Option<u8> {
    if n > u8::MAX as u64 {
        warn!("'{}' count {:#x} wraps the cell; using {:#x}", op.symbol(), n, n % 256);
    }
    match (n % 256) as u8 {
        0 => None,
        imm => Some(imm),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile<A: ArchInter>(source: &str) -> Result<Vec<u8>, CompileError> {
        let mut cg = CodeGen::<A>::new();
        cg.compile_source(source.as_bytes())?;
        Ok(cg.finish().into_code())
    }

    fn compile_ir<A: ArchInter>(ir: &str) -> Result<Vec<u8>, CompileError> {
        let mut cg = CodeGen::<A>::new();
        cg.compile_ir(ir.as_bytes())?;
        Ok(cg.finish().into_code())
    }

    /// An empty loop costs exactly two jump sequences
    fn check_loop_size<A: ArchInter>() {
        assert_eq!(compile::<A>("[]").unwrap().len(), 2 * A::JUMP_SIZE);
        let body = compile::<A>("+>").unwrap().len();
        let nested = compile::<A>("[[+]>]").unwrap().len();
        assert_eq!(nested, body + 4 * A::JUMP_SIZE);
    }

    fn check_unmatched<A: ArchInter>() {
        let err = compile::<A>("+\n[[]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnmatchedOpen);
        assert_eq!(err.location, Some(SourceLocation::new(2, 1)));
        assert_eq!(err.instruction, Some('['));

        let err = compile::<A>("+ ]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnmatchedClose);
        assert_eq!(err.location, Some(SourceLocation::new(1, 3)));

        let err = compile_ir::<A>("#2]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnmatchedClose);
        assert_eq!(err.location, None);
        assert_eq!(err.instruction, Some(']'));

        let err = compile_ir::<A>("[@").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnmatchedOpen);
        assert_eq!(err.location, None);
    }

    #[cfg(feature = "x86_64")]
    mod x86_64 {
        use super::*;
        use crate::x86::X86_64;

        #[test]
        fn test_loop_size() {
            check_loop_size::<X86_64>();
        }

        #[test]
        fn test_unmatched() {
            check_unmatched::<X86_64>();
        }

        #[test]
        fn test_patched_loop() {
            let code = compile::<X86_64>("[-]").unwrap();
            assert_eq!(
                code,
                [
                    0xF6, 0x03, 0xFF, 0x0F, 0x84, 0x0B, 0x00, 0x00, 0x00, // jz +11
                    0xFE, 0x0B, // dec byte [rbx]
                    0xF6, 0x03, 0xFF, 0x0F, 0x85, 0xF5, 0xFF, 0xFF, 0xFF, // jnz -11
                ]
            );
        }

        #[test]
        fn test_io_and_pointer() {
            let code = compile::<X86_64>("+[>]<-,.").unwrap();
            let write = [
                0xB8, 0x01, 0x00, 0x00, 0x00, // mov eax, 1
                0xBF, 0x01, 0x00, 0x00, 0x00, // mov edi, 1
                0x48, 0x89, 0xDE, // mov rsi, rbx
                0xBA, 0x01, 0x00, 0x00, 0x00, // mov edx, 1
                0x0F, 0x05, // syscall
            ];
            assert!(code.ends_with(&write));
            assert_eq!(&code[..2], &[0xFE, 0x03]);
        }

        #[test]
        fn test_prologue_epilogue() {
            let mut cg = CodeGen::<X86_64>::new();
            cg.prologue().unwrap();
            cg.epilogue().unwrap();
            assert_eq!(
                cg.code(),
                &[
                    0xBB, 0x00, 0x00, 0x01, 0x00, // mov ebx, 0x10000
                    0xB8, 0x3C, 0x00, 0x00, 0x00, // mov eax, 60
                    0x31, 0xFF, // xor edi, edi
                    0x0F, 0x05, // syscall
                ]
            );
        }

        #[test]
        fn test_ir_counts() {
            let code = compile_ir::<X86_64>("#3}10@").unwrap();
            assert_eq!(
                code,
                [
                    0x80, 0x03, 0x03, // add byte [rbx], 3
                    0x48, 0x83, 0xC3, 0x10, // add rbx, 16
                    0xC6, 0x03, 0x00, // mov byte [rbx], 0
                ]
            );
            // Whole wraps of the cell emit nothing
            assert!(compile_ir::<X86_64>("#100").unwrap().is_empty());
        }

        #[test]
        fn test_error_stops_generation() {
            let mut cg = CodeGen::<X86_64>::new();
            assert!(cg.compile_source(b"+]+++").is_err());
            assert_eq!(cg.code(), &[0xFE, 0x03]);
        }
    }

    #[cfg(feature = "arm64")]
    mod arm64 {
        use super::*;
        use crate::arm64::Arm64;

        #[test]
        fn test_loop_size() {
            check_loop_size::<Arm64>();
        }

        #[test]
        fn test_unmatched() {
            check_unmatched::<Arm64>();
        }
    }

    #[cfg(feature = "riscv64")]
    mod riscv64 {
        use super::*;
        use crate::riscv64::Riscv64;

        #[test]
        fn test_loop_size() {
            check_loop_size::<Riscv64>();
        }

        #[test]
        fn test_unmatched() {
            check_unmatched::<Riscv64>();
        }
    }

    #[cfg(feature = "s390x")]
    mod s390x {
        use super::*;
        use crate::s390x::S390x;

        #[test]
        fn test_loop_size() {
            check_loop_size::<S390x>();
        }
    }

    #[cfg(feature = "i386")]
    mod i386 {
        use super::*;
        use crate::x86::I386;

        #[test]
        fn test_loop_size() {
            check_loop_size::<I386>();
        }
    }
}
