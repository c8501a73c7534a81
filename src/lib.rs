//! # bfc - Brainfuck to ELF
//!
//! Compiles Brainfuck straight to statically linked Linux executables, with
//! no assembler or linker in between.
//!
//! ## Targets
//!
//! | Target    | Class | Endian | Feature   |
//! |-----------|-------|--------|-----------|
//! | x86-64    | ELF64 | little | `x86_64`  |
//! | i386      | ELF32 | little | `i386`    |
//! | ARM64     | ELF64 | little | `arm64`   |
//! | RISC-V64  | ELF64 | little | `riscv64` |
//! | s390x     | ELF64 | big    | `s390x`   |
//!
//! ## Pipeline
//!
//! ```text
//! source ─► ir::to_ir (with -O) ─► CodeGen<A> ─► ElfBuilder ─► executable
//! ```

pub mod arch;
pub mod buffer;
pub mod cli;
pub mod codegen;
pub mod elf;
pub mod error;
pub mod ir;
pub mod serialize;

#[cfg(feature = "arm64")]
pub mod arm64;
#[cfg(feature = "riscv64")]
pub mod riscv64;
#[cfg(feature = "s390x")]
pub mod s390x;
#[cfg(any(feature = "x86_64", feature = "i386"))]
pub mod x86;

use std::io::{Read, Write};

use log::debug;

pub use arch::{Arch, ArchInter};
pub use buffer::CodeBuffer;
pub use codegen::CodeGen;
pub use elf::ElfBuilder;
pub use error::{CompileError, ErrorKind, SourceLocation};
pub use ir::{expand_ir, to_ir, IrOp, IrParser};

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Per-file compilation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Run the source through the IR optimizer first
    pub optimize: bool,
    /// Tape size in 4 KiB blocks
    pub tape_blocks: u64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: false,
            tape_blocks: 8,
        }
    }
}

/// Sizes of a successfully compiled executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileStats {
    /// Bytes of machine code
    pub code_size: usize,
    /// Bytes written to the destination
    pub file_size: u64,
}

/// Compile Brainfuck read from `source` into an executable written to `dest`
///
/// # Errors
///
/// Configuration errors (tape size, disabled backend) are reported before
/// anything is written. If code generation fails part way, the headers and
/// the code generated so far are still written, and the first error is
/// returned.
pub fn compile(
    arch: Arch,
    source: impl Read,
    dest: impl Write,
    options: &CompileOptions,
) -> Result<CompileStats> {
    #[allow(unreachable_patterns)]
    match arch {
        #[cfg(feature = "x86_64")]
        Arch::X86_64 => compile_with::<x86::X86_64>(source, dest, options),
        #[cfg(feature = "i386")]
        Arch::I386 => compile_with::<x86::I386>(source, dest, options),
        #[cfg(feature = "arm64")]
        Arch::Arm64 => compile_with::<arm64::Arm64>(source, dest, options),
        #[cfg(feature = "riscv64")]
        Arch::Riscv64 => compile_with::<riscv64::Riscv64>(source, dest, options),
        #[cfg(feature = "s390x")]
        Arch::S390x => compile_with::<s390x::S390x>(source, dest, options),
        _ => Err(arch.unsupported()),
    }
}

/// [`compile`] for a backend chosen at compile time
pub fn compile_with<A: ArchInter>(
    mut source: impl Read,
    mut dest: impl Write,
    options: &CompileOptions,
) -> Result<CompileStats> {
    let builder = ElfBuilder::new(A::ELF_CLASS, A::ENDIAN, A::ELF_MACHINE)
        .flags(A::E_FLAGS)
        .tape_blocks(options.tape_blocks);
    builder.layout()?;

    let mut input = Vec::new();
    source
        .read_to_end(&mut input)
        .map_err(|e| CompileError::io(ErrorKind::FailedRead, &e))?;

    // Phase 1: Generate code, keeping whatever was produced on failure
    let mut cg = CodeGen::<A>::new();
    let generated = generate(&mut cg, &input, options.optimize);
    let code = cg.finish();

    // Phase 2: Emit the executable
    let file_size = builder.write(&mut dest, code.code())?;
    dest.flush()
        .map_err(|e| CompileError::io(ErrorKind::FailedWrite, &e))?;

    debug!(
        "{}: optimize={} source={}B code={}B file={}B",
        A::NAME,
        options.optimize,
        input.len(),
        code.len(),
        file_size
    );

    generated.map(|()| CompileStats {
        code_size: code.len(),
        file_size,
    })
}

fn generate<A: ArchInter>(cg: &mut CodeGen<A>, input: &[u8], optimize: bool) -> Result<()> {
    cg.prologue()?;
    if optimize {
        let ir = to_ir(input)?;
        cg.compile_ir(ir.as_bytes())?;
    } else {
        cg.compile_source(input)?;
    }
    cg.epilogue()
}
