//! ELF Executable Generation
//!
//! Generates minimal Linux ELF executables with exactly two segments:
//!
//! ```text
//! segment 0: tape   R|W  nothing on disk, tape_blocks * 4 KiB in memory
//! segment 1: code   R|X  the whole file (headers, padding, machine code)
//! ```
//!
//! The code segment is placed on the first 64 KiB boundary past the end of
//! the tape, so the two never overlap. Machine code starts at the first
//! 256-byte boundary after the program header table.

use std::io::Write;

use crate::error::{CompileError, ErrorKind};
use crate::serialize::{Endian, FieldWriter};

/// ELF file header constants
pub mod consts {
    // ELF magic number
    pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

    // ELF class
    pub const ELFCLASS32: u8 = 1;
    pub const ELFCLASS64: u8 = 2;

    // ELF version
    pub const EV_CURRENT: u8 = 1;

    // OS/ABI
    pub const ELFOSABI_SYSV: u8 = 0;

    // Object file type
    pub const ET_EXEC: u16 = 2;

    // Machine types
    pub const EM_386: u16 = 3;
    pub const EM_S390: u16 = 22;
    pub const EM_X86_64: u16 = 62;
    pub const EM_AARCH64: u16 = 183;
    pub const EM_RISCV: u16 = 243;

    // RISC-V flags: compressed instructions, double-float ABI
    pub const EF_RISCV_RVC: u32 = 0x1;
    pub const EF_RISCV_FLOAT_ABI_DOUBLE: u32 = 0x4;

    // Program header types
    pub const PT_LOAD: u32 = 1;

    // Program header flags
    pub const PF_X: u32 = 1; // Execute
    pub const PF_W: u32 = 2; // Write
    pub const PF_R: u32 = 4; // Read

    // Header sizes
    pub const ELF32_EHDR_SIZE: u16 = 52;
    pub const ELF32_PHDR_SIZE: u16 = 32;
    pub const ELF64_EHDR_SIZE: u16 = 64;
    pub const ELF64_PHDR_SIZE: u16 = 56;

    /// One segment for the tape, one for the code
    pub const PHNUM: u16 = 2;

    /// Virtual address of the start of the tape
    pub const TAPE_ADDRESS: u64 = 0x10000;

    /// Bytes per tape block
    pub const TAPE_BLOCK_SIZE: u64 = 0x1000;
}

/// ELF file class, selecting 32- or 64-bit header layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

impl ElfClass {
    pub fn ident(self) -> u8 {
        match self {
            ElfClass::Elf32 => consts::ELFCLASS32,
            ElfClass::Elf64 => consts::ELFCLASS64,
        }
    }

    pub fn ehdr_size(self) -> u16 {
        match self {
            ElfClass::Elf32 => consts::ELF32_EHDR_SIZE,
            ElfClass::Elf64 => consts::ELF64_EHDR_SIZE,
        }
    }

    pub fn phdr_size(self) -> u16 {
        match self {
            ElfClass::Elf32 => consts::ELF32_PHDR_SIZE,
            ElfClass::Elf64 => consts::ELF64_PHDR_SIZE,
        }
    }

    /// Largest address representable in this class
    fn max_address(self) -> u64 {
        match self {
            ElfClass::Elf32 => u32::MAX as u64,
            ElfClass::Elf64 => u64::MAX,
        }
    }

    /// File offset of the first instruction: the first 256-byte boundary
    /// after the headers.
    pub fn start_paddr(self) -> u64 {
        let headers = self.ehdr_size() as u64 + consts::PHNUM as u64 * self.phdr_size() as u64;
        (headers & !0xff) + 0x100
    }
}

/// ELF file header
#[derive(Debug, Clone)]
pub struct ElfHeader {
    pub e_type: u16,      // Object file type
    pub e_machine: u16,   // Machine type
    pub e_version: u32,   // Object file version
    pub e_entry: u64,     // Entry point address
    pub e_phoff: u64,     // Program header offset
    pub e_shoff: u64,     // Section header offset
    pub e_flags: u32,     // Processor-specific flags
    pub e_ehsize: u16,    // ELF header size
    pub e_phentsize: u16, // Program header entry size
    pub e_phnum: u16,     // Number of program headers
    pub e_shentsize: u16, // Section header entry size
    pub e_shnum: u16,     // Number of section headers
    pub e_shstrndx: u16,  // Section name string table index
}

impl ElfHeader {
    /// Header for an executable of the given class with no sections
    pub fn new(class: ElfClass, machine: u16) -> Self {
        Self {
            e_type: consts::ET_EXEC,
            e_machine: machine,
            e_version: consts::EV_CURRENT as u32,
            e_entry: 0,
            e_phoff: class.ehdr_size() as u64,
            e_shoff: 0,
            e_flags: 0,
            e_ehsize: class.ehdr_size(),
            e_phentsize: class.phdr_size(),
            e_phnum: consts::PHNUM,
            e_shentsize: 0,
            e_shnum: 0,
            e_shstrndx: 0,
        }
    }

    /// Serialize the header. For `Elf32`, the address fields are truncated
    /// to 32 bits; callers check the layout fits first.
    pub fn write<W: Write>(&self, w: &mut W, class: ElfClass, endian: Endian) -> std::io::Result<()> {
        let mut w = FieldWriter::new(w, endian);

        // e_ident (16 bytes)
        w.bytes(&consts::ELF_MAGIC)?;
        w.u8(class.ident())?; // EI_CLASS
        w.u8(endian as u8)?; // EI_DATA
        w.u8(consts::EV_CURRENT)?; // EI_VERSION
        w.u8(consts::ELFOSABI_SYSV)?; // EI_OSABI
        w.bytes(&[0u8; 8])?; // EI_ABIVERSION + EI_PAD

        w.u16(self.e_type)?;
        w.u16(self.e_machine)?;
        w.u32(self.e_version)?;
        match class {
            ElfClass::Elf32 => {
                w.u32(self.e_entry as u32)?;
                w.u32(self.e_phoff as u32)?;
                w.u32(self.e_shoff as u32)?;
            }
            ElfClass::Elf64 => {
                w.u64(self.e_entry)?;
                w.u64(self.e_phoff)?;
                w.u64(self.e_shoff)?;
            }
        }
        w.u32(self.e_flags)?;
        w.u16(self.e_ehsize)?;
        w.u16(self.e_phentsize)?;
        w.u16(self.e_phnum)?;
        w.u16(self.e_shentsize)?;
        w.u16(self.e_shnum)?;
        w.u16(self.e_shstrndx)?;

        Ok(())
    }
}

/// ELF program header
#[derive(Debug, Clone)]
pub struct ProgramHeader {
    pub p_type: u32,   // Segment type
    pub p_flags: u32,  // Segment flags
    pub p_offset: u64, // Segment file offset
    pub p_vaddr: u64,  // Segment virtual address
    pub p_paddr: u64,  // Segment physical address
    pub p_filesz: u64, // Segment size in file
    pub p_memsz: u64,  // Segment size in memory
    pub p_align: u64,  // Segment alignment
}

impl ProgramHeader {
    /// Serialize the entry. `p_flags` moves to after `p_memsz` in ELF32.
    pub fn write<W: Write>(&self, w: &mut W, class: ElfClass, endian: Endian) -> std::io::Result<()> {
        let mut w = FieldWriter::new(w, endian);
        match class {
            ElfClass::Elf32 => {
                w.u32(self.p_type)?;
                w.u32(self.p_offset as u32)?;
                w.u32(self.p_vaddr as u32)?;
                w.u32(self.p_paddr as u32)?;
                w.u32(self.p_filesz as u32)?;
                w.u32(self.p_memsz as u32)?;
                w.u32(self.p_flags)?;
                w.u32(self.p_align as u32)?;
            }
            ElfClass::Elf64 => {
                w.u32(self.p_type)?;
                w.u32(self.p_flags)?;
                w.u64(self.p_offset)?;
                w.u64(self.p_vaddr)?;
                w.u64(self.p_paddr)?;
                w.u64(self.p_filesz)?;
                w.u64(self.p_memsz)?;
                w.u64(self.p_align)?;
            }
        }
        Ok(())
    }
}

/// Check a tape block count and return the tape size in bytes
pub fn tape_size(tape_blocks: u64) -> Result<u64, CompileError> {
    if tape_blocks == 0 {
        return Err(CompileError::new(
            ErrorKind::TapeSizeZero,
            "Tape size must not be zero",
        ));
    }
    if tape_blocks >= u64::MAX >> 12 {
        return Err(tape_too_large());
    }
    Ok(tape_blocks * consts::TAPE_BLOCK_SIZE)
}

fn tape_too_large() -> CompileError {
    CompileError::new(
        ErrorKind::TapeTooLarge,
        "Tape size is too large for the address space of the target",
    )
}

/// Addresses derived from the tape size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub tape_size: u64,
    /// Virtual address of the code segment
    pub load_vaddr: u64,
    /// File offset (and segment offset) of the first instruction
    pub start_paddr: u64,
}

impl Layout {
    pub fn new(class: ElfClass, tape_blocks: u64) -> Result<Self, CompileError> {
        let tape_size = tape_size(tape_blocks)?;
        let tape_end = consts::TAPE_ADDRESS
            .checked_add(tape_size)
            .ok_or_else(tape_too_large)?;
        let load_vaddr = (tape_end & !0xffff)
            .checked_add(0x10000)
            .ok_or_else(tape_too_large)?;
        let start_paddr = class.start_paddr();
        let entry = load_vaddr
            .checked_add(start_paddr)
            .ok_or_else(tape_too_large)?;
        if entry > class.max_address() {
            return Err(tape_too_large());
        }
        Ok(Self {
            tape_size,
            load_vaddr,
            start_paddr,
        })
    }

    pub fn entry(&self) -> u64 {
        self.load_vaddr + self.start_paddr
    }
}

/// ELF executable builder
#[derive(Debug, Clone)]
pub struct ElfBuilder {
    class: ElfClass,
    endian: Endian,
    machine: u16,
    flags: u32,
    tape_blocks: u64,
}

impl ElfBuilder {
    pub fn new(class: ElfClass, endian: Endian, machine: u16) -> Self {
        Self {
            class,
            endian,
            machine,
            flags: 0,
            tape_blocks: 8,
        }
    }

    /// Set processor-specific flags (default: 0)
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Set the tape size in 4 KiB blocks (default: 8)
    pub fn tape_blocks(mut self, tape_blocks: u64) -> Self {
        self.tape_blocks = tape_blocks;
        self
    }

    pub fn layout(&self) -> Result<Layout, CompileError> {
        Layout::new(self.class, self.tape_blocks)
    }

    /// Write headers, padding and `code` to `w`. Returns the total number of
    /// bytes written.
    pub fn write<W: Write>(&self, w: &mut W, code: &[u8]) -> Result<u64, CompileError> {
        let layout = self.layout()?;
        let file_size = layout
            .start_paddr
            .checked_add(code.len() as u64)
            .filter(|&size| layout.load_vaddr.saturating_add(size) <= self.class.max_address())
            .ok_or_else(|| {
                CompileError::new(
                    ErrorKind::TooManyInstructions,
                    "Generated code does not fit in the address space of the target",
                )
            })?;

        let mut ehdr = ElfHeader::new(self.class, self.machine);
        ehdr.e_entry = layout.entry();
        ehdr.e_flags = self.flags;

        let tape = ProgramHeader {
            p_type: consts::PT_LOAD,
            p_flags: consts::PF_R | consts::PF_W,
            p_offset: 0,
            p_vaddr: consts::TAPE_ADDRESS,
            p_paddr: 0,
            p_filesz: 0,
            p_memsz: layout.tape_size,
            p_align: 0x1000,
        };

        let text = ProgramHeader {
            p_type: consts::PT_LOAD,
            p_flags: consts::PF_R | consts::PF_X,
            p_offset: 0,
            p_vaddr: layout.load_vaddr,
            p_paddr: 0,
            p_filesz: file_size,
            p_memsz: file_size,
            p_align: 1,
        };

        let headers_size =
            self.class.ehdr_size() as u64 + consts::PHNUM as u64 * self.class.phdr_size() as u64;
        let padding = vec![0u8; (layout.start_paddr - headers_size) as usize];

        let write_all = |w: &mut W| -> std::io::Result<()> {
            ehdr.write(w, self.class, self.endian)?;
            tape.write(w, self.class, self.endian)?;
            text.write(w, self.class, self.endian)?;
            w.write_all(&padding)?;
            w.write_all(code)?;
            w.flush()
        };
        write_all(w).map_err(|e| CompileError::io(ErrorKind::FailedWrite, &e))?;

        Ok(file_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u64_le(bytes: &[u8]) -> u64 {
        u64::from_le_bytes(bytes.try_into().unwrap())
    }

    #[test]
    fn test_elf64_header_size() {
        let ehdr = ElfHeader::new(ElfClass::Elf64, consts::EM_X86_64);
        let mut buf = Vec::new();
        ehdr.write(&mut buf, ElfClass::Elf64, Endian::Little).unwrap();
        assert_eq!(buf.len(), 64);
    }

    #[test]
    fn test_elf32_header_size() {
        let ehdr = ElfHeader::new(ElfClass::Elf32, consts::EM_386);
        let mut buf = Vec::new();
        ehdr.write(&mut buf, ElfClass::Elf32, Endian::Little).unwrap();
        assert_eq!(buf.len(), 52);
    }

    #[test]
    fn test_program_header_sizes() {
        let phdr = ProgramHeader {
            p_type: consts::PT_LOAD,
            p_flags: consts::PF_R | consts::PF_X,
            p_offset: 0,
            p_vaddr: 0x20000,
            p_paddr: 0,
            p_filesz: 0x110,
            p_memsz: 0x110,
            p_align: 1,
        };
        let mut buf = Vec::new();
        phdr.write(&mut buf, ElfClass::Elf64, Endian::Little).unwrap();
        assert_eq!(buf.len(), 56);

        buf.clear();
        phdr.write(&mut buf, ElfClass::Elf32, Endian::Little).unwrap();
        assert_eq!(buf.len(), 32);
        // p_flags is the seventh word in ELF32
        assert_eq!(&buf[24..28], &5u32.to_le_bytes());
    }

    #[test]
    fn test_start_paddr() {
        assert_eq!(ElfClass::Elf64.start_paddr(), 0x100);
        assert_eq!(ElfClass::Elf32.start_paddr(), 0x100);
    }

    #[test]
    fn test_layout_default_tape() {
        let layout = Layout::new(ElfClass::Elf64, 8).unwrap();
        assert_eq!(layout.tape_size, 0x8000);
        // 0x10000 + 0x8000 rounded down to 64 KiB, plus 64 KiB
        assert_eq!(layout.load_vaddr, 0x20000);
        assert_eq!(layout.entry(), 0x20100);
    }

    #[test]
    fn test_layout_tape_never_overlaps_code() {
        for blocks in [1, 15, 16, 17, 4096] {
            let layout = Layout::new(ElfClass::Elf64, blocks).unwrap();
            assert!(consts::TAPE_ADDRESS + layout.tape_size <= layout.load_vaddr);
        }
    }

    #[test]
    fn test_tape_size_limits() {
        assert_eq!(tape_size(0).unwrap_err().kind, ErrorKind::TapeSizeZero);
        assert_eq!(tape_size(u64::MAX >> 12).unwrap_err().kind, ErrorKind::TapeTooLarge);
        assert_eq!(
            Layout::new(ElfClass::Elf64, (u64::MAX >> 12) - 1).unwrap_err().kind,
            ErrorKind::TapeTooLarge
        );
        assert_eq!(
            Layout::new(ElfClass::Elf32, 0x100000).unwrap_err().kind,
            ErrorKind::TapeTooLarge
        );
    }

    #[test]
    fn test_build_elf64_little() {
        let code = [0x90u8; 5];
        let mut out = Vec::new();
        let size = ElfBuilder::new(ElfClass::Elf64, Endian::Little, consts::EM_X86_64)
            .write(&mut out, &code)
            .unwrap();
        assert_eq!(size, 0x105);
        assert_eq!(out.len(), 0x105);

        assert_eq!(&out[0..4], &consts::ELF_MAGIC);
        assert_eq!(out[4], consts::ELFCLASS64);
        assert_eq!(out[5], 1);
        assert_eq!(u16::from_le_bytes([out[18], out[19]]), consts::EM_X86_64);
        assert_eq!(u64_le(&out[24..32]), 0x20100); // e_entry
        assert_eq!(u64_le(&out[32..40]), 64); // e_phoff
        assert_eq!(u16::from_le_bytes([out[56], out[57]]), 2); // e_phnum

        // second program header: filesz and memsz cover the whole file
        let text = &out[64 + 56..64 + 112];
        assert_eq!(u32::from_le_bytes(text[4..8].try_into().unwrap()), 5);
        assert_eq!(u64_le(&text[16..24]), 0x20000);
        assert_eq!(u64_le(&text[32..40]), 0x105);
        assert_eq!(u64_le(&text[40..48]), 0x105);

        // zero padding, then code
        assert!(out[176..0x100].iter().all(|&b| b == 0));
        assert_eq!(&out[0x100..], &code);
    }

    #[test]
    fn test_build_big_endian() {
        let mut out = Vec::new();
        ElfBuilder::new(ElfClass::Elf64, Endian::Big, consts::EM_S390)
            .write(&mut out, &[0x0a, 0x00])
            .unwrap();
        assert_eq!(out[5], 2);
        assert_eq!(&out[18..20], &[0x00, 22]);
        assert_eq!(&out[24..32], &0x20100u64.to_be_bytes());
    }

    #[test]
    fn test_build_flags() {
        let mut out = Vec::new();
        ElfBuilder::new(ElfClass::Elf64, Endian::Little, consts::EM_RISCV)
            .flags(consts::EF_RISCV_RVC | consts::EF_RISCV_FLOAT_ABI_DOUBLE)
            .write(&mut out, &[])
            .unwrap();
        assert_eq!(u32::from_le_bytes(out[48..52].try_into().unwrap()), 5);
    }

    #[test]
    fn test_build_elf32() {
        let mut out = Vec::new();
        ElfBuilder::new(ElfClass::Elf32, Endian::Little, consts::EM_386)
            .write(&mut out, &[0xcd, 0x80])
            .unwrap();
        assert_eq!(out[4], consts::ELFCLASS32);
        assert_eq!(u32::from_le_bytes(out[24..28].try_into().unwrap()), 0x20100);
        assert_eq!(u32::from_le_bytes(out[28..32].try_into().unwrap()), 52);
        assert_eq!(&out[0x100..], &[0xcd, 0x80]);
    }
}
