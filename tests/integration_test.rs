//! Integration tests for bfc
//!
//! Tests the full pipeline: Source → (IR) → Codegen → ELF, and runs the
//! result when the host can execute it.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use bfc::elf::consts::{EM_386, EM_AARCH64, EM_RISCV, EM_S390, EM_X86_64};
use bfc::{compile, Arch, CompileOptions, ErrorKind};

const HELLO: &str = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.\
                     +++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";

fn build(arch: Arch, source: &str, optimize: bool) -> Vec<u8> {
    let mut out = Vec::new();
    let options = CompileOptions {
        optimize,
        ..Default::default()
    };
    compile(arch, source.as_bytes(), &mut out, &options).expect("compilation failed");
    out
}

fn u16_at(bytes: &[u8], offset: usize, big_endian: bool) -> u16 {
    let raw = [bytes[offset], bytes[offset + 1]];
    if big_endian {
        u16::from_be_bytes(raw)
    } else {
        u16::from_le_bytes(raw)
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bfc-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("failed to create scratch dir");
    dir
}

/// Write `elf` to disk and run it, feeding it `stdin`
#[cfg(unix)]
fn run(name: &str, elf: &[u8], stdin: &[u8]) -> std::process::Output {
    use std::os::unix::fs::PermissionsExt;

    let dir = scratch_dir(name);
    let path = dir.join(name);
    fs::write(&path, elf).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

    let mut child = Command::new(&path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to start compiled program");
    child.stdin.take().unwrap().write_all(stdin).unwrap();
    let output = child.wait_with_output().unwrap();
    fs::remove_dir_all(&dir).unwrap();
    output
}

/// The host's own backend, if it is enabled and the host runs Linux
fn runnable_host() -> Option<Arch> {
    if !cfg!(all(unix, target_os = "linux")) {
        return None;
    }
    Arch::host().filter(|arch| arch.is_enabled())
}

// ============================================================================
// ELF Structure
// ============================================================================

#[test]
fn test_elf_headers() {
    for arch in Arch::enabled() {
        let elf = build(arch, HELLO, false);
        let (class, machine, big) = match arch {
            Arch::X86_64 => (2, EM_X86_64, false),
            Arch::I386 => (1, EM_386, false),
            Arch::Arm64 => (2, EM_AARCH64, false),
            Arch::Riscv64 => (2, EM_RISCV, false),
            Arch::S390x => (2, EM_S390, true),
        };
        assert_eq!(&elf[..4], b"\x7fELF");
        assert_eq!(elf[4], class, "{}", arch);
        assert_eq!(elf[5], if big { 2 } else { 1 }, "{}", arch);
        assert_eq!(u16_at(&elf, 18, big), machine, "{}", arch);

        // e_phnum / e_shnum
        let (phnum, shnum) = if class == 1 { (44, 48) } else { (56, 60) };
        assert_eq!(u16_at(&elf, phnum, big), 2, "{}", arch);
        assert_eq!(u16_at(&elf, shnum, big), 0, "{}", arch);
    }
}

#[test]
fn test_riscv_flags() {
    if !Arch::Riscv64.is_enabled() {
        return;
    }
    let elf = build(Arch::Riscv64, "+", false);
    // e_flags follows e_entry, e_phoff and e_shoff
    let flags = u32::from_le_bytes(elf[48..52].try_into().unwrap());
    assert_eq!(flags, 5);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_unmatched_brackets_every_target() {
    for arch in Arch::enabled() {
        for optimize in [false, true] {
            let options = CompileOptions {
                optimize,
                ..Default::default()
            };
            let err = compile(arch, &b"[["[..], Vec::new(), &options).unwrap_err();
            assert_eq!(err.kind, ErrorKind::UnmatchedOpen, "{}", arch);
            let err = compile(arch, &b"+]"[..], Vec::new(), &options).unwrap_err();
            assert_eq!(err.kind, ErrorKind::UnmatchedClose, "{}", arch);
        }
    }
}

#[test]
fn test_tape_limits() {
    for arch in Arch::enabled() {
        let options = CompileOptions {
            tape_blocks: u64::MAX >> 12,
            ..Default::default()
        };
        let err = compile(arch, &b"+"[..], Vec::new(), &options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TapeTooLarge);
    }
    if Arch::I386.is_enabled() {
        // 4 GiB of tape can't be mapped by a 32-bit executable
        let options = CompileOptions {
            tape_blocks: 1 << 20,
            ..Default::default()
        };
        let err = compile(Arch::I386, &b"+"[..], Vec::new(), &options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TapeTooLarge);
    }
}

#[test]
fn test_disabled_arch_is_unsupported() {
    for arch in Arch::ALL.into_iter().filter(|a| !a.is_enabled()) {
        let err = compile(arch, &b"+"[..], Vec::new(), &Default::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedArch);
    }
}

// ============================================================================
// End to End
// ============================================================================

#[cfg(unix)]
#[test]
fn test_hello_world_runs() {
    let Some(arch) = runnable_host() else {
        return;
    };
    for optimize in [false, true] {
        let elf = build(arch, HELLO, optimize);
        let output = run(&format!("hello-{}", optimize), &elf, b"");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"Hello World!\n");
    }
}

#[cfg(unix)]
#[test]
fn test_cat_runs() {
    let Some(arch) = runnable_host() else {
        return;
    };
    // Echo stdin until a zero byte
    for optimize in [false, true] {
        let output = run(&format!("echo-{}", optimize), &build(arch, ",[.,]", optimize), b"abc\0");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"abc");
    }
}

#[cfg(unix)]
#[test]
fn test_tape_wraps_cells() {
    let Some(arch) = runnable_host() else {
        return;
    };
    // 255 + 2 wraps to 1, printed as a byte
    let source = format!("{}++.>>>>{}.", "+".repeat(255), "-");
    let output = run("wrap", &build(arch, &source, false), b"");
    assert_eq!(output.stdout, [1, 255]);
}
