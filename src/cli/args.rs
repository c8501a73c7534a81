//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

use crate::arch::Arch;
use crate::elf::tape_size;
use crate::error::CompileError;
use crate::CompileOptions;

/// How errors are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable lines on stderr
    Normal,
    /// One JSON object per line on stdout
    Json,
    Quiet,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "bfc")]
#[command(version)]
#[command(about = "Brainfuck to ELF compiler", long_about = None)]
pub struct Args {
    /// Don't print any errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Print errors as JSON, one object per line
    #[arg(short, long)]
    pub json: bool,

    /// Run the optimizer before generating code
    #[arg(short = 'O', long)]
    pub optimize: bool,

    /// Keep output files that failed to compile
    #[arg(short, long)]
    pub keep: bool,

    /// Continue with the next file after a failure
    #[arg(short = 'c', long = "continue", visible_short_alias = 'm')]
    pub continue_on_error: bool,

    /// List supported architectures and exit
    #[arg(short = 'A', long = "list-arches")]
    pub list_arches: bool,

    /// Target architecture (defaults to the host's when supported)
    #[arg(short, long, value_name = "ARCH")]
    pub arch: Option<String>,

    /// Tape size in 4 KiB blocks
    #[arg(short, long = "tape-size", value_name = "BLOCKS", default_value_t = 8)]
    pub tape_blocks: u64,

    /// Extension of source files
    #[arg(short, long = "source-ext", value_name = "EXT", default_value = ".bf")]
    pub extension: String,

    /// Suffix appended to output file names
    #[arg(short, long = "output-suffix", value_name = "SUF", default_value = "")]
    pub suffix: String,

    /// Brainfuck source files
    #[arg(value_name = "FILE", required_unless_present = "list_arches")]
    pub files: Vec<PathBuf>,
}

impl Args {
    pub fn output_mode(&self) -> OutputMode {
        if self.quiet {
            OutputMode::Quiet
        } else if self.json {
            OutputMode::Json
        } else {
            OutputMode::Normal
        }
    }

    /// Resolve `-a`, falling back to the default target
    pub fn target(&self) -> Result<Arch, CompileError> {
        let arch = match &self.arch {
            Some(name) => Arch::from_name(name)?,
            None => Arch::default_target().unwrap_or(Arch::X86_64),
        };
        if !arch.is_enabled() {
            return Err(arch.unsupported());
        }
        Ok(arch)
    }

    /// Validated per-file compile options
    pub fn compile_options(&self) -> Result<CompileOptions, CompileError> {
        tape_size(self.tape_blocks)?;
        Ok(CompileOptions {
            optimize: self.optimize,
            tape_blocks: self.tape_blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("bfc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["hello.bf"]);
        assert_eq!(args.output_mode(), OutputMode::Normal);
        assert_eq!(args.extension, ".bf");
        assert_eq!(args.suffix, "");
        assert_eq!(args.compile_options().unwrap(), CompileOptions::default());
        assert_eq!(args.files, vec![PathBuf::from("hello.bf")]);
    }

    #[test]
    fn test_short_flags() {
        let args = parse(&["-jOkc", "-a", "arm64", "-t", "16", "-e", ".b", "-s", ".elf", "x.b"]);
        assert_eq!(args.output_mode(), OutputMode::Json);
        assert!(args.keep && args.continue_on_error);
        let options = args.compile_options().unwrap();
        assert!(options.optimize);
        assert_eq!(options.tape_blocks, 16);
        assert_eq!(args.extension, ".b");
        assert_eq!(args.suffix, ".elf");
        assert_eq!(args.arch.as_deref(), Some("arm64"));
    }

    #[test]
    fn test_quiet_wins() {
        assert_eq!(parse(&["-q", "-j", "a.bf"]).output_mode(), OutputMode::Quiet);
    }

    #[test]
    fn test_files_required() {
        assert!(Args::try_parse_from(["bfc"]).is_err());
        assert!(Args::try_parse_from(["bfc", "-A"]).is_ok());
    }

    #[test]
    fn test_bad_tape_size() {
        let err = parse(&["-t", "0", "a.bf"]).compile_options().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TapeSizeZero);

        let huge = (u64::MAX >> 12).to_string();
        let err = parse(&["-t", &huge, "a.bf"]).compile_options().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TapeTooLarge);
    }

    #[test]
    fn test_unknown_target() {
        let err = parse(&["-a", "vax", "a.bf"]).target().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownArch);
    }
}
