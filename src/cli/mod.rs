//! Command-line driver
//!
//! Compiles each file named on the command line to an executable next to
//! it: `dir/hello.bf` becomes `dir/hello` plus the output suffix.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use log::{debug, warn};

use crate::arch::Arch;
use crate::error::{CompileError, ErrorKind};
use crate::{compile, CompileOptions, CompileStats};

pub mod args;

pub use args::{Args, OutputMode};

/// Print an error the way `mode` asks for
pub fn report(mode: OutputMode, err: &CompileError) {
    match mode {
        OutputMode::Normal => eprintln!("{}: {}", "error".red().bold(), err.report()),
        OutputMode::Json => println!("{}", err.to_json()),
        OutputMode::Quiet => {}
    }
}

/// Human-readable list of the compiled-in targets
pub fn arch_list() -> String {
    let mut out = String::from("This build of bfc supports the following architectures:\n\n");
    for arch in Arch::enabled() {
        out.push_str(&format!("- {} (aliases: {})\n", arch, arch.aliases().join(", ")));
    }
    match Arch::default_target() {
        Some(arch) => out.push_str(&format!(
            "\nIf no architecture is specified, it defaults to {}.\n",
            arch
        )),
        None => out.push_str("\nNo architectures were enabled in this build.\n"),
    }
    out
}

/// Settings shared by every file in one run
#[derive(Debug, Clone)]
pub struct Driver {
    pub arch: Arch,
    pub options: CompileOptions,
    pub extension: String,
    pub suffix: String,
    pub keep: bool,
    pub continue_on_error: bool,
    pub mode: OutputMode,
}

impl Driver {
    pub fn from_args(args: &Args) -> Result<Self, CompileError> {
        Ok(Self {
            arch: args.target()?,
            options: args.compile_options()?,
            extension: args.extension.clone(),
            suffix: args.suffix.clone(),
            keep: args.keep,
            continue_on_error: args.continue_on_error,
            mode: args.output_mode(),
        })
    }

    /// Source path with the extension replaced by the suffix
    pub fn output_path(&self, source: &Path) -> Result<PathBuf, CompileError> {
        let bad_extension = || {
            CompileError::new(
                ErrorKind::BadSourceExtension,
                "file does not end with the expected extension",
            )
        };
        let name = source.to_str().ok_or_else(bad_extension)?;
        // Something must be left once the extension is gone
        match name.strip_suffix(self.extension.as_str()) {
            Some(stem) if !stem.is_empty() => Ok(PathBuf::from(format!("{}{}", stem, self.suffix))),
            _ => Err(bad_extension()),
        }
    }

    /// Compile one file, removing a failed output unless asked to keep it
    pub fn compile_file(&self, source: &Path) -> Result<CompileStats, CompileError> {
        let in_source = |e: CompileError| e.in_file(source.display().to_string());

        let out_path = self.output_path(source).map_err(in_source)?;
        let input = File::open(source)
            .map_err(|e| in_source(CompileError::io(ErrorKind::OpenReadFailed, &e)))?;
        let output = create_executable(&out_path).map_err(|e| {
            CompileError::io(ErrorKind::OpenWriteFailed, &e).in_file(out_path.display().to_string())
        })?;

        let result = compile(
            self.arch,
            BufReader::new(input),
            BufWriter::new(output),
            &self.options,
        );
        match result {
            Ok(stats) => {
                debug!(
                    "{} -> {} ({} bytes of code)",
                    source.display(),
                    out_path.display(),
                    stats.code_size
                );
                Ok(stats)
            }
            Err(err) => {
                if !self.keep {
                    if let Err(e) = fs::remove_file(&out_path) {
                        warn!("failed to remove {}: {}", out_path.display(), e);
                    }
                }
                Err(in_source(err))
            }
        }
    }

    /// Compile every file in order. Returns true if all of them succeeded.
    pub fn run(&self, files: &[PathBuf]) -> bool {
        let mut ok = true;
        for file in files {
            if let Err(err) = self.compile_file(file) {
                report(self.mode, &err);
                ok = false;
                if err.is_fatal() || !self.continue_on_error {
                    break;
                }
            }
        }
        ok
    }
}

/// Create (or truncate) `path` as an executable file
fn create_executable(path: &Path) -> std::io::Result<File> {
    let mut open = OpenOptions::new();
    open.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        open.mode(0o755);
    }
    open.open(path)
}

/// Entry point for the `bfc` binary once arguments are parsed
pub fn run(args: Args) -> ExitCode {
    if args.list_arches {
        print!("{}", arch_list());
        return ExitCode::SUCCESS;
    }
    let driver = match Driver::from_args(&args) {
        Ok(driver) => driver,
        Err(err) => {
            report(args.output_mode(), &err);
            return ExitCode::FAILURE;
        }
    };
    if driver.run(&args.files) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(extension: &str, suffix: &str) -> Driver {
        Driver {
            arch: Arch::X86_64,
            options: CompileOptions::default(),
            extension: extension.to_string(),
            suffix: suffix.to_string(),
            keep: false,
            continue_on_error: false,
            mode: OutputMode::Quiet,
        }
    }

    #[test]
    fn test_output_path() {
        let d = driver(".bf", "");
        assert_eq!(d.output_path(Path::new("dir/hello.bf")).unwrap(), PathBuf::from("dir/hello"));
        let d = driver(".b", ".elf");
        assert_eq!(d.output_path(Path::new("x.b")).unwrap(), PathBuf::from("x.elf"));
    }

    #[test]
    fn test_bad_extension() {
        let d = driver(".bf", "");
        for name in ["hello.b", "hello", ".bf"] {
            let err = d.output_path(Path::new(name)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::BadSourceExtension, "{}", name);
        }
    }

    #[test]
    fn test_arch_list() {
        let list = arch_list();
        for arch in Arch::enabled() {
            assert!(list.contains(arch.name()));
        }
    }

    #[test]
    fn test_failed_output_removed() {
        let dir = std::env::temp_dir().join(format!("bfc-cli-unit-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let source = dir.join("broken.bf");
        fs::write(&source, "+[").unwrap();

        let mut d = driver(".bf", "");
        d.arch = match Arch::enabled().next() {
            Some(arch) => arch,
            None => return,
        };
        let err = d.compile_file(&source).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnmatchedOpen);
        assert_eq!(err.file, Some(source.display().to_string()));
        assert!(!dir.join("broken").exists());

        d.keep = true;
        assert!(d.compile_file(&source).is_err());
        assert!(dir.join("broken").exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
