//! bfc Compiler CLI
//!
//! Compiles Brainfuck source files to native ELF executables.

use std::process::ExitCode;

use clap::Parser;

use bfc::cli::{self, Args};

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let usage_error = e.use_stderr();
            // Help and version are not failures
            let _ = e.print();
            return if usage_error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    cli::run(args)
}
