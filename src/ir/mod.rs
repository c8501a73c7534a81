//! Intermediate Representation (IR)
//!
//! A condensed form of Brainfuck that the code generator can consume in
//! place of raw source. It is produced by the optimizer and is itself plain
//! text, so it can be stored and reparsed.
//!
//! ## Pipeline
//!
//! ```text
//! Source → to_ir → IR text → IrParser → CodeGen
//! ```

pub mod optimize;
pub mod types;

pub use optimize::{expand_ir, to_ir};
pub use types::{IrOp, IrParser};
