//! Compiler Error System
//!
//! Every failure carries a stable [`ErrorKind`], a message, and whatever
//! context was available when it happened: the source position, the
//! offending instruction, and the file being compiled.
//!
//! Errors are rendered either as a single human-readable line or as a JSON
//! object (see [`CompileError::to_json`]).

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable identifier for each kind of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    // Driver / I/O errors
    BadSourceExtension,
    FailedRead,
    FailedWrite,
    OpenReadFailed,
    OpenWriteFailed,

    // Encoding errors
    JumpTooLong,
    InvalidJumpAlignment,
    ImmediateTooLarge,
    TooManyInstructions,

    // Syntax errors
    UnmatchedOpen,
    UnmatchedClose,
    InvalidIr,

    // Configuration errors
    TapeSizeZero,
    TapeTooLarge,
    UnknownArch,
    UnsupportedArch,

    // Fatal
    AllocationFailed,
}

impl ErrorKind {
    /// Get the identifier string used in error output (e.g., "JumpTooLong")
    pub fn id(&self) -> &'static str {
        match self {
            ErrorKind::BadSourceExtension => "BadSourceExtension",
            ErrorKind::FailedRead => "FailedRead",
            ErrorKind::FailedWrite => "FailedWrite",
            ErrorKind::OpenReadFailed => "OpenReadFailed",
            ErrorKind::OpenWriteFailed => "OpenWriteFailed",
            ErrorKind::JumpTooLong => "JumpTooLong",
            ErrorKind::InvalidJumpAlignment => "InvalidJumpAlignment",
            ErrorKind::ImmediateTooLarge => "ImmediateTooLarge",
            ErrorKind::TooManyInstructions => "TooManyInstructions",
            ErrorKind::UnmatchedOpen => "UnmatchedOpen",
            ErrorKind::UnmatchedClose => "UnmatchedClose",
            ErrorKind::InvalidIr => "InvalidIr",
            ErrorKind::TapeSizeZero => "TapeSizeZero",
            ErrorKind::TapeTooLarge => "TapeTooLarge",
            ErrorKind::UnknownArch => "UnknownArch",
            ErrorKind::UnsupportedArch => "UnsupportedArch",
            ErrorKind::AllocationFailed => "Fatal:AllocFailure",
        }
    }

    /// Fatal errors end the whole run, not just the current file
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::AllocationFailed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Position within a source file. Lines start at 1; columns count code
/// points, so UTF-8 continuation bytes don't advance them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Advance past the byte `c`
    pub fn advance(&mut self, c: u8) {
        if c == b'\n' {
            self.line += 1;
            self.column = 0;
        } else if (c & 0xc0) != 0x80 {
            self.column += 1;
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self { line: 1, column: 0 }
    }
}

/// A compilation failure with full context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<SourceLocation>,
    pub instruction: Option<char>,
    pub file: Option<String>,
}

impl CompileError {
    /// Create a new error with no context attached
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            instruction: None,
            file: None,
        }
    }

    /// Attach a source position
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach the instruction being compiled when the error occurred
    pub fn with_instruction(mut self, instruction: char) -> Self {
        self.instruction = Some(instruction);
        self
    }

    /// Attach the file name, unless one was already attached
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        if self.file.is_none() {
            self.file = Some(file.into());
        }
        self
    }

    /// Fill in the instruction and location only where they're still missing
    pub fn or_context(mut self, instruction: char, location: Option<SourceLocation>) -> Self {
        if self.instruction.is_none() {
            self.instruction = Some(instruction);
        }
        if self.location.is_none() {
            self.location = location;
        }
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Build from an I/O error, keeping its text as the message
    pub fn io(kind: ErrorKind, err: &std::io::Error) -> Self {
        Self::new(kind, err.to_string())
    }

    /// Format as a single human-readable line (without any "error:" prefix)
    pub fn report(&self) -> String {
        let mut output = self.kind.id().to_string();

        if let Some(file) = &self.file {
            output.push_str(&format!(" in file {}", file));
        }
        if let Some(loc) = &self.location {
            output.push_str(&format!(" at line {}, column {}", loc.line, loc.column));
        }
        if let Some(instr) = self.instruction {
            output.push_str(&format!(" (instruction {})", instr.escape_default()));
        }
        output.push_str(": ");
        output.push_str(&self.message);
        output
    }

    /// Serialize to a single-line JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&JsonError::from(self)).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Wire shape of an error in JSON output mode
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonError<'a> {
    error_id: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    column: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instruction: Option<String>,
    message: &'a str,
}

impl<'a> From<&'a CompileError> for JsonError<'a> {
    fn from(err: &'a CompileError) -> Self {
        Self {
            error_id: err.kind.id(),
            file: err.file.as_deref(),
            line: err.location.map(|l| l.line),
            column: err.location.map(|l| l.column),
            instruction: err.instruction.map(String::from),
            message: &err.message,
        }
    }
}
