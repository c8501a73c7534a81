//! IR Type Definitions
//!
//! The IR is flat text: the eight Brainfuck operators, `@` for "zero the
//! current cell", and four repeat opcodes each followed by a lowercase hex
//! count.
//!
//! | Opcode | Meaning |
//! |--------|---------|
//! | `#n`   | add n to the current cell |
//! | `=n`   | subtract n from the current cell |
//! | `}n`   | move the tape pointer n cells right |
//! | `{n`   | move the tape pointer n cells left |

use std::fmt;

use crate::error::{CompileError, ErrorKind};

/// A single IR operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrOp {
    /// Add to the current cell (`+` or `#n`)
    Add(u64),
    /// Subtract from the current cell (`-` or `=n`)
    Sub(u64),
    /// Move right (`>` or `}n`)
    Right(u64),
    /// Move left (`<` or `{n`)
    Left(u64),
    /// `.`
    Output,
    /// `,`
    Input,
    /// `[`
    LoopOpen,
    /// `]`
    LoopClose,
    /// `@` (folded `[-]` / `[+]`)
    Zero,
}

impl IrOp {
    /// The character this operation is written with
    pub fn symbol(&self) -> char {
        match self {
            IrOp::Add(1) => '+',
            IrOp::Sub(1) => '-',
            IrOp::Right(1) => '>',
            IrOp::Left(1) => '<',
            IrOp::Add(_) => '#',
            IrOp::Sub(_) => '=',
            IrOp::Right(_) => '}',
            IrOp::Left(_) => '{',
            IrOp::Output => '.',
            IrOp::Input => ',',
            IrOp::LoopOpen => '[',
            IrOp::LoopClose => ']',
            IrOp::Zero => '@',
        }
    }

    /// Single-step operation for a plain Brainfuck byte
    pub fn from_bf(c: u8) -> Option<Self> {
        match c {
            b'+' => Some(IrOp::Add(1)),
            b'-' => Some(IrOp::Sub(1)),
            b'>' => Some(IrOp::Right(1)),
            b'<' => Some(IrOp::Left(1)),
            b'.' => Some(IrOp::Output),
            b',' => Some(IrOp::Input),
            b'[' => Some(IrOp::LoopOpen),
            b']' => Some(IrOp::LoopClose),
            _ => None,
        }
    }

    /// Repeat count for the run-length opcodes
    pub fn count(&self) -> Option<u64> {
        match *self {
            IrOp::Add(n) | IrOp::Sub(n) | IrOp::Right(n) | IrOp::Left(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for IrOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count() {
            Some(1) | None => write!(f, "{}", self.symbol()),
            Some(n) => write!(f, "{}{:x}", self.symbol(), n),
        }
    }
}

/// Tokenizes an IR stream into [`IrOp`]s.
///
/// Yields at most one error, after which iteration stops.
#[derive(Debug, Clone)]
pub struct IrParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> IrParser<'a> {
    pub fn new(ir: &'a [u8]) -> Self {
        Self { bytes: ir, pos: 0 }
    }

    fn fail(&mut self, err: CompileError) -> Option<Result<IrOp, CompileError>> {
        self.pos = self.bytes.len();
        Some(Err(err))
    }

    /// Read the hex count following a repeat opcode
    fn count(&mut self, opcode: char) -> Result<u64, CompileError> {
        let start = self.pos;
        let mut value: u64 = 0;
        while let Some(&c) = self.bytes.get(self.pos) {
            let digit = match c {
                b'0'..=b'9' => c - b'0',
                b'a'..=b'f' => c - b'a' + 10,
                _ => break,
            };
            value = value
                .checked_mul(16)
                .and_then(|v| v.checked_add(digit as u64))
                .ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::TooManyInstructions,
                        "repeat count does not fit in 64 bits",
                    )
                    .with_instruction(opcode)
                })?;
            self.pos += 1;
        }
        if self.pos == start {
            return Err(CompileError::new(
                ErrorKind::InvalidIr,
                format!("'{}' must be followed by a lowercase hex count", opcode),
            )
            .with_instruction(opcode));
        }
        Ok(value)
    }
}

impl Iterator for IrParser<'_> {
    type Item = Result<IrOp, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        let c = *self.bytes.get(self.pos)?;
        self.pos += 1;

        if let Some(op) = IrOp::from_bf(c) {
            return Some(Ok(op));
        }
        let make: fn(u64) -> IrOp = match c {
            b'@' => return Some(Ok(IrOp::Zero)),
            b'#' => IrOp::Add,
            b'=' => IrOp::Sub,
            b'}' => IrOp::Right,
            b'{' => IrOp::Left,
            _ => {
                let shown = char::from(c);
                return self.fail(
                    CompileError::new(
                        ErrorKind::InvalidIr,
                        format!("unexpected byte {:#04x} in IR stream", c),
                    )
                    .with_instruction(shown),
                );
            }
        };
        match self.count(char::from(c)) {
            Ok(n) => Some(Ok(make(n))),
            Err(e) => self.fail(e),
        }
    }
}
