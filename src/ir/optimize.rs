//! Source-to-IR Optimization
//!
//! Passes, in order:
//! - Filter to the eight Brainfuck operators
//! - Bracket balance check (against the raw source, so positions are exact)
//! - Dead code elimination, repeated until nothing changes
//! - Run-length condensation
//! - `[-]` / `[+]` folding

use log::trace;

use super::types::{IrOp, IrParser};
use crate::error::{CompileError, ErrorKind, SourceLocation};

/// Consecutive `+` or `-` that wrap a cell back to its value
const CELL_WRAP: usize = 256;

/// Optimize Brainfuck source into an IR stream
pub fn to_ir(source: &[u8]) -> Result<String, CompileError> {
    check_balance(source)?;
    let code = strip_dead_code(filter(source));
    let ops = fold_zeroing(condense(&code)?);
    trace!("condensed {} bytes of source into {} IR ops", source.len(), ops.len());
    Ok(ops.iter().map(|op| op.to_string()).collect())
}

/// Render an IR stream back into plain Brainfuck
pub fn expand_ir(ir: &[u8]) -> Result<Vec<u8>, CompileError> {
    let mut out = Vec::with_capacity(ir.len());
    for op in IrParser::new(ir) {
        let op = op?;
        let (c, n) = match op {
            IrOp::Add(n) => (b'+', n),
            IrOp::Sub(n) => (b'-', n),
            IrOp::Right(n) => (b'>', n),
            IrOp::Left(n) => (b'<', n),
            IrOp::Zero => {
                out.extend_from_slice(b"[-]");
                continue;
            }
            other => (other.symbol() as u8, 1),
        };
        let n = usize::try_from(n).map_err(|_| too_many(op.symbol()))?;
        out.try_reserve(n).map_err(|e| {
            CompileError::new(
                ErrorKind::AllocationFailed,
                format!("failed to expand IR: {}", e),
            )
        })?;
        out.resize(out.len() + n, c);
    }
    Ok(out)
}

fn too_many(instruction: char) -> CompileError {
    CompileError::new(
        ErrorKind::TooManyInstructions,
        "run of instructions is too long to encode",
    )
    .with_instruction(instruction)
}

/// Keep only the eight operator bytes
fn filter(source: &[u8]) -> Vec<u8> {
    source
        .iter()
        .copied()
        .filter(|c| IrOp::from_bf(*c).is_some())
        .collect()
}

/// Report the first unmatched `]`, or else the oldest unmatched `[`
fn check_balance(source: &[u8]) -> Result<(), CompileError> {
    let mut loc = SourceLocation::default();
    let mut open: Vec<SourceLocation> = Vec::new();
    for &c in source {
        loc.advance(c);
        match c {
            b'[' => open.push(loc),
            b']' => {
                if open.pop().is_none() {
                    return Err(CompileError::new(
                        ErrorKind::UnmatchedClose,
                        "found ']' without a matching '['",
                    )
                    .with_instruction(']')
                    .with_location(loc));
                }
            }
            _ => {}
        }
    }
    match open.first() {
        Some(&first) => Err(CompileError::new(
            ErrorKind::UnmatchedOpen,
            "reached the end of the file with an unmatched '['",
        )
        .with_instruction('[')
        .with_location(first)),
        None => Ok(()),
    }
}

// =============================================================================
// Dead Code Elimination
// =============================================================================

/// Remove code with no effect until a pass changes nothing.
/// Expects balanced brackets.
fn strip_dead_code(mut code: Vec<u8>) -> Vec<u8> {
    loop {
        let before = code.len();
        code = drop_dead_loops(&drop_full_wraps(&cancel_pairs(&code)));
        // Every pass only removes, so an unchanged length means a fixed point
        if code.len() == before {
            return code;
        }
    }
}

/// Delete adjacent inverse pairs (`<>`, `><`, `+-`, `-+`), including pairs
/// that only become adjacent once an inner pair is gone
fn cancel_pairs(code: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::with_capacity(code.len());
    for &c in code {
        let inverse = match c {
            b'+' => Some(b'-'),
            b'-' => Some(b'+'),
            b'<' => Some(b'>'),
            b'>' => Some(b'<'),
            _ => None,
        };
        if inverse.is_some() && out.last().copied() == inverse {
            out.pop();
        } else {
            out.push(c);
        }
    }
    out
}

/// Shorten runs of `+` or `-` by whole multiples of 256
fn drop_full_wraps(code: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(code.len());
    for run in code.chunk_by(|a, b| a == b) {
        if matches!(run[0], b'+' | b'-') {
            out.extend_from_slice(&run[..run.len() % CELL_WRAP]);
        } else {
            out.extend_from_slice(run);
        }
    }
    out
}

/// Delete loops that can never be entered: one at the start of the program
/// (every cell is zero) or one right after a `]` (the cell just tested zero)
fn drop_dead_loops(code: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::with_capacity(code.len());
    let mut i = 0;
    while i < code.len() {
        let dead = code[i] == b'[' && matches!(out.last(), None | Some(b']'));
        if dead {
            i = matching_close(code, i) + 1;
        } else {
            out.push(code[i]);
            i += 1;
        }
    }
    out
}

/// Index of the `]` matching the `[` at `open`, or the end if unmatched
fn matching_close(code: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, &c) in code.iter().enumerate().skip(open) {
        match c {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    code.len()
}

// =============================================================================
// Condensation
// =============================================================================

/// Collapse runs of the same `+-<>` operator into one counted op
fn condense(code: &[u8]) -> Result<Vec<IrOp>, CompileError> {
    let mut ops = Vec::new();
    for run in code.chunk_by(|a, b| a == b && matches!(a, b'+' | b'-' | b'<' | b'>')) {
        let n = u64::try_from(run.len())
            .ok()
            .filter(|n| i64::try_from(*n).is_ok())
            .ok_or_else(|| too_many(char::from(run[0])))?;
        let op = match run[0] {
            b'+' => IrOp::Add(n),
            b'-' => IrOp::Sub(n),
            b'>' => IrOp::Right(n),
            b'<' => IrOp::Left(n),
            c => match IrOp::from_bf(c) {
                Some(op) => op,
                None => continue,
            },
        };
        ops.push(op);
    }
    Ok(ops)
}

/// Replace `[-]` and `[+]` with a single zeroing op
fn fold_zeroing(ops: Vec<IrOp>) -> Vec<IrOp> {
    let mut out: Vec<IrOp> = Vec::with_capacity(ops.len());
    for op in ops {
        out.push(op);
        if let [.., IrOp::LoopOpen, IrOp::Add(1) | IrOp::Sub(1), IrOp::LoopClose] = out[..] {
            out.truncate(out.len() - 3);
            out.push(IrOp::Zero);
        }
    }
    out
}
