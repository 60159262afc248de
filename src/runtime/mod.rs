//! Reference interpreters for both instruction sets.
//!
//! They exist to check that the two lowerings of one tree agree: the
//! array bytecode is executed by `BytecodeMachine`, register IR by
//! `RegMachine`. Both collect printed lines instead of writing to stdout,
//! read `input` from a queue of lines, and stop after a step budget so a
//! non-terminating program cannot hang a test.

pub mod bytecode;
pub mod regir;
mod value;

use std::collections::VecDeque;

pub use bytecode::BytecodeMachine;
pub use regir::RegMachine;
pub use value::Value;

use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// Default number of instructions a machine executes before giving up.
pub const DEFAULT_STEP_LIMIT: u64 = 1_000_000;

// ─── Types ─────────────────────────────────────────────────────────

/// Execution result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionResult {
    /// One entry per executed print, arguments joined by a space.
    pub output: Vec<String>,
    /// Number of instructions executed.
    pub steps: u64,
}

/// Lines returned by successive `input` calls.
#[derive(Clone, Debug, Default)]
pub struct ProgramInput {
    pub lines: Vec<String>,
}

impl ProgramInput {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// Execute a compiled program.
pub trait Runner {
    fn run(&self, input: &ProgramInput) -> Result<ExecutionResult, Diagnostic>;
}

// ─── Shared machine state ──────────────────────────────────────────

pub(crate) struct Io {
    pub(crate) output: Vec<String>,
    inputs: VecDeque<String>,
    steps: u64,
    step_limit: u64,
}

impl Io {
    pub(crate) fn new(input: &ProgramInput, step_limit: u64) -> Self {
        Self {
            output: Vec::new(),
            inputs: input.lines.iter().cloned().collect(),
            steps: 0,
            step_limit,
        }
    }

    pub(crate) fn step(&mut self) -> Result<(), String> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(format!("step limit of {} exceeded", self.step_limit));
        }
        Ok(())
    }

    pub(crate) fn print(&mut self, values: &[Value]) {
        let line = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.output.push(line);
    }

    pub(crate) fn read_line(&mut self) -> Result<Value, String> {
        self.inputs
            .pop_front()
            .map(Value::Str)
            .ok_or_else(|| "input exhausted".to_string())
    }

    pub(crate) fn finish(self) -> ExecutionResult {
        ExecutionResult {
            output: self.output,
            steps: self.steps,
        }
    }
}

pub(crate) fn runtime_error(message: String, location: String) -> Diagnostic {
    Diagnostic::error(format!("runtime error: {}", message), Span::dummy()).with_note(location)
}
