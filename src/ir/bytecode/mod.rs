//! Array bytecode: a flat list of fixed-shape register instructions.
//!
//! Every value-producing instruction writes a fresh virtual register
//! `%rN` from one counter, so operands always name the instruction that
//! produced them. Variables live in a flat slot table (`#N`) assigned on
//! first use and shared by the whole program.
//!
//! Function bodies stay inline: `FUNCTION_DEF` records its entry (the next
//! index) and the first index after the body, which always ends with an
//! implicit `RETURN`.

mod builder;
#[cfg(test)]
mod tests;

pub use builder::{lower_to_bytecode, BytecodeBuilder};

use std::fmt;

use crate::ast::{BinOp, UnaryOp};
use crate::ir::reg::escape_str;

/// A virtual register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VReg(pub u32);

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%r{}", self.0)
    }
}

/// Index into the variable slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(pub u32);

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Bytecode {
    LoadConst {
        dst: VReg,
        value: Const,
    },
    LoadName {
        dst: VReg,
        slot: Slot,
    },
    StoreName {
        slot: Slot,
        src: VReg,
    },
    Print {
        args: Vec<VReg>,
    },
    Input {
        dst: VReg,
        prompt: Option<VReg>,
    },
    ToInt {
        dst: VReg,
        src: VReg,
    },
    ToFloat {
        dst: VReg,
        src: VReg,
    },
    Binary {
        op: BinOp,
        dst: VReg,
        lhs: VReg,
        rhs: VReg,
    },
    Unary {
        op: UnaryOp,
        dst: VReg,
        src: VReg,
    },
    Jump {
        target: usize,
    },
    JumpIfFalse {
        cond: VReg,
        target: usize,
    },
    /// `None` outside of any loop.
    Break {
        target: Option<usize>,
    },
    Continue {
        target: Option<usize>,
    },
    FunctionDef {
        name: String,
        params: Vec<Slot>,
        entry: usize,
        end: usize,
    },
    Call {
        name: String,
        args: Vec<VReg>,
        dst: VReg,
    },
    Return {
        value: Option<VReg>,
    },
}

fn join<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

fn target(t: &Option<usize>) -> String {
    match t {
        Some(t) => t.to_string(),
        None => "?".to_string(),
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bytecode::LoadConst { dst, value } => match value {
                Const::Int(v) => write!(f, "LOAD_CONST_INT {}, {}", dst, v),
                Const::Float(v) => write!(f, "LOAD_CONST_FLOAT {}, {:?}", dst, v),
                Const::Str(s) => write!(f, "LOAD_CONST_STRING {}, \"{}\"", dst, escape_str(s)),
            },
            Bytecode::LoadName { dst, slot } => write!(f, "LOAD_NAME {}, {}", dst, slot),
            Bytecode::StoreName { slot, src } => write!(f, "STORE_NAME {}, {}", slot, src),
            Bytecode::Print { args } => write!(f, "PRINT {}", join(args, ", ")),
            Bytecode::Input { dst, prompt: None } => write!(f, "INPUT {}", dst),
            Bytecode::Input {
                dst,
                prompt: Some(p),
            } => write!(f, "INPUT {}, {}", dst, p),
            Bytecode::ToInt { dst, src } => write!(f, "TOINT {}, {}", dst, src),
            Bytecode::ToFloat { dst, src } => write!(f, "TOFLOAT {}, {}", dst, src),
            Bytecode::Binary { op, dst, lhs, rhs } => write!(
                f,
                "{} {}, {}, {}",
                op.mnemonic().to_uppercase(),
                dst,
                lhs,
                rhs
            ),
            Bytecode::Unary { op, dst, src } => {
                let name = match op {
                    UnaryOp::Neg => "NEG",
                    UnaryOp::Pos => "POS",
                };
                write!(f, "{} {}, {}", name, dst, src)
            }
            Bytecode::Jump { target } => write!(f, "JUMP {}", target),
            Bytecode::JumpIfFalse { cond, target } => {
                write!(f, "JUMP_IF_FALSE {}, {}", cond, target)
            }
            Bytecode::Break { target: t } => write!(f, "BREAK {}", target(t)),
            Bytecode::Continue { target: t } => write!(f, "CONTINUE {}", target(t)),
            Bytecode::FunctionDef {
                name,
                params,
                entry,
                end,
            } => {
                write!(f, "FUNCTION_DEF {} (entry: {}, end: {})", name, entry, end)?;
                if !params.is_empty() {
                    write!(f, " params: {}", join(params, " "))?;
                }
                Ok(())
            }
            Bytecode::Call { name, args, dst } => {
                write!(f, "CALL {} -> {}", name, dst)?;
                if !args.is_empty() {
                    write!(f, " args: {}", join(args, " "))?;
                }
                Ok(())
            }
            Bytecode::Return { value: Some(v) } => write!(f, "RETURN {}", v),
            Bytecode::Return { value: None } => write!(f, "RETURN"),
        }
    }
}

/// Bytecode for one compilation unit plus its variable slot table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BytecodeProgram {
    pub code: Vec<Bytecode>,
    /// Slot index → variable name.
    pub slots: Vec<String>,
}

impl BytecodeProgram {
    pub fn slot_of(&self, name: &str) -> Option<Slot> {
        self.slots
            .iter()
            .position(|s| s == name)
            .map(|i| Slot(i as u32))
    }

    /// Indices of `BREAK`/`CONTINUE` instructions with no enclosing loop.
    pub fn unresolved(&self) -> Vec<usize> {
        self.code
            .iter()
            .enumerate()
            .filter(|(_, op)| {
                matches!(
                    op,
                    Bytecode::Break { target: None } | Bytecode::Continue { target: None }
                )
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Debug listing, one numbered instruction per line.
    pub fn listing(&self) -> String {
        let mut out = String::from("Bytecode:\n");
        for (i, op) in self.code.iter().enumerate() {
            out.push_str(&format!("{:4}: {}\n", i, op));
        }
        out
    }
}
