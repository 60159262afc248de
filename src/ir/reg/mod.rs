//! Register IR — the textual three-address form between the program tree
//! and both back ends.
//!
//! Values live in an unbounded set of virtual registers `rN`. Literals come
//! from a deduplicated constant pool (`data $sN`, `$iN`, `$fN`) and are
//! brought into registers with `load_data`. Variables are named slots
//! accessed with `load_name` / `store_name`.
//!
//! ```text
//! ; velox register ir
//! data $i0 = { i64 2 }
//!
//! function main() {
//!     r0 = load_data $i0
//!     store_name x, r0
//!     ret
//! }
//! ```
//!
//! `builder` produces a `RegProgram` from the tree, `Display` renders it,
//! and `parse` reads text back into the same structure so every consumer
//! shares one grammar.

pub mod builder;
pub mod liveness;
pub mod parse;

use std::fmt;

use crate::ast::{BinOp, UnaryOp};

// ─── Registers and labels ─────────────────────────────────────────

/// A virtual register `rN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(pub u32);

impl Reg {
    /// Parse `rN`.
    pub fn parse(s: &str) -> Option<Reg> {
        let digits = s.strip_prefix('r')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Reg)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A jump target. Rendered with a leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn numbered(n: u32) -> Self {
        Self(format!("L{}", n))
    }

    /// Parse `@name`.
    pub fn parse(s: &str) -> Option<Label> {
        let name = s.strip_prefix('@')?;
        if name.is_empty() || !name.chars().all(is_ident_char) {
            return None;
        }
        Some(Label::new(name))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

pub(crate) fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ─── Constant data ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Str,
    Int,
    Float,
}

impl DataKind {
    pub fn prefix(self) -> char {
        match self {
            DataKind::Str => 's',
            DataKind::Int => 'i',
            DataKind::Float => 'f',
        }
    }
}

/// `$sN`, `$iN` or `$fN`. The id is shared with the register counter, so
/// `rN = load_data $iN` names the same N on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataLabel {
    pub kind: DataKind,
    pub id: u32,
}

impl DataLabel {
    pub fn parse(s: &str) -> Option<DataLabel> {
        let rest = s.strip_prefix('$')?;
        let mut chars = rest.chars();
        let kind = match chars.next()? {
            's' => DataKind::Str,
            'i' => DataKind::Int,
            'f' => DataKind::Float,
            _ => return None,
        };
        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(DataLabel {
            kind,
            id: digits.parse().ok()?,
        })
    }
}

impl fmt::Display for DataLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}{}", self.kind.prefix(), self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl DataValue {
    pub fn kind(&self) -> DataKind {
        match self {
            DataValue::Str(_) => DataKind::Str,
            DataValue::Int(_) => DataKind::Int,
            DataValue::Float(_) => DataKind::Float,
        }
    }
}

/// One `data` line.
#[derive(Debug, Clone, PartialEq)]
pub struct DataDecl {
    pub label: DataLabel,
    pub value: DataValue,
}

impl fmt::Display for DataDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            DataValue::Str(s) => write!(f, "data {} = {{ \"{}\" }}", self.label, escape_str(s)),
            DataValue::Int(v) => write!(f, "data {} = {{ i64 {} }}", self.label, v),
            DataValue::Float(v) => {
                write!(f, "data {} = {{ f64 {} }}", self.label, format_float(*v))
            }
        }
    }
}

/// Float text that parses back to the same bits and never looks like an
/// integer (`2.0`, not `2`).
pub fn format_float(v: f64) -> String {
    format!("{:?}", v)
}

/// Escape `"`, `\`, newline, carriage return and tab.
pub fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of `escape_str`. Unknown escapes keep the escaped character.
pub fn unescape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// ─── Instructions ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RegOp {
    LoadData {
        dst: Reg,
        data: DataLabel,
    },
    LoadName {
        dst: Reg,
        name: String,
    },
    StoreName {
        name: String,
        src: Reg,
    },
    Binary {
        op: BinOp,
        dst: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    /// `neg` or `copy` (unary plus).
    Unary {
        op: UnaryOp,
        dst: Reg,
        src: Reg,
    },
    /// A call without `dst` is kept for its effect.
    Call {
        dst: Option<Reg>,
        callee: String,
        args: Vec<Reg>,
    },
    Jump(Label),
    JumpIfFalse {
        cond: Reg,
        target: Label,
    },
    Label(Label),
    /// Unresolved loop control, only found in hand-written text.
    Break,
    Continue,
    Ret(Option<Reg>),
    Comment(String),
}

impl RegOp {
    /// The register this instruction defines.
    pub fn def(&self) -> Option<Reg> {
        match self {
            RegOp::LoadData { dst, .. }
            | RegOp::LoadName { dst, .. }
            | RegOp::Binary { dst, .. }
            | RegOp::Unary { dst, .. } => Some(*dst),
            RegOp::Call { dst, .. } => *dst,
            _ => None,
        }
    }

    /// Registers this instruction reads, in operand order.
    pub fn uses(&self) -> Vec<Reg> {
        match self {
            RegOp::StoreName { src, .. } | RegOp::Unary { src, .. } => vec![*src],
            RegOp::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            RegOp::Call { args, .. } => args.clone(),
            RegOp::JumpIfFalse { cond, .. } => vec![*cond],
            RegOp::Ret(Some(r)) => vec![*r],
            _ => Vec::new(),
        }
    }

    /// Instructions kept regardless of whether their result is read.
    pub fn is_root(&self) -> bool {
        matches!(
            self,
            RegOp::StoreName { .. }
                | RegOp::Jump(_)
                | RegOp::JumpIfFalse { .. }
                | RegOp::Ret(_)
                | RegOp::Break
                | RegOp::Continue
                | RegOp::Call { dst: None, .. }
        )
    }
}

fn join_regs(regs: &[Reg]) -> String {
    regs.iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for RegOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegOp::LoadData { dst, data } => write!(f, "{} = load_data {}", dst, data),
            RegOp::LoadName { dst, name } => write!(f, "{} = load_name {}", dst, name),
            RegOp::StoreName { name, src } => write!(f, "store_name {}, {}", name, src),
            RegOp::Binary { op, dst, lhs, rhs } => {
                write!(f, "{} = {} {}, {}", dst, op.mnemonic(), lhs, rhs)
            }
            RegOp::Unary { op, dst, src } => write!(f, "{} = {} {}", dst, op.mnemonic(), src),
            RegOp::Call {
                dst: Some(dst),
                callee,
                args,
            } => write!(f, "{} = call {}({})", dst, callee, join_regs(args)),
            RegOp::Call {
                dst: None,
                callee,
                args,
            } => write!(f, "call {}({})", callee, join_regs(args)),
            RegOp::Jump(label) => write!(f, "jmp {}", label),
            RegOp::JumpIfFalse { cond, target } => write!(f, "jmp_if_false {}, {}", cond, target),
            RegOp::Label(label) => write!(f, "{}:", label),
            RegOp::Break => write!(f, "break"),
            RegOp::Continue => write!(f, "continue"),
            RegOp::Ret(Some(r)) => write!(f, "ret {}", r),
            RegOp::Ret(None) => write!(f, "ret"),
            RegOp::Comment(text) => write!(f, "; {}", text),
        }
    }
}

// ─── Functions and programs ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Function {
    pub name: String,
    pub params: Vec<Reg>,
    pub body: Vec<RegOp>,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {}({}) {{", self.name, join_regs(&self.params))?;
        for op in &self.body {
            match op {
                RegOp::Label(_) => writeln!(f, "  {}", op)?,
                _ => writeln!(f, "    {}", op)?,
            }
        }
        writeln!(f, "}}")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RegProgram {
    pub data: Vec<DataDecl>,
    pub functions: Vec<Function>,
}

impl RegProgram {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn data_decl(&self, label: DataLabel) -> Option<&DataDecl> {
        self.data.iter().find(|d| d.label == label)
    }
}

pub const HEADER_COMMENT: &str = "; velox register ir";

impl fmt::Display for RegProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", HEADER_COMMENT)?;
        for decl in &self.data {
            writeln!(f, "{}", decl)?;
        }
        for func in &self.functions {
            writeln!(f)?;
            write!(f, "{}", func)?;
        }
        Ok(())
    }
}
