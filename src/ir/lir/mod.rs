//! LIR — the portable low-level target, a QBE-style SSA text.
//!
//! Both the lowering from register IR and the optimizer work on
//! `LirInst` records and only render text at the end, so rewrites never
//! have to fit the length of the text they replace.
//!
//! ```text
//! data $i0 = { l 2 }
//! data $var_x = { l 0 }
//!
//! export function w $main() {
//! @start
//!     %r0 =l loadl $i0
//!     storel %r0, $var_x
//!     ret 0
//! }
//! ```

pub mod lower;
pub mod optimize;

use std::fmt;

// ─── Value width ──────────────────────────────────────────────────

/// QBE base type of a temporary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W,
    L,
    S,
    D,
}

impl Width {
    pub fn suffix(self) -> char {
        match self {
            Width::W => 'w',
            Width::L => 'l',
            Width::S => 's',
            Width::D => 'd',
        }
    }

    pub fn parse(s: &str) -> Option<Width> {
        match s {
            "w" => Some(Width::W),
            "l" => Some(Width::L),
            "s" => Some(Width::S),
            "d" => Some(Width::D),
            _ => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Width::S | Width::D)
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.suffix())
    }
}

// ─── Instruction records ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum LirInst {
    /// A whole `data` line.
    Data(String),
    /// `export function w $main() {`
    FunctionStart(String),
    FunctionEnd,
    /// Block label, including the `@`.
    Label(String),
    /// `%dest =w op a, b`
    Assign {
        dest: String,
        width: Width,
        op: String,
        args: Vec<String>,
    },
    /// `[%dest =w] call $callee(w a, ...)`
    Call {
        dest: Option<(String, Width)>,
        callee: String,
        args: Vec<(Width, String)>,
    },
    /// `storew value, addr`
    Store {
        width: Width,
        value: String,
        addr: String,
    },
    Jmp(String),
    Jnz {
        cond: String,
        if_true: String,
        if_false: String,
    },
    Ret(Option<String>),
    Comment(String),
    Blank,
    /// Anything the record grammar does not cover, kept verbatim.
    Raw(String),
}

impl LirInst {
    pub fn assign(dest: &str, width: Width, op: &str, args: &[&str]) -> LirInst {
        LirInst::Assign {
            dest: dest.to_string(),
            width,
            op: op.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Destination temporary, if any.
    pub fn dest(&self) -> Option<&str> {
        match self {
            LirInst::Assign { dest, .. } => Some(dest),
            LirInst::Call {
                dest: Some((dest, _)),
                ..
            } => Some(dest),
            _ => None,
        }
    }

    /// Operands read by this instruction, in order.
    pub fn operands(&self) -> Vec<&str> {
        match self {
            LirInst::Assign { args, .. } => args.iter().map(String::as_str).collect(),
            LirInst::Call { args, .. } => args.iter().map(|(_, a)| a.as_str()).collect(),
            LirInst::Store { value, addr, .. } => vec![value.as_str(), addr.as_str()],
            LirInst::Jnz { cond, .. } => vec![cond.as_str()],
            LirInst::Ret(Some(v)) => vec![v.as_str()],
            _ => Vec::new(),
        }
    }

    /// Mutable access to operand slots that may hold temporaries.
    pub fn operands_mut(&mut self) -> Vec<&mut String> {
        match self {
            LirInst::Assign { args, .. } => args.iter_mut().collect(),
            LirInst::Call { args, .. } => args.iter_mut().map(|(_, a)| a).collect(),
            LirInst::Store { value, .. } => vec![value],
            LirInst::Jnz { cond, .. } => vec![cond],
            LirInst::Ret(Some(v)) => vec![v],
            _ => Vec::new(),
        }
    }

    /// Ends a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            LirInst::Jmp(_) | LirInst::Jnz { .. } | LirInst::Ret(_)
        )
    }

    /// Starts or ends a basic block.
    pub fn is_block_boundary(&self) -> bool {
        self.is_terminator()
            || matches!(
                self,
                LirInst::Label(_) | LirInst::FunctionStart(_) | LirInst::FunctionEnd
            )
    }
}

pub fn is_temp(s: &str) -> bool {
    s.starts_with('%')
}

/// Numeric literal operand: `5`, `-3`, `d_1.5`, `s_2`.
pub fn is_literal(s: &str) -> bool {
    if let Some(rest) = s.strip_prefix("d_").or_else(|| s.strip_prefix("s_")) {
        return !rest.is_empty();
    }
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for LirInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LirInst::Data(text) | LirInst::FunctionStart(text) | LirInst::Raw(text) => {
                write!(f, "{}", text)
            }
            LirInst::FunctionEnd => write!(f, "}}"),
            LirInst::Label(name) => write!(f, "{}", name),
            LirInst::Assign {
                dest,
                width,
                op,
                args,
            } => {
                write!(f, "\t{} ={} {}", dest, width, op)?;
                if !args.is_empty() {
                    write!(f, " {}", args.join(", "))?;
                }
                Ok(())
            }
            LirInst::Call { dest, callee, args } => {
                write!(f, "\t")?;
                if let Some((dest, width)) = dest {
                    write!(f, "{} ={} ", dest, width)?;
                }
                let args: Vec<String> = args.iter().map(|(w, a)| format!("{} {}", w, a)).collect();
                write!(f, "call {}({})", callee, args.join(", "))
            }
            LirInst::Store { width, value, addr } => {
                write!(f, "\tstore{} {}, {}", width, value, addr)
            }
            LirInst::Jmp(target) => write!(f, "\tjmp {}", target),
            LirInst::Jnz {
                cond,
                if_true,
                if_false,
            } => write!(f, "\tjnz {}, {}, {}", cond, if_true, if_false),
            LirInst::Ret(Some(v)) => write!(f, "\tret {}", v),
            LirInst::Ret(None) => write!(f, "\tret"),
            LirInst::Comment(text) => write!(f, "# {}", text),
            LirInst::Blank => Ok(()),
        }
    }
}

// ─── Text ↔ records ───────────────────────────────────────────────

pub fn render(insts: &[LirInst]) -> String {
    let mut out = String::new();
    for inst in insts {
        out.push_str(&inst.to_string());
        out.push('\n');
    }
    out
}

pub fn parse_text(text: &str) -> Vec<LirInst> {
    text.lines().map(parse_line).collect()
}

pub fn parse_line(raw: &str) -> LirInst {
    let line = raw.trim();
    if line.is_empty() {
        return LirInst::Blank;
    }
    if let Some(comment) = line.strip_prefix('#') {
        return LirInst::Comment(comment.trim().to_string());
    }
    if line.starts_with("data ") || line.starts_with("type ") {
        return LirInst::Data(line.to_string());
    }
    if line.contains("function ") && line.ends_with('{') {
        return LirInst::FunctionStart(line.to_string());
    }
    if line == "}" {
        return LirInst::FunctionEnd;
    }
    if line.starts_with('@') && !line.contains(char::is_whitespace) {
        return LirInst::Label(line.to_string());
    }
    parse_instruction(line).unwrap_or_else(|| LirInst::Raw(raw.to_string()))
}

fn split_args(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

/// `$f(l %a, d %b)` → callee and typed arguments.
fn parse_call(s: &str) -> Option<(String, Vec<(Width, String)>)> {
    let open = s.find('(')?;
    let inner = s[open + 1..].trim_end().strip_suffix(')')?;
    let callee = s[..open].trim().to_string();
    let mut args = Vec::new();
    for arg in split_args(inner) {
        let (ty, value) = arg.split_once(char::is_whitespace)?;
        args.push((Width::parse(ty)?, value.trim().to_string()));
    }
    Some((callee, args))
}

fn parse_instruction(line: &str) -> Option<LirInst> {
    if line.starts_with('%') {
        let (dest, rhs) = line.split_once('=')?;
        let rhs = rhs.trim_start();
        let (width, rest) = rhs.split_once(char::is_whitespace)?;
        let width = Width::parse(width)?;
        let rest = rest.trim();
        let (op, operands) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));
        let dest = dest.trim().to_string();
        if op == "call" {
            let (callee, args) = parse_call(operands)?;
            return Some(LirInst::Call {
                dest: Some((dest, width)),
                callee,
                args,
            });
        }
        return Some(LirInst::Assign {
            dest,
            width,
            op: op.to_string(),
            args: split_args(operands),
        });
    }

    let (op, operands) = line
        .split_once(char::is_whitespace)
        .map(|(o, r)| (o, r.trim()))
        .unwrap_or((line, ""));
    match op {
        "call" => {
            let (callee, args) = parse_call(operands)?;
            Some(LirInst::Call {
                dest: None,
                callee,
                args,
            })
        }
        "jmp" => Some(LirInst::Jmp(operands.to_string())),
        "jnz" => {
            let args = split_args(operands);
            match args.as_slice() {
                [cond, t, e] => Some(LirInst::Jnz {
                    cond: cond.clone(),
                    if_true: t.clone(),
                    if_false: e.clone(),
                }),
                _ => None,
            }
        }
        "ret" => Some(LirInst::Ret(
            (!operands.is_empty()).then(|| operands.to_string()),
        )),
        _ => {
            let width = Width::parse(op.strip_prefix("store")?)?;
            match split_args(operands).as_slice() {
                [value, addr] => Some(LirInst::Store {
                    width,
                    value: value.clone(),
                    addr: addr.clone(),
                }),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records() {
        assert_eq!(
            parse_line("\t%r3 =l add %r1, %r2"),
            LirInst::assign("%r3", Width::L, "add", &["%r1", "%r2"])
        );
        assert_eq!(
            parse_line("\t%r7 =d call $velox_tofloat(l %r6)"),
            LirInst::Call {
                dest: Some(("%r7".to_string(), Width::D)),
                callee: "$velox_tofloat".to_string(),
                args: vec![(Width::L, "%r6".to_string())],
            }
        );
        assert_eq!(
            parse_line("\tstored %r1, $var_x"),
            LirInst::Store {
                width: Width::D,
                value: "%r1".to_string(),
                addr: "$var_x".to_string(),
            }
        );
        assert_eq!(
            parse_line("\tjnz %r4, @ft0, @L2"),
            LirInst::Jnz {
                cond: "%r4".to_string(),
                if_true: "@ft0".to_string(),
                if_false: "@L2".to_string(),
            }
        );
        assert_eq!(parse_line("@start"), LirInst::Label("@start".to_string()));
        assert_eq!(parse_line("\tret 0"), LirInst::Ret(Some("0".to_string())));
        assert_eq!(
            parse_line("\tblit %a, %b, 8"),
            LirInst::Raw("\tblit %a, %b, 8".to_string())
        );
    }

    #[test]
    fn test_render_matches_input() {
        let text = "data $i0 = { l 2 }\n\nexport function w $main() {\n@start\n\t%r0 =l loadl $i0\n\t%r1 =l call $f(l %r0, d d_1.5)\n\tcall $velox_print(l %r1)\n\tjmp @L1\n@L1\n\tret 0\n}\n";
        assert_eq!(render(&parse_text(text)), text);
    }

    #[test]
    fn test_literals() {
        assert!(is_literal("42"));
        assert!(is_literal("-1"));
        assert!(is_literal("d_1.5"));
        assert!(!is_literal("%r1"));
        assert!(!is_literal("$i0"));
        assert!(!is_literal("-"));
        assert!(!is_literal("d_"));
    }
}
