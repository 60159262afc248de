//! Register IR text → `RegProgram`.
//!
//! The liveness pass, the low-level lowering and the native emitter all
//! read register IR through this module. A line that does not fit the
//! grammar never aborts parsing: inside a function it becomes a
//! `malformed:` comment in place, and every such line is reported as a
//! warning with the span of the offending line.

use crate::ast::{BinOp, UnaryOp};
use crate::diagnostic::Diagnostic;
use crate::span::Span;

use super::{
    is_ident, unescape_str, DataDecl, DataLabel, DataValue, Function, Label, Reg, RegOp,
    RegProgram,
};

/// One classified line of register IR.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Blank,
    Comment(String),
    Data(DataDecl),
    FunctionStart { name: String, params: Vec<Reg> },
    FunctionEnd,
    Op(RegOp),
}

/// Parse result: the program plus one warning per line that was skipped
/// or replaced.
#[derive(Debug, Clone, Default)]
pub struct Parsed {
    pub program: RegProgram,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse_program(text: &str) -> Parsed {
    let mut parsed = Parsed::default();
    let mut current: Option<Function> = None;

    for (index, raw) in text.lines().enumerate() {
        let line = match parse_line(raw) {
            Ok(line) => line,
            Err(message) => {
                parsed.diagnostics.push(
                    Diagnostic::warning(message.clone(), Span::of_line(text, index))
                        .with_note(format!("line {}: `{}`", index + 1, raw.trim())),
                );
                if let Some(func) = current.as_mut() {
                    func.body
                        .push(RegOp::Comment(format!("malformed: {}", raw.trim())));
                }
                continue;
            }
        };

        match line {
            Line::Blank | Line::Comment(_) => {}
            Line::Data(decl) => parsed.program.data.push(decl),
            Line::FunctionStart { name, params } => {
                if let Some(open) = current.take() {
                    parsed.diagnostics.push(Diagnostic::warning(
                        format!("function '{}' is not closed before '{}'", open.name, name),
                        Span::of_line(text, index),
                    ));
                    parsed.program.functions.push(open);
                }
                current = Some(Function {
                    name,
                    params,
                    body: Vec::new(),
                });
            }
            Line::FunctionEnd => match current.take() {
                Some(func) => parsed.program.functions.push(func),
                None => parsed.diagnostics.push(Diagnostic::warning(
                    "closing brace outside of a function".to_string(),
                    Span::of_line(text, index),
                )),
            },
            Line::Op(op) => match current.as_mut() {
                Some(func) => func.body.push(op),
                None => parsed.diagnostics.push(
                    Diagnostic::warning(
                        "instruction outside of a function".to_string(),
                        Span::of_line(text, index),
                    )
                    .with_help("instructions must appear between `function ... {` and `}`".to_string()),
                ),
            },
        }
    }

    if let Some(open) = current.take() {
        parsed.diagnostics.push(Diagnostic::warning(
            format!("function '{}' is not closed", open.name),
            Span::new(text.len() as u32, text.len() as u32),
        ));
        parsed.program.functions.push(open);
    }

    parsed
}

/// Classify and parse a single line.
pub fn parse_line(raw: &str) -> Result<Line, String> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(Line::Blank);
    }
    if let Some(comment) = line.strip_prefix(';') {
        return Ok(Line::Comment(comment.trim().to_string()));
    }
    if line == "}" {
        return Ok(Line::FunctionEnd);
    }
    if let Some(rest) = line.strip_prefix("data ") {
        return parse_data(rest).map(Line::Data);
    }
    if let Some(rest) = line.strip_prefix("function ") {
        return parse_function_start(rest);
    }
    parse_op(line).map(Line::Op)
}

fn parse_data(rest: &str) -> Result<DataDecl, String> {
    let (label, body) = rest
        .split_once('=')
        .ok_or_else(|| format!("expected `=` in data declaration `{}`", rest))?;
    let label = DataLabel::parse(label.trim())
        .ok_or_else(|| format!("bad data label `{}`", label.trim()))?;
    let body = body.trim();
    let inner = body
        .strip_prefix('{')
        .and_then(|b| b.strip_suffix('}'))
        .ok_or_else(|| format!("expected `{{ ... }}` in data declaration `{}`", body))?
        .trim();

    let value = if let Some(quoted) = inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        DataValue::Str(unescape_str(quoted))
    } else if let Some(v) = inner.strip_prefix("i64 ") {
        DataValue::Int(
            v.trim()
                .parse()
                .map_err(|_| format!("bad integer literal `{}`", v.trim()))?,
        )
    } else if let Some(v) = inner.strip_prefix("f64 ") {
        DataValue::Float(
            v.trim()
                .parse()
                .map_err(|_| format!("bad float literal `{}`", v.trim()))?,
        )
    } else {
        return Err(format!("unknown data payload `{}`", inner));
    };

    if value.kind() != label.kind {
        return Err(format!("data label {} does not match its payload", label));
    }
    Ok(DataDecl { label, value })
}

fn parse_function_start(rest: &str) -> Result<Line, String> {
    let rest = rest
        .trim()
        .strip_suffix('{')
        .ok_or_else(|| "expected `{` after function header".to_string())?
        .trim();
    let (name, params) = split_call(rest)?;
    Ok(Line::FunctionStart {
        name: name.to_string(),
        params,
    })
}

/// `name(r1, r2)` → name and argument registers.
fn split_call(s: &str) -> Result<(&str, Vec<Reg>), String> {
    let open = s
        .find('(')
        .ok_or_else(|| format!("expected `(` in `{}`", s))?;
    let inner = s[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| format!("expected `)` at end of `{}`", s))?;
    let name = s[..open].trim();
    if !is_ident(name) {
        return Err(format!("bad function name `{}`", name));
    }
    let mut regs = Vec::new();
    for arg in inner.split(',').map(str::trim).filter(|a| !a.is_empty()) {
        regs.push(reg(arg)?);
    }
    Ok((name, regs))
}

fn reg(s: &str) -> Result<Reg, String> {
    Reg::parse(s.trim()).ok_or_else(|| format!("expected a register, found `{}`", s.trim()))
}

fn label(s: &str) -> Result<Label, String> {
    Label::parse(s.trim()).ok_or_else(|| format!("expected a label, found `{}`", s.trim()))
}

fn name(s: &str) -> Result<String, String> {
    let s = s.trim();
    if is_ident(s) {
        Ok(s.to_string())
    } else {
        Err(format!("expected a variable name, found `{}`", s))
    }
}

/// `a, b` → (a, b).
fn pair(s: &str) -> Result<(&str, &str), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two operands in `{}`", s))?;
    Ok((a.trim(), b.trim()))
}

fn parse_op(line: &str) -> Result<RegOp, String> {
    if line.starts_with('@') {
        let name = line
            .strip_suffix(':')
            .ok_or_else(|| format!("label `{}` must end with `:`", line))?;
        return label(name).map(RegOp::Label);
    }

    // `rN = opcode operands`
    if let Some((lhs, rhs)) = line.split_once('=') {
        if let Some(dst) = Reg::parse(lhs.trim()) {
            return parse_def(dst, rhs.trim());
        }
    }

    let (opcode, operands) = match line.split_once(char::is_whitespace) {
        Some((op, rest)) => (op, rest.trim()),
        None => (line, ""),
    };
    match opcode {
        "store_name" => {
            let (var, src) = pair(operands)?;
            Ok(RegOp::StoreName {
                name: name(var)?,
                src: reg(src)?,
            })
        }
        "call" => {
            let (callee, args) = split_call(operands)?;
            Ok(RegOp::Call {
                dst: None,
                callee: callee.to_string(),
                args,
            })
        }
        "jmp" => label(operands).map(RegOp::Jump),
        "jmp_if_false" => {
            let (cond, target) = pair(operands)?;
            Ok(RegOp::JumpIfFalse {
                cond: reg(cond)?,
                target: label(target)?,
            })
        }
        "ret" => match operands {
            "" | "0" => Ok(RegOp::Ret(None)),
            value => reg(value).map(|r| RegOp::Ret(Some(r))),
        },
        "break" if operands.is_empty() => Ok(RegOp::Break),
        "continue" if operands.is_empty() => Ok(RegOp::Continue),
        _ => Err(format!("unknown instruction `{}`", line)),
    }
}

fn parse_def(dst: Reg, rhs: &str) -> Result<RegOp, String> {
    let (opcode, operands) = match rhs.split_once(char::is_whitespace) {
        Some((op, rest)) => (op, rest.trim()),
        None => (rhs, ""),
    };
    match opcode {
        "load_data" => {
            let data = DataLabel::parse(operands)
                .ok_or_else(|| format!("bad data label `{}`", operands))?;
            Ok(RegOp::LoadData { dst, data })
        }
        "load_name" => Ok(RegOp::LoadName {
            dst,
            name: name(operands)?,
        }),
        "call" => {
            let (callee, args) = split_call(operands)?;
            Ok(RegOp::Call {
                dst: Some(dst),
                callee: callee.to_string(),
                args,
            })
        }
        _ => {
            if let Some(op) = UnaryOp::from_mnemonic(opcode) {
                return Ok(RegOp::Unary {
                    op,
                    dst,
                    src: reg(operands)?,
                });
            }
            if let Some(op) = BinOp::from_mnemonic(opcode) {
                let (lhs, rhs) = pair(operands)?;
                return Ok(RegOp::Binary {
                    op,
                    dst,
                    lhs: reg(lhs)?,
                    rhs: reg(rhs)?,
                });
            }
            Err(format!("unknown opcode `{}`", opcode))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::reg::DataKind;

    const SAMPLE: &str = r#"; velox register ir
data $i0 = { i64 2 }
data $s1 = { "a \"b\"" }
data $f2 = { f64 1.5 }

function twice(r3) {
    store_name a, r3
    r4 = load_name a
    r5 = add r4, r4
    ret r5
}

function main() {
    r0 = load_data $i0
    r6 = call twice(r0)
    call print(r6)
  @L1:
    jmp_if_false r6, @L1
    ret
}
"#;

    #[test]
    fn test_parse_sample() {
        let parsed = parse_program(SAMPLE);
        assert!(parsed.diagnostics.is_empty());
        let program = parsed.program;
        assert_eq!(program.data.len(), 3);
        assert_eq!(program.data[1].value, DataValue::Str("a \"b\"".to_string()));
        assert_eq!(program.data[2].label.kind, DataKind::Float);
        assert_eq!(program.functions.len(), 2);

        let twice = program.function("twice").unwrap();
        assert_eq!(twice.params, vec![Reg(3)]);
        assert_eq!(twice.body.len(), 4);
        assert_eq!(twice.body[3], RegOp::Ret(Some(Reg(5))));

        let main = program.function("main").unwrap();
        assert_eq!(
            main.body[1],
            RegOp::Call {
                dst: Some(Reg(6)),
                callee: "twice".to_string(),
                args: vec![Reg(0)],
            }
        );
        assert_eq!(main.body[3], RegOp::Label(Label::numbered(1)));
        assert_eq!(main.body[5], RegOp::Ret(None));
    }

    #[test]
    fn test_render_parses_back() {
        let program = parse_program(SAMPLE).program;
        let again = parse_program(&program.to_string());
        assert!(again.diagnostics.is_empty());
        assert_eq!(again.program, program);
    }

    #[test]
    fn test_malformed_line_becomes_comment() {
        let text = "function main() {\n    r1 = frobnicate r2\n    ret\n}\n";
        let parsed = parse_program(text);
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].span, Span::new(18, 40));
        let main = parsed.program.function("main").unwrap();
        assert_eq!(
            main.body[0],
            RegOp::Comment("malformed: r1 = frobnicate r2".to_string())
        );
        assert_eq!(main.body[1], RegOp::Ret(None));
    }

    #[test]
    fn test_stray_instruction_is_reported() {
        let parsed = parse_program("r1 = load_name x\nfunction main() {\n}\n");
        assert_eq!(parsed.diagnostics.len(), 1);
        assert!(parsed.program.function("main").unwrap().body.is_empty());
    }

    #[test]
    fn test_legacy_forms() {
        assert_eq!(parse_line("    ret 0"), Ok(Line::Op(RegOp::Ret(None))));
        assert_eq!(parse_line("break"), Ok(Line::Op(RegOp::Break)));
        assert_eq!(
            parse_line("r2 = copy r1"),
            Ok(Line::Op(RegOp::Unary {
                op: UnaryOp::Pos,
                dst: Reg(2),
                src: Reg(1),
            }))
        );
        assert!(parse_line("store_name 9x, r1").is_err());
        assert!(parse_line("data $i0 = { f64 1.0 }").is_err());
    }
}
