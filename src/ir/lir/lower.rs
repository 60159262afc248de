//! Register IR → LIR lowering.
//!
//! Only `main` is translated. Pooled literals become `data` (floats
//! become immediate `copy d_<v>`), variables become `$var_NAME` slots,
//! and `print`/`input`/`toint`/`tofloat`/`pow`/`concat`/`repeat` become
//! calls into the runtime library. Register IR `ret` lines are skipped
//! and the function always closes with `ret 0`.

use std::collections::{HashMap, HashSet};

use crate::ast::{BinOp, UnaryOp};
use crate::ir::reg::parse::parse_program;
use crate::ir::reg::{escape_str, format_float, DataKind, DataLabel, DataValue, Reg, RegOp, RegProgram};

use super::{render, LirInst, Width};

/// Runtime library prefix used when none is configured.
pub const DEFAULT_RUNTIME_PREFIX: &str = "velox_";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowerOptions {
    pub runtime_prefix: String,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            runtime_prefix: DEFAULT_RUNTIME_PREFIX.to_string(),
        }
    }
}

pub fn lower_register_ir_to_target(text: &str) -> String {
    lower_register_ir_with(text, &LowerOptions::default())
}

pub fn lower_register_ir_with(text: &str, options: &LowerOptions) -> String {
    let parsed = parse_program(text);
    let mut out: Vec<LirInst> = parsed
        .diagnostics
        .iter()
        .map(|d| LirInst::Comment(format!("warning: {}", d.message)))
        .collect();
    out.extend(lower_program(&parsed.program, options));
    render(&out)
}

/// Lower a structured register program without going through text.
pub fn lower_program(program: &RegProgram, options: &LowerOptions) -> Vec<LirInst> {
    let var_widths = settle_var_widths(program, options);
    let mut lowering = Lowering::new(program, options, var_widths);
    for func in &program.functions {
        if func.name == "main" {
            for op in &func.body {
                lowering.lower_op(op);
            }
        } else {
            lowering
                .skipped
                .push(LirInst::Comment(format!("function {} not lowered", func.name)));
        }
    }
    lowering.finish()
}

/// Scan passes allowed before variable widths must agree.
const MAX_WIDTH_PASSES: usize = 4;

/// Width every store of a variable agrees on, or `None` when they disagree.
///
/// A load may precede the store that fixes its variable's width (a loop
/// condition read before the body's assignment), so `main` is lowered
/// repeatedly until the stored widths stop changing.
fn settle_var_widths(
    program: &RegProgram,
    options: &LowerOptions,
) -> HashMap<String, Option<Width>> {
    let main = program.functions.iter().find(|f| f.name == "main");
    let mut widths = HashMap::new();
    for _ in 0..MAX_WIDTH_PASSES {
        let mut scan = Lowering::new(program, options, widths.clone());
        for op in main.iter().flat_map(|f| &f.body) {
            scan.lower_op(op);
        }
        if scan.stored == widths {
            break;
        }
        widths = scan.stored;
    }
    widths
}

// ─── Lowering state ───────────────────────────────────────────────

struct Lowering<'a> {
    program: &'a RegProgram,
    prefix: &'a str,
    data: Vec<LirInst>,
    declared: HashSet<String>,
    skipped: Vec<LirInst>,
    body: Vec<LirInst>,
    widths: HashMap<Reg, Width>,
    var_widths: HashMap<String, Option<Width>>,
    stored: HashMap<String, Option<Width>>,
    warned: HashSet<String>,
    next_temp: u32,
    next_fallthrough: u32,
    next_dead: u32,
    terminated: bool,
}

fn reg(r: Reg) -> String {
    format!("%{}", r)
}

fn var_slot(name: &str) -> String {
    format!("$var_{}", name)
}

impl<'a> Lowering<'a> {
    fn new(
        program: &'a RegProgram,
        options: &'a LowerOptions,
        var_widths: HashMap<String, Option<Width>>,
    ) -> Self {
        Self {
            program,
            prefix: &options.runtime_prefix,
            data: Vec::new(),
            declared: HashSet::new(),
            skipped: Vec::new(),
            body: Vec::new(),
            widths: HashMap::new(),
            var_widths,
            stored: HashMap::new(),
            warned: HashSet::new(),
            next_temp: 0,
            next_fallthrough: 0,
            next_dead: 0,
            terminated: false,
        }
    }

    fn declare(&mut self, label: String, text: String) {
        if self.declared.insert(label) {
            self.data.push(LirInst::Data(text));
        }
    }

    fn declare_data(&mut self, label: DataLabel) -> Option<&'a DataValue> {
        let program = self.program;
        let decl = program.data_decl(label)?;
        match &decl.value {
            DataValue::Int(v) => self.declare(label.to_string(), format!("data {} = {{ l {} }}", label, v)),
            DataValue::Str(s) if s.is_empty() => {
                self.declare(label.to_string(), format!("data {} = {{ l 0, b 0 }}", label))
            }
            DataValue::Str(s) => self.declare(
                label.to_string(),
                format!(
                    "data {} = {{ l {}, b \"{}\", b 0 }}",
                    label,
                    s.len(),
                    escape_str(s)
                ),
            ),
            DataValue::Float(_) => {}
        }
        Some(&decl.value)
    }

    fn declare_var(&mut self, name: &str) -> String {
        let slot = var_slot(name);
        self.declare(slot.clone(), format!("data {} = {{ l 0 }}", slot));
        slot
    }

    fn width(&self, r: Reg) -> Width {
        self.widths.get(&r).copied().unwrap_or(Width::L)
    }

    fn fresh_temp(&mut self) -> String {
        let t = format!("%t{}", self.next_temp);
        self.next_temp += 1;
        t
    }

    fn emit(&mut self, inst: LirInst) {
        if self.terminated && !matches!(inst, LirInst::Label(_)) {
            let label = format!("@dead{}", self.next_dead);
            self.next_dead += 1;
            self.body.push(LirInst::Label(label));
        }
        self.terminated = inst.is_terminator();
        self.body.push(inst);
    }

    fn define(&mut self, dst: Reg, width: Width, op: &str, args: Vec<String>) {
        self.widths.insert(dst, width);
        self.emit(LirInst::Assign {
            dest: reg(dst),
            width,
            op: op.to_string(),
            args,
        });
    }

    /// Operand of `r` at width `want`, converting integers with `sltof`.
    fn operand(&mut self, r: Reg, want: Width) -> String {
        if want == Width::D && self.width(r) != Width::D {
            let t = self.fresh_temp();
            self.emit(LirInst::assign(&t, Width::D, "sltof", &[reg(r).as_str()]));
            return t;
        }
        reg(r)
    }

    /// Load width of a variable; `l` unless every store agrees.
    fn var_width(&mut self, name: &str) -> Width {
        match self.var_widths.get(name) {
            Some(Some(width)) => *width,
            Some(None) => {
                if self.warned.insert(name.to_string()) {
                    self.body.push(LirInst::Comment(format!(
                        "warning: variable {} is stored with mixed widths",
                        name
                    )));
                }
                Width::L
            }
            None => Width::L,
        }
    }

    fn runtime(&self, name: &str) -> String {
        format!("${}{}", self.prefix, name)
    }

    // ─── Instructions ─────────────────────────────────────────────

    fn lower_op(&mut self, op: &RegOp) {
        match op {
            RegOp::LoadData { dst, data } => self.lower_load_data(*dst, *data),
            RegOp::LoadName { dst, name } => {
                let slot = self.declare_var(name);
                let width = self.var_width(name);
                self.define(*dst, width, &format!("load{}", width), vec![slot]);
            }
            RegOp::StoreName { name, src } => {
                let slot = self.declare_var(name);
                let width = self.width(*src);
                self.var_width(name);
                self.stored
                    .entry(name.clone())
                    .and_modify(|w| {
                        if *w != Some(width) {
                            *w = None;
                        }
                    })
                    .or_insert(Some(width));
                self.emit(LirInst::Store {
                    width,
                    value: reg(*src),
                    addr: slot,
                });
            }
            RegOp::Binary { op, dst, lhs, rhs } => self.lower_binary(*op, *dst, *lhs, *rhs),
            RegOp::Unary { op, dst, src } => {
                let width = self.width(*src);
                let mnemonic = match op {
                    UnaryOp::Neg => "neg",
                    UnaryOp::Pos => "copy",
                };
                self.define(*dst, width, mnemonic, vec![reg(*src)]);
            }
            RegOp::Call { dst, callee, args } => self.lower_call(*dst, callee, args),
            RegOp::Jump(label) => self.emit(LirInst::Jmp(label.to_string())),
            RegOp::JumpIfFalse { cond, target } => {
                let cond = if self.width(*cond) == Width::D {
                    let t = self.fresh_temp();
                    self.emit(LirInst::assign(&t, Width::L, "cned", &[reg(*cond).as_str(), "d_0"]));
                    t
                } else {
                    reg(*cond)
                };
                let fallthrough = format!("@ft{}", self.next_fallthrough);
                self.next_fallthrough += 1;
                self.emit(LirInst::Jnz {
                    cond,
                    if_true: fallthrough.clone(),
                    if_false: target.to_string(),
                });
                self.emit(LirInst::Label(fallthrough));
            }
            RegOp::Label(label) => self.emit(LirInst::Label(label.to_string())),
            RegOp::Break => self.emit(LirInst::Comment("unsupported: break".to_string())),
            RegOp::Continue => self.emit(LirInst::Comment("unsupported: continue".to_string())),
            RegOp::Ret(_) => {}
            RegOp::Comment(text) => self.body.push(LirInst::Comment(text.clone())),
        }
    }

    fn lower_load_data(&mut self, dst: Reg, label: DataLabel) {
        match (label.kind, self.declare_data(label)) {
            (DataKind::Int, Some(_)) => self.define(dst, Width::L, "loadl", vec![label.to_string()]),
            (DataKind::Str, Some(_)) => {
                self.define(dst, Width::L, "add", vec![label.to_string(), "8".to_string()])
            }
            (DataKind::Float, Some(DataValue::Float(v))) => {
                self.define(dst, Width::D, "copy", vec![format!("d_{}", format_float(*v))])
            }
            _ => {
                self.body
                    .push(LirInst::Comment(format!("unknown data label {}", label)));
                self.define(dst, Width::L, "copy", vec!["0".to_string()]);
            }
        }
    }

    fn lower_binary(&mut self, op: BinOp, dst: Reg, lhs: Reg, rhs: Reg) {
        let width = if self.width(lhs) == Width::D || self.width(rhs) == Width::D {
            Width::D
        } else {
            Width::L
        };

        match op {
            BinOp::Concat | BinOp::Repeat => {
                let callee = self.runtime(op.mnemonic());
                self.call(Some((dst, Width::L)), callee, vec![lhs, rhs]);
            }
            BinOp::Pow => {
                let name = if width == Width::D { "powf" } else { "pow" };
                let args = vec![
                    (width, self.operand(lhs, width)),
                    (width, self.operand(rhs, width)),
                ];
                self.widths.insert(dst, width);
                let callee = self.runtime(name);
                self.emit(LirInst::Call {
                    dest: Some((reg(dst), width)),
                    callee,
                    args,
                });
            }
            _ => {
                let a = self.operand(lhs, width);
                let b = self.operand(rhs, width);
                if op.is_comparison() {
                    let mnemonic = comparison(op, width);
                    self.define(dst, Width::L, &mnemonic, vec![a, b]);
                } else {
                    let mnemonic = if op == BinOp::Mod { "rem" } else { op.mnemonic() };
                    self.define(dst, width, mnemonic, vec![a, b]);
                }
            }
        }
    }

    fn lower_call(&mut self, dst: Option<Reg>, callee: &str, args: &[Reg]) {
        let (callee, width) = match callee {
            "print" | "input" | "toint" => (self.runtime(callee), Width::L),
            "tofloat" => (self.runtime(callee), Width::D),
            name => (format!("${}", name), Width::L),
        };
        self.call(dst.map(|d| (d, width)), callee, args.to_vec());
    }

    fn call(&mut self, dest: Option<(Reg, Width)>, callee: String, args: Vec<Reg>) {
        let args = args.into_iter().map(|a| (self.width(a), reg(a))).collect();
        if let Some((d, w)) = dest {
            self.widths.insert(d, w);
        }
        self.emit(LirInst::Call {
            dest: dest.map(|(d, w)| (reg(d), w)),
            callee,
            args,
        });
    }

    fn finish(mut self) -> Vec<LirInst> {
        self.emit(LirInst::Ret(Some("0".to_string())));

        let mut out = self.data;
        if !out.is_empty() {
            out.push(LirInst::Blank);
        }
        out.append(&mut self.skipped);
        out.push(LirInst::FunctionStart("export function w $main() {".to_string()));
        out.push(LirInst::Label("@start".to_string()));
        out.append(&mut self.body);
        out.push(LirInst::FunctionEnd);
        out
    }
}

/// Type-suffixed comparison mnemonic (`csltl`, `cled`, ...).
fn comparison(op: BinOp, width: Width) -> String {
    let base = match (op, width.is_float()) {
        (BinOp::Eq, _) => "eq",
        (BinOp::Ne, _) => "ne",
        (BinOp::Lt, false) => "slt",
        (BinOp::Le, false) => "sle",
        (BinOp::Gt, false) => "sgt",
        (BinOp::Ge, false) => "sge",
        (BinOp::Lt, true) => "lt",
        (BinOp::Le, true) => "le",
        (BinOp::Gt, true) => "gt",
        _ => "ge",
    };
    format!("c{}{}", base, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, Program, Stmt};
    use crate::ir::reg::builder::lower_to_register_ir;

    fn lower_tree(stmts: Vec<Stmt>) -> String {
        lower_register_ir_to_target(&lower_to_register_ir(&Program { stmts }))
    }

    #[test]
    fn test_assign_add_print() {
        let out = lower_tree(vec![
            Stmt::assign("x", Expr::int(2)),
            Stmt::assign(
                "y",
                Expr::binary(BinOp::Add, Expr::ident("x"), Expr::int(3)),
            ),
            Stmt::print(Expr::ident("y")),
        ]);
        assert_eq!(
            out,
            "data $i0 = { l 2 }\n\
             data $var_x = { l 0 }\n\
             data $i1 = { l 3 }\n\
             data $var_y = { l 0 }\n\
             \n\
             export function w $main() {\n\
             @start\n\
             \t%r0 =l loadl $i0\n\
             \tstorel %r0, $var_x\n\
             \t%r2 =l loadl $var_x\n\
             \t%r1 =l loadl $i1\n\
             \t%r3 =l add %r2, %r1\n\
             \tstorel %r3, $var_y\n\
             \t%r4 =l loadl $var_y\n\
             \tcall $velox_print(l %r4)\n\
             \tret 0\n\
             }\n"
        );
    }

    #[test]
    fn test_strings_are_length_prefixed() {
        let out = lower_tree(vec![
            Stmt::print(Expr::str("hi\n")),
            Stmt::print(Expr::str("hi\n")),
        ]);
        assert_eq!(out.matches("data $s0").count(), 1);
        assert!(out.contains("data $s0 = { l 3, b \"hi\\n\", b 0 }"));
        assert!(out.contains("\t%r0 =l add $s0, 8\n"));
    }

    #[test]
    fn test_floats_are_immediates_and_mixed_ops_convert() {
        let out = lower_tree(vec![
            Stmt::assign("x", Expr::float(1.5)),
            Stmt::print(Expr::binary(BinOp::Mul, Expr::ident("x"), Expr::int(2))),
            Stmt::print(Expr::binary(BinOp::Lt, Expr::int(1), Expr::ident("x"))),
        ]);
        assert!(!out.contains("data $f"));
        assert!(out.contains("=d copy d_1.5"));
        assert!(out.contains("stored %r0, $var_x"));
        assert!(out.contains("=d loadd $var_x"));
        assert!(out.contains("=d sltof %r"));
        assert!(out.contains("=d mul %r"));
        assert!(out.contains("=l cltd %t"));
    }

    #[test]
    fn test_loop_condition_load_uses_the_stored_width() {
        let out = lower_tree(vec![Stmt::While {
            cond: Expr::binary(BinOp::Lt, Expr::ident("x"), Expr::int(2)),
            body: vec![Stmt::assign(
                "x",
                Expr::binary(BinOp::Add, Expr::ident("x"), Expr::float(0.5)),
            )],
        }]);
        assert!(out.contains("=d loadd $var_x"));
        assert!(!out.contains("loadl $var_x"));
        assert!(!out.contains("warning"));
    }

    #[test]
    fn test_mixed_width_stores_fall_back_to_long() {
        let out = lower_tree(vec![
            Stmt::assign("i", Expr::int(0)),
            Stmt::While {
                cond: Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::int(3)),
                body: vec![Stmt::assign(
                    "i",
                    Expr::binary(BinOp::Add, Expr::ident("i"), Expr::float(0.5)),
                )],
            },
        ]);
        assert!(out.contains("=l loadl $var_i"));
        assert!(!out.contains("loadd $var_i"));
        assert_eq!(
            out.matches("# warning: variable i is stored with mixed widths").count(),
            1
        );
    }

    #[test]
    fn test_branches_get_fallthrough_and_dead_labels() {
        let out = lower_tree(vec![Stmt::While {
            cond: Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::int(3)),
            body: vec![Stmt::Break, Stmt::print(Expr::int(1))],
        }]);
        assert!(out.contains("=l csltl %r"));
        assert!(out.contains("\tjnz %r"));
        assert!(out.contains("@ft0\n"));
        assert!(out.contains("@dead0\n"));
        assert!(out.contains("\tjmp @L"));
        assert!(out.trim_end().ends_with("\tret 0\n}"));
    }

    #[test]
    fn test_only_main_is_lowered() {
        let out = lower_tree(vec![
            Stmt::function("f", &["a"], vec![Stmt::Return(Some(Expr::ident("a")))]),
            Stmt::Expr(Expr::call("f", vec![Expr::int(1)])),
        ]);
        assert!(out.contains("# function f not lowered"));
        assert!(out.contains("\tcall $f(l %r"));
        assert_eq!(out.matches("function w").count(), 1);
    }

    #[test]
    fn test_runtime_entries_and_prefix() {
        let text = lower_to_register_ir(&Program {
            stmts: vec![
                Stmt::assign("n", Expr::ToInt(Box::new(Expr::Input(None)))),
                Stmt::print(Expr::binary(BinOp::Pow, Expr::ident("n"), Expr::int(2))),
                Stmt::print(Expr::binary(BinOp::Mod, Expr::ident("n"), Expr::int(2))),
                Stmt::print(Expr::binary(BinOp::Concat, Expr::str("n="), Expr::ident("n"))),
            ],
        });
        let out = lower_register_ir_with(
            &text,
            &LowerOptions {
                runtime_prefix: "rt_".to_string(),
            },
        );
        assert!(out.contains("=l call $rt_input()"));
        assert!(out.contains("=l call $rt_toint(l %r"));
        assert!(out.contains("=l call $rt_pow(l %r"));
        assert!(out.contains("=l rem %r"));
        assert!(out.contains("=l call $rt_concat(l %r"));
        assert!(!out.contains("velox_"));
    }

    #[test]
    fn test_malformed_input_is_reported_inline() {
        let out = lower_register_ir_to_target("function main() {\n    r1 = frobnicate r2\n}\n");
        assert!(out.starts_with("# warning: "));
        assert!(out.contains("# malformed: "));
        assert!(out.contains("\tret 0\n"));
    }
}
