//! Native IR — LLVM text emitted directly from register IR.
//!
//! Independent of the LIR path. Every function block is emitted, each
//! variable becomes one `i64` global, and pooled literals become private
//! constants loaded once in the entry block. A `RegTypes` table tracks
//! what each register holds so `print` can pick `puts` or `printf` and
//! arithmetic can pick integer or floating-point instructions. Registers
//! of unknown type produce a `; warning:` line instead of code.

pub mod types;

#[cfg(test)]
mod tests;

pub use types::{RegType, RegTypes};

use std::collections::{HashMap, HashSet};

use crate::ast::{BinOp, UnaryOp};
use crate::ir::lir::lower::DEFAULT_RUNTIME_PREFIX;
use crate::ir::reg::parse::parse_program;
use crate::ir::reg::{DataDecl, DataKind, DataLabel, DataValue, Function, Reg, RegOp, RegProgram};

/// Target triple used when none is configured.
pub const DEFAULT_TRIPLE: &str = "x86_64-pc-linux-gnu";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeOptions {
    pub triple: String,
    pub runtime_prefix: String,
}

impl Default for NativeOptions {
    fn default() -> Self {
        Self {
            triple: DEFAULT_TRIPLE.to_string(),
            runtime_prefix: DEFAULT_RUNTIME_PREFIX.to_string(),
        }
    }
}

pub fn emit_native_ir(text: &str) -> String {
    emit_native_ir_with(text, &NativeOptions::default())
}

pub fn emit_native_ir_with(text: &str, options: &NativeOptions) -> String {
    let parsed = parse_program(text);
    let warnings: Vec<String> = parsed.diagnostics.iter().map(|d| d.message.clone()).collect();
    NativeEmitter::new(&parsed.program, options).emit(&warnings)
}

/// Emit a structured register program without going through text.
pub fn emit_program(program: &RegProgram, options: &NativeOptions) -> String {
    NativeEmitter::new(program, options).emit(&[])
}

// ─── Module level ─────────────────────────────────────────────────

fn reg(r: Reg) -> String {
    format!("%{}", r)
}

fn global(label: DataLabel) -> String {
    let kind = match label.kind {
        DataKind::Str => "str",
        DataKind::Int => "i64",
        DataKind::Float => "f64",
    };
    format!("@.{}.{}", kind, label.id)
}

/// LLVM `c"..."` body: printable ASCII verbatim, everything else `\XX`.
fn llvm_bytes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if (b == b' ' || b.is_ascii_graphic()) && b != b'"' && b != b'\\' {
            out.push(b as char);
        } else {
            out.push_str(&format!("\\{:02X}", b));
        }
    }
    out
}

fn constant(decl: &DataDecl) -> String {
    let name = global(decl.label);
    match &decl.value {
        DataValue::Str(s) => format!(
            "{} = private constant [{} x i8] c\"{}\\00\"",
            name,
            s.len() + 1,
            llvm_bytes(s)
        ),
        DataValue::Int(v) => format!("{} = private constant i64 {}", name, v),
        DataValue::Float(v) => format!("{} = private constant double 0x{:016X}", name, v.to_bits()),
    }
}

/// Variable names in first-reference order across all functions.
fn variables(program: &RegProgram) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for op in program.functions.iter().flat_map(|f| &f.body) {
        let name = match op {
            RegOp::LoadName { name, .. } | RegOp::StoreName { name, .. } => name.as_str(),
            _ => continue,
        };
        if seen.insert(name) {
            names.push(name);
        }
    }
    names
}

struct NativeEmitter<'a> {
    program: &'a RegProgram,
    prefix: &'a str,
    triple: &'a str,
    /// User functions by name, with their parameter count.
    defined: HashMap<&'a str, usize>,
    /// Type of the value last stored into each variable.
    var_types: HashMap<String, RegType>,

    types: RegTypes,
    body: Vec<String>,
    next_temp: u32,
    next_block: u32,
    terminated: bool,
}

impl<'a> NativeEmitter<'a> {
    fn new(program: &'a RegProgram, options: &'a NativeOptions) -> Self {
        Self {
            program,
            prefix: &options.runtime_prefix,
            triple: &options.triple,
            defined: program
                .functions
                .iter()
                .map(|f| (f.name.as_str(), f.params.len()))
                .collect(),
            var_types: HashMap::new(),
            types: RegTypes::new(),
            body: Vec::new(),
            next_temp: 0,
            next_block: 0,
            terminated: false,
        }
    }

    fn emit(mut self, warnings: &[String]) -> String {
        let program = self.program;
        let p = self.prefix;
        let mut out = vec!["; velox native ir".to_string()];
        out.extend(warnings.iter().map(|w| format!("; warning: {}", w)));
        out.push(String::new());
        out.push(format!("target triple = \"{}\"", self.triple));
        out.push(String::new());
        out.extend([
            "declare i32 @printf(ptr, ...)".to_string(),
            "declare i32 @puts(ptr)".to_string(),
            "declare i32 @strcmp(ptr, ptr)".to_string(),
            "declare double @llvm.pow.f64(double, double)".to_string(),
            format!("declare ptr @{}input()", p),
            format!("declare void @{}prompt(ptr)", p),
            format!("declare i64 @{}str_toint(ptr)", p),
            format!("declare double @{}str_tofloat(ptr)", p),
            format!("declare ptr @{}i64_to_str(i64)", p),
            format!("declare ptr @{}f64_to_str(double)", p),
            format!("declare ptr @{}concat(ptr, ptr)", p),
            format!("declare ptr @{}repeat(ptr, i64)", p),
            format!("declare i64 @{}pow(i64, i64)", p),
        ]);
        out.push(String::new());
        out.push("@.fmt_i64 = private constant [6 x i8] c\"%lld\\0A\\00\"".to_string());
        out.push("@.fmt_f64 = private constant [4 x i8] c\"%g\\0A\\00\"".to_string());
        out.extend(variables(program).into_iter().map(|name| format!("@.{} = global i64 0", name)));
        out.extend(program.data.iter().map(constant));

        for func in &program.functions {
            out.push(String::new());
            out.extend(self.function(func));
        }

        let mut text = out.join("\n");
        text.push('\n');
        text
    }

    // ─── Function level ───────────────────────────────────────────

    fn function(&mut self, func: &Function) -> Vec<String> {
        self.types.clear();
        self.body.clear();
        self.next_temp = 0;
        self.next_block = 0;
        self.terminated = false;

        let params: Vec<String> = func.params.iter().map(|p| format!("i64 {}", reg(*p))).collect();
        for p in &func.params {
            self.types.set(*p, RegType::Int);
        }

        self.hoist_data(func);
        for op in &func.body {
            self.op(op);
        }
        if !self.terminated {
            self.terminate("ret i32 0".to_string());
        }

        let mut lines = vec![
            format!("define i32 @{}({}) {{", func.name, params.join(", ")),
            "entry:".to_string(),
        ];
        lines.append(&mut self.body);
        lines.push("}".to_string());
        lines
    }

    /// Materialize each pooled register once, at entry.
    fn hoist_data(&mut self, func: &Function) {
        let mut hoisted: HashMap<Reg, DataLabel> = HashMap::new();
        for op in &func.body {
            if let RegOp::LoadData { dst, data } = op {
                match hoisted.get(dst) {
                    Some(prev) if prev != data => {
                        self.warn(format!("{} reloaded from {} after {}", dst, data, prev))
                    }
                    Some(_) => {}
                    None => {
                        hoisted.insert(*dst, *data);
                        self.load_data(*dst, *data);
                    }
                }
            }
        }
    }

    fn inst(&mut self, text: String) {
        if self.terminated {
            let name = format!("dead.{}", self.next_block);
            self.next_block += 1;
            self.body.push(format!("{}:", name));
            self.terminated = false;
        }
        self.body.push(format!("  {}", text));
    }

    fn terminate(&mut self, text: String) {
        self.inst(text);
        self.terminated = true;
    }

    fn block(&mut self, name: &str) {
        if !self.terminated {
            self.body.push(format!("  br label %{}", name));
        }
        self.body.push(format!("{}:", name));
        self.terminated = false;
    }

    fn warn(&mut self, msg: String) {
        self.body.push(format!("  ; warning: {}", msg));
    }

    fn temp(&mut self) -> String {
        let t = format!("%t{}", self.next_temp);
        self.next_temp += 1;
        t
    }

    /// Known type of `r`, or a warning.
    fn typed(&mut self, r: Reg) -> Option<RegType> {
        match self.types.get(r) {
            RegType::Unknown => {
                self.warn(format!("register {} has no known type", r));
                None
            }
            ty => Some(ty),
        }
    }

    // ─── Conversions ──────────────────────────────────────────────

    fn as_i64(&mut self, r: Reg, ty: RegType) -> String {
        let (cast, from) = match ty {
            RegType::Float => ("bitcast", "double"),
            RegType::Str => ("ptrtoint", "ptr"),
            _ => return reg(r),
        };
        let t = self.temp();
        self.inst(format!("{} = {} {} {} to i64", t, cast, from, reg(r)));
        t
    }

    fn as_double(&mut self, r: Reg, ty: RegType) -> String {
        if ty == RegType::Float {
            return reg(r);
        }
        let t = self.temp();
        self.inst(format!("{} = sitofp i64 {} to double", t, reg(r)));
        t
    }

    fn as_str(&mut self, r: Reg, ty: RegType) -> String {
        let (func, arg) = match ty {
            RegType::Int => ("i64_to_str", "i64"),
            RegType::Float => ("f64_to_str", "double"),
            _ => return reg(r),
        };
        let t = self.temp();
        self.inst(format!("{} = call ptr @{}{}({} {})", t, self.prefix, func, arg, reg(r)));
        t
    }

    /// `i1` truth value: non-zero numbers, non-empty strings.
    fn truth(&mut self, r: Reg, ty: RegType) -> String {
        let t = self.temp();
        match ty {
            RegType::Float => self.inst(format!("{} = fcmp une double {}, 0.0", t, reg(r))),
            RegType::Str => {
                let first = self.temp();
                self.inst(format!("{} = load i8, ptr {}", first, reg(r)));
                self.inst(format!("{} = icmp ne i8 {}, 0", t, first));
            }
            _ => self.inst(format!("{} = icmp ne i64 {}, 0", t, reg(r))),
        }
        t
    }

    /// `dst = zext(cmp)` so comparison results are `i64` 0/1.
    fn flag(&mut self, dst: Reg, cmp: String) {
        let t = self.temp();
        self.inst(format!("{} = {}", t, cmp));
        self.inst(format!("{} = zext i1 {} to i64", reg(dst), t));
        self.types.set(dst, RegType::Int);
    }

    // ─── Instructions ─────────────────────────────────────────────

    fn op(&mut self, op: &RegOp) {
        match op {
            RegOp::LoadData { .. } => {}
            RegOp::LoadName { dst, name } => self.load_name(*dst, name),
            RegOp::StoreName { name, src } => self.store_name(name, *src),
            RegOp::Binary { op, dst, lhs, rhs } => self.binary(*op, *dst, *lhs, *rhs),
            RegOp::Unary { op, dst, src } => self.unary(*op, *dst, *src),
            RegOp::Call { dst, callee, args } => self.call(*dst, callee, args),
            RegOp::Jump(label) => self.terminate(format!("br label %{}", label.0)),
            RegOp::JumpIfFalse { cond, target } => {
                let Some(ty) = self.typed(*cond) else { return };
                let c = self.truth(*cond, ty);
                let fallthrough = format!("ft.{}", self.next_block);
                self.next_block += 1;
                self.terminate(format!(
                    "br i1 {}, label %{}, label %{}",
                    c, fallthrough, target.0
                ));
                self.block(&fallthrough);
            }
            RegOp::Label(label) => {
                // The fallthrough branch closes the previous block before
                // the label comment opens the next one.
                if !self.terminated {
                    self.body.push(format!("  br label %{}", label.0));
                    self.terminated = true;
                }
                self.body.push(format!("; {}", label));
                self.block(&label.0);
            }
            RegOp::Break | RegOp::Continue => {
                self.warn(format!("unresolved {}", op));
            }
            RegOp::Ret(_) => self.terminate("ret i32 0".to_string()),
            RegOp::Comment(text) => self.body.push(format!("  ; {}", text)),
        }
    }

    fn load_data(&mut self, dst: Reg, label: DataLabel) {
        let program = self.program;
        let Some(decl) = program.data_decl(label) else {
            self.warn(format!("unknown data label {}", label));
            return;
        };
        let (d, g) = (reg(dst), global(label));
        let ty = match &decl.value {
            DataValue::Str(s) => {
                let n = s.len() + 1;
                self.inst(format!(
                    "{} = getelementptr inbounds [{} x i8], ptr {}, i64 0, i64 0",
                    d, n, g
                ));
                RegType::Str
            }
            DataValue::Int(_) => {
                self.inst(format!("{} = load i64, ptr {}", d, g));
                RegType::Int
            }
            DataValue::Float(_) => {
                self.inst(format!("{} = load double, ptr {}", d, g));
                RegType::Float
            }
        };
        self.types.set(dst, ty);
    }

    fn load_name(&mut self, dst: Reg, name: &str) {
        let ty = self.var_types.get(name).copied().unwrap_or(RegType::Int);
        let d = reg(dst);
        let cast = match ty {
            RegType::Float => Some("bitcast i64 {} to double"),
            RegType::Str => Some("inttoptr i64 {} to ptr"),
            _ => None,
        };
        match cast {
            Some(cast) => {
                let t = self.temp();
                self.inst(format!("{} = load i64, ptr @.{}", t, name));
                self.inst(format!("{} = {}", d, cast.replace("{}", &t)));
            }
            None => self.inst(format!("{} = load i64, ptr @.{}", d, name)),
        }
        self.types.set(dst, ty);
    }

    fn store_name(&mut self, name: &str, src: Reg) {
        let Some(ty) = self.typed(src) else { return };
        let value = self.as_i64(src, ty);
        self.inst(format!("store i64 {}, ptr @.{}", value, name));
        self.var_types.insert(name.to_string(), ty);
    }

    fn binary(&mut self, op: BinOp, dst: Reg, lhs: Reg, rhs: Reg) {
        let (Some(a), Some(b)) = (self.typed(lhs), self.typed(rhs)) else {
            return;
        };
        let d = reg(dst);
        let p = self.prefix;
        let has_str = a == RegType::Str || b == RegType::Str;

        match op {
            BinOp::Concat => self.concat(dst, (lhs, a), (rhs, b)),
            BinOp::Add if a == RegType::Str && b == RegType::Str => {
                self.concat(dst, (lhs, a), (rhs, b))
            }
            BinOp::Repeat => {
                let (s, n) = match (a, b) {
                    (RegType::Str, RegType::Int) => (lhs, rhs),
                    (RegType::Int, RegType::Str) => (rhs, lhs),
                    _ => {
                        self.warn(format!("cannot repeat {} by {}", lhs, rhs));
                        return;
                    }
                };
                self.inst(format!("{} = call ptr @{}repeat(ptr {}, i64 {})", d, p, reg(s), reg(n)));
                self.types.set(dst, RegType::Str);
            }
            _ if has_str && op.is_comparison() && a == b => {
                let t = self.temp();
                self.inst(format!("{} = call i32 @strcmp(ptr {}, ptr {})", t, reg(lhs), reg(rhs)));
                self.flag(dst, format!("icmp {} i32 {}, 0", int_predicate(op), t));
            }
            BinOp::Eq | BinOp::Ne if has_str => {
                // Values of different kinds are never equal.
                let v = (op == BinOp::Ne) as i64;
                self.inst(format!("{} = add i64 0, {}", d, v));
                self.types.set(dst, RegType::Int);
            }
            _ if has_str => self.warn(format!(
                "cannot apply {} to {} and {}",
                op.mnemonic(),
                lhs,
                rhs
            )),
            BinOp::Pow if a == RegType::Int && b == RegType::Int => {
                self.inst(format!("{} = call i64 @{}pow(i64 {}, i64 {})", d, p, reg(lhs), reg(rhs)));
                self.types.set(dst, RegType::Int);
            }
            _ if a == RegType::Float || b == RegType::Float || op == BinOp::Pow => {
                let x = self.as_double(lhs, a);
                let y = self.as_double(rhs, b);
                if op.is_comparison() {
                    self.flag(dst, format!("fcmp {} double {}, {}", float_predicate(op), x, y));
                    return;
                }
                let text = match op {
                    BinOp::Pow => format!("call double @llvm.pow.f64(double {}, double {})", x, y),
                    _ => format!("{} double {}, {}", float_opcode(op), x, y),
                };
                self.inst(format!("{} = {}", d, text));
                self.types.set(dst, RegType::Float);
            }
            _ if op.is_comparison() => {
                self.flag(
                    dst,
                    format!("icmp {} i64 {}, {}", int_predicate(op), reg(lhs), reg(rhs)),
                );
            }
            _ => {
                self.inst(format!("{} = {} i64 {}, {}", d, int_opcode(op), reg(lhs), reg(rhs)));
                self.types.set(dst, RegType::Int);
            }
        }
    }

    fn concat(&mut self, dst: Reg, lhs: (Reg, RegType), rhs: (Reg, RegType)) {
        let x = self.as_str(lhs.0, lhs.1);
        let y = self.as_str(rhs.0, rhs.1);
        self.inst(format!(
            "{} = call ptr @{}concat(ptr {}, ptr {})",
            reg(dst),
            self.prefix,
            x,
            y
        ));
        self.types.set(dst, RegType::Str);
    }

    fn unary(&mut self, op: UnaryOp, dst: Reg, src: Reg) {
        let Some(ty) = self.typed(src) else { return };
        let (d, s) = (reg(dst), reg(src));
        let text = match (op, ty) {
            (UnaryOp::Neg, RegType::Int) => format!("sub i64 0, {}", s),
            (UnaryOp::Neg, RegType::Float) => format!("fneg double {}", s),
            (UnaryOp::Pos, RegType::Int | RegType::Float) => {
                let t = ty.llvm().unwrap_or("i64");
                format!("select i1 true, {} {}, {} {}", t, s, t, s)
            }
            _ => {
                self.warn(format!("cannot apply {} to string {}", op.mnemonic(), src));
                return;
            }
        };
        self.inst(format!("{} = {}", d, text));
        self.types.set(dst, ty);
    }

    fn call(&mut self, dst: Option<Reg>, callee: &str, args: &[Reg]) {
        let p = self.prefix;
        match callee {
            "print" => {
                for arg in args {
                    let Some(ty) = self.typed(*arg) else { continue };
                    let a = reg(*arg);
                    let text = match ty {
                        RegType::Str => format!("call i32 @puts(ptr {})", a),
                        RegType::Float => format!("call i32 (ptr, ...) @printf(ptr @.fmt_f64, double {})", a),
                        _ => format!("call i32 (ptr, ...) @printf(ptr @.fmt_i64, i64 {})", a),
                    };
                    self.inst(text);
                }
                if let Some(d) = dst {
                    self.inst(format!("{} = add i64 0, 0", reg(d)));
                    self.types.set(d, RegType::Int);
                }
            }
            "input" => {
                if let [prompt] = args {
                    if let Some(ty) = self.typed(*prompt) {
                        let s = self.as_str(*prompt, ty);
                        self.inst(format!("call void @{}prompt(ptr {})", p, s));
                    }
                }
                let call = format!("call ptr @{}input()", p);
                match dst {
                    Some(d) => {
                        self.inst(format!("{} = {}", reg(d), call));
                        self.types.set(d, RegType::Str);
                    }
                    None => self.inst(call),
                }
            }
            "toint" | "tofloat" => {
                let [arg] = args else {
                    self.warn(format!("{} takes one argument", callee));
                    return;
                };
                let Some(ty) = self.typed(*arg) else { return };
                let a = reg(*arg);
                let (text, result) = match (callee, ty) {
                    ("toint", RegType::Int) => (format!("select i1 true, i64 {}, i64 {}", a, a), RegType::Int),
                    ("toint", RegType::Float) => (format!("fptosi double {} to i64", a), RegType::Int),
                    ("toint", _) => (format!("call i64 @{}str_toint(ptr {})", p, a), RegType::Int),
                    (_, RegType::Int) => (format!("sitofp i64 {} to double", a), RegType::Float),
                    (_, RegType::Float) => (
                        format!("select i1 true, double {}, double {}", a, a),
                        RegType::Float,
                    ),
                    _ => (format!("call double @{}str_tofloat(ptr {})", p, a), RegType::Float),
                };
                let d = match dst {
                    Some(d) => {
                        self.types.set(d, result);
                        reg(d)
                    }
                    None => self.temp(),
                };
                self.inst(format!("{} = {}", d, text));
            }
            name => self.user_call(dst, name, args),
        }
    }

    fn user_call(&mut self, dst: Option<Reg>, name: &str, args: &[Reg]) {
        match self.defined.get(name) {
            None => {
                self.warn(format!("call to undefined function {}", name));
                return;
            }
            Some(&n) if n != args.len() => {
                self.warn(format!("{} expects {} arguments, got {}", name, n, args.len()));
                return;
            }
            Some(_) => {}
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let Some(ty) = self.typed(*arg) else { return };
            let v = self.as_i64(*arg, ty);
            values.push(format!("i64 {}", v));
        }
        let call = format!("call i32 @{}({})", name, values.join(", "));
        match dst {
            Some(d) => {
                let t = self.temp();
                self.inst(format!("{} = {}", t, call));
                self.inst(format!("{} = sext i32 {} to i64", reg(d), t));
                self.types.set(d, RegType::Int);
            }
            None => self.inst(call),
        }
    }
}

fn int_predicate(op: BinOp) -> &'static str {
    match op {
        BinOp::Eq => "eq",
        BinOp::Ne => "ne",
        BinOp::Lt => "slt",
        BinOp::Le => "sle",
        BinOp::Gt => "sgt",
        _ => "sge",
    }
}

fn float_predicate(op: BinOp) -> &'static str {
    match op {
        BinOp::Eq => "oeq",
        BinOp::Ne => "une",
        BinOp::Lt => "olt",
        BinOp::Le => "ole",
        BinOp::Gt => "ogt",
        _ => "oge",
    }
}

fn int_opcode(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "sdiv",
        _ => "srem",
    }
}

fn float_opcode(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "fadd",
        BinOp::Sub => "fsub",
        BinOp::Mul => "fmul",
        BinOp::Div => "fdiv",
        _ => "frem",
    }
}
