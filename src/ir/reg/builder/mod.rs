//! RegIrBuilder: lowers the program tree into a `RegProgram`.
//!
//! Two passes. The pool pre-pass walks the whole tree once and gives every
//! distinct literal one `data` declaration whose id comes from the register
//! counter. Generation then emits one function block per user function
//! other than `main`, followed by a synthesized `main` holding the
//! top-level statements with the body of a user `main` inlined where it
//! was defined.
//!
//! All counters live on the builder, so each compilation starts from zero.

mod expr;
pub mod pool;
mod stmt;

use std::mem;

use crate::ast::{FnDef, Program, Stmt};
use crate::ir::reg::{Function, Label, Reg, RegOp, RegProgram};

use self::pool::ConstantPool;

/// Jump targets of the innermost enclosing loop.
#[derive(Debug, Clone)]
pub(crate) struct LoopContext {
    pub(crate) exit: Label,
    pub(crate) cont: Label,
}

// ─── RegIrBuilder ──────────────────────────────────────────────────

pub struct RegIrBuilder {
    /// Deduplicated literals.
    pub(crate) pool: ConstantPool,
    /// Next register id, shared with pool ids.
    pub(crate) next_reg: u32,
    /// Next label number. Independent of registers.
    pub(crate) next_label: u32,
    /// Current nesting depth of the pool pre-pass.
    pub(crate) pool_depth: usize,
    /// Instructions of the function being generated.
    pub(crate) body: Vec<RegOp>,
    /// Enclosing loops, innermost last.
    pub(crate) loops: Vec<LoopContext>,
}

impl Default for RegIrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegIrBuilder {
    pub fn new() -> Self {
        Self {
            pool: ConstantPool::default(),
            next_reg: 0,
            next_label: 0,
            pool_depth: 0,
            body: Vec::new(),
            loops: Vec::new(),
        }
    }

    pub fn build_program(mut self, program: &Program) -> RegProgram {
        self.pool_block(&program.stmts);

        let mut functions = Vec::new();
        for stmt in &program.stmts {
            if let Stmt::Function(def) = stmt {
                if def.name != "main" {
                    functions.push(self.build_function(def));
                }
            }
        }

        for stmt in &program.stmts {
            match stmt {
                Stmt::Function(def) if def.name == "main" => self.build_block(&def.body),
                Stmt::Function(_) => {}
                other => self.build_stmt(other),
            }
        }
        functions.push(self.finish_function("main".to_string(), Vec::new()));

        RegProgram {
            data: self.pool.into_decls(),
            functions,
        }
    }

    fn build_function(&mut self, def: &FnDef) -> Function {
        let params: Vec<Reg> = def.params.iter().map(|_| self.fresh_reg()).collect();
        for (name, reg) in def.params.iter().zip(&params) {
            self.emit(RegOp::StoreName {
                name: name.clone(),
                src: *reg,
            });
        }
        self.build_block(&def.body);
        self.finish_function(def.name.clone(), params)
    }

    fn finish_function(&mut self, name: String, params: Vec<Reg>) -> Function {
        if !matches!(self.body.last(), Some(RegOp::Ret(_))) {
            self.emit(RegOp::Ret(None));
        }
        Function {
            name,
            params,
            body: mem::take(&mut self.body),
        }
    }

    // ── Allocation helpers ────────────────────────────────────────

    pub(crate) fn fresh_reg(&mut self) -> Reg {
        let reg = Reg(self.next_reg);
        self.next_reg += 1;
        reg
    }

    pub(crate) fn fresh_label(&mut self) -> Label {
        let label = Label::numbered(self.next_label);
        self.next_label += 1;
        label
    }

    pub(crate) fn emit(&mut self, op: RegOp) {
        self.body.push(op);
    }

    pub(crate) fn error(&mut self, message: String) {
        self.emit(RegOp::Comment(format!("error: {}", message)));
    }
}

/// Lower a program tree to register IR text.
pub fn lower_to_register_ir(program: &Program) -> String {
    RegIrBuilder::new().build_program(program).to_string()
}
