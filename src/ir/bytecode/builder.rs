use std::mem;

use crate::ast::{BinOp, Expr, FnDef, Program, Stmt};

use super::{Bytecode, BytecodeProgram, Const, Slot, VReg};

/// Pending loop-control sites of one enclosing loop.
#[derive(Default)]
struct LoopFrame {
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

/// Lowers the program tree to array bytecode.
///
/// Unrecognized shapes (non-identifier callees or assignment targets)
/// produce no instructions.
pub struct BytecodeBuilder {
    code: Vec<Bytecode>,
    slots: Vec<String>,
    next_reg: u32,
    loops: Vec<LoopFrame>,
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            slots: Vec::new(),
            next_reg: 0,
            loops: Vec::new(),
        }
    }

    pub fn build_program(mut self, program: &Program) -> BytecodeProgram {
        self.build_block(&program.stmts);
        BytecodeProgram {
            code: self.code,
            slots: self.slots,
        }
    }

    // ── Helpers ───────────────────────────────────────────────────

    fn fresh(&mut self) -> VReg {
        let reg = VReg(self.next_reg);
        self.next_reg += 1;
        reg
    }

    /// Slot for `name`, allocated on first use.
    fn slot(&mut self, name: &str) -> Slot {
        match self.slots.iter().position(|s| s == name) {
            Some(i) => Slot(i as u32),
            None => {
                self.slots.push(name.to_string());
                Slot(self.slots.len() as u32 - 1)
            }
        }
    }

    fn emit(&mut self, op: Bytecode) -> usize {
        self.code.push(op);
        self.code.len() - 1
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    /// Point the jump at `at` to `to`.
    fn patch(&mut self, at: usize, to: usize) {
        match &mut self.code[at] {
            Bytecode::Jump { target } | Bytecode::JumpIfFalse { target, .. } => *target = to,
            Bytecode::Break { target } | Bytecode::Continue { target } => *target = Some(to),
            Bytecode::FunctionDef { end, .. } => *end = to,
            _ => {}
        }
    }

    /// Resolve the innermost loop's pending break/continue sites.
    fn close_loop(&mut self, exit: usize, cont: usize) {
        if let Some(frame) = self.loops.pop() {
            for at in frame.breaks {
                self.patch(at, exit);
            }
            for at in frame.continues {
                self.patch(at, cont);
            }
        }
    }

    // ── Statements ────────────────────────────────────────────────

    fn build_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.build_stmt(stmt);
        }
    }

    fn build_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => {
                self.build_expr(expr);
            }
            Stmt::Print(args) => {
                let args = args.iter().map(|a| self.build_expr(a)).collect();
                self.emit(Bytecode::Print { args });
            }
            Stmt::Assign { target, value } | Stmt::Const { target, value } => {
                if let Some(name) = target.as_ident() {
                    let src = self.build_expr(value);
                    let slot = self.slot(name);
                    self.emit(Bytecode::StoreName { slot, src });
                }
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let cond = self.build_expr(cond);
                let skip = self.emit(Bytecode::JumpIfFalse { cond, target: 0 });
                self.build_block(then_body);
                match else_body {
                    Some(else_body) => {
                        let over = self.emit(Bytecode::Jump { target: 0 });
                        let else_start = self.here();
                        self.patch(skip, else_start);
                        self.build_block(else_body);
                        let end = self.here();
                        self.patch(over, end);
                    }
                    None => {
                        let end = self.here();
                        self.patch(skip, end);
                    }
                }
            }
            Stmt::While { cond, body } => {
                let loop_start = self.here();
                let cond = self.build_expr(cond);
                let exit = self.emit(Bytecode::JumpIfFalse { cond, target: 0 });
                self.loops.push(LoopFrame::default());
                self.build_block(body);
                self.emit(Bytecode::Jump { target: loop_start });
                let end = self.here();
                self.patch(exit, end);
                self.close_loop(end, loop_start);
            }
            Stmt::For {
                var,
                start,
                end,
                body,
            } => {
                let start = self.build_expr(start);
                let bound = self.build_expr(end);
                let slot = self.slot(var);
                self.emit(Bytecode::StoreName { slot, src: start });

                let loop_start = self.here();
                let current = self.fresh();
                self.emit(Bytecode::LoadName { dst: current, slot });
                let in_range = self.fresh();
                self.emit(Bytecode::Binary {
                    op: BinOp::Le,
                    dst: in_range,
                    lhs: current,
                    rhs: bound,
                });
                let exit = self.emit(Bytecode::JumpIfFalse {
                    cond: in_range,
                    target: 0,
                });

                self.loops.push(LoopFrame::default());
                self.build_block(body);

                let step = self.here();
                let current = self.fresh();
                self.emit(Bytecode::LoadName { dst: current, slot });
                let one = self.fresh();
                self.emit(Bytecode::LoadConst {
                    dst: one,
                    value: Const::Int(1),
                });
                let next = self.fresh();
                self.emit(Bytecode::Binary {
                    op: BinOp::Add,
                    dst: next,
                    lhs: current,
                    rhs: one,
                });
                self.emit(Bytecode::StoreName { slot, src: next });
                self.emit(Bytecode::Jump { target: loop_start });

                let end = self.here();
                self.patch(exit, end);
                self.close_loop(end, step);
            }
            Stmt::Break => {
                let at = self.emit(Bytecode::Break { target: None });
                if let Some(frame) = self.loops.last_mut() {
                    frame.breaks.push(at);
                }
            }
            Stmt::Continue => {
                let at = self.emit(Bytecode::Continue { target: None });
                if let Some(frame) = self.loops.last_mut() {
                    frame.continues.push(at);
                }
            }
            Stmt::Return(value) => {
                let value = value.as_ref().map(|v| self.build_expr(v));
                self.emit(Bytecode::Return { value });
            }
            Stmt::Function(def) => self.build_function(def),
        }
    }

    fn build_function(&mut self, def: &FnDef) {
        let params = def.params.iter().map(|p| self.slot(p)).collect();
        let at = self.here();
        self.emit(Bytecode::FunctionDef {
            name: def.name.clone(),
            params,
            entry: at + 1,
            end: 0,
        });
        // Loop control inside a body never reaches loops around the definition.
        let outer = mem::take(&mut self.loops);
        self.build_block(&def.body);
        self.loops = outer;
        self.emit(Bytecode::Return { value: None });
        let end = self.here();
        self.patch(at, end);
    }

    // ── Expressions ───────────────────────────────────────────────

    fn build_expr(&mut self, expr: &Expr) -> VReg {
        match expr {
            Expr::Int(v) => self.load_const(Const::Int(*v)),
            Expr::Float(v) => self.load_const(Const::Float(*v)),
            Expr::Str(s) => self.load_const(Const::Str(s.clone())),
            Expr::Ident(name) => {
                let slot = self.slot(name);
                let dst = self.fresh();
                self.emit(Bytecode::LoadName { dst, slot });
                dst
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.build_expr(lhs);
                let rhs = self.build_expr(rhs);
                let dst = self.fresh();
                self.emit(Bytecode::Binary {
                    op: *op,
                    dst,
                    lhs,
                    rhs,
                });
                dst
            }
            Expr::Unary { op, expr } => {
                let src = self.build_expr(expr);
                let dst = self.fresh();
                self.emit(Bytecode::Unary { op: *op, dst, src });
                dst
            }
            Expr::Call { callee, args } => {
                let Some(name) = callee.as_ident() else {
                    return self.fresh();
                };
                let name = name.to_string();
                let args = args.iter().map(|a| self.build_expr(a)).collect();
                let dst = self.fresh();
                self.emit(Bytecode::Call { name, args, dst });
                dst
            }
            Expr::Input(prompt) => {
                let prompt = prompt.as_ref().map(|p| self.build_expr(p));
                let dst = self.fresh();
                self.emit(Bytecode::Input { dst, prompt });
                dst
            }
            Expr::ToInt(value) => {
                let src = self.build_expr(value);
                let dst = self.fresh();
                self.emit(Bytecode::ToInt { dst, src });
                dst
            }
            Expr::ToFloat(value) => {
                let src = self.build_expr(value);
                let dst = self.fresh();
                self.emit(Bytecode::ToFloat { dst, src });
                dst
            }
        }
    }

    fn load_const(&mut self, value: Const) -> VReg {
        let dst = self.fresh();
        self.emit(Bytecode::LoadConst { dst, value });
        dst
    }
}

/// Lower a program tree to array bytecode.
pub fn lower_to_bytecode(program: &Program) -> BytecodeProgram {
    BytecodeBuilder::new().build_program(program)
}
