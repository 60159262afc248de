use crate::ast::{BinOp, Expr, Stmt, UnaryOp};
use crate::ir::reg::{Reg, RegOp};

use super::pool::literal_value;
use super::{LoopContext, RegIrBuilder};

impl RegIrBuilder {
    pub(crate) fn build_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.build_stmt(stmt);
        }
    }

    pub(crate) fn build_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => match expr {
                Expr::Call { .. } | Expr::Input(_) | Expr::ToInt(_) | Expr::ToFloat(_) => {
                    self.build_call(expr, false);
                }
                _ => {
                    self.build_expr(expr);
                }
            },

            Stmt::Print(args) => {
                let args = args.iter().map(|a| self.build_expr(a)).collect();
                self.emit(RegOp::Call {
                    dst: None,
                    callee: "print".to_string(),
                    args,
                });
            }

            Stmt::Assign { target, value } | Stmt::Const { target, value } => {
                let Some(name) = target.as_ident() else {
                    self.error("assignment target is not an identifier".to_string());
                    return;
                };
                let name = name.to_string();
                let src = self.build_expr(value);
                self.emit(RegOp::StoreName { name, src });
            }

            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                let cond = self.build_expr(cond);
                let else_label = self.fresh_label();
                let end_label = self.fresh_label();
                self.emit(RegOp::JumpIfFalse {
                    cond,
                    target: else_label.clone(),
                });
                self.build_block(then_body);
                self.emit(RegOp::Jump(end_label.clone()));
                self.emit(RegOp::Label(else_label));
                if let Some(else_body) = else_body {
                    self.build_block(else_body);
                }
                self.emit(RegOp::Label(end_label));
            }

            Stmt::While { cond, body } => {
                let body_label = self.fresh_label();
                let cond_label = self.fresh_label();
                let end_label = self.fresh_label();

                self.emit(RegOp::Jump(cond_label.clone()));
                self.emit(RegOp::Label(body_label.clone()));
                self.loops.push(LoopContext {
                    exit: end_label.clone(),
                    cont: cond_label.clone(),
                });
                self.build_block(body);
                self.loops.pop();
                self.emit(RegOp::Label(cond_label));
                let cond = self.build_expr(cond);
                self.emit(RegOp::JumpIfFalse {
                    cond,
                    target: end_label.clone(),
                });
                self.emit(RegOp::Jump(body_label));
                self.emit(RegOp::Label(end_label));
            }

            Stmt::For {
                var,
                start,
                end,
                body,
            } => {
                let start = self.build_expr(start);
                let mut bound = self.build_expr(end);
                if literal_value(end).is_some() {
                    // Pooled registers are redefined at every use; the bound
                    // lives in its own register across the back edge.
                    let src = bound;
                    bound = self.fresh_reg();
                    self.emit(RegOp::Unary {
                        op: UnaryOp::Pos,
                        dst: bound,
                        src,
                    });
                }
                self.emit(RegOp::StoreName {
                    name: var.clone(),
                    src: start,
                });

                let body_label = self.fresh_label();
                let step_label = self.fresh_label();
                let cond_label = self.fresh_label();
                let end_label = self.fresh_label();

                self.emit(RegOp::Jump(cond_label.clone()));
                self.emit(RegOp::Label(body_label.clone()));
                self.loops.push(LoopContext {
                    exit: end_label.clone(),
                    cont: step_label.clone(),
                });
                self.build_block(body);
                self.loops.pop();

                self.emit(RegOp::Label(step_label));
                let current = self.load_var(var);
                let one = self.build_expr(&Expr::Int(1));
                let next = self.binary(BinOp::Add, current, one);
                self.emit(RegOp::StoreName {
                    name: var.clone(),
                    src: next,
                });

                self.emit(RegOp::Label(cond_label));
                let current = self.load_var(var);
                let in_range = self.binary(BinOp::Le, current, bound);
                self.emit(RegOp::JumpIfFalse {
                    cond: in_range,
                    target: end_label.clone(),
                });
                self.emit(RegOp::Jump(body_label));
                self.emit(RegOp::Label(end_label));
            }

            Stmt::Break => match self.loops.last() {
                Some(ctx) => {
                    let target = ctx.exit.clone();
                    self.emit(RegOp::Jump(target));
                }
                None => self.error("break outside of a loop".to_string()),
            },

            Stmt::Continue => match self.loops.last() {
                Some(ctx) => {
                    let target = ctx.cont.clone();
                    self.emit(RegOp::Jump(target));
                }
                None => self.error("continue outside of a loop".to_string()),
            },

            Stmt::Return(value) => {
                let value = value.as_ref().map(|v| self.build_expr(v));
                self.emit(RegOp::Ret(value));
            }

            Stmt::Function(def) => {
                self.error(format!("nested function '{}' is not supported", def.name));
            }
        }
    }

    fn load_var(&mut self, name: &str) -> Reg {
        let dst = self.fresh_reg();
        self.emit(RegOp::LoadName {
            dst,
            name: name.to_string(),
        });
        dst
    }

    fn binary(&mut self, op: BinOp, lhs: Reg, rhs: Reg) -> Reg {
        let dst = self.fresh_reg();
        self.emit(RegOp::Binary { op, dst, lhs, rhs });
        dst
    }
}
