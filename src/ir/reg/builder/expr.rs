use crate::ast::Expr;
use crate::ir::reg::{Reg, RegOp};

use super::pool::literal_value;
use super::RegIrBuilder;

impl RegIrBuilder {
    /// Emit code for `expr` and return the register holding its value.
    ///
    /// A malformed expression leaves an error comment and still returns a
    /// fresh register so the caller can carry on.
    pub(crate) fn build_expr(&mut self, expr: &Expr) -> Reg {
        if let Some(value) = literal_value(expr) {
            let data = match self.pool.lookup(&value) {
                Some(label) => label,
                None => self.intern(value),
            };
            let dst = Reg(data.id);
            self.emit(RegOp::LoadData { dst, data });
            return dst;
        }

        match expr {
            Expr::Ident(name) => {
                let dst = self.fresh_reg();
                self.emit(RegOp::LoadName {
                    dst,
                    name: name.clone(),
                });
                dst
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.build_expr(lhs);
                let rhs = self.build_expr(rhs);
                let dst = self.fresh_reg();
                self.emit(RegOp::Binary {
                    op: *op,
                    dst,
                    lhs,
                    rhs,
                });
                dst
            }
            Expr::Unary { op, expr } => {
                let src = self.build_expr(expr);
                let dst = self.fresh_reg();
                self.emit(RegOp::Unary { op: *op, dst, src });
                dst
            }
            _ => match self.build_call(expr, true) {
                Some(dst) => dst,
                None => self.fresh_reg(),
            },
        }
    }

    /// Emit a call or intrinsic. With `want_value` the call gets a
    /// destination register, otherwise it is emitted for its effect only.
    pub(crate) fn build_call(&mut self, expr: &Expr, want_value: bool) -> Option<Reg> {
        let (callee, args): (String, Vec<Reg>) = match expr {
            Expr::Call { callee, args } => {
                let Some(name) = callee.as_ident() else {
                    self.error("callee is not an identifier".to_string());
                    return None;
                };
                let name = name.to_string();
                let args = args.iter().map(|a| self.build_expr(a)).collect();
                (name, args)
            }
            Expr::Input(prompt) => {
                let args = prompt.iter().map(|p| self.build_expr(p)).collect();
                ("input".to_string(), args)
            }
            Expr::ToInt(value) => ("toint".to_string(), vec![self.build_expr(value)]),
            Expr::ToFloat(value) => ("tofloat".to_string(), vec![self.build_expr(value)]),
            _ => {
                self.error("unsupported expression".to_string());
                return None;
            }
        };

        let dst = want_value.then(|| self.fresh_reg());
        self.emit(RegOp::Call { dst, callee, args });
        dst
    }
}
