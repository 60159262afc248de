//! Constant pool: one declaration and one register id per distinct literal.

use std::collections::HashMap;

use crate::ast::{Expr, Stmt};
use crate::ir::reg::{DataDecl, DataLabel, DataValue};

use super::RegIrBuilder;

/// Nesting depth beyond which the pre-pass stops descending. Literals
/// below the ceiling are pooled on first use during generation instead.
pub const MAX_POOL_DEPTH: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PoolKey {
    Str(String),
    Int(i64),
    /// Bit pattern, so `0.0` and `-0.0` stay distinct and NaN pools.
    Float(u64),
}

impl PoolKey {
    fn of(value: &DataValue) -> PoolKey {
        match value {
            DataValue::Str(s) => PoolKey::Str(s.clone()),
            DataValue::Int(v) => PoolKey::Int(*v),
            DataValue::Float(v) => PoolKey::Float(v.to_bits()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    decls: Vec<DataDecl>,
    index: HashMap<PoolKey, DataLabel>,
}

impl ConstantPool {
    pub fn lookup(&self, value: &DataValue) -> Option<DataLabel> {
        self.index.get(&PoolKey::of(value)).copied()
    }

    /// Return the label for `value`, declaring it with the next id from
    /// `next_id` if it is new.
    pub fn intern(&mut self, value: DataValue, next_id: &mut u32) -> DataLabel {
        let key = PoolKey::of(&value);
        if let Some(label) = self.index.get(&key) {
            return *label;
        }
        let label = DataLabel {
            kind: value.kind(),
            id: *next_id,
        };
        *next_id += 1;
        self.index.insert(key, label);
        self.decls.push(DataDecl { label, value });
        label
    }

    pub fn decls(&self) -> &[DataDecl] {
        &self.decls
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn into_decls(self) -> Vec<DataDecl> {
        self.decls
    }
}

pub(crate) fn literal_value(expr: &Expr) -> Option<DataValue> {
    match expr {
        Expr::Int(v) => Some(DataValue::Int(*v)),
        Expr::Float(v) => Some(DataValue::Float(*v)),
        Expr::Str(s) => Some(DataValue::Str(s.clone())),
        _ => None,
    }
}

// ─── Pre-pass ─────────────────────────────────────────────────────

impl RegIrBuilder {
    pub(crate) fn intern(&mut self, value: DataValue) -> DataLabel {
        self.pool.intern(value, &mut self.next_reg)
    }

    pub(crate) fn pool_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.pool_stmt(stmt);
        }
    }

    fn pool_stmt(&mut self, stmt: &Stmt) {
        if self.pool_depth >= MAX_POOL_DEPTH {
            return;
        }
        self.pool_depth += 1;
        match stmt {
            Stmt::Expr(e) | Stmt::Return(Some(e)) => self.pool_expr(e),
            Stmt::Print(args) => {
                for arg in args {
                    self.pool_expr(arg);
                }
            }
            Stmt::Assign { target, value } | Stmt::Const { target, value } => {
                self.pool_expr(target);
                self.pool_expr(value);
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.pool_expr(cond);
                self.pool_block(then_body);
                if let Some(else_body) = else_body {
                    self.pool_block(else_body);
                }
            }
            Stmt::While { cond, body } => {
                self.pool_expr(cond);
                self.pool_block(body);
            }
            Stmt::For {
                start, end, body, ..
            } => {
                self.pool_expr(start);
                self.pool_expr(end);
                // Step of the induction variable.
                self.intern(DataValue::Int(1));
                self.pool_block(body);
            }
            Stmt::Function(def) => self.pool_block(&def.body),
            Stmt::Break | Stmt::Continue | Stmt::Return(None) => {}
        }
        self.pool_depth -= 1;
    }

    fn pool_expr(&mut self, expr: &Expr) {
        if self.pool_depth >= MAX_POOL_DEPTH {
            return;
        }
        if let Some(value) = literal_value(expr) {
            self.intern(value);
            return;
        }
        self.pool_depth += 1;
        match expr {
            Expr::Binary { lhs, rhs, .. } => {
                self.pool_expr(lhs);
                self.pool_expr(rhs);
            }
            Expr::Unary { expr, .. } | Expr::ToInt(expr) | Expr::ToFloat(expr) => {
                self.pool_expr(expr)
            }
            Expr::Input(Some(prompt)) => self.pool_expr(prompt),
            Expr::Call { callee, args } => {
                self.pool_expr(callee);
                for arg in args {
                    self.pool_expr(arg);
                }
            }
            _ => {}
        }
        self.pool_depth -= 1;
    }
}
