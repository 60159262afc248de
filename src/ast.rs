//! Program tree handed over by the front end.
//!
//! The tree is plain data. It derives serde so a parser living in another
//! process can ship it as JSON (`velox build tree.json`).

use serde::{Deserialize, Serialize};

/// A whole program: top-level statements and function definitions in
/// source order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Expr(Expr),
    Print(Vec<Expr>),
    Assign {
        target: Expr,
        value: Expr,
    },
    Const {
        target: Expr,
        value: Expr,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        #[serde(default)]
        else_body: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `for var = start to end`, inclusive bound, step 1.
    For {
        var: String,
        start: Expr,
        end: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Function(FnDef),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FnDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    /// Only identifier callees are callable; anything else is reported
    /// by the generators.
    Call {
        callee: Box<Expr>,
        #[serde(default)]
        args: Vec<Expr>,
    },
    Input(Option<Box<Expr>>),
    ToInt(Box<Expr>),
    ToFloat(Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Repeat,
}

impl BinOp {
    pub const ALL: [BinOp; 14] = [
        BinOp::Add,
        BinOp::Sub,
        BinOp::Mul,
        BinOp::Div,
        BinOp::Mod,
        BinOp::Pow,
        BinOp::Eq,
        BinOp::Ne,
        BinOp::Lt,
        BinOp::Le,
        BinOp::Gt,
        BinOp::Ge,
        BinOp::Concat,
        BinOp::Repeat,
    ];

    /// Lower-case mnemonic used by the register IR.
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::Pow => "pow",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::Lt => "lt",
            BinOp::Le => "le",
            BinOp::Gt => "gt",
            BinOp::Ge => "ge",
            BinOp::Concat => "concat",
            BinOp::Repeat => "repeat",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<BinOp> {
        BinOp::ALL.into_iter().find(|op| op.mnemonic() == s)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Pos,
}

impl UnaryOp {
    /// Register-IR mnemonic. Unary plus is a plain copy.
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Pos => "copy",
        }
    }

    pub fn from_mnemonic(s: &str) -> Option<UnaryOp> {
        match s {
            "neg" => Some(UnaryOp::Neg),
            "copy" => Some(UnaryOp::Pos),
            _ => None,
        }
    }
}

// ─── Construction helpers ─────────────────────────────────────────

impl Expr {
    pub fn int(v: i64) -> Expr {
        Expr::Int(v)
    }

    pub fn float(v: f64) -> Expr {
        Expr::Float(v)
    }

    pub fn str(s: &str) -> Expr {
        Expr::Str(s.to_string())
    }

    pub fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Expr {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(Expr::ident(name)),
            args,
        }
    }

    /// The name of an identifier expression.
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }
}

impl Stmt {
    pub fn assign(name: &str, value: Expr) -> Stmt {
        Stmt::Assign {
            target: Expr::ident(name),
            value,
        }
    }

    pub fn print(expr: Expr) -> Stmt {
        Stmt::Print(vec![expr])
    }

    pub fn function(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
        Stmt::Function(FnDef {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_tree_shape() {
        let json = r#"{"stmts": [
            {"assign": {"target": {"ident": "x"}, "value": {"int": 2}}},
            {"print": [{"binary": {"op": "add", "lhs": {"ident": "x"}, "rhs": {"float": 1.5}}}]},
            {"function": {"name": "f", "params": ["a"], "body": [{"return": {"ident": "a"}}]}},
            {"if": {"cond": {"int": 1}, "then_body": ["break"]}}
        ]}"#;
        let program: Program = serde_json::from_str(json).unwrap();
        assert_eq!(program.stmts.len(), 4);
        assert_eq!(program.stmts[0], Stmt::assign("x", Expr::int(2)));
        assert_eq!(
            program.stmts[1],
            Stmt::print(Expr::binary(BinOp::Add, Expr::ident("x"), Expr::float(1.5)))
        );
        assert_eq!(
            program.stmts[2],
            Stmt::function("f", &["a"], vec![Stmt::Return(Some(Expr::ident("a")))])
        );
        assert!(matches!(
            &program.stmts[3],
            Stmt::If { else_body: None, then_body, .. } if then_body == &vec![Stmt::Break]
        ));
    }

    #[test]
    fn test_mnemonic_roundtrip() {
        for op in BinOp::ALL {
            assert_eq!(BinOp::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(BinOp::from_mnemonic("load_name"), None);
        assert!(BinOp::Le.is_comparison());
        assert!(!BinOp::Concat.is_comparison());
    }
}
