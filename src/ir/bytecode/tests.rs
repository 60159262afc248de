use super::*;
use crate::ast::{BinOp, Expr, Program, Stmt};

fn lower(stmts: Vec<Stmt>) -> BytecodeProgram {
    lower_to_bytecode(&Program { stmts })
}

fn lines(prog: &BytecodeProgram) -> Vec<String> {
    prog.code.iter().map(|op| op.to_string()).collect()
}

#[test]
fn straight_line_listing() {
    let prog = lower(vec![
        Stmt::assign("x", Expr::int(2)),
        Stmt::assign(
            "y",
            Expr::binary(BinOp::Add, Expr::ident("x"), Expr::int(3)),
        ),
        Stmt::print(Expr::ident("y")),
    ]);
    assert_eq!(prog.slots, vec!["x".to_string(), "y".to_string()]);
    assert_eq!(
        prog.listing(),
        "Bytecode:\n\
         \x20  0: LOAD_CONST_INT %r0, 2\n\
         \x20  1: STORE_NAME #0, %r0\n\
         \x20  2: LOAD_NAME %r1, #0\n\
         \x20  3: LOAD_CONST_INT %r2, 3\n\
         \x20  4: ADD %r3, %r1, %r2\n\
         \x20  5: STORE_NAME #1, %r3\n\
         \x20  6: LOAD_NAME %r4, #1\n\
         \x20  7: PRINT %r4\n"
    );
}

#[test]
fn if_else_is_back_patched() {
    let prog = lower(vec![Stmt::If {
        cond: Expr::ident("c"),
        then_body: vec![Stmt::print(Expr::int(1))],
        else_body: Some(vec![Stmt::print(Expr::int(2))]),
    }]);
    assert_eq!(
        lines(&prog),
        vec![
            "LOAD_NAME %r0, #0",
            "JUMP_IF_FALSE %r0, 5",
            "LOAD_CONST_INT %r1, 1",
            "PRINT %r1",
            "JUMP 7",
            "LOAD_CONST_INT %r2, 2",
            "PRINT %r2",
        ]
    );
}

#[test]
fn while_resolves_break_and_continue() {
    let prog = lower(vec![Stmt::While {
        cond: Expr::ident("c"),
        body: vec![
            Stmt::If {
                cond: Expr::ident("d"),
                then_body: vec![Stmt::Break],
                else_body: None,
            },
            Stmt::Continue,
        ],
    }]);
    assert_eq!(
        lines(&prog),
        vec![
            "LOAD_NAME %r0, #0",
            "JUMP_IF_FALSE %r0, 7",
            "LOAD_NAME %r1, #1",
            "JUMP_IF_FALSE %r1, 5",
            "BREAK 7",
            "CONTINUE 0",
            "JUMP 0",
        ]
    );
    assert!(prog.unresolved().is_empty());
}

#[test]
fn for_synthesizes_compare_and_increment() {
    let prog = lower(vec![Stmt::For {
        var: "i".to_string(),
        start: Expr::int(1),
        end: Expr::int(2),
        body: vec![Stmt::print(Expr::ident("i")), Stmt::Continue],
    }]);
    assert_eq!(
        lines(&prog),
        vec![
            "LOAD_CONST_INT %r0, 1",
            "LOAD_CONST_INT %r1, 2",
            "STORE_NAME #0, %r0",
            "LOAD_NAME %r2, #0",
            "LE %r3, %r2, %r1",
            "JUMP_IF_FALSE %r3, 14",
            "LOAD_NAME %r4, #0",
            "PRINT %r4",
            "CONTINUE 9",
            "LOAD_NAME %r5, #0",
            "LOAD_CONST_INT %r6, 1",
            "ADD %r7, %r5, %r6",
            "STORE_NAME #0, %r7",
            "JUMP 3",
        ]
    );
}

#[test]
fn function_def_is_inline_with_entry_and_end() {
    let prog = lower(vec![
        Stmt::function("f", &["a"], vec![Stmt::Return(Some(Expr::ident("a")))]),
        Stmt::print(Expr::call("f", vec![Expr::int(5)])),
    ]);
    assert_eq!(
        lines(&prog),
        vec![
            "FUNCTION_DEF f (entry: 1, end: 4) params: #0",
            "LOAD_NAME %r0, #0",
            "RETURN %r0",
            "RETURN",
            "LOAD_CONST_INT %r1, 5",
            "CALL f -> %r2 args: %r1",
            "PRINT %r2",
        ]
    );
}

#[test]
fn loop_control_without_loop_stays_unresolved() {
    let prog = lower(vec![
        Stmt::Break,
        Stmt::While {
            cond: Expr::ident("c"),
            body: vec![Stmt::function("g", &[], vec![Stmt::Continue])],
        },
    ]);
    assert_eq!(prog.unresolved(), vec![0, 4]);
    assert_eq!(prog.code[0].to_string(), "BREAK ?");
}

#[test]
fn intrinsics_and_literals() {
    let prog = lower(vec![
        Stmt::assign(
            "n",
            Expr::ToInt(Box::new(Expr::Input(Some(Box::new(Expr::str("n? ")))))),
        ),
        Stmt::print(Expr::ToFloat(Box::new(Expr::float(2.0)))),
    ]);
    assert_eq!(
        lines(&prog),
        vec![
            "LOAD_CONST_STRING %r0, \"n? \"",
            "INPUT %r1, %r0",
            "TOINT %r2, %r1",
            "STORE_NAME #0, %r2",
            "LOAD_CONST_FLOAT %r3, 2.0",
            "TOFLOAT %r4, %r3",
            "PRINT %r4",
        ]
    );
}

#[test]
fn malformed_shapes_emit_nothing() {
    let prog = lower(vec![Stmt::Assign {
        target: Expr::int(1),
        value: Expr::int(2),
    }]);
    assert!(prog.code.is_empty());
    assert_eq!(prog.slot_of("x"), None);
}
