use super::*;
use crate::ast::{Expr, Program, Stmt};
use crate::ir::reg::builder::lower_to_register_ir;

fn emit_tree(stmts: Vec<Stmt>) -> String {
    emit_native_ir(&lower_to_register_ir(&Program { stmts }))
}

/// Lines of the `define` block for `name`.
fn function_body(out: &str, name: &str) -> Vec<String> {
    let header = format!("define i32 @{}(", name);
    out.lines()
        .skip_while(|l| !l.starts_with(&header))
        .take_while(|l| *l != "}")
        .map(str::to_string)
        .collect()
}

#[test]
fn assign_add_print() {
    let out = emit_tree(vec![
        Stmt::assign("x", Expr::int(2)),
        Stmt::assign(
            "y",
            Expr::binary(BinOp::Add, Expr::ident("x"), Expr::int(3)),
        ),
        Stmt::print(Expr::ident("y")),
    ]);
    assert!(out.starts_with("; velox native ir\n\ntarget triple = \"x86_64-pc-linux-gnu\"\n"));
    assert!(out.contains("@.x = global i64 0\n@.y = global i64 0\n"));
    assert!(out.contains("@.i64.0 = private constant i64 2\n"));
    assert!(out.contains("@.i64.1 = private constant i64 3\n"));
    assert_eq!(
        function_body(&out, "main"),
        vec![
            "define i32 @main() {",
            "entry:",
            "  %r0 = load i64, ptr @.i64.0",
            "  %r1 = load i64, ptr @.i64.1",
            "  store i64 %r0, ptr @.x",
            "  %r2 = load i64, ptr @.x",
            "  %r3 = add i64 %r2, %r1",
            "  store i64 %r3, ptr @.y",
            "  %r4 = load i64, ptr @.y",
            "  call i32 (ptr, ...) @printf(ptr @.fmt_i64, i64 %r4)",
            "  ret i32 0",
        ]
    );
}

#[test]
fn strings_print_with_puts() {
    let out = emit_tree(vec![Stmt::print(Expr::str("hi \"you\""))]);
    assert!(out.contains("@.str.0 = private constant [9 x i8] c\"hi \\22you\\22\\00\""));
    assert!(out.contains("%r0 = getelementptr inbounds [9 x i8], ptr @.str.0, i64 0, i64 0"));
    assert!(out.contains("  call i32 @puts(ptr %r0)"));
}

#[test]
fn variable_types_survive_the_i64_slot() {
    let out = emit_tree(vec![
        Stmt::assign("s", Expr::str("a")),
        Stmt::assign("f", Expr::float(0.5)),
        Stmt::print(Expr::ident("s")),
        Stmt::print(Expr::ident("f")),
    ]);
    assert!(out.contains("@.f64.1 = private constant double 0x3FE0000000000000"));
    assert!(out.contains("= ptrtoint ptr %r0 to i64"));
    assert!(out.contains("= bitcast double %r1 to i64"));
    assert!(out.contains("to ptr\n  call i32 @puts(ptr %r"));
    assert!(out.contains("@printf(ptr @.fmt_f64, double %r"));
}

#[test]
fn mixed_arithmetic_and_comparisons() {
    let out = emit_tree(vec![
        Stmt::print(Expr::binary(BinOp::Mul, Expr::float(1.5), Expr::int(2))),
        Stmt::print(Expr::binary(BinOp::Lt, Expr::int(1), Expr::int(2))),
        Stmt::print(Expr::binary(BinOp::Mod, Expr::int(7), Expr::int(2))),
    ]);
    assert!(out.contains("= sitofp i64 %r1 to double"));
    assert!(out.contains("= fmul double %r0, %t0"));
    assert!(out.contains("= icmp slt i64 %r"));
    assert!(out.contains("= zext i1 %t"));
    assert!(out.contains("= srem i64 %r"));
}

#[test]
fn control_flow_becomes_blocks() {
    let out = emit_tree(vec![
        Stmt::assign("i", Expr::int(0)),
        Stmt::While {
            cond: Expr::binary(BinOp::Lt, Expr::ident("i"), Expr::int(3)),
            body: vec![Stmt::assign(
                "i",
                Expr::binary(BinOp::Add, Expr::ident("i"), Expr::int(1)),
            )],
        },
    ]);
    let body = function_body(&out, "main");
    assert!(body.contains(&"  br label %L1".to_string()));
    assert!(body.contains(&"; @L0".to_string()));
    assert!(body.contains(&"L0:".to_string()));
    assert!(body.iter().any(|l| l.starts_with("  br i1 %t") && l.ends_with("label %ft.0, label %L2")));
    assert!(body.contains(&"ft.0:".to_string()));
    assert_eq!(body.last().map(String::as_str), Some("  ret i32 0"));

    // Each label comment sits between the previous block's terminator
    // and the label it names.
    for (i, line) in body.iter().enumerate() {
        if let Some(label) = line.strip_prefix("; @") {
            assert_eq!(body[i + 1], format!("{}:", label));
            let prev = &body[i - 1];
            assert!(
                prev.starts_with("  br ") || prev.starts_with("  ret "),
                "{} follows {:?}",
                line,
                prev
            );
        }
    }
}

#[test]
fn every_function_is_emitted() {
    let out = emit_tree(vec![
        Stmt::function(
            "add",
            &["a", "b"],
            vec![Stmt::Return(Some(Expr::binary(
                BinOp::Add,
                Expr::ident("a"),
                Expr::ident("b"),
            )))],
        ),
        Stmt::print(Expr::call("add", vec![Expr::int(1), Expr::int(2)])),
    ]);
    assert!(out.contains("define i32 @add(i64 %r"));
    assert!(out.contains("define i32 @main() {"));
    assert!(out.contains("= call i32 @add(i64 %r0, i64 %r1)"));
    assert!(out.contains("= sext i32 %t0 to i64"));
}

#[test]
fn unknown_registers_degrade_to_warnings() {
    let text = "function main() {\n    call print(r9)\n    r3 = add r9, r8\n    store_name x, r3\n    ret\n}\n";
    let out = emit_native_ir(text);
    assert!(out.contains("  ; warning: register r9 has no known type"));
    assert!(out.contains("  ; warning: register r3 has no known type"));
    assert!(!out.contains("@printf(ptr @.fmt_i64"));
    assert!(!out.contains("store i64"));
    assert!(out.contains("  ret i32 0"));
}

#[test]
fn undefined_calls_and_options() {
    let text = "function main() {\n    r1 = call input()\n    r2 = call toint(r1)\n    call missing(r2)\n    ret\n}\n";
    let out = emit_native_ir_with(
        text,
        &NativeOptions {
            triple: "aarch64-unknown-linux-gnu".to_string(),
            runtime_prefix: "rt_".to_string(),
        },
    );
    assert!(out.contains("target triple = \"aarch64-unknown-linux-gnu\""));
    assert!(out.contains("%r1 = call ptr @rt_input()"));
    assert!(out.contains("%r2 = call i64 @rt_str_toint(ptr %r1)"));
    assert!(out.contains("; warning: call to undefined function missing"));
}

#[test]
fn code_after_return_opens_a_block() {
    let text = "function f() {\n    ret\n    r1 = call input()\n}\n";
    let body = function_body(&emit_native_ir(text), "f");
    assert_eq!(
        body[2..],
        [
            "  ret i32 0".to_string(),
            "dead.0:".to_string(),
            "  %r1 = call ptr @velox_input()".to_string(),
            "  ret i32 0".to_string(),
        ]
    );
}
