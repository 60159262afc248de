use super::*;
use crate::ast::{BinOp, Expr, Program, Stmt};
use crate::ir::lir::lower::lower_register_ir_to_target;
use crate::ir::reg::builder::lower_to_register_ir;

/// Wrap body lines in a `main` function.
fn main_fn(body: &[&str]) -> String {
    let mut out = String::from("export function w $main() {\n@start\n");
    for line in body {
        out.push('\t');
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\tret 0\n}\n");
    out
}

fn bounded() -> OptimizerConfig {
    OptimizerConfig {
        bounded_rewrites: true,
        ..OptimizerConfig::default()
    }
}

#[test]
fn cse_reuses_holder_in_later_call_arguments() {
    let input = main_fn(&[
        "%r1 =l add %r2, %r3",
        "%r4 =l add %r2, %r3",
        "call $velox_print(l %r4)",
    ]);
    assert_eq!(
        optimize(&input),
        main_fn(&["%r1 =l add %r2, %r3", "call $velox_print(l %r1)"])
    );
}

#[test]
fn cse_respects_operand_redefinition() {
    let input = main_fn(&[
        "%r1 =l add %r2, %r3",
        "%r2 =l loadl $var_x",
        "%r4 =l add %r2, %r3",
        "call $velox_print(l %r1, l %r4)",
    ]);
    assert_eq!(optimize(&input), input);
}

#[test]
fn cse_is_block_local() {
    let input = main_fn(&[
        "%r1 =l add %r2, %r3",
        "jmp @L0",
        "@L0",
        "%r4 =l add %r2, %r3",
        "call $velox_print(l %r1, l %r4)",
    ])
    .replace("\t@L0", "@L0");
    assert_eq!(optimize(&input), input);
}

#[test]
fn cse_skips_multiply_defined_holders() {
    let input = main_fn(&[
        "%r1 =l add %r2, %r3",
        "%r4 =l add %r2, %r3",
        "call $velox_print(l %r4)",
        "%r1 =l loadl $var_y",
        "call $velox_print(l %r1)",
    ]);
    assert_eq!(optimize(&input), input);
}

#[test]
fn strength_reduction() {
    let input = main_fn(&["%r2 =l mul %r1, 2", "call $velox_print(l %r2)"]);
    assert_eq!(
        optimize(&input),
        main_fn(&["%r2 =l add %r1, %r1", "call $velox_print(l %r2)"])
    );

    let input = main_fn(&["%r2 =l mul 2, %r1", "call $velox_print(l %r2)"]);
    assert!(optimize(&input).contains("%r2 =l add %r1, %r1"));

    // `add %r1, %r1` is longer than `mul %r1, 2`.
    let input = main_fn(&["%r2 =l mul %r1, 2", "call $velox_print(l %r2)"]);
    assert_eq!(optimize_with(&input, &bounded()), input);
}

#[test]
fn constant_propagation_skips_calls() {
    let input = main_fn(&[
        "%r1 =l copy 5",
        "%r2 =l add %r1, %r3",
        "storel %r1, $var_x",
        "call $velox_print(l %r1, l %r2)",
    ]);
    assert_eq!(
        optimize(&input),
        main_fn(&[
            "%r1 =l copy 5",
            "%r2 =l add 5, %r3",
            "storel 5, $var_x",
            "call $velox_print(l %r1, l %r2)",
        ])
    );
}

#[test]
fn constant_propagation_needs_a_single_literal() {
    let input = main_fn(&[
        "%r1 =l copy 5",
        "storel %r1, $var_x",
        "%r1 =l copy 6",
        "storel %r1, $var_y",
    ]);
    assert_eq!(optimize(&input), input);
}

#[test]
fn bounded_propagation_keeps_long_literals() {
    let input = main_fn(&[
        "%r1 =d copy d_1.5",
        "stored %r1, $var_x",
        "call $velox_print(d %r1)",
    ]);
    assert_eq!(optimize_with(&input, &bounded()), input);
    assert!(optimize(&input).contains("stored d_1.5, $var_x"));
}

#[test]
fn dead_code_keeps_side_effects() {
    let input = main_fn(&[
        "%r1 =l add %r2, %r3",
        "%r4 =l csltl %r2, %r3",
        "%r5 =l loadl $var_x",
        "%r6 =l call $velox_input()",
        "storel %r2, $var_y",
    ]);
    assert_eq!(
        optimize(&input),
        main_fn(&[
            "%r5 =l loadl $var_x",
            "%r6 =l call $velox_input()",
            "storel %r2, $var_y",
        ])
    );
}

#[test]
fn self_use_does_not_keep_a_definition() {
    let input = main_fn(&["%r1 =l add %r1, 1"]);
    assert_eq!(optimize(&input), main_fn(&[]));
}

#[test]
fn rounds_chain_rewrites() {
    // CSE turns %r4 into %r1, which leaves %r5 and then %r1 unused.
    let input = main_fn(&[
        "%r1 =l add %r2, %r3",
        "%r4 =l add %r2, %r3",
        "%r5 =l sub %r4, %r2",
    ]);
    assert_eq!(optimize(&input), main_fn(&[]));

    let one = OptimizerConfig {
        max_rounds: 1,
        ..OptimizerConfig::default()
    };
    assert_eq!(
        optimize_with(&input, &one),
        main_fn(&["%r1 =l add %r2, %r3"])
    );

    let none = OptimizerConfig {
        max_rounds: 0,
        ..OptimizerConfig::default()
    };
    assert_eq!(optimize_with(&input, &none), input);
}

#[test]
fn lowered_program_reaches_fixed_point() {
    let text = lower_register_ir_to_target(&lower_to_register_ir(&Program {
        stmts: vec![
            Stmt::assign("x", Expr::int(2)),
            Stmt::assign(
                "y",
                Expr::binary(
                    BinOp::Add,
                    Expr::binary(BinOp::Mul, Expr::ident("x"), Expr::int(2)),
                    Expr::binary(BinOp::Mul, Expr::ident("x"), Expr::int(2)),
                ),
            ),
            Stmt::print(Expr::ident("y")),
        ],
    }));
    let once = optimize(&text);
    assert_eq!(optimize(&once), once);
    assert!(once.contains("call $velox_print(l %r"));
    assert!(once.contains("storel %r"));
    assert!(once.ends_with("\tret 0\n}\n"));
}

#[test]
fn non_instruction_lines_pass_through() {
    let input = format!(
        "# header\ndata $i0 = {{ l 2 }}\n\n{}",
        main_fn(&["blit %r1, %r2, 8"])
    );
    assert_eq!(optimize(&input), input);
}
