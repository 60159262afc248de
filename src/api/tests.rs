use std::fs;

use super::*;
use crate::ast::{BinOp, Expr, Stmt};
use crate::runtime::{BytecodeMachine, ProgramInput, RegMachine, Runner};

const SCENARIO: &str = r#"{"stmts": [
    {"assign": {"target": {"ident": "x"}, "value": {"int": 2}}},
    {"assign": {"target": {"ident": "y"},
                "value": {"binary": {"op": "add", "lhs": {"ident": "x"}, "rhs": {"int": 3}}}}},
    {"print": [{"ident": "y"}]}
]}"#;

#[test]
fn compile_runs_every_stage() {
    let program = parse_program_json(SCENARIO).unwrap();
    let artifacts = compile(&program, &CompileOptions::default());

    assert!(artifacts.bytecode.listing().contains("   4: ADD %r3, %r1, %r2"));
    assert!(artifacts.register_ir.contains("r3 = add r2, r1"));
    assert_eq!(
        artifacts.register_ir_opt.lines().count(),
        artifacts
            .register_ir
            .lines()
            .filter(|l| !l.trim().is_empty())
            .count()
    );
    assert!(artifacts.target.contains("\tcall $velox_print(l %r4)"));
    assert!(artifacts.target_opt.contains("\tcall $velox_print(l %r4)"));
    assert!(artifacts.native.contains("define i32 @main()"));

    let input = ProgramInput::default();
    let by_bytecode = BytecodeMachine::new(&artifacts.bytecode).run(&input).unwrap();
    let reg = crate::ir::reg::parse::parse_program(&artifacts.register_ir_opt).program;
    let by_register_ir = RegMachine::new(&reg).run(&input).unwrap();
    assert_eq!(by_bytecode.output, vec!["5"]);
    assert_eq!(by_register_ir.output, by_bytecode.output);
}

#[test]
fn options_reach_every_stage() {
    let program = Program {
        stmts: vec![Stmt::print(Expr::binary(
            BinOp::Mul,
            Expr::int(4),
            Expr::int(2),
        ))],
    };
    let options = CompileOptions {
        rounds: 0,
        bounded_rewrites: true,
        runtime_prefix: "rt_".to_string(),
        triple: "riscv64-unknown-linux-gnu".to_string(),
    };
    let artifacts = compile(&program, &options);
    assert!(artifacts.target.contains("$rt_print"));
    assert_eq!(artifacts.target_opt, artifacts.target);
    assert!(artifacts.native.contains("target triple = \"riscv64-unknown-linux-gnu\""));
    assert!(artifacts.native.contains("declare ptr @rt_input()"));
    assert_eq!(
        options.optimizer(),
        OptimizerConfig {
            max_rounds: 0,
            bounded_rewrites: true
        }
    );
}

#[test]
fn invalid_json_points_at_the_error() {
    let text = "{\"stmts\": [\n  {\"print\": 5}\n]}";
    let err = parse_program_json(text).unwrap_err();
    assert!(err.is_error());
    assert!(err.message.starts_with("invalid program tree"));
    let line_start = text.find("  {").unwrap() as u32;
    assert!(err.span.start > line_start);
    assert!(err.span.start as usize <= text.len());
}

#[test]
fn load_and_write_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join("prog.json");
    fs::write(&tree, SCENARIO).unwrap();

    let program = load_program(&tree).unwrap();
    let artifacts = compile(&program, &CompileOptions::default());
    let out = dir.path().join("out");
    let written = artifacts.write(&out, "prog", &ArtifactKind::ALL).unwrap();

    assert_eq!(written.len(), 6);
    assert!(out.join("prog.vir").exists());
    assert!(out.join("prog.opt.ssa").exists());
    assert_eq!(
        fs::read_to_string(out.join("prog.ll")).unwrap(),
        artifacts.native
    );
    assert!(fs::read_to_string(out.join("prog.bc.txt"))
        .unwrap()
        .starts_with("Bytecode:\n"));
}

#[test]
fn missing_file_is_a_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_program(&dir.path().join("nope.json")).unwrap_err();
    assert!(err.message.starts_with("cannot read"));
}

#[test]
fn target_file_is_optimized_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.ssa");
    fs::write(
        &path,
        "export function w $main() {\n@start\n\t%r1 =l add %r2, %r3\n\t%r4 =l add %r2, %r3\n\tcall $velox_print(l %r4)\n\tret 0\n}\n",
    )
    .unwrap();

    let removed = optimize_target_file(&path, &OptimizerConfig::default()).unwrap();
    assert_eq!(removed, 1);
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\tcall $velox_print(l %r1)\n"));
    assert!(!text.contains("%r4"));
}

#[test]
fn register_ir_file_is_liveness_optimized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.vir");
    fs::write(
        &path,
        "function main() {\n    r0 = load_name a\n    r1 = add r0, r0\n    ret\n}\n",
    )
    .unwrap();
    let out = optimize_register_ir_file(&path).unwrap();
    assert!(!out.contains("add"));
    assert!(!out.contains("load_name"));
    assert!(out.contains("ret"));
}
