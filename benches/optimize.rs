//! Optimizer throughput on synthetic straight-line programs.
//!
//! Measures:
//! 1. Register IR generation from a program tree
//! 2. Liveness DCE over the register IR
//! 3. SSA lowering
//! 4. SSA optimizer (default round bound)

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use velox::ast::{BinOp, Expr, Program, Stmt};
use velox::ir::lir::lower::lower_register_ir_to_target;
use velox::ir::lir::optimize::optimize;
use velox::ir::reg::builder::lower_to_register_ir;
use velox::ir::reg::liveness::eliminate_dead;

/// Chain of `n` assignments with repeated subexpressions, a few dead ones,
/// and a print at the end.
fn synthetic_program(n: usize) -> Program {
    let mut stmts = vec![Stmt::assign("v0", Expr::int(1))];
    for i in 1..n {
        let prev = format!("v{}", i - 1);
        let value = match i % 4 {
            0 => Expr::binary(BinOp::Mul, Expr::ident(&prev), Expr::int(2)),
            1 => Expr::binary(BinOp::Add, Expr::ident(&prev), Expr::ident(&prev)),
            2 => Expr::binary(BinOp::Sub, Expr::ident(&prev), Expr::int(0)),
            _ => Expr::binary(BinOp::Mod, Expr::ident(&prev), Expr::int(97)),
        };
        stmts.push(Stmt::assign(&format!("v{}", i), value));
        if i % 5 == 0 {
            stmts.push(Stmt::Expr(Expr::binary(
                BinOp::Add,
                Expr::ident(&prev),
                Expr::int(1),
            )));
        }
    }
    stmts.push(Stmt::print(Expr::ident(&format!("v{}", n - 1))));
    Program { stmts }
}

fn bench_register_ir(c: &mut Criterion) {
    let program = synthetic_program(200);
    let text = lower_to_register_ir(&program);

    let mut group = c.benchmark_group("register_ir");
    group.bench_function("generate_200", |b| {
        b.iter(|| lower_to_register_ir(black_box(&program)))
    });
    group.bench_function("liveness_200", |b| {
        b.iter(|| eliminate_dead(black_box(&text)))
    });
    group.finish();
}

fn bench_ssa(c: &mut Criterion) {
    let mut group = c.benchmark_group("ssa");
    for n in [50, 200] {
        let reg = eliminate_dead(&lower_to_register_ir(&synthetic_program(n)));
        let ssa = lower_register_ir_to_target(&reg);
        group.bench_function(format!("lower_{}", n), |b| {
            b.iter(|| lower_register_ir_to_target(black_box(&reg)))
        });
        group.bench_function(format!("optimize_{}", n), |b| {
            b.iter(|| optimize(black_box(&ssa)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_register_ir, bench_ssa);
criterion_main!(benches);
