//! LIR optimizer.
//!
//! Each round parses the text into `LirInst` records and runs constant
//! collection, strength reduction, block-local CSE, constant propagation
//! and dead-code elimination over them. Rounds repeat until the text stops
//! changing or the round budget runs out.

use std::collections::{HashMap, HashSet};

use super::{is_literal, is_temp, parse_text, render, LirInst};

#[cfg(test)]
mod tests;

/// Round budget when none is configured.
pub const DEFAULT_MAX_ROUNDS: usize = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptimizerConfig {
    pub max_rounds: usize,
    /// Only apply rewrites that do not lengthen the rewritten line.
    pub bounded_rewrites: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            bounded_rewrites: false,
        }
    }
}

pub fn optimize(text: &str) -> String {
    optimize_with(text, &OptimizerConfig::default())
}

pub fn optimize_with(text: &str, config: &OptimizerConfig) -> String {
    let mut current = text.to_string();
    for _ in 0..config.max_rounds {
        let next = optimize_round(&current, config);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// One round of every pass.
pub fn optimize_round(text: &str, config: &OptimizerConfig) -> String {
    let mut insts = parse_text(text);
    let constants = collect_constants(&insts);
    insts = reduce_strength(insts, config);
    insts = eliminate_common_subexpressions(insts);
    insts = propagate_constants(insts, &constants, config);
    insts = eliminate_dead_code(insts);
    render(&insts)
}

// ─── Helpers ──────────────────────────────────────────────────────

fn definition_counts(insts: &[LirInst]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for dest in insts.iter().filter_map(LirInst::dest) {
        *counts.entry(dest.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Comparisons are `c` + condition + operand width (`csltl`, `cged`).
fn is_comparison(op: &str) -> bool {
    const CONDITIONS: [&str; 16] = [
        "eq", "ne", "sle", "slt", "sge", "sgt", "ule", "ult", "uge", "ugt", "le", "lt", "ge",
        "gt", "o", "uo",
    ];
    let Some(rest) = op.strip_prefix('c') else {
        return false;
    };
    let Some(cond) = rest.strip_suffix(['w', 'l', 's', 'd']) else {
        return false;
    };
    CONDITIONS.contains(&cond)
}

/// Opcodes without side effects that DCE may drop.
fn is_pure(op: &str) -> bool {
    const PURE: [&str; 12] = [
        "copy", "add", "sub", "mul", "div", "rem", "neg", "and", "or", "xor", "extsw", "sltof",
    ];
    PURE.contains(&op) || is_comparison(op)
}

/// Expressions CSE may share. Loads read memory that stores change.
fn is_cse_candidate(op: &str) -> bool {
    is_pure(op)
}

// ─── Constant collection ──────────────────────────────────────────

/// Temporaries whose every definition is `copy` of the same literal.
fn collect_constants(insts: &[LirInst]) -> HashMap<String, String> {
    let mut seen: HashMap<&str, Option<&str>> = HashMap::new();
    for inst in insts {
        let Some(dest) = inst.dest() else { continue };
        let literal = match inst {
            LirInst::Assign { op, args, .. } if op == "copy" && args.len() == 1 && is_literal(&args[0]) => {
                Some(args[0].as_str())
            }
            _ => None,
        };
        seen.entry(dest)
            .and_modify(|prev| {
                if *prev != literal {
                    *prev = None;
                }
            })
            .or_insert(literal);
    }
    seen.into_iter()
        .filter_map(|(reg, lit)| Some((reg.to_string(), lit?.to_string())))
        .collect()
}

// ─── Strength reduction ───────────────────────────────────────────

/// `mul A, 2` / `mul 2, A` → `add A, A`.
fn reduce_strength(ops: Vec<LirInst>, config: &OptimizerConfig) -> Vec<LirInst> {
    let mut out = Vec::with_capacity(ops.len());
    for inst in ops {
        if let LirInst::Assign {
            dest,
            width,
            op,
            args,
        } = &inst
        {
            if op == "mul" && args.len() == 2 {
                let other = match (args[0].as_str(), args[1].as_str()) {
                    (a, "2") => Some(a),
                    ("2", b) => Some(b),
                    _ => None,
                };
                if let Some(other) = other {
                    let rewritten = LirInst::Assign {
                        dest: dest.clone(),
                        width: *width,
                        op: "add".to_string(),
                        args: vec![other.to_string(), other.to_string()],
                    };
                    let grows = rewritten.to_string().len() > inst.to_string().len();
                    if !(config.bounded_rewrites && grows) {
                        out.push(rewritten);
                        continue;
                    }
                }
            }
        }
        out.push(inst);
    }
    out
}

// ─── Common-subexpression elimination ────────────────────────────

struct Available {
    holder: String,
    args: Vec<String>,
}

/// Replace every read of `from` with `to` until `from` is redefined.
fn substitute(insts: &mut [LirInst], from: &str, to: &str) {
    for inst in insts {
        for operand in inst.operands_mut() {
            if operand.as_str() == from {
                *operand = to.to_string();
            }
        }
        if inst.dest() == Some(from) {
            break;
        }
    }
}

fn eliminate_common_subexpressions(mut ops: Vec<LirInst>) -> Vec<LirInst> {
    let defs = definition_counts(&ops);
    let single = |reg: &str| defs.get(reg).copied() == Some(1);
    let mut removed = vec![false; ops.len()];
    let mut table: HashMap<String, Available> = HashMap::new();

    for i in 0..ops.len() {
        if ops[i].is_block_boundary() {
            table.clear();
            continue;
        }
        let Some(dest) = ops[i].dest().map(str::to_string) else {
            continue;
        };

        let key = match &ops[i] {
            LirInst::Assign {
                width, op, args, ..
            } if is_cse_candidate(op) => Some((format!("{} {} {}", width, op, args.join(", ")), args.clone())),
            _ => None,
        };

        if let Some((key, _)) = &key {
            if let Some(prev) = table.get(key) {
                if prev.holder == dest {
                    removed[i] = true;
                    continue;
                }
                if single(&prev.holder) && single(&dest) {
                    let holder = prev.holder.clone();
                    removed[i] = true;
                    substitute(&mut ops[i + 1..], &dest, &holder);
                    continue;
                }
            }
        }

        table.retain(|_, avail| avail.holder != dest && !avail.args.contains(&dest));
        if let Some((key, args)) = key {
            if !args.contains(&dest) {
                table.insert(key, Available { holder: dest, args });
            }
        }
    }

    ops.into_iter()
        .zip(removed)
        .filter_map(|(inst, gone)| (!gone).then_some(inst))
        .collect()
}

// ─── Constant propagation ─────────────────────────────────────────

fn propagate_constants(
    mut ops: Vec<LirInst>,
    constants: &HashMap<String, String>,
    config: &OptimizerConfig,
) -> Vec<LirInst> {
    for (reg, literal) in constants {
        if config.bounded_rewrites && literal.len() > reg.len() {
            continue;
        }
        let Some(first_def) = ops.iter().position(|inst| inst.dest() == Some(reg.as_str())) else {
            continue;
        };
        for inst in &mut ops[first_def + 1..] {
            if matches!(inst, LirInst::Call { .. } | LirInst::Ret(_)) || inst.dest() == Some(reg.as_str()) {
                continue;
            }
            for operand in inst.operands_mut() {
                if operand.as_str() == reg {
                    *operand = literal.clone();
                }
            }
        }
    }
    ops
}

// ─── Dead-code elimination ────────────────────────────────────────

fn eliminate_dead_code(ops: Vec<LirInst>) -> Vec<LirInst> {
    let mut used: HashSet<String> = HashSet::new();
    for inst in &ops {
        let dest = inst.dest();
        for operand in inst.operands() {
            if is_temp(operand) && Some(operand) != dest {
                used.insert(operand.to_string());
            }
        }
    }

    ops.into_iter()
        .filter(|inst| match inst {
            LirInst::Assign { dest, op, .. } => used.contains(dest) || !is_pure(op),
            _ => true,
        })
        .collect()
}
