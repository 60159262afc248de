//! Dead-instruction elimination over register IR text.
//!
//! Every instruction line is parsed into a definition and a use set with
//! the shared line grammar. Side-effecting instructions (stores, jumps,
//! returns, loop control, calls without a destination) are roots. A
//! backward sweep keeps a definition only while something later reads
//! it; only kept instructions contribute uses. The sweep repeats until
//! the kept set stops changing, so the result is a fixed point.
//!
//! Lines that are not instructions (data, function braces, labels,
//! comments, text the grammar rejects) are always kept. Empty lines are
//! dropped.

use std::collections::HashSet;

use super::parse::{parse_line, Line};
use super::Reg;

struct Record<'a> {
    text: &'a str,
    def: Option<Reg>,
    uses: Vec<Reg>,
    root: bool,
}

impl<'a> Record<'a> {
    fn from_line(text: &'a str) -> Record<'a> {
        match parse_line(text) {
            Ok(Line::Op(op)) => Record {
                text,
                def: op.def(),
                uses: op.uses(),
                root: op.is_root() || op.def().is_none(),
            },
            _ => Record {
                text,
                def: None,
                uses: Vec::new(),
                root: true,
            },
        }
    }
}

/// Registers read by a kept line before any line above it defines them.
/// Their value can only arrive along a backward jump, so they are live at
/// the bottom of the sweep.
fn upward_exposed(records: &[Record], alive: &[bool]) -> HashSet<Reg> {
    let mut defined: HashSet<Reg> = HashSet::new();
    let mut exposed: HashSet<Reg> = HashSet::new();
    for (record, keep) in records.iter().zip(alive) {
        if *keep {
            exposed.extend(record.uses.iter().filter(|u| !defined.contains(u)));
        }
        if let Some(def) = record.def {
            defined.insert(def);
        }
    }
    exposed
}

/// Remove instructions whose result is never read.
pub fn eliminate_dead(text: &str) -> String {
    let records: Vec<Record> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(Record::from_line)
        .collect();

    let mut alive: Vec<bool> = records.iter().map(|r| r.root).collect();
    loop {
        let mut live = upward_exposed(&records, &alive);
        let mut next = vec![false; records.len()];
        for (i, record) in records.iter().enumerate().rev() {
            let keep = record.root || record.def.is_some_and(|d| live.contains(&d));
            if !keep {
                continue;
            }
            next[i] = true;
            if let Some(def) = record.def {
                live.remove(&def);
            }
            live.extend(record.uses.iter().copied());
        }
        if next == alive {
            break;
        }
        alive = next;
    }

    let mut out = String::new();
    for (record, keep) in records.iter().zip(alive.iter()) {
        if *keep {
            out.push_str(record.text);
            out.push('\n');
        }
    }
    out
}
