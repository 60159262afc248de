//! Intermediate representations between the program tree and target text.
//!
//! ```text
//! Program ─┬─▶ bytecode            array bytecode (interpreter form)
//!          └─▶ reg ──▶ liveness ──┬─▶ lir ──▶ lir::optimize   (QBE-style SSA)
//!                                  └─▶ native                 (LLVM text)
//! ```
//!
//! `reg` is the hub. Its text form is the hand-off format between stages,
//! and `reg::parse` is the one reader every downstream stage uses.

pub mod bytecode;
pub mod lir;
pub mod native;
pub mod reg;
