//! Pipeline entry points and the file boundary.
//!
//! The transforms in `ir` are infallible text-to-text functions. Everything
//! that touches the filesystem lives here and reports failures as a
//! `Diagnostic`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::Program;
use crate::diagnostic::Diagnostic;
use crate::ir::bytecode::{lower_to_bytecode, BytecodeProgram};
use crate::ir::lir::lower::{lower_register_ir_with, LowerOptions, DEFAULT_RUNTIME_PREFIX};
use crate::ir::lir::optimize::{optimize_with, OptimizerConfig, DEFAULT_MAX_ROUNDS};
use crate::ir::native::{emit_native_ir_with, NativeOptions, DEFAULT_TRIPLE};
use crate::ir::reg::builder::RegIrBuilder;
use crate::ir::reg::liveness::eliminate_dead;
use crate::span::Span;

#[cfg(test)]
mod tests;

/// Options shared by every stage of one compilation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    /// Upper bound on LIR optimizer rounds.
    pub rounds: usize,
    /// Restrict LIR rewrites to ones that do not lengthen a line.
    pub bounded_rewrites: bool,
    /// Prefix of runtime library entry points.
    pub runtime_prefix: String,
    /// LLVM target triple.
    pub triple: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_MAX_ROUNDS,
            bounded_rewrites: false,
            runtime_prefix: DEFAULT_RUNTIME_PREFIX.to_string(),
            triple: DEFAULT_TRIPLE.to_string(),
        }
    }
}

impl CompileOptions {
    pub fn optimizer(&self) -> OptimizerConfig {
        OptimizerConfig {
            max_rounds: self.rounds,
            bounded_rewrites: self.bounded_rewrites,
        }
    }

    pub fn lowering(&self) -> LowerOptions {
        LowerOptions {
            runtime_prefix: self.runtime_prefix.clone(),
        }
    }

    pub fn native(&self) -> NativeOptions {
        NativeOptions {
            triple: self.triple.clone(),
            runtime_prefix: self.runtime_prefix.clone(),
        }
    }
}

// ─── Whole pipeline ───────────────────────────────────────────────

/// One artifact of a compilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Bytecode,
    RegisterIr,
    RegisterIrOpt,
    Target,
    TargetOpt,
    Native,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 6] = [
        ArtifactKind::Bytecode,
        ArtifactKind::RegisterIr,
        ArtifactKind::RegisterIrOpt,
        ArtifactKind::Target,
        ArtifactKind::TargetOpt,
        ArtifactKind::Native,
    ];

    /// File name suffix, appended to the program stem.
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Bytecode => "bc.txt",
            ArtifactKind::RegisterIr => "vir",
            ArtifactKind::RegisterIrOpt => "opt.vir",
            ArtifactKind::Target => "ssa",
            ArtifactKind::TargetOpt => "opt.ssa",
            ArtifactKind::Native => "ll",
        }
    }
}

/// Everything one compilation produces.
#[derive(Clone, Debug)]
pub struct Artifacts {
    pub bytecode: BytecodeProgram,
    pub register_ir: String,
    /// Register IR after liveness DCE.
    pub register_ir_opt: String,
    pub target: String,
    pub target_opt: String,
    pub native: String,
}

impl Artifacts {
    pub fn text(&self, kind: ArtifactKind) -> String {
        match kind {
            ArtifactKind::Bytecode => self.bytecode.listing(),
            ArtifactKind::RegisterIr => self.register_ir.clone(),
            ArtifactKind::RegisterIrOpt => self.register_ir_opt.clone(),
            ArtifactKind::Target => self.target.clone(),
            ArtifactKind::TargetOpt => self.target_opt.clone(),
            ArtifactKind::Native => self.native.clone(),
        }
    }

    /// Write the selected artifacts as `<dir>/<stem>.<ext>`.
    pub fn write(
        &self,
        dir: &Path,
        stem: &str,
        kinds: &[ArtifactKind],
    ) -> Result<Vec<PathBuf>, Diagnostic> {
        fs::create_dir_all(dir).map_err(|e| io_error("create", dir, e))?;
        let mut written = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let path = dir.join(format!("{}.{}", stem, kind.extension()));
            write_text(&path, &self.text(*kind))?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Run every stage on one program.
///
/// The register IR is generated once; the LIR path and the native path
/// both consume the liveness-optimized text.
pub fn compile(program: &Program, options: &CompileOptions) -> Artifacts {
    let bytecode = lower_to_bytecode(program);
    let register_ir = RegIrBuilder::new().build_program(program).to_string();
    let register_ir_opt = eliminate_dead(&register_ir);
    let target = lower_register_ir_with(&register_ir_opt, &options.lowering());
    let target_opt = optimize_with(&target, &options.optimizer());
    let native = emit_native_ir_with(&register_ir_opt, &options.native());
    Artifacts {
        bytecode,
        register_ir,
        register_ir_opt,
        target,
        target_opt,
        native,
    }
}

// ─── File boundary ────────────────────────────────────────────────

fn io_error(action: &str, path: &Path, e: std::io::Error) -> Diagnostic {
    Diagnostic::error(
        format!("cannot {} '{}': {}", action, path.display(), e),
        Span::dummy(),
    )
}

pub fn read_text(path: &Path) -> Result<String, Diagnostic> {
    fs::read_to_string(path).map_err(|e| io_error("read", path, e))
}

pub fn write_text(path: &Path, text: &str) -> Result<(), Diagnostic> {
    fs::write(path, text).map_err(|e| io_error("write", path, e))
}

/// Byte offset of a 1-based line/column pair.
fn offset_of(text: &str, line: usize, column: usize) -> u32 {
    let start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (start + column.saturating_sub(1)).min(text.len()) as u32
}

/// Parse a JSON program tree.
pub fn parse_program_json(text: &str) -> Result<Program, Diagnostic> {
    serde_json::from_str(text).map_err(|e| {
        let at = offset_of(text, e.line(), e.column());
        Diagnostic::error(
            format!("invalid program tree: {}", e),
            Span::new(at, (at + 1).min(text.len() as u32).max(at)),
        )
        .with_help("expected the JSON form of `ast::Program`".to_string())
    })
}

/// Load a JSON program tree from disk.
pub fn load_program(path: &Path) -> Result<Program, Diagnostic> {
    parse_program_json(&read_text(path)?)
}

/// Liveness-optimize a register IR file and return the result.
pub fn optimize_register_ir_file(path: &Path) -> Result<String, Diagnostic> {
    Ok(eliminate_dead(&read_text(path)?))
}

/// Optimize a LIR file in place. Returns the number of lines removed.
pub fn optimize_target_file(path: &Path, config: &OptimizerConfig) -> Result<usize, Diagnostic> {
    let before = read_text(path)?;
    let after = optimize_with(&before, config);
    write_text(path, &after)?;
    Ok(before.lines().count().saturating_sub(after.lines().count()))
}
