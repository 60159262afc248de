use std::path::PathBuf;
use std::process;

use clap::{Args, ValueEnum};
use velox::ArtifactKind;

use super::{load_program_or_exit, resolve_input, resolve_options, stem_of};

/// Artifact selector for `--emit`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Emit {
    /// Array bytecode listing
    Bytecode,
    /// Register IR
    Vir,
    /// Register IR after liveness DCE
    OptVir,
    /// QBE-style SSA
    Ssa,
    /// Optimized QBE-style SSA
    OptSsa,
    /// LLVM IR text
    Ll,
}

impl From<Emit> for ArtifactKind {
    fn from(emit: Emit) -> Self {
        match emit {
            Emit::Bytecode => ArtifactKind::Bytecode,
            Emit::Vir => ArtifactKind::RegisterIr,
            Emit::OptVir => ArtifactKind::RegisterIrOpt,
            Emit::Ssa => ArtifactKind::Target,
            Emit::OptSsa => ArtifactKind::TargetOpt,
            Emit::Ll => ArtifactKind::Native,
        }
    }
}

#[derive(Args)]
pub struct BuildArgs {
    /// Input .json program tree or directory with velox.toml
    pub input: PathBuf,
    /// Artifacts to write (default: all)
    #[arg(long, value_enum, value_delimiter = ',')]
    pub emit: Vec<Emit>,
    /// Output directory (default: next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Upper bound on SSA optimizer rounds
    #[arg(long)]
    pub rounds: Option<usize>,
}

pub fn cmd_build(args: BuildArgs) {
    let ri = resolve_input(&args.input);
    let options = resolve_options(ri.project.as_ref(), args.rounds);
    let kinds: Vec<ArtifactKind> = if args.emit.is_empty() {
        ArtifactKind::ALL.to_vec()
    } else {
        args.emit.iter().map(|&e| e.into()).collect()
    };

    let out_dir = args.output.unwrap_or_else(|| {
        ri.entry
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let stem = match &ri.project {
        Some(project) => project.name.clone(),
        None => stem_of(&ri.entry),
    };

    eprintln!("Compiling {}...", ri.entry.display());
    let program = load_program_or_exit(&ri.entry);
    let artifacts = velox::compile(&program, &options);

    let written = match artifacts.write(&out_dir, &stem, &kinds) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("error: {}", e.message);
            process::exit(1);
        }
    };
    for path in &written {
        eprintln!("  -> {}", path.display());
    }

    let before = artifacts.target.lines().count();
    let after = artifacts.target_opt.lines().count();
    eprintln!(
        "Compiled {} ({} SSA lines, {} after optimization)",
        stem, before, after
    );
}
