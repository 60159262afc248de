use std::path::PathBuf;

use clap::{Args, ValueEnum};

use super::{project_for, read_or_exit, report_parse_warnings, resolve_options, write_or_exit};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LowerTarget {
    /// QBE-style SSA
    Qbe,
    /// LLVM IR text
    Llvm,
}

#[derive(Args)]
pub struct LowerArgs {
    /// Input register IR file
    pub input: PathBuf,
    /// Output dialect
    #[arg(long, value_enum, default_value = "qbe")]
    pub target: LowerTarget,
    /// Run liveness DCE first; for qbe also run the SSA optimizer
    #[arg(long)]
    pub optimize: bool,
    /// Output file (default: <input>.ssa or <input>.ll)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn cmd_lower(args: LowerArgs) {
    let text = read_or_exit(&args.input);
    report_parse_warnings(&args.input, &text);
    let options = resolve_options(project_for(&args.input).as_ref(), None);

    let source = if args.optimize {
        velox::ir::reg::liveness::eliminate_dead(&text)
    } else {
        text
    };

    let (lowered, ext) = match args.target {
        LowerTarget::Qbe => {
            let ssa = velox::ir::lir::lower::lower_register_ir_with(&source, &options.lowering());
            let ssa = if args.optimize {
                velox::ir::lir::optimize::optimize_with(&ssa, &options.optimizer())
            } else {
                ssa
            };
            (ssa, "ssa")
        }
        LowerTarget::Llvm => (
            velox::ir::native::emit_native_ir_with(&source, &options.native()),
            "ll",
        ),
    };

    let out_path = args
        .output
        .unwrap_or_else(|| args.input.with_extension(ext));
    write_or_exit(&out_path, &lowered);
    eprintln!("Lowered -> {}", out_path.display());
}
