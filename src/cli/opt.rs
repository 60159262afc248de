use std::path::PathBuf;
use std::process;

use clap::Args;

use super::{project_for, read_or_exit, report_parse_warnings, resolve_options, write_or_exit};

#[derive(Args)]
pub struct OptArgs {
    /// Input register IR file
    pub input: PathBuf,
    /// Output file (default: <input>.opt.vir)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// `velox opt`: liveness DCE over a register IR file.
pub fn cmd_opt(args: OptArgs) {
    let text = read_or_exit(&args.input);
    report_parse_warnings(&args.input, &text);
    let optimized = velox::ir::reg::liveness::eliminate_dead(&text);

    let out_path = args
        .output
        .unwrap_or_else(|| args.input.with_extension("opt.vir"));
    write_or_exit(&out_path, &optimized);

    let removed = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .count()
        .saturating_sub(optimized.lines().count());
    eprintln!("Optimized -> {} ({} lines removed)", out_path.display(), removed);
}

#[derive(Args)]
pub struct OptQbeArgs {
    /// SSA file, rewritten in place
    pub input: PathBuf,
    /// Upper bound on optimizer rounds
    #[arg(long)]
    pub rounds: Option<usize>,
}

/// `velox opt-qbe`: optimize an SSA file in place.
pub fn cmd_opt_qbe(args: OptQbeArgs) {
    let project = project_for(&args.input);
    let options = resolve_options(project.as_ref(), args.rounds);
    match velox::optimize_target_file(&args.input, &options.optimizer()) {
        Ok(removed) => eprintln!(
            "Optimized {} ({} lines removed)",
            args.input.display(),
            removed
        ),
        Err(e) => {
            eprintln!("error: {}", e.message);
            process::exit(1);
        }
    }
}
