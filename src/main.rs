mod cli;

use clap::{Parser, Subcommand};

use cli::build::{cmd_build, BuildArgs};
use cli::lower::{cmd_lower, LowerArgs};
use cli::opt::{cmd_opt, cmd_opt_qbe, OptArgs, OptQbeArgs};
use cli::run::{cmd_run, RunArgs};

#[derive(Parser)]
#[command(
    name = "velox",
    version,
    about = "Velox compiler back end: register IR, SSA and LLVM lowering"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a program tree (or project) to every artifact
    Build(BuildArgs),
    /// Liveness-optimize a register IR file
    Opt(OptArgs),
    /// Lower a register IR file to SSA or LLVM text
    Lower(LowerArgs),
    /// Optimize an SSA file in place
    OptQbe(OptQbeArgs),
    /// Execute a program tree on a reference interpreter
    Run(RunArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => cmd_build(args),
        Command::Opt(args) => cmd_opt(args),
        Command::Lower(args) => cmd_lower(args),
        Command::OptQbe(args) => cmd_opt_qbe(args),
        Command::Run(args) => cmd_run(args),
    }
}
