use std::path::PathBuf;
use std::process;

use clap::{Args, ValueEnum};
use velox::runtime::{BytecodeMachine, ProgramInput, RegMachine, Runner, DEFAULT_STEP_LIMIT};

use super::load_program_or_exit;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Engine {
    /// Array bytecode interpreter
    Bytecode,
    /// Register IR interpreter (after liveness DCE)
    Ir,
}

#[derive(Args)]
pub struct RunArgs {
    /// Input .json program tree
    pub input: PathBuf,
    /// Which lowering to execute
    #[arg(long, value_enum, default_value = "bytecode")]
    pub engine: Engine,
    /// Line returned by `input()`; repeat for successive calls
    #[arg(long = "input-line", value_name = "LINE")]
    pub input_lines: Vec<String>,
    /// Instruction budget
    #[arg(long, default_value_t = DEFAULT_STEP_LIMIT)]
    pub steps: u64,
}

pub fn cmd_run(args: RunArgs) {
    let program = load_program_or_exit(&args.input);
    let input = ProgramInput {
        lines: args.input_lines,
    };

    let result = match args.engine {
        Engine::Bytecode => {
            let bytecode = velox::ir::bytecode::lower_to_bytecode(&program);
            BytecodeMachine::new(&bytecode)
                .with_step_limit(args.steps)
                .run(&input)
        }
        Engine::Ir => {
            let text = velox::ir::reg::builder::lower_to_register_ir(&program);
            let optimized = velox::ir::reg::liveness::eliminate_dead(&text);
            let reg = velox::ir::reg::parse::parse_program(&optimized).program;
            RegMachine::new(&reg).with_step_limit(args.steps).run(&input)
        }
    };

    match result {
        Ok(result) => {
            for line in &result.output {
                println!("{}", line);
            }
            eprintln!("Executed {} steps", result.steps);
        }
        Err(e) => {
            eprintln!("error: {}", e.message);
            process::exit(1);
        }
    }
}
