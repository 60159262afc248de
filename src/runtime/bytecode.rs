use std::collections::HashMap;
use std::mem;

use crate::diagnostic::Diagnostic;
use crate::ir::bytecode::{Bytecode, BytecodeProgram, Const, Slot, VReg};

use super::{runtime_error, ExecutionResult, Io, ProgramInput, Runner, Value, DEFAULT_STEP_LIMIT};

/// Executes array bytecode.
///
/// Calls bind arguments into the callee's parameter slots, which are part
/// of the one flat slot table, and jump to the entry index. Registers are
/// per activation. A `RETURN` with no caller ends the program.
pub struct BytecodeMachine<'a> {
    program: &'a BytecodeProgram,
    step_limit: u64,
}

struct Frame {
    return_pc: usize,
    dst: VReg,
    /// Caller's registers, restored on return.
    regs: Vec<Option<Value>>,
}

struct State {
    regs: Vec<Option<Value>>,
    slots: Vec<Option<Value>>,
}

impl State {
    fn read(&self, reg: VReg) -> Result<Value, String> {
        self.regs
            .get(reg.0 as usize)
            .cloned()
            .flatten()
            .ok_or_else(|| format!("register {} read before definition", reg))
    }

    fn write(&mut self, reg: VReg, value: Value) {
        let i = reg.0 as usize;
        if i >= self.regs.len() {
            self.regs.resize(i + 1, None);
        }
        self.regs[i] = Some(value);
    }

    fn load(&self, slot: Slot, names: &[String]) -> Result<Value, String> {
        self.slots
            .get(slot.0 as usize)
            .cloned()
            .flatten()
            .ok_or_else(|| {
                let name = names.get(slot.0 as usize).map(String::as_str).unwrap_or("?");
                format!("variable '{}' read before assignment", name)
            })
    }

    fn store(&mut self, slot: Slot, value: Value) {
        let i = slot.0 as usize;
        if i >= self.slots.len() {
            self.slots.resize(i + 1, None);
        }
        self.slots[i] = Some(value);
    }
}

impl<'a> BytecodeMachine<'a> {
    pub fn new(program: &'a BytecodeProgram) -> Self {
        Self {
            program,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    fn execute(&self, io: &mut Io) -> Result<(), (usize, String)> {
        let code = &self.program.code;
        let mut functions: HashMap<&str, (usize, &[Slot])> = HashMap::new();
        for op in code {
            if let Bytecode::FunctionDef {
                name,
                params,
                entry,
                ..
            } = op
            {
                functions.insert(name.as_str(), (*entry, params.as_slice()));
            }
        }

        let mut state = State {
            regs: Vec::new(),
            slots: vec![None; self.program.slots.len()],
        };
        let mut frames: Vec<Frame> = Vec::new();
        let mut pc = 0usize;

        while pc < code.len() {
            let at = pc;
            let fail = |msg: String| (at, msg);
            io.step().map_err(fail)?;

            match &code[pc] {
                Bytecode::LoadConst { dst, value } => {
                    let value = match value {
                        Const::Int(v) => Value::Int(*v),
                        Const::Float(v) => Value::Float(*v),
                        Const::Str(s) => Value::Str(s.clone()),
                    };
                    state.write(*dst, value);
                }
                Bytecode::LoadName { dst, slot } => {
                    let value = state.load(*slot, &self.program.slots).map_err(fail)?;
                    state.write(*dst, value);
                }
                Bytecode::StoreName { slot, src } => {
                    let value = state.read(*src).map_err(fail)?;
                    state.store(*slot, value);
                }
                Bytecode::Print { args } => {
                    let values = args
                        .iter()
                        .map(|a| state.read(*a))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(fail)?;
                    io.print(&values);
                }
                Bytecode::Input { dst, prompt } => {
                    if let Some(prompt) = prompt {
                        state.read(*prompt).map_err(fail)?;
                    }
                    let line = io.read_line().map_err(fail)?;
                    state.write(*dst, line);
                }
                Bytecode::ToInt { dst, src } => {
                    let value = state.read(*src).and_then(|v| v.to_int()).map_err(fail)?;
                    state.write(*dst, value);
                }
                Bytecode::ToFloat { dst, src } => {
                    let value = state.read(*src).and_then(|v| v.to_float()).map_err(fail)?;
                    state.write(*dst, value);
                }
                Bytecode::Binary { op, dst, lhs, rhs } => {
                    let a = state.read(*lhs).map_err(fail)?;
                    let b = state.read(*rhs).map_err(fail)?;
                    let value = Value::binary(*op, &a, &b).map_err(fail)?;
                    state.write(*dst, value);
                }
                Bytecode::Unary { op, dst, src } => {
                    let value = state
                        .read(*src)
                        .and_then(|v| Value::unary(*op, &v))
                        .map_err(fail)?;
                    state.write(*dst, value);
                }
                Bytecode::Jump { target } => {
                    pc = *target;
                    continue;
                }
                Bytecode::JumpIfFalse { cond, target } => {
                    if !state.read(*cond).map_err(fail)?.truthy() {
                        pc = *target;
                        continue;
                    }
                }
                Bytecode::Break { target } | Bytecode::Continue { target } => match target {
                    Some(t) => {
                        pc = *t;
                        continue;
                    }
                    None => return Err(fail("loop control outside of a loop".to_string())),
                },
                Bytecode::FunctionDef { end, .. } => {
                    pc = *end;
                    continue;
                }
                Bytecode::Call { name, args, dst } => {
                    let (entry, params) = *functions
                        .get(name.as_str())
                        .ok_or_else(|| fail(format!("unknown function '{}'", name)))?;
                    if params.len() != args.len() {
                        return Err(fail(format!(
                            "'{}' expects {} arguments, got {}",
                            name,
                            params.len(),
                            args.len()
                        )));
                    }
                    let values = args
                        .iter()
                        .map(|a| state.read(*a))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(fail)?;
                    for (slot, value) in params.iter().zip(values) {
                        state.store(*slot, value);
                    }
                    frames.push(Frame {
                        return_pc: pc + 1,
                        dst: *dst,
                        regs: mem::take(&mut state.regs),
                    });
                    pc = entry;
                    continue;
                }
                Bytecode::Return { value } => {
                    let value = match value {
                        Some(v) => state.read(*v).map_err(fail)?,
                        None => Value::Int(0),
                    };
                    match frames.pop() {
                        Some(frame) => {
                            state.regs = frame.regs;
                            state.write(frame.dst, value);
                            pc = frame.return_pc;
                            continue;
                        }
                        None => return Ok(()),
                    }
                }
            }
            pc += 1;
        }
        Ok(())
    }
}

impl Runner for BytecodeMachine<'_> {
    fn run(&self, input: &ProgramInput) -> Result<ExecutionResult, Diagnostic> {
        let mut io = Io::new(input, self.step_limit);
        self.execute(&mut io).map_err(|(pc, msg)| {
            runtime_error(msg, format!("at bytecode instruction {}", pc))
        })?;
        Ok(io.finish())
    }
}
