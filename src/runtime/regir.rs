use std::collections::HashMap;

use crate::diagnostic::Diagnostic;
use crate::ir::reg::{DataLabel, DataValue, Function, Label, Reg, RegOp, RegProgram};

use super::{runtime_error, ExecutionResult, Io, ProgramInput, Runner, Value, DEFAULT_STEP_LIMIT};

/// Nested user calls allowed before execution stops.
pub const MAX_CALL_DEPTH: usize = 256;

/// Executes register IR starting at `main`.
///
/// Registers are local to each activation, variables are global, and
/// `print`, `input`, `toint`, `tofloat` are built in.
pub struct RegMachine<'a> {
    program: &'a RegProgram,
    step_limit: u64,
}

struct Globals<'a> {
    data: HashMap<DataLabel, &'a DataValue>,
    vars: HashMap<String, Value>,
    io: Io,
}

impl<'a> RegMachine<'a> {
    pub fn new(program: &'a RegProgram) -> Self {
        Self {
            program,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    fn call(
        &self,
        func: &'a Function,
        args: Vec<Value>,
        globals: &mut Globals<'a>,
        depth: usize,
    ) -> Result<Value, (String, String)> {
        let at = |pc: usize| format!("in function '{}' at instruction {}", func.name, pc);
        if depth > MAX_CALL_DEPTH {
            return Err((
                format!("call depth exceeds {}", MAX_CALL_DEPTH),
                at(0),
            ));
        }
        if args.len() != func.params.len() {
            return Err((
                format!(
                    "'{}' expects {} arguments, got {}",
                    func.name,
                    func.params.len(),
                    args.len()
                ),
                at(0),
            ));
        }

        let labels: HashMap<&Label, usize> = func
            .body
            .iter()
            .enumerate()
            .filter_map(|(i, op)| match op {
                RegOp::Label(l) => Some((l, i)),
                _ => None,
            })
            .collect();
        let mut regs: HashMap<Reg, Value> = func.params.iter().copied().zip(args).collect();
        let read = |regs: &HashMap<Reg, Value>, r: &Reg| {
            regs.get(r)
                .cloned()
                .ok_or_else(|| format!("register {} read before definition", r))
        };
        let jump = |label: &Label| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| format!("unknown label {}", label))
        };

        let mut pc = 0usize;
        while pc < func.body.len() {
            let here = pc;
            let fail = |msg: String| (msg, at(here));
            globals.io.step().map_err(fail)?;

            match &func.body[pc] {
                RegOp::LoadData { dst, data } => {
                    let value = match globals.data.get(data) {
                        Some(DataValue::Int(v)) => Value::Int(*v),
                        Some(DataValue::Float(v)) => Value::Float(*v),
                        Some(DataValue::Str(s)) => Value::Str(s.clone()),
                        None => return Err(fail(format!("undeclared data {}", data))),
                    };
                    regs.insert(*dst, value);
                }
                RegOp::LoadName { dst, name } => {
                    let value = globals
                        .vars
                        .get(name)
                        .cloned()
                        .ok_or_else(|| fail(format!("variable '{}' read before assignment", name)))?;
                    regs.insert(*dst, value);
                }
                RegOp::StoreName { name, src } => {
                    let value = read(&regs, src).map_err(fail)?;
                    globals.vars.insert(name.clone(), value);
                }
                RegOp::Binary { op, dst, lhs, rhs } => {
                    let a = read(&regs, lhs).map_err(fail)?;
                    let b = read(&regs, rhs).map_err(fail)?;
                    regs.insert(*dst, Value::binary(*op, &a, &b).map_err(fail)?);
                }
                RegOp::Unary { op, dst, src } => {
                    let v = read(&regs, src).map_err(fail)?;
                    regs.insert(*dst, Value::unary(*op, &v).map_err(fail)?);
                }
                RegOp::Call { dst, callee, args } => {
                    let values = args
                        .iter()
                        .map(|a| read(&regs, a))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(fail)?;
                    let result = match callee.as_str() {
                        "print" => {
                            globals.io.print(&values);
                            Value::Int(0)
                        }
                        "input" => globals.io.read_line().map_err(fail)?,
                        "toint" | "tofloat" => {
                            let [value] = values.as_slice() else {
                                return Err(fail(format!("{} takes one argument", callee)));
                            };
                            let converted = if callee == "toint" {
                                value.to_int()
                            } else {
                                value.to_float()
                            };
                            converted.map_err(fail)?
                        }
                        name => {
                            let target = self
                                .program
                                .function(name)
                                .ok_or_else(|| fail(format!("unknown function '{}'", name)))?;
                            self.call(target, values, globals, depth + 1)?
                        }
                    };
                    if let Some(dst) = dst {
                        regs.insert(*dst, result);
                    }
                }
                RegOp::Jump(label) => {
                    pc = jump(label).map_err(fail)?;
                    continue;
                }
                RegOp::JumpIfFalse { cond, target } => {
                    if !read(&regs, cond).map_err(fail)?.truthy() {
                        pc = jump(target).map_err(fail)?;
                        continue;
                    }
                }
                RegOp::Label(_) | RegOp::Comment(_) => {}
                RegOp::Break | RegOp::Continue => {
                    return Err(fail("unresolved loop control".to_string()));
                }
                RegOp::Ret(value) => {
                    return match value {
                        Some(r) => read(&regs, r).map_err(fail),
                        None => Ok(Value::Int(0)),
                    };
                }
            }
            pc += 1;
        }
        Ok(Value::Int(0))
    }
}

impl Runner for RegMachine<'_> {
    fn run(&self, input: &ProgramInput) -> Result<ExecutionResult, Diagnostic> {
        let main = self.program.function("main").ok_or_else(|| {
            runtime_error("no main function".to_string(), "in register IR".to_string())
        })?;
        let mut globals = Globals {
            data: self.program.data.iter().map(|d| (d.label, &d.value)).collect(),
            vars: HashMap::new(),
            io: Io::new(input, self.step_limit),
        };
        self.call(main, Vec::new(), &mut globals, 0)
            .map_err(|(msg, location)| runtime_error(msg, location))?;
        Ok(globals.io.finish())
    }
}
