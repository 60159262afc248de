use crate::ir::reg::Reg;

/// What the emitter knows about a register's value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegType {
    #[default]
    Unknown,
    Int,
    Float,
    Str,
}

impl RegType {
    /// LLVM type of a register holding this kind of value.
    pub fn llvm(self) -> Option<&'static str> {
        match self {
            RegType::Unknown => None,
            RegType::Int => Some("i64"),
            RegType::Float => Some("double"),
            RegType::Str => Some("ptr"),
        }
    }
}

/// Growable per-register type table, indexed by register number.
#[derive(Clone, Debug, Default)]
pub struct RegTypes {
    types: Vec<RegType>,
}

impl RegTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reg: Reg) -> RegType {
        self.types.get(reg.0 as usize).copied().unwrap_or_default()
    }

    pub fn set(&mut self, reg: Reg, ty: RegType) {
        let i = reg.0 as usize;
        if i >= self.types.len() {
            self.types.resize(i + 1, RegType::Unknown);
        }
        self.types[i] = ty;
    }

    pub fn clear(&mut self) {
        self.types.clear();
    }
}
