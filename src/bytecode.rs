//! The flat instruction program the parser emits and the interpreter walks.

use std::collections::VecDeque;
use std::fmt;

use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    LoadName,
    LoadArgument,
    LoadConstant,
    LoadSubEval,
    StoreName,
    Concat,
    CallFunction,
    ReturnValue,
    LoadDataAttribute,
}

impl Opcode {
    /// Opcodes that leave a value on the active frame.
    pub fn produces_value(self) -> bool {
        matches!(
            self,
            Opcode::LoadName
                | Opcode::LoadConstant
                | Opcode::LoadSubEval
                | Opcode::LoadDataAttribute
                | Opcode::Concat
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Index of the token the instruction came from.
    pub token: Option<usize>,
}

impl Instruction {
    pub fn new(opcode: Opcode, token: usize) -> Self {
        Instruction {
            opcode,
            token: Some(token),
        }
    }

    pub fn bare(opcode: Opcode) -> Self {
        Instruction {
            opcode,
            token: None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.token {
            Some(token) => write!(f, "{:?}({})", self.opcode, token),
            None => write!(f, "{:?}", self.opcode),
        }
    }
}

/// Instructions plus the three side queues they consume in FIFO order:
/// names for `LoadName`/`StoreName`, flag names for `LoadArgument` and
/// literals for `LoadConstant`/`LoadSubEval`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructionStack {
    pub instructions: Vec<Instruction>,
    pub names: VecDeque<String>,
    pub arguments: VecDeque<String>,
    pub values: VecDeque<Value>,
}

impl InstructionStack {
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.instructions.iter().map(|i| i.opcode).collect()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for InstructionStack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let listing: Vec<String> = self.instructions.iter().map(|i| i.to_string()).collect();
        write!(f, "[{}]", listing.join(", "))
    }
}
