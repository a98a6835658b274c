//! Operands shared by the opcode IR: registers, runtime stacks, values, labels.

use std::fmt;

use crate::core::mangler::mangle;

/// Signed 32-bit literal carried by value-loading opcodes.
pub type Value = i32;

/// One of the two machine registers the IR is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    R0,
    R1,
}

impl Register {
    /// Name used in the intermediate listing (`Reg_0`).
    pub fn name(self) -> &'static str {
        match self {
            Register::R0 => "0",
            Register::R1 => "1",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reg_{}", self.name())
    }
}

/// A runtime stack, reached only through its push/pop functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stack {
    Data,
    Return,
    Float,
}

impl Stack {
    pub fn name(self) -> &'static str {
        match self {
            Stack::Data => "D",
            Stack::Return => "R",
            Stack::Float => "F",
        }
    }

    /// Mangled name of the runtime routine pushing `%eax`.
    pub fn push_function(self) -> String {
        mangle(match self {
            Stack::Data => "_dpush",
            Stack::Return => "_rpush",
            Stack::Float => "_fpush",
        })
    }

    /// Mangled name of the runtime routine popping into `%eax`.
    pub fn pop_function(self) -> String {
        mangle(match self {
            Stack::Data => "_dpop",
            Stack::Return => "_rpop",
            Stack::Float => "_fpop",
        })
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stack_{}", self.name())
    }
}

/// Branch target. Label 0 is the exit of the synthesized main.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub u32);

impl Label {
    pub const MAIN_EXIT: Label = Label(0);

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label_{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_stack_functions() {
        assert_eq!(Stack::Data.push_function(), "v4__dpush");
        assert_eq!(Stack::Return.pop_function(), "v4__rpop");
        assert_eq!(Stack::Float.push_function(), "v4__fpush");
    }

    #[test]
    fn test_listing_names() {
        assert_eq!(Register::R1.to_string(), "Reg_1");
        assert_eq!(Stack::Return.to_string(), "Stack_R");
        assert_eq!(Label(7).to_string(), "Label_7");
    }
}
