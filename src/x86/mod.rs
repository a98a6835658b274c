// This module is the 32-bit x86 back end. The IR's two registers map onto %eax and %edx,
// %ebx is reserved for the GOT base in position independent code, and %ecx is scratch
// for GOT-indirect symbol access. `frame` writes function entry and exit, `stabs` the
// debug directives, and `codegen` drives the emission of a whole unit.

//! x86 assembly back end.

pub mod codegen;
pub mod frame;
pub mod stabs;

pub use codegen::generate;
pub use frame::FunctionFrame;

use crate::ir::operand::Register;

/// Bytes per cell on the target.
pub const CELL_SIZE: usize = 4;

/// Physical register backing an IR register.
pub fn cpu_register(register: Register) -> &'static str {
    match register {
        Register::R0 => "%eax",
        Register::R1 => "%edx",
    }
}
