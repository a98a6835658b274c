// This module groups the intermediate representation of a compilation unit: the operand
// value types of the abstract two-register machine, the symbol and data tables, the flat
// opcode sequence, and the peephole optimizer that rewrites that sequence in place.

//! Intermediate representation and optimizer.

pub mod data;
pub mod opcode;
pub mod operand;
pub mod optimize;
pub mod symbol;

pub use data::{Data, DataId, DataKind, DataTable};
pub use opcode::{OpId, OpKind, Opcode, OpcodeTable, UnreachableCode};
pub use operand::{Label, Register, Stack, Value};
pub use optimize::{OptimizeReport, Optimizer, Pass};
pub use symbol::{Symbol, SymbolId, SymbolKind, SymbolTable, Units};
