// This module defines error types for the forthc compiler using the thiserror crate for
// idiomatic Rust error handling. CompileError covers the failures that are bugs or
// environment problems rather than problems in the Forth source: symbol table collisions
// (the driver always checks before it adds), dangling symbol/data handles, emission
// invariants the code generator relies on, and I/O failures while writing listings or
// assembly. Problems in the Forth source itself are diagnostics, not errors, and live in
// the diagnostics module. The module also provides CompileResult<T> as a convenience
// type alias for Result<T, CompileError>.

//! Error types for the forthc compiler.

use thiserror::Error;

/// Main error type for compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Symbol '{name}' already present in the symbol table")]
    SymbolCollision {
        name: String,
    },

    #[error("No symbol with id {id}")]
    UnknownSymbol {
        id: u32,
    },

    #[error("No data item with id {id}")]
    UnknownData {
        id: u32,
    },

    #[error("Code generation failed: {reason}")]
    Codegen {
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
