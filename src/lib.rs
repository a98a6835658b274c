//! forthc - a Forth compiler back end for 32-bit x86.
//!
//! Forth source is recognized into terminal events, turned into a
//! two-register stack-machine IR, optionally rewritten by a fixed-point
//! peephole optimizer and emitted as AT&T assembly for the GNU assembler.
//!
//! # Primary Usage
//!
//! ```ignore
//! use bumpalo::Bump;
//! use forthc::{Definitions, Options, Program};
//!
//! let arena = Bump::new();
//! let mut program = Program::new(&arena, "hello.fs", Options::default());
//! if program.build(": hello .\" Hello\" ;\nhello\n", &Definitions::new()) {
//!     program.generate(&mut std::io::stdout())?;
//! }
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Shared infrastructure (session, diagnostics, mangler, options)
//! - [`forth`] - Front end: lexer, structure recognizer, semantic driver
//! - [`ir`] - Symbol, data and opcode tables and the optimizer
//! - [`x86`] - Assembly generation
//! - [`program`] - One compilation unit end to end

pub mod core;
pub mod forth;
pub mod ir;
pub mod program;
pub mod x86;

pub use crate::core::{
    demangle, mangle, CompilationSession, CompileError, CompileResult, Definitions, Diagnostic,
    Diagnostics, Options, SessionStats, Severity,
};
pub use program::Program;
