// This module gathers the infrastructure every other part of forthc builds on: the
// identifier mangler shared by the symbol table and the runtime-name helpers, the
// thiserror-based error type for internal failures, the options and preprocessor
// definitions of one invocation, the per-unit diagnostics collector, and the
// compilation session that owns a unit's arena-backed tables.

//! Core forthc infrastructure.
//!
//! # Key Components
//!
//! ## Session Management (`session`)
//! - Arena-based interning of names, literal bytes and assembly lines
//! - The symbol, data and opcode tables of one unit
//! - Compilation statistics
//!
//! ## Diagnostics (`diagnostics`)
//! - Errors, warnings and notes about the source, with the error cap
//!
//! ## Mangling (`mangler`)
//! - Reversible encoding of Forth names into assembler symbols

pub mod diagnostics;
pub mod error;
pub mod mangler;
pub mod options;
pub mod session;

pub use diagnostics::{Diagnostic, Diagnostics, Severity, MAX_ALLOWED_ERRORS};
pub use error::{CompileError, CompileResult};
pub use mangler::{demangle, mangle};
pub use options::{Definitions, Options};
pub use session::{CompilationSession, SessionStats};
