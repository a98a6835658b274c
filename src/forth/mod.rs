// This module is the Forth front end. The lexer splits source text into classified
// terminals, the recognizer checks their nesting and forwards them, and the semantic
// driver builds the unit's symbol, data and opcode tables from them. `parse` wires the
// three together for one source text and reports whether the unit is error free.

//! Forth front end.

pub mod driver;
pub mod grammar;
pub mod lexer;
pub mod terminal;

pub use driver::Driver;
pub use grammar::Recognizer;
pub use lexer::{LexError, Lexer};
pub use terminal::{Terminal, Token};

use crate::core::options::Definitions;
use crate::core::session::CompilationSession;

/// Parse `source` into the session's tables.
///
/// Returns true when the input was accepted and no error was reported.
pub fn parse(session: &mut CompilationSession<'_>, source: &str, definitions: &Definitions) -> bool {
    let mut driver = Driver::new(session, definitions);
    let accepted = Recognizer::new().run(Lexer::new(source), &mut driver);
    driver.finish(accepted)
}
