// This module checks the structure of the terminal stream and feeds it to the semantic
// driver. It keeps a stack of open constructs (definitions, code words, IF, DO, BEGIN,
// CASE and OF) and rejects a terminal that closes or continues something that is not on
// top of the stack, or a defining word inside a definition; a rejection is a syntax error
// that ends the parse. Conditional compilation terminals always reach the driver, while
// every other terminal is dropped unseen while the driver reports compilation suspended.
// Because the driver only ever sees well-nested input, its own label stacks can never
// underflow on a malformed program.

//! Structural recognizer driving the semantic driver.

use crate::forth::driver::Driver;
use crate::forth::lexer::LexError;
use crate::forth::terminal::{Terminal, Token};

/// Constructs that must be closed by a matching terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construct {
    Definition,
    Code,
    If { has_else: bool },
    Do,
    Begin,
    Case,
    Of,
}

#[derive(Debug, Default)]
pub struct Recognizer {
    constructs: Vec<Construct>,
}

impl Recognizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn in_definition(&self) -> bool {
        self.constructs
            .iter()
            .any(|c| matches!(c, Construct::Definition | Construct::Code))
    }

    fn top(&self) -> Option<Construct> {
        self.constructs.last().copied()
    }

    /// Update the construct stack for `terminal`; false if it does not fit here.
    fn accept(&mut self, terminal: &Terminal<'_>) -> bool {
        match terminal {
            Terminal::Colon(_) | Terminal::NoName => {
                if !self.constructs.is_empty() {
                    return false;
                }
                self.constructs.push(Construct::Definition);
            }
            Terminal::Code(_) => {
                if !self.constructs.is_empty() {
                    return false;
                }
                self.constructs.push(Construct::Code);
            }
            Terminal::Variable(_)
            | Terminal::Constant(_)
            | Terminal::FConstant(_)
            | Terminal::Create { .. } => return !self.in_definition(),
            Terminal::Semicolon => return self.close(Construct::Definition),
            Terminal::EndCode => return self.close(Construct::Code),
            Terminal::AsmLine(_) => return self.top() == Some(Construct::Code),
            Terminal::If => self.constructs.push(Construct::If { has_else: false }),
            Terminal::Else => match self.constructs.last_mut() {
                Some(Construct::If { has_else }) if !*has_else => *has_else = true,
                _ => return false,
            },
            Terminal::Then | Terminal::EndIf => {
                if !matches!(self.top(), Some(Construct::If { .. })) {
                    return false;
                }
                self.constructs.pop();
            }
            Terminal::Do | Terminal::QueryDo => self.constructs.push(Construct::Do),
            Terminal::Loop | Terminal::PlusLoop => return self.close(Construct::Do),
            Terminal::Begin => self.constructs.push(Construct::Begin),
            Terminal::Until | Terminal::Repeat | Terminal::Again => {
                return self.close(Construct::Begin)
            }
            Terminal::Case => self.constructs.push(Construct::Case),
            Terminal::Of => {
                if self.top() != Some(Construct::Case) {
                    return false;
                }
                self.constructs.push(Construct::Of);
            }
            Terminal::EndOf => return self.close(Construct::Of),
            Terminal::EndCase => return self.close(Construct::Case),
            _ => {}
        }
        self.top() != Some(Construct::Code) || matches!(terminal, Terminal::Code(_))
    }

    fn close(&mut self, construct: Construct) -> bool {
        if self.top() != Some(construct) {
            return false;
        }
        self.constructs.pop();
        true
    }

    /// Feed every token to `driver`; false if the input was rejected.
    pub fn run<'src, I>(&mut self, tokens: I, driver: &mut Driver<'_, '_>) -> bool
    where
        I: IntoIterator<Item = Result<Token<'src>, LexError>>,
    {
        for token in tokens {
            let token = match token {
                Ok(token) => token,
                Err(err) => {
                    driver.lex_error(&err);
                    return false;
                }
            };
            driver.set_position(token.line, token.text);

            if token.terminal.is_conditional() {
                driver.terminal(token.terminal);
                continue;
            }
            if !driver.cond_state() {
                continue;
            }
            if !self.accept(&token.terminal) {
                driver.syntax_error(&format!("parse error, unexpected {}", token.terminal.keyword()));
                return false;
            }

            driver.terminal(token.terminal);
            if driver.excessive_errors() {
                log::debug!("too many errors, parse abandoned");
                return true;
            }
        }

        if !self.constructs.is_empty() {
            driver.syntax_error("parse error, unexpected end of file");
            return false;
        }
        driver.end_of_file();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_rules() {
        let mut recognizer = Recognizer::new();
        assert!(recognizer.accept(&Terminal::Colon("x")));
        assert!(recognizer.accept(&Terminal::If));
        assert!(recognizer.accept(&Terminal::Else));
        assert!(!recognizer.accept(&Terminal::Else));
        assert!(!recognizer.accept(&Terminal::Semicolon));
        assert!(recognizer.accept(&Terminal::Then));
        assert!(!recognizer.accept(&Terminal::Variable("v")));
        assert!(recognizer.accept(&Terminal::Semicolon));
        assert!(recognizer.constructs.is_empty());
    }

    #[test]
    fn test_loops_and_case() {
        let mut recognizer = Recognizer::new();
        assert!(recognizer.accept(&Terminal::Case));
        assert!(!recognizer.accept(&Terminal::EndOf));
        assert!(recognizer.accept(&Terminal::Of));
        assert!(recognizer.accept(&Terminal::Do));
        assert!(!recognizer.accept(&Terminal::EndOf));
        assert!(recognizer.accept(&Terminal::Loop));
        assert!(recognizer.accept(&Terminal::EndOf));
        assert!(recognizer.accept(&Terminal::EndCase));
        assert!(!recognizer.accept(&Terminal::Until));
    }

    #[test]
    fn test_code_words_take_only_assembly() {
        let mut recognizer = Recognizer::new();
        assert!(!recognizer.accept(&Terminal::AsmLine("nop")));
        assert!(recognizer.accept(&Terminal::Code("c")));
        assert!(recognizer.accept(&Terminal::AsmLine("nop")));
        assert!(!recognizer.accept(&Terminal::Colon("x")));
        assert!(recognizer.accept(&Terminal::EndCode));
        assert!(!recognizer.accept(&Terminal::EndCode));
    }
}
