// This module turns Forth source text into terminal events. Forth is blank-delimited, so
// the lexer reads one word at a time, tracks line numbers as it crosses newlines, and
// classifies each word: keywords (case-insensitive), defining words together with the
// name that follows them, the string-literal words together with their delimited text,
// numbers and char literals, and everything else as a plain word. Comments (`\` to end of
// line, `( ... )` across lines) are consumed here. Between `CODE name` and `END-CODE`
// the lexer switches to line mode and hands every non-blank line over as raw assembly.
// Malformed input (an unterminated string or comment, a defining word with no name) is a
// lexical error that ends the token stream.

//! Lexer producing terminal events from Forth source.

use thiserror::Error;

use crate::forth::terminal::{Terminal, Token};

/// Malformed source text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LexError {
    pub line: u32,
    /// Source text the error was raised near.
    pub near: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Forth,
    Code,
}

pub struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    line: u32,
    mode: Mode,
    done: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            mode: Mode::Forth,
            done: false,
        }
    }

    /// Line the lexer is currently on.
    pub fn line(&self) -> u32 {
        self.line
    }

    fn byte(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn skip_blanks(&mut self) {
        while let Some(byte) = self.byte() {
            if !byte.is_ascii_whitespace() {
                break;
            }
            if byte == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    /// Next blank-delimited word with its line and start offset.
    fn next_word(&mut self) -> Option<(u32, usize, &'src str)> {
        self.skip_blanks();
        let start = self.pos;
        while self.byte().is_some_and(|byte| !byte.is_ascii_whitespace()) {
            self.pos += 1;
        }
        (self.pos > start).then(|| (self.line, start, &self.source[start..self.pos]))
    }

    fn skip_to_end_of_line(&mut self) {
        while self.byte().is_some_and(|byte| byte != b'\n') {
            self.pos += 1;
        }
    }

    /// Text after one separating blank, up to `delimiter` on the same line.
    fn delimited(&mut self, delimiter: u8) -> Option<&'src str> {
        if matches!(self.byte(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
        let start = self.pos;
        while let Some(byte) = self.byte() {
            if byte == delimiter {
                let text = &self.source[start..self.pos];
                self.pos += 1;
                return Some(text);
            }
            if byte == b'\n' {
                break;
            }
            self.pos += 1;
        }
        None
    }

    /// Skip a parenthesized comment, which may span lines.
    fn skip_comment(&mut self) -> bool {
        while let Some(byte) = self.byte() {
            self.pos += 1;
            match byte {
                b')' => return true,
                b'\n' => self.line += 1,
                _ => {}
            }
        }
        false
    }

    fn error(&self, line: u32, start: usize, message: impl Into<String>) -> LexError {
        let end = self.source[start..]
            .find('\n')
            .map_or(self.source.len(), |offset| start + offset)
            .max(self.pos.min(self.source.len()));
        LexError {
            line,
            near: self.source[start..end].trim().to_string(),
            message: message.into(),
        }
    }

    fn name_after(&mut self, line: u32, start: usize, keyword: &str) -> Result<&'src str, LexError> {
        match self.next_word() {
            Some((_, _, name)) => Ok(name),
            None => Err(self.error(line, start, format!("missing name after {keyword}"))),
        }
    }

    fn string_body(&mut self, line: u32, start: usize, delimiter: u8) -> Result<&'src str, LexError> {
        self.delimited(delimiter)
            .ok_or_else(|| self.error(line, start, "unterminated string"))
    }

    /// Classify one word; `None` means the word opened a comment.
    fn classify(
        &mut self,
        line: u32,
        start: usize,
        word: &'src str,
    ) -> Result<Option<Terminal<'src>>, LexError> {
        let keyword = word.to_ascii_uppercase();
        let terminal = match keyword.as_str() {
            "\\" => {
                self.skip_to_end_of_line();
                return Ok(None);
            }
            "(" => {
                if !self.skip_comment() {
                    return Err(self.error(line, start, "unterminated comment"));
                }
                return Ok(None);
            }
            "VARIABLE" | "FVARIABLE" => Terminal::Variable(self.name_after(line, start, &keyword)?),
            "CONSTANT" => Terminal::Constant(self.name_after(line, start, &keyword)?),
            "FCONSTANT" => Terminal::FConstant(self.name_after(line, start, &keyword)?),
            "CREATE" => self.create(line, start)?,
            ":" => Terminal::Colon(self.name_after(line, start, &keyword)?),
            ":NONAME" | "::" => Terminal::NoName,
            ";" => Terminal::Semicolon,
            "EXIT" => Terminal::Exit,
            "IF" => Terminal::If,
            "ELSE" => Terminal::Else,
            "THEN" => Terminal::Then,
            "ENDIF" => Terminal::EndIf,
            "DO" => Terminal::Do,
            "?DO" => Terminal::QueryDo,
            "LOOP" => Terminal::Loop,
            "+LOOP" => Terminal::PlusLoop,
            "LEAVE" => Terminal::Leave,
            "?LEAVE" => Terminal::QueryLeave,
            "BEGIN" => Terminal::Begin,
            "UNTIL" => Terminal::Until,
            "WHILE" => Terminal::While,
            "REPEAT" => Terminal::Repeat,
            "AGAIN" => Terminal::Again,
            "CASE" => Terminal::Case,
            "OF" => Terminal::Of,
            "ENDOF" => Terminal::EndOf,
            "ENDCASE" => Terminal::EndCase,
            "RECURSE" => Terminal::Recurse,
            ".\"" => Terminal::PrintString(self.string_body(line, start, b'"')?),
            "C\"" => Terminal::CountedString(self.string_body(line, start, b'"')?),
            "ABORT\"" => Terminal::AbortString(self.string_body(line, start, b'"')?),
            "S\"" => Terminal::StringLiteral(self.string_body(line, start, b'"')?),
            ".(" => Terminal::CompileNote(self.string_body(line, start, b')')?),
            "CHAR" | "[CHAR]" => Terminal::Char(self.name_after(line, start, &keyword)?),
            "'" | "[']" => Terminal::ObjectAddress(self.name_after(line, start, &keyword)?),
            "CODE" => {
                let name = self.name_after(line, start, &keyword)?;
                self.mode = Mode::Code;
                Terminal::Code(name)
            }
            "END-CODE" => Terminal::EndCode,
            "[IFDEF]" => Terminal::IfDef(self.name_after(line, start, &keyword)?),
            "[IFUNDEF]" | "[IFNDEF]" => Terminal::IfUndef(self.name_after(line, start, &keyword)?),
            "[ELSE]" => Terminal::CondElse,
            "[THEN]" => Terminal::CondThen,
            "[ENDIF]" => Terminal::CondEndIf,
            _ if is_integer_literal(word) => Terminal::Integer(word),
            _ if is_float_literal(word) => Terminal::Float(word),
            _ if is_char_literal(word) => Terminal::Char(&word[1..word.len() - 1]),
            _ => Terminal::Word(word),
        };
        Ok(Some(terminal))
    }

    fn create(&mut self, line: u32, start: usize) -> Result<Terminal<'src>, LexError> {
        let name = self.name_after(line, start, "CREATE")?;
        let size = self.name_after(line, start, "CREATE")?;
        let Some((_, _, next)) = self.next_word() else {
            return Err(self.error(line, start, "CREATE without ALLOT"));
        };
        if next.eq_ignore_ascii_case("ALLOT") {
            return Ok(Terminal::Create { name, size, units: None });
        }
        match self.next_word() {
            Some((_, _, allot)) if allot.eq_ignore_ascii_case("ALLOT") => Ok(Terminal::Create {
                name,
                size,
                units: Some(next),
            }),
            _ => Err(self.error(line, start, "CREATE without ALLOT")),
        }
    }

    /// Next non-blank line between `CODE` and `END-CODE`.
    fn next_code_line(&mut self) -> Option<Token<'src>> {
        while self.pos < self.source.len() {
            let start = self.pos;
            let end = self.source[start..]
                .find('\n')
                .map_or(self.source.len(), |offset| start + offset);
            let text = &self.source[start..end];
            let line = self.line;

            let first = text.trim_start();
            let word_end = first
                .find(|c: char| c.is_ascii_whitespace())
                .unwrap_or(first.len());
            if first[..word_end].eq_ignore_ascii_case("END-CODE") {
                let word_start = start + (text.len() - first.len());
                self.pos = word_start + word_end;
                self.mode = Mode::Forth;
                return Some(Token {
                    line,
                    text: &self.source[word_start..self.pos],
                    terminal: Terminal::EndCode,
                });
            }

            self.pos = end;
            if self.pos < self.source.len() {
                self.pos += 1;
                self.line += 1;
            }
            if !text.trim().is_empty() {
                return Some(Token {
                    line,
                    text,
                    terminal: Terminal::AsmLine(text),
                });
            }
        }
        None
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token<'src>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.mode == Mode::Code {
            return self.next_code_line().map(Ok);
        }
        loop {
            let (line, start, word) = self.next_word()?;
            match self.classify(line, start, word) {
                Ok(Some(terminal)) => {
                    let token = Token {
                        line,
                        text: &self.source[start..self.pos],
                        terminal,
                    };
                    log::trace!("{}", token);
                    return Some(Ok(token));
                }
                Ok(None) => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Split a number body into its digits and radix by prefix.
pub fn split_radix(body: &str) -> (&str, u32) {
    match body.as_bytes() {
        [b'%', ..] => (&body[1..], 2),
        [b'$', ..] => (&body[1..], 16),
        [b'&' | b'#', ..] => (&body[1..], 10),
        [b'0', b'b' | b'B', ..] => (&body[2..], 2),
        [b'0', b'o' | b'O', ..] => (&body[2..], 8),
        [b'0', b'x' | b'X', ..] => (&body[2..], 16),
        _ => (body, 10),
    }
}

pub(crate) fn strip_sign(word: &str) -> &str {
    word.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(word)
}

fn is_integer_literal(word: &str) -> bool {
    let (digits, radix) = split_radix(strip_sign(word));
    !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix))
}

fn is_float_literal(word: &str) -> bool {
    let is_digit = |c: char| c.is_ascii_digit();
    let body = strip_sign(word);
    let mantissa = body.trim_start_matches(is_digit);
    if mantissa.len() == body.len() {
        return false;
    }

    let mut rest = mantissa;
    let mut marked = false;
    if let Some(fraction) = rest.strip_prefix('.') {
        marked = true;
        rest = fraction.trim_start_matches(is_digit);
    }
    if let Some(exponent) = rest.strip_prefix(|c: char| c == 'e' || c == 'E') {
        marked = true;
        rest = strip_sign(exponent).trim_start_matches(is_digit);
    }
    marked && rest.is_empty()
}

fn is_char_literal(word: &str) -> bool {
    word.len() == 3 && word.starts_with('\'') && word.ends_with('\'')
}
