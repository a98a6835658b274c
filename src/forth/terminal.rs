// This module defines the classified terminal events the lexer hands to the recognizer:
// one variant per Forth construct the compiler understands, each carrying the slices of
// source text its handler needs (a defined name, the body of a string literal, the digits
// of a number). Keywords are recognized case-insensitively by the lexer, so the payloads
// here are always the user's own spelling. A token pairs a terminal with the line it
// started on and the full source text it covers, which is what error messages quote.

//! Terminal events delivered by the lexer.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal<'src> {
    /// `VARIABLE name` or `FVARIABLE name`.
    Variable(&'src str),
    Constant(&'src str),
    FConstant(&'src str),
    /// `CREATE name size [CELLS|CHARS] ALLOT`.
    Create {
        name: &'src str,
        size: &'src str,
        units: Option<&'src str>,
    },
    /// `: name`.
    Colon(&'src str),
    /// `:NONAME` or `::`.
    NoName,
    Semicolon,
    Exit,

    If,
    Else,
    Then,
    EndIf,

    Do,
    QueryDo,
    Loop,
    PlusLoop,
    Leave,
    QueryLeave,

    Begin,
    Until,
    While,
    Repeat,
    Again,

    Case,
    Of,
    EndOf,
    EndCase,

    Recurse,

    /// `." text"`, printed at run time.
    PrintString(&'src str),
    /// `C" text"`.
    CountedString(&'src str),
    /// `ABORT" text"`.
    AbortString(&'src str),
    /// `.( text)`, printed at compile time.
    CompileNote(&'src str),
    /// `S" text"`.
    StringLiteral(&'src str),

    Integer(&'src str),
    Float(&'src str),
    /// `'c'`, `CHAR c` or `[CHAR] c`.
    Char(&'src str),
    /// `' name` or `['] name`.
    ObjectAddress(&'src str),
    Word(&'src str),

    /// `CODE name`.
    Code(&'src str),
    /// One raw line between `CODE` and `END-CODE`.
    AsmLine(&'src str),
    EndCode,

    IfDef(&'src str),
    IfUndef(&'src str),
    CondElse,
    CondThen,
    CondEndIf,
}

impl Terminal<'_> {
    /// Conditional compilation terminals are seen even while suspended.
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            Terminal::IfDef(_)
                | Terminal::IfUndef(_)
                | Terminal::CondElse
                | Terminal::CondThen
                | Terminal::CondEndIf
        )
    }

    /// Keyword spelling used in syntax errors.
    pub fn keyword(&self) -> &'static str {
        match self {
            Terminal::Variable(_) => "VARIABLE",
            Terminal::Constant(_) => "CONSTANT",
            Terminal::FConstant(_) => "FCONSTANT",
            Terminal::Create { .. } => "CREATE",
            Terminal::Colon(_) => ":",
            Terminal::NoName => ":NONAME",
            Terminal::Semicolon => ";",
            Terminal::Exit => "EXIT",
            Terminal::If => "IF",
            Terminal::Else => "ELSE",
            Terminal::Then => "THEN",
            Terminal::EndIf => "ENDIF",
            Terminal::Do => "DO",
            Terminal::QueryDo => "?DO",
            Terminal::Loop => "LOOP",
            Terminal::PlusLoop => "+LOOP",
            Terminal::Leave => "LEAVE",
            Terminal::QueryLeave => "?LEAVE",
            Terminal::Begin => "BEGIN",
            Terminal::Until => "UNTIL",
            Terminal::While => "WHILE",
            Terminal::Repeat => "REPEAT",
            Terminal::Again => "AGAIN",
            Terminal::Case => "CASE",
            Terminal::Of => "OF",
            Terminal::EndOf => "ENDOF",
            Terminal::EndCase => "ENDCASE",
            Terminal::Recurse => "RECURSE",
            Terminal::PrintString(_) => ".\"",
            Terminal::CountedString(_) => "C\"",
            Terminal::AbortString(_) => "ABORT\"",
            Terminal::CompileNote(_) => ".(",
            Terminal::StringLiteral(_) => "S\"",
            Terminal::Integer(_) => "integer literal",
            Terminal::Float(_) => "float literal",
            Terminal::Char(_) => "char literal",
            Terminal::ObjectAddress(_) => "'",
            Terminal::Word(_) => "word",
            Terminal::Code(_) => "CODE",
            Terminal::AsmLine(_) => "assembly",
            Terminal::EndCode => "END-CODE",
            Terminal::IfDef(_) => "[IFDEF]",
            Terminal::IfUndef(_) => "[IFUNDEF]",
            Terminal::CondElse => "[ELSE]",
            Terminal::CondThen => "[THEN]",
            Terminal::CondEndIf => "[ENDIF]",
        }
    }
}

/// A terminal with its position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub line: u32,
    /// Source text the token covers.
    pub text: &'src str,
    pub terminal: Terminal<'src>,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>6} {} '{}'", self.line, self.terminal.keyword(), self.text.trim())
    }
}
