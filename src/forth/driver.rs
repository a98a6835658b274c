// This module is the semantic driver: it receives one terminal at a time from the
// recognizer and turns it into symbols, data items and opcodes. Control flow is built with
// three explicit stacks. The label stack holds pending structural labels (definition
// exits, branch targets, loop tops and ends), the break stack holds the exit label of
// every open loop or CASE for LEAVE, ?LEAVE, WHILE and ENDOF, and the conditional stack
// holds one (active, line) entry per open [IFDEF]/[IFUNDEF]; compilation is suspended
// while any entry is inactive. Labels come from a per-unit sequence starting at 1, label 0
// being the exit of the synthesized main. The first executable construct outside a
// definition declares `main` implicitly. Semantic errors are reported to the unit's
// diagnostics and parsing carries on; once the input ends, `finish` checks that every
// stack unwound.

//! Semantic driver turning terminals into intermediate code.

use std::num::IntErrorKind;

use crate::core::options::Definitions;
use crate::core::session::CompilationSession;
use crate::forth::lexer::{split_radix, strip_sign, LexError};
use crate::forth::terminal::Terminal;
use crate::ir::data::DataKind;
use crate::ir::opcode::OpKind;
use crate::ir::operand::{Label, Register, Stack, Value};
use crate::ir::symbol::{Symbol, SymbolId, SymbolKind};

/// Longest text a counted string can hold.
const COUNTED_STRING_LIMIT: usize = u8::MAX as usize;

/// Why a numeric literal could not be converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiteralError {
    Malformed,
    OutOfRange,
}

pub struct Driver<'s, 'arena> {
    session: &'s mut CompilationSession<'arena>,
    definitions: &'s Definitions,

    /// Position of the terminal being handled.
    line: u32,
    near: String,

    labels: Vec<Label>,
    breaks: Vec<Label>,
    conditions: Vec<(bool, u32)>,

    current_definition: Option<SymbolId>,
    label_sequence: u32,
    exit_label: Option<Label>,
    implicit_main: bool,
}

impl<'s, 'arena> Driver<'s, 'arena> {
    pub fn new(session: &'s mut CompilationSession<'arena>, definitions: &'s Definitions) -> Self {
        Self {
            session,
            definitions,
            line: 1,
            near: String::new(),
            labels: Vec::new(),
            breaks: Vec::new(),
            conditions: Vec::new(),
            current_definition: None,
            label_sequence: 1,
            exit_label: None,
            implicit_main: false,
        }
    }

    pub fn set_position(&mut self, line: u32, near: &str) {
        self.line = line;
        self.near.clear();
        self.near.push_str(near.trim());
    }

    fn error(&mut self, message: impl Into<String>) {
        let diagnostics = self.session.diagnostics_mut();
        diagnostics.error(self.line, &self.near, message);
    }

    fn warning(&mut self, message: impl Into<String>) {
        let diagnostics = self.session.diagnostics_mut();
        diagnostics.warning(self.line, &self.near, message);
    }

    fn internal_error(&mut self, message: impl Into<String>) {
        self.session.diagnostics_mut().internal_error(self.line, message);
    }

    pub fn lex_error(&mut self, err: &LexError) {
        self.session
            .diagnostics_mut()
            .error(err.line, &err.near, err.message.clone());
    }

    pub fn syntax_error(&mut self, message: &str) {
        self.error(message);
    }

    pub fn excessive_errors(&self) -> bool {
        self.session.diagnostics().excessive_errors()
    }

    /// True unless some open conditional is inactive.
    pub fn cond_state(&self) -> bool {
        self.conditions.iter().all(|&(active, _)| active)
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.label_sequence);
        self.label_sequence += 1;
        label
    }

    fn emit(&mut self, kind: OpKind<'arena>) {
        self.session.opcodes_mut().push(kind, self.line);
    }

    fn pop_label(&mut self) -> Option<Label> {
        let label = self.labels.pop();
        if label.is_none() {
            self.internal_error("label stack underflow");
        }
        label
    }

    fn top_label(&mut self) -> Option<Label> {
        let label = self.labels.last().copied();
        if label.is_none() {
            self.internal_error("label stack underflow");
        }
        label
    }

    fn lookup(&self, name: &str) -> Option<Symbol<'arena>> {
        self.session.symbols().lookup(name).copied()
    }

    fn add_symbol(&mut self, name: &str, kind: SymbolKind) -> Option<SymbolId> {
        match self.session.symbols_mut().add(name, self.line, kind) {
            Ok(id) => Some(id),
            Err(err) => {
                self.internal_error(err.to_string());
                None
            }
        }
    }

    /// Report a name that is already taken; true if `name` is free.
    fn check_undefined(&mut self, name: &str) -> bool {
        let Some(symbol) = self.lookup(name) else {
            return true;
        };
        if symbol.kind == SymbolKind::External {
            self.error(format!(
                "symbol '{}' already implicitly external, from line {}",
                name, symbol.line
            ));
        } else {
            self.error(format!(
                "multiple symbol definition '{}', from line {}",
                name, symbol.line
            ));
        }
        false
    }

    /// Declare `main` the first time code appears outside a definition.
    fn detect_main(&mut self) {
        if self.current_definition.is_some() || self.implicit_main {
            return;
        }
        match self.lookup("main") {
            Some(symbol) => self.error(format!(
                "'main' both defined and implicit, from line {}",
                symbol.line
            )),
            None => {
                self.add_symbol("main", SymbolKind::Word);
            }
        }
        self.implicit_main = true;
    }

    /// A runtime word the generated code calls, declared external on first use.
    fn runtime_word(&mut self, name: &str) -> Option<SymbolId> {
        match self.lookup(name) {
            Some(symbol) if symbol.kind.is_callable() => Some(symbol.id),
            Some(symbol) => {
                self.error(format!(
                    "'{}' is defined as a variable, from line {}",
                    name.to_ascii_uppercase(),
                    symbol.line
                ));
                None
            }
            None => self.add_symbol(name, SymbolKind::External),
        }
    }

    /// Dispatch one terminal to its handler.
    pub fn terminal(&mut self, terminal: Terminal<'_>) {
        self.session.record_terminal();
        match terminal {
            Terminal::Variable(name) => self.on_variable(name),
            Terminal::Constant(name) => self.on_constant(name, Stack::Data),
            Terminal::FConstant(name) => self.on_constant(name, Stack::Float),
            Terminal::Create { name, size, units } => self.on_create(name, size, units),
            Terminal::Colon(name) => self.on_colon(name),
            Terminal::NoName => self.on_noname(),
            Terminal::Semicolon => self.on_semicolon(),
            Terminal::Exit => self.on_exit(),
            Terminal::If => self.on_if(),
            Terminal::Else => self.on_else(),
            Terminal::Then | Terminal::EndIf => self.on_then(),
            Terminal::Do => self.on_do(false),
            Terminal::QueryDo => self.on_do(true),
            Terminal::Loop => self.on_loop(),
            Terminal::PlusLoop => self.on_plus_loop(),
            Terminal::Leave => self.on_leave(),
            Terminal::QueryLeave => self.on_query_leave(),
            Terminal::Begin => self.on_begin(),
            Terminal::Until => self.on_until(),
            Terminal::While => self.on_while(),
            Terminal::Repeat | Terminal::Again => self.on_repeat(),
            Terminal::Case => self.on_case(),
            Terminal::Of => self.on_of(),
            Terminal::EndOf => self.on_endof(),
            Terminal::EndCase => self.on_endcase(),
            Terminal::Recurse => self.on_recurse(),
            Terminal::PrintString(text) => self.on_print_string(text),
            Terminal::CountedString(text) => self.on_counted_string(text),
            Terminal::AbortString(text) => self.on_abort_string(text),
            Terminal::CompileNote(text) => self.on_compile_note(text),
            Terminal::StringLiteral(text) => self.on_string_literal(text),
            Terminal::Integer(text) => self.on_integer(text),
            Terminal::Float(text) => self.on_float(text),
            Terminal::Char(text) => self.on_char(text),
            Terminal::ObjectAddress(name) => self.on_object_address(name),
            Terminal::Word(name) => self.on_word(name),
            Terminal::Code(name) => self.on_code(name),
            Terminal::AsmLine(text) => self.on_asm_line(text),
            Terminal::EndCode => self.on_end_code(),
            Terminal::IfDef(name) => self.on_ifdef(name, false),
            Terminal::IfUndef(name) => self.on_ifdef(name, true),
            Terminal::CondElse => self.on_cond_else(),
            Terminal::CondThen => self.on_cond_then("[THEN]"),
            Terminal::CondEndIf => self.on_cond_then("[ENDIF]"),
        }
    }

    pub fn on_ifdef(&mut self, name: &str, is_ifundef: bool) {
        let condition = self.definitions.is_defined(name) ^ is_ifundef;
        self.conditions.push((condition, self.line));
    }

    pub fn on_cond_else(&mut self) {
        match self.conditions.last_mut() {
            Some((active, _)) => *active = !*active,
            None => self.error("parse error, unexpected [ELSE]"),
        }
    }

    pub fn on_cond_then(&mut self, keyword: &str) {
        if self.conditions.pop().is_none() {
            self.error(format!("parse error, unexpected {keyword}"));
        }
    }

    /// Unterminated conditionals only warn; the unit still compiles.
    pub fn end_of_file(&mut self) {
        if let Some(&(_, line)) = self.conditions.last() {
            self.session.diagnostics_mut().line_warning(
                self.line,
                format!("unterminated [IFDEF] or [IFNDEF], from line {line}"),
            );
            self.conditions.clear();
        }
    }

    pub fn on_variable(&mut self, name: &str) {
        if self.check_undefined(name) {
            self.add_symbol(name, SymbolKind::Variable);
        }
    }

    pub fn on_create(&mut self, name: &str, size: &str, units: Option<&str>) {
        if !self.check_undefined(name) {
            return;
        }

        let text = size;
        let size = match parse_integer(text) {
            Ok(size) if size < 0 && !text.starts_with('-') => Err(LiteralError::OutOfRange),
            parsed => parsed,
        };
        let size = match size {
            Ok(size) => size,
            Err(LiteralError::Malformed) => 0,
            Err(LiteralError::OutOfRange) => {
                self.error(format!("array size '{text}' out of range"));
                return;
            }
        };
        if size <= 0 {
            self.error(format!("array '{name}' cannot have size zero or less"));
            return;
        }

        let size = size as usize;
        let kind = match units.map(str::to_ascii_lowercase).as_deref() {
            None | Some("chars") => SymbolKind::CharacterArray { size },
            Some("cells") => SymbolKind::CellArray { size },
            Some(_) => {
                self.error("parse error, expecting 'CHARS' or 'CELLS'");
                return;
            }
        };
        self.add_symbol(name, kind);
    }

    /// CONSTANT and FCONSTANT take their value from the data or float stack.
    pub fn on_constant(&mut self, name: &str, stack: Stack) {
        if !self.check_undefined(name) {
            return;
        }
        let kind = match stack {
            Stack::Float => SymbolKind::FloatConstant,
            _ => SymbolKind::IntConstant,
        };
        let Some(symbol) = self.add_symbol(name, kind) else {
            return;
        };

        self.detect_main();
        self.emit(OpKind::Pop(Register::R0, stack));
        self.emit(OpKind::StoreSymbolIndirect(Register::R0, symbol));
    }

    fn open_definition(&mut self, symbol: Option<SymbolId>) {
        let exit = self.new_label();
        self.exit_label = Some(exit);
        self.labels.push(exit);

        if let Some(symbol) = symbol {
            self.current_definition = Some(symbol);
            self.emit(OpKind::Define(symbol));
        }
    }

    fn close_definition(&mut self) -> Option<SymbolId> {
        let exit = self.pop_label();
        self.exit_label = None;

        let symbol = self.current_definition.take()?;
        if let Some(exit) = exit {
            self.emit(OpKind::Label(exit));
        }
        self.emit(OpKind::EndDefine(symbol));
        Some(symbol)
    }

    pub fn on_colon(&mut self, name: &str) {
        let symbol = if self.check_undefined(name) {
            self.add_symbol(name, SymbolKind::Word)
        } else {
            None
        };
        self.open_definition(symbol);
    }

    pub fn on_noname(&mut self) {
        let symbol = match self.session.symbols_mut().add_anonymous(self.line) {
            Ok(id) => Some(id),
            Err(err) => {
                self.internal_error(err.to_string());
                None
            }
        };
        self.open_definition(symbol);
    }

    /// Close a colon definition; an anonymous word leaves its address on the stack.
    pub fn on_semicolon(&mut self) {
        let Some(symbol) = self.close_definition() else {
            return;
        };
        let is_anonymous = self
            .session
            .symbols()
            .get(symbol)
            .is_ok_and(|s| s.kind == SymbolKind::Anonword);
        if is_anonymous {
            self.detect_main();
            self.emit(OpKind::LoadSymbol(Register::R0, symbol));
            self.emit(OpKind::Push(Register::R0, Stack::Data));
        }
    }

    pub fn on_exit(&mut self) {
        self.detect_main();
        let exit = self.exit_label.unwrap_or(Label::MAIN_EXIT);
        self.emit(OpKind::Jump(exit));
    }

    fn push_string(&mut self, kind: DataKind, bytes: &[u8]) {
        let data = self.session.data_mut().add(kind, bytes, self.line);
        self.emit(OpKind::LoadData(Register::R0, data));
        self.emit(OpKind::Push(Register::R0, Stack::Data));
    }

    fn push_length(&mut self, length: usize) {
        self.emit(OpKind::LoadValue(Register::R0, length as Value));
        self.emit(OpKind::Push(Register::R0, Stack::Data));
    }

    pub fn on_print_string(&mut self, text: &str) {
        let Some(type_word) = self.runtime_word("_type") else {
            return;
        };
        self.detect_main();
        self.push_string(DataKind::String, text.as_bytes());
        self.push_length(text.len());
        self.emit(OpKind::Call(type_word));
    }

    pub fn on_counted_string(&mut self, text: &str) {
        if text.len() > COUNTED_STRING_LIMIT {
            self.error(format!(
                "string is longer than {COUNTED_STRING_LIMIT} characters"
            ));
            return;
        }
        self.detect_main();
        self.push_string(DataKind::CountedString, text.as_bytes());
    }

    /// Abort with a message when the top of the data stack is non-zero.
    pub fn on_abort_string(&mut self, text: &str) {
        let Some(abort_word) = self.runtime_word("_abortquote") else {
            return;
        };
        let message = format!("{text}\n");
        let no_abort = self.new_label();

        self.detect_main();
        self.emit(OpKind::Pop(Register::R0, Stack::Data));
        self.emit(OpKind::JumpZero(Register::R0, no_abort));
        self.push_string(DataKind::String, message.as_bytes());
        self.push_length(message.len());
        self.emit(OpKind::Call(abort_word));
        self.emit(OpKind::Label(no_abort));
    }

    pub fn on_compile_note(&mut self, text: &str) {
        self.session.diagnostics_mut().note(self.line, text);
    }

    pub fn on_string_literal(&mut self, text: &str) {
        self.detect_main();
        self.push_string(DataKind::String, text.as_bytes());
        self.push_length(text.len());
    }

    /// A bare word: push a variable's address or a constant's value, or call it.
    pub fn on_word(&mut self, name: &str) {
        self.detect_main();

        let (id, kind) = match self.lookup(name) {
            Some(symbol) => (symbol.id, symbol.kind),
            None => match self.add_symbol(name, SymbolKind::External) {
                Some(id) => (id, SymbolKind::External),
                None => return,
            },
        };

        match kind {
            kind if kind.is_variable() => {
                self.emit(OpKind::LoadSymbol(Register::R0, id));
                self.emit(OpKind::Push(Register::R0, Stack::Data));
            }
            SymbolKind::IntConstant => {
                self.emit(OpKind::LoadSymbolIndirect(Register::R0, id));
                self.emit(OpKind::Push(Register::R0, Stack::Data));
            }
            SymbolKind::FloatConstant => {
                self.emit(OpKind::LoadSymbolIndirect(Register::R0, id));
                self.emit(OpKind::Push(Register::R0, Stack::Float));
            }
            kind if kind.is_callable() => self.emit(OpKind::Call(id)),
            _ => self.internal_error("invalid symbol type"),
        }
    }

    pub fn on_object_address(&mut self, name: &str) {
        self.detect_main();
        let symbol = match self.lookup(name) {
            Some(symbol) => Some(symbol.id),
            None => self.add_symbol(name, SymbolKind::External),
        };
        if let Some(symbol) = symbol {
            self.emit(OpKind::LoadSymbol(Register::R0, symbol));
            self.emit(OpKind::Push(Register::R0, Stack::Data));
        }
    }

    pub fn on_char(&mut self, literal: &str) {
        if literal.len() > 1 {
            self.warning(format!("char literal '{literal}' >1 character"));
        }
        let value = literal.bytes().next().map_or(0, |byte| byte as i8 as Value);

        self.detect_main();
        self.emit(OpKind::LoadValue(Register::R0, value));
        self.emit(OpKind::Push(Register::R0, Stack::Data));
    }

    pub fn on_integer(&mut self, text: &str) {
        let Ok(value) = parse_integer(text) else {
            self.error(format!("integer literal '{text}' out of range"));
            return;
        };
        self.detect_main();
        self.emit(OpKind::LoadValue(Register::R0, value));
        self.emit(OpKind::Push(Register::R0, Stack::Data));
    }

    /// Float literals travel as the bit pattern of a single precision float.
    pub fn on_float(&mut self, text: &str) {
        let Some(value) = parse_float(text) else {
            self.error(format!("float literal '{text}' out of range"));
            return;
        };
        self.detect_main();
        self.emit(OpKind::LoadValue(Register::R0, value.to_bits() as Value));
        self.emit(OpKind::Push(Register::R0, Stack::Float));
    }

    pub fn on_if(&mut self) {
        let over = self.new_label();
        self.labels.push(over);

        self.detect_main();
        self.emit(OpKind::Pop(Register::R0, Stack::Data));
        self.emit(OpKind::JumpZero(Register::R0, over));
    }

    pub fn on_then(&mut self) {
        self.detect_main();
        if let Some(label) = self.pop_label() {
            self.emit(OpKind::Label(label));
        }
    }

    pub fn on_else(&mut self) {
        let Some(over) = self.pop_label() else {
            return;
        };
        let end = self.new_label();
        self.labels.push(end);

        self.detect_main();
        self.emit(OpKind::Jump(end));
        self.emit(OpKind::Label(over));
    }

    /// DO and ?DO: limit and index go to the return stack, index on top.
    pub fn on_do(&mut self, skip_if_equal: bool) {
        self.detect_main();
        self.emit(OpKind::Pop(Register::R1, Stack::Data));
        self.emit(OpKind::Pop(Register::R0, Stack::Data));

        let done = self.new_label();
        self.labels.push(done);
        if skip_if_equal {
            self.emit(OpKind::JumpEqual(Register::R0, Register::R1, done));
        }

        self.emit(OpKind::Push(Register::R0, Stack::Return));
        self.emit(OpKind::Push(Register::R1, Stack::Return));

        let top = self.new_label();
        self.labels.push(top);
        self.emit(OpKind::Label(top));

        let end = self.new_label();
        self.labels.push(end);
        self.breaks.push(end);
    }

    /// Pop the loop parameters once the loop ends, then close the loop.
    fn finish_loop(&mut self, end: Label) {
        self.emit(OpKind::Label(end));
        self.emit(OpKind::Pop(Register::R0, Stack::Return));
        self.emit(OpKind::Pop(Register::R0, Stack::Return));

        if let Some(done) = self.pop_label() {
            self.emit(OpKind::Label(done));
        }
        self.breaks.pop();
    }

    pub fn on_loop(&mut self) {
        let Some(end) = self.pop_label() else {
            return;
        };

        self.detect_main();
        self.emit(OpKind::Pop(Register::R1, Stack::Return));
        self.emit(OpKind::AddValue(Register::R1, 1));
        self.emit(OpKind::Pop(Register::R0, Stack::Return));
        self.emit(OpKind::Push(Register::R0, Stack::Return));
        self.emit(OpKind::Push(Register::R1, Stack::Return));
        self.emit(OpKind::SubtractRegister {
            reg: Register::R1,
            decrement: Register::R0,
        });

        if let Some(top) = self.pop_label() {
            self.emit(OpKind::JumpNonZero(Register::R1, top));
        }
        self.finish_loop(end);
    }

    /// +LOOP tests the sign of the step at run time and compares in that direction.
    pub fn on_plus_loop(&mut self) {
        let Some(end) = self.pop_label() else {
            return;
        };
        let Some(top) = self.top_label() else {
            return;
        };

        self.detect_main();
        self.emit(OpKind::Pop(Register::R0, Stack::Data));
        self.emit(OpKind::Pop(Register::R1, Stack::Return));
        self.emit(OpKind::AddRegister {
            reg: Register::R1,
            increment: Register::R0,
        });

        let reverse = self.new_label();
        self.emit(OpKind::JumpLessZero(Register::R0, reverse));

        self.emit(OpKind::Pop(Register::R0, Stack::Return));
        self.emit(OpKind::Push(Register::R0, Stack::Return));
        self.emit(OpKind::Push(Register::R1, Stack::Return));
        self.emit(OpKind::SubtractRegister {
            reg: Register::R1,
            decrement: Register::R0,
        });
        self.emit(OpKind::JumpLessZero(Register::R1, top));
        self.emit(OpKind::Jump(end));

        self.emit(OpKind::Label(reverse));
        self.emit(OpKind::Pop(Register::R0, Stack::Return));
        self.emit(OpKind::Push(Register::R0, Stack::Return));
        self.emit(OpKind::Push(Register::R1, Stack::Return));
        self.emit(OpKind::SubtractRegister {
            reg: Register::R1,
            decrement: Register::R0,
        });
        self.emit(OpKind::JumpGreaterEqualZero(Register::R1, top));

        self.labels.pop();
        self.finish_loop(end);
    }

    pub fn on_leave(&mut self) {
        let Some(&target) = self.breaks.last() else {
            self.error("'LEAVE' invalid outside a loop");
            return;
        };
        self.detect_main();
        self.emit(OpKind::Jump(target));
    }

    pub fn on_query_leave(&mut self) {
        let Some(&target) = self.breaks.last() else {
            self.error("'?LEAVE' invalid outside a loop");
            return;
        };
        self.detect_main();
        self.emit(OpKind::Pop(Register::R0, Stack::Data));
        self.emit(OpKind::JumpNonZero(Register::R0, target));
    }

    pub fn on_begin(&mut self) {
        let top = self.new_label();
        self.labels.push(top);

        self.detect_main();
        self.emit(OpKind::Label(top));

        let end = self.new_label();
        self.labels.push(end);
        self.breaks.push(end);
    }

    pub fn on_until(&mut self) {
        let Some(end) = self.pop_label() else {
            return;
        };
        self.detect_main();
        self.emit(OpKind::Pop(Register::R0, Stack::Data));
        if let Some(top) = self.pop_label() {
            self.emit(OpKind::JumpZero(Register::R0, top));
        }
        self.emit(OpKind::Label(end));
        self.breaks.pop();
    }

    pub fn on_while(&mut self) {
        let Some(&target) = self.breaks.last() else {
            self.error("'WHILE' invalid outside a loop");
            return;
        };
        self.detect_main();
        self.emit(OpKind::Pop(Register::R0, Stack::Data));
        self.emit(OpKind::JumpZero(Register::R0, target));
    }

    /// REPEAT and AGAIN branch back to the loop top unconditionally.
    pub fn on_repeat(&mut self) {
        let Some(end) = self.pop_label() else {
            return;
        };
        self.detect_main();
        if let Some(top) = self.pop_label() {
            self.emit(OpKind::Jump(top));
        }
        self.emit(OpKind::Label(end));
        self.breaks.pop();
    }

    pub fn on_case(&mut self) {
        self.detect_main();
        let end = self.new_label();
        self.labels.push(end);
        self.breaks.push(end);
    }

    /// Compare a copy of the selector with the case value.
    pub fn on_of(&mut self) {
        self.detect_main();
        self.emit(OpKind::Pop(Register::R1, Stack::Data));
        self.emit(OpKind::Pop(Register::R0, Stack::Data));
        self.emit(OpKind::Push(Register::R0, Stack::Data));

        let next = self.new_label();
        self.labels.push(next);
        self.emit(OpKind::JumpNotEqual(Register::R0, Register::R1, next));
    }

    pub fn on_endof(&mut self) {
        self.detect_main();
        if let Some(&end) = self.breaks.last() {
            self.emit(OpKind::Jump(end));
        }
        if let Some(next) = self.pop_label() {
            self.emit(OpKind::Label(next));
        }
    }

    /// Close the CASE and drop the selector.
    pub fn on_endcase(&mut self) {
        self.detect_main();
        if let Some(end) = self.pop_label() {
            self.emit(OpKind::Label(end));
        }
        self.breaks.pop();
        self.emit(OpKind::Pop(Register::R0, Stack::Data));
    }

    pub fn on_recurse(&mut self) {
        let Some(current) = self.current_definition else {
            self.error("'RECURSE' invalid outside a definition");
            return;
        };
        self.detect_main();
        self.emit(OpKind::Call(current));
    }

    pub fn on_code(&mut self, name: &str) {
        let symbol = if self.check_undefined(name) {
            self.add_symbol(name, SymbolKind::Codeword)
        } else {
            None
        };
        self.open_definition(symbol);
    }

    /// One raw assembly line, with comments and trailing blanks removed.
    pub fn on_asm_line(&mut self, text: &str) {
        let text = strip_assembly_comment(text);
        if !text.is_empty() {
            let text = self.session.intern_str(text);
            self.emit(OpKind::Assembly(text));
        }
    }

    pub fn on_end_code(&mut self) {
        self.close_definition();
    }

    /// Check the stacks unwound; returns whether the unit parsed cleanly.
    pub fn finish(mut self, accepted: bool) -> bool {
        if !self.session.diagnostics().has_errors() {
            if !(self.labels.is_empty() && self.breaks.is_empty() && self.conditions.is_empty()) {
                self.internal_error("parse stacks not emptied");
            }
            if self.current_definition.is_some() {
                self.internal_error("definition not exited");
            }
            if self.exit_label.is_some() {
                self.internal_error("definition end missed");
            }
            if self.session.is_empty() {
                self.session
                    .diagnostics_mut()
                    .unit_warning("file contained no symbols or code");
            }
        }
        log::debug!(
            "{}: parsed, {} labels used",
            self.session.source_path(),
            self.label_sequence - 1
        );
        accepted && !self.session.diagnostics().has_errors()
    }
}

fn integer_error(err: std::num::ParseIntError) -> LiteralError {
    match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => LiteralError::OutOfRange,
        _ => LiteralError::Malformed,
    }
}

/// Parse an integer literal with an optional sign and radix prefix.
///
/// Positive values beyond the signed range wrap through the unsigned one.
fn parse_integer(text: &str) -> Result<Value, LiteralError> {
    let negative = text.starts_with('-');
    let (digits, radix) = split_radix(strip_sign(text));
    let magnitude = i64::from_str_radix(digits, radix).map_err(integer_error)?;
    let value = if negative { -magnitude } else { magnitude };

    if let Ok(value) = Value::try_from(value) {
        return Ok(value);
    }
    if negative {
        return Err(LiteralError::OutOfRange);
    }
    u32::try_from(value)
        .map(|value| value as Value)
        .map_err(|_| LiteralError::OutOfRange)
}

/// Parse a float literal; a bare exponent marker means an exponent of zero.
///
/// Overflow and underflow of a non-zero mantissa are both out of range.
fn parse_float(text: &str) -> Option<f32> {
    let mut normalized = text.to_string();
    if normalized.ends_with(|c: char| matches!(c, 'e' | 'E' | '+' | '-')) {
        normalized.push('0');
    }
    let value: f32 = normalized.parse().ok()?;
    let mantissa = text.split(['e', 'E']).next().unwrap_or(text);
    let underflow = value == 0.0 && mantissa.bytes().any(|b| matches!(b, b'1'..=b'9'));
    (value.is_finite() && !underflow).then_some(value)
}

/// Remove `\` and `#` comments outside double quotes, and trailing blanks.
fn strip_assembly_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut end = bytes.len();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' | b'#' => {
                end = i;
                break;
            }
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    line[..end].trim_end_matches(|c: char| matches!(c, ' ' | '\t' | '\r'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    fn kinds<'a>(session: &CompilationSession<'a>) -> Vec<OpKind<'a>> {
        session.opcodes().iter().map(|op| op.kind).collect()
    }

    #[test]
    fn test_integer_literals() {
        assert_eq!(parse_integer("42"), Ok(42));
        assert_eq!(parse_integer("-42"), Ok(-42));
        assert_eq!(parse_integer("$ff"), Ok(255));
        assert_eq!(parse_integer("0x10"), Ok(16));
        assert_eq!(parse_integer("%101"), Ok(5));
        assert_eq!(parse_integer("0o17"), Ok(15));
        assert_eq!(parse_integer("#12"), Ok(12));
        assert_eq!(parse_integer("4294967295"), Ok(-1));
        assert_eq!(parse_integer("-2147483649"), Err(LiteralError::OutOfRange));
        assert_eq!(parse_integer("4294967296"), Err(LiteralError::OutOfRange));
        assert_eq!(parse_integer("99999999999999999999999"), Err(LiteralError::OutOfRange));
        assert_eq!(parse_integer("abc"), Err(LiteralError::Malformed));
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(parse_float("1.5"), Some(1.5));
        assert_eq!(parse_float("2e"), Some(2.0));
        assert_eq!(parse_float("1e-"), Some(1.0));
        assert_eq!(parse_float("1e99"), None);
        assert_eq!(parse_float("1e-50"), None);
        assert_eq!(parse_float("0.0e-50"), Some(0.0));
    }

    #[test]
    fn test_array_size_beyond_signed_range() {
        let arena = Bump::new();
        let mut session = CompilationSession::new(&arena, "t.fs");
        let definitions = Definitions::new();
        let mut driver = Driver::new(&mut session, &definitions);
        driver.set_position(1, "create big");
        driver.on_create("big", "4294967295", Some("cells"));
        driver.on_create("none", "0", None);
        assert!(!driver.finish(true));

        let errors: Vec<&str> = session.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            errors,
            vec![
                "array size '4294967295' out of range",
                "array 'none' cannot have size zero or less",
            ]
        );
        assert!(session.symbols().lookup("big").is_none());
    }

    #[test]
    fn test_top_level_case_declares_main() {
        let arena = Bump::new();
        let mut session = CompilationSession::new(&arena, "t.fs");
        let definitions = Definitions::new();
        let mut driver = Driver::new(&mut session, &definitions);
        driver.on_case();
        driver.on_endcase();
        assert!(driver.finish(true));
        assert!(session.symbols().lookup("main").is_some());
    }

    #[test]
    fn test_assembly_comments() {
        assert_eq!(strip_assembly_comment("  movl %eax, %edx   # copy"), "  movl %eax, %edx");
        assert_eq!(strip_assembly_comment("  .ascii \"a#b\\\"c\" \\ note"), "  .ascii \"a#b\\\"c\"");
        assert_eq!(strip_assembly_comment("# only"), "");
    }

    #[test]
    fn test_if_then() {
        let arena = Bump::new();
        let mut session = CompilationSession::new(&arena, "t.fs");
        let definitions = Definitions::new();
        let mut driver = Driver::new(&mut session, &definitions);
        driver.on_if();
        driver.on_word("x");
        driver.on_then();
        assert!(driver.labels.is_empty());
        assert!(driver.finish(true));

        let main = session.symbols().lookup("main").unwrap().id;
        let x = session.symbols().lookup("x").unwrap().id;
        assert_eq!(
            kinds(&session),
            vec![
                OpKind::Pop(Register::R0, Stack::Data),
                OpKind::JumpZero(Register::R0, Label(1)),
                OpKind::Call(x),
                OpKind::Label(Label(1)),
            ]
        );
        assert_ne!(main, x);
    }

    #[test]
    fn test_colon_definition() {
        let arena = Bump::new();
        let mut session = CompilationSession::new(&arena, "t.fs");
        let definitions = Definitions::new();
        let mut driver = Driver::new(&mut session, &definitions);
        driver.on_colon("double");
        driver.on_word("dup");
        driver.on_word("+");
        driver.on_exit();
        driver.on_semicolon();
        assert!(driver.finish(true));

        let double = session.symbols().lookup("double").unwrap().id;
        let ops = kinds(&session);
        assert_eq!(ops.first(), Some(&OpKind::Define(double)));
        assert_eq!(ops[3], OpKind::Jump(Label(1)));
        assert_eq!(ops[4], OpKind::Label(Label(1)));
        assert_eq!(ops.last(), Some(&OpKind::EndDefine(double)));
        assert!(session.symbols().lookup("main").is_none());
    }

    #[test]
    fn test_leave_outside_loop_is_an_error() {
        let arena = Bump::new();
        let mut session = CompilationSession::new(&arena, "t.fs");
        let definitions = Definitions::new();
        let mut driver = Driver::new(&mut session, &definitions);
        driver.set_position(3, "leave");
        driver.on_leave();
        assert!(!driver.finish(true));

        let rendered = session.diagnostics().rendered();
        assert_eq!(rendered, vec!["t.fs:3: error: near 'leave', 'LEAVE' invalid outside a loop"]);
    }

    #[test]
    fn test_do_loop_stacks_unwind() {
        let arena = Bump::new();
        let mut session = CompilationSession::new(&arena, "t.fs");
        let definitions = Definitions::new();
        let mut driver = Driver::new(&mut session, &definitions);
        driver.on_do(true);
        driver.on_leave();
        driver.on_plus_loop();
        assert!(driver.labels.is_empty());
        assert!(driver.breaks.is_empty());
        assert!(driver.finish(true));

        let ops = kinds(&session);
        assert_eq!(ops[2], OpKind::JumpEqual(Register::R0, Register::R1, Label(1)));
        assert_eq!(ops[5], OpKind::Label(Label(2)));
        assert_eq!(ops[6], OpKind::Jump(Label(3)));
        assert_eq!(ops.last(), Some(&OpKind::Label(Label(1))));
    }

    #[test]
    fn test_duplicate_definitions() {
        let arena = Bump::new();
        let mut session = CompilationSession::new(&arena, "t.fs");
        let definitions = Definitions::new();
        let mut driver = Driver::new(&mut session, &definitions);
        driver.set_position(1, "foo");
        driver.on_word("foo");
        driver.set_position(2, ": foo");
        driver.on_colon("foo");
        driver.on_semicolon();
        driver.set_position(3, "variable v");
        driver.on_variable("v");
        driver.set_position(4, "variable v");
        driver.on_variable("V");
        assert!(!driver.finish(true));

        let messages: Vec<_> = session.diagnostics().iter().map(|d| d.message.clone()).collect();
        assert_eq!(
            messages,
            vec![
                "symbol 'foo' already implicitly external, from line 1",
                "multiple symbol definition 'V', from line 3",
            ]
        );
    }

    #[test]
    fn test_conditional_compilation() {
        let arena = Bump::new();
        let mut session = CompilationSession::new(&arena, "t.fs");
        let definitions: Definitions = ["FOO"].into_iter().collect();
        let mut driver = Driver::new(&mut session, &definitions);
        driver.on_ifdef("foo", false);
        assert!(driver.cond_state());
        driver.on_ifdef("bar", false);
        assert!(!driver.cond_state());
        driver.on_cond_else();
        assert!(driver.cond_state());
        driver.on_cond_then("[THEN]");
        driver.on_cond_else();
        assert!(!driver.cond_state());
        driver.on_cond_then("[ENDIF]");
        driver.on_cond_then("[THEN]");
        assert!(!driver.finish(true));

        let errors: Vec<_> = session.diagnostics().iter().map(|d| d.message.clone()).collect();
        assert_eq!(errors, vec!["parse error, unexpected [THEN]"]);
    }

    #[test]
    fn test_anonymous_word_pushes_its_address() {
        let arena = Bump::new();
        let mut session = CompilationSession::new(&arena, "t.fs");
        let definitions = Definitions::new();
        let mut driver = Driver::new(&mut session, &definitions);
        driver.on_noname();
        driver.on_semicolon();
        assert!(driver.finish(true));

        let ops = kinds(&session);
        let OpKind::Define(anon) = ops[0] else {
            panic!("expected a definition, got {:?}", ops[0]);
        };
        assert_eq!(
            &ops[1..],
            &[
                OpKind::Label(Label(1)),
                OpKind::EndDefine(anon),
                OpKind::LoadSymbol(Register::R0, anon),
                OpKind::Push(Register::R0, Stack::Data),
            ]
        );
        assert!(session.symbols().lookup("main").is_some());
    }
}
