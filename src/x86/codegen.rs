// This module lowers one finished compilation unit to 32-bit x86 AT&T assembly text. It is
// a single read-only walk over the session: the module preamble, the read-only literal
// data, the storage declarations of variables, arrays and constants, and finally the
// opcode sequence. Each opcode maps to a fixed instruction template over the two physical
// registers; stack traffic lowers to calls of the runtime's push and pop routines, which
// take and return the value in %eax. Position independent code reaches symbols through
// the GOT and literals through GOT-relative offsets, with %ebx holding the GOT base set
// up by the function prologue. With debugging, a line stab precedes every opcode whose
// source line differs from the previous one.

//! Assembly emission.

use std::io::Write;

use crate::core::error::{CompileError, CompileResult};
use crate::core::options::Options;
use crate::core::session::CompilationSession;
use crate::ir::data::{Data, DataKind};
use crate::ir::opcode::{OpKind, Opcode};
use crate::ir::operand::{Register, Value};
use crate::ir::symbol::{SymbolId, Units};
use crate::x86::frame::FunctionFrame;
use crate::x86::{cpu_register, stabs, CELL_SIZE};

/// Storage of this many bytes or more is aligned to 32.
const LARGE_STORAGE: usize = 32;

/// Write the unit held by `session` to `out`.
pub fn generate<W: Write>(
    session: &CompilationSession<'_>,
    options: &Options,
    out: &mut W,
) -> CompileResult<()> {
    CodeGenerator::new(session, options, out).run()
}

struct CodeGenerator<'s, 'arena, W> {
    session: &'s CompilationSession<'arena>,
    options: &'s Options,
    out: &'s mut W,
    /// Frame of the definition being emitted.
    frame: Option<FunctionFrame<'arena>>,
    /// Source line of the last line stab.
    last_line: u32,
    /// Numbers the debug line labels.
    sequence: usize,
}

impl<'s, 'arena, W: Write> CodeGenerator<'s, 'arena, W> {
    fn new(session: &'s CompilationSession<'arena>, options: &'s Options, out: &'s mut W) -> Self {
        Self {
            session,
            options,
            out,
            frame: None,
            last_line: 0,
            sequence: 0,
        }
    }

    fn run(mut self) -> CompileResult<()> {
        log::debug!("generating assembly for {}", self.session.source_path());
        self.write_preamble()?;
        self.write_data()?;
        self.write_storage()?;
        let session = self.session;
        for opcode in session.opcodes().iter() {
            self.write_opcode(opcode)?;
            self.sequence += 1;
        }
        self.write_postamble()
    }

    fn write_preamble(&mut self) -> CompileResult<()> {
        let path = self.session.source_path();
        writeln!(self.out, "\t.file\t\"{path}\"")?;
        writeln!(self.out, "\t.version\t\"01.01\"")?;
        writeln!(self.out, "forth_compiled.:")?;
        if self.options.profiling {
            writeln!(self.out, "\tnop")?;
        }
        if self.options.debugging {
            let directory = std::env::current_dir()?;
            let directory = directory.to_string_lossy();
            stabs::write_preamble(self.out, path, Some(&directory))?;
        }
        Ok(())
    }

    fn write_postamble(&mut self) -> CompileResult<()> {
        if self.options.debugging {
            stabs::write_end_of_text(self.out)?;
        }
        writeln!(
            self.out,
            "\t.ident\t \"forthc {}, Linux\"",
            env!("CARGO_PKG_VERSION")
        )?;
        Ok(())
    }

    /// One label per item, the bytes once per group of identical items.
    fn write_data(&mut self) -> CompileResult<()> {
        let session = self.session;
        let data = session.data();
        if data.is_empty() {
            return Ok(());
        }
        writeln!(self.out, ".section\t.rodata")?;
        for group in data.groups() {
            let Some(owner) = group.first() else {
                continue;
            };
            for item in &group {
                writeln!(self.out, ".LC{}:", item.id.0)?;
            }
            writeln!(self.out, "\t.string \"{}\"", escape_bytes(owner))?;
        }
        Ok(())
    }

    fn write_storage(&mut self) -> CompileResult<()> {
        let session = self.session;
        for symbol in session.symbols().iter() {
            let name = symbol.name;
            if let Some((units, size)) = symbol.kind.storage() {
                let bytes = size * units.width();
                let align = if bytes >= LARGE_STORAGE {
                    LARGE_STORAGE
                } else {
                    units.width()
                };
                if self.options.debugging {
                    stabs::write_global(self.out, name, units, size)?;
                }
                writeln!(self.out, "\t.comm  {name},{bytes},{align}")?;
            } else if symbol.kind.is_constant() {
                if self.options.debugging {
                    stabs::write_global(self.out, name, Units::Cell, 1)?;
                }
                writeln!(self.out, "\t.comm  {name},{CELL_SIZE},{CELL_SIZE}")?;
            }
        }
        Ok(())
    }

    fn symbol_name(&self, id: SymbolId) -> CompileResult<&'arena str> {
        Ok(self.session.symbols().get(id)?.name)
    }

    /// Suffix routing calls through the PLT.
    fn plt(&self) -> &'static str {
        if self.options.position_independent {
            "@PLT"
        } else {
            ""
        }
    }

    fn write_line_stab(&mut self, line: u32) -> CompileResult<()> {
        let Some(frame) = &self.frame else {
            return Err(CompileError::Codegen {
                reason: format!("line {line} lies outside any definition"),
            });
        };
        stabs::write_line(self.out, line, "LM", self.sequence, frame.name())?;
        Ok(())
    }

    fn write_opcode(&mut self, opcode: &Opcode<'arena>) -> CompileResult<()> {
        if self.options.debugging && opcode.line != self.last_line && !opcode.kind.is_pseudo() {
            self.write_line_stab(opcode.line)?;
        }
        self.last_line = opcode.line;

        let optimize = self.options.optimize;
        let pic = self.options.position_independent;
        match opcode.kind {
            OpKind::Define(id) => {
                let symbol = self.session.symbols().get(id)?;
                let frame = FunctionFrame::new(symbol);
                frame.emit_prologue(self.out, self.options, opcode.line, self.sequence)?;
                self.frame = Some(frame);
            }
            OpKind::EndDefine(_) => {
                let Some(frame) = self.frame.take() else {
                    return Err(CompileError::Codegen {
                        reason: format!("definition end on line {} without a start", opcode.line),
                    });
                };
                frame.emit_epilogue(self.out, self.options, opcode.line, self.sequence)?;
            }
            OpKind::Label(label) => writeln!(self.out, ".L{}:", label.value())?,
            OpKind::Assembly(text) => writeln!(self.out, "{text}")?,
            OpKind::Call(id) => {
                let name = self.symbol_name(id)?;
                let plt = self.plt();
                writeln!(self.out, "\tcall {name}{plt}")?;
            }
            OpKind::LoadValue(reg, value) => {
                let reg = cpu_register(reg);
                if optimize && matches!(value, -1..=1) {
                    writeln!(self.out, "\txor {reg},{reg}")?;
                    self.write_step(reg, value)?;
                } else {
                    writeln!(self.out, "\tmov ${value},{reg}")?;
                }
            }
            OpKind::LoadRegister { reg, with } => {
                writeln!(self.out, "\tmov {},{}", cpu_register(with), cpu_register(reg))?;
            }
            OpKind::LoadSymbol(reg, id) => {
                let name = self.symbol_name(id)?;
                let reg = cpu_register(reg);
                if pic {
                    writeln!(self.out, "\tmov {name}@GOT(%ebx),{reg}")?;
                } else {
                    writeln!(self.out, "\tlea {name},{reg}")?;
                }
            }
            OpKind::LoadSymbolIndirect(reg, id) => {
                let name = self.symbol_name(id)?;
                let reg = cpu_register(reg);
                if pic {
                    writeln!(self.out, "\tmov {name}@GOT(%ebx),%ecx")?;
                    writeln!(self.out, "\tmov (%ecx),{reg}")?;
                } else {
                    writeln!(self.out, "\tmov ({name}),{reg}")?;
                }
            }
            OpKind::LoadData(reg, id) => {
                let reg = cpu_register(reg);
                let offset = if pic { "@GOTOFF(%ebx)" } else { "" };
                writeln!(self.out, "\tlea .LC{}{offset},{reg}", id.0)?;
            }
            OpKind::StoreSymbolIndirect(reg, id) => {
                let name = self.symbol_name(id)?;
                let reg = cpu_register(reg);
                if pic {
                    writeln!(self.out, "\tmov {name}@GOT(%ebx),%ecx")?;
                    writeln!(self.out, "\tmov {reg},(%ecx)")?;
                } else {
                    writeln!(self.out, "\tmov {reg},({name})")?;
                }
            }
            OpKind::Push(reg, stack) => self.write_stack_call(reg, stack.push_function())?,
            OpKind::Pop(reg, stack) => self.write_stack_call(reg, stack.pop_function())?,
            OpKind::AddValue(reg, value) => {
                let reg = cpu_register(reg);
                if optimize && matches!(value, -1..=1) {
                    self.write_step(reg, value)?;
                } else {
                    writeln!(self.out, "\tadd ${value},{reg}")?;
                }
            }
            OpKind::AddRegister { reg, increment } => {
                writeln!(self.out, "\tadd {},{}", cpu_register(increment), cpu_register(reg))?;
            }
            OpKind::SubtractValue(reg, value) => {
                let reg = cpu_register(reg);
                if optimize && matches!(value, -1..=1) {
                    self.write_step(reg, -value)?;
                } else {
                    writeln!(self.out, "\tsub ${value},{reg}")?;
                }
            }
            OpKind::SubtractRegister { reg, decrement } => {
                writeln!(self.out, "\tsub {},{}", cpu_register(decrement), cpu_register(reg))?;
            }
            OpKind::Jump(label) => writeln!(self.out, "\tjmp .L{}", label.value())?,
            OpKind::JumpZero(reg, label) => self.write_zero_test(reg, "je", label.value())?,
            OpKind::JumpNonZero(reg, label) => self.write_zero_test(reg, "jne", label.value())?,
            OpKind::JumpGreaterZero(reg, label) => self.write_zero_test(reg, "jg", label.value())?,
            OpKind::JumpLessZero(reg, label) => self.write_zero_test(reg, "jl", label.value())?,
            OpKind::JumpGreaterEqualZero(reg, label) => {
                self.write_zero_test(reg, "jge", label.value())?
            }
            OpKind::JumpLessEqualZero(reg, label) => {
                self.write_zero_test(reg, "jle", label.value())?
            }
            OpKind::JumpEqual(r1, r2, label) => self.write_compare(r1, r2, "je", label.value())?,
            OpKind::JumpNotEqual(r1, r2, label) => {
                self.write_compare(r1, r2, "jne", label.value())?
            }
            OpKind::NoOp => {}
        }
        Ok(())
    }

    /// Add -1, 0 or 1 to `reg` with `inc`/`dec`.
    fn write_step(&mut self, reg: &str, value: Value) -> CompileResult<()> {
        match value {
            1 => writeln!(self.out, "\tinc {reg}")?,
            -1 => writeln!(self.out, "\tdec {reg}")?,
            _ => {}
        }
        Ok(())
    }

    /// Runtime stack routines take and return their value in %eax.
    fn write_stack_call(&mut self, reg: Register, function: String) -> CompileResult<()> {
        let reg = cpu_register(reg);
        let primary = cpu_register(Register::R0);
        let exchange = reg != primary;
        let plt = self.plt();
        if exchange {
            writeln!(self.out, "\txchg {reg},{primary}")?;
        }
        writeln!(self.out, "\tcall {function}{plt}")?;
        if exchange {
            writeln!(self.out, "\txchg {primary},{reg}")?;
        }
        Ok(())
    }

    fn write_zero_test(&mut self, reg: Register, jump: &str, label: u32) -> CompileResult<()> {
        let reg = cpu_register(reg);
        writeln!(self.out, "\ttest {reg},{reg}")?;
        writeln!(self.out, "\t{jump} .L{label}")?;
        Ok(())
    }

    fn write_compare(
        &mut self,
        r1: Register,
        r2: Register,
        jump: &str,
        label: u32,
    ) -> CompileResult<()> {
        writeln!(self.out, "\tcmp {},{}", cpu_register(r1), cpu_register(r2))?;
        writeln!(self.out, "\t{jump} .L{label}")?;
        Ok(())
    }
}

/// Bytes of `data` as the operand of `.string`.
///
/// Printable bytes pass through; quotes, backslashes and everything else
/// become three-digit octal escapes. Counted strings get their length byte
/// in front.
fn escape_bytes(data: &Data<'_>) -> String {
    let mut text = String::with_capacity(data.bytes.len() + 4);
    let mut push = |byte: u8| {
        if (byte.is_ascii_graphic() || byte == b' ') && byte != b'"' && byte != b'\\' {
            text.push(byte as char);
        } else {
            text.push_str(&format!("\\{byte:03o}"));
        }
    };
    if data.kind == DataKind::CountedString {
        push(data.bytes.len() as u8);
    }
    for &byte in data.bytes {
        push(byte);
    }
    text
}
