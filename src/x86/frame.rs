// This module generates the entry and exit sequences of every compiled definition on
// 32-bit x86. Each function sets up an %ebp frame and saves the callee-saved registers
// it may touch: %ebx alone for ordinary words, %ebx, %edi and %esi for code words whose
// body is raw assembly. %ebx is saved first in both cases so the frame part used for
// stack unwinding has one layout. With position independent code, %ebx is then loaded
// with the GOT base through the call/pop/add idiom. The `main` definition copies argc,
// argv and envp from its caller's frame into the runtime's globals, and with profiling
// every function bumps its own counter through `mcount`. The epilogue restores the saved
// registers in reverse and closes the function's size and debug scope.

//! Function prologue and epilogue.

use std::io::Write;

use crate::core::error::CompileResult;
use crate::core::mangler::mangle;
use crate::core::options::Options;
use crate::ir::symbol::{Symbol, SymbolKind};
use crate::x86::stabs;
use crate::x86::CELL_SIZE;

/// Stack frame layout of one definition.
pub struct FunctionFrame<'a> {
    name: &'a str,
    id: u32,
    is_codeword: bool,
    is_anonymous: bool,
    /// Callee-saved registers, in push order.
    saved_registers: &'static [&'static str],
}

impl<'a> FunctionFrame<'a> {
    pub fn new(symbol: &Symbol<'a>) -> Self {
        let is_codeword = symbol.kind == SymbolKind::Codeword;
        let saved_registers: &'static [&'static str] = if is_codeword {
            &["%ebx", "%edi", "%esi"]
        } else {
            &["%ebx"]
        };
        Self {
            name: symbol.name,
            id: symbol.id.0,
            is_codeword,
            is_anonymous: symbol.kind == SymbolKind::Anonword,
            saved_registers,
        }
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn saved_registers(&self) -> &'static [&'static str] {
        self.saved_registers
    }

    fn is_main(&self) -> bool {
        self.name == "main"
    }

    /// Emit the function header and entry code.
    ///
    /// `sequence` numbers the debug line labels of this definition.
    pub fn emit_prologue<W: Write>(
        &self,
        out: &mut W,
        options: &Options,
        line: u32,
        sequence: usize,
    ) -> CompileResult<()> {
        let name = self.name;
        let id = self.id;

        writeln!(out, ".text")?;
        writeln!(out, "\t.align 4")?;
        if options.debugging {
            stabs::write_function(out, name)?;
        }
        if !self.is_anonymous {
            if options.weak_symbols {
                writeln!(out, "\t.weak {name}")?;
            } else {
                writeln!(out, ".globl {name}")?;
            }
        }
        writeln!(out, "\t.type\t{name},@function")?;
        writeln!(out, "{name}:")?;
        if options.debugging {
            stabs::write_line(out, line, "LMa", sequence, name)?;
        }

        writeln!(out, "\tpush %ebp")?;
        writeln!(out, "\tmov %esp,%ebp")?;
        for register in self.saved_registers {
            writeln!(out, "\tpush {register}")?;
        }

        if options.position_independent {
            writeln!(out, "\tcall .Lpic{id}")?;
            writeln!(out, ".Lpic{id}:")?;
            writeln!(out, "\tpop %ebx")?;
            writeln!(out, "\tadd $_GLOBAL_OFFSET_TABLE_+[.-.Lpic{id}],%ebx")?;
            writeln!(out, "0:")?;
        }

        if self.is_main() {
            self.emit_main_arguments(out, options)?;
        }
        if options.profiling {
            self.emit_profiling_hook(out, options)?;
        }

        if options.debugging {
            stabs::write_line(out, line, "LMb", sequence, name)?;
            writeln!(out, ".LBB{id}:")?;
        }
        if self.is_codeword {
            writeln!(out, "#APP")?;
        }
        Ok(())
    }

    /// Copy argc, argv and envp from the caller's frame into the runtime globals.
    fn emit_main_arguments<W: Write>(&self, out: &mut W, options: &Options) -> CompileResult<()> {
        let globals = ["_argc", "_argv", "_envp"];
        for (index, global) in globals.iter().enumerate() {
            let offset = 2 * CELL_SIZE + index * CELL_SIZE;
            let global = mangle(global);
            writeln!(out, "\tmov {offset}(%ebp),%eax")?;
            if options.position_independent {
                writeln!(out, "\tmov {global}@GOT(%ebx),%ecx")?;
                writeln!(out, "\tmov %eax,(%ecx)")?;
            } else {
                writeln!(out, "\tmov %eax,{global}")?;
            }
        }
        Ok(())
    }

    fn emit_profiling_hook<W: Write>(&self, out: &mut W, options: &Options) -> CompileResult<()> {
        let id = self.id;
        writeln!(out, ".data")?;
        writeln!(out, "\t.align 4")?;
        writeln!(out, ".LP{id}:")?;
        writeln!(out, "\t.long 0")?;
        writeln!(out, ".text")?;

        writeln!(out, "\tpush %edx")?;
        if options.position_independent {
            writeln!(out, "\tlea .LP{id}@GOTOFF(%ebx),%edx")?;
            writeln!(out, "\tcall *mcount@GOT(%ebx)")?;
        } else {
            writeln!(out, "\tmov $.LP{id},%edx")?;
            writeln!(out, "\tcall mcount")?;
        }
        writeln!(out, "\tpop %edx")?;
        Ok(())
    }

    /// Emit the exit code and the function trailer.
    pub fn emit_epilogue<W: Write>(
        &self,
        out: &mut W,
        options: &Options,
        line: u32,
        sequence: usize,
    ) -> CompileResult<()> {
        let name = self.name;
        let id = self.id;

        if self.is_codeword {
            writeln!(out, "#NO_APP")?;
        }
        if options.debugging {
            writeln!(out, ".LBE{id}:")?;
            stabs::write_line(out, line, "LM", sequence, name)?;
        }

        for register in self.saved_registers.iter().rev() {
            writeln!(out, "\tpop {register}")?;
        }
        writeln!(out, "\tleave")?;
        writeln!(out, "\tret")?;

        writeln!(out, ".Lfe{id}:")?;
        writeln!(out, "\t.size\t {name},.Lfe{id}-{name}")?;
        if options.debugging {
            stabs::write_scope(out, id, name)?;
        }
        Ok(())
    }
}
