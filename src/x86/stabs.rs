// This module writes the stabs debug directives a traditional Unix debugger reads from
// 32-bit assembly: the source file and directory entries, the four language types the
// compiler describes (void, cell, unsigned cell, char), global storage entries for
// variables, arrays and constants, function entries, per-line entries relative to the
// enclosing function, and the lexical block markers closing each function.

//! Stabs debug directives.

use std::io::{self, Write};

use crate::ir::symbol::Units;

/// Stab kinds used in directives.
pub const N_OPT: u32 = 0x3c;
pub const N_GSYM: u32 = 40;
pub const N_FUN: u32 = 36;
pub const N_SLINE: u32 = 68;
pub const N_SO: u32 = 100;
pub const N_LSYM: u32 = 128;
pub const N_LBRAC: u32 = 192;
pub const N_RBRAC: u32 = 224;

/// Type numbers declared in the preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabType {
    Void = 1,
    Cell = 2,
    UCell = 3,
    Char = 4,
}

impl StabType {
    pub fn number(self) -> u32 {
        self as u32
    }

    fn for_units(units: Units) -> Self {
        match units {
            Units::Cell => StabType::Cell,
            Units::Character => StabType::Char,
        }
    }
}

/// Source file entries and the type declarations.
pub fn write_preamble<W: Write>(out: &mut W, source_path: &str, directory: Option<&str>) -> io::Result<()> {
    if let Some(directory) = directory {
        writeln!(out, ".stabs\t\"{directory}/\",{N_SO},0,0,Ltext0")?;
    }
    writeln!(out, ".stabs\t\"{source_path}\",{N_SO},0,0,Ltext0")?;
    writeln!(out, "\t.stabs\t\"forth_compiled.\",{N_OPT:#x},0,0,0")?;
    writeln!(out, ".text")?;
    writeln!(out, "Ltext0:")?;

    let void = StabType::Void.number();
    let cell = StabType::Cell.number();
    let ucell = StabType::UCell.number();
    let character = StabType::Char.number();
    writeln!(out, ".stabs\t\"void:t{void}={void};\",{N_LSYM},0,0,0")?;
    writeln!(
        out,
        ".stabs\t\"cell:t{cell}=r{cell};{};{};\",{N_LSYM},0,0,0",
        i32::MIN,
        i32::MAX
    )?;
    writeln!(
        out,
        ".stabs\t\"ucell:t{ucell}=r{cell};0;{};\",{N_LSYM},0,0,0",
        u32::MAX as i32
    )?;
    writeln!(
        out,
        ".stabs\t\"char:t{character}=r{character};0;{};\",{N_LSYM},0,0,0",
        i8::MAX
    )
}

pub fn write_end_of_text<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\t.text")?;
    writeln!(out, "\t.stabs\t\"\",{N_SO},0,0,.Letext")?;
    writeln!(out, ".Letext:")
}

/// Global storage of `size` elements of `units`.
pub fn write_global<W: Write>(out: &mut W, name: &str, units: Units, size: usize) -> io::Result<()> {
    let cell = StabType::Cell.number();
    if units == Units::Cell && size == 1 {
        writeln!(out, ".stabs\t\"{name}:G{cell}\",{N_GSYM},0,0,{name}")
    } else {
        writeln!(
            out,
            ".stabs\t\"{name}:Gar{cell};0;{};{}\",{N_GSYM},0,0,{name}",
            size - 1,
            StabType::for_units(units).number()
        )
    }
}

pub fn write_function<W: Write>(out: &mut W, name: &str) -> io::Result<()> {
    writeln!(out, ".stabs \"{name}:F{}\",{N_FUN},0,0,{name}", StabType::Void.number())
}

/// Line entry labelled `.<prefix><sequence>` relative to `function`.
pub fn write_line<W: Write>(
    out: &mut W,
    line: u32,
    prefix: &str,
    sequence: usize,
    function: &str,
) -> io::Result<()> {
    writeln!(out, ".stabn {N_SLINE},0,{line},.{prefix}{sequence}-{function}")?;
    writeln!(out, ".{prefix}{sequence}:")
}

/// Block and scope markers closing function `id`.
pub fn write_scope<W: Write>(out: &mut W, id: u32, name: &str) -> io::Result<()> {
    writeln!(out, ".stabn\t{N_LBRAC},0,0,.LBB{id}-{name}")?;
    writeln!(out, ".stabn\t{N_RBRAC},0,0,.LBE{id}-{name}")?;
    writeln!(out, ".Lscope{id}:")?;
    writeln!(out, ".stabs\t\"\",{N_FUN},0,0,.Lscope{id}-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(write: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        write(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_type_declarations() {
        let preamble = text(|out| write_preamble(out, "t.fs", None));
        assert!(preamble.starts_with(".stabs\t\"t.fs\",100,0,0,Ltext0\n"));
        assert!(preamble.contains("\t.stabs\t\"forth_compiled.\",0x3c,0,0,0\n"));
        assert!(preamble.contains("\"cell:t2=r2;-2147483648;2147483647;\",128,0,0,0"));
        assert!(preamble.contains("\"ucell:t3=r2;0;-1;\",128,0,0,0"));
        assert!(preamble.contains("\"char:t4=r4;0;127;\",128,0,0,0"));
    }

    #[test]
    fn test_globals() {
        assert_eq!(
            text(|out| write_global(out, "v4_x", Units::Cell, 1)),
            ".stabs\t\"v4_x:G2\",40,0,0,v4_x\n"
        );
        assert_eq!(
            text(|out| write_global(out, "v4_buf", Units::Character, 80)),
            ".stabs\t\"v4_buf:Gar2;0;79;4\",40,0,0,v4_buf\n"
        );
    }

    #[test]
    fn test_line_entry() {
        assert_eq!(
            text(|out| write_line(out, 7, "LM", 3, "main")),
            ".stabn 68,0,7,.LM3-main\n.LM3:\n"
        );
    }
}
