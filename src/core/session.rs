// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession is the per-unit context object: it borrows the arena that owns every
// interned name, literal byte blob and assembly line of one source file, and owns the
// three tables (symbols, data, opcodes) whose handle counters restart with each unit, the
// diagnostics collector for the unit, and its statistics. Nothing here is global; the
// driver binary creates one session per input file and resets the arena in between.
// SessionStats tracks terminals consumed, opcodes allocated, and optimizer rounds and
// rewrites per pass, and is logged at debug level.

//! Arena-based compilation session management.
//!
//! All tables of a unit borrow the session arena, so names and literal bytes
//! are allocated once and shared by reference until the unit is dropped.

use std::fmt;

use bumpalo::Bump;

use crate::core::diagnostics::Diagnostics;
use crate::ir::data::DataTable;
use crate::ir::opcode::OpcodeTable;
use crate::ir::optimize::{OptimizeReport, Pass};
use crate::ir::symbol::SymbolTable;

/// Context of one compilation unit.
pub struct CompilationSession<'arena> {
    /// Arena allocator for names, literal bytes and assembly text.
    arena: &'arena Bump,

    symbols: SymbolTable<'arena>,
    data: DataTable<'arena>,
    opcodes: OpcodeTable<'arena>,

    diagnostics: Diagnostics,

    /// Session statistics for debugging.
    stats: SessionStats,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new session for the file at `source_path`.
    pub fn new(arena: &'arena Bump, source_path: &str) -> Self {
        Self {
            arena,
            symbols: SymbolTable::new(arena),
            data: DataTable::new(arena),
            opcodes: OpcodeTable::new(),
            diagnostics: Diagnostics::new(source_path),
            stats: SessionStats::default(),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        self.arena.alloc_str(s)
    }

    pub fn source_path(&self) -> &str {
        self.diagnostics.source_path()
    }

    pub fn symbols(&self) -> &SymbolTable<'arena> {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable<'arena> {
        &mut self.symbols
    }

    pub fn data(&self) -> &DataTable<'arena> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataTable<'arena> {
        &mut self.data
    }

    pub fn opcodes(&self) -> &OpcodeTable<'arena> {
        &self.opcodes
    }

    pub fn opcodes_mut(&mut self) -> &mut OpcodeTable<'arena> {
        &mut self.opcodes
    }

    /// Opcodes for rewriting alongside the symbols they reference.
    pub fn opcodes_and_symbols(&mut self) -> (&mut OpcodeTable<'arena>, &SymbolTable<'arena>) {
        (&mut self.opcodes, &self.symbols)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// True when no table holds anything.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.data.is_empty() && self.opcodes.is_empty()
    }

    /// Empty every table; handle counters restart at zero.
    pub fn clear(&mut self) {
        self.symbols.clear();
        self.data.clear();
        self.opcodes.clear();
        self.stats = SessionStats::default();
    }

    /// Record a terminal consumed by the front end.
    pub fn record_terminal(&mut self) {
        self.stats.terminals += 1;
    }

    /// Record an optimizer run.
    pub fn record_optimization(&mut self, report: &OptimizeReport) {
        self.stats.optimizer_iterations += report.iterations;
        for pass in Pass::ALL {
            let rewrites = report.rewrites(pass);
            if rewrites > 0 {
                *self.stats.rewrites.entry(pass.name()).or_insert(0) += rewrites;
            }
        }
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        let mut stats = self.stats.clone();
        stats.symbols = self.symbols.len();
        stats.data_items = self.data.len();
        stats.opcodes_live = self.opcodes.len();
        stats.opcodes_allocated = self.opcodes.allocated();
        stats
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Terminals delivered by the front end.
    pub terminals: usize,

    pub symbols: usize,

    pub data_items: usize,

    /// Opcodes in the final sequence.
    pub opcodes_live: usize,

    /// Opcodes ever allocated, including replaced ones.
    pub opcodes_allocated: usize,

    pub optimizer_iterations: usize,

    /// Rewrites per optimizer pass.
    pub rewrites: std::collections::BTreeMap<&'static str, usize>,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Terminals: {}", self.terminals)?;
        writeln!(f, "  Symbols: {}", self.symbols)?;
        writeln!(f, "  Data items: {}", self.data_items)?;
        writeln!(
            f,
            "  Opcodes: {} live, {} allocated",
            self.opcodes_live, self.opcodes_allocated
        )?;

        if self.optimizer_iterations > 0 {
            writeln!(f, "  Optimizer iterations: {}", self.optimizer_iterations)?;
            let mut sorted: Vec<_> = self.rewrites.iter().collect();
            sorted.sort_by_key(|(_, count)| std::cmp::Reverse(**count));

            for (pass, count) in sorted {
                writeln!(f, "    {}: {}", pass, count)?;
            }
        }

        Ok(())
    }
}
