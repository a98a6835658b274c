// This module drives one compilation unit from source text to assembly. Building a
// program parses the source into the session's tables, reports code that directly
// follows an unconditional jump, gathers top-level code into the synthesized `main`
// definition and, when optimizing, runs the peephole optimizer to its fixed point. A
// built program can then render its intermediate listing and generate its assembly.
// Code is only generated for a unit that built without errors; the binary checks the
// result of `build` before calling `generate`.

//! One compilation unit, end to end.

use std::fmt::Write as _;
use std::io::Write;

use bumpalo::Bump;

use crate::core::diagnostics::Diagnostics;
use crate::core::error::CompileResult;
use crate::core::options::{Definitions, Options};
use crate::core::session::{CompilationSession, SessionStats};
use crate::forth;
use crate::ir::optimize::{Optimizer, ITERATIONS_LIMIT};
use crate::x86;

pub struct Program<'arena> {
    session: CompilationSession<'arena>,
    options: Options,
}

impl<'arena> Program<'arena> {
    pub fn new(arena: &'arena Bump, source_path: &str, options: Options) -> Self {
        Self {
            session: CompilationSession::new(arena, source_path),
            options,
        }
    }

    /// Parse and prepare `source` for code generation.
    ///
    /// Returns true when the unit is free of errors.
    pub fn build(&mut self, source: &str, definitions: &Definitions) -> bool {
        let accepted = forth::parse(&mut self.session, source, definitions);
        self.report_unreachable_code();
        if !accepted {
            log::debug!(
                "{}: {} errors",
                self.session.source_path(),
                self.session.diagnostics().error_count()
            );
            return false;
        }

        if !self.synthesize_main() {
            return false;
        }
        if self.options.optimize {
            self.optimize();
        }
        log::debug!("{}", self.session.stats());
        !self.session.diagnostics().has_errors()
    }

    fn report_unreachable_code(&mut self) {
        let findings = self.session.opcodes().unreachable_check();
        let diagnostics = self.session.diagnostics_mut();
        for finding in findings {
            diagnostics.line_warning(
                finding.line,
                format!("possibly unreachable code, skipped by line {}", finding.jump_line),
            );
        }
    }

    /// Wrap top-level code into `main`; false if that is impossible.
    fn synthesize_main(&mut self) -> bool {
        let opcodes = self.session.opcodes();
        if !opcodes.has_top_level_code() {
            return true;
        }
        let line = opcodes.iter().next().map_or(0, |opcode| opcode.line);
        let main = match self.session.symbols().lookup("main") {
            Some(symbol) if symbol.kind.is_definable() => symbol.id,
            _ => {
                self.session
                    .diagnostics_mut()
                    .internal_error(line, "top-level code without a 'main' word");
                return false;
            }
        };
        self.session.opcodes_mut().synthesize_main(main)
    }

    fn optimize(&mut self) {
        let (opcodes, symbols) = self.session.opcodes_and_symbols();
        let report = Optimizer::new(opcodes, symbols).run();
        log::debug!(
            "optimizer: {} rewrites in {} rounds",
            report.total_rewrites(),
            report.iterations
        );
        if report.limit_reached {
            self.session.diagnostics_mut().unit_warning(format!(
                "optimization limit reached after {ITERATIONS_LIMIT} iterations"
            ));
        }
        self.session.record_optimization(&report);
    }

    /// The intermediate listing written with `-P`.
    pub fn create_listing(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "forthc {}", env!("CARGO_PKG_VERSION"));
        out.push('\n');
        let _ = writeln!(out, "Source: {}", self.session.source_path());
        out.push_str("Flags:");
        for flag in self.options.flag_names() {
            out.push(' ');
            out.push_str(flag);
        }
        out.push_str("\n\n");

        self.session.data().create_listing(&mut out);
        self.session.symbols().create_listing(&mut out);
        self.session.opcodes().create_listing(&mut out);
        out
    }

    /// Write the unit's assembly to `out`.
    pub fn generate<W: Write>(&self, out: &mut W) -> CompileResult<()> {
        x86::generate(&self.session, &self.options, out)
    }

    pub fn session(&self) -> &CompilationSession<'arena> {
        &self.session
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.session.diagnostics()
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::diagnostics::Severity;

    fn assembly(program: &Program<'_>) -> String {
        let mut out = Vec::new();
        program.generate(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_top_level_code_becomes_main() {
        let arena = Bump::new();
        let mut program = Program::new(&arena, "t.fs", Options::default());
        assert!(program.build("1 2 +\n", &Definitions::new()));

        let asm = assembly(&program);
        assert!(asm.contains(".globl main\n"));
        assert!(asm.contains("\tcall v4__dpush\n"));
        assert!(asm.contains(".L0:\n"));
    }

    #[test]
    fn test_unreachable_code_warning() {
        let arena = Bump::new();
        let mut program = Program::new(&arena, "t.fs", Options::default());
        assert!(program.build(": f\nexit\n1 ;\n", &Definitions::new()));

        let warnings: Vec<String> = program
            .diagnostics()
            .with_severity(Severity::Warning)
            .map(|d| program.diagnostics().render(d))
            .collect();
        assert_eq!(
            warnings,
            vec!["t.fs:3: warning: possibly unreachable code, skipped by line 2"]
        );
    }

    #[test]
    fn test_errors_stop_the_build() {
        let arena = Bump::new();
        let mut program = Program::new(&arena, "t.fs", Options::default());
        assert!(!program.build(": f leave ;", &Definitions::new()));
        assert!(program.diagnostics().has_errors());
    }

    #[test]
    fn test_listing_sections() {
        let arena = Bump::new();
        let options = Options {
            optimize: true,
            ..Options::default()
        };
        let mut program = Program::new(&arena, "t.fs", options);
        assert!(program.build(": hi .\" hello\" ;\nhi\n", &Definitions::new()));

        let listing = program.create_listing();
        assert!(listing.starts_with("forthc "));
        assert!(listing.contains("Source: t.fs\nFlags: optimize\n"));
        assert!(listing.contains("Data:\n"));
        assert!(listing.contains("string[5] \"hello\""));
        assert!(listing.contains("Symbols:\n"));
        assert!(listing.contains("Intermediate code:\n"));
        assert!(listing.contains("optimizes"));
    }

    #[test]
    fn test_optimizer_statistics_recorded() {
        let arena = Bump::new();
        let options = Options {
            optimize: true,
            ..Options::default()
        };
        let mut program = Program::new(&arena, "t.fs", options);
        assert!(program.build(": square dup * ;\n5 square .\n", &Definitions::new()));

        let stats = program.stats();
        assert!(stats.optimizer_iterations >= 1);
        assert!(stats.rewrites.contains_key("inline small functions"));
        assert!(!assembly(&program).contains("call v4_square"));
    }
}
