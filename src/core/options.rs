// This module holds the settings one compiler invocation applies to every unit it
// compiles. Options carries the code generation and output flags plus the two
// mangler-only modes, and knows how to name its flags for the listing header.
// Definitions is the set of preprocessor identifiers tested by [IFDEF] and [IFUNDEF],
// compared without regard to case.

//! Compilation options and preprocessor definitions.

use std::collections::BTreeSet;
use std::fmt;

/// Flags shared by every unit of one compiler invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Emit stabs debug information.
    pub debugging: bool,
    /// Emit mcount profiling hooks.
    pub profiling: bool,
    /// Mark word definitions `.weak` instead of `.globl`.
    pub weak_symbols: bool,
    /// Generate position independent code through the GOT.
    pub position_independent: bool,
    /// Run the peephole optimizer and use shorter instruction forms.
    pub optimize: bool,
    /// Keep the intermediate listing (`<base>.p`).
    pub save_intermediate: bool,
    /// Keep the generated assembly (`<base>.s`).
    pub save_assembly: bool,
    /// Log every recognized terminal.
    pub trace_parser: bool,
    /// Print mangled forms of the arguments instead of compiling.
    pub mangle_only: bool,
    /// Print demangled forms of the arguments instead of compiling.
    pub demangle_only: bool,
}

impl Options {
    /// True when the invocation compiles files rather than projecting names.
    pub fn compiles(&self) -> bool {
        !self.mangle_only && !self.demangle_only
    }

    /// Flags as they appear in the listing header.
    pub fn flag_names(&self) -> Vec<&'static str> {
        [
            (self.debugging, "debug"),
            (self.profiling, "profile"),
            (self.weak_symbols, "weak"),
            (self.position_independent, "PIC"),
            (self.optimize, "optimize"),
            (self.save_intermediate, "intermediate"),
            (self.save_assembly, "assembly"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

/// Identifiers visible to `[IFDEF]` and `[IFUNDEF]`.
///
/// Matching is case-insensitive; names are stored folded to lower case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definitions {
    names: BTreeSet<String>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str) {
        self.names.insert(name.to_lowercase());
    }

    pub fn undefine(&mut self, name: &str) {
        self.names.remove(&name.to_lowercase());
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for Definitions {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut definitions = Definitions::new();
        for name in iter {
            definitions.define(name.as_ref());
        }
        definitions
    }
}

impl fmt::Display for Definitions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().collect();
        write!(f, "{}", names.join(" "))
    }
}
