// This module collects the messages a compilation unit produces about its source: lexical
// and syntax errors from the front end, semantic errors from the driver, internal invariant
// reports, warnings (unreachable code, optimizer cap, unterminated conditionals) and notes
// printed by `.(`. Each diagnostic carries the source line, the token text it was raised
// near, and the message. The collector counts errors so the front end can stop at the
// error cap, and renders each entry in the traditional `path:line: error: ...` layout
// expected by editors.

//! Per-unit diagnostics.

use std::fmt;

/// Parsing stops once this many errors have been reported.
pub const MAX_ALLOWED_ERRORS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        })
    }
}

/// One message about the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub line: Option<u32>,
    pub near: Option<String>,
    pub message: String,
}

/// Diagnostics collected for one source file.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    source_path: String,
    entries: Vec<Diagnostic>,
    error_count: usize,
}

impl Diagnostics {
    pub fn new(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            entries: Vec::new(),
            error_count: 0,
        }
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    fn report(&mut self, severity: Severity, line: Option<u32>, near: Option<&str>, message: String) {
        let diagnostic = Diagnostic {
            severity,
            line,
            near: near.map(str::to_string),
            message,
        };
        log::debug!("{}", self.render(&diagnostic));
        if severity == Severity::Error {
            self.error_count += 1;
        }
        self.entries.push(diagnostic);
    }

    /// Report an error raised near `near` on `line`.
    pub fn error(&mut self, line: u32, near: &str, message: impl Into<String>) {
        self.report(Severity::Error, Some(line), Some(near), message.into());
    }

    /// Report an internal invariant violation at end of parse.
    pub fn internal_error(&mut self, line: u32, message: impl Into<String>) {
        let message = format!("internal error, {}", message.into());
        self.report(Severity::Error, Some(line), None, message);
    }

    pub fn warning(&mut self, line: u32, near: &str, message: impl Into<String>) {
        self.report(Severity::Warning, Some(line), Some(near), message.into());
    }

    /// Warning tied to a line but not to any token.
    pub fn line_warning(&mut self, line: u32, message: impl Into<String>) {
        self.report(Severity::Warning, Some(line), None, message.into());
    }

    /// Warning about the unit as a whole.
    pub fn unit_warning(&mut self, message: impl Into<String>) {
        self.report(Severity::Warning, None, None, message.into());
    }

    pub fn note(&mut self, line: u32, message: impl Into<String>) {
        self.report(Severity::Note, Some(line), None, message.into());
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn excessive_errors(&self) -> bool {
        self.error_count >= MAX_ALLOWED_ERRORS
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.severity == severity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Format a diagnostic the way editors expect compiler messages.
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        let location = match diagnostic.line {
            Some(line) => format!("{}:{}", self.source_path, line),
            None => self.source_path.clone(),
        };
        match &diagnostic.near {
            Some(near) => format!(
                "{}: {}: near '{}', {}",
                location, diagnostic.severity, near, diagnostic.message
            ),
            None => format!("{}: {}: {}", location, diagnostic.severity, diagnostic.message),
        }
    }

    /// All diagnostics rendered, one per line.
    pub fn rendered(&self) -> Vec<String> {
        self.entries.iter().map(|d| self.render(d)).collect()
    }
}
