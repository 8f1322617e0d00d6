//! Diagnostics and error reporting for Basil
//!
//! Two diagnostic families flow out of the front end:
//!
//! - [`ParseError`] — recoverable syntax errors collected by the lexer and
//!   parser, carrying the offending token, the enclosing construct path, and
//!   an optional fix suggestion.
//! - [`Diagnostic`] — semantic findings with a [`Severity`]; warnings never
//!   fail analysis.
//!
//! Rendering is plain ANSI to stderr; there is no diagnostic framework in
//! between.

use std::fmt;

use thiserror::Error;

use crate::frontend::ast::Pos;

/// Hard cap on recorded parse errors. Crossing it aborts the parse with
/// [`FatalParseError::TooManyErrors`] instead of recovering forever on
/// pathological input.
pub const MAX_PARSE_ERRORS: usize = 100;

/// A recoverable syntax error.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// Description of the offending token (for example, `keyword 'End'`).
    pub found: String,
    pub pos: Pos,
    /// Innermost-first construct path, e.g. `If statement, in Function 'Main'`.
    pub context: Option<String>,
    pub suggestion: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, found: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            found: found.into(),
            pos,
            context: None,
            suggestion: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        if !context.is_empty() {
            self.context = Some(context);
        }
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)?;
        if !self.found.is_empty() {
            write!(f, ", found {}", self.found)?;
        }
        if let Some(context) = &self.context {
            write!(f, " (in {})", context)?;
        }
        Ok(())
    }
}

/// Unrecoverable parse failure. The only variant today is the error-cap abort;
/// everything recoverable stays inside [`ParseError`] accumulation.
#[derive(Debug, Error)]
pub enum FatalParseError {
    /// More than [`MAX_PARSE_ERRORS`] errors were recorded; recovery is
    /// assumed to be looping and the parse gives up. The errors collected up
    /// to that point ride along for display.
    #[error("too many syntax errors ({} recorded); parse aborted", .errors.len())]
    TooManyErrors { errors: Vec<ParseError> },
}

/// Severity of a semantic diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A semantic finding with position and severity.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub message: String,
    pub pos: Pos,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos,
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos,
            severity: Severity::Warning,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.pos, self.severity, self.message)
    }
}

// ============================================================================
// Terminal rendering
// ============================================================================

/// Print a parse error with source context.
pub fn print_parse_error(file_name: &str, source: &str, error: &ParseError) {
    let red = "\x1b[31m";
    let cyan = "\x1b[36m";
    let bold = "\x1b[1m";
    let reset = "\x1b[0m";

    if error.found.is_empty() {
        eprintln!("{bold}{red}syntax error{reset}{bold}: {}{reset}", error.message);
    } else {
        eprintln!(
            "{bold}{red}syntax error{reset}{bold}: {}, found {}{reset}",
            error.message, error.found
        );
    }
    eprintln!(
        "  {cyan}-->{reset} {file}:{pos}",
        file = file_name,
        pos = error.pos,
    );
    print_source_line(source, error.pos, red);
    if let Some(context) = &error.context {
        eprintln!("  {cyan}= in:{reset} {}", context);
    }
    if let Some(suggestion) = &error.suggestion {
        eprintln!("  {cyan}= help:{reset} {}", suggestion);
    }
    eprintln!();
}

/// Print a semantic diagnostic with source context.
pub fn print_diagnostic(file_name: &str, source: &str, diag: &Diagnostic) {
    let red = "\x1b[31m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let bold = "\x1b[1m";
    let reset = "\x1b[0m";

    let color = match diag.severity {
        Severity::Error => red,
        Severity::Warning => yellow,
    };

    eprintln!(
        "{bold}{color}{severity}{reset}{bold}: {message}{reset}",
        severity = diag.severity,
        message = diag.message,
    );
    eprintln!(
        "  {cyan}-->{reset} {file}:{pos}",
        file = file_name,
        pos = diag.pos,
    );
    print_source_line(source, diag.pos, color);
    eprintln!();
}

/// Print the offending source line with a caret under the column.
fn print_source_line(source: &str, pos: Pos, color: &str) {
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    let Some(line_text) = line_at(source, pos.line) else {
        return;
    };
    let line_num_width = pos.line.to_string().len();

    eprintln!("  {cyan}{:>width$} |{reset}", "", width = line_num_width);
    eprintln!(
        "  {cyan}{:>width$} |{reset} {}",
        pos.line,
        line_text,
        width = line_num_width
    );
    let pad = (pos.column.max(1) as usize).saturating_sub(1);
    eprintln!(
        "  {cyan}{:>width$} |{reset} {}{color}^{reset}",
        "",
        " ".repeat(pad),
        width = line_num_width
    );
}

/// Fetch the text of a 1-based source line, if it exists.
fn line_at(source: &str, line: u32) -> Option<&str> {
    if line == 0 {
        return None;
    }
    source.lines().nth(line as usize - 1)
}

// ============================================================================
// Diagnostic catalog: semantic errors the analyzer reports
// ============================================================================

/// Factory functions for the analyzer's common diagnostics, so message
/// wording stays consistent across call sites.
pub mod semantic {
    use super::*;

    pub fn unknown_type(name: &str, pos: Pos) -> Diagnostic {
        Diagnostic::error(format!("Unknown type '{}'", name), pos)
    }

    pub fn undefined_symbol(name: &str, pos: Pos) -> Diagnostic {
        Diagnostic::error(format!("'{}' is not defined", name), pos)
    }

    pub fn already_defined(name: &str, pos: Pos) -> Diagnostic {
        Diagnostic::error(format!("'{}' is already defined in this scope", name), pos)
    }

    pub fn type_mismatch(expected: &str, found: &str, pos: Pos) -> Diagnostic {
        Diagnostic::error(
            format!("Type mismatch: expected '{}', found '{}'", expected, found),
            pos,
        )
    }

    pub fn not_callable(name: &str, pos: Pos) -> Diagnostic {
        Diagnostic::error(format!("'{}' is not a function or subroutine", name), pos)
    }

    pub fn wrong_arg_count(
        name: &str,
        min: usize,
        max: Option<usize>,
        found: usize,
        pos: Pos,
    ) -> Diagnostic {
        let expected = match max {
            Some(max) if max == min => format!("{}", min),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        Diagnostic::error(
            format!("'{}' expects {} argument(s), found {}", name, expected, found),
            pos,
        )
    }

    pub fn assign_to_constant(name: &str, pos: Pos) -> Diagnostic {
        Diagnostic::error(format!("Cannot assign to '{}' - it is a constant", name), pos)
    }

    pub fn me_outside_instance(pos: Pos) -> Diagnostic {
        Diagnostic::error("'Me' is only valid inside an instance method", pos)
    }

    pub fn equality_mismatch(left: &str, right: &str, pos: Pos) -> Diagnostic {
        Diagnostic::warning(
            format!("Comparing values of unrelated types '{}' and '{}'", left, right),
            pos,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_at() {
        let source = "line 1\nline 2\nline 3";
        assert_eq!(line_at(source, 1), Some("line 1"));
        assert_eq!(line_at(source, 3), Some("line 3"));
        assert_eq!(line_at(source, 4), None);
        assert_eq!(line_at(source, 0), None);
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Expected 'Then'", "end of line", Pos::new(2, 9))
            .with_context("Function 'Main'")
            .with_suggestion("Add 'Then' after the If condition");
        assert_eq!(
            err.to_string(),
            "2:9: Expected 'Then', found end of line (in Function 'Main')"
        );
        assert_eq!(err.suggestion.as_deref(), Some("Add 'Then' after the If condition"));
    }

    #[test]
    fn test_fatal_display_counts_errors() {
        let errors = vec![
            ParseError::new("Expected 'Then'", "newline", Pos::new(1, 1)),
            ParseError::new("Expected ')'", "newline", Pos::new(2, 1)),
        ];
        let fatal = FatalParseError::TooManyErrors { errors };
        assert!(fatal.to_string().contains("2 recorded"));
    }
}
