//! Parser for the Basil programming language
//!
//! Converts a token stream into an AST. The parser is a recursive descent
//! parser that collects errors instead of stopping at the first one: each
//! failed production records a [`ParseError`] and unwinds (via the [`Recover`]
//! signal) to the nearest recovery loop, which synchronizes the token cursor
//! and keeps going.
//!
//! ## Notes
//!
//! - Recovery loops exist at the top level, inside statement blocks, and
//!   inside type member lists.
//! - While the panic-mode flag is set, further errors are suppressed so one
//!   mistake does not cascade into a wall of messages. Synchronizing clears
//!   the flag.
//! - Errors carry a snapshot of the context-label stack ("in Function 'Main'")
//!   plus an optional fix suggestion.
//! - Recording beyond [`MAX_PARSE_ERRORS`] aborts the parse with
//!   [`FatalParseError::TooManyErrors`]; a file that broken is not worth
//!   walking to the end.

mod decl;
mod expr;
mod stmt;
mod types;

#[cfg(test)]
mod tests;

use std::mem;

use crate::frontend::ast::{Located, NodeId, Pos, Program};
use crate::frontend::diagnostics::{FatalParseError, ParseError, MAX_PARSE_ERRORS};
use crate::frontend::lexer::{self, Token, TokenKind};

/// Everything a parse produces: the (possibly partial) program plus every
/// error recovered from along the way.
#[derive(Debug)]
pub struct ParseOutcome {
    pub program: Program,
    pub errors: Vec<ParseError>,
}

impl ParseOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Unwind signal: an error has already been recorded, get back to the
/// nearest recovery loop.
pub(crate) struct Recover;

pub(crate) type PResult<T> = Result<T, Recover>;

/// Parse a source string into a [`ParseOutcome`].
///
/// ## Errors
///
/// Only the error-cap abort surfaces as `Err`; ordinary syntax errors are
/// collected in the returned outcome.
pub fn parse(source: &str) -> Result<ParseOutcome, FatalParseError> {
    let (tokens, lex_errors) = lexer::tokenize(source);
    Parser::new(tokens, lex_errors).parse()
}

/// Parser state.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
    /// Labels for the constructs currently being parsed, outermost first.
    context_stack: Vec<String>,
    /// Set after an error is recorded; suppresses follow-on errors until the
    /// next synchronization point.
    panic_mode: bool,
    /// Set when the error cap is hit; unwinds the whole parse.
    fatal: bool,
    /// Set while parsing the head expression of a statement, where a bare
    /// `=` means assignment rather than equality.
    suppress_eq: bool,
    next_node_id: NodeId,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, lex_errors: Vec<ParseError>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: lex_errors,
            context_stack: Vec::new(),
            panic_mode: false,
            fatal: false,
            suppress_eq: false,
            next_node_id: 0,
        }
    }

    /// Parse the entire token stream into a [`ParseOutcome`].
    pub fn parse(mut self) -> Result<ParseOutcome, FatalParseError> {
        let mut body = Vec::new();

        loop {
            self.skip_newlines();
            if self.fatal || self.is_at_end() {
                break;
            }
            match self.declaration() {
                Ok(decl) => body.push(decl),
                Err(_) => {
                    if self.fatal {
                        break;
                    }
                    self.synchronize();
                }
            }
        }

        if self.fatal {
            return Err(FatalParseError::TooManyErrors { errors: self.errors });
        }
        Ok(ParseOutcome {
            program: Program { body },
            errors: self.errors,
        })
    }

    // ========================================================================
    // Token stream helpers
    // ========================================================================

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    /// Return the current token without consuming it.
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    /// Return the token after the current one without consuming it.
    fn peek_next(&self) -> &Token {
        if self.pos + 1 < self.tokens.len() {
            &self.tokens[self.pos + 1]
        } else {
            &self.tokens[self.tokens.len() - 1]
        }
    }

    /// Advance to the next token and return the one just consumed.
    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[self.pos - 1]
    }

    /// Return `true` if the current token matches `kind`. Data-bearing
    /// variants (identifiers, literals) compare by variant only.
    fn check(&self, kind: &TokenKind) -> bool {
        mem::discriminant(&self.peek().kind) == mem::discriminant(kind)
    }

    /// If the current token matches `kind`, consume it and return `true`.
    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_newlines(&mut self) {
        while self.match_token(&TokenKind::Newline) {}
    }

    fn current_pos(&self) -> Pos {
        self.peek().pos
    }

    /// Wrap a node with its position and a parse-unique id.
    fn locate<T>(&mut self, node: T, pos: Pos) -> Located<T> {
        let id = self.next_node_id;
        self.next_node_id += 1;
        Located::new(node, pos, id)
    }

    // ========================================================================
    // Error recording and recovery
    // ========================================================================

    /// Push a context label for the duration of `f`. The label is released
    /// on every exit path, success or recovery alike.
    fn with_context<R>(&mut self, label: impl Into<String>, f: impl FnOnce(&mut Self) -> R) -> R {
        self.context_stack.push(label.into());
        let result = f(self);
        self.context_stack.pop();
        result
    }

    fn context_snapshot(&self) -> Option<String> {
        if self.context_stack.is_empty() {
            return None;
        }
        let labels: Vec<&str> = self.context_stack.iter().rev().map(String::as_str).collect();
        Some(labels.join(", in "))
    }

    /// Record an error (unless suppressed by panic mode) and return the
    /// recovery signal. Hitting the error cap flips the parse to fatal.
    fn raise(&mut self, mut error: ParseError) -> Recover {
        if self.panic_mode {
            return Recover;
        }
        self.panic_mode = true;
        if self.errors.len() >= MAX_PARSE_ERRORS {
            self.fatal = true;
            return Recover;
        }
        if let Some(context) = self.context_snapshot() {
            error = error.with_context(context);
        }
        self.errors.push(error);
        Recover
    }

    /// Record an error describing the current token.
    fn error_here(&mut self, message: impl Into<String>) -> Recover {
        let found = self.peek().describe();
        let pos = self.current_pos();
        self.raise(ParseError::new(message, found, pos))
    }

    fn expect(&mut self, kind: &TokenKind, msg: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            let mut error = ParseError::new(msg, self.peek().describe(), self.current_pos());
            if let Some(hint) = suggestion_for(kind) {
                error = error.with_suggestion(hint);
            }
            Err(self.raise(error))
        }
    }

    /// Record a missing-token error but keep parsing as if the token were
    /// present. Used where the following tokens unambiguously continue the
    /// construct, so unwinding would throw away a perfectly parsable body.
    fn expect_or_insert(&mut self, kind: &TokenKind, msg: &str) -> PResult<()> {
        if self.match_token(kind) {
            return Ok(());
        }
        let mut error = ParseError::new(msg, self.peek().describe(), self.current_pos());
        if let Some(hint) = suggestion_for(kind) {
            error = error.with_suggestion(hint);
        }
        let _ = self.raise(error);
        if self.fatal {
            return Err(Recover);
        }
        // Parsing resumes at a known-good point, so suppression ends here.
        self.panic_mode = false;
        Ok(())
    }

    /// Record an error at the current token without unwinding. For rule
    /// violations where the surrounding structure is still sound and worth
    /// keeping.
    fn note_here(&mut self, message: impl Into<String>) -> PResult<()> {
        let _ = self.error_here(message);
        if self.fatal {
            return Err(Recover);
        }
        self.panic_mode = false;
        Ok(())
    }

    fn expect_identifier(&mut self, what: &str) -> PResult<(String, Pos)> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            let pos = self.current_pos();
            self.advance();
            Ok((name, pos))
        } else {
            Err(self.error_here(format!("Expected {}", what)))
        }
    }

    /// Statements end at a newline, end of file, or a block terminator
    /// (which the enclosing construct consumes itself).
    fn expect_statement_end(&mut self) -> PResult<()> {
        if self.match_token(&TokenKind::Newline) || self.is_at_end() || self.at_block_end() {
            Ok(())
        } else {
            let err = ParseError::new(
                "Expected end of line after the statement",
                self.peek().describe(),
                self.current_pos(),
            )
            .with_suggestion("Split the extra tokens onto their own line");
            Err(self.raise(err))
        }
    }

    /// True at a token that terminates the current statement block.
    fn at_block_end(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::End
                | TokenKind::Else
                | TokenKind::ElseIf
                | TokenKind::Case
                | TokenKind::Next
                | TokenKind::Loop
                | TokenKind::Catch
                | TokenKind::Finally
        )
    }

    /// Skip tokens until a newline has been consumed or a safe-set token is
    /// next. Always consumes at least one token (except at end of file), so
    /// recovery makes progress.
    fn synchronize(&mut self) {
        self.panic_mode = false;
        if self.is_at_end() {
            return;
        }
        if self.match_token(&TokenKind::Newline) {
            return;
        }
        self.advance();
        while !self.is_at_end() {
            if self.match_token(&TokenKind::Newline) {
                return;
            }
            if self.at_safe_point() {
                return;
            }
            self.advance();
        }
    }

    /// Tokens that reliably begin or delimit a statement or declaration.
    fn at_safe_point(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::If
                | TokenKind::For
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::Try
                | TokenKind::Select
                | TokenKind::Return
                | TokenKind::Dim
                | TokenKind::End
                | TokenKind::Function
                | TokenKind::Sub
                | TokenKind::Class
                | TokenKind::Module
        )
    }

    /// Run `f` with statement-head `=` suppression lifted, restoring it
    /// afterwards. Used inside parentheses and argument lists, where `=`
    /// is always equality.
    fn grouped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = mem::replace(&mut self.suppress_eq, false);
        let result = f(self);
        self.suppress_eq = saved;
        result
    }
}

/// Canned fix suggestions for commonly forgotten tokens.
fn suggestion_for(kind: &TokenKind) -> Option<&'static str> {
    match kind {
        TokenKind::Then => Some("Add 'Then' after the condition"),
        TokenKind::RParen => Some("Add the missing ')'"),
        TokenKind::RBracket => Some("Add the missing ']'"),
        TokenKind::As => Some("Write 'As <Type>' to give this a type"),
        TokenKind::To => Some("Give the loop an upper bound with 'To'"),
        TokenKind::In => Some("Name the sequence with 'In'"),
        TokenKind::Next => Some("Close the loop with 'Next'"),
        TokenKind::Loop => Some("Close the loop with 'Loop'"),
        TokenKind::Newline => Some("Start a new line here"),
        TokenKind::Eq => Some("Use '=' here"),
        _ => None,
    }
}
