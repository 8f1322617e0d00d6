//! Lexer for the Basil programming language
//!
//! Handles tokenization including:
//! - Case-insensitive keywords (`Dim`, `dim`, and `DIM` are the same token)
//! - Identifiers and literals (integer, `&H` hex, float, string with `""` escape)
//! - Comments (`'` and leading `Rem`), stripped before the parser sees them
//! - Line continuations (`_` at end of line, which swallows the newline)
//! - Significant newlines (statement terminators)
//!
//! ## Notes
//!
//! - Positions are 1-based line/column, attached to every token.
//! - Errors accumulate; scanning continues so one run reports every lexical
//!   problem in the file.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::frontend::ast::Pos;
use crate::frontend::diagnostics::ParseError;

/// Token types for Basil
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // ========== Declaration keywords ==========
    Namespace,
    Module,
    Class,
    Interface,
    Structure,
    Enum,
    Function,
    Sub,
    Dim,
    Const,

    // ========== Modifier keywords ==========
    Public,
    Private,
    Protected,
    Friend,
    Shared,
    MustInherit,
    MustOverride,
    Overrides,
    Inherits,
    Implements,
    Optional,
    ParamArray,
    ByVal,
    ByRef,

    // ========== Statement keywords ==========
    If,
    Then,
    ElseIf,
    Else,
    End,
    Select,
    Case,
    For,
    Each,
    To,
    Step,
    Next,
    While,
    Do,
    Loop,
    Until,
    Try,
    Catch,
    Finally,
    With,
    Return,
    Exit,
    Throw,
    New,
    As,
    In,
    Of,
    CType,

    // ========== Operator keywords ==========
    Mod,
    And,
    Or,
    AndAlso,
    OrElse,
    Not,

    // ========== Literal keywords ==========
    True,
    False,
    Nothing,
    Me,
    MyBase,

    // ========== Query keywords ==========
    From,
    Where,
    Order,
    By,
    Group,
    Into,
    Join,
    On,
    Equals,
    Aggregate,
    Let,
    Take,
    Skip,
    Distinct,
    Ascending,
    Descending,
    Ptr,

    // ========== Identifiers and literals ==========
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    // ========== Operators ==========
    Plus,      // +
    Minus,     // -
    Star,      // *
    Slash,     // /
    Backslash, // \  (integer division)
    Amp,       // &  (concatenation)
    Eq,        // =
    NotEq,     // <>
    Lt,        // <
    LtEq,      // <=
    Gt,        // >
    GtEq,      // >=
    PlusEq,    // +=
    MinusEq,   // -=
    StarEq,    // *=
    SlashEq,   // /=
    AmpEq,     // &=

    // ========== Punctuation ==========
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Dot,      // .
    Question, // ?

    // ========== Special ==========
    Newline,
    Eof,
}

impl TokenKind {
    /// Canonical display name, used in "Expected X" messages.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Namespace => "'Namespace'",
            TokenKind::Module => "'Module'",
            TokenKind::Class => "'Class'",
            TokenKind::Interface => "'Interface'",
            TokenKind::Structure => "'Structure'",
            TokenKind::Enum => "'Enum'",
            TokenKind::Function => "'Function'",
            TokenKind::Sub => "'Sub'",
            TokenKind::Dim => "'Dim'",
            TokenKind::Const => "'Const'",
            TokenKind::Public => "'Public'",
            TokenKind::Private => "'Private'",
            TokenKind::Protected => "'Protected'",
            TokenKind::Friend => "'Friend'",
            TokenKind::Shared => "'Shared'",
            TokenKind::MustInherit => "'MustInherit'",
            TokenKind::MustOverride => "'MustOverride'",
            TokenKind::Overrides => "'Overrides'",
            TokenKind::Inherits => "'Inherits'",
            TokenKind::Implements => "'Implements'",
            TokenKind::Optional => "'Optional'",
            TokenKind::ParamArray => "'ParamArray'",
            TokenKind::ByVal => "'ByVal'",
            TokenKind::ByRef => "'ByRef'",
            TokenKind::If => "'If'",
            TokenKind::Then => "'Then'",
            TokenKind::ElseIf => "'ElseIf'",
            TokenKind::Else => "'Else'",
            TokenKind::End => "'End'",
            TokenKind::Select => "'Select'",
            TokenKind::Case => "'Case'",
            TokenKind::For => "'For'",
            TokenKind::Each => "'Each'",
            TokenKind::To => "'To'",
            TokenKind::Step => "'Step'",
            TokenKind::Next => "'Next'",
            TokenKind::While => "'While'",
            TokenKind::Do => "'Do'",
            TokenKind::Loop => "'Loop'",
            TokenKind::Until => "'Until'",
            TokenKind::Try => "'Try'",
            TokenKind::Catch => "'Catch'",
            TokenKind::Finally => "'Finally'",
            TokenKind::With => "'With'",
            TokenKind::Return => "'Return'",
            TokenKind::Exit => "'Exit'",
            TokenKind::Throw => "'Throw'",
            TokenKind::New => "'New'",
            TokenKind::As => "'As'",
            TokenKind::In => "'In'",
            TokenKind::Of => "'Of'",
            TokenKind::CType => "'CType'",
            TokenKind::Mod => "'Mod'",
            TokenKind::And => "'And'",
            TokenKind::Or => "'Or'",
            TokenKind::AndAlso => "'AndAlso'",
            TokenKind::OrElse => "'OrElse'",
            TokenKind::Not => "'Not'",
            TokenKind::True => "'True'",
            TokenKind::False => "'False'",
            TokenKind::Nothing => "'Nothing'",
            TokenKind::Me => "'Me'",
            TokenKind::MyBase => "'MyBase'",
            TokenKind::From => "'From'",
            TokenKind::Where => "'Where'",
            TokenKind::Order => "'Order'",
            TokenKind::By => "'By'",
            TokenKind::Group => "'Group'",
            TokenKind::Into => "'Into'",
            TokenKind::Join => "'Join'",
            TokenKind::On => "'On'",
            TokenKind::Equals => "'Equals'",
            TokenKind::Aggregate => "'Aggregate'",
            TokenKind::Let => "'Let'",
            TokenKind::Take => "'Take'",
            TokenKind::Skip => "'Skip'",
            TokenKind::Distinct => "'Distinct'",
            TokenKind::Ascending => "'Ascending'",
            TokenKind::Descending => "'Descending'",
            TokenKind::Ptr => "'Ptr'",
            TokenKind::Ident(_) => "identifier",
            TokenKind::Int(_) => "integer literal",
            TokenKind::Float(_) => "number literal",
            TokenKind::Str(_) => "string literal",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Backslash => "'\\'",
            TokenKind::Amp => "'&'",
            TokenKind::Eq => "'='",
            TokenKind::NotEq => "'<>'",
            TokenKind::Lt => "'<'",
            TokenKind::LtEq => "'<='",
            TokenKind::Gt => "'>'",
            TokenKind::GtEq => "'>='",
            TokenKind::PlusEq => "'+='",
            TokenKind::MinusEq => "'-='",
            TokenKind::StarEq => "'*='",
            TokenKind::SlashEq => "'/='",
            TokenKind::AmpEq => "'&='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBracket => "'['",
            TokenKind::RBracket => "']'",
            TokenKind::Comma => "','",
            TokenKind::Dot => "'.'",
            TokenKind::Question => "'?'",
            TokenKind::Newline => "end of line",
            TokenKind::Eof => "end of file",
        }
    }
}

/// A token with its kind, source spelling, and position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, pos: Pos) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            pos,
        }
    }

    /// Describe this token for an error message, e.g. `keyword 'End'`.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Int(_) | TokenKind::Float(_) => format!("number '{}'", self.lexeme),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            kind if is_keyword(kind) => format!("keyword '{}'", self.lexeme),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

/// True for the keyword token kinds (used only for error descriptions).
/// Keywords are exactly the kinds `keyword_kind` can produce.
fn is_keyword(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Namespace
            | TokenKind::Module
            | TokenKind::Class
            | TokenKind::Interface
            | TokenKind::Structure
            | TokenKind::Enum
            | TokenKind::Function
            | TokenKind::Sub
            | TokenKind::Dim
            | TokenKind::Const
            | TokenKind::Public
            | TokenKind::Private
            | TokenKind::Protected
            | TokenKind::Friend
            | TokenKind::Shared
            | TokenKind::MustInherit
            | TokenKind::MustOverride
            | TokenKind::Overrides
            | TokenKind::Inherits
            | TokenKind::Implements
            | TokenKind::Optional
            | TokenKind::ParamArray
            | TokenKind::ByVal
            | TokenKind::ByRef
            | TokenKind::If
            | TokenKind::Then
            | TokenKind::ElseIf
            | TokenKind::Else
            | TokenKind::End
            | TokenKind::Select
            | TokenKind::Case
            | TokenKind::For
            | TokenKind::Each
            | TokenKind::To
            | TokenKind::Step
            | TokenKind::Next
            | TokenKind::While
            | TokenKind::Do
            | TokenKind::Loop
            | TokenKind::Until
            | TokenKind::Try
            | TokenKind::Catch
            | TokenKind::Finally
            | TokenKind::With
            | TokenKind::Return
            | TokenKind::Exit
            | TokenKind::Throw
            | TokenKind::New
            | TokenKind::As
            | TokenKind::In
            | TokenKind::Of
            | TokenKind::CType
            | TokenKind::Mod
            | TokenKind::And
            | TokenKind::Or
            | TokenKind::AndAlso
            | TokenKind::OrElse
            | TokenKind::Not
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Nothing
            | TokenKind::Me
            | TokenKind::MyBase
            | TokenKind::From
            | TokenKind::Where
            | TokenKind::Order
            | TokenKind::By
            | TokenKind::Group
            | TokenKind::Into
            | TokenKind::Join
            | TokenKind::On
            | TokenKind::Equals
            | TokenKind::Aggregate
            | TokenKind::Let
            | TokenKind::Take
            | TokenKind::Skip
            | TokenKind::Distinct
            | TokenKind::Ascending
            | TokenKind::Descending
            | TokenKind::Ptr
    )
}

/// Map a lowercased identifier to its keyword kind, if it is one.
fn keyword_kind(lower: &str) -> Option<TokenKind> {
    let kind = match lower {
        "namespace" => TokenKind::Namespace,
        "module" => TokenKind::Module,
        "class" => TokenKind::Class,
        "interface" => TokenKind::Interface,
        "structure" => TokenKind::Structure,
        "enum" => TokenKind::Enum,
        "function" => TokenKind::Function,
        "sub" => TokenKind::Sub,
        "dim" => TokenKind::Dim,
        "const" => TokenKind::Const,
        "public" => TokenKind::Public,
        "private" => TokenKind::Private,
        "protected" => TokenKind::Protected,
        "friend" => TokenKind::Friend,
        "shared" => TokenKind::Shared,
        "mustinherit" => TokenKind::MustInherit,
        "mustoverride" => TokenKind::MustOverride,
        "overrides" => TokenKind::Overrides,
        "inherits" => TokenKind::Inherits,
        "implements" => TokenKind::Implements,
        "optional" => TokenKind::Optional,
        "paramarray" => TokenKind::ParamArray,
        "byval" => TokenKind::ByVal,
        "byref" => TokenKind::ByRef,
        "if" => TokenKind::If,
        "then" => TokenKind::Then,
        "elseif" => TokenKind::ElseIf,
        "else" => TokenKind::Else,
        "end" => TokenKind::End,
        "select" => TokenKind::Select,
        "case" => TokenKind::Case,
        "for" => TokenKind::For,
        "each" => TokenKind::Each,
        "to" => TokenKind::To,
        "step" => TokenKind::Step,
        "next" => TokenKind::Next,
        "while" => TokenKind::While,
        "do" => TokenKind::Do,
        "loop" => TokenKind::Loop,
        "until" => TokenKind::Until,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "finally" => TokenKind::Finally,
        "with" => TokenKind::With,
        "return" => TokenKind::Return,
        "exit" => TokenKind::Exit,
        "throw" => TokenKind::Throw,
        "new" => TokenKind::New,
        "as" => TokenKind::As,
        "in" => TokenKind::In,
        "of" => TokenKind::Of,
        "ctype" => TokenKind::CType,
        "mod" => TokenKind::Mod,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "andalso" => TokenKind::AndAlso,
        "orelse" => TokenKind::OrElse,
        "not" => TokenKind::Not,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "nothing" => TokenKind::Nothing,
        "me" => TokenKind::Me,
        "mybase" => TokenKind::MyBase,
        "from" => TokenKind::From,
        "where" => TokenKind::Where,
        "order" => TokenKind::Order,
        "by" => TokenKind::By,
        "group" => TokenKind::Group,
        "into" => TokenKind::Into,
        "join" => TokenKind::Join,
        "on" => TokenKind::On,
        "equals" => TokenKind::Equals,
        "aggregate" => TokenKind::Aggregate,
        "let" => TokenKind::Let,
        "take" => TokenKind::Take,
        "skip" => TokenKind::Skip,
        "distinct" => TokenKind::Distinct,
        "ascending" => TokenKind::Ascending,
        "descending" => TokenKind::Descending,
        "ptr" => TokenKind::Ptr,
        _ => return None,
    };
    Some(kind)
}

/// Lexer state
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// Byte index just past the last consumed char.
    current_idx: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    errors: Vec<ParseError>,
}

/// Tokenize a source string.
///
/// Always yields a usable token stream; scanning continues past lexical
/// errors so the parser can still recover and report later problems.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<ParseError>) {
    Lexer::new(source).tokenize()
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_idx: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Tokenize the entire source
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<ParseError>) {
        while self.peek().is_some() {
            self.scan_token();
        }
        self.tokens.push(Token::new(TokenKind::Eof, "", self.pos()));
        (self.tokens, self.errors)
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.source[self.current_idx..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        let (idx, c) = self.chars.next()?;
        self.current_idx = idx + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&mut self, message: impl Into<String>, found: impl Into<String>, pos: Pos) {
        self.errors.push(ParseError::new(message, found, pos));
    }

    fn scan_token(&mut self) {
        let start_pos = self.pos();
        let start_idx = self.current_idx;

        let Some(c) = self.advance() else {
            return;
        };

        match c {
            ' ' | '\t' | '\r' => {}

            // Comment to end of line; the newline itself is scanned next.
            '\'' => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            }

            '\n' => {
                self.tokens.push(Token::new(TokenKind::Newline, "\\n", start_pos));
            }

            '"' => self.scan_string(start_pos),

            '0'..='9' => self.scan_number(start_idx, start_pos),

            c if c.is_ascii_alphabetic() || c == '_' => {
                // `_` alone at end of line is a continuation, not an identifier.
                if c == '_' && !self.peek().is_some_and(|n| n.is_ascii_alphanumeric() || n == '_') {
                    self.scan_continuation(start_pos);
                } else {
                    self.scan_word(start_idx, start_pos);
                }
            }

            '+' => self.op_or_compound(TokenKind::Plus, TokenKind::PlusEq, start_idx, start_pos),
            '-' => self.op_or_compound(TokenKind::Minus, TokenKind::MinusEq, start_idx, start_pos),
            '*' => self.op_or_compound(TokenKind::Star, TokenKind::StarEq, start_idx, start_pos),
            '/' => self.op_or_compound(TokenKind::Slash, TokenKind::SlashEq, start_idx, start_pos),
            '\\' => self.push(TokenKind::Backslash, start_idx, start_pos),
            '=' => self.push(TokenKind::Eq, start_idx, start_pos),

            '&' => {
                // `&H` starts a hex literal when a hex digit follows.
                if matches!(self.peek(), Some('h') | Some('H'))
                    && self.peek_next().is_some_and(|c| c.is_ascii_hexdigit())
                {
                    self.advance();
                    self.scan_hex(start_idx, start_pos);
                } else if self.peek() == Some('=') {
                    self.advance();
                    self.push(TokenKind::AmpEq, start_idx, start_pos);
                } else {
                    self.push(TokenKind::Amp, start_idx, start_pos);
                }
            }

            '<' => match self.peek() {
                Some('>') => {
                    self.advance();
                    self.push(TokenKind::NotEq, start_idx, start_pos);
                }
                Some('=') => {
                    self.advance();
                    self.push(TokenKind::LtEq, start_idx, start_pos);
                }
                _ => self.push(TokenKind::Lt, start_idx, start_pos),
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.push(TokenKind::GtEq, start_idx, start_pos);
                } else {
                    self.push(TokenKind::Gt, start_idx, start_pos);
                }
            }

            '(' => self.push(TokenKind::LParen, start_idx, start_pos),
            ')' => self.push(TokenKind::RParen, start_idx, start_pos),
            '[' => self.push(TokenKind::LBracket, start_idx, start_pos),
            ']' => self.push(TokenKind::RBracket, start_idx, start_pos),
            ',' => self.push(TokenKind::Comma, start_idx, start_pos),
            '.' => self.push(TokenKind::Dot, start_idx, start_pos),
            '?' => self.push(TokenKind::Question, start_idx, start_pos),

            other => {
                self.error(
                    format!("Unexpected character '{}'", other),
                    format!("'{}'", other),
                    start_pos,
                );
            }
        }
    }

    fn push(&mut self, kind: TokenKind, start_idx: usize, pos: Pos) {
        let lexeme = &self.source[start_idx..self.current_idx];
        self.tokens.push(Token::new(kind, lexeme, pos));
    }

    /// One-char operator, or its `X=` compound form.
    fn op_or_compound(
        &mut self,
        plain: TokenKind,
        compound: TokenKind,
        start_idx: usize,
        pos: Pos,
    ) {
        if self.peek() == Some('=') {
            self.advance();
            self.push(compound, start_idx, pos);
        } else {
            self.push(plain, start_idx, pos);
        }
    }

    /// Line continuation: `_` followed by only whitespace up to the newline.
    /// The newline is consumed, so no `Newline` token separates the halves.
    fn scan_continuation(&mut self, start_pos: Pos) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    return;
                }
                other => {
                    self.error(
                        format!("Unexpected '{}' after line continuation '_'", other),
                        format!("'{}'", other),
                        start_pos,
                    );
                    return;
                }
            }
        }
        // Continuation at end of input: nothing left to join, which is fine.
    }

    fn scan_string(&mut self, start_pos: Pos) {
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    // `""` is an escaped quote inside the literal.
                    if self.peek() == Some('"') {
                        self.advance();
                        value.push('"');
                    } else {
                        break;
                    }
                }
                Some('\n') | None => {
                    self.error("Unterminated string literal", "end of line", start_pos);
                    break;
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
        let lexeme = format!("\"{}\"", value.replace('"', "\"\""));
        self.tokens.push(Token::new(TokenKind::Str(value), lexeme, start_pos));
    }

    fn scan_number(&mut self, start_idx: usize, start_pos: Pos) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E'))
            && matches!(self.peek_next(), Some(c) if c.is_ascii_digit() || c == '+' || c == '-')
        {
            is_float = true;
            self.advance();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let lexeme = &self.source[start_idx..self.current_idx];
        if is_float {
            match lexeme.parse::<f64>() {
                Ok(value) => {
                    self.tokens.push(Token::new(TokenKind::Float(value), lexeme, start_pos));
                }
                Err(_) => {
                    self.error(
                        format!("Invalid number literal '{}'", lexeme),
                        format!("'{}'", lexeme),
                        start_pos,
                    );
                    self.tokens.push(Token::new(TokenKind::Float(0.0), lexeme, start_pos));
                }
            }
        } else {
            match lexeme.parse::<i64>() {
                Ok(value) => self.tokens.push(Token::new(TokenKind::Int(value), lexeme, start_pos)),
                Err(_) => {
                    self.error(
                        format!("Integer literal '{}' is too large", lexeme),
                        format!("'{}'", lexeme),
                        start_pos,
                    );
                    self.tokens.push(Token::new(TokenKind::Int(0), lexeme, start_pos));
                }
            }
        }
    }

    /// `&H` hex literal; the `&H` prefix is already consumed.
    fn scan_hex(&mut self, start_idx: usize, start_pos: Pos) {
        while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.advance();
        }
        let lexeme = &self.source[start_idx..self.current_idx];
        let digits = &lexeme[2..];
        match i64::from_str_radix(digits, 16) {
            Ok(value) => self.tokens.push(Token::new(TokenKind::Int(value), lexeme, start_pos)),
            Err(_) => {
                self.error(
                    format!("Hex literal '{}' is too large", lexeme),
                    format!("'{}'", lexeme),
                    start_pos,
                );
                self.tokens.push(Token::new(TokenKind::Int(0), lexeme, start_pos));
            }
        }
    }

    /// Identifier, keyword, or `Rem` comment.
    fn scan_word(&mut self, start_idx: usize, start_pos: Pos) {
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let lexeme = &self.source[start_idx..self.current_idx];
        let lower = lexeme.to_ascii_lowercase();

        // `Rem` comments out the rest of the line.
        if lower == "rem" {
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                self.advance();
            }
            return;
        }

        match keyword_kind(&lower) {
            Some(kind) => self.tokens.push(Token::new(kind, lexeme, start_pos)),
            None => self
                .tokens
                .push(Token::new(TokenKind::Ident(lexeme.to_string()), lexeme, start_pos)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens_of(source: &str) -> Vec<Token> {
        let (toks, errs) = tokenize(source);
        assert!(errs.is_empty(), "unexpected lex errors: {errs:?}");
        toks
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokens_of(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_dim() {
        let toks = tokens_of("Dim x As Integer = 5");
        assert_eq!(toks[0].kind, TokenKind::Dim);
        assert_eq!(toks[1].kind, TokenKind::Ident("x".to_string()));
        assert_eq!(toks[2].kind, TokenKind::As);
        assert_eq!(toks[3].kind, TokenKind::Ident("Integer".to_string()));
        assert_eq!(toks[4].kind, TokenKind::Eq);
        assert_eq!(toks[5].kind, TokenKind::Int(5));
        assert_eq!(toks[6].kind, TokenKind::Eof);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(kinds("DIM dim DiM")[..3], [TokenKind::Dim, TokenKind::Dim, TokenKind::Dim]);
        assert_eq!(kinds("end END End")[..3], [TokenKind::End, TokenKind::End, TokenKind::End]);
    }

    #[test]
    fn test_positions_are_one_based() {
        let toks = tokens_of("If x Then\n  y = 1\n");
        assert_eq!(toks[0].pos, Pos::new(1, 1));
        assert_eq!(toks[1].pos, Pos::new(1, 4));
        assert_eq!(toks[2].pos, Pos::new(1, 6));
        // Newline token at end of line 1
        assert_eq!(toks[3].kind, TokenKind::Newline);
        // `y` on line 2, column 3
        assert_eq!(toks[4].pos, Pos::new(2, 3));
    }

    #[test]
    fn test_comments_are_stripped() {
        let toks = kinds("x = 1 ' this is ignored\ny = 2");
        assert!(!toks.iter().any(|k| matches!(k, TokenKind::Ident(n) if n == "this")));
        // Newline after the comment is still significant
        assert!(toks.contains(&TokenKind::Newline));

        let toks = kinds("Rem whole line comment\nx = 1");
        assert_eq!(toks[0], TokenKind::Newline);
    }

    #[test]
    fn test_line_continuation_joins_lines() {
        let toks = kinds("x = 1 + _\n    2\n");
        let newlines = toks.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
        assert!(toks.contains(&TokenKind::Int(2)));
    }

    #[test]
    fn test_string_escape() {
        let toks = tokens_of(r#"s = "say ""hi"" now""#);
        assert_eq!(toks[2].kind, TokenKind::Str("say \"hi\" now".to_string()));
    }

    #[test]
    fn test_unterminated_string_is_an_error() {
        let (toks, errs) = tokenize("s = \"oops\nx = 1");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("Unterminated"));
        assert_eq!(errs[0].pos, Pos::new(1, 5));
        // Scanning continued on the next line.
        assert!(toks.iter().any(|t| t.kind == TokenKind::Ident("x".to_string())));
    }

    #[test]
    fn test_hex_literal() {
        let toks = tokens_of("flags = &H1F");
        assert_eq!(toks[2].kind, TokenKind::Int(0x1F));
        // `&` not followed by hex digits is still concatenation
        let toks = tokens_of("a & Hello");
        assert_eq!(toks[1].kind, TokenKind::Amp);
        assert_eq!(toks[2].kind, TokenKind::Ident("Hello".to_string()));
    }

    #[test]
    fn test_operators() {
        assert_eq!(kinds("a <> b <= c >= d += 1 &= s")[1], TokenKind::NotEq);
        let toks = kinds("x \\ y Mod z");
        assert_eq!(toks[1], TokenKind::Backslash);
        assert_eq!(toks[3], TokenKind::Mod);
    }

    #[test]
    fn test_float_and_exponent() {
        let toks = tokens_of("pi = 3.14\nbig = 1e6");
        assert_eq!(toks[2].kind, TokenKind::Float(3.14));
        assert!(matches!(toks[6].kind, TokenKind::Float(v) if v == 1e6));
    }

    #[test]
    fn test_stray_character_reports_and_continues() {
        let (toks, errs) = tokenize("x = 1 ; y = 2");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("Unexpected character"));
        assert!(toks.iter().any(|t| t.kind == TokenKind::Ident("y".to_string())));
    }
}
