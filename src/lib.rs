#![forbid(unsafe_code)]
//! Basil Language Compiler
//!
//! Basil is a BASIC-family language with classes, generics, and query
//! expressions. This crate provides the compiler front end (lexer, parser
//! with error recovery, semantic analyzer) and middle end (CFG-based IR,
//! lowering, optimization pipeline), plus the `basil` CLI driving them.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli`
//!   module enforces `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Analyzer internals**: A panic inside semantic analysis is a compiler bug; `analyze`
//!   catches it once at its boundary and reports it as a single diagnostic rather than
//!   crashing the caller.

pub mod cli;
pub mod frontend;
pub mod ir;
pub mod version;

pub use frontend::analyzer;
pub use frontend::ast;
pub use frontend::diagnostics;
pub use frontend::lexer;
pub use frontend::parser;
pub use frontend::symbols;
pub use frontend::types;

pub use ir::build;
pub use ir::optimize::OptimizationPipeline;
