//! Basil compiler frontend
//!
//! Everything between source text and the IR builder:
//! - `lexer`: tokenization of source code
//! - `parser`: recursive descent with error recovery
//! - `ast`: abstract syntax tree definitions
//! - `symbols`: symbol table and scope management
//! - `types`: type representation and the type registry
//! - `analyzer`: semantic analysis of a parsed program
//! - `diagnostics`: errors and warnings for all of the above

pub mod analyzer;
pub mod ast;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod symbols;
pub mod types;
