//! Command-line interface for the Basil compiler
//!
//! ## Commands
//!
//! - `check <file.bas>` - Lex, parse, and analyze; report every diagnostic
//! - `build <file.bas>` - Check, then lower to IR and run the optimizer
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function maps errors to exit codes and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::frontend::diagnostics::FatalParseError;
use crate::version::BASIL_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    /// The compiler ran and reported errors in the source.
    pub const COMPILE_FAILURE: ExitCode = ExitCode(1);
    /// The compiler could not run: bad usage or an I/O failure.
    pub const USAGE_FAILURE: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Diagnostics are printed where they occur; these variants carry only what
/// the exit path needs. The CLI entry point prints the message and exits with
/// the matching code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source had errors; they were already printed.
    #[error("compilation failed with {errors} error(s)")]
    CompilationFailed { errors: usize },

    #[error(transparent)]
    FatalParse(#[from] FatalParseError),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Io { .. } => ExitCode::USAGE_FAILURE,
            CliError::CompilationFailed { .. } | CliError::FatalParse(_) => {
                ExitCode::COMPILE_FAILURE
            }
        }
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// The Basil language compiler
#[derive(Parser, Debug)]
#[command(name = "basil")]
#[command(version = BASIL_VERSION)]
#[command(about = "The Basil language compiler", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Raise the log level to debug
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Lex, parse, and analyze a source file
    Check {
        /// Source file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Dump the token stream
        #[arg(long)]
        tokens: bool,
        /// Dump the parsed AST
        #[arg(long)]
        ast: bool,
    },

    /// Check a source file, then lower to IR and optimize
    Build {
        /// Source file to build
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Print the optimized IR
        #[arg(long = "emit-ir")]
        emit_ir: bool,
        /// Skip the optimization pipeline
        #[arg(long = "no-opt")]
        no_opt: bool,
        /// Print the per-pass optimization table
        #[arg(long = "opt-stats")]
        opt_stats: bool,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(error) => {
            eprintln!("error: {error}");
            process::exit(error.exit_code().0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Check { file, tokens, ast } => commands::check(&file, tokens, ast),
        Command::Build {
            file,
            emit_ir,
            no_opt,
            opt_stats,
        } => commands::build(&file, emit_ir, no_opt, opt_stats),
    }
}

// ============================================================================
// Tests
// ============================================================================
