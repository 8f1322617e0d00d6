//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::fs;
use std::path::Path;

use crate::frontend::analyzer::{self, SemanticAnalyzer};
use crate::frontend::diagnostics::{self, FatalParseError, Severity};
use crate::frontend::lexer;
use crate::frontend::parser::{self, ParseOutcome};
use crate::ir::build;
use crate::ir::optimize::{OptimizationPipeline, OptimizationResult};

use super::{CliError, CliResult, ExitCode};

/// Maximum source file size (16 MB)
///
/// Files larger than this are rejected to prevent out-of-memory conditions
/// during compilation.
const MAX_SOURCE_SIZE: u64 = 16 * 1024 * 1024;

// ============================================================================
// Front end driver (shared between check and build)
// ============================================================================

/// Everything the front end produces for one source file.
struct CheckedSource {
    outcome: ParseOutcome,
    analysis: SemanticAnalyzer,
}

/// Parse and analyze one source file, printing every diagnostic as it is
/// found. Returns the front-end output together with the error count; the
/// caller decides whether that count allows lowering.
///
/// Only the parse error cap aborts early. Everything else collects and
/// continues, so one run reports as much as it can.
fn check_source(file_name: &str, source: &str) -> CliResult<(CheckedSource, usize)> {
    let outcome = match parser::parse(source) {
        Ok(outcome) => outcome,
        Err(fatal) => {
            let FatalParseError::TooManyErrors { errors } = &fatal;
            for error in errors {
                diagnostics::print_parse_error(file_name, source, error);
            }
            return Err(CliError::FatalParse(fatal));
        }
    };

    for error in &outcome.errors {
        diagnostics::print_parse_error(file_name, source, error);
    }

    let analysis = analyzer::analyze(&outcome.program);
    for diagnostic in analysis.diagnostics() {
        diagnostics::print_diagnostic(file_name, source, diagnostic);
    }

    let errors = outcome.errors.len()
        + analysis
            .diagnostics()
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();

    Ok((CheckedSource { outcome, analysis }, errors))
}

/// Read a source file, bounded by `MAX_SOURCE_SIZE`.
pub fn read_source(path: &Path) -> CliResult<String> {
    let metadata = fs::metadata(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if metadata.len() > MAX_SOURCE_SIZE {
        return Err(CliError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(format!(
                "file is too large ({} bytes, max {MAX_SOURCE_SIZE})",
                metadata.len()
            )),
        });
    }

    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// check
// ============================================================================

/// `basil check`: lex, parse, and analyze; exit 0 iff no errors.
#[tracing::instrument(skip_all, fields(file = %file.display()))]
pub fn check(file: &Path, dump_tokens: bool, dump_ast: bool) -> CliResult<ExitCode> {
    let source = read_source(file)?;
    let file_name = file.display().to_string();

    if dump_tokens {
        let (tokens, errors) = lexer::tokenize(&source);
        for token in &tokens {
            println!("{token:?}");
        }
        for error in &errors {
            diagnostics::print_parse_error(&file_name, &source, error);
        }
    }

    let (checked, errors) = check_source(&file_name, &source)?;

    if dump_ast {
        println!("{:#?}", checked.outcome.program);
    }

    if errors > 0 {
        return Err(CliError::CompilationFailed { errors });
    }
    println!("✓ {file_name}: no errors");
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// build
// ============================================================================

/// `basil build`: check, then lower to IR and run the optimization pipeline.
#[tracing::instrument(skip_all, fields(file = %file.display()))]
pub fn build(file: &Path, emit_ir: bool, no_opt: bool, opt_stats: bool) -> CliResult<ExitCode> {
    let source = read_source(file)?;
    let file_name = file.display().to_string();

    let (checked, errors) = check_source(&file_name, &source)?;
    if errors > 0 {
        return Err(CliError::CompilationFailed { errors });
    }

    let mut module = build::lower(&checked.outcome.program, &checked.analysis);

    if no_opt {
        if emit_ir {
            print!("{module}");
        }
        println!("✓ {file_name}: built (optimizer skipped)");
        return Ok(ExitCode::SUCCESS);
    }

    let result = OptimizationPipeline::standard().run(&mut module);
    if opt_stats {
        print_opt_stats(&result);
    }
    if emit_ir {
        print!("{module}");
    }
    println!(
        "✓ {file_name}: built, {} modification(s) over {} iteration(s)",
        result.total_modifications, result.iterations_run
    );
    Ok(ExitCode::SUCCESS)
}

/// Per-pass-per-iteration table for `--opt-stats`.
fn print_opt_stats(result: &OptimizationResult) {
    println!("{:<33} {:>9} {:>13}", "pass", "iteration", "modifications");
    for pass in &result.pass_results {
        println!(
            "{:<33} {:>9} {:>13}",
            pass.pass, pass.iteration, pass.modifications
        );
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::env;
    use std::path::PathBuf;

    fn temp_source(tag: &str, contents: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("basil_cli_{}_{tag}.bas", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_check_missing_file_is_an_io_error() {
        let result = check(Path::new("definitely_missing.bas"), false, false);
        match result {
            Err(CliError::Io { path, .. }) => {
                assert_eq!(path, PathBuf::from("definitely_missing.bas"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_check_clean_source_succeeds() {
        let path = temp_source("clean", "Dim x As Integer = 5\nPrint(x)\n");
        let result = check(&path, false, false);
        let _ = fs::remove_file(&path);
        assert_eq!(result.unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn test_check_reports_error_count() {
        let path = temp_source("broken", "If x > 5\n  Print(x)\nEnd If\n");
        let result = check(&path, false, false);
        let _ = fs::remove_file(&path);
        match result {
            Err(CliError::CompilationFailed { errors }) => assert!(errors >= 1),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_build_clean_source_succeeds() {
        let path = temp_source(
            "build",
            "Dim total As Integer = 0\n\
             For i = 1 To 10\n\
               total = total + i\n\
             Next\n\
             Print(total)\n",
        );
        let result = build(&path, false, false, false);
        let _ = fs::remove_file(&path);
        assert_eq!(result.unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn test_build_refuses_source_with_errors() {
        let path = temp_source("bad_build", "Print(undefined_name)\n");
        let result = build(&path, false, false, false);
        let _ = fs::remove_file(&path);
        assert!(matches!(
            result,
            Err(CliError::CompilationFailed { .. })
        ));
    }
}
