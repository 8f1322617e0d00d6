//! End-to-end tests that drive whole sources through the front end and the
//! optimizer: parse, analyze, lower, optimize. Behavior local to one stage
//! is tested next to that stage; these cover the seams between them.

use basil::frontend::ast::{Decl, Stmt};
use basil::frontend::{analyzer, parser};
use basil::ir::optimize::{OptimizationPipeline, OptimizationResult};
use basil::ir::{BinOp, build, cfg, Instruction, IrModule, Value};

/// Parse, analyze, and lower a source that is expected to be clean.
fn compiled(source: &str) -> IrModule {
    let outcome = parser::parse(source).expect("parse aborted");
    assert!(outcome.is_clean(), "parse errors: {:?}", outcome.errors);
    let analysis = analyzer::analyze(&outcome.program);
    assert!(
        !analysis.has_errors(),
        "analysis errors: {:?}",
        analysis.diagnostics()
    );
    build::lower(&outcome.program, &analysis)
}

fn optimized(source: &str) -> (IrModule, OptimizationResult) {
    let mut module = compiled(source);
    let result = OptimizationPipeline::standard().run(&mut module);
    (module, result)
}

fn function_text(module: &IrModule, name: &str) -> String {
    module
        .function(name)
        .unwrap_or_else(|| panic!("no function '{name}' in module"))
        .to_string()
}

// ============================================================================
// Front end
// ============================================================================

#[test]
fn test_clean_script_compiles_front_to_back() {
    let source = "Dim x As Integer = 5\nPrint(x)\n";
    let outcome = parser::parse(source).expect("parse aborted");
    assert!(outcome.is_clean(), "parse errors: {:?}", outcome.errors);
    assert_eq!(outcome.program.body.len(), 2);

    let analysis = analyzer::analyze(&outcome.program);
    assert!(
        analysis.diagnostics().is_empty(),
        "unexpected diagnostics: {:?}",
        analysis.diagnostics()
    );

    let module = build::lower(&outcome.program, &analysis);
    let text = function_text(&module, "__main");
    assert!(text.contains("x = 5"), "missing init in:\n{text}");
    assert!(text.contains("call print(x)"), "missing call in:\n{text}");
}

#[test]
fn test_missing_then_yields_one_error_and_a_usable_ast() {
    let outcome = parser::parse("If x > 5\n  Print(x)\nEnd If\n").expect("parse aborted");

    assert_eq!(outcome.errors.len(), 1, "errors: {:?}", outcome.errors);
    let error = &outcome.errors[0];
    assert!(error.message.contains("Expected 'Then'"), "{error:?}");
    assert_eq!(
        error.suggestion.as_deref(),
        Some("Add 'Then' after the condition")
    );

    // The construct still parsed; later stages can keep working.
    assert_eq!(outcome.program.body.len(), 1);
    match &outcome.program.body[0].node {
        Decl::Statement(stmt) => assert!(matches!(stmt.node, Stmt::If(_))),
        other => panic!("expected a statement, got {other:?}"),
    }
}

#[test]
fn test_errors_in_separate_callables_are_both_located() {
    let outcome = parser::parse(
        "Function First() As Integer
    If ready
        Return 1
    End If
    Return 0
End Function

Sub Second()
    Print(1
End Sub
",
    )
    .expect("parse aborted");

    assert_eq!(outcome.errors.len(), 2, "errors: {:?}", outcome.errors);

    let then_error = &outcome.errors[0];
    assert!(then_error.message.contains("Expected 'Then'"));
    assert_eq!(then_error.pos.line, 2);
    let context = then_error.context.as_deref().expect("context snapshot");
    assert!(context.contains("If statement"), "context: {context}");
    assert!(context.contains("Function 'First'"), "context: {context}");

    let paren_error = &outcome.errors[1];
    assert!(paren_error.message.contains("Expected ')'"));
    assert_eq!(paren_error.pos.line, 9);
    assert_eq!(paren_error.found, "end of line");
    let context = paren_error.context.as_deref().expect("context snapshot");
    assert!(context.contains("Sub 'Second'"), "context: {context}");

    // Recovery kept both declarations.
    assert_eq!(outcome.program.body.len(), 2);
    match &outcome.program.body[0].node {
        Decl::Function(f) => assert_eq!(f.name, "First"),
        other => panic!("expected a function, got {other:?}"),
    }
    match &outcome.program.body[1].node {
        Decl::Sub(s) => assert_eq!(s.name, "Second"),
        other => panic!("expected a sub, got {other:?}"),
    }
}

// ============================================================================
// Optimizer over lowered sources
// ============================================================================

#[test]
fn test_constant_expression_folds_through_the_pipeline() {
    let (module, result) = optimized("Dim t1 As Integer = 4 * 2\nPrint(t1)\n");
    assert!(result.total_modifications >= 1);

    let text = function_text(&module, "__main");
    assert!(text.contains("t1 = 8"), "constant not folded in:\n{text}");
    assert!(
        text.contains("call print(8)"),
        "constant not propagated in:\n{text}"
    );
    assert!(!text.contains("mul"), "multiply survived in:\n{text}");
}

#[test]
fn test_multiply_by_power_of_two_becomes_shift() {
    let (module, _) = optimized(
        "Function Scale(x As Integer) As Integer
    Return x * 8
End Function
",
    );
    let text = function_text(&module, "scale");
    assert!(text.contains("shl i32 x, 3"), "no shift in:\n{text}");
    assert!(!text.contains("mul"), "multiply survived in:\n{text}");
}

#[test]
fn test_copy_chains_collapse_and_dead_temps_vanish() {
    let (module, result) = optimized(
        "Dim a As Integer = 10
Dim b As Integer = a
Dim c As Integer = b
Print(c)
",
    );
    assert!(result.total_modifications >= 1);

    let text = function_text(&module, "__main");
    assert!(
        text.contains("call print(10)"),
        "copies not propagated in:\n{text}"
    );
    assert!(!text.contains("b = a"), "copy survived in:\n{text}");
    // Named variables stay, even when every later use was rewritten.
    assert!(text.contains("a = 10"), "named assign dropped in:\n{text}");
}

#[test]
fn test_loop_invariant_work_leaves_the_loop() {
    let (mut module, result) = optimized(
        "Function Sum(limit As Integer) As Integer
    Dim total As Integer = 0
    For i = 1 To 10
        total = total + limit * 2
    Next
    Return total
End Function
",
    );
    // Strength reduction turns the multiply into a shift, then motion
    // hoists it out of the loop.
    assert!(result.total_modifications >= 2);

    let func = module
        .functions
        .iter_mut()
        .find(|f| f.name == "sum")
        .expect("no sum");
    cfg::repair_edges(func);
    let loops = cfg::loops(func);
    assert!(!loops.is_empty(), "loop structure lost");

    let shift_block = func
        .block_ids()
        .find(|id| {
            func.block(*id)
                .instructions
                .iter()
                .any(|i| matches!(i, Instruction::Binary { op: BinOp::Shl, .. }))
        })
        .expect("shifted multiply not found");
    assert!(
        loops.iter().all(|l| !l.contains(shift_block)),
        "invariant shift still inside the loop"
    );

    let accumulate_block = func
        .block_ids()
        .find(|id| {
            func.block(*id).instructions.iter().any(|i| {
                matches!(
                    i,
                    Instruction::Binary { op: BinOp::Add, left: Value::Name(n), .. }
                    if n == "total"
                )
            })
        })
        .expect("accumulation not found");
    assert!(
        loops.iter().any(|l| l.contains(accumulate_block)),
        "accumulation left the loop"
    );
}

#[test]
fn test_script_and_functions_share_one_pipeline() {
    let (module, _) = optimized(
        "Function Twice(n As Integer) As Integer
    Return n * 2
End Function

Dim v As Integer = Twice(6 * 7)
Print(v)
",
    );

    let main_text = function_text(&module, "__main");
    assert!(
        main_text.contains("twice(42)"),
        "argument not folded in:\n{main_text}"
    );

    let twice_text = function_text(&module, "twice");
    assert!(
        twice_text.contains("shl i32 n, 1"),
        "function body not reduced in:\n{twice_text}"
    );
}

#[test]
fn test_pipeline_reports_passes_in_order() {
    let (_, result) = optimized("Dim t1 As Integer = 4 * 2\nPrint(t1)\n");

    let first_round: Vec<&str> = result
        .pass_results
        .iter()
        .filter(|r| r.iteration == 1)
        .map(|r| r.pass.as_str())
        .collect();
    assert_eq!(
        first_round,
        [
            "constant-folding",
            "copy-propagation",
            "common-subexpression-elimination",
            "strength-reduction",
            "loop-invariant-code-motion",
            "dead-code-elimination",
        ]
    );
    assert!(result.iterations_run >= 1);
    assert!(result.pass_results.iter().all(|r| r.iteration >= 1));
}
