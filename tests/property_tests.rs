//! Property-based tests for the Basil front end and optimizer.
//!
//! These use proptest to check invariants across many generated inputs,
//! catching edge cases that hand-written tests tend to miss: parses that
//! diverge between runs, recovery that stops making progress, and passes
//! that keep reporting work on their own output.

use basil::frontend::diagnostics::{FatalParseError, MAX_PARSE_ERRORS};
use basil::frontend::{analyzer, parser};
use basil::ir::optimize::{ConstantFolding, OptimizationPipeline, Pass};
use basil::ir::{BinOp, build, Constant, Instruction, IrFunction, IrModule, IrType, Value};
use proptest::prelude::*;

// No Basil keyword starts with 'v', so these never collide with one.
fn ident_strategy() -> impl Strategy<Value = String> {
    "v[a-z0-9]{0,7}"
}

/// A small script that is always clean: declare, mutate, print.
fn script_strategy() -> impl Strategy<Value = String> {
    (ident_strategy(), any::<i16>(), any::<i16>()).prop_map(|(name, a, b)| {
        format!("Dim {name} As Integer = {a} * {b}\n{name} = {name} + 1\nPrint({name})\n")
    })
}

fn lowered(source: &str) -> IrModule {
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

// =============================================================================
// Parser properties
// =============================================================================

proptest! {
    /// Parsing the same source twice yields the same program and the same
    /// error list.
    #[test]
    fn parse_is_deterministic_on_clean_sources(source in script_strategy()) {
        let first = parser::parse(&source).expect("parse aborted");
        let second = parser::parse(&source).expect("parse aborted");
        prop_assert!(first.is_clean(), "errors: {:?}", first.errors);
        prop_assert_eq!(first.program, second.program);
    }

    /// Recovery terminates on arbitrary printable text and never records
    /// more than the cap.
    #[test]
    fn recovery_terminates_on_arbitrary_text(source in "[ -~\\n]{0,120}") {
        match parser::parse(&source) {
            Ok(outcome) => prop_assert!(outcome.errors.len() <= MAX_PARSE_ERRORS),
            Err(FatalParseError::TooManyErrors { errors }) => {
                prop_assert_eq!(errors.len(), MAX_PARSE_ERRORS);
            }
        }
    }

    /// Broken input is handled the same way every time, recovery included.
    #[test]
    fn recovery_is_deterministic(source in "[ -~\\n]{0,120}") {
        match (parser::parse(&source), parser::parse(&source)) {
            (Ok(first), Ok(second)) => {
                prop_assert_eq!(first.program, second.program);
                prop_assert_eq!(first.errors, second.errors);
            }
            (Err(first), Err(second)) => {
                let FatalParseError::TooManyErrors { errors: first } = first;
                let FatalParseError::TooManyErrors { errors: second } = second;
                prop_assert_eq!(first, second);
            }
            (first, second) => {
                prop_assert!(false, "diverging outcomes: {:?} vs {:?}", first, second)
            }
        }
    }
}

/// The cap aborts the parse and hands back exactly the recorded errors.
#[test]
fn test_error_cap_aborts_with_the_recorded_errors() {
    let source = "Print(1\n".repeat(MAX_PARSE_ERRORS + 20);
    let Err(fatal) = parser::parse(&source) else {
        panic!("parse should abort at the error cap");
    };
    let FatalParseError::TooManyErrors { errors } = fatal;
    assert_eq!(errors.len(), MAX_PARSE_ERRORS);
    assert!(errors.iter().all(|e| e.message.contains("Expected ')'")));
}

// =============================================================================
// Optimizer properties
// =============================================================================

fn binary_op_strategy() -> impl Strategy<Value = BinOp> {
    prop_oneof![
        Just(BinOp::Add),
        Just(BinOp::Sub),
        Just(BinOp::Mul),
        Just(BinOp::Div),
        Just(BinOp::Mod),
    ]
}

fn constant_module(op: BinOp, left: i32, right: i32) -> IrModule {
    let mut func = IrFunction::new("f", IrType::I32);
    let entry = func.entry;
    func.block_mut(entry).push(Instruction::Binary {
        dest: "%t0".to_string(),
        ty: IrType::I32,
        op,
        left: Value::Const(Constant::I32(left)),
        right: Value::Const(Constant::I32(right)),
    });
    func.block_mut(entry).push(Instruction::Return {
        value: Some(Value::Name("%t0".to_string())),
    });
    let mut module = IrModule::new("prop");
    module.functions.push(func);
    module
}

proptest! {
    /// One folding run reaches a fixed point, including the overflow and
    /// zero-divisor cases that fold to nothing.
    #[test]
    fn folding_reaches_a_fixed_point_in_one_run(
        op in binary_op_strategy(),
        left in any::<i32>(),
        right in any::<i32>(),
    ) {
        let mut module = constant_module(op, left, right);
        let mut pass = ConstantFolding::new();
        pass.run(&mut module);
        let after_first = pass.modifications();

        prop_assert!(!pass.run(&mut module));
        prop_assert_eq!(pass.modifications(), after_first);
    }

    /// The pipeline stops within its iteration bound no matter how small
    /// the bound is.
    #[test]
    fn pipeline_respects_its_iteration_bound(
        source in script_strategy(),
        max in 1usize..6,
    ) {
        let mut module = lowered(&source);
        let result = OptimizationPipeline::standard()
            .with_max_iterations(max)
            .run(&mut module);
        prop_assert!(result.iterations_run >= 1);
        prop_assert!(result.iterations_run <= max);
    }

    /// Whatever the pipeline produces, a second pipeline finds nothing
    /// left to do.
    #[test]
    fn pipeline_output_is_a_fixed_point(source in script_strategy()) {
        let mut module = lowered(&source);
        OptimizationPipeline::standard().run(&mut module);

        let second = OptimizationPipeline::standard().run(&mut module);
        prop_assert_eq!(second.total_modifications, 0);
        prop_assert_eq!(second.iterations_run, 1);
    }
}
