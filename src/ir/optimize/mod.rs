//! Optimization pass pipeline
//!
//! Every pass implements [`Pass`] and rewrites an [`IrModule`] in place. The
//! [`OptimizationPipeline`] holds an ordered list of passes and runs the whole
//! list repeatedly until one full iteration changes nothing, or the iteration
//! bound is hit.
//!
//! ## Notes
//!
//! Passes have no error channel. Whatever a pass cannot safely transform (a
//! zero divisor, an overflowing fold, an operand it cannot classify) it skips
//! instruction by instruction; the only visible trace is the modification
//! counter. External function declarations have no body and are skipped by
//! every pass.

pub mod const_fold;
pub mod copy_prop;
pub mod cse;
pub mod dce;
pub mod licm;
pub mod strength;

use tracing::debug;

use crate::ir::IrModule;

pub use const_fold::ConstantFolding;
pub use copy_prop::CopyPropagation;
pub use cse::CommonSubexpressionElimination;
pub use dce::DeadCodeElimination;
pub use licm::LoopInvariantCodeMotion;
pub use strength::StrengthReduction;

/// A single IR-to-IR transformation.
///
/// Pass objects keep a cumulative modification count across runs; the pipeline
/// diffs that counter around each run to report per-iteration work.
pub trait Pass {
    /// Stable name used in reports and logs.
    fn name(&self) -> &str;

    /// Rewrite `module` in place. Returns whether anything changed.
    fn run(&mut self, module: &mut IrModule) -> bool;

    /// Total modifications made by this pass object since construction.
    fn modifications(&self) -> usize;
}

/// What one pass did during one pipeline iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassResult {
    pub pass: String,
    /// 1-based pipeline iteration this result belongs to.
    pub iteration: usize,
    pub modifications: usize,
    pub changed: bool,
}

/// Aggregate outcome of [`OptimizationPipeline::run`].
#[derive(Debug, Clone, Default)]
pub struct OptimizationResult {
    pub iterations_run: usize,
    pub total_modifications: usize,
    /// One entry per pass per iteration, in execution order.
    pub pass_results: Vec<PassResult>,
}

/// Runs an ordered pass list to a fixed point.
///
/// Passes are independent; each one leaves the module in a consistent state,
/// so the list composes in any order. The standard order folds and simplifies
/// first and sweeps dead code last, because earlier passes are what produce
/// the dead instructions.
pub struct OptimizationPipeline {
    passes: Vec<Box<dyn Pass>>,
    max_iterations: usize,
}

impl OptimizationPipeline {
    /// An empty pipeline with the default iteration bound of 10.
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            max_iterations: 10,
        }
    }

    /// The standard pass list: fold, propagate copies, eliminate common
    /// subexpressions, reduce strength, hoist loop invariants, sweep dead
    /// code.
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_pass(Box::new(ConstantFolding::new()));
        pipeline.add_pass(Box::new(CopyPropagation::new()));
        pipeline.add_pass(Box::new(CommonSubexpressionElimination::new()));
        pipeline.add_pass(Box::new(StrengthReduction::new()));
        pipeline.add_pass(Box::new(LoopInvariantCodeMotion::new()));
        pipeline.add_pass(Box::new(DeadCodeElimination::new()));
        pipeline
    }

    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run every pass, in order, up to `max_iterations` times.
    ///
    /// Stops as soon as one full iteration reports no change from any pass;
    /// that final quiet iteration is still counted in `iterations_run`.
    #[tracing::instrument(skip_all)]
    pub fn run(&mut self, module: &mut IrModule) -> OptimizationResult {
        let mut result = OptimizationResult::default();

        for iteration in 1..=self.max_iterations {
            let mut iteration_changed = false;

            for pass in &mut self.passes {
                let before = pass.modifications();
                let changed = pass.run(module);
                let modifications = pass.modifications() - before;
                debug!(
                    pass = pass.name(),
                    iteration, modifications, changed, "pass finished"
                );
                result.pass_results.push(PassResult {
                    pass: pass.name().to_string(),
                    iteration,
                    modifications,
                    changed,
                });
                result.total_modifications += modifications;
                iteration_changed |= changed;
            }

            result.iterations_run = iteration;
            if !iteration_changed {
                break;
            }
        }

        debug!(
            iterations = result.iterations_run,
            modifications = result.total_modifications,
            "pipeline reached fixed point"
        );
        result
    }
}

impl Default for OptimizationPipeline {
    fn default() -> Self {
        Self::new()
    }
}
