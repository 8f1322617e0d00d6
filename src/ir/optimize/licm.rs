//! Loop-invariant code motion
//!
//! Finds natural loops from CFG back edges, marks instructions whose operands
//! cannot change across iterations, and moves them into the loop's preheader
//! ahead of its terminator, preserving their relative order.
//!
//! ## Notes
//!
//! An operand qualifies when it is a constant, a function parameter, a name
//! never defined inside the loop, or the destination of an instruction
//! already marked invariant. Anything else is conservatively variant. Only
//! register-like computations move; loads stay where they are because a store
//! in the loop may change what they read, and allocations stay because moving
//! them changes how many times they run. Loops without a unique out-of-loop
//! header predecessor are skipped.

use std::collections::{HashMap, HashSet};
use std::mem;

use crate::ir::{BlockId, cfg, Instruction, IrFunction, IrModule};

use super::Pass;

pub struct LoopInvariantCodeMotion {
    modifications: usize,
}

impl LoopInvariantCodeMotion {
    pub fn new() -> Self {
        Self { modifications: 0 }
    }
}

impl Default for LoopInvariantCodeMotion {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for LoopInvariantCodeMotion {
    fn name(&self) -> &str {
        "loop-invariant-code-motion"
    }

    fn run(&mut self, module: &mut IrModule) -> bool {
        let mut changed = false;
        for func in module.functions.iter_mut().filter(|f| !f.is_external) {
            let hoisted = hoist_function(func);
            if hoisted > 0 {
                self.modifications += hoisted;
                changed = true;
            }
        }
        changed
    }

    fn modifications(&self) -> usize {
        self.modifications
    }
}

/// Hoist invariant instructions out of every loop in `func`. Returns the
/// number of instructions moved.
fn hoist_function(func: &mut IrFunction) -> usize {
    cfg::repair_edges(func);
    let mut hoisted = 0;
    for natural_loop in cfg::loops(func) {
        let Some(preheader) = natural_loop.preheader(func) else {
            continue;
        };
        hoisted += hoist_loop(func, &natural_loop, preheader);
    }
    hoisted
}

/// Whether this instruction kind may move. Pure register computations only:
/// loads observe memory and allocations have per-execution identity.
fn movable(instruction: &Instruction) -> bool {
    matches!(
        instruction,
        Instruction::Binary { .. }
            | Instruction::Unary { .. }
            | Instruction::Compare { .. }
            | Instruction::Assign { .. }
            | Instruction::Cast { .. }
            | Instruction::GetElement { .. }
    )
}

fn hoist_loop(func: &mut IrFunction, natural_loop: &cfg::NaturalLoop, preheader: BlockId) -> usize {
    let mut body: Vec<BlockId> = natural_loop.body.iter().copied().collect();
    body.sort();

    // Definition counts inside the loop. A name defined more than once in the
    // body can never be invariant.
    let mut defs: HashMap<String, usize> = HashMap::new();
    for id in &body {
        for instruction in &func.block(*id).instructions {
            if let Some(dest) = instruction.dest() {
                *defs.entry(dest.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut invariant: HashSet<String> = HashSet::new();
    loop {
        let mut grew = false;
        for id in &body {
            for instruction in &func.block(*id).instructions {
                let Some(dest) = instruction.dest() else {
                    continue;
                };
                if invariant.contains(dest) || !movable(instruction) {
                    continue;
                }
                if defs.get(dest) != Some(&1) {
                    continue;
                }
                let mut qualifies = true;
                instruction.for_each_value(|value| {
                    if let Some(name) = value.name() {
                        let defined_outside = !defs.contains_key(name);
                        if !(func.is_param(name)
                            || defined_outside
                            || invariant.contains(name))
                        {
                            qualifies = false;
                        }
                    }
                });
                if qualifies {
                    invariant.insert(dest.to_string());
                    grew = true;
                }
            }
        }
        if !grew {
            break;
        }
    }

    if invariant.is_empty() {
        return 0;
    }

    let mut hoisted: Vec<Instruction> = Vec::new();
    for id in &body {
        let block = func.block_mut(*id);
        let instructions = mem::take(&mut block.instructions);
        for instruction in instructions {
            let moves = instruction
                .dest()
                .is_some_and(|dest| invariant.contains(dest));
            if moves {
                hoisted.push(instruction);
            } else {
                block.instructions.push(instruction);
            }
        }
    }

    let moved = hoisted.len();
    let block = func.block_mut(preheader);
    let at = if block.is_terminated() {
        block.instructions.len() - 1
    } else {
        block.instructions.len()
    };
    for (offset, instruction) in hoisted.into_iter().enumerate() {
        block.instructions.insert(at + offset, instruction);
    }
    moved
}
