//! Dead code elimination
//!
//! Two sweeps per function: drop blocks unreachable from the entry (mending
//! predecessor lists), then drop pure value-producing instructions whose
//! destination is never read anywhere in the surviving blocks.
//!
//! ## Notes
//!
//! Only `%t`-temporaries are deletable. An assignment to a user-named
//! variable stays even when nothing in the function reads it, since the name
//! is visible to consumers outside this pass. Calls, stores, terminators,
//! labels, and comments are never deleted.

use std::collections::HashSet;

use crate::ir::{cfg, IrFunction, IrModule, is_temp};

use super::Pass;

pub struct DeadCodeElimination {
    modifications: usize,
}

impl DeadCodeElimination {
    pub fn new() -> Self {
        Self { modifications: 0 }
    }
}

impl Default for DeadCodeElimination {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for DeadCodeElimination {
    fn name(&self) -> &str {
        "dead-code-elimination"
    }

    fn run(&mut self, module: &mut IrModule) -> bool {
        let mut changed = false;
        for func in module.functions.iter_mut().filter(|f| !f.is_external) {
            let removed = cfg::remove_unreachable(func) + sweep_unused(func);
            if removed > 0 {
                self.modifications += removed;
                changed = true;
            }
        }
        changed
    }

    fn modifications(&self) -> usize {
        self.modifications
    }
}

/// Delete pure temporary definitions no instruction reads. Returns the number
/// of instructions removed.
fn sweep_unused(func: &mut IrFunction) -> usize {
    let mut used: HashSet<String> = HashSet::new();
    for block in &func.blocks {
        for instruction in &block.instructions {
            for name in instruction.used_names() {
                used.insert(name);
            }
        }
    }

    let mut removed = 0;
    for block in &mut func.blocks {
        let before = block.instructions.len();
        block.instructions.retain(|instruction| {
            let Some(dest) = instruction.dest() else {
                return true;
            };
            if !instruction.is_pure() || !is_temp(dest) {
                return true;
            }
            used.contains(dest)
        });
        removed += before - block.instructions.len();
    }
    removed
}
