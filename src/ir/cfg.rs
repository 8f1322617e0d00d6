//! CFG queries over a function's block arena
//!
//! Edges live on the blocks themselves: successors are derived from each
//! block's terminator and predecessors are the reverse edges. Passes that
//! restructure blocks call [`repair_edges`] before relying on either list.

use std::collections::HashSet;

use super::{BlockId, Instruction, IrFunction};

/// Rebuild every block's successor and predecessor list from terminators.
pub fn repair_edges(func: &mut IrFunction) {
    for block in &mut func.blocks {
        block.successors.clear();
        block.predecessors.clear();
    }
    for id in func.block_ids() {
        let successors = match func.block(id).terminator() {
            Some(terminator) => terminator.successors(),
            None => Vec::new(),
        };
        for succ in successors {
            let block = func.block_mut(id);
            if !block.successors.contains(&succ) {
                block.successors.push(succ);
            }
            let target = func.block_mut(succ);
            if !target.predecessors.contains(&id) {
                target.predecessors.push(id);
            }
        }
    }
}

/// Which blocks can be reached from the entry block, indexed by block index.
pub fn reachable(func: &IrFunction) -> Vec<bool> {
    let mut seen = vec![false; func.blocks.len()];
    if func.blocks.is_empty() {
        return seen;
    }
    let mut work = vec![func.entry];
    seen[func.entry.index()] = true;
    while let Some(id) = work.pop() {
        for &succ in &func.block(id).successors {
            if !seen[succ.index()] {
                seen[succ.index()] = true;
                work.push(succ);
            }
        }
    }
    seen
}

/// Delete blocks unreachable from the entry, compacting the arena.
///
/// Surviving blocks are renumbered; every `BlockId` in terminators, phi
/// incoming lists, and the entry pointer is rewritten, then edges are
/// repaired. Returns the number of blocks removed.
pub fn remove_unreachable(func: &mut IrFunction) -> usize {
    repair_edges(func);
    let keep = reachable(func);
    let removed = keep.iter().filter(|k| !**k).count();
    if removed == 0 {
        return 0;
    }

    // Old index -> new index for survivors.
    let mut remap = vec![None; func.blocks.len()];
    let mut next = 0;
    for (i, kept) in keep.iter().enumerate() {
        if *kept {
            remap[i] = Some(BlockId(next));
            next += 1;
        }
    }
    let renumber = |id: BlockId| -> BlockId {
        // Reachable blocks only ever reference reachable blocks.
        remap[id.index()].unwrap_or(id)
    };

    let blocks = std::mem::take(&mut func.blocks);
    func.blocks = blocks
        .into_iter()
        .zip(keep)
        .filter_map(|(block, kept)| kept.then_some(block))
        .collect();

    for block in &mut func.blocks {
        for instruction in &mut block.instructions {
            match instruction {
                Instruction::Jump { target } => *target = renumber(*target),
                Instruction::Branch {
                    positive, negative, ..
                } => {
                    *positive = renumber(*positive);
                    *negative = renumber(*negative);
                }
                Instruction::Switch { cases, default, .. } => {
                    for (_, target) in cases {
                        *target = renumber(*target);
                    }
                    *default = renumber(*default);
                }
                Instruction::Phi { incoming, .. } => {
                    incoming.retain(|(_, from)| remap[from.index()].is_some());
                    for (_, from) in incoming {
                        *from = renumber(*from);
                    }
                }
                _ => {}
            }
        }
    }
    func.entry = renumber(func.entry);
    repair_edges(func);
    removed
}

/// Dominator sets, indexed by block index: `doms[b]` holds every block that
/// dominates `b` (including `b` itself).
///
/// Iterative set intersection over predecessors until a fixed point.
/// Unreachable blocks keep the full set, the intersection identity.
pub fn dominators(func: &IrFunction) -> Vec<HashSet<BlockId>> {
    let n = func.blocks.len();
    let all: HashSet<BlockId> = func.block_ids().collect();
    let mut doms = vec![all; n];
    if n == 0 {
        return doms;
    }
    doms[func.entry.index()] = HashSet::from([func.entry]);

    let mut changed = true;
    while changed {
        changed = false;
        for id in func.block_ids() {
            if id == func.entry {
                continue;
            }
            let mut updated: Option<HashSet<BlockId>> = None;
            for &pred in &func.block(id).predecessors {
                let pred_doms = &doms[pred.index()];
                updated = Some(match updated {
                    None => pred_doms.clone(),
                    Some(acc) => acc.intersection(pred_doms).copied().collect(),
                });
            }
            let Some(mut updated) = updated else {
                continue;
            };
            updated.insert(id);
            if updated != doms[id.index()] {
                doms[id.index()] = updated;
                changed = true;
            }
        }
    }
    doms
}

/// A natural loop discovered from one back edge.
#[derive(Debug, Clone)]
pub struct NaturalLoop {
    pub header: BlockId,
    /// Every block in the loop, header included.
    pub body: HashSet<BlockId>,
}

impl NaturalLoop {
    pub fn contains(&self, id: BlockId) -> bool {
        self.body.contains(&id)
    }

    /// The unique predecessor of the header from outside the loop, when one
    /// exists. This is where hoisted instructions land.
    pub fn preheader(&self, func: &IrFunction) -> Option<BlockId> {
        let mut outside = func
            .block(self.header)
            .predecessors
            .iter()
            .copied()
            .filter(|p| !self.body.contains(p));
        let first = outside.next()?;
        outside.next().is_none().then_some(first)
    }
}

/// Back edges `tail -> header` where the header dominates the tail, one
/// natural loop each. Requires current edges; call [`repair_edges`] first.
pub fn loops(func: &IrFunction) -> Vec<NaturalLoop> {
    let doms = dominators(func);
    let seen = reachable(func);
    let mut found = Vec::new();
    for tail in func.block_ids() {
        if !seen[tail.index()] {
            continue;
        }
        for &header in &func.block(tail).successors {
            if doms[tail.index()].contains(&header) {
                found.push(NaturalLoop {
                    header,
                    body: natural_loop_body(func, tail, header),
                });
            }
        }
    }
    found
}

/// Worklist over predecessors from the back edge's tail, stopping at the
/// header.
fn natural_loop_body(func: &IrFunction, tail: BlockId, header: BlockId) -> HashSet<BlockId> {
    let mut body = HashSet::from([header, tail]);
    let mut work = vec![tail];
    while let Some(id) = work.pop() {
        if id == header {
            continue;
        }
        for &pred in &func.block(id).predecessors {
            if body.insert(pred) {
                work.push(pred);
            }
        }
    }
    body
}
