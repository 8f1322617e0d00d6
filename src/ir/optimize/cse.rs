//! Common subexpression elimination
//!
//! Keys each binary and compare instruction by operator and operand identity
//! (names compared as names, constants by rendered value) within a block.
//! A recomputation of an available key is deleted and later uses of its
//! destination are rewritten to the first computation's destination.
//!
//! ## Notes
//!
//! Identity is by name, not by value: `a + b` and `a + c` never share a key
//! even when `b` and `c` hold the same number at runtime. Redefining an
//! operand or a destination drops every key it touches. A duplicate whose
//! destination is a user-named variable keeps a plain copy in place of the
//! recomputation, since other blocks may read that name.

use std::collections::HashMap;
use std::mem;

use crate::ir::{BinOp, Block, CmpOp, Instruction, IrModule, IrType, is_temp, Value};

use super::Pass;

pub struct CommonSubexpressionElimination {
    modifications: usize,
}

impl CommonSubexpressionElimination {
    pub fn new() -> Self {
        Self { modifications: 0 }
    }
}

impl Default for CommonSubexpressionElimination {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for CommonSubexpressionElimination {
    fn name(&self) -> &str {
        "common-subexpression-elimination"
    }

    fn run(&mut self, module: &mut IrModule) -> bool {
        let mut changed = false;
        for func in module.functions.iter_mut().filter(|f| !f.is_external) {
            for block in &mut func.blocks {
                let eliminated = eliminate_block(block);
                if eliminated > 0 {
                    self.modifications += eliminated;
                    changed = true;
                }
            }
        }
        changed
    }

    fn modifications(&self) -> usize {
        self.modifications
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum OperandKey {
    /// Rendered constant, type-tagged so `1: i32` and `1: i64` stay distinct.
    Const(String),
    Name(String),
}

fn operand_key(value: &Value) -> OperandKey {
    match value {
        Value::Const(c) => OperandKey::Const(format!("{}:{c}", c.ty())),
        Value::Name(n) => OperandKey::Name(n.clone()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ExprKey {
    Binary {
        op: BinOp,
        ty: IrType,
        left: OperandKey,
        right: OperandKey,
    },
    Compare {
        op: CmpOp,
        left: OperandKey,
        right: OperandKey,
    },
}

impl ExprKey {
    fn mentions(&self, name: &str) -> bool {
        let uses = |key: &OperandKey| matches!(key, OperandKey::Name(n) if n == name);
        match self {
            ExprKey::Binary { left, right, .. } | ExprKey::Compare { left, right, .. } => {
                uses(left) || uses(right)
            }
        }
    }
}

/// Commutative operators get a canonical operand order so `a + b` and
/// `b + a` share a key. String `Add` concatenates and keeps its order.
fn commutative(op: BinOp, ty: IrType) -> bool {
    matches!(
        op,
        BinOp::Add | BinOp::Mul | BinOp::And | BinOp::Or | BinOp::Xor
    ) && ty != IrType::Str
}

/// The availability key and result type, for instruction kinds CSE handles.
fn expr_key(instruction: &Instruction) -> Option<(ExprKey, IrType)> {
    match instruction {
        Instruction::Binary {
            ty, op, left, right, ..
        } => {
            let mut left = operand_key(left);
            let mut right = operand_key(right);
            if commutative(*op, *ty) && right < left {
                mem::swap(&mut left, &mut right);
            }
            let key = ExprKey::Binary {
                op: *op,
                ty: *ty,
                left,
                right,
            };
            Some((key, *ty))
        }
        Instruction::Compare {
            op, left, right, ..
        } => {
            let key = ExprKey::Compare {
                op: *op,
                left: operand_key(left),
                right: operand_key(right),
            };
            Some((key, IrType::Bool))
        }
        _ => None,
    }
}

/// Eliminate recomputations in one block. Returns the number of duplicates
/// removed or downgraded to copies.
fn eliminate_block(block: &mut Block) -> usize {
    let mut available: HashMap<ExprKey, String> = HashMap::new();
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut eliminated = 0;
    let mut index = 0;

    while index < block.instructions.len() {
        for (from, to) in &renames {
            let replacement = Value::Name(to.clone());
            block.instructions[index].replace_uses(from, &replacement);
        }

        let keyed = expr_key(&block.instructions[index]);
        let duplicate_of = keyed
            .as_ref()
            .and_then(|(key, _)| available.get(key).cloned());

        if let (Some((_, result_ty)), Some(first)) = (&keyed, duplicate_of) {
            if let Some(dest) = block.instructions[index].dest().map(str::to_string) {
                eliminated += 1;
                if is_temp(&dest) {
                    block.instructions.remove(index);
                    renames.insert(dest, first);
                    continue;
                }
                // A user-named destination stays assigned; other blocks may
                // read it.
                block.instructions[index] = Instruction::Assign {
                    dest: dest.clone(),
                    ty: *result_ty,
                    value: Value::Name(first),
                };
                invalidate(&mut available, &mut renames, &dest);
                index += 1;
                continue;
            }
        }

        if let Some(dest) = block.instructions[index].dest().map(str::to_string) {
            invalidate(&mut available, &mut renames, &dest);
            if let Some((key, _)) = keyed {
                if !key.mentions(&dest) {
                    available.insert(key, dest);
                }
            }
        }
        index += 1;
    }

    eliminated
}

/// Drop every tracked fact that flows through a redefined name.
fn invalidate(
    available: &mut HashMap<ExprKey, String>,
    renames: &mut HashMap<String, String>,
    dest: &str,
) {
    available.retain(|key, first| first != dest && !key.mentions(dest));
    renames.retain(|from, to| from != dest && to != dest);
}
