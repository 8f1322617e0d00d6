//! Copy propagation
//!
//! Tracks plain copies (`Assign x, y`) within each block and substitutes the
//! copied value into later operands, so chains of copies collapse and the
//! originals become dead for the elimination pass to sweep.
//!
//! ## Notes
//!
//! Strictly intra-block: the map resets at every block boundary and nothing
//! here understands phi nodes. The lowering emits no phis, so operands can be
//! rewritten uniformly.

use std::collections::HashMap;

use crate::ir::{Block, Instruction, IrModule, Value};

use super::Pass;

pub struct CopyPropagation {
    modifications: usize,
}

impl CopyPropagation {
    pub fn new() -> Self {
        Self { modifications: 0 }
    }
}

impl Default for CopyPropagation {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for CopyPropagation {
    fn name(&self) -> &str {
        "copy-propagation"
    }

    fn run(&mut self, module: &mut IrModule) -> bool {
        let mut changed = false;
        for func in module.functions.iter_mut().filter(|f| !f.is_external) {
            for block in &mut func.blocks {
                let substituted = propagate_block(block);
                if substituted > 0 {
                    self.modifications += substituted;
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

/// Substitute tracked copies through one block. Returns the number of operand
/// substitutions performed.
fn propagate_block(block: &mut Block) -> usize {
    let mut copies: HashMap<String, Value> = HashMap::new();
    let mut substituted = 0;

    for instruction in &mut block.instructions {
        instruction.for_each_value_mut(|value| {
            if let Some(replacement) = value.name().and_then(|n| copies.get(n)) {
                *value = replacement.clone();
                substituted += 1;
            }
        });

        if let Some(dest) = instruction.dest() {
            let dest = dest.to_string();
            // The destination changed, so mappings through the old value are
            // stale in both key and value position.
            copies.remove(&dest);
            copies.retain(|_, value| value.name() != Some(dest.as_str()));

            if let Instruction::Assign { value, .. } = instruction {
                if value.name() != Some(dest.as_str()) {
                    copies.insert(dest, value.clone());
                }
            }
        }
    }

    substituted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, Constant, IrFunction, IrType};

    fn int(v: i32) -> Value {
        Value::Const(Constant::I32(v))
    }

    fn name(n: &str) -> Value {
        Value::Name(n.to_string())
    }

    fn assign(dest: &str, value: Value) -> Instruction {
        Instruction::Assign {
            dest: dest.to_string(),
            ty: IrType::I32,
            value,
        }
    }

    fn module_with(instructions: Vec<Instruction>) -> IrModule {
        let mut func = IrFunction::new("__main", IrType::Void);
        let entry = func.entry;
        for instruction in instructions {
            func.block_mut(entry).push(instruction);
        }
        func.block_mut(entry).push(Instruction::Return { value: None });
        let mut module = IrModule::new("test");
        module.functions.push(func);
        module
    }

    fn entry_instruction(module: &IrModule, index: usize) -> &Instruction {
        &module.functions[0].blocks[0].instructions[index]
    }

    #[test]
    fn test_propagates_constant_copy() {
        let mut module = module_with(vec![
            assign("x", int(5)),
            Instruction::Binary {
                dest: "%t0".to_string(),
                ty: IrType::I32,
                op: BinOp::Add,
                left: name("x"),
                right: int(1),
            },
        ]);

        let mut pass = CopyPropagation::new();
        assert!(pass.run(&mut module));
        match entry_instruction(&module, 1) {
            Instruction::Binary { left, .. } => assert_eq!(*left, int(5)),
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn test_collapses_copy_chain() {
        let mut module = module_with(vec![
            assign("x", name("source")),
            assign("y", name("x")),
            assign("z", name("y")),
        ]);

        let mut pass = CopyPropagation::new();
        assert!(pass.run(&mut module));
        match entry_instruction(&module, 2) {
            Instruction::Assign { value, .. } => assert_eq!(*value, name("source")),
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn test_redefinition_invalidates_mapping() {
        let mut module = module_with(vec![
            assign("x", int(1)),
            assign("x", name("runtime")),
            Instruction::Binary {
                dest: "%t0".to_string(),
                ty: IrType::I32,
                op: BinOp::Add,
                left: name("x"),
                right: int(1),
            },
        ]);

        let mut pass = CopyPropagation::new();
        assert!(pass.run(&mut module));
        match entry_instruction(&module, 2) {
            // The stale `x -> 1` mapping must not survive the reassignment.
            Instruction::Binary { left, .. } => assert_eq!(*left, name("runtime")),
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn test_source_redefinition_invalidates_mapping() {
        let mut module = module_with(vec![
            assign("x", name("y")),
            assign("y", int(9)),
            Instruction::Binary {
                dest: "%t0".to_string(),
                ty: IrType::I32,
                op: BinOp::Add,
                left: name("x"),
                right: int(1),
            },
        ]);

        let mut pass = CopyPropagation::new();
        let ran = pass.run(&mut module);
        match entry_instruction(&module, 2) {
            // `x` copies the old `y`, which was overwritten; substituting the
            // new `y` would be wrong, so `x` stays.
            Instruction::Binary { left, .. } => assert_eq!(*left, name("x")),
            other => panic!("unexpected instruction: {other:?}"),
        }
        assert!(!ran);
    }

    #[test]
    fn test_does_not_cross_block_boundary() {
        let mut func = IrFunction::new("__main", IrType::I32);
        let entry = func.entry;
        let next = func.add_block("next");
        func.block_mut(entry).push(assign("x", int(5)));
        func.block_mut(entry).push(Instruction::Jump { target: next });
        func.block_mut(next).push(Instruction::Return {
            value: Some(name("x")),
        });
        let mut module = IrModule::new("test");
        module.functions.push(func);

        let mut pass = CopyPropagation::new();
        assert!(!pass.run(&mut module));
        match &module.functions[0].blocks[1].instructions[0] {
            Instruction::Return { value } => assert_eq!(*value, Some(name("x"))),
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn test_reaches_fixed_point() {
        let mut module = module_with(vec![
            assign("x", name("y")),
            assign("y", name("x")),
        ]);

        let mut pass = CopyPropagation::new();
        // First run rewrites `y = x` into `y = y`; afterwards nothing changes.
        pass.run(&mut module);
        assert!(!pass.run(&mut module));
        assert!(!pass.run(&mut module));
    }
}
