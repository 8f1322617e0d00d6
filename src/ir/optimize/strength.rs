//! Strength reduction
//!
//! Rewrites integer multiply, divide, and modulo by a positive power-of-two
//! constant into the cheaper shift or mask form: `x * 8` becomes `x << 3`,
//! `x / 8` becomes `x >> 3`, `x mod 8` becomes `x and 7`. Multiplication
//! accepts the constant on either side; division and modulo only on the
//! right.

use crate::ir::{BinOp, Constant, Instruction, IrModule, IrType, Value};

use super::Pass;

pub struct StrengthReduction {
    modifications: usize,
}

impl StrengthReduction {
    pub fn new() -> Self {
        Self { modifications: 0 }
    }
}

impl Default for StrengthReduction {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for StrengthReduction {
    fn name(&self) -> &str {
        "strength-reduction"
    }

    fn run(&mut self, module: &mut IrModule) -> bool {
        let mut changed = false;
        for func in module.functions.iter_mut().filter(|f| !f.is_external) {
            for block in &mut func.blocks {
                for instruction in &mut block.instructions {
                    if let Some(reduced) = reduce(instruction) {
                        *instruction = reduced;
                        self.modifications += 1;
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    fn modifications(&self) -> usize {
        self.modifications
    }
}

/// The cheaper form of `instruction`, when one exists.
fn reduce(instruction: &Instruction) -> Option<Instruction> {
    let Instruction::Binary {
        dest,
        ty,
        op,
        left,
        right,
    } = instruction
    else {
        return None;
    };
    if !ty.is_integer() {
        return None;
    }

    let rebuild = |op: BinOp, operand: &Value, amount: i64| -> Option<Instruction> {
        Some(Instruction::Binary {
            dest: dest.clone(),
            ty: *ty,
            op,
            left: operand.clone(),
            right: Value::Const(int_constant(*ty, amount)?),
        })
    };

    match op {
        BinOp::Mul => {
            if let Some(shift) = shift_amount(right) {
                rebuild(BinOp::Shl, left, shift)
            } else if let Some(shift) = shift_amount(left) {
                rebuild(BinOp::Shl, right, shift)
            } else {
                None
            }
        }
        BinOp::Div => shift_amount(right).and_then(|shift| rebuild(BinOp::Shr, left, shift)),
        BinOp::Mod => mask(right).and_then(|m| rebuild(BinOp::And, left, m)),
        _ => None,
    }
}

/// `log2(c)` when the operand is a positive power-of-two integer constant.
fn shift_amount(value: &Value) -> Option<i64> {
    let c = value.as_const()?.as_int()?;
    (c > 0 && (c & (c - 1)) == 0).then(|| i64::from(c.trailing_zeros()))
}

/// `c - 1` when the operand is a positive power-of-two integer constant.
fn mask(value: &Value) -> Option<i64> {
    let c = value.as_const()?.as_int()?;
    (c > 0 && (c & (c - 1)) == 0).then(|| c - 1)
}

fn int_constant(ty: IrType, v: i64) -> Option<Constant> {
    match ty {
        IrType::I32 => i32::try_from(v).ok().map(Constant::I32),
        IrType::I64 => Some(Constant::I64(v)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrFunction;

    fn int(v: i32) -> Value {
        Value::Const(Constant::I32(v))
    }

    fn name(n: &str) -> Value {
        Value::Name(n.to_string())
    }

    fn binary(op: BinOp, left: Value, right: Value) -> Instruction {
        Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::I32,
            op,
            left,
            right,
        }
    }

    fn module_with(instruction: Instruction) -> IrModule {
        let mut func = IrFunction::new("__main", IrType::Void);
        let entry = func.entry;
        func.block_mut(entry).push(instruction);
        func.block_mut(entry).push(Instruction::Return { value: None });
        let mut module = IrModule::new("test");
        module.functions.push(func);
        module
    }

    fn first_instruction(module: &IrModule) -> &Instruction {
        &module.functions[0].blocks[0].instructions[0]
    }

    #[test]
    fn test_multiply_becomes_shift() {
        let mut module = module_with(binary(BinOp::Mul, name("x"), int(8)));

        let mut pass = StrengthReduction::new();
        assert!(pass.run(&mut module));
        assert_eq!(
            *first_instruction(&module),
            binary(BinOp::Shl, name("x"), int(3))
        );
    }

    #[test]
    fn test_multiply_constant_on_left() {
        let mut module = module_with(binary(BinOp::Mul, int(4), name("x")));

        let mut pass = StrengthReduction::new();
        assert!(pass.run(&mut module));
        assert_eq!(
            *first_instruction(&module),
            binary(BinOp::Shl, name("x"), int(2))
        );
    }

    #[test]
    fn test_divide_becomes_shift() {
        let mut module = module_with(binary(BinOp::Div, name("x"), int(16)));

        let mut pass = StrengthReduction::new();
        assert!(pass.run(&mut module));
        assert_eq!(
            *first_instruction(&module),
            binary(BinOp::Shr, name("x"), int(4))
        );
    }

    #[test]
    fn test_modulo_becomes_mask() {
        let mut module = module_with(binary(BinOp::Mod, name("x"), int(8)));

        let mut pass = StrengthReduction::new();
        assert!(pass.run(&mut module));
        assert_eq!(
            *first_instruction(&module),
            binary(BinOp::And, name("x"), int(7))
        );
    }

    #[test]
    fn test_division_by_left_constant_is_untouched() {
        let division = binary(BinOp::Div, int(16), name("x"));
        let mut module = module_with(division.clone());

        let mut pass = StrengthReduction::new();
        assert!(!pass.run(&mut module));
        assert_eq!(*first_instruction(&module), division);
    }

    #[test]
    fn test_non_power_of_two_is_untouched() {
        let multiply = binary(BinOp::Mul, name("x"), int(6));
        let mut module = module_with(multiply.clone());

        let mut pass = StrengthReduction::new();
        assert!(!pass.run(&mut module));
        assert_eq!(*first_instruction(&module), multiply);
    }

    #[test]
    fn test_negative_constant_is_untouched() {
        let multiply = binary(BinOp::Mul, name("x"), int(-8));
        let mut module = module_with(multiply.clone());

        let mut pass = StrengthReduction::new();
        assert!(!pass.run(&mut module));
    }

    #[test]
    fn test_float_multiply_is_untouched() {
        let multiply = Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::F64,
            op: BinOp::Mul,
            left: name("x"),
            right: Value::Const(Constant::F64(8.0)),
        };
        let mut module = module_with(multiply.clone());

        let mut pass = StrengthReduction::new();
        assert!(!pass.run(&mut module));
    }

    #[test]
    fn test_reduced_form_is_stable() {
        let mut module = module_with(binary(BinOp::Mul, name("x"), int(8)));

        let mut pass = StrengthReduction::new();
        assert!(pass.run(&mut module));
        assert!(!pass.run(&mut module));
        assert_eq!(pass.modifications(), 1);
    }
}
