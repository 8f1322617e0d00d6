//! Constant folding
//!
//! Evaluates binary, unary, and compare instructions whose operands are all
//! compile-time constants, in the instruction's declared domain, and replaces
//! the instruction with a plain assignment of the result. Folding is
//! best-effort: a zero divisor, an overflowing integer result, or an operand
//! outside the declared domain leaves the instruction untouched.

use std::cmp::Ordering;

use crate::ir::{BinOp, CmpOp, Constant, Instruction, IrModule, IrType, UnOp, Value};

use super::Pass;

pub struct ConstantFolding {
    modifications: usize,
}

impl ConstantFolding {
    pub fn new() -> Self {
        Self { modifications: 0 }
    }
}

impl Default for ConstantFolding {
    fn default() -> Self {
        Self::new()
    }
}

impl Pass for ConstantFolding {
    fn name(&self) -> &str {
        "constant-folding"
    }

    fn run(&mut self, module: &mut IrModule) -> bool {
        let mut changed = false;
        for func in module.functions.iter_mut().filter(|f| !f.is_external) {
            for block in &mut func.blocks {
                for instruction in &mut block.instructions {
                    if let Some(folded) = fold(instruction) {
                        *instruction = folded;
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

/// The assignment that replaces `instruction`, when it folds.
fn fold(instruction: &Instruction) -> Option<Instruction> {
    match instruction {
        Instruction::Binary {
            dest,
            ty,
            op,
            left,
            right,
        } => {
            let value = fold_binary(*ty, *op, left.as_const()?, right.as_const()?)?;
            Some(Instruction::Assign {
                dest: dest.clone(),
                ty: *ty,
                value: Value::Const(value),
            })
        }
        Instruction::Unary {
            dest,
            ty,
            op,
            operand,
        } => {
            let value = fold_unary(*ty, *op, operand.as_const()?)?;
            Some(Instruction::Assign {
                dest: dest.clone(),
                ty: *ty,
                value: Value::Const(value),
            })
        }
        Instruction::Compare {
            dest,
            op,
            left,
            right,
        } => {
            let value = fold_compare(*op, left.as_const()?, right.as_const()?)?;
            Some(Instruction::Assign {
                dest: dest.clone(),
                ty: IrType::Bool,
                value: Value::Const(Constant::Bool(value)),
            })
        }
        _ => None,
    }
}

fn fold_binary(ty: IrType, op: BinOp, left: &Constant, right: &Constant) -> Option<Constant> {
    match ty {
        IrType::I32 => {
            let l = i32::try_from(left.as_int()?).ok()?;
            let r = i32::try_from(right.as_int()?).ok()?;
            fold_i32(op, l, r).map(Constant::I32)
        }
        IrType::I64 => {
            let l = left.as_int()?;
            let r = right.as_int()?;
            fold_i64(op, l, r).map(Constant::I64)
        }
        IrType::F32 => {
            let (Constant::F32(l), Constant::F32(r)) = (left, right) else {
                return None;
            };
            fold_float(op, f64::from(*l), f64::from(*r)).map(|v| Constant::F32(v as f32))
        }
        IrType::F64 => {
            let (Constant::F64(l), Constant::F64(r)) = (left, right) else {
                return None;
            };
            fold_float(op, *l, *r).map(Constant::F64)
        }
        IrType::Bool => {
            let (Constant::Bool(l), Constant::Bool(r)) = (left, right) else {
                return None;
            };
            let value = match op {
                BinOp::And => *l && *r,
                BinOp::Or => *l || *r,
                BinOp::Xor => *l ^ *r,
                _ => return None,
            };
            Some(Constant::Bool(value))
        }
        IrType::Str => {
            let (Constant::Str(l), Constant::Str(r)) = (left, right) else {
                return None;
            };
            match op {
                BinOp::Add => Some(Constant::Str(format!("{l}{r}"))),
                _ => None,
            }
        }
        IrType::Ptr | IrType::Void => None,
    }
}

fn fold_i32(op: BinOp, l: i32, r: i32) -> Option<i32> {
    match op {
        BinOp::Add => l.checked_add(r),
        BinOp::Sub => l.checked_sub(r),
        BinOp::Mul => l.checked_mul(r),
        BinOp::Div => (r != 0).then(|| l.checked_div(r)).flatten(),
        BinOp::Mod => (r != 0).then(|| l.checked_rem(r)).flatten(),
        BinOp::And => Some(l & r),
        BinOp::Or => Some(l | r),
        BinOp::Xor => Some(l ^ r),
        BinOp::Shl => l.checked_shl(u32::try_from(r).ok()?),
        BinOp::Shr => l.checked_shr(u32::try_from(r).ok()?),
    }
}

fn fold_i64(op: BinOp, l: i64, r: i64) -> Option<i64> {
    match op {
        BinOp::Add => l.checked_add(r),
        BinOp::Sub => l.checked_sub(r),
        BinOp::Mul => l.checked_mul(r),
        BinOp::Div => (r != 0).then(|| l.checked_div(r)).flatten(),
        BinOp::Mod => (r != 0).then(|| l.checked_rem(r)).flatten(),
        BinOp::And => Some(l & r),
        BinOp::Or => Some(l | r),
        BinOp::Xor => Some(l ^ r),
        BinOp::Shl => l.checked_shl(u32::try_from(r).ok()?),
        BinOp::Shr => l.checked_shr(u32::try_from(r).ok()?),
    }
}

fn fold_float(op: BinOp, l: f64, r: f64) -> Option<f64> {
    match op {
        BinOp::Add => Some(l + r),
        BinOp::Sub => Some(l - r),
        BinOp::Mul => Some(l * r),
        BinOp::Div => (r != 0.0).then(|| l / r),
        BinOp::Mod => (r != 0.0).then(|| l % r),
        _ => None,
    }
}

fn fold_unary(ty: IrType, op: UnOp, operand: &Constant) -> Option<Constant> {
    match (op, ty) {
        (UnOp::Neg, IrType::I32) => {
            let v = i32::try_from(operand.as_int()?).ok()?;
            v.checked_neg().map(Constant::I32)
        }
        (UnOp::Neg, IrType::I64) => operand.as_int()?.checked_neg().map(Constant::I64),
        (UnOp::Neg, IrType::F32) => match operand {
            Constant::F32(v) => Some(Constant::F32(-v)),
            _ => None,
        },
        (UnOp::Neg, IrType::F64) => match operand {
            Constant::F64(v) => Some(Constant::F64(-v)),
            _ => None,
        },
        (UnOp::Not, IrType::Bool) => match operand {
            Constant::Bool(v) => Some(Constant::Bool(!v)),
            _ => None,
        },
        (UnOp::Not, IrType::I32) => {
            let v = i32::try_from(operand.as_int()?).ok()?;
            Some(Constant::I32(!v))
        }
        (UnOp::Not, IrType::I64) => Some(Constant::I64(!operand.as_int()?)),
        _ => None,
    }
}

fn fold_compare(op: CmpOp, left: &Constant, right: &Constant) -> Option<bool> {
    let ordering = match (left, right) {
        (Constant::F32(l), Constant::F32(r)) => l.partial_cmp(r)?,
        (Constant::F64(l), Constant::F64(r)) => l.partial_cmp(r)?,
        (Constant::Str(l), Constant::Str(r)) => l.cmp(r),
        (Constant::Bool(l), Constant::Bool(r)) => l.cmp(r),
        _ => left.as_int()?.cmp(&right.as_int()?),
    };
    Some(match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::IrFunction;

    fn int(v: i32) -> Value {
        Value::Const(Constant::I32(v))
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
    fn test_folds_integer_multiply() {
        let mut module = module_with(vec![Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::I32,
            op: BinOp::Mul,
            left: int(4),
            right: int(2),
        }]);

        let mut pass = ConstantFolding::new();
        assert!(pass.run(&mut module));
        assert_eq!(pass.modifications(), 1);
        assert_eq!(
            *entry_instruction(&module, 0),
            Instruction::Assign {
                dest: "%t0".to_string(),
                ty: IrType::I32,
                value: int(8),
            }
        );
    }

    #[test]
    fn test_skips_zero_divisor() {
        let division = Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::I32,
            op: BinOp::Div,
            left: int(10),
            right: int(0),
        };
        let mut module = module_with(vec![division.clone()]);

        let mut pass = ConstantFolding::new();
        assert!(!pass.run(&mut module));
        assert_eq!(*entry_instruction(&module, 0), division);
    }

    #[test]
    fn test_skips_integer_overflow() {
        let overflow = Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::I32,
            op: BinOp::Add,
            left: int(i32::MAX),
            right: int(1),
        };
        let mut module = module_with(vec![overflow.clone()]);

        let mut pass = ConstantFolding::new();
        assert!(!pass.run(&mut module));
        assert_eq!(*entry_instruction(&module, 0), overflow);
    }

    #[test]
    fn test_skips_non_constant_operand() {
        let runtime = Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::I32,
            op: BinOp::Add,
            left: Value::Name("x".to_string()),
            right: int(1),
        };
        let mut module = module_with(vec![runtime.clone()]);

        let mut pass = ConstantFolding::new();
        assert!(!pass.run(&mut module));
        assert_eq!(*entry_instruction(&module, 0), runtime);
    }

    #[test]
    fn test_folds_string_concatenation() {
        let mut module = module_with(vec![Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::Str,
            op: BinOp::Add,
            left: Value::Const(Constant::Str("Hello, ".to_string())),
            right: Value::Const(Constant::Str("World".to_string())),
        }]);

        let mut pass = ConstantFolding::new();
        assert!(pass.run(&mut module));
        match entry_instruction(&module, 0) {
            Instruction::Assign { value, .. } => {
                assert_eq!(
                    *value,
                    Value::Const(Constant::Str("Hello, World".to_string()))
                );
            }
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn test_folds_boolean_logic() {
        let mut module = module_with(vec![Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::Bool,
            op: BinOp::And,
            left: Value::Const(Constant::Bool(true)),
            right: Value::Const(Constant::Bool(false)),
        }]);

        let mut pass = ConstantFolding::new();
        assert!(pass.run(&mut module));
        match entry_instruction(&module, 0) {
            Instruction::Assign { value, .. } => {
                assert_eq!(*value, Value::Const(Constant::Bool(false)));
            }
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn test_folds_comparison() {
        let mut module = module_with(vec![Instruction::Compare {
            dest: "%t0".to_string(),
            op: CmpOp::Lt,
            left: int(3),
            right: int(5),
        }]);

        let mut pass = ConstantFolding::new();
        assert!(pass.run(&mut module));
        assert_eq!(
            *entry_instruction(&module, 0),
            Instruction::Assign {
                dest: "%t0".to_string(),
                ty: IrType::Bool,
                value: Value::Const(Constant::Bool(true)),
            }
        );
    }

    #[test]
    fn test_folds_string_comparison() {
        let mut module = module_with(vec![Instruction::Compare {
            dest: "%t0".to_string(),
            op: CmpOp::Lt,
            left: Value::Const(Constant::Str("apple".to_string())),
            right: Value::Const(Constant::Str("banana".to_string())),
        }]);

        let mut pass = ConstantFolding::new();
        assert!(pass.run(&mut module));
        match entry_instruction(&module, 0) {
            Instruction::Assign { value, .. } => {
                assert_eq!(*value, Value::Const(Constant::Bool(true)));
            }
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn test_folds_float_arithmetic() {
        let mut module = module_with(vec![Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::F64,
            op: BinOp::Div,
            left: Value::Const(Constant::F64(7.0)),
            right: Value::Const(Constant::F64(2.0)),
        }]);

        let mut pass = ConstantFolding::new();
        assert!(pass.run(&mut module));
        match entry_instruction(&module, 0) {
            Instruction::Assign { value, .. } => {
                assert_eq!(*value, Value::Const(Constant::F64(3.5)));
            }
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn test_folds_unary_negation() {
        let mut module = module_with(vec![Instruction::Unary {
            dest: "%t0".to_string(),
            ty: IrType::I32,
            op: UnOp::Neg,
            operand: int(7),
        }]);

        let mut pass = ConstantFolding::new();
        assert!(pass.run(&mut module));
        match entry_instruction(&module, 0) {
            Instruction::Assign { value, .. } => {
                assert_eq!(*value, int(-7));
            }
            other => panic!("unexpected instruction: {other:?}"),
        }
    }

    #[test]
    fn test_second_run_is_quiet() {
        let mut module = module_with(vec![Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::I32,
            op: BinOp::Mul,
            left: int(4),
            right: int(2),
        }]);

        let mut pass = ConstantFolding::new();
        assert!(pass.run(&mut module));
        assert!(!pass.run(&mut module));
        assert_eq!(pass.modifications(), 1);
    }
}
