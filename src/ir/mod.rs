//! Control-flow-graph intermediate representation
//!
//! This module defines the IR that sits between the analyzed Basil AST and the
//! optimization pipeline. The IR is:
//!
//! - **Typed**: every value-producing instruction carries its result type
//! - **Block-structured**: each function owns an arena of basic blocks indexed
//!   by [`BlockId`]; predecessor and successor edges are ids into that arena,
//!   never pointers, so the cyclic CFG stays plain owned data
//! - **Name-based**: operands reference values by name; compiler temporaries
//!   use the `%t` prefix, user variables keep their lowercased source names
//!
//! ## Pipeline
//!
//! ```text
//! Basil source → AST → SemanticAnalyzer → lower → IrModule → OptimizationPipeline
//! ```

pub mod build;
pub mod cfg;
pub mod optimize;

use std::fmt;

/// Identifies a basic block within one function's block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

impl BlockId {
    /// Every function's designated entry block.
    pub const ENTRY: BlockId = BlockId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// IR value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    I32,
    I64,
    F32,
    F64,
    Bool,
    Str,
    Ptr,
    Void,
}

impl IrType {
    pub fn is_integer(self) -> bool {
        matches!(self, IrType::I32 | IrType::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, IrType::F32 | IrType::F64)
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IrType::I32 => "i32",
            IrType::I64 => "i64",
            IrType::F32 => "f32",
            IrType::F64 => "f64",
            IrType::Bool => "bool",
            IrType::Str => "str",
            IrType::Ptr => "ptr",
            IrType::Void => "void",
        };
        write!(f, "{name}")
    }
}

/// A compile-time constant in one of the IR's value domains.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(String),
}

impl Constant {
    pub fn ty(&self) -> IrType {
        match self {
            Constant::I32(_) => IrType::I32,
            Constant::I64(_) => IrType::I64,
            Constant::F32(_) => IrType::F32,
            Constant::F64(_) => IrType::F64,
            Constant::Bool(_) => IrType::Bool,
            Constant::Str(_) => IrType::Str,
        }
    }

    /// The integer value of an `I32`/`I64` constant, widened to `i64`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Constant::I32(v) => Some(i64::from(*v)),
            Constant::I64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::I32(v) => write!(f, "{v}"),
            Constant::I64(v) => write!(f, "{v}"),
            Constant::F32(v) => write!(f, "{v}"),
            Constant::F64(v) => write!(f, "{v}"),
            Constant::Bool(v) => write!(f, "{v}"),
            Constant::Str(v) => write!(f, "{v:?}"),
        }
    }
}

/// An instruction operand: a constant or a reference to a named value.
///
/// The same value may be read by many instructions; sharing is by name, not
/// aliased storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Const(Constant),
    Name(String),
}

impl Value {
    pub fn name(&self) -> Option<&str> {
        match self {
            Value::Name(n) => Some(n),
            Value::Const(_) => None,
        }
    }

    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            Value::Const(c) => Some(c),
            Value::Name(_) => None,
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self, Value::Const(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Const(c) => write!(f, "{c}"),
            Value::Name(n) => write!(f, "{n}"),
        }
    }
}

/// Whether a value name is a compiler temporary rather than a user variable.
pub fn is_temp(name: &str) -> bool {
    name.starts_with("%t")
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Mod => "mod",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
        };
        write!(f, "{name}")
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Neg => write!(f, "neg"),
            UnOp::Not => write!(f, "not"),
        }
    }
}

/// Comparison operators. The result is always `Bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
        };
        write!(f, "{name}")
    }
}

/// A single IR instruction.
///
/// Value-producing variants name their destination and carry a result type.
/// Control transfers (`Jump`, `Branch`, `Switch`, `Return`) terminate a block;
/// a well-formed block has exactly one terminator, in final position.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `dest = op left, right` evaluated in the declared domain `ty`.
    Binary {
        dest: String,
        ty: IrType,
        op: BinOp,
        left: Value,
        right: Value,
    },
    Unary {
        dest: String,
        ty: IrType,
        op: UnOp,
        operand: Value,
    },
    /// The operand domain comes from the values themselves.
    Compare {
        dest: String,
        op: CmpOp,
        left: Value,
        right: Value,
    },
    /// Plain copy of a value into a name.
    Assign {
        dest: String,
        ty: IrType,
        value: Value,
    },
    Load {
        dest: String,
        ty: IrType,
        addr: Value,
    },
    Store {
        addr: Value,
        value: Value,
    },
    Call {
        dest: Option<String>,
        ty: IrType,
        func: String,
        args: Vec<Value>,
    },
    Return {
        value: Option<Value>,
    },
    Jump {
        target: BlockId,
    },
    Branch {
        condition: Value,
        positive: BlockId,
        negative: BlockId,
    },
    Switch {
        value: Value,
        cases: Vec<(Constant, BlockId)>,
        default: BlockId,
    },
    Phi {
        dest: String,
        ty: IrType,
        incoming: Vec<(Value, BlockId)>,
    },
    /// Reserve a stack slot; `dest` holds its address.
    Alloca {
        dest: String,
        ty: IrType,
    },
    /// `dest = base[index]` element address computation.
    GetElement {
        dest: String,
        ty: IrType,
        base: Value,
        index: Value,
    },
    Cast {
        dest: String,
        ty: IrType,
        value: Value,
    },
    /// Position marker carried over from linear lowering. No effect.
    Label(String),
    /// Lowering note for constructs outside the procedural subset. No effect.
    Comment(String),
    /// Allocate an array of `size` elements; `dest` holds its address.
    ArrayAlloc {
        dest: String,
        element: IrType,
        size: Value,
    },
    ArrayStore {
        array: Value,
        index: Value,
        value: Value,
    },
}

impl Instruction {
    /// The name this instruction defines, if it produces a value.
    pub fn dest(&self) -> Option<&str> {
        match self {
            Instruction::Binary { dest, .. }
            | Instruction::Unary { dest, .. }
            | Instruction::Compare { dest, .. }
            | Instruction::Assign { dest, .. }
            | Instruction::Load { dest, .. }
            | Instruction::Phi { dest, .. }
            | Instruction::Alloca { dest, .. }
            | Instruction::GetElement { dest, .. }
            | Instruction::Cast { dest, .. }
            | Instruction::ArrayAlloc { dest, .. } => Some(dest),
            Instruction::Call { dest, .. } => dest.as_deref(),
            _ => None,
        }
    }

    /// True for control transfers that end a block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Return { .. }
                | Instruction::Jump { .. }
                | Instruction::Branch { .. }
                | Instruction::Switch { .. }
        )
    }

    /// True when the instruction only produces a value and deleting it cannot
    /// change observable behavior. Calls and stores are never pure.
    pub fn is_pure(&self) -> bool {
        matches!(
            self,
            Instruction::Binary { .. }
                | Instruction::Unary { .. }
                | Instruction::Compare { .. }
                | Instruction::Assign { .. }
                | Instruction::Load { .. }
                | Instruction::Phi { .. }
                | Instruction::Alloca { .. }
                | Instruction::GetElement { .. }
                | Instruction::Cast { .. }
                | Instruction::ArrayAlloc { .. }
        )
    }

    /// Blocks this instruction can transfer control to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instruction::Jump { target } => vec![*target],
            Instruction::Branch {
                positive, negative, ..
            } => vec![*positive, *negative],
            Instruction::Switch { cases, default, .. } => {
                let mut out: Vec<BlockId> = cases.iter().map(|(_, b)| *b).collect();
                out.push(*default);
                out
            }
            _ => Vec::new(),
        }
    }

    /// Visit every operand value, in operand order.
    pub fn for_each_value(&self, mut f: impl FnMut(&Value)) {
        match self {
            Instruction::Binary { left, right, .. } | Instruction::Compare { left, right, .. } => {
                f(left);
                f(right);
            }
            Instruction::Unary { operand, .. } => f(operand),
            Instruction::Assign { value, .. } | Instruction::Cast { value, .. } => f(value),
            Instruction::Load { addr, .. } => f(addr),
            Instruction::Store { addr, value } => {
                f(addr);
                f(value);
            }
            Instruction::Call { args, .. } => {
                for arg in args {
                    f(arg);
                }
            }
            Instruction::Return { value } => {
                if let Some(v) = value {
                    f(v);
                }
            }
            Instruction::Branch { condition, .. } => f(condition),
            Instruction::Switch { value, .. } => f(value),
            Instruction::Phi { incoming, .. } => {
                for (v, _) in incoming {
                    f(v);
                }
            }
            Instruction::GetElement { base, index, .. } => {
                f(base);
                f(index);
            }
            Instruction::ArrayAlloc { size, .. } => f(size),
            Instruction::ArrayStore {
                array,
                index,
                value,
            } => {
                f(array);
                f(index);
                f(value);
            }
            Instruction::Jump { .. }
            | Instruction::Alloca { .. }
            | Instruction::Label(_)
            | Instruction::Comment(_) => {}
        }
    }

    /// Visit every operand value mutably, in operand order.
    pub fn for_each_value_mut(&mut self, mut f: impl FnMut(&mut Value)) {
        match self {
            Instruction::Binary { left, right, .. } | Instruction::Compare { left, right, .. } => {
                f(left);
                f(right);
            }
            Instruction::Unary { operand, .. } => f(operand),
            Instruction::Assign { value, .. } | Instruction::Cast { value, .. } => f(value),
            Instruction::Load { addr, .. } => f(addr),
            Instruction::Store { addr, value } => {
                f(addr);
                f(value);
            }
            Instruction::Call { args, .. } => {
                for arg in args {
                    f(arg);
                }
            }
            Instruction::Return { value } => {
                if let Some(v) = value {
                    f(v);
                }
            }
            Instruction::Branch { condition, .. } => f(condition),
            Instruction::Switch { value, .. } => f(value),
            Instruction::Phi { incoming, .. } => {
                for (v, _) in incoming {
                    f(v);
                }
            }
            Instruction::GetElement { base, index, .. } => {
                f(base);
                f(index);
            }
            Instruction::ArrayAlloc { size, .. } => f(size),
            Instruction::ArrayStore {
                array,
                index,
                value,
            } => {
                f(array);
                f(index);
                f(value);
            }
            Instruction::Jump { .. }
            | Instruction::Alloca { .. }
            | Instruction::Label(_)
            | Instruction::Comment(_) => {}
        }
    }

    /// Replace every operand reference to `from` with `to`. Destinations are
    /// untouched.
    pub fn replace_uses(&mut self, from: &str, to: &Value) {
        self.for_each_value_mut(|v| {
            if v.name() == Some(from) {
                *v = to.clone();
            }
        });
    }

    /// Collect the names this instruction reads.
    pub fn used_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.for_each_value(|v| {
            if let Value::Name(n) = v {
                names.push(n.clone());
            }
        });
        names
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Binary {
                dest,
                ty,
                op,
                left,
                right,
            } => write!(f, "{dest} = {op} {ty} {left}, {right}"),
            Instruction::Unary {
                dest, ty, op, operand,
            } => write!(f, "{dest} = {op} {ty} {operand}"),
            Instruction::Compare {
                dest,
                op,
                left,
                right,
            } => write!(f, "{dest} = cmp {op} {left}, {right}"),
            Instruction::Assign { dest, value, .. } => write!(f, "{dest} = {value}"),
            Instruction::Load { dest, ty, addr } => write!(f, "{dest} = load {ty} {addr}"),
            Instruction::Store { addr, value } => write!(f, "store {addr} <- {value}"),
            Instruction::Call {
                dest, func, args, ..
            } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} = ")?;
                }
                write!(f, "call {func}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Instruction::Return { value: Some(value) } => write!(f, "ret {value}"),
            Instruction::Return { value: None } => write!(f, "ret"),
            Instruction::Jump { target } => write!(f, "jmp {target}"),
            Instruction::Branch {
                condition,
                positive,
                negative,
            } => write!(f, "br {condition}, {positive}, {negative}"),
            Instruction::Switch {
                value,
                cases,
                default,
            } => {
                write!(f, "switch {value} [")?;
                for (i, (c, b)) in cases.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c} -> {b}")?;
                }
                write!(f, "] else {default}")
            }
            Instruction::Phi { dest, incoming, .. } => {
                write!(f, "{dest} = phi (")?;
                for (i, (v, b)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{b} -> {v}")?;
                }
                write!(f, ")")
            }
            Instruction::Alloca { dest, ty } => write!(f, "{dest} = alloca {ty}"),
            Instruction::GetElement {
                dest,
                ty,
                base,
                index,
            } => write!(f, "{dest} = elem {ty} {base}[{index}]"),
            Instruction::Cast { dest, ty, value } => write!(f, "{dest} = cast {ty} {value}"),
            Instruction::Label(name) => write!(f, "{name}:"),
            Instruction::Comment(text) => write!(f, "; {text}"),
            Instruction::ArrayAlloc {
                dest,
                element,
                size,
            } => write!(f, "{dest} = array_alloc {element}[{size}]"),
            Instruction::ArrayStore {
                array,
                index,
                value,
            } => write!(f, "array_store {array}[{index}] <- {value}"),
        }
    }
}

/// A basic block: a straight-line instruction sequence ending in a terminator.
///
/// Predecessors are maintained alongside the successor edges derived from the
/// terminator; [`cfg::repair_edges`] rebuilds both after structural changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
}

impl Block {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
        }
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// The block's final control transfer, when present.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator().is_some()
    }
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: IrType,
}

/// An IR function: a named CFG over the block arena.
#[derive(Debug, Clone)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<Param>,
    /// Names of user variables declared in the body.
    pub locals: Vec<String>,
    pub return_type: IrType,
    /// Block arena; [`BlockId`]s index into it.
    pub blocks: Vec<Block>,
    pub entry: BlockId,
    /// External functions have no body and are skipped by every pass.
    pub is_external: bool,
}

impl IrFunction {
    /// A new function with an empty `entry` block.
    pub fn new(name: impl Into<String>, return_type: IrType) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            locals: Vec::new(),
            return_type,
            blocks: vec![Block::new("entry")],
            entry: BlockId::ENTRY,
            is_external: false,
        }
    }

    /// A body-less declaration for a callee defined elsewhere.
    pub fn external(name: impl Into<String>, params: Vec<Param>, return_type: IrType) -> Self {
        Self {
            name: name.into(),
            params,
            locals: Vec::new(),
            return_type,
            blocks: Vec::new(),
            entry: BlockId::ENTRY,
            is_external: true,
        }
    }

    /// Append a fresh empty block and return its id.
    pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block::new(label));
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + use<> {
        (0..self.blocks.len()).map(BlockId)
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_external {
            write!(f, "extern fn {}(", self.name)?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}: {}", p.name, p.ty)?;
            }
            return writeln!(f, ") -> {}", self.return_type);
        }

        write!(f, "fn {}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", p.name, p.ty)?;
        }
        writeln!(f, ") -> {} {{", self.return_type)?;
        for (i, block) in self.blocks.iter().enumerate() {
            writeln!(f, "b{} ({}):", i, block.label)?;
            for instruction in &block.instructions {
                writeln!(f, "  {instruction}")?;
            }
        }
        writeln!(f, "}}")
    }
}

/// A complete IR module: one per compiled source file.
#[derive(Debug, Clone, Default)]
pub struct IrModule {
    pub name: String,
    pub functions: Vec<IrFunction>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&IrFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Value {
        Value::Name(n.to_string())
    }

    fn int(v: i32) -> Value {
        Value::Const(Constant::I32(v))
    }

    #[test]
    fn test_temp_prefix_detection() {
        assert!(is_temp("%t0"));
        assert!(is_temp("%t17"));
        assert!(!is_temp("x"));
        assert!(!is_temp("total"));
    }

    #[test]
    fn test_dest_classification() {
        let binary = Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::I32,
            op: BinOp::Add,
            left: int(1),
            right: int(2),
        };
        assert_eq!(binary.dest(), Some("%t0"));
        assert!(binary.is_pure());
        assert!(!binary.is_terminator());

        let call = Instruction::Call {
            dest: None,
            ty: IrType::Void,
            func: "print".to_string(),
            args: vec![name("x")],
        };
        assert_eq!(call.dest(), None);
        assert!(!call.is_pure());

        let ret = Instruction::Return { value: None };
        assert_eq!(ret.dest(), None);
        assert!(ret.is_terminator());
        assert!(!ret.is_pure());
    }

    #[test]
    fn test_successor_derivation() {
        let jump = Instruction::Jump { target: BlockId(3) };
        assert_eq!(jump.successors(), vec![BlockId(3)]);

        let branch = Instruction::Branch {
            condition: name("%t0"),
            positive: BlockId(1),
            negative: BlockId(2),
        };
        assert_eq!(branch.successors(), vec![BlockId(1), BlockId(2)]);

        let switch = Instruction::Switch {
            value: name("x"),
            cases: vec![(Constant::I32(1), BlockId(4)), (Constant::I32(2), BlockId(5))],
            default: BlockId(6),
        };
        assert_eq!(
            switch.successors(),
            vec![BlockId(4), BlockId(5), BlockId(6)]
        );

        assert!(Instruction::Return { value: None }.successors().is_empty());
    }

    #[test]
    fn test_replace_uses_leaves_dest_alone() {
        let mut instr = Instruction::Binary {
            dest: "x".to_string(),
            ty: IrType::I32,
            op: BinOp::Add,
            left: name("x"),
            right: name("y"),
        };
        instr.replace_uses("x", &int(7));
        match &instr {
            Instruction::Binary { dest, left, .. } => {
                assert_eq!(dest, "x");
                assert_eq!(*left, int(7));
            }
            other => panic!("unexpected rewrite: {other:?}"),
        }
    }

    #[test]
    fn test_used_names_covers_call_args() {
        let call = Instruction::Call {
            dest: Some("%t1".to_string()),
            ty: IrType::I32,
            func: "len".to_string(),
            args: vec![name("s"), int(0), name("n")],
        };
        assert_eq!(call.used_names(), vec!["s".to_string(), "n".to_string()]);
    }

    #[test]
    fn test_block_terminator() {
        let mut block = Block::new("entry");
        assert!(!block.is_terminated());
        block.push(Instruction::Assign {
            dest: "x".to_string(),
            ty: IrType::I32,
            value: int(5),
        });
        assert!(!block.is_terminated());
        block.push(Instruction::Return { value: None });
        assert!(block.is_terminated());
    }

    #[test]
    fn test_function_display_shape() {
        let mut func = IrFunction::new("__main", IrType::Void);
        let entry = func.entry;
        func.block_mut(entry).push(Instruction::Assign {
            dest: "x".to_string(),
            ty: IrType::I32,
            value: int(5),
        });
        func.block_mut(entry).push(Instruction::Return { value: None });

        let text = func.to_string();
        assert!(text.contains("fn __main() -> void {"));
        assert!(text.contains("b0 (entry):"));
        assert!(text.contains("  x = 5"));
        assert!(text.contains("  ret"));
    }

    #[test]
    fn test_instruction_display() {
        let fold = Instruction::Binary {
            dest: "%t0".to_string(),
            ty: IrType::I32,
            op: BinOp::Mul,
            left: int(4),
            right: int(2),
        };
        assert_eq!(fold.to_string(), "%t0 = mul i32 4, 2");

        let branch = Instruction::Branch {
            condition: name("%t1"),
            positive: BlockId(1),
            negative: BlockId(2),
        };
        assert_eq!(branch.to_string(), "br %t1, b1, b2");

        let concat = Instruction::Binary {
            dest: "%t2".to_string(),
            ty: IrType::Str,
            op: BinOp::Add,
            left: Value::Const(Constant::Str("a".to_string())),
            right: Value::Const(Constant::Str("b".to_string())),
        };
        assert_eq!(concat.to_string(), "%t2 = add str \"a\", \"b\"");
    }
}
