//! AST to IR lowering
//!
//! Lowers the procedural subset of an analyzed program: top-level `Function`
//! and `Sub` declarations (including those directly inside `Module` blocks)
//! become IR functions, and executable top-level statements collect into a
//! synthetic `__main` function. Lowering never fails; it runs only after
//! analysis reports zero errors.
//!
//! ## Notes
//!
//! - Constructs outside the subset (classes, queries, `Try`, `With`, ...) are
//!   skipped with a `Comment` marker so the omission stays visible in dumps.
//! - `AndAlso` and `OrElse` lower as strict boolean ops.
//! - `For` bounds are evaluated once, before the loop, and pinned to temps.

use tracing::debug;

use super::cfg;
use super::{
    BinOp, BlockId, CmpOp, Constant, Instruction, IrFunction, IrModule, IrType, Param, UnOp, Value,
};
use crate::frontend::analyzer::SemanticAnalyzer;
use crate::frontend::ast::{
    AssignOp, AssignStmt, BinaryExpr, BinaryOp, Block as AstBlock, CallExpr, CallableDecl,
    ConstDecl, Decl, DoLoopStmt, ExitKind, Expr, ForStmt, IfStmt, Located, NodeId, Program, Stmt,
    UnaryExpr, UnaryOp, VarDecl, WhileStmt,
};
use crate::frontend::types::Type;

/// Lower an analyzed program into an IR module.
#[tracing::instrument(skip_all)]
pub fn lower(program: &Program, analysis: &SemanticAnalyzer) -> IrModule {
    let mut module = IrModule::new("main");
    let mut main = Lowering::new(IrFunction::new("__main", IrType::Void), analysis);

    for decl in &program.body {
        match &decl.node {
            Decl::Function(f) | Decl::Sub(f) => {
                lower_callable(&mut module, f, decl.id, analysis);
            }
            Decl::Module(m) => {
                for member in &m.body {
                    match &member.node {
                        Decl::Function(f) | Decl::Sub(f) => {
                            lower_callable(&mut module, f, member.id, analysis);
                        }
                        other => main.comment(skip_note(other)),
                    }
                }
            }
            Decl::Variable(v) => main.lower_dim(v, decl.id),
            Decl::Constant(c) => main.lower_const(c, decl.id),
            Decl::Statement(stmt) => main.lower_stmt(stmt),
            other => main.comment(skip_note(other)),
        }
    }

    module.functions.insert(0, main.finish());
    debug!(functions = module.functions.len(), "lowered module");
    module
}

fn lower_callable(
    module: &mut IrModule,
    decl: &CallableDecl,
    id: NodeId,
    analysis: &SemanticAnalyzer,
) {
    // MustOverride methods and interface signatures have no body to lower.
    let Some(body) = &decl.body else { return };

    let mut func = IrFunction::new(decl.name.to_lowercase(), IrType::Void);
    if let Some(sig) = analysis.node_symbol(id).and_then(|s| s.kind.signature()) {
        func.params = sig
            .params
            .iter()
            .map(|p| Param {
                name: p.name.to_lowercase(),
                ty: ir_type_of(&p.ty),
            })
            .collect();
        func.return_type = ir_type_of(&sig.return_type);
    }

    let mut lowering = Lowering::new(func, analysis);
    lowering.lower_block(body);
    module.functions.push(lowering.finish());
}

fn skip_note(decl: &Decl) -> String {
    match decl {
        Decl::Namespace(d) => format!("skipped Namespace '{}'", d.name),
        Decl::Module(d) => format!("skipped Module '{}'", d.name),
        Decl::Class(d) => format!("skipped Class '{}'", d.name),
        Decl::Interface(d) => format!("skipped Interface '{}'", d.name),
        Decl::Structure(d) => format!("skipped Structure '{}'", d.name),
        Decl::Enum(d) => format!("skipped Enum '{}'", d.name),
        Decl::Function(d) => format!("skipped Function '{}'", d.name),
        Decl::Sub(d) => format!("skipped Sub '{}'", d.name),
        Decl::Variable(d) => format!("skipped member '{}'", d.name),
        Decl::Constant(d) => format!("skipped member '{}'", d.name),
        Decl::Statement(_) => "skipped statement".to_string(),
    }
}

/// Map a frontend type onto the IR's value domains. Reference types, arrays,
/// and everything else without a scalar representation live behind `Ptr`.
fn ir_type_of(ty: &Type) -> IrType {
    if ty.is_void() {
        return IrType::Void;
    }
    if ty.is_array() || ty.is_pointer {
        return IrType::Ptr;
    }
    match ty.name.to_ascii_lowercase().as_str() {
        "integer" | "byte" => IrType::I32,
        "long" => IrType::I64,
        "single" => IrType::F32,
        "double" => IrType::F64,
        "boolean" => IrType::Bool,
        "string" | "char" => IrType::Str,
        _ => IrType::Ptr,
    }
}

fn int_constant(v: i64) -> Constant {
    match i32::try_from(v) {
        Ok(v) => Constant::I32(v),
        Err(_) => Constant::I64(v),
    }
}

fn one(ty: IrType) -> Constant {
    match ty {
        IrType::I64 => Constant::I64(1),
        IrType::F32 => Constant::F32(1.0),
        IrType::F64 => Constant::F64(1.0),
        _ => Constant::I32(1),
    }
}

/// Numeric promotion over IR domains, widest wins.
fn wider(a: IrType, b: IrType) -> IrType {
    use IrType::*;
    match (a, b) {
        (F64, _) | (_, F64) => F64,
        (F32, _) | (_, F32) => F32,
        (I64, _) | (_, I64) => I64,
        (I32, _) | (_, I32) => I32,
        _ => a,
    }
}

fn default_return(ty: IrType) -> Option<Value> {
    let constant = match ty {
        IrType::I32 => Constant::I32(0),
        IrType::I64 => Constant::I64(0),
        IrType::F32 => Constant::F32(0.0),
        IrType::F64 => Constant::F64(0.0),
        IrType::Bool => Constant::Bool(false),
        IrType::Str => Constant::Str(String::new()),
        IrType::Ptr | IrType::Void => return None,
    };
    Some(Value::Const(constant))
}

fn assign_bin_op(op: AssignOp) -> Option<BinOp> {
    match op {
        AssignOp::Set => None,
        AssignOp::Add => Some(BinOp::Add),
        AssignOp::Sub => Some(BinOp::Sub),
        AssignOp::Mul => Some(BinOp::Mul),
        AssignOp::Div => Some(BinOp::Div),
        AssignOp::Concat => Some(BinOp::Add),
    }
}

enum LoweredOp {
    Bin(BinOp),
    Cmp(CmpOp),
}

fn lowered_op(op: BinaryOp) -> LoweredOp {
    match op {
        BinaryOp::Add | BinaryOp::Concat => LoweredOp::Bin(BinOp::Add),
        BinaryOp::Sub => LoweredOp::Bin(BinOp::Sub),
        BinaryOp::Mul => LoweredOp::Bin(BinOp::Mul),
        BinaryOp::Div | BinaryOp::IntDiv => LoweredOp::Bin(BinOp::Div),
        BinaryOp::Mod => LoweredOp::Bin(BinOp::Mod),
        BinaryOp::And | BinaryOp::AndAlso => LoweredOp::Bin(BinOp::And),
        BinaryOp::Or | BinaryOp::OrElse => LoweredOp::Bin(BinOp::Or),
        BinaryOp::Eq => LoweredOp::Cmp(CmpOp::Eq),
        BinaryOp::Ne => LoweredOp::Cmp(CmpOp::Ne),
        BinaryOp::Lt => LoweredOp::Cmp(CmpOp::Lt),
        BinaryOp::Le => LoweredOp::Cmp(CmpOp::Le),
        BinaryOp::Gt => LoweredOp::Cmp(CmpOp::Gt),
        BinaryOp::Ge => LoweredOp::Cmp(CmpOp::Ge),
    }
}

fn step_is_negative(step: &Value) -> bool {
    match step.as_const() {
        Some(Constant::I32(v)) => *v < 0,
        Some(Constant::I64(v)) => *v < 0,
        Some(Constant::F32(v)) => *v < 0.0,
        Some(Constant::F64(v)) => *v < 0.0,
        _ => false,
    }
}

/// Per-function lowering state: the function under construction, the block
/// the next instruction lands in, and the temp counter.
struct Lowering<'a> {
    func: IrFunction,
    current: BlockId,
    temps: usize,
    analysis: &'a SemanticAnalyzer,
    /// Exit-jump targets for enclosing loops, innermost last.
    exits: Vec<(ExitKind, BlockId)>,
}

impl<'a> Lowering<'a> {
    fn new(func: IrFunction, analysis: &'a SemanticAnalyzer) -> Self {
        let current = func.entry;
        Self {
            func,
            current,
            temps: 0,
            analysis,
            exits: Vec::new(),
        }
    }

    /// Terminate every open block and derive the CFG edges.
    fn finish(mut self) -> IrFunction {
        let default = default_return(self.func.return_type);
        for block in &mut self.func.blocks {
            if !block.is_terminated() {
                block.instructions.push(Instruction::Return {
                    value: default.clone(),
                });
            }
        }
        cfg::repair_edges(&mut self.func);
        self.func
    }

    fn fresh_temp(&mut self) -> String {
        let name = format!("%t{}", self.temps);
        self.temps += 1;
        name
    }

    fn emit(&mut self, instruction: Instruction) {
        if self.func.block(self.current).is_terminated() {
            // Code after a terminator lands in a fresh block that nothing
            // jumps to; dead code elimination removes it.
            self.current = self.func.add_block("unreachable");
        }
        self.func.block_mut(self.current).push(instruction);
    }

    fn comment(&mut self, text: impl Into<String>) {
        self.emit(Instruction::Comment(text.into()));
    }

    /// Emit a terminator unless the block already has one.
    fn terminate(&mut self, instruction: Instruction) {
        if !self.func.block(self.current).is_terminated() {
            self.func.block_mut(self.current).push(instruction);
        }
    }

    fn jump_to(&mut self, target: BlockId) {
        self.terminate(Instruction::Jump { target });
    }

    fn start_block(&mut self, id: BlockId) {
        self.current = id;
    }

    fn node_ty(&self, id: NodeId) -> IrType {
        self.analysis
            .node_type(id)
            .map(ir_type_of)
            .unwrap_or(IrType::Ptr)
    }

    /// The declared symbol's type when analysis recorded one, else the
    /// initializer's type.
    fn declared_ty(&self, decl_id: NodeId, init_id: NodeId) -> IrType {
        match self.analysis.node_symbol(decl_id) {
            Some(symbol) => ir_type_of(&symbol.ty),
            None => self.node_ty(init_id),
        }
    }

    fn add_local(&mut self, name: &str) {
        if !self.func.locals.iter().any(|l| l == name) {
            self.func.locals.push(name.to_string());
        }
    }

    fn lower_block(&mut self, block: &AstBlock) {
        for stmt in &block.statements {
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: &Located<Stmt>) {
        match &stmt.node {
            Stmt::Variable(v) => self.lower_dim(v, stmt.id),
            Stmt::Constant(c) => self.lower_const(c, stmt.id),
            Stmt::Assign(a) => self.lower_assign(a),
            Stmt::Expression(e) => self.lower_expr_stmt(e),
            Stmt::If(i) => self.lower_if(i),
            Stmt::While(w) => self.lower_while(w),
            Stmt::DoLoop(d) => self.lower_do(d),
            Stmt::For(f) => self.lower_for(f),
            Stmt::Return(value) => self.lower_return(value.as_ref()),
            Stmt::Exit(kind) => self.lower_exit(*kind),
            Stmt::Select(_) => self.comment("skipped Select Case statement"),
            Stmt::ForEach(_) => self.comment("skipped For Each statement"),
            Stmt::Try(_) => self.comment("skipped Try statement"),
            Stmt::With(_) => self.comment("skipped With statement"),
            Stmt::Throw(_) => self.comment("skipped Throw statement"),
        }
    }

    fn lower_dim(&mut self, v: &VarDecl, id: NodeId) {
        let name = v.name.to_lowercase();
        self.add_local(&name);
        let Some(init) = &v.init else { return };
        let value = self.lower_expr(init);
        let ty = self.declared_ty(id, init.id);
        self.emit(Instruction::Assign {
            dest: name,
            ty,
            value,
        });
    }

    fn lower_const(&mut self, c: &ConstDecl, id: NodeId) {
        let name = c.name.to_lowercase();
        self.add_local(&name);
        let value = self.lower_expr(&c.value);
        let ty = self.declared_ty(id, c.value.id);
        self.emit(Instruction::Assign {
            dest: name,
            ty,
            value,
        });
    }

    fn lower_assign(&mut self, a: &AssignStmt) {
        let Expr::Identifier(name) = &a.target.node else {
            self.comment("skipped assignment to a non-variable target");
            return;
        };
        let dest = name.to_lowercase();
        let ty = self.node_ty(a.target.id);
        let value = self.lower_expr(&a.value);
        match assign_bin_op(a.op) {
            None => self.emit(Instruction::Assign { dest, ty, value }),
            Some(op) => {
                let left = Value::Name(dest.clone());
                self.emit(Instruction::Binary {
                    dest,
                    ty,
                    op,
                    left,
                    right: value,
                });
            }
        }
    }

    fn lower_expr_stmt(&mut self, e: &Located<Expr>) {
        if let Expr::Call(call) = &e.node {
            if let Expr::Identifier(name) = &call.callee.node {
                let args = call.args.iter().map(|a| self.lower_expr(a)).collect();
                let ty = self.node_ty(e.id);
                let dest = (ty != IrType::Void).then(|| self.fresh_temp());
                self.emit(Instruction::Call {
                    dest,
                    ty,
                    func: name.to_lowercase(),
                    args,
                });
                return;
            }
        }
        self.lower_expr(e);
    }

    fn lower_if(&mut self, i: &IfStmt) {
        let end = self.func.add_block("if.end");
        let mut arms: Vec<(&Located<Expr>, &AstBlock)> = vec![(&i.cond, &i.then_block)];
        for else_if in &i.else_ifs {
            arms.push((&else_if.cond, &else_if.block));
        }

        let last = arms.len() - 1;
        for (n, (cond, block)) in arms.into_iter().enumerate() {
            let condition = self.lower_expr(cond);
            let then_id = self.func.add_block("if.then");
            let else_id = if n < last {
                self.func.add_block("if.elseif")
            } else if i.else_block.is_some() {
                self.func.add_block("if.else")
            } else {
                end
            };
            self.terminate(Instruction::Branch {
                condition,
                positive: then_id,
                negative: else_id,
            });
            self.start_block(then_id);
            self.lower_block(block);
            self.jump_to(end);
            self.start_block(else_id);
        }
        if let Some(else_block) = &i.else_block {
            self.lower_block(else_block);
            self.jump_to(end);
            self.start_block(end);
        }
    }

    fn lower_while(&mut self, w: &WhileStmt) {
        let head = self.func.add_block("while.head");
        let body = self.func.add_block("while.body");
        let end = self.func.add_block("while.end");

        self.jump_to(head);
        self.start_block(head);
        let condition = self.lower_expr(&w.cond);
        self.terminate(Instruction::Branch {
            condition,
            positive: body,
            negative: end,
        });

        self.exits.push((ExitKind::While, end));
        self.start_block(body);
        self.lower_block(&w.body);
        self.jump_to(head);
        self.exits.pop();

        self.start_block(end);
    }

    fn lower_do(&mut self, d: &DoLoopStmt) {
        let body = self.func.add_block("do.body");
        let end = self.func.add_block("do.end");
        self.exits.push((ExitKind::Do, end));

        match &d.cond {
            Some(cond) if !d.post_test => {
                let head = self.func.add_block("do.head");
                self.jump_to(head);
                self.start_block(head);
                let condition = self.lower_expr(cond);
                // `Until` loops run while the condition is false.
                let (positive, negative) = if d.until { (end, body) } else { (body, end) };
                self.terminate(Instruction::Branch {
                    condition,
                    positive,
                    negative,
                });
                self.start_block(body);
                self.lower_block(&d.body);
                self.jump_to(head);
            }
            Some(cond) => {
                // Post-test: the body runs at least once, the test sits at
                // the bottom.
                self.jump_to(body);
                self.start_block(body);
                self.lower_block(&d.body);
                let condition = self.lower_expr(cond);
                let (positive, negative) = if d.until { (end, body) } else { (body, end) };
                self.terminate(Instruction::Branch {
                    condition,
                    positive,
                    negative,
                });
            }
            None => {
                // Bare Do; only Exit Do leaves.
                self.jump_to(body);
                self.start_block(body);
                self.lower_block(&d.body);
                self.jump_to(body);
            }
        }

        self.exits.pop();
        self.start_block(end);
    }

    fn lower_for(&mut self, f: &ForStmt) {
        let var = f.var.to_lowercase();
        self.add_local(&var);
        let ty = wider(self.node_ty(f.from.id), self.node_ty(f.to.id));

        let from = self.lower_expr(&f.from);
        self.emit(Instruction::Assign {
            dest: var.clone(),
            ty,
            value: from,
        });
        let to = self.lower_expr(&f.to);
        let to = self.pin(to, ty);
        let step = match &f.step {
            Some(step) => {
                let step = self.lower_expr(step);
                self.pin(step, ty)
            }
            None => Value::Const(one(ty)),
        };

        let head = self.func.add_block("for.head");
        let body = self.func.add_block("for.body");
        let step_block = self.func.add_block("for.step");
        let end = self.func.add_block("for.end");

        self.jump_to(head);
        self.start_block(head);
        let test = self.fresh_temp();
        let op = if step_is_negative(&step) {
            CmpOp::Ge
        } else {
            CmpOp::Le
        };
        self.emit(Instruction::Compare {
            dest: test.clone(),
            op,
            left: Value::Name(var.clone()),
            right: to,
        });
        self.terminate(Instruction::Branch {
            condition: Value::Name(test),
            positive: body,
            negative: end,
        });

        self.exits.push((ExitKind::For, end));
        self.start_block(body);
        self.lower_block(&f.body);
        self.jump_to(step_block);
        self.exits.pop();

        self.start_block(step_block);
        self.emit(Instruction::Binary {
            dest: var.clone(),
            ty,
            op: BinOp::Add,
            left: Value::Name(var),
            right: step,
        });
        self.jump_to(head);

        self.start_block(end);
    }

    /// Copy a loop bound into a temp so later writes to its source variable
    /// cannot change it.
    fn pin(&mut self, value: Value, ty: IrType) -> Value {
        if value.is_const() {
            return value;
        }
        let temp = self.fresh_temp();
        self.emit(Instruction::Assign {
            dest: temp.clone(),
            ty,
            value,
        });
        Value::Name(temp)
    }

    fn lower_return(&mut self, value: Option<&Located<Expr>>) {
        let value = value.map(|v| self.lower_expr(v));
        self.terminate(Instruction::Return { value });
    }

    fn lower_exit(&mut self, kind: ExitKind) {
        match kind {
            ExitKind::Function | ExitKind::Sub => {
                let value = default_return(self.func.return_type);
                self.terminate(Instruction::Return { value });
            }
            ExitKind::For | ExitKind::While | ExitKind::Do => {
                let target = self
                    .exits
                    .iter()
                    .rev()
                    .find(|(k, _)| *k == kind)
                    .map(|(_, t)| *t);
                match target {
                    Some(target) => self.jump_to(target),
                    None => self.comment(format!("skipped Exit {kind} outside a loop")),
                }
            }
            ExitKind::Select => self.comment("skipped Exit Select"),
        }
    }

    fn lower_expr(&mut self, expr: &Located<Expr>) -> Value {
        match &expr.node {
            Expr::Integer(v) => Value::Const(int_constant(*v)),
            Expr::Float(v) => Value::Const(Constant::F64(*v)),
            Expr::Str(s) => Value::Const(Constant::Str(s.clone())),
            Expr::Bool(b) => Value::Const(Constant::Bool(*b)),
            Expr::Identifier(name) => Value::Name(name.to_lowercase()),
            Expr::Binary(b) => self.lower_binary(b, expr.id),
            Expr::Unary(u) => self.lower_unary(u, expr.id),
            Expr::Call(c) => self.lower_call(c, expr.id),
            Expr::Nothing => self.opaque("Nothing literal"),
            Expr::Me => self.opaque("Me reference"),
            Expr::MyBase => self.opaque("MyBase reference"),
            Expr::Member(_) => self.opaque("member access"),
            Expr::Index(_) => self.opaque("array indexing"),
            Expr::New(_) => self.opaque("object construction"),
            Expr::Cast(_) => self.opaque("cast expression"),
            Expr::Query(_) => self.opaque("query expression"),
        }
    }

    /// Placeholder for an expression outside the lowering subset. The marker
    /// comment keeps the omission visible in dumps.
    fn opaque(&mut self, what: &str) -> Value {
        self.comment(format!("skipped {what}"));
        Value::Name(self.fresh_temp())
    }

    fn lower_binary(&mut self, b: &BinaryExpr, id: NodeId) -> Value {
        let left = self.lower_expr(&b.left);
        let right = self.lower_expr(&b.right);
        let dest = self.fresh_temp();
        match lowered_op(b.op) {
            LoweredOp::Cmp(op) => {
                self.emit(Instruction::Compare {
                    dest: dest.clone(),
                    op,
                    left,
                    right,
                });
            }
            LoweredOp::Bin(op) => {
                let ty = self.node_ty(id);
                self.emit(Instruction::Binary {
                    dest: dest.clone(),
                    ty,
                    op,
                    left,
                    right,
                });
            }
        }
        Value::Name(dest)
    }

    fn lower_unary(&mut self, u: &UnaryExpr, id: NodeId) -> Value {
        let operand = self.lower_expr(&u.operand);
        let dest = self.fresh_temp();
        let (op, ty) = match u.op {
            UnaryOp::Neg => (UnOp::Neg, self.node_ty(id)),
            UnaryOp::Not => (UnOp::Not, IrType::Bool),
        };
        self.emit(Instruction::Unary {
            dest: dest.clone(),
            ty,
            op,
            operand,
        });
        Value::Name(dest)
    }

    fn lower_call(&mut self, call: &CallExpr, id: NodeId) -> Value {
        let Expr::Identifier(name) = &call.callee.node else {
            return self.opaque("method call");
        };
        let args = call.args.iter().map(|a| self.lower_expr(a)).collect();
        let ty = self.node_ty(id);
        let dest = (ty != IrType::Void).then(|| self.fresh_temp());
        self.emit(Instruction::Call {
            dest: dest.clone(),
            ty,
            func: name.to_lowercase(),
            args,
        });
        match dest {
            Some(dest) => Value::Name(dest),
            None => Value::Name(self.fresh_temp()),
        }
    }
}
