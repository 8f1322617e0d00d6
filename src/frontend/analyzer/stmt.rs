//! Statement analysis: locals, assignment rules, control flow.

use crate::frontend::ast::*;
use crate::frontend::diagnostics::{Diagnostic, semantic};
use crate::frontend::symbols::{ScopeKind, Symbol, SymbolKind};
use crate::frontend::types::Type;

use super::SemanticAnalyzer;

impl SemanticAnalyzer {
    pub(crate) fn analyze_stmts(&mut self, stmts: &[Located<Stmt>]) {
        for stmt in stmts {
            self.analyze_stmt(stmt);
        }
    }

    /// Analyze a block in its own scope, so its locals die with it.
    pub(crate) fn analyze_block(&mut self, block: &Block) {
        self.with_scope(ScopeKind::Block, |a| a.analyze_stmts(&block.statements));
    }

    pub(crate) fn analyze_stmt(&mut self, stmt: &Located<Stmt>) {
        match &stmt.node {
            Stmt::Variable(v) => self.analyze_local(v, stmt.pos, stmt.id),
            Stmt::Constant(c) => self.analyze_local_const(c, stmt.pos, stmt.id),
            Stmt::Assign(a) => self.analyze_assign(a),
            Stmt::Expression(e) => {
                self.analyze_expr(e);
            }
            Stmt::If(s) => self.analyze_if(s),
            Stmt::Select(s) => self.analyze_select(s),
            Stmt::For(s) => self.analyze_for(s),
            Stmt::ForEach(s) => self.analyze_for_each(s),
            Stmt::While(s) => self.analyze_while(s),
            Stmt::DoLoop(s) => self.analyze_do(s),
            Stmt::Try(s) => self.analyze_try(s),
            Stmt::With(s) => self.analyze_with(s),
            Stmt::Return(value) => self.analyze_return(value.as_ref(), stmt.pos),
            Stmt::Exit(kind) => self.analyze_exit(*kind, stmt.pos),
            Stmt::Throw(e) => {
                self.analyze_expr(e);
            }
        }
    }

    // ===== declarations =====

    fn analyze_local(&mut self, v: &VarDecl, pos: Pos, id: NodeId) {
        let declared = v.ty.as_ref().map(|tr| self.resolve_type_ref(tr));
        let init_ty = v.init.as_ref().map(|e| self.analyze_expr(e));
        if let (Some(declared), Some(init_ty)) = (&declared, &init_ty) {
            if !self.assign_ok(declared, init_ty) {
                let at = v.init.as_ref().map_or(pos, |e| e.pos);
                self.diagnostics.push(semantic::type_mismatch(
                    &declared.to_string(),
                    &init_ty.to_string(),
                    at,
                ));
            }
        }
        let ty = declared.or(init_ty).unwrap_or_else(|| self.types.object());

        if self.symbols.lookup_local(&v.name).is_some_and(|sid| {
            self.symbols.get(sid).is_some_and(|s| !s.is_builtin())
        }) {
            self.diagnostics.push(semantic::already_defined(&v.name, pos));
            return;
        }
        let mut symbol = Symbol::new(v.name.as_str(), SymbolKind::Variable, ty, pos);
        symbol.access = v.access;
        symbol.is_shared = v.is_shared;
        let sid = self.symbols.define(symbol);
        self.node_symbols.insert(id, sid);
    }

    fn analyze_local_const(&mut self, c: &ConstDecl, pos: Pos, id: NodeId) {
        let declared = c.ty.as_ref().map(|tr| self.resolve_type_ref(tr));
        let value_ty = self.analyze_expr(&c.value);
        if let Some(declared) = &declared {
            if !self.assign_ok(declared, &value_ty) {
                self.diagnostics.push(semantic::type_mismatch(
                    &declared.to_string(),
                    &value_ty.to_string(),
                    c.value.pos,
                ));
            }
        }
        let ty = declared.unwrap_or(value_ty);

        if self.symbols.lookup_local(&c.name).is_some_and(|sid| {
            self.symbols.get(sid).is_some_and(|s| !s.is_builtin())
        }) {
            self.diagnostics.push(semantic::already_defined(&c.name, pos));
            return;
        }
        let mut symbol = Symbol::new(c.name.as_str(), SymbolKind::Variable, ty, pos);
        symbol.access = c.access;
        symbol.is_constant = true;
        let sid = self.symbols.define(symbol);
        self.node_symbols.insert(id, sid);
    }

    // ===== assignment =====

    fn analyze_assign(&mut self, assign: &AssignStmt) {
        let target_ty = self.analyze_expr(&assign.target);
        let value_ty = self.analyze_expr(&assign.value);

        if let Expr::Identifier(name) = &assign.target.node {
            let constant = self
                .node_symbols
                .get(&assign.target.id)
                .and_then(|&sid| self.symbols.get(sid))
                .is_some_and(|s| s.is_constant);
            if constant {
                self.diagnostics
                    .push(semantic::assign_to_constant(name, assign.target.pos));
                return;
            }
        }

        // Late binding and unbound type parameters defer checks to runtime.
        let exempt = target_ty.is_object()
            || value_ty.is_object()
            || target_ty.mentions_type_parameter()
            || value_ty.mentions_type_parameter();

        match assign.op {
            AssignOp::Set => {
                if !self.assign_ok(&target_ty, &value_ty) {
                    self.diagnostics.push(semantic::type_mismatch(
                        &target_ty.to_string(),
                        &value_ty.to_string(),
                        assign.value.pos,
                    ));
                }
            }
            AssignOp::Concat => {
                if !exempt && !target_ty.is_string() && !value_ty.is_string() {
                    self.diagnostics.push(Diagnostic::error(
                        format!(
                            "'&=' requires a String operand, got '{}' and '{}'",
                            target_ty, value_ty
                        ),
                        assign.value.pos,
                    ));
                }
            }
            _ => {
                if !exempt && !(target_ty.is_numeric() && value_ty.is_numeric()) {
                    self.diagnostics.push(Diagnostic::error(
                        format!(
                            "Compound assignment requires numeric operands, got '{}' and '{}'",
                            target_ty, value_ty
                        ),
                        assign.value.pos,
                    ));
                }
            }
        }
    }

    // ===== control flow =====

    /// Conditions must be Boolean; Object and type parameters pass through
    /// for late binding.
    fn check_condition(&mut self, cond: &Located<Expr>) {
        let ty = self.analyze_expr(cond);
        if !(ty.is_boolean() || ty.is_object() || ty.mentions_type_parameter()) {
            self.diagnostics
                .push(semantic::type_mismatch("Boolean", &ty.to_string(), cond.pos));
        }
    }

    fn analyze_if(&mut self, s: &IfStmt) {
        self.check_condition(&s.cond);
        self.analyze_block(&s.then_block);
        for else_if in &s.else_ifs {
            self.check_condition(&else_if.cond);
            self.analyze_block(&else_if.block);
        }
        if let Some(else_block) = &s.else_block {
            self.analyze_block(else_block);
        }
    }

    fn analyze_select(&mut self, s: &SelectStmt) {
        let subject_ty = self.analyze_expr(&s.subject);
        self.exit_targets.push(ExitKind::Select);
        for case in &s.cases {
            for label in &case.labels {
                let label_ty = self.analyze_expr(label);
                let comparable = self.assign_ok(&subject_ty, &label_ty)
                    || self.assign_ok(&label_ty, &subject_ty);
                if !comparable {
                    self.diagnostics.push(semantic::equality_mismatch(
                        &subject_ty.to_string(),
                        &label_ty.to_string(),
                        label.pos,
                    ));
                }
            }
            self.analyze_block(&case.block);
        }
        if let Some(else_block) = &s.else_block {
            self.analyze_block(else_block);
        }
        self.exit_targets.pop();
    }

    fn analyze_for(&mut self, s: &ForStmt) {
        let from_ty = self.analyze_expr(&s.from);
        let to_ty = self.analyze_expr(&s.to);
        self.check_for_bound(&from_ty, s.from.pos);
        self.check_for_bound(&to_ty, s.to.pos);
        if let Some(step) = &s.step {
            let step_ty = self.analyze_expr(step);
            self.check_for_bound(&step_ty, step.pos);
        }
        // The counter takes the wider of the two bounds, Integer if neither
        // side is numeric.
        let counter_ty = self
            .types
            .common_numeric(&from_ty, &to_ty)
            .unwrap_or_else(|| self.types.integer());

        self.with_scope(ScopeKind::Loop, |a| {
            a.symbols
                .define(Symbol::new(s.var.as_str(), SymbolKind::Variable, counter_ty, s.var_pos));
            a.exit_targets.push(ExitKind::For);
            a.analyze_stmts(&s.body.statements);
            a.exit_targets.pop();
        });
    }

    fn check_for_bound(&mut self, ty: &Type, pos: Pos) {
        if !(ty.is_numeric() || ty.is_object() || ty.mentions_type_parameter()) {
            self.diagnostics.push(Diagnostic::error(
                format!("For loop bounds must be numeric, got '{}'", ty),
                pos,
            ));
        }
    }

    fn analyze_for_each(&mut self, s: &ForEachStmt) {
        let iter_ty = self.analyze_expr(&s.iterable);
        let declared = s.var_ty.as_ref().map(|tr| self.resolve_type_ref(tr));
        let element = declared.unwrap_or_else(|| self.element_of(&iter_ty));

        self.with_scope(ScopeKind::Loop, |a| {
            a.symbols
                .define(Symbol::new(s.var.as_str(), SymbolKind::Variable, element, s.var_pos));
            a.exit_targets.push(ExitKind::For);
            a.analyze_stmts(&s.body.statements);
            a.exit_targets.pop();
        });
    }

    fn analyze_while(&mut self, s: &WhileStmt) {
        self.check_condition(&s.cond);
        self.exit_targets.push(ExitKind::While);
        self.analyze_block(&s.body);
        self.exit_targets.pop();
    }

    fn analyze_do(&mut self, s: &DoLoopStmt) {
        if let Some(cond) = &s.cond {
            self.check_condition(cond);
        }
        self.exit_targets.push(ExitKind::Do);
        self.analyze_block(&s.body);
        self.exit_targets.pop();
    }

    fn analyze_try(&mut self, s: &TryStmt) {
        self.analyze_block(&s.body);
        for catch in &s.catches {
            self.with_scope(ScopeKind::Block, |a| {
                if let Some(var) = &catch.var {
                    let ty = match &catch.ty {
                        Some(tr) => a.resolve_type_ref(tr),
                        None => a.types.object(),
                    };
                    a.symbols
                        .define(Symbol::new(var.as_str(), SymbolKind::Variable, ty, catch.var_pos));
                }
                a.analyze_stmts(&catch.block.statements);
            });
        }
        if let Some(finally) = &s.finally {
            self.analyze_block(finally);
        }
    }

    fn analyze_with(&mut self, s: &WithStmt) {
        let subject_ty = self.analyze_expr(&s.subject);
        self.with_subjects.push(subject_ty);
        self.with_scope(ScopeKind::With, |a| a.analyze_stmts(&s.body.statements));
        self.with_subjects.pop();
    }

    fn analyze_return(&mut self, value: Option<&Located<Expr>>, pos: Pos) {
        let value_ty = value.map(|e| (self.analyze_expr(e), e.pos));
        if !self.symbols.in_callable() {
            self.diagnostics.push(Diagnostic::error(
                "'Return' is only valid inside a Function or Sub",
                pos,
            ));
            return;
        }
        let Some(expected) = self.symbols.current_return_type().cloned() else { return };
        match value_ty {
            Some((ty, at)) => {
                if expected.is_void() {
                    self.diagnostics
                        .push(Diagnostic::error("A Sub cannot return a value", at));
                } else if !self.assign_ok(&expected, &ty) {
                    self.diagnostics.push(semantic::type_mismatch(
                        &expected.to_string(),
                        &ty.to_string(),
                        at,
                    ));
                }
            }
            None => {
                if !expected.is_void() {
                    self.diagnostics.push(Diagnostic::error(
                        format!("'Return' must carry a value of type '{}'", expected),
                        pos,
                    ));
                }
            }
        }
    }

    fn analyze_exit(&mut self, kind: ExitKind, pos: Pos) {
        if !self.exit_targets.contains(&kind) {
            self.diagnostics.push(Diagnostic::error(
                format!("'Exit {}' has no enclosing {} to exit", kind, kind),
                pos,
            ));
        }
    }
}
