//! Expression typing: literals, operators, calls, member access, queries.
//!
//! ## Notes
//!
//! - Every expression gets a type even when analysis fails; Object is the
//!   recovery value, and member access on Object is late-bound (no further
//!   diagnostics), so one bad expression reports once.
//! - Expressions whose types still mention an unbound type parameter defer
//!   operator and assignability checks entirely.

use crate::frontend::ast::*;
use crate::frontend::diagnostics::{Diagnostic, semantic};
use crate::frontend::symbols::{ScopeKind, Symbol, SymbolKind};
use crate::frontend::types::{CallableSig, Type, TypeKind};

use super::SemanticAnalyzer;

impl SemanticAnalyzer {
    /// Type an expression and record the result against its node.
    pub(crate) fn analyze_expr(&mut self, expr: &Located<Expr>) -> Type {
        let ty = self.expr_type(expr);
        self.node_types.insert(expr.id, ty.clone());
        ty
    }

    fn expr_type(&mut self, expr: &Located<Expr>) -> Type {
        match &expr.node {
            Expr::Integer(_) => self.types.integer(),
            Expr::Float(_) => self.types.double(),
            Expr::Str(_) => self.types.string(),
            Expr::Bool(_) => self.types.boolean(),
            Expr::Nothing => Type::nothing(),
            Expr::Identifier(name) => self.identifier_type(name, expr.pos, expr.id),
            Expr::Me => self.me_type(expr.pos),
            Expr::MyBase => self.my_base_type(expr.pos),
            Expr::Binary(b) => self.binary_type(b, expr.pos),
            Expr::Unary(u) => self.unary_type(u),
            Expr::Call(c) => self.call_type(c, expr.pos),
            Expr::Member(m) => self.member_type(m, expr.pos),
            Expr::Index(ix) => self.index_type(ix, expr.pos),
            Expr::New(n) => self.new_type(n),
            Expr::Cast(c) => self.cast_type(c),
            Expr::Query(q) => self.query_type(q),
        }
    }

    // ===== names =====

    fn identifier_type(&mut self, name: &str, pos: Pos, id: NodeId) -> Type {
        match self.symbols.lookup(name) {
            Some(sid) => {
                self.node_symbols.insert(id, sid);
                match self.symbols.get(sid) {
                    Some(symbol) => symbol.ty.clone(),
                    None => self.types.object(),
                }
            }
            None => {
                self.diagnostics.push(semantic::undefined_symbol(name, pos));
                self.types.object()
            }
        }
    }

    fn me_type(&mut self, pos: Pos) -> Type {
        if self.shared_context {
            self.diagnostics.push(semantic::me_outside_instance(pos));
        }
        match self.symbols.current_class_type() {
            Some(ty) => ty.clone(),
            None => {
                if !self.shared_context {
                    self.diagnostics
                        .push(Diagnostic::error("'Me' is only valid inside a class", pos));
                }
                self.types.object()
            }
        }
    }

    fn my_base_type(&mut self, pos: Pos) -> Type {
        if self.shared_context {
            self.diagnostics.push(Diagnostic::error(
                "'MyBase' is only valid inside an instance method",
                pos,
            ));
        }
        let base = self.symbols.current_class_type().and_then(|t| t.base.clone());
        match base {
            Some(base_name) => match self.types.get(&base_name) {
                Some(ty) => ty.clone(),
                None => self.types.object(),
            },
            None => {
                if !self.shared_context {
                    self.diagnostics.push(Diagnostic::error(
                        "'MyBase' requires an enclosing class with a base class",
                        pos,
                    ));
                }
                self.types.object()
            }
        }
    }

    // ===== operators =====

    fn binary_type(&mut self, b: &BinaryExpr, pos: Pos) -> Type {
        let left = self.analyze_expr(&b.left);
        let right = self.analyze_expr(&b.right);

        if left.mentions_type_parameter() || right.mentions_type_parameter() {
            return if b.op.is_arithmetic() || b.op.is_integral() {
                self.types.object()
            } else if b.op == BinaryOp::Concat {
                self.types.string()
            } else {
                self.types.boolean()
            };
        }

        match b.op {
            op if op.is_arithmetic() => match self.types.common_numeric(&left, &right) {
                Some(ty) => ty,
                None => {
                    if !left.is_object() && !right.is_object() {
                        self.diagnostics.push(Diagnostic::error(
                            format!(
                                "Operator '{}' requires numeric operands, got '{}' and '{}'",
                                op, left, right
                            ),
                            pos,
                        ));
                    }
                    self.types.object()
                }
            },
            op if op.is_integral() => {
                if !(left.is_integral() && right.is_integral())
                    && !left.is_object()
                    && !right.is_object()
                {
                    self.diagnostics.push(Diagnostic::error(
                        format!(
                            "Operator '{}' requires integral operands, got '{}' and '{}'",
                            op, left, right
                        ),
                        pos,
                    ));
                }
                self.types
                    .common_numeric(&left, &right)
                    .unwrap_or_else(|| self.types.integer())
            }
            BinaryOp::Concat => {
                if !(left.is_string() || right.is_string() || left.is_object() || right.is_object())
                {
                    self.diagnostics.push(Diagnostic::error(
                        format!(
                            "Operator '&' requires a String operand, got '{}' and '{}'",
                            left, right
                        ),
                        pos,
                    ));
                }
                self.types.string()
            }
            op if op.is_comparison() => {
                if !(left.is_numeric() && right.is_numeric())
                    && !left.is_object()
                    && !right.is_object()
                {
                    self.diagnostics.push(Diagnostic::error(
                        format!(
                            "Operator '{}' requires numeric operands, got '{}' and '{}'",
                            op, left, right
                        ),
                        pos,
                    ));
                }
                self.types.boolean()
            }
            op if op.is_equality() => {
                if !self.types.assignable(&left, &right) && !self.types.assignable(&right, &left) {
                    self.diagnostics.push(semantic::equality_mismatch(
                        &left.to_string(),
                        &right.to_string(),
                        pos,
                    ));
                }
                self.types.boolean()
            }
            op => {
                if !(left.is_boolean() && right.is_boolean())
                    && !left.is_object()
                    && !right.is_object()
                {
                    self.diagnostics.push(Diagnostic::error(
                        format!(
                            "Operator '{}' requires Boolean operands, got '{}' and '{}'",
                            op, left, right
                        ),
                        pos,
                    ));
                }
                self.types.boolean()
            }
        }
    }

    fn unary_type(&mut self, u: &UnaryExpr) -> Type {
        let operand = self.analyze_expr(&u.operand);
        if operand.mentions_type_parameter() {
            return operand;
        }
        match u.op {
            UnaryOp::Neg => {
                if !(operand.is_numeric() || operand.is_object()) {
                    self.diagnostics.push(Diagnostic::error(
                        format!("Unary '-' requires a numeric operand, got '{}'", operand),
                        u.operand.pos,
                    ));
                    return self.types.object();
                }
                operand
            }
            UnaryOp::Not => {
                if !(operand.is_boolean() || operand.is_object()) {
                    self.diagnostics.push(Diagnostic::error(
                        format!("Unary 'Not' requires a Boolean operand, got '{}'", operand),
                        u.operand.pos,
                    ));
                }
                self.types.boolean()
            }
        }
    }

    // ===== calls =====

    fn call_type(&mut self, call: &CallExpr, pos: Pos) -> Type {
        match &call.callee.node {
            Expr::Identifier(name) => {
                let Some(sid) = self.symbols.lookup(name) else {
                    self.diagnostics
                        .push(semantic::undefined_symbol(name, call.callee.pos));
                    self.analyze_args(&call.args);
                    return self.types.object();
                };
                self.node_symbols.insert(call.callee.id, sid);
                let sig = self.symbols.get(sid).and_then(|s| s.kind.signature()).cloned();
                match sig {
                    Some(sig) => {
                        let ret = self.check_call(name, &sig, &call.args, pos);
                        self.node_types.insert(call.callee.id, ret.clone());
                        ret
                    }
                    None => {
                        self.diagnostics
                            .push(semantic::not_callable(name, call.callee.pos));
                        self.analyze_args(&call.args);
                        self.types.object()
                    }
                }
            }
            Expr::Member(m) => {
                let Some(receiver) = self.member_receiver(m, call.callee.pos) else {
                    self.analyze_args(&call.args);
                    return self.types.object();
                };
                if receiver.is_object()
                    || receiver.is_nothing()
                    || receiver.mentions_type_parameter()
                {
                    // Late binding: the member resolves at runtime.
                    self.analyze_args(&call.args);
                    return self.types.object();
                }
                match receiver.member(&m.member).cloned() {
                    Some(info) => match &info.callable {
                        Some(sig) => {
                            let ret = self.check_call(&m.member, sig, &call.args, pos);
                            self.node_types.insert(call.callee.id, ret.clone());
                            ret
                        }
                        None => {
                            self.diagnostics
                                .push(semantic::not_callable(&m.member, call.callee.pos));
                            self.analyze_args(&call.args);
                            self.types.object()
                        }
                    },
                    None => {
                        self.diagnostics.push(Diagnostic::error(
                            format!("Type '{}' has no member '{}'", receiver, m.member),
                            call.callee.pos,
                        ));
                        self.analyze_args(&call.args);
                        self.types.object()
                    }
                }
            }
            _ => {
                self.analyze_expr(&call.callee);
                self.diagnostics.push(Diagnostic::error(
                    "This expression cannot be called",
                    call.callee.pos,
                ));
                self.analyze_args(&call.args);
                self.types.object()
            }
        }
    }

    fn analyze_args(&mut self, args: &[Located<Expr>]) {
        for arg in args {
            self.analyze_expr(arg);
        }
    }

    /// Check arity and argument assignability against a signature; the call's
    /// type is the signature's return type either way.
    fn check_call(
        &mut self,
        name: &str,
        sig: &CallableSig,
        args: &[Located<Expr>],
        pos: Pos,
    ) -> Type {
        let required = sig.required_count();
        let max = sig.max_count();
        if args.len() < required || max.is_some_and(|m| args.len() > m) {
            self.diagnostics
                .push(semantic::wrong_arg_count(name, required, max, args.len(), pos));
        }
        for (index, arg) in args.iter().enumerate() {
            let param = match sig.params.get(index) {
                Some(param) => param,
                // Overflow arguments land on a trailing ParamArray.
                None => match sig.params.last() {
                    Some(last) if last.param_array => last,
                    _ => {
                        self.analyze_expr(arg);
                        continue;
                    }
                },
            };
            let target = if param.param_array && param.ty.is_array() {
                self.element_of(&param.ty)
            } else {
                param.ty.clone()
            };
            let arg_ty = self.analyze_expr(arg);
            if !self.assign_ok(&target, &arg_ty) {
                self.diagnostics.push(semantic::type_mismatch(
                    &target.to_string(),
                    &arg_ty.to_string(),
                    arg.pos,
                ));
            }
        }
        sig.return_type.clone()
    }

    // ===== member access =====

    /// The receiver type for a member expression. `None` means the error was
    /// already reported and the caller should recover with Object.
    fn member_receiver(&mut self, m: &MemberExpr, pos: Pos) -> Option<Type> {
        match &m.target {
            Some(target) => {
                let ty = self.analyze_expr(target);
                Some(self.freshen(ty))
            }
            None => {
                let subject = self.with_subjects.last().cloned();
                match subject {
                    Some(subject) => Some(self.freshen(subject)),
                    None => {
                        self.diagnostics.push(Diagnostic::error(
                            "A leading '.' is only valid inside a With block",
                            pos,
                        ));
                        None
                    }
                }
            }
        }
    }

    fn member_type(&mut self, m: &MemberExpr, pos: Pos) -> Type {
        let Some(receiver) = self.member_receiver(m, pos) else {
            return self.types.object();
        };
        if receiver.is_object() || receiver.is_nothing() || receiver.mentions_type_parameter() {
            return self.types.object();
        }
        match receiver.member(&m.member).cloned() {
            Some(info) => info.ty,
            None => {
                self.diagnostics.push(Diagnostic::error(
                    format!("Type '{}' has no member '{}'", receiver, m.member),
                    pos,
                ));
                self.types.object()
            }
        }
    }

    fn index_type(&mut self, ix: &IndexExpr, pos: Pos) -> Type {
        let target = self.analyze_expr(&ix.target);
        for index in &ix.indices {
            let index_ty = self.analyze_expr(index);
            if !(index_ty.is_integral()
                || index_ty.is_object()
                || index_ty.mentions_type_parameter())
            {
                self.diagnostics.push(Diagnostic::error(
                    format!("Array index must be integral, got '{}'", index_ty),
                    index.pos,
                ));
            }
        }
        if target.is_array() {
            if ix.indices.len() != target.rank as usize {
                self.diagnostics.push(Diagnostic::error(
                    format!(
                        "This array takes {} index(es), found {}",
                        target.rank,
                        ix.indices.len()
                    ),
                    pos,
                ));
            }
            return self.element_of(&target);
        }
        if target.is_object() || target.mentions_type_parameter() {
            return self.types.object();
        }
        self.diagnostics.push(Diagnostic::error(
            format!("Type '{}' cannot be indexed", target),
            pos,
        ));
        self.types.object()
    }

    // ===== construction and conversion =====

    fn new_type(&mut self, n: &NewExpr) -> Type {
        let ty = self.resolve_type_ref(&n.ty);
        // Constructors are not modeled; arguments are typed but not matched.
        self.analyze_args(&n.args);
        if matches!(ty.kind, TypeKind::Interface) {
            self.diagnostics.push(Diagnostic::error(
                format!("Cannot create an instance of interface '{}'", ty),
                n.ty.pos,
            ));
        }
        ty
    }

    fn cast_type(&mut self, c: &CastExpr) -> Type {
        self.analyze_expr(&c.expr);
        self.resolve_type_ref(&c.ty)
    }

    // ===== queries =====

    /// A query binds its range variable in a dedicated scope and threads a
    /// "current element" type through the clauses. The query's type is an
    /// array of whatever the final clause left as current.
    fn query_type(&mut self, q: &QueryExpr) -> Type {
        let source_ty = self.analyze_expr(&q.source);
        self.with_scope(ScopeKind::Query, |a| {
            let element = a.element_of(&source_ty);
            a.symbols.define(Symbol::new(
                q.var.as_str(),
                SymbolKind::Variable,
                element.clone(),
                q.var_pos,
            ));
            let mut current = element;
            for clause in &q.clauses {
                match &clause.node {
                    QueryClause::Where(cond) => {
                        let ty = a.analyze_expr(cond);
                        if !(ty.is_boolean() || ty.is_object() || ty.mentions_type_parameter()) {
                            a.diagnostics.push(semantic::type_mismatch(
                                "Boolean",
                                &ty.to_string(),
                                cond.pos,
                            ));
                        }
                    }
                    QueryClause::Select(e) => current = a.analyze_expr(e),
                    QueryClause::OrderBy { key, .. } => {
                        a.analyze_expr(key);
                    }
                    QueryClause::GroupBy { key, group, group_pos } => {
                        a.analyze_expr(key);
                        let group_ty = a.types.array_of(current.clone(), 1, None);
                        a.symbols.define(Symbol::new(
                            group.as_str(),
                            SymbolKind::Variable,
                            group_ty.clone(),
                            *group_pos,
                        ));
                        current = group_ty;
                    }
                    QueryClause::Join { var, var_pos, source, left_key, right_key, group } => {
                        let src_ty = a.analyze_expr(source);
                        let joined = a.element_of(&src_ty);
                        a.symbols.define(Symbol::new(
                            var.as_str(),
                            SymbolKind::Variable,
                            joined.clone(),
                            *var_pos,
                        ));
                        a.analyze_expr(left_key);
                        a.analyze_expr(right_key);
                        if let Some(group) = group {
                            let group_ty = a.types.array_of(joined, 1, None);
                            a.symbols.define(Symbol::new(
                                group.as_str(),
                                SymbolKind::Variable,
                                group_ty,
                                *var_pos,
                            ));
                        }
                    }
                    QueryClause::Aggregate { var, var_pos, source, result, result_pos, value } => {
                        let src_ty = a.analyze_expr(source);
                        let elem = a.element_of(&src_ty);
                        a.symbols.define(Symbol::new(
                            var.as_str(),
                            SymbolKind::Variable,
                            elem,
                            *var_pos,
                        ));
                        let value_ty = a.analyze_expr(value);
                        a.symbols.define(Symbol::new(
                            result.as_str(),
                            SymbolKind::Variable,
                            value_ty.clone(),
                            *result_pos,
                        ));
                        current = value_ty;
                    }
                    QueryClause::Let { name, name_pos, value } => {
                        let value_ty = a.analyze_expr(value);
                        a.symbols.define(Symbol::new(
                            name.as_str(),
                            SymbolKind::Variable,
                            value_ty,
                            *name_pos,
                        ));
                    }
                    QueryClause::Take(count) => a.check_count(count, "Take"),
                    QueryClause::Skip(count) => a.check_count(count, "Skip"),
                    QueryClause::Distinct => {}
                }
            }
            a.types.array_of(current, 1, None)
        })
    }

    fn check_count(&mut self, count: &Located<Expr>, clause: &str) {
        let ty = self.analyze_expr(count);
        if !(ty.is_integral() || ty.is_object() || ty.mentions_type_parameter()) {
            self.diagnostics.push(Diagnostic::error(
                format!("'{}' requires an integral count, got '{}'", clause, ty),
                count.pos,
            ));
        }
    }
}
