//! Declaration analysis: containers, classes, callables, fields.
//!
//! ## Notes
//!
//! - Each container runs two phases over its members: `declare_members`
//!   defines header symbols, then bodies are analyzed, so members may
//!   reference each other regardless of order.
//! - Classes and modules publish a header view of their member table before
//!   bodies run, so `Me.field` and sibling-method calls resolve, then
//!   republish after bodies to pick up initializer-inferred field types.

use std::mem;

use crate::frontend::ast::*;
use crate::frontend::diagnostics::{Diagnostic, semantic};
use crate::frontend::symbols::{ScopeKind, Symbol, SymbolKind};
use crate::frontend::types::{CallableSig, MemberInfo, MemberKind, ParamSig, Type, TypeKind};

use super::SemanticAnalyzer;

impl SemanticAnalyzer {
    // ===== pass 1: type names =====

    /// Register every named type under `decls` so later references resolve
    /// regardless of declaration order. Modules register like classes so
    /// `ModuleName.Member` access works.
    pub(crate) fn register_type_names(&mut self, decls: &[Located<Decl>]) {
        for decl in decls {
            match &decl.node {
                Decl::Namespace(n) => self.register_type_names(&n.body),
                Decl::Module(m) => {
                    self.register_named(Type::class(m.name.as_str()), decl.pos);
                    self.register_type_names(&m.body);
                }
                Decl::Class(c) => {
                    let mut ty = Type::class(c.name.as_str());
                    ty.type_params = c.type_params.clone();
                    self.register_named(ty, decl.pos);
                    self.register_type_names(&c.members);
                }
                Decl::Interface(i) => {
                    let mut ty = Type::interface(i.name.as_str());
                    ty.type_params = i.type_params.clone();
                    self.register_named(ty, decl.pos);
                }
                Decl::Structure(s) => {
                    self.register_named(Type::structure(s.name.as_str()), decl.pos);
                    self.register_type_names(&s.members);
                }
                Decl::Enum(e) => {
                    self.register_named(Type::enumeration(e.name.as_str()), decl.pos);
                }
                _ => {}
            }
        }
    }

    fn register_named(&mut self, ty: Type, pos: Pos) {
        let name = ty.name.clone();
        if !self.types.register(ty) {
            self.diagnostics.push(semantic::already_defined(&name, pos));
        }
    }

    // ===== pass 2a: member headers =====

    /// Define a header symbol for every member of the current container.
    pub(crate) fn declare_members(&mut self, decls: &[Located<Decl>]) {
        for decl in decls {
            match &decl.node {
                Decl::Namespace(n) => {
                    let symbol = Symbol::new(
                        n.name.as_str(),
                        SymbolKind::Namespace,
                        self.types.void(),
                        decl.pos,
                    );
                    self.declare_symbol(symbol, decl.pos);
                }
                Decl::Module(m) => {
                    let ty = self.registered_type(&m.name);
                    let mut symbol = Symbol::new(m.name.as_str(), SymbolKind::Module, ty, decl.pos);
                    symbol.access = m.access;
                    self.declare_symbol(symbol, decl.pos);
                }
                Decl::Class(c) => {
                    let ty = self.registered_type(&c.name);
                    let mut symbol = Symbol::new(c.name.as_str(), SymbolKind::Class, ty, decl.pos);
                    symbol.access = c.access;
                    self.declare_type_symbol(symbol);
                }
                Decl::Interface(i) => {
                    let ty = self.registered_type(&i.name);
                    let mut symbol =
                        Symbol::new(i.name.as_str(), SymbolKind::Interface, ty, decl.pos);
                    symbol.access = i.access;
                    self.declare_type_symbol(symbol);
                }
                Decl::Structure(s) => {
                    let ty = self.registered_type(&s.name);
                    let mut symbol =
                        Symbol::new(s.name.as_str(), SymbolKind::Structure, ty, decl.pos);
                    symbol.access = s.access;
                    self.declare_type_symbol(symbol);
                }
                Decl::Enum(e) => {
                    let ty = self.registered_type(&e.name);
                    let mut symbol = Symbol::new(e.name.as_str(), SymbolKind::Enum, ty, decl.pos);
                    symbol.access = e.access;
                    self.declare_type_symbol(symbol);
                }
                Decl::Function(f) => self.declare_callable(CallableKind::Function, f, decl.pos),
                Decl::Sub(f) => self.declare_callable(CallableKind::Sub, f, decl.pos),
                Decl::Variable(v) => {
                    let ty = match &v.ty {
                        Some(tr) => self.resolve_type_ref(tr),
                        // Placeholder until the initializer is analyzed.
                        None => self.types.object(),
                    };
                    let mut symbol =
                        Symbol::new(v.name.as_str(), SymbolKind::Variable, ty, decl.pos);
                    symbol.access = v.access;
                    symbol.is_shared = v.is_shared;
                    self.declare_symbol(symbol, decl.pos);
                }
                Decl::Constant(c) => {
                    let ty = match &c.ty {
                        Some(tr) => self.resolve_type_ref(tr),
                        None => self.types.object(),
                    };
                    let mut symbol =
                        Symbol::new(c.name.as_str(), SymbolKind::Variable, ty, decl.pos);
                    symbol.access = c.access;
                    symbol.is_constant = true;
                    self.declare_symbol(symbol, decl.pos);
                }
                // Statements run strictly in order; nothing to hoist.
                Decl::Statement(_) => {}
            }
        }
    }

    /// Define `symbol` in the current scope. Redefinition is an error unless
    /// the existing binding is an overridable builtin.
    fn declare_symbol(&mut self, symbol: Symbol, pos: Pos) {
        if let Some(existing) =
            self.symbols.lookup_local(&symbol.name).and_then(|id| self.symbols.get(id))
        {
            if !existing.is_builtin() {
                self.diagnostics.push(semantic::already_defined(&symbol.name, pos));
                return;
            }
        }
        self.symbols.define(symbol);
    }

    /// Like [`declare_symbol`](Self::declare_symbol), but silent on duplicates:
    /// the type registry already reported the clash in pass 1.
    fn declare_type_symbol(&mut self, symbol: Symbol) {
        let duplicate = self
            .symbols
            .lookup_local(&symbol.name)
            .and_then(|id| self.symbols.get(id))
            .is_some_and(|s| !s.is_builtin());
        if !duplicate {
            self.symbols.define(symbol);
        }
    }

    fn registered_type(&self, name: &str) -> Type {
        match self.types.get(name) {
            Some(ty) => ty.clone(),
            None => self.types.object(),
        }
    }

    /// The registry entry for a container, only if it is actually ours.
    /// After a duplicate-name clash in pass 1 the entry belongs to someone
    /// else, and publishing members against it would corrupt that type.
    fn container_type(&self, name: &str, kind: TypeKind) -> Option<Type> {
        self.types.get(name).filter(|t| t.kind == kind).cloned()
    }

    fn declare_callable(&mut self, kind: CallableKind, f: &CallableDecl, pos: Pos) {
        let sig = self.callable_signature(kind, f);
        let ty = sig.return_type.clone();
        let symbol_kind = match kind {
            CallableKind::Function => SymbolKind::Function(sig),
            CallableKind::Sub => SymbolKind::Subroutine(sig),
        };
        let mut symbol = Symbol::new(f.name.as_str(), symbol_kind, ty, pos);
        symbol.access = f.access;
        symbol.is_shared = f.is_shared;
        self.declare_symbol(symbol, pos);
    }

    /// Resolve a callable's signature inside a throwaway scope, so its type
    /// parameters are bound while the parameter and return types resolve.
    fn callable_signature(&mut self, kind: CallableKind, f: &CallableDecl) -> CallableSig {
        self.with_scope(ScopeKind::Function, |a| {
            a.bind_type_params(&f.type_params);
            let params = f
                .params
                .iter()
                .map(|p| ParamSig {
                    name: p.name.clone(),
                    ty: match &p.ty {
                        Some(tr) => a.resolve_type_ref(tr),
                        None => a.types.object(),
                    },
                    optional: p.optional,
                    param_array: p.param_array,
                    by_ref: p.by_ref,
                })
                .collect();
            let return_type = match kind {
                CallableKind::Function => match &f.return_type {
                    Some(tr) => a.resolve_type_ref(tr),
                    None => a.types.object(),
                },
                CallableKind::Sub => a.types.void(),
            };
            CallableSig {
                params,
                return_type,
                type_params: f.type_params.clone(),
            }
        })
    }

    // ===== pass 2b: declaration analysis =====

    pub(crate) fn analyze_decl(&mut self, decl: &Located<Decl>) {
        match &decl.node {
            Decl::Namespace(n) => self.analyze_namespace(n),
            Decl::Module(m) => self.analyze_module(m),
            Decl::Class(c) => self.analyze_class(c, decl.pos),
            Decl::Interface(i) => self.analyze_interface(i),
            Decl::Structure(s) => self.analyze_structure(s),
            Decl::Enum(e) => self.analyze_enum(e),
            Decl::Function(f) => {
                self.analyze_callable(CallableKind::Function, f, decl.pos, decl.id)
            }
            Decl::Sub(f) => self.analyze_callable(CallableKind::Sub, f, decl.pos, decl.id),
            Decl::Variable(v) => self.analyze_field(v, decl.id),
            Decl::Constant(c) => self.analyze_const_field(c, decl.id),
            Decl::Statement(stmt) => self.analyze_stmt(stmt),
        }
    }

    fn analyze_namespace(&mut self, n: &NamespaceDecl) {
        self.with_scope(ScopeKind::Namespace, |a| {
            a.declare_members(&n.body);
            for decl in &n.body {
                a.analyze_decl(decl);
            }
        });
    }

    /// Module members are implicitly `Shared`; `Me` is invalid inside them.
    fn analyze_module(&mut self, m: &ModuleDecl) {
        let Some(module_ty) = self.container_type(&m.name, TypeKind::Class) else { return };
        let saved_shared = mem::replace(&mut self.shared_context, true);
        self.with_scope(ScopeKind::Module, |a| {
            a.declare_members(&m.body);
            a.publish_members(module_ty, &m.body);
            for decl in &m.body {
                a.analyze_decl(decl);
            }
            a.republish_members(&m.name, &m.body);
        });
        self.shared_context = saved_shared;
    }

    fn analyze_class(&mut self, c: &ClassDecl, pos: Pos) {
        let Some(mut class_ty) = self.container_type(&c.name, TypeKind::Class) else { return };

        if let Some(base_ref) = &c.inherits {
            let base = self.resolve_type_ref(base_ref);
            if matches!(base.kind, TypeKind::Class) {
                class_ty.base = Some(base.name.clone());
            } else if !base.is_object() {
                self.diagnostics.push(Diagnostic::error(
                    format!("'{}' is not a class and cannot be inherited", base),
                    base_ref.pos,
                ));
            }
        }
        for iface_ref in &c.implements {
            let iface = self.resolve_type_ref(iface_ref);
            if matches!(iface.kind, TypeKind::Interface) {
                class_ty.interfaces.push(iface.name.clone());
            } else if !iface.is_object() {
                self.diagnostics.push(Diagnostic::error(
                    format!("'{}' is not an interface", iface),
                    iface_ref.pos,
                ));
            }
        }
        self.types.update(class_ty.clone());
        self.check_inheritance_cycle(&c.name, pos);

        let saved_shared = mem::replace(&mut self.shared_context, false);
        self.with_scope(ScopeKind::Class, |a| {
            a.bind_type_params(&c.type_params);
            a.declare_members(&c.members);
            let published = a.publish_members(class_ty, &c.members);
            a.symbols.set_class_type(published);

            for member in &c.members {
                if let Decl::Function(f) | Decl::Sub(f) = &member.node {
                    if f.is_abstract && !c.is_abstract {
                        a.diagnostics.push(Diagnostic::error(
                            format!(
                                "'{}' is MustOverride, so class '{}' must be declared MustInherit",
                                f.name, c.name
                            ),
                            member.pos,
                        ));
                    }
                }
                a.analyze_decl(member);
            }

            a.republish_members(&c.name, &c.members);
        });
        self.shared_context = saved_shared;
    }

    fn analyze_interface(&mut self, i: &InterfaceDecl) {
        let Some(iface_ty) = self.container_type(&i.name, TypeKind::Interface) else { return };
        self.with_scope(ScopeKind::Interface, |a| {
            a.bind_type_params(&i.type_params);
            a.declare_members(&i.members);
            for member in &i.members {
                a.analyze_decl(member);
            }
            a.publish_members(iface_ty, &i.members);
        });
    }

    fn analyze_structure(&mut self, s: &StructureDecl) {
        let Some(struct_ty) = self.container_type(&s.name, TypeKind::Structure) else { return };
        self.with_scope(ScopeKind::Structure, |a| {
            a.declare_members(&s.members);
            let published = a.publish_members(struct_ty, &s.members);
            a.symbols.set_class_type(published);
            for member in &s.members {
                a.analyze_decl(member);
            }
            a.republish_members(&s.name, &s.members);
        });
    }

    fn analyze_enum(&mut self, e: &EnumDecl) {
        let Some(mut ty) = self.container_type(&e.name, TypeKind::Enum) else { return };
        // Members carry the enum type itself; a shallow copy keeps the
        // entries from recursively embedding the table they live in.
        let member_ty = Type::enumeration(e.name.as_str());
        for variant in &e.variants {
            if ty.member(&variant.name).is_some() {
                self.diagnostics.push(semantic::already_defined(&variant.name, variant.pos));
                continue;
            }
            ty.add_member(MemberInfo {
                name: variant.name.clone(),
                ty: member_ty.clone(),
                kind: MemberKind::EnumMember,
                access: Access::Public,
                callable: None,
            });
        }
        self.types.update(ty);
    }

    fn analyze_callable(&mut self, kind: CallableKind, f: &CallableDecl, pos: Pos, id: NodeId) {
        if f.is_abstract
            && !matches!(self.symbols.current_scope_kind(), ScopeKind::Class | ScopeKind::Interface)
        {
            self.diagnostics.push(Diagnostic::error(
                format!(
                    "'MustOverride' is only valid on a class method, not on {} '{}'",
                    kind, f.name
                ),
                pos,
            ));
        }

        let sid = self.symbols.lookup_local(&f.name);
        if let Some(sid) = sid {
            self.node_symbols.insert(id, sid);
        }
        let sig = sid
            .and_then(|sid| self.symbols.get(sid))
            .and_then(|s| s.kind.signature())
            .cloned();

        let saved_shared = self.shared_context;
        self.shared_context = self.shared_context || f.is_shared;
        let scope_kind = match kind {
            CallableKind::Function => ScopeKind::Function,
            CallableKind::Sub => ScopeKind::Subroutine,
        };
        self.with_scope(scope_kind, |a| {
            a.bind_type_params(&f.type_params);
            let return_type = match &sig {
                Some(sig) => sig.return_type.clone(),
                None => a.types.void(),
            };
            a.symbols.set_return_type(return_type);

            for (index, param) in f.params.iter().enumerate() {
                let ty = sig
                    .as_ref()
                    .and_then(|s| s.params.get(index))
                    .map(|p| p.ty.clone())
                    .unwrap_or_else(|| a.types.object());
                if a.symbols.lookup_local(&param.name).is_some() {
                    a.diagnostics.push(semantic::already_defined(&param.name, param.pos));
                } else {
                    a.symbols.define(Symbol::new(
                        param.name.as_str(),
                        SymbolKind::Parameter,
                        ty.clone(),
                        param.pos,
                    ));
                }
                if let Some(default) = &param.default {
                    let default_ty = a.analyze_expr(default);
                    if !a.assign_ok(&ty, &default_ty) {
                        a.diagnostics.push(semantic::type_mismatch(
                            &ty.to_string(),
                            &default_ty.to_string(),
                            default.pos,
                        ));
                    }
                }
            }

            if let Some(body) = &f.body {
                let exit = match kind {
                    CallableKind::Function => ExitKind::Function,
                    CallableKind::Sub => ExitKind::Sub,
                };
                a.exit_targets.push(exit);
                a.analyze_stmts(&body.statements);
                a.exit_targets.pop();
            }
        });
        self.shared_context = saved_shared;
    }

    /// Second half of a field declaration: type-check the initializer and, for
    /// an `As`-less field, adopt the initializer's type.
    fn analyze_field(&mut self, v: &VarDecl, id: NodeId) {
        let sid = self.symbols.lookup_local(&v.name);
        if let Some(sid) = sid {
            self.node_symbols.insert(id, sid);
        }
        let Some(init) = &v.init else { return };
        let init_ty = self.analyze_expr(init);
        if v.ty.is_some() {
            let declared = sid.and_then(|s| self.symbols.get(s)).map(|s| s.ty.clone());
            if let Some(declared) = declared {
                if !self.assign_ok(&declared, &init_ty) {
                    self.diagnostics.push(semantic::type_mismatch(
                        &declared.to_string(),
                        &init_ty.to_string(),
                        init.pos,
                    ));
                }
            }
        } else if let Some(symbol) = sid.and_then(|s| self.symbols.get_mut(s)) {
            symbol.ty = init_ty;
        }
    }

    fn analyze_const_field(&mut self, c: &ConstDecl, id: NodeId) {
        let sid = self.symbols.lookup_local(&c.name);
        if let Some(sid) = sid {
            self.node_symbols.insert(id, sid);
        }
        let value_ty = self.analyze_expr(&c.value);
        if c.ty.is_some() {
            let declared = sid.and_then(|s| self.symbols.get(s)).map(|s| s.ty.clone());
            if let Some(declared) = declared {
                if !self.assign_ok(&declared, &value_ty) {
                    self.diagnostics.push(semantic::type_mismatch(
                        &declared.to_string(),
                        &value_ty.to_string(),
                        c.value.pos,
                    ));
                }
            }
        } else if let Some(symbol) = sid.and_then(|s| self.symbols.get_mut(s)) {
            symbol.ty = value_ty;
        }
    }

    // ===== member tables =====

    /// Build `base` into a published type whose member table reflects the
    /// header symbols currently in scope, and push it to the registry.
    fn publish_members(&mut self, base: Type, members: &[Located<Decl>]) -> Type {
        let mut published = base;
        for info in self.collect_member_infos(members) {
            published.add_member(info);
        }
        self.types.update(published.clone());
        published
    }

    /// Re-read the member symbols after bodies ran and republish, picking up
    /// initializer-inferred field types.
    fn republish_members(&mut self, name: &str, members: &[Located<Decl>]) {
        let Some(current) = self.types.get(name).cloned() else { return };
        self.publish_members(current, members);
    }

    /// Member table entries for a container's members, read from their
    /// symbols in the current scope.
    fn collect_member_infos(&self, members: &[Located<Decl>]) -> Vec<MemberInfo> {
        let mut infos = Vec::new();
        for member in members {
            let (name, kind) = match &member.node {
                Decl::Function(f) => (&f.name, MemberKind::Function),
                Decl::Sub(f) => (&f.name, MemberKind::Subroutine),
                Decl::Variable(v) => (&v.name, MemberKind::Field),
                Decl::Constant(c) => (&c.name, MemberKind::Constant),
                _ => continue,
            };
            let Some(symbol) = self.symbols.lookup_local(name).and_then(|id| self.symbols.get(id))
            else {
                continue;
            };
            infos.push(MemberInfo {
                name: symbol.name.clone(),
                ty: symbol.ty.clone(),
                kind,
                access: symbol.access,
                callable: symbol.kind.signature().cloned(),
            });
        }
        infos
    }

    /// Walk the base chain looking for the class itself. Cycles would make
    /// member lookup and assignability walks diverge, so they are rejected
    /// here, at the declaration.
    fn check_inheritance_cycle(&mut self, name: &str, pos: Pos) {
        let mut current = self.types.get(name).and_then(|t| t.base.clone());
        let mut hops = 0;
        while let Some(base_name) = current {
            if base_name.eq_ignore_ascii_case(name) {
                self.diagnostics.push(Diagnostic::error(
                    format!("Inheritance cycle: '{}' derives from itself", name),
                    pos,
                ));
                return;
            }
            hops += 1;
            if hops > 64 {
                return;
            }
            current = self.types.get(&base_name).and_then(|t| t.base.clone());
        }
    }
}
