//! Semantic analysis for Basil programs.
//!
//! Resolves every identifier to a [`Symbol`], infers and checks a static
//! [`Type`] for every expression, and records both in side tables keyed by
//! [`NodeId`] so later stages (IR lowering, tooling) can query them without
//! re-deriving anything.
//!
//! ## Notes
//!
//! - **Collect, then check**: type names are registered first, and each
//!   container declares its member headers before any body runs, so
//!   within-file forward references resolve without a linking step.
//! - **Error accumulation**: diagnostics are collected, never thrown, and the
//!   walk always covers the whole tree. [`SemanticAnalyzer::analyze`] returns
//!   `false` only when at least one `Error`-severity diagnostic was recorded;
//!   warnings alone still pass.
//! - **Recovery trees**: the parser hands over best-effort trees after syntax
//!   errors. A panic anywhere in the walk is caught at the `analyze` boundary
//!   and reported as a single internal-error diagnostic instead of crashing
//!   the caller.

mod decl;
mod expr;
mod stmt;


use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::frontend::ast::{ExitKind, Ident, Located, NodeId, Pos, Program, TypeRef};
use crate::frontend::diagnostics::{Diagnostic, Severity, semantic};
use crate::frontend::symbols::{ScopeKind, Symbol, SymbolId, SymbolKind, SymbolTable};
use crate::frontend::types::{Type, TypeManager};

/// Scope and type resolution over a parsed [`Program`].
///
/// Create one per run, call [`analyze`](Self::analyze), then query
/// [`node_type`](Self::node_type), [`node_symbol`](Self::node_symbol), and
/// [`diagnostics`](Self::diagnostics).
pub struct SemanticAnalyzer {
    /// Scope tree and symbol arena, pre-seeded with the builtin callables.
    pub(crate) symbols: SymbolTable,
    /// Named-type registry, pre-seeded with the primitives.
    pub(crate) types: TypeManager,
    /// Accumulated errors and warnings.
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Resolved type per AST node.
    pub(crate) node_types: HashMap<NodeId, Type>,
    /// Resolved symbol per AST node that names one.
    pub(crate) node_symbols: HashMap<NodeId, SymbolId>,
    /// Inside a `Shared` method or a `Module` body, where `Me` is invalid.
    pub(crate) shared_context: bool,
    /// Constructs an `Exit` statement may currently target, innermost last.
    pub(crate) exit_targets: Vec<ExitKind>,
    /// Subject types of enclosing `With` blocks, innermost last.
    pub(crate) with_subjects: Vec<Type>,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::new(),
            types: TypeManager::new(),
            diagnostics: Vec::new(),
            node_types: HashMap::new(),
            node_symbols: HashMap::new(),
            shared_context: false,
            exit_targets: Vec::new(),
            with_subjects: Vec::new(),
        }
    }

    /// Walk `program`, filling the side tables and the diagnostic list.
    ///
    /// Returns `true` when no `Error`-severity diagnostic was recorded.
    /// Warnings do not fail the run. Safe to call on trees produced by parser
    /// recovery: an internal panic is converted into a single diagnostic.
    #[tracing::instrument(skip_all, fields(decl_count = program.body.len()))]
    pub fn analyze(&mut self, program: &Program) -> bool {
        let walk = panic::catch_unwind(AssertUnwindSafe(|| self.run(program)));
        if let Err(payload) = walk {
            let message = panic_message(payload.as_ref());
            self.diagnostics.push(Diagnostic::error(
                format!("internal analyzer error: {message}"),
                Pos::default(),
            ));
        }
        let errors = self.diagnostics.iter().filter(|d| d.severity == Severity::Error).count();
        tracing::debug!(
            errors,
            warnings = self.diagnostics.len() - errors,
            symbols = self.node_symbols.len(),
            "analysis complete"
        );
        !self.has_errors()
    }

    /// True when at least one `Error`-severity diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Resolved type of an AST node, if the walk reached it.
    pub fn node_type(&self, id: NodeId) -> Option<&Type> {
        self.node_types.get(&id)
    }

    /// Symbol an AST node resolved to, for nodes that name one.
    pub fn node_symbol(&self, id: NodeId) -> Option<&Symbol> {
        self.node_symbols.get(&id).and_then(|&sid| self.symbols.get(sid))
    }

    fn run(&mut self, program: &Program) {
        self.register_type_names(&program.body);
        self.declare_members(&program.body);
        for decl in &program.body {
            self.analyze_decl(decl);
        }
    }

    // ===== shared helpers =====

    /// Run `f` inside a fresh child scope, restoring the surrounding scope on
    /// exit.
    pub(crate) fn with_scope<T>(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.symbols.current_scope_id();
        self.symbols.enter_scope(kind);
        let value = f(self);
        self.symbols.restore_scope(saved);
        value
    }

    /// Register each generic type parameter as a placeholder symbol in the
    /// current scope, where it shadows any real type of the same name.
    pub(crate) fn bind_type_params(&mut self, names: &[Ident]) {
        for name in names {
            let ty = Type::type_parameter(name.as_str());
            self.symbols
                .define(Symbol::new(name.as_str(), SymbolKind::TypeParameter, ty, Pos::default()));
        }
    }

    /// Resolve a syntactic type reference to a concrete [`Type`].
    ///
    /// Unknown names report a diagnostic and fall back to `Object` so the
    /// walk can keep typing the rest of the tree.
    pub(crate) fn resolve_type_ref(&mut self, tr: &Located<TypeRef>) -> Type {
        let ty = match &tr.node {
            TypeRef::Named(name) => self.resolve_named(name, tr.pos),
            TypeRef::Generic(name, args) => {
                let args: Vec<Type> = args.iter().map(|arg| self.resolve_type_ref(arg)).collect();
                match self.types.instantiate(name, args) {
                    Some(ty) => ty,
                    None => {
                        self.diagnostics.push(semantic::unknown_type(name, tr.pos));
                        self.types.object()
                    }
                }
            }
            TypeRef::Array { element, rank, size } => {
                let element = self.resolve_type_ref(element);
                self.types.array_of(element, *rank, *size)
            }
            TypeRef::Nullable(inner) => {
                let inner = self.resolve_type_ref(inner);
                self.types.nullable_of(inner)
            }
            TypeRef::Pointer(inner) => {
                let inner = self.resolve_type_ref(inner);
                self.types.pointer_to(inner)
            }
        };
        self.node_types.insert(tr.id, ty.clone());
        ty
    }

    /// Plain name lookup. A type parameter bound in the scope chain wins over
    /// a registered type, so `T` inside `Function F(Of T)` stays a
    /// placeholder.
    fn resolve_named(&mut self, name: &str, pos: Pos) -> Type {
        if let Some(symbol) = self.symbols.lookup(name).and_then(|id| self.symbols.get(id)) {
            if matches!(symbol.kind, SymbolKind::TypeParameter) {
                return symbol.ty.clone();
            }
        }
        match self.types.get(name) {
            Some(ty) => ty.clone(),
            None => {
                self.diagnostics.push(semantic::unknown_type(name, pos));
                self.types.object()
            }
        }
    }

    /// Assignability with the type-parameter deferral rule: a check touching
    /// an unbound type parameter is skipped rather than guessed at.
    pub(crate) fn assign_ok(&self, target: &Type, value: &Type) -> bool {
        if target.mentions_type_parameter() || value.mentions_type_parameter() {
            return true;
        }
        self.types.assignable(target, value)
    }

    /// Element type for iteration and queries: statically known only for
    /// arrays, `Object` otherwise.
    pub(crate) fn element_of(&self, ty: &Type) -> Type {
        match ty.element_type() {
            Some(element) => element.clone(),
            None => self.types.object(),
        }
    }

    /// Prefer the registry's view of a named type. Symbols can hold a copy
    /// taken before the member table was filled in.
    pub(crate) fn freshen(&self, ty: Type) -> Type {
        if ty.generic_args.is_empty() && !ty.is_array() && !ty.is_type_parameter() {
            if let Some(fresh) = self.types.get(&ty.name) {
                return fresh.clone();
            }
        }
        ty
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze `program` with a fresh analyzer, returning it for inspection.
pub fn analyze(program: &Program) -> SemanticAnalyzer {
    let mut analyzer = SemanticAnalyzer::new();
    analyzer.analyze(program);
    analyzer
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown cause"
    }
}
