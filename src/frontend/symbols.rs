//! Symbol table and scope management for Basil
//!
//! Scopes and symbols live in flat arenas; a scope points at its parent by
//! index and name resolution walks that chain outward. The table is built
//! and consumed by the semantic analyzer.
//!
//! ## Notes
//!
//! - Basil identifiers are case-insensitive, so every map key is the
//!   lowercased name while `Symbol::name` keeps the source spelling for
//!   diagnostics.
//! - Built-in callables are seeded into the global scope at construction
//!   with `Pos::default()` as their position. A user declaration at a real
//!   position replaces such a builtin without a redefinition error.

use std::collections::HashMap;

use crate::frontend::ast::{Access, Pos};
use crate::frontend::types::{CallableSig, ParamSig, Type};

/// Unique identifier for symbols
pub type SymbolId = usize;

/// Unique identifier for scopes
pub type ScopeId = usize;

/// Kind of scope. Drives return-type lookup, `Me` resolution, and the
/// instance/static rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Module,
    Class,
    Interface,
    Structure,
    Function,
    Subroutine,
    Block,
    Loop,
    With,
    Query,
}

/// Kind of symbol
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function(CallableSig),
    Subroutine(CallableSig),
    Class,
    Interface,
    Structure,
    Enum,
    EnumMember,
    Module,
    Namespace,
    TypeParameter,
}

impl SymbolKind {
    pub fn describe(&self) -> &'static str {
        match self {
            SymbolKind::Variable => "variable",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Function(_) => "function",
            SymbolKind::Subroutine(_) => "subroutine",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Structure => "structure",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumMember => "enum member",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
            SymbolKind::TypeParameter => "type parameter",
        }
    }

    /// Callable signature, when this symbol has one.
    pub fn signature(&self) -> Option<&CallableSig> {
        match self {
            SymbolKind::Function(sig) | SymbolKind::Subroutine(sig) => Some(sig),
            _ => None,
        }
    }
}

/// A symbol in the symbol table
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Source spelling.
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    /// Declaration site. `Pos::default()` marks a builtin.
    pub pos: Pos,
    /// Scope the symbol was defined in.
    pub scope: ScopeId,
    pub access: Access,
    pub is_constant: bool,
    pub is_shared: bool,
    /// False while only the declaration header has been seen.
    pub is_defined: bool,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Type, pos: Pos) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
            pos,
            scope: 0,
            access: Access::Public,
            is_constant: false,
            is_shared: false,
            is_defined: true,
        }
    }

    pub fn is_builtin(&self) -> bool {
        !self.pos.is_real()
    }

    pub fn is_callable(&self) -> bool {
        self.kind.signature().is_some()
    }
}

/// A scope containing symbol definitions
#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    /// Symbols defined here, keyed by lowercased name.
    symbols: HashMap<String, SymbolId>,
    /// Declared return type of a function scope.
    pub return_type: Option<Type>,
    /// The enclosing type on class/structure scopes, for `Me`.
    pub class_type: Option<Type>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, kind: ScopeKind) -> Self {
        Self {
            parent,
            kind,
            symbols: HashMap::new(),
            return_type: None,
            class_type: None,
        }
    }
}

/// Symbol table managing all named entities
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
    current_scope: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            symbols: Vec::new(),
            scopes: vec![Scope::new(None, ScopeKind::Global)],
            current_scope: 0,
        };
        table.add_builtins();
        table
    }

    /// Enter a new scope
    pub fn enter_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let new_scope = Scope::new(Some(self.current_scope), kind);
        self.scopes.push(new_scope);
        self.current_scope = self.scopes.len() - 1;
        self.current_scope
    }

    /// Exit the current scope. The global scope is never popped.
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current_scope].parent {
            self.current_scope = parent;
        }
    }

    pub fn current_scope_id(&self) -> ScopeId {
        self.current_scope
    }

    /// Jump back to a previously saved scope. The analyzer uses this to
    /// guarantee scope release on every exit path of a construct.
    pub fn restore_scope(&mut self, id: ScopeId) {
        debug_assert!(id < self.scopes.len());
        self.current_scope = id;
    }

    /// Define a symbol in the current scope. An existing entry under the
    /// same (case-insensitive) name is replaced; callers that want a
    /// redefinition error check `lookup_local` first.
    pub fn define(&mut self, mut symbol: Symbol) -> SymbolId {
        symbol.scope = self.current_scope;
        let key = symbol.name.to_ascii_lowercase();
        let id = self.symbols.len();
        self.scopes[self.current_scope].symbols.insert(key, id);
        self.symbols.push(symbol);
        id
    }

    /// Look up a symbol by name in the current scope chain
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let key = name.to_ascii_lowercase();
        let mut scope_idx = self.current_scope;
        loop {
            if let Some(&id) = self.scopes[scope_idx].symbols.get(&key) {
                return Some(id);
            }
            if let Some(parent) = self.scopes[scope_idx].parent {
                scope_idx = parent;
            } else {
                break;
            }
        }
        None
    }

    /// Look up a symbol only in the current scope (no parent lookup)
    pub fn lookup_local(&self, name: &str) -> Option<SymbolId> {
        self.scopes[self.current_scope]
            .symbols
            .get(&name.to_ascii_lowercase())
            .copied()
    }

    /// Get a symbol by ID
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    /// Get a mutable symbol by ID
    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id)
    }

    /// Get the current scope kind
    pub fn current_scope_kind(&self) -> ScopeKind {
        self.scopes[self.current_scope].kind
    }

    /// Check if we're inside a function or subroutine body
    pub fn in_callable(&self) -> bool {
        self.scope_chain()
            .any(|s| matches!(s.kind, ScopeKind::Function | ScopeKind::Subroutine))
    }

    /// Get the declared return type of the nearest enclosing function scope
    pub fn current_return_type(&self) -> Option<&Type> {
        self.scope_chain().find_map(|s| s.return_type.as_ref())
    }

    /// Set the return type for the current function scope
    pub fn set_return_type(&mut self, ty: Type) {
        self.scopes[self.current_scope].return_type = Some(ty);
    }

    /// Type of the nearest enclosing class/structure scope, for `Me`
    pub fn current_class_type(&self) -> Option<&Type> {
        self.scope_chain().find_map(|s| s.class_type.as_ref())
    }

    pub fn set_class_type(&mut self, ty: Type) {
        self.scopes[self.current_scope].class_type = Some(ty);
    }

    fn scope_chain(&self) -> impl Iterator<Item = &Scope> {
        let mut next = Some(self.current_scope);
        std::iter::from_fn(move || {
            let id = next?;
            let scope = &self.scopes[id];
            next = scope.parent;
            Some(scope)
        })
    }

    fn add_builtins(&mut self) {
        let object = Type::primitive("Object");
        let integer = Type::primitive("Integer");
        let double = Type::primitive("Double");
        let string = Type::primitive("String");

        // (name, params as (name, type, is param-array), return type, is function)
        let builtins: Vec<(&str, Vec<(&str, Type, bool)>, Type, bool)> = vec![
            ("Print", vec![("values", object.clone(), true)], Type::void(), false),
            ("Len", vec![("value", string.clone(), false)], integer.clone(), true),
            ("Abs", vec![("value", double.clone(), false)], double.clone(), true),
            ("Sqr", vec![("value", double.clone(), false)], double.clone(), true),
            ("Chr", vec![("code", integer.clone(), false)], string.clone(), true),
            ("Asc", vec![("ch", string.clone(), false)], integer.clone(), true),
            ("CInt", vec![("value", object.clone(), false)], integer.clone(), true),
            ("CDbl", vec![("value", object.clone(), false)], double.clone(), true),
            ("CStr", vec![("value", object.clone(), false)], string.clone(), true),
        ];

        for (name, params, return_type, is_function) in builtins {
            let sig = CallableSig {
                params: params
                    .into_iter()
                    .map(|(pname, ty, param_array)| ParamSig {
                        name: pname.to_string(),
                        ty,
                        optional: false,
                        param_array,
                        by_ref: false,
                    })
                    .collect(),
                return_type: return_type.clone(),
                type_params: Vec::new(),
            };
            let kind = if is_function {
                SymbolKind::Function(sig)
            } else {
                SymbolKind::Subroutine(sig)
            };
            self.define(Symbol::new(name, kind, return_type, Pos::default()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_lookup_walks_outward() {
        let mut table = SymbolTable::new();
        let outer = table.define(Symbol::new(
            "x",
            SymbolKind::Variable,
            Type::primitive("Integer"),
            Pos::new(1, 1),
        ));

        table.enter_scope(ScopeKind::Block);
        assert_eq!(table.lookup("x"), Some(outer));
        assert_eq!(table.lookup_local("x"), None);

        let inner = table.define(Symbol::new(
            "x",
            SymbolKind::Variable,
            Type::primitive("String"),
            Pos::new(2, 1),
        ));
        assert_eq!(table.lookup("x"), Some(inner));

        table.exit_scope();
        assert_eq!(table.lookup("x"), Some(outer));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut table = SymbolTable::new();
        table.define(Symbol::new(
            "Counter",
            SymbolKind::Variable,
            Type::primitive("Integer"),
            Pos::new(1, 1),
        ));
        assert!(table.lookup("counter").is_some());
        assert!(table.lookup("COUNTER").is_some());
    }

    #[test]
    fn test_builtins_carry_sentinel_position() {
        let table = SymbolTable::new();
        let print = table.lookup("print").unwrap();
        let sym = table.get(print).unwrap();
        assert!(sym.is_builtin());
        assert!(sym.is_callable());

        let len = table.get(table.lookup("Len").unwrap()).unwrap();
        let sig = len.kind.signature().unwrap();
        assert_eq!(sig.params.len(), 1);
        assert_eq!(sig.return_type, Type::primitive("Integer"));
    }

    #[test]
    fn test_return_type_found_through_nested_blocks() {
        let mut table = SymbolTable::new();
        table.enter_scope(ScopeKind::Function);
        table.set_return_type(Type::primitive("Double"));
        table.enter_scope(ScopeKind::Block);
        table.enter_scope(ScopeKind::Loop);

        assert!(table.in_callable());
        assert_eq!(table.current_return_type(), Some(&Type::primitive("Double")));
    }

    #[test]
    fn test_restore_scope_jumps_back() {
        let mut table = SymbolTable::new();
        let saved = table.current_scope_id();
        table.enter_scope(ScopeKind::Class);
        table.enter_scope(ScopeKind::Function);
        table.restore_scope(saved);
        assert_eq!(table.current_scope_kind(), ScopeKind::Global);
    }
}
