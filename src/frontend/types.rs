//! Type representation and the central type registry for Basil
//!
//! Every type the analyzer hands out originates in the [`TypeManager`]:
//! primitives are registered at construction, user declarations register
//! their types during analysis, and derived forms (arrays, nullables,
//! pointers, generic instantiations) are built on demand.
//!
//! ## Notes
//!
//! - `Type` is a value: it is cloned freely and compared structurally.
//!   Equality is shallow (name, pointer flag, array rank, and
//!   recursively-equal generic arguments), so two independently built
//!   "array of Integer" values compare equal.
//! - Generic instantiation copies the unbound definition's member table and
//!   substitutes type parameters inside it, so `List(Of Integer)` exposes
//!   `Add(item As Integer)`.
//! - Type names compare case-insensitively, like every other Basil
//!   identifier.

use std::collections::HashMap;
use std::fmt;

use crate::frontend::ast::Access;

/// What sort of type this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Primitive,
    Class,
    Interface,
    Structure,
    Enum,
    TypeParameter,
    Array,
    Pointer,
    Nullable,
    Void,
}

/// Member kind inside a type's member table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Constant,
    Function,
    Subroutine,
    EnumMember,
}

/// One parameter of a callable signature.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSig {
    pub name: String,
    pub ty: Type,
    pub optional: bool,
    pub param_array: bool,
    pub by_ref: bool,
}

/// Signature of a function or subroutine, shared between symbols and type
/// member tables.
#[derive(Debug, Clone, PartialEq)]
pub struct CallableSig {
    pub params: Vec<ParamSig>,
    pub return_type: Type,
    pub type_params: Vec<String>,
}

impl CallableSig {
    /// Arguments that must be supplied: everything that is neither optional
    /// nor the trailing param-array.
    pub fn required_count(&self) -> usize {
        self.params
            .iter()
            .filter(|p| !p.optional && !p.param_array)
            .count()
    }

    /// Maximum argument count, or `None` when a trailing param-array absorbs
    /// any overflow.
    pub fn max_count(&self) -> Option<usize> {
        if self.params.last().is_some_and(|p| p.param_array) {
            None
        } else {
            Some(self.params.len())
        }
    }
}

/// A member of a class/interface/structure/enum type.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberInfo {
    pub name: String,
    pub ty: Type,
    pub kind: MemberKind,
    pub access: Access,
    /// Present for Function/Subroutine members.
    pub callable: Option<CallableSig>,
}

/// A Basil type value.
#[derive(Debug, Clone)]
pub struct Type {
    pub name: String,
    pub kind: TypeKind,
    /// Base class name (single inheritance); resolved through the manager.
    pub base: Option<String>,
    /// Implemented interface names.
    pub interfaces: Vec<String>,
    /// Bound arguments of a generic instantiation.
    pub generic_args: Vec<Type>,
    /// Element type for arrays, pointee for pointers, underlying for
    /// nullables.
    pub element: Option<Box<Type>>,
    /// Array rank (1 for `T[]`, 2 for `T[,]`, 0 for non-arrays).
    pub rank: u32,
    /// Declared first-dimension size, when the source gave one. Not part of
    /// type identity.
    pub size: Option<u32>,
    pub is_pointer: bool,
    pub is_nullable: bool,
    /// Member table, keyed by lowercased member name.
    pub members: HashMap<String, MemberInfo>,
    /// Declared type parameters of an unbound generic definition.
    pub type_params: Vec<String>,
}

impl Type {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            interfaces: Vec::new(),
            generic_args: Vec::new(),
            element: None,
            rank: 0,
            size: None,
            is_pointer: false,
            is_nullable: false,
            members: HashMap::new(),
            type_params: Vec::new(),
        }
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Primitive)
    }

    pub fn class(name: impl Into<String>) -> Self {
        let mut ty = Self::new(name, TypeKind::Class);
        if !ty.name.eq_ignore_ascii_case("Object") {
            ty.base = Some("Object".to_string());
        }
        ty
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Structure)
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Enum)
    }

    pub fn type_parameter(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::TypeParameter)
    }

    pub fn void() -> Self {
        Self::new("Void", TypeKind::Void)
    }

    /// The typeless `Nothing` literal; assignable to every type.
    pub fn nothing() -> Self {
        Self::new("Nothing", TypeKind::Primitive)
    }

    pub fn member(&self, name: &str) -> Option<&MemberInfo> {
        self.members.get(&name.to_ascii_lowercase())
    }

    pub fn add_member(&mut self, member: MemberInfo) {
        self.members.insert(member.name.to_ascii_lowercase(), member);
    }

    pub fn is_numeric(&self) -> bool {
        numeric_rank(&self.name).is_some()
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self.name.to_ascii_lowercase().as_str(),
            "byte" | "integer" | "long"
        ) && self.kind == TypeKind::Primitive
    }

    pub fn is_string(&self) -> bool {
        self.kind == TypeKind::Primitive && self.name.eq_ignore_ascii_case("String")
    }

    pub fn is_boolean(&self) -> bool {
        self.kind == TypeKind::Primitive && self.name.eq_ignore_ascii_case("Boolean")
    }

    pub fn is_object(&self) -> bool {
        self.name.eq_ignore_ascii_case("Object")
    }

    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    pub fn is_nothing(&self) -> bool {
        self.name.eq_ignore_ascii_case("Nothing")
    }

    pub fn is_type_parameter(&self) -> bool {
        self.kind == TypeKind::TypeParameter
    }

    /// True when an unbound type parameter appears anywhere in this type,
    /// including inside arrays, nullables, pointers, and generic arguments.
    pub fn mentions_type_parameter(&self) -> bool {
        self.is_type_parameter()
            || self.element.as_deref().is_some_and(Type::mentions_type_parameter)
            || self.generic_args.iter().any(Type::mentions_type_parameter)
    }

    pub fn is_array(&self) -> bool {
        self.kind == TypeKind::Array
    }

    /// Element type for arrays (and the underlying type for nullables).
    pub fn element_type(&self) -> Option<&Type> {
        self.element.as_deref()
    }
}

/// Structural equality: name + pointer flag + array rank + recursively-equal
/// generic arguments. Declared sizes and member tables are not identity.
impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && self.is_pointer == other.is_pointer
            && self.rank == other.rank
            && self.generic_args == other.generic_args
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generic_args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}(Of ", self.name)?;
            for (i, arg) in self.generic_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ")")
        }
    }
}

/// Promotion rank within the numeric tower. Higher wins when combining.
fn numeric_rank(name: &str) -> Option<u8> {
    match name.to_ascii_lowercase().as_str() {
        "byte" => Some(0),
        "integer" => Some(1),
        "long" => Some(2),
        "single" => Some(3),
        "double" => Some(4),
        _ => None,
    }
}

// ============================================================================
// Type manager
// ============================================================================

/// Central registry of named types.
///
/// Types are registered once (duplicates rejected) and looked up by
/// case-insensitive name thereafter. Derived forms are constructed on demand
/// and are not registered — their identity is structural.
#[derive(Debug)]
pub struct TypeManager {
    types: HashMap<String, Type>,
}

impl Default for TypeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeManager {
    pub fn new() -> Self {
        let mut manager = Self { types: HashMap::new() };
        for name in [
            "Integer", "Long", "Single", "Double", "String", "Boolean", "Char", "Byte",
        ] {
            manager.insert(Type::primitive(name));
        }
        // Object is the implicit root of the class hierarchy.
        manager.insert(Type::new("Object", TypeKind::Primitive));
        manager.insert(Type::void());
        manager.insert(builtin_list_type());
        manager
    }

    fn insert(&mut self, ty: Type) {
        self.types.insert(ty.name.to_ascii_lowercase(), ty);
    }

    /// Register a user-declared type. Returns false when the name is taken.
    pub fn register(&mut self, ty: Type) -> bool {
        let key = ty.name.to_ascii_lowercase();
        if self.types.contains_key(&key) {
            return false;
        }
        self.types.insert(key, ty);
        true
    }

    /// Replace an already-registered type (used to fill in member tables
    /// after a declaration body is analyzed).
    pub fn update(&mut self, ty: Type) {
        self.insert(ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.types.get(&name.to_ascii_lowercase())
    }

    pub fn integer(&self) -> Type {
        self.builtin("Integer")
    }

    pub fn long(&self) -> Type {
        self.builtin("Long")
    }

    pub fn single(&self) -> Type {
        self.builtin("Single")
    }

    pub fn double(&self) -> Type {
        self.builtin("Double")
    }

    pub fn string(&self) -> Type {
        self.builtin("String")
    }

    pub fn boolean(&self) -> Type {
        self.builtin("Boolean")
    }

    pub fn object(&self) -> Type {
        self.builtin("Object")
    }

    pub fn void(&self) -> Type {
        self.builtin("Void")
    }

    fn builtin(&self, name: &str) -> Type {
        // Builtins are seeded in `new`, so the lookup cannot fail.
        self.types[&name.to_ascii_lowercase()].clone()
    }

    /// Build an array type. Size participates in the value (for diagnostics
    /// and lowering) but not in equality.
    pub fn array_of(&self, element: Type, rank: u32, size: Option<u32>) -> Type {
        let commas = ",".repeat(rank.saturating_sub(1) as usize);
        let mut ty = Type::new(format!("{}[{}]", element, commas), TypeKind::Array);
        ty.rank = rank;
        ty.size = size;
        ty.element = Some(Box::new(element));
        ty
    }

    pub fn pointer_to(&self, pointee: Type) -> Type {
        let mut ty = Type::new(format!("{} Ptr", pointee), TypeKind::Pointer);
        ty.is_pointer = true;
        ty.element = Some(Box::new(pointee));
        ty
    }

    /// Wrap a type as nullable, keeping a back-reference to the underlying
    /// type in `element`.
    pub fn nullable_of(&self, underlying: Type) -> Type {
        let mut ty = Type::new(format!("{}?", underlying), TypeKind::Nullable);
        ty.is_nullable = true;
        ty.element = Some(Box::new(underlying));
        ty
    }

    /// Instantiate a generic definition with bound arguments.
    ///
    /// The member table is copied from the unbound definition with every
    /// occurrence of a type parameter replaced by the matching argument.
    /// Returns `None` when the name is unknown, is not generic, or the
    /// argument count does not match.
    pub fn instantiate(&self, name: &str, args: Vec<Type>) -> Option<Type> {
        let def = self.get(name)?;
        if def.type_params.is_empty() || def.type_params.len() != args.len() {
            return None;
        }

        let map: HashMap<String, Type> = def
            .type_params
            .iter()
            .map(|p| p.to_ascii_lowercase())
            .zip(args.iter().cloned())
            .collect();

        let mut instance = def.clone();
        instance.generic_args = args;
        instance.type_params = Vec::new();
        for member in instance.members.values_mut() {
            member.ty = substitute(&member.ty, &map);
            if let Some(sig) = &mut member.callable {
                sig.return_type = substitute(&sig.return_type, &map);
                for param in &mut sig.params {
                    param.ty = substitute(&param.ty, &map);
                }
            }
        }
        Some(instance)
    }

    /// The common type of two numeric operands, by promotion order
    /// Double > Single > Long > Integer (Byte promotes to Integer).
    pub fn common_numeric(&self, a: &Type, b: &Type) -> Option<Type> {
        let ra = numeric_rank(&a.name)?;
        let rb = numeric_rank(&b.name)?;
        let winner = if ra >= rb { a } else { b };
        if numeric_rank(&winner.name) == Some(0) {
            // Byte arithmetic widens to Integer.
            return Some(self.integer());
        }
        Some(winner.clone())
    }

    /// Can a value of type `value` be assigned to a target of type `target`?
    pub fn assignable(&self, target: &Type, value: &Type) -> bool {
        if target == value || value.is_nothing() || target.is_object() {
            return true;
        }
        // Numeric widening only (narrowing requires an explicit cast).
        if let (Some(rt), Some(rv)) = (numeric_rank(&target.name), numeric_rank(&value.name)) {
            return rv <= rt;
        }
        // Nullable targets accept their underlying type.
        if target.is_nullable {
            if let Some(underlying) = target.element_type() {
                return self.assignable(underlying, value);
            }
        }
        // Walk the value's inheritance chain toward the target.
        if target.kind == TypeKind::Class || target.kind == TypeKind::Interface {
            return self.derives_from(value, &target.name);
        }
        false
    }

    /// True when `ty` (or an ancestor) is named `ancestor` or implements it.
    pub fn derives_from(&self, ty: &Type, ancestor: &str) -> bool {
        if ty.name.eq_ignore_ascii_case(ancestor) {
            return true;
        }
        if ty.interfaces.iter().any(|i| i.eq_ignore_ascii_case(ancestor)) {
            return true;
        }
        let mut current = ty.base.clone();
        let mut hops = 0;
        while let Some(base_name) = current {
            // Inheritance cycles are rejected at declaration time; the hop
            // bound keeps this loop safe against malformed registries anyway.
            if hops > 64 {
                return false;
            }
            if base_name.eq_ignore_ascii_case(ancestor) {
                return true;
            }
            let Some(base) = self.get(&base_name) else {
                return false;
            };
            if base.interfaces.iter().any(|i| i.eq_ignore_ascii_case(ancestor)) {
                return true;
            }
            current = base.base.clone();
            hops += 1;
        }
        false
    }
}

/// Replace type parameters (by case-insensitive name) with bound arguments.
fn substitute(ty: &Type, map: &HashMap<String, Type>) -> Type {
    if ty.kind == TypeKind::TypeParameter {
        if let Some(bound) = map.get(&ty.name.to_ascii_lowercase()) {
            return bound.clone();
        }
        return ty.clone();
    }
    let mut out = ty.clone();
    if let Some(element) = &ty.element {
        out.element = Some(Box::new(substitute(element, map)));
    }
    out.generic_args = ty.generic_args.iter().map(|a| substitute(a, map)).collect();
    out
}

/// The built-in `List(Of T)` collection definition.
fn builtin_list_type() -> Type {
    let mut list = Type::class("List");
    list.type_params = vec!["T".to_string()];
    let t = Type::type_parameter("T");
    list.add_member(MemberInfo {
        name: "Count".to_string(),
        ty: Type::primitive("Integer"),
        kind: MemberKind::Field,
        access: Access::Public,
        callable: None,
    });
    list.add_member(MemberInfo {
        name: "Add".to_string(),
        ty: Type::void(),
        kind: MemberKind::Subroutine,
        access: Access::Public,
        callable: Some(CallableSig {
            params: vec![ParamSig {
                name: "item".to_string(),
                ty: t.clone(),
                optional: false,
                param_array: false,
                by_ref: false,
            }],
            return_type: Type::void(),
            type_params: Vec::new(),
        }),
    });
    list.add_member(MemberInfo {
        name: "Item".to_string(),
        ty: t.clone(),
        kind: MemberKind::Function,
        access: Access::Public,
        callable: Some(CallableSig {
            params: vec![ParamSig {
                name: "index".to_string(),
                ty: Type::primitive("Integer"),
                optional: false,
                param_array: false,
                by_ref: false,
            }],
            return_type: t,
            type_params: Vec::new(),
        }),
    });
    list
}
