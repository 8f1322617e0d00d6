//! Abstract Syntax Tree definitions for Basil
//!
//! This module defines all AST node types for the Basil language, one closed
//! enum per tree level (declarations, statements, expressions, type
//! references) with a struct per node kind.
//!
//! ## Notes
//!
//! - Every node is wrapped in [`Located`], which carries the node's source
//!   position and a parse-unique [`NodeId`]. The semantic analyzer keys its
//!   node→type and node→symbol tables by that id.
//! - Children are owned exclusively; the AST is a tree, never a DAG.

use std::fmt;

/// Source position, 1-based line and column.
///
/// `Pos::default()` (line 0) is a sentinel reserved for symbols that have no
/// source location, such as the pre-registered standard-library builtins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// True for positions that refer to real source text.
    pub fn is_real(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Identifier for one AST node, unique within a single parse.
pub type NodeId = u32;

/// A node with source location and identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    pub node: T,
    pub pos: Pos,
    pub id: NodeId,
}

impl<T> Located<T> {
    pub fn new(node: T, pos: Pos, id: NodeId) -> Self {
        Self { node, pos, id }
    }
}

/// Identifier (plain string; Basil identifiers compare case-insensitively,
/// but the AST preserves source spelling)
pub type Ident = String;

/// A program is a sequence of declarations; executable statements are legal
/// at file scope (script style) and appear as [`Decl::Statement`].
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Located<Decl>>,
}

// ============================================================================
// Declarations
// ============================================================================

/// Access modifier on declarations. Basil defaults to `Public` when no
/// modifier is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Public,
    Private,
    Protected,
    Friend,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => write!(f, "Public"),
            Access::Private => write!(f, "Private"),
            Access::Protected => write!(f, "Protected"),
            Access::Friend => write!(f, "Friend"),
        }
    }
}

/// Declarations, at file scope and inside namespace/module/class bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Namespace(NamespaceDecl),
    Module(ModuleDecl),
    Class(ClassDecl),
    Interface(InterfaceDecl),
    Structure(StructureDecl),
    Enum(EnumDecl),
    Function(CallableDecl),
    Sub(CallableDecl),
    Variable(VarDecl),
    Constant(ConstDecl),
    /// Executable statement at declaration position (script-style top level).
    Statement(Located<Stmt>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    pub name: Ident,
    pub body: Vec<Located<Decl>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDecl {
    pub name: Ident,
    pub access: Access,
    pub body: Vec<Located<Decl>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Ident,
    pub access: Access,
    /// `MustInherit`
    pub is_abstract: bool,
    pub type_params: Vec<Ident>,
    pub inherits: Option<Located<TypeRef>>,
    pub implements: Vec<Located<TypeRef>>,
    pub members: Vec<Located<Decl>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: Ident,
    pub access: Access,
    pub type_params: Vec<Ident>,
    /// Function/Sub signatures without bodies.
    pub members: Vec<Located<Decl>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureDecl {
    pub name: Ident,
    pub access: Access,
    pub members: Vec<Located<Decl>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Ident,
    pub access: Access,
    pub variants: Vec<EnumVariant>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: Ident,
    pub value: Option<i64>,
    pub pos: Pos,
}

/// Which callable form a [`CallableDecl`] was declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Function,
    Sub,
}

impl fmt::Display for CallableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallableKind::Function => write!(f, "Function"),
            CallableKind::Sub => write!(f, "Sub"),
        }
    }
}

/// Shared payload for `Function` and `Sub` declarations.
///
/// `body` is `None` for interface members and `MustOverride` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct CallableDecl {
    pub name: Ident,
    pub access: Access,
    pub is_shared: bool,
    /// `MustOverride`
    pub is_abstract: bool,
    /// `Overrides`
    pub is_override: bool,
    pub type_params: Vec<Ident>,
    pub params: Vec<Param>,
    /// `None` for Subs; a Function without an `As` clause defaults to Object.
    pub return_type: Option<Located<TypeRef>>,
    pub body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<Located<TypeRef>>,
    /// `ByRef` (default is `ByVal`)
    pub by_ref: bool,
    pub optional: bool,
    pub param_array: bool,
    /// Default value, required for `Optional` parameters.
    pub default: Option<Located<Expr>>,
    pub pos: Pos,
}

/// `Dim` declaration, at member or statement position.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Ident,
    pub access: Access,
    pub is_shared: bool,
    pub ty: Option<Located<TypeRef>>,
    pub init: Option<Located<Expr>>,
}

/// `Const` declaration, at member or statement position.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: Ident,
    pub access: Access,
    pub ty: Option<Located<TypeRef>>,
    pub value: Located<Expr>,
}

// ============================================================================
// Statements
// ============================================================================

/// A statement block (the body of a construct up to its terminator).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Located<Stmt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Variable(VarDecl),
    Constant(ConstDecl),
    Assign(AssignStmt),
    /// Call used as a statement.
    Expression(Located<Expr>),
    If(IfStmt),
    Select(SelectStmt),
    For(ForStmt),
    ForEach(ForEachStmt),
    While(WhileStmt),
    DoLoop(DoLoopStmt),
    Try(TryStmt),
    With(WithStmt),
    Return(Option<Located<Expr>>),
    Exit(ExitKind),
    Throw(Located<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Set,
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `*=`
    Mul,
    /// `/=`
    Div,
    /// `&=`
    Concat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub target: Located<Expr>,
    pub op: AssignOp,
    pub value: Located<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Located<Expr>,
    pub then_block: Block,
    pub else_ifs: Vec<ElseIf>,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub cond: Located<Expr>,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub subject: Located<Expr>,
    pub cases: Vec<CaseClause>,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub labels: Vec<Located<Expr>>,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub var: Ident,
    pub var_pos: Pos,
    pub from: Located<Expr>,
    pub to: Located<Expr>,
    pub step: Option<Located<Expr>>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForEachStmt {
    pub var: Ident,
    pub var_pos: Pos,
    /// Optional `As T` on the range variable.
    pub var_ty: Option<Located<TypeRef>>,
    pub iterable: Located<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub cond: Located<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoLoopStmt {
    /// `None` for a bare `Do ... Loop` (exits via `Exit Do`).
    pub cond: Option<Located<Expr>>,
    /// `Do Until` / `Loop Until` negate the condition.
    pub until: bool,
    /// Condition attached to `Loop` rather than `Do` (body runs at least once).
    pub post_test: bool,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Block,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// `Catch ex As T`; a bare `Catch` has neither name nor type.
    pub var: Option<Ident>,
    pub var_pos: Pos,
    pub ty: Option<Located<TypeRef>>,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithStmt {
    pub subject: Located<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Sub,
    Function,
    For,
    While,
    Do,
    Select,
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Sub => write!(f, "Sub"),
            ExitKind::Function => write!(f, "Function"),
            ExitKind::For => write!(f, "For"),
            ExitKind::While => write!(f, "While"),
            ExitKind::Do => write!(f, "Do"),
            ExitKind::Select => write!(f, "Select"),
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Nothing,
    Identifier(Ident),
    Me,
    MyBase,
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Call(CallExpr),
    Member(MemberExpr),
    Index(IndexExpr),
    New(NewExpr),
    Cast(CastExpr),
    Query(QueryExpr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// `\` integer division
    IntDiv,
    Mod,
    /// `&` string concatenation
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    AndAlso,
    OrElse,
}

impl BinaryOp {
    pub fn is_arithmetic(&self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div)
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, BinaryOp::IntDiv | BinaryOp::Mod)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self, BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge)
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::AndAlso | BinaryOp::OrElse)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::IntDiv => "\\",
            BinaryOp::Mod => "Mod",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "And",
            BinaryOp::Or => "Or",
            BinaryOp::AndAlso => "AndAlso",
            BinaryOp::OrElse => "OrElse",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Unary minus
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "Not"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Located<Expr>>,
    pub right: Box<Located<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: Box<Located<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Box<Located<Expr>>,
    pub args: Vec<Located<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpr {
    /// `None` for leading-dot access inside a `With` block.
    pub target: Option<Box<Located<Expr>>>,
    pub member: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub target: Box<Located<Expr>>,
    pub indices: Vec<Located<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewExpr {
    pub ty: Located<TypeRef>,
    pub args: Vec<Located<Expr>>,
}

/// `CType(expr, T)`
#[derive(Debug, Clone, PartialEq)]
pub struct CastExpr {
    pub expr: Box<Located<Expr>>,
    pub ty: Located<TypeRef>,
}

// ============================================================================
// Query expressions
// ============================================================================

/// `From x In xs [clauses...]`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryExpr {
    pub var: Ident,
    pub var_pos: Pos,
    pub source: Box<Located<Expr>>,
    pub clauses: Vec<Located<QueryClause>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryClause {
    Where(Located<Expr>),
    Select(Located<Expr>),
    OrderBy {
        key: Located<Expr>,
        descending: bool,
    },
    /// `Group By key Into g`
    GroupBy {
        key: Located<Expr>,
        group: Ident,
        group_pos: Pos,
    },
    /// `Join y In src On left Equals right [Into g]`
    Join {
        var: Ident,
        var_pos: Pos,
        source: Located<Expr>,
        left_key: Located<Expr>,
        right_key: Located<Expr>,
        /// Group join: bind the joined group instead of flattening.
        group: Option<Ident>,
    },
    /// `Aggregate v In src Into name = expr`
    Aggregate {
        var: Ident,
        var_pos: Pos,
        source: Located<Expr>,
        result: Ident,
        result_pos: Pos,
        value: Located<Expr>,
    },
    Let {
        name: Ident,
        name_pos: Pos,
        value: Located<Expr>,
    },
    Take(Located<Expr>),
    Skip(Located<Expr>),
    Distinct,
}

// ============================================================================
// Type references
// ============================================================================

/// A syntactic type reference, resolved to a `Type` by the analyzer.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Named(Ident),
    /// `Name(Of A, B)`
    Generic(Ident, Vec<Located<TypeRef>>),
    /// `T[]`, `T[5]`, `T[,]` — rank is the comma count plus one.
    Array {
        element: Box<Located<TypeRef>>,
        rank: u32,
        size: Option<u32>,
    },
    /// `T?`
    Nullable(Box<Located<TypeRef>>),
    /// `T Ptr`
    Pointer(Box<Located<TypeRef>>),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::Generic(name, args) => {
                write!(f, "{}(Of ", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg.node)?;
                }
                write!(f, ")")
            }
            TypeRef::Array { element, rank, size } => {
                write!(f, "{}[", element.node)?;
                if let Some(size) = size {
                    write!(f, "{}", size)?;
                }
                for _ in 1..*rank {
                    write!(f, ",")?;
                }
                write!(f, "]")
            }
            TypeRef::Nullable(inner) => write!(f, "{}?", inner.node),
            TypeRef::Pointer(inner) => write!(f, "{} Ptr", inner.node),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_display() {
        assert_eq!(Pos::new(3, 14).to_string(), "3:14");
        assert!(!Pos::default().is_real());
        assert!(Pos::new(1, 1).is_real());
    }

    #[test]
    fn test_type_ref_display() {
        let pos = Pos::new(1, 1);
        let int = Located::new(TypeRef::Named("Integer".to_string()), pos, 0);
        let arr = TypeRef::Array {
            element: Box::new(int.clone()),
            rank: 2,
            size: Some(4),
        };
        assert_eq!(arr.to_string(), "Integer[4,]");

        let generic = TypeRef::Generic("List".to_string(), vec![int]);
        assert_eq!(generic.to_string(), "List(Of Integer)");
    }
}
