//! Statement trees. A program is a `File` statement whose items are the
//! top-level declarations; the semantic phases walk these trees once per
//! pass and never mutate them.

use bitflags::bitflags;
use ember_source::{identifier::Identifier, SourceLocation};

use crate::{
    expr::Expr,
    op::BranchKind,
    ty::TypeExpr,
};

bitflags! {
    /// Modifiers on variable declarations.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct VarModifiers: u8 {
        const CONST = 1 << 0;
        const WRITE_ONLY = 1 << 1;
        const EXTERN = 1 << 2;
    }
}

/// An attribute attached via an [`StmtKind::Attribution`] wrapper,
/// e.g. `#[compile_if(...)]`, `#[irq]`, `#[nmi]`, `#[fallthrough]`, or a
/// platform mode attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: Identifier,
    pub arguments: Vec<Expr>,
    pub location: SourceLocation,
}

/// One declared member of an `enum`. Members without an explicit value
/// auto-increment from the previous explicit one.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMemberDecl {
    pub name: Identifier,
    pub value: Option<Expr>,
    pub location: SourceLocation,
}

/// One declared member of a `struct` or `union`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructMemberDecl {
    pub name: Identifier,
    pub ty: TypeExpr,
    pub location: SourceLocation,
}

/// A function parameter. Parameters use designated storage types, so the
/// type expression names the register or location the argument arrives in.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: Identifier,
    pub ty: TypeExpr,
    pub location: SourceLocation,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StructKind {
    Struct,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub location: SourceLocation,
}

impl Stmt {
    pub fn new(kind: StmtKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// A whole module file. Its scope is linked as a recursive import of
    /// the enclosing scope, making file contents transparently visible.
    File { name: Identifier, items: Vec<Stmt> },

    /// `import path;` — re-links a previously registered module scope.
    ImportReference { pieces: Vec<Identifier> },

    /// Attribute wrapper around any statement.
    Attribution { attributes: Vec<Attribute>, body: Box<Stmt> },

    /// `bank name @ address : [kind; capacity];`
    Bank { names: Vec<Identifier>, addresses: Vec<Option<Expr>>, ty: TypeExpr },

    /// `in bank @ address { ... }`
    In { pieces: Vec<Identifier>, address: Option<Expr>, body: Vec<Stmt> },

    Namespace { name: Identifier, body: Vec<Stmt> },

    /// `let name(params) = expr;`
    Let { name: Identifier, parameters: Vec<Identifier>, value: Expr },

    Enum { name: Identifier, underlying: TypeExpr, members: Vec<EnumMemberDecl> },

    Struct { kind: StructKind, name: Identifier, members: Vec<StructMemberDecl> },

    /// `var`/`const`/`writeonly` declarations, possibly `extern`, possibly
    /// with explicit `@ address` per name.
    Var {
        modifiers: VarModifiers,
        names: Vec<Identifier>,
        addresses: Vec<Option<Expr>>,
        ty: Option<TypeExpr>,
        value: Option<Expr>,
    },

    TypeAlias { name: Identifier, ty: TypeExpr },

    Func {
        inlined: bool,
        far: bool,
        name: Identifier,
        parameters: Vec<ParamDecl>,
        return_type: Option<TypeExpr>,
        body: Vec<Stmt>,
    },

    /// `name:`
    Label { name: Identifier },

    /// `goto`/`return`/`break`/... with optional `if condition`. The
    /// distance hint counts `^` sigils (0 = near).
    Branch {
        distance_hint: u32,
        kind: BranchKind,
        destination: Option<Expr>,
        return_value: Option<Expr>,
        condition: Option<Expr>,
    },

    If { distance_hint: u32, condition: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt> },

    While { distance_hint: u32, condition: Expr, body: Vec<Stmt> },

    DoWhile { distance_hint: u32, body: Vec<Stmt>, condition: Expr },

    /// `for counter in sequence { ... }` where sequence is a range.
    For { distance_hint: u32, counter: Expr, sequence: Expr, body: Vec<Stmt> },

    /// `inline for let name in sequence { ... }` — fully unrolled.
    InlineFor { name: Identifier, sequence: Expr, body: Vec<Stmt> },

    ExpressionStatement(Expr),

    /// `config { key = expr; ... }`
    Config { items: Vec<(Identifier, Expr)> },
}
