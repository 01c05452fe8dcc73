//! Expression trees. The same representation serves the parsed program and
//! the reducer's output: a reduced expression is a fresh tree whose
//! [ExprInfo] is populated.

use bitflags::bitflags;
use ember_source::{identifier::Identifier, string::InternedStr, SourceLocation};

use crate::{
    op::{BinOp, UnOp},
    stmt::Stmt,
    ty::TypeExpr,
    DefId, TyId,
};

/// When a reduced expression's value becomes known.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum EvalContext {
    /// A pure value available during compilation.
    CompileTime,
    /// Known only once addresses are assigned; re-reduced at emission.
    LinkTime,
    /// Computed at execution time by emitted instructions.
    RunTime,
}

bitflags! {
    /// Flags propagated through reduction.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct ExprFlags: u8 {
        const L_VALUE = 1 << 0;
        const CONST = 1 << 1;
        const WRITE_ONLY = 1 << 2;
        const FAR = 1 << 3;
    }
}

/// Populated by the expression reducer; every reduced expression carries
/// one with a non-null type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExprInfo {
    pub context: EvalContext,
    pub ty: TyId,
    pub flags: ExprFlags,
}

impl ExprInfo {
    pub fn new(context: EvalContext, ty: TyId, flags: ExprFlags) -> Self {
        Self { context, ty, flags }
    }
}

/// `sizeof` / `alignof`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TypeQueryKind {
    SizeOf,
    AlignOf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: SourceLocation,
    pub info: Option<ExprInfo>,
}

impl Expr {
    /// A parsed expression; `info` is filled in by reduction.
    pub fn new(kind: ExprKind, location: SourceLocation) -> Self {
        Self { kind, location, info: None }
    }

    /// A reduced expression carrying its [ExprInfo].
    pub fn reduced(kind: ExprKind, location: SourceLocation, info: ExprInfo) -> Self {
        Self { kind, location, info: Some(info) }
    }

    pub fn context(&self) -> Option<EvalContext> {
        self.info.map(|info| info.context)
    }

    pub fn ty(&self) -> Option<TyId> {
        self.info.map(|info| info.ty)
    }

    pub fn flags(&self) -> ExprFlags {
        self.info.map(|info| info.flags).unwrap_or(ExprFlags::empty())
    }

    /// The folded integer value, when reduction produced a literal.
    pub fn as_integer(&self) -> Option<i128> {
        match self.kind {
            ExprKind::IntegerLiteral(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self.kind {
            ExprKind::BooleanLiteral(value) => Some(value),
            _ => None,
        }
    }

    /// The referenced definition, for resolved identifiers.
    pub fn referenced_def(&self) -> Option<DefId> {
        match self.kind {
            ExprKind::ResolvedIdentifier(def, _) => Some(def),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntegerLiteral(i128),
    BooleanLiteral(bool),
    /// A byte-string literal; decays to `[u8; n]`.
    StringLiteral(InternedStr),

    /// An unresolved dotted path.
    Identifier(Vec<Identifier>),
    /// A path bound to a definition; the original pieces are retained for
    /// diagnostics.
    ResolvedIdentifier(DefId, Vec<Identifier>),

    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),

    Call { inlined: bool, callee: Box<Expr>, arguments: Vec<Expr> },
    Cast { operand: Box<Expr>, ty: TypeExpr },

    Tuple(Vec<Expr>),
    ArrayLiteral(Vec<Expr>),
    /// `[value; count]`.
    ArrayPad { value: Box<Expr>, count: Box<Expr> },
    /// `[body for var in sequence]`.
    ArrayComprehension { body: Box<Expr>, var: Identifier, sequence: Box<Expr> },
    /// `Type { .field = value, ... }`.
    StructLiteral { ty: TypeExpr, fields: Vec<(Identifier, Expr)> },

    /// `start .. end by step`.
    Range { start: Box<Expr>, end: Box<Expr>, step: Option<Box<Expr>> },

    FieldAccess { base: Box<Expr>, field: Identifier },

    /// `typeof(e)`; only meaningful nested inside a type expression.
    TypeOf(Box<Expr>),
    /// `sizeof(T)` / `alignof(T)`.
    TypeQuery { kind: TypeQueryKind, ty: TypeExpr },
    /// `offsetof(T, field)`.
    OffsetOf { ty: TypeExpr, field: Identifier },

    /// `embed "path"` — compile-time file inclusion.
    Embed(InternedStr),

    /// A statement evaluated for effect followed by a result expression.
    SideEffect { stmt: Box<Stmt>, result: Box<Expr> },
}
