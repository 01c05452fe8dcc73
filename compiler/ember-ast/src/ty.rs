//! Type expressions as written in source. These are resolved into the
//! semantic type store by the definition resolver.

use bitflags::bitflags;
use ember_source::{identifier::Identifier, SourceLocation};

use crate::{expr::Expr, DefId};

bitflags! {
    /// Qualifiers on pointer element types.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct PtrQualifiers: u8 {
        const CONST = 1 << 0;
        const WRITE_ONLY = 1 << 1;
        const FAR = 1 << 2;
    }
}

/// A type expression with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub location: SourceLocation,
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// `[T; n]`, with the size expression absent for unsized arrays.
    Array { element: Box<TypeExpr>, size: Option<Box<Expr>> },

    /// `*T`, `*const T`, `far *T`, ...
    Pointer { element: Box<TypeExpr>, qualifiers: PtrQualifiers },

    /// `func(T, U) -> R`, with the far flag for cross-bank functions.
    Function { parameters: Vec<TypeExpr>, return_type: Box<TypeExpr>, far: bool },

    /// `(T, U, ...)`.
    Tuple(Vec<TypeExpr>),

    /// An unresolved dotted name.
    Identifier(Vec<Identifier>),

    /// A name already bound to a type-producing definition.
    ResolvedIdentifier(DefId),

    /// `typeof(expr)`.
    TypeOf(Box<Expr>),

    /// `T in holder` — a typed view bound to a specific L-value, typically
    /// a register or a fixed memory location.
    DesignatedStorage { element: Box<TypeExpr>, holder: Box<Expr> },
}
