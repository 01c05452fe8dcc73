//! The Ember abstract syntax tree. The parser produces this tree and the
//! semantic phases treat it as immutable; reduced expressions are new
//! values, never mutations of parsed nodes.

pub mod expr;
pub mod op;
pub mod stmt;
pub mod ty;

pub use expr::{Expr, ExprFlags, ExprInfo, ExprKind, EvalContext, TypeQueryKind};
pub use op::{BinOp, BranchKind, UnOp};
pub use stmt::{
    Attribute, EnumMemberDecl, ParamDecl, Stmt, StmtKind, StructKind, StructMemberDecl,
    VarModifiers,
};
pub use ty::{PtrQualifiers, TypeExpr, TypeExprKind};

ember_utils::index_vec::define_index_type! {
    /// Opaque handle to a semantic [`Definition`] produced by the resolver
    /// phases. Expression nodes carry these after name resolution.
    pub struct DefId = u32;

    MAX_INDEX = i32::max_value() as usize;
    DISABLE_MAX_INDEX_CHECK = cfg!(not(debug_assertions));
}

ember_utils::index_vec::define_index_type! {
    /// Opaque handle to a resolved type in the semantic type store.
    pub struct TyId = u32;

    MAX_INDEX = i32::max_value() as usize;
    DISABLE_MAX_INDEX_CHECK = cfg!(not(debug_assertions));
}
