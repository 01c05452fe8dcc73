//! The semantic data model: definitions created by the resolver phases,
//! the resolved type store, hierarchical symbol tables, and bank images.
//!
//! Everything here is held in grow-only stores indexed by stable typed
//! ids; definitions are never removed once created, so ids stay valid
//! until compiler teardown.

pub mod bank;
pub mod defs;
pub mod scope;
pub mod ty;

pub use bank::{Bank, BankError, BankKind};
pub use defs::{
    Address, BankDef, DefKind, Definition, DefStore, EnumDef, EnumMemberDef, FuncDef, IntTypeDef,
    LetDef, LetKind, LoadIntrinsicDef, NamespaceDef, RegisterDef, StructDef, StructMemberDef,
    TypeAliasDef, VarDef,
};
pub use scope::{Scope, ScopeStore};
pub use ty::{FnSig, Ty, TyStore};

ember_utils::index_vec::define_index_type! {
    /// Index of a [Scope] in the [ScopeStore].
    pub struct ScopeId = u32;

    MAX_INDEX = i32::max_value() as usize;
    DISABLE_MAX_INDEX_CHECK = cfg!(not(debug_assertions));
}

ember_utils::index_vec::define_index_type! {
    /// Index of a registered [Bank].
    pub struct BankId = u32;

    MAX_INDEX = i32::max_value() as usize;
    DISABLE_MAX_INDEX_CHECK = cfg!(not(debug_assertions));
}
