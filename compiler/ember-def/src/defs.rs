//! Definitions: every named thing the resolver phases create. Definitions
//! live in a grow-only [DefStore] and are mutated after creation only in
//! the narrow, phase-ordered ways the fields below call out.

use ember_ast::{
    expr::Expr,
    op::BranchKind,
    stmt::{Stmt, StructKind, VarModifiers},
    ty::TypeExpr,
    DefId, TyId,
};
use ember_source::{identifier::Identifier, SourceLocation};
use ember_utils::index_vec::{index_vec, IndexVec};

use crate::{BankId, ScopeId};

/// A resolved storage address. `relative_position` is the offset within
/// the owning bank; `absolute_position` is the platform address once the
/// bank origin is known.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Address {
    pub bank: Option<BankId>,
    pub relative_position: Option<u32>,
    pub absolute_position: Option<u32>,
}

impl Address {
    pub fn absolute(bank: Option<BankId>, position: u32) -> Self {
        Self { bank, relative_position: None, absolute_position: Some(position) }
    }
}

/// A `var`/`const`/`writeonly` declaration.
#[derive(Debug, Clone)]
pub struct VarDef {
    pub modifiers: VarModifiers,
    /// Set for function-local declarations.
    pub enclosing_function: Option<DefId>,
    /// The `@` expression as written, if any.
    pub address_expr: Option<Expr>,
    pub type_expr: Option<TypeExpr>,
    /// Filled by resolver phase R2/R3.
    pub reduced_ty: Option<TyId>,
    /// Filled by `calculate_storage_size` in R3.
    pub storage_size: Option<usize>,
    /// The reduced initializer, when present.
    pub initializer: Option<Expr>,
    /// Assigned in R3 (explicit `@` / RAM reservation) or layout pass 1.
    pub address: Option<Address>,
}

/// A `func` declaration, or a synthesized/user label (labels are functions
/// with an empty body and `is_label` set).
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub inlined: bool,
    pub far: bool,
    pub is_label: bool,
    /// The return convention; `BranchKind::None` while expanding inline
    /// bodies so `return` rewrites to a jump.
    pub return_kind: BranchKind,
    pub parameters: Vec<DefId>,
    pub return_type_expr: Option<TypeExpr>,
    /// The resolved signature type, filled in R2.
    pub signature: Option<TyId>,
    pub body: Vec<Stmt>,
    /// The scope holding the parameters and body declarations.
    pub environment: ScopeId,
    /// `#[fallthrough]` suppresses the implicit trailing return.
    pub fallthrough: bool,
    /// Set during layout when every path through the body returns.
    pub has_unconditional_return: bool,
    /// Assigned by layout pass 1 for non-inline functions.
    pub address: Option<Address>,
}

/// How a `let` body is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetKind {
    /// An ordinary user `let`: the body expression is reduced in a child
    /// scope binding the parameters.
    User,
    /// `has_def("key")` — intrinsic over the driver's defines table.
    HasDef,
    /// `get_def("key", default)`.
    GetDef,
}

/// A compile-time `let` binding; with parameters, a compile-time function.
#[derive(Debug, Clone)]
pub struct LetDef {
    pub kind: LetKind,
    pub parameters: Vec<Identifier>,
    pub body: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct BankDef {
    pub type_expr: TypeExpr,
    pub address_expr: Option<Expr>,
    /// The registered bank instance, created in R2.
    pub bank: Option<BankId>,
}

#[derive(Debug, Clone)]
pub struct NamespaceDef {
    pub environment: ScopeId,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub underlying_expr: TypeExpr,
    /// The resolved underlying integer type, filled in R2.
    pub underlying: Option<TyId>,
    pub members: Vec<DefId>,
    /// The scope holding the member definitions, searched by dotted
    /// member access.
    pub environment: ScopeId,
    /// The enum's own nominal type.
    pub ty: Option<TyId>,
}

#[derive(Debug, Clone)]
pub struct EnumMemberDef {
    pub owner: DefId,
    pub value_expr: Option<Expr>,
    /// The member's resolved value, filled in R2.
    pub value: Option<i128>,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub kind: StructKind,
    pub members: Vec<DefId>,
    /// Total size in bytes: sum for structs, max for unions. Filled in R2.
    pub size: Option<usize>,
    pub ty: Option<TyId>,
}

#[derive(Debug, Clone)]
pub struct StructMemberDef {
    pub owner: DefId,
    pub type_expr: TypeExpr,
    pub ty: Option<TyId>,
    /// Byte offset from the start of the aggregate; 0 for union members.
    pub offset: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TypeAliasDef {
    pub type_expr: TypeExpr,
    pub ty: Option<TyId>,
}

/// A CPU register seeded by the platform.
#[derive(Debug, Clone)]
pub struct RegisterDef {
    pub ty: TyId,
    pub modifiers: VarModifiers,
}

/// A builtin bounded integer type seeded by the platform.
#[derive(Debug, Clone, Copy)]
pub struct IntTypeDef {
    pub size: usize,
    pub min: i128,
    pub max: i128,
}

impl IntTypeDef {
    pub fn contains(&self, value: i128) -> bool {
        self.min <= value && value <= self.max
    }
}

/// A builtin intrinsic returning a value, e.g. `pop()`.
#[derive(Debug, Clone, Copy)]
pub struct LoadIntrinsicDef {
    pub result: TyId,
}

#[derive(Debug, Clone)]
pub enum DefKind {
    Var(VarDef),
    Func(FuncDef),
    Let(LetDef),
    Bank(BankDef),
    Namespace(NamespaceDef),
    Enum(EnumDef),
    EnumMember(EnumMemberDef),
    Struct(StructDef),
    StructMember(StructMemberDef),
    TypeAlias(TypeAliasDef),
    BuiltinRegister(RegisterDef),
    BuiltinIntegerType(IntTypeDef),
    BuiltinBoolType,
    /// A bank-kind name such as `vardata`; carries its storage class.
    BuiltinBankType(crate::BankKind),
    BuiltinRangeType,
    BuiltinVoidIntrinsic,
    BuiltinLoadIntrinsic(LoadIntrinsicDef),
}

impl DefKind {
    /// A short noun for "wrong kind" diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            DefKind::Var(_) => "variable",
            DefKind::Func(def) if def.is_label => "label",
            DefKind::Func(_) => "function",
            DefKind::Let(_) => "let binding",
            DefKind::Bank(_) => "bank",
            DefKind::Namespace(_) => "namespace",
            DefKind::Enum(_) => "enum",
            DefKind::EnumMember(_) => "enum member",
            DefKind::Struct(_) => "struct",
            DefKind::StructMember(_) => "struct member",
            DefKind::TypeAlias(_) => "type alias",
            DefKind::BuiltinRegister(_) => "register",
            DefKind::BuiltinIntegerType(_) => "integer type",
            DefKind::BuiltinBoolType => "bool type",
            DefKind::BuiltinBankType(_) => "bank type",
            DefKind::BuiltinRangeType => "range type",
            DefKind::BuiltinVoidIntrinsic => "intrinsic",
            DefKind::BuiltinLoadIntrinsic(_) => "intrinsic",
        }
    }

    /// Whether referencing this definition names a type.
    pub fn produces_type(&self) -> bool {
        matches!(
            self,
            DefKind::Enum(_)
                | DefKind::Struct(_)
                | DefKind::TypeAlias(_)
                | DefKind::BuiltinIntegerType(_)
                | DefKind::BuiltinBoolType
                | DefKind::BuiltinBankType(_)
                | DefKind::BuiltinRangeType
        )
    }
}

/// A named definition with its declaration site and owning scope.
#[derive(Debug, Clone)]
pub struct Definition {
    pub name: Identifier,
    pub kind: DefKind,
    pub location: SourceLocation,
    pub parent_scope: ScopeId,
}

/// The grow-only definition pool.
#[derive(Debug, Default)]
pub struct DefStore {
    defs: IndexVec<DefId, Definition>,
}

impl DefStore {
    pub fn new() -> Self {
        Self { defs: index_vec![] }
    }

    pub fn add(&mut self, def: Definition) -> DefId {
        self.defs.push(def)
    }

    pub fn get(&self, id: DefId) -> &Definition {
        &self.defs[id]
    }

    pub fn get_mut(&mut self, id: DefId) -> &mut Definition {
        &mut self.defs[id]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Convenience accessors for the common "must be this kind" reads.
    /// These panic only on internal phase-ordering bugs, never on user
    /// input; callers validate kinds before storing the id.
    pub fn var(&self, id: DefId) -> &VarDef {
        match &self.get(id).kind {
            DefKind::Var(def) => def,
            kind => panic!("definition is not a variable but a {}", kind.describe()),
        }
    }

    pub fn var_mut(&mut self, id: DefId) -> &mut VarDef {
        match &mut self.get_mut(id).kind {
            DefKind::Var(def) => def,
            kind => panic!("definition is not a variable but a {}", kind.describe()),
        }
    }

    pub fn func(&self, id: DefId) -> &FuncDef {
        match &self.get(id).kind {
            DefKind::Func(def) => def,
            kind => panic!("definition is not a function but a {}", kind.describe()),
        }
    }

    pub fn func_mut(&mut self, id: DefId) -> &mut FuncDef {
        match &mut self.get_mut(id).kind {
            DefKind::Func(def) => def,
            kind => panic!("definition is not a function but a {}", kind.describe()),
        }
    }

    pub fn int_type(&self, id: DefId) -> IntTypeDef {
        match &self.get(id).kind {
            DefKind::BuiltinIntegerType(def) => *def,
            kind => panic!("definition is not an integer type but a {}", kind.describe()),
        }
    }
}
