//! The resolved type store. Types are structural values referencing other
//! types by [TyId]; nominal types (enums, structs, banks, builtin
//! integers) point back at their defining [DefId].

use ember_ast::{expr::Expr, ty::PtrQualifiers, DefId, TyId};
use ember_utils::index_vec::{index_vec, IndexVec};

/// A resolved function signature.
#[derive(Debug, Clone, PartialEq)]
pub struct FnSig {
    pub far: bool,
    pub parameters: Vec<TyId>,
    pub return_type: TyId,
}

/// A resolved type.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Void,
    /// The unbounded compile-time integer type of literals.
    IExpr,
    Bool,
    /// A builtin bounded integer type.
    Int(DefId),
    Enum(DefId),
    /// A `struct` or `union`; the kind lives on the definition.
    Struct(DefId),
    /// A bank-kind element type, e.g. `vardata`.
    Bank(DefId),
    /// The type of `a .. b by c` sequences.
    Range,
    Array { element: TyId, length: Option<u32> },
    Pointer { element: TyId, qualifiers: PtrQualifiers },
    Function(FnSig),
    Tuple(Vec<TyId>),
    /// `T in holder`: a typed view bound to a reduced L-value expression.
    Designated { element: TyId, holder: Box<Expr> },
}

/// Grow-only type store with the primitives pre-seeded.
#[derive(Debug)]
pub struct TyStore {
    types: IndexVec<TyId, Ty>,
    void: TyId,
    iexpr: TyId,
    bool_: TyId,
    range: TyId,
}

impl Default for TyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TyStore {
    pub fn new() -> Self {
        let mut types = index_vec![];
        let void = types.push(Ty::Void);
        let iexpr = types.push(Ty::IExpr);
        let bool_ = types.push(Ty::Bool);
        let range = types.push(Ty::Range);
        Self { types, void, iexpr, bool_, range }
    }

    pub fn get(&self, id: TyId) -> &Ty {
        &self.types[id]
    }

    pub fn add(&mut self, ty: Ty) -> TyId {
        self.types.push(ty)
    }

    pub fn void(&self) -> TyId {
        self.void
    }

    pub fn iexpr(&self) -> TyId {
        self.iexpr
    }

    pub fn bool(&self) -> TyId {
        self.bool_
    }

    pub fn range(&self) -> TyId {
        self.range
    }

    pub fn int(&mut self, def: DefId) -> TyId {
        self.dedup_nominal(Ty::Int(def))
    }

    pub fn enum_(&mut self, def: DefId) -> TyId {
        self.dedup_nominal(Ty::Enum(def))
    }

    pub fn struct_(&mut self, def: DefId) -> TyId {
        self.dedup_nominal(Ty::Struct(def))
    }

    pub fn bank(&mut self, def: DefId) -> TyId {
        self.dedup_nominal(Ty::Bank(def))
    }

    pub fn array(&mut self, element: TyId, length: Option<u32>) -> TyId {
        self.add(Ty::Array { element, length })
    }

    pub fn pointer(&mut self, element: TyId, qualifiers: PtrQualifiers) -> TyId {
        self.add(Ty::Pointer { element, qualifiers })
    }

    pub fn function(&mut self, sig: FnSig) -> TyId {
        self.add(Ty::Function(sig))
    }

    pub fn tuple(&mut self, elements: Vec<TyId>) -> TyId {
        self.add(Ty::Tuple(elements))
    }

    pub fn designated(&mut self, element: TyId, holder: Box<Expr>) -> TyId {
        self.add(Ty::Designated { element, holder })
    }

    /// Nominal types are referenced all over; reuse the first id minted for
    /// a given definition so `ty_eq` stays cheap for the common case.
    fn dedup_nominal(&mut self, ty: Ty) -> TyId {
        if let Some(existing) = self
            .types
            .iter_enumerated()
            .find_map(|(id, t)| (*t == ty).then_some(id))
        {
            return existing;
        }
        self.types.push(ty)
    }

    /// Structural type equality. Designated-storage types compare by their
    /// element type; the holder binding does not change what values fit.
    pub fn ty_eq(&self, a: TyId, b: TyId) -> bool {
        if a == b {
            return true;
        }

        match (self.get(a), self.get(b)) {
            (Ty::Void, Ty::Void)
            | (Ty::IExpr, Ty::IExpr)
            | (Ty::Bool, Ty::Bool)
            | (Ty::Range, Ty::Range) => true,
            (Ty::Int(x), Ty::Int(y)) | (Ty::Enum(x), Ty::Enum(y)) | (Ty::Struct(x), Ty::Struct(y))
            | (Ty::Bank(x), Ty::Bank(y)) => x == y,
            (
                Ty::Array { element: ea, length: la },
                Ty::Array { element: eb, length: lb },
            ) => la == lb && self.ty_eq(*ea, *eb),
            (
                Ty::Pointer { element: ea, qualifiers: qa },
                Ty::Pointer { element: eb, qualifiers: qb },
            ) => qa == qb && self.ty_eq(*ea, *eb),
            (Ty::Function(sa), Ty::Function(sb)) => {
                sa.far == sb.far
                    && sa.parameters.len() == sb.parameters.len()
                    && sa
                        .parameters
                        .iter()
                        .zip(&sb.parameters)
                        .all(|(x, y)| self.ty_eq(*x, *y))
                    && self.ty_eq(sa.return_type, sb.return_type)
            }
            (Ty::Tuple(xs), Ty::Tuple(ys)) => {
                xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| self.ty_eq(*x, *y))
            }
            (Ty::Designated { element, .. }, _) => self.ty_eq(*element, b),
            (_, Ty::Designated { element, .. }) => self.ty_eq(a, *element),
            _ => false,
        }
    }

    /// Strip designated-storage down to the underlying value type.
    pub fn value_ty(&self, id: TyId) -> TyId {
        match self.get(id) {
            Ty::Designated { element, .. } => self.value_ty(*element),
            _ => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nominal_types_are_deduplicated() {
        let mut tys = TyStore::new();
        let def = DefId::from_raw(7);
        assert_eq!(tys.int(def), tys.int(def));
    }

    #[test]
    fn structural_equality() {
        let mut tys = TyStore::new();
        let int = tys.int(DefId::from_raw(0));
        let a = tys.array(int, Some(4));
        let b = tys.array(int, Some(4));
        let c = tys.array(int, Some(5));

        assert!(tys.ty_eq(a, b));
        assert!(!tys.ty_eq(a, c));
    }

    #[test]
    fn designated_storage_compares_by_element() {
        use ember_ast::{expr::ExprKind, Expr};
        use ember_source::{SourceLocation, Span};

        let mut tys = TyStore::new();
        let int = tys.int(DefId::from_raw(0));
        let holder = Box::new(Expr::new(
            ExprKind::IntegerLiteral(0),
            SourceLocation::new(Span::empty(), 0usize.into()),
        ));
        let designated = tys.designated(int, holder);

        assert!(tys.ty_eq(designated, int));
        assert_eq!(tys.value_ty(designated), int);
    }
}
