//! Constant-initializer serialization: recursive descent over fully
//! reduced expressions, writing little-endian integers sized by their
//! type, array elements sequentially, struct members in declaration
//! order, and union members with trailing padding.

use ember_ast::expr::{Expr, ExprKind};
use ember_def::{DefKind, Ty};
use ember_source::SourceLocation;

use crate::Linker;

impl Linker<'_> {
    /// Serialize a reduced initializer to its byte image. Returns `None`
    /// (after reporting) when the expression did not reduce to literals.
    pub fn serialize_constant_initializer(
        &mut self,
        expr: &Expr,
        location: SourceLocation,
    ) -> Option<Vec<u8>> {
        let mut bytes = Vec::new();
        if self.serialize_into(expr, location, &mut bytes) {
            Some(bytes)
        } else {
            None
        }
    }

    fn serialize_into(
        &mut self,
        expr: &Expr,
        location: SourceLocation,
        out: &mut Vec<u8>,
    ) -> bool {
        match &expr.kind {
            ExprKind::IntegerLiteral(value) => {
                let Some(ty) = expr.ty() else { return false };
                let Some(size) =
                    self.sema.calculate_storage_size(ty, location, "constant initializer")
                else {
                    return false;
                };
                let raw = (*value as u128).to_le_bytes();
                out.extend_from_slice(&raw[..size.min(16)]);
                for _ in 16..size {
                    out.push(0);
                }
                true
            }

            ExprKind::BooleanLiteral(value) => {
                out.push(*value as u8);
                true
            }

            ExprKind::StringLiteral(value) => {
                out.extend_from_slice(&value.bytes());
                true
            }

            // Function references in jump tables serialize as their
            // resolved address.
            ExprKind::ResolvedIdentifier(def, _) => {
                let address = match &self.sema.defs.get(*def).kind {
                    DefKind::Func(func) => {
                        func.address.as_ref().and_then(|address| address.absolute_position)
                    }
                    _ => None,
                };
                let Some(address) = address else {
                    self.sema.reporter.error(
                        "initializer did not reduce to a constant",
                        location,
                    );
                    return false;
                };
                let Some(ty) = expr.ty() else { return false };
                let Some(size) =
                    self.sema.calculate_storage_size(ty, location, "constant initializer")
                else {
                    return false;
                };
                let raw = (address as u128).to_le_bytes();
                out.extend_from_slice(&raw[..size.min(16)]);
                true
            }

            ExprKind::ArrayLiteral(elements) | ExprKind::Tuple(elements) => {
                for element in elements {
                    if !self.serialize_into(element, location, out) {
                        return false;
                    }
                }
                true
            }

            ExprKind::StructLiteral { fields, .. } => {
                let Some(ty) = expr.ty() else { return false };
                let Ty::Struct(def) = self.sema.tys.get(self.sema.tys.value_ty(ty)) else {
                    return false;
                };
                let (kind, total) = match &self.sema.defs.get(*def).kind {
                    DefKind::Struct(s) => (s.kind, s.size),
                    _ => return false,
                };

                let start = out.len();
                for (_, value) in fields {
                    if !self.serialize_into(value, location, out) {
                        return false;
                    }
                }

                // Union members pad out to the union's full size.
                if kind == ember_ast::stmt::StructKind::Union {
                    if let Some(total) = total {
                        while out.len() - start < total {
                            out.push(0);
                        }
                    }
                }
                true
            }

            _ => {
                self.sema.reporter.error(
                    "initializer did not reduce to a constant",
                    location,
                );
                false
            }
        }
    }
}
