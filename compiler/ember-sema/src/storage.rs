//! Resolver phase R3: walk the AST a final time before lowering, reducing
//! variable initializers, checking modifier legality, computing storage
//! sizes, and reserving addresses for everything that does not wait for
//! the layout phase.

use ember_ast::{
    stmt::{Stmt, StmtKind, VarModifiers},
    DefId, TyId,
};
use ember_def::{Address, BankKind, DefKind, Ty};
use ember_source::SourceLocation;

use crate::Sema;

impl Sema {
    /// Phase R3 entry point.
    pub fn reserve_variable_storage(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::File { name, items } => {
                let Some(scope) = self.module_scope(*name) else { return };
                self.enter_scope(scope, |sema| {
                    for item in items {
                        sema.reserve_variable_storage(item);
                    }
                });
            }

            StmtKind::Attribution { attributes, body } => {
                if self.compile_if_enabled(attributes) {
                    self.reserve_variable_storage(body);
                }
            }

            StmtKind::In { pieces, address, body } => {
                let Some((bank, address)) = self.resolve_in_target(pieces, address.clone(), stmt.location)
                else {
                    return;
                };
                self.enter_bank(bank, address, stmt.location, |sema| {
                    for inner in body {
                        sema.reserve_variable_storage(inner);
                    }
                });
            }

            StmtKind::Namespace { name, body } => {
                let scope = self
                    .scopes
                    .find_local_member(self.current_scope(), *name)
                    .and_then(|def| match &self.defs.get(def).kind {
                        DefKind::Namespace(ns) => Some(ns.environment),
                        _ => None,
                    });
                let Some(scope) = scope else { return };
                self.enter_scope(scope, |sema| {
                    for inner in body {
                        sema.reserve_variable_storage(inner);
                    }
                });
            }

            StmtKind::Func { name, body, .. } => {
                let Some(func) = self.scopes.find_local_member(self.current_scope(), *name)
                else {
                    return;
                };
                let environment = match &self.defs.get(func).kind {
                    DefKind::Func(def) => def.environment,
                    _ => return,
                };
                self.enter_function(func, |sema| {
                    sema.enter_scope(environment, |sema| {
                        for inner in body {
                            sema.reserve_variable_storage(inner);
                        }
                    });
                });
            }

            StmtKind::Var { names, .. } => {
                for name in names {
                    let Some(def) = self.scopes.find_local_member(self.current_scope(), *name)
                    else {
                        continue;
                    };
                    if matches!(self.defs.get(def).kind, DefKind::Var(_)) {
                        self.reserve_one_variable(def, stmt.location);
                    }
                }
            }

            StmtKind::If { then_body, else_body, .. } => {
                for inner in then_body.iter().chain(else_body) {
                    self.reserve_variable_storage(inner);
                }
            }
            StmtKind::While { body, .. }
            | StmtKind::DoWhile { body, .. }
            | StmtKind::For { body, .. } => {
                for inner in body {
                    self.reserve_variable_storage(inner);
                }
            }

            // Inline-for bodies run all three resolver phases per
            // expansion during IR emission.
            StmtKind::InlineFor { .. } => {}

            _ => {}
        }
    }

    /// Resolve the target of an `in` statement: the named bank plus the
    /// optional absolute seek address.
    pub fn resolve_in_target(
        &mut self,
        pieces: &[ember_source::identifier::Identifier],
        address: Option<ember_ast::expr::Expr>,
        location: SourceLocation,
    ) -> Option<(ember_def::BankId, Option<u32>)> {
        let def = self.resolve_identifier(pieces, location)?;
        let bank = match &self.defs.get(def).kind {
            DefKind::Bank(bank) => bank.bank,
            kind => {
                let described = kind.describe();
                self.reporter
                    .error(format!("`in` requires a bank, not a {described}"), location);
                return None;
            }
        };
        let Some(bank) = bank else {
            // Bank resolution already failed and reported in R2.
            return None;
        };

        let address = match address {
            Some(expr) => {
                let reduced = self.reduce_expression(&expr)?;
                match reduced.as_integer() {
                    Some(value) if value >= 0 && value <= u32::MAX as i128 => Some(value as u32),
                    _ => {
                        self.reporter.error(
                            "`in` address must be a compile-time integer",
                            location,
                        );
                        return None;
                    }
                }
            }
            None => None,
        };
        Some((bank, address))
    }

    fn reserve_one_variable(&mut self, def: DefId, location: SourceLocation) {
        let (modifiers, enclosing_function, address_expr, initializer) = {
            let var = self.defs.var(def);
            (
                var.modifiers,
                var.enclosing_function,
                var.address_expr.clone(),
                var.initializer.clone(),
            )
        };

        let is_designated = self
            .defs
            .var(def)
            .reduced_ty
            .map(|ty| matches!(self.tys.get(ty), Ty::Designated { .. }))
            .unwrap_or(false);

        // Modifier legality.
        if modifiers.contains(VarModifiers::EXTERN) && address_expr.is_none() {
            self.reporter
                .error("`extern` declarations require an explicit address", location);
        }
        if is_designated
            && modifiers
                .intersects(VarModifiers::CONST | VarModifiers::WRITE_ONLY | VarModifiers::EXTERN)
        {
            self.reporter.error(
                "designated storage cannot be combined with `const`, `writeonly` or `extern`",
                location,
            );
        }
        if enclosing_function.is_some()
            && initializer.is_some()
            && !modifiers.contains(VarModifiers::CONST)
        {
            self.reporter
                .error("local variables cannot have run-time initializers", location);
        }
        if modifiers.contains(VarModifiers::CONST)
            && initializer.is_none()
            && !modifiers.contains(VarModifiers::EXTERN)
        {
            self.reporter.error("`const` declarations require an initializer", location);
        }

        // Reduce the initializer, coercing strictly against the declared
        // type when one was written, inferring the type otherwise.
        if let Some(initializer) = initializer {
            let Some(reduced) = self.reduce_expression(&initializer) else {
                return;
            };
            let declared = self.defs.var(def).reduced_ty;
            let converted = match declared {
                Some(ty) => {
                    let Some(converted) = self.coerce_to_assignment_ty(reduced, ty, location)
                    else {
                        return;
                    };
                    converted
                }
                None => {
                    // Inference: unbounded literals settle on the smallest
                    // platform integer type that fits.
                    let Some(defaulted) = self.defaultize_inferred(reduced, location) else {
                        return;
                    };
                    self.defs.var_mut(def).reduced_ty = defaulted.ty();
                    defaulted
                }
            };
            self.defs.var_mut(def).initializer = Some(converted);
        }

        if is_designated {
            // Designated storage aliases an existing holder; no bytes.
            return;
        }

        let Some(ty) = self.defs.var(def).reduced_ty else {
            self.reporter.error(
                "variable needs a type annotation or an initializer",
                location,
            );
            return;
        };
        let name = self.defs.get(def).name;
        let Some(size) = self.calculate_storage_size(ty, location, &format!("variable `{name}`"))
        else {
            return;
        };
        self.defs.var_mut(def).storage_size = Some(size);

        // Address assignment: explicit `@`, RAM reservation, or deferral
        // to IR emission for stored banks.
        if let Some(address_expr) = address_expr {
            let Some(reduced) = self.reduce_expression(&address_expr) else { return };
            match reduced.as_integer() {
                Some(value) if value >= 0 && value <= u32::MAX as i128 => {
                    self.defs.var_mut(def).address =
                        Some(Address::absolute(self.current_bank(), value as u32));
                }
                _ => {
                    self.reporter.error(
                        "variable address must be a compile-time integer",
                        location,
                    );
                }
            }
            return;
        }

        if modifiers.contains(VarModifiers::EXTERN) {
            return;
        }

        let Some(bank) = self.current_bank() else {
            self.reporter.error(
                format!("variable `{name}` must be placed inside an `in` block or given an explicit address"),
                location,
            );
            return;
        };

        if self.banks[bank].kind() == BankKind::Variable {
            let relative = self.banks[bank].relative_position();
            let absolute = self.banks[bank].absolute_position();
            if let Err(error) = self.banks[bank].reserve_ram(size) {
                self.report_bank_error(error, location);
                return;
            }
            self.defs.var_mut(def).address = Some(Address {
                bank: Some(bank),
                relative_position: Some(relative),
                absolute_position: absolute,
            });
        } else {
            // Stored banks get their bytes (and addresses) from the
            // layout passes via a Var IR node. Marking the bank now keeps
            // references from treating the const as a pure value.
            if !modifiers.contains(VarModifiers::CONST)
                && self.banks[bank].kind() != BankKind::InitializedVariable
            {
                self.reporter.error(
                    format!(
                        "mutable variable `{name}` cannot be placed in a `{}` bank",
                        self.banks[bank].kind().describe()
                    ),
                    location,
                );
                return;
            }
            self.defs.var_mut(def).address = Some(Address {
                bank: Some(bank),
                relative_position: None,
                absolute_position: None,
            });
        }
    }

    /// Compute the byte size of a resolved type. Returns `None` for
    /// unsized types and reports what was being sized.
    pub fn calculate_storage_size(
        &mut self,
        ty: TyId,
        location: SourceLocation,
        description: &str,
    ) -> Option<usize> {
        match self.tys.get(ty).clone() {
            Ty::Bool => Some(1),
            Ty::Int(def) => Some(self.int_size(def)),
            Ty::Enum(def) => match &self.defs.get(def).kind {
                DefKind::Enum(e) => {
                    let underlying = e.underlying?;
                    self.calculate_storage_size(underlying, location, description)
                }
                _ => None,
            },
            Ty::Struct(def) => match &self.defs.get(def).kind {
                DefKind::Struct(s) => s.size,
                _ => None,
            },
            Ty::Array { element, length } => {
                let Some(length) = length else {
                    self.reporter.error(
                        format!("{description} has an array type of unknown length"),
                        location,
                    );
                    return None;
                };
                let element_size = self.calculate_storage_size(element, location, description)?;
                match element_size.checked_mul(length as usize) {
                    Some(size) => Some(size),
                    None => {
                        self.reporter.error(
                            format!("{description} has a storage size that overflows"),
                            location,
                        );
                        None
                    }
                }
            }
            Ty::Pointer { qualifiers, .. } => {
                let def = if qualifiers.contains(ember_ast::ty::PtrQualifiers::FAR) {
                    self.platform().far_pointer_sized_type()
                } else {
                    self.platform().pointer_sized_type()
                };
                Some(self.int_size(def))
            }
            Ty::Function(sig) => {
                let def = if sig.far {
                    self.platform().far_pointer_sized_type()
                } else {
                    self.platform().pointer_sized_type()
                };
                Some(self.int_size(def))
            }
            Ty::Tuple(elements) => {
                let mut total = 0usize;
                for element in elements {
                    total += self.calculate_storage_size(element, location, description)?;
                }
                Some(total)
            }
            Ty::Void | Ty::IExpr | Ty::Range | Ty::Bank(_) | Ty::Designated { .. } => {
                self.reporter.error(
                    format!(
                        "{description} has type `{}`, which has no storage size",
                        self.describe_ty(ty)
                    ),
                    location,
                );
                None
            }
        }
    }
}
