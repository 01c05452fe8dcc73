//! Resolver phase R2: iterate the reservation worklist twice, first
//! resolving the types that introduce size information (enums, structs,
//! aliases), then everything that may depend on them (variables,
//! functions, banks). Also home to `reduce_type_expression`, the
//! structural type-expression resolver every phase shares.

use ember_ast::{
    expr::ExprFlags,
    ty::{TypeExpr, TypeExprKind},
    DefId, TyId,
};
use ember_def::{Bank, BankKind, DefKind, FnSig, Ty};
use ember_source::SourceLocation;
use ember_utils::log;

use crate::Sema;

impl Sema {
    /// Phase R2 entry point. Drains the worklist so inline-site
    /// re-resolution only sees its own additions.
    pub fn resolve_definition_types(&mut self) {
        let worklist = std::mem::take(&mut self.definitions_to_resolve);
        log::debug!("resolving {} definition(s)", worklist.len());

        for def in &worklist {
            match &self.defs.get(*def).kind {
                DefKind::Enum(_) => self.resolve_enum(*def),
                DefKind::Struct(_) => self.resolve_struct(*def),
                DefKind::TypeAlias(_) => {
                    self.resolve_alias(*def);
                }
                _ => {}
            }
        }

        for def in &worklist {
            match &self.defs.get(*def).kind {
                DefKind::Var(_) => self.resolve_var_type(*def),
                DefKind::Func(_) => self.resolve_func_type(*def),
                DefKind::Bank(_) => self.resolve_bank(*def),
                _ => {}
            }
        }
    }

    fn resolve_enum(&mut self, def: DefId) {
        let (underlying_expr, members, location) = match &self.defs.get(def).kind {
            DefKind::Enum(e) => (e.underlying_expr.clone(), e.members.clone(), self.defs.get(def).location),
            _ => return,
        };
        let scope = self.defs.get(def).parent_scope;

        let underlying = self.enter_scope(scope, |sema| sema.reduce_type_expression(&underlying_expr));
        let Some(underlying) = underlying else { return };

        if !matches!(self.tys.get(underlying), Ty::Int(_)) {
            self.reporter.error(
                format!(
                    "enum underlying type must be an integer type, not `{}`",
                    self.describe_ty(underlying)
                ),
                location,
            );
            return;
        }

        let ty = self.tys.enum_(def);
        if let DefKind::Enum(e) = &mut self.defs.get_mut(def).kind {
            e.underlying = Some(underlying);
            e.ty = Some(ty);
        }

        let bounds = self.ty_bounds(underlying);
        let mut previous: Option<i128> = None;
        for member in members {
            let (value_expr, member_location) = match &self.defs.get(member).kind {
                DefKind::EnumMember(m) => (m.value_expr.clone(), self.defs.get(member).location),
                _ => continue,
            };

            let value = match value_expr {
                Some(expr) => {
                    let reduced =
                        self.enter_scope(scope, |sema| sema.reduce_expression(&expr));
                    match reduced.as_ref().and_then(|r| r.as_integer()) {
                        Some(value) => value,
                        None => {
                            self.reporter.error(
                                "enum member value must be a compile-time integer",
                                member_location,
                            );
                            continue;
                        }
                    }
                }
                None => previous.map(|p| p + 1).unwrap_or(0),
            };

            if let Some((min, max)) = bounds {
                if value < min || value > max {
                    self.reporter.error(
                        format!(
                            "enum member value {value} is outside of the underlying type's range {min}..{max}"
                        ),
                        member_location,
                    );
                }
            }

            previous = Some(value);
            if let DefKind::EnumMember(m) = &mut self.defs.get_mut(member).kind {
                m.value = Some(value);
            }
        }
    }

    fn resolve_struct(&mut self, def: DefId) {
        let (kind, members) = match &self.defs.get(def).kind {
            DefKind::Struct(s) => (s.kind, s.members.clone()),
            _ => return,
        };
        let scope = self.defs.get(def).parent_scope;

        let mut offset = 0usize;
        let mut total = 0usize;
        for member in members {
            let (type_expr, member_location) = match &self.defs.get(member).kind {
                DefKind::StructMember(m) => (m.type_expr.clone(), self.defs.get(member).location),
                _ => continue,
            };

            let Some(ty) =
                self.enter_scope(scope, |sema| sema.reduce_type_expression(&type_expr))
            else {
                continue;
            };
            let Some(size) = self.calculate_storage_size(ty, member_location, "struct member")
            else {
                continue;
            };

            let member_offset = match kind {
                ember_ast::stmt::StructKind::Struct => {
                    let current = offset;
                    offset += size;
                    total = offset;
                    current
                }
                ember_ast::stmt::StructKind::Union => {
                    total = total.max(size);
                    0
                }
            };

            if let DefKind::StructMember(m) = &mut self.defs.get_mut(member).kind {
                m.ty = Some(ty);
                m.offset = Some(member_offset);
            }
        }

        let ty = self.tys.struct_(def);
        if let DefKind::Struct(s) = &mut self.defs.get_mut(def).kind {
            s.size = Some(total);
            s.ty = Some(ty);
        }
    }

    /// Resolve a type alias on demand, guarding against self-reference.
    pub(crate) fn resolve_alias(&mut self, def: DefId) -> Option<TyId> {
        if let DefKind::TypeAlias(alias) = &self.defs.get(def).kind {
            if let Some(ty) = alias.ty {
                return Some(ty);
            }
        }

        if self.aliases_in_progress.contains(&def) {
            let location = self.defs.get(def).location;
            let name = self.defs.get(def).name;
            self.reporter.error(format!("type alias `{name}` refers to itself"), location);
            return None;
        }

        let (type_expr, scope) = match &self.defs.get(def).kind {
            DefKind::TypeAlias(alias) => (alias.type_expr.clone(), self.defs.get(def).parent_scope),
            _ => return None,
        };

        self.aliases_in_progress.push(def);
        let ty = self.enter_scope(scope, |sema| sema.reduce_type_expression(&type_expr));
        self.aliases_in_progress.pop();

        if let (Some(ty), DefKind::TypeAlias(alias)) = (ty, &mut self.defs.get_mut(def).kind) {
            alias.ty = Some(ty);
        }
        ty
    }

    fn resolve_var_type(&mut self, def: DefId) {
        let (type_expr, scope) = match &self.defs.get(def).kind {
            DefKind::Var(var) => (var.type_expr.clone(), self.defs.get(def).parent_scope),
            _ => return,
        };

        if let Some(type_expr) = type_expr {
            let ty = self.enter_scope(scope, |sema| sema.reduce_type_expression(&type_expr));
            self.defs.var_mut(def).reduced_ty = ty;
        }
    }

    fn resolve_func_type(&mut self, def: DefId) {
        let (far, parameters, return_type_expr, environment) = {
            let func = self.defs.func(def);
            (func.far, func.parameters.clone(), func.return_type_expr.clone(), func.environment)
        };

        let mut parameter_tys = Vec::with_capacity(parameters.len());
        for param in &parameters {
            let type_expr = self.defs.var(*param).type_expr.clone();
            let ty = type_expr.and_then(|t| {
                self.enter_scope(environment, |sema| sema.reduce_type_expression(&t))
            });
            self.defs.var_mut(*param).reduced_ty = ty;
            parameter_tys.push(ty.unwrap_or_else(|| self.tys.void()));
        }

        let return_type = match return_type_expr {
            Some(t) => self
                .enter_scope(environment, |sema| sema.reduce_type_expression(&t))
                .unwrap_or_else(|| self.tys.void()),
            None => self.tys.void(),
        };

        let signature =
            self.tys.function(FnSig { far, parameters: parameter_tys, return_type });
        self.defs.func_mut(def).signature = Some(signature);
    }

    fn resolve_bank(&mut self, def: DefId) {
        let (type_expr, address_expr, location, scope, name) = {
            let definition = self.defs.get(def);
            match &definition.kind {
                DefKind::Bank(bank) => (
                    bank.type_expr.clone(),
                    bank.address_expr.clone(),
                    definition.location,
                    definition.parent_scope,
                    definition.name,
                ),
                _ => return,
            }
        };

        let Some(ty) = self.enter_scope(scope, |sema| sema.reduce_type_expression(&type_expr))
        else {
            return;
        };

        let (kind, capacity) = match self.tys.get(ty) {
            Ty::Array { element, length: Some(length) } => match self.tys.get(*element) {
                Ty::Bank(kind_def) => {
                    let kind = match &self.defs.get(*kind_def).kind {
                        DefKind::BuiltinBankType(kind) => *kind,
                        _ => {
                            self.reporter
                                .error("bank declaration requires a bank element type", location);
                            return;
                        }
                    };
                    (kind, *length as usize)
                }
                _ => {
                    self.reporter.error(
                        "bank declaration requires a `[bank-kind; capacity]` type",
                        location,
                    );
                    return;
                }
            },
            _ => {
                self.reporter.error(
                    "bank declaration requires a `[bank-kind; capacity]` type",
                    location,
                );
                return;
            }
        };

        let origin = match address_expr {
            Some(expr) => {
                let reduced = self.enter_scope(scope, |sema| sema.reduce_expression(&expr));
                match reduced.as_ref().and_then(|r| r.as_integer()) {
                    Some(value) if value >= 0 && value <= u32::MAX as i128 => Some(value as u32),
                    Some(value) => {
                        self.reporter.error(
                            format!("bank start address {value} exceeds the platform range"),
                            location,
                        );
                        None
                    }
                    None => {
                        self.reporter.error(
                            "bank address must be a compile-time integer",
                            location,
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let pad = match kind {
            BankKind::Variable => 0x00,
            _ => 0xFF,
        };
        let bank = self.banks.push(Bank::new(name, kind, capacity, origin, pad));
        if let DefKind::Bank(def) = &mut self.defs.get_mut(def).kind {
            def.bank = Some(bank);
        }
    }

    /// Structurally reduce a type expression to a [TyId]. Identifier types
    /// resolve through the scope store; array sizes must be non-negative
    /// compile-time integers; designated-storage holders must be mutable,
    /// readable L-values of the element type.
    pub fn reduce_type_expression(&mut self, t: &TypeExpr) -> Option<TyId> {
        match &t.kind {
            TypeExprKind::Array { element, size } => {
                let element = self.reduce_type_expression(element)?;
                let length = match size {
                    Some(size) => {
                        let reduced = self.reduce_expression(size)?;
                        match reduced.as_integer() {
                            Some(value) if value >= 0 && value <= u32::MAX as i128 => {
                                Some(value as u32)
                            }
                            Some(value) => {
                                self.reporter.error(
                                    format!("array size {value} must be a non-negative integer"),
                                    t.location,
                                );
                                return None;
                            }
                            None => {
                                self.reporter.error(
                                    "array size must be a compile-time integer",
                                    t.location,
                                );
                                return None;
                            }
                        }
                    }
                    None => None,
                };
                Some(self.tys.array(element, length))
            }

            TypeExprKind::Pointer { element, qualifiers } => {
                let element = self.reduce_type_expression(element)?;
                Some(self.tys.pointer(element, *qualifiers))
            }

            TypeExprKind::Function { parameters, return_type, far } => {
                let mut parameter_tys = Vec::with_capacity(parameters.len());
                for parameter in parameters {
                    parameter_tys.push(self.reduce_type_expression(parameter)?);
                }
                let return_type = self.reduce_type_expression(return_type)?;
                Some(self.tys.function(FnSig {
                    far: *far,
                    parameters: parameter_tys,
                    return_type,
                }))
            }

            TypeExprKind::Tuple(elements) => {
                let mut element_tys = Vec::with_capacity(elements.len());
                for element in elements {
                    element_tys.push(self.reduce_type_expression(element)?);
                }
                Some(self.tys.tuple(element_tys))
            }

            TypeExprKind::Identifier(pieces) => {
                let def = self.resolve_identifier(pieces, t.location)?;
                self.type_of_definition(def, t.location)
            }

            TypeExprKind::ResolvedIdentifier(def) => self.type_of_definition(*def, t.location),

            TypeExprKind::TypeOf(expr) => {
                let reduced = self.reduce_expression(expr)?;
                reduced.ty()
            }

            TypeExprKind::DesignatedStorage { element, holder } => {
                let element = self.reduce_type_expression(element)?;
                let holder = self.reduce_expression(holder)?;

                let flags = holder.flags();
                if !flags.contains(ExprFlags::L_VALUE) {
                    self.reporter.error(
                        "designated storage requires an L-value holder",
                        t.location,
                    );
                    return None;
                }
                if flags.contains(ExprFlags::CONST) {
                    self.reporter
                        .error("designated storage holder cannot be `const`", t.location);
                    return None;
                }
                if flags.contains(ExprFlags::WRITE_ONLY) {
                    self.reporter
                        .error("designated storage holder cannot be `writeonly`", t.location);
                    return None;
                }
                if let Some(holder_ty) = holder.ty() {
                    if !self.tys.ty_eq(holder_ty, element) {
                        self.reporter.error(
                            format!(
                                "designated storage holder has type `{}` but the element type is `{}`",
                                self.describe_ty(holder_ty),
                                self.describe_ty(element)
                            ),
                            t.location,
                        );
                        return None;
                    }
                }

                Some(self.tys.designated(element, Box::new(holder)))
            }
        }
    }

    /// The type a type-producing definition denotes.
    pub(crate) fn type_of_definition(
        &mut self,
        def: DefId,
        location: SourceLocation,
    ) -> Option<TyId> {
        match &self.defs.get(def).kind {
            DefKind::BuiltinIntegerType(_) => Some(self.tys.int(def)),
            DefKind::BuiltinBoolType => Some(self.tys.bool()),
            DefKind::BuiltinBankType(_) => Some(self.tys.bank(def)),
            DefKind::BuiltinRangeType => Some(self.tys.range()),
            DefKind::Enum(_) => Some(self.tys.enum_(def)),
            DefKind::Struct(_) => Some(self.tys.struct_(def)),
            DefKind::TypeAlias(_) => self.resolve_alias(def),
            kind => {
                let described = kind.describe();
                let name = self.defs.get(def).name;
                self.reporter
                    .error(format!("`{name}` is a {described}, not a valid type"), location);
                None
            }
        }
    }
}
