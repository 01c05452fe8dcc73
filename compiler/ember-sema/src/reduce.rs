//! The expression reducer. `reduce_expression` returns a fresh expression
//! whose type is populated and whose evaluation context is the minimum
//! that satisfies all operands: compile-time values fold to literals,
//! link-time values keep their structure for re-reduction after layout,
//! and run-time values become instruction selection input.

pub mod fold;

use ember_ast::{
    expr::{EvalContext, Expr, ExprFlags, ExprInfo, ExprKind, TypeQueryKind},
    op::{BinOp, UnOp},
    DefId, TyId,
};
use ember_def::{DefKind, FnSig, LetDef, LetKind, Ty};
use ember_source::{identifier::Identifier, string::InternedStr, SourceLocation};

use crate::Sema;

/// The combined context of an operator's operands: compile-time only when
/// everything is, run-time as soon as anything is.
pub fn combine_context(a: EvalContext, b: EvalContext) -> EvalContext {
    a.max(b)
}

impl Sema {
    /// The platform's 8-bit integer type.
    pub fn byte_ty(&mut self) -> TyId {
        let def = self.platform().byte_type();
        self.tys.int(def)
    }

    pub fn mk_int(&self, value: i128, ty: TyId, location: SourceLocation) -> Expr {
        Expr::reduced(
            ExprKind::IntegerLiteral(value),
            location,
            ExprInfo::new(EvalContext::CompileTime, ty, ExprFlags::empty()),
        )
    }

    pub fn mk_bool(&self, value: bool, location: SourceLocation) -> Expr {
        Expr::reduced(
            ExprKind::BooleanLiteral(value),
            location,
            ExprInfo::new(EvalContext::CompileTime, self.tys.bool(), ExprFlags::empty()),
        )
    }

    fn mk_string(&mut self, value: InternedStr, location: SourceLocation) -> Expr {
        let byte = self.byte_ty();
        let ty = self.tys.array(byte, Some(value.len() as u32));
        Expr::reduced(
            ExprKind::StringLiteral(value),
            location,
            ExprInfo::new(EvalContext::CompileTime, ty, ExprFlags::empty()),
        )
    }

    /// Reduce an expression. Returns `None` after reporting a diagnostic;
    /// callers propagate the absence.
    ///
    /// Reduction is idempotent: already-reduced literals keep the type a
    /// previous pass assigned them, so link-time re-reduction preserves
    /// pointer-typed address literals.
    pub fn reduce_expression(&mut self, expr: &Expr) -> Option<Expr> {
        let location = expr.location;

        if expr.info.is_some()
            && matches!(
                expr.kind,
                ExprKind::IntegerLiteral(_)
                    | ExprKind::BooleanLiteral(_)
                    | ExprKind::StringLiteral(_)
            )
        {
            return Some(expr.clone());
        }

        match &expr.kind {
            ExprKind::IntegerLiteral(value) => Some(self.mk_int(*value, self.tys.iexpr(), location)),
            ExprKind::BooleanLiteral(value) => Some(self.mk_bool(*value, location)),
            ExprKind::StringLiteral(value) => Some(self.mk_string(*value, location)),

            ExprKind::Identifier(pieces) => {
                let def = self.resolve_identifier(pieces, location)?;
                self.reduce_resolved(def, pieces.clone(), location)
            }
            ExprKind::ResolvedIdentifier(def, pieces) => {
                self.reduce_resolved(*def, pieces.clone(), location)
            }

            ExprKind::Unary(op, operand) => self.reduce_unary(*op, operand, location),
            ExprKind::Binary(op, left, right) => self.reduce_binary(*op, left, right, location),

            ExprKind::Call { inlined, callee, arguments } => {
                self.reduce_call(*inlined, callee, arguments, location)
            }
            ExprKind::Cast { operand, ty } => self.reduce_cast(operand, ty, location),

            ExprKind::Tuple(elements) => {
                let mut reduced = Vec::with_capacity(elements.len());
                let mut context = EvalContext::CompileTime;
                let mut tys = Vec::with_capacity(elements.len());
                for element in elements {
                    let element = self.reduce_expression(element)?;
                    context = combine_context(context, element.context()?);
                    tys.push(element.ty()?);
                    reduced.push(element);
                }
                let ty = self.tys.tuple(tys);
                Some(Expr::reduced(
                    ExprKind::Tuple(reduced),
                    location,
                    ExprInfo::new(context, ty, ExprFlags::empty()),
                ))
            }

            ExprKind::ArrayLiteral(elements) => self.reduce_array_literal(elements, location),

            ExprKind::ArrayPad { value, count } => {
                let value = self.reduce_expression(value)?;
                let count = self.reduce_expression(count)?;
                let Some(count) = count.as_integer().filter(|count| *count >= 0) else {
                    self.reporter.error(
                        "array pad count must be a non-negative compile-time integer",
                        location,
                    );
                    return None;
                };
                let elements = vec![value; count as usize];
                self.reduce_array_elements(elements, location)
            }

            ExprKind::ArrayComprehension { body, var, sequence } => {
                self.reduce_comprehension(body, *var, sequence, location)
            }

            ExprKind::StructLiteral { ty, fields } => {
                self.reduce_struct_literal(ty, fields, location)
            }

            ExprKind::Range { start, end, step } => {
                let start = self.reduce_expression(start)?;
                let end = self.reduce_expression(end)?;
                let step = match step {
                    Some(step) => Some(self.reduce_expression(step)?),
                    None => None,
                };
                if start.as_integer().is_none()
                    || end.as_integer().is_none()
                    || step.as_ref().map(|s| s.as_integer().is_none()).unwrap_or(false)
                {
                    self.reporter
                        .error("range bounds must be compile-time integers", location);
                    return None;
                }
                if step.as_ref().and_then(|s| s.as_integer()) == Some(0) {
                    self.reporter.error("range step cannot be zero", location);
                    return None;
                }
                let ty = self.tys.range();
                Some(Expr::reduced(
                    ExprKind::Range {
                        start: Box::new(start),
                        end: Box::new(end),
                        step: step.map(Box::new),
                    },
                    location,
                    ExprInfo::new(EvalContext::CompileTime, ty, ExprFlags::empty()),
                ))
            }

            ExprKind::FieldAccess { base, field } => {
                self.reduce_field_access(base, *field, location)
            }

            ExprKind::TypeOf(_) => {
                self.reporter
                    .error("`typeof` cannot be used as a value", location);
                None
            }

            ExprKind::TypeQuery { kind, ty } => {
                let ty = self.reduce_type_expression(ty)?;
                match kind {
                    TypeQueryKind::SizeOf => {
                        let size = self.calculate_storage_size(ty, location, "sizeof operand")?;
                        Some(self.mk_int(size as i128, self.tys.iexpr(), location))
                    }
                    TypeQueryKind::AlignOf => {
                        self.reporter.error("`alignof` is not implemented", location);
                        None
                    }
                }
            }

            ExprKind::OffsetOf { ty, field } => {
                let ty = self.reduce_type_expression(ty)?;
                let Ty::Struct(def) = self.tys.get(self.tys.value_ty(ty)) else {
                    self.reporter
                        .error("`offsetof` requires a struct or union type", location);
                    return None;
                };
                let members = match &self.defs.get(*def).kind {
                    DefKind::Struct(s) => s.members.clone(),
                    _ => return None,
                };
                for member in members {
                    if self.defs.get(member).name == *field {
                        let offset = match &self.defs.get(member).kind {
                            DefKind::StructMember(m) => m.offset?,
                            _ => return None,
                        };
                        return Some(self.mk_int(offset as i128, self.tys.iexpr(), location));
                    }
                }
                self.reporter.error(
                    format!("`{}` has no member named `{field}`", self.describe_ty(ty)),
                    location,
                );
                None
            }

            ExprKind::Embed(path) => {
                let path = path.to_string();
                let bytes = self.embed_file(&path, location)?;
                Some(self.mk_string(bytes, location))
            }

            ExprKind::SideEffect { stmt, result } => {
                let result = self.reduce_expression(result)?;
                let info = ExprInfo::new(EvalContext::RunTime, result.ty()?, result.flags());
                Some(Expr::reduced(
                    ExprKind::SideEffect { stmt: stmt.clone(), result: Box::new(result) },
                    location,
                    info,
                ))
            }
        }
    }

    fn reduce_array_literal(
        &mut self,
        elements: &[Expr],
        location: SourceLocation,
    ) -> Option<Expr> {
        let mut reduced = Vec::with_capacity(elements.len());
        for element in elements {
            reduced.push(self.reduce_expression(element)?);
        }
        self.reduce_array_elements(reduced, location)
    }

    /// Build an array literal from already-reduced elements, unifying
    /// their element type.
    pub(crate) fn reduce_array_elements(
        &mut self,
        elements: Vec<Expr>,
        location: SourceLocation,
    ) -> Option<Expr> {
        let mut context = EvalContext::CompileTime;
        let mut element_ty = None;

        for element in &elements {
            context = combine_context(context, element.context()?);
            let ty = element.ty()?;
            match element_ty {
                None => element_ty = Some(ty),
                Some(existing) => {
                    // Unbounded literals defer to any bounded sibling.
                    if self.tys.ty_eq(existing, ty) {
                        continue;
                    }
                    let existing_is_iexpr = matches!(self.tys.get(existing), Ty::IExpr);
                    let ty_is_iexpr = matches!(self.tys.get(ty), Ty::IExpr);
                    if existing_is_iexpr && !ty_is_iexpr {
                        element_ty = Some(ty);
                    } else if !existing_is_iexpr && !ty_is_iexpr {
                        self.reporter.error(
                            format!(
                                "array elements have mismatched types `{}` and `{}`",
                                self.describe_ty(existing),
                                self.describe_ty(ty)
                            ),
                            location,
                        );
                        return None;
                    }
                }
            }
        }

        let element_ty = element_ty.unwrap_or_else(|| self.tys.iexpr());

        // Narrow unbounded literal elements against the unified type.
        let elements = if matches!(self.tys.get(element_ty), Ty::IExpr) {
            elements
        } else {
            let mut narrowed = Vec::with_capacity(elements.len());
            for element in elements {
                narrowed.push(self.coerce_to_assignment_ty(element, element_ty, location)?);
            }
            narrowed
        };

        let ty = self.tys.array(element_ty, Some(elements.len() as u32));
        Some(Expr::reduced(
            ExprKind::ArrayLiteral(elements),
            location,
            ExprInfo::new(context, ty, ExprFlags::empty()),
        ))
    }

    fn reduce_comprehension(
        &mut self,
        body: &Expr,
        var: Identifier,
        sequence: &Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let sequence = self.reduce_expression(sequence)?;
        let values = self.sequence_values(&sequence, location)?;

        let mut elements = Vec::with_capacity(values.len());
        for value in values {
            let scope = self.scopes.add(None, Some(self.current_scope()));
            let binding = self.defs.add(ember_def::Definition {
                name: var,
                kind: DefKind::Let(LetDef {
                    kind: LetKind::User,
                    parameters: Vec::new(),
                    body: Some(value),
                }),
                location,
                parent_scope: scope,
            });
            self.scopes.insert_or_replace_member(scope, var, binding);

            let element = self.enter_scope(scope, |sema| sema.reduce_expression(body))?;
            elements.push(element);
        }
        self.reduce_array_elements(elements, location)
    }

    /// Enumerate a compile-time sequence: a range literal or an array of
    /// compile-time values.
    pub fn sequence_values(
        &mut self,
        sequence: &Expr,
        location: SourceLocation,
    ) -> Option<Vec<Expr>> {
        match &sequence.kind {
            ExprKind::Range { start, end, step } => {
                let start = start.as_integer()?;
                let end = end.as_integer()?;
                let step = match step {
                    Some(step) => step.as_integer()?,
                    None => 1,
                };
                let mut values = Vec::new();
                let mut current = start;
                // Inclusive bounds; a step away from the end terminates.
                while (step > 0 && current <= end) || (step < 0 && current >= end) {
                    values.push(self.mk_int(current, self.tys.iexpr(), location));
                    current += step;
                }
                Some(values)
            }
            ExprKind::ArrayLiteral(elements) => Some(elements.clone()),
            ExprKind::StringLiteral(value) => {
                let byte = self.byte_ty();
                Some(
                    value
                        .bytes()
                        .iter()
                        .map(|b| self.mk_int(*b as i128, byte, location))
                        .collect(),
                )
            }
            _ => {
                self.reporter.error(
                    "sequence must be a compile-time range or array",
                    location,
                );
                None
            }
        }
    }

    fn reduce_struct_literal(
        &mut self,
        ty: &ember_ast::ty::TypeExpr,
        fields: &[(Identifier, Expr)],
        location: SourceLocation,
    ) -> Option<Expr> {
        let ty = self.reduce_type_expression(ty)?;
        let Ty::Struct(def) = self.tys.get(self.tys.value_ty(ty)) else {
            self.reporter
                .error("struct literal requires a struct or union type", location);
            return None;
        };
        let def = *def;
        let (kind, members) = match &self.defs.get(def).kind {
            DefKind::Struct(s) => (s.kind, s.members.clone()),
            _ => return None,
        };

        // A union literal initializes exactly one member; the emitted
        // image pads to the union's size.
        if kind == ember_ast::stmt::StructKind::Union {
            let [(field_name, value)] = fields else {
                self.reporter.error(
                    "union literal must initialize exactly one member",
                    location,
                );
                return None;
            };
            let member =
                members.iter().find(|member| self.defs.get(**member).name == *field_name);
            let Some(member) = member else {
                self.reporter.error(
                    format!("`{}` has no member named `{field_name}`", self.describe_ty(ty)),
                    location,
                );
                return None;
            };
            let member_ty = match &self.defs.get(*member).kind {
                DefKind::StructMember(m) => m.ty?,
                _ => return None,
            };
            let reduced = self.reduce_expression(value)?;
            let context = reduced.context()?;
            let converted = self.coerce_to_assignment_ty(reduced, member_ty, location)?;
            let type_expr = ember_ast::ty::TypeExpr::new(
                ember_ast::ty::TypeExprKind::ResolvedIdentifier(def),
                location,
            );
            return Some(Expr::reduced(
                ExprKind::StructLiteral { ty: type_expr, fields: vec![(*field_name, converted)] },
                location,
                ExprInfo::new(context, ty, ExprFlags::empty()),
            ));
        }

        // Every member must be initialized exactly once; serialization
        // relies on declaration order, so reorder as we match.
        let mut ordered = Vec::with_capacity(members.len());
        let mut context = EvalContext::CompileTime;
        for member in &members {
            let member_name = self.defs.get(*member).name;
            let member_ty = match &self.defs.get(*member).kind {
                DefKind::StructMember(m) => m.ty?,
                _ => return None,
            };

            let provided: Vec<_> =
                fields.iter().filter(|(name, _)| *name == member_name).collect();
            match provided.as_slice() {
                [(_, value)] => {
                    let reduced = self.reduce_expression(value)?;
                    context = combine_context(context, reduced.context()?);
                    let converted = self.coerce_to_assignment_ty(reduced, member_ty, location)?;
                    ordered.push((member_name, converted));
                }
                [] => {
                    self.reporter.error(
                        format!("struct literal is missing member `{member_name}`"),
                        location,
                    );
                    return None;
                }
                _ => {
                    self.reporter.error(
                        format!("struct literal initializes `{member_name}` more than once"),
                        location,
                    );
                    return None;
                }
            }
        }

        for (name, _) in fields {
            if !members.iter().any(|member| self.defs.get(*member).name == *name) {
                self.reporter.error(
                    format!("`{}` has no member named `{name}`", self.describe_ty(ty)),
                    location,
                );
                return None;
            }
        }

        let type_expr = ember_ast::ty::TypeExpr::new(
            ember_ast::ty::TypeExprKind::ResolvedIdentifier(def),
            location,
        );
        Some(Expr::reduced(
            ExprKind::StructLiteral { ty: type_expr, fields: ordered },
            location,
            ExprInfo::new(context, ty, ExprFlags::empty()),
        ))
    }

    /// Reduce a reference to a resolved definition.
    pub(crate) fn reduce_resolved(
        &mut self,
        def: DefId,
        pieces: Vec<Identifier>,
        location: SourceLocation,
    ) -> Option<Expr> {
        let name = self.defs.get(def).name;
        match &self.defs.get(def).kind {
            DefKind::Var(var) => {
                let modifiers = var.modifiers;
                let reduced_ty = var.reduced_ty;
                let placed = var.address.is_some();
                let initializer_is_ct = var
                    .initializer
                    .as_ref()
                    .and_then(|init| init.context())
                    .map(|context| context == EvalContext::CompileTime)
                    .unwrap_or(false);

                // A const that was never placed in storage is a pure
                // compile-time value; substitute it.
                if modifiers.contains(ember_ast::stmt::VarModifiers::CONST)
                    && initializer_is_ct
                    && !placed
                {
                    let initializer = self.defs.var(def).initializer.clone();
                    if let Some(mut value) = initializer {
                        value.location = location;
                        return Some(value);
                    }
                }

                let Some(ty) = reduced_ty else {
                    self.reporter.error(
                        format!("`{name}` cannot be used before its type is resolved"),
                        location,
                    );
                    return None;
                };

                let mut flags = ExprFlags::L_VALUE;
                if modifiers.contains(ember_ast::stmt::VarModifiers::CONST) {
                    flags |= ExprFlags::CONST;
                }
                if modifiers.contains(ember_ast::stmt::VarModifiers::WRITE_ONLY) {
                    flags |= ExprFlags::WRITE_ONLY;
                }
                Some(Expr::reduced(
                    ExprKind::ResolvedIdentifier(def, pieces),
                    location,
                    ExprInfo::new(EvalContext::RunTime, ty, flags),
                ))
            }

            DefKind::Func(func) => {
                let ty = match func.signature {
                    Some(signature) => signature,
                    None => {
                        // Labels have no declared signature.
                        let void = self.tys.void();
                        self.tys.function(FnSig {
                            far: false,
                            parameters: Vec::new(),
                            return_type: void,
                        })
                    }
                };
                Some(Expr::reduced(
                    ExprKind::ResolvedIdentifier(def, pieces),
                    location,
                    ExprInfo::new(EvalContext::LinkTime, ty, ExprFlags::empty()),
                ))
            }

            DefKind::Let(let_def) => {
                if !let_def.parameters.is_empty() {
                    self.reporter.error(
                        format!("`{name}` is a compile-time function and requires arguments"),
                        location,
                    );
                    return None;
                }
                let body = let_def.body.clone();
                let scope = self.defs.get(def).parent_scope;
                let Some(body) = body else {
                    self.reporter
                        .error(format!("`{name}` requires arguments"), location);
                    return None;
                };

                if !self.enter_let(name, location) {
                    return None;
                }
                let result = self.enter_scope(scope, |sema| sema.reduce_expression(&body));
                self.exit_let();
                result
            }

            DefKind::EnumMember(member) => {
                let value = member.value?;
                let owner = member.owner;
                let ty = match &self.defs.get(owner).kind {
                    DefKind::Enum(e) => e.ty?,
                    _ => return None,
                };
                Some(self.mk_int(value, ty, location))
            }

            DefKind::BuiltinRegister(register) => {
                let mut flags = ExprFlags::L_VALUE;
                if register.modifiers.contains(ember_ast::stmt::VarModifiers::CONST) {
                    flags |= ExprFlags::CONST;
                }
                if register.modifiers.contains(ember_ast::stmt::VarModifiers::WRITE_ONLY) {
                    flags |= ExprFlags::WRITE_ONLY;
                }
                let ty = register.ty;
                Some(Expr::reduced(
                    ExprKind::ResolvedIdentifier(def, pieces),
                    location,
                    ExprInfo::new(EvalContext::RunTime, ty, flags),
                ))
            }

            kind => {
                let described = kind.describe();
                self.reporter.error(
                    format!("`{name}` is a {described} and cannot be used as a value"),
                    location,
                );
                None
            }
        }
    }

    fn reduce_call(
        &mut self,
        inlined: bool,
        callee: &Expr,
        arguments: &[Expr],
        location: SourceLocation,
    ) -> Option<Expr> {
        // Resolve the callee first so `let` calls can bind arguments
        // rather than evaluating the callee as a value.
        let callee_def = match &callee.kind {
            ExprKind::Identifier(pieces) => self.resolve_identifier(pieces, callee.location),
            ExprKind::ResolvedIdentifier(def, _) => Some(*def),
            _ => None,
        };

        if let Some(def) = callee_def {
            match &self.defs.get(def).kind {
                DefKind::Let(_) => return self.evaluate_let_call(def, arguments, location),

                DefKind::Func(func) => {
                    let signature_ty = func.signature?;
                    let parameters = func.parameters.clone();
                    let inline_func = func.inlined;

                    let mut reduced_args = Vec::with_capacity(arguments.len());
                    if arguments.len() != parameters.len() {
                        let name = self.defs.get(def).name;
                        self.reporter.error(
                            format!(
                                "`{name}` expects {} argument(s) but got {}",
                                parameters.len(),
                                arguments.len()
                            ),
                            location,
                        );
                        return None;
                    }
                    for (argument, param) in arguments.iter().zip(&parameters) {
                        let reduced = self.reduce_expression(argument)?;
                        let param_ty = self.defs.var(*param).reduced_ty?;
                        let converted =
                            self.coerce_to_assignment_ty(reduced, param_ty, location)?;
                        reduced_args.push(converted);
                    }

                    let return_ty = match self.tys.get(signature_ty) {
                        Ty::Function(sig) => self.tys.value_ty(sig.return_type),
                        _ => self.tys.void(),
                    };
                    let callee = self.reduce_resolved(def, Vec::new(), callee.location)?;
                    return Some(Expr::reduced(
                        ExprKind::Call {
                            inlined: inlined || inline_func,
                            callee: Box::new(callee),
                            arguments: reduced_args,
                        },
                        location,
                        ExprInfo::new(EvalContext::RunTime, return_ty, ExprFlags::empty()),
                    ));
                }

                DefKind::BuiltinVoidIntrinsic => {
                    let mut reduced_args = Vec::with_capacity(arguments.len());
                    for argument in arguments {
                        reduced_args.push(self.reduce_expression(argument)?);
                    }
                    let callee = Expr::reduced(
                        ExprKind::ResolvedIdentifier(def, Vec::new()),
                        callee.location,
                        ExprInfo::new(EvalContext::RunTime, self.tys.void(), ExprFlags::empty()),
                    );
                    return Some(Expr::reduced(
                        ExprKind::Call {
                            inlined: false,
                            callee: Box::new(callee),
                            arguments: reduced_args,
                        },
                        location,
                        ExprInfo::new(EvalContext::RunTime, self.tys.void(), ExprFlags::empty()),
                    ));
                }

                DefKind::BuiltinLoadIntrinsic(intrinsic) => {
                    let result = intrinsic.result;
                    let mut reduced_args = Vec::with_capacity(arguments.len());
                    for argument in arguments {
                        reduced_args.push(self.reduce_expression(argument)?);
                    }
                    let callee = Expr::reduced(
                        ExprKind::ResolvedIdentifier(def, Vec::new()),
                        callee.location,
                        ExprInfo::new(EvalContext::RunTime, result, ExprFlags::empty()),
                    );
                    return Some(Expr::reduced(
                        ExprKind::Call {
                            inlined: false,
                            callee: Box::new(callee),
                            arguments: reduced_args,
                        },
                        location,
                        ExprInfo::new(EvalContext::RunTime, result, ExprFlags::empty()),
                    ));
                }

                kind => {
                    let name = self.defs.get(def).name;
                    let described = kind.describe();
                    self.reporter
                        .error(format!("`{name}` is a {described} and is not callable"), location);
                    return None;
                }
            }
        }

        // Calling through an arbitrary expression (a function pointer).
        let callee = self.reduce_expression(callee)?;
        let callee_ty = callee.ty()?;
        let return_ty = match self.tys.get(self.tys.value_ty(callee_ty)) {
            Ty::Function(sig) => self.tys.value_ty(sig.return_type),
            _ => {
                self.reporter.error(
                    format!("type `{}` is not callable", self.describe_ty(callee_ty)),
                    location,
                );
                return None;
            }
        };
        let mut reduced_args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            reduced_args.push(self.reduce_expression(argument)?);
        }
        Some(Expr::reduced(
            ExprKind::Call { inlined, callee: Box::new(callee), arguments: reduced_args },
            location,
            ExprInfo::new(EvalContext::RunTime, return_ty, ExprFlags::empty()),
        ))
    }

    fn evaluate_let_call(
        &mut self,
        def: DefId,
        arguments: &[Expr],
        location: SourceLocation,
    ) -> Option<Expr> {
        let name = self.defs.get(def).name;
        let (kind, parameters, body) = match &self.defs.get(def).kind {
            DefKind::Let(let_def) => {
                (let_def.kind, let_def.parameters.clone(), let_def.body.clone())
            }
            _ => return None,
        };

        if arguments.len() != parameters.len() {
            self.reporter.error(
                format!(
                    "`{name}` expects {} argument(s) but got {}",
                    parameters.len(),
                    arguments.len()
                ),
                location,
            );
            return None;
        }

        match kind {
            LetKind::HasDef => {
                let key = self.define_key(&arguments[0])?;
                let defined = self.define(key).is_some();
                Some(self.mk_bool(defined, location))
            }
            LetKind::GetDef => {
                let key = self.define_key(&arguments[0])?;
                match self.define(key).cloned() {
                    Some(value) => self.reduce_expression(&value),
                    None => self.reduce_expression(&arguments[1]),
                }
            }
            LetKind::User => {
                let body = body?;
                let parent = self.defs.get(def).parent_scope;

                // Arguments are evaluated eagerly in the caller's scope,
                // then bound as nullary lets in a fresh frame.
                let mut bound = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    bound.push(self.reduce_expression(argument)?);
                }

                if !self.enter_let(name, location) {
                    return None;
                }

                let frame = self.scopes.add(None, Some(parent));
                for (parameter, value) in parameters.iter().zip(bound) {
                    let binding = self.defs.add(ember_def::Definition {
                        name: *parameter,
                        kind: DefKind::Let(LetDef {
                            kind: LetKind::User,
                            parameters: Vec::new(),
                            body: Some(value),
                        }),
                        location,
                        parent_scope: frame,
                    });
                    self.scopes.insert_or_replace_member(frame, *parameter, binding);
                }

                let result = self.enter_scope(frame, |sema| sema.reduce_expression(&body));
                self.exit_let();
                result
            }
        }
    }

    fn define_key(&mut self, argument: &Expr) -> Option<Identifier> {
        let reduced = self.reduce_expression(argument)?;
        match reduced.kind {
            ExprKind::StringLiteral(value) => Some(Identifier::from(value.to_string())),
            _ => {
                self.reporter.error(
                    "defines are looked up by compile-time string keys",
                    reduced.location,
                );
                None
            }
        }
    }

    fn reduce_field_access(
        &mut self,
        base: &Expr,
        field: Identifier,
        location: SourceLocation,
    ) -> Option<Expr> {
        let base = self.reduce_expression(base)?;
        let base_ty = base.ty()?;
        let value_ty = self.tys.value_ty(base_ty);

        // `.len` pseudo-field on arrays, strings and ranges.
        if field.name() == "len" {
            match self.tys.get(value_ty) {
                Ty::Array { length: Some(length), .. } => {
                    let length = *length;
                    return Some(self.mk_int(length as i128, self.tys.iexpr(), location));
                }
                Ty::Range => {
                    if let ExprKind::Range { start, end, step } = &base.kind {
                        let start = start.as_integer()?;
                        let end = end.as_integer()?;
                        let step = step.as_ref().and_then(|s| s.as_integer()).unwrap_or(1);
                        let count = if step > 0 && end >= start {
                            (end - start) / step + 1
                        } else if step < 0 && start >= end {
                            (start - end) / -step + 1
                        } else {
                            0
                        };
                        return Some(self.mk_int(count, self.tys.iexpr(), location));
                    }
                }
                _ => {}
            }
        }

        match self.tys.get(value_ty).clone() {
            Ty::Struct(def) => self.reduce_struct_field(base, def, field, location),
            Ty::Pointer { element, qualifiers } => {
                // Construct the implied indirection, then recurse.
                let mut flags = ExprFlags::L_VALUE;
                if qualifiers.contains(ember_ast::ty::PtrQualifiers::CONST) {
                    flags |= ExprFlags::CONST;
                }
                if qualifiers.contains(ember_ast::ty::PtrQualifiers::WRITE_ONLY) {
                    flags |= ExprFlags::WRITE_ONLY;
                }
                if qualifiers.contains(ember_ast::ty::PtrQualifiers::FAR) {
                    flags |= ExprFlags::FAR;
                }
                let indirect = Expr::reduced(
                    ExprKind::Unary(UnOp::Indirection, Box::new(base)),
                    location,
                    ExprInfo::new(EvalContext::RunTime, element, flags),
                );
                match self.tys.get(self.tys.value_ty(element)) {
                    Ty::Struct(def) => {
                        let def = *def;
                        self.reduce_struct_field(indirect, def, field, location)
                    }
                    _ => {
                        self.reporter.error(
                            format!(
                                "type `{}` has no member named `{field}`",
                                self.describe_ty(element)
                            ),
                            location,
                        );
                        None
                    }
                }
            }
            _ => {
                self.reporter.error(
                    format!(
                        "type `{}` has no member named `{field}`",
                        self.describe_ty(base_ty)
                    ),
                    location,
                );
                None
            }
        }
    }

    fn reduce_struct_field(
        &mut self,
        base: Expr,
        def: DefId,
        field: Identifier,
        location: SourceLocation,
    ) -> Option<Expr> {
        let members = match &self.defs.get(def).kind {
            DefKind::Struct(s) => s.members.clone(),
            _ => return None,
        };
        let member = members.iter().find(|member| self.defs.get(**member).name == field);
        let Some(member) = member else {
            let name = self.defs.get(def).name;
            self.reporter
                .error(format!("`{name}` has no member named `{field}`"), location);
            return None;
        };
        let (member_ty, offset) = match &self.defs.get(*member).kind {
            DefKind::StructMember(m) => (m.ty?, m.offset? as i128),
            _ => return None,
        };

        // A compile-time struct literal folds to the member value.
        if let ExprKind::StructLiteral { fields, .. } = &base.kind {
            if base.context() == Some(EvalContext::CompileTime) {
                if let Some((_, value)) = fields.iter().find(|(name, _)| *name == field) {
                    return Some(value.clone());
                }
            }
        }

        let base_flags = base.flags();
        let mut flags = ExprFlags::L_VALUE;
        flags |= base_flags & (ExprFlags::CONST | ExprFlags::WRITE_ONLY | ExprFlags::FAR);

        // With a known base address the member collapses to a fixed
        // dereference; otherwise the address computation is preserved.
        let pointer_ty = self.tys.pointer(member_ty, ember_ast::ty::PtrQualifiers::empty());
        let known_address = base.referenced_def().and_then(|def| match &self.defs.get(def).kind {
            DefKind::Var(var) => var.address.as_ref().and_then(|addr| addr.absolute_position),
            _ => None,
        });

        let address = match known_address {
            Some(address) => self.mk_int(address as i128 + offset, pointer_ty, location),
            None => {
                let base_address = Expr::reduced(
                    ExprKind::Unary(UnOp::AddressOf, Box::new(base)),
                    location,
                    ExprInfo::new(EvalContext::LinkTime, pointer_ty, ExprFlags::empty()),
                );
                let offset = self.mk_int(offset, self.tys.iexpr(), location);
                Expr::reduced(
                    ExprKind::Binary(BinOp::Add, Box::new(base_address), Box::new(offset)),
                    location,
                    ExprInfo::new(EvalContext::LinkTime, pointer_ty, ExprFlags::empty()),
                )
            }
        };

        Some(Expr::reduced(
            ExprKind::Unary(UnOp::Indirection, Box::new(address)),
            location,
            ExprInfo::new(EvalContext::RunTime, member_ty, flags),
        ))
    }
}
