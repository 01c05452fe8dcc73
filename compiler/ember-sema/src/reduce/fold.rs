//! Operator folding and conversion rules for the expression reducer:
//! unary and binary operators, casts, strict assignment coercion, and the
//! default narrowing applied when a declaration's type is inferred.

use ember_ast::{
    expr::{EvalContext, Expr, ExprFlags, ExprInfo, ExprKind},
    op::{BinOp, UnOp},
    ty::PtrQualifiers,
    TyId,
};
use ember_def::{DefKind, Ty};
use ember_source::{string::InternedStr, SourceLocation};

use crate::{reduce::combine_context, Sema};

impl Sema {
    /// Wrap a folded value to the bit width of a bounded integer type,
    /// reinterpreting the sign bit for signed types.
    pub(crate) fn wrap_to_ty(&self, value: i128, ty: TyId) -> i128 {
        let Ty::Int(def) = self.tys.get(self.tys.value_ty(ty)) else {
            return value;
        };
        let int = self.defs.int_type(*def);
        let bits = int.size as u32 * 8;
        if bits >= 128 {
            return value;
        }
        let mask = (1i128 << bits) - 1;
        let mut wrapped = value & mask;
        if int.min < 0 && wrapped >= 1i128 << (bits - 1) {
            wrapped -= 1i128 << bits;
        }
        wrapped
    }

    /// Reject reads of writeonly operands for the operators that do read.
    fn check_readable(&mut self, operand: &Expr, location: SourceLocation) -> bool {
        if operand.flags().contains(ExprFlags::WRITE_ONLY) {
            self.reporter
                .error("cannot read from a writeonly expression", location)
                .add_labelled_span(operand.location, "this operand is writeonly");
            return false;
        }
        true
    }

    pub(crate) fn reduce_unary(
        &mut self,
        op: UnOp,
        operand: &Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        // Grouping exists only to carry parentheses through parsing.
        if op == UnOp::Grouping {
            return self.reduce_expression(operand);
        }

        let operand = self.reduce_expression(operand)?;
        if !op.permits_writeonly() && !self.check_readable(&operand, location) {
            return None;
        }
        let operand_ty = operand.ty()?;
        let context = operand.context()?;

        match op {
            UnOp::LogicalNot => {
                if !matches!(self.tys.get(self.tys.value_ty(operand_ty)), Ty::Bool) {
                    self.report_unary_mismatch(op, operand_ty, location);
                    return None;
                }
                if let Some(value) = operand.as_boolean() {
                    return Some(self.mk_bool(!value, location));
                }
                Some(Expr::reduced(
                    ExprKind::Unary(op, Box::new(operand)),
                    location,
                    ExprInfo::new(context, self.tys.bool(), ExprFlags::empty()),
                ))
            }

            UnOp::Neg => {
                if !self.is_integer_ty(operand_ty) {
                    self.report_unary_mismatch(op, operand_ty, location);
                    return None;
                }
                if let Some(value) = operand.as_integer() {
                    let Some(negated) = value.checked_neg() else {
                        self.reporter.error("arithmetic overflow in `-`", location);
                        return None;
                    };
                    if let Some((min, max)) = self.ty_bounds(operand_ty) {
                        if negated < min || negated > max {
                            self.reporter.error(
                                format!(
                                    "result {negated} of `-` does not fit in `{}` (range {min}..{max})",
                                    self.describe_ty(operand_ty)
                                ),
                                location,
                            );
                            return None;
                        }
                    }
                    return Some(self.mk_int(negated, operand_ty, location));
                }
                Some(Expr::reduced(
                    ExprKind::Unary(op, Box::new(operand)),
                    location,
                    ExprInfo::new(context, operand_ty, ExprFlags::empty()),
                ))
            }

            UnOp::BitNot => {
                if !self.is_integer_ty(operand_ty) {
                    self.report_unary_mismatch(op, operand_ty, location);
                    return None;
                }
                if let Some(value) = operand.as_integer() {
                    let folded = self.wrap_to_ty(!value, operand_ty);
                    return Some(self.mk_int(folded, operand_ty, location));
                }
                Some(Expr::reduced(
                    ExprKind::Unary(op, Box::new(operand)),
                    location,
                    ExprInfo::new(context, operand_ty, ExprFlags::empty()),
                ))
            }

            UnOp::PreIncrement | UnOp::PreDecrement | UnOp::PostIncrement | UnOp::PostDecrement => {
                let flags = operand.flags();
                if !flags.contains(ExprFlags::L_VALUE) {
                    self.reporter
                        .error(format!("`{op}` requires an assignable operand"), location);
                    return None;
                }
                if flags.contains(ExprFlags::CONST) {
                    self.reporter
                        .error(format!("`{op}` cannot modify a `const` operand"), location);
                    return None;
                }
                if context == EvalContext::CompileTime {
                    self.reporter
                        .error(format!("`{op}` cannot modify a compile-time value"), location);
                    return None;
                }
                Some(Expr::reduced(
                    ExprKind::Unary(op, Box::new(operand)),
                    location,
                    ExprInfo::new(EvalContext::RunTime, operand_ty, flags),
                ))
            }

            UnOp::AddressOf | UnOp::FarAddressOf => {
                self.reduce_address_of(op, operand, location)
            }

            UnOp::Indirection => {
                let value_ty = self.tys.value_ty(operand_ty);
                let Ty::Pointer { element, qualifiers } = self.tys.get(value_ty).clone() else {
                    self.report_unary_mismatch(op, operand_ty, location);
                    return None;
                };
                let mut flags = ExprFlags::L_VALUE;
                if qualifiers.contains(PtrQualifiers::CONST) {
                    flags |= ExprFlags::CONST;
                }
                if qualifiers.contains(PtrQualifiers::WRITE_ONLY) {
                    flags |= ExprFlags::WRITE_ONLY;
                }
                if qualifiers.contains(PtrQualifiers::FAR) {
                    flags |= ExprFlags::FAR;
                }
                Some(Expr::reduced(
                    ExprKind::Unary(op, Box::new(operand)),
                    location,
                    ExprInfo::new(EvalContext::RunTime, element, flags),
                ))
            }

            UnOp::LowByte | UnOp::HighByte | UnOp::BankByte => {
                let byte = self.byte_ty();
                let shift = match op {
                    UnOp::LowByte => 0,
                    UnOp::HighByte => 8,
                    _ => 16,
                };
                if let Some(value) = operand.as_integer() {
                    return Some(self.mk_int((value >> shift) & 0xFF, byte, location));
                }
                Some(Expr::reduced(
                    ExprKind::Unary(op, Box::new(operand)),
                    location,
                    ExprInfo::new(context, byte, ExprFlags::empty()),
                ))
            }

            UnOp::Grouping => unreachable!(),
        }
    }

    fn reduce_address_of(
        &mut self,
        op: UnOp,
        operand: Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let far = op == UnOp::FarAddressOf;
        let flags = operand.flags();
        if !flags.contains(ExprFlags::L_VALUE) {
            self.reporter
                .error("cannot take the address of a non-L-value", location);
            return None;
        }

        // `&*p` is just `p`.
        if matches!(operand.kind, ExprKind::Unary(UnOp::Indirection, _)) {
            let ExprKind::Unary(_, inner) = operand.kind else { unreachable!() };
            return Some(*inner);
        }

        let operand_ty = operand.ty()?;
        let element = self.tys.value_ty(operand_ty);
        let mut qualifiers = PtrQualifiers::empty();
        if flags.contains(ExprFlags::CONST) {
            qualifiers |= PtrQualifiers::CONST;
        }
        if flags.contains(ExprFlags::WRITE_ONLY) {
            qualifiers |= PtrQualifiers::WRITE_ONLY;
        }
        if far {
            qualifiers |= PtrQualifiers::FAR;
        }
        let pointer_ty = self.tys.pointer(element, qualifiers);
        let result_flags = if far { ExprFlags::FAR } else { ExprFlags::empty() };

        match operand.referenced_def() {
            Some(def) => match &self.defs.get(def).kind {
                DefKind::Var(var) => {
                    match var.address.as_ref().and_then(|address| address.absolute_position) {
                        Some(address) => Some(Expr::reduced(
                            ExprKind::IntegerLiteral(address as i128),
                            location,
                            ExprInfo::new(EvalContext::CompileTime, pointer_ty, result_flags),
                        )),
                        None => Some(Expr::reduced(
                            ExprKind::Unary(op, Box::new(operand)),
                            location,
                            ExprInfo::new(EvalContext::LinkTime, pointer_ty, result_flags),
                        )),
                    }
                }
                _ => {
                    self.reporter.error(
                        "cannot take the address of this expression",
                        location,
                    );
                    None
                }
            },
            None => Some(Expr::reduced(
                ExprKind::Unary(op, Box::new(operand)),
                location,
                ExprInfo::new(EvalContext::LinkTime, pointer_ty, result_flags),
            )),
        }
    }

    fn report_unary_mismatch(&mut self, op: UnOp, ty: TyId, location: SourceLocation) {
        self.reporter.error(
            format!("`{op}` is not defined for `{}`", self.describe_ty(ty)),
            location,
        );
    }

    fn report_binary_mismatch(
        &mut self,
        op: BinOp,
        left: TyId,
        right: TyId,
        location: SourceLocation,
    ) {
        self.reporter.error(
            format!(
                "`{op}` is not defined between `{}` and `{}`",
                self.describe_ty(left),
                self.describe_ty(right)
            ),
            location,
        );
    }

    pub(crate) fn reduce_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        match op {
            BinOp::Assign => self.reduce_assignment(left, right, location),
            BinOp::Index => self.reduce_index(left, right, location),
            BinOp::BitIndex => self.reduce_bit_index(left, right, location),
            BinOp::Concat => self.reduce_concat(left, right, location),
            BinOp::LogicalAnd | BinOp::LogicalOr => {
                self.reduce_logical(op, left, right, location)
            }
            _ => self.reduce_binary_operands(op, left, right, location),
        }
    }

    fn reduce_assignment(
        &mut self,
        left: &Expr,
        right: &Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let left = self.reduce_expression(left)?;
        let right = self.reduce_expression(right)?;

        let flags = left.flags();
        if !flags.contains(ExprFlags::L_VALUE) {
            self.reporter
                .error("left side of assignment must be an L-value", location)
                .add_labelled_span(left.location, "cannot assign to this expression");
            return None;
        }
        if flags.contains(ExprFlags::CONST) {
            self.reporter
                .error("cannot assign to a `const` expression", location)
                .add_labelled_span(left.location, "this expression is const");
            return None;
        }
        if !self.check_readable(&right, location) {
            return None;
        }

        let left_ty = left.ty()?;
        let right = self.coerce_to_assignment_ty(right, left_ty, location)?;

        Some(Expr::reduced(
            ExprKind::Binary(BinOp::Assign, Box::new(left), Box::new(right)),
            location,
            ExprInfo::new(EvalContext::RunTime, left_ty, flags),
        ))
    }

    fn reduce_index(
        &mut self,
        left: &Expr,
        right: &Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let left = self.reduce_expression(left)?;
        let right = self.reduce_expression(right)?;
        let left_ty = left.ty()?;
        let right_ty = right.ty()?;

        if !self.is_integer_ty(right_ty) {
            self.report_binary_mismatch(BinOp::Index, left_ty, right_ty, location);
            return None;
        }

        match self.tys.get(self.tys.value_ty(left_ty)).clone() {
            Ty::Array { element, length } => {
                if let (Some(index), Some(length)) = (right.as_integer(), length) {
                    if index < 0 || index >= length as i128 {
                        self.reporter.error(
                            format!("index {index} is out of bounds for length {length}"),
                            location,
                        );
                        return None;
                    }
                }

                // Compile-time element extraction.
                if let Some(index) = right.as_integer() {
                    match &left.kind {
                        ExprKind::ArrayLiteral(elements) => {
                            return Some(elements[index as usize].clone());
                        }
                        ExprKind::StringLiteral(value) => {
                            let byte = value.bytes()[index as usize];
                            let byte_ty = self.byte_ty();
                            return Some(self.mk_int(byte as i128, byte_ty, location));
                        }
                        _ => {}
                    }

                    // A placed variable with a known address folds to a
                    // fixed dereference.
                    if let Some(def) = left.referenced_def() {
                        if let DefKind::Var(var) = &self.defs.get(def).kind {
                            if let Some(address) =
                                var.address.as_ref().and_then(|a| a.absolute_position)
                            {
                                let size = self.calculate_storage_size(
                                    element,
                                    location,
                                    "array element",
                                )?;
                                let pointer_ty =
                                    self.tys.pointer(element, PtrQualifiers::empty());
                                let address = self.mk_int(
                                    address as i128 + index * size as i128,
                                    pointer_ty,
                                    location,
                                );
                                return Some(Expr::reduced(
                                    ExprKind::Unary(UnOp::Indirection, Box::new(address)),
                                    location,
                                    ExprInfo::new(
                                        EvalContext::RunTime,
                                        element,
                                        left.flags() | ExprFlags::L_VALUE,
                                    ),
                                ));
                            }
                        }
                    }
                }

                let flags = left.flags() | ExprFlags::L_VALUE;
                Some(Expr::reduced(
                    ExprKind::Binary(BinOp::Index, Box::new(left), Box::new(right)),
                    location,
                    ExprInfo::new(EvalContext::RunTime, element, flags),
                ))
            }

            Ty::Tuple(elements) => {
                let Some(index) = right.as_integer() else {
                    self.reporter
                        .error("tuple index must be a compile-time integer", location);
                    return None;
                };
                if index < 0 || index as usize >= elements.len() {
                    self.reporter.error(
                        format!("index {index} is out of bounds for a {}-tuple", elements.len()),
                        location,
                    );
                    return None;
                }
                match &left.kind {
                    ExprKind::Tuple(values) => Some(values[index as usize].clone()),
                    _ => {
                        self.reporter.error(
                            "tuple indexing requires a compile-time tuple value",
                            location,
                        );
                        None
                    }
                }
            }

            Ty::Pointer { element, qualifiers } => {
                let mut flags = ExprFlags::L_VALUE;
                if qualifiers.contains(PtrQualifiers::CONST) {
                    flags |= ExprFlags::CONST;
                }
                if qualifiers.contains(PtrQualifiers::WRITE_ONLY) {
                    flags |= ExprFlags::WRITE_ONLY;
                }
                if qualifiers.contains(PtrQualifiers::FAR) {
                    flags |= ExprFlags::FAR;
                }
                Some(Expr::reduced(
                    ExprKind::Binary(BinOp::Index, Box::new(left), Box::new(right)),
                    location,
                    ExprInfo::new(EvalContext::RunTime, element, flags),
                ))
            }

            Ty::Range => {
                if let (ExprKind::Range { start, end, step }, Some(index)) =
                    (&left.kind, right.as_integer())
                {
                    let start = start.as_integer()?;
                    let end = end.as_integer()?;
                    let step = step.as_ref().and_then(|s| s.as_integer()).unwrap_or(1);
                    let value = start + index * step;
                    let in_bounds = if step > 0 { value <= end } else { value >= end };
                    if index < 0 || !in_bounds {
                        self.reporter
                            .error(format!("index {index} is out of range"), location);
                        return None;
                    }
                    return Some(self.mk_int(value, self.tys.iexpr(), location));
                }
                self.reporter
                    .error("range indexing requires compile-time bounds", location);
                None
            }

            _ => {
                self.report_binary_mismatch(BinOp::Index, left_ty, right_ty, location);
                None
            }
        }
    }

    fn reduce_bit_index(
        &mut self,
        left: &Expr,
        right: &Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let left = self.reduce_expression(left)?;
        let right = self.reduce_expression(right)?;
        if !self.check_readable(&left, location) || !self.check_readable(&right, location) {
            return None;
        }
        let left_ty = left.ty()?;
        let right_ty = right.ty()?;
        if !self.is_integer_ty(left_ty) || !self.is_integer_ty(right_ty) {
            self.report_binary_mismatch(BinOp::BitIndex, left_ty, right_ty, location);
            return None;
        }

        if let (Some(value), Some(bit)) = (left.as_integer(), right.as_integer()) {
            if !(0..128).contains(&bit) {
                self.reporter
                    .error(format!("bit index {bit} is out of range"), location);
                return None;
            }
            return Some(self.mk_bool((value >> bit) & 1 != 0, location));
        }

        let context = combine_context(left.context()?, right.context()?);
        Some(Expr::reduced(
            ExprKind::Binary(BinOp::BitIndex, Box::new(left), Box::new(right)),
            location,
            ExprInfo::new(context, self.tys.bool(), ExprFlags::empty()),
        ))
    }

    fn reduce_concat(
        &mut self,
        left: &Expr,
        right: &Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let left = self.reduce_expression(left)?;
        let right = self.reduce_expression(right)?;

        // Two string literals concatenate in the pool.
        if let (ExprKind::StringLiteral(a), ExprKind::StringLiteral(b)) = (&left.kind, &right.kind)
        {
            let mut bytes = a.bytes();
            bytes.extend(b.bytes());
            let interned = InternedStr::intern(&bytes);
            let byte = self.byte_ty();
            let ty = self.tys.array(byte, Some(bytes.len() as u32));
            return Some(Expr::reduced(
                ExprKind::StringLiteral(interned),
                location,
                ExprInfo::new(EvalContext::CompileTime, ty, ExprFlags::empty()),
            ));
        }

        let left_elements = self.array_literal_elements(&left, location)?;
        let right_elements = self.array_literal_elements(&right, location)?;
        let mut elements = left_elements;
        elements.extend(right_elements);
        self.reduce_array_elements(elements, location)
    }

    /// View an array-literal-kind expression (array literal or string
    /// literal) as its element list.
    fn array_literal_elements(
        &mut self,
        expr: &Expr,
        location: SourceLocation,
    ) -> Option<Vec<Expr>> {
        match &expr.kind {
            ExprKind::ArrayLiteral(elements) => Some(elements.clone()),
            ExprKind::StringLiteral(value) => {
                let byte = self.byte_ty();
                Some(
                    value
                        .bytes()
                        .iter()
                        .map(|b| self.mk_int(*b as i128, byte, expr.location))
                        .collect(),
                )
            }
            _ => {
                self.reporter
                    .error("`~` requires compile-time array operands", location);
                None
            }
        }
    }

    fn reduce_logical(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let left = self.reduce_expression(left)?;
        if !self.check_readable(&left, location) {
            return None;
        }
        let left_ty = left.ty()?;
        if !matches!(self.tys.get(self.tys.value_ty(left_ty)), Ty::Bool) {
            let right = self.reduce_expression(right)?;
            self.report_binary_mismatch(op, left_ty, right.ty()?, location);
            return None;
        }

        // Short-circuit on a literal left side.
        if let Some(value) = left.as_boolean() {
            let taken = match op {
                BinOp::LogicalAnd => value,
                _ => !value,
            };
            if taken {
                let right = self.reduce_expression(right)?;
                let right_ty = right.ty()?;
                if !matches!(self.tys.get(self.tys.value_ty(right_ty)), Ty::Bool) {
                    self.report_binary_mismatch(op, left_ty, right_ty, location);
                    return None;
                }
                return Some(right);
            }
            return Some(self.mk_bool(value, location));
        }

        let right = self.reduce_expression(right)?;
        if !self.check_readable(&right, location) {
            return None;
        }
        let right_ty = right.ty()?;
        if !matches!(self.tys.get(self.tys.value_ty(right_ty)), Ty::Bool) {
            self.report_binary_mismatch(op, left_ty, right_ty, location);
            return None;
        }

        let context = combine_context(left.context()?, right.context()?);
        Some(Expr::reduced(
            ExprKind::Binary(op, Box::new(left), Box::new(right)),
            location,
            ExprInfo::new(context, self.tys.bool(), ExprFlags::empty()),
        ))
    }

    fn reduce_binary_operands(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let left = self.reduce_expression(left)?;
        let right = self.reduce_expression(right)?;
        if !self.check_readable(&left, location) || !self.check_readable(&right, location) {
            return None;
        }
        let left_ty = left.ty()?;
        let right_ty = right.ty()?;

        // Boolean `&`, `|` and `^` are `&&`, `||` and `!=`.
        let left_is_bool = matches!(self.tys.get(self.tys.value_ty(left_ty)), Ty::Bool);
        if left_is_bool && matches!(op, BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor) {
            let rewritten = match op {
                BinOp::BitAnd => BinOp::LogicalAnd,
                BinOp::BitOr => BinOp::LogicalOr,
                _ => BinOp::NotEq,
            };
            return self.reduce_binary(rewritten, &left, &right, location);
        }

        if op.is_comparison() {
            return self.reduce_comparison(op, left, right, location);
        }

        // Pointer arithmetic: a pointer plus or minus an integer offset
        // keeps the pointer type. Link-time address computations (struct
        // members, labels with offsets) go through here.
        if matches!(op, BinOp::Add | BinOp::Sub) {
            let left_is_pointer =
                matches!(self.tys.get(self.tys.value_ty(left_ty)), Ty::Pointer { .. });
            let right_is_pointer =
                matches!(self.tys.get(self.tys.value_ty(right_ty)), Ty::Pointer { .. });

            let pointer_side = if left_is_pointer && self.is_integer_ty(right_ty) {
                Some(left_ty)
            } else if right_is_pointer && self.is_integer_ty(left_ty) && op == BinOp::Add {
                Some(right_ty)
            } else {
                None
            };

            if let Some(pointer_ty) = pointer_side {
                if let (Some(a), Some(b)) = (left.as_integer(), right.as_integer()) {
                    let value = if op == BinOp::Add { a.checked_add(b) } else { a.checked_sub(b) };
                    let Some(value) = value else {
                        self.reporter
                            .error("arithmetic overflow in pointer offset", location);
                        return None;
                    };
                    return Some(self.mk_int(value, pointer_ty, location));
                }
                let context = combine_context(left.context()?, right.context()?);
                return Some(Expr::reduced(
                    ExprKind::Binary(op, Box::new(left), Box::new(right)),
                    location,
                    ExprInfo::new(context, pointer_ty, ExprFlags::empty()),
                ));
            }
        }

        if !self.is_integer_ty(left_ty) || !self.is_integer_ty(right_ty) {
            self.report_binary_mismatch(op, left_ty, right_ty, location);
            return None;
        }

        // Shift-like operators keep the left type; the amount may be any
        // integer.
        let shift_like = matches!(
            op,
            BinOp::Shl
                | BinOp::Shr
                | BinOp::LogicalShl
                | BinOp::LogicalShr
                | BinOp::RotateLeft
                | BinOp::RotateRight
        );

        let (left, right, result_ty) = if shift_like {
            (left, right, left_ty)
        } else {
            self.unify_integer_operands(op, left, right, location)?
        };

        if let (Some(a), Some(b)) = (left.as_integer(), right.as_integer()) {
            return self.fold_integer_binary(op, a, b, result_ty, location);
        }

        let context = combine_context(left.context()?, right.context()?);
        let context = match op {
            // Carry-dependent arithmetic is only meaningful at run time.
            BinOp::AddWithCarry | BinOp::SubWithCarry => EvalContext::RunTime,
            _ => context,
        };
        Some(Expr::reduced(
            ExprKind::Binary(op, Box::new(left), Box::new(right)),
            location,
            ExprInfo::new(context, result_ty, ExprFlags::empty()),
        ))
    }

    /// Find the shared integer type of two operands, narrowing unbounded
    /// literals into the bounded side.
    fn unify_integer_operands(
        &mut self,
        op: BinOp,
        left: Expr,
        right: Expr,
        location: SourceLocation,
    ) -> Option<(Expr, Expr, TyId)> {
        let left_ty = self.tys.value_ty(left.ty()?);
        let right_ty = self.tys.value_ty(right.ty()?);

        if self.tys.ty_eq(left_ty, right_ty) {
            return Some((left, right, left_ty));
        }

        let left_is_iexpr = matches!(self.tys.get(left_ty), Ty::IExpr);
        let right_is_iexpr = matches!(self.tys.get(right_ty), Ty::IExpr);

        if left_is_iexpr && !right_is_iexpr {
            let narrowed = self.narrow_literal(left, right_ty, location)?;
            return Some((narrowed, right, right_ty));
        }
        if right_is_iexpr && !left_is_iexpr {
            let narrowed = self.narrow_literal(right, left_ty, location)?;
            return Some((left, narrowed, left_ty));
        }

        self.report_binary_mismatch(op, left_ty, right_ty, location);
        None
    }

    /// Narrow an unbounded literal to a bounded type, checking the
    /// type's value range.
    pub(crate) fn narrow_literal(
        &mut self,
        expr: Expr,
        ty: TyId,
        location: SourceLocation,
    ) -> Option<Expr> {
        match expr.as_integer() {
            Some(value) => {
                if let Some((min, max)) = self.ty_bounds(ty) {
                    if value < min || value > max {
                        self.reporter.error(
                            format!(
                                "value {value} does not fit in `{}` (range {min}..{max})",
                                self.describe_ty(ty)
                            ),
                            location,
                        );
                        return None;
                    }
                }
                Some(self.mk_int(value, ty, location))
            }
            None => {
                // A link-time expression of unbounded type adopts the
                // bounded type; its bits are checked at emission.
                let mut retyped = expr;
                if let Some(info) = retyped.info.as_mut() {
                    info.ty = ty;
                }
                Some(retyped)
            }
        }
    }

    fn fold_integer_binary(
        &mut self,
        op: BinOp,
        a: i128,
        b: i128,
        result_ty: TyId,
        location: SourceLocation,
    ) -> Option<Expr> {
        let symbol = op.symbol();
        let bounded = self.ty_bounds(result_ty);
        let width_bits = match self.tys.get(self.tys.value_ty(result_ty)) {
            Ty::Int(def) => Some(self.defs.int_type(*def).size as u32 * 8),
            _ => None,
        };

        let value = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Div | BinOp::Mod => {
                if b == 0 {
                    self.reporter.error("division by zero", location);
                    return None;
                }
                if op == BinOp::Div {
                    a.checked_div(b)
                } else {
                    a.checked_rem(b)
                }
            }
            BinOp::BitAnd => Some(a & b),
            BinOp::BitOr => Some(a | b),
            BinOp::BitXor => Some(a ^ b),
            BinOp::Shl | BinOp::LogicalShl => {
                if !(0..128).contains(&b) {
                    self.reporter
                        .error(format!("shift amount {b} is out of range"), location);
                    return None;
                }
                a.checked_shl(b as u32)
            }
            BinOp::Shr => {
                if !(0..128).contains(&b) {
                    self.reporter
                        .error(format!("shift amount {b} is out of range"), location);
                    return None;
                }
                Some(a >> b)
            }
            BinOp::LogicalShr => {
                if !(0..128).contains(&b) {
                    self.reporter
                        .error(format!("shift amount {b} is out of range"), location);
                    return None;
                }
                match width_bits {
                    Some(bits) => {
                        let mask = if bits >= 128 { -1i128 } else { (1i128 << bits) - 1 };
                        Some(((a & mask) as u128 >> b) as i128)
                    }
                    None => Some(a >> b),
                }
            }
            BinOp::RotateLeft | BinOp::RotateRight => {
                let Some(bits) = width_bits else {
                    self.reporter.error(
                        format!("`{symbol}` requires a sized integer type"),
                        location,
                    );
                    return None;
                };
                let amount = (b.rem_euclid(bits as i128)) as u32;
                let mask = if bits >= 128 { -1i128 } else { (1i128 << bits) - 1 };
                let value = a & mask;
                let rotated = if amount == 0 {
                    value
                } else if op == BinOp::RotateLeft {
                    ((value << amount) | (value >> (bits - amount))) & mask
                } else {
                    ((value >> amount) | (value << (bits - amount))) & mask
                };
                Some(self.wrap_to_ty(rotated, result_ty))
            }
            BinOp::AddWithCarry | BinOp::SubWithCarry => {
                self.reporter.error(
                    format!("`{symbol}` depends on the carry flag and cannot be evaluated at compile time"),
                    location,
                );
                return None;
            }
            _ => unreachable!("non-arithmetic operator in integer fold"),
        };

        let value = match value {
            Some(value) => value,
            None => {
                self.reporter
                    .error(format!("arithmetic overflow in `{symbol}`"), location);
                return None;
            }
        };

        if let Some((min, max)) = bounded {
            if matches!(op, BinOp::RotateLeft | BinOp::RotateRight | BinOp::LogicalShr) {
                // Already wrapped to the type's width.
            } else if value < min || value > max {
                self.reporter.error(
                    format!(
                        "result {value} of `{symbol}` does not fit in `{}` (range {min}..{max})",
                        self.describe_ty(result_ty)
                    ),
                    location,
                );
                return None;
            }
        }

        Some(self.mk_int(value, result_ty, location))
    }

    fn reduce_comparison(
        &mut self,
        op: BinOp,
        left: Expr,
        right: Expr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let left_ty = self.tys.value_ty(left.ty()?);
        let right_ty = self.tys.value_ty(right.ty()?);

        // Booleans compare with == and != only.
        let both_bool = matches!(self.tys.get(left_ty), Ty::Bool)
            && matches!(self.tys.get(right_ty), Ty::Bool);
        if both_bool {
            if !matches!(op, BinOp::Eq | BinOp::NotEq) {
                self.report_binary_mismatch(op, left_ty, right_ty, location);
                return None;
            }
            if let (Some(a), Some(b)) = (left.as_boolean(), right.as_boolean()) {
                let result = if op == BinOp::Eq { a == b } else { a != b };
                return Some(self.mk_bool(result, location));
            }
            let context = combine_context(left.context()?, right.context()?);
            return Some(Expr::reduced(
                ExprKind::Binary(op, Box::new(left), Box::new(right)),
                location,
                ExprInfo::new(context, self.tys.bool(), ExprFlags::empty()),
            ));
        }

        if !self.is_integer_ty(left_ty) && !matches!(self.tys.get(left_ty), Ty::Enum(_)) {
            self.report_binary_mismatch(op, left_ty, right_ty, location);
            return None;
        }

        let (left, right, _) = self.unify_integer_operands(op, left, right, location)?;

        if let (Some(a), Some(b)) = (left.as_integer(), right.as_integer()) {
            let result = match op {
                BinOp::Eq => a == b,
                BinOp::NotEq => a != b,
                BinOp::Less => a < b,
                BinOp::LessEq => a <= b,
                BinOp::Greater => a > b,
                _ => a >= b,
            };
            return Some(self.mk_bool(result, location));
        }

        let context = combine_context(left.context()?, right.context()?);
        Some(Expr::reduced(
            ExprKind::Binary(op, Box::new(left), Box::new(right)),
            location,
            ExprInfo::new(context, self.tys.bool(), ExprFlags::empty()),
        ))
    }

    pub(crate) fn reduce_cast(
        &mut self,
        operand: &Expr,
        ty: &ember_ast::ty::TypeExpr,
        location: SourceLocation,
    ) -> Option<Expr> {
        let operand = self.reduce_expression(operand)?;
        let target = self.reduce_type_expression(ty)?;
        let source_ty = operand.ty()?;

        let source_value = self.tys.value_ty(source_ty);
        let target_value = self.tys.value_ty(target);

        let castable = |sema: &Sema, ty: TyId| {
            matches!(
                sema.tys.get(ty),
                Ty::IExpr | Ty::Int(_) | Ty::Enum(_) | Ty::Bool | Ty::Pointer { .. } | Ty::Function(_)
            )
        };
        if !castable(self, source_value) || !castable(self, target_value) {
            self.reporter.error(
                format!(
                    "cannot cast `{}` to `{}`",
                    self.describe_ty(source_ty),
                    self.describe_ty(target)
                ),
                location,
            );
            return None;
        }

        // Inline functions have no address to cast.
        if let Some(def) = operand.referenced_def() {
            if let DefKind::Func(func) = &self.defs.get(def).kind {
                if func.inlined {
                    self.reporter
                        .error("cannot cast an `inline func` to another type", location);
                    return None;
                }
            }
        }

        // Compile-time casts wrap to the destination's bit width.
        if let Some(value) = operand.as_integer() {
            if matches!(self.tys.get(target_value), Ty::Bool) {
                return Some(self.mk_bool(value != 0, location));
            }
            let wrapped = self.wrap_to_ty(value, target_value);
            return Some(self.mk_int(wrapped, target, location));
        }
        if let Some(value) = operand.as_boolean() {
            let wrapped = self.wrap_to_ty(value as i128, target_value);
            return Some(self.mk_int(wrapped, target, location));
        }

        let context = operand.context()?;
        let flags = operand.flags();

        // Store the target in resolved form where possible, so link-time
        // re-reduction does not depend on the original scope.
        let stored_ty = match self.tys.get(target_value) {
            Ty::Int(def) | Ty::Enum(def) | Ty::Struct(def) | Ty::Bank(def) => {
                ember_ast::ty::TypeExpr::new(
                    ember_ast::ty::TypeExprKind::ResolvedIdentifier(*def),
                    ty.location,
                )
            }
            _ => ty.clone(),
        };

        Some(Expr::reduced(
            ExprKind::Cast { operand: Box::new(operand), ty: stored_ty },
            location,
            ExprInfo::new(context, target, flags),
        ))
    }

    /// Strict conversion for assignments, initializers and arguments:
    /// identical types pass, unbounded literals narrow when in range,
    /// everything else is a type mismatch.
    pub fn coerce_to_assignment_ty(
        &mut self,
        expr: Expr,
        dest: TyId,
        location: SourceLocation,
    ) -> Option<Expr> {
        let source = expr.ty()?;
        let dest_value = self.tys.value_ty(dest);

        if self.tys.ty_eq(source, dest_value) {
            return Some(expr);
        }

        let source_value = self.tys.value_ty(source);
        match (self.tys.get(source_value).clone(), self.tys.get(dest_value).clone()) {
            (Ty::IExpr, Ty::Int(_) | Ty::Pointer { .. }) => {
                self.narrow_literal(expr, dest_value, location)
            }
            (
                Ty::Array { element: source_element, length: a },
                Ty::Array { element: dest_element, length: b },
            ) if a == b => {
                // Element-wise narrowing of literal arrays.
                if self.tys.ty_eq(source_element, dest_element) {
                    return Some(expr);
                }
                if let ExprKind::ArrayLiteral(elements) = expr.kind {
                    let mut narrowed = Vec::with_capacity(elements.len());
                    for element in elements {
                        narrowed.push(self.coerce_to_assignment_ty(
                            element,
                            dest_element,
                            location,
                        )?);
                    }
                    return self.reduce_array_elements(narrowed, location);
                }
                self.reporter.error(
                    format!(
                        "expected `{}` but found `{}`",
                        self.describe_ty(dest),
                        self.describe_ty(source)
                    ),
                    location,
                );
                None
            }
            _ => {
                self.reporter.error(
                    format!(
                        "expected `{}` but found `{}`",
                        self.describe_ty(dest),
                        self.describe_ty(source)
                    ),
                    location,
                );
                None
            }
        }
    }

    /// Pick concrete types for an inferred declaration: unbounded integer
    /// literals default to the smallest platform integer that fits every
    /// value.
    pub fn defaultize_inferred(&mut self, expr: Expr, location: SourceLocation) -> Option<Expr> {
        let ty = expr.ty()?;
        match self.tys.get(self.tys.value_ty(ty)).clone() {
            Ty::IExpr => {
                let Some(value) = expr.as_integer() else { return Some(expr) };
                let candidates = [
                    self.platform().byte_type(),
                    self.platform().pointer_sized_type(),
                    self.platform().far_pointer_sized_type(),
                ];
                for candidate in candidates {
                    if self.defs.int_type(candidate).contains(value) {
                        let ty = self.tys.int(candidate);
                        return Some(self.mk_int(value, ty, location));
                    }
                }
                self.reporter.error(
                    format!("cannot infer an integer type that holds {value}"),
                    location,
                );
                None
            }
            Ty::Array { element, .. } if matches!(self.tys.get(element), Ty::IExpr) => {
                if !matches!(expr.kind, ExprKind::ArrayLiteral(_)) {
                    return Some(expr);
                }
                let ExprKind::ArrayLiteral(elements) = expr.kind else { unreachable!() };
                // All elements must fit the chosen default.
                let candidates = [
                    self.platform().byte_type(),
                    self.platform().pointer_sized_type(),
                    self.platform().far_pointer_sized_type(),
                ];
                let chosen = candidates.into_iter().find(|candidate| {
                    let int = self.defs.int_type(*candidate);
                    elements
                        .iter()
                        .all(|element| element.as_integer().map_or(false, |v| int.contains(v)))
                });
                let Some(chosen) = chosen else {
                    self.reporter.error(
                        "cannot infer an integer type for these array elements",
                        location,
                    );
                    return None;
                };
                let element_ty = self.tys.int(chosen);
                let narrowed = elements
                    .into_iter()
                    .map(|element| {
                        let value = element.as_integer();
                        match value {
                            Some(value) => self.mk_int(value, element_ty, element.location),
                            None => element,
                        }
                    })
                    .collect();
                self.reduce_array_elements(narrowed, location)
            }
            _ => Some(expr),
        }
    }
}
