//! Branch and control-flow lowering: conditional decomposition, the
//! platform test-and-branch protocol, and the structured statements that
//! desugar onto it.

use ember_ast::{
    expr::{EvalContext, Expr, ExprFlags, ExprInfo, ExprKind},
    op::{BinOp, BranchKind, UnOp},
    stmt::Stmt,
    DefId,
};
use ember_def::{DefKind, FnSig, Ty};
use ember_ir::InstrType;
use ember_source::SourceLocation;

use crate::{FuncFrame, IrBuilder, LoopLabels};

impl IrBuilder<'_> {
    /// A link-time reference to a label definition, usable as a branch
    /// destination expression.
    pub(crate) fn label_ref(&mut self, label: DefId, location: SourceLocation) -> Expr {
        let void = self.sema.tys.void();
        let ty = self.sema.tys.function(FnSig {
            far: false,
            parameters: Vec::new(),
            return_type: void,
        });
        Expr::reduced(
            ExprKind::ResolvedIdentifier(label, Vec::new()),
            location,
            ExprInfo::new(EvalContext::LinkTime, ty, ExprFlags::empty()),
        )
    }

    /// Entry point for `goto`/`return`/`break`/`continue [if cond]`.
    pub(crate) fn emit_branch_statement(
        &mut self,
        distance_hint: u32,
        kind: BranchKind,
        destination: Option<&Expr>,
        return_value: Option<&Expr>,
        condition: Option<&Expr>,
        location: SourceLocation,
    ) {
        let destination = match destination {
            Some(expr) => match self.sema.reduce_expression(expr) {
                Some(reduced) => Some(reduced),
                None => return,
            },
            None => None,
        };
        let return_value = match return_value {
            Some(expr) => match self.sema.reduce_expression(expr) {
                Some(reduced) => Some(reduced),
                None => return,
            },
            None => None,
        };
        let condition = match condition {
            Some(expr) => match self.sema.reduce_expression(expr) {
                Some(reduced) => Some(reduced),
                None => return,
            },
            None => None,
        };

        self.emit_branch_ir(
            distance_hint,
            kind,
            destination,
            return_value,
            false,
            condition.as_ref(),
            location,
        );
    }

    /// Decompose a possibly-conditional branch into IR.
    pub(crate) fn emit_branch_ir(
        &mut self,
        distance_hint: u32,
        kind: BranchKind,
        destination: Option<Expr>,
        return_value: Option<Expr>,
        negated: bool,
        condition: Option<&Expr>,
        location: SourceLocation,
    ) {
        // `continue`/`break` rewrite to gotos at the current loop labels.
        match kind {
            BranchKind::Continue | BranchKind::Break => {
                let Some(LoopLabels { begin, end }) = self.current_loop() else {
                    self.sema.reporter.error(
                        format!("`{kind}` cannot be used outside of a loop"),
                        location,
                    );
                    return;
                };
                let target = if kind == BranchKind::Continue { begin } else { end };
                let target = self.label_ref(target, location);
                return self.emit_branch_ir(
                    distance_hint,
                    BranchKind::Goto,
                    Some(target),
                    None,
                    negated,
                    condition,
                    location,
                );
            }
            _ => {}
        }

        let Some(condition) = condition else {
            return self.emit_unconditional_with_value(
                distance_hint,
                kind,
                destination,
                return_value,
                location,
            );
        };

        // Non-goto conditional branches (and conditional returns carrying
        // a value) rewrite to a forward jump around the unconditional
        // form, so the untaken path has no side effects.
        if kind != BranchKind::Goto && kind != BranchKind::FarGoto {
            let skip = self.synthesize_label(location);
            let skip_ref = self.label_ref(skip, location);
            self.emit_branch_ir(
                distance_hint,
                BranchKind::Goto,
                Some(skip_ref),
                None,
                !negated,
                Some(condition),
                location,
            );
            self.emit_unconditional_with_value(
                distance_hint,
                kind,
                destination,
                return_value,
                location,
            );
            self.place_label(skip, location);
            return;
        }

        match &condition.kind {
            ExprKind::BooleanLiteral(value) => {
                if *value != negated {
                    self.emit_unconditional_with_value(
                        distance_hint,
                        kind,
                        destination,
                        return_value,
                        location,
                    );
                }
            }

            ExprKind::Unary(UnOp::LogicalNot, inner) => {
                self.emit_branch_ir(
                    distance_hint,
                    kind,
                    destination,
                    return_value,
                    !negated,
                    Some(inner),
                    location,
                );
            }

            ExprKind::Binary(BinOp::LogicalAnd, left, right) => {
                if negated {
                    // goto D if !(l && r)  =  goto D if !l; goto D if !r
                    self.emit_branch_ir(
                        distance_hint,
                        kind,
                        destination.clone(),
                        None,
                        true,
                        Some(left),
                        location,
                    );
                    self.emit_branch_ir(
                        distance_hint,
                        kind,
                        destination,
                        None,
                        true,
                        Some(right),
                        location,
                    );
                } else {
                    // goto D if l && r  =  goto F if !l; goto D if r; F:
                    let failure = self.synthesize_label(location);
                    let failure_ref = self.label_ref(failure, location);
                    self.emit_branch_ir(
                        distance_hint,
                        BranchKind::Goto,
                        Some(failure_ref),
                        None,
                        true,
                        Some(left),
                        location,
                    );
                    self.emit_branch_ir(
                        distance_hint,
                        kind,
                        destination,
                        None,
                        false,
                        Some(right),
                        location,
                    );
                    self.place_label(failure, location);
                }
            }

            ExprKind::Binary(BinOp::LogicalOr, left, right) => {
                if negated {
                    // goto D if !(l || r)  =  goto S if l; goto D if !r; S:
                    let success = self.synthesize_label(location);
                    let success_ref = self.label_ref(success, location);
                    self.emit_branch_ir(
                        distance_hint,
                        BranchKind::Goto,
                        Some(success_ref),
                        None,
                        false,
                        Some(left),
                        location,
                    );
                    self.emit_branch_ir(
                        distance_hint,
                        kind,
                        destination,
                        None,
                        true,
                        Some(right),
                        location,
                    );
                    self.place_label(success, location);
                } else {
                    // goto D if l || r  =  goto D if l; goto D if r
                    self.emit_branch_ir(
                        distance_hint,
                        kind,
                        destination.clone(),
                        None,
                        false,
                        Some(left),
                        location,
                    );
                    self.emit_branch_ir(
                        distance_hint,
                        kind,
                        destination,
                        None,
                        false,
                        Some(right),
                        location,
                    );
                }
            }

            ExprKind::Binary(op, left, right) if op.is_comparison() => {
                self.emit_comparison_branch(
                    distance_hint,
                    destination,
                    *op,
                    left,
                    right,
                    negated,
                    location,
                );
            }

            // A plain boolean condition (a flag register, a bit test):
            // delegate to the platform's conditional-goto patterns.
            _ => {
                let Some(destination) = destination else {
                    self.sema
                        .reporter
                        .internal("conditional branch without destination", location);
                    return;
                };
                let flag_value = self
                    .sema
                    .mk_bool(!negated, location);
                self.select_or_report(
                    InstrType::Branch(BranchKind::Goto),
                    &[destination, condition.clone(), flag_value],
                    location,
                );
            }
        }
    }

    fn emit_comparison_branch(
        &mut self,
        distance_hint: u32,
        destination: Option<Expr>,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        negated: bool,
        location: SourceLocation,
    ) {
        let Some(destination) = destination else {
            self.sema
                .reporter
                .internal("conditional branch without destination", location);
            return;
        };

        // Fold the negation into the comparison up front, so the platform
        // only ever sees the branch-taken sense.
        let op = if negated {
            match op.negated_comparison() {
                Some(op) => op,
                None => return,
            }
        } else {
            op
        };

        let platform = self.sema.platform();
        let recipe = platform
            .test_and_branch(self.sema, op, left, right, distance_hint)
            .or_else(|| {
                // Retry with the comparison mirrored.
                op.flipped_comparison().and_then(|flipped| {
                    platform.test_and_branch(self.sema, flipped, right, left, distance_hint)
                })
            });

        let Some(recipe) = recipe else {
            self.sema.reporter.error(
                format!(
                    "comparison `{op}` cannot be lowered to a test-and-branch sequence on this platform"
                ),
                location,
            );
            return;
        };

        if let Some((test_type, operands)) = recipe.test {
            self.select_or_report(test_type, &operands, location);
        }

        // The synthetic failure label sits after the whole sequence; only
        // created when some branch needs it.
        let failure = recipe
            .branches
            .iter()
            .any(|branch| !branch.taken)
            .then(|| self.synthesize_label(location));

        for branch in &recipe.branches {
            let target = if branch.taken {
                destination.clone()
            } else {
                let label = failure.expect("failure label exists for untaken branches");
                self.label_ref(label, location)
            };

            let flag = self.flag_ref(branch.flag, location);
            let value = self.sema.mk_bool(branch.success_if, location);
            self.select_or_report(
                InstrType::Branch(BranchKind::Goto),
                &[target, flag, value],
                location,
            );
        }

        if let Some(failure) = failure {
            self.place_label(failure, location);
        }
    }

    /// A run-time reference to a flag register.
    pub(crate) fn flag_ref(&mut self, flag: DefId, location: SourceLocation) -> Expr {
        let ty = match &self.sema.defs.get(flag).kind {
            DefKind::BuiltinRegister(register) => register.ty,
            _ => self.sema.tys.bool(),
        };
        Expr::reduced(
            ExprKind::ResolvedIdentifier(flag, Vec::new()),
            location,
            ExprInfo::new(EvalContext::RunTime, ty, ExprFlags::L_VALUE),
        )
    }

    fn emit_unconditional_with_value(
        &mut self,
        distance_hint: u32,
        kind: BranchKind,
        destination: Option<Expr>,
        return_value: Option<Expr>,
        location: SourceLocation,
    ) {
        // A returned value is first assigned into the function's
        // designated return storage.
        if let Some(value) = return_value {
            let holder = self.current_return_holder(location);
            let Some(holder) = holder else {
                self.sema.reporter.error(
                    "cannot return a value from a function without a return type",
                    location,
                );
                return;
            };
            self.emit_assignment(&holder, &value, location);
        }

        self.emit_unconditional_branch(distance_hint, kind, destination, location);
    }

    /// The designated-storage holder expression of the current function's
    /// return type.
    fn current_return_holder(&mut self, location: SourceLocation) -> Option<Expr> {
        let frame = self.current_frame()?;
        let func = match frame {
            FuncFrame::Real(func) | FuncFrame::Inline { func, .. } => func,
        };
        let signature = self.sema.defs.func(func).signature?;
        let return_ty = match self.sema.tys.get(signature) {
            Ty::Function(sig) => sig.return_type,
            _ => return None,
        };
        match self.sema.tys.get(return_ty) {
            Ty::Designated { holder, .. } => Some((**holder).clone()),
            _ => {
                let _ = location;
                None
            }
        }
    }

    pub(crate) fn emit_unconditional_branch(
        &mut self,
        distance_hint: u32,
        kind: BranchKind,
        destination: Option<Expr>,
        location: SourceLocation,
    ) {
        let _ = distance_hint;

        // `return` inside an inline expansion jumps to the expansion's
        // return label instead of emitting a physical return.
        let kind = match self.current_frame() {
            Some(FuncFrame::Inline { return_label, .. }) if kind.is_return() => {
                let target = self.label_ref(return_label, location);
                return self.emit_unconditional_branch(
                    distance_hint,
                    BranchKind::Goto,
                    Some(target),
                    location,
                );
            }
            Some(FuncFrame::Real(func)) if kind == BranchKind::Return => {
                // A plain `return` adopts the function's convention
                // (irq/nmi handlers return differently).
                self.sema.defs.func(func).return_kind
            }
            Some(FuncFrame::Real(func)) if kind.is_return() => {
                // An explicit convention must agree with the function's.
                let expected = self.sema.defs.func(func).return_kind;
                if expected != kind {
                    let name = self.sema.defs.get(func).name;
                    self.sema.reporter.error(
                        format!(
                            "`{kind}` does not match the return convention `{expected}` of `{name}`"
                        ),
                        location,
                    );
                    return;
                }
                kind
            }
            _ => kind,
        };

        match kind {
            BranchKind::None => {}
            BranchKind::Goto | BranchKind::FarGoto | BranchKind::Call | BranchKind::FarCall => {
                let Some(destination) = destination else {
                    self.sema
                        .reporter
                        .internal(format!("`{kind}` without a destination"), location);
                    return;
                };
                self.select_or_report(InstrType::Branch(kind), &[destination], location);
            }
            _ => {
                self.select_or_report(InstrType::Branch(kind), &[], location);
            }
        }
    }

    // --- structured statements -------------------------------------------

    pub(crate) fn emit_if(
        &mut self,
        distance_hint: u32,
        condition: &Expr,
        then_body: &[Stmt],
        else_body: &[Stmt],
        location: SourceLocation,
    ) {
        let Some(condition) = self.sema.reduce_expression(condition) else { return };

        let else_label = self.synthesize_label(location);
        let else_ref = self.label_ref(else_label, location);
        self.emit_branch_ir(
            distance_hint,
            BranchKind::Goto,
            Some(else_ref),
            None,
            true,
            Some(&condition),
            location,
        );

        for inner in then_body {
            self.emit_statement_ir(inner);
        }

        if else_body.is_empty() {
            self.place_label(else_label, location);
        } else {
            let end_label = self.synthesize_label(location);
            let end_ref = self.label_ref(end_label, location);
            self.emit_branch_ir(
                distance_hint,
                BranchKind::Goto,
                Some(end_ref),
                None,
                false,
                None,
                location,
            );
            self.place_label(else_label, location);
            for inner in else_body {
                self.emit_statement_ir(inner);
            }
            self.place_label(end_label, location);
        }
    }

    pub(crate) fn emit_while(
        &mut self,
        distance_hint: u32,
        condition: &Expr,
        body: &[Stmt],
        location: SourceLocation,
    ) {
        let begin = self.synthesize_label(location);
        let end = self.synthesize_label(location);

        self.place_label(begin, location);
        let Some(condition) = self.sema.reduce_expression(condition) else { return };
        let end_ref = self.label_ref(end, location);
        self.emit_branch_ir(
            distance_hint,
            BranchKind::Goto,
            Some(end_ref),
            None,
            true,
            Some(&condition),
            location,
        );

        self.enter_loop(LoopLabels { begin, end }, |this| {
            for inner in body {
                this.emit_statement_ir(inner);
            }
        });

        let begin_ref = self.label_ref(begin, location);
        self.emit_branch_ir(
            distance_hint,
            BranchKind::Goto,
            Some(begin_ref),
            None,
            false,
            None,
            location,
        );
        self.place_label(end, location);
    }

    pub(crate) fn emit_do_while(
        &mut self,
        distance_hint: u32,
        body: &[Stmt],
        condition: &Expr,
        location: SourceLocation,
    ) {
        let begin = self.synthesize_label(location);
        let end = self.synthesize_label(location);

        self.place_label(begin, location);
        self.enter_loop(LoopLabels { begin, end }, |this| {
            for inner in body {
                this.emit_statement_ir(inner);
            }
        });

        let Some(condition) = self.sema.reduce_expression(condition) else { return };
        let begin_ref = self.label_ref(begin, location);
        self.emit_branch_ir(
            distance_hint,
            BranchKind::Goto,
            Some(begin_ref),
            None,
            false,
            Some(&condition),
            location,
        );
        self.place_label(end, location);
    }

    pub(crate) fn emit_for(
        &mut self,
        distance_hint: u32,
        counter: &Expr,
        sequence: &Expr,
        body: &[Stmt],
        location: SourceLocation,
    ) {
        let Some(counter) = self.sema.reduce_expression(counter) else { return };
        let Some(sequence) = self.sema.reduce_expression(sequence) else { return };

        let ExprKind::Range { start, end, step } = &sequence.kind else {
            self.sema
                .reporter
                .error("`for` requires a compile-time range", location);
            return;
        };
        let (Some(start), Some(end)) = (start.as_integer(), end.as_integer()) else {
            self.sema
                .reporter
                .error("`for` range bounds must be compile-time integers", location);
            return;
        };
        let step = step.as_ref().and_then(|s| s.as_integer()).unwrap_or(1);

        let Some(counter_ty) = counter.ty() else { return };
        let bounds = self.sema.ty_bounds(counter_ty);

        // counter = start
        let start_value = self.sema.mk_int(start, self.sema.tys.iexpr(), location);
        let Some(start_value) =
            self.sema.coerce_to_assignment_ty(start_value, counter_ty, location)
        else {
            return;
        };
        self.emit_assignment(&counter, &start_value, location);

        let begin = self.synthesize_label(location);
        let end_label = self.synthesize_label(location);
        self.place_label(begin, location);

        self.enter_loop(LoopLabels { begin, end: end_label }, |this| {
            for inner in body {
                this.emit_statement_ir(inner);
            }
        });

        // Increment, then branch back until the counter walks one step
        // past the inclusive end.
        let increment_ty = if step == 1 {
            Some(InstrType::Unary(UnOp::PreIncrement))
        } else if step == -1 {
            Some(InstrType::Unary(UnOp::PreDecrement))
        } else {
            None
        };
        match increment_ty {
            Some(ty) => self.select_or_report(ty, &[counter.clone()], location),
            None => {
                let step_value = self.sema.mk_int(step, counter_ty, location);
                let sum = Expr::reduced(
                    ExprKind::Binary(
                        BinOp::Add,
                        Box::new(counter.clone()),
                        Box::new(step_value),
                    ),
                    location,
                    ExprInfo::new(EvalContext::RunTime, counter_ty, ExprFlags::empty()),
                );
                self.emit_assignment(&counter, &sum, location);
            }
        }

        let stop = end + step;
        let stop_in_range = bounds.map(|(min, max)| stop >= min && stop <= max).unwrap_or(true);

        if stop_in_range {
            let stop_value = self.sema.mk_int(stop, counter_ty, location);
            let comparison = Expr::reduced(
                ExprKind::Binary(BinOp::NotEq, Box::new(counter.clone()), Box::new(stop_value)),
                location,
                ExprInfo::new(EvalContext::RunTime, self.sema.tys.bool(), ExprFlags::empty()),
            );
            let begin_ref = self.label_ref(begin, location);
            self.emit_branch_ir(
                distance_hint,
                BranchKind::Goto,
                Some(begin_ref),
                None,
                false,
                Some(&comparison),
                location,
            );
        } else if step.abs() == 1 && self.sema.platform().zero_flag().is_some() {
            // Full-range loops lean on the increment setting the zero
            // flag at wraparound.
            let zero = self.sema.platform().zero_flag().unwrap();
            let flag = self.flag_ref(zero, location);
            let value = self.sema.mk_bool(false, location);
            let begin_ref = self.label_ref(begin, location);
            self.select_or_report(
                InstrType::Branch(BranchKind::Goto),
                &[begin_ref, flag, value],
                location,
            );
        } else {
            self.sema.reporter.error(
                format!("`for` range end {end} requires a comparison value outside the counter type's range"),
                location,
            );
        }

        self.place_label(end_label, location);
    }
}
