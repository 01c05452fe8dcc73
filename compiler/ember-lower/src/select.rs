//! Instruction selection: build operands for a reduced expression list,
//! query the platform table, and fall back to the two-operand /
//! three-operand rewrites when nothing matches directly. Final failure
//! enumerates every candidate pattern for the operator.

use ember_ast::{
    expr::{Expr, ExprFlags, ExprKind},
    op::{BinOp, UnOp},
};
use ember_def::DefKind;
use ember_ir::{InstrType, IrNodeKind, OperandRoot};
use ember_source::SourceLocation;
use ember_utils::itertools::Itertools;

use crate::IrBuilder;

impl IrBuilder<'_> {
    /// Try to select and emit one instruction for `ty` over `operands`.
    pub(crate) fn try_select(
        &mut self,
        ty: InstrType,
        operands: &[Expr],
        location: SourceLocation,
    ) -> bool {
        let mut roots = Vec::with_capacity(operands.len());
        for operand in operands {
            let Some(built) = self.create_operand_from_expression(operand, location) else {
                return false;
            };
            roots.push(OperandRoot::new(Box::new(operand.clone()), built));
        }

        let built: Vec<_> = roots.iter().map(|root| root.operand.clone()).collect();
        let Some((instruction, _captures)) = self.sema.instructions.select(ty, self.mode(), &built)
        else {
            return false;
        };

        self.push_node(IrNodeKind::Code { instruction, operands: roots }, location);
        true
    }

    /// Select-or-diagnose for callers with no further rewrites to try.
    pub(crate) fn select_or_report(
        &mut self,
        ty: InstrType,
        operands: &[Expr],
        location: SourceLocation,
    ) {
        if !self.try_select(ty, operands, location) {
            self.report_no_instruction(ty, operands, location);
        }
    }

    /// Lower `dest = src`, trying the assignment patterns first and the
    /// in-place operator rewrites after.
    pub(crate) fn emit_assignment(&mut self, dest: &Expr, src: &Expr, location: SourceLocation) {
        // Plain assignment.
        if self.try_select(
            InstrType::Binary(BinOp::Assign),
            &[dest.clone(), src.clone()],
            location,
        ) {
            return;
        }

        match &src.kind {
            ExprKind::Binary(op, left, right) => {
                // dest = dest op rhs: two-operand form.
                if left.kind == dest.kind
                    && self.try_select(
                        InstrType::Binary(*op),
                        &[dest.clone(), right.as_ref().clone()],
                        location,
                    )
                {
                    return;
                }

                // Full three-operand form.
                if self.try_select(
                    InstrType::Binary(*op),
                    &[dest.clone(), left.as_ref().clone(), right.as_ref().clone()],
                    location,
                ) {
                    return;
                }

                // dest = left; dest op= right, when the right side is a
                // leaf. Re-reading dest is required, so a writeonly
                // destination would need a temporary.
                if is_leaf(right) {
                    if dest.flags().contains(ExprFlags::WRITE_ONLY) {
                        self.sema.reporter.error(
                            "in-place rewrite of this assignment would read a writeonly destination",
                            location,
                        );
                        return;
                    }
                    if left.kind != dest.kind {
                        self.emit_assignment(dest, left, location);
                    }
                    if self.try_select(
                        InstrType::Binary(*op),
                        &[dest.clone(), right.as_ref().clone()],
                        location,
                    ) {
                        return;
                    }
                }

                self.report_no_instruction(InstrType::Binary(*op), &[src.clone()], location);
            }

            ExprKind::Unary(op, operand) => {
                // dest = op dest: in-place unary.
                if operand.kind == dest.kind
                    && self.try_select(InstrType::Unary(*op), &[dest.clone()], location)
                {
                    return;
                }

                // Two-operand unary form (dest, operand).
                if self.try_select(
                    InstrType::Unary(*op),
                    &[dest.clone(), operand.as_ref().clone()],
                    location,
                ) {
                    return;
                }

                // dest = operand; dest = op dest.
                if dest.flags().contains(ExprFlags::WRITE_ONLY) {
                    self.sema.reporter.error(
                        "in-place rewrite of this assignment would read a writeonly destination",
                        location,
                    );
                    return;
                }
                self.emit_assignment(dest, operand, location);
                if self.try_select(InstrType::Unary(*op), &[dest.clone()], location) {
                    return;
                }

                self.report_no_instruction(InstrType::Unary(*op), &[src.clone()], location);
            }

            ExprKind::Call { inlined, callee, arguments } => {
                self.emit_call(*inlined, callee, arguments, Some(dest), location);
            }

            _ => {
                self.report_no_instruction(
                    InstrType::Binary(BinOp::Assign),
                    &[dest.clone(), src.clone()],
                    location,
                );
            }
        }
    }

    /// Lower a call in statement position, or with a destination for its
    /// return value.
    pub(crate) fn emit_call(
        &mut self,
        inlined: bool,
        callee: &Expr,
        arguments: &[Expr],
        dest: Option<&Expr>,
        location: SourceLocation,
    ) {
        let callee_def = callee.referenced_def();

        if let Some(def) = callee_def {
            match &self.sema.defs.get(def).kind {
                DefKind::BuiltinVoidIntrinsic => {
                    // Side-effecting arguments (`cmp(x = e)`, `bit(++x)`)
                    // emit the effect first and pass the storage.
                    let mut operands = Vec::with_capacity(arguments.len());
                    for argument in arguments {
                        operands.push(self.unwrap_side_effect_argument(argument, location));
                    }
                    self.select_or_report(InstrType::VoidIntrinsic(def), &operands, location);
                    return;
                }

                DefKind::BuiltinLoadIntrinsic(_) => {
                    let Some(dest) = dest else {
                        self.sema.reporter.error(
                            "this intrinsic produces a value and needs a destination",
                            location,
                        );
                        return;
                    };
                    let mut operands = vec![dest.clone()];
                    operands.extend(arguments.iter().cloned());
                    self.select_or_report(InstrType::LoadIntrinsic(def), &operands, location);
                    return;
                }

                DefKind::Func(func) => {
                    if inlined || func.inlined {
                        self.expand_inline_call(def, arguments, dest, location);
                        return;
                    }
                    let far = func.far;
                    let kind = if far {
                        ember_ast::op::BranchKind::FarCall
                    } else {
                        ember_ast::op::BranchKind::Call
                    };

                    // Arguments land in the parameters' designated storage
                    // before the jump.
                    let parameters = func.parameters.clone();
                    for (argument, parameter) in arguments.iter().zip(&parameters) {
                        let Some(holder) = self.parameter_holder(*parameter, location) else {
                            continue;
                        };
                        self.emit_assignment(&holder, argument, location);
                    }

                    self.select_or_report(
                        InstrType::Branch(kind),
                        &[callee.clone()],
                        location,
                    );

                    // The return value arrives in the signature's
                    // designated return storage.
                    if let Some(dest) = dest {
                        let signature = self.sema.defs.func(def).signature;
                        let holder = signature.and_then(|sig| {
                            match self.sema.tys.get(sig) {
                                ember_def::Ty::Function(sig) => {
                                    match self.sema.tys.get(sig.return_type) {
                                        ember_def::Ty::Designated { holder, .. } => {
                                            Some((**holder).clone())
                                        }
                                        _ => None,
                                    }
                                }
                                _ => None,
                            }
                        });
                        match holder {
                            Some(holder) => self.emit_assignment(dest, &holder, location),
                            None => {
                                self.sema.reporter.error(
                                    "called function does not return a value",
                                    location,
                                );
                            }
                        }
                    }
                    return;
                }

                _ => {}
            }
        }

        // Calling through a pointer expression.
        self.select_or_report(
            InstrType::Branch(ember_ast::op::BranchKind::Call),
            &[callee.clone()],
            location,
        );
    }

    /// The designated-storage holder of a parameter definition.
    pub(crate) fn parameter_holder(
        &mut self,
        parameter: ember_ast::DefId,
        location: SourceLocation,
    ) -> Option<Expr> {
        let ty = self.sema.defs.var(parameter).reduced_ty?;
        match self.sema.tys.get(ty) {
            ember_def::Ty::Designated { holder, .. } => Some((**holder).clone()),
            _ => {
                let name = self.sema.defs.get(parameter).name;
                self.sema.reporter.error(
                    format!("parameter `{name}` needs designated storage to receive arguments"),
                    location,
                );
                None
            }
        }
    }

    /// For intrinsic arguments of the form `x = expr` or `++x`: emit the
    /// side effect now and hand back `x` as the operand.
    fn unwrap_side_effect_argument(&mut self, argument: &Expr, location: SourceLocation) -> Expr {
        match &argument.kind {
            ExprKind::Binary(BinOp::Assign, dest, src) => {
                self.emit_assignment(dest, src, location);
                dest.as_ref().clone()
            }
            ExprKind::Unary(op, operand) if op.is_increment() => {
                self.select_or_report(
                    InstrType::Unary(*op),
                    &[operand.as_ref().clone()],
                    location,
                );
                operand.as_ref().clone()
            }
            _ => argument.clone(),
        }
    }

    /// `NoMatchingInstruction`: list every registered candidate for the
    /// operator to help the programmer find a legal form.
    pub(crate) fn report_no_instruction(
        &mut self,
        ty: InstrType,
        operands: &[Expr],
        location: SourceLocation,
    ) {
        let candidates: Vec<String> = self
            .sema
            .instructions
            .candidates(ty)
            .map(|instruction| {
                let patterns =
                    instruction.signature.patterns.iter().map(|pattern| pattern.describe()).join(", ");
                format!("{} {patterns}", ty.describe())
            })
            .collect();

        let described = operands
            .iter()
            .map(|operand| {
                operand
                    .ty()
                    .map(|ty| self.sema.describe_ty(ty))
                    .unwrap_or_else(|| "<unknown>".into())
            })
            .join(", ");

        let report = self.sema.reporter.error(
            format!("no instruction matches {} with operand(s) {described}", ty.describe()),
            location,
        );
        if candidates.is_empty() {
            report.add_note("the platform defines no candidates for this operation");
        } else {
            for candidate in candidates {
                report.add_note(format!("candidate: {candidate}"));
            }
        }
    }
}

/// Whether an expression is simple enough to be the rewritten right-hand
/// side of a decomposed in-place operation.
fn is_leaf(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::IntegerLiteral(_)
            | ExprKind::BooleanLiteral(_)
            | ExprKind::ResolvedIdentifier(..)
            | ExprKind::Unary(UnOp::Indirection, _)
    )
}
