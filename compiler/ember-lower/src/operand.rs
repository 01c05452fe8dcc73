//! Mapping reduced expressions to instruction operands. Link-time values
//! become placeholder integers sized to the platform's pointer width;
//! layout pass 2 re-reduces the source expression and rebuilds the
//! operand with real bits.

use ember_ast::{
    expr::{EvalContext, Expr, ExprFlags, ExprKind},
    op::{BinOp, UnOp},
    TyId,
};
use ember_def::{DefKind, Ty};
use ember_ir::InstructionOperand;
use ember_source::SourceLocation;

use crate::IrBuilder;

impl IrBuilder<'_> {
    /// The byte width of a memory access of type `ty`.
    fn access_size(&mut self, ty: TyId, location: SourceLocation) -> Option<usize> {
        self.sema.calculate_storage_size(ty, location, "memory operand")
    }

    pub fn create_operand_from_expression(
        &mut self,
        expr: &Expr,
        location: SourceLocation,
    ) -> Option<InstructionOperand> {
        match &expr.kind {
            ExprKind::IntegerLiteral(value) => Some(InstructionOperand::integer(*value)),
            ExprKind::BooleanLiteral(value) => Some(InstructionOperand::Boolean(*value)),

            ExprKind::ResolvedIdentifier(def, _) => {
                match &self.sema.defs.get(*def).kind {
                    DefKind::BuiltinRegister(_) => Some(InstructionOperand::Register(*def)),

                    DefKind::Var(var) => {
                        let ty = var.reduced_ty?;
                        // Designated storage lowers through its holder.
                        if let Ty::Designated { holder, .. } = self.sema.tys.get(ty) {
                            let holder = (**holder).clone();
                            return self.create_operand_from_expression(&holder, location);
                        }

                        let size = var.storage_size?;
                        let address = var
                            .address
                            .as_ref()
                            .and_then(|address| address.absolute_position);
                        let far = expr.flags().contains(ExprFlags::FAR);
                        let inner = match address {
                            Some(address) => InstructionOperand::integer(address as i128),
                            None => InstructionOperand::placeholder(
                                self.sema.platform().placeholder_value(),
                            ),
                        };
                        Some(InstructionOperand::Dereference {
                            far,
                            operand: Box::new(inner),
                            size,
                        })
                    }

                    DefKind::Func(func) => {
                        // A function or label reference is its address.
                        let address = func
                            .address
                            .as_ref()
                            .and_then(|address| address.absolute_position);
                        Some(match address {
                            Some(address) => InstructionOperand::integer(address as i128),
                            None => InstructionOperand::placeholder(
                                self.sema.platform().placeholder_value(),
                            ),
                        })
                    }

                    kind => {
                        let described = kind.describe();
                        self.sema.reporter.error(
                            format!("a {described} cannot be used as an instruction operand"),
                            location,
                        );
                        None
                    }
                }
            }

            ExprKind::Unary(UnOp::Indirection, inner) => {
                let ty = expr.ty()?;
                let size = self.access_size(ty, location)?;
                let far = expr.flags().contains(ExprFlags::FAR);
                let operand = self.create_operand_from_expression(inner, location)?;
                Some(InstructionOperand::Dereference { far, operand: Box::new(operand), size })
            }

            ExprKind::Binary(BinOp::Index, base, index) => {
                let element_ty = expr.ty()?;
                let size = self.access_size(element_ty, location)?;
                let far = expr.flags().contains(ExprFlags::FAR);
                let base_operand = self.address_operand(base, location)?;
                let index_operand = self.create_operand_from_expression(index, location)?;
                Some(InstructionOperand::Index {
                    far,
                    operand: Box::new(base_operand),
                    subscript: Box::new(index_operand),
                    subscript_scale: size,
                    size,
                })
            }

            ExprKind::Binary(BinOp::BitIndex, value, bit) => {
                let operand = self.create_operand_from_expression(value, location)?;
                let subscript = self.create_operand_from_expression(bit, location)?;
                Some(InstructionOperand::BitIndex {
                    operand: Box::new(operand),
                    subscript: Box::new(subscript),
                })
            }

            ExprKind::Binary(op, left, right) => {
                // Link-time arithmetic that has not folded yet becomes a
                // placeholder; run-time structure is preserved for
                // pattern matching.
                if expr.context() == Some(EvalContext::LinkTime) {
                    return Some(InstructionOperand::placeholder(
                        self.sema.platform().placeholder_value(),
                    ));
                }
                let left = self.create_operand_from_expression(left, location)?;
                let right = self.create_operand_from_expression(right, location)?;
                Some(InstructionOperand::Binary(*op, Box::new(left), Box::new(right)))
            }

            ExprKind::Unary(op, operand) => {
                if expr.context() == Some(EvalContext::LinkTime) {
                    return Some(InstructionOperand::placeholder(
                        self.sema.platform().placeholder_value(),
                    ));
                }
                let operand = self.create_operand_from_expression(operand, location)?;
                Some(InstructionOperand::Unary(*op, Box::new(operand)))
            }

            ExprKind::Cast { operand, .. } => {
                // A run-time cast is transparent when no bits change:
                // matching sizes, or a register operand reinterpreted.
                let source_ty = operand.ty()?;
                let target_ty = expr.ty()?;
                let is_register = matches!(
                    operand.referenced_def().map(|def| &self.sema.defs.get(def).kind),
                    Some(DefKind::BuiltinRegister(_))
                );
                if !is_register {
                    let source_size = self.access_size(source_ty, location)?;
                    let target_size = self.access_size(target_ty, location)?;
                    if source_size != target_size {
                        self.sema.reporter.error(
                            format!(
                                "run-time cast from `{}` to `{}` changes size and would require a temporary",
                                self.sema.describe_ty(source_ty),
                                self.sema.describe_ty(target_ty)
                            ),
                            location,
                        );
                        return None;
                    }
                }
                self.create_operand_from_expression(operand, location)
            }

            _ => {
                if expr.context() == Some(EvalContext::LinkTime) {
                    return Some(InstructionOperand::placeholder(
                        self.sema.platform().placeholder_value(),
                    ));
                }
                self.sema.reporter.error(
                    "expression cannot be used as an instruction operand",
                    location,
                );
                None
            }
        }
    }

    /// The address of an indexed base: a placed variable contributes its
    /// (possibly still unknown) address; a pointer value contributes
    /// itself.
    fn address_operand(
        &mut self,
        base: &Expr,
        location: SourceLocation,
    ) -> Option<InstructionOperand> {
        if let Some(def) = base.referenced_def() {
            if let DefKind::Var(var) = &self.sema.defs.get(def).kind {
                let ty = var.reduced_ty?;
                if matches!(
                    self.sema.tys.get(self.sema.tys.value_ty(ty)),
                    Ty::Array { .. }
                ) {
                    let address = var
                        .address
                        .as_ref()
                        .and_then(|address| address.absolute_position);
                    return Some(match address {
                        Some(address) => InstructionOperand::integer(address as i128),
                        None => InstructionOperand::placeholder(
                            self.sema.platform().placeholder_value(),
                        ),
                    });
                }
            }
        }
        self.create_operand_from_expression(base, location)
    }
}
