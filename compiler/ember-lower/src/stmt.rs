//! Statement lowering: each statement kind either performs address-free
//! bookkeeping or appends IR nodes.

use ember_ast::{
    expr::{Expr, ExprKind},
    op::BranchKind,
    stmt::{Stmt, StmtKind},
    DefId,
};
use ember_def::DefKind;
use ember_ir::IrNodeKind;
use ember_source::SourceLocation;

use crate::{FuncFrame, IrBuilder};

impl IrBuilder<'_> {
    pub fn emit_statement_ir(&mut self, stmt: &Stmt) {
        let location = stmt.location;
        match &stmt.kind {
            StmtKind::File { name, items } => {
                let Some(scope) = self.sema.module_scope(*name) else { return };
                self.enter_scope(scope, |this| {
                    for item in items {
                        this.emit_statement_ir(item);
                    }
                });
            }

            StmtKind::ImportReference { .. } | StmtKind::Bank { .. } => {}

            StmtKind::Attribution { attributes, body } => {
                if !self.sema.compile_if_enabled(attributes) {
                    return;
                }
                // Mode attributes scope CPU mode flags over the wrapped
                // statement.
                let mut mask = 0u32;
                for attribute in attributes {
                    if let Some(bits) = self.sema.mode_attribute(attribute.name) {
                        mask |= bits;
                    }
                }
                self.with_mode(mask, |this| this.emit_statement_ir(body));
            }

            StmtKind::In { pieces, address, body } => {
                let Some((bank, address)) =
                    self.sema.resolve_in_target(pieces, address.clone(), location)
                else {
                    return;
                };
                self.push_node(IrNodeKind::PushRelocation { bank, address }, location);
                for inner in body {
                    self.emit_statement_ir(inner);
                }
                self.push_node(IrNodeKind::PopRelocation, location);
            }

            StmtKind::Namespace { name, body } => {
                let scope = self
                    .sema
                    .scopes
                    .find_local_member(self.sema.current_scope(), *name)
                    .and_then(|def| match &self.sema.defs.get(def).kind {
                        DefKind::Namespace(ns) => Some(ns.environment),
                        _ => None,
                    });
                let Some(scope) = scope else { return };
                self.enter_scope(scope, |this| {
                    for inner in body {
                        this.emit_statement_ir(inner);
                    }
                });
            }

            StmtKind::Let { .. }
            | StmtKind::Enum { .. }
            | StmtKind::Struct { .. }
            | StmtKind::TypeAlias { .. } => {}

            StmtKind::Config { items } => {
                for (key, value) in items {
                    if let Some(reduced) = self.sema.reduce_expression(value) {
                        self.sema.config.insert(*key, reduced);
                    }
                }
            }

            StmtKind::Var { names, .. } => {
                for name in names {
                    let Some(def) =
                        self.sema.scopes.find_local_member(self.sema.current_scope(), *name)
                    else {
                        continue;
                    };
                    if !matches!(self.sema.defs.get(def).kind, DefKind::Var(_)) {
                        continue;
                    }
                    let var = self.sema.defs.var(def);
                    // Variables placed in a stored bank emit their bytes
                    // through the layout passes.
                    let stored_bank = var
                        .address
                        .as_ref()
                        .and_then(|address| address.bank)
                        .map(|bank| self.sema.banks[bank].kind().is_stored())
                        .unwrap_or(false);
                    if stored_bank && var.initializer.is_some() {
                        self.push_node(IrNodeKind::Var(def), location);
                    }
                }
            }

            StmtKind::Func { inlined: true, .. } => {
                // Inline functions expand at their call sites.
            }

            StmtKind::Func { name, body, .. } => {
                let Some(func) =
                    self.sema.scopes.find_local_member(self.sema.current_scope(), *name)
                else {
                    return;
                };
                self.emit_function(func, body, location);
            }

            StmtKind::Label { name } => {
                let Some(def) =
                    self.sema.scopes.find_local_member(self.sema.current_scope(), *name)
                else {
                    return;
                };
                self.place_label(def, location);
            }

            StmtKind::Branch { distance_hint, kind, destination, return_value, condition } => {
                self.emit_branch_statement(
                    *distance_hint,
                    *kind,
                    destination.as_ref(),
                    return_value.as_ref(),
                    condition.as_ref(),
                    location,
                );
            }

            StmtKind::If { distance_hint, condition, then_body, else_body } => {
                self.emit_if(*distance_hint, condition, then_body, else_body, location);
            }

            StmtKind::While { distance_hint, condition, body } => {
                self.emit_while(*distance_hint, condition, body, location);
            }

            StmtKind::DoWhile { distance_hint, body, condition } => {
                self.emit_do_while(*distance_hint, body, condition, location);
            }

            StmtKind::For { distance_hint, counter, sequence, body } => {
                self.emit_for(*distance_hint, counter, sequence, body, location);
            }

            StmtKind::InlineFor { name, sequence, body } => {
                self.emit_inline_for(*name, sequence, body, location);
            }

            StmtKind::ExpressionStatement(expr) => {
                let Some(reduced) = self.sema.reduce_expression(expr) else { return };
                self.emit_expression_ir(&reduced, location);
            }
        }
    }

    fn emit_function(&mut self, func: DefId, body: &[Stmt], location: SourceLocation) {
        let (environment, fallthrough, return_kind, signature) = {
            let def = self.sema.defs.func(func);
            (def.environment, def.fallthrough, def.return_kind, def.signature)
        };

        self.place_label(func, location);

        // A body whose last statement branches away unconditionally needs
        // no implicit return.
        let has_unconditional_return = body
            .last()
            .map(|stmt| {
                matches!(
                    &stmt.kind,
                    StmtKind::Branch { condition: None, kind, .. }
                        if kind.is_return() || matches!(kind, BranchKind::Goto | BranchKind::FarGoto)
                )
            })
            .unwrap_or(false);
        self.sema.defs.func_mut(func).has_unconditional_return = has_unconditional_return;

        self.enter_func_frame(FuncFrame::Real(func), |this| {
            this.enter_scope(environment, |this| {
                for inner in body {
                    this.emit_statement_ir(inner);
                }
            });
        });

        if !has_unconditional_return && !fallthrough {
            let returns_value = signature
                .map(|sig| match signature_return_ty(self.sema, sig) {
                    Some(ty) => !matches!(self.sema.tys.get(ty), ember_def::Ty::Void),
                    None => false,
                })
                .unwrap_or(false);
            if returns_value {
                let name = self.sema.defs.get(func).name;
                self.sema.reporter.error(
                    format!("function `{name}` is missing a return statement"),
                    location,
                );
                return;
            }
            self.emit_unconditional_branch(0, return_kind, None, location);
        }
    }

    /// Lower an already-reduced expression used in statement position.
    pub fn emit_expression_ir(&mut self, expr: &Expr, location: SourceLocation) {
        match &expr.kind {
            ExprKind::Binary(ember_ast::op::BinOp::Assign, left, right) => {
                self.emit_assignment(left, right, location);
            }

            ExprKind::Unary(op, operand) if op.is_increment() => {
                self.select_or_report(
                    ember_ir::InstrType::Unary(*op),
                    &[operand.as_ref().clone()],
                    location,
                );
            }

            ExprKind::Call { inlined, callee, arguments } => {
                self.emit_call(*inlined, callee, arguments, None, location);
            }

            ExprKind::SideEffect { stmt, result } => {
                self.emit_statement_ir(stmt);
                self.emit_expression_ir(result, location);
            }

            // A bare reduced literal or value has no effect to emit.
            _ => {
                self.sema
                    .reporter
                    .error("expression statement has no effect", location);
            }
        }
    }
}

fn signature_return_ty(sema: &ember_sema::Sema, sig: ember_ast::TyId) -> Option<ember_ast::TyId> {
    match sema.tys.get(sig) {
        ember_def::Ty::Function(sig) => Some(sema.tys.value_ty(sig.return_type)),
        _ => None,
    }
}
