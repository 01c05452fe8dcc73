//! Inline expansion: `inline func` call sites and `inline for` loops.
//! Each expansion gets a fresh inline-site scope, and the expanded body
//! re-runs all three resolver phases rooted there, so the same source
//! statements produce distinct definitions per expansion.

use ember_ast::{expr::Expr, stmt::Stmt, DefId};
use ember_def::{DefKind, Definition, LetDef, LetKind};
use ember_source::{identifier::Identifier, SourceLocation};

use crate::{FuncFrame, IrBuilder};

impl IrBuilder<'_> {
    /// Expand a call to an `inline func` in place: bind arguments into
    /// the parameters' designated storage, re-resolve the body in a fresh
    /// site scope, and emit it with `return` rewritten to a jump at a
    /// synthesized label.
    pub(crate) fn expand_inline_call(
        &mut self,
        func: DefId,
        arguments: &[Expr],
        dest: Option<&Expr>,
        location: SourceLocation,
    ) {
        let (parameters, body, parent_scope) = {
            let def = self.sema.defs.func(func);
            (def.parameters.clone(), def.body.clone(), self.sema.defs.get(func).parent_scope)
        };

        if arguments.len() != parameters.len() {
            let name = self.sema.defs.get(func).name;
            self.sema.reporter.error(
                format!(
                    "`{name}` expects {} argument(s) but got {}",
                    parameters.len(),
                    arguments.len()
                ),
                location,
            );
            return;
        }

        // Arguments flow into the parameters' designated storage before
        // the body runs.
        for (argument, parameter) in arguments.iter().zip(&parameters) {
            let Some(holder) = self.parameter_holder(*parameter, location) else { continue };
            self.emit_assignment(&holder, argument, location);
        }

        let site = self.sema.scopes.add(None, Some(parent_scope));

        // The body sees the parameters by name, bound to the original
        // parameter definitions.
        for parameter in &parameters {
            let name = self.sema.defs.get(*parameter).name;
            self.sema.scopes.insert_or_replace_member(site, name, *parameter);
        }

        self.resolve_expansion(site, &body);

        let return_label = self.synthesize_label(location);
        self.enter_func_frame(FuncFrame::Inline { func, return_label }, |this| {
            this.enter_scope(site, |this| {
                for stmt in &body {
                    this.emit_statement_ir(stmt);
                }
            });
        });
        self.place_label(return_label, location);

        // The call's value, if requested, is read out of the return
        // type's designated storage.
        if let Some(dest) = dest {
            let signature = self.sema.defs.func(func).signature;
            let holder = signature.and_then(|sig| match self.sema.tys.get(sig) {
                ember_def::Ty::Function(sig) => match self.sema.tys.get(sig.return_type) {
                    ember_def::Ty::Designated { holder, .. } => Some((**holder).clone()),
                    _ => None,
                },
                _ => None,
            });
            match holder {
                Some(holder) => self.emit_assignment(dest, &holder, location),
                None => {
                    self.sema
                        .reporter
                        .error("inline function does not return a value", location);
                }
            }
        }
    }

    /// Fully unroll an `inline for`: one expansion of the body per
    /// sequence element, each in its own site scope binding the loop
    /// variable as a compile-time value.
    pub(crate) fn emit_inline_for(
        &mut self,
        name: Identifier,
        sequence: &Expr,
        body: &[Stmt],
        location: SourceLocation,
    ) {
        let Some(sequence) = self.sema.reduce_expression(sequence) else { return };
        let Some(values) = self.sema.sequence_values(&sequence, location) else { return };

        let begin = self.synthesize_label(location);
        self.place_label(begin, location);

        for value in values {
            let site = self.sema.scopes.add(None, Some(self.sema.current_scope()));
            let binding = self.sema.defs.add(Definition {
                name,
                kind: DefKind::Let(LetDef {
                    kind: LetKind::User,
                    parameters: Vec::new(),
                    body: Some(value),
                }),
                location,
                parent_scope: site,
            });
            self.sema.scopes.insert_or_replace_member(site, name, binding);

            self.resolve_expansion(site, body);

            self.enter_scope(site, |this| {
                for stmt in body {
                    this.emit_statement_ir(stmt);
                }
            });
        }

        let end = self.synthesize_label(location);
        self.place_label(end, location);
    }

    /// Run the reserve / type-resolve / storage-reserve phases over an
    /// expanded body, rooted at the inline-site scope.
    fn resolve_expansion(&mut self, site: ember_def::ScopeId, body: &[Stmt]) {
        self.enter_scope(site, |this| {
            for stmt in body {
                this.sema.reserve_definitions(stmt);
            }
        });
        self.sema.resolve_definition_types();
        self.enter_scope(site, |this| {
            for stmt in body {
                this.sema.reserve_variable_storage(stmt);
            }
        });
    }
}
