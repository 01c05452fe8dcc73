//! Resolver phase R1: walk the AST once, creating every named declaration
//! and appending it to the worklist phase R2 consumes. Attribution
//! wrappers are validated here; `compile_if(false)` statements are skipped
//! entirely.

use ember_ast::{
    op::BranchKind,
    stmt::{Attribute, Stmt, StmtKind},
    DefId,
};
use ember_def::{
    BankDef, DefKind, EnumDef, EnumMemberDef, FuncDef, LetDef, LetKind, NamespaceDef, StructDef,
    StructMemberDef, TypeAliasDef, VarDef,
};
use ember_source::identifier::{join_pieces, Identifier};

use crate::Sema;

impl Sema {
    /// Phase R1 entry point.
    pub fn reserve_definitions(&mut self, stmt: &Stmt) {
        self.reserve_statement(stmt, &[]);
    }

    /// Validate attribute names and arities. Unknown names are reported
    /// once, here in R1; later phases evaluate attributes without
    /// re-validating.
    fn check_attributes(&mut self, attributes: &[Attribute]) {
        for attribute in attributes {
            let name = attribute.name.name();
            let expected_arity = match name.as_str() {
                "compile_if" => Some(1),
                "irq" | "nmi" | "fallthrough" => Some(0),
                _ if self.mode_attribute(attribute.name).is_some() => Some(0),
                _ => None,
            };

            match expected_arity {
                None => {
                    self.reporter
                        .error(format!("unknown attribute `{name}`"), attribute.location);
                }
                Some(arity) if attribute.arguments.len() != arity => {
                    self.reporter.error(
                        format!(
                            "attribute `{name}` expects {arity} argument(s) but got {}",
                            attribute.arguments.len()
                        ),
                        attribute.location,
                    );
                }
                Some(_) => {}
            }
        }
    }

    /// Evaluate `compile_if` attributes; `false` means the wrapped
    /// statement is skipped in every phase.
    pub fn compile_if_enabled(&mut self, attributes: &[Attribute]) -> bool {
        for attribute in attributes {
            if attribute.name.name() != "compile_if" {
                continue;
            }
            let Some(argument) = attribute.arguments.first() else {
                return false;
            };
            let Some(reduced) = self.reduce_expression(argument) else {
                return false;
            };
            match reduced.as_boolean() {
                Some(true) => {}
                Some(false) => return false,
                None => {
                    self.reporter.error(
                        "`compile_if` requires a compile-time boolean",
                        attribute.location,
                    );
                    return false;
                }
            }
        }
        true
    }

    fn reserve_statement(&mut self, stmt: &Stmt, attributes: &[Attribute]) {
        match &stmt.kind {
            StmtKind::File { name, items } => {
                let scope = self.scopes.add(Some(*name), Some(self.builtin_scope()));
                // File contents are transparently visible from the scope
                // that included the file.
                let enclosing = self.current_scope();
                self.scopes.add_recursive_import(enclosing, scope);
                self.register_module(*name, scope);

                self.enter_scope(scope, |sema| {
                    for item in items {
                        sema.reserve_statement(item, &[]);
                    }
                });
            }

            StmtKind::ImportReference { pieces } => {
                let name = Identifier::from(join_pieces(pieces));
                match self.module_scope(name) {
                    Some(scope) => {
                        let enclosing = self.current_scope();
                        self.scopes.add_recursive_import(enclosing, scope);
                    }
                    None => {
                        self.reporter.error(
                            format!("could not resolve import `{name}`"),
                            stmt.location,
                        );
                    }
                }
            }

            StmtKind::Attribution { attributes: wrapped, body } => {
                self.check_attributes(wrapped);
                if !self.compile_if_enabled(wrapped) {
                    return;
                }
                self.reserve_statement(body, wrapped);
            }

            StmtKind::Bank { names, addresses, ty } => {
                for (name, address) in names.iter().zip(addresses) {
                    let def = self.create_definition(
                        *name,
                        DefKind::Bank(BankDef {
                            type_expr: ty.clone(),
                            address_expr: address.clone(),
                            bank: None,
                        }),
                        stmt.location,
                    );
                    self.definitions_to_resolve.push(def);
                }
            }

            StmtKind::In { body, .. } => {
                for inner in body {
                    self.reserve_statement(inner, &[]);
                }
            }

            StmtKind::Namespace { name, body } => {
                // Multiple declarations of the same namespace merge into
                // one scope.
                let existing = self
                    .scopes
                    .find_local_member(self.current_scope(), *name)
                    .filter(|def| matches!(self.defs.get(*def).kind, DefKind::Namespace(_)));

                let environment = match existing {
                    Some(def) => match &self.defs.get(def).kind {
                        DefKind::Namespace(ns) => ns.environment,
                        _ => unreachable!(),
                    },
                    None => {
                        let scope = self.scopes.add(Some(*name), Some(self.current_scope()));
                        self.create_definition(
                            *name,
                            DefKind::Namespace(NamespaceDef { environment: scope }),
                            stmt.location,
                        );
                        scope
                    }
                };

                self.enter_scope(environment, |sema| {
                    for inner in body {
                        sema.reserve_statement(inner, &[]);
                    }
                });
            }

            StmtKind::Let { name, parameters, value } => {
                self.create_definition(
                    *name,
                    DefKind::Let(LetDef {
                        kind: LetKind::User,
                        parameters: parameters.clone(),
                        body: Some(value.clone()),
                    }),
                    stmt.location,
                );
            }

            StmtKind::Enum { name, underlying, members } => {
                let scope = self.scopes.add(Some(*name), Some(self.current_scope()));
                let enum_def = self.create_definition(
                    *name,
                    DefKind::Enum(EnumDef {
                        underlying_expr: underlying.clone(),
                        underlying: None,
                        members: Vec::new(),
                        environment: scope,
                        ty: None,
                    }),
                    stmt.location,
                );

                let member_defs = self.enter_scope(scope, |sema| {
                    members
                        .iter()
                        .map(|member| {
                            sema.create_definition(
                                member.name,
                                DefKind::EnumMember(EnumMemberDef {
                                    owner: enum_def,
                                    value_expr: member.value.clone(),
                                    value: None,
                                }),
                                member.location,
                            )
                        })
                        .collect::<Vec<_>>()
                });

                if let DefKind::Enum(def) = &mut self.defs.get_mut(enum_def).kind {
                    def.members = member_defs;
                }
                self.definitions_to_resolve.push(enum_def);
            }

            StmtKind::Struct { kind, name, members } => {
                let struct_def = self.create_definition(
                    *name,
                    DefKind::Struct(StructDef {
                        kind: *kind,
                        members: Vec::new(),
                        size: None,
                        ty: None,
                    }),
                    stmt.location,
                );

                let member_defs: Vec<DefId> = members
                    .iter()
                    .map(|member| {
                        self.defs.add(ember_def::Definition {
                            name: member.name,
                            kind: DefKind::StructMember(StructMemberDef {
                                owner: struct_def,
                                type_expr: member.ty.clone(),
                                ty: None,
                                offset: None,
                            }),
                            location: member.location,
                            parent_scope: self.current_scope(),
                        })
                    })
                    .collect();

                if let DefKind::Struct(def) = &mut self.defs.get_mut(struct_def).kind {
                    def.members = member_defs;
                }
                self.definitions_to_resolve.push(struct_def);
            }

            StmtKind::Var { modifiers, names, addresses, ty, value } => {
                for (name, address) in names.iter().zip(addresses) {
                    let def = self.create_definition(
                        *name,
                        DefKind::Var(VarDef {
                            modifiers: *modifiers,
                            enclosing_function: self.enclosing_function(),
                            address_expr: address.clone(),
                            type_expr: ty.clone(),
                            reduced_ty: None,
                            storage_size: None,
                            initializer: value.clone(),
                            address: None,
                        }),
                        stmt.location,
                    );
                    self.definitions_to_resolve.push(def);
                }
            }

            StmtKind::TypeAlias { name, ty } => {
                let def = self.create_definition(
                    *name,
                    DefKind::TypeAlias(TypeAliasDef { type_expr: ty.clone(), ty: None }),
                    stmt.location,
                );
                self.definitions_to_resolve.push(def);
            }

            StmtKind::Func { inlined, far, name, parameters, return_type, body } => {
                let mut return_kind =
                    if *far { BranchKind::FarReturn } else { BranchKind::Return };
                let mut fallthrough = false;
                for attribute in attributes {
                    match attribute.name.name().as_str() {
                        "irq" => return_kind = BranchKind::IrqReturn,
                        "nmi" => return_kind = BranchKind::NmiReturn,
                        "fallthrough" => fallthrough = true,
                        _ => {}
                    }
                }

                let scope = self.scopes.add(Some(*name), Some(self.current_scope()));
                let func = self.create_definition(
                    *name,
                    DefKind::Func(FuncDef {
                        inlined: *inlined,
                        far: *far,
                        is_label: false,
                        return_kind,
                        parameters: Vec::new(),
                        return_type_expr: return_type.clone(),
                        signature: None,
                        body: body.clone(),
                        environment: scope,
                        fallthrough,
                        has_unconditional_return: false,
                        address: None,
                    }),
                    stmt.location,
                );

                let param_defs = self.enter_scope(scope, |sema| {
                    parameters
                        .iter()
                        .map(|param| {
                            sema.create_definition(
                                param.name,
                                DefKind::Var(VarDef {
                                    modifiers: ember_ast::stmt::VarModifiers::empty(),
                                    enclosing_function: Some(func),
                                    address_expr: None,
                                    type_expr: Some(param.ty.clone()),
                                    reduced_ty: None,
                                    storage_size: None,
                                    initializer: None,
                                    address: None,
                                }),
                                param.location,
                            )
                        })
                        .collect::<Vec<_>>()
                });
                self.defs.func_mut(func).parameters = param_defs;
                self.definitions_to_resolve.push(func);

                self.enter_function(func, |sema| {
                    sema.enter_scope(scope, |sema| {
                        for inner in body {
                            sema.reserve_statement(inner, &[]);
                        }
                    });
                });
            }

            StmtKind::Label { name } => {
                let environment = self.current_scope();
                self.create_definition(
                    *name,
                    DefKind::Func(FuncDef {
                        inlined: false,
                        far: false,
                        is_label: true,
                        return_kind: BranchKind::None,
                        parameters: Vec::new(),
                        return_type_expr: None,
                        signature: None,
                        body: Vec::new(),
                        environment,
                        fallthrough: false,
                        has_unconditional_return: false,
                        address: None,
                    }),
                    stmt.location,
                );
            }

            StmtKind::If { then_body, else_body, .. } => {
                for inner in then_body.iter().chain(else_body) {
                    self.reserve_statement(inner, &[]);
                }
            }
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                for inner in body {
                    self.reserve_statement(inner, &[]);
                }
            }
            StmtKind::For { body, .. } => {
                for inner in body {
                    self.reserve_statement(inner, &[]);
                }
            }

            // Inline-for bodies get their definitions per expansion, in a
            // fresh inline-site scope during IR emission.
            StmtKind::InlineFor { .. } => {}

            StmtKind::Branch { .. }
            | StmtKind::ExpressionStatement(_)
            | StmtKind::Config { .. } => {}
        }
    }
}
