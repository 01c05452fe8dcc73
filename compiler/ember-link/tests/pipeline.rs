//! End-to-end scenarios: resolver phases, IR emission and both layout
//! passes over programmatically built programs, checked against exact
//! byte images.

use std::rc::Rc;

use ember_ast::{
    expr::{Expr, ExprKind},
    op::{BinOp, BranchKind},
    stmt::{Stmt, StmtKind, VarModifiers},
    ty::{TypeExpr, TypeExprKind},
};
use ember_def::BankKind;
use ember_link::Linker;
use ember_lower::IrBuilder;
use ember_platform::Mos6502;
use ember_sema::{Platform, Sema};
use ember_source::{identifier::Identifier, SourceLocation, SourceMap, Span};

fn loc() -> SourceLocation {
    SourceLocation::new(Span::empty(), 0usize.into())
}

fn int(value: i128) -> Expr {
    Expr::new(ExprKind::IntegerLiteral(value), loc())
}

fn ident(name: &str) -> Expr {
    Expr::new(ExprKind::Identifier(vec![Identifier::from(name)]), loc())
}

fn named_ty(name: &str) -> TypeExpr {
    TypeExpr::new(TypeExprKind::Identifier(vec![Identifier::from(name)]), loc())
}

fn bank_decl(name: &str, address: i128, kind: &str, capacity: i128) -> Stmt {
    Stmt::new(
        StmtKind::Bank {
            names: vec![Identifier::from(name)],
            addresses: vec![Some(int(address))],
            ty: TypeExpr::new(
                TypeExprKind::Array {
                    element: Box::new(named_ty(kind)),
                    size: Some(Box::new(int(capacity))),
                },
                loc(),
            ),
        },
        loc(),
    )
}

fn in_bank(name: &str, address: Option<i128>, body: Vec<Stmt>) -> Stmt {
    Stmt::new(
        StmtKind::In {
            pieces: vec![Identifier::from(name)],
            address: address.map(int),
            body,
        },
        loc(),
    )
}

fn const_array(name: &str, values: &[i128]) -> Stmt {
    Stmt::new(
        StmtKind::Var {
            modifiers: VarModifiers::CONST,
            names: vec![Identifier::from(name)],
            addresses: vec![None],
            ty: None,
            value: Some(Expr::new(
                ExprKind::ArrayLiteral(values.iter().map(|value| int(*value)).collect()),
                loc(),
            )),
        },
        loc(),
    )
}

fn func(name: &str, body: Vec<Stmt>) -> Stmt {
    Stmt::new(
        StmtKind::Func {
            inlined: false,
            far: false,
            name: Identifier::from(name),
            parameters: vec![],
            return_type: None,
            body,
        },
        loc(),
    )
}

fn branch(kind: BranchKind, destination: Option<Expr>) -> Stmt {
    Stmt::new(
        StmtKind::Branch {
            distance_hint: 0,
            kind,
            destination,
            return_value: None,
            condition: None,
        },
        loc(),
    )
}

fn label(name: &str) -> Stmt {
    Stmt::new(StmtKind::Label { name: Identifier::from(name) }, loc())
}

fn assign(dest: Expr, src: Expr) -> Stmt {
    Stmt::new(
        StmtKind::ExpressionStatement(Expr::new(
            ExprKind::Binary(BinOp::Assign, Box::new(dest), Box::new(src)),
            loc(),
        )),
        loc(),
    )
}

fn program(items: Vec<Stmt>) -> Stmt {
    Stmt::new(StmtKind::File { name: Identifier::from("main"), items }, loc())
}

/// Run the full pipeline; returns the final [Sema] and whether it
/// succeeded.
fn compile(program: &Stmt) -> (Sema, bool) {
    let mut sources = SourceMap::new();
    sources.add_module("main.ember", "");
    let mut sema = Sema::new(sources);

    let mut platform = Mos6502::new();
    platform.reserve_definitions(&mut sema);
    sema.install_platform(Rc::new(platform));

    let ok = sema.resolve_program(program) && {
        let mut builder = IrBuilder::new(&mut sema);
        if builder.emit_program(program) {
            let ir = builder.finish();
            Linker::new(&mut sema, ir).link()
        } else {
            false
        }
    };
    (sema, ok)
}

fn bank_data<'s>(sema: &'s Sema, name: &str) -> &'s [u8] {
    sema.banks
        .iter()
        .find(|bank| bank.name() == Identifier::from(name))
        .expect("bank exists")
        .data()
}

#[test]
fn const_bytes_land_at_the_bank_origin() {
    let source = program(vec![
        bank_decl("rom", 0x8000, "constdata", 4),
        in_bank("rom", Some(0x8000), vec![const_array("msg", &[0x48, 0x69, 0x0A, 0x00])]),
    ]);

    let (sema, ok) = compile(&source);
    assert!(ok, "{:#?}", sema.reporter.reports());
    assert_eq!(bank_data(&sema, "rom"), &[0x48, 0x69, 0x0A, 0x00]);

    // msg resolved to the bank origin.
    let scope = sema.module_scope(Identifier::from("main")).unwrap();
    let msg = sema.scopes.find_local_member(scope, Identifier::from("msg")).unwrap();
    let address = sema.defs.var(msg).address.as_ref().unwrap();
    assert_eq!(address.absolute_position, Some(0x8000));
    assert_eq!(address.relative_position, Some(0));
}

#[test]
fn goto_to_next_label_is_elided() {
    let source = program(vec![
        bank_decl("prg", 0x8000, "prgdata", 0x40),
        in_bank(
            "prg",
            None,
            vec![func(
                "start",
                vec![
                    branch(BranchKind::Goto, Some(ident("here"))),
                    label("here"),
                    branch(BranchKind::Return, None),
                ],
            )],
        ),
    ]);

    let (sema, ok) = compile(&source);
    assert!(ok, "{:#?}", sema.reporter.reports());

    // No jump bytes: the function is just its return instruction, and
    // the label resolves to the same address as the function entry.
    let data = bank_data(&sema, "prg");
    assert_eq!(data[0], 0x60);
    assert_eq!(data[1], 0xFF);

    let scope = sema.module_scope(Identifier::from("main")).unwrap();
    let start = sema.scopes.find_local_member(scope, Identifier::from("start")).unwrap();
    let environment = sema.defs.func(start).environment;
    let here = sema.scopes.find_local_member(environment, Identifier::from("here")).unwrap();
    assert_eq!(
        sema.defs.func(here).address.as_ref().unwrap().absolute_position,
        Some(0x8000)
    );
}

#[test]
fn conditional_branch_encodes_pc_relative() {
    // start: a = 0; if a == 3 { a = 1; } return;
    let source = program(vec![
        bank_decl("prg", 0x8000, "prgdata", 0x40),
        in_bank(
            "prg",
            None,
            vec![func(
                "start",
                vec![
                    assign(ident("a"), int(0)),
                    Stmt::new(
                        StmtKind::If {
                            distance_hint: 0,
                            condition: Expr::new(
                                ExprKind::Binary(
                                    BinOp::Eq,
                                    Box::new(ident("a")),
                                    Box::new(int(3)),
                                ),
                                loc(),
                            ),
                            then_body: vec![assign(ident("a"), int(1))],
                            else_body: vec![],
                        },
                        loc(),
                    ),
                    branch(BranchKind::Return, None),
                ],
            )],
        ),
    ]);

    let (sema, ok) = compile(&source);
    assert!(ok, "{:#?}", sema.reporter.reports());

    // lda #0; cmp #3; bne +2; lda #1; rts
    // The if-condition `a == 3` branches to the else label when the
    // comparison fails, so the emitted branch is on zero == false.
    assert_eq!(
        &bank_data(&sema, "prg")[..9],
        &[0xA9, 0x00, 0xC9, 0x03, 0xD0, 0x02, 0xA9, 0x01, 0x60]
    );
}

#[test]
fn while_loop_branches_backwards() {
    // start: x = 0; while x != 5 { x++; } return;
    let source = program(vec![
        bank_decl("prg", 0x8000, "prgdata", 0x40),
        in_bank(
            "prg",
            None,
            vec![func(
                "start",
                vec![
                    assign(ident("x"), int(0)),
                    Stmt::new(
                        StmtKind::While {
                            distance_hint: 0,
                            condition: Expr::new(
                                ExprKind::Binary(
                                    BinOp::NotEq,
                                    Box::new(ident("x")),
                                    Box::new(int(5)),
                                ),
                                loc(),
                            ),
                            body: vec![Stmt::new(
                                StmtKind::ExpressionStatement(Expr::new(
                                    ExprKind::Unary(
                                        ember_ast::op::UnOp::PostIncrement,
                                        Box::new(ident("x")),
                                    ),
                                    loc(),
                                )),
                                loc(),
                            )],
                        },
                        loc(),
                    ),
                    branch(BranchKind::Return, None),
                ],
            )],
        ),
    ]);

    let (sema, ok) = compile(&source);
    assert!(ok, "{:#?}", sema.reporter.reports());

    // 8000: ldx #0
    // 8002: cpx #5        (loop head)
    // 8004: beq +4        (exit when x == 5: condition negated)
    // 8006: inx
    // 8007: jmp $8002
    // 800A: rts
    assert_eq!(
        &bank_data(&sema, "prg")[..11],
        &[0xA2, 0x00, 0xE0, 0x05, 0xF0, 0x04, 0xE8, 0x4C, 0x02, 0x80, 0x60]
    );
}

#[test]
fn ram_variables_reserve_without_bytes() {
    let source = program(vec![
        bank_decl("zp", 0x0000, "vardata", 0x100),
        in_bank(
            "zp",
            None,
            vec![
                Stmt::new(
                    StmtKind::Var {
                        modifiers: VarModifiers::empty(),
                        names: vec![Identifier::from("first"), Identifier::from("second")],
                        addresses: vec![None, None],
                        ty: Some(named_ty("u16")),
                        value: None,
                    },
                    loc(),
                ),
                Stmt::new(
                    StmtKind::Var {
                        modifiers: VarModifiers::empty(),
                        names: vec![Identifier::from("third")],
                        addresses: vec![None],
                        ty: Some(named_ty("u8")),
                        value: None,
                    },
                    loc(),
                ),
            ],
        ),
    ]);

    let (sema, ok) = compile(&source);
    assert!(ok, "{:#?}", sema.reporter.reports());

    let scope = sema.module_scope(Identifier::from("main")).unwrap();
    let lookup = |name: &str| {
        let def = sema.scopes.find_local_member(scope, Identifier::from(name)).unwrap();
        sema.defs.var(def).address.as_ref().unwrap().absolute_position.unwrap()
    };
    assert_eq!(lookup("first"), 0x0000);
    assert_eq!(lookup("second"), 0x0002);
    assert_eq!(lookup("third"), 0x0004);

    let bank = sema
        .banks
        .iter()
        .find(|bank| bank.name() == Identifier::from("zp"))
        .unwrap();
    assert_eq!(bank.kind(), BankKind::Variable);
    assert!(bank.data().is_empty());
}

#[test]
fn bank_capacity_is_enforced() {
    let source = program(vec![
        bank_decl("rom", 0x8000, "constdata", 4),
        in_bank("rom", None, vec![const_array("blob", &[1, 2, 3, 4, 5])]),
    ]);

    let (sema, ok) = compile(&source);
    assert!(!ok);
    assert!(sema
        .reporter
        .reports()
        .iter()
        .any(|report| report.title.contains("bank overflow")));
}

#[test]
fn exact_capacity_fits() {
    let source = program(vec![
        bank_decl("rom", 0x8000, "constdata", 4),
        in_bank("rom", None, vec![const_array("blob", &[1, 2, 3, 4])]),
    ]);

    let (sema, ok) = compile(&source);
    assert!(ok, "{:#?}", sema.reporter.reports());
    assert_eq!(bank_data(&sema, "rom"), &[1, 2, 3, 4]);
}

#[test]
fn nested_in_blocks_restore_position() {
    // Content after a nested addressed block continues where the outer
    // block left off.
    let source = program(vec![
        bank_decl("rom", 0x8000, "constdata", 0x20),
        in_bank(
            "rom",
            None,
            vec![
                const_array("first", &[0xAA]),
                in_bank("rom", Some(0x8010), vec![const_array("inner", &[0xBB])]),
                const_array("second", &[0xCC]),
            ],
        ),
    ]);

    let (sema, ok) = compile(&source);
    assert!(ok, "{:#?}", sema.reporter.reports());

    let data = bank_data(&sema, "rom");
    assert_eq!(data[0x00], 0xAA);
    assert_eq!(data[0x01], 0xCC);
    assert_eq!(data[0x10], 0xBB);
}

#[test]
fn link_time_address_tables_resolve() {
    // A const holding another variable's address serializes to that
    // address once layout has assigned it.
    let source = program(vec![
        bank_decl("zp", 0x0010, "vardata", 0x10),
        bank_decl("rom", 0x8000, "constdata", 0x10),
        in_bank(
            "zp",
            None,
            vec![Stmt::new(
                StmtKind::Var {
                    modifiers: VarModifiers::empty(),
                    names: vec![Identifier::from("cursor")],
                    addresses: vec![None],
                    ty: Some(named_ty("u8")),
                    value: None,
                },
                loc(),
            )],
        ),
        in_bank(
            "rom",
            None,
            vec![Stmt::new(
                StmtKind::Var {
                    modifiers: VarModifiers::CONST,
                    names: vec![Identifier::from("cursor_ptr")],
                    addresses: vec![None],
                    ty: Some(TypeExpr::new(
                        TypeExprKind::Pointer {
                            element: Box::new(named_ty("u8")),
                            qualifiers: ember_ast::ty::PtrQualifiers::empty(),
                        },
                        loc(),
                    )),
                    value: Some(Expr::new(
                        ExprKind::Unary(
                            ember_ast::op::UnOp::AddressOf,
                            Box::new(ident("cursor")),
                        ),
                        loc(),
                    )),
                },
                loc(),
            )],
        ),
    ]);

    let (sema, ok) = compile(&source);
    assert!(ok, "{:#?}", sema.reporter.reports());
    // cursor sits at 0x0010; the pointer serializes little-endian.
    assert_eq!(&bank_data(&sema, "rom")[..2], &[0x10, 0x00]);
}
