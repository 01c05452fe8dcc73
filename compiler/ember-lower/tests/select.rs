//! Instruction selection over reduced expressions: direct matches, the
//! two-operand rewrite, and the load-then-operate decomposition.

use std::rc::Rc;

use ember_ast::{
    expr::{Expr, ExprKind},
    op::{BinOp, UnOp},
    stmt::{Stmt, StmtKind, VarModifiers},
    ty::{TypeExpr, TypeExprKind},
};
use ember_ir::{IrNode, IrNodeKind};
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

fn new_sema() -> Sema {
    let mut sources = SourceMap::new();
    sources.add_module("test.ember", "");
    let mut sema = Sema::new(sources);

    let mut platform = Mos6502::new();
    platform.reserve_definitions(&mut sema);
    sema.install_platform(Rc::new(platform));

    // A placed byte variable to use as a memory operand.
    let program = Stmt::new(
        StmtKind::File {
            name: Identifier::from("test"),
            items: vec![
                Stmt::new(
                    StmtKind::Bank {
                        names: vec![Identifier::from("zp")],
                        addresses: vec![Some(int(0))],
                        ty: TypeExpr::new(
                            TypeExprKind::Array {
                                element: Box::new(TypeExpr::new(
                                    TypeExprKind::Identifier(vec![Identifier::from("vardata")]),
                                    loc(),
                                )),
                                size: Some(Box::new(int(0x100))),
                            },
                            loc(),
                        ),
                    },
                    loc(),
                ),
                Stmt::new(
                    StmtKind::In {
                        pieces: vec![Identifier::from("zp")],
                        address: None,
                        body: vec![Stmt::new(
                            StmtKind::Var {
                                modifiers: VarModifiers::empty(),
                                names: vec![Identifier::from("value")],
                                addresses: vec![None],
                                ty: Some(TypeExpr::new(
                                    TypeExprKind::Identifier(vec![Identifier::from("u8")]),
                                    loc(),
                                )),
                                value: None,
                            },
                            loc(),
                        )],
                    },
                    loc(),
                ),
            ],
        },
        loc(),
    );
    assert!(sema.resolve_program(&program));
    sema
}

fn emitted_code(ir: &[IrNode]) -> Vec<&IrNode> {
    ir.iter().filter(|node| matches!(node.kind, IrNodeKind::Code { .. })).collect()
}

/// Lower `dest = src` and return the emitted IR.
fn lower_assignment(sema: &mut Sema, dest: Expr, src: Expr) -> Vec<IrNode> {
    let expr = Expr::new(ExprKind::Binary(BinOp::Assign, Box::new(dest), Box::new(src)), loc());
    let reduced = sema.reduce_expression(&expr).expect("assignment reduces");

    let mut builder = IrBuilder::new(sema);
    builder.emit_expression_ir(&reduced, loc());
    builder.finish()
}

#[test]
fn immediate_load_selects_directly() {
    let mut sema = new_sema();
    let ir = lower_assignment(&mut sema, ident("a"), int(0x42));
    assert!(sema.reporter.validate(), "{:#?}", sema.reporter.reports());
    assert_eq!(emitted_code(&ir).len(), 1);
}

#[test]
fn in_place_operator_uses_two_operand_form() {
    let mut sema = new_sema();
    // a = a | 0x10 matches the ORA immediate entry.
    let src = Expr::new(
        ExprKind::Binary(BinOp::BitOr, Box::new(ident("a")), Box::new(int(0x10))),
        loc(),
    );
    let ir = lower_assignment(&mut sema, ident("a"), src);
    assert!(sema.reporter.validate(), "{:#?}", sema.reporter.reports());
    assert_eq!(emitted_code(&ir).len(), 1);
}

#[test]
fn leaf_right_side_decomposes_into_load_then_operate() {
    let mut sema = new_sema();
    // a = value | 0x10: no direct pattern; lowers to a = value; a |= 0x10.
    let src = Expr::new(
        ExprKind::Binary(BinOp::BitOr, Box::new(ident("value")), Box::new(int(0x10))),
        loc(),
    );
    let ir = lower_assignment(&mut sema, ident("a"), src);
    assert!(sema.reporter.validate(), "{:#?}", sema.reporter.reports());
    assert_eq!(emitted_code(&ir).len(), 2);
}

#[test]
fn unsupported_selection_enumerates_candidates() {
    let mut sema = new_sema();
    // x has no ALU entries; the diagnostic should list the accumulator
    // candidates for `|`.
    let src = Expr::new(
        ExprKind::Binary(BinOp::BitOr, Box::new(ident("x")), Box::new(int(0x10))),
        loc(),
    );
    let _ = lower_assignment(&mut sema, ident("x"), src);
    assert!(!sema.reporter.validate());
    let report = sema.reporter.reports().last().unwrap();
    assert!(report
        .contents
        .iter()
        .any(|element| matches!(element, ember_reporting::ReportElement::Note(_))));
}

#[test]
fn increment_statement_selects_inx() {
    let mut sema = new_sema();
    let expr = Expr::new(ExprKind::Unary(UnOp::PostIncrement, Box::new(ident("x"))), loc());
    let reduced = sema.reduce_expression(&expr).unwrap();

    let mut builder = IrBuilder::new(&mut sema);
    builder.emit_expression_ir(&reduced, loc());
    let ir = builder.finish();
    assert!(sema.reporter.validate(), "{:#?}", sema.reporter.reports());
    assert_eq!(emitted_code(&ir).len(), 1);
}
