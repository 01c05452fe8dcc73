//! The built-in demo program: a small 6502 routine that copies a
//! zero-terminated message through the accumulator. Until a front end is
//! wired in, this is the binary's way of exercising the whole pipeline.
//!
//! The equivalent surface syntax:
//!
//! ```ignore
//! bank zp @ 0x0000 : [vardata; 0x100];
//! bank prg @ 0x8000 : [prgdata; 0x100];
//!
//! in zp { var last : u8; }
//!
//! in prg {
//!     const message = [0x48, 0x69, 0x0A, 0x00];
//!
//!     func reset {
//!         x = 0;
//!     next:
//!         a = message[x];
//!         last = a;
//!         if !zero {
//!             x++;
//!             goto next;
//!         }
//!         return;
//!     }
//! }
//! ```

use ember_ast::{
    expr::{Expr, ExprKind},
    op::{BinOp, BranchKind, UnOp},
    stmt::{Stmt, StmtKind, VarModifiers},
    ty::{TypeExpr, TypeExprKind},
};
use ember_source::{identifier::Identifier, SourceLocation, SourceMap, Span};

fn loc() -> SourceLocation {
    SourceLocation::new(Span::empty(), 0usize.into())
}

fn ident(name: &str) -> Expr {
    Expr::new(ExprKind::Identifier(vec![Identifier::from(name)]), loc())
}

fn int(value: i128) -> Expr {
    Expr::new(ExprKind::IntegerLiteral(value), loc())
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

fn bank(name: &str, address: u32, kind: &str, capacity: i128) -> Stmt {
    Stmt::new(
        StmtKind::Bank {
            names: vec![Identifier::from(name)],
            addresses: vec![Some(int(address as i128))],
            ty: TypeExpr::new(
                TypeExprKind::Array {
                    element: Box::new(TypeExpr::new(
                        TypeExprKind::Identifier(vec![Identifier::from(kind)]),
                        loc(),
                    )),
                    size: Some(Box::new(int(capacity))),
                },
                loc(),
            ),
        },
        loc(),
    )
}

/// Build the demo module.
pub fn build() -> (SourceMap, Stmt) {
    let mut sources = SourceMap::new();
    sources.add_module("demo.ember", "");

    let message = Stmt::new(
        StmtKind::Var {
            modifiers: VarModifiers::CONST,
            names: vec![Identifier::from("message")],
            addresses: vec![None],
            ty: None,
            value: Some(Expr::new(
                ExprKind::ArrayLiteral(vec![int(0x48), int(0x69), int(0x0A), int(0x00)]),
                loc(),
            )),
        },
        loc(),
    );

    let copy_loop = vec![
        assign(ident("x"), int(0)),
        Stmt::new(StmtKind::Label { name: Identifier::from("next") }, loc()),
        assign(
            ident("a"),
            Expr::new(
                ExprKind::Binary(
                    BinOp::Index,
                    Box::new(ident("message")),
                    Box::new(ident("x")),
                ),
                loc(),
            ),
        ),
        assign(ident("last"), ident("a")),
        Stmt::new(
            StmtKind::If {
                distance_hint: 0,
                condition: Expr::new(
                    ExprKind::Unary(UnOp::LogicalNot, Box::new(ident("zero"))),
                    loc(),
                ),
                then_body: vec![
                    Stmt::new(
                        StmtKind::ExpressionStatement(Expr::new(
                            ExprKind::Unary(UnOp::PostIncrement, Box::new(ident("x"))),
                            loc(),
                        )),
                        loc(),
                    ),
                    Stmt::new(
                        StmtKind::Branch {
                            distance_hint: 0,
                            kind: BranchKind::Goto,
                            destination: Some(ident("next")),
                            return_value: None,
                            condition: None,
                        },
                        loc(),
                    ),
                ],
                else_body: vec![],
            },
            loc(),
        ),
        Stmt::new(
            StmtKind::Branch {
                distance_hint: 0,
                kind: BranchKind::Return,
                destination: None,
                return_value: None,
                condition: None,
            },
            loc(),
        ),
    ];

    let reset = Stmt::new(
        StmtKind::Func {
            inlined: false,
            far: false,
            name: Identifier::from("reset"),
            parameters: vec![],
            return_type: None,
            body: copy_loop,
        },
        loc(),
    );

    let last = Stmt::new(
        StmtKind::Var {
            modifiers: VarModifiers::empty(),
            names: vec![Identifier::from("last")],
            addresses: vec![None],
            ty: Some(TypeExpr::new(
                TypeExprKind::Identifier(vec![Identifier::from("u8")]),
                loc(),
            )),
            value: None,
        },
        loc(),
    );

    let program = Stmt::new(
        StmtKind::File {
            name: Identifier::from("demo"),
            items: vec![
                bank("zp", 0x0000, "vardata", 0x100),
                bank("prg", 0x8000, "prgdata", 0x100),
                Stmt::new(
                    StmtKind::In {
                        pieces: vec![Identifier::from("zp")],
                        address: None,
                        body: vec![last],
                    },
                    loc(),
                ),
                Stmt::new(
                    StmtKind::In {
                        pieces: vec![Identifier::from("prg")],
                        address: None,
                        body: vec![message, reset],
                    },
                    loc(),
                ),
            ],
        },
        loc(),
    );

    (sources, program)
}
