//! Reducer and resolver behavior over programmatically built ASTs.

use std::rc::Rc;

use ember_ast::{
    expr::{EvalContext, Expr, ExprKind, TypeQueryKind},
    op::{BinOp, UnOp},
    stmt::{EnumMemberDecl, Stmt, StmtKind, StructKind, StructMemberDecl, VarModifiers},
    ty::{TypeExpr, TypeExprKind},
    DefId,
};
use ember_def::{Bank, BankKind, DefKind, IntTypeDef, RegisterDef};
use ember_ir::TestAndBranch;
use ember_sema::{Platform, Sema};
use ember_source::{identifier::Identifier, SourceLocation, SourceMap, Span};

struct TestPlatform {
    u8_ty: DefId,
    u16_ty: DefId,
    u24_ty: DefId,
}

impl Platform for TestPlatform {
    fn name(&self) -> &'static str {
        "test"
    }

    fn reserve_definitions(&mut self, _sema: &mut Sema) {}

    fn pointer_sized_type(&self) -> DefId {
        self.u16_ty
    }

    fn far_pointer_sized_type(&self) -> DefId {
        self.u24_ty
    }

    fn byte_type(&self) -> DefId {
        self.u8_ty
    }

    fn placeholder_value(&self) -> i128 {
        0xCCCC
    }

    fn zero_flag(&self) -> Option<DefId> {
        None
    }

    fn test_and_branch(
        &self,
        _sema: &Sema,
        _op: BinOp,
        _left: &Expr,
        _right: &Expr,
        _distance_hint: u32,
    ) -> Option<TestAndBranch> {
        None
    }
}

fn new_sema() -> Sema {
    let mut sources = SourceMap::new();
    sources.add_module("test.ember", "");
    let mut sema = Sema::new(sources);

    let location = sema.builtin_location();
    let u8_ty = sema.create_definition(
        Identifier::from("u8"),
        DefKind::BuiltinIntegerType(IntTypeDef { size: 1, min: 0, max: 0xFF }),
        location,
    );
    let u16_ty = sema.create_definition(
        Identifier::from("u16"),
        DefKind::BuiltinIntegerType(IntTypeDef { size: 2, min: 0, max: 0xFFFF }),
        location,
    );
    let u24_ty = sema.create_definition(
        Identifier::from("u24"),
        DefKind::BuiltinIntegerType(IntTypeDef { size: 3, min: 0, max: 0xFF_FFFF }),
        location,
    );
    let i8_ty = sema.create_definition(
        Identifier::from("i8"),
        DefKind::BuiltinIntegerType(IntTypeDef { size: 1, min: -128, max: 127 }),
        location,
    );
    let _ = i8_ty;

    sema.install_platform(Rc::new(TestPlatform { u8_ty, u16_ty, u24_ty }));
    sema
}

fn loc() -> SourceLocation {
    SourceLocation::new(Span::empty(), 0usize.into())
}

fn int(value: i128) -> Expr {
    Expr::new(ExprKind::IntegerLiteral(value), loc())
}

fn boolean(value: bool) -> Expr {
    Expr::new(ExprKind::BooleanLiteral(value), loc())
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::Binary(op, Box::new(left), Box::new(right)), loc())
}

fn unary(op: UnOp, operand: Expr) -> Expr {
    Expr::new(ExprKind::Unary(op, Box::new(operand)), loc())
}

fn ident(name: &str) -> Expr {
    Expr::new(ExprKind::Identifier(vec![Identifier::from(name)]), loc())
}

fn named_ty(name: &str) -> TypeExpr {
    TypeExpr::new(TypeExprKind::Identifier(vec![Identifier::from(name)]), loc())
}

fn cast(operand: Expr, ty: TypeExpr) -> Expr {
    Expr::new(ExprKind::Cast { operand: Box::new(operand), ty }, loc())
}

#[test]
fn integer_folding_and_contexts() {
    let mut sema = new_sema();

    let reduced = sema.reduce_expression(&binary(BinOp::Add, int(2), int(3))).unwrap();
    assert_eq!(reduced.as_integer(), Some(5));
    assert_eq!(reduced.context(), Some(EvalContext::CompileTime));

    let reduced = sema
        .reduce_expression(&binary(BinOp::Mul, int(6), binary(BinOp::Sub, int(10), int(3))))
        .unwrap();
    assert_eq!(reduced.as_integer(), Some(42));
}

#[test]
fn division_by_zero_is_a_diagnostic() {
    let mut sema = new_sema();
    assert!(sema.reduce_expression(&binary(BinOp::Div, int(1), int(0))).is_none());
    assert!(!sema.reporter.validate());
}

#[test]
fn narrowing_respects_type_bounds() {
    let mut sema = new_sema();

    // 255 narrows into a u8 operand; 256 does not.
    let reduced = sema
        .reduce_expression(&binary(BinOp::Add, cast(int(1), named_ty("u8")), int(254)))
        .unwrap();
    assert_eq!(reduced.as_integer(), Some(255));

    assert!(sema
        .reduce_expression(&binary(BinOp::Add, cast(int(0), named_ty("u8")), int(256)))
        .is_none());
}

#[test]
fn bounded_overflow_is_rejected() {
    let mut sema = new_sema();
    assert!(sema
        .reduce_expression(&binary(BinOp::Add, cast(int(200), named_ty("u8")), int(100)))
        .is_none());
    assert!(!sema.reporter.validate());
}

#[test]
fn rotation_wraps_within_type_width() {
    let mut sema = new_sema();

    let reduced = sema
        .reduce_expression(&binary(BinOp::RotateLeft, cast(int(0x81), named_ty("u8")), int(1)))
        .unwrap();
    assert_eq!(reduced.as_integer(), Some(0x03));

    // Rotation amounts reduce modulo the bit width.
    let reduced = sema
        .reduce_expression(&binary(BinOp::RotateLeft, cast(int(0x81), named_ty("u8")), int(9)))
        .unwrap();
    assert_eq!(reduced.as_integer(), Some(0x03));
}

#[test]
fn bit_index_folds_to_boolean() {
    let mut sema = new_sema();

    let reduced = sema.reduce_expression(&binary(BinOp::BitIndex, int(0b100), int(2))).unwrap();
    assert_eq!(reduced.as_boolean(), Some(true));

    let reduced = sema.reduce_expression(&binary(BinOp::BitIndex, int(0b100), int(1))).unwrap();
    assert_eq!(reduced.as_boolean(), Some(false));
}

#[test]
fn boolean_bitwise_operators_behave_logically() {
    let mut sema = new_sema();

    let reduced =
        sema.reduce_expression(&binary(BinOp::BitAnd, boolean(true), boolean(false))).unwrap();
    assert_eq!(reduced.as_boolean(), Some(false));

    let reduced =
        sema.reduce_expression(&binary(BinOp::BitOr, boolean(false), boolean(true))).unwrap();
    assert_eq!(reduced.as_boolean(), Some(true));

    let reduced =
        sema.reduce_expression(&binary(BinOp::BitXor, boolean(true), boolean(true))).unwrap();
    assert_eq!(reduced.as_boolean(), Some(false));
}

#[test]
fn array_concatenation() {
    let mut sema = new_sema();

    let left = Expr::new(ExprKind::ArrayLiteral(vec![int(1), int(2)]), loc());
    let right = Expr::new(ExprKind::ArrayLiteral(vec![int(3)]), loc());
    let reduced = sema.reduce_expression(&binary(BinOp::Concat, left, right)).unwrap();

    match &reduced.kind {
        ExprKind::ArrayLiteral(elements) => {
            assert_eq!(elements.len(), 3);
            assert_eq!(elements[2].as_integer(), Some(3));
        }
        other => panic!("expected an array literal, found {other:?}"),
    }

    // Concatenating an empty literal preserves the other side.
    let left = Expr::new(ExprKind::ArrayLiteral(vec![int(1), int(2)]), loc());
    let right = Expr::new(ExprKind::ArrayLiteral(vec![]), loc());
    let reduced = sema.reduce_expression(&binary(BinOp::Concat, left, right)).unwrap();
    match &reduced.kind {
        ExprKind::ArrayLiteral(elements) => assert_eq!(elements.len(), 2),
        other => panic!("expected an array literal, found {other:?}"),
    }
}

#[test]
fn compile_time_reduction_is_idempotent() {
    let mut sema = new_sema();

    let expr = binary(
        BinOp::BitOr,
        binary(BinOp::Shl, int(0x3), int(4)),
        binary(BinOp::Mod, int(10), int(3)),
    );
    let once = sema.reduce_expression(&expr).unwrap();
    let twice = sema.reduce_expression(&once).unwrap();
    assert_eq!(once.kind, twice.kind);
    assert_eq!(once.info, twice.info);
}

#[test]
fn enum_members_auto_increment() {
    let mut sema = new_sema();

    let members = [("a", Some(5)), ("b", None), ("c", None), ("d", Some(10)), ("e", None)]
        .into_iter()
        .map(|(name, value)| EnumMemberDecl {
            name: Identifier::from(name),
            value: value.map(int),
            location: loc(),
        })
        .collect();
    let stmt = Stmt::new(
        StmtKind::Enum {
            name: Identifier::from("interrupt"),
            underlying: named_ty("u8"),
            members,
        },
        loc(),
    );

    sema.reserve_definitions(&stmt);
    sema.resolve_definition_types();
    assert!(sema.reporter.validate());

    let expected = [("a", 5), ("b", 6), ("c", 7), ("d", 10), ("e", 11)];
    for (name, value) in expected {
        let reduced = sema
            .reduce_expression(&Expr::new(
                ExprKind::Identifier(vec![
                    Identifier::from("interrupt"),
                    Identifier::from(name),
                ]),
                loc(),
            ))
            .unwrap();
        assert_eq!(reduced.as_integer(), Some(value), "member `{name}`");
        // Each member's type is the enum itself.
        assert_eq!(
            sema.describe_ty(reduced.ty().unwrap()),
            "interrupt",
            "member `{name}` type"
        );
    }
}

#[test]
fn struct_offsets_and_queries() {
    let mut sema = new_sema();

    let members = [("a", "u8"), ("b", "u16"), ("c", "u8")]
        .into_iter()
        .map(|(name, ty)| StructMemberDecl {
            name: Identifier::from(name),
            ty: named_ty(ty),
            location: loc(),
        })
        .collect();
    let stmt = Stmt::new(
        StmtKind::Struct { kind: StructKind::Struct, name: Identifier::from("sprite"), members },
        loc(),
    );

    sema.reserve_definitions(&stmt);
    sema.resolve_definition_types();
    assert!(sema.reporter.validate());

    let offset = sema
        .reduce_expression(&Expr::new(
            ExprKind::OffsetOf { ty: named_ty("sprite"), field: Identifier::from("c") },
            loc(),
        ))
        .unwrap();
    assert_eq!(offset.as_integer(), Some(3));

    let size = sema
        .reduce_expression(&Expr::new(
            ExprKind::TypeQuery { kind: TypeQueryKind::SizeOf, ty: named_ty("sprite") },
            loc(),
        ))
        .unwrap();
    assert_eq!(size.as_integer(), Some(4));
}

#[test]
fn union_members_share_offset_zero() {
    let mut sema = new_sema();

    let members = [("lo", "u8"), ("wide", "u16")]
        .into_iter()
        .map(|(name, ty)| StructMemberDecl {
            name: Identifier::from(name),
            ty: named_ty(ty),
            location: loc(),
        })
        .collect();
    let stmt = Stmt::new(
        StmtKind::Struct { kind: StructKind::Union, name: Identifier::from("word"), members },
        loc(),
    );

    sema.reserve_definitions(&stmt);
    sema.resolve_definition_types();

    let offset = sema
        .reduce_expression(&Expr::new(
            ExprKind::OffsetOf { ty: named_ty("word"), field: Identifier::from("wide") },
            loc(),
        ))
        .unwrap();
    assert_eq!(offset.as_integer(), Some(0));

    let size = sema
        .reduce_expression(&Expr::new(
            ExprKind::TypeQuery { kind: TypeQueryKind::SizeOf, ty: named_ty("word") },
            loc(),
        ))
        .unwrap();
    assert_eq!(size.as_integer(), Some(2));
}

#[test]
fn let_recursion_limit_is_fatal() {
    let mut sema = new_sema();

    // let forever(n) = forever(n);
    let body = Expr::new(
        ExprKind::Call {
            inlined: false,
            callee: Box::new(ident("forever")),
            arguments: vec![ident("n")],
        },
        loc(),
    );
    let stmt = Stmt::new(
        StmtKind::Let {
            name: Identifier::from("forever"),
            parameters: vec![Identifier::from("n")],
            value: body,
        },
        loc(),
    );
    sema.reserve_definitions(&stmt);

    let call = Expr::new(
        ExprKind::Call {
            inlined: false,
            callee: Box::new(ident("forever")),
            arguments: vec![int(0)],
        },
        loc(),
    );
    assert!(sema.reduce_expression(&call).is_none());
    assert!(sema.reporter.has_fatal());
    // Exactly one fatal diagnostic; nothing piles up after it.
    assert_eq!(sema.reporter.reports().len(), 1);
}

#[test]
fn let_parameters_bind_eagerly() {
    let mut sema = new_sema();

    // let double(n) = n * 2;
    let stmt = Stmt::new(
        StmtKind::Let {
            name: Identifier::from("double"),
            parameters: vec![Identifier::from("n")],
            value: binary(BinOp::Mul, ident("n"), int(2)),
        },
        loc(),
    );
    sema.reserve_definitions(&stmt);

    let call = Expr::new(
        ExprKind::Call {
            inlined: false,
            callee: Box::new(ident("double")),
            arguments: vec![binary(BinOp::Add, int(20), int(1))],
        },
        loc(),
    );
    let reduced = sema.reduce_expression(&call).unwrap();
    assert_eq!(reduced.as_integer(), Some(42));
}

#[test]
fn writeonly_reads_are_rejected() {
    let mut sema = new_sema();

    // A writeonly register seeded the way a platform would.
    let byte = sema.byte_ty();
    let location = sema.builtin_location();
    sema.create_definition(
        Identifier::from("latch"),
        DefKind::BuiltinRegister(RegisterDef {
            ty: byte,
            modifiers: VarModifiers::WRITE_ONLY,
        }),
        location,
    );
    sema.create_definition(
        Identifier::from("a"),
        DefKind::BuiltinRegister(RegisterDef { ty: byte, modifiers: VarModifiers::empty() }),
        location,
    );

    // Writing into the latch is fine.
    assert!(sema
        .reduce_expression(&binary(BinOp::Assign, ident("latch"), ident("a")))
        .is_some());

    // Reading it back is not.
    assert!(sema
        .reduce_expression(&binary(BinOp::Assign, ident("a"), ident("latch")))
        .is_none());
    assert!(!sema.reporter.validate());
}

#[test]
fn ambiguous_imports_are_reported() {
    let mut sema = new_sema();

    let file_a = Stmt::new(
        StmtKind::File {
            name: Identifier::from("mod_a"),
            items: vec![Stmt::new(
                StmtKind::Let { name: Identifier::from("shared"), parameters: vec![], value: int(1) },
                loc(),
            )],
        },
        loc(),
    );
    let file_b = Stmt::new(
        StmtKind::File {
            name: Identifier::from("mod_b"),
            items: vec![Stmt::new(
                StmtKind::Let { name: Identifier::from("shared"), parameters: vec![], value: int(2) },
                loc(),
            )],
        },
        loc(),
    );
    sema.reserve_definitions(&file_a);
    sema.reserve_definitions(&file_b);

    assert!(sema.reduce_expression(&ident("shared")).is_none());
    assert!(!sema.reporter.validate());
}

#[test]
fn grouping_is_transparent_to_flags() {
    let mut sema = new_sema();

    let reduced = sema
        .reduce_expression(&unary(UnOp::Grouping, binary(BinOp::Add, int(1), int(2))))
        .unwrap();
    assert_eq!(reduced.as_integer(), Some(3));
}

#[test]
fn short_circuit_folding() {
    let mut sema = new_sema();

    let reduced = sema
        .reduce_expression(&binary(BinOp::LogicalAnd, boolean(false), boolean(true)))
        .unwrap();
    assert_eq!(reduced.as_boolean(), Some(false));

    let reduced = sema
        .reduce_expression(&binary(BinOp::LogicalOr, boolean(false), boolean(true)))
        .unwrap();
    assert_eq!(reduced.as_boolean(), Some(true));
}

#[test]
fn byte_extraction_folds() {
    let mut sema = new_sema();

    let reduced = sema.reduce_expression(&unary(UnOp::LowByte, int(0x1234))).unwrap();
    assert_eq!(reduced.as_integer(), Some(0x34));

    let reduced = sema.reduce_expression(&unary(UnOp::HighByte, int(0x1234))).unwrap();
    assert_eq!(reduced.as_integer(), Some(0x12));

    let reduced = sema.reduce_expression(&unary(UnOp::BankByte, int(0x7E_1234))).unwrap();
    assert_eq!(reduced.as_integer(), Some(0x7E));
}

#[test]
fn bank_state_restores_across_error_paths() {
    let mut sema = new_sema();
    let zp = sema
        .banks
        .push(Bank::new(Identifier::from("zp"), BankKind::Variable, 4, Some(0), 0x00));
    let rom = sema
        .banks
        .push(Bank::new(Identifier::from("rom"), BankKind::Program, 4, Some(0x8000), 0xFF));

    sema.enter_bank(zp, None, loc(), |sema| {
        // The nested seek is outside the bank's range and reports; the
        // active-bank state must still unwind.
        sema.enter_bank(rom, Some(0x9000), loc(), |_| {});
        assert_eq!(sema.current_bank(), Some(zp));
    });

    assert_eq!(sema.current_bank(), None);
    assert!(!sema.reporter.validate());
}

#[test]
fn alignof_is_reserved_but_unimplemented() {
    let mut sema = new_sema();
    let query = Expr::new(
        ExprKind::TypeQuery { kind: TypeQueryKind::AlignOf, ty: named_ty("u8") },
        loc(),
    );
    assert!(sema.reduce_expression(&query).is_none());
    assert!(!sema.reporter.validate());
}
