//! The MOS 6502 platform: registers `a`/`x`/`y`/`s`, the processor
//! flags, 8/16/24-bit integer types, and an instruction table covering
//! loads/stores, ALU operations, increments, shifts, compares, jumps,
//! conditional branches and returns. All entries use absolute or
//! immediate addressing.

use ember_ast::{
    expr::Expr,
    op::{BinOp, BranchKind, UnOp},
    stmt::VarModifiers,
    DefId,
};
use ember_def::{DefKind, IntTypeDef, LoadIntrinsicDef, RegisterDef};
use ember_ir::{
    Encoding, FlagBranch, InstrType, InstructionOptions, InstructionSignature, OperandPattern,
    TestAndBranch,
};
use ember_sema::{Platform, Sema};
use ember_source::identifier::Identifier;

/// Placeholder for link-time-unknown operand bytes; a recognizable
/// pattern within the 16-bit address range.
const PLACEHOLDER: i128 = 0xCCCC;

pub struct Mos6502 {
    u8_ty: DefId,
    u16_ty: DefId,
    u24_ty: DefId,

    a: DefId,
    x: DefId,
    y: DefId,
    s: DefId,

    zero: DefId,
    carry: DefId,
    negative: DefId,
    overflow: DefId,

    cmp: DefId,
    bit: DefId,
    push: DefId,
    pop: DefId,
    nop: DefId,
}

impl Default for Mos6502 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mos6502 {
    /// All ids are placeholders until [`Platform::reserve_definitions`]
    /// seeds the builtin scope.
    pub fn new() -> Self {
        let unset = DefId::from_raw(0);
        Self {
            u8_ty: unset,
            u16_ty: unset,
            u24_ty: unset,
            a: unset,
            x: unset,
            y: unset,
            s: unset,
            zero: unset,
            carry: unset,
            negative: unset,
            overflow: unset,
            cmp: unset,
            bit: unset,
            push: unset,
            pop: unset,
            nop: unset,
        }
    }

    fn reserve_types(&mut self, sema: &mut Sema) {
        let location = sema.builtin_location();
        let mut int = |sema: &mut Sema, name: &str, size: usize, min: i128, max: i128| {
            sema.create_definition(
                Identifier::from(name),
                DefKind::BuiltinIntegerType(IntTypeDef { size, min, max }),
                location,
            )
        };

        self.u8_ty = int(sema, "u8", 1, 0, 0xFF);
        self.u16_ty = int(sema, "u16", 2, 0, 0xFFFF);
        self.u24_ty = int(sema, "u24", 3, 0, 0xFF_FFFF);
        int(sema, "i8", 1, -0x80, 0x7F);
        int(sema, "i16", 2, -0x8000, 0x7FFF);
        int(sema, "i24", 3, -0x80_0000, 0x7F_FFFF);

        for (name, kind) in [
            ("prgdata", ember_def::BankKind::Program),
            ("constdata", ember_def::BankKind::Constant),
            ("chrdata", ember_def::BankKind::Character),
            ("vardata", ember_def::BankKind::Variable),
            ("varinitdata", ember_def::BankKind::InitializedVariable),
        ] {
            sema.create_definition(
                Identifier::from(name),
                DefKind::BuiltinBankType(kind),
                location,
            );
        }
    }

    fn reserve_registers(&mut self, sema: &mut Sema) {
        let location = sema.builtin_location();
        let byte = sema.tys.int(self.u8_ty);
        let flag_ty = sema.tys.bool();

        let mut register = |sema: &mut Sema, name: &str, ty| {
            sema.create_definition(
                Identifier::from(name),
                DefKind::BuiltinRegister(RegisterDef { ty, modifiers: VarModifiers::empty() }),
                location,
            )
        };

        self.a = register(sema, "a", byte);
        self.x = register(sema, "x", byte);
        self.y = register(sema, "y", byte);
        self.s = register(sema, "s", byte);

        self.zero = register(sema, "zero", flag_ty);
        self.carry = register(sema, "carry", flag_ty);
        self.negative = register(sema, "negative", flag_ty);
        self.overflow = register(sema, "overflow", flag_ty);
    }

    fn reserve_intrinsics(&mut self, sema: &mut Sema) {
        let location = sema.builtin_location();
        let byte = sema.tys.int(self.u8_ty);

        self.cmp = sema.create_definition(
            Identifier::from("cmp"),
            DefKind::BuiltinVoidIntrinsic,
            location,
        );
        self.bit = sema.create_definition(
            Identifier::from("bit"),
            DefKind::BuiltinVoidIntrinsic,
            location,
        );
        self.push = sema.create_definition(
            Identifier::from("push"),
            DefKind::BuiltinVoidIntrinsic,
            location,
        );
        self.nop = sema.create_definition(
            Identifier::from("nop"),
            DefKind::BuiltinVoidIntrinsic,
            location,
        );
        self.pop = sema.create_definition(
            Identifier::from("pop"),
            DefKind::BuiltinLoadIntrinsic(LoadIntrinsicDef { result: byte }),
            location,
        );
    }

    /// Absolute byte access: `*(capture u16):1`.
    fn absolute(&self) -> OperandPattern {
        OperandPattern::Dereference {
            far: false,
            operand: Box::new(OperandPattern::capture(OperandPattern::imm_u16())),
            size: 1,
        }
    }

    /// Absolute indexed byte access: `*(capture u16 + reg):1`.
    fn absolute_indexed(&self, index: DefId) -> OperandPattern {
        OperandPattern::Index {
            far: false,
            operand: Box::new(OperandPattern::capture(OperandPattern::imm_u16())),
            subscript: Box::new(OperandPattern::Register(index)),
            subscript_scale: 1,
            size: 1,
        }
    }

    fn populate_instructions(&self, sema: &mut Sema) {
        let a = OperandPattern::Register(self.a);
        let x = OperandPattern::Register(self.x);
        let y = OperandPattern::Register(self.y);
        let s = OperandPattern::Register(self.s);
        let imm = OperandPattern::capture(OperandPattern::imm_u8());
        let abs = self.absolute();
        let abs_x = self.absolute_indexed(self.x);
        let abs_y = self.absolute_indexed(self.y);

        let table = &mut sema.instructions;
        let assign = InstrType::Binary(BinOp::Assign);

        let mut add = |ty: InstrType,
                       patterns: Vec<OperandPattern>,
                       encoding: Encoding,
                       opcode: Vec<u8>,
                       parameter: Vec<usize>,
                       flags: Vec<DefId>| {
            table.add(
                InstructionSignature::new(ty, 0, patterns),
                encoding,
                InstructionOptions::new(opcode, parameter, flags),
            );
        };

        let nz = vec![self.zero, self.negative];
        let nzc = vec![self.zero, self.negative, self.carry];

        // Loads and stores.
        add(assign, vec![a.clone(), imm.clone()], Encoding::U8Operand, vec![0xA9], vec![1], nz.clone());
        add(assign, vec![a.clone(), abs.clone()], Encoding::U16Operand, vec![0xAD], vec![1], nz.clone());
        add(assign, vec![a.clone(), abs_x.clone()], Encoding::U16Operand, vec![0xBD], vec![1], nz.clone());
        add(assign, vec![a.clone(), abs_y.clone()], Encoding::U16Operand, vec![0xB9], vec![1], nz.clone());
        add(assign, vec![abs.clone(), a.clone()], Encoding::U16Operand, vec![0x8D], vec![0], vec![]);
        add(assign, vec![abs_x.clone(), a.clone()], Encoding::U16Operand, vec![0x9D], vec![0], vec![]);
        add(assign, vec![abs_y.clone(), a.clone()], Encoding::U16Operand, vec![0x99], vec![0], vec![]);
        add(assign, vec![x.clone(), imm.clone()], Encoding::U8Operand, vec![0xA2], vec![1], nz.clone());
        add(assign, vec![x.clone(), abs.clone()], Encoding::U16Operand, vec![0xAE], vec![1], nz.clone());
        add(assign, vec![abs.clone(), x.clone()], Encoding::U16Operand, vec![0x8E], vec![0], vec![]);
        add(assign, vec![y.clone(), imm.clone()], Encoding::U8Operand, vec![0xA0], vec![1], nz.clone());
        add(assign, vec![y.clone(), abs.clone()], Encoding::U16Operand, vec![0xAC], vec![1], nz.clone());
        add(assign, vec![abs.clone(), y.clone()], Encoding::U16Operand, vec![0x8C], vec![0], vec![]);

        // Register transfers.
        add(assign, vec![a.clone(), x.clone()], Encoding::Implicit, vec![0x8A], vec![], nz.clone());
        add(assign, vec![a.clone(), y.clone()], Encoding::Implicit, vec![0x98], vec![], nz.clone());
        add(assign, vec![x.clone(), a.clone()], Encoding::Implicit, vec![0xAA], vec![], nz.clone());
        add(assign, vec![y.clone(), a.clone()], Encoding::Implicit, vec![0xA8], vec![], nz.clone());
        add(assign, vec![x.clone(), s.clone()], Encoding::Implicit, vec![0xBA], vec![], nz.clone());
        add(assign, vec![s.clone(), x.clone()], Encoding::Implicit, vec![0x9A], vec![], vec![]);

        // Accumulator ALU operations, in-place two-operand form. Plain
        // add/sub prefix the carry setup.
        let alu: [(InstrType, u8, Option<u8>); 7] = [
            (InstrType::Binary(BinOp::BitOr), 0x00, None),
            (InstrType::Binary(BinOp::BitAnd), 0x20, None),
            (InstrType::Binary(BinOp::BitXor), 0x40, None),
            (InstrType::Binary(BinOp::AddWithCarry), 0x60, None),
            (InstrType::Binary(BinOp::Add), 0x60, Some(0x18)),
            (InstrType::Binary(BinOp::SubWithCarry), 0xE0, None),
            (InstrType::Binary(BinOp::Sub), 0xE0, Some(0x38)),
        ];
        for (ty, base, prefix) in alu {
            let opcode = |column: u8| -> Vec<u8> {
                match prefix {
                    Some(prefix) => vec![prefix, base | column],
                    None => vec![base | column],
                }
            };
            add(ty, vec![a.clone(), imm.clone()], Encoding::U8Operand, opcode(0x09), vec![1], nzc.clone());
            add(ty, vec![a.clone(), abs.clone()], Encoding::U16Operand, opcode(0x0D), vec![1], nzc.clone());
            add(ty, vec![a.clone(), abs_x.clone()], Encoding::U16Operand, opcode(0x1D), vec![1], nzc.clone());
            add(ty, vec![a.clone(), abs_y.clone()], Encoding::U16Operand, opcode(0x19), vec![1], nzc.clone());
        }

        // Increments and decrements.
        for ty in [InstrType::Unary(UnOp::PreIncrement), InstrType::Unary(UnOp::PostIncrement)] {
            add(ty, vec![x.clone()], Encoding::Implicit, vec![0xE8], vec![], nz.clone());
            add(ty, vec![y.clone()], Encoding::Implicit, vec![0xC8], vec![], nz.clone());
            add(ty, vec![abs.clone()], Encoding::U16Operand, vec![0xEE], vec![0], nz.clone());
        }
        for ty in [InstrType::Unary(UnOp::PreDecrement), InstrType::Unary(UnOp::PostDecrement)] {
            add(ty, vec![x.clone()], Encoding::Implicit, vec![0xCA], vec![], nz.clone());
            add(ty, vec![y.clone()], Encoding::Implicit, vec![0x88], vec![], nz.clone());
            add(ty, vec![abs.clone()], Encoding::U16Operand, vec![0xCE], vec![0], nz.clone());
        }

        // Accumulator shifts and rotates: repeat the one-byte form per
        // shift amount.
        let shift_count = OperandPattern::capture(OperandPattern::Integer { min: 0, max: 8 });
        for (ty, opcode) in [
            (InstrType::Binary(BinOp::Shl), 0x0Au8),
            (InstrType::Binary(BinOp::LogicalShl), 0x0A),
            (InstrType::Binary(BinOp::LogicalShr), 0x4A),
            (InstrType::Binary(BinOp::RotateLeft), 0x2A),
            (InstrType::Binary(BinOp::RotateRight), 0x6A),
        ] {
            add(
                ty,
                vec![a.clone(), shift_count.clone()],
                Encoding::RepeatedImplicit,
                vec![opcode],
                vec![1],
                nzc.clone(),
            );
        }

        // Single shifts on memory.
        let one = OperandPattern::Integer { min: 1, max: 1 };
        for (ty, opcode) in [
            (InstrType::Binary(BinOp::Shl), 0x0Eu8),
            (InstrType::Binary(BinOp::LogicalShl), 0x0E),
            (InstrType::Binary(BinOp::LogicalShr), 0x4E),
            (InstrType::Binary(BinOp::RotateLeft), 0x2E),
            (InstrType::Binary(BinOp::RotateRight), 0x6E),
        ] {
            add(ty, vec![abs.clone(), one.clone()], Encoding::U16Operand, vec![opcode], vec![0], nzc.clone());
        }

        // Compares.
        let cmp = InstrType::VoidIntrinsic(self.cmp);
        add(cmp, vec![a.clone(), imm.clone()], Encoding::U8Operand, vec![0xC9], vec![1], nzc.clone());
        add(cmp, vec![a.clone(), abs.clone()], Encoding::U16Operand, vec![0xCD], vec![1], nzc.clone());
        add(cmp, vec![a.clone(), abs_x.clone()], Encoding::U16Operand, vec![0xDD], vec![1], nzc.clone());
        add(cmp, vec![a.clone(), abs_y.clone()], Encoding::U16Operand, vec![0xD9], vec![1], nzc.clone());
        add(cmp, vec![x.clone(), imm.clone()], Encoding::U8Operand, vec![0xE0], vec![1], nzc.clone());
        add(cmp, vec![x.clone(), abs.clone()], Encoding::U16Operand, vec![0xEC], vec![1], nzc.clone());
        add(cmp, vec![y.clone(), imm.clone()], Encoding::U8Operand, vec![0xC0], vec![1], nzc.clone());
        add(cmp, vec![y.clone(), abs.clone()], Encoding::U16Operand, vec![0xCC], vec![1], nzc.clone());

        add(
            InstrType::VoidIntrinsic(self.bit),
            vec![abs.clone()],
            Encoding::U16Operand,
            vec![0x2C],
            vec![0],
            vec![self.zero, self.negative, self.overflow],
        );

        // Stack and misc.
        add(InstrType::VoidIntrinsic(self.push), vec![a.clone()], Encoding::Implicit, vec![0x48], vec![], vec![]);
        add(InstrType::LoadIntrinsic(self.pop), vec![a.clone()], Encoding::Implicit, vec![0x68], vec![], nz.clone());
        add(InstrType::VoidIntrinsic(self.nop), vec![], Encoding::Implicit, vec![0xEA], vec![], vec![]);

        // Jumps, calls and returns.
        let target = OperandPattern::capture(OperandPattern::imm_u16());
        add(InstrType::Branch(BranchKind::Goto), vec![target.clone()], Encoding::U16Operand, vec![0x4C], vec![0], vec![]);
        add(InstrType::Branch(BranchKind::Call), vec![target.clone()], Encoding::U16Operand, vec![0x20], vec![0], vec![]);
        add(InstrType::Branch(BranchKind::Return), vec![], Encoding::Implicit, vec![0x60], vec![], vec![]);
        add(InstrType::Branch(BranchKind::IrqReturn), vec![], Encoding::Implicit, vec![0x40], vec![], vec![]);
        add(InstrType::Branch(BranchKind::NmiReturn), vec![], Encoding::Implicit, vec![0x40], vec![], vec![]);

        // Conditional branches: goto destination when flag == value.
        let goto = InstrType::Branch(BranchKind::Goto);
        let branches: [(DefId, bool, u8); 8] = [
            (self.zero, true, 0xF0),
            (self.zero, false, 0xD0),
            (self.carry, true, 0xB0),
            (self.carry, false, 0x90),
            (self.negative, true, 0x30),
            (self.negative, false, 0x10),
            (self.overflow, true, 0x70),
            (self.overflow, false, 0x50),
        ];
        for (flag, value, opcode) in branches {
            add(
                goto,
                vec![
                    target.clone(),
                    OperandPattern::Register(flag),
                    OperandPattern::Boolean(value),
                ],
                Encoding::PcRelativeI8Operand,
                vec![opcode],
                vec![0],
                vec![],
            );
        }
    }
}

impl Platform for Mos6502 {
    fn name(&self) -> &'static str {
        "mos6502"
    }

    fn reserve_definitions(&mut self, sema: &mut Sema) {
        self.reserve_types(sema);
        self.reserve_registers(sema);
        self.reserve_intrinsics(sema);
        self.populate_instructions(sema);
    }

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
        PLACEHOLDER
    }

    fn zero_flag(&self) -> Option<DefId> {
        Some(self.zero)
    }

    fn test_and_branch(
        &self,
        _sema: &Sema,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        _distance_hint: u32,
    ) -> Option<TestAndBranch> {
        let test = Some((
            InstrType::VoidIntrinsic(self.cmp),
            vec![left.clone(), right.clone()],
        ));

        // Unsigned comparisons via the carry flag; `>` and `<=` are
        // handled by the selector flipping the comparison.
        let branches = match op {
            BinOp::Eq => vec![FlagBranch { flag: self.zero, success_if: true, taken: true }],
            BinOp::NotEq => vec![FlagBranch { flag: self.zero, success_if: false, taken: true }],
            BinOp::Less => vec![FlagBranch { flag: self.carry, success_if: false, taken: true }],
            BinOp::GreaterEq => {
                vec![FlagBranch { flag: self.carry, success_if: true, taken: true }]
            }
            _ => return None,
        };

        Some(TestAndBranch { test, branches })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use ember_source::SourceMap;

    use super::*;

    #[test]
    fn table_covers_the_basics() {
        let mut sources = SourceMap::new();
        sources.add_module("top.ember", "");
        let mut sema = Sema::new(sources);

        let mut platform = Mos6502::new();
        platform.reserve_definitions(&mut sema);
        let a = platform.a;
        let zero = platform.zero;
        sema.install_platform(Rc::new(platform));

        use ember_ir::InstructionOperand as Op;

        // lda #$10
        let (_, captures) = sema
            .instructions
            .select(
                InstrType::Binary(BinOp::Assign),
                0,
                &[Op::Register(a), Op::integer(0x10)],
            )
            .expect("immediate load");
        assert_eq!(captures[1], vec![Op::integer(0x10)]);

        // sta $2002
        let dest = Op::Dereference {
            far: false,
            operand: Box::new(Op::integer(0x2002)),
            size: 1,
        };
        assert!(sema
            .instructions
            .select(InstrType::Binary(BinOp::Assign), 0, &[dest, Op::Register(a)])
            .is_some());

        // beq $8000
        assert!(sema
            .instructions
            .select(
                InstrType::Branch(BranchKind::Goto),
                0,
                &[Op::integer(0x8000), Op::Register(zero), Op::Boolean(true)],
            )
            .is_some());

        // rts
        assert!(sema
            .instructions
            .select(InstrType::Branch(BranchKind::Return), 0, &[])
            .is_some());
    }
}
