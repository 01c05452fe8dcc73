//! The instruction table: opcode-pattern entries each platform registers,
//! plus the selection query the lowering phase drives.

use ember_ast::{
    expr::Expr,
    op::{BinOp, BranchKind, UnOp},
    DefId,
};
use ember_utils::index_vec::{index_vec, IndexVec};

use crate::{encoding::Encoding, operand::InstructionOperand, pattern::OperandPattern, InstrId};

/// What an instruction implements: an operator, a branch kind, or one of
/// the platform's intrinsics.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InstrType {
    Unary(UnOp),
    Binary(BinOp),
    Branch(BranchKind),
    VoidIntrinsic(DefId),
    LoadIntrinsic(DefId),
}

impl InstrType {
    pub fn describe(&self) -> String {
        match self {
            InstrType::Unary(op) => format!("`{op}`"),
            InstrType::Binary(op) => format!("`{op}`"),
            InstrType::Branch(kind) => format!("`{kind}`"),
            InstrType::VoidIntrinsic(def) | InstrType::LoadIntrinsic(def) => {
                format!("intrinsic#{}", def.raw())
            }
        }
    }
}

/// The matching half of a table entry. `mode_mask` selects CPU modes
/// (0 means "any mode"); every operand pattern must match positionally.
#[derive(Debug, Clone)]
pub struct InstructionSignature {
    pub ty: InstrType,
    pub mode_mask: u32,
    pub patterns: Vec<OperandPattern>,
}

impl InstructionSignature {
    pub fn new(ty: InstrType, mode_mask: u32, patterns: Vec<OperandPattern>) -> Self {
        Self { ty, mode_mask, patterns }
    }

    pub fn accepts_mode(&self, mode: u32) -> bool {
        self.mode_mask == 0 || (self.mode_mask & mode) == self.mode_mask
    }

    /// Match `operands` against the signature, producing one capture list
    /// per operand position.
    pub fn match_operands(&self, operands: &[InstructionOperand]) -> Option<CaptureLists> {
        if operands.len() != self.patterns.len() {
            return None;
        }

        let mut capture_lists = Vec::with_capacity(operands.len());
        for (pattern, operand) in self.patterns.iter().zip(operands) {
            let mut captures = Vec::new();
            if !pattern.matches(operand, &mut captures) {
                return None;
            }
            capture_lists.push(captures);
        }
        Some(capture_lists)
    }
}

/// Captured operands, one list per operand position.
pub type CaptureLists = Vec<Vec<InstructionOperand>>;

/// The emitting half of a table entry: opcode bytes, which operand
/// positions feed the encoding's parameters, and which flag registers the
/// instruction clobbers.
#[derive(Debug, Clone)]
pub struct InstructionOptions {
    pub opcode: Vec<u8>,
    pub parameter: Vec<usize>,
    pub affected_flags: Vec<DefId>,
}

impl InstructionOptions {
    pub fn new(opcode: Vec<u8>, parameter: Vec<usize>, affected_flags: Vec<DefId>) -> Self {
        Self { opcode, parameter, affected_flags }
    }
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub signature: InstructionSignature,
    pub encoding: Encoding,
    pub options: InstructionOptions,
}

/// The per-platform instruction database. Entries are tried in
/// registration order; the first full match wins.
#[derive(Debug, Default)]
pub struct InstructionTable {
    instructions: IndexVec<InstrId, Instruction>,
}

impl InstructionTable {
    pub fn new() -> Self {
        Self { instructions: index_vec![] }
    }

    pub fn add(
        &mut self,
        signature: InstructionSignature,
        encoding: Encoding,
        options: InstructionOptions,
    ) -> InstrId {
        self.instructions.push(Instruction { signature, encoding, options })
    }

    pub fn get(&self, id: InstrId) -> &Instruction {
        &self.instructions[id]
    }

    /// Find the first entry matching `ty` in `mode` whose patterns all
    /// match `operands`.
    pub fn select(
        &self,
        ty: InstrType,
        mode: u32,
        operands: &[InstructionOperand],
    ) -> Option<(InstrId, CaptureLists)> {
        self.instructions.iter_enumerated().find_map(|(id, instruction)| {
            if instruction.signature.ty != ty || !instruction.signature.accepts_mode(mode) {
                return None;
            }
            instruction.signature.match_operands(operands).map(|captures| (id, captures))
        })
    }

    /// Every entry registered for `ty`, for candidate enumeration when
    /// selection fails.
    pub fn candidates(&self, ty: InstrType) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().filter(move |instruction| instruction.signature.ty == ty)
    }
}

/// One conditional jump in a decomposed comparison: branch on
/// `flag == success_if`; the jump goes to the branch destination when
/// `taken`, otherwise to the synthetic failure label placed after the
/// sequence.
#[derive(Debug, Clone, Copy)]
pub struct FlagBranch {
    pub flag: DefId,
    pub success_if: bool,
    pub taken: bool,
}

/// A platform's recipe for lowering a comparison condition: an optional
/// test instruction followed by one conditional jump per flag branch.
#[derive(Debug, Clone)]
pub struct TestAndBranch {
    pub test: Option<(InstrType, Vec<Expr>)>,
    pub branches: Vec<FlagBranch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jmp_table() -> InstructionTable {
        let mut table = InstructionTable::new();
        table.add(
            InstructionSignature::new(
                InstrType::Branch(BranchKind::Goto),
                0,
                vec![OperandPattern::capture(OperandPattern::imm_u16())],
            ),
            Encoding::U16Operand,
            InstructionOptions::new(vec![0x4C], vec![0], vec![]),
        );
        table
    }

    #[test]
    fn first_matching_entry_wins() {
        let table = jmp_table();
        let (id, captures) = table
            .select(
                InstrType::Branch(BranchKind::Goto),
                0,
                &[InstructionOperand::integer(0x8000)],
            )
            .unwrap();

        assert_eq!(id, InstrId::from_raw(0));
        assert_eq!(captures, vec![vec![InstructionOperand::integer(0x8000)]]);
    }

    #[test]
    fn arity_mismatch_fails() {
        let table = jmp_table();
        assert!(table.select(InstrType::Branch(BranchKind::Goto), 0, &[]).is_none());
    }

    #[test]
    fn mode_mask_filters_entries() {
        let mut table = InstructionTable::new();
        table.add(
            InstructionSignature::new(InstrType::Branch(BranchKind::Return), 0b10, vec![]),
            Encoding::Implicit,
            InstructionOptions::new(vec![0x60], vec![], vec![]),
        );

        assert!(table.select(InstrType::Branch(BranchKind::Return), 0b01, &[]).is_none());
        assert!(table.select(InstrType::Branch(BranchKind::Return), 0b11, &[]).is_some());
    }
}
