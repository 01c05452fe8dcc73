//! The Ember intermediate representation: a flat list of emission
//! primitives produced by statement lowering and consumed twice by the
//! bank layout passes, plus the pattern/encoding machinery each CPU
//! platform populates its instruction table with.

pub mod encoding;
pub mod instruction;
pub mod ir;
pub mod operand;
pub mod pattern;

pub use encoding::{EncodeError, Encoding};
pub use instruction::{
    CaptureLists, FlagBranch, Instruction, InstructionOptions, InstructionSignature, InstrType,
    InstructionTable, TestAndBranch,
};
pub use ir::{IrNode, IrNodeKind, OperandRoot};
pub use operand::InstructionOperand;
pub use pattern::OperandPattern;

ember_utils::index_vec::define_index_type! {
    /// Index of an [Instruction] in the platform's table.
    pub struct InstrId = u32;

    MAX_INDEX = i32::max_value() as usize;
    DISABLE_MAX_INDEX_CHECK = cfg!(not(debug_assertions));
}
