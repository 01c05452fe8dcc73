//! CPU platform implementations. Each platform seeds the builtin scope
//! with its registers, flags, integer types and intrinsics, fills the
//! instruction table with opcode patterns, and answers the lowering
//! phase's branch-selection queries.

pub mod mos6502;

pub use mos6502::Mos6502;
