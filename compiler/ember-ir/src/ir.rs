//! The flat IR list: emission primitives appended in statement order by
//! lowering, then consumed twice by the bank layout passes.

use ember_ast::{expr::Expr, DefId};
use ember_def::BankId;
use ember_source::SourceLocation;

use crate::{operand::InstructionOperand, InstrId};

/// A selected instruction operand together with the reduced expression it
/// came from. Layout pass 2 re-reduces the expression (link-time
/// arithmetic resolves once addresses exist) and rebuilds the operand.
#[derive(Debug, Clone)]
pub struct OperandRoot {
    pub expr: Box<Expr>,
    pub operand: InstructionOperand,
}

impl OperandRoot {
    pub fn new(expr: Box<Expr>, operand: InstructionOperand) -> Self {
        Self { expr, operand }
    }
}

#[derive(Debug)]
pub enum IrNodeKind {
    /// Switch emission into `bank`, optionally seeking to an absolute
    /// address; the previous bank is remembered LIFO-wise.
    PushRelocation { bank: BankId, address: Option<u32> },

    /// Restore the previously active bank.
    PopRelocation,

    /// Bind a label/function definition to the current bank position.
    Label(DefId),

    /// A selected instruction.
    Code { instruction: InstrId, operands: Vec<OperandRoot> },

    /// Emit a stored variable's initializer bytes at its address.
    Var(DefId),
}

#[derive(Debug)]
pub struct IrNode {
    pub kind: IrNodeKind,
    pub location: SourceLocation,
}

impl IrNode {
    pub fn new(kind: IrNodeKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}
