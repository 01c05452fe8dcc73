//! Instruction operands: the shapes the selector matches against CPU
//! patterns. Equality is structural.

use ember_ast::{
    op::{BinOp, UnOp},
    DefId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionOperand {
    /// A CPU register or flag.
    Register(DefId),

    /// An integer value. `placeholder` marks link-time values that get
    /// their real bits during layout pass 2.
    Integer { value: i128, placeholder: bool },

    Boolean(bool),

    /// `*addr` with an access width in bytes.
    Dereference { far: bool, operand: Box<InstructionOperand>, size: usize },

    /// `*(base + index * scale)` with an access width in bytes.
    Index {
        far: bool,
        operand: Box<InstructionOperand>,
        subscript: Box<InstructionOperand>,
        subscript_scale: usize,
        size: usize,
    },

    /// `value $ bit`.
    BitIndex { operand: Box<InstructionOperand>, subscript: Box<InstructionOperand> },

    Binary(BinOp, Box<InstructionOperand>, Box<InstructionOperand>),

    Unary(UnOp, Box<InstructionOperand>),
}

impl InstructionOperand {
    pub fn integer(value: i128) -> Self {
        InstructionOperand::Integer { value, placeholder: false }
    }

    pub fn placeholder(value: i128) -> Self {
        InstructionOperand::Integer { value, placeholder: true }
    }

    /// The integer payload, for capture extraction.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            InstructionOperand::Integer { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// A short rendering for "no matching instruction" diagnostics.
    pub fn describe(&self) -> String {
        match self {
            InstructionOperand::Register(def) => format!("register#{}", def.raw()),
            InstructionOperand::Integer { value, placeholder: false } => format!("{value}"),
            InstructionOperand::Integer { placeholder: true, .. } => "<link-time>".into(),
            InstructionOperand::Boolean(value) => format!("{value}"),
            InstructionOperand::Dereference { far, operand, size } => {
                let far = if *far { "far " } else { "" };
                format!("{far}*({}):{size}", operand.describe())
            }
            InstructionOperand::Index { far, operand, subscript, subscript_scale, size } => {
                let far = if *far { "far " } else { "" };
                format!(
                    "{far}*({} + {}*{subscript_scale}):{size}",
                    operand.describe(),
                    subscript.describe()
                )
            }
            InstructionOperand::BitIndex { operand, subscript } => {
                format!("{} $ {}", operand.describe(), subscript.describe())
            }
            InstructionOperand::Binary(op, left, right) => {
                format!("({} {op} {})", left.describe(), right.describe())
            }
            InstructionOperand::Unary(op, operand) => format!("{op}{}", operand.describe()),
        }
    }
}
