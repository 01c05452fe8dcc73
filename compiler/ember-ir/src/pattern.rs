//! Operand patterns: the matching side of the instruction table. A
//! pattern mirrors the [InstructionOperand] shapes and declares which
//! sub-operands are captured for the encoding.

use ember_ast::{
    op::{BinOp, UnOp},
    DefId,
};

use crate::operand::InstructionOperand;

#[derive(Debug, Clone, PartialEq)]
pub enum OperandPattern {
    /// Match the inner pattern and capture the matched operand for the
    /// encoding's parameter list.
    Capture(Box<OperandPattern>),

    Register(DefId),

    /// An integer within an inclusive range.
    Integer { min: i128, max: i128 },

    Boolean(bool),

    Dereference { far: bool, operand: Box<OperandPattern>, size: usize },

    Index {
        far: bool,
        operand: Box<OperandPattern>,
        subscript: Box<OperandPattern>,
        subscript_scale: usize,
        size: usize,
    },

    BitIndex { operand: Box<OperandPattern>, subscript: Box<OperandPattern> },

    Binary(BinOp, Box<OperandPattern>, Box<OperandPattern>),

    Unary(UnOp, Box<OperandPattern>),
}

impl OperandPattern {
    /// Immediate patterns for the usual operand widths.
    pub fn imm_u8() -> Self {
        OperandPattern::Integer { min: 0, max: 0xFF }
    }

    pub fn imm_u16() -> Self {
        OperandPattern::Integer { min: 0, max: 0xFFFF }
    }

    pub fn imm_u24() -> Self {
        OperandPattern::Integer { min: 0, max: 0xFF_FFFF }
    }

    pub fn capture(inner: OperandPattern) -> Self {
        OperandPattern::Capture(Box::new(inner))
    }

    /// Whether `operand` matches, appending captured sub-operands to
    /// `captures` in traversal order. A failed match leaves `captures`
    /// exactly as it found it.
    pub fn matches(
        &self,
        operand: &InstructionOperand,
        captures: &mut Vec<InstructionOperand>,
    ) -> bool {
        let checkpoint = captures.len();
        let matched = self.matches_inner(operand, captures);
        if !matched {
            captures.truncate(checkpoint);
        }
        matched
    }

    fn matches_inner(
        &self,
        operand: &InstructionOperand,
        captures: &mut Vec<InstructionOperand>,
    ) -> bool {
        match self {
            OperandPattern::Capture(inner) => {
                let checkpoint = captures.len();
                if inner.matches(operand, captures) {
                    captures.insert(checkpoint, operand.clone());
                    true
                } else {
                    false
                }
            }
            OperandPattern::Register(def) => {
                matches!(operand, InstructionOperand::Register(reg) if reg == def)
            }
            OperandPattern::Integer { min, max } => match operand {
                InstructionOperand::Integer { value, .. } => *min <= *value && *value <= *max,
                _ => false,
            },
            OperandPattern::Boolean(expected) => {
                matches!(operand, InstructionOperand::Boolean(value) if value == expected)
            }
            OperandPattern::Dereference { far, operand: inner, size } => match operand {
                InstructionOperand::Dereference { far: ofar, operand: ooperand, size: osize } => {
                    far == ofar && size == osize && inner.matches(ooperand, captures)
                }
                _ => false,
            },
            OperandPattern::Index { far, operand: base, subscript, subscript_scale, size } => {
                match operand {
                    InstructionOperand::Index {
                        far: ofar,
                        operand: obase,
                        subscript: osubscript,
                        subscript_scale: oscale,
                        size: osize,
                    } => {
                        far == ofar
                            && subscript_scale == oscale
                            && size == osize
                            && base.matches(obase, captures)
                            && subscript.matches(osubscript, captures)
                    }
                    _ => false,
                }
            }
            OperandPattern::BitIndex { operand: inner, subscript } => match operand {
                InstructionOperand::BitIndex { operand: ooperand, subscript: osubscript } => {
                    inner.matches(ooperand, captures) && subscript.matches(osubscript, captures)
                }
                _ => false,
            },
            OperandPattern::Binary(op, left, right) => match operand {
                InstructionOperand::Binary(oop, oleft, oright) => {
                    op == oop && left.matches(oleft, captures) && right.matches(oright, captures)
                }
                _ => false,
            },
            OperandPattern::Unary(op, inner) => match operand {
                InstructionOperand::Unary(oop, ooperand) => {
                    op == oop && inner.matches(ooperand, captures)
                }
                _ => false,
            },
        }
    }

    /// A rendering of the pattern for candidate enumeration in "no
    /// matching instruction" diagnostics.
    pub fn describe(&self) -> String {
        match self {
            OperandPattern::Capture(inner) => inner.describe(),
            OperandPattern::Register(def) => format!("register#{}", def.raw()),
            OperandPattern::Integer { min, max } => format!("integer {min}..={max}"),
            OperandPattern::Boolean(value) => format!("{value}"),
            OperandPattern::Dereference { far, operand, size } => {
                let far = if *far { "far " } else { "" };
                format!("{far}*({}):{size}", operand.describe())
            }
            OperandPattern::Index { far, operand, subscript, subscript_scale, size } => {
                let far = if *far { "far " } else { "" };
                format!(
                    "{far}*({} + {}*{subscript_scale}):{size}",
                    operand.describe(),
                    subscript.describe()
                )
            }
            OperandPattern::BitIndex { operand, subscript } => {
                format!("{} $ {}", operand.describe(), subscript.describe())
            }
            OperandPattern::Binary(op, left, right) => {
                format!("({} {op} {})", left.describe(), right.describe())
            }
            OperandPattern::Unary(op, operand) => format!("{op}{}", operand.describe()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_ranges() {
        let pattern = OperandPattern::imm_u8();
        let mut captures = Vec::new();

        assert!(pattern.matches(&InstructionOperand::integer(0xFF), &mut captures));
        assert!(!pattern.matches(&InstructionOperand::integer(0x100), &mut captures));
        assert!(!pattern.matches(&InstructionOperand::integer(-1), &mut captures));
    }

    #[test]
    fn capture_records_matched_operand() {
        let pattern = OperandPattern::Dereference {
            far: false,
            operand: Box::new(OperandPattern::capture(OperandPattern::imm_u16())),
            size: 1,
        };
        let operand = InstructionOperand::Dereference {
            far: false,
            operand: Box::new(InstructionOperand::integer(0x2002)),
            size: 1,
        };

        let mut captures = Vec::new();
        assert!(pattern.matches(&operand, &mut captures));
        assert_eq!(captures, vec![InstructionOperand::integer(0x2002)]);
    }

    #[test]
    fn failed_match_leaves_no_captures() {
        let pattern = OperandPattern::Binary(
            BinOp::Add,
            Box::new(OperandPattern::capture(OperandPattern::imm_u8())),
            Box::new(OperandPattern::Boolean(true)),
        );
        let operand = InstructionOperand::Binary(
            BinOp::Add,
            Box::new(InstructionOperand::integer(1)),
            Box::new(InstructionOperand::Boolean(false)),
        );

        let mut captures = Vec::new();
        assert!(!pattern.matches(&operand, &mut captures));
        assert!(captures.is_empty());
    }

    #[test]
    fn placeholder_integers_match_like_values() {
        let pattern = OperandPattern::imm_u16();
        let mut captures = Vec::new();
        assert!(pattern.matches(&InstructionOperand::placeholder(0xCCCC), &mut captures));
    }
}
