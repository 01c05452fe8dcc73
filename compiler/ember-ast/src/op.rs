//! Operator kinds shared by the AST, the reducer and the instruction table.

use std::fmt;

/// Binary operators of the source language. `Assign` covers both plain
/// assignment statements and the left-hand side of in-place forms the
/// instruction selector rewrites between.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinOp {
    Assign,
    Add,
    AddWithCarry,
    Sub,
    SubWithCarry,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    /// `<<`, arithmetic shift left.
    Shl,
    /// `>>`, arithmetic shift right.
    Shr,
    /// `<<<`, logical shift left.
    LogicalShl,
    /// `>>>`, logical shift right.
    LogicalShr,
    /// `<<<<`, rotate left within the byte width of the result type.
    RotateLeft,
    /// `>>>>`, rotate right within the byte width of the result type.
    RotateRight,
    /// `~`, array concatenation.
    Concat,
    /// `a[i]`.
    Index,
    /// `x $ n`, single-bit indexing; yields a boolean.
    BitIndex,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    LogicalAnd,
    LogicalOr,
}

impl BinOp {
    /// The operator's surface spelling, used in "not defined between" style
    /// diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Assign => "=",
            BinOp::Add => "+",
            BinOp::AddWithCarry => "+#",
            BinOp::Sub => "-",
            BinOp::SubWithCarry => "-#",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::LogicalShl => "<<<",
            BinOp::LogicalShr => ">>>",
            BinOp::RotateLeft => "<<<<",
            BinOp::RotateRight => ">>>>",
            BinOp::Concat => "~",
            BinOp::Index => "[]",
            BinOp::BitIndex => "$",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Less => "<",
            BinOp::LessEq => "<=",
            BinOp::Greater => ">",
            BinOp::GreaterEq => ">=",
            BinOp::LogicalAnd => "&&",
            BinOp::LogicalOr => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::NotEq | BinOp::Less | BinOp::LessEq | BinOp::Greater | BinOp::GreaterEq
        )
    }

    /// Mirror a comparison across its operands, e.g. `a < b` becomes
    /// `b > a`. Used by the selector to retry flipped comparisons.
    pub fn flipped_comparison(self) -> Option<BinOp> {
        match self {
            BinOp::Eq => Some(BinOp::Eq),
            BinOp::NotEq => Some(BinOp::NotEq),
            BinOp::Less => Some(BinOp::Greater),
            BinOp::Greater => Some(BinOp::Less),
            BinOp::LessEq => Some(BinOp::GreaterEq),
            BinOp::GreaterEq => Some(BinOp::LessEq),
            _ => None,
        }
    }

    /// The comparison that holds exactly when `self` does not.
    pub fn negated_comparison(self) -> Option<BinOp> {
        match self {
            BinOp::Eq => Some(BinOp::NotEq),
            BinOp::NotEq => Some(BinOp::Eq),
            BinOp::Less => Some(BinOp::GreaterEq),
            BinOp::GreaterEq => Some(BinOp::Less),
            BinOp::Greater => Some(BinOp::LessEq),
            BinOp::LessEq => Some(BinOp::Greater),
            _ => None,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Unary operators. Address-of, indirection, grouping and the byte
/// extraction operators are the only ones permitted on `writeonly`
/// operands.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    BitNot,
    LogicalNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    AddressOf,
    FarAddressOf,
    Indirection,
    /// Parenthesized grouping, preserved so flags flow through unchanged.
    Grouping,
    /// `<:`, low byte.
    LowByte,
    /// `>:`, high byte.
    HighByte,
    /// `#:`, bank byte of a far address.
    BankByte,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::BitNot => "~",
            UnOp::LogicalNot => "!",
            UnOp::PreIncrement => "++",
            UnOp::PreDecrement => "--",
            UnOp::PostIncrement => "++",
            UnOp::PostDecrement => "--",
            UnOp::AddressOf => "&",
            UnOp::FarAddressOf => "far &",
            UnOp::Indirection => "*",
            UnOp::Grouping => "()",
            UnOp::LowByte => "<:",
            UnOp::HighByte => ">:",
            UnOp::BankByte => "#:",
        }
    }

    /// Whether a `writeonly` operand is accepted.
    pub fn permits_writeonly(self) -> bool {
        matches!(
            self,
            UnOp::AddressOf
                | UnOp::FarAddressOf
                | UnOp::Indirection
                | UnOp::Grouping
                | UnOp::LowByte
                | UnOp::HighByte
                | UnOp::BankByte
        )
    }

    pub fn is_increment(self) -> bool {
        matches!(
            self,
            UnOp::PreIncrement | UnOp::PreDecrement | UnOp::PostIncrement | UnOp::PostDecrement
        )
    }
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Branch statement kinds. The same enumeration doubles as a function's
/// return convention: calling a `nmi` function returns via `NmiReturn`,
/// an inline expansion temporarily uses `None`, and so on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BranchKind {
    None,
    Goto,
    FarGoto,
    Return,
    FarReturn,
    IrqReturn,
    NmiReturn,
    Call,
    FarCall,
    Break,
    Continue,
}

impl BranchKind {
    pub fn symbol(self) -> &'static str {
        match self {
            BranchKind::None => "(none)",
            BranchKind::Goto => "goto",
            BranchKind::FarGoto => "far goto",
            BranchKind::Return => "return",
            BranchKind::FarReturn => "far return",
            BranchKind::IrqReturn => "irqreturn",
            BranchKind::NmiReturn => "nmireturn",
            BranchKind::Call => "call",
            BranchKind::FarCall => "far call",
            BranchKind::Break => "break",
            BranchKind::Continue => "continue",
        }
    }

    /// Whether this kind transfers control out of the enclosing function.
    pub fn is_return(self) -> bool {
        matches!(
            self,
            BranchKind::Return | BranchKind::FarReturn | BranchKind::IrqReturn | BranchKind::NmiReturn
        )
    }
}

impl fmt::Display for BranchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
