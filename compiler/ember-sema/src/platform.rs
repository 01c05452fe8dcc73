//! The CPU platform plug-in interface. A platform seeds the builtin scope
//! with its registers, intrinsics, integer types and mode attributes,
//! populates the instruction table, and answers the selection queries the
//! lowering phase asks while decomposing conditions.

use ember_ast::{expr::Expr, op::BinOp, DefId};
use ember_ir::TestAndBranch;

use crate::Sema;

pub trait Platform {
    /// A short name such as `"mos6502"`, used by driver selection.
    fn name(&self) -> &'static str;

    /// Seed builtin definitions (registers, integer types, intrinsics,
    /// mode attributes) into the builtin scope and fill the instruction
    /// table. Called exactly once, before [`Sema::install_platform`].
    fn reserve_definitions(&mut self, sema: &mut Sema);

    /// The integer type sized like a near pointer.
    fn pointer_sized_type(&self) -> DefId;

    /// The integer type sized like a far (bank-carrying) pointer.
    fn far_pointer_sized_type(&self) -> DefId;

    /// The 8-bit integer type, used by the byte-extraction operators.
    fn byte_type(&self) -> DefId;

    /// The value used to fill link-time-unknown operand bytes during
    /// selection; layout pass 2 replaces it with the real bits.
    fn placeholder_value(&self) -> i128;

    /// The zero flag register, when the platform's increment/decrement
    /// instructions set it. The for-loop lowering uses it to elide
    /// explicit comparisons on full-range loops.
    fn zero_flag(&self) -> Option<DefId>;

    /// Decompose `left op right` into a test instruction plus conditional
    /// flag branches. `distance_hint` counts the `^` sigils the source
    /// prefixed, letting the platform pick short or long branch forms.
    /// Returning `None` makes the selector retry with the comparison
    /// flipped, then fall back to structural decomposition.
    fn test_and_branch(
        &self,
        sema: &Sema,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        distance_hint: u32,
    ) -> Option<TestAndBranch>;
}
