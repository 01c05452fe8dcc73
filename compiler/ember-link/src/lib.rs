//! Bank layout and assembly: two passes over the IR list. Pass 1 sizes
//! every instruction, assigns label and variable addresses, and applies
//! the redundant-jump elision. Pass 2 rewinds the banks, re-reduces
//! link-time operands now that addresses exist, and emits bit-exact
//! bytes.

pub mod serialize;

use ember_ast::op::BranchKind;
use ember_def::{Address, BankId};
use ember_ir::{EncodeError, InstrType, IrNode, IrNodeKind};
use ember_lower::IrBuilder;
use ember_sema::Sema;
use ember_source::SourceLocation;
use ember_utils::{fxhash::FxHashSet, log};

pub struct Linker<'a> {
    pub sema: &'a mut Sema,
    ir: Vec<IrNode>,
    /// Indices of IR nodes removed by the jump elision.
    elided: FxHashSet<usize>,
}

impl<'a> Linker<'a> {
    pub fn new(sema: &'a mut Sema, ir: Vec<IrNode>) -> Self {
        Self { sema, ir, elided: FxHashSet::default() }
    }

    /// Run both passes. Returns whether the compile succeeded.
    pub fn link(&mut self) -> bool {
        log::debug!("layout pass 1: sizing and addresses");
        self.layout_pass();
        if !self.sema.reporter.validate() {
            return false;
        }

        log::debug!("layout pass 2: byte emission");
        self.emit_pass();
        self.sema.reporter.validate()
    }

    // --- pass 1 ----------------------------------------------------------

    fn layout_pass(&mut self) {
        let mut bank_stack: Vec<(Option<BankId>, u32)> = Vec::new();
        let mut current: Option<BankId> = None;

        for index in 0..self.ir.len() {
            let location = self.ir[index].location;
            match &self.ir[index].kind {
                IrNodeKind::PushRelocation { bank, address } => {
                    let bank = *bank;
                    let address = *address;
                    let saved = current
                        .map(|id| (Some(id), self.sema.banks[id].relative_position()))
                        .unwrap_or((None, 0));
                    bank_stack.push(saved);
                    current = Some(bank);
                    if let Some(address) = address {
                        if let Err(error) = self.sema.banks[bank].absolute_seek(address) {
                            self.sema.report_bank_error(error, location);
                        }
                    }
                }

                IrNodeKind::PopRelocation => {
                    let Some((previous, position)) = bank_stack.pop() else {
                        self.sema
                            .reporter
                            .internal("bank relocation stack underflow", location);
                        continue;
                    };
                    current = previous;
                    if let Some(previous) = previous {
                        self.sema.banks[previous].set_relative_position(position);
                    }
                }

                IrNodeKind::Label(def) => {
                    let def = *def;
                    let Some(bank) = current else {
                        self.sema
                            .reporter
                            .error("label is not inside a bank", location);
                        continue;
                    };
                    let relative = self.sema.banks[bank].relative_position();
                    let absolute = self.sema.banks[bank].absolute_position();
                    if absolute.is_none() {
                        let name = self.sema.banks[bank].name();
                        self.sema.reporter.error(
                            format!("bank `{name}` needs a known address before code can be placed in it"),
                            location,
                        );
                    }
                    self.sema.defs.func_mut(def).address = Some(Address {
                        bank: Some(bank),
                        relative_position: Some(relative),
                        absolute_position: absolute,
                    });
                }

                IrNodeKind::Code { instruction, operands } => {
                    let instruction = *instruction;

                    // Peephole: an unconditional goto whose destination is
                    // the immediately-following label (through any number
                    // of labels at this position) emits nothing.
                    if self.is_elidable_goto(index, instruction, operands) {
                        self.elided.insert(index);
                        continue;
                    }

                    let entry = self.sema.instructions.get(instruction);
                    let built: Vec<_> =
                        operands.iter().map(|root| root.operand.clone()).collect();
                    let Some(captures) = entry.signature.match_operands(&built) else {
                        self.sema.reporter.internal(
                            "selected instruction no longer matches its operands",
                            location,
                        );
                        continue;
                    };
                    let size = match entry.encoding.size(&entry.options, &captures) {
                        Ok(size) => size,
                        Err(_) => {
                            self.sema
                                .reporter
                                .internal("instruction size could not be computed", location);
                            continue;
                        }
                    };

                    let Some(bank) = current else {
                        self.sema
                            .reporter
                            .error("code is not inside a bank", location);
                        continue;
                    };
                    if let Err(error) = self.sema.banks[bank].reserve_rom(size) {
                        self.sema.report_bank_error(error, location);
                    }
                }

                IrNodeKind::Var(def) => {
                    let def = *def;
                    self.layout_var(def, current, location);
                }
            }
        }
    }

    /// Whether the node at `index` is an unconditional goto targeting a
    /// label that immediately follows it.
    fn is_elidable_goto(
        &self,
        index: usize,
        instruction: ember_ir::InstrId,
        operands: &[ember_ir::OperandRoot],
    ) -> bool {
        let entry = self.sema.instructions.get(instruction);
        if entry.signature.ty != InstrType::Branch(BranchKind::Goto) || operands.len() != 1 {
            return false;
        }
        let Some(destination) = operands[0].expr.referenced_def() else {
            return false;
        };

        for node in &self.ir[index + 1..] {
            match &node.kind {
                IrNodeKind::Label(label) if *label == destination => return true,
                IrNodeKind::Label(_) => continue,
                _ => return false,
            }
        }
        false
    }

    fn layout_var(
        &mut self,
        def: ember_ast::DefId,
        current: Option<BankId>,
        location: SourceLocation,
    ) {
        let Some(size) = self.sema.defs.var(def).storage_size else {
            self.sema
                .reporter
                .internal("variable has no storage size at layout", location);
            return;
        };
        let Some(bank) = current else {
            self.sema
                .reporter
                .error("variable data is not inside a bank", location);
            return;
        };

        let explicit = self
            .sema
            .defs
            .var(def)
            .address
            .as_ref()
            .and_then(|address| address.absolute_position);

        match explicit {
            Some(address) => {
                // Explicit `@`: reserve at that address, then restore the
                // running position.
                let saved = self.sema.banks[bank].relative_position();
                if let Err(error) = self.sema.banks[bank].absolute_seek(address) {
                    self.sema.report_bank_error(error, location);
                    return;
                }
                let relative = self.sema.banks[bank].relative_position();
                if let Err(error) = self.sema.banks[bank].reserve_rom(size) {
                    self.sema.report_bank_error(error, location);
                }
                self.sema.banks[bank].set_relative_position(saved);
                self.sema.defs.var_mut(def).address = Some(Address {
                    bank: Some(bank),
                    relative_position: Some(relative),
                    absolute_position: Some(address),
                });
            }
            None => {
                let relative = self.sema.banks[bank].relative_position();
                let absolute = self.sema.banks[bank].absolute_position();
                if let Err(error) = self.sema.banks[bank].reserve_rom(size) {
                    self.sema.report_bank_error(error, location);
                    return;
                }
                self.sema.defs.var_mut(def).address = Some(Address {
                    bank: Some(bank),
                    relative_position: Some(relative),
                    absolute_position: absolute,
                });
            }
        }
    }

    // --- pass 2 ----------------------------------------------------------

    fn emit_pass(&mut self) {
        for bank in self.sema.banks.iter_mut() {
            bank.rewind();
        }

        let mut bank_stack: Vec<(Option<BankId>, u32)> = Vec::new();
        let mut current: Option<BankId> = None;

        for index in 0..self.ir.len() {
            if self.elided.contains(&index) {
                continue;
            }
            let location = self.ir[index].location;
            match &self.ir[index].kind {
                IrNodeKind::PushRelocation { bank, address } => {
                    let bank = *bank;
                    let address = *address;
                    let saved = current
                        .map(|id| (Some(id), self.sema.banks[id].relative_position()))
                        .unwrap_or((None, 0));
                    bank_stack.push(saved);
                    current = Some(bank);
                    if let Some(address) = address {
                        if let Err(error) = self.sema.banks[bank].absolute_seek(address) {
                            self.sema.report_bank_error(error, location);
                        }
                    }
                }

                IrNodeKind::PopRelocation => {
                    if let Some((previous, position)) = bank_stack.pop() {
                        current = previous;
                        if let Some(previous) = previous {
                            self.sema.banks[previous].set_relative_position(position);
                        }
                    }
                }

                IrNodeKind::Label(def) => {
                    // Internal check: emission must land exactly where
                    // pass 1 placed the label.
                    let recorded = self
                        .sema
                        .defs
                        .func(*def)
                        .address
                        .as_ref()
                        .and_then(|address| address.absolute_position);
                    let actual = current.and_then(|bank| self.sema.banks[bank].absolute_position());
                    if recorded != actual {
                        self.sema.reporter.internal(
                            format!(
                                "label address drifted between passes (expected {recorded:?}, found {actual:?})"
                            ),
                            location,
                        );
                    }
                }

                IrNodeKind::Code { instruction, operands } => {
                    let instruction = *instruction;
                    let roots: Vec<_> =
                        operands.iter().map(|root| (*root.expr).clone()).collect();
                    self.emit_code(instruction, roots, current, location);
                }

                IrNodeKind::Var(def) => {
                    let def = *def;
                    self.emit_var(def, current, location);
                }
            }
        }
    }

    fn emit_code(
        &mut self,
        instruction: ember_ir::InstrId,
        operand_exprs: Vec<ember_ast::Expr>,
        current: Option<BankId>,
        location: SourceLocation,
    ) {
        let Some(bank) = current else { return };

        // Re-reduce each operand: link-time arithmetic can fold now that
        // addresses are assigned.
        let mut rebuilt = Vec::with_capacity(operand_exprs.len());
        {
            let mut builder = IrBuilder::new(self.sema);
            for expr in &operand_exprs {
                let Some(reduced) = builder.sema.reduce_expression(expr) else { return };
                let Some(operand) = builder.create_operand_from_expression(&reduced, location)
                else {
                    return;
                };
                rebuilt.push(operand);
            }
        }

        // Every link-time placeholder must have resolved by now.
        if rebuilt.iter().any(contains_placeholder) {
            self.sema.reporter.error(
                "operand address could not be resolved during layout",
                location,
            );
            return;
        }

        let entry = self.sema.instructions.get(instruction).clone();
        let Some(captures) = entry.signature.match_operands(&rebuilt) else {
            self.sema.reporter.internal(
                "operands no longer match the selected instruction after re-reduction",
                location,
            );
            return;
        };

        let Some(pc) = self.sema.banks[bank].absolute_position() else {
            return;
        };

        let mut buffer = Vec::new();
        if let Err(error) = entry.encoding.write(&entry.options, &captures, pc, &mut buffer) {
            match error {
                EncodeError::PcRelativeRange { offset, min, max } => {
                    self.sema.reporter.error(
                        format!(
                            "pc-relative offset {offset} is outside of the representable range {min}..{max}"
                        ),
                        location,
                    );
                }
                EncodeError::MissingCapture { .. } => {
                    self.sema
                        .reporter
                        .internal("instruction encoding is missing a captured operand", location);
                }
            }
            return;
        }

        if let Err(error) = self.sema.banks[bank].write(&buffer) {
            self.sema.report_bank_error(error, location);
        }
    }

    fn emit_var(&mut self, def: ember_ast::DefId, current: Option<BankId>, location: SourceLocation) {
        let Some(bank) = current else { return };
        let initializer = self.sema.defs.var(def).initializer.clone();
        let Some(initializer) = initializer else { return };

        // Link-time initializers (address tables) resolve now.
        let Some(reduced) = self.sema.reduce_expression(&initializer) else { return };
        let Some(bytes) = self.serialize_constant_initializer(&reduced, location) else {
            return;
        };

        let explicit = self
            .sema
            .defs
            .var(def)
            .address
            .as_ref()
            .and_then(|address| address.absolute_position);
        let allocated_here = self.sema.banks[bank].absolute_position() == explicit;

        if let Some(address) = explicit {
            if !allocated_here {
                let saved = self.sema.banks[bank].relative_position();
                if self.sema.banks[bank].absolute_seek(address).is_ok() {
                    if let Err(error) = self.sema.banks[bank].write(&bytes) {
                        self.sema.report_bank_error(error, location);
                    }
                }
                self.sema.banks[bank].set_relative_position(saved);
                return;
            }
        }

        if let Err(error) = self.sema.banks[bank].write(&bytes) {
            self.sema.report_bank_error(error, location);
        }
    }
}

/// Whether an operand still carries a link-time placeholder integer.
fn contains_placeholder(operand: &ember_ir::InstructionOperand) -> bool {
    use ember_ir::InstructionOperand as Op;
    match operand {
        Op::Integer { placeholder, .. } => *placeholder,
        Op::Register(_) | Op::Boolean(_) => false,
        Op::Dereference { operand, .. } | Op::Unary(_, operand) => contains_placeholder(operand),
        Op::Index { operand, subscript, .. } | Op::BitIndex { operand, subscript } => {
            contains_placeholder(operand) || contains_placeholder(subscript)
        }
        Op::Binary(_, left, right) => contains_placeholder(left) || contains_placeholder(right),
    }
}
