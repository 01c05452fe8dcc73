//! IR emission: the final AST walk. Statements become a flat list of
//! [IrNode]s; run-time expressions are handed to the instruction selector,
//! which queries the platform's pattern table and applies the usual
//! two-operand/three-operand rewrites when a direct match fails.

pub mod branch;
pub mod inline;
pub mod operand;
pub mod select;
pub mod stmt;

use ember_ast::{op::BranchKind, DefId};
use ember_def::{DefKind, FuncDef, ScopeId};
use ember_ir::{IrNode, IrNodeKind};
use ember_sema::Sema;
use ember_source::{identifier::Identifier, SourceLocation};
use ember_utils::counter;

counter! {
    name: LabelSeq,
    counter_name: LABEL_SEQ,
}

/// The function context a statement is being emitted inside: a real
/// function with a return convention, or an inline expansion where
/// `return` jumps to a synthesized label instead.
#[derive(Debug, Clone, Copy)]
pub enum FuncFrame {
    Real(DefId),
    Inline { func: DefId, return_label: DefId },
}

/// Loop labels the current `continue`/`break` statements target.
#[derive(Debug, Clone, Copy)]
pub struct LoopLabels {
    pub begin: DefId,
    pub end: DefId,
}

/// Walks the AST and appends IR nodes, consulting [Sema] for reduction
/// and the platform instruction table for selection.
pub struct IrBuilder<'a> {
    pub sema: &'a mut Sema,
    pub ir: Vec<IrNode>,

    /// The current CPU mode mask, driven by mode attributes.
    mode: u32,
    func_stack: Vec<FuncFrame>,
    loop_stack: Vec<LoopLabels>,
}

impl<'a> IrBuilder<'a> {
    pub fn new(sema: &'a mut Sema) -> Self {
        Self { sema, ir: Vec::new(), mode: 0, func_stack: Vec::new(), loop_stack: Vec::new() }
    }

    /// Lower a whole program. Returns whether the compile may continue
    /// into layout.
    pub fn emit_program(&mut self, program: &ember_ast::Stmt) -> bool {
        self.emit_statement_ir(program);
        self.sema.reporter.validate()
    }

    pub fn finish(self) -> Vec<IrNode> {
        self.ir
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub(crate) fn push_node(&mut self, kind: IrNodeKind, location: SourceLocation) {
        self.ir.push(IrNode::new(kind, location));
    }

    pub(crate) fn enter_scope<R>(
        &mut self,
        scope: ScopeId,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.sema.push_scope(scope);
        let result = f(self);
        self.sema.pop_scope();
        result
    }

    pub(crate) fn enter_func_frame<R>(
        &mut self,
        frame: FuncFrame,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let func = match frame {
            FuncFrame::Real(func) | FuncFrame::Inline { func, .. } => func,
        };
        let saved = self.sema.push_function(func);
        self.func_stack.push(frame);
        let result = f(self);
        self.func_stack.pop();
        self.sema.pop_function(saved);
        result
    }

    pub(crate) fn current_frame(&self) -> Option<FuncFrame> {
        self.func_stack.last().copied()
    }

    pub(crate) fn enter_loop<R>(
        &mut self,
        labels: LoopLabels,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.loop_stack.push(labels);
        let result = f(self);
        self.loop_stack.pop();
        result
    }

    pub(crate) fn current_loop(&self) -> Option<LoopLabels> {
        self.loop_stack.last().copied()
    }

    pub(crate) fn with_mode<R>(&mut self, mask: u32, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = self.mode;
        self.mode |= mask;
        let result = f(self);
        self.mode = saved;
        result
    }

    /// Create an anonymous label definition for synthesized control flow.
    /// It never enters a scope, so it cannot collide with user names.
    pub(crate) fn synthesize_label(&mut self, location: SourceLocation) -> DefId {
        let name = Identifier::from(format!("$label{}", LabelSeq::new().0));
        let scope = self.sema.current_scope();
        self.sema.defs.add(ember_def::Definition {
            name,
            kind: DefKind::Func(FuncDef {
                inlined: false,
                far: false,
                is_label: true,
                return_kind: BranchKind::None,
                parameters: Vec::new(),
                return_type_expr: None,
                signature: None,
                body: Vec::new(),
                environment: scope,
                fallthrough: false,
                has_unconditional_return: false,
                address: None,
            }),
            location,
            parent_scope: scope,
        })
    }

    pub(crate) fn place_label(&mut self, label: DefId, location: SourceLocation) {
        self.push_node(IrNodeKind::Label(label), location);
    }
}
