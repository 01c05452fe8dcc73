//! The semantic middle-end of the Ember compiler. The [Sema] context owns
//! every grow-only pool (definitions, types, scopes, banks, the platform's
//! instruction table) and all the strictly-LIFO state the phases thread
//! through the AST:
//!
//! - name resolution over hierarchical scopes with transitive imports,
//! - the three-phase definition resolver (reserve, type-resolve,
//!   storage-reserve),
//! - the expression reducer, which classifies every expression as
//!   compile-time, link-time or run-time and constant-folds aggressively.

pub mod platform;
pub mod reduce;
pub mod reserve;
pub mod resolve;
pub mod storage;
pub mod types;

use std::rc::Rc;

use ember_ast::{expr::Expr, DefId, TyId};
use ember_def::{
    Bank, BankId, DefKind, DefStore, Definition, LetDef, LetKind, ScopeId, ScopeStore, Ty, TyStore,
};
use ember_ir::InstructionTable;
use ember_reporting::Reporter;
use ember_source::{
    identifier::Identifier, string::InternedStr, SourceId, SourceLocation, SourceMap, Span,
};
use ember_utils::{fxhash::FxHashMap, index_vec::IndexVec, itertools::Itertools, log};

pub use platform::Platform;

/// Evaluating a `let` body more than this many frames deep is reported as
/// runaway recursion.
pub const LET_RECURSION_LIMIT: usize = 128;

/// The semantic context for one compile.
pub struct Sema {
    pub sources: SourceMap,
    pub reporter: Reporter,
    pub defs: DefStore,
    pub tys: TyStore,
    pub scopes: ScopeStore,
    pub banks: IndexVec<BankId, Bank>,
    pub instructions: InstructionTable,

    platform: Option<Rc<dyn Platform>>,

    /// The root scope holding builtin definitions; every file scope hangs
    /// off this.
    builtin_scope: ScopeId,

    /// Driver-injected defines consulted by `has_def`/`get_def`.
    defines: FxHashMap<Identifier, Expr>,
    /// Accumulated `config { ... }` entries.
    pub config: FxHashMap<Identifier, Expr>,

    /// Registered module scopes, for `import` re-linking.
    modules: FxHashMap<Identifier, ScopeId>,
    /// `embed` results memoized by canonical path.
    embeds: FxHashMap<std::path::PathBuf, InternedStr>,

    /// Mode attribute names registered by the platform, with the mode bits
    /// they enable.
    mode_attributes: FxHashMap<Identifier, u32>,

    // Strictly LIFO phase state. Pushes always go through the `enter_*`
    // combinators so unwinding on error paths stays balanced.
    scope_stack: Vec<ScopeId>,
    current_bank: Option<BankId>,
    let_stack: Vec<(Identifier, SourceLocation)>,
    enclosing_function: Option<DefId>,

    /// Worklist consumed by resolver phase R2.
    pub(crate) definitions_to_resolve: Vec<DefId>,

    /// Guard against self-referential type aliases.
    aliases_in_progress: Vec<DefId>,
}

impl Sema {
    pub fn new(sources: SourceMap) -> Self {
        let mut scopes = ScopeStore::new();
        let builtin_scope = scopes.add(None, None);

        let mut sema = Self {
            sources,
            reporter: Reporter::new(),
            defs: DefStore::new(),
            tys: TyStore::new(),
            scopes,
            banks: IndexVec::new(),
            instructions: InstructionTable::new(),
            platform: None,
            builtin_scope,
            defines: FxHashMap::default(),
            config: FxHashMap::default(),
            modules: FxHashMap::default(),
            embeds: FxHashMap::default(),
            mode_attributes: FxHashMap::default(),
            scope_stack: vec![builtin_scope],
            current_bank: None,
            let_stack: Vec::new(),
            enclosing_function: None,
            definitions_to_resolve: Vec::new(),
            aliases_in_progress: Vec::new(),
        };
        sema.seed_builtins();
        sema
    }

    /// Definitions every platform shares: the `bool` type and the
    /// `has_def`/`get_def` compile-time intrinsics.
    fn seed_builtins(&mut self) {
        let location = self.builtin_location();
        self.create_definition(
            Identifier::from("bool"),
            DefKind::BuiltinBoolType,
            location,
        );
        self.create_definition(
            Identifier::from("has_def"),
            DefKind::Let(LetDef {
                kind: LetKind::HasDef,
                parameters: vec![Identifier::from("key")],
                body: None,
            }),
            location,
        );
        self.create_definition(
            Identifier::from("get_def"),
            DefKind::Let(LetDef {
                kind: LetKind::GetDef,
                parameters: vec![Identifier::from("key"), Identifier::from("fallback")],
                body: None,
            }),
            location,
        );
    }

    /// A location for definitions that have no source text behind them.
    pub fn builtin_location(&self) -> SourceLocation {
        SourceLocation::new(Span::empty(), SourceId::from_raw(0))
    }

    /// Install the platform after it has seeded its definitions.
    pub fn install_platform(&mut self, platform: Rc<dyn Platform>) {
        self.platform = Some(platform);
    }

    pub fn platform(&self) -> Rc<dyn Platform> {
        self.platform.clone().expect("no platform installed")
    }

    pub fn builtin_scope(&self) -> ScopeId {
        self.builtin_scope
    }

    pub fn add_define(&mut self, name: Identifier, value: Expr) {
        self.defines.insert(name, value);
    }

    pub fn define(&self, name: Identifier) -> Option<&Expr> {
        self.defines.get(&name)
    }

    pub fn register_mode_attribute(&mut self, name: Identifier, mask: u32) {
        self.mode_attributes.insert(name, mask);
    }

    pub fn mode_attribute(&self, name: Identifier) -> Option<u32> {
        self.mode_attributes.get(&name).copied()
    }

    // --- scope state -----------------------------------------------------

    pub fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack is empty")
    }

    /// Run `f` with `scope` as the current scope; restored on every return
    /// path.
    pub fn enter_scope<R>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> R) -> R {
        self.push_scope(scope);
        let result = f(self);
        self.pop_scope();
        result
    }

    /// Raw scope-stack access for callers that wrap [Sema] in their own
    /// context (the IR builder); pushes and pops must stay balanced.
    pub fn push_scope(&mut self, scope: ScopeId) {
        self.scope_stack.push(scope);
    }

    pub fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    /// Run `f` with `function` as the enclosing function.
    pub fn enter_function<R>(
        &mut self,
        function: DefId,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let saved = self.push_function(function);
        let result = f(self);
        self.pop_function(saved);
        result
    }

    pub fn push_function(&mut self, function: DefId) -> Option<DefId> {
        self.enclosing_function.replace(function)
    }

    pub fn pop_function(&mut self, saved: Option<DefId>) {
        self.enclosing_function = saved;
    }

    pub fn enclosing_function(&self) -> Option<DefId> {
        self.enclosing_function
    }

    // --- bank state ------------------------------------------------------

    pub fn current_bank(&self) -> Option<BankId> {
        self.current_bank
    }

    /// Run `f` with `bank` active. The previously active bank and its
    /// relative position are restored afterwards, on both normal and error
    /// exit; this is the `in` statement's LIFO discipline.
    pub fn enter_bank<R>(
        &mut self,
        bank: BankId,
        address: Option<u32>,
        location: SourceLocation,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let saved = self.current_bank.map(|id| (id, self.banks[id].relative_position()));
        self.current_bank = Some(bank);

        if let Some(address) = address {
            if let Err(error) = self.banks[bank].absolute_seek(address) {
                self.report_bank_error(error, location);
            }
        }

        let result = f(self);

        self.current_bank = saved.map(|(id, _)| id);
        if let Some((id, position)) = saved {
            self.banks[id].set_relative_position(position);
        }
        result
    }

    pub fn report_bank_error(&mut self, error: ember_def::BankError, location: SourceLocation) {
        match error {
            ember_def::BankError::Overflow { requested, available } => {
                self.reporter.error(
                    format!(
                        "bank overflow: needed {requested} byte(s) but only {available} remain"
                    ),
                    location,
                );
            }
            ember_def::BankError::SeekOutsideRange { address } => {
                self.reporter.error(
                    format!("address ${address:X} is outside of the bank's range"),
                    location,
                );
            }
            ember_def::BankError::NotStored => {
                self.reporter.error(
                    "cannot emit data into a bank that stores no bytes",
                    location,
                );
            }
        }
    }

    // --- let evaluation state --------------------------------------------

    /// Push a `let` evaluation frame. When the depth limit is hit, a fatal
    /// diagnostic with the full evaluation trace is produced and `false`
    /// is returned.
    pub fn enter_let(&mut self, name: Identifier, location: SourceLocation) -> bool {
        if self.let_stack.len() >= LET_RECURSION_LIMIT {
            let frames: Vec<String> = self
                .let_stack
                .iter()
                .enumerate()
                .rev()
                .map(|(index, (frame_name, frame_location))| {
                    format!(
                        "#{index} — {} in expression `{frame_name}`",
                        self.sources.describe(*frame_location)
                    )
                })
                .collect();

            let report = self.reporter.fatal(
                format!(
                    "evaluation of `{name}` exceeded the recursion limit of {LET_RECURSION_LIMIT}"
                ),
                location,
            );
            for frame in frames {
                report.add_note(frame);
            }
            return false;
        }
        self.let_stack.push((name, location));
        true
    }

    pub fn exit_let(&mut self) {
        self.let_stack.pop();
    }

    // --- definitions ------------------------------------------------------

    /// Create a definition in the current scope, reporting `DuplicateName`
    /// on local collision. The definition is created either way so later
    /// phases have something to point at.
    pub fn create_definition(
        &mut self,
        name: Identifier,
        kind: DefKind,
        location: SourceLocation,
    ) -> DefId {
        let scope = self.current_scope();
        let def = self.defs.add(Definition { name, kind, location, parent_scope: scope });

        if let Err(existing) = self.scopes.insert_member(scope, name, def) {
            let existing_location = self.defs.get(existing).location;
            self.reporter
                .error(format!("redefinition of `{name}`"), location)
                .add_labelled_span(existing_location, "previously defined here");
        }
        def
    }

    /// Register a module's scope so later `import` statements can re-link
    /// it.
    pub fn register_module(&mut self, name: Identifier, scope: ScopeId) {
        self.modules.insert(name, scope);
    }

    pub fn module_scope(&self, name: Identifier) -> Option<ScopeId> {
        self.modules.get(&name).copied()
    }

    // --- embeds -----------------------------------------------------------

    /// Read and intern a file for `embed`, memoized per canonical path.
    pub fn embed_file(
        &mut self,
        path: &str,
        location: SourceLocation,
    ) -> Option<InternedStr> {
        let canonical = std::path::Path::new(path)
            .canonicalize()
            .unwrap_or_else(|_| std::path::PathBuf::from(path));

        if let Some(interned) = self.embeds.get(&canonical) {
            return Some(*interned);
        }

        match std::fs::read(&canonical) {
            Ok(bytes) => {
                let interned = InternedStr::intern(&bytes);
                self.embeds.insert(canonical, interned);
                Some(interned)
            }
            Err(error) => {
                self.reporter
                    .error(format!("could not embed file `{path}`: {error}"), location);
                None
            }
        }
    }

    // --- type helpers -----------------------------------------------------

    /// The byte size of a builtin integer definition.
    pub fn int_size(&self, def: DefId) -> usize {
        self.defs.int_type(def).size
    }

    /// The inclusive value bounds of an integer-like type, when bounded.
    pub fn ty_bounds(&self, ty: TyId) -> Option<(i128, i128)> {
        match self.tys.get(self.tys.value_ty(ty)) {
            Ty::Int(def) => {
                let int = self.defs.int_type(*def);
                Some((int.min, int.max))
            }
            Ty::Enum(def) => {
                let underlying = match &self.defs.get(*def).kind {
                    DefKind::Enum(e) => e.underlying?,
                    _ => return None,
                };
                self.ty_bounds(underlying)
            }
            _ => None,
        }
    }

    /// Whether a type accepts integer arithmetic.
    pub fn is_integer_ty(&self, ty: TyId) -> bool {
        matches!(self.tys.get(self.tys.value_ty(ty)), Ty::IExpr | Ty::Int(_))
    }

    /// A printable name for a resolved type, for diagnostics.
    pub fn describe_ty(&self, ty: TyId) -> String {
        match self.tys.get(ty) {
            Ty::Void => "void".into(),
            Ty::IExpr => "iexpr".into(),
            Ty::Bool => "bool".into(),
            Ty::Int(def) | Ty::Enum(def) | Ty::Struct(def) | Ty::Bank(def) => {
                self.defs.get(*def).name.name()
            }
            Ty::Range => "range".into(),
            Ty::Array { element, length } => match length {
                Some(length) => format!("[{}; {length}]", self.describe_ty(*element)),
                None => format!("[{}]", self.describe_ty(*element)),
            },
            Ty::Pointer { element, qualifiers } => {
                let mut prefix = String::new();
                if qualifiers.contains(ember_ast::ty::PtrQualifiers::FAR) {
                    prefix.push_str("far ");
                }
                prefix.push('*');
                if qualifiers.contains(ember_ast::ty::PtrQualifiers::CONST) {
                    prefix.push_str("const ");
                }
                if qualifiers.contains(ember_ast::ty::PtrQualifiers::WRITE_ONLY) {
                    prefix.push_str("writeonly ");
                }
                format!("{prefix}{}", self.describe_ty(*element))
            }
            Ty::Function(sig) => {
                let params =
                    sig.parameters.iter().map(|param| self.describe_ty(*param)).join(", ");
                format!("func({params}) -> {}", self.describe_ty(sig.return_type))
            }
            Ty::Tuple(elements) => {
                let inner =
                    elements.iter().map(|element| self.describe_ty(*element)).join(", ");
                format!("({inner})")
            }
            Ty::Designated { element, .. } => {
                format!("{} in <storage>", self.describe_ty(*element))
            }
        }
    }

    /// Run the resolver phases over a program, then hand back whether the
    /// compile may continue into lowering.
    pub fn resolve_program(&mut self, program: &ember_ast::Stmt) -> bool {
        log::debug!("phase R1: reserving definitions");
        self.reserve_definitions(program);
        if !self.reporter.validate() {
            return false;
        }

        log::debug!("phase R2: resolving definition types");
        self.resolve_definition_types();
        if !self.reporter.validate() {
            return false;
        }

        log::debug!("phase R3: reserving variable storage");
        self.reserve_variable_storage(program);
        self.reporter.validate()
    }
}
