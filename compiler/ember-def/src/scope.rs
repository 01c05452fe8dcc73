//! Hierarchical symbol tables. Scopes form a forest via `parent`; each
//! scope additionally carries a list of recursively-imported scopes that
//! participate in lookup. Imports may form a DAG, so every transitive
//! search tracks visited scopes.

use ember_ast::DefId;
use ember_source::identifier::Identifier;
use ember_utils::{
    fxhash::FxHashSet,
    index_vec::{index_vec, IndexVec},
};
use indexmap::IndexMap;

use crate::ScopeId;

/// One namespace level: named members plus recursive imports.
#[derive(Debug)]
pub struct Scope {
    pub name: Option<Identifier>,
    pub parent: Option<ScopeId>,
    members: IndexMap<Identifier, DefId>,
    imports: Vec<ScopeId>,
}

impl Scope {
    fn new(name: Option<Identifier>, parent: Option<ScopeId>) -> Self {
        Self { name, parent, members: IndexMap::new(), imports: Vec::new() }
    }

    pub fn members(&self) -> impl Iterator<Item = (Identifier, DefId)> + '_ {
        self.members.iter().map(|(name, def)| (*name, *def))
    }

    pub fn imports(&self) -> &[ScopeId] {
        &self.imports
    }
}

/// Grow-only store of every scope in the compile.
#[derive(Debug, Default)]
pub struct ScopeStore {
    scopes: IndexVec<ScopeId, Scope>,
}

impl ScopeStore {
    pub fn new() -> Self {
        Self { scopes: index_vec![] }
    }

    pub fn add(&mut self, name: Option<Identifier>, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.push(Scope::new(name, parent))
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    /// Insert a member; `Err` carries the previously-declared definition
    /// when the name collides locally.
    pub fn insert_member(
        &mut self,
        scope: ScopeId,
        name: Identifier,
        def: DefId,
    ) -> Result<(), DefId> {
        if let Some(existing) = self.scopes[scope].members.get(&name) {
            return Err(*existing);
        }
        self.scopes[scope].members.insert(name, def);
        Ok(())
    }

    /// Replace-or-insert, used for parameter rebinding in inline sites.
    pub fn insert_or_replace_member(&mut self, scope: ScopeId, name: Identifier, def: DefId) {
        self.scopes[scope].members.insert(name, def);
    }

    /// Link `import` as a recursive import of `scope`. Importing a scope
    /// into itself is rejected; duplicate links are collapsed.
    pub fn add_recursive_import(&mut self, scope: ScopeId, import: ScopeId) {
        if scope == import {
            return;
        }
        if !self.scopes[scope].imports.contains(&import) {
            self.scopes[scope].imports.push(import);
        }
    }

    /// `findLocalMemberDefinition`: the scope's own members only.
    pub fn find_local_member(&self, scope: ScopeId, name: Identifier) -> Option<DefId> {
        self.scopes[scope].members.get(&name).copied()
    }

    /// `findImportedMemberDefinitions`: the scope's members plus every
    /// transitively imported scope's members. All candidates are returned
    /// (deduplicated) so callers can detect ambiguity.
    pub fn find_imported_members(&self, scope: ScopeId, name: Identifier) -> Vec<DefId> {
        let mut results = Vec::new();
        let mut visited = FxHashSet::default();
        self.collect_imported(scope, name, &mut visited, &mut results);
        results
    }

    fn collect_imported(
        &self,
        scope: ScopeId,
        name: Identifier,
        visited: &mut FxHashSet<ScopeId>,
        results: &mut Vec<DefId>,
    ) {
        if !visited.insert(scope) {
            return;
        }

        if let Some(def) = self.find_local_member(scope, name) {
            if !results.contains(&def) {
                results.push(def);
            }
        }

        for import in self.scopes[scope].imports.clone() {
            self.collect_imported(import, name, visited, results);
        }
    }

    /// `findUnqualifiedDefinitions`: search the given scope, then walk
    /// outward through parents, including imports at every level. The
    /// innermost scope with any candidate wins.
    pub fn find_unqualified(&self, scope: ScopeId, name: Identifier) -> Vec<DefId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let found = self.find_imported_members(id, name);
            if !found.is_empty() {
                return found;
            }
            current = self.scopes[id].parent;
        }
        Vec::new()
    }

    /// The dotted path of a scope, for diagnostics.
    pub fn qualified_name(&self, scope: ScopeId) -> String {
        let mut pieces = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(name) = self.scopes[id].name {
                pieces.push(name.name());
            }
            current = self.scopes[id].parent;
        }
        pieces.reverse();
        pieces.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Identifier {
        Identifier::from(name)
    }

    #[test]
    fn local_insert_and_duplicate() {
        let mut scopes = ScopeStore::new();
        let root = scopes.add(None, None);
        let def = DefId::from_raw(0);

        assert!(scopes.insert_member(root, ident("vblank"), def).is_ok());
        assert_eq!(scopes.insert_member(root, ident("vblank"), DefId::from_raw(1)), Err(def));
        assert_eq!(scopes.find_local_member(root, ident("vblank")), Some(def));
    }

    #[test]
    fn unqualified_lookup_walks_outward() {
        let mut scopes = ScopeStore::new();
        let root = scopes.add(None, None);
        let inner = scopes.add(Some(ident("gfx")), Some(root));

        let outer_def = DefId::from_raw(0);
        scopes.insert_member(root, ident("frame"), outer_def).unwrap();

        assert_eq!(scopes.find_unqualified(inner, ident("frame")), vec![outer_def]);
    }

    #[test]
    fn shadowing_prefers_the_innermost_scope() {
        let mut scopes = ScopeStore::new();
        let root = scopes.add(None, None);
        let inner = scopes.add(None, Some(root));

        scopes.insert_member(root, ident("x"), DefId::from_raw(0)).unwrap();
        scopes.insert_member(inner, ident("x"), DefId::from_raw(1)).unwrap();

        assert_eq!(scopes.find_unqualified(inner, ident("x")), vec![DefId::from_raw(1)]);
    }

    #[test]
    fn imported_lookup_collects_all_candidates() {
        let mut scopes = ScopeStore::new();
        let root = scopes.add(None, None);
        let lib_a = scopes.add(Some(ident("a")), None);
        let lib_b = scopes.add(Some(ident("b")), None);

        scopes.insert_member(lib_a, ident("init"), DefId::from_raw(0)).unwrap();
        scopes.insert_member(lib_b, ident("init"), DefId::from_raw(1)).unwrap();
        scopes.add_recursive_import(root, lib_a);
        scopes.add_recursive_import(root, lib_b);

        let found = scopes.find_imported_members(root, ident("init"));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn import_cycles_terminate() {
        let mut scopes = ScopeStore::new();
        let a = scopes.add(None, None);
        let b = scopes.add(None, None);

        scopes.add_recursive_import(a, b);
        scopes.add_recursive_import(b, a);
        scopes.insert_member(b, ident("deep"), DefId::from_raw(3)).unwrap();

        assert_eq!(scopes.find_imported_members(a, ident("deep")), vec![DefId::from_raw(3)]);
    }

    #[test]
    fn self_import_is_ignored() {
        let mut scopes = ScopeStore::new();
        let a = scopes.add(None, None);
        scopes.add_recursive_import(a, a);
        assert!(scopes.get(a).imports().is_empty());
    }
}
