//! Dotted-identifier resolution over the scope store.

use ember_ast::DefId;
use ember_def::DefKind;
use ember_source::{
    identifier::{join_pieces, Identifier},
    SourceLocation,
};

use crate::Sema;

impl Sema {
    /// Resolve a dotted path starting from the current scope.
    ///
    /// The first piece is searched unqualified (local scope, then outward
    /// through parents, including transitive imports at each level); every
    /// subsequent piece requires the previous result to be a namespace and
    /// searches its environment. The final piece must name exactly one
    /// non-namespace definition.
    pub fn resolve_identifier(
        &mut self,
        pieces: &[Identifier],
        location: SourceLocation,
    ) -> Option<DefId> {
        if pieces.is_empty() {
            self.reporter.internal("empty identifier path", location);
            return None;
        }

        let mut candidates = self.scopes.find_unqualified(self.current_scope(), pieces[0]);

        for (index, piece) in pieces.iter().enumerate() {
            if index > 0 {
                // Every piece after the first looks inside the namespace the
                // previous step produced.
                let namespace = candidates[0];
                let environment = match &self.defs.get(namespace).kind {
                    DefKind::Namespace(def) => def.environment,
                    DefKind::Enum(def) => def.environment,
                    kind => {
                        let described = kind.describe();
                        self.reporter.error(
                            format!(
                                "`{}` is a {described}, not a namespace",
                                join_pieces(&pieces[..index])
                            ),
                            location,
                        );
                        return None;
                    }
                };
                candidates = self.scopes.find_imported_members(environment, *piece);
            }

            let consumed = join_pieces(&pieces[..=index]);
            match candidates.len() {
                0 => {
                    self.reporter.error(format!("could not resolve `{consumed}`"), location);
                    return None;
                }
                1 => {}
                _ => {
                    let conflicts: Vec<_> = candidates
                        .iter()
                        .map(|def| self.defs.get(*def).location)
                        .collect();
                    let report = self
                        .reporter
                        .error(format!("reference to `{consumed}` is ambiguous"), location);
                    for conflict in conflicts {
                        report.add_labelled_span(conflict, "could refer to this declaration");
                    }
                    return None;
                }
            }
        }

        let result = candidates[0];
        if matches!(self.defs.get(result).kind, DefKind::Namespace(_)) {
            self.reporter.error(
                format!(
                    "could not resolve `{}`: the path names a namespace, not a definition",
                    join_pieces(pieces)
                ),
                location,
            );
            return None;
        }
        Some(result)
    }
}
