//! The global identifier interner. Identifiers are cheap `Copy` handles
//! into an append-only pool; interned names are stable for the lifetime of
//! the process.

use std::{fmt, sync::RwLock};

use ember_utils::{fxhash::FxHashMap, lazy_static::lazy_static};

/// An interned identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(u32);

struct IdentifierMap {
    lookup: FxHashMap<String, u32>,
    names: Vec<String>,
}

impl IdentifierMap {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(index) = self.lookup.get(name) {
            return *index;
        }

        let index = self.names.len() as u32;
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), index);
        index
    }
}

lazy_static! {
    static ref IDENTS: RwLock<IdentifierMap> =
        RwLock::new(IdentifierMap { lookup: FxHashMap::default(), names: Vec::new() });
}

impl Identifier {
    /// Read the interned name. The pool is append-only, so a clone of the
    /// stored string is returned rather than holding the lock open.
    pub fn name(self) -> String {
        IDENTS.read().unwrap().names[self.0 as usize].clone()
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(IDENTS.write().unwrap().intern(name))
    }
}

impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::from(name.as_str())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Join dotted identifier pieces back into their source form, e.g. for
/// "unresolved name" diagnostics that include only the consumed pieces.
pub fn join_pieces(pieces: &[Identifier]) -> String {
    pieces.iter().map(|piece| piece.name()).collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let a = Identifier::from("nmi_handler");
        let b = Identifier::from("nmi_handler");
        let c = Identifier::from("irq_handler");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.name(), "nmi_handler");
    }

    #[test]
    fn pieces_join_dotted() {
        let pieces = [Identifier::from("hardware"), Identifier::from("ppu")];
        assert_eq!(join_pieces(&pieces), "hardware.ppu");
    }
}
