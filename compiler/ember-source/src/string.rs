//! The global string-literal pool. Source string literals are byte strings
//! (they decay to `[u8; n]`), so the pool stores raw bytes. `embed` file
//! contents are interned here as well, memoized by the import manager.

use std::{fmt, sync::RwLock};

use ember_utils::{fxhash::FxHashMap, lazy_static::lazy_static};

/// An interned byte-string literal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InternedStr(u32);

struct StringPool {
    lookup: FxHashMap<Vec<u8>, u32>,
    values: Vec<Vec<u8>>,
}

lazy_static! {
    static ref POOL: RwLock<StringPool> =
        RwLock::new(StringPool { lookup: FxHashMap::default(), values: Vec::new() });
}

impl InternedStr {
    pub fn intern(bytes: &[u8]) -> Self {
        let mut pool = POOL.write().unwrap();
        if let Some(index) = pool.lookup.get(bytes) {
            return InternedStr(*index);
        }

        let index = pool.values.len() as u32;
        pool.values.push(bytes.to_vec());
        pool.lookup.insert(bytes.to_vec(), index);
        InternedStr(index)
    }

    pub fn bytes(self) -> Vec<u8> {
        POOL.read().unwrap().values[self.0 as usize].clone()
    }

    pub fn len(self) -> usize {
        POOL.read().unwrap().values[self.0 as usize].len()
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for InternedStr {
    fn from(value: &str) -> Self {
        InternedStr::intern(value.as_bytes())
    }
}

impl fmt::Display for InternedStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_bytes_round_trip() {
        let s = InternedStr::intern(b"Hi\n\0");
        assert_eq!(s.bytes(), b"Hi\n\0");
        assert_eq!(s.len(), 4);
        assert_eq!(s, InternedStr::intern(b"Hi\n\0"));
    }
}
