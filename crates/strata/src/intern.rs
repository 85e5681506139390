//! String interning for identifiers, module paths, and annotation names.
//!
//! Scaled down from the teacher's `StringId`/`Interns` design in
//! `intern.rs`: one dense interner, no ASCII fast path (the frontend never
//! sees enough distinct one-character identifiers to justify it) and no
//! static-string table (the Source has no builtin-name surface the way
//! Python does). `NameId` is an index into a backing `Vec<String>`, kept
//! small (`u32`) for the same reason the teacher keeps `StringId` a `u32`:
//! fact tables are keyed by these ids by the million in a large program.

use ahash::AHashMap;

/// Index into an [`Interner`]'s storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct NameId(u32);

impl NameId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Deduplicating string table. Owns every interned string for the lifetime
/// of the compilation; entries are never removed (AST nodes hold `NameId`s
/// for their whole lifetime, including inside monomorphized clones).
#[derive(Debug, Default)]
pub struct Interner {
    strings: Vec<String>,
    lookup: AHashMap<String, NameId>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> NameId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = NameId(u32::try_from(self.strings.len()).expect("interner overflowed u32"));
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), id);
        id
    }

    pub fn resolve(&self, id: NameId) -> &str {
        &self.strings[id.index()]
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_the_same_string_twice_returns_the_same_id() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("foo");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "foo");
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        assert_ne!(a, b);
    }
}
