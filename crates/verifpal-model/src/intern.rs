//! Constant name interning.
//!
//! Every distinct constant name maps to a dense [`ConstantId`]. `g` and `nil`
//! are seeded first so their ids are fixed. The table is append-only and safe
//! to share between threads.

use crate::value::{Constant, ConstantId, G_ID, NIL_ID};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug)]
pub struct Interner {
    ids: DashMap<Arc<str>, ConstantId>,
    names: RwLock<Vec<Arc<str>>>,
}

impl Interner {
    pub fn new() -> Self {
        let interner = Self {
            ids: DashMap::new(),
            names: RwLock::new(Vec::new()),
        };
        let g = interner.intern("g");
        let nil = interner.intern("nil");
        debug_assert_eq!((g, nil), (G_ID, NIL_ID));
        interner
    }

    /// Id of `name`, allocating one on first sight.
    pub fn intern(&self, name: &str) -> ConstantId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let name: Arc<str> = Arc::from(name);
        *self.ids.entry(name.clone()).or_insert_with(|| {
            let mut names = self.names.write();
            names.push(name);
            (names.len() - 1) as ConstantId
        })
    }

    pub fn get(&self, name: &str) -> Option<ConstantId> {
        self.ids.get(name).map(|id| *id)
    }

    pub fn name(&self, id: ConstantId) -> Option<Arc<str>> {
        self.names.read().get(id as usize).cloned()
    }

    /// A bare constant reference for `name`.
    pub fn constant(&self, name: &str) -> Constant {
        let id = self.intern(name);
        let name = self.name(id).unwrap_or_else(|| Arc::from(name));
        Constant::reference(name, id)
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_seeded() {
        let interner = Interner::new();
        assert_eq!(interner.get("g"), Some(G_ID));
        assert_eq!(interner.get("nil"), Some(NIL_ID));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn test_intern_is_stable() {
        let interner = Interner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        assert_ne!(a, b);
        assert_eq!(interner.intern("a"), a);
        assert_eq!(interner.name(b).as_deref(), Some("b"));
        assert_eq!(interner.constant("a").id, a);
    }

    #[test]
    fn test_concurrent_interning() {
        let interner = Arc::new(Interner::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let interner = Arc::clone(&interner);
                std::thread::spawn(move || (0..50).map(|i| interner.intern(&format!("c{i}"))).collect::<Vec<_>>())
            })
            .collect();
        let results: Vec<Vec<ConstantId>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(interner.len(), 52);
    }
}
