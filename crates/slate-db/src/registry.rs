use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use slate_reactive::NullReactivity;
use slate_store::MemoryStore;

use crate::collection::Collection;

/// A named set of collections, mirroring how a host application keeps one
/// collection per model name. Collections are `Rc`-backed and therefore not
/// `Send`, so the registry is thread-local rather than a process-wide
/// `static` — each thread gets its own, which matches this engine's
/// single-threaded execution model.
pub struct Registry<S = MemoryStore, R: slate_reactive::ReactivityAdapter = NullReactivity> {
    collections: Rc<RefCell<HashMap<String, Collection<S, R>>>>,
}

impl<S, R: slate_reactive::ReactivityAdapter> Clone for Registry<S, R> {
    fn clone(&self) -> Self {
        Self {
            collections: Rc::clone(&self.collections),
        }
    }
}

impl<S, R: slate_reactive::ReactivityAdapter> Default for Registry<S, R> {
    fn default() -> Self {
        Self {
            collections: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl<S, R: slate_reactive::ReactivityAdapter> Registry<S, R> {
    /// A fresh, isolated registry — for tests that don't want to share
    /// state with the thread's default registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Collection<S, R>> {
        self.collections.borrow().get(name).cloned()
    }

    /// Returns the named collection, creating it with `make` if absent.
    pub fn get_or_create(&self, name: &str, make: impl FnOnce() -> Collection<S, R>) -> Collection<S, R> {
        if let Some(existing) = self.get(name) {
            return existing;
        }
        let collection = make();
        self.collections
            .borrow_mut()
            .insert(name.to_string(), collection.clone());
        collection
    }

    pub fn remove(&self, name: &str) -> Option<Collection<S, R>> {
        self.collections.borrow_mut().remove(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.collections.borrow().keys().cloned().collect()
    }
}

thread_local! {
    static DEFAULT_REGISTRY: Registry<MemoryStore, NullReactivity> = Registry::default();
}

/// The thread's default registry of `MemoryStore`-backed, non-reactive
/// collections. Most applications only ever need this one.
pub fn default_registry() -> Registry<MemoryStore, NullReactivity> {
    DEFAULT_REGISTRY.with(|r| r.clone())
}
