use std::cell::{Cell, RefCell};

use bson::Document;
use slate_query::{Query, QueryOptions, Selector};
use slate_reactive::{Dependency, ReactivityAdapter};
use slate_store::StorageAdapter;

use crate::collection::Collection;
use crate::error::DbError;
use crate::events::ChangeDelta;

/// A bound `(selector, options)` pair returned by `Collection::find`. Cheap
/// to create; evaluates the collection's current state only when asked to
/// (spec §4.4 — `find` itself does no evaluation).
pub struct Cursor<S: StorageAdapter, R: ReactivityAdapter> {
    collection: Collection<S, R>,
    selector: Option<Selector>,
    options: QueryOptions,
    reactive_dep: RefCell<Option<R::Dep>>,
    observer_id: Cell<Option<u64>>,
}

impl<S: StorageAdapter, R: ReactivityAdapter> Cursor<S, R> {
    pub(crate) fn new(collection: Collection<S, R>, query: Query) -> Self {
        Self {
            collection,
            selector: query.selector,
            options: query.options,
            reactive_dep: RefCell::new(None),
            observer_id: Cell::new(None),
        }
    }

    fn track_reactive(&self) -> Result<(), DbError>
    where
        R::Dep: Clone,
    {
        let wants_reactive = self.options.reactive.unwrap_or(true);
        if !wants_reactive {
            return Ok(());
        }
        if self.reactive_dep.borrow().is_some() {
            if let Some(dep) = self.reactive_dep.borrow().as_ref() {
                dep.depend();
            }
            return Ok(());
        }
        if !self.collection.reactivity_in_scope() {
            return Ok(());
        }
        let dep = self.collection.reactivity_create();
        dep.depend();
        let id = self.collection.register_observer(
            self.selector.clone(),
            self.options.clone(),
            None,
            Some(dep.clone()),
        )?;
        *self.reactive_dep.borrow_mut() = Some(dep);
        self.observer_id.set(Some(id));
        Ok(())
    }

    /// One-shot evaluation of the full 7-step plan (spec §4.4).
    pub fn fetch(&self) -> Result<Vec<Document>, DbError>
    where
        R::Dep: Clone,
    {
        self.track_reactive()?;
        self.collection.evaluate(&self.selector, &self.options)
    }

    pub fn count(&self) -> Result<usize, DbError>
    where
        R::Dep: Clone,
    {
        Ok(self.fetch()?.len())
    }

    /// Register a live-diff observer (spec §4.4 `observeChanges`). Emits an
    /// initial `added` for every currently matching document, then further
    /// deltas as the collection mutates, until `cleanup` is called.
    pub fn observe_changes(
        &self,
        handler: impl FnMut(ChangeDelta) + 'static,
    ) -> Result<(), DbError> {
        let id = self.collection.register_observer(
            self.selector.clone(),
            self.options.clone(),
            Some(Box::new(handler)),
            None,
        )?;
        self.observer_id.set(Some(id));
        Ok(())
    }

    /// Idempotent; safe to call from within a reactivity adapter's own
    /// disposal hook (spec §4.4 Cleanup).
    pub fn cleanup(&self) {
        if let Some(id) = self.observer_id.take() {
            self.collection.remove_observer(id);
        }
        self.reactive_dep.borrow_mut().take();
    }
}

impl<S: StorageAdapter, R: ReactivityAdapter> Drop for Cursor<S, R> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
