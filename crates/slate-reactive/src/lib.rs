//! The reactivity adapter contract (spec §4.5): a small seam the query
//! engine depends on so that cursors can participate in whatever signal or
//! tracking-scope library the host application already uses, without this
//! crate assuming any particular one.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A handle a cursor calls into on every evaluation (`depend`) and that the
/// collection calls into whenever something the cursor might care about
/// changes (`notify`).
pub trait Dependency {
    fn depend(&self);
    fn notify(&self);
}

/// Adapter seam between the core and a host reactivity system.
pub trait ReactivityAdapter {
    type Dep: Dependency;

    /// Create a fresh dependency handle.
    fn create(&self) -> Self::Dep;

    /// Whether a reactive tracking scope is currently active.
    fn is_in_scope(&self) -> bool;

    /// Register a cleanup callback against the current scope.
    fn on_dispose(&self, callback: Box<dyn FnOnce()>);
}

/// Dependency created outside (or by) an adapter with no scope concept:
/// `depend()` is a no-op, `notify()` is allowed but pointless (spec §4.5).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDependency;

impl Dependency for NullDependency {
    fn depend(&self) {}
    fn notify(&self) {}
}

/// The default adapter: no reactive scope is ever active. Suitable when the
/// host has no signal library wired in and for one-shot (non-reactive)
/// cursor use. `on_dispose` runs its callback immediately — there is no
/// scope to defer it to.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReactivity;

impl ReactivityAdapter for NullReactivity {
    type Dep = NullDependency;

    fn create(&self) -> NullDependency {
        NullDependency
    }

    fn is_in_scope(&self) -> bool {
        false
    }

    fn on_dispose(&self, callback: Box<dyn FnOnce()>) {
        callback();
    }
}

/// A dependency that counts `depend`/`notify` calls, for asserting on
/// reactive behavior in tests.
#[derive(Clone, Default)]
pub struct CountingDependency {
    depend_calls: Rc<Cell<usize>>,
    notify_calls: Rc<Cell<usize>>,
}

impl CountingDependency {
    pub fn depend_calls(&self) -> usize {
        self.depend_calls.get()
    }

    pub fn notify_calls(&self) -> usize {
        self.notify_calls.get()
    }
}

impl Dependency for CountingDependency {
    fn depend(&self) {
        self.depend_calls.set(self.depend_calls.get() + 1);
    }

    fn notify(&self) {
        self.notify_calls.set(self.notify_calls.get() + 1);
    }
}

/// Reference adapter with an explicit, manually toggled scope — stands in
/// for a host signal library in tests.
#[derive(Default)]
pub struct ManualReactivity {
    in_scope: Cell<bool>,
    dispose_callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl ManualReactivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_scope(&self) {
        self.in_scope.set(true);
    }

    /// Leave the scope, running every callback registered via `on_dispose`
    /// while it was active, in registration order.
    pub fn exit_scope(&self) {
        self.in_scope.set(false);
        for cb in self.dispose_callbacks.borrow_mut().drain(..) {
            cb();
        }
    }
}

impl ReactivityAdapter for ManualReactivity {
    type Dep = CountingDependency;

    fn create(&self) -> CountingDependency {
        CountingDependency::default()
    }

    fn is_in_scope(&self) -> bool {
        self.in_scope.get()
    }

    fn on_dispose(&self, callback: Box<dyn FnOnce()>) {
        self.dispose_callbacks.borrow_mut().push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reactivity_is_never_in_scope_and_is_inert() {
        let adapter = NullReactivity;
        assert!(!adapter.is_in_scope());
        let dep = adapter.create();
        dep.depend();
        dep.notify();
    }

    #[test]
    fn null_reactivity_runs_dispose_immediately() {
        let adapter = NullReactivity;
        let ran = Rc::new(Cell::new(false));
        let ran_clone = ran.clone();
        adapter.on_dispose(Box::new(move || ran_clone.set(true)));
        assert!(ran.get());
    }

    #[test]
    fn manual_reactivity_tracks_scope_and_counts() {
        let adapter = ManualReactivity::new();
        assert!(!adapter.is_in_scope());
        adapter.enter_scope();
        assert!(adapter.is_in_scope());

        let dep = adapter.create();
        dep.depend();
        dep.depend();
        dep.notify();
        assert_eq!(dep.depend_calls(), 2);
        assert_eq!(dep.notify_calls(), 1);
    }

    #[test]
    fn manual_reactivity_runs_dispose_callbacks_on_exit() {
        let adapter = ManualReactivity::new();
        adapter.enter_scope();
        let ran = Rc::new(Cell::new(false));
        let ran_clone = ran.clone();
        adapter.on_dispose(Box::new(move || ran_clone.set(true)));
        assert!(!ran.get());
        adapter.exit_scope();
        assert!(ran.get());
    }
}
