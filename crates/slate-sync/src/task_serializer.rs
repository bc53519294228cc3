use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use crate::error::SyncError;

#[derive(Default)]
struct KeyQueue {
    running: bool,
    pending: VecDeque<Box<dyn FnOnce() -> Result<(), SyncError>>>,
}

/// FIFO queue per key (spec §4.9): at most one task runs per key at a time,
/// and a rejected task does not block the ones queued behind it.
///
/// This engine is single-threaded and every task runs to completion
/// synchronously, so `run` only actually defers a task when called
/// re-entrantly — e.g. a remote-change notification firing while a cycle
/// for the same key is already on the stack. A task enqueued that way runs
/// once the outer call finishes draining the key's queue, and its outcome
/// is no longer observable at the re-entrant call site (there is no
/// executor here to hand a pending future back to, and that call already
/// got `Ok(())`) — so every error produced while draining is instead
/// reported through `on_drain_error` rather than discarded.
#[derive(Default)]
pub struct TaskSerializer {
    queues: RefCell<HashMap<String, KeyQueue>>,
    on_drain_error: RefCell<Option<Box<dyn FnMut(&str, &SyncError)>>>,
}

impl TaskSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink for the outcome of tasks run while draining a
    /// key's queue (i.e. tasks that were deferred by a re-entrant `run`
    /// call and whose caller already moved on with `Ok(())`). Never called
    /// for the task a `run` call executes directly — that one's `Result`
    /// is already the return value.
    pub fn on_drain_error(&self, callback: impl FnMut(&str, &SyncError) + 'static) {
        *self.on_drain_error.borrow_mut() = Some(Box::new(callback));
    }

    pub fn run(
        &self,
        key: &str,
        task: impl FnOnce() -> Result<(), SyncError> + 'static,
    ) -> Result<(), SyncError> {
        {
            let mut queues = self.queues.borrow_mut();
            let entry = queues.entry(key.to_string()).or_default();
            if entry.running {
                entry.pending.push_back(Box::new(task));
                return Ok(());
            }
            entry.running = true;
        }

        let result = task();

        loop {
            let next = {
                let mut queues = self.queues.borrow_mut();
                let entry = queues.get_mut(key).expect("key entry inserted above");
                match entry.pending.pop_front() {
                    Some(t) => Some(t),
                    None => {
                        entry.running = false;
                        None
                    }
                }
            };
            match next {
                Some(t) => {
                    if let Err(e) = t() {
                        if let Some(cb) = self.on_drain_error.borrow_mut().as_mut() {
                            cb(key, &e);
                        }
                    }
                }
                None => break,
            }
        }

        result
    }

    pub fn has_pending(&self, key: &str) -> bool {
        self.queues
            .borrow()
            .get(key)
            .map(|q| q.running || !q.pending.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn reentrant_run_enqueues_instead_of_running_inline() {
        let serializer = Rc::new(TaskSerializer::new());
        let order = Rc::new(RefCell::new(Vec::new()));

        let serializer_inner = Rc::clone(&serializer);
        let order_inner = Rc::clone(&order);
        serializer
            .run("k", move || {
                order_inner.borrow_mut().push("outer-start");
                let order_nested = Rc::clone(&order_inner);
                serializer_inner
                    .run("k", move || {
                        order_nested.borrow_mut().push("nested");
                        Ok(())
                    })
                    .unwrap();
                order_inner.borrow_mut().push("outer-end");
                Ok(())
            })
            .unwrap();

        assert_eq!(*order.borrow(), vec!["outer-start", "outer-end", "nested"]);
    }

    #[test]
    fn a_rejected_task_does_not_block_the_next_one() {
        let serializer = TaskSerializer::new();
        let ran_second = Rc::new(RefCell::new(false));
        let ran_second_clone = Rc::clone(&ran_second);

        serializer.run("k", || Ok(())).unwrap();
        let first = serializer.run("k", || Err(SyncError::Pull("boom".to_string())));
        assert!(first.is_err());

        serializer
            .run("k", move || {
                *ran_second_clone.borrow_mut() = true;
                Ok(())
            })
            .unwrap();
        assert!(*ran_second.borrow());
    }

    #[test]
    fn a_deferred_tasks_error_reaches_the_drain_error_hook_instead_of_being_dropped() {
        let serializer = Rc::new(TaskSerializer::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_hook = Rc::clone(&seen);
        serializer.on_drain_error(move |key, err| {
            seen_hook.borrow_mut().push((key.to_string(), err.to_string()));
        });

        let serializer_inner = Rc::clone(&serializer);
        let outer_result = serializer.run("k", move || {
            // Queued re-entrantly: its `Ok(())` return here is not the
            // deferred task's own outcome.
            let deferred_result = serializer_inner.run("k", || Err(SyncError::Push("boom".to_string())));
            assert!(deferred_result.is_ok());
            Ok(())
        });

        assert!(outer_result.is_ok());
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].0, "k");
        assert!(seen.borrow()[0].1.contains("boom"));
    }

    #[test]
    fn has_pending_reflects_queued_work() {
        let serializer = Rc::new(TaskSerializer::new());
        assert!(!serializer.has_pending("k"));

        let serializer_inner = Rc::clone(&serializer);
        serializer
            .run("k", move || {
                assert!(!serializer_inner.has_pending("other"));
                serializer_inner.run("k", || Ok(())).unwrap();
                Ok(())
            })
            .unwrap();
    }
}
