use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use bson::{doc, Bson, Document};
use rand::Rng;
use slate_db::{Collection, Cursor, FindOptions, ReactivityAdapter, UpdateOptions};
use slate_store::StorageAdapter;

use crate::change_log::{compact, ChangeOp, ChangeSet, RawChange};
use crate::error::SyncError;
use crate::snapshot::{diff, replay};
use crate::task_serializer::TaskSerializer;

fn now_millis() -> i64 {
    bson::DateTime::now().timestamp_millis()
}

/// Base delay, multiplier and cap for the exponential backoff policy spec.md
/// §4.8 requires without naming constants for. `original_source/` carries
/// no retrievable code for this system, so these are this crate's own,
/// conservative choice rather than a recovered value — see DESIGN.md.
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_MULTIPLIER: u32 = 2;
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Exponential backoff with jitter, capped (spec §4.8). `attempt` is
/// zero-based (0 = first retry).
pub fn backoff_delay(attempt: u32) -> Duration {
    let factor = BACKOFF_MULTIPLIER.saturating_pow(attempt);
    let raw = BACKOFF_BASE.saturating_mul(factor).min(BACKOFF_CAP);
    let jitter_ms = rand::thread_rng().gen_range(0..=(raw.as_millis() as u64 / 4).max(1));
    raw + Duration::from_millis(jitter_ms)
}

/// Sync context for one tracked collection; typically just a name, plus
/// whatever else the host application's `pull`/`push` endpoints need.
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    pub name: String,
    pub extra: Document,
}

impl SyncContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Document::new(),
        }
    }
}

/// Result of a `pull` call (spec §4.8, §6).
pub enum PullResult {
    Items(Vec<Document>),
    Changes {
        added: Vec<Document>,
        modified: Vec<(Bson, Document)>,
        removed: Vec<Bson>,
    },
}

/// The transport-agnostic remote endpoints a tracked collection syncs
/// against. The teacher's literal TCP/bincode transport is not retained —
/// callers plug in whatever transport they like behind this trait.
pub trait SyncEndpoints {
    fn pull(
        &mut self,
        ctx: &SyncContext,
        last_finished_sync_start: Option<i64>,
        last_finished_sync_end: Option<i64>,
    ) -> Result<PullResult, Box<dyn std::error::Error>>;

    fn push(
        &mut self,
        ctx: &SyncContext,
        changes: &ChangeSet,
        raw_changes: &[RawChange],
    ) -> Result<(), Box<dyn std::error::Error>>;
}

struct TrackedCollection<S, R: ReactivityAdapter> {
    collection: Collection<S, R>,
    ctx: SyncContext,
    endpoints: Rc<RefCell<Box<dyn SyncEndpoints>>>,
    suppress: Rc<Cell<bool>>,
    subscribed: Cell<bool>,
    last_finished_sync_start: Rc<Cell<Option<i64>>>,
    last_finished_sync_end: Rc<Cell<Option<i64>>>,
    _subscription: Cursor<S, R>,
}

/// Reconciles local collections against a remote source of truth (spec
/// §4.7–§4.9). `S`/`R` are shared by the manager's own bookkeeping
/// collections (`changes`, `snapshots`, `sync-operations`) and by every
/// collection it tracks — an application mixing storage/reactivity
/// backends across synced collections would need one manager per backend,
/// a scope simplification recorded in DESIGN.md.
pub struct SyncManager<S: StorageAdapter, R: ReactivityAdapter> {
    changes: Collection<S, R>,
    snapshots: Collection<S, R>,
    operations: Collection<S, R>,
    tracked: RefCell<HashMap<String, TrackedCollection<S, R>>>,
    serializer: TaskSerializer,
    next_seq: Rc<Cell<u64>>,
    on_error: Rc<RefCell<Option<Box<dyn FnMut(&str, &SyncError)>>>>,
    disposed: Rc<Cell<bool>>,
}

impl<S, R> SyncManager<S, R>
where
    S: StorageAdapter + 'static,
    R: ReactivityAdapter + Default + 'static,
    R::Dep: Clone,
{
    /// `make_storage` is called once per bookkeeping collection (`changes`,
    /// `snapshots`, `sync-operations`) — spec §4.8's "one storage adapter
    /// (or data-adapter factory)".
    pub fn new(mut make_storage: impl FnMut() -> S) -> Result<Self, SyncError> {
        let changes = Collection::with_storage("changes", R::default(), make_storage());
        changes.load()?;
        changes.create_index("collectionName")?;

        let snapshots = Collection::with_storage("snapshots", R::default(), make_storage());
        snapshots.load()?;

        let operations = Collection::with_storage("sync-operations", R::default(), make_storage());
        operations.load()?;

        Ok(Self {
            changes,
            snapshots,
            operations,
            tracked: RefCell::new(HashMap::new()),
            serializer: TaskSerializer::new(),
            next_seq: Rc::new(Cell::new(0)),
            on_error: Rc::new(RefCell::new(None)),
            disposed: Rc::new(Cell::new(false)),
        })
    }

    pub fn on_error(&self, callback: impl FnMut(&str, &SyncError) + 'static) {
        *self.on_error.borrow_mut() = Some(Box::new(callback));
    }

    /// Associates `collection` with a sync context and begins observing its
    /// mutations, appending each one to the `changes` collection before the
    /// mutation that caused it is reported as complete (spec §4.8).
    pub fn add_collection(
        &self,
        collection: Collection<S, R>,
        ctx: SyncContext,
        endpoints: Box<dyn SyncEndpoints>,
    ) -> Result<(), SyncError> {
        let suppress = Rc::new(Cell::new(false));
        let suppress_for_handler = Rc::clone(&suppress);
        let name = ctx.name.clone();
        let changes = self.changes.clone();
        let seq_counter = Rc::clone(&self.next_seq);

        let handler_name = name.clone();
        let cursor = collection.find(None, FindOptions::default())?;
        cursor.observe_changes(move |delta| {
            if suppress_for_handler.get() {
                return;
            }
            let raw = match delta {
                slate_db::ChangeDelta::Added { doc, .. } => {
                    let id = doc.get("id").cloned().unwrap_or(Bson::Null);
                    RawChange {
                        collection: handler_name.clone(),
                        op: ChangeOp::Insert,
                        doc_id: id,
                        doc: Some(doc),
                        fields: Vec::new(),
                        time: now_millis(),
                    }
                }
                slate_db::ChangeDelta::Changed { id, old_doc, new_doc } => {
                    let fields: Vec<String> = new_doc
                        .keys()
                        .chain(old_doc.keys())
                        .filter(|k| old_doc.get(k.as_str()) != new_doc.get(k.as_str()))
                        .map(|k| k.to_string())
                        .collect::<std::collections::BTreeSet<_>>()
                        .into_iter()
                        .collect();
                    RawChange {
                        collection: handler_name.clone(),
                        op: ChangeOp::Update,
                        doc_id: id,
                        doc: Some(new_doc),
                        fields,
                        time: now_millis(),
                    }
                }
                slate_db::ChangeDelta::Removed { id } => RawChange {
                    collection: handler_name.clone(),
                    op: ChangeOp::Remove,
                    doc_id: id,
                    doc: None,
                    fields: Vec::new(),
                    time: now_millis(),
                },
                slate_db::ChangeDelta::MovedBefore { .. } => return,
            };
            let seq = seq_counter.get();
            seq_counter.set(seq + 1);
            let _ = changes.insert(raw.to_document(seq));
        })?;

        self.tracked.borrow_mut().insert(
            name,
            TrackedCollection {
                collection,
                ctx,
                endpoints: Rc::new(RefCell::new(endpoints)),
                suppress,
                subscribed: Cell::new(false),
                last_finished_sync_start: Rc::new(Cell::new(None)),
                last_finished_sync_end: Rc::new(Cell::new(None)),
                _subscription: cursor,
            },
        );
        Ok(())
    }

    /// Makes the collection eligible for remote-change-triggered cycles and
    /// runs an initial sync cycle.
    pub fn start_sync(&self, name: &str) -> Result<(), SyncError> {
        {
            let tracked = self.tracked.borrow();
            let t = tracked
                .get(name)
                .ok_or_else(|| SyncError::UnknownCollection(name.to_string()))?;
            t.subscribed.set(true);
        }
        self.sync(name)
    }

    /// Removes remote-change subscription; queued change-log entries remain
    /// untouched and the collection resumes syncing on the next `startSync`.
    pub fn pause_sync(&self, name: &str) -> Result<(), SyncError> {
        let tracked = self.tracked.borrow();
        let t = tracked
            .get(name)
            .ok_or_else(|| SyncError::UnknownCollection(name.to_string()))?;
        t.subscribed.set(false);
        Ok(())
    }

    /// Runs one full sync cycle for `name`, serialized per collection.
    pub fn sync(&self, name: &str) -> Result<(), SyncError> {
        self.run_cycle(name, false)
    }

    pub fn sync_all(&self) -> Result<(), SyncError> {
        let names: Vec<String> = self.tracked.borrow().keys().cloned().collect();
        let mut first_err = None;
        for name in names {
            if let Err(e) = self.sync(&name) {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// A pull-only cycle, as triggered by a remote-change notification
    /// (spec §4.8); not pushed through `add_collection`'s handler directly,
    /// but available for a host's own `registerRemoteChange` wiring.
    pub fn remote_change_cycle(&self, name: &str) -> Result<(), SyncError> {
        self.run_cycle(name, true)
    }

    pub fn has_pending(&self, name: &str) -> bool {
        self.serializer.has_pending(name)
    }

    /// Flushes pending work and releases storage handles.
    pub fn dispose(&self) -> Result<(), SyncError> {
        if self.disposed.get() {
            return Ok(());
        }
        self.disposed.set(true);
        for t in self.tracked.borrow().values() {
            t.subscribed.set(false);
        }
        self.changes.dispose()?;
        self.snapshots.dispose()?;
        self.operations.dispose()?;
        Ok(())
    }

    fn run_cycle(&self, name: &str, pull_only: bool) -> Result<(), SyncError> {
        if self.disposed.get() {
            return Ok(());
        }

        let (collection, ctx, endpoints, suppress, last_start_cell, last_end_cell) = {
            let tracked = self.tracked.borrow();
            let t = tracked
                .get(name)
                .ok_or_else(|| SyncError::UnknownCollection(name.to_string()))?;
            (
                t.collection.clone(),
                t.ctx.clone(),
                Rc::clone(&t.endpoints),
                Rc::clone(&t.suppress),
                Rc::clone(&t.last_finished_sync_start),
                Rc::clone(&t.last_finished_sync_end),
            )
        };

        let changes = self.changes.clone();
        let snapshots = self.snapshots.clone();
        let operations = self.operations.clone();
        let name = name.to_string();
        let disposed = self.disposed.clone();
        let on_error = Rc::clone(&self.on_error);

        // This closure is itself the task handed to the serializer, so it
        // runs and reports to `on_error` the same way whether `run` executes
        // it directly or defers it to a later drain — no separate
        // `on_drain_error` wiring needed here.
        self.serializer.run(&name, move || {
            if disposed.get() {
                return Ok(());
            }
            let result = cycle_body(
                &name,
                pull_only,
                &collection,
                &ctx,
                &endpoints,
                &suppress,
                &last_start_cell,
                &last_end_cell,
                &changes,
                &snapshots,
                &operations,
            );
            if let Err(e) = &result {
                if let Some(cb) = on_error.borrow_mut().as_mut() {
                    cb(&name, e);
                }
            }
            result
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn cycle_body<S, R>(
    name: &str,
    pull_only: bool,
    collection: &Collection<S, R>,
    ctx: &SyncContext,
    endpoints: &Rc<RefCell<Box<dyn SyncEndpoints>>>,
    suppress: &Rc<Cell<bool>>,
    last_start_cell: &Rc<Cell<Option<i64>>>,
    last_end_cell: &Rc<Cell<Option<i64>>>,
    changes: &Collection<S, R>,
    snapshots: &Collection<S, R>,
    operations: &Collection<S, R>,
) -> Result<(), SyncError>
where
    S: StorageAdapter,
    R: ReactivityAdapter,
    R::Dep: Clone,
{
    let start = now_millis();
    let op_id = operations.insert(doc! {
        "collectionName": name,
        "status": "running",
        "startTime": start,
    })?;

    let result = run_cycle_body(
        name,
        pull_only,
        start,
        collection,
        ctx,
        endpoints,
        suppress,
        last_start_cell,
        last_end_cell,
        changes,
        snapshots,
    );

    match &result {
        Ok(()) => {
            operations.update_one(
                &doc! {"id": op_id},
                &doc! {"$set": {"status": "done", "endTime": now_millis()}},
                UpdateOptions::default(),
            )?;
        }
        Err(e) => {
            operations.update_one(
                &doc! {"id": op_id},
                &doc! {"$set": {"status": "error", "error": e.to_string()}},
                UpdateOptions::default(),
            )?;
        }
    }

    result
}

#[allow(clippy::too_many_arguments)]
fn run_cycle_body<S, R>(
    name: &str,
    pull_only: bool,
    start: i64,
    collection: &Collection<S, R>,
    ctx: &SyncContext,
    endpoints: &Rc<RefCell<Box<dyn SyncEndpoints>>>,
    suppress: &Rc<Cell<bool>>,
    last_start_cell: &Rc<Cell<Option<i64>>>,
    last_end_cell: &Rc<Cell<Option<i64>>>,
    changes: &Collection<S, R>,
    snapshots: &Collection<S, R>,
) -> Result<(), SyncError>
where
    S: StorageAdapter,
    R: ReactivityAdapter,
    R::Dep: Clone,
{
    // Step 2: load this collection's raw changes, oldest first.
    let raw_docs = changes
        .find(Some(doc! {"collectionName": name}), FindOptions::default())?
        .fetch()?;
    let raw: Vec<RawChange> = raw_docs.iter().filter_map(RawChange::from_document).collect();

    // Step 3: compact into a change set.
    let change_set = compact(&raw);

    // Step 4: push local changes, if any.
    if !pull_only && !change_set.is_empty() {
        endpoints
            .borrow_mut()
            .push(ctx, &change_set, &raw)
            .map_err(|e| SyncError::Push(e.to_string()))?;
    }

    // Step 5: pull.
    let pull_result = endpoints
        .borrow_mut()
        .pull(ctx, last_start_cell.get(), last_end_cell.get())
        .map_err(|e| SyncError::Pull(e.to_string()))?;

    // Step 6: resolve against the stored snapshot.
    let snapshot_row = snapshots.find_one(Some(doc! {"id": name}), FindOptions::default())?;
    let stored_items: Vec<Document> = snapshot_row
        .as_ref()
        .and_then(|d| d.get_array("items").ok())
        .map(|arr| arr.iter().filter_map(|v| v.as_document().cloned()).collect())
        .unwrap_or_default();

    let new_snapshot = match pull_result {
        PullResult::Items(items) => items,
        PullResult::Changes { added, modified, removed } => {
            let cs = ChangeSet {
                added,
                modified,
                removed,
                modified_fields: Default::default(),
            };
            replay(&stored_items, &cs)
        }
    };

    let not_yet_confirmed: Vec<RawChange> = raw.iter().filter(|c| c.time > start).cloned().collect();
    let authoritative = replay(&new_snapshot, &compact(&not_yet_confirmed));

    // Step 7: reconcile, suppressing re-emission into the change log.
    let current = collection.find(None, FindOptions::default())?.fetch()?;
    let reconciliation = diff(&current, &authoritative);
    suppress.set(true);
    let reconcile_result = (|| -> Result<(), slate_db::DbError> {
        for doc in reconciliation.to_insert {
            collection.insert(doc)?;
        }
        for (id, doc) in reconciliation.to_update {
            let mut set_doc = doc.clone();
            set_doc.remove("id");
            collection.update_one(&doc! {"id": id}, &doc! {"$set": set_doc}, UpdateOptions::default())?;
        }
        for id in reconciliation.to_remove {
            collection.remove_one(&doc! {"id": id})?;
        }
        Ok(())
    })();
    suppress.set(false);
    reconcile_result?;

    // Step 8: drop synced change-log entries with time <= start.
    for change_doc in raw_docs.iter() {
        let touched_time = change_doc.get_i64("time").unwrap_or(i64::MAX);
        if touched_time <= start {
            if let Some(id) = change_doc.get("id") {
                changes.remove_one(&doc! {"id": id.clone()})?;
            }
        }
    }

    // Step 9: persist the new snapshot and timestamps.
    let end = now_millis();
    let items_bson = Bson::Array(authoritative.into_iter().map(Bson::Document).collect());
    if snapshot_row.is_some() {
        snapshots.update_one(
            &doc! {"id": name},
            &doc! {"$set": {
                "items": items_bson,
                "lastFinishedSyncStart": start,
                "lastFinishedSyncEnd": end,
            }},
            UpdateOptions::default(),
        )?;
    } else {
        snapshots.insert(doc! {
            "id": name,
            "items": items_bson,
            "lastFinishedSyncStart": start,
            "lastFinishedSyncEnd": end,
        })?;
    }
    last_start_cell.set(Some(start));
    last_end_cell.set(Some(end));

    Ok(())
}
