use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use bson::{Bson, Document};
use slate_engine::{combine, EqualityIndex, IndexProvider};
use slate_query::{
    apply, parse_modifier, parse_selector, path, ApplyContext, Condition, Modifier, Projection,
    Query, QueryOptions, Selector,
};
use slate_reactive::{Dependency, NullReactivity, ReactivityAdapter};
use slate_store::StorageAdapter;

use crate::cursor::Cursor;
use crate::document::{canonical_id, ensure_id};
use crate::error::DbError;
use crate::events::{CollectionEvent, DebugEvent};

/// Storage linkage state machine (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Uninitialized,
    Loading,
    Ready,
    Mutating,
    ReadyDegraded,
    Disposed,
}

/// Options for `find`/`findOne`; mirrors [`slate_query::QueryOptions`] with
/// the addition of an explicit selector document.
#[derive(Default, Clone)]
pub struct FindOptions {
    pub sort: Vec<slate_query::SortKey>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub fields: Option<Document>,
    pub reactive: Option<bool>,
}

impl FindOptions {
    fn into_query_options(self) -> Result<QueryOptions, DbError> {
        let fields = match self.fields {
            None => None,
            Some(doc) => {
                let pairs: Vec<(String, bool)> = doc
                    .into_iter()
                    .map(|(k, v)| (k, truthy(&v)))
                    .collect();
                Projection::from_fields(pairs)?
            }
        };
        Ok(QueryOptions {
            sort: self.sort,
            skip: self.skip,
            limit: self.limit,
            fields,
            reactive: self.reactive,
        })
    }
}

/// Options for `updateOne`/`updateMany` (spec §4.3).
#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateOptions {
    /// Insert a document derived from the selector and modifier when no
    /// document matched.
    pub upsert: bool,
}

fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        _ => true,
    }
}

pub(crate) struct Observer<Dep> {
    pub id: u64,
    pub selector: Option<Selector>,
    pub options: QueryOptions,
    pub snapshot: Vec<Document>,
    pub dependency: Option<Dep>,
    pub handler: Option<Box<dyn FnMut(crate::events::ChangeDelta)>>,
}

pub(crate) struct Inner<S, R: ReactivityAdapter> {
    pub name: String,
    pub docs: Vec<Document>,
    pub index_by_id: HashMap<String, usize>,
    pub providers: Vec<Box<dyn IndexProvider>>,
    pub storage: Option<S>,
    pub state: CollectionState,
    pub pending_inserts: Vec<Document>,
    pub transform: Option<Rc<dyn Fn(&Document) -> Document>>,
    pub reactivity: R,
    pub observers: Vec<Observer<R::Dep>>,
    pub next_observer_id: u64,
    pub debug: bool,
    pub debug_log: Vec<DebugEvent>,
    pub error_log: Vec<String>,
    pub collection_events: Vec<CollectionEvent>,
}

/// Named, ordered set of documents (spec §4.3). Cheaply cloneable — clones
/// share the same underlying state, like an `Rc` handle.
pub struct Collection<S = slate_store::MemoryStore, R: ReactivityAdapter = NullReactivity> {
    pub(crate) inner: Rc<RefCell<Inner<S, R>>>,
}

impl<S, R: ReactivityAdapter> Clone for Collection<S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S> Collection<S, NullReactivity> {
    /// A collection with no reactivity adapter wired in (the default: cursors
    /// never become reactive).
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_reactivity(name, NullReactivity)
    }
}

impl<S, R: ReactivityAdapter> Collection<S, R> {
    pub fn with_reactivity(name: impl Into<String>, reactivity: R) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                name: name.into(),
                docs: Vec::new(),
                index_by_id: HashMap::new(),
                providers: Vec::new(),
                storage: None,
                state: CollectionState::Ready,
                pending_inserts: Vec::new(),
                transform: None,
                reactivity,
                observers: Vec::new(),
                next_observer_id: 0,
                debug: false,
                debug_log: Vec::new(),
                error_log: Vec::new(),
                collection_events: Vec::new(),
            })),
        }
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn state(&self) -> CollectionState {
        self.inner.borrow().state
    }

    pub fn set_debug(&self, enabled: bool) {
        self.inner.borrow_mut().debug = enabled;
    }

    pub fn set_transform(&self, transform: impl Fn(&Document) -> Document + 'static) {
        self.inner.borrow_mut().transform = Some(Rc::new(transform));
    }

    /// Events emitted so far (`added`/`changed`/`removed`/lifecycle),
    /// draining the internal buffer.
    pub fn drain_events(&self) -> Vec<CollectionEvent> {
        std::mem::take(&mut self.inner.borrow_mut().collection_events)
    }

    pub fn drain_debug_log(&self) -> Vec<DebugEvent> {
        std::mem::take(&mut self.inner.borrow_mut().debug_log)
    }

    /// Errors surfaced from observer handlers or degraded storage retries.
    pub fn drain_error_log(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.borrow_mut().error_log)
    }
}

impl<S: StorageAdapter, R: ReactivityAdapter> Collection<S, R> {
    /// Attach storage, starting the `uninitialized → loading → ready`
    /// sequence. `load()` must be called to actually populate from it.
    pub fn with_storage(name: impl Into<String>, reactivity: R, storage: S) -> Self {
        let collection = Self::with_reactivity(name, reactivity);
        {
            let mut inner = collection.inner.borrow_mut();
            inner.storage = Some(storage);
            inner.state = CollectionState::Uninitialized;
        }
        collection
    }

    /// Synchronously load the collection's contents from storage, replaying
    /// any mutations that were issued (and buffered) while loading.
    pub fn load(&self) -> Result<(), DbError> {
        {
            let mut inner = self.inner.borrow_mut();
            inner.state = CollectionState::Loading;
            let storage = inner.storage.as_mut().expect("load() requires with_storage");
            storage.setup()?;
            let docs = storage.read_all()?;
            inner.index_by_id.clear();
            inner.docs.clear();
            for doc in docs {
                let key = canonical_id(doc.get("id").expect("stored document must have an id"));
                inner.index_by_id.insert(key, inner.docs.len());
                inner.docs.push(doc);
            }
            for provider in inner.providers.iter_mut() {
                provider.rebuild(&inner.docs);
            }
        }

        let pending = std::mem::take(&mut self.inner.borrow_mut().pending_inserts);
        for doc in pending {
            self.insert_document(doc)?;
        }

        self.inner.borrow_mut().state = CollectionState::Ready;
        self.inner
            .borrow_mut()
            .collection_events
            .push(CollectionEvent::Ready);
        Ok(())
    }

    /// Register a secondary index, both as an in-memory [`IndexProvider`]
    /// and (if storage is attached) as a durable storage index.
    pub fn create_index(&self, field: &str) -> Result<(), DbError> {
        let mut inner = self.inner.borrow_mut();
        if inner.providers.iter().any(|p| p.field() == field) {
            return Ok(());
        }
        let mut provider = EqualityIndex::new(field)?;
        provider.rebuild(&inner.docs);
        inner.providers.push(Box::new(provider));
        if let Some(storage) = inner.storage.as_mut() {
            storage.create_index(field)?;
        }
        Ok(())
    }

    pub fn drop_index(&self, field: &str) -> Result<(), DbError> {
        let mut inner = self.inner.borrow_mut();
        inner.providers.retain(|p| p.field() != field);
        if let Some(storage) = inner.storage.as_mut() {
            storage.drop_index(field)?;
        }
        Ok(())
    }

    pub fn dispose(&self) -> Result<(), DbError> {
        let mut inner = self.inner.borrow_mut();
        if let Some(storage) = inner.storage.as_mut() {
            storage.teardown()?;
        }
        inner.state = CollectionState::Disposed;
        inner.collection_events.push(CollectionEvent::Disposed);
        Ok(())
    }
}

impl<S: StorageAdapter, R: ReactivityAdapter> Collection<S, R> {
    fn record_debug(&self, operation: &'static str, selector: Option<&Document>, modifier: Option<&Document>) {
        let mut inner = self.inner.borrow_mut();
        if !inner.debug {
            return;
        }
        inner.debug_log.push(DebugEvent {
            operation,
            selector: selector.map(|d| d.to_string()),
            modifier: modifier.map(|d| d.to_string()),
            call_site: None,
        });
    }

    pub fn insert(&self, mut doc: Document) -> Result<Bson, DbError> {
        self.record_debug("insert", None, None);
        let id = ensure_id(&mut doc);

        let state = self.inner.borrow().state;
        if matches!(state, CollectionState::Uninitialized | CollectionState::Loading) {
            self.inner.borrow_mut().pending_inserts.push(doc);
            return Ok(id);
        }

        self.insert_document(doc)?;
        Ok(id)
    }

    fn insert_document(&self, doc: Document) -> Result<(), DbError> {
        let id = doc.get("id").expect("ensure_id already ran").clone();
        let key = canonical_id(&id);
        {
            let mut inner = self.inner.borrow_mut();
            if inner.index_by_id.contains_key(&key) {
                return Err(DbError::DuplicateId(key));
            }
            let position = inner.docs.len();
            inner.index_by_id.insert(key, position);
            inner.docs.push(doc.clone());
            for provider in inner.providers.iter_mut() {
                provider.on_insert(&doc);
            }
        }
        self.write_through(|storage| storage.insert(std::slice::from_ref(&doc)))?;
        self.emit(CollectionEvent::Added(doc.clone()));
        self.notify_observers();
        Ok(())
    }

    pub fn insert_many(&self, docs: Vec<Document>) -> Result<Vec<Bson>, DbError> {
        let mut ids = Vec::with_capacity(docs.len());
        for doc in docs {
            ids.push(self.insert(doc)?);
        }
        Ok(ids)
    }

    pub fn update_one(
        &self,
        selector: &Document,
        modifier: &Document,
        opts: UpdateOptions,
    ) -> Result<usize, DbError> {
        self.record_debug("updateOne", Some(selector), Some(modifier));
        self.update(selector, modifier, false, opts)
    }

    pub fn update_many(
        &self,
        selector: &Document,
        modifier: &Document,
        opts: UpdateOptions,
    ) -> Result<usize, DbError> {
        self.record_debug("updateMany", Some(selector), Some(modifier));
        self.update(selector, modifier, true, opts)
    }

    fn update(
        &self,
        selector_doc: &Document,
        modifier_doc: &Document,
        multi: bool,
        opts: UpdateOptions,
    ) -> Result<usize, DbError> {
        let selector = parse_selector(selector_doc)?;
        let modifier = parse_modifier(modifier_doc)?;
        let matching_ids = self.matching_ids(&selector, multi)?;

        if matching_ids.is_empty() && opts.upsert {
            let base = derive_upsert_document(&selector);
            let ctx = apply_context(&selector, &modifier, &base);
            let derived = apply(&modifier, &base, &ctx)?;
            self.insert(derived)?;
            return Ok(1);
        }

        let mut updated = 0;
        for id in matching_ids {
            let key = canonical_id(&id);
            let (old_doc, new_doc) = {
                let mut inner = self.inner.borrow_mut();
                let position = *inner
                    .index_by_id
                    .get(&key)
                    .ok_or_else(|| DbError::NotFound(key.clone()))?;
                let old_doc = inner.docs[position].clone();
                let ctx = apply_context(&selector, &modifier, &old_doc);
                let new_doc = apply(&modifier, &old_doc, &ctx)?;
                inner.docs[position] = new_doc.clone();
                for provider in inner.providers.iter_mut() {
                    provider.on_update(&old_doc, &new_doc);
                }
                (old_doc, new_doc)
            };
            self.write_through(|storage| storage.replace(std::slice::from_ref(&new_doc)))?;
            self.emit(CollectionEvent::Changed {
                id: id.clone(),
                new_doc: new_doc.clone(),
            });
            let _ = old_doc;
            updated += 1;
        }
        self.notify_observers();
        Ok(updated)
    }

    pub fn remove_one(&self, selector: &Document) -> Result<usize, DbError> {
        self.record_debug("removeOne", Some(selector), None);
        self.remove(selector, false)
    }

    pub fn remove_many(&self, selector: &Document) -> Result<usize, DbError> {
        self.record_debug("removeMany", Some(selector), None);
        self.remove(selector, true)
    }

    fn remove(&self, selector_doc: &Document, multi: bool) -> Result<usize, DbError> {
        let selector = parse_selector(selector_doc)?;
        let matching_ids = self.matching_ids(&selector, multi)?;

        let mut removed = 0;
        for id in &matching_ids {
            let key = canonical_id(id);
            let removed_doc = {
                let mut inner = self.inner.borrow_mut();
                let position = inner
                    .index_by_id
                    .remove(&key)
                    .ok_or_else(|| DbError::NotFound(key.clone()))?;
                let removed_doc = inner.docs.remove(position);
                for (_, idx) in inner.index_by_id.iter_mut() {
                    if *idx > position {
                        *idx -= 1;
                    }
                }
                for provider in inner.providers.iter_mut() {
                    provider.on_remove(&removed_doc);
                }
                removed_doc
            };
            self.write_through(|storage| storage.remove(std::slice::from_ref(id)))?;
            self.emit(CollectionEvent::Removed { id: id.clone() });
            let _ = removed_doc;
            removed += 1;
        }
        self.notify_observers();
        Ok(removed)
    }

    fn matching_ids(&self, selector: &Selector, multi: bool) -> Result<Vec<Bson>, DbError> {
        let inner = self.inner.borrow();
        let query = combine(selector, &inner.providers);
        let mut ids = Vec::new();
        for doc in &inner.docs {
            let id = doc.get("id").expect("document always has id");
            if let Some(positions) = &query.positions {
                if !positions.contains(id) {
                    continue;
                }
            }
            let keep = match &query.residual {
                Some(residual) => slate_query::matches(residual, doc)?,
                None => true,
            };
            if keep {
                ids.push(id.clone());
                if !multi {
                    break;
                }
            }
        }
        Ok(ids)
    }

    /// Write through to storage if attached; on failure, flip into
    /// `ReadyDegraded` and record the error rather than losing the write.
    fn write_through(&self, op: impl FnOnce(&mut S) -> Result<(), slate_store::StoreError>) -> Result<(), DbError> {
        let mut inner = self.inner.borrow_mut();
        if let Some(storage) = inner.storage.as_mut() {
            if let Err(e) = op(storage) {
                inner.state = CollectionState::ReadyDegraded;
                inner.error_log.push(e.to_string());
            }
        }
        Ok(())
    }

    fn emit(&self, event: CollectionEvent) {
        self.inner.borrow_mut().collection_events.push(event);
    }

    pub fn find(&self, selector: Option<Document>, options: FindOptions) -> Result<Cursor<S, R>, DbError> {
        let selector = selector.as_ref().map(parse_selector).transpose()?;
        let options = options.into_query_options()?;
        Ok(Cursor::new(self.clone(), Query::new(selector, options)))
    }

    pub fn find_one(&self, selector: Option<Document>, options: FindOptions) -> Result<Option<Document>, DbError> {
        let mut options = options;
        options.limit = Some(1);
        self.find(selector, options)?.fetch().map(|mut v| {
            if v.is_empty() {
                None
            } else {
                Some(v.remove(0))
            }
        })
    }
}

/// Seeds an upsert-inserted document from the selector's equality clauses,
/// the way MongoDB derives an upsert document: only `$eq`-style top-level
/// (or `$and`-nested) clauses contribute a field. Anything else — `$or`,
/// range operators, `$where` — is too ambiguous to derive a value from and
/// is left for the modifier to fill in.
fn derive_upsert_document(selector: &Selector) -> Document {
    let mut doc = Document::new();
    collect_eq_fields(selector, &mut doc);
    doc
}

fn collect_eq_fields(selector: &Selector, out: &mut Document) {
    match selector {
        Selector::Field(fc) => {
            if let Condition::Eq(value) = &fc.condition {
                path::set(out, &fc.field, value.clone());
            }
        }
        Selector::And(clauses) => {
            for clause in clauses {
                collect_eq_fields(clause, out);
            }
        }
        _ => {}
    }
}

fn apply_context<'a>(selector: &'a Selector, modifier: &Modifier, _doc: &Document) -> ApplyContext<'a> {
    let _ = modifier;
    ApplyContext {
        query_selector: Some(selector),
        array_filters: &[],
        now: bson::DateTime::now(),
    }
}

impl<S: StorageAdapter, R: ReactivityAdapter> Collection<S, R> {
    pub(crate) fn evaluate(
        &self,
        selector: &Option<Selector>,
        options: &QueryOptions,
    ) -> Result<Vec<Document>, DbError> {
        let inner = self.inner.borrow();
        evaluate_docs(
            &inner.docs,
            &inner.providers,
            inner.transform.as_ref(),
            selector,
            options,
        )
    }

    pub(crate) fn register_observer(
        &self,
        selector: Option<Selector>,
        options: QueryOptions,
        mut handler: Option<Box<dyn FnMut(crate::events::ChangeDelta)>>,
        dependency: Option<R::Dep>,
    ) -> Result<u64, DbError> {
        let snapshot = self.evaluate(&selector, &options)?;
        if let Some(handler) = handler.as_mut() {
            for (index, doc) in snapshot.iter().enumerate() {
                handler(crate::events::ChangeDelta::Added {
                    doc: doc.clone(),
                    index,
                });
            }
        }
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_observer_id;
        inner.next_observer_id += 1;
        inner.observers.push(Observer {
            id,
            selector,
            options,
            snapshot,
            dependency,
            handler,
        });
        Ok(id)
    }

    pub(crate) fn remove_observer(&self, id: u64) {
        self.inner.borrow_mut().observers.retain(|o| o.id != id);
    }

    pub(crate) fn reactivity_in_scope(&self) -> bool {
        self.inner.borrow().reactivity.is_in_scope()
    }

    pub(crate) fn reactivity_create(&self) -> R::Dep {
        self.inner.borrow().reactivity.create()
    }

    fn notify_observers(&self) {
        let mut inner = self.inner.borrow_mut();
        let Inner {
            docs,
            providers,
            transform,
            observers,
            error_log,
            ..
        } = &mut *inner;
        for observer in observers.iter_mut() {
            let new_snapshot = match evaluate_docs(docs, providers, transform.as_ref(), &observer.selector, &observer.options) {
                Ok(v) => v,
                Err(e) => {
                    error_log.push(e.to_string());
                    continue;
                }
            };
            let deltas = diff_snapshots(&observer.snapshot, &new_snapshot);
            if deltas.is_empty() {
                continue;
            }
            if let Some(handler) = observer.handler.as_mut() {
                for delta in deltas {
                    handler(delta);
                }
            }
            if let Some(dep) = &observer.dependency {
                dep.notify();
            }
            observer.snapshot = new_snapshot;
        }
    }
}

fn diff_snapshots(old: &[Document], new: &[Document]) -> Vec<crate::events::ChangeDelta> {
    use crate::events::ChangeDelta;

    let old_ids: Vec<Bson> = old.iter().map(|d| d.get("id").unwrap().clone()).collect();
    let new_ids: Vec<Bson> = new.iter().map(|d| d.get("id").unwrap().clone()).collect();
    let mut deltas = Vec::new();

    for id in &old_ids {
        if !new_ids.contains(id) {
            deltas.push(ChangeDelta::Removed { id: id.clone() });
        }
    }

    for (index, doc) in new.iter().enumerate() {
        let id = doc.get("id").unwrap().clone();
        match old_ids.iter().position(|x| x == &id) {
            None => deltas.push(ChangeDelta::Added {
                doc: doc.clone(),
                index,
            }),
            Some(old_pos) => {
                if old[old_pos] != *doc {
                    deltas.push(ChangeDelta::Changed {
                        id: id.clone(),
                        old_doc: old[old_pos].clone(),
                        new_doc: doc.clone(),
                    });
                }
            }
        }
    }

    let common_old: Vec<&Bson> = old_ids.iter().filter(|id| new_ids.contains(id)).collect();
    let common_new: Vec<&Bson> = new_ids.iter().filter(|id| old_ids.contains(id)).collect();
    if common_old != common_new {
        for (i, id) in common_new.iter().enumerate() {
            let before_id = common_new.get(i + 1).map(|x| (*x).clone());
            deltas.push(ChangeDelta::MovedBefore {
                id: (*id).clone(),
                before_id,
            });
        }
    }

    deltas
}

fn evaluate_docs(
    docs: &[Document],
    providers: &[Box<dyn IndexProvider>],
    transform: Option<&Rc<dyn Fn(&Document) -> Document>>,
    selector: &Option<Selector>,
    options: &QueryOptions,
) -> Result<Vec<Document>, DbError> {
    let query = match selector {
        Some(s) => combine(s, providers),
        None => slate_engine::IndexQuery {
            positions: None,
            residual: None,
        },
    };

    let mut matched: Vec<&Document> = Vec::new();
    for doc in docs {
        let id = doc.get("id").expect("document always has id");
        if let Some(positions) = &query.positions {
            if !positions.contains(id) {
                continue;
            }
        }
        let keep = match &query.residual {
            Some(residual) => slate_query::matches(residual, doc)?,
            None => true,
        };
        if keep {
            matched.push(doc);
        }
    }

    if !options.sort.is_empty() {
        matched.sort_by(|a, b| compare_by_sort_keys(a, b, &options.sort));
    }

    let skipped: Vec<&Document> = matched.into_iter().skip(options.skip).collect();
    let limited: Vec<&Document> = match options.limit {
        Some(n) => skipped.into_iter().take(n).collect(),
        None => skipped,
    };

    let mut result: Vec<Document> = limited.into_iter().cloned().collect();

    if let Some(fields) = &options.fields {
        for doc in result.iter_mut() {
            *doc = project(doc, fields);
        }
    } else if let Some(transform) = transform {
        for doc in result.iter_mut() {
            *doc = transform(doc);
        }
    }

    Ok(result)
}

fn project(doc: &Document, projection: &Projection) -> Document {
    match projection {
        Projection::Include(fields) => {
            let mut out = Document::new();
            if let Some(id) = doc.get("id") {
                out.insert("id", id.clone());
            }
            for field in fields {
                if field == "id" {
                    continue;
                }
                if let Some(value) = doc.get(field) {
                    out.insert(field.clone(), value.clone());
                }
            }
            out
        }
        Projection::Exclude(fields) => {
            let mut out = doc.clone();
            for field in fields {
                out.remove(field);
            }
            out
        }
    }
}

fn compare_by_sort_keys(a: &Document, b: &Document, keys: &[slate_query::SortKey]) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    for key in keys {
        let va = slate_query::path::get(a, &key.field);
        let vb = slate_query::path::get(b, &key.field);
        let ord = compare_bson_opt(va, vb);
        let ord = if key.direction == slate_query::SortDirection::Desc {
            ord.reverse()
        } else {
            ord
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_bson_opt(a: Option<&Bson>, b: Option<&Bson>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_bson(x, y),
    }
}

fn compare_bson(a: &Bson, b: &Bson) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    if let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        Bson::DateTime(dt) => Some(dt.timestamp_millis() as f64),
        _ => None,
    }
}
