//! A client-side, in-memory document store: MongoDB-style queries, reactive
//! cursors, a pluggable storage adapter, and a sync manager reconciling
//! local state against a remote source of truth. This crate just
//! re-exports the pieces from its component crates under one name.

pub use slate_db::{
    default_registry, Bson, ChangeDelta, Collection, CollectionEvent, CollectionState, Cursor,
    DbError, DebugEvent, Document, FindOptions, MemoryStore, NullReactivity, Projection, Registry,
    ReactivityAdapter, SortDirection, SortKey, StorageAdapter, UpdateOptions,
};
pub use slate_engine::{combine, DocId, EngineError, EqualityIndex, IndexProvider, IndexQuery};
pub use slate_query::{
    apply, matches, parse_modifier, parse_selector, ApplyContext, ArrayFilter, FieldCondition,
    FieldMutation, FieldUpdate, Modifier, PopDirection, PullSpec, Query, QueryError, QueryOptions,
    Selector,
};
pub use slate_reactive::{CountingDependency, Dependency, ManualReactivity};
pub use slate_store::{
    canonical_id_string, canonical_value_string, safe_name, FakeFilesystemDriver,
    FilesystemDriver, FsStore, RealFilesystemDriver, StoreError,
};
#[cfg(feature = "rocksdb")]
pub use slate_store::RocksStore;
#[cfg(feature = "redb")]
pub use slate_store::RedbStore;
pub use slate_sync::{
    backoff_delay, compact, ChangeOp, ChangeSet, PullResult, RawChange, Reconciliation, SyncContext,
    SyncEndpoints, SyncError, SyncManager, TaskSerializer,
};
