use bson::{Bson, Document};

use crate::error::StoreError;

/// Document-level persistence contract (spec §4.6). Implementations manage
/// one collection's worth of documents plus whatever secondary indexes have
/// been created on it; they know nothing about selectors or cursors.
pub trait StorageAdapter {
    /// Prepare the backing storage (create directories/column families,
    /// open files, etc). Must be idempotent.
    fn setup(&mut self) -> Result<(), StoreError>;

    /// Release any resources acquired by `setup`. Must be idempotent.
    fn teardown(&mut self) -> Result<(), StoreError>;

    /// Every document currently stored, in no particular order.
    fn read_all(&self) -> Result<Vec<Document>, StoreError>;

    /// Documents for the given ids. Order is not guaranteed; ids with no
    /// matching document are silently skipped.
    fn read_ids(&self, ids: &[Bson]) -> Result<Vec<Document>, StoreError>;

    /// Begin maintaining a secondary index on `field`. Idempotent. Fails
    /// with [`StoreError::InvalidIndexField`] for the `id` field.
    fn create_index(&mut self, field: &str) -> Result<(), StoreError>;

    /// Stop maintaining a secondary index on `field`. Idempotent.
    fn drop_index(&mut self, field: &str) -> Result<(), StoreError>;

    /// The full key → id-set map for `field`. Returns
    /// [`StoreError::IndexNotCreated`] if `field` has no index.
    fn read_index(&self, field: &str) -> Result<std::collections::HashMap<String, Vec<Bson>>, StoreError>;

    /// Insert new documents. Fails with [`StoreError::DuplicateId`] if any
    /// id already exists; no documents are inserted in that case.
    fn insert(&mut self, docs: &[Document]) -> Result<(), StoreError>;

    /// Replace documents in full, matched by their `id` field. Fails with
    /// [`StoreError::MissingId`] if any id is absent; no documents are
    /// replaced in that case.
    fn replace(&mut self, docs: &[Document]) -> Result<(), StoreError>;

    /// Remove documents by id. Fails with [`StoreError::MissingId`] if any
    /// id is absent; no documents are removed in that case.
    fn remove(&mut self, ids: &[Bson]) -> Result<(), StoreError>;

    /// Remove every document, dropping all indexes in the process.
    fn remove_all(&mut self) -> Result<(), StoreError>;
}
