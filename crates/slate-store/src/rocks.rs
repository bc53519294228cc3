//! Thin `StorageAdapter` over RocksDB: documents are stored JSON-encoded,
//! keyed by their canonical id string, in a dedicated column family. Each
//! secondary index is a single JSON-encoded key→id-set blob in its own
//! column family, rebuilt in full on every mutation — adequate for the
//! dataset sizes this crate targets, and far simpler than chasing RocksDB's
//! own secondary-index machinery.

use std::collections::HashMap;
use std::path::Path;

use bson::{Bson, Document};
use rocksdb::{MultiThreaded, OptimisticTransactionDB, Options};

use crate::adapter::StorageAdapter;
use crate::error::StoreError;
use crate::value::{canonical_id_string, canonical_value_string};

type DB = OptimisticTransactionDB<MultiThreaded>;

const ITEMS_CF: &str = "items";
const INDEX_CF_PREFIX: &str = "index:";

pub struct RocksStore {
    db: DB,
    indexed_fields: Vec<String>,
}

impl RocksStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut cfs = DB::list_cf(&opts, path).unwrap_or_default();
        if !cfs.iter().any(|cf| cf == ITEMS_CF) {
            cfs.push(ITEMS_CF.to_string());
        }

        let db = DB::open_cf(&opts, path, &cfs).map_err(|e| StoreError::Storage(e.to_string()))?;
        let indexed_fields = cfs
            .iter()
            .filter_map(|cf| cf.strip_prefix(INDEX_CF_PREFIX).map(str::to_string))
            .collect();

        Ok(Self { db, indexed_fields })
    }

    fn index_cf(field: &str) -> String {
        format!("{INDEX_CF_PREFIX}{field}")
    }

    fn read_index_blob(&self, field: &str) -> Result<HashMap<String, Vec<Bson>>, StoreError> {
        let cf = self
            .db
            .cf_handle(&Self::index_cf(field))
            .ok_or_else(|| StoreError::IndexNotCreated(field.to_string()))?;
        match self
            .db
            .get_cf(&cf, b"index")
            .map_err(|e| StoreError::Storage(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Storage(format!("corrupt index: {e}"))),
            None => Ok(HashMap::new()),
        }
    }

    fn write_index_blob(
        &self,
        field: &str,
        index: &HashMap<String, Vec<Bson>>,
    ) -> Result<(), StoreError> {
        let cf = self
            .db
            .cf_handle(&Self::index_cf(field))
            .ok_or_else(|| StoreError::IndexNotCreated(field.to_string()))?;
        let bytes = serde_json::to_vec(index)
            .map_err(|e| StoreError::Storage(format!("failed to encode index: {e}")))?;
        self.db
            .put_cf(&cf, b"index", bytes)
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn get_doc(&self, id: &Bson) -> Result<Option<Document>, StoreError> {
        let cf = self.db.cf_handle(ITEMS_CF).expect("items cf always exists");
        let key = canonical_id_string(id);
        match self
            .db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Storage(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Storage(format!("corrupt document: {e}"))),
            None => Ok(None),
        }
    }

    fn put_doc(&self, doc: &Document) -> Result<(), StoreError> {
        let cf = self.db.cf_handle(ITEMS_CF).expect("items cf always exists");
        let id = doc.get("id").expect("caller validated id presence");
        let key = canonical_id_string(id);
        let bytes = serde_json::to_vec(doc)
            .map_err(|e| StoreError::Storage(format!("failed to encode document: {e}")))?;
        self.db
            .put_cf(&cf, key.as_bytes(), bytes)
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn delete_doc(&self, id: &Bson) -> Result<(), StoreError> {
        let cf = self.db.cf_handle(ITEMS_CF).expect("items cf always exists");
        let key = canonical_id_string(id);
        self.db
            .delete_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn reindex(&self, id: &Bson, old: Option<&Document>, new: Option<&Document>) -> Result<(), StoreError> {
        for field in &self.indexed_fields {
            let mut index = self.read_index_blob(field)?;
            let old_value = old.and_then(|d| d.get(field));
            let new_value = new.and_then(|d| d.get(field));
            if old_value == new_value {
                continue;
            }
            if let Some(value) = old_value {
                let bucket = canonical_value_string(value);
                if let Some(ids) = index.get_mut(&bucket) {
                    ids.retain(|existing| existing != id);
                    if ids.is_empty() {
                        index.remove(&bucket);
                    }
                }
            }
            if let Some(value) = new_value {
                let bucket = canonical_value_string(value);
                index.entry(bucket).or_default().push(id.clone());
            }
            self.write_index_blob(field, &index)?;
        }
        Ok(())
    }
}

impl StorageAdapter for RocksStore {
    fn setup(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Document>, StoreError> {
        let cf = self.db.cf_handle(ITEMS_CF).expect("items cf always exists");
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Storage(e.to_string()))?;
            out.push(
                serde_json::from_slice(&value)
                    .map_err(|e| StoreError::Storage(format!("corrupt document: {e}")))?,
            );
        }
        Ok(out)
    }

    fn read_ids(&self, ids: &[Bson]) -> Result<Vec<Document>, StoreError> {
        let mut out = Vec::new();
        for id in ids {
            if let Some(doc) = self.get_doc(id)? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    fn create_index(&mut self, field: &str) -> Result<(), StoreError> {
        if field == "id" {
            return Err(StoreError::InvalidIndexField(field.to_string()));
        }
        if self.indexed_fields.iter().any(|f| f == field) {
            return Ok(());
        }
        let opts = Options::default();
        self.db
            .create_cf(Self::index_cf(field), &opts)
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        let mut index: HashMap<String, Vec<Bson>> = HashMap::new();
        for doc in self.read_all()? {
            if let (Some(id), Some(value)) = (doc.get("id"), doc.get(field)) {
                index
                    .entry(canonical_value_string(value))
                    .or_default()
                    .push(id.clone());
            }
        }
        self.indexed_fields.push(field.to_string());
        self.write_index_blob(field, &index)
    }

    fn drop_index(&mut self, field: &str) -> Result<(), StoreError> {
        self.indexed_fields.retain(|f| f != field);
        self.db
            .drop_cf(&Self::index_cf(field))
            .map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn read_index(&self, field: &str) -> Result<HashMap<String, Vec<Bson>>, StoreError> {
        self.read_index_blob(field)
    }

    fn insert(&mut self, docs: &[Document]) -> Result<(), StoreError> {
        for doc in docs {
            let id = doc
                .get("id")
                .ok_or_else(|| StoreError::Storage("document missing id field".to_string()))?;
            if self.get_doc(id)?.is_some() {
                return Err(StoreError::DuplicateId(canonical_id_string(id)));
            }
        }
        for doc in docs {
            let id = doc.get("id").unwrap().clone();
            self.put_doc(doc)?;
            self.reindex(&id, None, Some(doc))?;
        }
        Ok(())
    }

    fn replace(&mut self, docs: &[Document]) -> Result<(), StoreError> {
        for doc in docs {
            let id = doc
                .get("id")
                .ok_or_else(|| StoreError::Storage("document missing id field".to_string()))?;
            if self.get_doc(id)?.is_none() {
                return Err(StoreError::MissingId(canonical_id_string(id)));
            }
        }
        for doc in docs {
            let id = doc.get("id").unwrap().clone();
            let old = self.get_doc(&id)?;
            self.put_doc(doc)?;
            self.reindex(&id, old.as_ref(), Some(doc))?;
        }
        Ok(())
    }

    fn remove(&mut self, ids: &[Bson]) -> Result<(), StoreError> {
        for id in ids {
            if self.get_doc(id)?.is_none() {
                return Err(StoreError::MissingId(canonical_id_string(id)));
            }
        }
        for id in ids {
            let old = self.get_doc(id)?;
            self.delete_doc(id)?;
            self.reindex(id, old.as_ref(), None)?;
        }
        Ok(())
    }

    fn remove_all(&mut self) -> Result<(), StoreError> {
        let ids: Vec<Bson> = self
            .read_all()?
            .iter()
            .filter_map(|d| d.get("id").cloned())
            .collect();
        for id in &ids {
            self.delete_doc(id)?;
        }
        for field in self.indexed_fields.clone() {
            self.db
                .drop_cf(&Self::index_cf(&field))
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        self.indexed_fields.clear();
        Ok(())
    }
}
