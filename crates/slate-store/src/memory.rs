//! Default/test storage adapter, backed by an in-memory copy-on-write map
//! (the teacher's `imbl::OrdMap` technique, simplified to the single-threaded
//! model this crate targets — no transactions or concurrent writers).

use std::cell::RefCell;
use std::collections::HashMap;

use bson::{Bson, Document};
use imbl::OrdMap;

use crate::adapter::StorageAdapter;
use crate::error::StoreError;
use crate::value::canonical_id_string;

type IndexMap = HashMap<String, OrdMap<String, imbl::HashSet<String>>>;

#[derive(Default)]
pub struct MemoryStore {
    documents: RefCell<OrdMap<String, Document>>,
    indexes: RefCell<IndexMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn doc_id(doc: &Document) -> Result<Bson, StoreError> {
        doc.get("id")
            .cloned()
            .ok_or_else(|| StoreError::Storage("document missing id field".to_string()))
    }

    fn index_value(doc: &Document, field: &str) -> Option<Bson> {
        doc.get(field).cloned()
    }

    fn reindex_insert(&self, key: &str, doc: &Document) {
        let mut indexes = self.indexes.borrow_mut();
        for (field, buckets) in indexes.iter_mut() {
            if let Some(value) = Self::index_value(doc, field) {
                let bucket_key = crate::value::canonical_value_string(&value);
                buckets
                    .entry(bucket_key)
                    .or_insert_with(imbl::HashSet::new)
                    .insert(key.to_string());
            }
        }
    }

    fn reindex_remove(&self, key: &str, doc: &Document) {
        let mut indexes = self.indexes.borrow_mut();
        for (field, buckets) in indexes.iter_mut() {
            if let Some(value) = Self::index_value(doc, field) {
                let bucket_key = crate::value::canonical_value_string(&value);
                if let Some(set) = buckets.get_mut(&bucket_key) {
                    set.remove(key);
                    if set.is_empty() {
                        buckets.remove(&bucket_key);
                    }
                }
            }
        }
    }
}

impl StorageAdapter for MemoryStore {
    fn setup(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.documents.borrow().values().cloned().collect())
    }

    fn read_ids(&self, ids: &[Bson]) -> Result<Vec<Document>, StoreError> {
        let documents = self.documents.borrow();
        Ok(ids
            .iter()
            .filter_map(|id| documents.get(&canonical_id_string(id)).cloned())
            .collect())
    }

    fn create_index(&mut self, field: &str) -> Result<(), StoreError> {
        if field == "id" {
            return Err(StoreError::InvalidIndexField(field.to_string()));
        }
        let mut indexes = self.indexes.borrow_mut();
        if indexes.contains_key(field) {
            return Ok(());
        }
        let mut buckets = OrdMap::new();
        for (key, doc) in self.documents.borrow().iter() {
            if let Some(value) = Self::index_value(doc, field) {
                let bucket_key = crate::value::canonical_value_string(&value);
                buckets
                    .entry(bucket_key)
                    .or_insert_with(imbl::HashSet::new)
                    .insert(key.clone());
            }
        }
        indexes.insert(field.to_string(), buckets);
        Ok(())
    }

    fn drop_index(&mut self, field: &str) -> Result<(), StoreError> {
        self.indexes.borrow_mut().remove(field);
        Ok(())
    }

    fn read_index(&self, field: &str) -> Result<HashMap<String, Vec<Bson>>, StoreError> {
        let indexes = self.indexes.borrow();
        let buckets = indexes
            .get(field)
            .ok_or_else(|| StoreError::IndexNotCreated(field.to_string()))?;
        let documents = self.documents.borrow();
        let mut result = HashMap::new();
        for (key, ids) in buckets.iter() {
            let values: Vec<Bson> = ids
                .iter()
                .filter_map(|id| documents.get(id))
                .filter_map(Self::doc_id_opt)
                .collect();
            result.insert(key.clone(), values);
        }
        Ok(result)
    }

    fn insert(&mut self, docs: &[Document]) -> Result<(), StoreError> {
        let mut keys = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = Self::doc_id(doc)?;
            let key = canonical_id_string(&id);
            if self.documents.borrow().contains_key(&key) {
                return Err(StoreError::DuplicateId(key));
            }
            keys.push(key);
        }
        for (key, doc) in keys.into_iter().zip(docs) {
            self.documents.borrow_mut().insert(key.clone(), doc.clone());
            self.reindex_insert(&key, doc);
        }
        Ok(())
    }

    fn replace(&mut self, docs: &[Document]) -> Result<(), StoreError> {
        let mut keys = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = Self::doc_id(doc)?;
            let key = canonical_id_string(&id);
            if !self.documents.borrow().contains_key(&key) {
                return Err(StoreError::MissingId(key));
            }
            keys.push(key);
        }
        for (key, doc) in keys.into_iter().zip(docs) {
            let old = self.documents.borrow_mut().insert(key.clone(), doc.clone());
            if let Some(old) = old {
                self.reindex_remove(&key, &old);
            }
            self.reindex_insert(&key, doc);
        }
        Ok(())
    }

    fn remove(&mut self, ids: &[Bson]) -> Result<(), StoreError> {
        let keys: Vec<String> = ids.iter().map(canonical_id_string).collect();
        for key in &keys {
            if !self.documents.borrow().contains_key(key) {
                return Err(StoreError::MissingId(key.clone()));
            }
        }
        for key in keys {
            if let Some(doc) = self.documents.borrow_mut().remove(&key) {
                self.reindex_remove(&key, &doc);
            }
        }
        Ok(())
    }

    fn remove_all(&mut self) -> Result<(), StoreError> {
        self.documents.borrow_mut().clear();
        self.indexes.borrow_mut().clear();
        Ok(())
    }
}

impl MemoryStore {
    fn doc_id_opt(doc: &Document) -> Option<Bson> {
        doc.get("id").cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn insert_and_read_all() {
        let mut store = MemoryStore::new();
        store.insert(&[doc! {"id": 1, "name": "a"}]).unwrap();
        store.insert(&[doc! {"id": 2, "name": "b"}]).unwrap();
        assert_eq!(store.read_all().unwrap().len(), 2);
    }

    #[test]
    fn duplicate_insert_fails() {
        let mut store = MemoryStore::new();
        store.insert(&[doc! {"id": 1}]).unwrap();
        assert!(matches!(
            store.insert(&[doc! {"id": 1}]),
            Err(StoreError::DuplicateId(_))
        ));
    }

    #[test]
    fn replace_missing_fails() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.replace(&[doc! {"id": 1}]),
            Err(StoreError::MissingId(_))
        ));
    }

    #[test]
    fn id_is_not_a_valid_index_field() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.create_index("id"),
            Err(StoreError::InvalidIndexField(_))
        ));
    }

    #[test]
    fn index_tracks_inserts_updates_and_removes() {
        let mut store = MemoryStore::new();
        store.create_index("type").unwrap();
        store.insert(&[doc! {"id": 1, "type": "kitten"}]).unwrap();
        store.insert(&[doc! {"id": 2, "type": "kitten"}]).unwrap();

        let index = store.read_index("type").unwrap();
        assert_eq!(index.get("s:kitten").unwrap().len(), 2);

        store.replace(&[doc! {"id": 1, "type": "crypt"}]).unwrap();
        let index = store.read_index("type").unwrap();
        assert_eq!(index.get("s:kitten").unwrap().len(), 1);
        assert_eq!(index.get("s:crypt").unwrap().len(), 1);

        store.remove(&[Bson::Int32(2)]).unwrap();
        let index = store.read_index("type").unwrap();
        assert_eq!(index.get("s:kitten"), None);
    }

    #[test]
    fn remove_all_drops_indexes() {
        let mut store = MemoryStore::new();
        store.create_index("type").unwrap();
        store.insert(&[doc! {"id": 1, "type": "kitten"}]).unwrap();
        store.remove_all().unwrap();
        assert!(matches!(
            store.read_index("type"),
            Err(StoreError::IndexNotCreated(_))
        ));
    }
}
