//! Thin `StorageAdapter` over redb, mirroring [`crate::rocks::RocksStore`]:
//! JSON-encoded documents keyed by canonical id string in an `items` table,
//! one JSON-encoded key→id-set blob per indexed field in its own table.

use std::collections::HashMap;
use std::path::Path;

use bson::{Bson, Document};
use redb::{Database, ReadableTable, TableDefinition};

use crate::adapter::StorageAdapter;
use crate::error::StoreError;
use crate::value::{canonical_id_string, canonical_value_string};

const ITEMS_TABLE: TableDefinition<'_, &str, &[u8]> = TableDefinition::new("items");
const INDEX_KEY: &str = "index";

fn index_table_name(field: &str) -> String {
    format!("index:{field}")
}

fn index_table(name: &str) -> TableDefinition<'_, &str, &[u8]> {
    TableDefinition::new(name)
}

pub struct RedbStore {
    db: Database,
    indexed_fields: Vec<String>,
}

impl RedbStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(|e| StoreError::Storage(e.to_string()))?;
        let write = db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
        write
            .open_table(ITEMS_TABLE)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        write.commit().map_err(|e| StoreError::Storage(e.to_string()))?;

        let indexed_fields = db
            .begin_read()
            .map_err(|e| StoreError::Storage(e.to_string()))?
            .list_tables()
            .map_err(|e| StoreError::Storage(e.to_string()))?
            .filter_map(|t| t.name().strip_prefix("index:").map(str::to_string))
            .collect();

        Ok(Self { db, indexed_fields })
    }

    fn read_index_blob(&self, field: &str) -> Result<HashMap<String, Vec<Bson>>, StoreError> {
        if !self.indexed_fields.iter().any(|f| f == field) {
            return Err(StoreError::IndexNotCreated(field.to_string()));
        }
        let read = self.db.begin_read().map_err(|e| StoreError::Storage(e.to_string()))?;
        let name = index_table_name(field);
        let table = read
            .open_table(index_table(&name))
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        match table
            .get(INDEX_KEY)
            .map_err(|e| StoreError::Storage(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(bytes.value())
                .map_err(|e| StoreError::Storage(format!("corrupt index: {e}"))),
            None => Ok(HashMap::new()),
        }
    }

    fn write_index_blob(
        &self,
        field: &str,
        index: &HashMap<String, Vec<Bson>>,
    ) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(index)
            .map_err(|e| StoreError::Storage(format!("failed to encode index: {e}")))?;
        let write = self.db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
        let name = index_table_name(field);
        {
            let mut table = write
                .open_table(index_table(&name))
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            table
                .insert(INDEX_KEY, bytes.as_slice())
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        write.commit().map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn get_doc(&self, id: &Bson) -> Result<Option<Document>, StoreError> {
        let key = canonical_id_string(id);
        let read = self.db.begin_read().map_err(|e| StoreError::Storage(e.to_string()))?;
        let table = read
            .open_table(ITEMS_TABLE)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        match table
            .get(key.as_str())
            .map_err(|e| StoreError::Storage(e.to_string()))?
        {
            Some(bytes) => serde_json::from_slice(bytes.value())
                .map(Some)
                .map_err(|e| StoreError::Storage(format!("corrupt document: {e}"))),
            None => Ok(None),
        }
    }

    fn put_doc(&self, doc: &Document) -> Result<(), StoreError> {
        let id = doc.get("id").expect("caller validated id presence");
        let key = canonical_id_string(id);
        let bytes = serde_json::to_vec(doc)
            .map_err(|e| StoreError::Storage(format!("failed to encode document: {e}")))?;
        let write = self.db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
        {
            let mut table = write
                .open_table(ITEMS_TABLE)
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        write.commit().map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn delete_doc(&self, id: &Bson) -> Result<(), StoreError> {
        let key = canonical_id_string(id);
        let write = self.db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
        {
            let mut table = write
                .open_table(ITEMS_TABLE)
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            table
                .remove(key.as_str())
                .map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        write.commit().map_err(|e| StoreError::Storage(e.to_string()))
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

impl StorageAdapter for RedbStore {
    fn setup(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Document>, StoreError> {
        let read = self.db.begin_read().map_err(|e| StoreError::Storage(e.to_string()))?;
        let table = read
            .open_table(ITEMS_TABLE)
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::Storage(e.to_string()))? {
            let (_, value) = entry.map_err(|e| StoreError::Storage(e.to_string()))?;
            out.push(
                serde_json::from_slice(value.value())
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
        let write = self.db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
        let name = index_table_name(field);
        write
            .delete_table(index_table(&name))
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        write.commit().map_err(|e| StoreError::Storage(e.to_string()))
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
            let write = self.db.begin_write().map_err(|e| StoreError::Storage(e.to_string()))?;
            let name = index_table_name(&field);
            write
                .delete_table(index_table(&name))
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            write.commit().map_err(|e| StoreError::Storage(e.to_string()))?;
        }
        self.indexed_fields.clear();
        Ok(())
    }
}
