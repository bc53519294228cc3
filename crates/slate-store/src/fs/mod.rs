//! Generic sharded-file store (spec §4.6): one algorithm, parameterized by
//! a [`FilesystemDriver`], that every on-disk adapter variant reuses.

pub mod driver;

use std::collections::HashMap;

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::adapter::StorageAdapter;
use crate::error::StoreError;
use crate::value::{canonical_id_string, canonical_value_string, safe_name};

pub use driver::{FakeFilesystemDriver, FilesystemDriver, RealFilesystemDriver};

const REGISTRY_PATH: &str = "index/_registry.json";

#[derive(Serialize, Deserialize, Clone)]
struct IndexEntry {
    key: Bson,
    ids: Vec<Bson>,
}

pub struct FsStore<D: FilesystemDriver> {
    driver: D,
    ready: bool,
    indexed_fields: Vec<String>,
    pending_indexes: Vec<String>,
}

impl<D: FilesystemDriver> FsStore<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            ready: false,
            indexed_fields: Vec::new(),
            pending_indexes: Vec::new(),
        }
    }

    fn require_ready(&self) -> Result<(), StoreError> {
        if self.ready {
            Ok(())
        } else {
            Err(StoreError::Storage("store has not been set up".to_string()))
        }
    }

    fn item_path(id: &Bson) -> String {
        let canonical = canonical_id_string(id);
        let prefix2 = safe_name(&take_chars(&canonical, 2));
        let prefix4 = safe_name(&take_chars(&canonical, 4));
        let full = safe_name(&canonical);
        format!("items/{prefix2}/{prefix4}/{full}")
    }

    fn index_dir(field: &str) -> String {
        format!("index/{}", safe_name(field))
    }

    fn index_bucket_path(field: &str, key: &Bson) -> String {
        let key_str = canonical_value_string(key);
        let bucket = safe_name(&take_chars(&key_str, 2));
        format!("{}/{}", Self::index_dir(field), bucket)
    }

    fn read_item_file(&self, path: &str) -> Result<Vec<Document>, StoreError> {
        match self.driver.read_file(path)? {
            None => Ok(Vec::new()),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Storage(format!("corrupt item file {path}: {e}"))),
        }
    }

    fn write_item_file(&mut self, path: &str, docs: &[Document]) -> Result<(), StoreError> {
        if docs.is_empty() {
            return self.driver.delete_file(path);
        }
        let bytes = serde_json::to_vec(docs)
            .map_err(|e| StoreError::Storage(format!("failed to encode item file: {e}")))?;
        self.driver.write_file(path, &bytes)
    }

    fn read_bucket_file(&self, path: &str) -> Result<Vec<IndexEntry>, StoreError> {
        match self.driver.read_file(path)? {
            None => Ok(Vec::new()),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Storage(format!("corrupt index bucket {path}: {e}"))),
        }
    }

    fn write_bucket_file(&mut self, path: &str, entries: &[IndexEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return self.driver.delete_file(path);
        }
        let bytes = serde_json::to_vec(entries)
            .map_err(|e| StoreError::Storage(format!("failed to encode index bucket: {e}")))?;
        self.driver.write_file(path, &bytes)
    }

    fn persist_registry(&mut self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&self.indexed_fields)
            .map_err(|e| StoreError::Storage(format!("failed to encode index registry: {e}")))?;
        self.driver.write_file(REGISTRY_PATH, &bytes)
    }

    fn bucket_add(&mut self, field: &str, key: &Bson, id: &Bson) -> Result<(), StoreError> {
        let path = Self::index_bucket_path(field, key);
        let mut entries = self.read_bucket_file(&path)?;
        match entries.iter_mut().find(|e| &e.key == key) {
            Some(entry) => {
                if !entry.ids.contains(id) {
                    entry.ids.push(id.clone());
                }
            }
            None => entries.push(IndexEntry {
                key: key.clone(),
                ids: vec![id.clone()],
            }),
        }
        self.write_bucket_file(&path, &entries)
    }

    fn bucket_remove(&mut self, field: &str, key: &Bson, id: &Bson) -> Result<(), StoreError> {
        let path = Self::index_bucket_path(field, key);
        let mut entries = self.read_bucket_file(&path)?;
        if let Some(entry) = entries.iter_mut().find(|e| &e.key == key) {
            entry.ids.retain(|existing| existing != id);
        }
        entries.retain(|e| !e.ids.is_empty());
        self.write_bucket_file(&path, &entries)
    }

    fn apply_index_delta(
        &mut self,
        field: &str,
        id: &Bson,
        old_value: Option<&Bson>,
        new_value: Option<&Bson>,
    ) -> Result<(), StoreError> {
        if old_value == new_value {
            return Ok(());
        }
        if let Some(old) = old_value {
            self.bucket_remove(field, old, id)?;
        }
        if let Some(new) = new_value {
            self.bucket_add(field, new, id)?;
        }
        Ok(())
    }

    fn build_index_from_scratch(&mut self, field: &str) -> Result<(), StoreError> {
        for doc in self.read_all()? {
            let id = doc
                .get("id")
                .cloned()
                .ok_or_else(|| StoreError::Storage("document missing id field".to_string()))?;
            if let Some(value) = doc.get(field).cloned() {
                self.bucket_add(field, &value, &id)?;
            }
        }
        Ok(())
    }
}

fn take_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

impl<D: FilesystemDriver> StorageAdapter for FsStore<D> {
    fn setup(&mut self) -> Result<(), StoreError> {
        if let Some(bytes) = self.driver.read_file(REGISTRY_PATH)? {
            self.indexed_fields = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Storage(format!("corrupt index registry: {e}")))?;
        }
        self.ready = true;

        let pending = std::mem::take(&mut self.pending_indexes);
        for field in pending {
            self.create_index(&field)?;
        }
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), StoreError> {
        self.ready = false;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<Document>, StoreError> {
        self.require_ready()?;
        let mut out = Vec::new();
        for path in self.driver.list_files_under("items")? {
            out.extend(self.read_item_file(&path)?);
        }
        Ok(out)
    }

    fn read_ids(&self, ids: &[Bson]) -> Result<Vec<Document>, StoreError> {
        self.require_ready()?;
        let mut out = Vec::new();
        for id in ids {
            let path = Self::item_path(id);
            for doc in self.read_item_file(&path)? {
                if doc.get("id") == Some(id) {
                    out.push(doc);
                }
            }
        }
        Ok(out)
    }

    fn create_index(&mut self, field: &str) -> Result<(), StoreError> {
        if field == "id" {
            return Err(StoreError::InvalidIndexField(field.to_string()));
        }
        if !self.ready {
            if !self.pending_indexes.iter().any(|f| f == field) {
                self.pending_indexes.push(field.to_string());
            }
            return Ok(());
        }
        if self.indexed_fields.iter().any(|f| f == field) {
            return Ok(());
        }
        self.build_index_from_scratch(field)?;
        self.indexed_fields.push(field.to_string());
        self.persist_registry()
    }

    fn drop_index(&mut self, field: &str) -> Result<(), StoreError> {
        self.indexed_fields.retain(|f| f != field);
        self.pending_indexes.retain(|f| f != field);
        self.driver.remove_dir_all(&Self::index_dir(field))?;
        if self.ready {
            self.persist_registry()?;
        }
        Ok(())
    }

    fn read_index(&self, field: &str) -> Result<HashMap<String, Vec<Bson>>, StoreError> {
        self.require_ready()?;
        if !self.indexed_fields.iter().any(|f| f == field) {
            return Err(StoreError::IndexNotCreated(field.to_string()));
        }
        let mut result: HashMap<String, Vec<Bson>> = HashMap::new();
        for path in self.driver.list_files_under(&Self::index_dir(field))? {
            for entry in self.read_bucket_file(&path)? {
                result
                    .entry(canonical_value_string(&entry.key))
                    .or_default()
                    .extend(entry.ids);
            }
        }
        Ok(result)
    }

    fn insert(&mut self, docs: &[Document]) -> Result<(), StoreError> {
        self.require_ready()?;
        for doc in docs {
            let id = doc
                .get("id")
                .ok_or_else(|| StoreError::Storage("document missing id field".to_string()))?;
            let path = Self::item_path(id);
            let existing = self.read_item_file(&path)?;
            if existing.iter().any(|d| d.get("id") == Some(id)) {
                return Err(StoreError::DuplicateId(canonical_id_string(id)));
            }
        }
        for doc in docs {
            let id = doc.get("id").unwrap().clone();
            let path = Self::item_path(&id);
            let mut existing = self.read_item_file(&path)?;
            existing.push(doc.clone());
            self.write_item_file(&path, &existing)?;

            let fields: Vec<String> = self.indexed_fields.clone();
            for field in fields {
                if let Some(value) = doc.get(&field).cloned() {
                    self.apply_index_delta(&field, &id, None, Some(&value))?;
                }
            }
        }
        Ok(())
    }

    fn replace(&mut self, docs: &[Document]) -> Result<(), StoreError> {
        self.require_ready()?;
        for doc in docs {
            let id = doc
                .get("id")
                .ok_or_else(|| StoreError::Storage("document missing id field".to_string()))?;
            let path = Self::item_path(id);
            let existing = self.read_item_file(&path)?;
            if !existing.iter().any(|d| d.get("id") == Some(id)) {
                return Err(StoreError::MissingId(canonical_id_string(id)));
            }
        }
        for doc in docs {
            let id = doc.get("id").unwrap().clone();
            let path = Self::item_path(&id);
            let mut existing = self.read_item_file(&path)?;
            let old_doc = existing
                .iter()
                .position(|d| d.get("id") == Some(&id))
                .map(|i| existing.remove(i));
            existing.push(doc.clone());
            self.write_item_file(&path, &existing)?;

            let fields: Vec<String> = self.indexed_fields.clone();
            for field in fields {
                let old_value = old_doc.as_ref().and_then(|d| d.get(&field).cloned());
                let new_value = doc.get(&field).cloned();
                self.apply_index_delta(&field, &id, old_value.as_ref(), new_value.as_ref())?;
            }
        }
        Ok(())
    }

    fn remove(&mut self, ids: &[Bson]) -> Result<(), StoreError> {
        self.require_ready()?;
        for id in ids {
            let path = Self::item_path(id);
            let existing = self.read_item_file(&path)?;
            if !existing.iter().any(|d| d.get("id") == Some(id)) {
                return Err(StoreError::MissingId(canonical_id_string(id)));
            }
        }
        for id in ids {
            let path = Self::item_path(id);
            let mut existing = self.read_item_file(&path)?;
            let removed = existing
                .iter()
                .position(|d| d.get("id") == Some(id))
                .map(|i| existing.remove(i));
            self.write_item_file(&path, &existing)?;

            if let Some(doc) = removed {
                let fields: Vec<String> = self.indexed_fields.clone();
                for field in fields {
                    if let Some(value) = doc.get(&field).cloned() {
                        self.apply_index_delta(&field, id, Some(&value), None)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn remove_all(&mut self) -> Result<(), StoreError> {
        self.require_ready()?;
        self.driver.remove_dir_all("items")?;
        self.driver.remove_dir_all("index")?;
        self.indexed_fields.clear();
        self.pending_indexes.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn store() -> FsStore<FakeFilesystemDriver> {
        let mut store = FsStore::new(FakeFilesystemDriver::new());
        store.setup().unwrap();
        store
    }

    #[test]
    fn insert_read_all_round_trip() {
        let mut store = store();
        store.insert(&[doc! {"id": 1, "name": "a"}]).unwrap();
        store.insert(&[doc! {"id": 2, "name": "b"}]).unwrap();
        let all = store.read_all().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn duplicate_insert_fails_and_is_all_or_nothing() {
        let mut store = store();
        store.insert(&[doc! {"id": 1}]).unwrap();
        let result = store.insert(&[doc! {"id": 2}, doc! {"id": 1}]);
        assert!(matches!(result, Err(StoreError::DuplicateId(_))));
        assert_eq!(store.read_all().unwrap().len(), 1);
    }

    #[test]
    fn unsafe_ids_produce_no_unsafe_filenames() {
        let mut store = store();
        store
            .insert(&[doc! {"id": "CON<>bad::name ", "name": "a"}])
            .unwrap();
        store
            .insert(&[doc! {"id": {"nested": "id"}, "name": "b"}])
            .unwrap();
        assert_eq!(store.read_all().unwrap().len(), 2);

        let unsafe_chars = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
        for path in store.driver.file_paths() {
            let segments: Vec<&str> = path.split('/').collect();
            for segment in segments {
                assert!(!segment.chars().any(|c| unsafe_chars.contains(&c) && segment != path));
            }
        }
    }

    #[test]
    fn drop_index_then_read_index_fails() {
        let mut store = store();
        store.create_index("name").unwrap();
        store.insert(&[doc! {"id": 1, "name": "a"}]).unwrap();
        store.drop_index("name").unwrap();
        assert!(matches!(
            store.read_index("name"),
            Err(StoreError::IndexNotCreated(_))
        ));
    }

    #[test]
    fn index_created_before_setup_is_honored_on_setup() {
        let mut store = FsStore::new(FakeFilesystemDriver::new());
        store.create_index("type").unwrap();
        store.setup().unwrap();
        store.insert(&[doc! {"id": 1, "type": "kitten"}]).unwrap();
        let index = store.read_index("type").unwrap();
        assert_eq!(index.get("s:kitten").unwrap(), &vec![Bson::Int32(1)]);
    }

    #[test]
    fn id_is_not_a_valid_index_field() {
        let mut store = store();
        assert!(matches!(
            store.create_index("id"),
            Err(StoreError::InvalidIndexField(_))
        ));
    }

    #[test]
    fn remove_all_deletes_everything_and_drops_indexes() {
        let mut store = store();
        store.create_index("type").unwrap();
        store.insert(&[doc! {"id": 1, "type": "kitten"}]).unwrap();
        store.remove_all().unwrap();
        assert_eq!(store.read_all().unwrap().len(), 0);
        assert!(matches!(
            store.read_index("type"),
            Err(StoreError::IndexNotCreated(_))
        ));
    }

    #[test]
    fn index_delta_follows_replace_and_remove() {
        let mut store = store();
        store.create_index("type").unwrap();
        store.insert(&[doc! {"id": 1, "type": "kitten"}]).unwrap();
        store.replace(&[doc! {"id": 1, "type": "crypt"}]).unwrap();

        let index = store.read_index("type").unwrap();
        assert!(!index.contains_key("s:kitten"));
        assert_eq!(index.get("s:crypt").unwrap(), &vec![Bson::Int32(1)]);

        store.remove(&[Bson::Int32(1)]).unwrap();
        let index = store.read_index("type").unwrap();
        assert!(!index.contains_key("s:crypt"));
    }
}
