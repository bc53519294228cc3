use std::collections::{BTreeMap, HashSet};

use bson::{Bson, Document};
use slate_query::Condition;

use crate::error::EngineError;
use crate::provider::{DocId, IndexProvider};

// ── Sortable encoding ──────────────────────────────────────────
//
// Index keys need numeric values encoded so that byte-level lexicographic
// comparison matches numeric ordering: XOR the sign bit for signed
// integers, then big-endian; for IEEE 754 doubles, flip the sign bit if
// positive or all bits if negative.

#[inline]
fn encode_i32_sortable(n: i32) -> [u8; 4] {
    ((n as u32) ^ 0x8000_0000).to_be_bytes()
}

#[inline]
fn encode_i64_sortable(n: i64) -> [u8; 8] {
    ((n as u64) ^ 0x8000_0000_0000_0000).to_be_bytes()
}

#[inline]
fn encode_f64_sortable(f: f64) -> [u8; 8] {
    let bits = f.to_bits();
    let encoded = if (bits & 0x8000_0000_0000_0000) != 0 {
        !bits
    } else {
        bits ^ 0x8000_0000_0000_0000
    };
    encoded.to_be_bytes()
}

/// Encode a value as `[type tag][sortable bytes]` for use as a `BTreeMap`
/// key. `None` for types this index doesn't cover (documents, arrays,
/// null, ...) — callers fall through to a full scan for those.
fn encode_sortable(value: &Bson) -> Option<Vec<u8>> {
    let (tag, bytes): (u8, Vec<u8>) = match value {
        Bson::String(s) => (2, s.as_bytes().to_vec()),
        Bson::Int32(n) => (16, encode_i32_sortable(*n).to_vec()),
        Bson::Int64(n) => (18, encode_i64_sortable(*n).to_vec()),
        Bson::Double(f) => (1, encode_f64_sortable(*f).to_vec()),
        Bson::DateTime(dt) => (9, encode_i64_sortable(dt.timestamp_millis()).to_vec()),
        Bson::Boolean(b) => (8, vec![*b as u8]),
        Bson::ObjectId(oid) => (7, oid.bytes().to_vec()),
        _ => return None,
    };
    let mut buf = Vec::with_capacity(1 + bytes.len());
    buf.push(tag);
    buf.extend(bytes);
    Some(buf)
}

/// The default index (spec §4.2): a mapping from a field's serialized value
/// to the set of ids holding that value. Array-valued fields are indexed
/// per element, giving `$eq`/`$in` the same "sequence contains the value"
/// semantics as the selector evaluator.
///
/// Values the sortable encoding doesn't cover (documents, arrays-of-arrays,
/// null) are simply never entered into the map; queries that need them fall
/// through to a full scan rather than returning a wrong answer.
pub struct EqualityIndex {
    field: String,
    entries: BTreeMap<Vec<u8>, HashSet<DocId>>,
}

impl EqualityIndex {
    pub fn new(field: impl Into<String>) -> Result<Self, EngineError> {
        let field = field.into();
        if field == "id" {
            return Err(EngineError::InvalidIndexField(field));
        }
        Ok(Self {
            field,
            entries: BTreeMap::new(),
        })
    }

    fn key(value: &Bson) -> Option<Vec<u8>> {
        encode_sortable(value)
    }

    fn values_at(doc: &Document, field: &str) -> Vec<Bson> {
        match slate_query::path::get(doc, field) {
            Some(Bson::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => vec![],
        }
    }

    fn doc_id(doc: &Document) -> DocId {
        doc.get("id").cloned().unwrap_or(Bson::Null)
    }

    fn index_doc(&mut self, doc: &Document) {
        let id = Self::doc_id(doc);
        for value in Self::values_at(doc, &self.field) {
            if let Some(key) = Self::key(&value) {
                self.entries.entry(key).or_default().insert(id.clone());
            }
        }
    }

    fn deindex_doc(&mut self, doc: &Document) {
        let id = Self::doc_id(doc);
        for value in Self::values_at(doc, &self.field) {
            if let Some(key) = Self::key(&value) {
                if let Some(set) = self.entries.get_mut(&key) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.entries.remove(&key);
                    }
                }
            }
        }
    }
}

impl IndexProvider for EqualityIndex {
    fn field(&self) -> &str {
        &self.field
    }

    fn rebuild(&mut self, documents: &[Document]) {
        self.entries.clear();
        for doc in documents {
            self.index_doc(doc);
        }
    }

    fn on_insert(&mut self, doc: &Document) {
        self.index_doc(doc);
    }

    fn on_update(&mut self, old_doc: &Document, new_doc: &Document) {
        self.deindex_doc(old_doc);
        self.index_doc(new_doc);
    }

    fn on_remove(&mut self, doc: &Document) {
        self.deindex_doc(doc);
    }

    fn query(&self, condition: &Condition) -> Option<HashSet<DocId>> {
        match condition {
            Condition::Eq(value) => {
                let key = Self::key(value)?;
                Some(self.entries.get(&key).cloned().unwrap_or_default())
            }
            Condition::In(values) => {
                let mut out = HashSet::new();
                for value in values {
                    let key = Self::key(value)?;
                    if let Some(set) = self.entries.get(&key) {
                        out.extend(set.iter().cloned());
                    }
                }
                Some(out)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn id_field_is_rejected() {
        assert!(EqualityIndex::new("id").is_err());
    }

    #[test]
    fn eq_and_in_are_answerable() {
        let docs = vec![
            doc! { "id": 1, "status": "active" },
            doc! { "id": 2, "status": "retired" },
            doc! { "id": 3, "status": "active" },
        ];
        let mut idx = EqualityIndex::new("status").unwrap();
        idx.rebuild(&docs);

        let eq = idx.query(&Condition::Eq(Bson::String("active".into()))).unwrap();
        assert_eq!(eq, HashSet::from([Bson::Int32(1), Bson::Int32(3)]));

        let inn = idx
            .query(&Condition::In(vec![Bson::String("retired".into())]))
            .unwrap();
        assert_eq!(inn, HashSet::from([Bson::Int32(2)]));
    }

    #[test]
    fn other_operators_fall_through() {
        let idx = EqualityIndex::new("status").unwrap();
        assert!(idx.query(&Condition::Exists(true)).is_none());
    }

    #[test]
    fn array_valued_field_is_indexed_per_element() {
        let docs = vec![doc! { "id": 1, "tags": ["rust", "db"] }];
        let mut idx = EqualityIndex::new("tags").unwrap();
        idx.rebuild(&docs);

        let eq = idx.query(&Condition::Eq(Bson::String("rust".into()))).unwrap();
        assert_eq!(eq, HashSet::from([Bson::Int32(1)]));
    }

    #[test]
    fn on_update_moves_membership() {
        let mut idx = EqualityIndex::new("status").unwrap();
        let old = doc! { "id": 1, "status": "active" };
        let new = doc! { "id": 1, "status": "retired" };
        idx.rebuild(&[old.clone()]);
        idx.on_update(&old, &new);

        assert!(idx
            .query(&Condition::Eq(Bson::String("active".into())))
            .unwrap()
            .is_empty());
        assert_eq!(
            idx.query(&Condition::Eq(Bson::String("retired".into()))).unwrap(),
            HashSet::from([Bson::Int32(1)])
        );
    }

    #[test]
    fn on_remove_drops_membership() {
        let mut idx = EqualityIndex::new("status").unwrap();
        let doc1 = doc! { "id": 1, "status": "active" };
        idx.rebuild(&[doc1.clone()]);
        idx.on_remove(&doc1);

        assert!(idx
            .query(&Condition::Eq(Bson::String("active".into())))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unsupported_value_type_falls_through() {
        let idx = EqualityIndex::new("meta").unwrap();
        assert!(idx.query(&Condition::Eq(Bson::Null)).is_none());
    }
}
