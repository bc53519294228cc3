use bson::{oid::ObjectId, Bson, Document};

/// Returns the document's `id` field, synthesizing a fresh [`ObjectId`] and
/// inserting it if absent (spec §4.3 `insert`).
pub fn ensure_id(doc: &mut Document) -> Bson {
    if let Some(id) = doc.get("id") {
        return id.clone();
    }
    let id = Bson::ObjectId(ObjectId::new());
    doc.insert("id", id.clone());
    id
}

pub fn canonical_id(id: &Bson) -> String {
    slate_store::canonical_id_string(id)
}
