use std::collections::{HashMap, HashSet};

use bson::{doc, Bson, Document};

/// A single mutation as recorded in the `changes` collection (spec §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Remove,
}

impl ChangeOp {
    fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Remove => "remove",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(ChangeOp::Insert),
            "update" => Some(ChangeOp::Update),
            "remove" => Some(ChangeOp::Remove),
            _ => None,
        }
    }
}

/// One raw, uncompacted entry from a collection's change log.
#[derive(Debug, Clone)]
pub struct RawChange {
    pub collection: String,
    pub op: ChangeOp,
    pub doc_id: Bson,
    pub doc: Option<Document>,
    pub fields: Vec<String>,
    pub time: i64,
}

impl RawChange {
    pub(crate) fn to_document(&self, seq: u64) -> Document {
        let mut out = doc! {
            "id": seq.to_string(),
            "collectionName": self.collection.clone(),
            "op": self.op.as_str(),
            "docId": self.doc_id.clone(),
            "fields": self.fields.clone(),
            "time": self.time,
        };
        if let Some(d) = &self.doc {
            out.insert("doc", d.clone());
        }
        out
    }

    pub(crate) fn from_document(doc: &Document) -> Option<RawChange> {
        Some(RawChange {
            collection: doc.get_str("collectionName").ok()?.to_string(),
            op: ChangeOp::from_str(doc.get_str("op").ok()?)?,
            doc_id: doc.get("docId")?.clone(),
            doc: doc.get_document("doc").ok().cloned(),
            fields: doc
                .get_array("fields")
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
            time: doc.get_i64("time").ok()?,
        })
    }
}

/// The compacted view of a run of raw changes (spec §4.7 step 3).
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub added: Vec<Document>,
    pub modified: Vec<(Bson, Document)>,
    pub removed: Vec<Bson>,
    pub modified_fields: HashMap<String, HashSet<String>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

enum PendingState {
    Added(Document),
    Modified(Document),
    Removed,
}

/// Folds a time-ordered run of raw changes into a single change set,
/// following the rules of spec.md §4.7 step 3: inserts not followed by a
/// remove become `added`; updates to an already-added doc fold into it; a
/// remove cancels a preceding insert within the same run; otherwise the
/// last-seen state of each id produces the appropriate bucket.
pub fn compact(raw: &[RawChange]) -> ChangeSet {
    let mut order: Vec<String> = Vec::new();
    let mut states: HashMap<String, (Bson, PendingState)> = HashMap::new();
    let mut modified_fields: HashMap<String, HashSet<String>> = HashMap::new();

    let mut sorted: Vec<&RawChange> = raw.iter().collect();
    sorted.sort_by_key(|c| c.time);

    for change in sorted {
        let key = slate_db::canonical_id(&change.doc_id);
        match change.op {
            ChangeOp::Insert => {
                if !states.contains_key(&key) {
                    order.push(key.clone());
                }
                let doc = change.doc.clone().unwrap_or_default();
                states.insert(key, (change.doc_id.clone(), PendingState::Added(doc)));
            }
            ChangeOp::Update => {
                let doc = change.doc.clone().unwrap_or_default();
                modified_fields
                    .entry(key.clone())
                    .or_default()
                    .extend(change.fields.iter().cloned());
                match states.get_mut(&key) {
                    Some((_, PendingState::Added(existing))) => {
                        *existing = doc;
                    }
                    Some((_, state)) => {
                        *state = PendingState::Modified(doc);
                    }
                    None => {
                        order.push(key.clone());
                        states.insert(key, (change.doc_id.clone(), PendingState::Modified(doc)));
                    }
                }
            }
            ChangeOp::Remove => match states.get(&key) {
                Some((_, PendingState::Added(_))) => {
                    states.remove(&key);
                    modified_fields.remove(&key);
                    order.retain(|k| k != &key);
                }
                _ => {
                    states.insert(key.clone(), (change.doc_id.clone(), PendingState::Removed));
                    if !order.contains(&key) {
                        order.push(key);
                    }
                }
            },
        }
    }

    let mut out = ChangeSet::default();
    for key in order {
        let Some((id, state)) = states.remove(&key) else {
            continue;
        };
        match state {
            PendingState::Added(doc) => out.added.push(doc),
            PendingState::Modified(doc) => {
                if let Some(fields) = modified_fields.remove(&key) {
                    out.modified_fields.insert(key.clone(), fields);
                }
                out.modified.push((id, doc));
            }
            PendingState::Removed => out.removed.push(id),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(op: ChangeOp, id: &str, doc: Option<Document>, fields: &[&str], time: i64) -> RawChange {
        RawChange {
            collection: "widgets".to_string(),
            op,
            doc_id: Bson::String(id.to_string()),
            doc,
            fields: fields.iter().map(|s| s.to_string()).collect(),
            time,
        }
    }

    #[test]
    fn insert_then_remove_in_same_run_cancels_out() {
        let raw = vec![
            change(ChangeOp::Insert, "a", Some(doc! {"id": "a"}), &[], 1),
            change(ChangeOp::Remove, "a", None, &[], 2),
        ];
        let set = compact(&raw);
        assert!(set.is_empty());
    }

    #[test]
    fn update_after_insert_folds_into_added() {
        let raw = vec![
            change(ChangeOp::Insert, "a", Some(doc! {"id": "a", "n": 1}), &[], 1),
            change(ChangeOp::Update, "a", Some(doc! {"id": "a", "n": 2}), &["n"], 2),
        ];
        let set = compact(&raw);
        assert_eq!(set.added.len(), 1);
        assert_eq!(set.added[0].get_i32("n").unwrap(), 2);
        assert!(set.modified.is_empty());
    }

    #[test]
    fn update_on_existing_doc_produces_modified_with_fields() {
        let raw = vec![change(ChangeOp::Update, "a", Some(doc! {"id": "a", "n": 5}), &["n"], 1)];
        let set = compact(&raw);
        assert_eq!(set.modified.len(), 1);
        assert!(set.modified_fields.get("a").unwrap().contains("n"));
    }

    #[test]
    fn remove_on_existing_doc_produces_removed() {
        let raw = vec![change(ChangeOp::Remove, "a", None, &[], 1)];
        let set = compact(&raw);
        assert_eq!(set.removed, vec![Bson::String("a".to_string())]);
    }
}
