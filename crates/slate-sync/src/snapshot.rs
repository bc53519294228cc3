use bson::{Bson, Document};

use crate::change_log::ChangeSet;

/// Applies a change set on top of a base set of documents, producing a new
/// set (spec §4.8 step 6 — used both for "apply pulled changes to the
/// stored snapshot" and for "replay local changes not yet confirmed").
pub fn replay(base: &[Document], changes: &ChangeSet) -> Vec<Document> {
    let mut out: Vec<Document> = base.to_vec();

    for id in &changes.removed {
        out.retain(|d| d.get("id") != Some(id));
    }
    for (id, new_doc) in &changes.modified {
        match out.iter_mut().find(|d| d.get("id") == Some(id)) {
            Some(slot) => *slot = new_doc.clone(),
            None => out.push(new_doc.clone()),
        }
    }
    for doc in &changes.added {
        let id = doc.get("id");
        if !out.iter().any(|d| d.get("id") == id) {
            out.push(doc.clone());
        }
    }

    out
}

/// The minimum insert/update/remove operations to turn `current` into
/// `authoritative` (spec §4.8 step 7).
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub to_insert: Vec<Document>,
    pub to_update: Vec<(Bson, Document)>,
    pub to_remove: Vec<Bson>,
}

pub fn diff(current: &[Document], authoritative: &[Document]) -> Reconciliation {
    let mut out = Reconciliation::default();

    for doc in authoritative {
        let id = match doc.get("id") {
            Some(id) => id,
            None => continue,
        };
        match current.iter().find(|d| d.get("id") == Some(id)) {
            None => out.to_insert.push(doc.clone()),
            Some(existing) => {
                if existing != doc {
                    out.to_update.push((id.clone(), doc.clone()));
                }
            }
        }
    }

    for doc in current {
        let id = match doc.get("id") {
            Some(id) => id,
            None => continue,
        };
        if !authoritative.iter().any(|d| d.get("id") == Some(id)) {
            out.to_remove.push(id.clone());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn replay_applies_add_modify_remove_in_order() {
        let base = vec![doc! {"id": "a", "n": 1}, doc! {"id": "b", "n": 2}];
        let mut changes = ChangeSet::default();
        changes.removed.push(Bson::String("b".to_string()));
        changes.modified.push((Bson::String("a".to_string()), doc! {"id": "a", "n": 9}));
        changes.added.push(doc! {"id": "c", "n": 3});

        let result = replay(&base, &changes);
        assert_eq!(result.len(), 2);
        assert!(result.iter().any(|d| d.get_str("id").unwrap() == "a" && d.get_i32("n").unwrap() == 9));
        assert!(result.iter().any(|d| d.get_str("id").unwrap() == "c"));
    }

    #[test]
    fn diff_computes_minimal_reconciliation() {
        let current = vec![doc! {"id": "a", "n": 1}, doc! {"id": "b", "n": 2}];
        let authoritative = vec![doc! {"id": "a", "n": 1}, doc! {"id": "c", "n": 3}];

        let r = diff(&current, &authoritative);
        assert_eq!(r.to_insert.len(), 1);
        assert_eq!(r.to_remove, vec![Bson::String("b".to_string())]);
        assert!(r.to_update.is_empty());
    }
}
