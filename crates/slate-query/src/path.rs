//! Dotted-path access into `bson::Document`, e.g. `"a.b.c"` or `"a.0.b"`.

use bson::{Bson, Document};

/// Split `"a.b.c"` into `["a", "b", "c"]`. Empty segments are rejected by the caller.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

/// Read a value at a dotted path, returning a reference into the original
/// document/array tree. Numeric segments index into arrays.
pub fn get<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segs = segments(path).into_iter();
    let first = segs.next()?;
    let mut current = doc.get(first)?;
    for seg in segs {
        current = match current {
            Bson::Document(d) => d.get(seg)?,
            Bson::Array(a) => {
                let idx: usize = seg.parse().ok()?;
                a.get(idx)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Set a value at a dotted path, creating intermediate documents as needed.
/// Numeric segments against a missing parent create/extend an array.
pub fn set(doc: &mut Document, path: &str, value: Bson) {
    let segs = segments(path);
    set_segments(doc, &segs, value);
}

fn set_segments(doc: &mut Document, segs: &[&str], value: Bson) {
    if segs.len() == 1 {
        doc.insert(segs[0], value);
        return;
    }
    let head = segs[0];
    let rest = &segs[1..];
    let entry = doc
        .entry(head.to_string())
        .or_insert_with(|| Bson::Document(Document::new()));
    set_in_bson(entry, rest, value);
}

fn set_in_bson(target: &mut Bson, segs: &[&str], value: Bson) {
    if segs.is_empty() {
        *target = value;
        return;
    }
    let head = segs[0];
    let rest = &segs[1..];

    if let Ok(idx) = head.parse::<usize>() {
        if !matches!(target, Bson::Array(_)) {
            *target = Bson::Array(Vec::new());
        }
        if let Bson::Array(arr) = target {
            while arr.len() <= idx {
                arr.push(Bson::Null);
            }
            if rest.is_empty() {
                arr[idx] = value;
            } else {
                set_in_bson(&mut arr[idx], rest, value);
            }
        }
        return;
    }

    if !matches!(target, Bson::Document(_)) {
        *target = Bson::Document(Document::new());
    }
    if let Bson::Document(d) = target {
        if rest.is_empty() {
            d.insert(head, value);
        } else {
            let entry = d
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            set_in_bson(entry, rest, value);
        }
    }
}

/// Remove a value at a dotted path. Missing intermediate segments are a no-op.
pub fn unset(doc: &mut Document, path: &str) {
    let segs = segments(path);
    if segs.is_empty() {
        return;
    }
    if segs.len() == 1 {
        doc.remove(segs[0]);
        return;
    }
    let head = segs[0];
    let rest = &segs[1..];
    if let Some(Bson::Document(inner)) = doc.get_mut(head) {
        unset_nested(inner, rest);
    }
}

fn unset_nested(doc: &mut Document, segs: &[&str]) {
    if segs.len() == 1 {
        doc.remove(segs[0]);
        return;
    }
    let head = segs[0];
    let rest = &segs[1..];
    if let Some(Bson::Document(inner)) = doc.get_mut(head) {
        unset_nested(inner, rest);
    }
}

/// Top-level field path touched by a dotted path, e.g. `"a.b.c"` -> `"a"`.
pub fn top_level(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}
