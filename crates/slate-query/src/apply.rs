//! `apply(modifier, document) -> newDocument` (spec §4.1).

use bson::{Bson, DateTime, Document};

use crate::error::QueryError;
use crate::modifier::{ArrayFilter, FieldMutation, FieldUpdate, Modifier, PopDirection, PullSpec};
use crate::path;
use crate::selector::Selector;

/// Context a modifier is applied under: the selector that located the
/// document (for bare `$` positional resolution), any named array filters
/// (for `$[identifier]` resolution), and the caller-provided clock used by
/// `$currentDate` (spec §4.1).
pub struct ApplyContext<'a> {
    pub query_selector: Option<&'a Selector>,
    pub array_filters: &'a [ArrayFilter],
    pub now: DateTime,
}

impl<'a> ApplyContext<'a> {
    pub fn new(now: DateTime) -> Self {
        Self {
            query_selector: None,
            array_filters: &[],
            now,
        }
    }
}

pub fn apply(modifier: &Modifier, doc: &Document, ctx: &ApplyContext<'_>) -> Result<Document, QueryError> {
    match modifier {
        Modifier::Replace(body) => {
            let mut replaced = body.clone();
            if let Some(id) = doc.get("id") {
                replaced.insert("id", id.clone());
            }
            Ok(replaced)
        }
        Modifier::Update(updates) => {
            let mut out = doc.clone();
            for update in updates {
                apply_field_update(&mut out, update, ctx)?;
            }
            Ok(out)
        }
    }
}

fn apply_field_update(
    doc: &mut Document,
    update: &FieldUpdate,
    ctx: &ApplyContext<'_>,
) -> Result<(), QueryError> {
    let paths = resolve_paths(doc, &update.path, ctx)?;
    for path in paths {
        apply_one(doc, &path, &update.mutation, ctx)?;
    }
    Ok(())
}

/// Expand a single `path` (possibly containing a bare `$` or a named
/// `$[identifier]` segment) into the concrete dotted paths it applies to.
fn resolve_paths(doc: &Document, path: &str, ctx: &ApplyContext<'_>) -> Result<Vec<String>, QueryError> {
    if let Some(array_field) = bare_positional_array_field(path) {
        let suffix = &path[array_field.len()..]; // ".$" or ".$.rest"
        let rest = suffix.strip_prefix(".$").unwrap_or("").strip_prefix('.').unwrap_or("");

        let selector = ctx
            .query_selector
            .ok_or_else(|| QueryError::UnresolvedArrayFilter(path.to_string()))?;
        let arr = match path::get(doc, array_field) {
            Some(Bson::Array(a)) => a,
            _ => return Err(QueryError::UnresolvedArrayFilter(path.to_string())),
        };
        let idx = find_positional_index(arr, array_field, selector)
            .ok_or_else(|| QueryError::UnresolvedArrayFilter(path.to_string()))?;
        let full = if rest.is_empty() {
            format!("{array_field}.{idx}")
        } else {
            format!("{array_field}.{idx}.{rest}")
        };
        return Ok(vec![full]);
    }

    if let Some(bracket_start) = path.find(".$[") {
        let array_field = &path[..bracket_start];
        let after = &path[bracket_start + 3..];
        let close = after
            .find(']')
            .ok_or_else(|| QueryError::UnresolvedArrayFilter(path.to_string()))?;
        let identifier = &after[..close];
        let rest = after[close + 1..].strip_prefix('.').unwrap_or("");

        let filter = ctx
            .array_filters
            .iter()
            .find(|f| f.identifier == identifier)
            .ok_or_else(|| QueryError::UnresolvedArrayFilter(path.to_string()))?;

        let arr = match path::get(doc, array_field) {
            Some(Bson::Array(a)) => a,
            _ => return Ok(vec![]),
        };

        let mut out = Vec::new();
        for (idx, elem) in arr.iter().enumerate() {
            let wrapped = wrap_element(identifier, elem);
            if crate::eval::matches(&filter.selector, &wrapped).unwrap_or(false) {
                let full = if rest.is_empty() {
                    format!("{array_field}.{idx}")
                } else {
                    format!("{array_field}.{idx}.{rest}")
                };
                out.push(full);
            }
        }
        return Ok(out);
    }

    Ok(vec![path.to_string()])
}

/// If `path` contains a bare (unnamed) positional segment — `"a.$"` or
/// `"a.$.b"` — returns the array field it follows.
fn bare_positional_array_field(path: &str) -> Option<&str> {
    if let Some(pos) = path.find(".$.") {
        return Some(&path[..pos]);
    }
    if let Some(stripped) = path.strip_suffix(".$") {
        return Some(stripped);
    }
    None
}

/// Wrap an array element under `identifier` so array-filter selector paths
/// like `"elem.qty"` resolve against it.
fn wrap_element(identifier: &str, elem: &Bson) -> Document {
    let mut d = Document::new();
    d.insert(identifier, elem.clone());
    d
}

/// Find the first array index whose element satisfies every clause of
/// `selector` that targets `array_field` or `array_field.<subfield>`.
fn find_positional_index(arr: &[Bson], array_field: &str, selector: &Selector) -> Option<usize> {
    if !selector_constrains(selector, array_field) {
        return if arr.is_empty() { None } else { Some(0) };
    }
    arr.iter()
        .position(|elem| matches_subfields(elem, array_field, selector))
}

/// Whether any clause of `selector` mentions `array_field` (directly or via
/// a subfield), making positional resolution meaningful.
fn selector_constrains(selector: &Selector, array_field: &str) -> bool {
    let prefix = format!("{array_field}.");
    match selector {
        Selector::Field(fc) => fc.field == array_field || fc.field.starts_with(&prefix),
        Selector::And(v) => v.iter().any(|s| selector_constrains(s, array_field)),
        _ => false,
    }
}

/// Re-evaluate the (sub-)selector's field conditions against one array
/// element, where field paths are relative to `array_field`. Clauses that
/// don't mention this array are treated as already satisfied (they were
/// checked against the outer document, not this element).
fn matches_subfields(elem: &Bson, array_field: &str, selector: &Selector) -> bool {
    let prefix = format!("{array_field}.");
    match selector {
        Selector::Field(fc) => {
            if let Some(sub) = fc.field.strip_prefix(&prefix) {
                let wrapped = match elem {
                    Bson::Document(d) => d.clone(),
                    other => {
                        let mut d = Document::new();
                        d.insert(sub.to_string(), other.clone());
                        d
                    }
                };
                crate::eval::matches(&Selector::field(sub.to_string(), fc.condition.clone()), &wrapped)
                    .unwrap_or(false)
            } else if fc.field == array_field {
                let wrapped_field = "__elem__";
                let mut d = Document::new();
                d.insert(wrapped_field, elem.clone());
                crate::eval::matches(&Selector::field(wrapped_field, fc.condition.clone()), &d)
                    .unwrap_or(false)
            } else {
                true
            }
        }
        Selector::And(v) => v.iter().all(|s| matches_subfields(elem, array_field, s)),
        _ => true,
    }
}

fn apply_one(
    doc: &mut Document,
    path: &str,
    mutation: &FieldMutation,
    ctx: &ApplyContext<'_>,
) -> Result<(), QueryError> {
    if path::top_level(path) == "id" {
        if let (FieldMutation::Set(new_id), Some(existing)) = (mutation, doc.get("id")) {
            if existing != new_id {
                return Err(QueryError::IdMismatch);
            }
        }
    }

    match mutation {
        FieldMutation::Set(value) => path::set(doc, path, value.clone()),
        FieldMutation::Unset => path::unset(doc, path),
        FieldMutation::Inc(delta) => {
            let current = path::get(doc, path).cloned().unwrap_or(Bson::Int32(0));
            path::set(doc, path, numeric_op(&current, delta, |a, b| a + b));
        }
        FieldMutation::Mul(factor) => {
            let current = path::get(doc, path).cloned().unwrap_or(Bson::Int32(0));
            path::set(doc, path, numeric_op(&current, factor, |a, b| a * b));
        }
        FieldMutation::Min(candidate) => match path::get(doc, path) {
            Some(current) if as_f64(current) <= as_f64(candidate) => {}
            _ => path::set(doc, path, candidate.clone()),
        },
        FieldMutation::Max(candidate) => match path::get(doc, path) {
            Some(current) if as_f64(current) >= as_f64(candidate) => {}
            _ => path::set(doc, path, candidate.clone()),
        },
        FieldMutation::CurrentDate => path::set(doc, path, Bson::DateTime(ctx.now)),
        FieldMutation::Rename(new_path) => {
            if let Some(value) = path::get(doc, path).cloned() {
                path::unset(doc, path);
                path::set(doc, new_path, value);
            }
        }
        FieldMutation::SetOnInsert(value) => {
            if path::get(doc, path).is_none() {
                path::set(doc, path, value.clone());
            }
        }
        FieldMutation::AddToSet(values) => {
            let mut arr = match path::get(doc, path) {
                Some(Bson::Array(a)) => a.clone(),
                _ => Vec::new(),
            };
            for v in values {
                if !arr.contains(v) {
                    arr.push(v.clone());
                }
            }
            path::set(doc, path, Bson::Array(arr));
        }
        FieldMutation::Push(values) => {
            let mut arr = match path::get(doc, path) {
                Some(Bson::Array(a)) => a.clone(),
                _ => Vec::new(),
            };
            arr.extend(values.iter().cloned());
            path::set(doc, path, Bson::Array(arr));
        }
        FieldMutation::Pull(spec) => {
            if let Some(Bson::Array(arr)) = path::get(doc, path) {
                let kept: Vec<Bson> = arr.iter().filter(|v| !pull_matches(spec, v)).cloned().collect();
                path::set(doc, path, Bson::Array(kept));
            }
        }
        FieldMutation::PullAll(values) => {
            if let Some(Bson::Array(arr)) = path::get(doc, path) {
                let kept: Vec<Bson> = arr.iter().filter(|v| !values.contains(v)).cloned().collect();
                path::set(doc, path, Bson::Array(kept));
            }
        }
        FieldMutation::Pop(direction) => {
            if let Some(Bson::Array(arr)) = path::get(doc, path) {
                let mut arr = arr.clone();
                match direction {
                    PopDirection::First => {
                        if !arr.is_empty() {
                            arr.remove(0);
                        }
                    }
                    PopDirection::Last => {
                        arr.pop();
                    }
                }
                path::set(doc, path, Bson::Array(arr));
            }
        }
    }
    Ok(())
}

fn pull_matches(spec: &PullSpec, value: &Bson) -> bool {
    match spec {
        PullSpec::Value(target) => value == target,
        PullSpec::Matching(selector) => {
            let wrapped = match value {
                Bson::Document(d) => d.clone(),
                other => {
                    let mut d = Document::new();
                    d.insert("", other.clone());
                    d
                }
            };
            crate::eval::matches(selector, &wrapped).unwrap_or(false)
        }
    }
}

fn numeric_op(a: &Bson, b: &Bson, op: impl Fn(f64, f64) -> f64) -> Bson {
    let result = op(as_f64(a), as_f64(b));
    if matches!(a, Bson::Double(_)) || matches!(b, Bson::Double(_)) {
        Bson::Double(result)
    } else if matches!(a, Bson::Int64(_)) || matches!(b, Bson::Int64(_)) {
        Bson::Int64(result as i64)
    } else {
        Bson::Int32(result as i32)
    }
}

fn as_f64(v: &Bson) -> f64 {
    match v {
        Bson::Int32(n) => *n as f64,
        Bson::Int64(n) => *n as f64,
        Bson::Double(n) => *n,
        _ => 0.0,
    }
}
