use std::collections::HashSet;

use crate::error::QueryError;
use crate::selector::Selector;
use crate::sort::SortKey;

/// A field projection: either an inclusion set or an exclusion set, never
/// mixed (spec §3/§4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include(HashSet<String>),
    Exclude(HashSet<String>),
}

impl Projection {
    /// Build a projection from raw `{field: 0|1}` entries, validating that
    /// inclusion and exclusion aren't mixed.
    pub fn from_fields(fields: Vec<(String, bool)>) -> Result<Option<Projection>, QueryError> {
        if fields.is_empty() {
            return Ok(None);
        }
        let include_count = fields.iter().filter(|(_, keep)| *keep).count();
        if include_count != 0 && include_count != fields.len() {
            return Err(QueryError::MalformedSelector(
                "projection cannot mix inclusion and exclusion".into(),
            ));
        }
        let names: HashSet<String> = fields.into_iter().map(|(f, _)| f).collect();
        if include_count == 0 {
            Ok(Some(Projection::Exclude(names)))
        } else {
            Ok(Some(Projection::Include(names)))
        }
    }
}

/// Query options bound to a selector to form a cursor (spec §3 "Query options").
#[derive(Clone, Default)]
pub struct QueryOptions {
    pub sort: Vec<SortKey>,
    pub skip: usize,
    pub limit: Option<usize>,
    pub fields: Option<Projection>,
    /// Overrides whether a cursor created under this option set is reactive,
    /// independent of whether the caller is inside a tracking scope.
    pub reactive: Option<bool>,
}

impl std::fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("sort", &self.sort)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .field("fields", &self.fields)
            .field("reactive", &self.reactive)
            .finish()
    }
}

/// A bound `(selector, options)` pair, the thing a `Collection::find` returns
/// a cursor for (spec §3 "Cursor").
pub struct Query {
    pub selector: Option<Selector>,
    pub options: QueryOptions,
}

impl Query {
    pub fn new(selector: Option<Selector>, options: QueryOptions) -> Self {
        Self { selector, options }
    }
}
