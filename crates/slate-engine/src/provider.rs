use std::collections::HashSet;

use bson::{Bson, Document};
use slate_query::Condition;

/// Document identifier. Ids are caller-supplied or synthesized `bson::Bson`
/// values (spec §4.3), so the engine carries them opaquely.
pub type DocId = Bson;

/// Contract every index provider implements (spec §4.2): incremental
/// maintenance plus narrowing a single field condition down to the set of
/// ids it proves contain a match.
pub trait IndexProvider {
    /// The field this provider indexes.
    fn field(&self) -> &str;

    /// Initialize from a complete list, discarding any prior state.
    fn rebuild(&mut self, documents: &[Document]);
    fn on_insert(&mut self, doc: &Document);
    fn on_update(&mut self, old_doc: &Document, new_doc: &Document);
    fn on_remove(&mut self, doc: &Document);

    /// Attempt to answer a single field condition. `None` means this
    /// provider cannot narrow the candidate set for this condition at all;
    /// the caller must fall back to scanning for it.
    fn query(&self, condition: &Condition) -> Option<HashSet<DocId>>;
}
