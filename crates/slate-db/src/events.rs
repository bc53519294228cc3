use bson::{Bson, Document};

/// A delta emitted by a live cursor's `observeChanges` (spec §4.4).
#[derive(Debug, Clone)]
pub enum ChangeDelta {
    Added { doc: Document, index: usize },
    Changed { id: Bson, old_doc: Document, new_doc: Document },
    Removed { id: Bson },
    MovedBefore { id: Bson, before_id: Option<Bson> },
}

/// Collection-level lifecycle/mutation events (spec §4.3's Events column).
#[derive(Debug, Clone)]
pub enum CollectionEvent {
    Added(Document),
    Changed { id: Bson, new_doc: Document },
    Removed { id: Bson },
    Ready,
    Disposed,
}

/// A `_debug.*` instrumentation event: purely observational, emitted before
/// an operation runs (spec §4.3).
#[derive(Debug, Clone)]
pub struct DebugEvent {
    pub operation: &'static str,
    pub selector: Option<String>,
    pub modifier: Option<String>,
    pub call_site: Option<String>,
}
