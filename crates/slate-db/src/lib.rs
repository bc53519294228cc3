mod collection;
mod cursor;
mod document;
mod error;
mod events;
mod registry;

pub use collection::{Collection, CollectionState, FindOptions, UpdateOptions};
pub use cursor::Cursor;
pub use document::{canonical_id, ensure_id};
pub use error::DbError;
pub use events::{ChangeDelta, CollectionEvent, DebugEvent};
pub use registry::{default_registry, Registry};

pub use bson::{self, Bson, Document};
pub use slate_query::{Projection, SortDirection, SortKey};
pub use slate_reactive::{self, NullReactivity, ReactivityAdapter};
pub use slate_store::{self, MemoryStore, StorageAdapter};
