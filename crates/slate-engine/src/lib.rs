//! Index providers (spec §4.2): incremental structures that narrow a
//! selector down to a candidate id set before the cursor falls back to
//! scanning and filtering by hand.

mod combine;
mod equality;
mod error;
mod provider;

pub use combine::{combine, IndexQuery};
pub use equality::EqualityIndex;
pub use error::EngineError;
pub use provider::{DocId, IndexProvider};
