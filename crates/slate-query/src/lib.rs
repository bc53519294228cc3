//! Selector and modifier evaluation (spec §4.1): pure functions over a
//! single `bson::Document`, plus the query-option and sort types a cursor
//! binds to a selector.

pub mod apply;
mod error;
pub mod eval;
mod modifier;
mod operator;
pub mod parse;
pub mod path;
mod query;
mod selector;
mod sort;

pub use apply::{apply, ApplyContext};
pub use error::QueryError;
pub use eval::matches;
pub use modifier::{ArrayFilter, FieldMutation, FieldUpdate, Modifier, PopDirection, PullSpec};
pub use operator::{BsonTypeName, Condition};
pub use parse::{parse_modifier, parse_selector};
pub use query::{Projection, Query, QueryOptions};
pub use selector::{FieldCondition, Selector};
pub use sort::{SortDirection, SortKey};

pub use path::top_level as top_level_field;
