use std::fmt;

#[derive(Debug)]
pub enum DbError {
    Store(slate_store::StoreError),
    Query(slate_query::QueryError),
    Engine(slate_engine::EngineError),
    NotFound(String),
    DuplicateId(String),
    InvalidQuery(String),
    InvalidDocument(String),
    MixedProjection,
    Disposed,
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Store(e) => write!(f, "storage error: {e}"),
            DbError::Query(e) => write!(f, "query error: {e}"),
            DbError::Engine(e) => write!(f, "index engine error: {e}"),
            DbError::NotFound(id) => write!(f, "no document with id: {id}"),
            DbError::DuplicateId(id) => write!(f, "duplicate id: {id}"),
            DbError::InvalidQuery(msg) => write!(f, "invalid query: {msg}"),
            DbError::InvalidDocument(msg) => write!(f, "invalid document: {msg}"),
            DbError::MixedProjection => {
                write!(f, "projection mixes inclusion and exclusion fields")
            }
            DbError::Disposed => write!(f, "collection has been disposed"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<slate_store::StoreError> for DbError {
    fn from(e: slate_store::StoreError) -> Self {
        DbError::Store(e)
    }
}

impl From<slate_query::QueryError> for DbError {
    fn from(e: slate_query::QueryError) -> Self {
        DbError::Query(e)
    }
}

impl From<slate_engine::EngineError> for DbError {
    fn from(e: slate_engine::EngineError) -> Self {
        DbError::Engine(e)
    }
}
