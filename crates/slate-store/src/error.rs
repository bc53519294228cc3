use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    DuplicateId(String),
    MissingId(String),
    IndexNotCreated(String),
    InvalidIndexField(String),
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateId(id) => write!(f, "duplicate id: {id}"),
            StoreError::MissingId(id) => write!(f, "no document with id: {id}"),
            StoreError::IndexNotCreated(field) => write!(f, "index not created: {field}"),
            StoreError::InvalidIndexField(field) => write!(f, "invalid index field: {field}"),
            StoreError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
