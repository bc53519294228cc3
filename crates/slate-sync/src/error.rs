use std::fmt;

#[derive(Debug)]
pub enum SyncError {
    Db(slate_db::DbError),
    Pull(String),
    Push(String),
    UnknownCollection(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Db(e) => write!(f, "collection error: {e}"),
            SyncError::Pull(msg) => write!(f, "pull failed: {msg}"),
            SyncError::Push(msg) => write!(f, "push failed: {msg}"),
            SyncError::UnknownCollection(name) => {
                write!(f, "no collection registered under name: {name}")
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<slate_db::DbError> for SyncError {
    fn from(e: slate_db::DbError) -> Self {
        SyncError::Db(e)
    }
}
