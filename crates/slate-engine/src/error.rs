use std::fmt;

#[derive(Debug)]
pub enum EngineError {
    InvalidIndexField(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIndexField(field) => write!(f, "invalid index field: {field}"),
        }
    }
}

impl std::error::Error for EngineError {}
