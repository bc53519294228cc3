use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    EmptyLogicalGroup(&'static str),
    UnknownOperator(String),
    MalformedSelector(String),
    MalformedModifier(String),
    UnresolvedArrayFilter(String),
    IdMismatch,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::EmptyLogicalGroup(op) => write!(f, "{op} requires at least one clause"),
            QueryError::UnknownOperator(op) => write!(f, "unknown operator: {op}"),
            QueryError::MalformedSelector(msg) => write!(f, "malformed selector: {msg}"),
            QueryError::MalformedModifier(msg) => write!(f, "malformed modifier: {msg}"),
            QueryError::UnresolvedArrayFilter(path) => {
                write!(f, "unresolved array-filter placeholder: {path}")
            }
            QueryError::IdMismatch => write!(f, "modifier attempts to change id"),
        }
    }
}

impl std::error::Error for QueryError {}
