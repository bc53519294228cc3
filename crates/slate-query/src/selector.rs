use std::rc::Rc;

use bson::Document;

use crate::error::QueryError;
use crate::operator::Condition;

/// A single `{field: condition}` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    pub field: String,
    pub condition: Condition,
}

/// Recursive predicate expression over a document (spec §3 "Selector").
#[derive(Clone)]
pub enum Selector {
    Field(FieldCondition),
    And(Vec<Selector>),
    Or(Vec<Selector>),
    Nor(Vec<Selector>),
    /// `$where`: an arbitrary predicate over the whole document. The source
    /// system evaluates a string of JS; the idiomatic Rust equivalent used
    /// here is a caller-supplied closure (see SPEC_FULL.md §4.1).
    Where(Rc<dyn Fn(&Document) -> bool>),
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Field(fc) => f.debug_tuple("Field").field(fc).finish(),
            Selector::And(v) => f.debug_tuple("And").field(v).finish(),
            Selector::Or(v) => f.debug_tuple("Or").field(v).finish(),
            Selector::Nor(v) => f.debug_tuple("Nor").field(v).finish(),
            Selector::Where(_) => write!(f, "Where(<fn>)"),
        }
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Selector::Field(a), Selector::Field(b)) => a == b,
            (Selector::And(a), Selector::And(b)) => a == b,
            (Selector::Or(a), Selector::Or(b)) => a == b,
            (Selector::Nor(a), Selector::Nor(b)) => a == b,
            (Selector::Where(a), Selector::Where(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Selector {
    pub fn field(field: impl Into<String>, condition: Condition) -> Selector {
        Selector::Field(FieldCondition {
            field: field.into(),
            condition,
        })
    }

    /// Fails per spec §4.1: "`$and` empty and `$or` empty are errors".
    pub fn and(clauses: Vec<Selector>) -> Result<Selector, QueryError> {
        if clauses.is_empty() {
            return Err(QueryError::EmptyLogicalGroup("$and"));
        }
        Ok(Selector::And(clauses))
    }

    pub fn or(clauses: Vec<Selector>) -> Result<Selector, QueryError> {
        if clauses.is_empty() {
            return Err(QueryError::EmptyLogicalGroup("$or"));
        }
        Ok(Selector::Or(clauses))
    }

    pub fn nor(clauses: Vec<Selector>) -> Result<Selector, QueryError> {
        if clauses.is_empty() {
            return Err(QueryError::EmptyLogicalGroup("$nor"));
        }
        Ok(Selector::Nor(clauses))
    }

    pub fn where_fn(f: impl Fn(&Document) -> bool + 'static) -> Selector {
        Selector::Where(Rc::new(f))
    }

    /// The set of top-level field names this selector (ignoring `$where`)
    /// reads, used by reactive cursors to decide whether a changed field
    /// could affect membership (spec §4.4).
    pub fn referenced_fields(&self, out: &mut std::collections::HashSet<String>) {
        match self {
            Selector::Field(fc) => {
                out.insert(crate::path::top_level(&fc.field).to_string());
                if let Condition::ElemMatch(sub) = &fc.condition {
                    sub.referenced_fields(out);
                }
            }
            Selector::And(v) | Selector::Or(v) | Selector::Nor(v) => {
                for s in v {
                    s.referenced_fields(out);
                }
            }
            Selector::Where(_) => {}
        }
    }
}
