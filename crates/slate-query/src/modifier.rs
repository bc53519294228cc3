use bson::Bson;

use crate::selector::Selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopDirection {
    First,
    Last,
}

/// One `$op` applied to one field path (spec §3 "Modifier").
#[derive(Debug, Clone)]
pub enum FieldMutation {
    Set(Bson),
    Unset,
    Inc(Bson),
    Mul(Bson),
    Min(Bson),
    Max(Bson),
    CurrentDate,
    Rename(String),
    SetOnInsert(Bson),
    AddToSet(Vec<Bson>),
    Push(Vec<Bson>),
    Pull(PullSpec),
    PullAll(Vec<Bson>),
    Pop(PopDirection),
}

/// `$pull` accepts either a literal value or a sub-selector matched against
/// each array element.
#[derive(Clone)]
pub enum PullSpec {
    Value(Bson),
    Matching(Selector),
}

impl std::fmt::Debug for PullSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PullSpec::Value(v) => f.debug_tuple("Value").field(v).finish(),
            PullSpec::Matching(_) => write!(f, "Matching(<selector>)"),
        }
    }
}

/// One `path -> mutation` entry. `path` may contain a single bare positional
/// segment `$` (resolved against the query selector that produced the
/// document being updated) or a named `$[identifier]` segment (resolved
/// against `arrayFilters`).
#[derive(Debug, Clone)]
pub struct FieldUpdate {
    pub path: String,
    pub mutation: FieldMutation,
}

/// An update expression (spec §3 "Modifier"). If no operator keys are
/// present at parse time, the modifier is a full replacement of the document
/// body, preserving `id` (spec §4.1).
#[derive(Debug, Clone)]
pub enum Modifier {
    Replace(bson::Document),
    Update(Vec<FieldUpdate>),
}

/// A named array-filter clause resolving `$[identifier]` placeholders.
#[derive(Debug, Clone)]
pub struct ArrayFilter {
    pub identifier: String,
    pub selector: Selector,
}
