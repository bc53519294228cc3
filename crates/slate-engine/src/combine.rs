use std::collections::HashSet;

use slate_query::Selector;

use crate::provider::{DocId, IndexProvider};

/// Result of consulting the registered providers with a selector (spec
/// §4.2/§4.4 step 1): a candidate id set (`None` if no provider narrowed
/// anything, meaning the cursor must scan the full sequence) and whatever
/// selector fragment is left to filter by hand.
pub struct IndexQuery {
    pub positions: Option<HashSet<DocId>>,
    pub residual: Option<Selector>,
}

/// Combine providers by intersecting the candidate sets of the clauses they
/// each answer; the residual is the original selector minus the clauses
/// those providers covered.
pub fn combine(selector: &Selector, providers: &[Box<dyn IndexProvider>]) -> IndexQuery {
    let clauses = top_level_clauses(selector);
    let mut positions: Option<HashSet<DocId>> = None;
    let mut residual_clauses = Vec::new();

    for clause in clauses {
        if let Selector::Field(fc) = &clause {
            if let Some(provider) = providers.iter().find(|p| p.field() == fc.field) {
                if let Some(ids) = provider.query(&fc.condition) {
                    positions = Some(match positions {
                        Some(existing) => existing.intersection(&ids).cloned().collect(),
                        None => ids,
                    });
                    continue;
                }
            }
        }
        residual_clauses.push(clause);
    }

    let residual = match residual_clauses.len() {
        0 => None,
        1 => residual_clauses.pop(),
        _ => Some(Selector::And(residual_clauses)),
    };

    IndexQuery { positions, residual }
}

/// A selector's top-level conjuncts: `$and`'s members, or the selector
/// itself as a single clause.
fn top_level_clauses(selector: &Selector) -> Vec<Selector> {
    match selector {
        Selector::And(clauses) => clauses.clone(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equality::EqualityIndex;
    use bson::{doc, Bson};
    use slate_query::parse_selector;

    fn providers() -> Vec<Box<dyn IndexProvider>> {
        let docs = vec![
            doc! { "id": 1, "status": "active", "age": 30 },
            doc! { "id": 2, "status": "retired", "age": 30 },
        ];
        let mut status_idx = EqualityIndex::new("status").unwrap();
        status_idx.rebuild(&docs);
        vec![Box::new(status_idx) as Box<dyn IndexProvider>]
    }

    #[test]
    fn single_covered_clause_narrows_and_leaves_no_residual() {
        let selector = parse_selector(&doc! { "status": "active" }).unwrap();
        let result = combine(&selector, &providers());
        assert_eq!(result.positions.unwrap(), HashSet::from([Bson::Int32(1)]));
        assert!(result.residual.is_none());
    }

    #[test]
    fn uncovered_field_is_untouched_and_becomes_residual() {
        let selector = parse_selector(&doc! { "age": 30 }).unwrap();
        let result = combine(&selector, &providers());
        assert!(result.positions.is_none());
        assert!(result.residual.is_some());
    }

    #[test]
    fn mixed_and_narrows_on_covered_field_and_keeps_uncovered_as_residual() {
        let selector = parse_selector(&doc! { "status": "active", "age": 30 }).unwrap();
        let result = combine(&selector, &providers());
        assert_eq!(result.positions.unwrap(), HashSet::from([Bson::Int32(1)]));
        let residual = result.residual.unwrap();
        assert!(matches!(residual, Selector::Field(_)));
    }
}
