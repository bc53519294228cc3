use bson::{doc, Bson};
use slate_query::{matches, parse_selector};

fn sel(doc: bson::Document) -> slate_query::Selector {
    parse_selector(&doc).unwrap()
}

#[test]
fn equality_matches_plain_field() {
    let d = doc! { "type": "kitten", "name": "fluffy" };
    assert!(matches(&sel(doc! { "type": "kitten" }), &d).unwrap());
    assert!(!matches(&sel(doc! { "type": "crypt" }), &d).unwrap());
}

#[test]
fn equality_against_array_field_matches_contains() {
    let d = doc! { "tags": ["a", "b", "c"] };
    assert!(matches(&sel(doc! { "tags": "b" }), &d).unwrap());
    assert!(!matches(&sel(doc! { "tags": "z" }), &d).unwrap());
}

#[test]
fn comparison_operators() {
    let d = doc! { "n": 5 };
    assert!(matches(&sel(doc! { "n": { "$gt": 1 } }), &d).unwrap());
    assert!(matches(&sel(doc! { "n": { "$gte": 5 } }), &d).unwrap());
    assert!(!matches(&sel(doc! { "n": { "$lt": 5 } }), &d).unwrap());
    assert!(matches(&sel(doc! { "n": { "$lte": 5 } }), &d).unwrap());
    assert!(matches(&sel(doc! { "n": { "$ne": 4 } }), &d).unwrap());
}

#[test]
fn in_and_nin() {
    let d = doc! { "n": 2 };
    assert!(matches(&sel(doc! { "n": { "$in": [1, 2, 3] } }), &d).unwrap());
    assert!(matches(&sel(doc! { "n": { "$nin": [4, 5] } }), &d).unwrap());
}

#[test]
fn exists_true_and_false() {
    let d = doc! { "a": 1 };
    assert!(matches(&sel(doc! { "a": { "$exists": true } }), &d).unwrap());
    assert!(matches(&sel(doc! { "b": { "$exists": false } }), &d).unwrap());
    assert!(!matches(&sel(doc! { "b": { "$exists": true } }), &d).unwrap());
}

#[test]
fn regex_matches_string_field() {
    let d = doc! { "name": "fluffy" };
    assert!(matches(&sel(doc! { "name": { "$regex": "^flu" } }), &d).unwrap());
    assert!(!matches(&sel(doc! { "name": { "$regex": "^bar" } }), &d).unwrap());
}

#[test]
fn size_and_all() {
    let d = doc! { "tags": ["a", "b"] };
    assert!(matches(&sel(doc! { "tags": { "$size": 2 } }), &d).unwrap());
    assert!(matches(&sel(doc! { "tags": { "$all": ["a", "b"] } }), &d).unwrap());
    assert!(!matches(&sel(doc! { "tags": { "$all": ["a", "z"] } }), &d).unwrap());
}

#[test]
fn elem_match_requires_match_on_some_element() {
    let d = doc! { "items": [ { "qty": 1 }, { "qty": 10 } ] };
    let s = sel(doc! { "items": { "$elemMatch": { "qty": { "$gt": 5 } } } });
    assert!(matches(&s, &d).unwrap());

    let s2 = sel(doc! { "items": { "$elemMatch": { "qty": { "$gt": 50 } } } });
    assert!(!matches(&s2, &d).unwrap());
}

#[test]
fn type_and_not_and_mod() {
    let d = doc! { "n": 10i32 };
    assert!(matches(&sel(doc! { "n": { "$type": "int" } }), &d).unwrap());
    assert!(matches(&sel(doc! { "n": { "$not": { "$gt": 100 } } }), &d).unwrap());
    assert!(matches(&sel(doc! { "n": { "$mod": [5, 0] } }), &d).unwrap());
    assert!(!matches(&sel(doc! { "n": { "$mod": [3, 1] } }), &d).unwrap());
}

#[test]
fn and_or_nor_composition() {
    let d = doc! { "a": 1, "b": 2 };
    assert!(matches(&sel(doc! { "$and": [ {"a": 1}, {"b": 2} ] }), &d).unwrap());
    assert!(matches(&sel(doc! { "$or": [ {"a": 99}, {"b": 2} ] }), &d).unwrap());
    assert!(matches(&sel(doc! { "$nor": [ {"a": 99}, {"b": 99} ] }), &d).unwrap());
    assert!(!matches(&sel(doc! { "$nor": [ {"a": 1} ] }), &d).unwrap());
}

#[test]
fn empty_and_or_are_errors() {
    use slate_query::Selector;
    assert!(Selector::and(vec![]).is_err());
    assert!(Selector::or(vec![]).is_err());
}

#[test]
fn numeric_cross_type_comparisons_coerce() {
    let d = doc! { "n": 5.0 };
    assert!(matches(&sel(doc! { "n": { "$gt": 1 } }), &d).unwrap());
    assert!(matches(&sel(doc! { "n": 5 }), &d).unwrap());
}

#[test]
fn type_mismatch_comparison_is_non_match_not_error() {
    let d = doc! { "n": "not a number" };
    assert!(!matches(&sel(doc! { "n": { "$gt": 1 } }), &d).unwrap());
}

#[test]
fn where_predicate_is_a_closure() {
    use slate_query::Selector;
    let s = Selector::where_fn(|d| d.get_i32("a").unwrap_or(0) > 0);
    assert!(matches(&s, &doc! { "a": 1 }).unwrap());
    assert!(!matches(&s, &doc! { "a": -1 }).unwrap());
    let _ = Bson::Null;
}
