use bson::{doc, Bson, DateTime};
use slate_query::{apply, parse_modifier, ApplyContext};

fn ctx() -> ApplyContext<'static> {
    ApplyContext::new(DateTime::from_millis(1_700_000_000_000))
}

#[test]
fn set_unset() {
    let d = doc! { "id": 1, "a": 1 };
    let m = parse_modifier(&doc! { "$set": { "a": 2, "b": 3 } }).unwrap();
    let out = apply(&m, &d, &ctx()).unwrap();
    assert_eq!(out.get_i32("a").unwrap(), 2);
    assert_eq!(out.get_i32("b").unwrap(), 3);

    let m2 = parse_modifier(&doc! { "$unset": { "a": "" } }).unwrap();
    let out2 = apply(&m2, &out, &ctx()).unwrap();
    assert!(out2.get("a").is_none());
}

#[test]
fn inc_and_mul_treat_missing_as_zero() {
    let d = doc! { "id": 1 };
    let m = parse_modifier(&doc! { "$inc": { "count": 5 } }).unwrap();
    let out = apply(&m, &d, &ctx()).unwrap();
    assert_eq!(out.get_i32("count").unwrap(), 5);

    let m2 = parse_modifier(&doc! { "$mul": { "count": 3 } }).unwrap();
    let out2 = apply(&m2, &out, &ctx()).unwrap();
    assert_eq!(out2.get_i32("count").unwrap(), 15);
}

#[test]
fn min_and_max() {
    let d = doc! { "n": 5 };
    let m_min = parse_modifier(&doc! { "$min": { "n": 3 } }).unwrap();
    assert_eq!(apply(&m_min, &d, &ctx()).unwrap().get_i32("n").unwrap(), 3);

    let m_max = parse_modifier(&doc! { "$max": { "n": 10 } }).unwrap();
    assert_eq!(apply(&m_max, &d, &ctx()).unwrap().get_i32("n").unwrap(), 10);
}

#[test]
fn current_date_uses_caller_clock() {
    let d = doc! { "id": 1 };
    let m = parse_modifier(&doc! { "$currentDate": { "updatedAt": true } }).unwrap();
    let c = ctx();
    let out = apply(&m, &d, &c).unwrap();
    match out.get("updatedAt") {
        Some(Bson::DateTime(dt)) => assert_eq!(*dt, c.now),
        other => panic!("expected DateTime, got {other:?}"),
    }
}

#[test]
fn rename_moves_value() {
    let d = doc! { "old": 42 };
    let m = parse_modifier(&doc! { "$rename": { "old": "new" } }).unwrap();
    let out = apply(&m, &d, &ctx()).unwrap();
    assert!(out.get("old").is_none());
    assert_eq!(out.get_i32("new").unwrap(), 42);
}

#[test]
fn set_on_insert_only_applies_when_absent() {
    let d = doc! { "a": 1 };
    let m = parse_modifier(&doc! { "$setOnInsert": { "a": 99, "b": 7 } }).unwrap();
    let out = apply(&m, &d, &ctx()).unwrap();
    assert_eq!(out.get_i32("a").unwrap(), 1);
    assert_eq!(out.get_i32("b").unwrap(), 7);
}

#[test]
fn add_to_set_is_idempotent() {
    let d = doc! { "tags": ["a"] };
    let m = parse_modifier(&doc! { "$addToSet": { "tags": "a" } }).unwrap();
    let out = apply(&m, &d, &ctx()).unwrap();
    assert_eq!(out.get_array("tags").unwrap().len(), 1);

    let m2 = parse_modifier(&doc! { "$addToSet": { "tags": "b" } }).unwrap();
    let out2 = apply(&m2, &out, &ctx()).unwrap();
    assert_eq!(out2.get_array("tags").unwrap().len(), 2);
}

#[test]
fn push_pull_pull_all_pop() {
    let d = doc! { "tags": ["a", "b", "c"] };
    let pushed = apply(&parse_modifier(&doc! { "$push": { "tags": "d" } }).unwrap(), &d, &ctx()).unwrap();
    assert_eq!(pushed.get_array("tags").unwrap().len(), 4);

    let pulled = apply(&parse_modifier(&doc! { "$pull": { "tags": "b" } }).unwrap(), &d, &ctx()).unwrap();
    assert_eq!(pulled.get_array("tags").unwrap().len(), 2);

    let pulled_all =
        apply(&parse_modifier(&doc! { "$pullAll": { "tags": ["a", "c"] } }).unwrap(), &d, &ctx()).unwrap();
    assert_eq!(pulled_all.get_array("tags").unwrap().len(), 1);

    let popped_last = apply(&parse_modifier(&doc! { "$pop": { "tags": 1 } }).unwrap(), &d, &ctx()).unwrap();
    assert_eq!(
        popped_last.get_array("tags").unwrap(),
        &vec![Bson::String("a".into()), Bson::String("b".into())]
    );

    let popped_first = apply(&parse_modifier(&doc! { "$pop": { "tags": -1 } }).unwrap(), &d, &ctx()).unwrap();
    assert_eq!(
        popped_first.get_array("tags").unwrap(),
        &vec![Bson::String("b".into()), Bson::String("c".into())]
    );
}

#[test]
fn no_operator_keys_is_full_replace_preserving_id() {
    let d = doc! { "id": 1, "a": 1 };
    let m = parse_modifier(&doc! { "a": 2, "b": 3 }).unwrap();
    let out = apply(&m, &d, &ctx()).unwrap();
    assert_eq!(out.get_i32("id").unwrap(), 1);
    assert_eq!(out.get_i32("a").unwrap(), 2);
    assert_eq!(out.get_i32("b").unwrap(), 3);
}

#[test]
fn setting_id_to_a_different_value_fails() {
    let d = doc! { "id": 1 };
    let m = parse_modifier(&doc! { "$set": { "id": 2 } }).unwrap();
    assert!(apply(&m, &d, &ctx()).is_err());
}

#[test]
fn bare_positional_resolves_against_query_selector() {
    use slate_query::parse_selector;

    let d = doc! { "items": [ { "sku": "a", "qty": 1 }, { "sku": "b", "qty": 2 } ] };
    let selector = parse_selector(&doc! { "items.sku": "b" }).unwrap();
    let m = parse_modifier(&doc! { "$set": { "items.$.qty": 99 } }).unwrap();
    let mut c = ctx();
    c.query_selector = Some(&selector);
    let out = apply(&m, &d, &c).unwrap();
    let items = out.get_array("items").unwrap();
    assert_eq!(items[0].as_document().unwrap().get_i32("qty").unwrap(), 1);
    assert_eq!(items[1].as_document().unwrap().get_i32("qty").unwrap(), 99);
}

#[test]
fn array_filter_identifier_resolves_against_array_filters() {
    use slate_query::{parse_selector, ArrayFilter};

    let d = doc! { "items": [ { "sku": "a", "qty": 1 }, { "sku": "b", "qty": 2 } ] };
    let m = parse_modifier(&doc! { "$set": { "items.$[elem].qty": 0 } }).unwrap();
    let filters = vec![ArrayFilter {
        identifier: "elem".into(),
        selector: parse_selector(&doc! { "elem.qty": { "$gte": 2 } }).unwrap(),
    }];
    let mut c = ctx();
    c.array_filters = &filters;
    let out = apply(&m, &d, &c).unwrap();
    let items = out.get_array("items").unwrap();
    assert_eq!(items[0].as_document().unwrap().get_i32("qty").unwrap(), 1);
    assert_eq!(items[1].as_document().unwrap().get_i32("qty").unwrap(), 0);
}
