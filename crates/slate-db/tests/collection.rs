use bson::doc;
use slate_db::{Collection, FindOptions, UpdateOptions};
use slate_reactive::{ManualReactivity, NullReactivity};

fn opts() -> FindOptions {
    FindOptions::default()
}

#[test]
fn basic_crud_round_trip() {
    let people: Collection = Collection::new("people");
    let id = people.insert(doc! { "name": "Ada", "age": 30 }).unwrap();

    let found = people.find_one(Some(doc! { "id": id.clone() }), opts()).unwrap();
    assert_eq!(found.unwrap().get_str("name").unwrap(), "Ada");

    let updated = people
        .update_one(
            &doc! { "id": id.clone() },
            &doc! { "$set": { "age": 31 } },
            UpdateOptions::default(),
        )
        .unwrap();
    assert_eq!(updated, 1);

    let after = people.find_one(Some(doc! { "id": id.clone() }), opts()).unwrap().unwrap();
    assert_eq!(after.get_i32("age").unwrap(), 31);

    let removed = people.remove_one(&doc! { "id": id }).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(people.find(None, opts()).unwrap().fetch().unwrap().len(), 0);
}

#[test]
fn sort_skip_limit_and_projection() {
    let nums: Collection = Collection::new("nums");
    for i in 0..5 {
        nums.insert(doc! { "n": i }).unwrap();
    }

    let mut options = opts();
    options.sort = vec![slate_db::SortKey {
        field: "n".to_string(),
        direction: slate_db::SortDirection::Desc,
    }];
    options.skip = 1;
    options.limit = Some(2);
    options.fields = Some(doc! { "n": 1 });

    let page = nums.find(None, options).unwrap().fetch().unwrap();
    let values: Vec<i32> = page.iter().map(|d| d.get_i32("n").unwrap()).collect();
    assert_eq!(values, vec![3, 2]);
    for doc in &page {
        assert!(doc.get("id").is_some());
        assert_eq!(doc.len(), 2);
    }
}

#[test]
fn collection_level_transform_applies_to_reads() {
    let items: Collection = Collection::new("items");
    items.set_transform(|doc| {
        let mut out = doc.clone();
        out.insert("seen", true);
        out
    });
    items.insert(doc! { "name": "widget" }).unwrap();

    let found = items.find(None, opts()).unwrap().fetch().unwrap();
    assert_eq!(found[0].get_bool("seen").unwrap(), true);
}

#[test]
fn duplicate_id_is_rejected() {
    let things: Collection = Collection::new("things");
    things.insert(doc! { "id": "fixed", "v": 1 }).unwrap();
    let err = things.insert(doc! { "id": "fixed", "v": 2 }).unwrap_err();
    assert!(matches!(err, slate_db::DbError::DuplicateId(_)));
}

#[test]
fn observe_changes_reports_added_changed_and_removed() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let log_clone = log.clone();

    let tasks: Collection = Collection::new("tasks");
    let cursor = tasks.find(None, opts()).unwrap();
    cursor
        .observe_changes(move |delta| {
            let label = match delta {
                slate_db::ChangeDelta::Added { .. } => "added",
                slate_db::ChangeDelta::Changed { .. } => "changed",
                slate_db::ChangeDelta::Removed { .. } => "removed",
                slate_db::ChangeDelta::MovedBefore { .. } => "moved",
            };
            log_clone.borrow_mut().push(label.to_string());
        })
        .unwrap();

    let id = tasks.insert(doc! { "title": "write tests" }).unwrap();
    tasks
        .update_one(
            &doc! { "id": id.clone() },
            &doc! { "$set": { "title": "write more tests" } },
            UpdateOptions::default(),
        )
        .unwrap();
    tasks.remove_one(&doc! { "id": id }).unwrap();

    let events = log.borrow();
    assert_eq!(events.as_slice(), ["added", "changed", "removed"]);
}

#[test]
fn cursor_fetch_depends_on_active_reactive_scope() {
    let reactivity = ManualReactivity::new();
    let docs: Collection<slate_store::MemoryStore, ManualReactivity> =
        Collection::with_reactivity("docs", reactivity);

    docs.insert(doc! { "n": 1 }).unwrap();

    // Outside any scope: fetch works but never becomes reactive.
    let result = docs.find(None, opts()).unwrap().fetch().unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn null_reactivity_collection_is_non_reactive_by_default() {
    let c: Collection<slate_store::MemoryStore, NullReactivity> = Collection::new("c");
    c.insert(doc! { "x": 1 }).unwrap();
    assert_eq!(c.find(None, opts()).unwrap().fetch().unwrap().len(), 1);
}

#[test]
fn update_one_without_upsert_leaves_no_match_untouched() {
    let people: Collection = Collection::new("people");
    let updated = people
        .update_one(
            &doc! { "id": "ghost" },
            &doc! { "$set": { "age": 1 } },
            UpdateOptions::default(),
        )
        .unwrap();
    assert_eq!(updated, 0);
    assert_eq!(people.find(None, opts()).unwrap().fetch().unwrap().len(), 0);
}

#[test]
fn update_one_with_upsert_inserts_a_document_derived_from_selector_and_modifier() {
    let people: Collection = Collection::new("people");
    let updated = people
        .update_one(
            &doc! { "id": "ada", "team": "analytics" },
            &doc! { "$set": { "age": 30 }, "$setOnInsert": { "joined": "today" } },
            UpdateOptions { upsert: true },
        )
        .unwrap();
    assert_eq!(updated, 1);

    let doc = people
        .find_one(Some(doc! { "id": "ada" }), opts())
        .unwrap()
        .unwrap();
    assert_eq!(doc.get_str("team").unwrap(), "analytics");
    assert_eq!(doc.get_i32("age").unwrap(), 30);
    assert_eq!(doc.get_str("joined").unwrap(), "today");
}

#[test]
fn update_one_with_upsert_updates_in_place_when_a_document_already_matches() {
    let people: Collection = Collection::new("people");
    people.insert(doc! { "id": "ada", "age": 30 }).unwrap();

    let updated = people
        .update_one(
            &doc! { "id": "ada" },
            &doc! { "$set": { "age": 31 } },
            UpdateOptions { upsert: true },
        )
        .unwrap();
    assert_eq!(updated, 1);
    assert_eq!(people.find(None, opts()).unwrap().fetch().unwrap().len(), 1);
}

#[test]
fn registry_reuses_named_collections() {
    let registry = slate_db::default_registry();
    let a = registry.get_or_create("shared", || Collection::new("shared"));
    a.insert(doc! { "v": 1 }).unwrap();
    let b = registry.get_or_create("shared", || Collection::new("shared"));
    assert_eq!(b.find(None, opts()).unwrap().fetch().unwrap().len(), 1);
}
