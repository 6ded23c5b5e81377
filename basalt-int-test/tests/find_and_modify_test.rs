use basalt::basalt::Basalt;
use basalt::collection::{Document, FindAndModifyOptions, ReturnDocument};
use basalt::common::Value;
use basalt::doc;
use basalt::errors::{BasaltResult, ErrorKind};
use basalt_int_test::test_util::{cleanup, create_test_context, insert_sequence, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn as_document(value: Option<Value>) -> Option<Document> {
    value.and_then(|v| v.as_document().cloned())
}

#[test]
fn test_returns_pre_update_document() {
    run_test(
        create_test_context,
        |ctx| {
            let counters = ctx.collection("counters")?;
            counters.insert(doc! { _id: "orders", seq: 0 })?;

            let before = counters.find_and_modify(
                doc! { _id: "orders" },
                doc! { "$inc": { seq: 1 } },
            )?;
            assert_eq!(as_document(before), Some(doc! { _id: "orders", seq: 0 }));
            assert_eq!(
                counters.find_by_id("orders")?,
                Some(doc! { _id: "orders", seq: 1 })
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_return_document_after() {
    run_test(
        create_test_context,
        |ctx| {
            let counters = ctx.collection("counters")?;
            counters.insert(doc! { _id: "orders", seq: 5 })?;

            let options = FindAndModifyOptions::new()
                .query(doc! { _id: "orders" })
                .update(doc! { "$inc": { seq: 1 } })
                .return_document(ReturnDocument::After);
            let after = counters.find_and_modify_with_options(&options)?;
            assert_eq!(as_document(after), Some(doc! { _id: "orders", seq: 6 }));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_no_match_returns_none() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection("empty")?;
            let result =
                collection.find_and_modify(doc! { _id: 1 }, doc! { "$set": { a: 1 } })?;
            assert!(result.is_none());
            assert_eq!(collection.count(doc! {})?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_sort_selects_document() {
    run_test(
        create_test_context,
        |ctx| {
            let jobs = ctx.collection("jobs")?;
            insert_sequence(&jobs, 5, |i| doc! { _id: (i as i32), priority: (i as i32 * 10), state: "ready" })?;

            let options = FindAndModifyOptions::new()
                .query(doc! { state: "ready" })
                .sort(doc! { priority: (-1) })
                .fields(doc! { priority: 1 })
                .update(doc! { "$set": { state: "running" } });
            let picked = jobs.find_and_modify_with_options(&options)?;
            assert_eq!(as_document(picked), Some(doc! { _id: 4, priority: 40 }));
            assert_eq!(jobs.count(doc! { state: "running" })?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_remove() {
    run_test(
        create_test_context,
        |ctx| {
            let queue = ctx.collection("queue")?;
            insert_sequence(&queue, 3, |i| doc! { _id: (i as i32) })?;

            let options = FindAndModifyOptions::new()
                .query(doc! {})
                .sort(doc! { _id: 1 })
                .remove(true);
            let removed = queue.find_and_modify_with_options(&options)?;
            assert_eq!(as_document(removed), Some(doc! { _id: 0 }));
            assert_eq!(queue.count(doc! {})?, 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_upsert() {
    run_test(
        create_test_context,
        |ctx| {
            let counters = ctx.collection("counters")?;
            let options = FindAndModifyOptions::new()
                .query(doc! { _id: "visits" })
                .update(doc! { "$inc": { n: 1 } })
                .upsert(true);

            // nothing existed before the upsert
            assert!(counters.find_and_modify_with_options(&options)?.is_none());
            assert_eq!(
                counters.find_by_id("visits")?,
                Some(doc! { _id: "visits", n: 1 })
            );

            let after = counters.find_and_modify_with_options(
                &options.clone().return_document(ReturnDocument::After),
            )?;
            assert_eq!(as_document(after), Some(doc! { _id: "visits", n: 2 }));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_invalid_combinations() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection("invalid")?;
            let remove_and_upsert = FindAndModifyOptions::new().remove(true).upsert(true);
            let error = collection
                .find_and_modify_with_options(&remove_and_upsert)
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::ValidationError);

            collection.insert(doc! { _id: 1, a: 1 })?;
            let error = collection
                .find_and_modify(doc! { _id: 1 }, doc! { "$bogus": { a: 2 } })
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::CommandFailure);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_type_bindings_from_builder() {
    run_test(
        create_test_context,
        |_| {
            let db = Basalt::builder()
                .type_binding("address", |path: &str, document: Document| -> BasaltResult<Value> {
                    let city = document.get("city").cloned().unwrap_or_default();
                    Ok(Value::from(format!("{}:{}", path, city)))
                })
                .return_document(ReturnDocument::After)
                .open("bindings")?;
            let people = db.collection("people")?;
            people.insert(doc! { _id: 1, address: { city: "Lyon" } })?;

            let result = people
                .find_and_modify(doc! { _id: 1 }, doc! { "$set": { seen: true } })?
                .unwrap();
            let document = result.as_document().unwrap();
            assert_eq!(document.get("address"), Some(&Value::from("address:Lyon")));
            assert_eq!(document.get("seen"), Some(&Value::from(true)));

            // plain reads are not decoded
            let raw = people.find_by_id(1)?.unwrap();
            assert_eq!(raw.get("address.city"), Some(&Value::from("Lyon")));
            db.close()
        },
        cleanup,
    )
}

#[test]
fn test_collection_binding_overrides() {
    run_test(
        create_test_context,
        |ctx| {
            let people = ctx.collection("people")?;
            people.insert(doc! { _id: 1, tags: [{ t: "a" }, { t: "b" }] })?;
            people.set_type_binding("tags", |_: &str, document: Document| -> BasaltResult<Value> {
                Ok(document.get("t").cloned().unwrap_or_default())
            });

            let result = people
                .find_and_modify(doc! { _id: 1 }, doc! { "$set": { x: 1 } })?
                .unwrap();
            assert_eq!(
                result.as_document().unwrap().get("tags"),
                Some(&Value::from(vec!["a", "b"]))
            );

            // other handles keep the configured defaults
            let other = ctx.collection("people")?;
            assert!(!other.type_bindings().is_bound("tags"));
            Ok(())
        },
        cleanup,
    )
}
