use basalt::collection::{Collection, Document};
use basalt::common::Value;
use basalt::doc;
use basalt::errors::{BasaltError, BasaltResult, ErrorKind};
use basalt::group::GroupCommand;
use basalt_int_test::test_util::{cleanup, create_test_context, run_test};

#[ctor::ctor]
fn init() {
    colog::init();
}

fn seed(collection: &Collection) -> BasaltResult<()> {
    let documents = ["a", "a", "a", "b", "b", "b", "b", "c"]
        .iter()
        .map(|x| doc! { x: (*x) })
        .collect();
    collection.insert_many(documents)?;
    Ok(())
}

fn count(_: &Document, accumulator: &mut Document) -> BasaltResult<()> {
    let count = accumulator.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
    accumulator.insert("count", count + 1);
    Ok(())
}

#[test]
fn test_group_counts_by_key() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection("letters")?;
            seed(&collection)?;

            let result = collection.group(
                GroupCommand::new()
                    .key(doc! { x: 1 })
                    .initial(doc! { count: 0 })
                    .reduce(count),
            )?;
            assert_eq!(
                result,
                vec![
                    doc! { x: "a", count: 3 },
                    doc! { x: "b", count: 4 },
                    doc! { x: "c", count: 1 },
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_group_with_condition() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection("letters")?;
            seed(&collection)?;

            let result = collection.group(
                GroupCommand::new()
                    .key(doc! { x: 1 })
                    .cond(doc! { x: "b" })
                    .initial(doc! { count: 0 })
                    .reduce(count),
            )?;
            assert_eq!(result, vec![doc! { x: "b", count: 4 }]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_finalize_new_document_replaces_entry() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection("letters")?;
            seed(&collection)?;

            let result = collection.group(
                GroupCommand::new()
                    .key(doc! { x: 1 })
                    .initial(doc! { count: 0 })
                    .reduce(count)
                    .finalize(|accumulator| {
                        let count = accumulator.get("count").cloned().unwrap_or_default();
                        Ok(Some(doc! { n: count }))
                    }),
            )?;
            assert_eq!(result, vec![doc! { n: 3 }, doc! { n: 4 }, doc! { n: 1 }]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_finalize_in_place_keeps_key() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection("letters")?;
            seed(&collection)?;

            let result = collection.group(
                GroupCommand::new()
                    .key(doc! { x: 1 })
                    .initial(doc! { count: 0 })
                    .reduce(count)
                    .finalize(|accumulator| {
                        let count = accumulator.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0);
                        accumulator.insert("share", count / 8.0);
                        Ok(None)
                    }),
            )?;
            assert_eq!(
                result,
                vec![
                    doc! { x: "a", count: 3, share: 0.375 },
                    doc! { x: "b", count: 4, share: 0.5 },
                    doc! { x: "c", count: 1, share: 0.125 },
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_group_sums_values() {
    run_test(
        create_test_context,
        |ctx| {
            let orders = ctx.collection("orders")?;
            orders.insert_many(vec![
                doc! { customer: "ann", region: "north", total: 10 },
                doc! { customer: "bob", region: "south", total: 5 },
                doc! { customer: "ann", region: "north", total: 7 },
                doc! { customer: "cid", total: 1 },
            ])?;

            let result = orders.group(
                GroupCommand::new()
                    .key(doc! { customer: 1, region: 1 })
                    .initial(doc! { sum: 0, orders: [] })
                    .reduce(|order, accumulator| {
                        let total = order.get("total").cloned().unwrap_or_default();
                        let sum = accumulator.get("sum").cloned().unwrap_or_default();
                        accumulator.insert("sum", sum.checked_add(&total).unwrap_or(sum));
                        if let Some(Value::Array(list)) = accumulator.get_mut("orders") {
                            list.push(total);
                        }
                        Ok(())
                    }),
            )?;
            assert_eq!(
                result,
                vec![
                    doc! { customer: "ann", region: "north", sum: 17, orders: [10, 7] },
                    doc! { customer: "bob", region: "south", sum: 5, orders: [5] },
                    doc! { customer: "cid", region: (Value::Null), sum: 1, orders: [1] },
                ]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_reduce_error_aborts_group() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection("letters")?;
            seed(&collection)?;

            let result = collection.group(
                GroupCommand::new()
                    .key(doc! { x: 1 })
                    .initial(doc! {})
                    .reduce(|document, _| {
                        if document.get("x") == Some(&Value::from("c")) {
                            return Err(BasaltError::new("cannot reduce c", ErrorKind::CommandFailure));
                        }
                        Ok(())
                    }),
            );
            assert_eq!(result.unwrap_err().message(), "cannot reduce c");
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_missing_initial_and_reduce() {
    run_test(
        create_test_context,
        |ctx| {
            let collection = ctx.collection("letters")?;

            let error = collection
                .group(GroupCommand::new().key(doc! { x: 1 }).reduce(count))
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::ValidationError);
            assert_eq!(error.message(), "initial has to be an object");

            let error = collection
                .group(GroupCommand::new().key(doc! { x: 1 }).initial(doc! {}))
                .unwrap_err();
            assert_eq!(error.kind(), &ErrorKind::CommandFailure);

            // the pre-flight failures never reached the store
            assert!(!ctx.db().has_collection("letters")?);
            Ok(())
        },
        cleanup,
    )
}
