use super::GroupCommand;
use crate::collection::{CollectionInner, Document};
use crate::common::Value;
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use indexmap::IndexMap;

/// Client-side grouped aggregation.
///
/// Documents matching `cond` are fetched through the collection's find path,
/// partitioned by key, folded with the reduce function into a clone of
/// `initial`, and optionally finalized. Groups come back in the order their
/// first document was seen. Any reduce or finalize failure aborts the whole
/// run.
#[derive(Debug, Default, Clone, Copy)]
pub struct GroupEngine;

struct Group {
    key: Document,
    accumulator: Document,
}

impl GroupEngine {
    pub fn new() -> Self {
        GroupEngine
    }

    pub fn execute(
        &self,
        collection: &CollectionInner,
        command: GroupCommand,
    ) -> BasaltResult<Vec<Document>> {
        let GroupCommand {
            key,
            key_fn,
            cond,
            initial,
            reduce,
            finalize,
        } = command;

        let initial = match initial {
            Some(initial) => initial,
            None => {
                log::error!("initial has to be an object");
                return Err(BasaltError::new(
                    "initial has to be an object",
                    ErrorKind::ValidationError,
                ));
            }
        };
        let reduce = match reduce {
            Some(reduce) => reduce,
            None => {
                log::error!("reduce has to be set");
                return Err(BasaltError::new(
                    "reduce has to be set",
                    ErrorKind::CommandFailure,
                ));
            }
        };
        if key.is_some() && key_fn.is_some() {
            log::error!("Group key and key function cannot both be set");
            return Err(BasaltError::new(
                "Group key and key function cannot both be set",
                ErrorKind::ValidationError,
            ));
        }

        let documents = collection.find(cond.unwrap_or_default())?;
        let mut groups: IndexMap<Document, Group> = IndexMap::new();
        for document in &documents {
            let group_key = match (&key, &key_fn) {
                (Some(fields), _) => project_key(fields, document),
                (None, Some(key_fn)) => key_fn(document)?,
                (None, None) => Document::new(),
            };

            let group = groups.entry(group_key.clone()).or_insert_with(|| Group {
                key: group_key,
                accumulator: initial.clone(),
            });
            reduce(document, &mut group.accumulator)?;
        }
        log::debug!(
            "Grouped {} documents of {} into {} groups",
            documents.len(),
            collection.namespace(),
            groups.len()
        );

        let mut results = Vec::with_capacity(groups.len());
        for (_, group) in groups {
            let Group {
                key,
                mut accumulator,
            } = group;
            if let Some(finalize) = &finalize {
                if let Some(replacement) = finalize(&mut accumulator)? {
                    results.push(replacement);
                    continue;
                }
            }
            results.push(merge_key(key, accumulator));
        }
        Ok(results)
    }
}

/// Values of the key fields, `Null` for missing ones.
fn project_key(fields: &Document, document: &Document) -> Document {
    let mut key = Document::with_capacity(fields.size());
    for field in fields.keys() {
        let value = document.get(field).cloned().unwrap_or(Value::Null);
        key.insert(field.clone(), value);
    }
    key
}

fn merge_key(key: Document, accumulator: Document) -> Document {
    let mut entry = key;
    for (field, value) in accumulator {
        if !entry.contains_key(&field) {
            entry.insert(field, value);
        }
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basalt_config::BasaltConfig;
    use crate::collection::Collection;
    use crate::doc;
    use crate::store::memory::InMemoryStore;
    use crate::store::{StoreConnection, StoreConnectionProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStore {
        store: InMemoryStore,
        commands: Arc<AtomicUsize>,
    }

    impl StoreConnectionProvider for CountingStore {
        fn run_command(&self, database: &str, command: &Document) -> BasaltResult<Document> {
            self.commands.fetch_add(1, Ordering::SeqCst);
            self.store.run_command(database, command)
        }

        fn database_names(&self) -> BasaltResult<Vec<String>> {
            self.store.database_names()
        }

        fn is_closed(&self) -> bool {
            self.store.is_closed()
        }

        fn close(&self) -> BasaltResult<()> {
            self.store.close()
        }
    }

    fn collection_with_counter() -> (Collection, Arc<AtomicUsize>) {
        let commands = Arc::new(AtomicUsize::new(0));
        let connection = StoreConnection::new(CountingStore {
            store: InMemoryStore::new(),
            commands: commands.clone(),
        });
        let collection =
            Collection::new("test", "group", connection, &BasaltConfig::new()).unwrap();
        (collection, commands)
    }

    fn seeded() -> Collection {
        let (collection, _) = collection_with_counter();
        for x in ["a", "a", "a", "b", "b", "b", "b", "c"] {
            collection.insert(doc! { x: x }).unwrap();
        }
        collection
    }

    fn counting() -> GroupCommand {
        GroupCommand::new().initial(doc! { count: 0 }).reduce(|_, acc| {
            let count = acc.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
            acc.insert("count", count + 1);
            Ok(())
        })
    }

    #[test]
    fn test_group_by_key() {
        let collection = seeded();
        let result = collection.group(counting().key(doc! { x: 1 })).unwrap();
        assert_eq!(
            result,
            vec![
                doc! { x: "a", count: 3 },
                doc! { x: "b", count: 4 },
                doc! { x: "c", count: 1 },
            ]
        );
    }

    #[test]
    fn test_group_with_cond() {
        let collection = seeded();
        let result = collection
            .group(counting().key(doc! { x: 1 }).cond(doc! { x: "b" }))
            .unwrap();
        assert_eq!(result, vec![doc! { x: "b", count: 4 }]);
    }

    #[test]
    fn test_missing_key_field_groups_as_null() {
        let (collection, _) = collection_with_counter();
        collection.insert(doc! { y: 1 }).unwrap();
        collection.insert(doc! { x: (Value::Null) }).unwrap();
        let result = collection.group(counting().key(doc! { x: 1 })).unwrap();
        assert_eq!(result, vec![doc! { x: (Value::Null), count: 2 }]);
    }

    #[test]
    fn test_without_key_single_group() {
        let collection = seeded();
        let result = collection.group(counting()).unwrap();
        assert_eq!(result, vec![doc! { count: 8 }]);

        let (empty, _) = collection_with_counter();
        assert!(empty.group(counting()).unwrap().is_empty());
    }

    #[test]
    fn test_key_function() {
        let collection = seeded();
        let result = collection
            .group(counting().key_fn(|document| {
                let is_a = document.get("x") == Some(&Value::from("a"));
                Ok(doc! { is_a: is_a })
            }))
            .unwrap();
        assert_eq!(
            result,
            vec![doc! { is_a: true, count: 3 }, doc! { is_a: false, count: 5 }]
        );
    }

    #[test]
    fn test_finalize_replaces_entry() {
        let collection = seeded();
        let result = collection
            .group(counting().key(doc! { x: 1 }).finalize(|acc| {
                let count = acc.get("count").cloned().unwrap_or_default();
                Ok(Some(doc! { total: count }))
            }))
            .unwrap();
        assert_eq!(
            result,
            vec![doc! { total: 3 }, doc! { total: 4 }, doc! { total: 1 }]
        );
    }

    #[test]
    fn test_finalize_in_place_merges_key() {
        let collection = seeded();
        let result = collection
            .group(counting().key(doc! { x: 1 }).cond(doc! { x: "c" }).finalize(|acc| {
                acc.insert("done", true);
                Ok(None)
            }))
            .unwrap();
        assert_eq!(result, vec![doc! { x: "c", count: 1, done: true }]);
    }

    #[test]
    fn test_reduce_failure_aborts() {
        let collection = seeded();
        let error = collection
            .group(
                GroupCommand::new()
                    .key(doc! { x: 1 })
                    .initial(doc! {})
                    .reduce(|document, _| {
                        if document.get("x") == Some(&Value::from("b")) {
                            return Err(BasaltError::new("boom", ErrorKind::CommandFailure));
                        }
                        Ok(())
                    }),
            )
            .unwrap_err();
        assert_eq!(error.message(), "boom");
    }

    #[test]
    fn test_preflight_checks_skip_store() {
        let (collection, commands) = collection_with_counter();

        let missing_initial = GroupCommand::new().reduce(|_, _| Ok(()));
        let error = collection.group(missing_initial).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::ValidationError);
        assert_eq!(error.message(), "initial has to be an object");

        let missing_reduce = GroupCommand::new().initial(doc! {});
        let error = collection.group(missing_reduce).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::CommandFailure);

        let both_keys = counting()
            .key(doc! { x: 1 })
            .key_fn(|document| Ok(document.clone()));
        let error = collection.group(both_keys).unwrap_err();
        assert_eq!(error.kind(), &ErrorKind::ValidationError);

        assert_eq!(commands.load(Ordering::SeqCst), 0);
    }
}
